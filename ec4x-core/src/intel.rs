//! Intelligence: scout missions, reports, counter-intelligence effects.
//!
//! Ground truth lives in `GameState`; everything a house *knows* lives in
//! its [`IntelDatabase`] as graded reports. Player-facing reads go through
//! the fog-of-war projection in [`crate::projection`], which consults this
//! database for systems the house cannot currently observe.

use serde::{Deserialize, Serialize};

use crate::ids::{HouseId, SpyScoutId, SystemId};
use crate::starmap::{PlanetClass, ResourceRating};

/// What a spy mission is tasked to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpyMissionType {
    /// Survey the system and any fleets present.
    System,
    /// Detailed look at the target colony.
    Colony,
    /// Detailed look at the target colony's starbases.
    Starbase,
}

/// Scout mission lifecycle. The mission is a multi-turn sequence advanced
/// by the resolver; state is explicit so a snapshot can resume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoutState {
    /// En route to the target along the precomputed path.
    Traveling,
    /// At the target, gathering.
    OnMission,
    /// Homebound with the take.
    Returning,
    /// Spotted by counter-intelligence; destroyed this turn.
    Detected,
}

/// A detached scout mission. Created by consuming the scout squadrons of
/// a fleet issued a spy command; the squadrons no longer exist as combat
/// units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpyScout {
    pub id: SpyScoutId,
    pub owner: HouseId,
    pub mission: SpyMissionType,
    pub target: SystemId,
    pub location: SystemId,
    /// Outbound route, including the target as the last entry.
    pub path: Vec<SystemId>,
    /// Index into `path` of the current position.
    pub path_index: usize,
    /// Scouts merged into this mission; boosts effective ELI.
    pub mesh_count: u32,
    /// ELI level at launch.
    pub tech_level: i32,
    pub state: ScoutState,
}

impl SpyScout {
    /// Effective ELI: launch level plus the mesh bonus.
    pub fn effective_eli(&self) -> i32 {
        self.tech_level + crate::defines::espionage::mesh_bonus(self.mesh_count)
    }
}

/// Graded intelligence quality, percent. 100 is a perfect take; age and
/// counter-intelligence degrade it.
pub type QualityPct = u32;

/// The observable facts a report can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportBody {
    SystemIntel {
        planet_class: PlanetClass,
        resource_rating: ResourceRating,
        /// (owner, squadron count) per fleet seen, ascending house id.
        fleets_seen: Vec<(HouseId, u32)>,
        has_colony: bool,
    },
    ColonyIntel {
        owner: HouseId,
        population_units: i64,
        industrial_units: i64,
        infrastructure: u8,
        shield_level: u8,
        ground_batteries: u32,
        ground_forces: u32,
    },
    StarbaseIntel {
        owner: HouseId,
        starbases: u32,
        crippled: u32,
    },
    CombatEncounter {
        /// Houses engaged, ascending.
        participants: Vec<HouseId>,
        victor: Option<HouseId>,
        squadrons_lost: u32,
    },
    ConstructionActivity {
        owner: HouseId,
        /// Human-readable description of the active project.
        active_project: Option<String>,
        queue_length: u32,
    },
    StarbaseSurveillance {
        /// System being watched from the starbase.
        observed_system: SystemId,
        fleets_seen: Vec<(HouseId, u32)>,
    },
}

impl ReportBody {
    /// Report kind tag, used for dedup and display.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ReportBody::SystemIntel { .. } => "system_intel",
            ReportBody::ColonyIntel { .. } => "colony_intel",
            ReportBody::StarbaseIntel { .. } => "starbase_intel",
            ReportBody::CombatEncounter { .. } => "combat_encounter",
            ReportBody::ConstructionActivity { .. } => "construction_activity",
            ReportBody::StarbaseSurveillance { .. } => "starbase_surveillance",
        }
    }
}

/// One graded report in a house's intelligence database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelReport {
    /// System the report concerns.
    pub subject: SystemId,
    pub gathered_turn: u32,
    pub quality_pct: QualityPct,
    pub body: ReportBody,
}

impl IntelReport {
    /// Quality after aging `current_turn - gathered_turn` turns.
    pub fn aged_quality(&self, current_turn: u32) -> QualityPct {
        let age = current_turn.saturating_sub(self.gathered_turn);
        let decay = age * crate::defines::espionage::QUALITY_DECAY_PCT_PER_TURN;
        self.quality_pct.saturating_sub(decay)
    }
}

/// Everything one house knows about the galaxy beyond its own holdings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IntelDatabase {
    pub reports: Vec<IntelReport>,
    /// Systems the house has ever observed (colonized, traversed, or
    /// scouted); everything else is cartographically blank.
    pub known_systems: std::collections::BTreeSet<SystemId>,
}

impl IntelDatabase {
    pub fn add(&mut self, report: IntelReport) {
        self.known_systems.insert(report.subject);
        self.reports.push(report);
    }

    pub fn mark_known(&mut self, system: SystemId) {
        self.known_systems.insert(system);
    }

    pub fn knows(&self, system: SystemId) -> bool {
        self.known_systems.contains(&system)
    }

    /// Freshest report of the given kind about a subject.
    pub fn latest(&self, subject: SystemId, kind_name: &str) -> Option<&IntelReport> {
        self.reports
            .iter()
            .filter(|r| r.subject == subject && r.body.kind_name() == kind_name)
            .max_by_key(|r| r.gathered_turn)
    }

    /// Drop reports older than `keep_turns`.
    pub fn prune(&mut self, current_turn: u32, keep_turns: u32) {
        self.reports
            .retain(|r| current_turn.saturating_sub(r.gathered_turn) <= keep_turns);
    }
}

/// Kind of an EBP-funded sabotage effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Target's research-point output reduced.
    ResearchSabotage,
    /// Target's net colony value reduced.
    TradeDisruption,
    /// A starbase at the named colony is crippled for the duration.
    StarbaseCrippled(SystemId),
    /// Reports entering the target's database are corrupted.
    IntelCorruption,
}

/// An active espionage effect, decremented each income phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OngoingEffect {
    pub kind: EffectKind,
    pub source: HouseId,
    pub target: HouseId,
    pub turns_remaining: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(subject: u32, turn: u32, quality: u32) -> IntelReport {
        IntelReport {
            subject: SystemId(subject),
            gathered_turn: turn,
            quality_pct: quality,
            body: ReportBody::SystemIntel {
                planet_class: PlanetClass::Benign,
                resource_rating: ResourceRating::Abundant,
                fleets_seen: vec![],
                has_colony: false,
            },
        }
    }

    #[test]
    fn quality_decays_with_age() {
        let r = report(1, 10, 100);
        assert_eq!(r.aged_quality(10), 100);
        assert_eq!(r.aged_quality(13), 70);
        assert_eq!(r.aged_quality(30), 0);
    }

    #[test]
    fn latest_prefers_freshest_of_kind() {
        let mut db = IntelDatabase::default();
        db.add(report(1, 5, 100));
        db.add(report(1, 9, 80));
        db.add(report(2, 20, 100));
        let latest = db.latest(SystemId(1), "system_intel").unwrap();
        assert_eq!(latest.gathered_turn, 9);
    }

    #[test]
    fn adding_reports_marks_systems_known() {
        let mut db = IntelDatabase::default();
        assert!(!db.knows(SystemId(4)));
        db.add(report(4, 1, 100));
        assert!(db.knows(SystemId(4)));
    }

    #[test]
    fn mesh_bonus_applies_to_effective_eli() {
        let scout = SpyScout {
            id: SpyScoutId(1),
            owner: HouseId(1),
            mission: SpyMissionType::System,
            target: SystemId(5),
            location: SystemId(0),
            path: vec![SystemId(1), SystemId(5)],
            path_index: 0,
            mesh_count: 3,
            tech_level: 2,
            state: ScoutState::Traveling,
        };
        // Mesh of 3 grants +1
        assert_eq!(scout.effective_eli(), 3);
    }
}
