//! Colonies: population, industry, facilities, construction, capacity.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::defines::{capacity, construction, economy, ships};
use crate::fleet::ShipClass;
use crate::ids::{FacilityId, HouseId, SquadronId, SystemId};
use crate::starmap::PlanetClass;

/// Colony facility types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FacilityKind {
    /// Orbital fortress; fights in the orbital theater.
    Starbase,
    /// Enables cargo transfer and squadron basing.
    Spaceport,
    /// Enables hull construction and squadron repair.
    Shipyard,
}

impl FacilityKind {
    pub fn build_cost(self) -> i64 {
        match self {
            FacilityKind::Starbase => construction::STARBASE_COST,
            FacilityKind::Spaceport => construction::SPACEPORT_COST,
            FacilityKind::Shipyard => construction::SHIPYARD_COST,
        }
    }

    pub fn maintenance(self) -> i64 {
        match self {
            FacilityKind::Starbase => ships::STARBASE_MAINTENANCE,
            FacilityKind::Spaceport => ships::SPACEPORT_MAINTENANCE,
            FacilityKind::Shipyard => ships::SHIPYARD_MAINTENANCE,
        }
    }
}

/// An installed facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub kind: FacilityKind,
    /// Crippled facilities provide no service until repaired.
    pub crippled: bool,
}

/// What a construction project produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectKind {
    Ship(ShipClass),
    Facility(FacilityKind),
    Industrial { units: u32 },
    Infrastructure,
    GroundBatteries { count: u32 },
    ShieldUpgrade,
}

/// One item in a colony's build pipeline. PP is committed when the
/// project is accepted; `invested_pp` tracks progress for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionProject {
    pub kind: ProjectKind,
    pub total_pp: i64,
    pub invested_pp: i64,
    pub turns_remaining: u32,
}

impl ConstructionProject {
    pub fn new(kind: ProjectKind, total_pp: i64, turns: u32) -> Self {
        Self {
            kind,
            total_pp,
            invested_pp: 0,
            turns_remaining: turns.max(1),
        }
    }
}

/// Active terraforming toward a better planet class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformProject {
    pub target_class: PlanetClass,
    pub turns_remaining: u32,
}

/// Which capacity rule was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapacityKind {
    /// Per-colony fighter basing cap; 2-turn grace, oldest disbanded.
    Fighter,
    /// House-wide squadron total; 2-turn grace, then auto-disband.
    TotalSquadron,
}

/// A tolerated capacity violation awaiting enforcement.
///
/// Only the graced kinds ever get a tracker; capital-squadron and
/// planet-breaker violations are enforced the turn they appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityViolation {
    pub kind: CapacityKind,
    pub turns_remaining: u32,
    /// Turn the violation was first flagged.
    pub violation_turn: u32,
}

/// A settled colony. Keyed by its system; exactly one per system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colony {
    pub system: SystemId,
    pub owner: HouseId,
    /// Economic population units.
    pub population_units: i64,
    /// Raw head count, millions. Display-grade; PU drives the economy.
    pub souls_millions: i64,
    /// 0..=10; bounds PU and unlocks build options.
    pub infrastructure: u8,
    pub industrial_units: i64,
    /// Overrides the house tax rate when set.
    pub tax_override: Option<u32>,
    /// Flagged by the conflict phase; cleared when the blockade lifts.
    pub blockaded: bool,
    /// Fighter squadrons based at the colony (not embarked ones).
    pub fighter_squadrons: Vec<SquadronId>,
    /// Commissioned squadrons awaiting assignment to a fleet.
    pub unassigned_squadrons: Vec<SquadronId>,
    pub facilities: Vec<Facility>,
    /// Active project; the queue trails behind.
    pub construction: Option<ConstructionProject>,
    pub construction_queue: VecDeque<ConstructionProject>,
    pub terraform: Option<TerraformProject>,
    pub fighter_violation: Option<CapacityViolation>,
    /// Gross colony output recorded by the last income phase.
    pub last_production: i64,
    /// Surface defense: batteries fire back during bombardment.
    pub ground_batteries: u32,
    /// Garrisoned ground forces (marine equivalents).
    pub ground_forces: u32,
    /// Installed shield generator level, 0 (none) to 6.
    pub shield_level: u8,
}

impl Colony {
    pub const MAX_INFRASTRUCTURE: u8 = 10;

    pub fn new(system: SystemId, owner: HouseId, population_units: i64) -> Self {
        Self {
            system,
            owner,
            population_units,
            souls_millions: population_units * 10,
            infrastructure: 1,
            industrial_units: 0,
            tax_override: None,
            blockaded: false,
            fighter_squadrons: Vec::new(),
            unassigned_squadrons: Vec::new(),
            facilities: Vec::new(),
            construction: None,
            construction_queue: VecDeque::new(),
            terraform: None,
            fighter_violation: None,
            last_production: 0,
            ground_batteries: 0,
            ground_forces: 0,
            shield_level: 0,
        }
    }

    /// Effective tax rate: colony override or the house-wide rate.
    pub fn tax_rate(&self, house_rate: u32) -> u32 {
        self.tax_override.unwrap_or(house_rate).min(100)
    }

    /// PU ceiling from infrastructure.
    pub fn population_cap(&self) -> i64 {
        i64::from(self.infrastructure) * economy::PU_PER_INFRASTRUCTURE
    }

    pub fn has_facility(&self, kind: FacilityKind) -> bool {
        self.facilities
            .iter()
            .any(|f| f.kind == kind && !f.crippled)
    }

    /// Operational (non-crippled) starbases.
    pub fn active_starbases(&self) -> impl Iterator<Item = &Facility> {
        self.facilities
            .iter()
            .filter(|f| f.kind == FacilityKind::Starbase && !f.crippled)
    }

    /// Max fighter squadrons this colony may base.
    pub fn fighter_cap(&self, fd_level: i32) -> u32 {
        capacity::fighter_cap(self.industrial_units, fd_level)
    }

    /// Fighters counted against the cap: based squadrons plus fighters in
    /// the build pipeline. Embarked fighters count against their
    /// carrier's hangar instead.
    pub fn fighter_load(&self) -> u32 {
        let building = self
            .construction
            .iter()
            .chain(self.construction_queue.iter())
            .filter(|p| matches!(p.kind, ProjectKind::Ship(ShipClass::Fighter)))
            .count() as u32;
        self.fighter_squadrons.len() as u32 + building
    }

    /// Push a project onto the pipeline: the active slot if free,
    /// otherwise the queue.
    pub fn enqueue(&mut self, project: ConstructionProject) {
        if self.construction.is_none() {
            self.construction = Some(project);
        } else {
            self.construction_queue.push_back(project);
        }
    }

    /// Promote the next queued project into the active slot.
    pub fn promote_next(&mut self) {
        if self.construction.is_none() {
            self.construction = self.construction_queue.pop_front();
        }
    }
}
