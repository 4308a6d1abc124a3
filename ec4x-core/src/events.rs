//! Structured events emitted by every subsystem during resolution.
//!
//! The log is append-only and ordered by cause: an event is pushed at the
//! moment its operation commits. Serialized as JSONL via serde's tag
//! format:
//!
//! ```json
//! {"type":"colony_seized","turn":12,"system":7,"from":2,"to":1}
//! ```

use serde::{Deserialize, Serialize};

use crate::colony::CapacityKind;
use crate::fleet::ShipClass;
use crate::house::TechField;
use crate::ids::{FleetId, HouseId, SpyScoutId, SquadronId, SystemId};
use crate::starmap::PlanetClass;

/// Why a house's prestige moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrestigeReason {
    ColonyEstablished,
    /// Zero-sum pair: attacker gain mirrors defender loss.
    ColonySeizedGain,
    ColonySeizedLoss,
    CombatVictory,
    HouseEliminated,
    Blockade,
    TaxTier,
    SustainedHighTax,
    MaintenanceShortfall,
    EspionageOverinvestment,
    ScoutIncident,
    PactViolation,
}

impl PrestigeReason {
    /// Zero-sum reasons must net to zero across all houses each turn.
    pub fn is_zero_sum(self) -> bool {
        matches!(
            self,
            PrestigeReason::ColonySeizedGain | PrestigeReason::ColonySeizedLoss
        )
    }
}

/// Combat theater a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theater {
    Space,
    Orbital,
    Blockade,
    Planetary,
}

/// Why a squadron ceased to exist outside combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbandReason {
    FighterCapacity,
    TotalSquadronCapacity,
    /// Space-Guild seizure of an over-limit capital squadron.
    CapitalSeizure,
    PlanetBreakerLimit,
    /// Spacelift hull destroyed after losing its escorts.
    EscortsLost,
}

/// Every observable state change in a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A combat theater resolved in some system.
    CombatReport {
        turn: u32,
        system: SystemId,
        theater: Theater,
        attackers: Vec<HouseId>,
        defenders: Vec<HouseId>,
        rounds: u32,
        attacker_squadrons_lost: u32,
        defender_squadrons_lost: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        victor: Option<HouseId>,
    },

    SquadronDisbanded {
        turn: u32,
        squadron: SquadronId,
        owner: HouseId,
        class: ShipClass,
        reason: DisbandReason,
    },

    SquadronCommissioned {
        turn: u32,
        colony: SystemId,
        squadron: SquadronId,
        class: ShipClass,
    },

    HouseEliminated {
        turn: u32,
        house: HouseId,
        #[serde(skip_serializing_if = "Option::is_none")]
        eliminator: Option<HouseId>,
    },

    /// Prestige collapsed; the elimination countdown started.
    HouseCollapsed { turn: u32, house: HouseId },

    ConstructionCompleted {
        turn: u32,
        colony: SystemId,
        item: String,
    },

    PrestigeChanged {
        turn: u32,
        house: HouseId,
        delta: i32,
        reason: PrestigeReason,
        new_value: i32,
    },

    IntelGathered {
        turn: u32,
        house: HouseId,
        subject: SystemId,
        kind: String,
        quality_pct: u32,
    },

    ColonyEstablished {
        turn: u32,
        system: SystemId,
        house: HouseId,
    },

    ColonySeized {
        turn: u32,
        system: SystemId,
        from: HouseId,
        to: HouseId,
    },

    /// A submitted command was refused; carried back to the player.
    CommandRejected {
        turn: u32,
        house: HouseId,
        #[serde(skip_serializing_if = "Option::is_none")]
        fleet: Option<FleetId>,
        reason: String,
    },

    BlockadeEstablished {
        turn: u32,
        system: SystemId,
        by: HouseId,
    },

    BlockadeLifted { turn: u32, system: SystemId },

    ScoutDestroyed {
        turn: u32,
        scout: SpyScoutId,
        owner: HouseId,
        system: SystemId,
    },

    DiplomaticIncident {
        turn: u32,
        house: HouseId,
        against: HouseId,
        description: String,
    },

    StanceChanged {
        turn: u32,
        from: HouseId,
        to: HouseId,
        stance: crate::diplomacy::DiplomaticStance,
    },

    TechAdvanced {
        turn: u32,
        house: HouseId,
        field: TechField,
        level: i32,
    },

    ResearchBreakthrough {
        turn: u32,
        house: HouseId,
        field: TechField,
        bonus_rp: i64,
    },

    VictoryAchieved {
        turn: u32,
        house: HouseId,
        condition: String,
    },

    CapacityViolationFlagged {
        turn: u32,
        house: HouseId,
        #[serde(skip_serializing_if = "Option::is_none")]
        colony: Option<SystemId>,
        kind: CapacityKind,
        grace_turns: u32,
    },

    SalvageRecovered {
        turn: u32,
        house: HouseId,
        system: SystemId,
        recovered_pp: i64,
    },

    TerraformCompleted {
        turn: u32,
        colony: SystemId,
        new_class: PlanetClass,
    },

    FleetRetreated {
        turn: u32,
        fleet: FleetId,
        from: SystemId,
        to: SystemId,
    },

    FleetArrived {
        turn: u32,
        fleet: FleetId,
        system: SystemId,
    },

    MaintenanceShortfall {
        turn: u32,
        house: HouseId,
        owed_pp: i64,
    },

    SquadronRepaired {
        turn: u32,
        squadron: SquadronId,
        colony: SystemId,
    },

    EspionageEffect {
        turn: u32,
        source: HouseId,
        target: HouseId,
        description: String,
    },

    /// Closing marker with the post-resolution checksum.
    TurnResolved { turn: u32, checksum: u64 },
}

/// Append-only event log for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        log::debug!("event: {event:?}");
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drain the log, leaving it empty. The resolver hands the drained
    /// batch to the caller at the end of the turn.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Write the log as JSONL.
    pub fn write_jsonl<W: std::io::Write>(&self, mut writer: W) -> std::io::Result<()> {
        for event in &self.events {
            let line = serde_json::to_string(event)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event::ColonySeized {
            turn: 12,
            system: SystemId(7),
            from: HouseId(2),
            to: HouseId(1),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"colony_seized\""));
        assert!(json.contains("\"turn\":12"));
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn log_preserves_emission_order() {
        let mut log = EventLog::new();
        log.emit(Event::BlockadeLifted { turn: 1, system: SystemId(1) });
        log.emit(Event::BlockadeLifted { turn: 2, system: SystemId(2) });
        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Event::BlockadeLifted { turn: 1, .. }));
        assert!(log.is_empty());
    }

    #[test]
    fn jsonl_output_is_line_per_event() {
        let mut log = EventLog::new();
        log.emit(Event::TurnResolved { turn: 3, checksum: 99 });
        log.emit(Event::BlockadeLifted { turn: 3, system: SystemId(4) });
        let mut buf = Vec::new();
        log.write_jsonl(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn zero_sum_reasons_identified() {
        assert!(PrestigeReason::ColonySeizedGain.is_zero_sum());
        assert!(PrestigeReason::ColonySeizedLoss.is_zero_sum());
        assert!(!PrestigeReason::TaxTier.is_zero_sum());
    }
}
