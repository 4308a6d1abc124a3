//! Per-house turn command packets.
//!
//! Queued commands are collected into a [`CommandPacket`] and submitted
//! before the turn cycle fires; the resolver validates and executes them
//! during the appropriate phase. Administrative zero-turn commands are a
//! separate synchronous call path; see [`crate::zero_turn`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fleet::StandingOrder;
use crate::house::TechField;
use crate::ids::{FleetId, HouseId, SystemId};
use crate::starmap::PlanetClass;

/// How aggressively a command reads to other houses. Drives diplomatic
/// escalation when the command executes in contested space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreatLevel {
    Benign,
    Contest,
    Attack,
}

/// Fleet orders resolved during the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FleetCommandKind {
    /// Travel to the target system and hold.
    Move,
    /// Travel to the target system and engage hostiles found there.
    Patrol,
    /// Interdict the target colony's trade.
    Blockade,
    /// Orbital bombardment of the target colony.
    Bombard,
    /// Ground invasion of the target colony (requires embarked marines).
    Invade,
    /// Bombard and invade in the same turn, at an invasion penalty.
    Blitz,
    /// Establish a colony at the target system (requires PTU aboard).
    Colonize,
    /// Detach the fleet's scouts into a spy mission over the target system.
    SpySystem,
    /// Spy mission against the target colony.
    SpyColony,
    /// Spy mission against the target colony's starbases.
    SpyStarbase,
    /// Recover wreckage at the target system into PP.
    Salvage,
}

impl FleetCommandKind {
    /// Threat tier used by combat detection and diplomatic escalation.
    pub fn threat_level(self) -> ThreatLevel {
        match self {
            FleetCommandKind::Move | FleetCommandKind::Colonize | FleetCommandKind::Salvage => {
                ThreatLevel::Benign
            }
            FleetCommandKind::Patrol
            | FleetCommandKind::Blockade
            | FleetCommandKind::SpySystem
            | FleetCommandKind::SpyColony
            | FleetCommandKind::SpyStarbase => ThreatLevel::Contest,
            FleetCommandKind::Bombard | FleetCommandKind::Invade | FleetCommandKind::Blitz => {
                ThreatLevel::Attack
            }
        }
    }

    /// Spy commands consume the fleet's scouts when execution begins.
    pub fn is_spy(self) -> bool {
        matches!(
            self,
            FleetCommandKind::SpySystem
                | FleetCommandKind::SpyColony
                | FleetCommandKind::SpyStarbase
        )
    }
}

/// One fleet order inside a command packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetCommand {
    pub fleet: FleetId,
    pub kind: FleetCommandKind,
    pub target_system: Option<SystemId>,
    pub target_fleet: Option<FleetId>,
    /// Tie-break when several commands address one fleet: highest wins,
    /// then packet order.
    pub priority: u8,
}

impl FleetCommand {
    /// The system the fleet must reach for the command to execute.
    /// Commands without a target execute where the fleet stands.
    pub fn destination(&self, current: SystemId) -> SystemId {
        self.target_system.unwrap_or(current)
    }
}

/// Construction orders for a colony's build queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildCommand {
    Ship {
        colony: SystemId,
        class: crate::fleet::ShipClass,
    },
    Facility {
        colony: SystemId,
        kind: crate::colony::FacilityKind,
    },
    Industrial {
        colony: SystemId,
        units: u32,
    },
    Infrastructure {
        colony: SystemId,
    },
    GroundBatteries {
        colony: SystemId,
        count: u32,
    },
    /// Raise the colony's shield generator one level (SLD tech gated).
    ShieldUpgrade {
        colony: SystemId,
    },
}

/// Diplomatic actions submitted with the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiplomaticCommand {
    ProposeNonAggression { to: HouseId },
    AcceptProposal { from: HouseId },
    RejectProposal { from: HouseId },
    /// Unilateral stance change toward another house.
    DeclareHostile { to: HouseId },
    DeclareEnemy { to: HouseId },
    /// Stand down from Hostile back to Neutral.
    OfferTruce { to: HouseId },
}

/// Move PU between two colonies (loaded as PTU on an available transport
/// fleet automatically is out of scope; transfers are instantaneous
/// between owned colonies on a connected route).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationTransfer {
    pub from: SystemId,
    pub to: SystemId,
    pub population_units: i64,
}

/// Begin or continue terraforming a colony toward a better planet class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformCommand {
    pub colony: SystemId,
    pub target_class: PlanetClass,
}

/// Per-colony settings adjusted with the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColonyManagement {
    SetTaxRate { colony: SystemId, rate: u32 },
    ClearTaxRate { colony: SystemId },
}

/// Attach or clear a fleet's standing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandingCommand {
    Set { fleet: FleetId, order: StandingOrder },
    Clear { fleet: FleetId },
}

/// EBP-funded covert action against another house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EspionageAction {
    /// Drain the target's research output for a few turns.
    SabotageResearch { target: HouseId },
    /// Cut the target's net colony value for a few turns.
    DisruptTrade { target: HouseId },
    /// Cripple a starbase at the target colony.
    SabotageStarbase { colony: SystemId },
    /// Poison the target's intelligence database.
    CorruptIntel { target: HouseId },
}

/// Everything one house submits for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CommandPacket {
    pub house: HouseId,
    pub turn: u32,
    /// The treasury the client believed it had; logged when it disagrees
    /// with ground truth (stale client state).
    pub treasury_snapshot: i64,
    pub fleet_commands: Vec<FleetCommand>,
    pub build_commands: Vec<BuildCommand>,
    /// PP allocated to research, per field. Scaled down proportionally
    /// if the total exceeds the treasury.
    pub research_allocation: BTreeMap<TechField, i64>,
    pub diplomatic_commands: Vec<DiplomaticCommand>,
    pub population_transfers: Vec<PopulationTransfer>,
    pub terraform_commands: Vec<TerraformCommand>,
    pub colony_management: Vec<ColonyManagement>,
    pub standing_commands: Vec<StandingCommand>,
    pub espionage_action: Option<EspionageAction>,
    /// PP to convert into espionage budget points this turn.
    pub ebp_investment: i64,
    /// PP to convert into counter-intelligence points this turn.
    pub cip_investment: i64,
}

impl CommandPacket {
    pub fn empty(house: HouseId, turn: u32) -> Self {
        Self {
            house,
            turn,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threat_levels_partition_command_kinds() {
        assert_eq!(FleetCommandKind::Move.threat_level(), ThreatLevel::Benign);
        assert_eq!(FleetCommandKind::Blockade.threat_level(), ThreatLevel::Contest);
        assert_eq!(FleetCommandKind::Bombard.threat_level(), ThreatLevel::Attack);
        assert!(ThreatLevel::Benign < ThreatLevel::Attack);
    }

    #[test]
    fn spy_kinds_flagged() {
        assert!(FleetCommandKind::SpyColony.is_spy());
        assert!(!FleetCommandKind::Patrol.is_spy());
    }

    #[test]
    fn destination_defaults_to_current() {
        let cmd = FleetCommand {
            fleet: FleetId(1),
            kind: FleetCommandKind::Salvage,
            target_system: None,
            target_fleet: None,
            priority: 0,
        };
        assert_eq!(cmd.destination(SystemId(9)), SystemId(9));
    }
}
