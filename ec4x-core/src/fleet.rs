//! Fleets, squadrons, and the per-fleet mission state machine.

use serde::{Deserialize, Serialize};

use crate::defines::ships::{self, ShipStats};
use crate::ids::{FleetId, HouseId, SquadronId, SystemId};
use crate::input::FleetCommand;

/// Hull classes. Squadrons differ by flagship class but share one
/// operational contract (attack/defense/state), so class is a tagged
/// variant over a common stats block rather than a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShipClass {
    Scout,
    Corvette,
    Destroyer,
    Cruiser,
    Battleship,
    Dreadnought,
    Carrier,
    Fighter,
    Transport,
    PlanetBreaker,
}

impl ShipClass {
    /// The static stat block for this class.
    pub fn stats(self) -> ShipStats {
        ships::stats(self)
    }

    pub fn is_capital(self) -> bool {
        self.stats().is_capital
    }

    pub fn is_spacelift(self) -> bool {
        self.stats().is_spacelift
    }
}

impl std::fmt::Display for ShipClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShipClass::Scout => "scout",
            ShipClass::Corvette => "corvette",
            ShipClass::Destroyer => "destroyer",
            ShipClass::Cruiser => "cruiser",
            ShipClass::Battleship => "battleship",
            ShipClass::Dreadnought => "dreadnought",
            ShipClass::Carrier => "carrier",
            ShipClass::Fighter => "fighter",
            ShipClass::Transport => "transport",
            ShipClass::PlanetBreaker => "planet-breaker",
        };
        f.write_str(name)
    }
}

/// Combat damage state of a squadron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CombatState {
    #[default]
    Undamaged,
    Crippled,
    Destroyed,
}

/// Cargo carried by a spacelift squadron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cargo {
    /// Ground assault troops.
    Marines(u32),
    /// Civilian settlers (not yet organized for colonization).
    Colonists(u32),
    /// Population transfer units ready to land.
    Ptu(u32),
}

impl Cargo {
    pub fn units(&self) -> u32 {
        match *self {
            Cargo::Marines(n) | Cargo::Colonists(n) | Cargo::Ptu(n) => n,
        }
    }
}

/// A squadron: one flagship hull plus escorts, fighting as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Squadron {
    pub id: SquadronId,
    pub owner: HouseId,
    pub flagship: ShipClass,
    /// WEP level at commissioning; fixed for the squadron's life.
    pub tech_level: i32,
    pub location: SystemId,
    pub state: CombatState,
    /// Fighter squadrons embarked in the hangar (carriers only). Embarked
    /// fighters count against hangar capacity, never the colony cap.
    pub embarked_fighters: Vec<SquadronId>,
    pub cargo: Option<Cargo>,
}

impl Squadron {
    pub fn new(id: SquadronId, owner: HouseId, flagship: ShipClass, tech_level: i32, location: SystemId) -> Self {
        Self {
            id,
            owner,
            flagship,
            tech_level,
            location,
            state: CombatState::Undamaged,
            embarked_fighters: Vec::new(),
            cargo: None,
        }
    }

    /// Effective attack strength: class base, WEP bonus, halved when
    /// crippled, zero when destroyed.
    pub fn attack_strength(&self) -> i64 {
        if self.state == CombatState::Destroyed {
            return 0;
        }
        let base = self.flagship.stats().attack;
        let teched =
            base * i64::from(100 + ships::WEP_BONUS_PCT_PER_LEVEL * self.tech_level.max(0) as u32)
                / 100;
        match self.state {
            CombatState::Undamaged => teched,
            CombatState::Crippled => {
                teched * i64::from(crate::defines::combat::CRIPPLED_AS_PCT) / 100
            }
            CombatState::Destroyed => 0,
        }
    }

    /// Hits absorbed before the next state transition.
    pub fn defense_strength(&self) -> i64 {
        self.flagship.stats().defense
    }

    pub fn hangar_capacity(&self) -> u32 {
        self.flagship.stats().hangar
    }

    pub fn hangar_free(&self) -> u32 {
        self.hangar_capacity()
            .saturating_sub(self.embarked_fighters.len() as u32)
    }

    pub fn is_crippled(&self) -> bool {
        self.state == CombatState::Crippled
    }

    pub fn carries_marines(&self) -> bool {
        matches!(self.cargo, Some(Cargo::Marines(n)) if n > 0)
    }
}

/// Where a fleet is in its command's lifecycle.
///
/// ```text
/// Idle -> Queued -> Traveling -> Executing -> Completed -> Idle
///                  Traveling -> Queued       (cancel / override)
///                  Executing -> ScoutLocked  (scouts only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MissionState {
    #[default]
    Idle,
    Queued,
    Traveling,
    Executing,
    Completed,
    /// The fleet's scouts were consumed into a spy mission; the shell
    /// fleet is retired by the resolver.
    ScoutLocked,
}

/// Persistent intent attached to a fleet. Standing orders generate
/// concrete commands for fleets with no active explicit command and are
/// suspended while one is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandingOrder {
    /// Loop a route of systems, patrolling each in turn.
    PatrolRoute { systems: Vec<SystemId>, next_index: usize },
    /// Hold position in a system, engaging hostiles.
    DefendSystem { system: SystemId },
    /// Colonize the nearest eligible system when carrying PTU.
    AutoColonize,
    /// Move to the owner's nearest colony under threat.
    AutoReinforce,
    /// Return to the nearest friendly shipyard when any squadron is
    /// crippled.
    AutoRepair,
    /// Withdraw to the nearest friendly system when hostiles arrive.
    AutoEvade,
    /// Remain at a colony and join its orbital defense.
    GuardColony { colony: SystemId },
    /// Maintain a blockade over the target system.
    BlockadeTarget { system: SystemId },
}

/// A fleet: an ordered list of squadrons with a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    pub id: FleetId,
    pub owner: HouseId,
    pub location: SystemId,
    /// Squadron membership, in formation order.
    pub squadrons: Vec<SquadronId>,
    pub mission: MissionState,
    pub command: Option<FleetCommand>,
    pub standing_order: Option<StandingOrder>,
    /// Remaining route to the command target (front = next jump).
    pub route: Vec<SystemId>,
}

impl Fleet {
    pub fn new(id: FleetId, owner: HouseId, location: SystemId) -> Self {
        Self {
            id,
            owner,
            location,
            squadrons: Vec::new(),
            mission: MissionState::Idle,
            command: None,
            standing_order: None,
            route: Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.mission == MissionState::Idle && self.command.is_none()
    }

    /// Drop the current command and return to idle. Standing orders
    /// resume on the next command phase.
    pub fn clear_command(&mut self) {
        self.command = None;
        self.route.clear();
        self.mission = MissionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crippled_squadron_fights_at_half_strength() {
        let mut s = Squadron::new(SquadronId(1), HouseId(1), ShipClass::Cruiser, 0, SystemId(0));
        let full = s.attack_strength();
        s.state = CombatState::Crippled;
        assert_eq!(s.attack_strength(), full / 2);
        s.state = CombatState::Destroyed;
        assert_eq!(s.attack_strength(), 0);
    }

    #[test]
    fn wep_tech_scales_attack() {
        let s0 = Squadron::new(SquadronId(1), HouseId(1), ShipClass::Destroyer, 0, SystemId(0));
        let s3 = Squadron::new(SquadronId(2), HouseId(1), ShipClass::Destroyer, 3, SystemId(0));
        assert_eq!(s3.attack_strength(), s0.attack_strength() * 130 / 100);
    }

    #[test]
    fn carrier_hangar_accounting() {
        let mut c = Squadron::new(SquadronId(1), HouseId(1), ShipClass::Carrier, 0, SystemId(0));
        assert_eq!(c.hangar_free(), 4);
        c.embarked_fighters.push(SquadronId(2));
        c.embarked_fighters.push(SquadronId(3));
        assert_eq!(c.hangar_free(), 2);
    }

    #[test]
    fn max_tech_attack_does_not_overflow() {
        let s = Squadron::new(SquadronId(1), HouseId(1), ShipClass::Dreadnought, 20, SystemId(0));
        // WEP 20 = ×3.0; well inside i64
        assert_eq!(s.attack_strength(), 36 * 300 / 100);
    }
}
