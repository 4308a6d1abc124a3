//! Test fixtures: a builder that assembles valid game states through the
//! same mutation helpers production code uses, so tests cannot start from
//! a state that violates the container invariants.

use crate::colony::Colony;
use crate::fleet::{Fleet, ShipClass, Squadron};
use crate::house::House;
use crate::ids::{FleetId, HouseId, SquadronId, SystemId};
use crate::rng::TurnRng;
use crate::starmap;
use crate::state::GameState;

pub struct GameStateBuilder {
    state: GameState,
}

impl GameStateBuilder {
    /// A fresh state over a deterministic 4-player map (61 systems,
    /// ids 0..=60). Houses are added with [`with_houses`].
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let mut mapgen = TurnRng::new(1, 0).stream("mapgen", &[]);
        let map = starmap::generate(4, &mut mapgen);
        let state = GameState {
            game_id: "test-game".into(),
            rng_seed: 42,
            map,
            ..Default::default()
        };
        Self { state }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.state.rng_seed = seed;
        self
    }

    pub fn turn(mut self, turn: u32) -> Self {
        self.state.turn = turn;
        self
    }

    /// Add `count` houses with ids 1..=count. Houses whose id matches a
    /// generated homeworld are seated there; the rest start at the hub.
    pub fn with_houses(mut self, count: u32) -> Self {
        let homeworlds: std::collections::BTreeMap<HouseId, SystemId> =
            self.state.map.homeworlds().into_iter().collect();
        for i in 1..=count {
            let id = HouseId(i);
            let homeworld = homeworlds.get(&id).copied().unwrap_or(SystemId(0));
            let mut house = House::new(id, format!("House {i}"), 0x111111 * i, homeworld);
            house.treasury = 1_000;
            self.state.add_house(house);
        }
        self
    }

    /// Add a colony with default economy (10 PU, 100 IU, infra 3).
    pub fn with_colony(self, owner: HouseId, system: SystemId) -> Self {
        self.with_colony_full(owner, system, 10, 100, 3)
    }

    pub fn with_colony_full(
        mut self,
        owner: HouseId,
        system: SystemId,
        population_units: i64,
        industrial_units: i64,
        infrastructure: u8,
    ) -> Self {
        let mut colony = Colony::new(system, owner, population_units);
        colony.industrial_units = industrial_units;
        colony.infrastructure = infrastructure;
        self.state.add_colony(colony);
        if let Some(house) = self.state.houses.get_mut(&owner) {
            house.intel.mark_known(system);
        }
        self
    }

    /// Add a fleet of fresh squadrons (one per class given).
    pub fn with_fleet(mut self, owner: HouseId, system: SystemId, classes: &[ShipClass]) -> Self {
        let fleet_id = self.state.allocate_fleet_id();
        let mut fleet = Fleet::new(fleet_id, owner, system);
        for &class in classes {
            let sid = self.state.allocate_squadron_id();
            self.state
                .add_squadron(Squadron::new(sid, owner, class, 0, system));
            fleet.squadrons.push(sid);
        }
        self.state.add_fleet(fleet);
        if let Some(house) = self.state.houses.get_mut(&owner) {
            house.intel.mark_known(system);
        }
        self
    }

    /// Base fighter squadrons at an existing colony.
    pub fn with_fighters_at_colony(mut self, system: SystemId, count: u32) -> Self {
        let owner = self
            .state
            .colony_at(system)
            .map(|c| c.owner)
            .expect("colony must exist before basing fighters");
        for _ in 0..count {
            let sid = self.state.allocate_squadron_id();
            self.state
                .add_squadron(Squadron::new(sid, owner, ShipClass::Fighter, 0, system));
            self.state
                .colony_at_mut(system)
                .expect("colony")
                .fighter_squadrons
                .push(sid);
        }
        self
    }

    /// Park a commissioned squadron in a colony's unassigned pool.
    pub fn with_unassigned_squadron(
        mut self,
        system: SystemId,
        class: ShipClass,
    ) -> Self {
        let owner = self
            .state
            .colony_at(system)
            .map(|c| c.owner)
            .expect("colony must exist before commissioning");
        let sid = self.state.allocate_squadron_id();
        self.state
            .add_squadron(Squadron::new(sid, owner, class, 0, system));
        self.state
            .colony_at_mut(system)
            .expect("colony")
            .unassigned_squadrons
            .push(sid);
        self
    }

    pub fn build(self) -> GameState {
        self.state
    }
}

/// Shorthand: the first fleet a house owns.
pub fn first_fleet(state: &GameState, house: HouseId) -> FleetId {
    state.fleets_owned_by(house)[0]
}

/// Shorthand: the squadrons of a fleet.
pub fn fleet_squadrons(state: &GameState, fleet: FleetId) -> Vec<SquadronId> {
    state.fleet(fleet).map(|f| f.squadrons.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_states_pass_validation() {
        let state = GameStateBuilder::new()
            .with_houses(3)
            .with_colony(HouseId(1), SystemId(10))
            .with_fleet(HouseId(1), SystemId(10), &[ShipClass::Cruiser, ShipClass::Scout])
            .with_fighters_at_colony(SystemId(10), 1)
            .with_unassigned_squadron(SystemId(10), ShipClass::Corvette)
            .build();
        assert!(state.validate().is_ok());
    }

    #[test]
    fn builder_is_deterministic() {
        let a = GameStateBuilder::new().with_houses(2).build();
        let b = GameStateBuilder::new().with_houses(2).build();
        assert_eq!(a, b);
        assert_eq!(a.checksum(), b.checksum());
    }
}
