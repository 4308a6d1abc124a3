//! Colonization attempts (Conflict Phase step 5).

use crate::defines::colonization as defines;
use crate::events::{Event, EventLog, PrestigeReason};
use crate::fleet::{Cargo, MissionState};
use crate::ids::FleetId;
use crate::input::FleetCommandKind;
use crate::state::GameState;

/// Execute every `Colonize` command whose fleet has arrived.
///
/// The fleet must carry enough PTU; the target system must be
/// uncolonized. Failures drop the command with a rejection event and the
/// turn continues.
pub fn run_colonization(state: &mut GameState, events: &mut EventLog) {
    let mut fleet_ids: Vec<FleetId> = state.fleets.keys().copied().collect();
    fleet_ids.sort_unstable();

    for fleet_id in fleet_ids {
        let Some(fleet) = state.fleet(fleet_id) else {
            continue;
        };
        if fleet.mission != MissionState::Executing {
            continue;
        }
        let Some(command) = fleet.command else {
            continue;
        };
        if command.kind != FleetCommandKind::Colonize {
            continue;
        }

        let system = fleet.location;
        let owner = fleet.owner;
        let turn = state.turn;

        if state.colony_at(system).is_some() {
            events.emit(Event::CommandRejected {
                turn,
                house: owner,
                fleet: Some(fleet_id),
                reason: format!("system {system} is already colonized"),
            });
            if let Some(f) = state.fleet_mut(fleet_id) {
                f.clear_command();
            }
            continue;
        }

        // ACO tech discounts the landing requirement
        let aco = state
            .houses
            .get(&owner)
            .map(|h| h.tech.get(crate::house::TechField::Aco))
            .unwrap_or(0);
        let required = defines::ptu_required(aco);

        // Gather PTU aboard the fleet
        let squadron_ids = fleet.squadrons.clone();
        let mut available: u32 = 0;
        for sid in &squadron_ids {
            if let Some(Cargo::Ptu(n)) = state.squadron(*sid).and_then(|s| s.cargo) {
                available += n;
            }
        }
        if available < required {
            events.emit(Event::CommandRejected {
                turn,
                house: owner,
                fleet: Some(fleet_id),
                reason: format!("colonization needs {required} PTU, fleet carries {available}"),
            });
            if let Some(f) = state.fleet_mut(fleet_id) {
                f.clear_command();
            }
            continue;
        }

        // Consume PTU, lowest squadron id first
        let mut to_consume = required;
        for sid in &squadron_ids {
            if to_consume == 0 {
                break;
            }
            let Some(Cargo::Ptu(n)) = state.squadron(*sid).and_then(|s| s.cargo) else {
                continue;
            };
            let used = n.min(to_consume);
            to_consume -= used;
            if let Some(squadron) = state.squadron_mut(*sid) {
                let rest = n - used;
                squadron.cargo = if rest > 0 { Some(Cargo::Ptu(rest)) } else { None };
            }
        }

        let mut colony =
            crate::colony::Colony::new(system, owner, i64::from(required) * defines::PU_PER_PTU);
        colony.infrastructure = defines::INITIAL_INFRASTRUCTURE;
        state.add_colony(colony);

        state.award_prestige(
            owner,
            crate::defines::prestige::COLONY_ESTABLISHED,
            PrestigeReason::ColonyEstablished,
        );
        events.emit(Event::ColonyEstablished { turn, system, house: owner });
        if let Some(house) = state.houses.get_mut(&owner) {
            house.intel.mark_known(system);
        }
        if let Some(f) = state.fleet_mut(fleet_id) {
            f.mission = MissionState::Completed;
        }
        log::info!("house {owner} established a colony at system {system}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::ShipClass;
    use crate::ids::{HouseId, SystemId};
    use crate::input::FleetCommand;
    use crate::testing::GameStateBuilder;

    fn colonize_setup(ptu: u32) -> (GameState, FleetId) {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(5), &[ShipClass::Transport, ShipClass::Corvette])
            .build();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        let transport = state.fleets[&fleet].squadrons[0];
        if ptu > 0 {
            state.squadron_mut(transport).unwrap().cargo = Some(Cargo::Ptu(ptu));
        }
        {
            let f = state.fleet_mut(fleet).unwrap();
            f.command = Some(FleetCommand {
                fleet,
                kind: FleetCommandKind::Colonize,
                target_system: Some(SystemId(5)),
                target_fleet: None,
                priority: 0,
            });
            f.mission = MissionState::Executing;
        }
        (state, fleet)
    }

    #[test]
    fn colonize_consumes_ptu_and_creates_colony() {
        let (mut state, _fleet) = colonize_setup(8);
        let mut events = EventLog::new();
        run_colonization(&mut state, &mut events);

        let colony = state.colony_at(SystemId(5)).expect("colony created");
        assert_eq!(colony.owner, HouseId(1));
        assert_eq!(
            colony.population_units,
            i64::from(defines::PTU_PER_COLONY) * defines::PU_PER_PTU
        );
        // 8 - 5 = 3 PTU remain aboard
        let remaining: u32 = state
            .squadrons
            .values()
            .filter_map(|s| match s.cargo {
                Some(Cargo::Ptu(n)) => Some(n),
                _ => None,
            })
            .sum();
        assert_eq!(remaining, 3);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::ColonyEstablished { .. })));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn insufficient_ptu_rejects_without_mutation() {
        let (mut state, fleet) = colonize_setup(2);
        let mut events = EventLog::new();
        run_colonization(&mut state, &mut events);

        assert!(state.colony_at(SystemId(5)).is_none());
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::CommandRejected { .. })));
        // Cargo untouched, command dropped
        assert!(state.fleet(fleet).unwrap().command.is_none());
        let remaining: u32 = state
            .squadrons
            .values()
            .filter_map(|s| match s.cargo {
                Some(Cargo::Ptu(n)) => Some(n),
                _ => None,
            })
            .sum();
        assert_eq!(remaining, 2);
    }

    #[test]
    fn occupied_system_rejects_colonization() {
        let (mut state, fleet) = colonize_setup(8);
        // Someone already lives here
        state.add_colony(crate::colony::Colony::new(SystemId(5), HouseId(1), 4));
        let mut events = EventLog::new();
        run_colonization(&mut state, &mut events);

        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::CommandRejected { .. })));
        assert!(state.fleet(fleet).unwrap().command.is_none());
    }
}
