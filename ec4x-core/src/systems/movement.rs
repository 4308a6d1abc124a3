//! Fleet travel and arrival detection.
//!
//! Every fleet with a committed command advances one jump per turn along
//! its precomputed route. When its location reaches the command target it
//! transitions to `Executing` and becomes eligible for conflict-phase
//! execution on the following turn.

use crate::events::{Event, EventLog};
use crate::fleet::MissionState;
use crate::ids::FleetId;
use crate::state::GameState;

/// Advance all Queued/Traveling fleets one jump; arrivals transition to
/// `Executing`.
pub fn run_travel_step(state: &mut GameState, events: &mut EventLog) {
    let mut fleet_ids: Vec<FleetId> = state.fleets.keys().copied().collect();
    fleet_ids.sort_unstable();

    for fleet_id in fleet_ids {
        let Some(fleet) = state.fleet(fleet_id) else {
            continue;
        };
        if !matches!(fleet.mission, MissionState::Queued | MissionState::Traveling) {
            continue;
        }
        let Some(command) = fleet.command else {
            // A queued mission with no command is a stale transition;
            // settle it back to idle
            if let Some(f) = state.fleet_mut(fleet_id) {
                f.clear_command();
            }
            continue;
        };

        let destination = command.destination(fleet.location);
        if fleet.location == destination {
            mark_arrived(state, events, fleet_id);
            continue;
        }

        let Some(next_hop) = fleet.route.first().copied() else {
            // Route exhausted short of the target (lane lost mid-flight);
            // drop the command rather than strand the mission state
            log::debug!("fleet {fleet_id} route exhausted short of target");
            if let Some(f) = state.fleet_mut(fleet_id) {
                f.clear_command();
            }
            continue;
        };

        state.move_fleet(fleet_id, next_hop);
        if let Some(f) = state.fleet_mut(fleet_id) {
            f.route.remove(0);
            f.mission = MissionState::Traveling;
        }

        // Arrived this jump?
        let arrived = state
            .fleet(fleet_id)
            .is_some_and(|f| f.location == destination);
        if arrived {
            mark_arrived(state, events, fleet_id);
        }
    }
}

/// Conflict Phase step 0b: fleets already standing at their command
/// target become `Executing` without a travel step.
pub fn run_arrival_filtering(state: &mut GameState, events: &mut EventLog) {
    let mut fleet_ids: Vec<FleetId> = state.fleets.keys().copied().collect();
    fleet_ids.sort_unstable();

    for fleet_id in fleet_ids {
        let Some(fleet) = state.fleet(fleet_id) else {
            continue;
        };
        if !matches!(fleet.mission, MissionState::Queued | MissionState::Traveling) {
            continue;
        }
        let Some(command) = fleet.command else {
            continue;
        };
        if fleet.location == command.destination(fleet.location) {
            mark_arrived(state, events, fleet_id);
        }
    }
}

fn mark_arrived(state: &mut GameState, events: &mut EventLog, fleet_id: FleetId) {
    let turn = state.turn;
    if let Some(fleet) = state.fleet_mut(fleet_id) {
        fleet.mission = MissionState::Executing;
        fleet.route.clear();
        let system = fleet.location;
        events.emit(Event::FleetArrived {
            turn,
            fleet: fleet_id,
            system,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::ShipClass;
    use crate::ids::{HouseId, SystemId};
    use crate::input::{FleetCommand, FleetCommandKind};
    use crate::starmap::TravelContext;
    use crate::testing::GameStateBuilder;

    fn state_with_fleet() -> (GameState, FleetId) {
        let state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Cruiser])
            .build();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        (state, fleet)
    }

    fn command_to(fleet: FleetId, target: SystemId) -> FleetCommand {
        FleetCommand {
            fleet,
            kind: FleetCommandKind::Move,
            target_system: Some(target),
            target_fleet: None,
            priority: 0,
        }
    }

    #[test]
    fn fleet_advances_one_jump_per_step() {
        let (mut state, fleet_id) = state_with_fleet();
        // Pick a target two jumps away
        let target = state
            .map
            .system_ids()
            .find(|s| state.map.distance(SystemId(0), *s) == Some(2))
            .expect("two-jump system exists");
        let route = state
            .map
            .shortest_path(SystemId(0), target, TravelContext::UNRESTRICTED)
            .unwrap();

        {
            let fleet = state.fleet_mut(fleet_id).unwrap();
            fleet.command = Some(command_to(fleet_id, target));
            fleet.mission = MissionState::Queued;
            fleet.route = route[1..].to_vec();
        }

        let mut events = EventLog::new();
        run_travel_step(&mut state, &mut events);
        let fleet = state.fleet(fleet_id).unwrap();
        assert_eq!(fleet.mission, MissionState::Traveling);
        assert_ne!(fleet.location, SystemId(0));
        assert_ne!(fleet.location, target);

        run_travel_step(&mut state, &mut events);
        let fleet = state.fleet(fleet_id).unwrap();
        assert_eq!(fleet.location, target);
        assert_eq!(fleet.mission, MissionState::Executing);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn move_to_current_system_executes_immediately() {
        let (mut state, fleet_id) = state_with_fleet();
        {
            let fleet = state.fleet_mut(fleet_id).unwrap();
            fleet.command = Some(command_to(fleet_id, SystemId(0)));
            fleet.mission = MissionState::Queued;
        }
        let mut events = EventLog::new();
        run_arrival_filtering(&mut state, &mut events);
        assert_eq!(state.fleet(fleet_id).unwrap().mission, MissionState::Executing);
    }

    #[test]
    fn squadrons_travel_with_their_fleet() {
        let (mut state, fleet_id) = state_with_fleet();
        let neighbor = state.map.adjacent(SystemId(0))[0].0;
        {
            let fleet = state.fleet_mut(fleet_id).unwrap();
            fleet.command = Some(command_to(fleet_id, neighbor));
            fleet.mission = MissionState::Queued;
            fleet.route = vec![neighbor];
        }
        let mut events = EventLog::new();
        run_travel_step(&mut state, &mut events);

        let fleet = state.fleet(fleet_id).unwrap();
        assert_eq!(fleet.location, neighbor);
        for sid in &fleet.squadrons {
            assert_eq!(state.squadron(*sid).unwrap().location, neighbor);
        }
    }
}
