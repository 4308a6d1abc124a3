//! Standing orders: persistent intent attached to fleets.
//!
//! During the command phase, each idle fleet with a standing order
//! proposes a concrete command. Orders are suspended while an explicit
//! command is active; only fleets with no command participate.

use crate::diplomacy::DiplomaticStance;
use crate::fleet::{CombatState, MissionState, StandingOrder};
use crate::ids::{FleetId, HouseId, SystemId};
use crate::input::{FleetCommand, FleetCommandKind};
use crate::starmap::TravelContext;
use crate::state::GameState;

/// Propose commands for idle fleets with standing orders. Patrol-route
/// indices advance as part of proposal generation.
pub fn generate_commands(state: &mut GameState) -> Vec<FleetCommand> {
    let mut proposals = Vec::new();
    let mut fleet_ids: Vec<FleetId> = state.fleets.keys().copied().collect();
    fleet_ids.sort_unstable();

    for fleet_id in fleet_ids {
        let Some(fleet) = state.fleet(fleet_id) else {
            continue;
        };
        if !fleet.is_idle() || fleet.mission == MissionState::ScoutLocked {
            continue;
        }
        let Some(order) = fleet.standing_order.clone() else {
            continue;
        };

        let proposal = match order {
            StandingOrder::PatrolRoute { systems, next_index } => {
                propose_patrol_route(state, fleet_id, &systems, next_index)
            }
            StandingOrder::DefendSystem { system } => {
                Some(command(fleet_id, FleetCommandKind::Patrol, system))
            }
            StandingOrder::AutoColonize => propose_auto_colonize(state, fleet_id),
            StandingOrder::AutoReinforce => propose_auto_reinforce(state, fleet_id),
            StandingOrder::AutoRepair => propose_auto_repair(state, fleet_id),
            StandingOrder::AutoEvade => propose_auto_evade(state, fleet_id),
            StandingOrder::GuardColony { colony } => {
                Some(command(fleet_id, FleetCommandKind::Patrol, colony))
            }
            StandingOrder::BlockadeTarget { system } => {
                Some(command(fleet_id, FleetCommandKind::Blockade, system))
            }
        };

        if let Some(cmd) = proposal {
            proposals.push(cmd);
        }
    }

    proposals
}

fn command(fleet: FleetId, kind: FleetCommandKind, target: SystemId) -> FleetCommand {
    FleetCommand {
        fleet,
        kind,
        target_system: Some(target),
        target_fleet: None,
        priority: 0,
    }
}

fn propose_patrol_route(
    state: &mut GameState,
    fleet_id: FleetId,
    systems: &[SystemId],
    next_index: usize,
) -> Option<FleetCommand> {
    if systems.is_empty() {
        return None;
    }
    let idx = next_index % systems.len();
    let target = systems[idx];
    // Advance the loop pointer for the next idle turn
    if let Some(fleet) = state.fleet_mut(fleet_id) {
        if let Some(StandingOrder::PatrolRoute { next_index, .. }) = &mut fleet.standing_order {
            *next_index = (idx + 1) % systems.len();
        }
    }
    Some(command(fleet_id, FleetCommandKind::Patrol, target))
}

fn propose_auto_colonize(state: &GameState, fleet_id: FleetId) -> Option<FleetCommand> {
    let fleet = state.fleet(fleet_id)?;
    let carries_ptu = fleet.squadrons.iter().any(|s| {
        state
            .squadron(*s)
            .is_some_and(|sq| matches!(sq.cargo, Some(crate::fleet::Cargo::Ptu(n)) if n > 0))
    });
    if !carries_ptu {
        return None;
    }
    let target = nearest_matching(state, fleet.owner, fleet.location, |state, system| {
        state.colony_at(system).is_none()
            && state.map.systems[&system].planet_class != crate::starmap::PlanetClass::Extreme
    })?;
    Some(command(fleet_id, FleetCommandKind::Colonize, target))
}

fn propose_auto_reinforce(state: &GameState, fleet_id: FleetId) -> Option<FleetCommand> {
    let fleet = state.fleet(fleet_id)?;
    let owner = fleet.owner;
    let threatened = nearest_matching(state, owner, fleet.location, |state, system| {
        state.colony_at(system).is_some_and(|c| c.owner == owner)
            && has_hostile_presence(state, owner, system)
    })?;
    if threatened == fleet.location {
        return Some(command(fleet_id, FleetCommandKind::Patrol, threatened));
    }
    Some(command(fleet_id, FleetCommandKind::Move, threatened))
}

fn propose_auto_repair(state: &GameState, fleet_id: FleetId) -> Option<FleetCommand> {
    let fleet = state.fleet(fleet_id)?;
    let any_crippled = fleet.squadrons.iter().any(|s| {
        state
            .squadron(*s)
            .is_some_and(|sq| sq.state == CombatState::Crippled)
    });
    if !any_crippled {
        return None;
    }
    let owner = fleet.owner;
    let yard = nearest_matching(state, owner, fleet.location, |state, system| {
        state.colony_at(system).is_some_and(|c| {
            c.owner == owner && c.has_facility(crate::colony::FacilityKind::Shipyard)
        })
    })?;
    if yard == fleet.location {
        return None; // already at the yard; maintenance repairs in place
    }
    Some(command(fleet_id, FleetCommandKind::Move, yard))
}

fn propose_auto_evade(state: &GameState, fleet_id: FleetId) -> Option<FleetCommand> {
    let fleet = state.fleet(fleet_id)?;
    let owner = fleet.owner;
    if !has_hostile_presence(state, owner, fleet.location) {
        return None;
    }
    let refuge = nearest_matching(state, owner, fleet.location, |state, system| {
        state.colony_at(system).is_some_and(|c| c.owner == owner)
            && !has_hostile_presence(state, owner, system)
    })?;
    if refuge == fleet.location {
        return None;
    }
    Some(command(fleet_id, FleetCommandKind::Move, refuge))
}

/// Any fleet of a house at Hostile-or-worse standing in the system.
fn has_hostile_presence(state: &GameState, owner: HouseId, system: SystemId) -> bool {
    state.fleets_in_system(system).iter().any(|f| {
        let other = state.fleets[f].owner;
        other != owner
            && (state.diplomacy.stance(other, owner) >= DiplomaticStance::Hostile
                || state.diplomacy.stance(owner, other) >= DiplomaticStance::Hostile)
    })
}

/// Closest system (by jump count from `from`) satisfying the predicate,
/// reachable by the house's fleets. Ties break on the smaller system id.
fn nearest_matching(
    state: &GameState,
    house: HouseId,
    from: SystemId,
    predicate: impl Fn(&GameState, SystemId) -> bool,
) -> Option<SystemId> {
    let fd = state.houses.get(&house)?.tech.get(crate::house::TechField::Fd);
    let context = TravelContext { fd_level: fd, scout_only: false };
    let mut best: Option<(u32, SystemId)> = None;
    let mut ids: Vec<SystemId> = state.map.system_ids().collect();
    ids.sort_unstable();
    for system in ids {
        if !predicate(state, system) {
            continue;
        }
        let Some(route) = state.map.shortest_path(from, system, context) else {
            continue;
        };
        let jumps = (route.len() - 1) as u32;
        if best.map_or(true, |(d, s)| jumps < d || (jumps == d && system < s)) {
            best = Some((jumps, system));
        }
    }
    best.map(|(_, s)| s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{Cargo, ShipClass};
    use crate::testing::GameStateBuilder;

    #[test]
    fn patrol_route_cycles_targets() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Destroyer])
            .build();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        state.fleet_mut(fleet).unwrap().standing_order = Some(StandingOrder::PatrolRoute {
            systems: vec![SystemId(1), SystemId(2)],
            next_index: 0,
        });

        let first = generate_commands(&mut state);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].target_system, Some(SystemId(1)));

        // Still idle (command not committed): next proposal cycles
        let second = generate_commands(&mut state);
        assert_eq!(second[0].target_system, Some(SystemId(2)));
    }

    #[test]
    fn orders_suspended_while_command_active() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Destroyer])
            .build();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        {
            let f = state.fleet_mut(fleet).unwrap();
            f.standing_order = Some(StandingOrder::DefendSystem { system: SystemId(3) });
            f.command = Some(FleetCommand {
                fleet,
                kind: FleetCommandKind::Move,
                target_system: Some(SystemId(5)),
                target_fleet: None,
                priority: 0,
            });
            f.mission = MissionState::Queued;
        }
        assert!(generate_commands(&mut state).is_empty());
    }

    #[test]
    fn auto_colonize_needs_ptu_aboard() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Transport])
            .build();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        state.fleet_mut(fleet).unwrap().standing_order = Some(StandingOrder::AutoColonize);

        assert!(generate_commands(&mut state).is_empty());

        let sid = state.fleets[&fleet].squadrons[0];
        state.squadron_mut(sid).unwrap().cargo = Some(Cargo::Ptu(5));
        let proposals = generate_commands(&mut state);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].kind, FleetCommandKind::Colonize);
    }

    #[test]
    fn blockade_target_issues_blockade() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Cruiser])
            .build();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        state.fleet_mut(fleet).unwrap().standing_order =
            Some(StandingOrder::BlockadeTarget { system: SystemId(4) });
        let proposals = generate_commands(&mut state);
        assert_eq!(proposals[0].kind, FleetCommandKind::Blockade);
        assert_eq!(proposals[0].target_system, Some(SystemId(4)));
    }
}
