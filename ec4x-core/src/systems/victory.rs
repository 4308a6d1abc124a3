//! Elimination, defensive collapse, and victory checks
//! (Income Phase steps 10–11).

use crate::config::GameConfig;
use crate::events::{Event, EventLog};
use crate::house::HouseStatus;
use crate::ids::{HouseId, SpyScoutId};
use crate::state::GameState;

/// Step 10: a house with no colonies and no invasion capability is out;
/// sustained prestige collapse also eliminates.
pub fn run_elimination_checks(state: &mut GameState, events: &mut EventLog, config: &GameConfig) {
    for house_id in state.active_house_ids() {
        let colonies = state.colonies_owned_by(house_id);
        let fleets = state.fleets_owned_by(house_id);

        if colonies.is_empty() {
            let can_invade = fleets.iter().any(|f| {
                state.fleets[f].squadrons.iter().any(|s| {
                    state.squadron(*s).is_some_and(|sq| sq.carries_marines())
                })
            });
            if !can_invade {
                eliminate_house(state, events, house_id, None);
                continue;
            }
        }

        let turn = state.turn;
        let Some(house) = state.houses.get_mut(&house_id) else {
            continue;
        };
        if house.prestige.get() < config.collapse_prestige {
            house.collapse_turns += 1;
            let newly_collapsed = house.status == HouseStatus::Active;
            if newly_collapsed {
                house.status = HouseStatus::DefensiveCollapse;
            }
            let expired = house.collapse_turns >= config.collapse_turns;
            if newly_collapsed {
                events.emit(Event::HouseCollapsed { turn, house: house_id });
            }
            if expired {
                eliminate_house(state, events, house_id, None);
            }
        } else if house.status == HouseStatus::DefensiveCollapse {
            // Recovered before the countdown ran out
            house.collapse_turns = 0;
            house.status = HouseStatus::Active;
        }
    }
}

/// Remove a house from play: every asset it owns is torn down, then the
/// elimination event closes its record.
fn eliminate_house(
    state: &mut GameState,
    events: &mut EventLog,
    house_id: HouseId,
    eliminator: Option<HouseId>,
) {
    // Colonies and everything based at them
    for system in state.colonies_owned_by(house_id) {
        let (fighters, unassigned) = state
            .colony_at(system)
            .map(|c| (c.fighter_squadrons.clone(), c.unassigned_squadrons.clone()))
            .unwrap_or_default();
        for sid in fighters.into_iter().chain(unassigned) {
            let embarked = state
                .squadron(sid)
                .map(|s| s.embarked_fighters.clone())
                .unwrap_or_default();
            for fid in embarked {
                state.remove_squadron(fid);
            }
            state.remove_squadron(sid);
        }
        state.remove_colony(system);
    }

    // Fleets and their squadrons
    for fleet_id in state.fleets_owned_by(house_id) {
        let squadrons = state
            .fleet(fleet_id)
            .map(|f| f.squadrons.clone())
            .unwrap_or_default();
        for sid in squadrons {
            let embarked = state
                .squadron(sid)
                .map(|s| s.embarked_fighters.clone())
                .unwrap_or_default();
            for fid in embarked {
                state.remove_squadron(fid);
            }
            state.remove_squadron(sid);
        }
        state.remove_fleet(fleet_id);
    }

    // In-flight scout missions stand down with their house
    let scout_ids: Vec<SpyScoutId> = state
        .spy_scouts
        .values()
        .filter(|s| s.owner == house_id)
        .map(|s| s.id)
        .collect();
    for sid in scout_ids {
        state.spy_scouts.remove(&sid);
    }

    let turn = state.turn;
    if let Some(house) = state.houses.get_mut(&house_id) {
        house.eliminate();
    }
    events.emit(Event::HouseEliminated {
        turn,
        house: house_id,
        eliminator,
    });
    log::info!("house {house_id} eliminated");
}

/// Step 11: prestige threshold, last house standing, or turn limit.
pub fn run_victory_check(state: &mut GameState, events: &mut EventLog, config: &GameConfig) {
    if state.winner.is_some() {
        return;
    }

    let active = state.active_house_ids();
    let turn = state.turn;

    // Prestige victory: first (lowest-id) house at the threshold
    for &house_id in &active {
        if state.houses[&house_id].prestige.get() >= config.victory_prestige {
            declare_winner(state, events, house_id, "prestige threshold");
            return;
        }
    }

    // Last house standing
    if active.len() == 1 {
        declare_winner(state, events, active[0], "last house standing");
        return;
    }

    // Turn limit: highest prestige wins, ties to the lowest id
    if config.turn_limit > 0 && turn >= config.turn_limit && !active.is_empty() {
        let winner = active
            .iter()
            .copied()
            .max_by_key(|h| (state.houses[h].prestige.get(), std::cmp::Reverse(h.0)))
            .expect("non-empty active list");
        declare_winner(state, events, winner, "turn limit reached");
    }
}

fn declare_winner(
    state: &mut GameState,
    events: &mut EventLog,
    house: HouseId,
    condition: &str,
) {
    state.winner = Some(house);
    let turn = state.turn;
    events.emit(Event::VictoryAchieved {
        turn,
        house,
        condition: condition.to_string(),
    });
    log::info!("house {house} wins: {condition}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{Cargo, ShipClass};
    use crate::ids::SystemId;
    use crate::testing::GameStateBuilder;

    #[test]
    fn houseless_house_is_eliminated() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(2), SystemId(10))
            .build();
        let config = GameConfig::default();
        let mut events = EventLog::new();
        run_elimination_checks(&mut state, &mut events, &config);

        assert!(state.houses[&HouseId(1)].eliminated);
        assert!(!state.houses[&HouseId(2)].eliminated);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn marine_fleet_postpones_elimination() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(2), SystemId(10))
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Transport])
            .build();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        let sid = state.fleets[&fleet].squadrons[0];
        state.squadron_mut(sid).unwrap().cargo = Some(Cargo::Marines(5));

        let config = GameConfig::default();
        let mut events = EventLog::new();
        run_elimination_checks(&mut state, &mut events, &config);

        // The marines keep the house in the game
        assert!(!state.houses[&HouseId(1)].eliminated);
    }

    #[test]
    fn collapse_countdown_eliminates_after_grace() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(1), SystemId(10))
            .with_colony(HouseId(2), SystemId(11))
            .build();
        state
            .houses
            .get_mut(&HouseId(1))
            .unwrap()
            .prestige
            .set(-500);
        let config = GameConfig::default();
        let mut events = EventLog::new();

        for i in 1..=config.collapse_turns {
            run_elimination_checks(&mut state, &mut events, &config);
            if i < config.collapse_turns {
                let house = &state.houses[&HouseId(1)];
                assert_eq!(house.status, crate::house::HouseStatus::DefensiveCollapse);
                assert!(!house.eliminated);
            }
        }
        assert!(state.houses[&HouseId(1)].eliminated);
        assert!(state.colonies_owned_by(HouseId(1)).is_empty());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn recovery_resets_collapse_countdown() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(1), SystemId(10))
            .with_colony(HouseId(2), SystemId(11))
            .build();
        state.houses.get_mut(&HouseId(1)).unwrap().prestige.set(-500);
        let config = GameConfig::default();
        let mut events = EventLog::new();

        run_elimination_checks(&mut state, &mut events, &config);
        assert_eq!(state.houses[&HouseId(1)].collapse_turns, 1);

        state.houses.get_mut(&HouseId(1)).unwrap().prestige.set(0);
        run_elimination_checks(&mut state, &mut events, &config);
        let house = &state.houses[&HouseId(1)];
        assert_eq!(house.collapse_turns, 0);
        assert_eq!(house.status, crate::house::HouseStatus::Active);
    }

    #[test]
    fn last_house_standing_wins() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(2), SystemId(10))
            .build();
        let config = GameConfig::default();
        let mut events = EventLog::new();
        run_elimination_checks(&mut state, &mut events, &config);
        run_victory_check(&mut state, &mut events, &config);

        assert_eq!(state.winner, Some(HouseId(2)));
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::VictoryAchieved { .. })));
    }

    #[test]
    fn prestige_threshold_wins() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(1), SystemId(10))
            .with_colony(HouseId(2), SystemId(11))
            .build();
        state
            .houses
            .get_mut(&HouseId(2))
            .unwrap()
            .prestige
            .set(5_000);
        let config = GameConfig::default();
        let mut events = EventLog::new();
        run_victory_check(&mut state, &mut events, &config);
        assert_eq!(state.winner, Some(HouseId(2)));

        // A declared winner is final
        state.houses.get_mut(&HouseId(1)).unwrap().prestige.set(9_000);
        run_victory_check(&mut state, &mut events, &config);
        assert_eq!(state.winner, Some(HouseId(2)));
    }
}
