//! Research: allocation scaling, PP→RP conversion, level-ups, and the
//! periodic breakthrough roll.

use std::collections::BTreeMap;

use crate::defines::research as defines;
use crate::events::{Event, EventLog};
use crate::house::TechField;
use crate::ids::HouseId;
use crate::input::CommandPacket;
use crate::intel::EffectKind;
use crate::rng::TurnRng;
use crate::state::GameState;

/// Process every house's research allocation, then the breakthrough roll
/// on its cadence.
pub fn run_research(
    state: &mut GameState,
    packets: &BTreeMap<HouseId, CommandPacket>,
    events: &mut EventLog,
    rng: &TurnRng,
) {
    for (&house_id, packet) in packets {
        if packet.research_allocation.is_empty() {
            continue;
        }
        allocate_for_house(state, house_id, &packet.research_allocation, events);
    }

    if state.turn > 0 && state.turn % defines::BREAKTHROUGH_INTERVAL == 0 {
        breakthrough_rolls(state, events, rng);
    }
}

/// Convert 100 PP into RP for a house, given its SL level and scale.
fn rp_per_100pp(sl_level: i32, gho: i64) -> i64 {
    let sl_pct = 100 + defines::SL_BONUS_PCT_PER_LEVEL * sl_level.max(0) as u32;
    let gho_pct = 100 + (gho / defines::GHO_PER_BONUS_PCT).clamp(0, 100);
    defines::BASE_RP_PER_100PP * i64::from(sl_pct) / 100 * gho_pct / 100
}

fn allocate_for_house(
    state: &mut GameState,
    house_id: HouseId,
    allocation: &BTreeMap<TechField, i64>,
    events: &mut EventLog,
) {
    let Some(house) = state.houses.get(&house_id) else {
        return;
    };
    if !house.is_active() {
        return;
    }
    let treasury = house.treasury;
    if treasury <= 0 {
        return;
    }

    // Clamp client-supplied numbers before any arithmetic; a packet is
    // untrusted input
    const MAX_ALLOCATION: i64 = 1_000_000_000;
    let requested: i64 = allocation
        .values()
        .map(|v| (*v).clamp(0, MAX_ALLOCATION))
        .sum();
    if requested == 0 {
        return;
    }

    // Scale proportionally when the request overruns the treasury
    let scale_num = requested.min(treasury);
    let sl = house.tech.get(TechField::Sl);
    let gho: i64 = state
        .colonies_owned_by(house_id)
        .iter()
        .filter_map(|s| state.colony_at(*s))
        .map(|c| c.last_production)
        .sum();
    let conversion = rp_per_100pp(sl, gho);
    let sabotaged = state
        .ongoing_effects
        .iter()
        .any(|e| e.target == house_id && e.kind == EffectKind::ResearchSabotage);

    let mut spent_total = 0i64;
    let mut gains: Vec<(TechField, i64)> = Vec::new();
    for (&field, &raw_pp) in allocation {
        let pp = raw_pp.clamp(0, MAX_ALLOCATION);
        if pp == 0 {
            continue;
        }
        // Widen for the proportional split; totals can brush i64 range
        let spent = (i128::from(pp) * i128::from(scale_num) / i128::from(requested)) as i64;
        if spent == 0 {
            continue;
        }
        spent_total += spent;
        let mut rp = spent * conversion / 100;
        if sabotaged {
            rp = rp * i64::from(100 - crate::defines::espionage::RESEARCH_SABOTAGE_PCT) / 100;
        }
        gains.push((field, rp));
    }

    if let Some(house) = state.houses.get_mut(&house_id) {
        house.treasury -= spent_total;
        for (field, rp) in gains {
            *house.research_points.entry(field).or_insert(0) += rp;
        }
    }
    apply_level_ups(state, house_id, events);
}

/// Spend accumulated RP on level-ups wherever thresholds are met.
fn apply_level_ups(state: &mut GameState, house_id: HouseId, events: &mut EventLog) {
    let turn = state.turn;
    let Some(house) = state.houses.get_mut(&house_id) else {
        return;
    };
    for field in TechField::ALL {
        loop {
            let level = house.tech.get(field);
            let Some(&cost) = defines::LEVEL_COST.get(level.max(0) as usize) else {
                break; // at the cap
            };
            let banked = house.research_points.get(&field).copied().unwrap_or(0);
            if banked < cost {
                break;
            }
            let Some(new_level) = house.tech.raise(field) else {
                break;
            };
            *house.research_points.entry(field).or_insert(0) -= cost;
            events.emit(Event::TechAdvanced {
                turn,
                house: house_id,
                field,
                level: new_level,
            });
            log::info!("house {house_id} advanced {field} to level {new_level}");
        }
    }
}

/// Every few turns each house rolls for a breakthrough: bonus RP in its
/// best-funded field.
fn breakthrough_rolls(state: &mut GameState, events: &mut EventLog, rng: &TurnRng) {
    for house_id in state.active_house_ids() {
        let mut stream = rng.stream("breakthrough", &[u64::from(house_id.0)]);
        if stream.d10() < defines::BREAKTHROUGH_ROLL {
            continue;
        }

        let turn = state.turn;
        let Some(house) = state.houses.get(&house_id) else {
            continue;
        };
        // Best-funded field; ties break in field order
        let field = TechField::ALL
            .iter()
            .copied()
            .max_by_key(|f| {
                (
                    house.research_points.get(f).copied().unwrap_or(0),
                    std::cmp::Reverse(TechField::ALL.iter().position(|x| x == f)),
                )
            })
            .unwrap_or(TechField::El);
        let level = house.tech.get(field);
        let next_cost = defines::LEVEL_COST
            .get(level.max(0) as usize)
            .copied()
            .unwrap_or(0);
        if next_cost == 0 {
            continue; // field already capped
        }
        let bonus = next_cost * i64::from(defines::BREAKTHROUGH_BONUS_PCT) / 100;

        if let Some(house) = state.houses.get_mut(&house_id) {
            *house.research_points.entry(field).or_insert(0) += bonus;
        }
        events.emit(Event::ResearchBreakthrough {
            turn,
            house: house_id,
            field,
            bonus_rp: bonus,
        });
        apply_level_ups(state, house_id, events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SystemId;
    use crate::testing::GameStateBuilder;

    fn packet_with_allocation(house: HouseId, field: TechField, pp: i64) -> CommandPacket {
        let mut packet = CommandPacket::empty(house, 0);
        packet.research_allocation.insert(field, pp);
        packet
    }

    #[test]
    fn allocation_converts_pp_to_rp_and_levels_up() {
        let mut state = GameStateBuilder::new().with_houses(1).build();
        state.houses.get_mut(&HouseId(1)).unwrap().treasury = 500;

        let packets: BTreeMap<HouseId, CommandPacket> =
            [(HouseId(1), packet_with_allocation(HouseId(1), TechField::Wep, 100))]
                .into_iter()
                .collect();
        let mut events = EventLog::new();
        let rng = TurnRng::new(1, 1);
        run_research(&mut state, &packets, &mut events, &rng);

        let house = &state.houses[&HouseId(1)];
        assert_eq!(house.treasury, 400);
        // 100 PP at SL 0, no scale bonus: 100 RP; level 1 costs 50
        assert_eq!(house.tech.get(TechField::Wep), 1);
        assert_eq!(house.research_points[&TechField::Wep], 50);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::TechAdvanced { .. })));
    }

    #[test]
    fn over_allocation_scales_to_treasury() {
        let mut state = GameStateBuilder::new().with_houses(1).build();
        state.houses.get_mut(&HouseId(1)).unwrap().treasury = 60;

        let mut packet = CommandPacket::empty(HouseId(1), 0);
        packet.research_allocation.insert(TechField::El, 100);
        packet.research_allocation.insert(TechField::Sl, 100);
        let packets: BTreeMap<HouseId, CommandPacket> =
            [(HouseId(1), packet)].into_iter().collect();

        let mut events = EventLog::new();
        run_research(&mut state, &packets, &mut events, &TurnRng::new(1, 1));

        let house = &state.houses[&HouseId(1)];
        // 200 requested against 60: each field gets 30
        assert_eq!(house.treasury, 0);
        assert_eq!(house.research_points[&TechField::El], 30);
        assert_eq!(house.research_points[&TechField::Sl], 30);
    }

    #[test]
    fn sl_and_scale_boost_conversion() {
        assert_eq!(rp_per_100pp(0, 0), 100);
        assert_eq!(rp_per_100pp(5, 0), 150);
        // 1000 GHO grants +2%
        assert_eq!(rp_per_100pp(0, 1000), 102);
    }

    #[test]
    fn capped_field_absorbs_no_more_levels() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .build();
        {
            let house = state.houses.get_mut(&HouseId(1)).unwrap();
            house.treasury = 1_000_000;
            house.tech.set(TechField::Wep, 20);
        }
        let packets: BTreeMap<HouseId, CommandPacket> = [(
            HouseId(1),
            packet_with_allocation(HouseId(1), TechField::Wep, 1_000_000),
        )]
        .into_iter()
        .collect();
        let mut events = EventLog::new();
        run_research(&mut state, &packets, &mut events, &TurnRng::new(1, 1));

        assert_eq!(state.houses[&HouseId(1)].tech.get(TechField::Wep), 20);
        assert!(!events
            .events()
            .iter()
            .any(|e| matches!(e, Event::TechAdvanced { .. })));
    }

    #[test]
    fn sabotage_effect_halves_rp() {
        let mut state = GameStateBuilder::new().with_houses(2).build();
        state.houses.get_mut(&HouseId(1)).unwrap().treasury = 100;
        state.ongoing_effects.push(crate::intel::OngoingEffect {
            kind: EffectKind::ResearchSabotage,
            source: HouseId(2),
            target: HouseId(1),
            turns_remaining: 2,
        });

        let packets: BTreeMap<HouseId, CommandPacket> =
            [(HouseId(1), packet_with_allocation(HouseId(1), TechField::El, 100))]
                .into_iter()
                .collect();
        let mut events = EventLog::new();
        run_research(&mut state, &packets, &mut events, &TurnRng::new(1, 1));

        // 100 RP halved to 50, exactly one level (cost 50), nothing banked
        let house = &state.houses[&HouseId(1)];
        assert_eq!(house.tech.get(TechField::El), 1);
        assert_eq!(house.research_points[&TechField::El], 0);
    }
}
