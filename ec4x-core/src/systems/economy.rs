//! The income phase: production, blockade, maintenance, salvage,
//! capacity enforcement, prestige, elimination, victory, timers.
//!
//! Steps run in the fixed order of [`run_income_phase`]; treasuries are
//! written once, in step 8, from totals the earlier steps accumulate.

use std::collections::BTreeMap;

use crate::colony::{CapacityKind, CapacityViolation};
use crate::config::GameConfig;
use crate::defines::{capacity, economy as defines, prestige};
use crate::events::{DisbandReason, Event, EventLog, PrestigeReason};
use crate::fleet::{MissionState, ShipClass};
use crate::house::TechField;
use crate::ids::{HouseId, SquadronId, SystemId};
use crate::input::{CommandPacket, FleetCommandKind};
use crate::intel::EffectKind;
use crate::rng::TurnRng;
use crate::state::GameState;

/// Run income-phase steps 1–12 in order.
pub fn run_income_phase(
    state: &mut GameState,
    packets: &BTreeMap<HouseId, CommandPacket>,
    events: &mut EventLog,
    rng: &TurnRng,
    config: &GameConfig,
) {
    let mut income: BTreeMap<HouseId, i64> = state
        .active_house_ids()
        .into_iter()
        .map(|h| (h, 0i64))
        .collect();

    tick_ongoing_effects(state); // 1
    purchase_espionage_points(state, packets); // 2
    let mut gco = base_production(state); // 3
    apply_blockades(state, &mut gco); // 4
    accumulate_net_value(state, &gco, &mut income);
    deduct_maintenance(state, &mut income, events); // 5
    execute_salvage(state, &mut income, events); // 6
    enforce_capacity(state, events, config); // 7
    apply_resources(state, &income, &gco, events); // 8
    crate::systems::research::run_research(state, packets, events, rng);
    apply_prestige(state, events); // 9
    crate::systems::victory::run_elimination_checks(state, events, config); // 10
    crate::systems::victory::run_victory_check(state, events, config); // 11
    advance_timers(state); // 12
}

// ============================================================================
// Step 1: Ongoing Effects
// ============================================================================

/// Decrement espionage-effect counters; expired effects clean up after
/// themselves (a sabotaged starbase comes back online).
fn tick_ongoing_effects(state: &mut GameState) {
    let mut expired_starbases: Vec<SystemId> = Vec::new();
    for effect in &mut state.ongoing_effects {
        effect.turns_remaining = effect.turns_remaining.saturating_sub(1);
        if effect.turns_remaining == 0 {
            if let EffectKind::StarbaseCrippled(colony) = effect.kind {
                expired_starbases.push(colony);
            }
        }
    }
    state.ongoing_effects.retain(|e| e.turns_remaining > 0);

    for colony_id in expired_starbases {
        // Only repair sabotage damage, and only when no other active
        // effect holds the base down
        let still_held = state
            .ongoing_effects
            .iter()
            .any(|e| e.kind == EffectKind::StarbaseCrippled(colony_id));
        if still_held {
            continue;
        }
        if let Some(colony) = state.colony_at_mut(colony_id) {
            if let Some(facility) = colony
                .facilities
                .iter_mut()
                .find(|f| f.kind == crate::colony::FacilityKind::Starbase && f.crippled)
            {
                facility.crippled = false;
            }
        }
    }
}

// ============================================================================
// Step 2: EBP / CIP Purchase
// ============================================================================

fn purchase_espionage_points(state: &mut GameState, packets: &BTreeMap<HouseId, CommandPacket>) {
    for (&house_id, packet) in packets {
        let invest = packet.ebp_investment.max(0) + packet.cip_investment.max(0);
        if invest == 0 {
            continue;
        }
        let Some(house) = state.houses.get(&house_id) else {
            continue;
        };
        if !house.is_active() || house.treasury <= 0 {
            continue;
        }

        let budget = house.treasury;
        let ebp_points = (packet.ebp_investment.max(0) / defines::ESPIONAGE_POINT_COST)
            .min(budget / defines::ESPIONAGE_POINT_COST);
        let remaining = budget - ebp_points * defines::ESPIONAGE_POINT_COST;
        let cip_points = (packet.cip_investment.max(0) / defines::ESPIONAGE_POINT_COST)
            .min(remaining / defines::ESPIONAGE_POINT_COST);
        let spend = (ebp_points + cip_points) * defines::ESPIONAGE_POINT_COST;
        if spend == 0 {
            continue;
        }

        let over_pct = (spend * 100 / budget) - i64::from(defines::ESPIONAGE_BUDGET_PCT);
        if over_pct > 0 {
            let penalty = prestige::ESPIONAGE_OVERINVEST_PER_PCT * over_pct as i32;
            state.award_prestige(house_id, penalty, PrestigeReason::EspionageOverinvestment);
            log::debug!(
                "house {house_id} over-invested espionage by {over_pct}%: {penalty} prestige"
            );
        }

        if let Some(house) = state.houses.get_mut(&house_id) {
            house.treasury -= spend;
            house.ebp += ebp_points;
            house.cip += cip_points;
        }
    }
}

// ============================================================================
// Steps 3–4: Production and Blockade
// ============================================================================

/// Gross colony output. Pure function of the colony, its system, and the
/// owner's EL tech. A colony at zero population produces nothing.
pub fn colony_gco(state: &GameState, system: SystemId) -> i64 {
    let Some(colony) = state.colony_at(system) else {
        return 0;
    };
    if colony.population_units == 0 {
        return 0;
    }
    let Some(sys) = state.map.get(system) else {
        return 0;
    };
    let el = state
        .houses
        .get(&colony.owner)
        .map(|h| h.tech.get(TechField::El))
        .unwrap_or(0);

    let pu_out = colony.population_units * defines::PU_OUTPUT;
    let iu_out = colony.industrial_units
        * defines::IU_OUTPUT
        * i64::from(sys.resource_rating.output_pct())
        / 100;
    let base = (pu_out + iu_out) * i64::from(sys.planet_class.output_pct()) / 100;
    base * i64::from(100 + defines::EL_BONUS_PCT_PER_LEVEL * el.max(0) as u32) / 100
}

fn base_production(state: &GameState) -> BTreeMap<SystemId, i64> {
    let mut gco = BTreeMap::new();
    let mut colony_ids: Vec<SystemId> = state.colonies.keys().copied().collect();
    colony_ids.sort_unstable();
    for system in colony_ids {
        gco.insert(system, colony_gco(state, system));
    }
    gco
}

/// Blockaded colonies lose output this turn, no delay, and cost their
/// house prestige.
fn apply_blockades(state: &mut GameState, gco: &mut BTreeMap<SystemId, i64>) {
    let blockaded: Vec<(SystemId, HouseId)> = gco
        .keys()
        .filter_map(|s| {
            let colony = state.colony_at(*s)?;
            colony.blockaded.then_some((*s, colony.owner))
        })
        .collect();
    for (system, owner) in blockaded {
        if let Some(value) = gco.get_mut(&system) {
            *value = *value * i64::from(100 - defines::BLOCKADE_GCO_REDUCTION_PCT) / 100;
        }
        state.award_prestige(owner, prestige::BLOCKADED_COLONY, PrestigeReason::Blockade);
    }
}

/// Convert per-colony GCO into net house income at the effective tax
/// rate, minus any active trade-disruption effect.
fn accumulate_net_value(
    state: &GameState,
    gco: &BTreeMap<SystemId, i64>,
    income: &mut BTreeMap<HouseId, i64>,
) {
    for (&system, &output) in gco {
        let Some(colony) = state.colony_at(system) else {
            continue;
        };
        let Some(house) = state.houses.get(&colony.owner) else {
            continue;
        };
        let rate = colony.tax_rate(house.tax_policy.rate);
        let mut ncv = output * i64::from(rate) / 100;
        let disrupted = state
            .ongoing_effects
            .iter()
            .any(|e| e.target == colony.owner && e.kind == EffectKind::TradeDisruption);
        if disrupted {
            ncv = ncv * i64::from(100 - crate::defines::espionage::TRADE_DISRUPTION_PCT) / 100;
        }
        *income.entry(colony.owner).or_insert(0) += ncv;
    }
}

// ============================================================================
// Step 5: Maintenance
// ============================================================================

fn deduct_maintenance(
    state: &GameState,
    income: &mut BTreeMap<HouseId, i64>,
    _events: &mut EventLog,
) {
    for house_id in state.active_house_ids() {
        let mut upkeep = 0i64;
        for squadron in state.squadrons.values() {
            if squadron.owner == house_id {
                upkeep += squadron.flagship.stats().maintenance;
            }
        }
        for system in state.colonies_owned_by(house_id) {
            if let Some(colony) = state.colony_at(system) {
                for facility in &colony.facilities {
                    upkeep += facility.kind.maintenance();
                }
            }
        }
        *income.entry(house_id).or_insert(0) -= upkeep;
    }
}

// ============================================================================
// Step 6: Salvage
// ============================================================================

/// Fleets executing a Salvage order over wreckage convert it to PP. The
/// order completes here, in Income, not in the command phase.
fn execute_salvage(
    state: &mut GameState,
    income: &mut BTreeMap<HouseId, i64>,
    events: &mut EventLog,
) {
    let mut fleet_ids: Vec<_> = state.fleets.keys().copied().collect();
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
        if command.kind != FleetCommandKind::Salvage {
            continue;
        }

        let system = fleet.location;
        let owner = fleet.owner;
        let recovered = state.wreckage.get(&system).copied().unwrap_or(0);
        if recovered > 0 {
            state.wreckage.remove(&system);
            *income.entry(owner).or_insert(0) += recovered;
            events.emit(Event::SalvageRecovered {
                turn: state.turn,
                house: owner,
                system,
                recovered_pp: recovered,
            });
        }
        if let Some(f) = state.fleet_mut(fleet_id) {
            f.clear_command();
        }
    }
}

// ============================================================================
// Step 7: Capacity Enforcement
// ============================================================================

fn enforce_capacity(state: &mut GameState, events: &mut EventLog, config: &GameConfig) {
    enforce_capital_limits(state, events);
    enforce_planet_breaker_limits(state, events);
    enforce_total_limits(state, events, config);
    enforce_fighter_limits(state, events, config);
}

fn capital_cap(state: &GameState, house: HouseId) -> u32 {
    let colonies = state.colonies_owned_by(house).len() as u32;
    let cst = state
        .houses
        .get(&house)
        .map(|h| h.tech.get(TechField::Cst).max(0) as u32)
        .unwrap_or(0);
    colonies * capacity::CAPITAL_PER_COLONY + cst * capacity::CAPITAL_PER_CST_LEVEL
}

fn total_cap(state: &GameState, house: HouseId) -> u32 {
    let colonies = state.colonies_owned_by(house).len() as u32;
    let cst = state
        .houses
        .get(&house)
        .map(|h| h.tech.get(TechField::Cst).max(0) as u32)
        .unwrap_or(0);
    colonies * capacity::TOTAL_PER_COLONY + cst * capacity::TOTAL_PER_CST_LEVEL
}

fn planet_breaker_cap(state: &GameState, house: HouseId) -> u32 {
    let colonies = state.colonies_owned_by(house).len() as u32;
    if colonies == 0 {
        return 0;
    }
    (colonies / capacity::COLONIES_PER_PLANET_BREAKER).max(1)
}

/// Capital squadrons over the limit are seized by the Space Guild the
/// turn the violation appears. No grace.
fn enforce_capital_limits(state: &mut GameState, events: &mut EventLog) {
    for house_id in state.active_house_ids() {
        let cap = capital_cap(state, house_id);
        let mut capitals: Vec<SquadronId> = state
            .squadrons
            .values()
            .filter(|s| s.owner == house_id && s.flagship.is_capital())
            .map(|s| s.id)
            .collect();
        if capitals.len() as u32 <= cap {
            continue;
        }
        capitals.sort_unstable();
        let excess = capitals.len() - cap as usize;
        let turn = state.turn;
        // Newest hulls go first
        for sid in capitals.into_iter().rev().take(excess) {
            let class = state.squadron(sid).map(|s| s.flagship);
            disband_with_fighters(state, sid);
            if let Some(class) = class {
                events.emit(Event::SquadronDisbanded {
                    turn,
                    squadron: sid,
                    owner: house_id,
                    class,
                    reason: DisbandReason::CapitalSeizure,
                });
            }
        }
    }
}

/// Planet-breakers enforce immediately as well.
fn enforce_planet_breaker_limits(state: &mut GameState, events: &mut EventLog) {
    for house_id in state.active_house_ids() {
        let cap = planet_breaker_cap(state, house_id);
        let mut breakers: Vec<SquadronId> = state
            .squadrons
            .values()
            .filter(|s| s.owner == house_id && s.flagship == ShipClass::PlanetBreaker)
            .map(|s| s.id)
            .collect();
        if breakers.len() as u32 <= cap {
            continue;
        }
        breakers.sort_unstable();
        let excess = breakers.len() - cap as usize;
        let turn = state.turn;
        for sid in breakers.into_iter().rev().take(excess) {
            disband_with_fighters(state, sid);
            events.emit(Event::SquadronDisbanded {
                turn,
                squadron: sid,
                owner: house_id,
                class: ShipClass::PlanetBreaker,
                reason: DisbandReason::PlanetBreakerLimit,
            });
        }
    }
}

/// Total squadron count gets the grace period, then auto-disband.
fn enforce_total_limits(state: &mut GameState, events: &mut EventLog, config: &GameConfig) {
    for house_id in state.active_house_ids() {
        let cap = total_cap(state, house_id);
        let count = state.squadron_count(house_id);
        let turn = state.turn;

        let violation = state.houses.get(&house_id).and_then(|h| h.squadron_violation);
        match violation {
            None if count > cap => {
                if let Some(house) = state.houses.get_mut(&house_id) {
                    house.squadron_violation = Some(CapacityViolation {
                        kind: CapacityKind::TotalSquadron,
                        turns_remaining: config.capacity_grace_turns,
                        violation_turn: turn,
                    });
                }
                events.emit(Event::CapacityViolationFlagged {
                    turn,
                    house: house_id,
                    colony: None,
                    kind: CapacityKind::TotalSquadron,
                    grace_turns: config.capacity_grace_turns,
                });
            }
            Some(_) if count <= cap => {
                // Violation resolved on its own
                if let Some(house) = state.houses.get_mut(&house_id) {
                    house.squadron_violation = None;
                }
            }
            Some(mut v) => {
                v.turns_remaining = v.turns_remaining.saturating_sub(1);
                if v.turns_remaining > 0 {
                    if let Some(house) = state.houses.get_mut(&house_id) {
                        house.squadron_violation = Some(v);
                    }
                    continue;
                }
                // Grace expired: disband newest squadrons down to the cap
                let mut owned: Vec<SquadronId> = state
                    .squadrons
                    .values()
                    .filter(|s| s.owner == house_id)
                    .map(|s| s.id)
                    .collect();
                owned.sort_unstable();
                let excess = owned.len().saturating_sub(cap as usize);
                for sid in owned.into_iter().rev().take(excess) {
                    let class = state.squadron(sid).map(|s| s.flagship);
                    disband_with_fighters(state, sid);
                    if let Some(class) = class {
                        events.emit(Event::SquadronDisbanded {
                            turn,
                            squadron: sid,
                            owner: house_id,
                            class,
                            reason: DisbandReason::TotalSquadronCapacity,
                        });
                    }
                }
                if let Some(house) = state.houses.get_mut(&house_id) {
                    house.squadron_violation = None;
                }
            }
            None => {}
        }
    }
}

/// Fighters at a colony get the grace period; enforcement disbands the
/// oldest squadrons first.
fn enforce_fighter_limits(state: &mut GameState, events: &mut EventLog, config: &GameConfig) {
    let mut colony_ids: Vec<SystemId> = state.colonies.keys().copied().collect();
    colony_ids.sort_unstable();

    for system in colony_ids {
        let colony = &state.colonies[&system];
        let owner = colony.owner;
        let fd = state
            .houses
            .get(&owner)
            .map(|h| h.tech.get(TechField::Fd))
            .unwrap_or(0);
        let cap = colony.fighter_cap(fd);
        let load = colony.fighter_load();
        let violation = colony.fighter_violation;
        let turn = state.turn;

        match violation {
            None if load > cap => {
                if let Some(c) = state.colony_at_mut(system) {
                    c.fighter_violation = Some(CapacityViolation {
                        kind: CapacityKind::Fighter,
                        turns_remaining: config.capacity_grace_turns,
                        violation_turn: turn,
                    });
                }
                events.emit(Event::CapacityViolationFlagged {
                    turn,
                    house: owner,
                    colony: Some(system),
                    kind: CapacityKind::Fighter,
                    grace_turns: config.capacity_grace_turns,
                });
            }
            Some(_) if load <= cap => {
                if let Some(c) = state.colony_at_mut(system) {
                    c.fighter_violation = None;
                }
            }
            Some(mut v) => {
                v.turns_remaining = v.turns_remaining.saturating_sub(1);
                if v.turns_remaining > 0 {
                    if let Some(c) = state.colony_at_mut(system) {
                        c.fighter_violation = Some(v);
                    }
                    continue;
                }
                // Oldest first: lowest squadron ids
                let mut based = state.colonies[&system].fighter_squadrons.clone();
                based.sort_unstable();
                let mut remaining_load = load;
                for sid in based {
                    if remaining_load <= cap {
                        break;
                    }
                    disband_with_fighters(state, sid);
                    remaining_load -= 1;
                    events.emit(Event::SquadronDisbanded {
                        turn,
                        squadron: sid,
                        owner,
                        class: ShipClass::Fighter,
                        reason: DisbandReason::FighterCapacity,
                    });
                }
                if let Some(c) = state.colony_at_mut(system) {
                    c.fighter_violation =
                        if remaining_load > cap {
                            // Pipeline fighters still push past the cap;
                            // keep the tracker armed
                            Some(CapacityViolation {
                                kind: CapacityKind::Fighter,
                                turns_remaining: config.capacity_grace_turns,
                                violation_turn: turn,
                            })
                        } else {
                            None
                        };
                }
            }
            None => {}
        }
    }
}

/// Remove a squadron and any fighters embarked on it.
fn disband_with_fighters(state: &mut GameState, sid: SquadronId) {
    let embarked = state
        .squadron(sid)
        .map(|s| s.embarked_fighters.clone())
        .unwrap_or_default();
    for fid in embarked {
        state.remove_squadron(fid);
    }
    state.remove_squadron(sid);
}

// ============================================================================
// Step 8: Resource Application
// ============================================================================

fn apply_resources(
    state: &mut GameState,
    income: &BTreeMap<HouseId, i64>,
    gco: &BTreeMap<SystemId, i64>,
    events: &mut EventLog,
) {
    for (&system, &output) in gco {
        if let Some(colony) = state.colony_at_mut(system) {
            colony.last_production = output;
        }
    }

    for (&house_id, &net) in income {
        let turn = state.turn;
        let Some(house) = state.houses.get_mut(&house_id) else {
            continue;
        };
        let before = house.treasury;
        // The debt floor is a hard rule: a house can owe, but not
        // unboundedly
        house.treasury = (before + net).max(-9_999);
        if house.treasury < 0 && net < 0 {
            let owed = -(before + net).min(0);
            events.emit(Event::MaintenanceShortfall {
                turn,
                house: house_id,
                owed_pp: owed,
            });
            state.award_prestige(
                house_id,
                prestige::MAINTENANCE_SHORTFALL,
                PrestigeReason::MaintenanceShortfall,
            );
        }
    }
}

// ============================================================================
// Step 9: Prestige Application
// ============================================================================

fn apply_prestige(state: &mut GameState, events: &mut EventLog) {
    // Tax-policy prestige joins the queue first
    for house_id in state.active_house_ids() {
        let Some(house) = state.houses.get(&house_id) else {
            continue;
        };
        let tier = prestige::tax_tier(house.tax_policy.rate);
        let trailing_average_high = house.tax_policy.trailing_average() > 80;
        if tier != 0 {
            state.award_prestige(house_id, tier, PrestigeReason::TaxTier);
        }
        if trailing_average_high {
            state.award_prestige(
                house_id,
                prestige::SUSTAINED_HIGH_TAX,
                PrestigeReason::SustainedHighTax,
            );
        }
    }

    let awards = std::mem::take(&mut state.pending_prestige);
    let turn = state.turn;
    for award in awards {
        let Some(house) = state.houses.get_mut(&award.house) else {
            continue;
        };
        let applied = house.prestige.add(award.delta);
        let new_value = house.prestige.get();
        if applied != 0 {
            events.emit(Event::PrestigeChanged {
                turn,
                house: award.house,
                delta: applied,
                reason: award.reason,
                new_value,
            });
        }
    }
}

// ============================================================================
// Step 12: Timers
// ============================================================================

fn advance_timers(state: &mut GameState) {
    state.diplomacy.advance_timers();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GameStateBuilder;

    #[test]
    fn gco_scales_with_class_and_rating() {
        let state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony_full(HouseId(1), SystemId(10), 10, 100, 3)
            .build();
        let gco = colony_gco(&state, SystemId(10));
        let sys = state.map.get(SystemId(10)).unwrap();
        let expected_base = (10 * defines::PU_OUTPUT
            + 100 * defines::IU_OUTPUT * i64::from(sys.resource_rating.output_pct()) / 100)
            * i64::from(sys.planet_class.output_pct())
            / 100;
        assert_eq!(gco, expected_base);
    }

    #[test]
    fn zero_population_colony_produces_nothing() {
        let state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony_full(HouseId(1), SystemId(10), 0, 500, 5)
            .build();
        assert_eq!(colony_gco(&state, SystemId(10)), 0);
    }

    #[test]
    fn blockade_halves_output_and_costs_prestige() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .build();
        state.colony_at_mut(SystemId(10)).unwrap().blockaded = true;

        let mut gco = base_production(&state);
        let before = gco[&SystemId(10)];
        apply_blockades(&mut state, &mut gco);
        assert_eq!(
            gco[&SystemId(10)],
            before * i64::from(100 - defines::BLOCKADE_GCO_REDUCTION_PCT) / 100
        );
        assert!(state
            .pending_prestige
            .iter()
            .any(|a| a.reason == PrestigeReason::Blockade && a.delta == prestige::BLOCKADED_COLONY));
    }

    #[test]
    fn fighter_grace_counts_down_then_disbands_oldest() {
        // IU 100 at FD 0 allows one fighter; three are based
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony_full(HouseId(1), SystemId(10), 10, 100, 3)
            .with_fighters_at_colony(SystemId(10), 3)
            .build();
        let config = GameConfig::default();
        let mut events = EventLog::new();

        // Turn N: flagged, grace 2
        enforce_fighter_limits(&mut state, &mut events, &config);
        let v = state.colony_at(SystemId(10)).unwrap().fighter_violation.unwrap();
        assert_eq!(v.turns_remaining, 2);
        assert_eq!(state.colony_at(SystemId(10)).unwrap().fighter_squadrons.len(), 3);

        // Turn N+1: grace 1
        enforce_fighter_limits(&mut state, &mut events, &config);
        let v = state.colony_at(SystemId(10)).unwrap().fighter_violation.unwrap();
        assert_eq!(v.turns_remaining, 1);

        // Turn N+2: two oldest disbanded, tracker cleared
        enforce_fighter_limits(&mut state, &mut events, &config);
        let colony = state.colony_at(SystemId(10)).unwrap();
        assert_eq!(colony.fighter_squadrons.len(), 1);
        assert!(colony.fighter_violation.is_none());
        let disbanded: Vec<_> = events
            .events()
            .iter()
            .filter(|e| matches!(e, Event::SquadronDisbanded { .. }))
            .collect();
        assert_eq!(disbanded.len(), 2);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn capital_violation_seizes_immediately() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(
                HouseId(1),
                SystemId(0),
                &[ShipClass::Battleship, ShipClass::Dreadnought, ShipClass::Carrier],
            )
            .build();
        // No colonies, CST 0: capital cap is zero
        let mut events = EventLog::new();
        enforce_capital_limits(&mut state, &mut events);

        assert_eq!(state.capital_squadron_count(HouseId(1)), 0);
        let seizures = events
            .events()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Event::SquadronDisbanded { reason: DisbandReason::CapitalSeizure, .. }
                )
            })
            .count();
        assert_eq!(seizures, 3);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn maintenance_shortfall_floors_treasury() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Dreadnought])
            .build();
        state.houses.get_mut(&HouseId(1)).unwrap().treasury = -9_990;

        let mut income = BTreeMap::new();
        let mut events = EventLog::new();
        deduct_maintenance(&state, &mut income, &mut events);
        apply_resources(&mut state, &income, &BTreeMap::new(), &mut events);

        let house = &state.houses[&HouseId(1)];
        assert_eq!(house.treasury, -9_999);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::MaintenanceShortfall { .. })));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn salvage_converts_wreckage_in_income() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(4), &[ShipClass::Destroyer])
            .build();
        state.add_wreckage(SystemId(4), 150);
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        {
            let f = state.fleet_mut(fleet).unwrap();
            f.command = Some(crate::input::FleetCommand {
                fleet,
                kind: FleetCommandKind::Salvage,
                target_system: Some(SystemId(4)),
                target_fleet: None,
                priority: 0,
            });
            f.mission = MissionState::Executing;
        }

        let mut income = BTreeMap::new();
        let mut events = EventLog::new();
        execute_salvage(&mut state, &mut income, &mut events);

        assert_eq!(income.get(&HouseId(1)).copied(), Some(150));
        assert!(state.wreckage.get(&SystemId(4)).is_none());
        assert_eq!(state.fleet(fleet).unwrap().mission, MissionState::Idle);
    }

    #[test]
    fn zero_sum_prestige_nets_to_zero() {
        let mut state = GameStateBuilder::new().with_houses(2).build();
        state.award_prestige(HouseId(1), 30, PrestigeReason::ColonySeizedGain);
        state.award_prestige(HouseId(2), -30, PrestigeReason::ColonySeizedLoss);

        let zero_sum: i32 = state
            .pending_prestige
            .iter()
            .filter(|a| a.reason.is_zero_sum())
            .map(|a| a.delta)
            .sum();
        assert_eq!(zero_sum, 0);

        let mut events = EventLog::new();
        apply_prestige(&mut state, &mut events);
        assert_eq!(state.houses[&HouseId(1)].prestige.get(), 30);
        assert_eq!(state.houses[&HouseId(2)].prestige.get(), -30);
    }
}
