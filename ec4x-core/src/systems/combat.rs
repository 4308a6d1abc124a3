//! Combat resolution: the per-system theater orchestrator.
//!
//! Theaters progress Space → Orbital → Blockade → Planetary. Each yields
//! to the next only when its termination condition is met: one side
//! destroyed or retreated, or the configured round limit reached.
//!
//! Every dice roll draws from a stream keyed by (system, engagement
//! index, round, side) so replays reproduce identical outcomes.

use crate::config::GameConfig;
use crate::defines::{cer, combat as defines, shields, ships};
use crate::diplomacy::DiplomaticStance;
use crate::events::{DisbandReason, Event, EventLog, PrestigeReason, Theater};
use crate::fleet::{Cargo, CombatState, MissionState, ShipClass};
use crate::ids::{FleetId, HouseId, SquadronId, SystemId};
use crate::input::{FleetCommandKind, ThreatLevel};
use crate::rng::TurnRng;
use crate::starmap::TravelContext;
use crate::state::GameState;

// ============================================================================
// Main Entry Point
// ============================================================================

/// Detect and resolve combat in every system, ascending by system id.
pub fn run_conflict_combat(
    state: &mut GameState,
    events: &mut EventLog,
    rng: &TurnRng,
    config: &GameConfig,
) {
    let mut system_ids: Vec<SystemId> = state.map.system_ids().collect();
    system_ids.sort_unstable();

    for system in system_ids {
        let pairs = combat_pairs(state, system);
        for (engagement_idx, (attacker, defender)) in pairs.into_iter().enumerate() {
            // Earlier engagements may have emptied a side
            if !has_presence(state, attacker, system) && state.colony_at(system).map(|c| c.owner) != Some(attacker) {
                continue;
            }
            log::info!(
                "combat at system {system}: house {attacker} engages house {defender}"
            );
            resolve_engagement(
                state,
                events,
                rng,
                config,
                system,
                engagement_idx as u64,
                attacker,
                defender,
            );
        }
    }
}

// ============================================================================
// Combat Detection
// ============================================================================

/// Hostile pairs at a system, ordered (attacker, defender).
///
/// Combat triggers when two houses are present and:
/// - either sees the other as Enemy, or
/// - either sees the other as Hostile and has a Contest/Attack command
///   executing in-system, or
/// - one has an Attack-tier command executing at the other's colony.
fn combat_pairs(state: &GameState, system: SystemId) -> Vec<(HouseId, HouseId)> {
    let houses = state.houses_in_system(system);
    if houses.len() < 2 {
        return Vec::new();
    }

    let colony_owner = state.colony_at(system).map(|c| c.owner);
    let mut pairs = Vec::new();

    for i in 0..houses.len() {
        for j in (i + 1)..houses.len() {
            let (a, b) = (houses[i], houses[j]);
            let threat_a = executing_threat(state, a, system);
            let threat_b = executing_threat(state, b, system);
            let stance_ab = state.diplomacy.stance(a, b);
            let stance_ba = state.diplomacy.stance(b, a);

            let enemy = stance_ab == DiplomaticStance::Enemy || stance_ba == DiplomaticStance::Enemy;
            let hostile_contest = (stance_ab == DiplomaticStance::Hostile
                && threat_a >= Some(ThreatLevel::Contest))
                || (stance_ba == DiplomaticStance::Hostile
                    && threat_b >= Some(ThreatLevel::Contest));
            let attack_on_colony = (colony_owner == Some(b)
                && threat_a == Some(ThreatLevel::Attack))
                || (colony_owner == Some(a) && threat_b == Some(ThreatLevel::Attack));

            if !(enemy || hostile_contest || attack_on_colony) {
                continue;
            }

            // Attacker: the side pressing the higher-threat command;
            // ties break to the smaller house id
            let attacker_is_b = threat_b > threat_a;
            if attacker_is_b {
                pairs.push((b, a));
            } else {
                pairs.push((a, b));
            }
        }
    }

    pairs
}

/// Highest threat level among the house's commands executing in-system.
fn executing_threat(state: &GameState, house: HouseId, system: SystemId) -> Option<ThreatLevel> {
    state
        .fleets_in_system(system)
        .iter()
        .filter_map(|f| {
            let fleet = state.fleets.get(f)?;
            if fleet.owner != house || fleet.mission != MissionState::Executing {
                return None;
            }
            Some(fleet.command?.kind.threat_level())
        })
        .max()
}

fn has_presence(state: &GameState, house: HouseId, system: SystemId) -> bool {
    state
        .fleets_in_system(system)
        .iter()
        .any(|f| state.fleets[f].owner == house)
}

// ============================================================================
// Engagement Orchestration
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn resolve_engagement(
    state: &mut GameState,
    events: &mut EventLog,
    rng: &TurnRng,
    config: &GameConfig,
    system: SystemId,
    engagement: u64,
    attacker: HouseId,
    defender: HouseId,
) {
    // Shots fired: both sides now see each other as the enemy
    escalate_to_enemy(state, events, attacker, defender);

    let space = run_space_theater(
        state, events, rng, config, system, engagement, attacker, defender,
    );

    let attacker_threat = executing_threat(state, attacker, system);
    let defender_colony = state.colony_at(system).map(|c| c.owner) == Some(defender);

    // Orbital follows only a won space theater against a defended colony,
    // and only when the attacker means to press in
    let mut orbit_contested = defender_colony && space.attacker_holds_field;
    if orbit_contested && attacker_threat >= Some(ThreatLevel::Contest) {
        let orbital = run_orbital_theater(
            state, events, rng, config, system, engagement, attacker, defender,
        );
        orbit_contested = orbital.attacker_holds_field;
    } else {
        orbit_contested = false;
    }

    // Blockade bookkeeping happens in its own conflict step; planetary
    // operations need orbit control now
    if orbit_contested && attacker_threat == Some(ThreatLevel::Attack) {
        run_planetary_theater(
            state, events, rng, config, system, engagement, attacker, defender,
        );
    }
}

fn escalate_to_enemy(
    state: &mut GameState,
    events: &mut EventLog,
    a: HouseId,
    b: HouseId,
) {
    let turn = state.turn;
    let before_ab = state.diplomacy.stance(a, b);
    let before_ba = state.diplomacy.stance(b, a);
    state.diplomacy.escalate(a, b, DiplomaticStance::Enemy);
    if before_ab != DiplomaticStance::Enemy {
        events.emit(Event::StanceChanged {
            turn,
            from: a,
            to: b,
            stance: DiplomaticStance::Enemy,
        });
    }
    if before_ba != DiplomaticStance::Enemy {
        events.emit(Event::StanceChanged {
            turn,
            from: b,
            to: a,
            stance: DiplomaticStance::Enemy,
        });
    }
}

/// Outcome of one theater for the progression decision.
struct TheaterOutcome {
    attacker_holds_field: bool,
}

// ============================================================================
// Space Theater
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn run_space_theater(
    state: &mut GameState,
    events: &mut EventLog,
    rng: &TurnRng,
    config: &GameConfig,
    system: SystemId,
    engagement: u64,
    attacker: HouseId,
    defender: HouseId,
) -> TheaterOutcome {
    let mut attacker_lost = 0u32;
    let mut defender_lost = 0u32;
    let mut rounds = 0u32;
    let mut defender_retreated = false;
    let mut attacker_retreated = false;

    for round in 0..config.max_combat_rounds {
        let attacker_side = side_squadrons(state, attacker, system);
        let defender_side = side_squadrons(state, defender, system);
        if attacker_side.is_empty() || defender_side.is_empty() {
            break;
        }
        rounds = round + 1;

        let attacker_as = side_attack_strength(state, &attacker_side);
        let defender_as = side_attack_strength(state, &defender_side);

        let mut att_stream = rng.stream("combat", &[u64::from(system.0), engagement, u64::from(round), 0]);
        let mut def_stream = rng.stream("combat", &[u64::from(system.0), engagement, u64::from(round), 1]);
        let att_row = cer::lookup(cer::SPACE, att_stream.d10());
        let def_row = cer::lookup(cer::SPACE, def_stream.d10());

        let hits_on_defender = scaled_hits(attacker_as, att_row.multiplier_pct);
        let hits_on_attacker = scaled_hits(defender_as, def_row.multiplier_pct);

        // Simultaneous volleys: both sides damage the start-of-round lineup
        defender_lost += apply_volley(state, events, &defender_side, hits_on_defender, att_row.critical);
        attacker_lost += apply_volley(state, events, &attacker_side, hits_on_attacker, def_row.critical);

        // Retreat window: the weaker side withdraws once it opens
        if round + 1 >= config.retreat_round {
            let att_as_now = side_attack_strength(state, &side_squadrons(state, attacker, system));
            let def_as_now = side_attack_strength(state, &side_squadrons(state, defender, system));
            if def_as_now < att_as_now && def_as_now > 0 {
                defender_retreated = retreat_side(state, events, defender, system);
                if defender_retreated {
                    break;
                }
            } else if att_as_now < def_as_now && att_as_now > 0 {
                attacker_retreated = retreat_side(state, events, attacker, system);
                if attacker_retreated {
                    break;
                }
            }
        }
    }

    destroy_unescorted_spacelift(state, events, attacker, system);
    destroy_unescorted_spacelift(state, events, defender, system);

    let attacker_alive = !side_squadrons(state, attacker, system).is_empty();
    let defender_alive = !side_squadrons(state, defender, system).is_empty() && !defender_retreated;
    let victor = if rounds == 0 {
        None // no shots exchanged: an undefended field is not a victory
    } else {
        match (attacker_alive && !attacker_retreated, defender_alive) {
            (true, false) => Some(attacker),
            (false, true) => Some(defender),
            _ => None,
        }
    };
    if let Some(winner) = victor {
        state.award_prestige(
            winner,
            crate::defines::prestige::COMBAT_VICTORY,
            PrestigeReason::CombatVictory,
        );
    }

    if rounds > 0 {
        events.emit(Event::CombatReport {
            turn: state.turn,
            system,
            theater: Theater::Space,
            attackers: vec![attacker],
            defenders: vec![defender],
            rounds,
            attacker_squadrons_lost: attacker_lost,
            defender_squadrons_lost: defender_lost,
            victor,
        });
    }

    TheaterOutcome {
        attacker_holds_field: victor == Some(attacker)
            || (rounds == 0 && !defender_alive && attacker_alive),
    }
}

/// Combat-capable squadrons a house fields in a system: everything in its
/// fleets there plus fighters embarked on those squadrons. Sorted.
fn side_squadrons(state: &GameState, house: HouseId, system: SystemId) -> Vec<SquadronId> {
    let mut out = Vec::new();
    for fleet_id in state.fleets_in_system(system) {
        let fleet = &state.fleets[&fleet_id];
        if fleet.owner != house {
            continue;
        }
        for &sid in &fleet.squadrons {
            if let Some(squadron) = state.squadron(sid) {
                if squadron.state != CombatState::Destroyed {
                    out.push(sid);
                    for &fid in &squadron.embarked_fighters {
                        if state
                            .squadron(fid)
                            .is_some_and(|f| f.state != CombatState::Destroyed)
                        {
                            out.push(fid);
                        }
                    }
                }
            }
        }
    }
    out.sort_unstable();
    out
}

fn side_attack_strength(state: &GameState, side: &[SquadronId]) -> i64 {
    side.iter()
        .filter_map(|s| state.squadron(*s))
        .map(|s| s.attack_strength())
        .sum()
}

/// `ceil(attack × multiplier%)`.
fn scaled_hits(attack: i64, multiplier_pct: u32) -> i64 {
    (attack * i64::from(multiplier_pct) + 99) / 100
}

/// Distribute hits across a side in ascending squadron order.
///
/// A squadron goes Undamaged → Crippled when hits cover its defense.
/// Crippled → Destroyed happens only when every other squadron on the
/// side is already crippled, or the volley carried a critical.
/// Returns squadrons destroyed.
fn apply_volley(
    state: &mut GameState,
    events: &mut EventLog,
    side: &[SquadronId],
    mut hits: i64,
    critical: bool,
) -> u32 {
    // Cripple pass
    for &sid in side {
        if hits <= 0 {
            break;
        }
        let Some(squadron) = state.squadron(sid) else {
            continue;
        };
        if squadron.state != CombatState::Undamaged {
            continue;
        }
        let ds = squadron.defense_strength();
        if hits >= ds {
            hits -= ds;
            if let Some(s) = state.squadron_mut(sid) {
                s.state = CombatState::Crippled;
            }
        }
    }

    // Destruction pass, gated by the protection rule
    let mut destroyed = 0u32;
    for &sid in side {
        if hits <= 0 {
            break;
        }
        let Some(squadron) = state.squadron(sid) else {
            continue;
        };
        if squadron.state != CombatState::Crippled {
            continue;
        }
        let all_others_crippled = side.iter().all(|other| {
            *other == sid
                || state
                    .squadron(*other)
                    .map_or(true, |s| s.state != CombatState::Undamaged)
        });
        if !(critical || all_others_crippled) {
            continue;
        }
        let ds = squadron.defense_strength();
        if hits >= ds {
            hits -= ds;
            destroy_squadron(state, events, sid);
            destroyed += 1;
        }
    }

    destroyed
}

/// Remove a destroyed squadron, leaving wreckage. Embarked fighters die
/// with their carrier.
fn destroy_squadron(state: &mut GameState, events: &mut EventLog, sid: SquadronId) {
    let Some(squadron) = state.squadron(sid) else {
        return;
    };
    let embarked = squadron.embarked_fighters.clone();
    let system = squadron.location;
    let class = squadron.flagship;

    for fid in embarked {
        destroy_squadron(state, events, fid);
    }

    let wreck = class.stats().build_cost * i64::from(defines::WRECKAGE_VALUE_PCT) / 100;
    state.add_wreckage(system, wreck);
    state.remove_squadron(sid);
    log::info!("squadron {sid} ({class}) destroyed at system {system}");
}

/// Withdraw a house's fleets to the nearest friendly system. Returns
/// false when no refuge exists (the side fights on).
fn retreat_side(
    state: &mut GameState,
    events: &mut EventLog,
    house: HouseId,
    system: SystemId,
) -> bool {
    let fd = state
        .houses
        .get(&house)
        .map(|h| h.tech.get(crate::house::TechField::Fd))
        .unwrap_or(0);
    let context = TravelContext { fd_level: fd, scout_only: false };

    let mut refuges: Vec<(u32, SystemId)> = state
        .colonies_owned_by(house)
        .into_iter()
        .filter(|s| *s != system)
        .filter_map(|s| {
            state
                .map
                .shortest_path(system, s, context)
                .map(|route| ((route.len() - 1) as u32, s))
        })
        .collect();
    refuges.sort_unstable();
    let Some(&(_, refuge)) = refuges.first() else {
        return false;
    };

    let turn = state.turn;
    let fleet_ids: Vec<FleetId> = state
        .fleets_in_system(system)
        .into_iter()
        .filter(|f| state.fleets[f].owner == house)
        .collect();
    for fleet_id in fleet_ids {
        state.move_fleet(fleet_id, refuge);
        if let Some(fleet) = state.fleet_mut(fleet_id) {
            fleet.clear_command();
        }
        events.emit(Event::FleetRetreated {
            turn,
            fleet: fleet_id,
            from: system,
            to: refuge,
        });
    }
    true
}

/// Spacelift hulls die when their side has no armed escorts left.
fn destroy_unescorted_spacelift(
    state: &mut GameState,
    events: &mut EventLog,
    house: HouseId,
    system: SystemId,
) {
    let side = side_squadrons(state, house, system);
    if side.is_empty() {
        return;
    }
    let has_escort = side.iter().any(|s| {
        state.squadron(*s).is_some_and(|sq| {
            !sq.flagship.is_spacelift() && sq.flagship != ShipClass::Fighter
        })
    });
    if has_escort {
        return;
    }
    let turn = state.turn;
    for sid in side {
        let Some(squadron) = state.squadron(sid) else {
            continue;
        };
        if squadron.flagship.is_spacelift() {
            let class = squadron.flagship;
            destroy_squadron(state, events, sid);
            events.emit(Event::SquadronDisbanded {
                turn,
                squadron: sid,
                owner: house,
                class,
                reason: DisbandReason::EscortsLost,
            });
        }
    }
}

// ============================================================================
// Orbital Theater
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn run_orbital_theater(
    state: &mut GameState,
    events: &mut EventLog,
    rng: &TurnRng,
    config: &GameConfig,
    system: SystemId,
    engagement: u64,
    attacker: HouseId,
    defender: HouseId,
) -> TheaterOutcome {
    let mut rounds = 0u32;
    let mut attacker_lost = 0u32;
    let mut defender_lost = 0u32;

    for round in 0..config.max_combat_rounds {
        let attacker_side = side_squadrons(state, attacker, system);
        let defender_fighters: Vec<SquadronId> = state
            .colony_at(system)
            .map(|c| c.fighter_squadrons.clone())
            .unwrap_or_default();
        let starbase_as = orbital_starbase_strength(state, system);

        let defender_as =
            side_attack_strength(state, &defender_fighters) + starbase_as;
        if attacker_side.is_empty() || defender_as == 0 {
            break;
        }
        rounds = round + 1;

        let attacker_as = side_attack_strength(state, &attacker_side);
        let mut att_stream =
            rng.stream("orbital", &[u64::from(system.0), engagement, u64::from(round), 0]);
        let mut def_stream =
            rng.stream("orbital", &[u64::from(system.0), engagement, u64::from(round), 1]);
        let att_row = cer::lookup(cer::SPACE, att_stream.d10());
        let def_row = cer::lookup(cer::SPACE, def_stream.d10());

        let hits_on_defense = scaled_hits(attacker_as, att_row.multiplier_pct);
        let hits_on_attacker = scaled_hits(defender_as, def_row.multiplier_pct);

        // Fighters absorb first, then starbases
        let leftover = {
            let absorbed = volley_capacity(state, &defender_fighters);
            defender_lost +=
                apply_volley(state, events, &defender_fighters, hits_on_defense, att_row.critical);
            (hits_on_defense - absorbed).max(0)
        };
        damage_starbases(state, events, system, leftover, att_row.critical);
        attacker_lost += apply_volley(state, events, &attacker_side, hits_on_attacker, def_row.critical);
    }

    let defender_remaining = orbital_starbase_strength(state, system)
        + side_attack_strength(
            state,
            &state
                .colony_at(system)
                .map(|c| c.fighter_squadrons.clone())
                .unwrap_or_default(),
        );
    let attacker_remaining = !side_squadrons(state, attacker, system).is_empty();
    let victor = if attacker_remaining && defender_remaining == 0 {
        Some(attacker)
    } else if !attacker_remaining && defender_remaining > 0 {
        Some(defender)
    } else {
        None
    };

    if rounds > 0 {
        events.emit(Event::CombatReport {
            turn: state.turn,
            system,
            theater: Theater::Orbital,
            attackers: vec![attacker],
            defenders: vec![defender],
            rounds,
            attacker_squadrons_lost: attacker_lost,
            defender_squadrons_lost: defender_lost,
            victor,
        });
    }

    TheaterOutcome {
        attacker_holds_field: attacker_remaining && defender_remaining == 0,
    }
}

/// Total hits a side can absorb before destruction (for overflow math).
fn volley_capacity(state: &GameState, side: &[SquadronId]) -> i64 {
    side.iter()
        .filter_map(|s| state.squadron(*s))
        .map(|s| match s.state {
            CombatState::Undamaged => s.defense_strength() * 2,
            CombatState::Crippled => s.defense_strength(),
            CombatState::Destroyed => 0,
        })
        .sum()
}

fn orbital_starbase_strength(state: &GameState, system: SystemId) -> i64 {
    state
        .colony_at(system)
        .map(|c| c.active_starbases().count() as i64 * ships::STARBASE_AS)
        .unwrap_or(0)
}

/// Hits against the starbase line: cripple first, destroy when all are
/// crippled or on a critical.
fn damage_starbases(
    state: &mut GameState,
    events: &mut EventLog,
    system: SystemId,
    mut hits: i64,
    critical: bool,
) {
    if hits <= 0 {
        return;
    }
    let Some(colony) = state.colony_at_mut(system) else {
        return;
    };

    for facility in colony.facilities.iter_mut() {
        if hits < ships::STARBASE_DS {
            break;
        }
        if facility.kind == crate::colony::FacilityKind::Starbase && !facility.crippled {
            facility.crippled = true;
            hits -= ships::STARBASE_DS;
        }
    }

    let all_crippled = colony
        .facilities
        .iter()
        .filter(|f| f.kind == crate::colony::FacilityKind::Starbase)
        .all(|f| f.crippled);
    if critical || all_crippled {
        let colony = state.colony_at_mut(system).expect("colony checked above");
        let mut destroyed = 0u32;
        colony.facilities.retain(|f| {
            let kill = f.kind == crate::colony::FacilityKind::Starbase
                && f.crippled
                && hits >= ships::STARBASE_DS;
            if kill {
                hits -= ships::STARBASE_DS;
                destroyed += 1;
            }
            !kill
        });
        if destroyed > 0 {
            log::info!("{destroyed} starbase(s) destroyed at system {system}");
        }
    }
}

// ============================================================================
// Planetary Theater
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn run_planetary_theater(
    state: &mut GameState,
    events: &mut EventLog,
    rng: &TurnRng,
    config: &GameConfig,
    system: SystemId,
    engagement: u64,
    attacker: HouseId,
    defender: HouseId,
) {
    let _ = config;
    let kinds = attacker_planetary_kinds(state, attacker, system);
    let bombarding = kinds
        .iter()
        .any(|k| matches!(k, FleetCommandKind::Bombard | FleetCommandKind::Blitz));
    let invading = kinds
        .iter()
        .any(|k| matches!(k, FleetCommandKind::Invade | FleetCommandKind::Blitz));
    let blitz = kinds.contains(&FleetCommandKind::Blitz);

    if bombarding {
        run_bombardment(state, events, rng, system, engagement, attacker, defender);
    }
    if invading {
        run_invasion(state, events, rng, system, engagement, attacker, defender, blitz);
    }
}

fn attacker_planetary_kinds(
    state: &GameState,
    attacker: HouseId,
    system: SystemId,
) -> Vec<FleetCommandKind> {
    state
        .fleets_in_system(system)
        .iter()
        .filter_map(|f| {
            let fleet = state.fleets.get(f)?;
            if fleet.owner != attacker || fleet.mission != MissionState::Executing {
                return None;
            }
            Some(fleet.command?.kind)
        })
        .collect()
}

/// Damage delivered by a bombardment volley after shields.
///
/// Planet-breaker attack strength is partitioned from conventional
/// strength before the shield roll: shields never reduce it.
pub fn bombardment_damage(
    conventional_as: i64,
    planet_breaker_as: i64,
    multiplier_pct: u32,
    shield: Option<shields::ShieldRow>,
    shield_roll: u8,
) -> i64 {
    let conventional = scaled_hits(conventional_as, multiplier_pct);
    let pb = scaled_hits(planet_breaker_as, multiplier_pct);
    let blocked = match shield {
        Some(row) if shield_roll >= row.activation_roll => {
            conventional * i64::from(row.block_pct) / 100
        }
        _ => 0,
    };
    pb + (conventional - blocked)
}

/// Ground-side damage breakdown from one bombardment.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GroundDamage {
    pub batteries_lost: u32,
    pub forces_lost: u32,
    pub iu_lost: i64,
    pub pu_lost: i64,
}

/// Apply bombardment hits in the fixed order: batteries → ground forces
/// → industrial units → population units.
pub fn apply_ground_damage(colony: &mut crate::colony::Colony, mut hits: i64) -> GroundDamage {
    let mut damage = GroundDamage::default();

    while hits >= defines::BATTERY_DS && colony.ground_batteries > 0 {
        colony.ground_batteries -= 1;
        damage.batteries_lost += 1;
        hits -= defines::BATTERY_DS;
    }
    while hits >= defines::GROUND_FORCE_DS && colony.ground_forces > 0 {
        colony.ground_forces -= 1;
        damage.forces_lost += 1;
        hits -= defines::GROUND_FORCE_DS;
    }
    while hits >= defines::IU_DS && colony.industrial_units > 0 {
        colony.industrial_units -= 1;
        damage.iu_lost += 1;
        hits -= defines::IU_DS;
    }
    while hits >= defines::PU_DS && colony.population_units > 0 {
        colony.population_units -= 1;
        damage.pu_lost += 1;
        hits -= defines::PU_DS;
    }
    colony.souls_millions = colony.population_units * 10;

    damage
}

#[allow(clippy::too_many_arguments)]
fn run_bombardment(
    state: &mut GameState,
    events: &mut EventLog,
    rng: &TurnRng,
    system: SystemId,
    engagement: u64,
    attacker: HouseId,
    defender: HouseId,
) {
    let side = side_squadrons(state, attacker, system);
    let (conventional_as, pb_as) = partition_attack(state, &side);
    if conventional_as + pb_as == 0 {
        return;
    }

    let mut cer_stream = rng.stream("bombard", &[u64::from(system.0), engagement]);
    let row = cer::lookup(cer::BOMBARDMENT, cer_stream.d10());

    let (shield, shield_roll) = {
        let level = state.colony_at(system).map(|c| c.shield_level).unwrap_or(0);
        let row = shields::row(level);
        let roll = if row.is_some() {
            let mut shield_stream = rng.stream("shield", &[u64::from(system.0), engagement]);
            shield_stream.d20()
        } else {
            0
        };
        (row, roll)
    };

    let hits = bombardment_damage(conventional_as, pb_as, row.multiplier_pct, shield, shield_roll);

    // Batteries answer while they still stand
    let battery_hits = {
        let batteries = state
            .colony_at(system)
            .map(|c| i64::from(c.ground_batteries))
            .unwrap_or(0);
        let mut bat_stream = rng.stream("battery", &[u64::from(system.0), engagement]);
        let bat_row = cer::lookup(cer::GROUND, bat_stream.d10());
        scaled_hits(batteries * defines::BATTERY_AS, bat_row.multiplier_pct)
    };

    let damage = {
        let Some(colony) = state.colony_at_mut(system) else {
            return;
        };
        apply_ground_damage(colony, hits)
    };
    let attacker_lost = apply_volley(state, events, &side, battery_hits, false);

    log::info!(
        "bombardment of system {system}: {damage:?}, {attacker_lost} attacking squadron(s) lost"
    );
    events.emit(Event::CombatReport {
        turn: state.turn,
        system,
        theater: Theater::Planetary,
        attackers: vec![attacker],
        defenders: vec![defender],
        rounds: 1,
        attacker_squadrons_lost: attacker_lost,
        defender_squadrons_lost: 0,
        victor: None,
    });
}

/// Split a side's attack strength into (conventional, planet-breaker).
fn partition_attack(state: &GameState, side: &[SquadronId]) -> (i64, i64) {
    let mut conventional = 0i64;
    let mut pb = 0i64;
    for sid in side {
        let Some(squadron) = state.squadron(*sid) else {
            continue;
        };
        if squadron.flagship == ShipClass::PlanetBreaker {
            pb += squadron.attack_strength();
        } else {
            conventional += squadron.attack_strength();
        }
    }
    (conventional, pb)
}

#[allow(clippy::too_many_arguments)]
fn run_invasion(
    state: &mut GameState,
    events: &mut EventLog,
    rng: &TurnRng,
    system: SystemId,
    engagement: u64,
    attacker: HouseId,
    defender: HouseId,
    blitz: bool,
) {
    let marine_squadrons = marines_aboard(state, attacker, system);
    let mut marines: i64 = marine_squadrons.iter().map(|(_, n)| i64::from(*n)).sum();
    if marines == 0 {
        return;
    }

    let mut att_stream = rng.stream("invasion", &[u64::from(system.0), engagement, 0]);
    let mut def_stream = rng.stream("invasion", &[u64::from(system.0), engagement, 1]);
    let att_row = cer::lookup(cer::GROUND, att_stream.d10());
    let def_row = cer::lookup(cer::GROUND, def_stream.d10());

    let mut attacker_as = marines * defines::MARINE_AS;
    if blitz {
        attacker_as = attacker_as * i64::from(defines::BLITZ_INVASION_AS_PCT) / 100;
    }
    let defender_forces = state
        .colony_at(system)
        .map(|c| i64::from(c.ground_forces))
        .unwrap_or(0);
    let defender_as = defender_forces * defines::MARINE_AS;

    let hits_on_defender = scaled_hits(attacker_as, att_row.multiplier_pct);
    let hits_on_attacker = scaled_hits(defender_as, def_row.multiplier_pct);

    let defenders_killed = (hits_on_defender / defines::GROUND_FORCE_DS).min(defender_forces);
    let marines_killed = (hits_on_attacker / defines::GROUND_FORCE_DS).min(marines);

    if let Some(colony) = state.colony_at_mut(system) {
        colony.ground_forces -= defenders_killed as u32;
    }
    marines -= marines_killed;
    deduct_marines(state, &marine_squadrons, marines_killed);

    let defender_left = state
        .colony_at(system)
        .map(|c| c.ground_forces)
        .unwrap_or(0);

    let victor = if defender_left == 0 && marines > 0 {
        seize_colony(state, events, system, attacker, defender, marines);
        Some(attacker)
    } else if marines == 0 {
        Some(defender)
    } else {
        None
    };

    events.emit(Event::CombatReport {
        turn: state.turn,
        system,
        theater: Theater::Planetary,
        attackers: vec![attacker],
        defenders: vec![defender],
        rounds: 1,
        attacker_squadrons_lost: 0,
        defender_squadrons_lost: 0,
        victor,
    });
}

/// Marine counts per transporting squadron for a house in a system.
fn marines_aboard(state: &GameState, house: HouseId, system: SystemId) -> Vec<(SquadronId, u32)> {
    let mut out = Vec::new();
    for sid in side_squadrons(state, house, system) {
        if let Some(squadron) = state.squadron(sid) {
            if let Some(Cargo::Marines(n)) = squadron.cargo {
                if n > 0 {
                    out.push((sid, n));
                }
            }
        }
    }
    out
}

/// Remove killed marines from transports, lowest squadron id first.
fn deduct_marines(state: &mut GameState, aboard: &[(SquadronId, u32)], mut killed: i64) {
    for (sid, count) in aboard {
        if killed <= 0 {
            break;
        }
        let losses = killed.min(i64::from(*count)) as u32;
        killed -= i64::from(losses);
        if let Some(squadron) = state.squadron_mut(*sid) {
            let rest = count - losses;
            squadron.cargo = if rest > 0 { Some(Cargo::Marines(rest)) } else { None };
        }
    }
}

/// Hand the colony to the invader. Surviving marines garrison it; the
/// defender's based squadrons are lost with the ground war.
fn seize_colony(
    state: &mut GameState,
    events: &mut EventLog,
    system: SystemId,
    attacker: HouseId,
    defender: HouseId,
    landing_marines: i64,
) {
    let turn = state.turn;

    // Defender squadrons based at the colony are captured or scuttled
    let (fighters, unassigned) = state
        .colony_at(system)
        .map(|c| (c.fighter_squadrons.clone(), c.unassigned_squadrons.clone()))
        .unwrap_or_default();
    for sid in fighters.into_iter().chain(unassigned) {
        destroy_squadron(state, events, sid);
    }

    // Drain remaining marines from the landing transports
    let aboard = marines_aboard(state, attacker, system);
    let total: i64 = aboard.iter().map(|(_, n)| i64::from(*n)).sum();
    deduct_marines(state, &aboard, total);

    state.transfer_colony(system, attacker);
    if let Some(colony) = state.colony_at_mut(system) {
        colony.ground_forces = landing_marines.max(0) as u32;
        colony.blockaded = false;
        colony.construction = None;
        colony.construction_queue.clear();
        colony.terraform = None;
        colony.fighter_violation = None;
        colony.tax_override = None;
    }

    let value = crate::defines::prestige::COLONY_SEIZED;
    state.award_prestige(attacker, value, PrestigeReason::ColonySeizedGain);
    state.award_prestige(defender, -value, PrestigeReason::ColonySeizedLoss);

    events.emit(Event::ColonySeized {
        turn,
        system,
        from: defender,
        to: attacker,
    });
}

// ============================================================================
// Threat Escalation
// ============================================================================

/// Commands are noticed even when no shot is fired: a Contest-tier
/// command executing in space another house holds escalates stances to
/// Hostile; Attack-tier escalates to Enemy. Patrolling one's own colony
/// system is defensive and escalates nothing.
pub fn run_threat_escalation(state: &mut GameState, events: &mut EventLog) {
    let mut system_ids: Vec<SystemId> = state.map.system_ids().collect();
    system_ids.sort_unstable();

    for system in system_ids {
        let houses = state.houses_in_system(system);
        if houses.len() < 2 {
            continue;
        }
        let colony_owner = state.colony_at(system).map(|c| c.owner);

        for &actor in &houses {
            let Some(threat) = executing_threat(state, actor, system) else {
                continue;
            };
            if threat < ThreatLevel::Contest || colony_owner == Some(actor) {
                continue;
            }
            let floor = if threat == ThreatLevel::Attack {
                DiplomaticStance::Enemy
            } else {
                DiplomaticStance::Hostile
            };
            for &other in &houses {
                if other == actor {
                    continue;
                }
                let turn = state.turn;
                let before_ab = state.diplomacy.stance(actor, other);
                let before_ba = state.diplomacy.stance(other, actor);
                state.diplomacy.escalate(actor, other, floor);
                if state.diplomacy.stance(actor, other) != before_ab {
                    events.emit(Event::StanceChanged {
                        turn,
                        from: actor,
                        to: other,
                        stance: floor,
                    });
                }
                if state.diplomacy.stance(other, actor) != before_ba {
                    events.emit(Event::StanceChanged {
                        turn,
                        from: other,
                        to: actor,
                        stance: floor,
                    });
                }
            }
        }
    }
}

// ============================================================================
// Blockade Bookkeeping (Conflict Step 3)
// ============================================================================

/// Set or clear blockade flags: a colony is blockaded while a hostile
/// fleet sits in its system executing a Blockade command. Income applies
/// the output reduction the same turn.
pub fn run_blockade_bookkeeping(state: &mut GameState, events: &mut EventLog) {
    let mut colony_ids: Vec<SystemId> = state.colonies.keys().copied().collect();
    colony_ids.sort_unstable();

    for system in colony_ids {
        let owner = state.colonies[&system].owner;
        let blockader: Option<HouseId> = state
            .fleets_in_system(system)
            .iter()
            .filter_map(|f| {
                let fleet = state.fleets.get(f)?;
                if fleet.owner == owner || fleet.mission != MissionState::Executing {
                    return None;
                }
                let command = fleet.command?;
                if command.kind != FleetCommandKind::Blockade {
                    return None;
                }
                let hostile = state.diplomacy.stance(fleet.owner, owner)
                    >= DiplomaticStance::Hostile
                    || state.diplomacy.stance(owner, fleet.owner) >= DiplomaticStance::Hostile;
                hostile.then_some(fleet.owner)
            })
            .min();

        let turn = state.turn;
        let was_blockaded = state.colonies[&system].blockaded;
        match blockader {
            Some(by) if !was_blockaded => {
                state.colony_at_mut(system).expect("colony listed").blockaded = true;
                events.emit(Event::BlockadeEstablished { turn, system, by });
            }
            None if was_blockaded => {
                state.colony_at_mut(system).expect("colony listed").blockaded = false;
                events.emit(Event::BlockadeLifted { turn, system });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GameStateBuilder;

    #[test]
    fn scaled_hits_rounds_up() {
        assert_eq!(scaled_hits(10, 100), 10);
        assert_eq!(scaled_hits(10, 25), 3); // 2.5 rounds up
        assert_eq!(scaled_hits(7, 150), 11); // 10.5 rounds up
        assert_eq!(scaled_hits(0, 200), 0);
    }

    #[test]
    fn bombardment_partition_bypasses_shields() {
        // One planet-breaker (AS 20) plus conventional AS 90, ×1.0,
        // shield blocks 50% on a roll of 10+
        let shield = shields::ShieldRow { activation_roll: 10, block_pct: 50 };
        let total = bombardment_damage(90, 20, 100, Some(shield), 12);
        assert_eq!(total, 20 + 45);

        // Failed shield roll: everything lands
        let total = bombardment_damage(90, 20, 100, Some(shield), 9);
        assert_eq!(total, 110);

        // No shield installed
        let total = bombardment_damage(90, 20, 100, None, 20);
        assert_eq!(total, 110);
    }

    #[test]
    fn ground_damage_order_is_fixed() {
        let mut colony = crate::colony::Colony::new(SystemId(1), HouseId(1), 20);
        colony.ground_batteries = 2;
        colony.ground_forces = 3;
        colony.industrial_units = 10;

        // 2 batteries × 6 + 3 forces × 3 + rest to IU
        let damage = apply_ground_damage(&mut colony, 65);
        assert_eq!(damage.batteries_lost, 2);
        assert_eq!(damage.forces_lost, 3);
        // 65 - 12 - 9 = 44 → 22 IU at 2 hits each
        assert_eq!(damage.iu_lost, 10); // capped by the 10 IU present
        // 44 - 20 = 24 → 6 PU at 4 hits each
        assert_eq!(damage.pu_lost, 6);
        assert_eq!(colony.ground_batteries, 0);
        assert_eq!(colony.industrial_units, 0);
        assert_eq!(colony.population_units, 14);
    }

    #[test]
    fn zero_population_colony_survives_bombardment_math() {
        let mut colony = crate::colony::Colony::new(SystemId(1), HouseId(1), 0);
        let damage = apply_ground_damage(&mut colony, 1000);
        assert_eq!(damage.pu_lost, 0);
        assert_eq!(colony.population_units, 0);
    }

    #[test]
    fn destruction_protection_spares_mixed_side() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_fleet(
                HouseId(1),
                SystemId(0),
                &[ShipClass::Corvette, ShipClass::Corvette, ShipClass::Corvette],
            )
            .build();
        let side = side_squadrons(&state, HouseId(1), SystemId(0));
        let mut events = EventLog::new();

        // Enough hits to cripple one corvette (DS 4) and then some, but
        // not a critical and not everyone crippled: nobody dies
        let destroyed = apply_volley(&mut state, &mut events, &side, 6, false);
        assert_eq!(destroyed, 0);
        let crippled = side
            .iter()
            .filter(|s| state.squadron(**s).unwrap().state == CombatState::Crippled)
            .count();
        assert_eq!(crippled, 1);
    }

    #[test]
    fn critical_bypasses_destruction_protection() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Corvette, ShipClass::Corvette])
            .build();
        let side = side_squadrons(&state, HouseId(1), SystemId(0));
        let mut events = EventLog::new();

        // 8 hits: cripple the first (4), then destroy it on the critical (4)
        let destroyed = apply_volley(&mut state, &mut events, &side, 8, true);
        assert_eq!(destroyed, 1);
    }

    #[test]
    fn combat_detection_requires_trigger() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Cruiser])
            .with_fleet(HouseId(2), SystemId(0), &[ShipClass::Cruiser])
            .build();

        // Both neutral, no commands: no combat
        assert!(combat_pairs(&state, SystemId(0)).is_empty());

        // Enemy stance: unconditional combat
        state
            .diplomacy
            .set_stance(HouseId(1), HouseId(2), DiplomaticStance::Enemy);
        let pairs = combat_pairs(&state, SystemId(0));
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn neutral_attack_on_colony_triggers_combat() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(2), SystemId(7))
            .with_fleet(HouseId(1), SystemId(7), &[ShipClass::Cruiser])
            .with_fleet(HouseId(2), SystemId(7), &[ShipClass::Destroyer])
            .build();

        let fleet = state.fleets_owned_by(HouseId(1))[0];
        {
            let f = state.fleet_mut(fleet).unwrap();
            f.command = Some(crate::input::FleetCommand {
                fleet,
                kind: FleetCommandKind::Bombard,
                target_system: Some(SystemId(7)),
                target_fleet: None,
                priority: 0,
            });
            f.mission = MissionState::Executing;
        }

        let pairs = combat_pairs(&state, SystemId(7));
        assert_eq!(pairs, vec![(HouseId(1), HouseId(2))]);
    }

    #[test]
    fn wreckage_left_by_destroyed_squadron() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Cruiser])
            .build();
        let sid = state.fleets.values().next().unwrap().squadrons[0];
        let mut events = EventLog::new();
        destroy_squadron(&mut state, &mut events, sid);

        let expected = ShipClass::Cruiser.stats().build_cost
            * i64::from(defines::WRECKAGE_VALUE_PCT)
            / 100;
        assert_eq!(state.wreckage.get(&SystemId(0)).copied(), Some(expected));
        assert!(state.squadron(sid).is_none());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn blockade_flag_follows_executing_blockade_command() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(2), SystemId(7))
            .with_fleet(HouseId(1), SystemId(7), &[ShipClass::Cruiser])
            .build();
        state
            .diplomacy
            .set_mutual(HouseId(1), HouseId(2), DiplomaticStance::Hostile);
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        {
            let f = state.fleet_mut(fleet).unwrap();
            f.command = Some(crate::input::FleetCommand {
                fleet,
                kind: FleetCommandKind::Blockade,
                target_system: Some(SystemId(7)),
                target_fleet: None,
                priority: 0,
            });
            f.mission = MissionState::Executing;
        }

        let mut events = EventLog::new();
        run_blockade_bookkeeping(&mut state, &mut events);
        assert!(state.colony_at(SystemId(7)).unwrap().blockaded);

        // Fleet leaves: blockade lifts
        state.move_fleet(fleet, SystemId(0));
        state.fleet_mut(fleet).unwrap().clear_command();
        run_blockade_bookkeeping(&mut state, &mut events);
        assert!(!state.colony_at(SystemId(7)).unwrap().blockaded);
    }
}
