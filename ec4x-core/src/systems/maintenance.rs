//! The maintenance phase: construction queues, repairs, terraforming,
//! population growth, tax-history rotation, chart upkeep.

use crate::colony::{FacilityKind, ProjectKind};
use crate::defines::{economy, ships};
use crate::events::{Event, EventLog};
use crate::fleet::{CombatState, ShipClass, Squadron};
use crate::house::TechField;
use crate::ids::{HouseId, SquadronId, SystemId};
use crate::intel::EffectKind;
use crate::state::GameState;

/// Turns of intel reports kept before pruning.
const INTEL_RETENTION_TURNS: u32 = 30;

pub fn run_maintenance_phase(state: &mut GameState, events: &mut EventLog) {
    advance_construction(state, events);
    repair_squadrons(state, events);
    repair_facilities(state);
    advance_terraforming(state, events);
    rotate_tax_history(state);
    grow_population(state);
    crate::projection::record_observations(state);
    prune_intel(state);
}

// ============================================================================
// Construction
// ============================================================================

/// Advance each colony's active project one turn; completed projects
/// deliver and the queue promotes.
fn advance_construction(state: &mut GameState, events: &mut EventLog) {
    let mut colony_ids: Vec<SystemId> = state.colonies.keys().copied().collect();
    colony_ids.sort_unstable();

    for system in colony_ids {
        let completed = {
            let Some(colony) = state.colony_at_mut(system) else {
                continue;
            };
            let Some(project) = colony.construction.as_mut() else {
                continue;
            };
            project.turns_remaining = project.turns_remaining.saturating_sub(1);
            let step = project.total_pp / i64::from(project.turns_remaining + 1).max(1);
            project.invested_pp = (project.invested_pp + step).min(project.total_pp);
            if project.turns_remaining == 0 {
                let done = *project;
                colony.construction = None;
                colony.promote_next();
                Some(done)
            } else {
                None
            }
        };

        if let Some(project) = completed {
            deliver_project(state, events, system, project.kind);
        }
    }
}

fn deliver_project(
    state: &mut GameState,
    events: &mut EventLog,
    system: SystemId,
    kind: ProjectKind,
) {
    let turn = state.turn;
    let Some(owner) = state.colony_at(system).map(|c| c.owner) else {
        return;
    };

    let item = match kind {
        ProjectKind::Ship(class) => {
            commission_squadron(state, events, system, owner, class);
            format!("{class} squadron")
        }
        ProjectKind::Facility(facility_kind) => {
            let id = state.allocate_facility_id();
            if let Some(colony) = state.colony_at_mut(system) {
                colony.facilities.push(crate::colony::Facility {
                    id,
                    kind: facility_kind,
                    crippled: false,
                });
            }
            format!("{facility_kind:?}").to_lowercase()
        }
        ProjectKind::Industrial { units } => {
            if let Some(colony) = state.colony_at_mut(system) {
                colony.industrial_units += i64::from(units);
            }
            format!("{units} industrial units")
        }
        ProjectKind::Infrastructure => {
            if let Some(colony) = state.colony_at_mut(system) {
                colony.infrastructure =
                    (colony.infrastructure + 1).min(crate::colony::Colony::MAX_INFRASTRUCTURE);
            }
            "infrastructure level".to_string()
        }
        ProjectKind::GroundBatteries { count } => {
            if let Some(colony) = state.colony_at_mut(system) {
                colony.ground_batteries += count;
            }
            format!("{count} ground batteries")
        }
        ProjectKind::ShieldUpgrade => {
            if let Some(colony) = state.colony_at_mut(system) {
                colony.shield_level = (colony.shield_level + 1).min(6);
            }
            "shield generator".to_string()
        }
    };

    events.emit(Event::ConstructionCompleted { turn, colony: system, item });
}

/// A finished hull enters service at its colony: fighters base on the
/// colony, everything else waits in the commissioned pool. Tech level is
/// the house's WEP at commissioning and stays fixed.
fn commission_squadron(
    state: &mut GameState,
    events: &mut EventLog,
    system: SystemId,
    owner: HouseId,
    class: ShipClass,
) {
    let wep = state
        .houses
        .get(&owner)
        .map(|h| h.tech.get(TechField::Wep))
        .unwrap_or(0);
    let sid = state.allocate_squadron_id();
    state.add_squadron(Squadron::new(sid, owner, class, wep, system));
    if let Some(colony) = state.colony_at_mut(system) {
        if class == ShipClass::Fighter {
            colony.fighter_squadrons.push(sid);
        } else {
            colony.unassigned_squadrons.push(sid);
        }
    }
    let turn = state.turn;
    events.emit(Event::SquadronCommissioned {
        turn,
        colony: system,
        squadron: sid,
        class,
    });
}

// ============================================================================
// Repairs
// ============================================================================

/// Crippled squadrons sitting at a friendly colony with an operational
/// shipyard are repaired, funds permitting.
fn repair_squadrons(state: &mut GameState, events: &mut EventLog) {
    let mut colony_ids: Vec<SystemId> = state.colonies.keys().copied().collect();
    colony_ids.sort_unstable();

    for system in colony_ids {
        let colony = &state.colonies[&system];
        let owner = colony.owner;
        if !colony.has_facility(FacilityKind::Shipyard) {
            continue;
        }

        // Candidates: the owner's squadrons physically at the colony
        let mut candidates: Vec<SquadronId> = state
            .squadrons
            .values()
            .filter(|s| {
                s.owner == owner && s.location == system && s.state == CombatState::Crippled
            })
            .map(|s| s.id)
            .collect();
        candidates.sort_unstable();

        for sid in candidates {
            let Some(squadron) = state.squadron(sid) else {
                continue;
            };
            let cost = squadron.flagship.stats().build_cost
                * i64::from(ships::REPAIR_COST_PCT)
                / 100;
            let affordable = state
                .houses
                .get(&owner)
                .is_some_and(|h| h.treasury >= cost);
            if !affordable {
                break; // candidates share one treasury; later ones cost no less
            }
            if let Some(house) = state.houses.get_mut(&owner) {
                house.treasury -= cost;
            }
            if let Some(squadron) = state.squadron_mut(sid) {
                squadron.state = CombatState::Undamaged;
            }
            let turn = state.turn;
            events.emit(Event::SquadronRepaired { turn, squadron: sid, colony: system });
        }
    }
}

/// Combat-crippled starbases come back online at a shipyard colony,
/// unless an active sabotage effect is holding them down.
fn repair_facilities(state: &mut GameState) {
    let mut colony_ids: Vec<SystemId> = state.colonies.keys().copied().collect();
    colony_ids.sort_unstable();

    for system in colony_ids {
        let sabotaged = state
            .ongoing_effects
            .iter()
            .any(|e| e.kind == EffectKind::StarbaseCrippled(system));
        if sabotaged {
            continue;
        }
        let colony = &state.colonies[&system];
        let owner = colony.owner;
        if !colony.has_facility(FacilityKind::Shipyard) {
            continue;
        }
        let crippled: u32 = colony
            .facilities
            .iter()
            .filter(|f| f.kind == FacilityKind::Starbase && f.crippled)
            .count() as u32;
        if crippled == 0 {
            continue;
        }
        let cost = crate::defines::construction::STARBASE_COST
            * i64::from(ships::REPAIR_COST_PCT)
            / 100;
        let total = i64::from(crippled) * cost;
        let affordable = state.houses.get(&owner).is_some_and(|h| h.treasury >= total);
        if !affordable {
            continue;
        }
        if let Some(house) = state.houses.get_mut(&owner) {
            house.treasury -= total;
        }
        if let Some(colony) = state.colony_at_mut(system) {
            for facility in colony.facilities.iter_mut() {
                if facility.kind == FacilityKind::Starbase {
                    facility.crippled = false;
                }
            }
        }
    }
}

// ============================================================================
// Terraforming
// ============================================================================

fn advance_terraforming(state: &mut GameState, events: &mut EventLog) {
    let mut colony_ids: Vec<SystemId> = state.colonies.keys().copied().collect();
    colony_ids.sort_unstable();

    for system in colony_ids {
        let finished = {
            let Some(colony) = state.colony_at_mut(system) else {
                continue;
            };
            let Some(project) = colony.terraform.as_mut() else {
                continue;
            };
            project.turns_remaining = project.turns_remaining.saturating_sub(1);
            if project.turns_remaining == 0 {
                let target = project.target_class;
                colony.terraform = None;
                Some(target)
            } else {
                None
            }
        };

        if let Some(new_class) = finished {
            if let Some(sys) = state.map.systems.get_mut(&system) {
                sys.planet_class = new_class;
            }
            let turn = state.turn;
            events.emit(Event::TerraformCompleted { turn, colony: system, new_class });
        }
    }
}

// ============================================================================
// Housekeeping
// ============================================================================

fn rotate_tax_history(state: &mut GameState) {
    for house_id in state.active_house_ids() {
        if let Some(house) = state.houses.get_mut(&house_id) {
            house.tax_policy.rotate();
        }
    }
}

/// Population grows by planet class, bounded by infrastructure.
fn grow_population(state: &mut GameState) {
    let mut colony_ids: Vec<SystemId> = state.colonies.keys().copied().collect();
    colony_ids.sort_unstable();

    for system in colony_ids {
        let class = match state.map.get(system) {
            Some(sys) => sys.planet_class,
            None => continue,
        };
        let rate = i64::from(economy::GROWTH_PER_10PU[class.index()]);
        let Some(colony) = state.colony_at_mut(system) else {
            continue;
        };
        if colony.population_units == 0 || rate == 0 {
            continue;
        }
        let growth = ((colony.population_units / 10) * rate).max(1);
        let cap = colony.population_cap();
        colony.population_units = (colony.population_units + growth).min(cap.max(colony.population_units));
        colony.souls_millions = colony.population_units * 10;
    }
}

fn prune_intel(state: &mut GameState) {
    let turn = state.turn;
    for house_id in state.active_house_ids() {
        if let Some(house) = state.houses.get_mut(&house_id) {
            house.intel.prune(turn, INTEL_RETENTION_TURNS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colony::ConstructionProject;
    use crate::testing::GameStateBuilder;

    #[test]
    fn construction_counts_down_and_delivers() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .build();
        state
            .colony_at_mut(SystemId(10))
            .unwrap()
            .enqueue(ConstructionProject::new(
                ProjectKind::Ship(ShipClass::Destroyer),
                150,
                2,
            ));

        let mut events = EventLog::new();
        advance_construction(&mut state, &mut events);
        assert_eq!(
            state
                .colony_at(SystemId(10))
                .unwrap()
                .construction
                .unwrap()
                .turns_remaining,
            1
        );

        advance_construction(&mut state, &mut events);
        let colony = state.colony_at(SystemId(10)).unwrap();
        assert!(colony.construction.is_none());
        assert_eq!(colony.unassigned_squadrons.len(), 1);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, Event::ConstructionCompleted { .. })));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn commissioned_squadron_freezes_wep_level() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .build();
        state
            .houses
            .get_mut(&HouseId(1))
            .unwrap()
            .tech
            .set(TechField::Wep, 4);
        let mut events = EventLog::new();
        commission_squadron(&mut state, &mut events, SystemId(10), HouseId(1), ShipClass::Cruiser);

        let sid = state.colony_at(SystemId(10)).unwrap().unassigned_squadrons[0];
        assert_eq!(state.squadron(sid).unwrap().tech_level, 4);
    }

    #[test]
    fn fighters_commission_to_the_fighter_roster() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .build();
        let mut events = EventLog::new();
        commission_squadron(&mut state, &mut events, SystemId(10), HouseId(1), ShipClass::Fighter);
        let colony = state.colony_at(SystemId(10)).unwrap();
        assert_eq!(colony.fighter_squadrons.len(), 1);
        assert!(colony.unassigned_squadrons.is_empty());
    }

    #[test]
    fn repair_needs_shipyard_and_funds() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .with_fleet(HouseId(1), SystemId(10), &[ShipClass::Cruiser])
            .build();
        let sid = state.fleets.values().next().unwrap().squadrons[0];
        state.squadron_mut(sid).unwrap().state = CombatState::Crippled;

        // No shipyard: nothing happens
        let mut events = EventLog::new();
        repair_squadrons(&mut state, &mut events);
        assert_eq!(state.squadron(sid).unwrap().state, CombatState::Crippled);

        let facility_id = state.allocate_facility_id();
        state
            .colony_at_mut(SystemId(10))
            .unwrap()
            .facilities
            .push(crate::colony::Facility {
                id: facility_id,
                kind: FacilityKind::Shipyard,
                crippled: false,
            });

        // Broke house: still nothing
        state.houses.get_mut(&HouseId(1)).unwrap().treasury = 0;
        repair_squadrons(&mut state, &mut events);
        assert_eq!(state.squadron(sid).unwrap().state, CombatState::Crippled);

        state.houses.get_mut(&HouseId(1)).unwrap().treasury = 1_000;
        repair_squadrons(&mut state, &mut events);
        assert_eq!(state.squadron(sid).unwrap().state, CombatState::Undamaged);
        let cost = ShipClass::Cruiser.stats().build_cost * i64::from(ships::REPAIR_COST_PCT) / 100;
        assert_eq!(state.houses[&HouseId(1)].treasury, 1_000 - cost);
    }

    #[test]
    fn population_grows_to_infrastructure_cap() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony_full(HouseId(1), SystemId(10), 10, 0, 1)
            .build();
        // Force a generous planet so growth is non-zero
        state.map.systems.get_mut(&SystemId(10)).unwrap().planet_class =
            crate::starmap::PlanetClass::Eden;

        for _ in 0..100 {
            grow_population(&mut state);
        }
        let colony = state.colony_at(SystemId(10)).unwrap();
        assert_eq!(colony.population_units, colony.population_cap());
    }

    #[test]
    fn extreme_worlds_do_not_grow() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .build();
        state.map.systems.get_mut(&SystemId(10)).unwrap().planet_class =
            crate::starmap::PlanetClass::Extreme;
        let before = state.colony_at(SystemId(10)).unwrap().population_units;
        grow_population(&mut state);
        assert_eq!(state.colony_at(SystemId(10)).unwrap().population_units, before);
    }

    #[test]
    fn terraform_completion_upgrades_the_planet() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .build();
        state.map.systems.get_mut(&SystemId(10)).unwrap().planet_class =
            crate::starmap::PlanetClass::Harsh;
        state.colony_at_mut(SystemId(10)).unwrap().terraform =
            Some(crate::colony::TerraformProject {
                target_class: crate::starmap::PlanetClass::Benign,
                turns_remaining: 2,
            });

        let mut events = EventLog::new();
        advance_terraforming(&mut state, &mut events);
        assert!(state.colony_at(SystemId(10)).unwrap().terraform.is_some());
        advance_terraforming(&mut state, &mut events);
        assert!(state.colony_at(SystemId(10)).unwrap().terraform.is_none());
        assert_eq!(
            state.map.get(SystemId(10)).unwrap().planet_class,
            crate::starmap::PlanetClass::Benign
        );
    }
}
