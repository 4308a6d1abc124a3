//! Fog-of-war projection: the per-house view of ground truth.
//!
//! Every player-facing read goes through [`project`], which discards or
//! degrades anything the house is not entitled to know: systems it has
//! never observed are cartographically blank, foreign fleets are reduced
//! to contacts in systems where the house has presence, and foreign
//! colony details come only from graded intelligence reports.
//!
//! The projection is structured in sections so successive turns diff into
//! compact deltas ([`diff_projection`] / [`apply_delta`]): a recipient
//! holding turn N's projection plus the turn N+1 delta reconstructs turn
//! N+1's projection exactly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::colony::Colony;
use crate::diplomacy::DiplomaticStance;
use crate::fleet::{Fleet, Squadron};
use crate::house::{HouseStatus, TechField};
use crate::ids::{FleetId, HouseId, SystemId};
use crate::intel::IntelReport;
use crate::rng::TurnRng;
use crate::starmap::{LaneType, PlanetClass, ResourceRating};
use crate::state::GameState;

/// Full-fidelity view of the viewer's own house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OwnSection {
    pub treasury: i64,
    pub prestige: i32,
    pub collapse_turns: u32,
    pub tax_rate: u32,
    pub tech: BTreeMap<TechField, i32>,
    pub research_points: BTreeMap<TechField, i64>,
    pub ebp: i64,
    pub cip: i64,
    pub status: HouseStatus,
    pub colonies: Vec<Colony>,
    pub fleets: Vec<OwnFleetView>,
}

/// One of the viewer's fleets with its squadrons expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnFleetView {
    pub fleet: Fleet,
    pub squadrons: Vec<Squadron>,
}

/// What everyone knows about a rival house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignHouseView {
    pub name: String,
    pub color: u32,
    /// Prestige is the public scoreboard.
    pub prestige: i32,
    pub eliminated: bool,
    pub stance_toward_viewer: DiplomaticStance,
    pub viewer_stance: DiplomaticStance,
}

/// Static geography, revealed once a system has been observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemGeography {
    pub planet_class: PlanetClass,
    pub resource_rating: ResourceRating,
    /// Adjacent systems with lane types, ascending.
    pub lanes: Vec<(SystemId, LaneType)>,
}

/// A foreign fleet reduced to a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetContact {
    pub fleet: FleetId,
    pub owner: HouseId,
    pub squadron_count: u32,
}

/// A foreign colony as the viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColonyContact {
    pub owner: HouseId,
    pub blockaded: bool,
    /// Freshest colony report, if any. Values carry whatever corruption
    /// the gather applied; quality reflects age.
    pub intel: Option<IntelReport>,
}

/// Per-system view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SystemView {
    /// `None` while the system has never been observed.
    pub geography: Option<SystemGeography>,
    /// True when the viewer has live presence this turn.
    pub observed: bool,
    pub colony: Option<ColonyContact>,
    /// Foreign contacts; own fleets appear in [`OwnSection`] instead.
    pub contacts: Vec<FleetContact>,
}

/// The complete fog-filtered state for one house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FilteredGameState {
    pub viewer: HouseId,
    pub turn: u32,
    pub own: OwnSection,
    pub houses: BTreeMap<HouseId, ForeignHouseView>,
    pub systems: BTreeMap<SystemId, SystemView>,
}

/// Derive the fog-filtered state for `viewer` from ground truth.
pub fn project(state: &GameState, viewer: HouseId) -> FilteredGameState {
    let Some(house) = state.house(viewer) else {
        return FilteredGameState {
            viewer,
            turn: state.turn,
            ..Default::default()
        };
    };

    let mut own = OwnSection {
        treasury: house.treasury,
        prestige: house.prestige.get(),
        collapse_turns: house.collapse_turns,
        tax_rate: house.tax_policy.rate,
        tech: TechField::ALL
            .iter()
            .map(|f| (*f, house.tech.get(*f)))
            .collect(),
        research_points: house.research_points.clone(),
        ebp: house.ebp,
        cip: house.cip,
        status: house.status,
        colonies: Vec::new(),
        fleets: Vec::new(),
    };

    for system in state.colonies_owned_by(viewer) {
        if let Some(colony) = state.colony_at(system) {
            own.colonies.push(colony.clone());
        }
    }
    for fleet_id in state.fleets_owned_by(viewer) {
        if let Some(fleet) = state.fleet(fleet_id) {
            let squadrons = fleet
                .squadrons
                .iter()
                .filter_map(|s| state.squadron(*s).cloned())
                .collect();
            own.fleets.push(OwnFleetView {
                fleet: fleet.clone(),
                squadrons,
            });
        }
    }

    // Rival houses: public scoreboard plus mutual stances
    let mut houses = BTreeMap::new();
    for id in state.all_house_ids() {
        if id == viewer {
            continue;
        }
        let other = &state.houses[&id];
        houses.insert(
            id,
            ForeignHouseView {
                name: other.name.clone(),
                color: other.color,
                prestige: other.prestige.get(),
                eliminated: other.eliminated,
                stance_toward_viewer: state.diplomacy.stance(id, viewer),
                viewer_stance: state.diplomacy.stance(viewer, id),
            },
        );
    }

    // Systems: geography for known ones, live detail where present
    let mut systems = BTreeMap::new();
    let mut system_ids: Vec<SystemId> = state.map.systems.keys().copied().collect();
    system_ids.sort_unstable();
    for system_id in system_ids {
        let known = house.intel.knows(system_id)
            || state.colony_at(system_id).is_some_and(|c| c.owner == viewer)
            || state
                .fleets_in_system(system_id)
                .iter()
                .any(|f| state.fleets[f].owner == viewer);
        if !known {
            continue;
        }

        let sys = &state.map.systems[&system_id];
        let observed = has_presence(state, viewer, system_id);

        let mut view = SystemView {
            geography: Some(SystemGeography {
                planet_class: sys.planet_class,
                resource_rating: sys.resource_rating,
                lanes: state.map.adjacent(system_id),
            }),
            observed,
            colony: None,
            contacts: Vec::new(),
        };

        match state.colony_at(system_id) {
            Some(colony) if colony.owner != viewer => {
                let intel = if observed {
                    None // live observation beats stale reports
                } else {
                    house
                        .intel
                        .latest(system_id, "colony_intel")
                        .cloned()
                };
                // Blockade status is only visible with presence
                view.colony = Some(ColonyContact {
                    owner: colony.owner,
                    blockaded: observed && colony.blockaded,
                    intel,
                });
            }
            _ => {}
        }

        if observed {
            for fleet_id in state.fleets_in_system(system_id) {
                let fleet = &state.fleets[&fleet_id];
                if fleet.owner == viewer {
                    continue;
                }
                view.contacts.push(FleetContact {
                    fleet: fleet_id,
                    owner: fleet.owner,
                    squadron_count: fleet.squadrons.len() as u32,
                });
            }
        }

        systems.insert(system_id, view);
    }

    FilteredGameState {
        viewer,
        turn: state.turn,
        own,
        houses,
        systems,
    }
}

/// Live presence: a fleet or colony of the viewer in the system.
fn has_presence(state: &GameState, viewer: HouseId, system: SystemId) -> bool {
    if state.colony_at(system).is_some_and(|c| c.owner == viewer) {
        return true;
    }
    state
        .fleets_in_system(system)
        .iter()
        .any(|f| state.fleets[f].owner == viewer)
}

/// Record every system a house can currently observe into its intel
/// database. Run once per turn so traversal leaves a chart trail.
pub fn record_observations(state: &mut GameState) {
    for house_id in state.active_house_ids() {
        let mut seen: Vec<SystemId> = Vec::new();
        for system in state.colonies_owned_by(house_id) {
            seen.push(system);
            // A colony observes its lane neighbors' existence
            for (adj, _) in state.map.adjacent(system) {
                seen.push(adj);
            }
        }
        for fleet_id in state.fleets_owned_by(house_id) {
            seen.push(state.fleets[&fleet_id].location);
        }
        if let Some(house) = state.houses.get_mut(&house_id) {
            for system in seen {
                house.intel.mark_known(system);
            }
        }
    }
}

// ============================================================================
// Deltas
// ============================================================================

/// Section-wise difference between two successive projections for the
/// same house. Unchanged sections are `None`; map sections carry changed
/// entries plus removed keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    pub viewer: HouseId,
    pub base_turn: u32,
    pub turn: u32,
    pub own: Option<OwnSection>,
    pub houses_changed: BTreeMap<HouseId, ForeignHouseView>,
    pub houses_removed: Vec<HouseId>,
    pub systems_changed: BTreeMap<SystemId, SystemView>,
    pub systems_removed: Vec<SystemId>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.own.is_none()
            && self.houses_changed.is_empty()
            && self.houses_removed.is_empty()
            && self.systems_changed.is_empty()
            && self.systems_removed.is_empty()
    }
}

/// Diff `next` against `prev` (both projections for the same house).
pub fn diff_projection(prev: &FilteredGameState, next: &FilteredGameState) -> StateDelta {
    let mut delta = StateDelta {
        viewer: next.viewer,
        base_turn: prev.turn,
        turn: next.turn,
        own: None,
        houses_changed: BTreeMap::new(),
        houses_removed: Vec::new(),
        systems_changed: BTreeMap::new(),
        systems_removed: Vec::new(),
    };

    if prev.own != next.own {
        delta.own = Some(next.own.clone());
    }
    for (id, view) in &next.houses {
        if prev.houses.get(id) != Some(view) {
            delta.houses_changed.insert(*id, view.clone());
        }
    }
    for id in prev.houses.keys() {
        if !next.houses.contains_key(id) {
            delta.houses_removed.push(*id);
        }
    }
    for (id, view) in &next.systems {
        if prev.systems.get(id) != Some(view) {
            delta.systems_changed.insert(*id, view.clone());
        }
    }
    for id in prev.systems.keys() {
        if !next.systems.contains_key(id) {
            delta.systems_removed.push(*id);
        }
    }

    delta
}

/// Apply a delta on top of the previous projection.
pub fn apply_delta(prev: &FilteredGameState, delta: &StateDelta) -> FilteredGameState {
    let mut next = prev.clone();
    next.turn = delta.turn;
    if let Some(own) = &delta.own {
        next.own = own.clone();
    }
    for (id, view) in &delta.houses_changed {
        next.houses.insert(*id, view.clone());
    }
    for id in &delta.houses_removed {
        next.houses.remove(id);
    }
    for (id, view) in &delta.systems_changed {
        next.systems.insert(*id, view.clone());
    }
    for id in &delta.systems_removed {
        next.systems.remove(id);
    }
    next
}

/// Corrupt a colony report's numeric fields with deterministic jitter.
/// Applied when the gatherer fails the defender's CIC check.
pub fn corrupt_report(report: &mut IntelReport, rng: &TurnRng, scout_key: u64) {
    use crate::defines::espionage::CORRUPTION_SPREAD_PCT;
    let mut stream = rng.stream("intel-corruption", &[scout_key]);
    if let crate::intel::ReportBody::ColonyIntel {
        population_units,
        industrial_units,
        ..
    } = &mut report.body
    {
        let pu_spread = (*population_units * CORRUPTION_SPREAD_PCT) / 100;
        let iu_spread = (*industrial_units * CORRUPTION_SPREAD_PCT) / 100;
        *population_units = (*population_units + stream.jitter(pu_spread)).max(0);
        *industrial_units = (*industrial_units + stream.jitter(iu_spread)).max(0);
    }
    report.quality_pct = report.quality_pct.saturating_sub(50);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::ShipClass;
    use crate::testing::GameStateBuilder;

    fn two_house_state() -> GameState {
        GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(1), SystemId(10))
            .with_colony(HouseId(2), SystemId(11))
            .with_fleet(HouseId(1), SystemId(10), &[ShipClass::Cruiser])
            .with_fleet(HouseId(2), SystemId(11), &[ShipClass::Destroyer, ShipClass::Scout])
            .build()
    }

    #[test]
    fn viewer_sees_own_assets_fully() {
        let state = two_house_state();
        let view = project(&state, HouseId(1));
        assert_eq!(view.own.colonies.len(), 1);
        assert_eq!(view.own.fleets.len(), 1);
        assert_eq!(view.own.fleets[0].squadrons.len(), 1);
    }

    #[test]
    fn unknown_systems_are_blank() {
        let state = two_house_state();
        let view = project(&state, HouseId(1));
        // House 1 has never seen system 11
        assert!(!view.systems.contains_key(&SystemId(11)));
    }

    #[test]
    fn foreign_fleets_reduce_to_contacts_with_presence() {
        let mut state = two_house_state();
        // Move house 2's fleet into house 1's home system
        let fleet2 = state.fleets_owned_by(HouseId(2))[0];
        state.move_fleet(fleet2, SystemId(10));

        let view = project(&state, HouseId(1));
        let sys = &view.systems[&SystemId(10)];
        assert!(sys.observed);
        assert_eq!(sys.contacts.len(), 1);
        assert_eq!(sys.contacts[0].owner, HouseId(2));
        assert_eq!(sys.contacts[0].squadron_count, 2);
        // Composition is hidden: only a count crosses the fog
    }

    #[test]
    fn delta_round_trip_reconstructs_projection() {
        let mut state = two_house_state();
        record_observations(&mut state);
        let before = project(&state, HouseId(1));

        // Mutate: treasury change and a fleet move into view
        state.houses.get_mut(&HouseId(1)).unwrap().treasury += 500;
        let fleet2 = state.fleets_owned_by(HouseId(2))[0];
        state.move_fleet(fleet2, SystemId(10));
        state.turn += 1;

        let after = project(&state, HouseId(1));
        let delta = diff_projection(&before, &after);
        assert!(!delta.is_empty());

        let rebuilt = apply_delta(&before, &delta);
        assert_eq!(rebuilt, after);
    }

    #[test]
    fn empty_delta_for_unchanged_state() {
        let state = two_house_state();
        let a = project(&state, HouseId(2));
        let b = project(&state, HouseId(2));
        let delta = diff_projection(&a, &b);
        assert!(delta.is_empty());
        assert_eq!(apply_delta(&a, &delta), b);
    }

    #[test]
    fn corruption_jitters_but_stays_non_negative() {
        let rng = TurnRng::new(77, 3);
        let mut report = IntelReport {
            subject: SystemId(5),
            gathered_turn: 3,
            quality_pct: 100,
            body: crate::intel::ReportBody::ColonyIntel {
                owner: HouseId(2),
                population_units: 10,
                industrial_units: 10,
                infrastructure: 3,
                shield_level: 0,
                ground_batteries: 0,
                ground_forces: 0,
            },
        };
        corrupt_report(&mut report, &rng, 1);
        assert_eq!(report.quality_pct, 50);
        if let crate::intel::ReportBody::ColonyIntel {
            population_units, ..
        } = report.body
        {
            assert!(population_units >= 0);
        }
    }
}
