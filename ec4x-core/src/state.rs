//! The authoritative game state container.
//!
//! `GameState` exclusively owns every entity. Cross-references are IDs
//! resolved through the container; there are no back-pointers. Secondary
//! indices (fleets-by-system, colonies-by-owner, fleets-by-owner) are
//! maintained by the mutation helpers here and rebuilt from primary
//! storage on load; a rebuild must always reproduce the live indices.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use thiserror::Error;

pub use im::HashMap;
use rustc_hash::FxHashMap;

use crate::colony::Colony;
use crate::diplomacy::DiplomacyState;
use crate::events::PrestigeReason;
use crate::fleet::{Fleet, MissionState, ShipClass, Squadron};
use crate::house::House;
use crate::ids::{FleetId, HouseId, SpyScoutId, SquadronId, SystemId};
use crate::intel::{OngoingEffect, SpyScout};
use crate::projection::FilteredGameState;
use crate::starmap::StarMap;

/// The four phases of a turn, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TurnPhase {
    #[default]
    Conflict,
    Income,
    Command,
    Maintenance,
}

/// A prestige change queued during the turn; applied in one batch by the
/// income phase so ordering cannot leak into intermediate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrestigeAward {
    pub house: HouseId,
    pub delta: i32,
    pub reason: PrestigeReason,
}

/// Where a squadron is contained. Every squadron lives in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquadronContainer {
    Fleet(FleetId),
    ColonyUnassigned(SystemId),
    ColonyFighters(SystemId),
    CarrierHangar(SquadronId),
}

/// Fatal state corruption. A turn that trips one of these is aborted and
/// rolled back; no partial state is exposed.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("dangling reference: {context} refers to missing {entity}")]
    Dangling { context: String, entity: String },
    #[error("squadron {squadron} owner {squadron_owner} differs from container owner {container_owner}")]
    OwnerMismatch {
        squadron: SquadronId,
        squadron_owner: HouseId,
        container_owner: HouseId,
    },
    #[error("squadron {squadron} appears in {count} containers")]
    ContainmentViolation { squadron: SquadronId, count: usize },
    #[error("secondary index out of sync: {which}")]
    IndexDesync { which: String },
    #[error("negative resource on {context}: {value}")]
    NegativeResource { context: String, value: i64 },
    #[error("house {house} treasury {treasury} below the debt floor")]
    DebtFloorBreached { house: HouseId, treasury: i64 },
    #[error("fighter capacity exceeded without a violation tracker at colony {colony}")]
    UnflaggedCapacityViolation { colony: SystemId },
    #[error("fleet {fleet} is executing away from its command target")]
    ExecutingOffTarget { fleet: FleetId },
    #[error("eliminated house {house} still owns assets")]
    EliminatedHouseOwnsAssets { house: HouseId },
    #[error("scout-locked fleet {fleet} still holds squadrons")]
    ScoutLockedFleetNotEmpty { fleet: FleetId },
}

/// Secondary lookup tables. Never serialized; rebuilt from primaries.
#[derive(Debug, Clone, Default)]
pub struct StateIndices {
    pub fleets_by_system: FxHashMap<SystemId, Vec<FleetId>>,
    pub fleets_by_owner: FxHashMap<HouseId, Vec<FleetId>>,
    pub colonies_by_owner: FxHashMap<HouseId, Vec<SystemId>>,
}

impl StateIndices {
    fn insert_sorted<K: Copy + Eq + Hash, V: Ord + Copy>(
        map: &mut FxHashMap<K, Vec<V>>,
        key: K,
        value: V,
    ) {
        let entry = map.entry(key).or_default();
        if let Err(pos) = entry.binary_search(&value) {
            entry.insert(pos, value);
        }
    }

    fn remove_entry<K: Copy + Eq + Hash, V: Ord + Copy>(
        map: &mut FxHashMap<K, Vec<V>>,
        key: K,
        value: V,
    ) {
        if let Some(entry) = map.get_mut(&key) {
            if let Ok(pos) = entry.binary_search(&value) {
                entry.remove(pos);
            }
            if entry.is_empty() {
                map.remove(&key);
            }
        }
    }

    /// Rebuild every table from primary storage.
    pub fn rebuild(
        fleets: &HashMap<FleetId, Fleet>,
        colonies: &HashMap<SystemId, Colony>,
    ) -> Self {
        let mut out = Self::default();
        let mut fleet_ids: Vec<FleetId> = fleets.keys().copied().collect();
        fleet_ids.sort_unstable();
        for id in fleet_ids {
            let fleet = &fleets[&id];
            Self::insert_sorted(&mut out.fleets_by_system, fleet.location, id);
            Self::insert_sorted(&mut out.fleets_by_owner, fleet.owner, id);
        }
        let mut colony_ids: Vec<SystemId> = colonies.keys().copied().collect();
        colony_ids.sort_unstable();
        for id in colony_ids {
            let colony = &colonies[&id];
            Self::insert_sorted(&mut out.colonies_by_owner, colony.owner, id);
        }
        out
    }

    fn equivalent(&self, other: &Self) -> bool {
        fn normalize<K: Copy + Ord + Eq + Hash, V: Copy + Ord>(
            map: &FxHashMap<K, Vec<V>>,
        ) -> BTreeMap<K, Vec<V>> {
            map.iter().map(|(k, v)| (*k, v.clone())).collect()
        }
        normalize(&self.fleets_by_system) == normalize(&other.fleets_by_system)
            && normalize(&self.fleets_by_owner) == normalize(&other.fleets_by_owner)
            && normalize(&self.colonies_by_owner) == normalize(&other.colonies_by_owner)
    }
}

/// Serialize an `im::HashMap` in sorted key order, so snapshot bytes are
/// identical for equal states regardless of process hash seeding.
fn sorted_map<K, V, S>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    K: Ord + Clone + Hash + Eq + serde::Serialize,
    V: Clone + serde::Serialize,
    S: serde::Serializer,
{
    let ordered: BTreeMap<K, V> = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    serde::Serialize::serialize(&ordered, serializer)
}

/// Complete game state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameState {
    pub game_id: String,
    pub turn: u32,
    pub phase: TurnPhase,
    pub rng_seed: u64,
    pub map: StarMap,
    #[serde(serialize_with = "sorted_map")]
    pub houses: HashMap<HouseId, House>,
    #[serde(serialize_with = "sorted_map")]
    pub colonies: HashMap<SystemId, Colony>,
    #[serde(serialize_with = "sorted_map")]
    pub fleets: HashMap<FleetId, Fleet>,
    #[serde(serialize_with = "sorted_map")]
    pub squadrons: HashMap<SquadronId, Squadron>,
    #[serde(serialize_with = "sorted_map")]
    pub spy_scouts: HashMap<SpyScoutId, SpyScout>,
    pub diplomacy: DiplomacyState,
    /// Active espionage effects, decremented each income phase.
    pub ongoing_effects: Vec<OngoingEffect>,
    /// Salvageable wreckage PP per system.
    #[serde(serialize_with = "sorted_map")]
    pub wreckage: HashMap<SystemId, i64>,
    /// Prestige changes queued this turn; drained by income step 9.
    pub pending_prestige: Vec<PrestigeAward>,
    /// Per-house projection from the previous turn, for delta diffing.
    pub last_projections: BTreeMap<HouseId, FilteredGameState>,
    pub winner: Option<HouseId>,
    pub next_fleet_id: u32,
    pub next_squadron_id: u32,
    pub next_scout_id: u32,
    pub next_facility_id: u32,
    pub next_ship_id: u32,
    #[serde(skip)]
    pub indices: StateIndices,
}

impl PartialEq for GameState {
    fn eq(&self, other: &Self) -> bool {
        // Indices are derived data; two states are equal when their
        // primary storage is.
        self.game_id == other.game_id
            && self.turn == other.turn
            && self.phase == other.phase
            && self.rng_seed == other.rng_seed
            && self.map == other.map
            && self.houses == other.houses
            && self.colonies == other.colonies
            && self.fleets == other.fleets
            && self.squadrons == other.squadrons
            && self.spy_scouts == other.spy_scouts
            && self.diplomacy == other.diplomacy
            && self.ongoing_effects == other.ongoing_effects
            && self.wreckage == other.wreckage
            && self.pending_prestige == other.pending_prestige
            && self.last_projections == other.last_projections
            && self.winner == other.winner
            && self.next_fleet_id == other.next_fleet_id
            && self.next_squadron_id == other.next_squadron_id
            && self.next_scout_id == other.next_scout_id
            && self.next_facility_id == other.next_facility_id
            && self.next_ship_id == other.next_ship_id
    }
}

impl Eq for GameState {}

impl GameState {
    /// Create a fresh game: procedural map, one house per player seated
    /// at its homeworld with a starter colony and picket fleet.
    /// Deterministic for the same `(player_count, seed)` pair.
    pub fn new_game(game_id: impl Into<String>, player_count: u32, seed: u64) -> GameState {
        use crate::defines::economy;

        const HOUSE_COLORS: [u32; 12] = [
            0xc0392b, 0x2980b9, 0x27ae60, 0xf39c12, 0x8e44ad, 0x16a085, 0xd35400, 0x2c3e50,
            0x7f8c8d, 0xe91e63, 0x795548, 0x3f51b5,
        ];

        let mut mapgen = crate::rng::TurnRng::new(seed, 0).stream("mapgen", &[u64::from(player_count)]);
        let map = crate::starmap::generate(player_count, &mut mapgen);

        let mut state = GameState {
            game_id: game_id.into(),
            rng_seed: seed,
            map,
            ..Default::default()
        };

        for (house_id, system) in state.map.homeworlds() {
            let color = HOUSE_COLORS[(house_id.0 as usize - 1) % HOUSE_COLORS.len()];
            let mut house = House::new(house_id, format!("House {house_id}"), color, system);
            house.treasury = economy::STARTING_TREASURY;
            house.intel.mark_known(system);
            state.add_house(house);

            let mut colony = Colony::new(system, house_id, economy::STARTING_PU);
            colony.industrial_units = economy::STARTING_IU;
            colony.infrastructure = economy::STARTING_INFRASTRUCTURE;
            colony.ground_forces = economy::STARTING_GROUND_FORCES;
            state.add_colony(colony);

            // Picket fleet: eyes and a token escort
            let fleet_id = state.allocate_fleet_id();
            let mut fleet = Fleet::new(fleet_id, house_id, system);
            for class in [ShipClass::Scout, ShipClass::Corvette, ShipClass::Corvette] {
                let sid = state.allocate_squadron_id();
                state.add_squadron(Squadron::new(sid, house_id, class, 0, system));
                fleet.squadrons.push(sid);
            }
            state.add_fleet(fleet);
        }

        state
    }

    /// Restore derived data after deserialization.
    pub fn after_load(&mut self) {
        self.indices = StateIndices::rebuild(&self.fleets, &self.colonies);
    }

    // =========================================================================
    // ID allocation
    // =========================================================================

    pub fn allocate_fleet_id(&mut self) -> FleetId {
        self.next_fleet_id += 1;
        FleetId(self.next_fleet_id)
    }

    pub fn allocate_squadron_id(&mut self) -> SquadronId {
        self.next_squadron_id += 1;
        SquadronId(self.next_squadron_id)
    }

    pub fn allocate_scout_id(&mut self) -> SpyScoutId {
        self.next_scout_id += 1;
        SpyScoutId(self.next_scout_id)
    }

    pub fn allocate_facility_id(&mut self) -> crate::ids::FacilityId {
        self.next_facility_id += 1;
        crate::ids::FacilityId(self.next_facility_id)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn house(&self, id: HouseId) -> Option<&House> {
        self.houses.get(&id)
    }

    pub fn house_mut(&mut self, id: HouseId) -> Option<&mut House> {
        self.houses.get_mut(&id)
    }

    pub fn colony_at(&self, system: SystemId) -> Option<&Colony> {
        self.colonies.get(&system)
    }

    pub fn colony_at_mut(&mut self, system: SystemId) -> Option<&mut Colony> {
        self.colonies.get_mut(&system)
    }

    pub fn fleet(&self, id: FleetId) -> Option<&Fleet> {
        self.fleets.get(&id)
    }

    pub fn fleet_mut(&mut self, id: FleetId) -> Option<&mut Fleet> {
        self.fleets.get_mut(&id)
    }

    pub fn squadron(&self, id: SquadronId) -> Option<&Squadron> {
        self.squadrons.get(&id)
    }

    pub fn squadron_mut(&mut self, id: SquadronId) -> Option<&mut Squadron> {
        self.squadrons.get_mut(&id)
    }

    /// All house IDs, ascending.
    pub fn all_house_ids(&self) -> Vec<HouseId> {
        let mut ids: Vec<HouseId> = self.houses.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Non-eliminated house IDs, ascending.
    pub fn active_house_ids(&self) -> Vec<HouseId> {
        self.all_house_ids()
            .into_iter()
            .filter(|id| self.houses[id].is_active())
            .collect()
    }

    /// Fleet IDs stationed in a system, ascending.
    pub fn fleets_in_system(&self, system: SystemId) -> Vec<FleetId> {
        self.indices
            .fleets_by_system
            .get(&system)
            .cloned()
            .unwrap_or_default()
    }

    /// `(fleets, colony present?)` for a system.
    pub fn entities_in_system(&self, system: SystemId) -> (Vec<FleetId>, Option<&Colony>) {
        (self.fleets_in_system(system), self.colony_at(system))
    }

    pub fn colonies_owned_by(&self, house: HouseId) -> Vec<SystemId> {
        self.indices
            .colonies_by_owner
            .get(&house)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fleets_owned_by(&self, house: HouseId) -> Vec<FleetId> {
        self.indices
            .fleets_by_owner
            .get(&house)
            .cloned()
            .unwrap_or_default()
    }

    /// Houses with any presence (fleet or colony) in a system, ascending.
    pub fn houses_in_system(&self, system: SystemId) -> Vec<HouseId> {
        let mut houses: Vec<HouseId> = self
            .fleets_in_system(system)
            .iter()
            .filter_map(|f| self.fleets.get(f).map(|fl| fl.owner))
            .collect();
        if let Some(colony) = self.colony_at(system) {
            houses.push(colony.owner);
        }
        houses.sort_unstable();
        houses.dedup();
        houses
    }

    /// Where a squadron is contained, if anywhere.
    pub fn container_of(&self, squadron: SquadronId) -> Option<SquadronContainer> {
        let mut fleet_ids: Vec<FleetId> = self.fleets.keys().copied().collect();
        fleet_ids.sort_unstable();
        for id in fleet_ids {
            if self.fleets[&id].squadrons.contains(&squadron) {
                return Some(SquadronContainer::Fleet(id));
            }
        }
        let mut colony_ids: Vec<SystemId> = self.colonies.keys().copied().collect();
        colony_ids.sort_unstable();
        for id in colony_ids {
            let colony = &self.colonies[&id];
            if colony.unassigned_squadrons.contains(&squadron) {
                return Some(SquadronContainer::ColonyUnassigned(id));
            }
            if colony.fighter_squadrons.contains(&squadron) {
                return Some(SquadronContainer::ColonyFighters(id));
            }
        }
        let mut squadron_ids: Vec<SquadronId> = self.squadrons.keys().copied().collect();
        squadron_ids.sort_unstable();
        for id in squadron_ids {
            if self.squadrons[&id].embarked_fighters.contains(&squadron) {
                return Some(SquadronContainer::CarrierHangar(id));
            }
        }
        None
    }

    /// Squadron count for a house, embarked fighters included.
    pub fn squadron_count(&self, house: HouseId) -> u32 {
        self.squadrons
            .values()
            .filter(|s| s.owner == house)
            .count() as u32
    }

    /// Capital squadron count for a house.
    pub fn capital_squadron_count(&self, house: HouseId) -> u32 {
        self.squadrons
            .values()
            .filter(|s| s.owner == house && s.flagship.is_capital())
            .count() as u32
    }

    pub fn planet_breaker_count(&self, house: HouseId) -> u32 {
        self.squadrons
            .values()
            .filter(|s| s.owner == house && s.flagship == ShipClass::PlanetBreaker)
            .count() as u32
    }

    /// True when every squadron in the fleet is a scout.
    pub fn fleet_is_scout_only(&self, fleet: &Fleet) -> bool {
        !fleet.squadrons.is_empty()
            && fleet.squadrons.iter().all(|s| {
                self.squadrons
                    .get(s)
                    .is_some_and(|sq| sq.flagship == ShipClass::Scout)
            })
    }

    // =========================================================================
    // Mutation helpers (keep indices in sync)
    // =========================================================================

    pub fn add_house(&mut self, house: House) {
        self.houses.insert(house.id, house);
    }

    pub fn add_colony(&mut self, colony: Colony) {
        StateIndices::insert_sorted(
            &mut self.indices.colonies_by_owner,
            colony.owner,
            colony.system,
        );
        self.colonies.insert(colony.system, colony);
    }

    pub fn remove_colony(&mut self, system: SystemId) -> Option<Colony> {
        let colony = self.colonies.remove(&system)?;
        StateIndices::remove_entry(&mut self.indices.colonies_by_owner, colony.owner, system);
        Some(colony)
    }

    /// Hand a colony to a new owner, keeping indices aligned.
    pub fn transfer_colony(&mut self, system: SystemId, new_owner: HouseId) {
        let Some(colony) = self.colonies.get_mut(&system) else {
            return;
        };
        let old_owner = colony.owner;
        if old_owner == new_owner {
            return;
        }
        colony.owner = new_owner;
        StateIndices::remove_entry(&mut self.indices.colonies_by_owner, old_owner, system);
        StateIndices::insert_sorted(&mut self.indices.colonies_by_owner, new_owner, system);
    }

    pub fn add_fleet(&mut self, fleet: Fleet) {
        StateIndices::insert_sorted(&mut self.indices.fleets_by_system, fleet.location, fleet.id);
        StateIndices::insert_sorted(&mut self.indices.fleets_by_owner, fleet.owner, fleet.id);
        self.fleets.insert(fleet.id, fleet);
    }

    pub fn remove_fleet(&mut self, id: FleetId) -> Option<Fleet> {
        let fleet = self.fleets.remove(&id)?;
        StateIndices::remove_entry(&mut self.indices.fleets_by_system, fleet.location, id);
        StateIndices::remove_entry(&mut self.indices.fleets_by_owner, fleet.owner, id);
        Some(fleet)
    }

    /// Relocate a fleet and every squadron aboard it.
    pub fn move_fleet(&mut self, id: FleetId, to: SystemId) {
        let Some(fleet) = self.fleets.get_mut(&id) else {
            return;
        };
        let from = fleet.location;
        if from == to {
            return;
        }
        fleet.location = to;
        let squadron_ids = fleet.squadrons.clone();
        StateIndices::remove_entry(&mut self.indices.fleets_by_system, from, id);
        StateIndices::insert_sorted(&mut self.indices.fleets_by_system, to, id);
        for sid in squadron_ids {
            let embarked = if let Some(squadron) = self.squadrons.get_mut(&sid) {
                squadron.location = to;
                squadron.embarked_fighters.clone()
            } else {
                Vec::new()
            };
            for fid in embarked {
                if let Some(fighter) = self.squadrons.get_mut(&fid) {
                    fighter.location = to;
                }
            }
        }
    }

    pub fn add_squadron(&mut self, squadron: Squadron) {
        self.squadrons.insert(squadron.id, squadron);
    }

    /// Remove a squadron from primary storage and whatever contains it.
    /// Embarked fighters of a removed carrier are NOT cascaded; callers
    /// decide their fate first.
    pub fn remove_squadron(&mut self, id: SquadronId) -> Option<Squadron> {
        match self.container_of(id) {
            Some(SquadronContainer::Fleet(fid)) => {
                if let Some(fleet) = self.fleets.get_mut(&fid) {
                    fleet.squadrons.retain(|s| *s != id);
                }
            }
            Some(SquadronContainer::ColonyUnassigned(cid)) => {
                if let Some(colony) = self.colonies.get_mut(&cid) {
                    colony.unassigned_squadrons.retain(|s| *s != id);
                }
            }
            Some(SquadronContainer::ColonyFighters(cid)) => {
                if let Some(colony) = self.colonies.get_mut(&cid) {
                    colony.fighter_squadrons.retain(|s| *s != id);
                }
            }
            Some(SquadronContainer::CarrierHangar(carrier)) => {
                if let Some(carrier) = self.squadrons.get_mut(&carrier) {
                    carrier.embarked_fighters.retain(|s| *s != id);
                }
            }
            None => {}
        }
        self.squadrons.remove(&id)
    }

    /// Record wreckage at a system.
    pub fn add_wreckage(&mut self, system: SystemId, value_pp: i64) {
        if value_pp <= 0 {
            return;
        }
        let current = self.wreckage.get(&system).copied().unwrap_or(0);
        self.wreckage.insert(system, current + value_pp);
    }

    /// Queue a prestige change for income-phase application.
    pub fn award_prestige(&mut self, house: HouseId, delta: i32, reason: PrestigeReason) {
        self.pending_prestige.push(PrestigeAward { house, delta, reason });
    }

    // =========================================================================
    // Checksum
    // =========================================================================

    /// Deterministic checksum over simulation-relevant state.
    ///
    /// Used for desync detection and replay validation. Uses a stable
    /// FNV-based hasher so the value survives toolchain upgrades.
    pub fn checksum(&self) -> u64 {
        let mut hasher = StableHasher::default();

        self.turn.hash(&mut hasher);
        self.rng_seed.hash(&mut hasher);
        self.winner.hash(&mut hasher);

        for id in self.all_house_ids() {
            let h = &self.houses[&id];
            id.hash(&mut hasher);
            h.treasury.hash(&mut hasher);
            h.prestige.get().hash(&mut hasher);
            h.collapse_turns.hash(&mut hasher);
            h.tax_policy.rate.hash(&mut hasher);
            h.ebp.hash(&mut hasher);
            h.cip.hash(&mut hasher);
            h.eliminated.hash(&mut hasher);
            for field in crate::house::TechField::ALL {
                h.tech.get(field).hash(&mut hasher);
            }
        }

        let mut colony_ids: Vec<SystemId> = self.colonies.keys().copied().collect();
        colony_ids.sort_unstable();
        for id in colony_ids {
            let c = &self.colonies[&id];
            id.hash(&mut hasher);
            c.owner.hash(&mut hasher);
            c.population_units.hash(&mut hasher);
            c.industrial_units.hash(&mut hasher);
            c.infrastructure.hash(&mut hasher);
            c.blockaded.hash(&mut hasher);
            c.fighter_squadrons.hash(&mut hasher);
            c.unassigned_squadrons.hash(&mut hasher);
            c.ground_batteries.hash(&mut hasher);
            c.ground_forces.hash(&mut hasher);
            c.shield_level.hash(&mut hasher);
            c.last_production.hash(&mut hasher);
        }

        let mut fleet_ids: Vec<FleetId> = self.fleets.keys().copied().collect();
        fleet_ids.sort_unstable();
        for id in fleet_ids {
            let f = &self.fleets[&id];
            id.hash(&mut hasher);
            f.owner.hash(&mut hasher);
            f.location.hash(&mut hasher);
            f.squadrons.hash(&mut hasher);
            f.mission.hash(&mut hasher);
            f.route.hash(&mut hasher);
        }

        let mut squadron_ids: Vec<SquadronId> = self.squadrons.keys().copied().collect();
        squadron_ids.sort_unstable();
        for id in squadron_ids {
            let s = &self.squadrons[&id];
            id.hash(&mut hasher);
            s.owner.hash(&mut hasher);
            s.flagship.hash(&mut hasher);
            s.tech_level.hash(&mut hasher);
            s.location.hash(&mut hasher);
            s.state.hash(&mut hasher);
            s.embarked_fighters.hash(&mut hasher);
        }

        let mut scout_ids: Vec<SpyScoutId> = self.spy_scouts.keys().copied().collect();
        scout_ids.sort_unstable();
        for id in scout_ids {
            let s = &self.spy_scouts[&id];
            id.hash(&mut hasher);
            s.owner.hash(&mut hasher);
            s.location.hash(&mut hasher);
            s.path_index.hash(&mut hasher);
            s.mesh_count.hash(&mut hasher);
            s.state.hash(&mut hasher);
        }

        for (&(a, b), rel) in &self.diplomacy.relations {
            a.hash(&mut hasher);
            b.hash(&mut hasher);
            rel.stance.hash(&mut hasher);
            rel.dishonor_turns.hash(&mut hasher);
            rel.isolation_turns.hash(&mut hasher);
        }

        let mut wreck_ids: Vec<SystemId> = self.wreckage.keys().copied().collect();
        wreck_ids.sort_unstable();
        for id in wreck_ids {
            id.hash(&mut hasher);
            self.wreckage[&id].hash(&mut hasher);
        }

        hasher.finish()
    }

    // =========================================================================
    // Integrity validation
    // =========================================================================

    /// Check every structural invariant. Called at phase boundaries in
    /// debug builds and asserted by the test suite on every turn.
    pub fn validate(&self) -> Result<(), IntegrityError> {
        self.validate_references()?;
        self.validate_containment()?;
        self.validate_resources()?;
        self.validate_missions()?;
        self.validate_eliminated()?;
        self.validate_indices()?;
        Ok(())
    }

    /// Capacity bookkeeping check, valid only after income-phase
    /// enforcement has run: any over-cap fighter roster must carry a
    /// violation tracker. (Mid-turn, a fresh violation is legitimately
    /// unflagged until step 7 sees it.)
    pub fn validate_capacity_flags(&self) -> Result<(), IntegrityError> {
        let mut colony_ids: Vec<SystemId> = self.colonies.keys().copied().collect();
        colony_ids.sort_unstable();
        for id in colony_ids {
            let colony = &self.colonies[&id];
            let Some(house) = self.houses.get(&colony.owner) else {
                continue;
            };
            let fd = house.tech.get(crate::house::TechField::Fd);
            if colony.fighter_load() > colony.fighter_cap(fd) && colony.fighter_violation.is_none()
            {
                return Err(IntegrityError::UnflaggedCapacityViolation { colony: id });
            }
        }
        Ok(())
    }

    fn validate_references(&self) -> Result<(), IntegrityError> {
        for fleet in self.fleets.values() {
            if !self.houses.contains_key(&fleet.owner) {
                return Err(IntegrityError::Dangling {
                    context: format!("fleet {}", fleet.id),
                    entity: format!("house {}", fleet.owner),
                });
            }
            if !self.map.systems.contains_key(&fleet.location) {
                return Err(IntegrityError::Dangling {
                    context: format!("fleet {}", fleet.id),
                    entity: format!("system {}", fleet.location),
                });
            }
            for sid in &fleet.squadrons {
                let Some(squadron) = self.squadrons.get(sid) else {
                    return Err(IntegrityError::Dangling {
                        context: format!("fleet {}", fleet.id),
                        entity: format!("squadron {sid}"),
                    });
                };
                if squadron.owner != fleet.owner {
                    return Err(IntegrityError::OwnerMismatch {
                        squadron: *sid,
                        squadron_owner: squadron.owner,
                        container_owner: fleet.owner,
                    });
                }
            }
        }
        for colony in self.colonies.values() {
            if !self.houses.contains_key(&colony.owner) {
                return Err(IntegrityError::Dangling {
                    context: format!("colony {}", colony.system),
                    entity: format!("house {}", colony.owner),
                });
            }
            if !self.map.systems.contains_key(&colony.system) {
                return Err(IntegrityError::Dangling {
                    context: format!("colony {}", colony.system),
                    entity: format!("system {}", colony.system),
                });
            }
            for sid in colony.unassigned_squadrons.iter().chain(&colony.fighter_squadrons) {
                let Some(squadron) = self.squadrons.get(sid) else {
                    return Err(IntegrityError::Dangling {
                        context: format!("colony {}", colony.system),
                        entity: format!("squadron {sid}"),
                    });
                };
                if squadron.owner != colony.owner {
                    return Err(IntegrityError::OwnerMismatch {
                        squadron: *sid,
                        squadron_owner: squadron.owner,
                        container_owner: colony.owner,
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_containment(&self) -> Result<(), IntegrityError> {
        let mut squadron_ids: Vec<SquadronId> = self.squadrons.keys().copied().collect();
        squadron_ids.sort_unstable();
        for id in squadron_ids {
            let mut count = 0usize;
            for fleet in self.fleets.values() {
                count += fleet.squadrons.iter().filter(|s| **s == id).count();
            }
            for colony in self.colonies.values() {
                count += colony.unassigned_squadrons.iter().filter(|s| **s == id).count();
                count += colony.fighter_squadrons.iter().filter(|s| **s == id).count();
            }
            for squadron in self.squadrons.values() {
                count += squadron.embarked_fighters.iter().filter(|s| **s == id).count();
            }
            if count != 1 {
                return Err(IntegrityError::ContainmentViolation { squadron: id, count });
            }
        }
        Ok(())
    }

    fn validate_resources(&self) -> Result<(), IntegrityError> {
        for (id, house) in &self.houses {
            if house.treasury <= -10_000 {
                return Err(IntegrityError::DebtFloorBreached {
                    house: *id,
                    treasury: house.treasury,
                });
            }
        }
        for colony in self.colonies.values() {
            if colony.population_units < 0 {
                return Err(IntegrityError::NegativeResource {
                    context: format!("colony {} population", colony.system),
                    value: colony.population_units,
                });
            }
            if colony.industrial_units < 0 {
                return Err(IntegrityError::NegativeResource {
                    context: format!("colony {} industry", colony.system),
                    value: colony.industrial_units,
                });
            }
        }
        Ok(())
    }

    fn validate_missions(&self) -> Result<(), IntegrityError> {
        let mut fleet_ids: Vec<FleetId> = self.fleets.keys().copied().collect();
        fleet_ids.sort_unstable();
        for id in fleet_ids {
            let fleet = &self.fleets[&id];
            if fleet.mission == MissionState::Executing {
                match &fleet.command {
                    Some(cmd) if cmd.destination(fleet.location) == fleet.location => {}
                    _ => return Err(IntegrityError::ExecutingOffTarget { fleet: id }),
                }
            }
            if fleet.mission == MissionState::ScoutLocked && !fleet.squadrons.is_empty() {
                return Err(IntegrityError::ScoutLockedFleetNotEmpty { fleet: id });
            }
        }
        Ok(())
    }

    fn validate_eliminated(&self) -> Result<(), IntegrityError> {
        for id in self.all_house_ids() {
            let house = &self.houses[&id];
            if !house.eliminated {
                continue;
            }
            if !self.colonies_owned_by(id).is_empty() {
                return Err(IntegrityError::EliminatedHouseOwnsAssets { house: id });
            }
            let fleets = self.fleets_owned_by(id);
            if fleets.is_empty() {
                continue;
            }
            // Tolerated only when no fleet carries marines
            let carries_marines = fleets.iter().any(|f| {
                self.fleets[f].squadrons.iter().any(|s| {
                    self.squadrons.get(s).is_some_and(|sq| sq.carries_marines())
                })
            });
            if carries_marines {
                return Err(IntegrityError::EliminatedHouseOwnsAssets { house: id });
            }
        }
        Ok(())
    }

    fn validate_indices(&self) -> Result<(), IntegrityError> {
        let rebuilt = StateIndices::rebuild(&self.fleets, &self.colonies);
        if !self.indices.equivalent(&rebuilt) {
            return Err(IntegrityError::IndexDesync {
                which: "fleet/colony indices".into(),
            });
        }
        Ok(())
    }
}

/// FNV-1a backed `Hasher` with stable output across toolchains.
#[derive(Default)]
struct StableHasher {
    state: u64,
}

impl StableHasher {
    fn absorb(&mut self, bytes: &[u8]) {
        if self.state == 0 {
            self.state = 0xcbf2_9ce4_8422_2325;
        }
        for &b in bytes {
            self.state ^= u64::from(b);
            self.state = self.state.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
}

impl Hasher for StableHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        self.absorb(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GameStateBuilder;

    #[test]
    fn indices_match_rebuild_after_mutations() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(1), SystemId(10))
            .with_fleet(HouseId(1), SystemId(10), &[ShipClass::Cruiser])
            .with_fleet(HouseId(2), SystemId(11), &[ShipClass::Destroyer])
            .build();

        let fleet_id = state.fleets_owned_by(HouseId(1))[0];
        state.move_fleet(fleet_id, SystemId(11));
        state.transfer_colony(SystemId(10), HouseId(2));

        assert!(state.validate().is_ok());
        assert_eq!(state.fleets_in_system(SystemId(11)).len(), 2);
        assert!(state.colonies_owned_by(HouseId(1)).is_empty());
        assert_eq!(state.colonies_owned_by(HouseId(2)), vec![SystemId(10)]);
    }

    #[test]
    fn checksum_stable_and_sensitive() {
        let state = GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(1), SystemId(10))
            .build();
        assert_eq!(state.checksum(), state.checksum());

        let mut altered = state.clone();
        altered.houses.get_mut(&HouseId(1)).unwrap().treasury += 1;
        assert_ne!(state.checksum(), altered.checksum());
    }

    #[test]
    fn squadron_in_two_containers_is_caught() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_colony(HouseId(1), SystemId(10))
            .with_fleet(HouseId(1), SystemId(10), &[ShipClass::Corvette])
            .build();

        let sid = state.fleets.values().next().unwrap().squadrons[0];
        state
            .colonies
            .get_mut(&SystemId(10))
            .unwrap()
            .unassigned_squadrons
            .push(sid);

        assert!(matches!(
            state.validate(),
            Err(IntegrityError::ContainmentViolation { .. })
        ));
    }

    #[test]
    fn owner_mismatch_is_caught() {
        let mut state = GameStateBuilder::new()
            .with_houses(2)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Corvette])
            .build();

        let sid = state.fleets.values().next().unwrap().squadrons[0];
        state.squadrons.get_mut(&sid).unwrap().owner = HouseId(2);

        assert!(matches!(
            state.validate(),
            Err(IntegrityError::OwnerMismatch { .. })
        ));
    }

    #[test]
    fn remove_squadron_clears_containment() {
        let mut state = GameStateBuilder::new()
            .with_houses(1)
            .with_fleet(HouseId(1), SystemId(0), &[ShipClass::Corvette, ShipClass::Scout])
            .build();

        let fleet_id = state.fleets_owned_by(HouseId(1))[0];
        let sid = state.fleets[&fleet_id].squadrons[0];
        assert!(state.remove_squadron(sid).is_some());
        assert!(!state.fleets[&fleet_id].squadrons.contains(&sid));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn serde_round_trip_preserves_equality() {
        let state = GameStateBuilder::new()
            .with_houses(3)
            .with_colony(HouseId(1), SystemId(10))
            .with_fleet(HouseId(2), SystemId(11), &[ShipClass::Carrier])
            .build();

        let json = serde_json::to_string(&state).unwrap();
        let mut back: GameState = serde_json::from_str(&json).unwrap();
        back.after_load();
        assert_eq!(state, back);
        assert_eq!(state.checksum(), back.checksum());
        assert!(back.validate().is_ok());
    }
}
