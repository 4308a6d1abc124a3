//! Star map: hex grid, typed jump lanes, procedural generation, and
//! route queries.
//!
//! Systems are nodes on an axial hex grid laid out in concentric rings
//! around a central hub. Jump lanes are typed edges; lane type gates
//! passability (restricted lanes need FD tech), never jump cost, so
//! `distance` is a true jump count. Generation is deterministic for the
//! same `(player_count, seed)` pair.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use ec4x_pathfinding::{AStar, Graph};

use crate::defines::{map as map_defines, movement};
use crate::ids::{HouseId, SystemId};
use crate::rng::DiceRng;

/// Axial hex coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const ORIGIN: HexCoord = HexCoord { q: 0, r: 0 };

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The six neighbor offsets, in a fixed clockwise order.
    pub const DIRECTIONS: [HexCoord; 6] = [
        HexCoord::new(1, 0),
        HexCoord::new(1, -1),
        HexCoord::new(0, -1),
        HexCoord::new(-1, 0),
        HexCoord::new(-1, 1),
        HexCoord::new(0, 1),
    ];

    pub fn add(self, other: HexCoord) -> HexCoord {
        HexCoord::new(self.q + other.q, self.r + other.r)
    }

    pub fn neighbors(self) -> [HexCoord; 6] {
        let mut out = [HexCoord::ORIGIN; 6];
        for (i, d) in Self::DIRECTIONS.iter().enumerate() {
            out[i] = self.add(*d);
        }
        out
    }

    /// Hex distance (cube metric).
    pub fn distance(self, other: HexCoord) -> u32 {
        let dq = self.q - other.q;
        let dr = self.r - other.r;
        let ds = -(self.q + self.r) + (other.q + other.r);
        ((dq.abs() + dr.abs() + ds.abs()) / 2) as u32
    }
}

/// Habitability class of a system's primary planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlanetClass {
    Eden,
    Lush,
    Benign,
    Harsh,
    Hostile,
    Desolate,
    Extreme,
}

impl PlanetClass {
    pub const ALL: [PlanetClass; 7] = [
        PlanetClass::Eden,
        PlanetClass::Lush,
        PlanetClass::Benign,
        PlanetClass::Harsh,
        PlanetClass::Hostile,
        PlanetClass::Desolate,
        PlanetClass::Extreme,
    ];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).unwrap_or(2)
    }

    /// Gross-output multiplier percent.
    pub fn output_pct(self) -> u32 {
        crate::defines::economy::PLANET_CLASS_PCT[self.index()]
    }

    /// The next-better class, if any (terraforming target).
    pub fn improved(self) -> Option<PlanetClass> {
        let idx = self.index();
        if idx == 0 {
            None
        } else {
            Some(Self::ALL[idx - 1])
        }
    }
}

/// Raw-resource rating of a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceRating {
    VeryPoor,
    Poor,
    Abundant,
    Rich,
    VeryRich,
}

impl ResourceRating {
    pub const ALL: [ResourceRating; 5] = [
        ResourceRating::VeryPoor,
        ResourceRating::Poor,
        ResourceRating::Abundant,
        ResourceRating::Rich,
        ResourceRating::VeryRich,
    ];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|r| *r == self).unwrap_or(2)
    }

    /// Industrial-output multiplier percent.
    pub fn output_pct(self) -> u32 {
        crate::defines::economy::RESOURCE_RATING_PCT[self.index()]
    }
}

/// Jump lane classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LaneType {
    Major,
    Minor,
    /// Traversable only with sufficient FD tech; scout-only fleets exempt.
    Restricted,
}

/// A star system node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarSystem {
    pub id: SystemId,
    pub hex: HexCoord,
    pub planet_class: PlanetClass,
    pub resource_rating: ResourceRating,
    /// Set for the systems seeded as player homeworlds.
    pub homeworld_of: Option<HouseId>,
}

/// Lane-traversal permissions for a route query.
#[derive(Debug, Clone, Copy)]
pub struct TravelContext {
    /// FD tech level of the traveling house.
    pub fd_level: i32,
    /// Scout-only fleets ignore lane restrictions.
    pub scout_only: bool,
}

impl TravelContext {
    /// Context that can traverse every lane; used for map-distance
    /// queries that must not depend on any house's tech.
    pub const UNRESTRICTED: TravelContext = TravelContext {
        fd_level: i32::MAX,
        scout_only: true,
    };

    pub fn can_use(&self, lane: LaneType) -> bool {
        match lane {
            LaneType::Major | LaneType::Minor => true,
            LaneType::Restricted => {
                self.scout_only || self.fd_level >= movement::RESTRICTED_LANE_MIN_FD
            }
        }
    }
}

/// The immutable star map: systems plus typed lanes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StarMap {
    pub systems: BTreeMap<SystemId, StarSystem>,
    /// Undirected lanes keyed by sorted endpoint pair.
    #[serde(
        serialize_with = "serialize_lanes",
        deserialize_with = "deserialize_lanes"
    )]
    pub lanes: BTreeMap<(SystemId, SystemId), LaneType>,
}

/// `serde_json` requires string map keys; tuple keys are serialized as a
/// sequence of pairs instead.
fn serialize_lanes<S>(
    map: &BTreeMap<(SystemId, SystemId), LaneType>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let pairs: Vec<(&(SystemId, SystemId), &LaneType)> = map.iter().collect();
    pairs.serialize(serializer)
}

fn deserialize_lanes<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<(SystemId, SystemId), LaneType>, D::Error>
where
    D: Deserializer<'de>,
{
    let pairs: Vec<((SystemId, SystemId), LaneType)> = Deserialize::deserialize(deserializer)?;
    Ok(pairs.into_iter().collect())
}

fn lane_key(a: SystemId, b: SystemId) -> (SystemId, SystemId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl StarMap {
    pub fn get(&self, id: SystemId) -> Option<&StarSystem> {
        self.systems.get(&id)
    }

    pub fn lane_between(&self, a: SystemId, b: SystemId) -> Option<LaneType> {
        self.lanes.get(&lane_key(a, b)).copied()
    }

    pub fn add_lane(&mut self, a: SystemId, b: SystemId, lane: LaneType) {
        if a != b {
            self.lanes.insert(lane_key(a, b), lane);
        }
    }

    /// All systems directly linked to `id`, with lane types, ascending.
    pub fn adjacent(&self, id: SystemId) -> Vec<(SystemId, LaneType)> {
        let mut out = Vec::new();
        for (&(a, b), &lane) in &self.lanes {
            if a == id {
                out.push((b, lane));
            } else if b == id {
                out.push((a, lane));
            }
        }
        out.sort_unstable_by_key(|(s, _)| *s);
        out
    }

    pub fn lane_count(&self, id: SystemId) -> usize {
        self.lanes.keys().filter(|(a, b)| *a == id || *b == id).count()
    }

    /// Minimum-jump route from `from` to `to` under `context`.
    /// Ties break lexicographically on system IDs.
    pub fn shortest_path(
        &self,
        from: SystemId,
        to: SystemId,
        context: TravelContext,
    ) -> Option<Vec<SystemId>> {
        if !self.systems.contains_key(&from) || !self.systems.contains_key(&to) {
            return None;
        }
        AStar::find_route(self, from, to, &context).map(|(route, _)| route)
    }

    /// Jump count between two systems, `None` if unreachable.
    pub fn distance(&self, a: SystemId, b: SystemId) -> Option<u32> {
        if !self.systems.contains_key(&a) || !self.systems.contains_key(&b) {
            return None;
        }
        AStar::jump_distance(self, a, b, &TravelContext::UNRESTRICTED)
    }

    pub fn system_ids(&self) -> impl Iterator<Item = SystemId> + '_ {
        self.systems.keys().copied()
    }

    pub fn homeworlds(&self) -> Vec<(HouseId, SystemId)> {
        let mut out: Vec<(HouseId, SystemId)> = self
            .systems
            .values()
            .filter_map(|s| s.homeworld_of.map(|h| (h, s.id)))
            .collect();
        out.sort_unstable();
        out
    }
}

impl Graph<SystemId, TravelContext> for StarMap {
    fn neighbors(&self, node: SystemId, context: &TravelContext) -> Vec<SystemId> {
        self.adjacent(node)
            .into_iter()
            .filter(|(_, lane)| context.can_use(*lane))
            .map(|(id, _)| id)
            .collect()
    }

    fn cost(&self, _from: SystemId, _to: SystemId, _context: &TravelContext) -> u32 {
        1
    }

    fn heuristic(&self, from: SystemId, target: SystemId, _context: &TravelContext) -> u32 {
        // Hex distance never overestimates jump count on a hex lattice
        match (self.systems.get(&from), self.systems.get(&target)) {
            (Some(a), Some(b)) => a.hex.distance(b.hex),
            _ => 0,
        }
    }
}

// ============================================================================
// Procedural Generation
// ============================================================================

/// Generate the map for `player_count` houses.
///
/// Layout is concentric rings around a central hub; homeworlds sit evenly
/// spaced on the outer ring, each wired to the same number of lanes.
/// House IDs 1..=player_count are assigned to homeworlds in ring order.
pub fn generate(player_count: u32, rng: &mut DiceRng) -> StarMap {
    let player_count = player_count.clamp(2, 12);
    let rings = map_defines::RINGS_BY_PLAYERS[(player_count - 2) as usize];

    let mut map = StarMap::default();
    let mut next_id = 0u32;

    // Hub first, then spiral outward ring by ring
    let mut coords = vec![HexCoord::ORIGIN];
    for ring in 1..=rings {
        coords.extend(ring_coords(ring));
    }

    let mut by_hex: BTreeMap<(i32, i32), SystemId> = BTreeMap::new();
    for hex in coords {
        let id = SystemId(next_id);
        next_id += 1;
        by_hex.insert((hex.q, hex.r), id);
        map.systems.insert(
            id,
            StarSystem {
                id,
                hex,
                planet_class: roll_planet_class(rng),
                resource_rating: roll_resource_rating(rng),
                homeworld_of: None,
            },
        );
    }

    // Random lanes between adjacent hexes
    let ids: Vec<SystemId> = map.systems.keys().copied().collect();
    for &id in &ids {
        let hex = map.systems[&id].hex;
        for n in hex.neighbors() {
            if let Some(&other) = by_hex.get(&(n.q, n.r)) {
                if other <= id {
                    continue; // each pair considered once
                }
                if u32::from(rng.d100()) <= map_defines::LANE_DENSITY_PCT {
                    map.add_lane(id, other, roll_lane_type(rng));
                }
            }
        }
    }

    // Homeworlds: evenly spaced on the outer ring
    let outer: Vec<SystemId> = map
        .systems
        .values()
        .filter(|s| s.hex.distance(HexCoord::ORIGIN) == rings)
        .map(|s| s.id)
        .collect();
    for i in 0..player_count {
        let idx = (i as usize * outer.len()) / player_count as usize;
        let system_id = outer[idx];
        let house = HouseId(i + 1);
        let system = map.systems.get_mut(&system_id).expect("outer ring system");
        system.homeworld_of = Some(house);
        system.planet_class = PlanetClass::Benign;
        system.resource_rating = ResourceRating::Abundant;
    }

    // Every homeworld gets the same lane count: wipe its random lanes and
    // wire it to its nearest in-map neighbors with major lanes
    let homeworlds: Vec<SystemId> = map.homeworlds().iter().map(|(_, s)| *s).collect();
    for &hw in &homeworlds {
        let keys: Vec<(SystemId, SystemId)> = map
            .lanes
            .keys()
            .filter(|(a, b)| *a == hw || *b == hw)
            .copied()
            .collect();
        for k in keys {
            map.lanes.remove(&k);
        }
        let hex = map.systems[&hw].hex;
        let mut neighbors: Vec<SystemId> = hex
            .neighbors()
            .iter()
            .filter_map(|n| by_hex.get(&(n.q, n.r)).copied())
            .collect();
        neighbors.sort_unstable();
        for &n in neighbors.iter().take(map_defines::HOMEWORLD_LANES as usize) {
            map.add_lane(hw, n, LaneType::Major);
        }
    }

    connect_components(&mut map);

    map
}

/// Ensure the lane graph is a single component: any system unreachable
/// from the hub gets a major lane to its smallest reachable hex neighbor,
/// repeated until the map is connected.
fn connect_components(map: &mut StarMap) {
    let hub = SystemId(0);
    loop {
        let reachable = ec4x_pathfinding::AStar::reachable_within(
            map,
            hub,
            u32::MAX,
            &TravelContext::UNRESTRICTED,
        );
        let reachable_set: std::collections::BTreeSet<SystemId> =
            reachable.into_iter().collect();
        let all: Vec<SystemId> = map.systems.keys().copied().collect();

        // Candidate patches: (orphan, reachable neighbor). Prefer any
        // patch that avoids a homeworld so the equalized homeworld lane
        // counts survive; only a lane to an already-reachable neighbor
        // makes progress, and on a contiguous hex disc some unreached
        // system always has one.
        let mut fallback: Option<(SystemId, SystemId)> = None;
        let mut chosen: Option<(SystemId, SystemId)> = None;
        for id in all {
            if reachable_set.contains(&id) {
                continue;
            }
            let hex = map.systems[&id].hex;
            let mut neighbors: Vec<SystemId> = map
                .systems
                .values()
                .filter(|s| s.hex.distance(hex) == 1)
                .map(|s| s.id)
                .collect();
            neighbors.sort_unstable();
            let is_homeworld = |n: &SystemId| map.systems[n].homeworld_of.is_some();
            if let Some(t) = neighbors
                .iter()
                .find(|n| reachable_set.contains(*n) && !is_homeworld(n))
            {
                chosen = Some((id, *t));
                break;
            }
            if fallback.is_none() {
                if let Some(t) = neighbors.iter().find(|n| reachable_set.contains(*n)) {
                    fallback = Some((id, *t));
                }
            }
        }

        match chosen.or(fallback) {
            Some((orphan, target)) => {
                map.add_lane(orphan, target, LaneType::Major);
                // Re-run reachability after each patch
            }
            None => return,
        }
    }
}

/// Walk one ring of hexes at the given radius.
fn ring_coords(radius: u32) -> Vec<HexCoord> {
    let mut out = Vec::with_capacity(6 * radius as usize);
    // Start at direction 4 scaled by radius (standard ring walk)
    let mut hex = HexCoord::ORIGIN;
    for _ in 0..radius {
        hex = hex.add(HexCoord::DIRECTIONS[4]);
    }
    for dir in 0..6 {
        for _ in 0..radius {
            out.push(hex);
            hex = hex.add(HexCoord::DIRECTIONS[dir]);
        }
    }
    out
}

fn roll_planet_class(rng: &mut DiceRng) -> PlanetClass {
    // Benign-heavy bell: extremes are rare
    match rng.d20() {
        1 => PlanetClass::Eden,
        2..=4 => PlanetClass::Lush,
        5..=11 => PlanetClass::Benign,
        12..=15 => PlanetClass::Harsh,
        16..=17 => PlanetClass::Hostile,
        18..=19 => PlanetClass::Desolate,
        _ => PlanetClass::Extreme,
    }
}

fn roll_resource_rating(rng: &mut DiceRng) -> ResourceRating {
    match rng.d10() {
        1 => ResourceRating::VeryPoor,
        2..=3 => ResourceRating::Poor,
        4..=7 => ResourceRating::Abundant,
        8..=9 => ResourceRating::Rich,
        _ => ResourceRating::VeryRich,
    }
}

fn roll_lane_type(rng: &mut DiceRng) -> LaneType {
    let roll = u32::from(rng.d100());
    if roll <= map_defines::MAJOR_LANE_PCT {
        LaneType::Major
    } else if roll <= map_defines::MAJOR_LANE_PCT + (100 - map_defines::MAJOR_LANE_PCT) / 2 {
        LaneType::Minor
    } else {
        LaneType::Restricted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::TurnRng;

    fn mapgen_rng(seed: u64) -> DiceRng {
        TurnRng::new(seed, 0).stream("mapgen", &[])
    }

    #[test]
    fn hex_distance_is_symmetric() {
        let a = HexCoord::new(2, -1);
        let b = HexCoord::new(-1, 3);
        assert_eq!(a.distance(b), b.distance(a));
        assert_eq!(a.distance(a), 0);
    }

    #[test]
    fn ring_has_six_times_radius_hexes() {
        assert_eq!(ring_coords(1).len(), 6);
        assert_eq!(ring_coords(3).len(), 18);
        for hex in ring_coords(3) {
            assert_eq!(hex.distance(HexCoord::ORIGIN), 3);
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate(4, &mut mapgen_rng(42));
        let b = generate(4, &mut mapgen_rng(42));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = generate(4, &mut mapgen_rng(42));
        let b = generate(4, &mut mapgen_rng(43));
        assert_ne!(a, b);
    }

    #[test]
    fn homeworlds_have_equal_lane_counts() {
        for players in [2u32, 5, 9, 12] {
            let map = generate(players, &mut mapgen_rng(7));
            let homeworlds = map.homeworlds();
            assert_eq!(homeworlds.len(), players as usize);
            let counts: Vec<usize> = homeworlds
                .iter()
                .map(|(_, s)| map.lane_count(*s))
                .collect();
            assert!(
                counts.windows(2).all(|w| w[0] == w[1]),
                "unequal homeworld lanes for {players} players: {counts:?}"
            );
        }
    }

    #[test]
    fn map_is_fully_connected() {
        let map = generate(6, &mut mapgen_rng(99));
        let ids: Vec<SystemId> = map.system_ids().collect();
        for &id in &ids {
            assert!(
                map.distance(SystemId(0), id).is_some(),
                "system {id} unreachable from hub"
            );
        }
    }

    #[test]
    fn restricted_lanes_gate_on_fd() {
        let mut map = StarMap::default();
        for (i, q) in [0, 1, 2].iter().enumerate() {
            let id = SystemId(i as u32);
            map.systems.insert(
                id,
                StarSystem {
                    id,
                    hex: HexCoord::new(*q, 0),
                    planet_class: PlanetClass::Benign,
                    resource_rating: ResourceRating::Abundant,
                    homeworld_of: None,
                },
            );
        }
        map.add_lane(SystemId(0), SystemId(1), LaneType::Restricted);
        map.add_lane(SystemId(1), SystemId(2), LaneType::Major);

        let low_fd = TravelContext { fd_level: 0, scout_only: false };
        let high_fd = TravelContext { fd_level: 5, scout_only: false };
        let scouts = TravelContext { fd_level: 0, scout_only: true };

        assert!(map.shortest_path(SystemId(0), SystemId(2), low_fd).is_none());
        assert_eq!(
            map.shortest_path(SystemId(0), SystemId(2), high_fd),
            Some(vec![SystemId(0), SystemId(1), SystemId(2)])
        );
        assert!(map.shortest_path(SystemId(0), SystemId(2), scouts).is_some());
    }

    #[test]
    fn distance_counts_jumps() {
        let map = generate(3, &mut mapgen_rng(5));
        // Hub to itself
        assert_eq!(map.distance(SystemId(0), SystemId(0)), Some(0));
        // Any adjacent pair is one jump
        let (&(a, b), _) = map.lanes.iter().next().unwrap();
        assert_eq!(map.distance(a, b), Some(1));
    }
}
