//! Deterministic graph search for lane networks.
//!
//! Used by the star map to answer shortest-route and jump-distance queries.
//! All searches are fully deterministic: ties between equal-cost frontier
//! nodes are broken by `Ord` on the node type, so two runs over the same
//! graph always return the same route.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// A trait for graphs that can be searched.
///
/// `Node`: the type of node identifiers (e.g. SystemId).
/// `Ctx`: a context object passed to cost calculations (e.g. the fleet
/// whose lane permissions gate traversal).
pub trait Graph<Node, Ctx> {
    /// Return the neighbors of a node reachable under `context`.
    fn neighbors(&self, node: Node, context: &Ctx) -> Vec<Node>;

    /// Cost to move from `from` to `to` (in jump units).
    fn cost(&self, from: Node, to: Node, context: &Ctx) -> u32;

    /// Estimated cost from `from` to `target`. Must never overestimate.
    fn heuristic(&self, from: Node, target: Node, context: &Ctx) -> u32;
}

/// Deterministic A* shortest-route search.
pub struct AStar;

impl AStar {
    /// Find the cheapest route from `start` to `goal`.
    ///
    /// Returns the full node sequence (including `start`) and the total
    /// cost, or `None` when `goal` is unreachable under `context`.
    pub fn find_route<Node, Ctx, G>(
        graph: &G,
        start: Node,
        goal: Node,
        context: &Ctx,
    ) -> Option<(Vec<Node>, u32)>
    where
        Node: Copy + Eq + Ord + Hash,
        G: Graph<Node, Ctx>,
    {
        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<Node, Node> = HashMap::new();
        let mut g_score: HashMap<Node, u32> = HashMap::new();
        let mut closed_set: HashSet<Node> = HashSet::new();

        g_score.insert(start, 0);
        open_set.push(Frontier {
            node: start,
            priority: graph.heuristic(start, goal, context),
        });

        while let Some(Frontier { node: current, .. }) = open_set.pop() {
            // Skip if already settled via a better (or equal, earlier) path
            if !closed_set.insert(current) {
                continue;
            }

            if current == goal {
                let mut route = vec![current];
                let mut curr = current;
                while let Some(&prev) = came_from.get(&curr) {
                    route.push(prev);
                    curr = prev;
                }
                route.reverse();
                return Some((route, g_score[&goal]));
            }

            let current_g = g_score[&current];

            let mut neighbors = graph.neighbors(current, context);
            // Expansion order must not depend on adjacency storage order
            neighbors.sort_unstable();

            for neighbor in neighbors {
                if closed_set.contains(&neighbor) {
                    continue;
                }

                let tentative_g = current_g + graph.cost(current, neighbor, context);
                let known = *g_score.get(&neighbor).unwrap_or(&u32::MAX);

                // Strict improvement, or equal cost through a smaller
                // predecessor: the latter keeps routes lexicographic.
                let improves = tentative_g < known
                    || (tentative_g == known
                        && came_from.get(&neighbor).is_some_and(|&p| current < p));

                if improves {
                    came_from.insert(neighbor, current);
                    g_score.insert(neighbor, tentative_g);
                    open_set.push(Frontier {
                        node: neighbor,
                        priority: tentative_g + graph.heuristic(neighbor, goal, context),
                    });
                }
            }
        }

        None
    }

    /// Total cost of the cheapest route, ignoring the route itself.
    ///
    /// Returns `None` if `goal` is unreachable under `context`.
    pub fn jump_distance<Node, Ctx, G>(
        graph: &G,
        start: Node,
        goal: Node,
        context: &Ctx,
    ) -> Option<u32>
    where
        Node: Copy + Eq + Ord + Hash,
        G: Graph<Node, Ctx>,
    {
        if start == goal {
            return Some(0);
        }
        Self::find_route(graph, start, goal, context).map(|(_, cost)| cost)
    }

    /// All nodes reachable from `start` within `max_jumps` edges,
    /// including `start` itself. Breadth-first, deterministic order.
    pub fn reachable_within<Node, Ctx, G>(
        graph: &G,
        start: Node,
        max_jumps: u32,
        context: &Ctx,
    ) -> Vec<Node>
    where
        Node: Copy + Eq + Ord + Hash,
        G: Graph<Node, Ctx>,
    {
        let mut visited: HashSet<Node> = HashSet::new();
        let mut queue: VecDeque<(Node, u32)> = VecDeque::new();
        let mut out = Vec::new();

        visited.insert(start);
        queue.push_back((start, 0));
        out.push(start);

        while let Some((current, depth)) = queue.pop_front() {
            if depth == max_jumps {
                continue;
            }
            let mut neighbors = graph.neighbors(current, context);
            neighbors.sort_unstable();
            for neighbor in neighbors {
                if visited.insert(neighbor) {
                    out.push(neighbor);
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        out
    }
}

/// Helper struct for the priority queue.
#[derive(Copy, Clone, Eq, PartialEq)]
struct Frontier<Node> {
    node: Node,
    priority: u32, // Estimated total cost (f = g + h)
}

// The priority queue depends on `Ord`. Flip the ordering on priority so the
// heap becomes a min-heap; tie-break on the node itself (smallest first) so
// pop order is deterministic regardless of push order.
impl<Node: Ord> Ord for Frontier<Node> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl<Node: Ord> PartialOrd for Frontier<Node> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
