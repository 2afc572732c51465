use crate::constraint::{Constraint, Resolution};
use crate::direction::{Direction, DirectionSet};
use crate::error::ProgrammerError;
use crate::pattern::PatternId;
use crate::propagator::{Status, WavePropagator};
use crate::tile_set::TileSet;
use crate::topology::{CellIndex, Topology};
use hashbrown::HashMap;

/// Iterative (stack-based, no recursion) articulation-point computation
/// over an adjacency list of dense node ids, per spec.md section 4.5.
/// Standard Tarjan's algorithm; recursion is avoided because the derived
/// graph can be as large as the whole wave.
fn articulation_points(adjacency: &[Vec<usize>]) -> Vec<bool> {
    let n = adjacency.len();
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![usize::MAX; n];
    let mut is_cut = vec![false; n];
    let mut timer = 0usize;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        // (node, parent, next child index to visit)
        let mut stack: Vec<(usize, usize, usize)> = vec![(root, usize::MAX, 0)];
        disc[root] = timer;
        low[root] = timer;
        timer += 1;
        let mut root_children = 0usize;

        while let Some(&mut (node, parent, ref mut child_index)) = stack.last_mut() {
            if *child_index < adjacency[node].len() {
                let child = adjacency[node][*child_index];
                *child_index += 1;
                if child == parent {
                    continue;
                }
                if disc[child] == usize::MAX {
                    disc[child] = timer;
                    low[child] = timer;
                    timer += 1;
                    if node == root {
                        root_children += 1;
                    }
                    stack.push((child, node, 0));
                } else {
                    low[node] = low[node].min(disc[child]);
                }
            } else {
                stack.pop();
                if let Some(&mut (parent_node, _, _)) = stack.last_mut() {
                    low[parent_node] = low[parent_node].min(low[node]);
                    if parent_node != root && low[node] >= disc[parent_node] {
                        is_cut[parent_node] = true;
                    }
                }
            }
        }
        if root_children > 1 {
            is_cut[root] = true;
        }
    }
    is_cut
}

fn connected_components(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let n = adjacency.len();
    let mut component = vec![usize::MAX; n];
    let mut next = 0usize;
    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let mut stack = vec![start];
        component[start] = next;
        while let Some(node) = stack.pop() {
            for &neighbour in &adjacency[node] {
                if component[neighbour] == usize::MAX {
                    component[neighbour] = next;
                    stack.push(neighbour);
                }
            }
        }
        next += 1;
    }
    component
}

/// Whether removing `node` disconnects any pair of `required` nodes that
/// shared a component before its removal (spec.md section 4.5: "a cell
/// whose removal would sever the path must remain walkable").
fn removal_disconnects_required(adjacency: &[Vec<usize>], node: usize, required: &[usize]) -> bool {
    let relevant: Vec<usize> = required.iter().copied().filter(|&r| r != node).collect();
    if relevant.len() < 2 {
        return false;
    }
    let pruned: Vec<Vec<usize>> = adjacency
        .iter()
        .enumerate()
        .map(|(i, neighbours)| {
            if i == node {
                Vec::new()
            } else {
                neighbours.iter().copied().filter(|&x| x != node).collect()
            }
        })
        .collect();
    let component = connected_components(&pruned);
    let first = component[relevant[0]];
    relevant.iter().any(|&r| component[r] != first)
}

/// Enforces that the cells whose every possible pattern lies in
/// `path_tile_set` ("must-walkable") stay connected through cells that
/// could still become walkable ("maybe-walkable"), over the cell-adjacency
/// graph (spec.md section 4.5). Cuts off patterns at cells that can never
/// be walkable when that would be required, and forces the path tile set
/// onto articulation points whose removal would sever two must-walkable
/// cells.
pub struct PathConstraint {
    path_tile_set: TileSet,
    directions: DirectionSet,
}

impl PathConstraint {
    pub fn new(path_tile_set: TileSet, directions: DirectionSet) -> Self {
        Self {
            path_tile_set,
            directions,
        }
    }

    fn classify(&self, propagator: &WavePropagator) -> (Vec<bool>, Vec<bool>) {
        let cell_count = propagator.wave().cell_count();
        let mut maybe = vec![false; cell_count];
        let mut must = vec![false; cell_count];
        for (cell, wave_cell) in propagator.wave().enumerate() {
            let mut any_in = false;
            let mut all_in = true;
            for p in wave_cell.possible_patterns() {
                if self.path_tile_set.contains(p) {
                    any_in = true;
                } else {
                    all_in = false;
                }
            }
            maybe[cell as usize] = any_in;
            must[cell as usize] = any_in && all_in;
        }
        (maybe, must)
    }

    fn build_graph(&self, propagator: &WavePropagator, maybe: &[bool]) -> Vec<Vec<usize>> {
        let topology = propagator.topology();
        let directions: Vec<Direction> = self.directions.iter().collect();
        (0..maybe.len())
            .map(|cell| {
                if !maybe[cell] {
                    return Vec::new();
                }
                directions
                    .iter()
                    .filter_map(|&d| topology.try_move(cell as CellIndex, d, &self.directions))
                    .filter(|&n| maybe[n as usize])
                    .map(|n| n as usize)
                    .collect()
            })
            .collect()
    }
}

impl Constraint for PathConstraint {
    fn check(&mut self, propagator: &mut WavePropagator) -> Resolution {
        let (maybe, must) = self.classify(propagator);
        let must_nodes: Vec<usize> = (0..must.len()).filter(|&i| must[i]).collect();
        if must_nodes.len() < 2 {
            return Resolution::Undecided;
        }
        let graph = self.build_graph(propagator, &maybe);
        let component = connected_components(&graph);
        let first = component[must_nodes[0]];
        if must_nodes.iter().any(|&n| component[n] != first) {
            return Resolution::Contradiction;
        }
        let cuts = articulation_points(&graph);
        let forced: Vec<CellIndex> = (0..graph.len())
            .filter(|&n| cuts[n] && !must[n] && removal_disconnects_required(&graph, n, &must_nodes))
            .map(|n| n as CellIndex)
            .collect();
        for cell in forced {
            if propagator.select_patterns(cell, &self.path_tile_set) == Status::Contradiction {
                return Resolution::Contradiction;
            }
        }
        Resolution::Undecided
    }
}

/// `EdgedPathConstraint` refines `PathConstraint` to connectivity through
/// specific sides of a cell rather than the whole cell, e.g. pipe or road
/// tiles that only connect on some of their edges (spec.md section 4.5).
/// Nodes in the derived graph are `(cell, direction)` half-edges; two
/// half-edges are adjacent either because they're the shared boundary
/// between neighbouring cells, or because some possible pattern at a cell
/// internally joins those two directions (per `connections`).
///
/// Restricted to 2D topologies (spec.md section 9, open question): a
/// half-edge model generalizes awkwardly to 3D, where a single "side" of a
/// cell is a whole face with its own internal connectivity, not a single
/// opening.
pub struct EdgedPathConstraint {
    path_tile_set: TileSet,
    directions: DirectionSet,
    /// For each pattern, the direction-pairs it internally connects when
    /// chosen (e.g. a straight pipe connects `(East, West)`).
    connections: HashMap<PatternId, Vec<(Direction, Direction)>>,
}

impl EdgedPathConstraint {
    pub fn new(
        path_tile_set: TileSet,
        directions: DirectionSet,
        connections: HashMap<PatternId, Vec<(Direction, Direction)>>,
        topology: &Topology,
    ) -> Result<Self, ProgrammerError> {
        if !directions.is_2d() || !topology.is_2d() {
            return Err(ProgrammerError::EdgedPathConstraintRequires2d);
        }
        Ok(Self {
            path_tile_set,
            directions,
            connections,
        })
    }

    fn half_edge(&self, cell: CellIndex, direction: Direction) -> usize {
        cell as usize * self.directions.count() + direction as usize
    }

    fn openings_of(&self, pattern: PatternId) -> impl Iterator<Item = Direction> + '_ {
        self.connections
            .get(&pattern)
            .into_iter()
            .flatten()
            .flat_map(|&(a, b)| vec![a, b])
    }

    fn build_graph(&self, propagator: &WavePropagator) -> (Vec<Vec<usize>>, Vec<bool>, Vec<bool>) {
        let topology = propagator.topology();
        let num_directions = self.directions.count();
        let cell_count = propagator.wave().cell_count();
        let node_count = cell_count * num_directions;
        let mut maybe = vec![false; node_count];
        let mut must = vec![false; node_count];

        for (cell, wave_cell) in propagator.wave().enumerate() {
            let mut any_open = vec![false; num_directions];
            let mut all_open = vec![true; num_directions];
            let mut any_pattern = false;
            for p in wave_cell.possible_patterns() {
                any_pattern = true;
                let mut open_here = vec![false; num_directions];
                for d in self.openings_of(p) {
                    open_here[d as usize] = true;
                }
                for d in 0..num_directions {
                    if open_here[d] {
                        any_open[d] = true;
                    } else {
                        all_open[d] = false;
                    }
                }
            }
            if !any_pattern {
                continue;
            }
            for d in 0..num_directions {
                let node = self.half_edge(cell, d as Direction);
                maybe[node] = any_open[d];
                must[node] = any_open[d] && all_open[d];
            }
        }

        let mut adjacency = vec![Vec::new(); node_count];
        for cell in 0..cell_count as CellIndex {
            for d in self.directions.iter() {
                let node = self.half_edge(cell, d);
                if !maybe[node] {
                    continue;
                }
                // External link: the matching half-edge across the shared
                // boundary with the neighbour in direction d.
                if let Some(neighbour) = topology.try_move(cell, d, &self.directions) {
                    let inv = self.directions.inverse(d);
                    let other = self.half_edge(neighbour, inv);
                    if maybe[other] {
                        adjacency[node].push(other);
                        adjacency[other].push(node);
                    }
                }
                // Internal links: other openings at this cell reachable
                // through some still-possible pattern's connections.
                let wave_cell = propagator.wave().cell(cell);
                for p in wave_cell.possible_patterns() {
                    for &(a, b) in self.connections.get(&p).into_iter().flatten() {
                        if a == d {
                            let other = self.half_edge(cell, b);
                            if maybe[other] && !adjacency[node].contains(&other) {
                                adjacency[node].push(other);
                                adjacency[other].push(node);
                            }
                        }
                    }
                }
            }
        }
        (adjacency, maybe, must)
    }
}

impl Constraint for EdgedPathConstraint {
    fn check(&mut self, propagator: &mut WavePropagator) -> Resolution {
        let (adjacency, _maybe, must) = self.build_graph(propagator);
        let must_nodes: Vec<usize> = (0..must.len()).filter(|&i| must[i]).collect();
        if must_nodes.len() < 2 {
            return Resolution::Undecided;
        }
        let component = connected_components(&adjacency);
        let first = component[must_nodes[0]];
        if must_nodes.iter().any(|&n| component[n] != first) {
            return Resolution::Contradiction;
        }
        let cuts = articulation_points(&adjacency);
        let num_directions = self.directions.count();
        let forced_cells: Vec<CellIndex> = (0..adjacency.len())
            .filter(|&n| cuts[n] && !must[n] && removal_disconnects_required(&adjacency, n, &must_nodes))
            .map(|n| (n / num_directions) as CellIndex)
            .collect();
        for cell in forced_cells {
            if propagator.select_patterns(cell, &self.path_tile_set) == Status::Contradiction {
                return Resolution::Contradiction;
            }
        }
        Resolution::Undecided
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::AdjacencyBuilder;
    use crate::propagator::PropagatorOptions;

    #[test]
    fn articulation_points_on_a_line() {
        // 0 - 1 - 2 - 3: the two interior nodes are cut vertices.
        let graph = vec![vec![1], vec![0, 2], vec![1, 3], vec![2]];
        let cuts = articulation_points(&graph);
        assert_eq!(cuts, vec![false, true, true, false]);
    }

    #[test]
    fn articulation_points_on_a_cycle_are_none() {
        let graph = vec![vec![1, 3], vec![0, 2], vec![1, 3], vec![2, 0]];
        let cuts = articulation_points(&graph);
        assert!(cuts.iter().all(|&c| !c));
    }

    #[test]
    fn two_required_cells_disconnected_is_contradiction() {
        // Two 2x1 blobs of path tiles with no connecting row between
        // them: the path tile set can never be fully connected.
        let directions = DirectionSet::cardinal_2d();
        let mut b: AdjacencyBuilder<u8> = AdjacencyBuilder::new(directions.clone());
        // 0 = wall, 1 = path; walls and paths never neighbour each other,
        // so the wave is free to decide each cell independently.
        for d in [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0)] {
            b.add_adjacency(&[0u8], &[0], d.0, d.1, d.2);
            b.add_adjacency(&[1u8], &[1], d.0, d.1, d.2);
        }
        b.set_uniform_frequency();
        let topology = Topology::new(3, 1, 1);
        let path_set = TileSet::new(2, vec![1]);
        let mut wp = WavePropagator::new(
            b.build(),
            topology.clone(),
            directions.clone(),
            PropagatorOptions { backtrack_depth: 0, seed: 1 },
            Vec::new(),
        )
        .unwrap();
        let left = topology.index_of(0, 0, 0);
        let right = topology.index_of(2, 0, 0);
        wp.select_patterns(left, &path_set);
        wp.select_patterns(right, &path_set);
        let middle_set = TileSet::new(2, vec![0]);
        wp.select_patterns(topology.index_of(1, 0, 0), &middle_set);
        let mut constraint = PathConstraint::new(path_set, directions);
        assert_eq!(constraint.check(&mut wp), Resolution::Contradiction);
    }
}
