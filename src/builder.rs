use crate::direction::{Direction, DirectionSet};
use crate::orientation::{rotate_sample, ALL as ALL_ORIENTATIONS};
use crate::pattern::{PatternId, PatternModel, PatternTable, PatternWeight};
use crate::topology::Topology;
use hashbrown::{HashMap, HashSet};
use std::hash::Hash;

/// Collects tile-level adjacency declarations and/or sample arrays and
/// compiles them into a `PatternModel`; owns the tile <-> pattern map
/// (spec.md section 4.1).
///
/// Tiles are opaque, hashable, equality-comparable values the core never
/// interprets (spec.md section 3). Tile -> pattern assignment is lazy: the
/// first occurrence of a tile appends a new pattern.
///
/// The builder uses unordered sets while accumulating compatibility pairs
/// and only sorts them into contiguous arrays in `build`, matching the
/// teacher's "hash-set while building, array while propagating" split
/// (spec.md section 9 design notes).
pub struct AdjacencyBuilder<T: Eq + Hash + Clone> {
    directions: DirectionSet,
    tile_to_pattern: HashMap<T, PatternId>,
    pattern_to_tile: Vec<T>,
    frequencies: Vec<u32>,
    compatible: Vec<Vec<HashSet<PatternId>>>,
}

impl<T: Eq + Hash + Clone> AdjacencyBuilder<T> {
    pub fn new(directions: DirectionSet) -> Self {
        Self {
            directions,
            tile_to_pattern: HashMap::new(),
            pattern_to_tile: Vec::new(),
            frequencies: Vec::new(),
            compatible: Vec::new(),
        }
    }

    pub fn directions(&self) -> &DirectionSet {
        &self.directions
    }

    /// Returns the pattern for `tile`, assigning a fresh one (frequency 0,
    /// no compatibilities) on first occurrence.
    pub fn pattern_for_tile(&mut self, tile: &T) -> PatternId {
        if let Some(&p) = self.tile_to_pattern.get(tile) {
            return p;
        }
        let p = self.pattern_to_tile.len() as PatternId;
        self.pattern_to_tile.push(tile.clone());
        self.tile_to_pattern.insert(tile.clone(), p);
        self.frequencies.push(0);
        let num_directions = self.directions.count();
        self.compatible.push(vec![HashSet::new(); num_directions]);
        p
    }

    pub fn tile_of_pattern(&self, pattern: PatternId) -> &T {
        &self.pattern_to_tile[pattern as usize]
    }

    /// Number of distinct tiles assigned a pattern so far.
    pub fn tile_count(&self) -> usize {
        self.pattern_to_tile.len()
    }

    fn direction_for_vector(&self, dx: i32, dy: i32, dz: i32) -> Direction {
        self.directions
            .iter()
            .find(|&d| self.directions.vector(d) == (dx, dy, dz))
            .unwrap_or_else(|| {
                panic!(
                    "AdjacencyBuilder::add_adjacency: ({}, {}, {}) is not a member of this builder's DirectionSet",
                    dx, dy, dz
                )
            })
    }

    /// Declares that for every `s in src_tiles, d in dest_tiles`, `d` may
    /// sit at the neighbour reached by `(dx, dy, dz)` from `s`. Adds both
    /// `(s -> d, dir)` and `(d -> s, inv(dir))`, maintaining the symmetry
    /// invariant (spec.md section 4.1).
    pub fn add_adjacency(&mut self, src_tiles: &[T], dest_tiles: &[T], dx: i32, dy: i32, dz: i32) {
        let d = self.direction_for_vector(dx, dy, dz);
        let inv = self.directions.inverse(d);
        for s in src_tiles {
            let sp = self.pattern_for_tile(s);
            for dest in dest_tiles {
                let dp = self.pattern_for_tile(dest);
                self.compatible[sp as usize][d as usize].insert(dp);
                self.compatible[dp as usize][inv as usize].insert(sp);
            }
        }
    }

    pub fn set_frequency(&mut self, tile: &T, frequency: u32) {
        let p = self.pattern_for_tile(tile);
        self.frequencies[p as usize] = frequency;
    }

    pub fn multiply_frequency(&mut self, tile: &T, factor: f64) {
        let p = self.pattern_for_tile(tile);
        let current = self.frequencies[p as usize] as f64;
        self.frequencies[p as usize] = (current * factor).round().max(0.0) as u32;
    }

    /// Sets every pattern registered so far to frequency 1.
    pub fn set_uniform_frequency(&mut self) {
        for f in self.frequencies.iter_mut() {
            *f = 1;
        }
    }

    /// For each cell in `sample`, increments the frequency of the pattern
    /// for `sample[cell]` and, for each valid neighbour under `topology`,
    /// adds the observed pair to the compatibility set (spec.md section
    /// 4.1).
    pub fn add_sample(&mut self, sample: &[T], topology: &Topology) {
        assert_eq!(
            sample.len(),
            topology.cell_count(),
            "AdjacencyBuilder::add_sample: sample length must equal topology cell count"
        );
        let patterns = sample
            .iter()
            .map(|tile| self.pattern_for_tile(tile))
            .collect::<Vec<_>>();
        for (index, &p) in patterns.iter().enumerate() {
            if topology.is_masked_out(index as u32) {
                continue;
            }
            self.frequencies[p as usize] += 1;
            for d in self.directions.iter() {
                if let Some(n) = topology.try_move(index as u32, d, &self.directions) {
                    let q = patterns[n as usize];
                    let inv = self.directions.inverse(d);
                    self.compatible[p as usize][d as usize].insert(q);
                    self.compatible[q as usize][inv as usize].insert(p);
                }
            }
        }
    }

    /// Like `add_sample`, but also feeds the sample's rotations and
    /// reflections under the full 2D dihedral group (spec.md section 4.1:
    /// sample symmetry). 2D topologies only; periodicity carries over to
    /// each rotated topology, with x/y swapped for orientations that
    /// transpose the sample.
    pub fn add_sample_with_symmetry(&mut self, sample: &[T], topology: &Topology) {
        assert!(
            topology.is_2d(),
            "AdjacencyBuilder::add_sample_with_symmetry: topology must be 2D"
        );
        let (width, height) = (topology.width(), topology.height());
        let (periodic_x, periodic_y, _) = topology.periodic();
        for &orientation in ALL_ORIENTATIONS.iter() {
            let (rotated, new_width, new_height) = rotate_sample(sample, width, height, orientation);
            let (px, py) = if orientation.transposes_size() {
                (periodic_y, periodic_x)
            } else {
                (periodic_x, periodic_y)
            };
            let rotated_topology = Topology::new(new_width, new_height, 1).with_periodic(px, py, false);
            self.add_sample(&rotated, &rotated_topology);
        }
    }

    /// Materializes the sorted compatibility arrays into a `PatternModel`.
    pub fn build(self) -> PatternModel {
        let num_directions = self.directions.count();
        let weights = self
            .frequencies
            .iter()
            .map(|&f| if f == 0 { None } else { Some(PatternWeight::new(f)) })
            .collect::<PatternTable<_>>();
        let propagator = self
            .compatible
            .into_iter()
            .map(|by_direction| {
                by_direction
                    .into_iter()
                    .map(|set| {
                        let mut v = set.into_iter().collect::<Vec<_>>();
                        v.sort_unstable();
                        v
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<PatternTable<_>>();
        PatternModel::new(weights, propagator, num_directions)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lazy_pattern_assignment_and_adjacency_is_symmetric() {
        let mut b: AdjacencyBuilder<&str> = AdjacencyBuilder::new(DirectionSet::cardinal_2d());
        b.add_adjacency(&["grass"], &["grass", "sand"], 1, 0, 0);
        b.set_uniform_frequency();
        let model = b.build();
        assert_eq!(model.num_patterns(), 2);
        assert!(model.check_symmetry(|d| DirectionSet::cardinal_2d().inverse(d)));
    }

    #[test]
    fn add_sample_counts_frequencies_and_adjacency() {
        let directions = DirectionSet::cardinal_2d();
        let topology = Topology::new(2, 1, 1);
        let mut b: AdjacencyBuilder<char> = AdjacencyBuilder::new(directions);
        b.add_sample(&['a', 'b'], &topology);
        let pa = b.pattern_for_tile(&'a');
        let pb = b.pattern_for_tile(&'b');
        let model = b.build();
        assert_eq!(model.weight(pa).unwrap().weight(), 1);
        assert_eq!(model.weight(pb).unwrap().weight(), 1);
        let east = b_east();
        assert!(model.compatible(pa, east).contains(&pb));

        fn b_east() -> Direction {
            DirectionSet::cardinal_2d()
                .iter()
                .find(|&d| DirectionSet::cardinal_2d().vector(d) == (1, 0, 0))
                .unwrap()
        }
    }

    #[test]
    #[should_panic(expected = "not a member")]
    fn add_adjacency_with_unknown_vector_panics() {
        let mut b: AdjacencyBuilder<&str> = AdjacencyBuilder::new(DirectionSet::cardinal_2d());
        b.add_adjacency(&["a"], &["b"], 0, 0, 1);
    }

    #[test]
    fn add_sample_with_symmetry_registers_all_eight_rotations() {
        let directions = DirectionSet::cardinal_2d();
        // An L-shaped 2x2 sample with no symmetry of its own, so all 8
        // orientations contribute adjacency a plain add_sample would miss.
        let topology = Topology::new(2, 2, 1);
        let mut b: AdjacencyBuilder<char> = AdjacencyBuilder::new(directions.clone());
        b.add_sample_with_symmetry(&['a', 'b', 'c', 'a'], &topology);
        let pa = b.pattern_for_tile(&'a');
        let pb = b.pattern_for_tile(&'b');
        let pc = b.pattern_for_tile(&'c');
        assert_eq!(b.tile_count(), 3);
        let model = b.build();
        assert!(model.check_symmetry(|d| directions.inverse(d)));
        // plain add_sample would only ever see 'a' next to 'b' and 'c';
        // the rotated copies also place 'b' next to 'c'.
        let east = directions
            .iter()
            .find(|&d| directions.vector(d) == (1, 0, 0))
            .unwrap();
        let west = directions.inverse(east);
        let adjacent_to_b = model.compatible(pb, east).iter().chain(model.compatible(pb, west)).copied().collect::<Vec<_>>();
        assert!(adjacent_to_b.contains(&pc) || adjacent_to_b.contains(&pa));
    }
}
