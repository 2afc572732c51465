use crate::direction::{Direction, DirectionSet};
use crate::pattern::{PatternId, PatternModel, PatternTable, PatternWeight};
use crate::topology::{CellIndex, Topology};
use fixedbitset::FixedBitSet;
use rand::Rng;
use std::cmp::Ordering;

/// Per-(cell, pattern) support counters, one slot per direction: the
/// number of still-possible neighbouring patterns (in that direction)
/// that would keep this pattern legal here. When a slot hits zero the
/// pattern is no longer supportable and is dropped from the cell
/// (spec.md section 4.2). Generalizes the teacher's
/// `NumWaysToBecomePattern`/`CardinalDirectionTable<u32>` (4-way, fixed
/// size) to a `Vec<u32>` sized to the model's (runtime) direction count.
#[derive(Debug, Clone)]
struct NumWaysToBecomePattern {
    counts: Vec<u32>,
    removed: bool,
}

impl NumWaysToBecomePattern {
    fn new(counts: Vec<u32>) -> Self {
        let removed = counts.iter().any(|&c| c == 0);
        Self { counts, removed }
    }

    fn forbidden() -> Self {
        Self {
            counts: Vec::new(),
            removed: true,
        }
    }

    /// Decrements the support count for `direction` if this pattern isn't
    /// already removed. Returns `None` if nothing changed (already
    /// removed), otherwise `Some(reached_zero)`: every actual decrement
    /// must be recorded for backtrack undo, but only a decrement that
    /// reaches zero triggers elimination of the pattern itself.
    fn try_decrement(&mut self, direction: Direction) -> Option<bool> {
        if self.removed {
            return None;
        }
        let count = &mut self.counts[direction as usize];
        debug_assert!(*count > 0);
        *count -= 1;
        if *count == 0 {
            self.removed = true;
            Some(true)
        } else {
            Some(false)
        }
    }

    /// Inverse of `try_decrement` for the same direction. Exactly reverses
    /// a single prior decrement; safe to call unconditionally during undo
    /// because decrement/restore events for a given (cell, pattern,
    /// direction) are always undone in exact reverse chronological order,
    /// so the only restore that can flip `removed` back to false is the
    /// one matching the decrement that originally set it.
    fn restore(&mut self, direction: Direction) {
        self.counts[direction as usize] += 1;
        self.removed = false;
    }
}

/// `sumFrequency`/`sumFrequencyLog`/`patternCount` from spec.md section 3,
/// kept as O(1)-updatable running sums so entropy never needs to rescan a
/// cell's pattern set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntropyAggregates {
    sum_frequency: u32,
    sum_frequency_log: f64,
    pattern_count: u32,
}

impl EntropyAggregates {
    pub fn pattern_count(&self) -> u32 {
        self.pattern_count
    }

    fn remove(&mut self, weight: &PatternWeight) {
        debug_assert!(self.pattern_count >= 1);
        self.pattern_count -= 1;
        self.sum_frequency -= weight.weight();
        self.sum_frequency_log -= weight.weight_log_weight();
    }

    fn add_back(&mut self, weight: &PatternWeight) {
        self.pattern_count += 1;
        self.sum_frequency += weight.weight();
        self.sum_frequency_log += weight.weight_log_weight();
    }

    /// log2(sum_freq) - sum_freq_log / sum_freq, per spec.md section 4.2.
    pub fn entropy(&self) -> f64 {
        debug_assert!(self.sum_frequency > 0);
        let sum = f64::from(self.sum_frequency);
        sum.log2() - self.sum_frequency_log / sum
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EntropyWithNoise {
    pub entropy: f64,
    pub noise: u32,
    pub pattern_count: u32,
}

impl Eq for EntropyWithNoise {}

impl PartialOrd for EntropyWithNoise {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.entropy.partial_cmp(&other.entropy) {
            Some(Ordering::Equal) | None => self.noise.partial_cmp(&other.noise),
            other_ordering => other_ordering,
        }
    }
}

impl Ord for EntropyWithNoise {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }
}

/// One cell's worth of wave state: which patterns remain possible, and the
/// bookkeeping needed to pick the next cell to collapse in O(1) and to
/// propagate eliminations in O(1) amortized per edge.
#[derive(Debug, Clone)]
pub struct WaveCell {
    possible: FixedBitSet,
    noise: u32,
    aggregates: EntropyAggregates,
    supports: PatternTable<NumWaysToBecomePattern>,
}

impl WaveCell {
    fn new(num_patterns: usize) -> Self {
        Self {
            possible: FixedBitSet::with_capacity(num_patterns),
            noise: 0,
            aggregates: EntropyAggregates::default(),
            supports: PatternTable::from_vec(Vec::with_capacity(num_patterns)),
        }
    }

    fn init(
        &mut self,
        index: CellIndex,
        model: &PatternModel,
        topology: &Topology,
        directions: &DirectionSet,
        rng: &mut impl Rng,
    ) {
        self.noise = rng.gen();
        self.possible.clear();
        self.aggregates = EntropyAggregates::default();
        let mut supports = Vec::with_capacity(model.num_patterns());
        for p in 0..model.num_patterns() as PatternId {
            match model.weight(p) {
                None => supports.push(NumWaysToBecomePattern::forbidden()),
                Some(weight) => {
                    self.possible.insert(p as usize);
                    self.aggregates.pattern_count += 1;
                    self.aggregates.sum_frequency += weight.weight();
                    self.aggregates.sum_frequency_log += weight.weight_log_weight();
                    let counts = (0..directions.count() as Direction)
                        .map(|d| {
                            let inv = directions.inverse(d);
                            model
                                .compatible(p, inv)
                                .iter()
                                .filter(|&&q| model.weight(q).is_some())
                                .count() as u32
                        })
                        .collect();
                    supports.push(NumWaysToBecomePattern::new(counts));
                }
            }
        }
        self.supports = PatternTable::from_vec(supports);
    }

    pub fn pattern_count(&self) -> u32 {
        self.aggregates.pattern_count
    }

    pub fn is_decided(&self) -> bool {
        self.aggregates.pattern_count == 1
    }

    pub fn is_contradicted(&self) -> bool {
        self.aggregates.pattern_count == 0
    }

    pub fn is_possible(&self, pattern: PatternId) -> bool {
        self.possible.contains(pattern as usize)
    }

    pub fn possible_patterns(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.possible.ones().map(|p| p as PatternId)
    }

    /// The single remaining pattern, if this cell is decided.
    pub fn chosen_pattern(&self) -> Option<PatternId> {
        if self.is_decided() {
            self.possible.ones().next().map(|p| p as PatternId)
        } else {
            None
        }
    }

    pub(crate) fn entropy_with_noise(&self) -> EntropyWithNoise {
        EntropyWithNoise {
            entropy: self.aggregates.entropy(),
            noise: self.noise,
            pattern_count: self.aggregates.pattern_count,
        }
    }

    pub fn entropy_aggregates(&self) -> EntropyAggregates {
        self.aggregates
    }

    /// Weighted-random choice among the still-possible patterns, per
    /// spec.md section 4.2 step 2.
    pub fn choose_pattern(&self, model: &PatternModel, rng: &mut impl Rng) -> PatternId {
        debug_assert!(self.aggregates.pattern_count >= 1);
        let mut remaining = rng.gen_range(0..self.aggregates.sum_frequency);
        for p in self.possible_patterns() {
            let weight = model.weight(p).expect("possible pattern must be weighted");
            if remaining >= weight.weight() {
                remaining -= weight.weight();
            } else {
                return p;
            }
        }
        unreachable!("sum_frequency matched the sum of possible pattern weights")
    }

    /// Eliminate `pattern`, which must currently be possible. Returns the
    /// bit was actually cleared (always true by precondition) so callers
    /// can record the elimination for backtracking.
    pub(crate) fn eliminate(&mut self, pattern: PatternId, weight: &PatternWeight) {
        debug_assert!(self.possible.contains(pattern as usize));
        self.possible.set(pattern as usize, false);
        self.aggregates.remove(weight);
    }

    pub(crate) fn restore(&mut self, pattern: PatternId, weight: &PatternWeight) {
        debug_assert!(!self.possible.contains(pattern as usize));
        self.possible.set(pattern as usize, true);
        self.aggregates.add_back(weight);
    }

    pub(crate) fn try_decrement_support(
        &mut self,
        pattern: PatternId,
        direction: Direction,
    ) -> Option<bool> {
        self.supports[pattern].try_decrement(direction)
    }

    pub(crate) fn restore_support(&mut self, pattern: PatternId, direction: Direction) {
        self.supports[pattern].restore(direction);
    }
}

/// The mutable state of propagation: `possible[cell][pattern]` plus
/// per-cell entropy aggregates (spec.md section 3). Created at
/// construction and at each `clear()`; mutated only by `WavePropagator`.
#[derive(Debug, Clone)]
pub struct Wave {
    cells: Vec<WaveCell>,
    num_patterns: usize,
}

impl Wave {
    pub fn new(cell_count: usize, num_patterns: usize) -> Self {
        Self {
            cells: (0..cell_count).map(|_| WaveCell::new(num_patterns)).collect(),
            num_patterns,
        }
    }

    pub(crate) fn init(
        &mut self,
        model: &PatternModel,
        topology: &Topology,
        directions: &DirectionSet,
        rng: &mut impl Rng,
    ) {
        for (index, cell) in self.cells.iter_mut().enumerate() {
            cell.init(index as CellIndex, model, topology, directions, rng);
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn num_patterns(&self) -> usize {
        self.num_patterns
    }

    pub fn cell(&self, index: CellIndex) -> &WaveCell {
        &self.cells[index as usize]
    }

    pub(crate) fn cell_mut(&mut self, index: CellIndex) -> &mut WaveCell {
        &mut self.cells[index as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &WaveCell> {
        self.cells.iter()
    }

    pub fn enumerate(&self) -> impl Iterator<Item = (CellIndex, &WaveCell)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, c)| (i as CellIndex, c))
    }

    pub fn all_decided(&self) -> bool {
        self.cells.iter().all(WaveCell::is_decided)
    }

    pub fn any_contradicted(&self) -> bool {
        self.cells.iter().any(WaveCell::is_contradicted)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::builder::AdjacencyBuilder;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn uniform_model() -> (PatternModel, Topology, DirectionSet) {
        let directions = DirectionSet::cardinal_2d();
        let mut b: AdjacencyBuilder<char> = AdjacencyBuilder::new(directions.clone());
        b.add_adjacency(&['a'], &['a', 'b'], 1, 0, 0);
        b.add_adjacency(&['b'], &['a', 'b'], 1, 0, 0);
        b.set_uniform_frequency();
        let model = b.build();
        let topology = Topology::new(3, 3, 1);
        (model, topology, directions)
    }

    #[test]
    fn fresh_wave_has_all_weighted_patterns_possible() {
        let (model, topology, directions) = uniform_model();
        let mut wave = Wave::new(topology.cell_count(), model.num_patterns());
        let mut rng = StdRng::seed_from_u64(1);
        wave.init(&model, &topology, &directions, &mut rng);
        for cell in wave.iter() {
            assert_eq!(cell.pattern_count(), model.num_patterns() as u32);
            assert!(!cell.is_decided());
            assert!(!cell.is_contradicted());
        }
    }

    #[test]
    fn eliminate_then_restore_is_bit_identical() {
        let (model, topology, directions) = uniform_model();
        let mut wave = Wave::new(topology.cell_count(), model.num_patterns());
        let mut rng = StdRng::seed_from_u64(2);
        wave.init(&model, &topology, &directions, &mut rng);
        let before = wave.cell(0).clone();
        let weight = *model.weight(0).unwrap();
        wave.cell_mut(0).eliminate(0, &weight);
        assert_ne!(wave.cell(0).pattern_count(), before.pattern_count());
        wave.cell_mut(0).restore(0, &weight);
        assert_eq!(wave.cell(0).pattern_count(), before.pattern_count());
        assert_eq!(
            wave.cell(0).entropy_aggregates().sum_frequency,
            before.entropy_aggregates().sum_frequency
        );
    }

    #[test]
    fn cell_possible_at_boundary_when_compatibility_is_declared_in_every_direction() {
        let directions = DirectionSet::cardinal_2d();
        let mut b: AdjacencyBuilder<char> = AdjacencyBuilder::new(directions.clone());
        for d in [(1, 0, 0), (-1, 0, 0), (0, 1, 0), (0, -1, 0)] {
            b.add_adjacency(&['a'], &['a'], d.0, d.1, d.2);
        }
        b.set_uniform_frequency();
        let model = b.build();
        let topology = Topology::new(2, 1, 1);
        let mut wave = Wave::new(topology.cell_count(), model.num_patterns());
        let mut rng = StdRng::seed_from_u64(3);
        wave.init(&model, &topology, &directions, &mut rng);
        let east_edge = topology.index_of(1, 0, 0);
        assert!(wave.cell(east_edge).is_possible(0));
    }

    #[test]
    fn asymmetric_direction_with_no_declared_compatibility_is_impossible_everywhere() {
        // 'a' only ever declares compatibility with itself going east/west;
        // north/south compatibility was never declared, so the support
        // count for those directions is genuinely zero. That must make 'a'
        // impossible at every cell, including the cell at the topology's own
        // north edge where there is no northward neighbour at all -- a
        // hardcoded default support count for "no neighbour here" directions
        // would wrongly keep it possible there.
        let directions = DirectionSet::cardinal_2d();
        let mut b: AdjacencyBuilder<char> = AdjacencyBuilder::new(directions.clone());
        b.add_adjacency(&['a'], &['a'], 1, 0, 0);
        b.set_uniform_frequency();
        let model = b.build();
        let topology = Topology::new(2, 2, 1);
        let mut wave = Wave::new(topology.cell_count(), model.num_patterns());
        let mut rng = StdRng::seed_from_u64(4);
        wave.init(&model, &topology, &directions, &mut rng);
        for cell in wave.iter() {
            assert!(!cell.is_possible(0));
        }
    }
}
