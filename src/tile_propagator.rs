use crate::builder::AdjacencyBuilder;
use crate::constraint::Constraint;
use crate::direction::DirectionSet;
use crate::error::ProgrammerError;
use crate::pattern::PatternId;
use crate::propagator::{PropagatorOptions, PropagatorStats, Status, WavePropagator};
use crate::tile_set::TileSet;
use crate::topology::{CellIndex, Topology};
use hashbrown::HashMap;
use std::hash::Hash;

/// The tile-facing front door onto `WavePropagator` (spec.md section 4.3).
/// Wraps the pattern-level engine with the tile <-> pattern map handed
/// over from the `AdjacencyBuilder` that produced its model, so callers
/// never see a bare `PatternId`.
pub struct TilePropagator<T: Eq + Hash + Clone> {
    propagator: WavePropagator,
    tile_to_pattern: HashMap<T, PatternId>,
    pattern_to_tile: Vec<T>,
}

impl<T: Eq + Hash + Clone> TilePropagator<T> {
    /// Consumes a builder (for its tile <-> pattern map), compiles its
    /// model, and wires it to a fresh `WavePropagator` over `topology`.
    pub fn new(
        builder: AdjacencyBuilder<T>,
        topology: Topology,
        directions: DirectionSet,
        options: PropagatorOptions,
        constraints: Vec<Box<dyn Constraint>>,
    ) -> Result<Self, ProgrammerError> {
        let tile_to_pattern: HashMap<T, PatternId> = (0..builder.tile_count())
            .map(|p| (builder.tile_of_pattern(p as PatternId).clone(), p as PatternId))
            .collect();
        let pattern_to_tile: Vec<T> = (0..builder.tile_count())
            .map(|p| builder.tile_of_pattern(p as PatternId).clone())
            .collect();
        let model = builder.build();
        let propagator = WavePropagator::new(model, topology, directions, options, constraints)?;
        Ok(Self {
            propagator,
            tile_to_pattern,
            pattern_to_tile,
        })
    }

    pub fn status(&self) -> Status {
        self.propagator.status()
    }
    pub fn backtrack_count(&self) -> u64 {
        self.propagator.backtrack_count()
    }
    pub fn steps_taken(&self) -> u64 {
        self.propagator.steps_taken()
    }
    pub fn stats(&self) -> PropagatorStats {
        self.propagator.stats()
    }
    pub fn clear(&mut self) {
        self.propagator.clear()
    }
    pub fn step(&mut self) -> Status {
        self.propagator.step()
    }
    pub fn run(&mut self, max_steps: Option<u64>) -> Status {
        self.propagator.run(max_steps)
    }

    fn tile_set(&self, tiles: &[T]) -> TileSet {
        let members = tiles.iter().filter_map(|t| self.tile_to_pattern.get(t).copied());
        TileSet::new(self.pattern_to_tile.len(), members)
    }

    /// Restricts `cell` to exactly the given tiles.
    pub fn select(&mut self, cell: CellIndex, tiles: &[T]) -> Status {
        let set = self.tile_set(tiles);
        self.propagator.select_patterns(cell, &set)
    }

    /// Forbids the given tiles at `cell`.
    pub fn ban(&mut self, cell: CellIndex, tiles: &[T]) -> Status {
        let set = self.tile_set(tiles);
        self.propagator.ban_patterns(cell, &set)
    }

    /// The tiles still possible at `cell`.
    pub fn get_possible(&self, cell: CellIndex) -> Vec<T> {
        self.propagator
            .wave()
            .cell(cell)
            .possible_patterns()
            .map(|p| self.pattern_to_tile[p as usize].clone())
            .collect()
    }

    /// For each tile in `tiles`: whether it's banned (impossible) and
    /// whether it's selected (the cell's only remaining possibility) at
    /// `(x, y, z)`, as `(all_banned, all_selected)` over the whole set
    /// (spec.md section 6, `getBannedSelected`). `all_selected` requires
    /// every tile in `tiles` to be possible and nothing outside it to be.
    pub fn get_banned_selected(
        &self,
        x: u32,
        y: u32,
        z: u32,
        tiles: &[T],
    ) -> Result<(bool, bool), ProgrammerError> {
        let cell = self.propagator.topology().try_index_of(x, y, z)?;
        let set = self.tile_set(tiles);
        let wave_cell = self.propagator.wave().cell(cell);
        let all_banned = wave_cell.possible_patterns().all(|p| !set.contains(p));
        let all_selected = wave_cell.possible_patterns().all(|p| set.contains(p));
        Ok((all_banned, all_selected))
    }

    /// Each cell's decided tile, or `undecided`/`contradiction` sentinels
    /// for cells that never settled (spec.md section 6, `toValueArray`).
    pub fn to_value_array(&self, undecided: T, contradiction: T) -> Vec<T> {
        self.propagator
            .wave()
            .iter()
            .map(|cell| match cell.chosen_pattern() {
                Some(p) => self.pattern_to_tile[p as usize].clone(),
                None if cell.is_contradicted() => contradiction.clone(),
                None => undecided.clone(),
            })
            .collect()
    }

    /// Each cell's most likely tile (highest-weight pattern still
    /// possible), for previewing an undecided wave (spec.md section 6,
    /// `toTopArray`).
    pub fn to_top_array(&self, undecided: T, contradiction: T) -> Vec<T> {
        let model = self.propagator.model();
        self.propagator
            .wave()
            .iter()
            .map(|cell| {
                if cell.is_contradicted() {
                    return contradiction.clone();
                }
                let best = cell
                    .possible_patterns()
                    .max_by_key(|&p| model.weight(p).map(|w| w.weight()).unwrap_or(0));
                match best {
                    Some(p) => self.pattern_to_tile[p as usize].clone(),
                    None => undecided.clone(),
                }
            })
            .collect()
    }

    pub fn make_tile_set(&self, tiles: &[T]) -> TileSet {
        self.tile_set(tiles)
    }

    pub fn propagator(&self) -> &WavePropagator {
        &self.propagator
    }
    pub fn propagator_mut(&mut self) -> &mut WavePropagator {
        &mut self.propagator
    }
}
