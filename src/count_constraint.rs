use crate::constraint::{Constraint, Resolution};
use crate::propagator::{Status, WavePropagator};
use crate::tile_set::TileSet;
use crate::topology::CellIndex;

/// Comparison a `CountConstraint` enforces against the number of cells
/// that end up decided to a tile in its `TileSet` (spec.md section 4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    AtMost(u32),
    AtLeast(u32),
    Exactly(u32),
}

/// Bounds how many cells in `cells` (or every cell, if `cells` is empty)
/// may end up decided to a pattern in `tile_set` (spec.md section 4.6:
/// "at most/at least/exactly K cells may be tile X").
///
/// Tracked incrementally against two running counts per `check`: `yes`,
/// cells already decided to a member pattern, and `maybe`, cells that
/// still could be. `AtMost` bans the set once `yes` reaches the bound;
/// `AtLeast`/`Exactly` contradict once `maybe` can no longer reach it.
/// `eager`, when set, also selects the set onto every still-`maybe` cell
/// as soon as `yes` alone satisfies an `Exactly`/`AtLeast` bound, instead
/// of waiting for the rest of the wave to collapse naturally.
pub struct CountConstraint {
    cells: Vec<CellIndex>,
    tile_set: TileSet,
    comparison: Comparison,
    eager: bool,
}

impl CountConstraint {
    pub fn new(cells: Vec<CellIndex>, tile_set: TileSet, comparison: Comparison, eager: bool) -> Self {
        Self {
            cells,
            tile_set,
            comparison,
            eager,
        }
    }

    fn relevant_cells<'a>(&'a self, propagator: &'a WavePropagator) -> Box<dyn Iterator<Item = CellIndex> + 'a> {
        if self.cells.is_empty() {
            Box::new(0..propagator.wave().cell_count() as CellIndex)
        } else {
            Box::new(self.cells.iter().copied())
        }
    }

    fn counts(&self, propagator: &WavePropagator) -> (u32, u32) {
        let mut yes = 0u32;
        let mut maybe = 0u32;
        for cell in self.relevant_cells(propagator) {
            let wave_cell = propagator.wave().cell(cell);
            let overlaps = wave_cell.possible_patterns().any(|p| self.tile_set.contains(p));
            if !overlaps {
                continue;
            }
            maybe += 1;
            if wave_cell.is_decided() {
                yes += 1;
            }
        }
        (yes, maybe)
    }
}

impl Constraint for CountConstraint {
    fn check(&mut self, propagator: &mut WavePropagator) -> Resolution {
        let (yes, maybe) = self.counts(propagator);
        match self.comparison {
            Comparison::AtMost(k) => {
                if yes > k {
                    return Resolution::Contradiction;
                }
                if yes == k && maybe > yes {
                    let undecided: Vec<CellIndex> = self
                        .relevant_cells(propagator)
                        .filter(|&c| {
                            let cell = propagator.wave().cell(c);
                            !cell.is_decided() && cell.possible_patterns().any(|p| self.tile_set.contains(p))
                        })
                        .collect();
                    for cell in undecided {
                        if propagator.ban_patterns(cell, &self.tile_set) == Status::Contradiction {
                            return Resolution::Contradiction;
                        }
                    }
                    return Resolution::Decided;
                }
            }
            Comparison::AtLeast(k) => {
                if maybe < k {
                    return Resolution::Contradiction;
                }
                if self.eager && yes < k && maybe == k {
                    let undecided: Vec<CellIndex> = self
                        .relevant_cells(propagator)
                        .filter(|&c| {
                            let cell = propagator.wave().cell(c);
                            !cell.is_decided() && cell.possible_patterns().any(|p| self.tile_set.contains(p))
                        })
                        .collect();
                    for cell in undecided {
                        if propagator.select_patterns(cell, &self.tile_set) == Status::Contradiction {
                            return Resolution::Contradiction;
                        }
                    }
                    return Resolution::Decided;
                }
                if yes >= k {
                    return Resolution::Decided;
                }
            }
            Comparison::Exactly(k) => {
                if yes > k || maybe < k {
                    return Resolution::Contradiction;
                }
                if yes == k && maybe > yes {
                    let undecided: Vec<CellIndex> = self
                        .relevant_cells(propagator)
                        .filter(|&c| {
                            let cell = propagator.wave().cell(c);
                            !cell.is_decided() && cell.possible_patterns().any(|p| self.tile_set.contains(p))
                        })
                        .collect();
                    for cell in undecided {
                        if propagator.ban_patterns(cell, &self.tile_set) == Status::Contradiction {
                            return Resolution::Contradiction;
                        }
                    }
                    return Resolution::Decided;
                }
                if self.eager && yes < k && maybe == k {
                    let undecided: Vec<CellIndex> = self
                        .relevant_cells(propagator)
                        .filter(|&c| {
                            let cell = propagator.wave().cell(c);
                            !cell.is_decided() && cell.possible_patterns().any(|p| self.tile_set.contains(p))
                        })
                        .collect();
                    for cell in undecided {
                        if propagator.select_patterns(cell, &self.tile_set) == Status::Contradiction {
                            return Resolution::Contradiction;
                        }
                    }
                    return Resolution::Decided;
                }
            }
        }
        Resolution::Undecided
    }
}
