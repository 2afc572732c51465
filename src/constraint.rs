use crate::propagator::WavePropagator;

/// Outcome of a constraint callback (spec.md section 3/4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// This constraint is satisfied and will never need to run again (the
    /// propagator still calls `check` after further changes, but a
    /// constraint may use this to signal it has nothing left to enforce).
    Decided,
    /// Nothing wrong yet, but the constraint may still need future checks.
    Undecided,
    /// The current possibility set can never satisfy this constraint.
    /// Treated identically to a propagation contradiction: triggers the
    /// standard backtrack path (spec.md section 4.4).
    Contradiction,
}

/// A non-local constraint plugged into the propagation loop. `init` runs
/// once before the first observation; `check` runs after every propagation
/// fixed point, in registration order, until a stable pass where no
/// constraint causes further changes (spec.md section 4.4).
///
/// Constraints operate purely at the pattern level through
/// `WavePropagator`'s `select`/`ban`-by-`TileSet` methods; the tile ->
/// pattern mapping a constraint needs (e.g. `PathConstraint`'s path tile
/// set) is resolved once, at construction time, by whoever builds the
/// constraint from a `TilePropagator`. Mutating the propagator from within
/// another constraint's `check` is a programmer error (spec.md section 7).
pub trait Constraint {
    fn init(&mut self, _propagator: &mut WavePropagator) -> Resolution {
        Resolution::Undecided
    }
    fn check(&mut self, propagator: &mut WavePropagator) -> Resolution;
}
