use std::fmt;

/// Hard, non-recoverable failures that abort the call that triggered them
/// (spec.md section 7): a `DirectionSet` whose direction count doesn't
/// match the `PatternModel` it's paired with, an out-of-range coordinate
/// passed to a coordinate-based query, a constraint that mutates the
/// propagator reentrantly from inside another constraint's `check`, or an
/// `EdgedPathConstraint` built over a non-2D topology (spec.md section 9,
/// open question).
///
/// Two failure modes named in earlier drafts of this type are not present
/// here because the type system already rules them out rather than needing
/// a runtime check: mutating a model after `AdjacencyBuilder::build` is
/// impossible because `build` consumes the builder by value, and a
/// constraint's compatibility-table symmetry is an invariant of
/// `PatternModel`, checked once by `PatternModel::check_symmetry` at the
/// point a model is hand-built (debug assertion in `builder.rs`), not
/// something a constraint can violate at runtime through the `Constraint`
/// trait's `TileSet`-only surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgrammerError {
    IncompatibleDirectionSet,
    CoordinateOutOfRange { x: u32, y: u32, z: u32 },
    EdgedPathConstraintRequires2d,
    ReentrantConstraintMutation,
}

impl fmt::Display for ProgrammerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgrammerError::IncompatibleDirectionSet => {
                write!(f, "direction set is incompatible with this topology or model")
            }
            ProgrammerError::CoordinateOutOfRange { x, y, z } => {
                write!(f, "coordinate ({}, {}, {}) is out of range", x, y, z)
            }
            ProgrammerError::EdgedPathConstraintRequires2d => write!(
                f,
                "EdgedPathConstraint requires a 2D Cartesian topology"
            ),
            ProgrammerError::ReentrantConstraintMutation => write!(
                f,
                "a constraint mutated the propagator from within another constraint's check"
            ),
        }
    }
}

impl std::error::Error for ProgrammerError {}

/// Wraps a `ProgrammerError` so it can cross an API boundary with `?`.
/// `Contradiction` is deliberately not a `RunError` variant: it's an
/// expected, recoverable outcome of the search (handled by backtracking,
/// or returned to the caller as `Status::Contradiction`), not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError(pub ProgrammerError);

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<ProgrammerError> for RunError {
    fn from(e: ProgrammerError) -> Self {
        RunError(e)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_mentions_coordinate() {
        let e = ProgrammerError::CoordinateOutOfRange { x: 1, y: 2, z: 3 };
        assert!(e.to_string().contains("1, 2, 3"));
    }

    #[test]
    fn run_error_wraps_and_displays_inner() {
        let e: RunError = ProgrammerError::EdgedPathConstraintRequires2d.into();
        assert!(e.to_string().contains("2D"));
    }
}
