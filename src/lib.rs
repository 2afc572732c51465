pub mod builder;
pub mod constraint;
pub mod count_constraint;
pub mod direction;
pub mod error;
pub mod orientation;
pub mod path_constraint;
pub mod pattern;
pub mod propagator;
pub mod tile_propagator;
pub mod tile_set;
pub mod topology;
pub mod wave;

pub use builder::AdjacencyBuilder;
pub use constraint::{Constraint, Resolution};
pub use count_constraint::{Comparison, CountConstraint};
pub use direction::{Axis, Direction, DirectionSet};
pub use error::{ProgrammerError, RunError};
pub use orientation::{rotate_sample, Orientation, OrientationTable};
pub use path_constraint::{EdgedPathConstraint, PathConstraint};
pub use pattern::{PatternId, PatternModel, PatternWeight};
pub use propagator::{PropagatorOptions, PropagatorStats, Status, WavePropagator};
pub use tile_propagator::TilePropagator;
pub use tile_set::TileSet;
pub use topology::{CellIndex, Topology};
pub use wave::{EntropyAggregates, Wave, WaveCell};
