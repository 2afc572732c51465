//! A direction set generalizes the teacher's dependency on the `direction`
//! crate's fixed 4-way `CardinalDirection` to a runtime-sized set capable of
//! describing the 6-way axis-aligned moves a 3D topology needs.

/// A direction is a small index into its owning `DirectionSet`.
pub type Direction = u8;

/// The six axis-aligned unit moves used to build 2D and 3D direction sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    XPlus,
    XMinus,
    YPlus,
    YMinus,
    ZPlus,
    ZMinus,
}

impl Axis {
    pub fn vector(self) -> (i32, i32, i32) {
        match self {
            Axis::XPlus => (1, 0, 0),
            Axis::XMinus => (-1, 0, 0),
            Axis::YPlus => (0, 1, 0),
            Axis::YMinus => (0, -1, 0),
            Axis::ZPlus => (0, 0, 1),
            Axis::ZMinus => (0, 0, -1),
        }
    }

    fn inverse(self) -> Axis {
        match self {
            Axis::XPlus => Axis::XMinus,
            Axis::XMinus => Axis::XPlus,
            Axis::YPlus => Axis::YMinus,
            Axis::YMinus => Axis::YPlus,
            Axis::ZPlus => Axis::ZMinus,
            Axis::ZMinus => Axis::ZPlus,
        }
    }
}

/// A finite set of directions with precomputed inverses and displacement
/// vectors. Construct with `DirectionSet::cardinal_2d()` (4-way, the
/// teacher's original domain) or `DirectionSet::cardinal_3d()` (6-way); or
/// `DirectionSet::custom` for any other caller-supplied direction list (e.g.
/// a diagonal-inclusive or hex set), as long as the caller provides a valid
/// involution for the inverse mapping.
#[derive(Debug, Clone)]
pub struct DirectionSet {
    vectors: Vec<(i32, i32, i32)>,
    inverses: Vec<Direction>,
}

impl DirectionSet {
    /// Build a direction set from explicit vectors and an inverse
    /// permutation. `inverses[d]` must satisfy `inverses[inverses[d]] == d`.
    ///
    /// # Panics
    /// Panics if `vectors.len() != inverses.len()` or the inverse mapping is
    /// not an involution: this is a programmer error in the caller, not a
    /// recoverable runtime condition (see spec.md section 7).
    pub fn custom(vectors: Vec<(i32, i32, i32)>, inverses: Vec<Direction>) -> Self {
        assert_eq!(
            vectors.len(),
            inverses.len(),
            "DirectionSet: vectors and inverses must have the same length"
        );
        for (d, &inv) in inverses.iter().enumerate() {
            assert_eq!(
                inverses[inv as usize], d as Direction,
                "DirectionSet: inverse mapping at {} is not an involution",
                d
            );
        }
        Self { vectors, inverses }
    }

    pub fn cardinal_2d() -> Self {
        let axes = [Axis::XPlus, Axis::YPlus, Axis::XMinus, Axis::YMinus];
        Self::from_axes(&axes)
    }

    pub fn cardinal_3d() -> Self {
        let axes = [
            Axis::XPlus,
            Axis::XMinus,
            Axis::YPlus,
            Axis::YMinus,
            Axis::ZPlus,
            Axis::ZMinus,
        ];
        Self::from_axes(&axes)
    }

    fn from_axes(axes: &[Axis]) -> Self {
        let vectors = axes.iter().map(|a| a.vector()).collect::<Vec<_>>();
        let inverses = axes
            .iter()
            .map(|a| {
                let inv = a.inverse();
                axes.iter()
                    .position(|&other| other == inv)
                    .expect("DirectionSet::from_axes: inverse axis missing from set")
                    as Direction
            })
            .collect();
        Self { vectors, inverses }
    }

    pub fn count(&self) -> usize {
        self.vectors.len()
    }

    pub fn vector(&self, d: Direction) -> (i32, i32, i32) {
        self.vectors[d as usize]
    }

    pub fn inverse(&self, d: Direction) -> Direction {
        self.inverses[d as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = Direction> + '_ {
        0..self.vectors.len() as Direction
    }

    /// True iff this set describes a 2D topology (every vector has z == 0).
    /// Used by `EdgedPathConstraint::init` to reject non-2D topologies per
    /// spec.md's open question in section 9.
    pub fn is_2d(&self) -> bool {
        self.vectors.iter().all(|&(_, _, z)| z == 0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cardinal_2d_inverses_are_involutions() {
        let ds = DirectionSet::cardinal_2d();
        for d in ds.iter() {
            assert_eq!(ds.inverse(ds.inverse(d)), d);
        }
        assert!(ds.is_2d());
    }

    #[test]
    fn cardinal_3d_vectors_and_inverses() {
        let ds = DirectionSet::cardinal_3d();
        assert_eq!(ds.count(), 6);
        assert!(!ds.is_2d());
        for d in ds.iter() {
            let (dx, dy, dz) = ds.vector(d);
            let (ix, iy, iz) = ds.vector(ds.inverse(d));
            assert_eq!((dx + ix, dy + iy, dz + iz), (0, 0, 0));
        }
    }

    #[test]
    #[should_panic(expected = "involution")]
    fn custom_rejects_bad_inverse() {
        DirectionSet::custom(vec![(1, 0, 0), (0, 1, 0)], vec![1, 1]);
    }
}
