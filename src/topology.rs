use crate::direction::{Direction, DirectionSet};
use crate::error::ProgrammerError;

/// Dense index of a cell: `x + y*width + z*width*height`, per spec.md
/// section 3.
pub type CellIndex = u32;

/// `(Width, Height, Depth, periodicX, periodicY, periodicZ, optional
/// mask[])`, per spec.md section 3. `tryMove` wraps on periodic axes, fails
/// at the boundary of non-periodic axes, and fails on masked-off cells.
#[derive(Debug, Clone)]
pub struct Topology {
    width: u32,
    height: u32,
    depth: u32,
    periodic_x: bool,
    periodic_y: bool,
    periodic_z: bool,
    mask: Option<Vec<bool>>,
}

impl Topology {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
            periodic_x: false,
            periodic_y: false,
            periodic_z: false,
            mask: None,
        }
    }

    pub fn with_periodic(mut self, x: bool, y: bool, z: bool) -> Self {
        self.periodic_x = x;
        self.periodic_y = y;
        self.periodic_z = z;
        self
    }

    /// `mask[i]` true means cell `i` participates in the topology; false
    /// means it is permanently excluded from adjacency and decision.
    ///
    /// # Panics
    /// Panics if `mask.len() != self.cell_count()` — a programmer error.
    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        assert_eq!(
            mask.len(),
            self.cell_count(),
            "Topology::with_mask: mask length must equal cell count"
        );
        self.mask = Some(mask);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.depth as usize)
    }

    pub fn is_2d(&self) -> bool {
        self.depth == 1
    }

    pub fn periodic(&self) -> (bool, bool, bool) {
        (self.periodic_x, self.periodic_y, self.periodic_z)
    }

    pub fn index_of(&self, x: u32, y: u32, z: u32) -> CellIndex {
        x + y * self.width + z * self.width * self.height
    }

    /// Bounds-checked form of `index_of`, for call sites that take raw
    /// coordinates from a caller rather than deriving them internally from
    /// an already-valid `CellIndex` (spec.md section 7: out-of-range
    /// coordinate is a programmer error, not a panic or a silent wrap).
    pub fn try_index_of(&self, x: u32, y: u32, z: u32) -> Result<CellIndex, ProgrammerError> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return Err(ProgrammerError::CoordinateOutOfRange { x, y, z });
        }
        Ok(self.index_of(x, y, z))
    }

    pub fn coord_of(&self, index: CellIndex) -> (u32, u32, u32) {
        let plane = self.width * self.height;
        let z = index / plane;
        let rem = index % plane;
        let y = rem / self.width;
        let x = rem % self.width;
        (x, y, z)
    }

    pub fn is_masked_out(&self, index: CellIndex) -> bool {
        match &self.mask {
            Some(mask) => !mask[index as usize],
            None => false,
        }
    }

    /// Step from `index` by direction `d` of `directions`. Returns `None` if
    /// the move falls off a non-periodic edge, wraps to a masked-off cell,
    /// or `index` itself is masked off.
    pub fn try_move(
        &self,
        index: CellIndex,
        d: Direction,
        directions: &DirectionSet,
    ) -> Option<CellIndex> {
        if self.is_masked_out(index) {
            return None;
        }
        let (x, y, z) = self.coord_of(index);
        let (dx, dy, dz) = directions.vector(d);

        let nx = Self::step_axis(x as i32, dx, self.width, self.periodic_x)?;
        let ny = Self::step_axis(y as i32, dy, self.height, self.periodic_y)?;
        let nz = Self::step_axis(z as i32, dz, self.depth, self.periodic_z)?;

        let result = self.index_of(nx, ny, nz);
        if self.is_masked_out(result) {
            None
        } else {
            Some(result)
        }
    }

    fn step_axis(value: i32, delta: i32, size: u32, periodic: bool) -> Option<u32> {
        let moved = value + delta;
        if periodic {
            let size = size as i32;
            Some((((moved % size) + size) % size) as u32)
        } else if moved >= 0 && (moved as u32) < size {
            Some(moved as u32)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_coord_roundtrip() {
        let t = Topology::new(4, 5, 3);
        for z in 0..3 {
            for y in 0..5 {
                for x in 0..4 {
                    let idx = t.index_of(x, y, z);
                    assert_eq!(t.coord_of(idx), (x, y, z));
                }
            }
        }
    }

    #[test]
    fn try_move_invariant_holds_when_both_succeed() {
        let directions = DirectionSet::cardinal_3d();
        let t = Topology::new(4, 4, 4).with_periodic(true, false, true);
        for index in 0..t.cell_count() as CellIndex {
            for d in directions.iter() {
                if let Some(n) = t.try_move(index, d, &directions) {
                    let inv = directions.inverse(d);
                    assert_eq!(t.try_move(n, inv, &directions), Some(index));
                }
            }
        }
    }

    #[test]
    fn non_periodic_edge_has_no_neighbour() {
        let directions = DirectionSet::cardinal_2d();
        let t = Topology::new(3, 3, 1);
        let top_left = t.index_of(0, 0, 0);
        let west = directions
            .iter()
            .find(|&d| directions.vector(d) == (-1, 0, 0))
            .unwrap();
        assert_eq!(t.try_move(top_left, west, &directions), None);
    }

    #[test]
    fn periodic_axis_wraps() {
        let directions = DirectionSet::cardinal_2d();
        let t = Topology::new(3, 3, 1).with_periodic(true, false, false);
        let top_left = t.index_of(0, 0, 0);
        let west = directions
            .iter()
            .find(|&d| directions.vector(d) == (-1, 0, 0))
            .unwrap();
        assert_eq!(t.try_move(top_left, west, &directions), Some(t.index_of(2, 0, 0)));
    }

    #[test]
    fn try_index_of_rejects_out_of_range_coordinates() {
        let t = Topology::new(3, 3, 1);
        assert_eq!(t.try_index_of(0, 0, 0), Ok(0));
        assert_eq!(t.try_index_of(2, 2, 0), Ok(8));
        assert_eq!(
            t.try_index_of(3, 0, 0),
            Err(ProgrammerError::CoordinateOutOfRange { x: 3, y: 0, z: 0 })
        );
        assert_eq!(
            t.try_index_of(0, 0, 1),
            Err(ProgrammerError::CoordinateOutOfRange { x: 0, y: 0, z: 1 })
        );
    }

    #[test]
    fn mask_blocks_neighbour() {
        let directions = DirectionSet::cardinal_2d();
        let mut mask = vec![true; 9];
        mask[1] = false; // (1, 0)
        let t = Topology::new(3, 3, 1).with_mask(mask);
        let origin = t.index_of(0, 0, 0);
        let east = directions
            .iter()
            .find(|&d| directions.vector(d) == (1, 0, 0))
            .unwrap();
        assert_eq!(t.try_move(origin, east, &directions), None);
    }
}
