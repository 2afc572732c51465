//! The dihedral group of a square: the 8 ways a 2D sample can be rotated
//! and reflected before being fed to `AdjacencyBuilder::add_sample`, so a
//! single example tilemap can teach the model every symmetric variant of
//! its motifs. Generalizes the teacher's `coord_2d::Coord`-based
//! `transform_coord` to operate directly on `(x, y)` pairs, since this
//! crate no longer depends on `coord_2d`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Orientation {
    /// ##.
    /// ...
    /// ...
    Original,
    /// ..#
    /// ..#
    /// ...
    Clockwise90,
    /// ...
    /// ...
    /// .##
    Clockwise180,
    /// ...
    /// #..
    /// #..
    Clockwise270,
    /// #..
    /// #..
    /// ...
    DiagonallyFlipped,
    /// .##
    /// ...
    /// ...
    DiagonallyFlippedClockwise90,
    /// ...
    /// ..#
    /// ..#
    DiagonallyFlippedClockwise180,
    /// ...
    /// ...
    /// ##.
    DiagonallyFlippedClockwise270,
}

pub const NUM_ORIENTATIONS: usize = 8;

use self::Orientation::*;
pub const ALL: [Orientation; NUM_ORIENTATIONS] = [
    Original,
    Clockwise90,
    Clockwise180,
    Clockwise270,
    DiagonallyFlipped,
    DiagonallyFlippedClockwise90,
    DiagonallyFlippedClockwise180,
    DiagonallyFlippedClockwise270,
];

impl Orientation {
    /// True for the 4 orientations that swap width and height.
    pub fn transposes_size(self) -> bool {
        matches!(
            self,
            Clockwise90 | Clockwise270 | DiagonallyFlippedClockwise90 | DiagonallyFlippedClockwise270
        )
    }

    pub fn transformed_size(self, width: u32, height: u32) -> (u32, u32) {
        if self.transposes_size() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Maps a coordinate in the original `width` x `height` sample to its
    /// position after this orientation is applied.
    pub fn transform_coord(self, width: u32, height: u32, x: u32, y: u32) -> (u32, u32) {
        let (x, y) = (x as i32, y as i32);
        let (w, h) = (width as i32, height as i32);
        match self {
            Original => (x as u32, y as u32),
            Clockwise90 => (y as u32, (w - 1 - x) as u32),
            Clockwise180 => ((w - 1 - x) as u32, (h - 1 - y) as u32),
            Clockwise270 => ((h - 1 - y) as u32, x as u32),
            DiagonallyFlipped => (y as u32, x as u32),
            DiagonallyFlippedClockwise90 => ((w - 1 - x) as u32, y as u32),
            DiagonallyFlippedClockwise180 => ((h - 1 - y) as u32, (w - 1 - x) as u32),
            DiagonallyFlippedClockwise270 => (x as u32, (h - 1 - y) as u32),
        }
    }

    /// Applies this orientation to a direction vector's (x, y) components,
    /// leaving z untouched: rotating a sample's tiles must rotate the
    /// adjacency vectors `AdjacencyBuilder::add_sample` derives from them
    /// by the same amount.
    pub fn rotate_vector(self, dx: i32, dy: i32, dz: i32) -> (i32, i32, i32) {
        let (x, y) = match self {
            Original => (dx, dy),
            Clockwise90 => (dy, -dx),
            Clockwise180 => (-dx, -dy),
            Clockwise270 => (-dy, dx),
            DiagonallyFlipped => (dy, dx),
            DiagonallyFlippedClockwise90 => (-dx, dy),
            DiagonallyFlippedClockwise180 => (-dy, -dx),
            DiagonallyFlippedClockwise270 => (dx, -dy),
        };
        (x, y, dz)
    }
}

#[derive(Debug, Clone)]
pub struct OrientationTable<T> {
    table: [Option<T>; NUM_ORIENTATIONS],
}

impl<T> Default for OrientationTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrientationTable<T> {
    pub fn new() -> Self {
        Self {
            table: [None, None, None, None, None, None, None, None],
        }
    }
    pub fn get(&self, orientation: Orientation) -> Option<&T> {
        self.table[orientation as usize].as_ref()
    }
    pub fn get_mut(&mut self, orientation: Orientation) -> Option<&mut T> {
        self.table[orientation as usize].as_mut()
    }
    pub fn insert(&mut self, orientation: Orientation, value: T) {
        self.table[orientation as usize] = Some(value);
    }
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.table.iter().filter_map(|t| t.as_ref())
    }
}

/// Re-indexes a flat `width * height` sample by `orientation`, returning
/// the transformed sample and its (possibly transposed) dimensions.
pub fn rotate_sample<T: Clone>(
    sample: &[T],
    width: u32,
    height: u32,
    orientation: Orientation,
) -> (Vec<T>, u32, u32) {
    let (new_width, new_height) = orientation.transformed_size(width, height);
    let mut out: Vec<Option<T>> = vec![None; (new_width * new_height) as usize];
    for y in 0..height {
        for x in 0..width {
            let (nx, ny) = orientation.transform_coord(width, height, x, y);
            let src = (y * width + x) as usize;
            let dst = (ny * new_width + nx) as usize;
            out[dst] = Some(sample[src].clone());
        }
    }
    let out = out
        .into_iter()
        .map(|v| v.expect("rotate_sample: transform_coord must be a bijection onto the output grid"))
        .collect();
    (out, new_width, new_height)
}
