use crate::pattern::PatternId;
use fixedbitset::FixedBitSet;

/// A precomputed bitmap over pattern indices derived from a tile list
/// (spec.md section 4.3). This is the currency constraints and
/// `TilePropagator` use to talk to `WavePropagator`: once built, a
/// `TileSet` no longer carries any tile-type information.
#[derive(Debug, Clone)]
pub struct TileSet {
    patterns: FixedBitSet,
}

impl TileSet {
    pub fn new(num_patterns: usize, members: impl IntoIterator<Item = PatternId>) -> Self {
        let mut patterns = FixedBitSet::with_capacity(num_patterns);
        for p in members {
            patterns.insert(p as usize);
        }
        Self { patterns }
    }

    pub fn single(num_patterns: usize, pattern: PatternId) -> Self {
        Self::new(num_patterns, std::iter::once(pattern))
    }

    pub fn contains(&self, pattern: PatternId) -> bool {
        self.patterns.contains(pattern as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = PatternId> + '_ {
        self.patterns.ones().map(|p| p as PatternId)
    }

    pub fn len(&self) -> usize {
        self.patterns.count_ones(..)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn union(&self, other: &TileSet) -> TileSet {
        let mut patterns = self.patterns.clone();
        patterns.union_with(&other.patterns);
        TileSet { patterns }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn membership_and_union() {
        let a = TileSet::new(4, vec![0, 1]);
        let b = TileSet::new(4, vec![2]);
        assert!(a.contains(0));
        assert!(!a.contains(2));
        let u = a.union(&b);
        assert!(u.contains(0) && u.contains(1) && u.contains(2));
        assert!(!u.contains(3));
    }
}
