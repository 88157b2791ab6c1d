//! Position maps: how a step moves positions in the document around.

/// Which side a mapped position sticks to when it sits exactly on the
/// edge of (or inside) a replaced range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    /// Stay with the content before the replaced range.
    #[default]
    Before,
    /// Move past the inserted content.
    After,
}

/// The position changes made by a single step: a sorted list of
/// `(start, old_size, new_size)` replacement ranges.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepMap {
    ranges: Vec<(usize, usize, usize)>,
}

impl StepMap {
    /// The map of a step that moves nothing.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new(ranges: Vec<(usize, usize, usize)>) -> Self {
        Self { ranges }
    }

    pub fn is_identity(&self) -> bool {
        self.ranges.iter().all(|&(_, old, new)| old == new)
    }

    /// Map a position through this step's changes.
    ///
    /// Positions inside a replaced range collapse to one of its edges:
    /// `Bias::Before` puts them before the inserted content,
    /// `Bias::After` after it.
    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        let mut diff: i64 = 0;
        for &(start, old_size, new_size) in &self.ranges {
            if start > pos {
                break;
            }
            let end = start + old_size;
            if pos <= end {
                let side = if old_size == 0 {
                    bias
                } else if pos == start {
                    Bias::Before
                } else if pos == end {
                    Bias::After
                } else {
                    bias
                };
                let base = (start as i64 + diff) as usize;
                return match side {
                    Bias::Before => base,
                    Bias::After => base + new_size,
                };
            }
            diff += new_size as i64 - old_size as i64;
        }
        (pos as i64 + diff) as usize
    }

    /// The map for undoing this step's changes.
    #[must_use]
    pub fn invert(&self) -> StepMap {
        StepMap {
            ranges: self
                .ranges
                .iter()
                .map(|&(start, old, new)| (start, new, old))
                .collect(),
        }
    }
}

/// The concatenated position maps of a whole transaction, applied in
/// step order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(maps: Vec<StepMap>) -> Self {
        Self { maps }
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_identity(&self) -> bool {
        self.maps.iter().all(StepMap::is_identity)
    }

    /// Map a position through every step in order.
    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, bias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    // deletion of 0..4: everything after shifts left, interior collapses
    #[case((0, 4, 0), 0, Bias::Before, 0)]
    #[case((0, 4, 0), 2, Bias::Before, 0)]
    #[case((0, 4, 0), 4, Bias::After, 0)]
    #[case((0, 4, 0), 8, Bias::Before, 4)]
    // insertion of 3 tokens at 5: edge position picks a side by bias
    #[case((5, 0, 3), 5, Bias::Before, 5)]
    #[case((5, 0, 3), 5, Bias::After, 8)]
    #[case((5, 0, 3), 9, Bias::Before, 12)]
    // replacement 2..6 by 1 token: interior collapses by bias
    #[case((2, 4, 1), 4, Bias::Before, 2)]
    #[case((2, 4, 1), 4, Bias::After, 3)]
    fn step_map_maps_positions(
        #[case] range: (usize, usize, usize),
        #[case] pos: usize,
        #[case] bias: Bias,
        #[case] expected: usize,
    ) {
        let map = StepMap::new(vec![range]);
        assert_eq!(map.map(pos, bias), expected);
    }

    #[test]
    fn mapping_concatenates_in_order() {
        let mut mapping = Mapping::new();
        // delete 0..4, then insert 2 tokens at 1
        mapping.push(StepMap::new(vec![(0, 4, 0)]));
        mapping.push(StepMap::new(vec![(1, 0, 2)]));
        assert_eq!(mapping.map(8, Bias::Before), 6);
        assert_eq!(mapping.map(4, Bias::Before), 0);
        assert!(!mapping.is_identity());
        assert!(Mapping::new().is_identity());
    }

    #[test]
    fn invert_reverses_a_replacement() {
        let map = StepMap::new(vec![(2, 4, 1)]);
        let inverse = map.invert();
        assert_eq!(inverse.map(map.map(8, Bias::Before), Bias::Before), 8);
    }
}
