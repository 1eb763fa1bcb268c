use core::ops::Range;




/**
 * Identifier for a Cartesian axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    I,
    J,
    K,
}




// ============================================================================
impl Axis {
    pub const ALL: [Axis; 3] = [Axis::I, Axis::J, Axis::K];

    /**
     * Return the position of this axis in an `(i, j, k)` tuple or a
     * three-component array.
     */
    pub fn index(self) -> usize {
        match self {
            Axis::I => 0,
            Axis::J => 1,
            Axis::K => 2,
        }
    }
}




/**
 * Represents a rectangular region in a discrete 3D index space. Memory
 * buffers aligned with an index space are laid out with the `i` index
 * increasing fastest, then `j`, then `k`; this is the cell ordering of the
 * (block, component, k, j, i) field arrays.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
    dk: Range<i64>,
}




// ============================================================================
impl IndexSpace {

    pub fn new(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end && dk.start <= dk.end,
            "index space has negative volume");

        Self { di, dj, dk }
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> (usize, usize, usize) {
        ((self.di.end - self.di.start) as usize,
         (self.dj.end - self.dj.start) as usize,
         (self.dk.end - self.dk.start) as usize)
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let (l, m, n) = self.dim();
        l * m * n
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> (i64, i64, i64) {
        (self.di.start, self.dj.start, self.dk.start)
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn end(&self) -> (i64, i64, i64) {
        (self.di.end, self.dj.end, self.dk.end)
    }


    /**
     * Return the range of indexes along the given axis.
     */
    pub fn range(&self, axis: Axis) -> Range<i64> {
        match axis {
            Axis::I => self.di.clone(),
            Axis::J => self.dj.clone(),
            Axis::K => self.dk.clone(),
        }
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: (i64, i64, i64)) -> bool {
        self.di.contains(&index.0) && self.dj.contains(&index.1) && self.dk.contains(&index.2)
    }


    /**
     * Expand this index space on the upper side of the given axis. A
     * face-centered (staggered) array has one more element along its
     * staggered axis than the cell-centered array it belongs to.
     */
    pub fn extend_upper(&self, delta: i64, axis: Axis) -> Self {
        match axis {
            Axis::I => Self::new(self.di.start .. self.di.end + delta, self.dj.clone(), self.dk.clone()),
            Axis::J => Self::new(self.di.clone(), self.dj.start .. self.dj.end + delta, self.dk.clone()),
            Axis::K => Self::new(self.di.clone(), self.dj.clone(), self.dk.start .. self.dk.end + delta),
        }
    }


    /**
     * Trim this index space by the given number of elements on each axis
     * whose extent exceeds one element. Collapsed axes (of a 1D or 2D
     * problem) are left as they are.
     */
    pub fn trim_active(&self, delta: i64) -> Self {
        let trim = |r: &Range<i64>| if r.end - r.start > 1 {
            r.start + delta .. r.end - delta
        } else {
            r.clone()
        };
        Self::new(trim(&self.di), trim(&self.dj), trim(&self.dk))
    }


    /**
     * Return the linear offset for the given index, in a memory buffer
     * aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: (i64, i64, i64)) -> usize {
        let (l, m, _) = self.dim();
        let i = (index.0 - self.di.start) as usize;
        let j = (index.1 - self.dj.start) as usize;
        let k = (index.2 - self.dk.start) as usize;
        (k * m + j) * l + i
    }


    /**
     * Return an iterator which traverses the index space in memory order
     * (the `i` index increases fastest).
     */
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64, i64)> + '_ {
        self.dk.clone().flat_map(move |k| {
            self.dj.clone().flat_map(move |j| self.di.clone().map(move |i| (i, j, k)))
        })
    }
}




// ============================================================================
impl From<(Range<i64>, Range<i64>, Range<i64>)> for IndexSpace {
    fn from(range: (Range<i64>, Range<i64>, Range<i64>)) -> Self {
        Self::new(range.0, range.1, range.2)
    }
}

impl From<IndexSpace> for (Range<i64>, Range<i64>, Range<i64>) {
    fn from(space: IndexSpace) -> Self {
        (space.di, space.dj, space.dk)
    }
}




/**
 * Less imposing factory function to construct an IndexSpace object.
 */
pub fn range3d(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj, dk)
}
