use serde::{Deserialize, Serialize};
use crate::index_space::{Axis, IndexSpace};
use crate::mesh::RegionIndcs;




/**
 * A dense array of field values on a rank's mesh blocks, indexed by
 * (block, component, k, j, i) with `i` varying fastest. Every block holds
 * the same number of components over the same (ghost-padded) index space.
 */
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldArray {
    num_blocks: usize,
    num_components: usize,
    shape: (usize, usize, usize),
    data: Vec<f64>,
}




// ============================================================================
impl FieldArray {




    /**
     * Allocate a zero-filled array of the given number of blocks and
     * components, with `shape` cells per block along (i, j, k).
     */
    pub fn zeros(num_blocks: usize, num_components: usize, shape: (usize, usize, usize)) -> Self {
        Self {
            num_blocks,
            num_components,
            shape,
            data: vec![0.0; num_blocks * num_components * shape.0 * shape.1 * shape.2],
        }
    }


    /**
     * Generate an array with values defined from a closure of the block
     * index, component, and cell index.
     */
    pub fn from_function<F>(num_blocks: usize, num_components: usize, shape: (usize, usize, usize), f: F) -> Self
    where
        F: Fn(usize, usize, (i64, i64, i64)) -> f64
    {
        let mut result = Self::zeros(num_blocks, num_components, shape);
        let space = result.index_space();

        for m in 0..num_blocks {
            for n in 0..num_components {
                for (slot, index) in result.component_mut(m, n).iter_mut().zip(space.iter()) {
                    *slot = f(m, n, index)
                }
            }
        }
        result
    }


    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }


    pub fn num_components(&self) -> usize {
        self.num_components
    }


    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }


    /**
     * The index space of cells in one block, starting at zero.
     */
    pub fn index_space(&self) -> IndexSpace {
        let (l, m, n) = self.shape;
        IndexSpace::new(0..l as i64, 0..m as i64, 0..n as i64)
    }


    /**
     * Number of values per block and component.
     */
    pub fn cells_per_component(&self) -> usize {
        self.shape.0 * self.shape.1 * self.shape.2
    }


    /**
     * Number of values per block (all components).
     */
    pub fn block_len(&self) -> usize {
        self.num_components * self.cells_per_component()
    }


    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }


    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }


    pub fn block(&self, m: usize) -> &[f64] {
        let n = self.block_len();
        &self.data[m * n..(m + 1) * n]
    }


    pub fn block_mut(&mut self, m: usize) -> &mut [f64] {
        let n = self.block_len();
        &mut self.data[m * n..(m + 1) * n]
    }


    pub fn component(&self, m: usize, n: usize) -> &[f64] {
        let c = self.cells_per_component();
        &self.block(m)[n * c..(n + 1) * c]
    }


    pub fn component_mut(&mut self, m: usize, n: usize) -> &mut [f64] {
        let c = self.cells_per_component();
        &mut self.block_mut(m)[n * c..(n + 1) * c]
    }


    pub fn offset(&self, m: usize, n: usize, index: (i64, i64, i64)) -> usize {
        (m * self.num_components + n) * self.cells_per_component() + self.index_space().row_major_offset(index)
    }


    pub fn get(&self, m: usize, n: usize, index: (i64, i64, i64)) -> f64 {
        self.data[self.offset(m, n, index)]
    }


    pub fn set(&mut self, m: usize, n: usize, index: (i64, i64, i64), value: f64) {
        let offset = self.offset(m, n, index);
        self.data[offset] = value
    }
}




/**
 * Face-centered magnetic field components. Each face array has one more
 * element than the cell-centered arrays along its own axis.
 */
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceField {
    pub x1f: FieldArray,
    pub x2f: FieldArray,
    pub x3f: FieldArray,
}




// ============================================================================
impl FaceField {
    pub fn zeros(num_blocks: usize, indcs: &RegionIndcs) -> Self {
        let cells = indcs.padded();
        let shape = |axis| cells.extend_upper(1, axis).dim();

        Self {
            x1f: FieldArray::zeros(num_blocks, 1, shape(Axis::I)),
            x2f: FieldArray::zeros(num_blocks, 1, shape(Axis::J)),
            x3f: FieldArray::zeros(num_blocks, 1, shape(Axis::K)),
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{FaceField, FieldArray};
    use crate::mesh::RegionIndcs;

    #[test]
    fn components_are_contiguous_within_blocks() {
        let a = FieldArray::from_function(2, 3, (4, 3, 2), |m, n, (i, j, k)| {
            (m * 1000 + n * 100) as f64 + (k * 12 + j * 4 + i) as f64
        });
        assert_eq!(a.block_len(), 3 * 24);
        assert_eq!(a.component(1, 2)[0], 1200.0);
        assert_eq!(a.component(1, 2)[23], 1223.0);
        assert_eq!(a.get(0, 1, (3, 2, 1)), 123.0);
    }

    #[test]
    fn face_arrays_are_staggered() {
        let f = FaceField::zeros(2, &RegionIndcs::new(2, 8, 8, 8));
        assert_eq!(f.x1f.shape(), (13, 12, 12));
        assert_eq!(f.x2f.shape(), (12, 13, 12));
        assert_eq!(f.x3f.shape(), (12, 12, 13));
    }
}
