use thiserror::Error;
use crate::field::FieldArray;
use crate::index_space::Axis;
use crate::mesh::Mesh;




/// Reasons a volume field cannot be evaluated at a point.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("point {0:?} is outside the mesh")]
    OutsideDomain([f64; 3]),

    #[error("field is singular at {0:?}")]
    Singular([f64; 3]),
}




/// A multi-component field that can be evaluated anywhere in a volume.
pub trait VolumeField: Sync {
    /// Number of components written by `sample`.
    fn num_components(&self) -> usize;

    /// Write the field components at `point` into `out`, which has
    /// `num_components()` elements.
    fn sample(&self, point: [f64; 3], out: &mut [f64]) -> Result<(), SampleError>;
}




/// Interpolation of cell-centered mesh data by tensor-product Lagrange
/// polynomials. The stencil is `2 * nghost` cells wide along each active
/// axis (fewer if the mesh has fewer cells), centered on the point where
/// possible and shifted inward at the domain edges. Stencils may straddle
/// block boundaries.
pub struct MeshField<'a> {
    mesh: &'a Mesh,
    field: &'a FieldArray,
    width: usize,
}




// ============================================================================
impl<'a> MeshField<'a> {

    /// Wrap data for every block of the mesh (ordered by gid).
    pub fn new(mesh: &'a Mesh, field: &'a FieldArray) -> Self {
        assert_eq!(field.num_blocks(), mesh.num_blocks(), "field must hold every mesh block");
        assert_eq!(field.shape(), mesh.mb_indcs.padded_shape(), "field must have the block shape");
        Self { mesh, field, width: 2 * mesh.mb_indcs.ng as usize }
    }

    /// Stencil start and weights along one axis. The stencil holds global
    /// active-cell indexes.
    fn stencil(&self, axis: Axis, x: f64) -> Option<(usize, Vec<f64>)> {
        let size = &self.mesh.mesh_size;
        let n = self.mesh.mesh_indcs.nx(axis) as usize;

        if n == 1 {
            return Some((0, vec![1.0]))
        }
        if !(x >= size.min(axis) && x <= size.max(axis)) {
            return None
        }
        let w = self.width.min(n);
        let s = (x - size.min(axis)) / size.dx(axis) - 0.5;
        let start = (s.floor() as i64 - (w as i64 / 2 - 1)).max(0).min((n - w) as i64) as usize;

        Some((start, lagrange_weights(s - start as f64, w)))
    }
}

impl<'a> VolumeField for MeshField<'a> {
    fn num_components(&self) -> usize {
        self.field.num_components()
    }

    fn sample(&self, point: [f64; 3], out: &mut [f64]) -> Result<(), SampleError> {
        let outside = || SampleError::OutsideDomain(point);
        let (i0, wi) = self.stencil(Axis::I, point[0]).ok_or_else(outside)?;
        let (j0, wj) = self.stencil(Axis::J, point[1]).ok_or_else(outside)?;
        let (k0, wk) = self.stencil(Axis::K, point[2]).ok_or_else(outside)?;

        for x in out.iter_mut() {
            *x = 0.0
        }
        for (dk, wk) in wk.iter().enumerate() {
            for (dj, wj) in wj.iter().enumerate() {
                for (di, wi) in wi.iter().enumerate() {
                    let (gid, local) = self.mesh
                        .locate_cell([i0 + di, j0 + dj, k0 + dk])
                        .ok_or_else(outside)?;
                    let w = wi * wj * wk;

                    for (n, x) in out.iter_mut().enumerate() {
                        *x += w * self.field.get(gid, n, local)
                    }
                }
            }
        }
        Ok(())
    }
}

/// Lagrange basis weights for nodes at `0, 1, ..., n - 1`, evaluated at `s`.
pub fn lagrange_weights(s: f64, n: usize) -> Vec<f64> {
    (0..n).map(|q| {
        (0..n)
            .filter(|&p| p != q)
            .map(|p| (s - p as f64) / (q as f64 - p as f64))
            .product()
    }).collect()
}




#[cfg(test)]
mod test {

    use approx::assert_relative_eq;
    use super::{lagrange_weights, MeshField, SampleError, VolumeField};
    use crate::field::FieldArray;
    use crate::mesh::Mesh;

    #[test]
    fn weights_form_a_partition_of_unity() {
        for &s in &[0.0, 0.3, 1.5, 2.99] {
            let w = lagrange_weights(s, 4);
            assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        }
        assert_eq!(lagrange_weights(2.0, 4), vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn cubic_data_is_interpolated_exactly_across_blocks() {
        let mesh = Mesh::uniform([-1.0; 3], [1.0; 3], [16, 16, 16], [8, 8, 8], 2).unwrap();
        let f = |x: [f64; 3]| x[0].powi(3) - 2.0 * x[1] * x[2] + x[2].powi(2) + 0.5;
        let shape = mesh.mb_indcs.padded_shape();
        let data = FieldArray::from_function(mesh.num_blocks(), 1, shape, |m, _, index| {
            f(mesh.cell_center(m, index))
        });
        let field = MeshField::new(&mesh, &data);
        let mut out = [0.0];

        for &p in &[[0.01, -0.02, 0.03], [0.93, 0.5, -0.97], [-0.3, 0.77, 0.12]] {
            field.sample(p, &mut out).unwrap();
            assert_relative_eq!(out[0], f(p), epsilon = 1e-12);
        }
    }

    #[test]
    fn points_outside_the_mesh_are_rejected() {
        let mesh = Mesh::uniform([-1.0; 3], [1.0; 3], [8, 8, 8], [8, 8, 8], 2).unwrap();
        let data = FieldArray::zeros(1, 1, mesh.mb_indcs.padded_shape());
        let field = MeshField::new(&mesh, &data);
        let mut out = [0.0];
        assert_eq!(field.sample([1.5, 0.0, 0.0], &mut out), Err(SampleError::OutsideDomain([1.5, 0.0, 0.0])));
    }
}
