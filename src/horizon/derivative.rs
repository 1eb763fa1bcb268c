use rayon::prelude::*;
use crate::field::FieldArray;
use crate::index_space::Axis;
use crate::mesh::Mesh;
use crate::tensor::Sym2;
use super::{HorizonError, METRIC_DERIVATIVE_COMPONENTS};




/// One-sided weights `c_k` of the central first-derivative stencil
/// `f'(x) ≈ Σ_k c_k (f(x + k dx) - f(x - k dx)) / dx`, of the highest order
/// that fits in the given number of ghost cells (order 2, 4 or 6 for 2, 3
/// or 4 ghosts).
pub fn central_difference_weights(ghost: usize) -> Result<&'static [f64], HorizonError> {
    match ghost {
        2 => Ok(&[1.0 / 2.0]),
        3 => Ok(&[2.0 / 3.0, -1.0 / 12.0]),
        4 => Ok(&[3.0 / 4.0, -3.0 / 20.0, 1.0 / 60.0]),
        _ => Err(HorizonError::UnsupportedGhostCount(ghost)),
    }
}




/// Compute `∂_c g_ab` on the active cells of every block, from a metric
/// with valid ghost cells. The result has 18 components, component
/// `c * 6 + sym2(a, b)`; ghost cells of the result are left at zero, as are
/// derivatives along collapsed axes.
pub fn metric_derivative(mesh: &Mesh, metric: &FieldArray) -> Result<FieldArray, HorizonError> {
    if metric.num_components() != Sym2::NUM_COMPONENTS {
        return Err(HorizonError::Components {
            quantity: "spatial metric",
            expected: Sym2::NUM_COMPONENTS,
            found: metric.num_components(),
        })
    }
    let indcs = &mesh.mb_indcs;
    let weights = central_difference_weights(indcs.ng as usize)?;
    let mut result = FieldArray::zeros(metric.num_blocks(), METRIC_DERIVATIVE_COMPONENTS, metric.shape());
    let cells = result.cells_per_component();
    let block_len = result.block_len();
    let space = result.index_space();
    let interior = indcs.interior();

    result
        .as_mut_slice()
        .par_chunks_mut(block_len)
        .enumerate()
        .for_each(|(m, out)| {
            let size = &mesh.block(m).size;

            for (c, axis) in Axis::ALL.iter().copied().enumerate() {
                if indcs.nx(axis) == 1 {
                    continue
                }
                let idx = 1.0 / size.dx(axis);
                let shift = |index: (i64, i64, i64), k: i64| match axis {
                    Axis::I => (index.0 + k, index.1, index.2),
                    Axis::J => (index.0, index.1 + k, index.2),
                    Axis::K => (index.0, index.1, index.2 + k),
                };

                for s in 0..Sym2::NUM_COMPONENTS {
                    let f = metric.component(m, s);
                    let target = &mut out[(c * Sym2::NUM_COMPONENTS + s) * cells..][..cells];

                    for index in interior.iter() {
                        let d: f64 = weights.iter().enumerate().map(|(k, w)| {
                            let k = k as i64 + 1;
                            w * (f[space.row_major_offset(shift(index, k))] - f[space.row_major_offset(shift(index, -k))])
                        }).sum();
                        target[space.row_major_offset(index)] = d * idx;
                    }
                }
            }
        });
    Ok(result)
}
