use rayon::prelude::*;
use crate::sphere::{AngularDerivative, SphereError, SphericalGrid, SurfaceTensor};
use crate::tensor::{sym2, Sym2};
use super::{HorizonError, METRIC_DERIVATIVE_COMPONENTS};




/**
 * The outgoing null expansion of a surface, node by node, along with the
 * magnitude of the gradient of the level-set function there.
 */
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NullExpansion {
    pub expansion: Vec<f64>,
    pub gradient_norm: Vec<f64>,
}




/**
 * Compute the outgoing null expansion of the surface `r = h(θ, φ)` held by
 * the grid, given the spatial metric, the extrinsic curvature and the
 * metric derivative sampled at its nodes.
 *
 * The surface is the zero set of `F = r - h(θ, φ)`, with `r, θ, φ` measured
 * from the grid center. With `s^i` the unit normal and `m^ij = g^ij - s^i
 * s^j` the inverse induced metric, the expansion is
 *
 * ```text
 * Θ = m^ij (∇_i ∇_j F / |∇F| - K_ij)
 * ```
 *
 * When `weight_by_gradient` is set the result is multiplied by `|∇F|`.
 * A singular metric or a vanishing gradient at any node is an error.
 */
pub fn surface_null_expansion(
    grid: &SphericalGrid,
    metric: &SurfaceTensor,
    curvature: &SurfaceTensor,
    metric_derivative: &SurfaceTensor,
    weight_by_gradient: bool) -> Result<NullExpansion, HorizonError>
{
    check_components("spatial metric", metric, Sym2::NUM_COMPONENTS)?;
    check_components("extrinsic curvature", curvature, Sym2::NUM_COMPONENTS)?;
    check_components("metric derivative", metric_derivative, METRIC_DERIVATIVE_COMPONENTS)?;

    for tensor in [metric, curvature, metric_derivative] {
        if tensor.num_angles() != grid.num_angles() {
            return Err(SphereError::Length { expected: grid.num_angles(), found: tensor.num_angles() }.into())
        }
    }

    let radius = grid.radius();
    let h_t = grid.derivative(radius, AngularDerivative::Theta)?;
    let h_p = grid.derivative(radius, AngularDerivative::Phi)?;
    let h_tt = grid.derivative(radius, AngularDerivative::ThetaTheta)?;
    let h_tp = grid.derivative(radius, AngularDerivative::ThetaPhi)?;
    let h_pp = grid.derivative(radius, AngularDerivative::PhiPhi)?;

    let nodes: Vec<(f64, f64)> = (0..grid.num_angles())
        .into_par_iter()
        .map(|n| {
            let g = Sym2::from_slice(metric.node(n));
            let k = Sym2::from_slice(curvature.node(n));
            let dg = metric_derivative.node(n);
            let ginv = g.inverse().ok_or(HorizonError::SingularMetric { node: n })?;
            let jac = grid.jacobian(n);

            // Derivatives of F in (r, θ, φ).
            let df = [1.0, -h_t[n], -h_p[n]];
            let ddf = [
                [0.0, 0.0, 0.0],
                [0.0, -h_tt[n], -h_tp[n]],
                [0.0, -h_tp[n], -h_pp[n]],
            ];

            let mut grad = [0.0; 3];
            let mut hess = Sym2::default();

            for i in 0..3 {
                grad[i] = (0..3).map(|u| df[u] * jac.d[u][i]).sum();
            }
            for i in 0..3 {
                for j in i..3 {
                    let mut d2 = 0.0;
                    for u in 0..3 {
                        d2 += df[u] * jac.dd[u][i][j];
                        for v in 0..3 {
                            d2 += ddf[u][v] * jac.d[u][i] * jac.d[v][j];
                        }
                    }
                    hess.set(i, j, d2);
                }
            }

            let mut grad_up = [0.0; 3];
            for i in 0..3 {
                grad_up[i] = (0..3).map(|j| ginv.get(i, j) * grad[j]).sum();
            }
            let norm2: f64 = (0..3).map(|i| grad_up[i] * grad[i]).sum();

            if !(norm2 > f64::EPSILON) || !norm2.is_finite() {
                return Err(HorizonError::VanishingGradient { node: n })
            }
            let norm = norm2.sqrt();

            // Connection term Γ^s_ij ∂_s F = ½ (∂_i g_js + ∂_j g_is - ∂_s g_ij) ∇^s F.
            let d_g = |c: usize, a: usize, b: usize| dg[c * Sym2::NUM_COMPONENTS + sym2(a, b)];
            let mut cov = Sym2::default();

            for i in 0..3 {
                for j in i..3 {
                    let connection: f64 = (0..3)
                        .map(|s| 0.5 * (d_g(i, j, s) + d_g(j, i, s) - d_g(s, i, j)) * grad_up[s])
                        .sum();
                    cov.set(i, j, hess.get(i, j) - connection);
                }
            }

            let mut projector = Sym2::default();
            for i in 0..3 {
                for j in i..3 {
                    projector.set(i, j, ginv.get(i, j) - grad_up[i] * grad_up[j] / norm2);
                }
            }

            let theta = projector.contract(&cov) / norm - projector.contract(&k);
            Ok((if weight_by_gradient { theta * norm } else { theta }, norm))
        })
        .collect::<Result<_, HorizonError>>()?;

    let (expansion, gradient_norm) = nodes.into_iter().unzip();
    Ok(NullExpansion { expansion, gradient_norm })
}

fn check_components(quantity: &'static str, tensor: &SurfaceTensor, expected: usize) -> Result<(), HorizonError> {
    if tensor.num_components() != expected {
        Err(HorizonError::Components { quantity, expected, found: tensor.num_components() })
    } else {
        Ok(())
    }
}
