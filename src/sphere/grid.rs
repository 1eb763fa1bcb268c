use std::f64::consts::PI;
use rayon::prelude::*;
use crate::tensor::Vector3;
use super::gauss_legendre::gauss_legendre;
use super::harmonics::{degree, real_harmonics};
use super::interpolate::VolumeField;
use super::{SphereError, SurfaceTensor};




/**
 * Derivatives of the spherical coordinates `u = (r, θ, φ)` with respect to
 * the Cartesian coordinates `x^i`, about the grid center. `d[u][i]` is
 * `∂u/∂x^i` and `dd[u][i][j]` is `∂²u/∂x^i∂x^j`.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceJacobian {
    pub d: [[f64; 3]; 3],
    pub dd: [[[f64; 3]; 3]; 3],
}




// ============================================================================
impl SurfaceJacobian {

    /**
     * Evaluate at the point with spherical coordinates `(r, θ, φ)`. The
     * point must lie off the polar axis.
     */
    pub fn at(r: f64, theta: f64, phi: f64) -> Self {
        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        let n = [st * cp, st * sp, ct];
        let x = [r * n[0], r * n[1], r * n[2]];
        let rho = r * st;
        let (r2, r4, rho2, rho4) = (r * r, r.powi(4), rho * rho, rho.powi(4));

        let d = [
            n,
            [ct * cp / r, ct * sp / r, -st / r],
            [-sp / (r * st), cp / (r * st), 0.0],
        ];

        let mut dd = [[[0.0; 3]; 3]; 3];

        for i in 0..3 {
            for j in 0..3 {
                let delta = if i == j { 1.0 } else { 0.0 };
                dd[0][i][j] = (delta - n[i] * n[j]) / r;
            }
        }

        let (xx, yy, zz) = (x[0], x[1], x[2]);
        let g = zz / (r2 * rho);
        let gx = -xx * zz * (2.0 / (r4 * rho) + 1.0 / (r2 * rho2 * rho));
        let gy = -yy * zz * (2.0 / (r4 * rho) + 1.0 / (r2 * rho2 * rho));
        let gz = (r2 - 2.0 * zz * zz) / (r4 * rho);
        let theta_dd = [
            [g + xx * gx, xx * gy, xx * gz],
            [xx * gy, g + yy * gy, yy * gz],
            [xx * gz, yy * gz, 2.0 * rho * zz / r4],
        ];
        dd[1] = theta_dd;

        let phi_dd = [
            [2.0 * xx * yy / rho4, (yy * yy - xx * xx) / rho4, 0.0],
            [(yy * yy - xx * xx) / rho4, -2.0 * xx * yy / rho4, 0.0],
            [0.0, 0.0, 0.0],
        ];
        dd[2] = phi_dd;

        Self { d, dd }
    }
}




/**
 * Angular derivatives available from the spectral representation.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AngularDerivative {
    Theta,
    Phi,
    ThetaTheta,
    ThetaPhi,
    PhiPhi,
}




/**
 * Harmonic tables, stored mode by mode: `y[i * nangles + n]` is harmonic `i`
 * at node `n`.
 */
#[derive(Clone, Debug)]
struct BasisTables {
    y: Vec<f64>,
    y_t: Vec<f64>,
    y_p: Vec<f64>,
    y_tt: Vec<f64>,
    y_tp: Vec<f64>,
    y_pp: Vec<f64>,
}




/**
 * A star-shaped surface sampled on a Gauss-Legendre by uniform-azimuth grid.
 * Node `n = i_theta * nphi + i_phi` sits at colatitude `acos(x_i)` for the
 * Gauss-Legendre node `x_i`, and azimuth `2π i_phi / nphi`.
 */
#[derive(Clone, Debug)]
pub struct SphericalGrid {
    nlev: usize,
    nphi: usize,
    nfilt: usize,
    polar: Vec<(f64, f64)>,
    weights: Vec<f64>,
    basis: BasisTables,
    center: [f64; 3],
    radius: Vec<f64>,
    positions: Vec<Vector3>,
    jacobians: Vec<SurfaceJacobian>,
}




// ============================================================================
impl SphericalGrid {




    /**
     * Create a sphere of the given radius about `center`, with `nlev`
     * latitude rings and a spectral filter keeping the first `nfilt`
     * harmonics (in flattened order). The highest retained degree must be
     * below `nlev`.
     */
    pub fn new(nlev: usize, nfilt: usize, radius: f64, center: [f64; 3]) -> Result<Self, SphereError> {
        if nlev < 2 {
            return Err(SphereError::TooFewRings(nlev))
        }
        if nfilt == 0 {
            return Err(SphereError::EmptyFilter)
        }
        let lmax = degree(nfilt - 1);

        if lmax >= nlev {
            return Err(SphereError::Unresolved { nfilt, lmax, nlev })
        }
        let nphi = 2 * nlev;
        let nangles = nlev * nphi;
        let (x, w) = gauss_legendre(nlev);
        let dphi = 2.0 * PI / nphi as f64;

        let mut polar = Vec::with_capacity(nangles);
        let mut weights = Vec::with_capacity(nangles);

        for i in 0..nlev {
            for j in 0..nphi {
                polar.push((x[i].acos(), j as f64 * dphi));
                weights.push(w[i] * dphi);
            }
        }

        let values: Vec<_> = polar.par_iter().map(|&(t, p)| real_harmonics(nfilt, t, p)).collect();
        let table = |f: fn(&super::harmonics::HarmonicValues) -> f64| -> Vec<f64> {
            (0..nfilt).flat_map(|i| values.iter().map(move |v| f(&v[i]))).collect()
        };
        let basis = BasisTables {
            y: table(|h| h.y),
            y_t: table(|h| h.y_t),
            y_p: table(|h| h.y_p),
            y_tt: table(|h| h.y_tt),
            y_tp: table(|h| h.y_tp),
            y_pp: table(|h| h.y_pp),
        };

        let mut grid = Self {
            nlev,
            nphi,
            nfilt,
            polar,
            weights,
            basis,
            center,
            radius: Vec::new(),
            positions: Vec::new(),
            jacobians: Vec::new(),
        };
        grid.set_pointwise_radius(vec![radius; nangles], center)?;
        Ok(grid)
    }


    pub fn num_angles(&self) -> usize {
        self.polar.len()
    }


    pub fn nlev(&self) -> usize {
        self.nlev
    }


    pub fn nphi(&self) -> usize {
        self.nphi
    }


    pub fn nfilt(&self) -> usize {
        self.nfilt
    }


    /**
     * The `(θ, φ)` angle of a node.
     */
    pub fn polar_position(&self, n: usize) -> (f64, f64) {
        self.polar[n]
    }


    /**
     * Quadrature weights (solid angle per node).
     */
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }


    pub fn center(&self) -> [f64; 3] {
        self.center
    }


    pub fn radius(&self) -> &[f64] {
        &self.radius
    }


    pub fn position(&self, n: usize) -> Vector3 {
        self.positions[n]
    }


    pub fn positions(&self) -> &[Vector3] {
        &self.positions
    }


    pub fn jacobian(&self, n: usize) -> &SurfaceJacobian {
        &self.jacobians[n]
    }


    /**
     * Value of harmonic `i` at node `n`.
     */
    pub fn basis_value(&self, i: usize, n: usize) -> f64 {
        self.basis.y[i * self.num_angles() + n]
    }


    /**
     * Replace the radius of every node and the center, regenerating the
     * node positions and Jacobians.
     */
    pub fn set_pointwise_radius(&mut self, radius: Vec<f64>, center: [f64; 3]) -> Result<(), SphereError> {
        if radius.len() != self.num_angles() {
            return Err(SphereError::Length { expected: self.num_angles(), found: radius.len() })
        }
        if let Some((node, &r)) = radius.iter().enumerate().find(|(_, r)| !(r.is_finite() && **r > 0.0)) {
            return Err(SphereError::InvalidRadius { node, radius: r })
        }
        let c = Vector3::new(center);

        self.positions = self.polar.iter().zip(&radius).map(|(&(t, p), &r)| {
            let (st, ct) = t.sin_cos();
            let (sp, cp) = p.sin_cos();
            c + Vector3::new([st * cp, st * sp, ct]) * r
        }).collect();

        self.jacobians = self.polar.iter().zip(&radius).map(|(&(t, p), &r)| {
            SurfaceJacobian::at(r, t, p)
        }).collect();

        self.radius = radius;
        self.center = center;
        Ok(())
    }


    /**
     * Project nodal values onto the retained harmonics by quadrature.
     */
    pub fn spatial_to_spectral(&self, f: &[f64]) -> Result<Vec<f64>, SphereError> {
        let nangles = self.num_angles();
        self.check_nodal(f)?;

        Ok((0..self.nfilt).into_par_iter().map(|i| {
            let y = &self.basis.y[i * nangles..(i + 1) * nangles];
            y.iter().zip(&self.weights).zip(f).map(|((y, w), f)| y * w * f).sum()
        }).collect())
    }


    /**
     * Evaluate a harmonic expansion at every node. Coefficients beyond the
     * filter are an error; missing trailing coefficients are zero.
     */
    pub fn spectral_to_spatial(&self, coefficients: &[f64]) -> Result<Vec<f64>, SphereError> {
        self.synthesize(&self.basis.y, coefficients)
    }


    /**
     * Angular derivative of nodal values, taken from their filtered
     * harmonic expansion.
     */
    pub fn derivative(&self, f: &[f64], which: AngularDerivative) -> Result<Vec<f64>, SphereError> {
        let table = match which {
            AngularDerivative::Theta => &self.basis.y_t,
            AngularDerivative::Phi => &self.basis.y_p,
            AngularDerivative::ThetaTheta => &self.basis.y_tt,
            AngularDerivative::ThetaPhi => &self.basis.y_tp,
            AngularDerivative::PhiPhi => &self.basis.y_pp,
        };
        self.synthesize(table, &self.spatial_to_spectral(f)?)
    }


    /**
     * Integrate nodal values over the unit sphere.
     */
    pub fn integrate(&self, f: &[f64]) -> Result<f64, SphereError> {
        self.check_nodal(f)?;
        Ok(f.iter().zip(&self.weights).map(|(f, w)| f * w).sum())
    }


    /**
     * Sample a volume field at every node position.
     */
    pub fn interpolate_to_sphere<F>(&self, field: &F) -> Result<SurfaceTensor, SphereError>
    where
        F: VolumeField + ?Sized,
    {
        let ncomp = field.num_components();
        let nodes: Result<Vec<Vec<f64>>, SphereError> = self.positions
            .par_iter()
            .enumerate()
            .map(|(node, x)| {
                let mut out = vec![0.0; ncomp];
                field
                    .sample(x.into_array(), &mut out)
                    .map_err(|source| SphereError::Sample { node, source })?;
                Ok(out)
            })
            .collect();

        SurfaceTensor::from_vec(ncomp, nodes?.concat())
    }


    fn synthesize(&self, table: &[f64], coefficients: &[f64]) -> Result<Vec<f64>, SphereError> {
        let nangles = self.num_angles();

        if coefficients.len() > self.nfilt {
            return Err(SphereError::Length { expected: self.nfilt, found: coefficients.len() })
        }
        Ok((0..nangles).into_par_iter().map(|n| {
            coefficients.iter().enumerate().map(|(i, a)| a * table[i * nangles + n]).sum()
        }).collect())
    }

    fn check_nodal(&self, f: &[f64]) -> Result<(), SphereError> {
        if f.len() != self.num_angles() {
            return Err(SphereError::Length { expected: self.num_angles(), found: f.len() })
        }
        Ok(())
    }
}
