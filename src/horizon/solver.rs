use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use crate::parameters::{ConfigError, ParameterInput};
use crate::sphere::harmonics::degree;
use crate::sphere::{SphereError, SphericalGrid, VolumeField};
use crate::tensor::Sym2;
use super::expansion::{surface_null_expansion, NullExpansion};
use super::{HorizonError, METRIC_DERIVATIVE_COMPONENTS};




/**
 * Resolution, seed surface and relaxation constants of a horizon search.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HorizonParameters {
    /// Number of latitude rings of the surface grid.
    pub nlev: usize,

    /// Number of harmonics kept by the spectral filter.
    pub nfilt: usize,

    pub initial_radius: f64,
    pub center: [f64; 3],
    pub max_iterations: usize,

    /// Bound on `|∫ H dΩ|` at which the search stops.
    pub tolerance: f64,

    /// Overall step size of the flow.
    pub alpha: f64,

    /// Ratio controlling the extra damping of high-degree modes.
    pub beta: f64,

    /// Multiply `H` by `|∇F|` before each update (default `false`, so `H`
    /// is the plain null expansion). Either choice has the same fixed
    /// point; the weighted flow moves more slowly where `|∇F|` is small.
    pub weight_by_gradient: bool,
}




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Convergence {
    Converged,
    NotConverged,
}




/**
 * Outcome of a horizon search. A search that exhausts its iteration budget
 * still returns its last surface, flagged [`Convergence::NotConverged`].
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HorizonSearch {
    pub status: Convergence,
    pub iterations: usize,

    /// The last value of `|∫ H dΩ|`.
    pub norm: f64,
    pub center: [f64; 3],

    /// Radius at every node of the final surface.
    pub radius: Vec<f64>,

    /// `(θ, φ)` of every node.
    pub angles: Vec<(f64, f64)>,

    /// Null expansion at every node of the final surface.
    pub expansion: Vec<f64>,

    /// `|∫ H dΩ|` at the seed surface and after every iteration.
    pub history: Vec<f64>,
}




/**
 * The volume data a horizon search reads: spatial metric and extrinsic
 * curvature (6 components each) and the metric derivative (18 components).
 */
#[derive(Clone, Copy)]
pub struct AdmFields<'a> {
    pub metric: &'a dyn VolumeField,
    pub curvature: &'a dyn VolumeField,
    pub metric_derivative: &'a dyn VolumeField,
}




pub struct HorizonFinder<'a> {
    params: HorizonParameters,
    fields: AdmFields<'a>,
}




// ============================================================================
impl Default for HorizonParameters {
    fn default() -> Self {
        Self {
            nlev: 10,
            nfilt: 16,
            initial_radius: 0.8,
            center: [0.0; 3],
            max_iterations: 100,
            tolerance: 1e-5,
            alpha: 1.0,
            beta: 0.5,
            weight_by_gradient: false,
        }
    }
}

impl HorizonParameters {

    /**
     * Read the `<horizon>` block. Absent entries take their default values
     * and are recorded in the deck.
     */
    pub fn from_parameters(pin: &mut ParameterInput) -> Result<Self, ConfigError> {
        fn count(pin: &mut ParameterInput, key: &str, default: usize, min: i64) -> Result<usize, ConfigError> {
            let n = pin.get_or_add_integer("horizon", key, default as i64)?;
            if n < min {
                Err(ConfigError::invalid_value("horizon", key, format!("must be at least {}", min)))
            } else {
                Ok(n as usize)
            }
        }
        let block = "horizon";
        let d = Self::default();

        let params = Self {
            nlev: count(pin, "nlev", d.nlev, 2)?,
            nfilt: count(pin, "nfilt", d.nfilt, 1)?,
            max_iterations: count(pin, "maxit", d.max_iterations, 0)?,
            initial_radius: pin.get_or_add_real(block, "radius", d.initial_radius)?,
            center: [
                pin.get_or_add_real(block, "x1", 0.0)?,
                pin.get_or_add_real(block, "x2", 0.0)?,
                pin.get_or_add_real(block, "x3", 0.0)?,
            ],
            tolerance: pin.get_or_add_real(block, "tolerance", d.tolerance)?,
            alpha: pin.get_or_add_real(block, "alpha", d.alpha)?,
            beta: pin.get_or_add_real(block, "beta", d.beta)?,
            weight_by_gradient: pin.get_or_add_boolean(block, "weight_by_gradient", false)?,
        };

        if !(params.initial_radius > 0.0) {
            return Err(ConfigError::invalid_value(block, "radius", "must be positive"))
        }
        if !(params.tolerance > 0.0) {
            return Err(ConfigError::invalid_value(block, "tolerance", "must be positive"))
        }
        if !(params.alpha > 0.0) {
            return Err(ConfigError::invalid_value(block, "alpha", "must be positive"))
        }
        if !(params.beta >= 0.0) {
            return Err(ConfigError::invalid_value(block, "beta", "must not be negative"))
        }
        Ok(params)
    }

    /**
     * The constants `(A, B)` of the mode-by-mode update
     * `r_i ← r_i - A / (1 + B l (l + 1)) H_i`.
     */
    pub fn damping(&self) -> (f64, f64) {
        let n = self.nfilt as f64;
        (self.alpha / (n * (n + 1.0)) + self.beta, self.beta / self.alpha)
    }
}




// ============================================================================
impl<'a> HorizonFinder<'a> {

    pub fn new(params: HorizonParameters, fields: AdmFields<'a>) -> Result<Self, HorizonError> {
        let check = |quantity: &'static str, field: &dyn VolumeField, expected: usize| {
            if field.num_components() != expected {
                Err(HorizonError::Components { quantity, expected, found: field.num_components() })
            } else {
                Ok(())
            }
        };
        check("spatial metric", fields.metric, Sym2::NUM_COMPONENTS)?;
        check("extrinsic curvature", fields.curvature, Sym2::NUM_COMPONENTS)?;
        check("metric derivative", fields.metric_derivative, METRIC_DERIVATIVE_COMPONENTS)?;
        Ok(Self { params, fields })
    }

    pub fn params(&self) -> &HorizonParameters {
        &self.params
    }

    /**
     * Sample the volume data on the grid's current surface and evaluate its
     * null expansion.
     */
    pub fn expansion(&self, grid: &SphericalGrid) -> Result<NullExpansion, HorizonError> {
        let g = grid.interpolate_to_sphere(self.fields.metric)?;
        let k = grid.interpolate_to_sphere(self.fields.curvature)?;
        let dg = grid.interpolate_to_sphere(self.fields.metric_derivative)?;
        surface_null_expansion(grid, &g, &k, &dg, self.params.weight_by_gradient)
    }

    /**
     * Search from a round sphere of the configured seed radius.
     */
    pub fn search(&self) -> Result<HorizonSearch, HorizonError> {
        let p = &self.params;
        let grid = SphericalGrid::new(p.nlev, p.nfilt, p.initial_radius, p.center)?;
        self.search_from(grid)
    }

    /**
     * Relax the given surface toward zero expansion. Each iteration damps
     * every harmonic of the radius by the matching harmonic of `H`, with
     * stronger damping at high degree.
     */
    pub fn search_from(&self, mut grid: SphericalGrid) -> Result<HorizonSearch, HorizonError> {
        let p = &self.params;
        let (a, b) = p.damping();
        let center = grid.center();

        let mut h = self.expansion(&grid)?;
        let mut norm = grid.integrate(&h.expansion)?.abs();
        let mut history = vec![norm];
        let mut iterations = 0;

        info!("horizon search: seed radius {:.6}, |∫H| = {:.6e}", mean_radius(&grid)?, norm);

        while norm > p.tolerance && iterations < p.max_iterations {
            let h_spectral = grid.spatial_to_spectral(&h.expansion)?;
            let r_spectral = grid.spatial_to_spectral(grid.radius())?;
            let next: Vec<f64> = r_spectral
                .iter()
                .zip(&h_spectral)
                .enumerate()
                .map(|(i, (r, h))| {
                    let l = degree(i) as f64;
                    r - a / (1.0 + b * l * (l + 1.0)) * h
                })
                .collect();

            let radius = grid.spectral_to_spatial(&next)?;
            grid.set_pointwise_radius(radius, center)?;
            h = self.expansion(&grid)?;
            norm = grid.integrate(&h.expansion)?.abs();
            iterations += 1;
            history.push(norm);

            info!("horizon iteration {:3}: |∫H| = {:.6e}, mean radius {:.6}", iterations, norm, mean_radius(&grid)?);
            debug!("leading harmonics of H: {:?}", &h_spectral[..h_spectral.len().min(4)]);
        }

        let status = if norm <= p.tolerance {
            info!("horizon found after {} iterations", iterations);
            Convergence::Converged
        } else {
            warn!("horizon search stopped after {} iterations with |∫H| = {:.3e} above {:.1e}", iterations, norm, p.tolerance);
            Convergence::NotConverged
        };

        Ok(HorizonSearch {
            status,
            iterations,
            norm,
            center,
            radius: grid.radius().to_vec(),
            angles: (0..grid.num_angles()).map(|n| grid.polar_position(n)).collect(),
            expansion: h.expansion,
            history,
        })
    }
}




// ============================================================================
impl HorizonSearch {

    pub fn is_converged(&self) -> bool {
        self.status == Convergence::Converged
    }

    pub fn min_radius(&self) -> f64 {
        self.radius.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_radius(&self) -> f64 {
        self.radius.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

fn mean_radius(grid: &SphericalGrid) -> Result<f64, SphereError> {
    Ok(grid.integrate(grid.radius())? / (4.0 * std::f64::consts::PI))
}
