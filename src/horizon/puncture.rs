use serde::{Deserialize, Serialize};
use crate::field::FieldArray;
use crate::mesh::Mesh;
use crate::parameters::{ConfigError, ParameterInput};
use crate::sphere::{SampleError, VolumeField};
use crate::tensor::Sym2;
use super::METRIC_DERIVATIVE_COMPONENTS;




/**
 * Time-symmetric initial data for a single non-spinning black hole
 * (Schwarzschild in isotropic coordinates): the spatial metric is
 * conformally flat, `g_ab = ψ⁴ δ_ab` with `ψ = 1 + M / 2r`, and the
 * extrinsic curvature vanishes. The horizon is the coordinate sphere
 * `r = M / 2`.
 */
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnePuncture {
    pub mass: f64,
    pub center: [f64; 3],
}




/// Which ADM quantity a [`PunctureField`] samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmQuantity {
    Metric,
    Curvature,
    MetricDerivative,
}




/// One ADM quantity of a puncture, evaluated analytically at any point.
#[derive(Clone, Copy, Debug)]
pub struct PunctureField {
    puncture: OnePuncture,
    quantity: AdmQuantity,
}




// ============================================================================
impl OnePuncture {

    pub fn new(mass: f64, center: [f64; 3]) -> Self {
        Self { mass, center }
    }

    /**
     * Read the `<puncture>` block: `mass` (default 1) and the center
     * coordinates `x1`, `x2`, `x3` (default 0).
     */
    pub fn from_parameters(pin: &mut ParameterInput) -> Result<Self, ConfigError> {
        let mass = pin.get_or_add_real("puncture", "mass", 1.0)?;

        if !(mass > 0.0) {
            return Err(ConfigError::invalid_value("puncture", "mass", "must be positive"))
        }
        Ok(Self {
            mass,
            center: [
                pin.get_or_add_real("puncture", "x1", 0.0)?,
                pin.get_or_add_real("puncture", "x2", 0.0)?,
                pin.get_or_add_real("puncture", "x3", 0.0)?,
            ],
        })
    }

    fn displacement(&self, point: [f64; 3]) -> Result<([f64; 3], f64), SampleError> {
        let x = [point[0] - self.center[0], point[1] - self.center[1], point[2] - self.center[2]];
        let r = (x[0] * x[0] + x[1] * x[1] + x[2] * x[2]).sqrt();

        if r <= f64::EPSILON * self.mass {
            return Err(SampleError::Singular(point))
        }
        Ok((x, r))
    }

    /// The conformal factor `ψ` at a point away from the puncture.
    pub fn conformal_factor(&self, point: [f64; 3]) -> Result<f64, SampleError> {
        let (_, r) = self.displacement(point)?;
        Ok(1.0 + 0.5 * self.mass / r)
    }

    pub fn metric(&self, point: [f64; 3]) -> Result<Sym2, SampleError> {
        let psi = self.conformal_factor(point)?;
        Ok(Sym2::identity().scale(psi.powi(4)))
    }

    /// `∂_c g_ab` for `c = 0, 1, 2`.
    pub fn metric_derivative(&self, point: [f64; 3]) -> Result<[Sym2; 3], SampleError> {
        let (x, r) = self.displacement(point)?;
        let psi = 1.0 + 0.5 * self.mass / r;
        let mut dg = [Sym2::default(); 3];

        for (c, d) in dg.iter_mut().enumerate() {
            let dpsi = -0.5 * self.mass * x[c] / (r * r * r);
            *d = Sym2::identity().scale(4.0 * psi.powi(3) * dpsi);
        }
        Ok(dg)
    }

    /**
     * Outward null expansion of the coordinate sphere of radius `r` about
     * the puncture, `ψ⁻² (2 / r + 4 ψ' / ψ)`. For unit mass this is
     * `8 r (2r - 1) / (2r + 1)³`.
     */
    pub fn sphere_expansion(&self, r: f64) -> f64 {
        let psi = 1.0 + 0.5 * self.mass / r;
        let dpsi = -0.5 * self.mass / (r * r);
        (2.0 / r + 4.0 * dpsi / psi) / (psi * psi)
    }

    /// Coordinate radius of the horizon.
    pub fn horizon_radius(&self) -> f64 {
        0.5 * self.mass
    }

    pub fn field(&self, quantity: AdmQuantity) -> PunctureField {
        PunctureField { puncture: *self, quantity }
    }

    /**
     * Fill the metric at every stored cell (ghosts included) of every block
     * of the mesh.
     */
    pub fn fill_metric(&self, mesh: &Mesh) -> Result<FieldArray, SampleError> {
        self.fill(mesh, AdmQuantity::Metric)
    }

    pub fn fill_curvature(&self, mesh: &Mesh) -> Result<FieldArray, SampleError> {
        self.fill(mesh, AdmQuantity::Curvature)
    }

    fn fill(&self, mesh: &Mesh, quantity: AdmQuantity) -> Result<FieldArray, SampleError> {
        let field = self.field(quantity);
        let ncomp = field.num_components();
        let mut data = FieldArray::zeros(mesh.num_blocks(), ncomp, mesh.mb_indcs.padded_shape());
        let space = data.index_space();
        let mut values = vec![0.0; ncomp];

        for gid in 0..mesh.num_blocks() {
            for index in space.iter() {
                field.sample(mesh.cell_center(gid, index), &mut values)?;

                for (n, v) in values.iter().enumerate() {
                    data.set(gid, n, index, *v)
                }
            }
        }
        Ok(data)
    }
}




// ============================================================================
impl VolumeField for PunctureField {
    fn num_components(&self) -> usize {
        match self.quantity {
            AdmQuantity::Metric | AdmQuantity::Curvature => Sym2::NUM_COMPONENTS,
            AdmQuantity::MetricDerivative => METRIC_DERIVATIVE_COMPONENTS,
        }
    }

    fn sample(&self, point: [f64; 3], out: &mut [f64]) -> Result<(), SampleError> {
        match self.quantity {
            AdmQuantity::Metric => {
                out.copy_from_slice(self.puncture.metric(point)?.as_slice())
            }
            AdmQuantity::Curvature => {
                self.puncture.displacement(point)?;
                out.iter_mut().for_each(|x| *x = 0.0)
            }
            AdmQuantity::MetricDerivative => {
                for (c, d) in self.puncture.metric_derivative(point)?.iter().enumerate() {
                    out[c * Sym2::NUM_COMPONENTS..(c + 1) * Sym2::NUM_COMPONENTS].copy_from_slice(d.as_slice())
                }
            }
        }
        Ok(())
    }
}




#[cfg(test)]
mod test {

    use approx::assert_relative_eq;
    use super::{AdmQuantity, OnePuncture};
    use crate::parameters::ParameterInput;
    use crate::sphere::{SampleError, VolumeField};

    #[test]
    fn expansion_matches_the_unit_mass_closed_form() {
        let bh = OnePuncture::new(1.0, [0.0; 3]);
        for &r in &[0.3f64, 0.5, 0.8, 2.0] {
            let exact = 8.0 * r * (2.0 * r - 1.0) / (2.0 * r + 1.0).powi(3);
            assert_relative_eq!(bh.sphere_expansion(r), exact, epsilon = 1e-14);
        }
        assert_relative_eq!(bh.sphere_expansion(bh.horizon_radius()), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn metric_derivative_matches_finite_differences() {
        let bh = OnePuncture::new(1.3, [0.1, -0.2, 0.05]);
        let x = [0.4, 0.3, -0.5];
        let h = 1e-6;
        let dg = bh.metric_derivative(x).unwrap();

        for c in 0..3 {
            let mut xp = x;
            let mut xm = x;
            xp[c] += h;
            xm[c] -= h;
            let fd = (bh.metric(xp).unwrap().get(1, 1) - bh.metric(xm).unwrap().get(1, 1)) / (2.0 * h);
            assert_relative_eq!(dg[c].get(1, 1), fd, epsilon = 1e-5, max_relative = 1e-7);
            assert_eq!(dg[c].get(0, 2), 0.0);
        }
    }

    #[test]
    fn sampling_at_the_puncture_is_singular() {
        let bh = OnePuncture::new(1.0, [0.25, 0.0, 0.0]);
        let field = bh.field(AdmQuantity::MetricDerivative);
        let mut out = vec![0.0; field.num_components()];
        assert_eq!(field.sample([0.25, 0.0, 0.0], &mut out), Err(SampleError::Singular([0.25, 0.0, 0.0])));
    }

    #[test]
    fn parameters_are_read_from_the_puncture_block() {
        let mut pin = ParameterInput::parse("<puncture>\nmass = 2.0\nx2 = 0.5\n").unwrap();
        let bh = OnePuncture::from_parameters(&mut pin).unwrap();
        assert_eq!(bh, OnePuncture::new(2.0, [0.0, 0.5, 0.0]));

        let mut pin = ParameterInput::parse("<puncture>\nmass = -1.0\n").unwrap();
        assert!(OnePuncture::from_parameters(&mut pin).is_err());
    }
}
