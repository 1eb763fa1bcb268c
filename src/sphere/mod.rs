//! A spherical surface grid with a spectral representation of functions on
//! it. The grid places `nlev` rings of nodes at the Gauss-Legendre colatitudes
//! and `2 nlev` equally spaced azimuths on each ring, so that quadrature
//! over the grid integrates products of the retained harmonics exactly.
//!
//! The surface is star-shaped about a center: every node carries its own
//! radius, and the node positions and coordinate Jacobians follow it.

pub mod gauss_legendre;
pub mod grid;
pub mod harmonics;
pub mod interpolate;

pub use grid::{AngularDerivative, SphericalGrid, SurfaceJacobian};
pub use interpolate::{MeshField, SampleError, VolumeField};

use thiserror::Error;




#[derive(Debug, Error)]
pub enum SphereError {
    #[error("surface grid needs at least 2 latitude rings, got {0}")]
    TooFewRings(usize),

    #[error("spectral filter must keep at least one mode")]
    EmptyFilter,

    #[error("{nfilt} modes reach degree {lmax}, which {nlev} rings cannot resolve")]
    Unresolved { nfilt: usize, lmax: usize, nlev: usize },

    #[error("radius at node {node} is {radius}; radii must be positive and finite")]
    InvalidRadius { node: usize, radius: f64 },

    #[error("expected {expected} values, found {found}")]
    Length { expected: usize, found: usize },

    #[error("unable to sample field at node {node}: {source}")]
    Sample { node: usize, source: SampleError },
}




/// Values of a multi-component quantity at every node of a surface grid,
/// stored node by node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceTensor {
    num_components: usize,
    data: Vec<f64>,
}




// ============================================================================
impl SurfaceTensor {

    pub fn zeros(num_angles: usize, num_components: usize) -> Self {
        Self { num_components, data: vec![0.0; num_angles * num_components] }
    }

    /// Wrap node-major data. The length must be a whole number of nodes.
    pub fn from_vec(num_components: usize, data: Vec<f64>) -> Result<Self, SphereError> {
        if data.len() % num_components.max(1) != 0 {
            let expected = (data.len() / num_components + 1) * num_components;
            return Err(SphereError::Length { expected, found: data.len() })
        }
        Ok(Self { num_components, data })
    }

    pub fn num_components(&self) -> usize {
        self.num_components
    }

    pub fn num_angles(&self) -> usize {
        if self.num_components == 0 { 0 } else { self.data.len() / self.num_components }
    }

    pub fn node(&self, n: usize) -> &[f64] {
        &self.data[n * self.num_components..(n + 1) * self.num_components]
    }

    pub fn node_mut(&mut self, n: usize) -> &mut [f64] {
        let c = self.num_components;
        &mut self.data[n * c..(n + 1) * c]
    }

    /// Gather one component over all nodes.
    pub fn component(&self, c: usize) -> Vec<f64> {
        self.data.iter().skip(c).step_by(self.num_components).copied().collect()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}
