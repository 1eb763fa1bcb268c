//! Apparent horizon finding.
//!
//! An apparent horizon is a closed surface of vanishing outgoing null
//! expansion. The surface is represented as a star-shaped [`SphericalGrid`]
//! whose pointwise radius is driven toward the zero of the expansion by a
//! damped flow in spectral space.
//!
//! [`SphericalGrid`]: crate::sphere::SphericalGrid

pub mod derivative;
pub mod expansion;
pub mod puncture;
pub mod solver;

pub use derivative::metric_derivative;
pub use expansion::{surface_null_expansion, NullExpansion};
pub use puncture::{AdmQuantity, OnePuncture, PunctureField};
pub use solver::{AdmFields, Convergence, HorizonFinder, HorizonParameters, HorizonSearch};

use thiserror::Error;
use crate::parameters::ConfigError;
use crate::sphere::SphereError;

/// Number of components of the packed spatial metric derivative `∂_c g_ab`,
/// stored as three consecutive symmetric tensors (one per `c`).
pub const METRIC_DERIVATIVE_COMPONENTS: usize = 18;




#[derive(Debug, Error)]
pub enum HorizonError {
    #[error(transparent)]
    Sphere(#[from] SphereError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} ghost cells is not a supported finite-difference stencil (2, 3 or 4)")]
    UnsupportedGhostCount(usize),

    #[error("spatial metric is singular at node {node}")]
    SingularMetric { node: usize },

    #[error("gradient of the level-set function vanishes at node {node}")]
    VanishingGradient { node: usize },

    #[error("{quantity} has {found} components, expected {expected}")]
    Components { quantity: &'static str, expected: usize, found: usize },
}
