use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::parameters::ParameterInput;
use super::FemnError;




/// A basis function of barycentric coordinates on one triangle.
pub type Evaluator = fn([f64; 3]) -> f64;




/**
 * The families of angular basis functions. Each family has one function
 * per triangle corner, in barycentric coordinates `(ξ1, ξ2, ξ3)`.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasisKind {
    /// `2 ξ1 + ξ2 + ξ3 - 1`, nonzero over the whole triangle.
    OverlappingTent,

    /// `ξ1 - ξ2 - ξ3` where `ξ1 ≥ 1/2`, zero elsewhere.
    SmallTent,

    /// Constant 1 over the whole triangle.
    OverlappingHoneycomb,

    /// 1 over the region closest to the corner, zero elsewhere.
    NonOverlappingHoneycomb,
}




/**
 * The three per-corner evaluators of a basis family, selected once.
 */
#[derive(Clone, Copy)]
pub struct FemBasis {
    kind: BasisKind,
    evaluators: [Evaluator; 3],
}




// ============================================================================
impl BasisKind {
    pub const ALL: [BasisKind; 4] = [
        BasisKind::OverlappingTent,
        BasisKind::SmallTent,
        BasisKind::OverlappingHoneycomb,
        BasisKind::NonOverlappingHoneycomb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BasisKind::OverlappingTent => "overlapping_tent",
            BasisKind::SmallTent => "small_tent",
            BasisKind::OverlappingHoneycomb => "overlapping_honeycomb",
            BasisKind::NonOverlappingHoneycomb => "non_overlapping_honeycomb",
        }
    }

    /// The numeric selector used in input decks (1 to 4).
    pub fn selector(self) -> usize {
        match self {
            BasisKind::OverlappingTent => 1,
            BasisKind::SmallTent => 2,
            BasisKind::OverlappingHoneycomb => 3,
            BasisKind::NonOverlappingHoneycomb => 4,
        }
    }
}

impl FromStr for BasisKind {
    type Err = FemnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| s == kind.name() || s == kind.selector().to_string())
            .ok_or_else(|| FemnError::UnknownBasis(s.to_string()))
    }
}

impl fmt::Display for BasisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}




// ============================================================================
impl FemBasis {

    pub fn new(kind: BasisKind) -> Self {
        let evaluators: [Evaluator; 3] = match kind {
            BasisKind::OverlappingTent => [
                |[a, b, c]| 2.0 * a + b + c - 1.0,
                |[a, b, c]| a + 2.0 * b + c - 1.0,
                |[a, b, c]| a + b + 2.0 * c - 1.0,
            ],
            BasisKind::SmallTent => [
                |[a, b, c]| if a >= 0.5 { a - b - c } else { 0.0 },
                |[a, b, c]| if b >= 0.5 { b - c - a } else { 0.0 },
                |[a, b, c]| if c >= 0.5 { c - a - b } else { 0.0 },
            ],
            BasisKind::OverlappingHoneycomb => [
                |_| 1.0,
                |_| 1.0,
                |_| 1.0,
            ],
            BasisKind::NonOverlappingHoneycomb => [
                |[a, b, c]| if a >= b && a > c { 1.0 } else { 0.0 },
                |[a, b, c]| if b >= c && b > a { 1.0 } else { 0.0 },
                |[a, b, c]| if c >= a && c > b { 1.0 } else { 0.0 },
            ],
        };
        Self { kind, evaluators }
    }

    /**
     * Select the basis named by `<radiation_femn>/basis`, which may be a
     * family name or its numeric selector (default: overlapping tent).
     */
    pub fn from_parameters(pin: &mut ParameterInput) -> Result<Self, FemnError> {
        let selector = pin.get_or_add_string("radiation_femn", "basis", BasisKind::OverlappingTent.name());
        Ok(Self::new(selector.parse()?))
    }

    pub fn kind(&self) -> BasisKind {
        self.kind
    }

    /// Evaluate the function of corner `corner` (0, 1 or 2).
    pub fn evaluate(&self, corner: usize, xi: [f64; 3]) -> f64 {
        (self.evaluators[corner])(xi)
    }

    /**
     * Evaluate the basis function belonging to vertex `a` on the given
     * triangle, at barycentric point `xi`.
     */
    pub fn basis_a(&self, a: usize, triangle: [usize; 3], xi: [f64; 3]) -> Result<f64, FemnError> {
        Ok(self.evaluate(corner_of(a, triangle)?, xi))
    }

    /// The product of the basis functions of vertices `a` and `b`.
    pub fn basis_a_basis_b(&self, a: usize, b: usize, triangle: [usize; 3], xi: [f64; 3]) -> Result<f64, FemnError> {
        Ok(self.basis_a(a, triangle, xi)? * self.basis_a(b, triangle, xi)?)
    }
}

impl fmt::Debug for FemBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FemBasis").field("kind", &self.kind).finish()
    }
}

fn corner_of(vertex: usize, triangle: [usize; 3]) -> Result<usize, FemnError> {
    triangle
        .iter()
        .position(|&v| v == vertex)
        .ok_or(FemnError::NotInTriangle { vertex, triangle })
}
