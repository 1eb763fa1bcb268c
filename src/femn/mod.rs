//! Finite-element angular discretization for the radiation solver: a
//! triangulated unit sphere and the basis functions defined on its
//! triangles in barycentric coordinates.

pub mod basis;

pub use basis::{BasisKind, FemBasis};

use serde::{Deserialize, Serialize};
use thiserror::Error;




#[derive(Clone, Debug, Error, PartialEq)]
pub enum FemnError {
    #[error("unknown basis selector '{0}' (expected 1 to 4, or one of overlapping_tent, small_tent, overlapping_honeycomb, non_overlapping_honeycomb)")]
    UnknownBasis(String),

    #[error("vertex {vertex} is not a corner of triangle {triangle:?}")]
    NotInTriangle { vertex: usize, triangle: [usize; 3] },
}




/**
 * A triangulation of the unit sphere. Triangles are stored as triples of
 * vertex indexes.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    vertices: Vec<[f64; 3]>,
    triangles: Vec<[usize; 3]>,
}




/**
 * Trigonometric factors of the direction through a point of a triangle.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AngularFactors {
    pub cos_phi_sin_theta: f64,
    pub sin_phi_sin_theta: f64,
    pub cos_theta: f64,
    pub sin_theta: f64,
}




// ============================================================================
impl TriangleMesh {

    pub fn new(vertices: Vec<[f64; 3]>, triangles: Vec<[usize; 3]>) -> Self {
        Self { vertices, triangles }
    }

    /**
     * The regular icosahedron inscribed in the unit sphere: 12 vertices and
     * 20 triangles.
     */
    pub fn icosahedron() -> Self {
        let t = (1.0 + 5.0_f64.sqrt()) / 2.0;
        let raw = [
            [-1.0, t, 0.0], [1.0, t, 0.0], [-1.0, -t, 0.0], [1.0, -t, 0.0],
            [0.0, -1.0, t], [0.0, 1.0, t], [0.0, -1.0, -t], [0.0, 1.0, -t],
            [t, 0.0, -1.0], [t, 0.0, 1.0], [-t, 0.0, -1.0], [-t, 0.0, 1.0],
        ];
        let norm = (1.0 + t * t).sqrt();
        let vertices = raw.iter().map(|v| [v[0] / norm, v[1] / norm, v[2] / norm]).collect();
        let triangles = vec![
            [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
            [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
            [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
            [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
        ];
        Self { vertices, triangles }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// The corner coordinates of a triangle.
    pub fn corners(&self, triangle: [usize; 3]) -> [[f64; 3]; 3] {
        [self.vertices[triangle[0]], self.vertices[triangle[1]], self.vertices[triangle[2]]]
    }

    /**
     * Return every triangle having both `a` and `b` as corners, that is the
     * triangles sharing the edge `(a, b)`. If `a == b` this is every
     * triangle having `a` as a corner. Each triangle appears once, in
     * storage order; the result is empty if the vertices share no edge.
     */
    pub fn find_triangles(&self, a: usize, b: usize) -> Vec<[usize; 3]> {
        self.triangles
            .iter()
            .filter(|t| t.contains(&a) && t.contains(&b))
            .copied()
            .collect()
    }
}




// ============================================================================
impl AngularFactors {

    /**
     * Evaluate at the point with barycentric coordinates `xi` in the
     * triangle with the given corners. The point need not lie on the unit
     * sphere; only its direction matters.
     */
    pub fn at(corners: &[[f64; 3]; 3], xi: [f64; 3]) -> Self {
        let [x, y, z] = barycentric_to_cartesian(corners, xi);
        let r = (x * x + y * y + z * z).sqrt();
        let rho = (x * x + y * y).sqrt();

        Self {
            cos_phi_sin_theta: x / r,
            sin_phi_sin_theta: y / r,
            cos_theta: z / r,
            sin_theta: rho / r,
        }
    }
}

/// The Cartesian point `Σ xi_k v_k` of a triangle with corners `v`.
pub fn barycentric_to_cartesian(corners: &[[f64; 3]; 3], xi: [f64; 3]) -> [f64; 3] {
    let mut x = [0.0; 3];
    for (v, w) in corners.iter().zip(xi) {
        for a in 0..3 {
            x[a] += w * v[a]
        }
    }
    x
}




#[cfg(test)]
mod test {

    use approx::assert_relative_eq;
    use super::{barycentric_to_cartesian, AngularFactors, TriangleMesh};

    #[test]
    fn icosahedron_is_a_closed_unit_triangulation() {
        let mesh = TriangleMesh::icosahedron();
        assert_eq!(mesh.num_vertices(), 12);
        assert_eq!(mesh.num_triangles(), 20);

        for v in mesh.vertices() {
            assert_relative_eq!(v.iter().map(|x| x * x).sum::<f64>(), 1.0, epsilon = 1e-14);
        }
        for a in 0..12 {
            assert_eq!(mesh.find_triangles(a, a).len(), 5);
        }

        let mut edges = 0;
        for a in 0..12 {
            for b in a + 1..12 {
                match mesh.find_triangles(a, b).len() {
                    0 => {}
                    2 => edges += 1,
                    n => panic!("edge ({}, {}) is shared by {} triangles", a, b, n),
                }
            }
        }
        assert_eq!(edges, 30);
    }

    #[test]
    fn opposite_vertices_share_no_triangle() {
        let mesh = TriangleMesh::icosahedron();
        assert!(mesh.find_triangles(0, 3).is_empty());
        assert_eq!(mesh.find_triangles(5, 0), vec![[0, 11, 5], [0, 5, 1]]);
    }

    #[test]
    fn barycentric_corners_and_factors() {
        let corners = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(barycentric_to_cartesian(&corners, [0.0, 1.0, 0.0]), [0.0, 1.0, 0.0]);

        let f = AngularFactors::at(&corners, [1.0 / 3.0; 3]);
        let s = 1.0 / 3.0_f64.sqrt();
        assert_relative_eq!(f.cos_phi_sin_theta, s, epsilon = 1e-14);
        assert_relative_eq!(f.sin_phi_sin_theta, s, epsilon = 1e-14);
        assert_relative_eq!(f.cos_theta, s, epsilon = 1e-14);
        assert_relative_eq!(f.sin_theta, (2.0_f64 / 3.0).sqrt(), epsilon = 1e-14);
    }
}
