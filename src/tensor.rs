use core::ops::{Add, Sub, Mul, Div, Index, IndexMut};
use serde::{Deserialize, Serialize};




/**
 * A statically-sized numeric vector over a generic scalar data type T, which
 * supports arithmetic operations also supported by T.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vector<T, const DIM: usize> {
    data: [T; DIM]
}

pub type Vector3 = Vector<f64, 3>;




// ============================================================================
impl<T, const DIM: usize> Vector<T, DIM> {
    pub fn new(data: [T; DIM]) -> Self {
        Self { data }
    }

    pub fn into_array(self) -> [T; DIM] {
        self.data
    }

    pub fn as_array(&self) -> &[T; DIM] {
        &self.data
    }
}

impl<const DIM: usize> Vector<f64, DIM> {
    pub fn dot(&self, other: &Self) -> f64 {
        self.data.iter().zip(other.data.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }
}




// ============================================================================
impl<T, U, V, const DIM: usize> Add<Vector<U, DIM>> for Vector<T, DIM>
where
    T: Copy + Add<U, Output = V>,
    U: Copy,
    V: Copy + Default
{
    type Output = Vector<V, DIM>;

    fn add(self, other: Vector<U, DIM>) -> Self::Output {
        let mut data = [V::default(); DIM];

        for (i, x) in data.iter_mut().enumerate() {
            *x = self[i].add(other[i])
        }
        Self::Output { data }
    }
}

impl<T, U, V, const DIM: usize> Sub<Vector<U, DIM>> for Vector<T, DIM>
where
    T: Copy + Sub<U, Output = V>,
    U: Copy,
    V: Copy + Default
{
    type Output = Vector<V, DIM>;

    fn sub(self, other: Vector<U, DIM>) -> Self::Output {
        let mut data = [V::default(); DIM];

        for (i, x) in data.iter_mut().enumerate() {
            *x = self[i].sub(other[i])
        }
        Self::Output { data }
    }
}

impl<T, const DIM: usize> Mul<f64> for Vector<T, DIM>
where
    T: Copy + Mul<f64, Output = T> + Default,
{
    type Output = Vector<T, DIM>;

    fn mul(self, other: f64) -> Self::Output {
        let mut data = [T::default(); DIM];

        for (i, x) in data.iter_mut().enumerate() {
            *x = self[i].mul(other)
        }
        Self::Output { data }
    }
}

impl<T, const DIM: usize> Div<f64> for Vector<T, DIM>
where
    T: Copy + Div<f64, Output = T> + Default,
{
    type Output = Vector<T, DIM>;

    fn div(self, other: f64) -> Self::Output {
        let mut data = [T::default(); DIM];

        for (i, x) in data.iter_mut().enumerate() {
            *x = self[i].div(other)
        }
        Self::Output { data }
    }
}




// ============================================================================
impl<T, const DIM: usize> Index<usize> for Vector<T, DIM> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index]
    }
}

impl<T, const DIM: usize> IndexMut<usize> for Vector<T, DIM> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.data[index]
    }
}




/**
 * Return the packed storage slot of the `(a, b)` component of a symmetric
 * rank-2 tensor in three dimensions. Slots are ordered xx, xy, xz, yy, yz,
 * zz; the index pair may be given in either order.
 */
pub fn sym2(a: usize, b: usize) -> usize {
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    match (a, b) {
        (0, 0) => 0,
        (0, 1) => 1,
        (0, 2) => 2,
        (1, 1) => 3,
        (1, 2) => 4,
        (2, 2) => 5,
        _ => panic!("symmetric tensor index ({}, {}) out of range", a, b),
    }
}




/**
 * A symmetric rank-2 tensor in three dimensions, stored as its six
 * independent components in the order given by [`sym2`].
 */
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sym2 {
    data: [f64; 6],
}




// ============================================================================
impl Sym2 {

    pub const NUM_COMPONENTS: usize = 6;

    pub fn new(data: [f64; 6]) -> Self {
        Self { data }
    }

    pub fn identity() -> Self {
        Self::new([1.0, 0.0, 0.0, 1.0, 0.0, 1.0])
    }

    /**
     * Build a tensor from the first six elements of a slice.
     */
    pub fn from_slice(slice: &[f64]) -> Self {
        let mut data = [0.0; 6];
        data.copy_from_slice(&slice[..6]);
        Self { data }
    }

    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.data[sym2(a, b)]
    }

    pub fn set(&mut self, a: usize, b: usize, value: f64) {
        self.data[sym2(a, b)] = value
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn scale(&self, s: f64) -> Self {
        let mut data = self.data;
        for x in data.iter_mut() {
            *x *= s
        }
        Self { data }
    }

    pub fn det(&self) -> f64 {
        let [xx, xy, xz, yy, yz, zz] = self.data;
        xx * (yy * zz - yz * yz) - xy * (xy * zz - yz * xz) + xz * (xy * yz - yy * xz)
    }

    /**
     * Return the inverse of this tensor, or `None` if its determinant is
     * not a finite number comfortably away from zero.
     */
    pub fn inverse(&self) -> Option<Self> {
        let det = self.det();

        if !det.is_finite() || det.abs() <= f64::EPSILON * f64::EPSILON {
            return None
        }
        let [xx, xy, xz, yy, yz, zz] = self.data;

        Some(Self::new([
            (yy * zz - yz * yz) / det,
            (xz * yz - xy * zz) / det,
            (xy * yz - xz * yy) / det,
            (xx * zz - xz * xz) / det,
            (xy * xz - xx * yz) / det,
            (xx * yy - xy * xy) / det,
        ]))
    }

    /**
     * Full contraction `T^{ab} S_{ab}` with another symmetric tensor.
     */
    pub fn contract(&self, other: &Self) -> f64 {
        let mut sum = 0.0;
        for a in 0..3 {
            for b in 0..3 {
                sum += self.get(a, b) * other.get(a, b)
            }
        }
        sum
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{sym2, Sym2, Vector};

    #[test]
    fn packing_order_is_symmetric() {
        let expected = [[0, 1, 2], [1, 3, 4], [2, 4, 5]];
        for a in 0..3 {
            for b in 0..3 {
                assert_eq!(sym2(a, b), expected[a][b]);
            }
        }
    }

    #[test]
    fn inverse_times_tensor_is_identity() {
        let g = Sym2::new([2.0, 0.3, -0.1, 1.5, 0.2, 3.0]);
        let h = g.inverse().unwrap();

        for a in 0..3 {
            for b in 0..3 {
                let x: f64 = (0..3).map(|c| g.get(a, c) * h.get(c, b)).sum();
                let delta = if a == b { 1.0 } else { 0.0 };
                assert!((x - delta).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn singular_tensor_has_no_inverse() {
        let g = Sym2::new([1.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        assert!(g.inverse().is_none());
        assert!(Sym2::new([f64::NAN; 6]).inverse().is_none());
    }

    #[test]
    fn vector_arithmetic_works() {
        let a = Vector::new([1.0, 2.0, 2.0]);
        let b = Vector::new([0.5, 0.5, 0.5]);
        assert_eq!((a - b).into_array(), [0.5, 1.5, 1.5]);
        assert_eq!((a * 2.0).into_array(), [2.0, 4.0, 4.0]);
        assert_eq!(a.norm(), 3.0);
    }
}
