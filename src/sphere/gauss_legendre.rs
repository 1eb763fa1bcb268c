use std::f64::consts::PI;

const MAX_NEWTON_ITERATIONS: usize = 100;

/**
 * Return the nodes and weights of the `n`-point Gauss-Legendre rule on
 * [-1, 1]. Nodes are returned in decreasing order, so that `acos` of them
 * increases.
 */
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut x = vec![0.0; n];
    let mut w = vec![0.0; n];

    for i in 0..(n + 1) / 2 {
        let mut z = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 0.0;

        for _ in 0..MAX_NEWTON_ITERATIONS {
            let (p, d) = legendre(n, z);
            dp = d;
            let z1 = z;
            z = z1 - p / d;

            if (z - z1).abs() <= 4.0 * f64::EPSILON {
                break
            }
        }
        let (_, d) = legendre(n, z);
        if d.is_finite() {
            dp = d
        }
        let weight = 2.0 / ((1.0 - z * z) * dp * dp);

        x[i] = z;
        x[n - 1 - i] = -z;
        w[i] = weight;
        w[n - 1 - i] = weight;
    }
    (x, w)
}

/**
 * Return the Legendre polynomial `P_n(z)` and its derivative.
 */
fn legendre(n: usize, z: f64) -> (f64, f64) {
    let mut p1 = 1.0;
    let mut p2 = 0.0;

    for j in 1..=n {
        let p3 = p2;
        p2 = p1;
        p1 = ((2 * j - 1) as f64 * z * p2 - (j - 1) as f64 * p3) / j as f64;
    }
    (p1, n as f64 * (z * p1 - p2) / (z * z - 1.0))
}




#[cfg(test)]
mod test {

    use super::gauss_legendre;

    #[test]
    fn weights_sum_to_two() {
        for n in 1..20 {
            let (_, w) = gauss_legendre(n);
            assert!((w.iter().sum::<f64>() - 2.0).abs() < 1e-13);
        }
    }

    #[test]
    fn rule_is_exact_for_polynomials_of_degree_2n_minus_1() {
        let n = 6;
        let (x, w) = gauss_legendre(n);

        for k in 0..2 * n {
            let quad: f64 = x.iter().zip(&w).map(|(x, w)| w * x.powi(k as i32)).sum();
            let exact = if k % 2 == 0 { 2.0 / (k as f64 + 1.0) } else { 0.0 };
            assert!((quad - exact).abs() < 1e-13, "degree {}", k);
        }
    }

    #[test]
    fn nodes_are_decreasing() {
        let (x, _) = gauss_legendre(9);
        assert!(x.windows(2).all(|p| p[0] > p[1]));
        assert!(x[4].abs() < 1e-15);
    }
}
