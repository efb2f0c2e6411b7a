//! Gauss–Legendre quadrature.
//!
//! Used at a fixed node count for the orientation average of the ellipsoid
//! form factor. Roots of `P_n` are found by Newton iteration from a Chebyshev
//! guess; only the non-negative half is computed and mirrored.

use std::f64::consts::PI;

/// Gauss–Legendre nodes and weights on `[-1, 1]`, nodes ascending.
pub fn gauss_legendre_nodes_weights(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    match n {
        0 => return (nodes, weights),
        1 => {
            weights[0] = 2.0;
            return (nodes, weights);
        }
        _ => {}
    }

    let nf = n as f64;
    for i in 0..n.div_ceil(2) {
        let mut x = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre_with_derivative(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre_with_derivative(n, x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);

        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}

/// `(node, weight)` pairs mapped from `[-1, 1]` onto `[a, b]`.
pub fn gauss_legendre(n: usize, a: f64, b: f64) -> Vec<(f64, f64)> {
    let (nodes, weights) = gauss_legendre_nodes_weights(n.max(1));
    let half = 0.5 * (b - a);
    let mid = 0.5 * (b + a);
    nodes
        .iter()
        .zip(&weights)
        .map(|(&x, &w)| (mid + half * x, half * w))
        .collect()
}

/// `P_n(x)` and `P'_n(x)` by the three-term recurrence.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}
