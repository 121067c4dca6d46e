//! Numerical helpers shared by the dating crate.

use core::f64::consts::PI;

use crate::{Result, TemporaError};

/// Natural log of the gamma function via the Lanczos approximation (g=7).
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        // Reflection formula: Γ(x) = π / (sin(πx) · Γ(1-x))
        let log_pi_over_sin = (PI / (PI * x).sin()).ln();
        log_pi_over_sin - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut ag = 0.99999999999980993_f64;
        for (i, &c) in COEFFS.iter().enumerate() {
            ag += c / (x + i as f64 + 1.0);
        }
        let t = x + 7.5; // g + 0.5
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + ag.ln()
    }
}

/// Log-factorial `ln(n!)`.
///
/// Zero for 0 and 1, Lanczos above. Counts in the ranked-history
/// recursions can reach `-1` for degenerate inputs; those return NaN so the
/// caller's non-finite check rejects the assignment.
pub fn ln_factorial(n: i64) -> f64 {
    match n {
        n if n < 0 => f64::NAN,
        0 | 1 => 0.0,
        n => ln_gamma(n as f64 + 1.0),
    }
}

/// `|a - b| <= eps`. A zero tolerance accepts exact equality.
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

/// Invert a general square matrix (row-major `n×n`) by Gauss-Jordan
/// elimination with partial pivoting.
///
/// # Errors
///
/// Returns [`TemporaError::SingularMatrix`] when a pivot falls below `1e-15`,
/// and [`TemporaError::InvalidInput`] if `a.len() != n * n`.
pub fn invert_matrix(a: &[f64], n: usize) -> Result<Vec<f64>> {
    if a.len() != n * n {
        return Err(TemporaError::InvalidInput(format!(
            "matrix has {} entries, expected {}",
            a.len(),
            n * n
        )));
    }

    // Augment with identity
    let cols = 2 * n;
    let mut aug = vec![0.0; n * cols];
    for i in 0..n {
        aug[i * cols..i * cols + n].copy_from_slice(&a[i * n..(i + 1) * n]);
        aug[i * cols + n + i] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col * cols + col].abs();
        for row in (col + 1)..n {
            let val = aug[row * cols + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }
        if max_val < 1e-15 {
            return Err(TemporaError::SingularMatrix { size: n });
        }
        if max_row != col {
            for j in 0..cols {
                aug.swap(col * cols + j, max_row * cols + j);
            }
        }
        let pivot = aug[col * cols + col];
        for j in 0..cols {
            aug[col * cols + j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row * cols + col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..cols {
                let above = aug[col * cols + j];
                aug[row * cols + j] -= factor * above;
            }
        }
    }

    let mut inv = vec![0.0; n * n];
    for i in 0..n {
        inv[i * n..(i + 1) * n].copy_from_slice(&aug[i * cols + n..(i + 1) * cols]);
    }
    Ok(inv)
}

/// Multiply a row-major `n×n` matrix by a vector.
pub fn mat_vec(a: &[f64], x: &[f64], n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| a[i * n..(i + 1) * n].iter().zip(x).map(|(aij, xj)| aij * xj).sum())
        .collect()
}
