//! Dense symmetric solves used by the linear models

use faer::Mat;

/// Solve `A x = b` for symmetric positive definite `A` by Cholesky
/// factorisation. Returns `None` when `A` is not positive definite.
pub fn solve_spd(a: &Mat<f64>, b: &[f64]) -> Option<Vec<f64>> {
    let n = a.nrows();
    debug_assert_eq!(a.ncols(), n);
    debug_assert_eq!(b.len(), n);

    // A = L L^T, L stored in the lower triangle
    let mut l = Mat::<f64>::zeros(n, n);
    for j in 0..n {
        let mut diag = a[(j, j)];
        for k in 0..j {
            diag -= l[(j, k)] * l[(j, k)];
        }
        if diag <= 0.0 || !diag.is_finite() {
            return None;
        }
        let diag = diag.sqrt();
        l[(j, j)] = diag;

        for i in (j + 1)..n {
            let mut v = a[(i, j)];
            for k in 0..j {
                v -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = v / diag;
        }
    }

    // forward: L y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut v = b[i];
        for k in 0..i {
            v -= l[(i, k)] * y[k];
        }
        y[i] = v / l[(i, i)];
    }

    // backward: L^T x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut v = y[i];
        for k in (i + 1)..n {
            v -= l[(k, i)] * x[k];
        }
        x[i] = v / l[(i, i)];
    }

    Some(x)
}

/// Add `ridge` to the diagonal of a square matrix
pub fn add_ridge(a: &mut Mat<f64>, ridge: f64) {
    for i in 0..a.nrows() {
        a[(i, i)] += ridge;
    }
}
