//! Minimum-cost assignment on a square matrix.
//!
//! Shortest-augmenting-path formulation with row/column potentials
//! (Jonker-Volgenant style), `O(n³)` and fully deterministic.

use crate::error::{Error, Result};

/// Solve the square assignment problem, returning `assign[row] = column`.
///
/// # Errors
///
/// Returns [`Error::Internal`] when the matrix is empty, ragged, or not
/// square; the callers construct their own matrices, so this indicates a
/// programmer error.
pub fn solve(cost: &[Vec<f64>]) -> Result<Vec<usize>> {
    let n = cost.len();
    if n == 0 {
        return Err(Error::Internal("empty cost matrix".to_string()));
    }
    if cost.iter().any(|row| row.len() != n) {
        return Err(Error::Internal(format!(
            "cost matrix is not square: {} rows, ragged or mismatched columns",
            n
        )));
    }

    // 1-indexed potentials; p[j] is the row matched to column j, 0 = free.
    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; n + 1];
    let mut p = vec![0_usize; n + 1];
    let mut way = vec![0_usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0_usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0_usize;

            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        // Augment along the recorded path
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assign = vec![0_usize; n];
    for j in 1..=n {
        assign[p[j] - 1] = j - 1;
    }
    Ok(assign)
}
