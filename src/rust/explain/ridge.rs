use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{EditorError, Result};

/// Weighted ridge regression with an unpenalized intercept
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RidgeFit {
    pub intercept: f64,
    pub coefficients: Array1<f64>,
}

impl RidgeFit {
    /// Minimizes `sum_i w_i (y_i - b - x_i·beta)^2 + alpha |beta|^2`.
    ///
    /// Columns and target are centered on their weighted means, the penalized
    /// normal equations are solved for `beta`, and the intercept recovered from the
    /// means.
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, weights: ArrayView1<'_, f64>, alpha: f64) -> Result<Self> {
        let (rows, cols) = x.dim();
        if rows == 0 || y.len() != rows || weights.len() != rows {
            return Err(EditorError::Explain(format!(
                "Regression needs matching non-empty inputs, got {} rows, {} targets, {} weights",
                rows,
                y.len(),
                weights.len()
            )));
        }

        let total_weight = weights.sum();
        if !(total_weight > 0.0) {
            return Err(EditorError::Explain("Regression sample weights sum to zero".into()));
        }

        let x_mean = weights.dot(&x) / total_weight;
        let y_mean = weights.dot(&y) / total_weight;
        let centered = &x - &x_mean.view().insert_axis(Axis(0));
        let y_centered = &y - y_mean;

        // X^T W X + alpha I and X^T W y
        let weighted = &centered * &weights.view().insert_axis(Axis(1));
        let mut gram = weighted.t().dot(&centered);
        for i in 0..cols {
            gram[[i, i]] += alpha;
        }
        let rhs = weighted.t().dot(&y_centered);

        let coefficients = solve(gram, rhs)
            .ok_or_else(|| EditorError::Explain("Regression system is singular".into()))?;
        let intercept = y_mean - x_mean.dot(&coefficients);

        Ok(Self { intercept, coefficients })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }

    /// Weighted coefficient of determination
    pub fn score(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, weights: ArrayView1<'_, f64>) -> f64 {
        let predictions = self.predict(x);
        let y_mean = weights.dot(&y) / weights.sum();
        let residual: f64 = ndarray::Zip::from(&y)
            .and(&predictions)
            .and(&weights)
            .fold(0.0, |acc, &t, &p, &w| acc + w * (t - p).powi(2));
        let total: f64 = ndarray::Zip::from(&y)
            .and(&weights)
            .fold(0.0, |acc, &t, &w| acc + w * (t - y_mean).powi(2));
        if total == 0.0 {
            if residual == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - residual / total
        }
    }
}

/// Solves `a · x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| {
            a[[i, col]]
                .abs()
                .partial_cmp(&a[[j, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_small_system() {
        let x = solve(array![[2.0, 1.0], [1.0, 3.0]], array![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
        assert!(solve(array![[1.0, 2.0], [2.0, 4.0]], array![1.0, 2.0]).is_none());
    }

    #[test]
    fn test_exact_fit_without_penalty() {
        // y = 1 + 2a - 3b
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 1.0]];
        let y = x.column(0).mapv(|a| 2.0 * a) - x.column(1).mapv(|b| 3.0 * b) + 1.0;
        let w = Array1::ones(5);
        let fit = RidgeFit::fit(x.view(), y.view(), w.view(), 0.0).unwrap();
        assert!((fit.intercept - 1.0).abs() < 1e-9);
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((fit.coefficients[1] + 3.0).abs() < 1e-9);
        assert!((fit.score(x.view(), y.view(), w.view()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];
        let w = Array1::ones(4);
        let free = RidgeFit::fit(x.view(), y.view(), w.view(), 0.0).unwrap();
        let shrunk = RidgeFit::fit(x.view(), y.view(), w.view(), 10.0).unwrap();
        assert!(shrunk.coefficients[0].abs() < free.coefficients[0].abs());
    }

    #[test]
    fn test_constant_column_gets_zero_weight() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0]];
        let y = array![1.0, 2.0, 3.0];
        let w = Array1::ones(3);
        let fit = RidgeFit::fit(x.view(), y.view(), w.view(), 1.0).unwrap();
        assert!(fit.coefficients[0].abs() < 1e-12);
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0];
        let w = Array1::ones(2);
        assert!(RidgeFit::fit(x.view(), y.view(), w.view(), 1.0).is_err());
    }
}
