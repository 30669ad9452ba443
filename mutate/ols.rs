//! # Ordinary Least Squares
//!
//! Fits `y = X beta + e` by a Householder QR decomposition of the design
//! matrix. The first column of `X` is assumed to be the intercept, which is
//! what makes the reported R-squared the usual `1 - RSS/TSS`.
//!
//! Rank deficiency is never papered over: a design column whose QR diagonal
//! is negligible next to its own norm is collinear with the columns before it,
//! and the fit is refused.

use crate::stats::all_equal;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{Diag, QR, SolveTriangular, UPLO};
use thiserror::Error;

/// Relative tolerance on `|R[j, j]| / ||X[:, j]||` below which column `j` is
/// treated as linearly dependent on the preceding columns.
const RANK_TOLERANCE: f64 = 1e-7;

#[derive(Error, Debug)]
pub enum OlsError {
    #[error("The design has {rows} rows but {coefficients} coefficients; at least one residual degree of freedom is required.")]
    Underdetermined { rows: usize, coefficients: usize },

    #[error("Design column {column} is constant or collinear with earlier columns (rank deficient).")]
    RankDeficient { column: usize },

    #[error("The response is constant, so R-squared is undefined.")]
    ConstantResponse,

    #[error("The design has {rows} rows but the response has {responses} values.")]
    DimensionMismatch { rows: usize, responses: usize },

    #[error("A linear algebra routine failed: {0}")]
    LinearAlgebra(#[from] ndarray_linalg::error::LinalgError),
}

/// The result of one least-squares fit.
#[derive(Debug, Clone)]
pub struct OlsFit {
    coefficients: Array1<f64>,
    /// `R^{-1}`, so that `(X'X)^{-1} = R^{-1} R^{-T}`.
    r_inverse: Array2<f64>,
    rss: f64,
    tss: f64,
    n_obs: usize,
}

impl OlsFit {
    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.coefficients.view()
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn df_residual(&self) -> usize {
        self.n_obs - self.coefficients.len()
    }

    pub fn residual_sum_of_squares(&self) -> f64 {
        self.rss
    }

    /// Training-sample R-squared, `1 - RSS/TSS`.
    pub fn r_squared(&self) -> f64 {
        1.0 - self.rss / self.tss
    }

    pub fn adjusted_r_squared(&self) -> f64 {
        let n = self.n_obs as f64;
        let df = self.df_residual() as f64;
        1.0 - (1.0 - self.r_squared()) * (n - 1.0) / df
    }

    /// Residual standard error, `sqrt(RSS / (n - p))`.
    pub fn sigma(&self) -> f64 {
        (self.rss / self.df_residual() as f64).sqrt()
    }

    /// Classical standard errors, `sigma * sqrt(diag((X'X)^{-1}))`.
    pub fn standard_errors(&self) -> Array1<f64> {
        let sigma = self.sigma();
        self.r_inverse
            .rows()
            .into_iter()
            .map(|row| sigma * row.dot(&row).sqrt())
            .collect()
    }

    /// Applies the fitted coefficients to a design matrix with the same layout.
    pub fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients)
    }
}

/// Fits an OLS model of `y` on `x`.
pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<OlsFit, OlsError> {
    let (rows, columns) = x.dim();
    if rows != y.len() {
        return Err(OlsError::DimensionMismatch {
            rows,
            responses: y.len(),
        });
    }
    if rows <= columns {
        return Err(OlsError::Underdetermined {
            rows,
            coefficients: columns,
        });
    }
    if all_equal(y) {
        return Err(OlsError::ConstantResponse);
    }

    let (q, r) = x.qr()?;

    for (column, x_column) in x.axis_iter(Axis(1)).enumerate() {
        let norm = x_column.dot(&x_column).sqrt();
        if r[[column, column]].abs() <= RANK_TOLERANCE * norm {
            return Err(OlsError::RankDeficient { column });
        }
    }

    let r_inverse =
        r.solve_triangular(UPLO::Upper, Diag::NonUnit, &Array2::eye(columns))?;
    let coefficients = r_inverse.dot(&q.t().dot(&y));

    let residuals = &y - &x.dot(&coefficients);
    let rss = residuals.dot(&residuals);
    let mean = y.sum() / rows as f64;
    let tss = y.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>();

    log::trace!("OLS fit on {rows} rows: RSS={rss:.6e}, TSS={tss:.6e}");

    Ok(OlsFit {
        coefficients,
        r_inverse,
        rss,
        tss,
        n_obs: rows,
    })
}
