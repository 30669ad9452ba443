//! The single full-data OLS fit that the resampled statistics are compared with.

use crate::data::Dataset;
use crate::design::{Design, ModelSpec};
use crate::evaluate::MutateError;
use crate::ols;
use crate::summary::SummaryStats;
use serde::{Deserialize, Serialize};

/// One row of the classical coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientEstimate {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
}

/// OLS fit of the model on every row of the dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFit {
    pub n_obs: usize,
    pub df_residual: usize,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub residual_standard_error: f64,
    pub coefficients: Vec<CoefficientEstimate>,
}

impl ReferenceFit {
    pub fn coefficient(&self, name: &str) -> Option<&CoefficientEstimate> {
        self.coefficients.iter().find(|c| c.name == name)
    }
}

/// Fits the model once on the full dataset, without any split.
pub fn reference_fit(dataset: &Dataset, spec: &ModelSpec) -> Result<ReferenceFit, MutateError> {
    let design = Design::resolve(dataset, spec)?;
    let rows: Vec<usize> = (0..dataset.n_rows()).collect();
    let x = design.matrix(&rows);
    let y = design.response(&rows);
    let fit = ols::fit(x.view(), y.view()).map_err(MutateError::ReferenceFit)?;

    let standard_errors = fit.standard_errors();
    let coefficients = design
        .coefficient_names()
        .iter()
        .zip(fit.coefficients().iter().zip(standard_errors.iter()))
        .map(|(name, (&estimate, &std_error))| CoefficientEstimate {
            name: name.clone(),
            estimate,
            std_error,
            t_value: estimate / std_error,
        })
        .collect();

    log::info!(
        "Full-data fit on {} rows: R2 {:.4}, residual SE {:.4}",
        fit.n_obs(),
        fit.r_squared(),
        fit.sigma()
    );

    Ok(ReferenceFit {
        n_obs: fit.n_obs(),
        df_residual: fit.df_residual(),
        r_squared: fit.r_squared(),
        adjusted_r_squared: fit.adjusted_r_squared(),
        residual_standard_error: fit.sigma(),
        coefficients,
    })
}

/// A full-data estimate next to its resampled distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientComparison {
    pub name: String,
    pub full_estimate: f64,
    pub full_std_error: f64,
    pub resampled_mean: f64,
    pub resampled_sd: f64,
}

impl CoefficientComparison {
    /// Resampled mean minus the full-data estimate.
    pub fn shift(&self) -> f64 {
        self.resampled_mean - self.full_estimate
    }

    /// Resampled SD over the full-data standard error.
    pub fn sd_ratio(&self) -> f64 {
        self.resampled_sd / self.full_std_error
    }
}

/// Pairs each coefficient of the reference fit with its resampled summary.
/// Coefficients present on only one side are skipped.
pub fn compare(summary: &SummaryStats, reference: &ReferenceFit) -> Vec<CoefficientComparison> {
    reference
        .coefficients
        .iter()
        .filter_map(|full| {
            let resampled = summary.coefficient(&full.name)?;
            Some(CoefficientComparison {
                name: full.name.clone(),
                full_estimate: full.estimate,
                full_std_error: full.std_error,
                resampled_mean: resampled.mean,
                resampled_sd: resampled.sd,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Field;
    use crate::design::SpecError;
    use approx::assert_abs_diff_eq;

    fn textbook() -> Dataset {
        Dataset::new(vec![
            (
                "x".to_string(),
                Field::numeric(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
            ),
            (
                "y".to_string(),
                Field::numeric(vec![2.0, 4.0, 5.0, 4.0, 5.0]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn reference_fit_reports_classical_table() {
        let fit = reference_fit(&textbook(), &ModelSpec::new("y", ["x"])).unwrap();
        assert_eq!(fit.n_obs, 5);
        assert_eq!(fit.df_residual, 3);
        assert_abs_diff_eq!(fit.r_squared, 0.6, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.residual_standard_error, (0.8_f64).sqrt(), epsilon = 1e-10);

        let slope = fit.coefficient("x").unwrap();
        assert_abs_diff_eq!(slope.estimate, 0.6, epsilon = 1e-10);
        assert_abs_diff_eq!(slope.std_error, (0.08_f64).sqrt(), epsilon = 1e-10);
        assert_abs_diff_eq!(slope.t_value, 0.6 / (0.08_f64).sqrt(), epsilon = 1e-8);
        assert_eq!(fit.coefficients[0].name, "(Intercept)");
    }

    #[test]
    fn reference_fit_validates_fields() {
        let err = reference_fit(&textbook(), &ModelSpec::new("y", ["z"])).unwrap_err();
        assert!(matches!(
            err,
            MutateError::InvalidSpec(SpecError::UnknownField(name)) if name == "z"
        ));
    }

    #[test]
    fn comparison_pairs_by_name() {
        use crate::summary::{CoefficientSummary, Distribution};

        let fit = reference_fit(&textbook(), &ModelSpec::new("y", ["x"])).unwrap();
        let spread = |mean: f64, sd: f64| Distribution {
            mean,
            sd,
            min: mean,
            q025: mean,
            median: mean,
            q975: mean,
            max: mean,
        };
        let summary = SummaryStats {
            iterations: 10,
            mean_r_squared_gap: 0.0,
            train_r_squared: spread(0.6, 0.0),
            holdout_r_squared: spread(0.6, 0.0),
            coefficients: vec![CoefficientSummary {
                name: "x".to_string(),
                distribution: spread(0.7, 0.2),
            }],
        };

        let rows = compare(&summary, &fit);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "x");
        assert_abs_diff_eq!(rows[0].shift(), 0.1, epsilon = 1e-10);
        assert_abs_diff_eq!(rows[0].sd_ratio(), 0.2 / (0.08_f64).sqrt(), epsilon = 1e-10);
    }
}
