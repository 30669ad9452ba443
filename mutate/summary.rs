//! Aggregation of a result table into per-series sampling-distribution summaries.

use crate::evaluate::ResultTable;
use crate::stats::{Moments, quantile_sorted};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Mean, sample standard deviation and selected quantiles of one series.
///
/// With a single iteration the standard deviation is NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub q025: f64,
    pub median: f64,
    pub q975: f64,
    pub max: f64,
}

impl Distribution {
    pub fn of(values: ArrayView1<f64>) -> Self {
        let moments: Moments = values.iter().copied().collect();
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            mean: moments.mean(),
            sd: moments.sample_sd(),
            min: quantile_sorted(&sorted, 0.0),
            q025: quantile_sorted(&sorted, 0.025),
            median: quantile_sorted(&sorted, 0.5),
            q975: quantile_sorted(&sorted, 0.975),
            max: quantile_sorted(&sorted, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSummary {
    pub name: String,
    #[serde(flatten)]
    pub distribution: Distribution,
}

/// Read-only aggregate over a complete result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub iterations: usize,
    /// `mean(holdout R2) - mean(train R2)`.
    pub mean_r_squared_gap: f64,
    pub train_r_squared: Distribution,
    pub holdout_r_squared: Distribution,
    pub coefficients: Vec<CoefficientSummary>,
}

impl SummaryStats {
    pub fn coefficient(&self, name: &str) -> Option<&Distribution> {
        self.coefficients
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.distribution)
    }
}

/// Summarizes every coefficient and both R-squared series of a run.
pub fn summarize(table: &ResultTable) -> SummaryStats {
    let coefficients = table
        .coefficient_names()
        .iter()
        .enumerate()
        .map(|(index, name)| CoefficientSummary {
            name: name.clone(),
            distribution: Distribution::of(table.coefficient(index).view()),
        })
        .collect();
    let train_r_squared = Distribution::of(table.train_r_squared().view());
    let holdout_r_squared = Distribution::of(table.holdout_r_squared().view());

    SummaryStats {
        iterations: table.len(),
        mean_r_squared_gap: holdout_r_squared.mean - train_r_squared.mean,
        train_r_squared,
        holdout_r_squared,
        coefficients,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::IterationRecord;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn record(iteration: usize, slope: f64, train: f64, holdout: f64) -> IterationRecord {
        IterationRecord {
            iteration,
            seed: iteration as u64,
            n_train: 9,
            n_holdout: 1,
            coefficients: array![1.0, slope],
            train_r_squared: train,
            holdout_r_squared: holdout,
        }
    }

    fn table(records: Vec<IterationRecord>) -> ResultTable {
        ResultTable::new(vec!["(Intercept)".to_string(), "x".to_string()], records)
    }

    #[test]
    fn constant_holdout_series_has_zero_spread() {
        let c = 0.42;
        let summary = summarize(&table(
            (1..=6)
                .map(|i| record(i, i as f64, 0.5 + i as f64 / 100.0, c))
                .collect(),
        ));
        assert_eq!(summary.iterations, 6);
        assert_abs_diff_eq!(summary.holdout_r_squared.mean, c, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.holdout_r_squared.sd, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn means_deviations_and_gap_match_hand_computation() {
        let summary = summarize(&table(vec![
            record(1, 1.0, 0.60, 0.50),
            record(2, 2.0, 0.70, 0.40),
            record(3, 3.0, 0.80, 0.60),
        ]));

        let slope = summary.coefficient("x").unwrap();
        assert_abs_diff_eq!(slope.mean, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(slope.sd, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(slope.median, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(slope.min, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(slope.max, 3.0, epsilon = 1e-12);

        let intercept = summary.coefficient("(Intercept)").unwrap();
        assert_abs_diff_eq!(intercept.sd, 0.0, epsilon = 1e-12);

        assert_abs_diff_eq!(summary.train_r_squared.mean, 0.70, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.train_r_squared.sd, 0.10, epsilon = 1e-12);
        assert_abs_diff_eq!(summary.mean_r_squared_gap, -0.20, epsilon = 1e-12);
    }

    #[test]
    fn summary_does_not_depend_on_record_order() {
        let forward = summarize(&table(vec![
            record(1, 1.5, 0.61, 0.52),
            record(2, 2.5, 0.72, 0.41),
            record(3, 0.5, 0.83, 0.63),
        ]));
        let backward = summarize(&table(vec![
            record(3, 0.5, 0.83, 0.63),
            record(2, 2.5, 0.72, 0.41),
            record(1, 1.5, 0.61, 0.52),
        ]));
        for (a, b) in forward.coefficients.iter().zip(&backward.coefficients) {
            assert_abs_diff_eq!(a.distribution.mean, b.distribution.mean, epsilon = 1e-12);
            assert_abs_diff_eq!(a.distribution.sd, b.distribution.sd, epsilon = 1e-12);
            assert_eq!(a.distribution.median, b.distribution.median);
        }
    }
}
