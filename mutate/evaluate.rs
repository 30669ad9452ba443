// mutate/evaluate.rs

//! # The MUTATE Resampling Loop
//!
//! Repeatedly partitions a fixed dataset into training and holdout rows, refits
//! one fixed OLS model form on the training rows, and records the coefficients,
//! the training R-squared and the holdout R-squared of every iteration.
//!
//! 1.  **Validation:** field references, split ratio and iteration count are all
//!     checked when the `Evaluator` is built, before anything is fitted.
//!
//! 2.  **Iteration:** iteration `i` (1-based) draws its partition from
//!     `seeds.seed_for(i)` alone. Sequential and parallel runs therefore produce
//!     bit-identical result tables.
//!
//! 3.  **Failure:** a rank-deficient training fit or an undefined holdout
//!     R-squared aborts the whole run with the offending iteration index.
//!     Skipping such iterations would quietly bias the sampling distribution.
//!
//! Holdout R-squared is the squared Pearson correlation between actual and
//! predicted holdout values, not `1 - RSS/TSS`.

use crate::data::Dataset;
use crate::design::{Design, ModelSpec, SpecError};
use crate::ols::{self, OlsError};
use crate::partition::{Partition, SeedSchedule, training_size};
use crate::progress::{IterationObserver, NoopObserver};
use crate::stats::{all_equal, squared_correlation};
use ndarray::Array1;
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;

/// Which holdout series made the correlation undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldoutSeries {
    Actual,
    Predicted,
}

impl fmt::Display for HoldoutSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Actual => "actual",
            Self::Predicted => "predicted",
        })
    }
}

/// Top-level error for a resampling run or a reference fit.
#[derive(Error, Debug)]
pub enum MutateError {
    #[error("Invalid model specification: {0}")]
    InvalidSpec(#[from] SpecError),

    #[error("Iteration {iteration}: the training fit failed: {source}")]
    Fit {
        iteration: usize,
        #[source]
        source: OlsError,
    },

    #[error(
        "Iteration {iteration}: holdout R-squared is undefined because the {series} holdout values have zero variance."
    )]
    DegenerateHoldout {
        iteration: usize,
        series: HoldoutSeries,
    },

    #[error("The full-data reference fit failed: {0}")]
    ReferenceFit(#[source] OlsError),
}

impl MutateError {
    /// The iteration an error belongs to, if it arose inside the loop.
    pub fn iteration(&self) -> Option<usize> {
        match self {
            Self::Fit { iteration, .. } | Self::DegenerateHoldout { iteration, .. } => {
                Some(*iteration)
            }
            Self::InvalidSpec(_) | Self::ReferenceFit(_) => None,
        }
    }
}

/// Everything recorded about one iteration. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    /// 1-based iteration index.
    pub iteration: usize,
    /// The seed the partition was drawn from.
    pub seed: u64,
    pub n_train: usize,
    pub n_holdout: usize,
    /// Intercept first, then the design columns in predictor order.
    pub coefficients: Array1<f64>,
    pub train_r_squared: f64,
    pub holdout_r_squared: f64,
}

/// The ordered, read-only collection of iteration records of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    coefficient_names: Vec<String>,
    records: Vec<IterationRecord>,
}

impl ResultTable {
    pub(crate) fn new(coefficient_names: Vec<String>, records: Vec<IterationRecord>) -> Self {
        debug_assert!(
            records
                .iter()
                .all(|r| r.coefficients.len() == coefficient_names.len())
        );
        Self {
            coefficient_names,
            records,
        }
    }

    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The sampled values of one coefficient, in iteration order.
    pub fn coefficient(&self, index: usize) -> Array1<f64> {
        self.records
            .iter()
            .map(|r| r.coefficients[index])
            .collect()
    }

    pub fn train_r_squared(&self) -> Array1<f64> {
        self.records.iter().map(|r| r.train_r_squared).collect()
    }

    pub fn holdout_r_squared(&self) -> Array1<f64> {
        self.records.iter().map(|r| r.holdout_r_squared).collect()
    }
}

/// A validated resampling problem: a model bound to a dataset, plus the split
/// ratio and iteration count.
pub struct Evaluator<'a> {
    design: Design<'a>,
    split_ratio: f64,
    iterations: usize,
    n_train: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        dataset: &'a Dataset,
        spec: &ModelSpec,
        split_ratio: f64,
        iterations: usize,
    ) -> Result<Self, MutateError> {
        let design = Design::resolve(dataset, spec)?;

        if !(split_ratio > 0.0 && split_ratio < 1.0) {
            return Err(SpecError::SplitRatioOutOfRange(split_ratio).into());
        }
        if iterations == 0 {
            return Err(SpecError::ZeroIterations.into());
        }

        let n_rows = dataset.n_rows();
        let n_train = training_size(n_rows, split_ratio);
        if n_train == 0 || n_train >= n_rows {
            return Err(SpecError::EmptyPartition {
                split_ratio,
                n_rows,
                n_train,
                n_holdout: n_rows.saturating_sub(n_train),
            }
            .into());
        }
        if n_rows - n_train == 1 {
            return Err(SpecError::SingleHoldoutRow {
                split_ratio,
                n_rows,
            }
            .into());
        }
        if n_rows - n_train < 3 {
            log::warn!(
                "Only {} holdout rows per iteration; the correlation-based holdout R-squared is strongly biased upward at this size.",
                n_rows - n_train
            );
        }

        Ok(Self {
            design,
            split_ratio,
            iterations,
            n_train,
        })
    }

    pub fn coefficient_names(&self) -> &[String] {
        self.design.coefficient_names()
    }

    pub fn split_ratio(&self) -> f64 {
        self.split_ratio
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn n_train(&self) -> usize {
        self.n_train
    }

    pub fn n_holdout(&self) -> usize {
        self.design.n_rows() - self.n_train
    }

    /// Runs a single iteration with an explicit seed.
    pub fn evaluate_iteration(
        &self,
        iteration: usize,
        seed: u64,
    ) -> Result<IterationRecord, MutateError> {
        let partition = Partition::draw(self.design.n_rows(), self.n_train, seed);

        let x_train = self.design.matrix(&partition.train);
        let y_train = self.design.response(&partition.train);
        let fit = ols::fit(x_train.view(), y_train.view())
            .map_err(|source| MutateError::Fit { iteration, source })?;

        let x_holdout = self.design.matrix(&partition.holdout);
        let y_holdout = self.design.response(&partition.holdout);
        let predicted = fit.predict(x_holdout.view());
        let holdout_r_squared = match squared_correlation(y_holdout.view(), predicted.view()) {
            Some(value) => value,
            None => {
                let series = if all_equal(y_holdout.view()) {
                    HoldoutSeries::Actual
                } else {
                    HoldoutSeries::Predicted
                };
                return Err(MutateError::DegenerateHoldout { iteration, series });
            }
        };

        let record = IterationRecord {
            iteration,
            seed,
            n_train: partition.train.len(),
            n_holdout: partition.holdout.len(),
            coefficients: fit.coefficients().to_owned(),
            train_r_squared: fit.r_squared(),
            holdout_r_squared,
        };
        log::debug!(
            "Iteration {iteration} (seed {seed}): train R2 {:.4}, holdout R2 {:.4}",
            record.train_r_squared,
            record.holdout_r_squared
        );
        Ok(record)
    }

    /// Runs every iteration in order on the calling thread.
    pub fn run(&self, seeds: &dyn SeedSchedule) -> Result<ResultTable, MutateError> {
        self.run_observed(seeds, &NoopObserver)
    }

    pub fn run_observed(
        &self,
        seeds: &dyn SeedSchedule,
        observer: &dyn IterationObserver,
    ) -> Result<ResultTable, MutateError> {
        log::info!(
            "Starting {} sequential iterations ({} training / {} holdout rows each)",
            self.iterations,
            self.n_train,
            self.n_holdout()
        );
        observer.on_start(self.iterations);

        let mut records = Vec::with_capacity(self.iterations);
        for iteration in 1..=self.iterations {
            match self.evaluate_iteration(iteration, seeds.seed_for(iteration)) {
                Ok(record) => {
                    observer.on_iteration(&record);
                    records.push(record);
                }
                Err(e) => {
                    observer.on_finish();
                    return Err(e);
                }
            }
        }

        observer.on_finish();
        Ok(ResultTable::new(self.coefficient_names().to_vec(), records))
    }

    /// Runs the iterations on the rayon pool. Results land in iteration order
    /// and match `run` exactly; on failure the lowest failing iteration is
    /// reported.
    pub fn run_parallel(
        &self,
        seeds: &dyn SeedSchedule,
        observer: &dyn IterationObserver,
    ) -> Result<ResultTable, MutateError> {
        log::info!(
            "Starting {} parallel iterations on {} threads",
            self.iterations,
            rayon::current_num_threads()
        );
        observer.on_start(self.iterations);

        let outcomes: Vec<Result<IterationRecord, MutateError>> = (1..=self.iterations)
            .into_par_iter()
            .map(|iteration| {
                let outcome = self.evaluate_iteration(iteration, seeds.seed_for(iteration));
                if let Ok(record) = &outcome {
                    observer.on_iteration(record);
                }
                outcome
            })
            .collect();

        observer.on_finish();
        let records = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;
        Ok(ResultTable::new(self.coefficient_names().to_vec(), records))
    }
}

/// Validates the inputs and runs the resampling loop sequentially.
pub fn run(
    dataset: &Dataset,
    spec: &ModelSpec,
    split_ratio: f64,
    iterations: usize,
    seeds: &dyn SeedSchedule,
) -> Result<ResultTable, MutateError> {
    Evaluator::new(dataset, spec, split_ratio, iterations)?.run(seeds)
}
