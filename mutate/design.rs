//! Resolution of a model specification against a dataset schema, and
//! construction of OLS design matrices for arbitrary row subsets.
//!
//! The design always starts with an intercept column. Numeric predictors add one
//! column each; a categorical predictor with `L` levels adds `L - 1` treatment
//! indicators, using the levels of the full dataset so that every row subset
//! shares the same coefficient layout.

use crate::data::{Dataset, Factor, Field};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Name of the intercept coefficient.
pub const INTERCEPT: &str = "(Intercept)";

/// The fixed model form: a numeric target regressed on an ordered list of predictors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub target: String,
    pub predictors: Vec<String>,
}

impl ModelSpec {
    pub fn new<T: Into<String>, P: Into<String>>(
        target: T,
        predictors: impl IntoIterator<Item = P>,
    ) -> Self {
        Self {
            target: target.into(),
            predictors: predictors.into_iter().map(Into::into).collect(),
        }
    }

    /// Target followed by predictors, the full set of fields the model reads.
    pub fn fields(&self) -> Vec<String> {
        std::iter::once(self.target.clone())
            .chain(self.predictors.iter().cloned())
            .collect()
    }
}

/// Reasons a run is rejected before any fitting happens.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecError {
    #[error("The field '{0}' referenced by the model is not present in the dataset.")]
    UnknownField(String),
    #[error("The target field '{0}' must be numeric.")]
    NonNumericTarget(String),
    #[error("The model has no predictors.")]
    NoPredictors,
    #[error("The predictor '{0}' is listed more than once.")]
    DuplicatePredictor(String),
    #[error("The target '{0}' cannot also be a predictor.")]
    TargetAsPredictor(String),
    #[error("The categorical predictor '{0}' has a single level and cannot be estimated.")]
    SingleLevelFactor(String),
    #[error("The split ratio must lie strictly between 0 and 1, got {0}.")]
    SplitRatioOutOfRange(f64),
    #[error("The iteration count must be at least 1.")]
    ZeroIterations,
    #[error(
        "A split ratio of {split_ratio} over {n_rows} rows leaves {n_train} training and {n_holdout} holdout rows; both need at least one."
    )]
    EmptyPartition {
        split_ratio: f64,
        n_rows: usize,
        n_train: usize,
        n_holdout: usize,
    },
    #[error(
        "A split ratio of {split_ratio} over {n_rows} rows leaves a single holdout row; the holdout R-squared needs at least two."
    )]
    SingleHoldoutRow { split_ratio: f64, n_rows: usize },
}

enum Term<'a> {
    Numeric(&'a Array1<f64>),
    Categorical(&'a Factor),
}

impl Term<'_> {
    fn width(&self) -> usize {
        match self {
            Term::Numeric(_) => 1,
            Term::Categorical(factor) => factor.levels().len() - 1,
        }
    }
}

/// A model specification bound to the fields of one dataset.
pub struct Design<'a> {
    dataset: &'a Dataset,
    target: &'a Array1<f64>,
    terms: Vec<Term<'a>>,
    coefficient_names: Vec<String>,
}

impl<'a> Design<'a> {
    /// Checks every field reference up front so that no error can surface
    /// later from inside matrix construction.
    pub fn resolve(dataset: &'a Dataset, spec: &ModelSpec) -> Result<Self, SpecError> {
        let target = match dataset.field(&spec.target) {
            Some(Field::Numeric(values)) => values,
            Some(Field::Categorical(_)) => {
                return Err(SpecError::NonNumericTarget(spec.target.clone()));
            }
            None => return Err(SpecError::UnknownField(spec.target.clone())),
        };

        if spec.predictors.is_empty() {
            return Err(SpecError::NoPredictors);
        }

        let mut seen = HashSet::with_capacity(spec.predictors.len());
        let mut terms = Vec::with_capacity(spec.predictors.len());
        let mut coefficient_names = vec![INTERCEPT.to_string()];
        for name in &spec.predictors {
            if name == &spec.target {
                return Err(SpecError::TargetAsPredictor(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(SpecError::DuplicatePredictor(name.clone()));
            }
            match dataset.field(name) {
                Some(Field::Numeric(values)) => {
                    coefficient_names.push(name.clone());
                    terms.push(Term::Numeric(values));
                }
                Some(Field::Categorical(factor)) => {
                    if factor.levels().len() < 2 {
                        return Err(SpecError::SingleLevelFactor(name.clone()));
                    }
                    coefficient_names.extend(
                        factor.levels()[1..]
                            .iter()
                            .map(|level| format!("{name}{level}")),
                    );
                    terms.push(Term::Categorical(factor));
                }
                None => return Err(SpecError::UnknownField(name.clone())),
            }
        }

        Ok(Self {
            dataset,
            target,
            terms,
            coefficient_names,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.dataset.n_rows()
    }

    /// Coefficient names in design-column order, intercept first.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    pub fn n_coefficients(&self) -> usize {
        self.coefficient_names.len()
    }

    /// Builds the `[rows.len(), n_coefficients]` design matrix for the given rows.
    pub fn matrix(&self, rows: &[usize]) -> Array2<f64> {
        let mut x = Array2::zeros((rows.len(), self.n_coefficients()));
        x.column_mut(0).fill(1.0);

        let mut offset = 1;
        for term in &self.terms {
            match term {
                Term::Numeric(values) => {
                    for (i, &row) in rows.iter().enumerate() {
                        x[[i, offset]] = values[row];
                    }
                }
                Term::Categorical(factor) => {
                    let codes = factor.codes();
                    for (i, &row) in rows.iter().enumerate() {
                        // Code 0 is the baseline and has no indicator column.
                        if codes[row] > 0 {
                            x[[i, offset + codes[row] - 1]] = 1.0;
                        }
                    }
                }
            }
            offset += term.width();
        }
        x
    }

    /// The target values of the given rows.
    pub fn response(&self, rows: &[usize]) -> Array1<f64> {
        rows.iter().map(|&row| self.target[row]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn credit_rows() -> Dataset {
        Dataset::new(vec![
            (
                "Amount".to_string(),
                Field::numeric(vec![1169.0, 5951.0, 2096.0, 7882.0]),
            ),
            (
                "Duration".to_string(),
                Field::numeric(vec![6.0, 48.0, 12.0, 42.0]),
            ),
            (
                "Housing".to_string(),
                Field::categorical(&["own", "rent", "own", "free"]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn numeric_and_categorical_columns_are_laid_out_in_order() {
        let data = credit_rows();
        let spec = ModelSpec::new("Amount", ["Duration", "Housing"]);
        let design = Design::resolve(&data, &spec).unwrap();

        assert_eq!(
            design.coefficient_names(),
            &["(Intercept)", "Duration", "Housingown", "Housingrent"]
        );

        let x = design.matrix(&[3, 1, 0]);
        assert_eq!(
            x,
            array![
                [1.0, 42.0, 0.0, 0.0],
                [1.0, 48.0, 0.0, 1.0],
                [1.0, 6.0, 1.0, 0.0],
            ]
        );
        assert_eq!(design.response(&[3, 1, 0]), array![7882.0, 5951.0, 1169.0]);
    }

    #[test]
    fn all_numeric_model_has_one_coefficient_per_predictor_plus_intercept() {
        let data = credit_rows();
        let design = Design::resolve(&data, &ModelSpec::new("Amount", ["Duration"])).unwrap();
        assert_eq!(design.n_coefficients(), 2);
    }

    #[test]
    fn unknown_and_misplaced_fields_are_rejected() {
        let data = credit_rows();
        let cases = [
            (
                ModelSpec::new("Amount", ["Duration", "Savings"]),
                SpecError::UnknownField("Savings".to_string()),
            ),
            (
                ModelSpec::new("Loan", ["Duration"]),
                SpecError::UnknownField("Loan".to_string()),
            ),
            (
                ModelSpec::new("Housing", ["Duration"]),
                SpecError::NonNumericTarget("Housing".to_string()),
            ),
            (
                ModelSpec::new("Amount", Vec::<String>::new()),
                SpecError::NoPredictors,
            ),
            (
                ModelSpec::new("Amount", ["Duration", "Duration"]),
                SpecError::DuplicatePredictor("Duration".to_string()),
            ),
            (
                ModelSpec::new("Amount", ["Amount"]),
                SpecError::TargetAsPredictor("Amount".to_string()),
            ),
        ];
        for (spec, expected) in cases {
            match Design::resolve(&data, &spec) {
                Err(err) => assert_eq!(err, expected),
                Ok(_) => panic!("Expected {:?} for {:?}", expected, spec),
            }
        }
    }

    #[test]
    fn single_level_factor_is_rejected() {
        let data = Dataset::new(vec![
            ("y".to_string(), Field::numeric(vec![1.0, 2.0])),
            ("g".to_string(), Field::categorical(&["a", "a"])),
        ])
        .unwrap();
        let err = Design::resolve(&data, &ModelSpec::new("y", ["g"]))
            .err()
            .unwrap();
        assert_eq!(err, SpecError::SingleLevelFactor("g".to_string()));
    }
}
