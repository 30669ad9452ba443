//! # Dataset Loading and Validation Module
//!
//! This module is the entry point for user-provided data. It reads a delimited
//! text file, validates the columns a model needs, and turns them into the
//! immutable in-memory `Dataset` consumed by the resampling core.
//!
//! - Typed Fields: every column becomes either a numeric `f64` vector or a
//!   categorical factor. Text columns are categorical; numeric columns can be
//!   forced to categorical by name.
//! - User-Centric Errors: failures are assumed to be input errors and the
//!   `DataError` enum says which column is at fault.
//! - Projection: only the columns that were asked for are extracted, so
//!   unrelated columns with missing values do not block a run.

use natord::compare;
use ndarray::{Array1, ArrayView1};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// A categorical column stored as integer codes into a sorted level list.
///
/// The first level is the baseline of treatment coding.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    levels: Vec<String>,
    codes: Vec<usize>,
}

impl Factor {
    /// Builds a factor from raw labels. Levels are in natural order, so digit
    /// runs compare by value ("2" before "10", "job2" before "job10").
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut levels: Vec<String> = labels
            .iter()
            .map(|label| label.as_ref().to_string())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort_by(|a, b| compare(a, b).then_with(|| a.cmp(b)));
        let index: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .map(|(code, level)| (level.as_str(), code))
            .collect();
        let codes = labels.iter().map(|label| index[label.as_ref()]).collect();
        Self { levels, codes }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// The level label of a given row.
    pub fn label(&self, row: usize) -> &str {
        &self.levels[self.codes[row]]
    }
}

/// One column of a `Dataset`.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Numeric(Array1<f64>),
    Categorical(Factor),
}

impl Field {
    pub fn numeric(values: Vec<f64>) -> Self {
        Field::Numeric(Array1::from_vec(values))
    }

    pub fn categorical<S: AsRef<str>>(labels: &[S]) -> Self {
        Field::Categorical(Factor::from_labels(labels))
    }

    pub fn len(&self) -> usize {
        match self {
            Field::Numeric(values) => values.len(),
            Field::Categorical(factor) => factor.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Field::Numeric(_) => "numeric",
            Field::Categorical(_) => "categorical",
        }
    }
}

/// An immutable, validated in-memory table.
#[derive(Debug, Clone)]
pub struct Dataset {
    names: Vec<String>,
    fields: Vec<Field>,
    n_rows: usize,
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("The dataset contains no rows.")]
    EmptyDataset,
    #[error("The field '{0}' appears more than once in the dataset.")]
    DuplicateField(String),
    #[error("The field '{field}' has {found} rows, but the dataset has {expected}.")]
    LengthMismatch {
        field: String,
        found: usize,
        expected: usize,
    },
}

impl Dataset {
    /// Assembles a dataset from named fields, checking that it is non-empty,
    /// rectangular, uniquely named and finite.
    pub fn new(columns: Vec<(String, Field)>) -> Result<Self, DataError> {
        let n_rows = match columns.first() {
            Some((_, field)) if !field.is_empty() => field.len(),
            _ => return Err(DataError::EmptyDataset),
        };

        let mut seen = HashSet::with_capacity(columns.len());
        for (name, field) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(DataError::DuplicateField(name.clone()));
            }
            if field.len() != n_rows {
                return Err(DataError::LengthMismatch {
                    field: name.clone(),
                    found: field.len(),
                    expected: n_rows,
                });
            }
            if let Field::Numeric(values) = field {
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(DataError::NonFiniteValuesFound(name.clone()));
                }
            }
        }

        let (names, fields): (Vec<String>, Vec<Field>) = columns.into_iter().unzip();
        Ok(Self {
            names,
            fields,
            n_rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn field_names(&self) -> &[String] {
        &self.names
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| &self.fields[index])
    }

    /// A view of a numeric field, or `None` if the field is absent or categorical.
    pub fn numeric(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        match self.field(name)? {
            Field::Numeric(values) => Some(values.view()),
            Field::Categorical(_) => None,
        }
    }
}

/// Options controlling how a delimited file is turned into a `Dataset`.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Field separator byte, `b','` for CSV or `b'\t'` for TSV.
    pub separator: u8,
    /// Columns to extract, in order. Every one of them must exist.
    pub columns: Vec<String>,
    /// Columns that are read as categorical even when they parse as numbers.
    pub categorical: Vec<String>,
}

/// Loads the requested columns of a delimited file into a `Dataset`.
pub fn load_dataset(path: &str, options: &LoadOptions) -> Result<Dataset, DataError> {
    log::info!("Loading data from '{path}'");

    let df = CsvReader::new(File::open(Path::new(path))?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(None)
                .with_parse_options(
                    CsvParseOptions::default().with_separator(options.separator),
                ),
        )
        .finish()?;

    log::info!(
        "Read {} rows and {} columns from '{path}'",
        df.height(),
        df.width()
    );

    internal::dataset_from_frame(&df, options)
}

/// Internal module for converting a Polars frame into typed fields.
mod internal {
    use super::*;

    pub(super) fn dataset_from_frame(
        df: &DataFrame,
        options: &LoadOptions,
    ) -> Result<Dataset, DataError> {
        let available: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        for name in &options.columns {
            if !available.contains(name) {
                return Err(DataError::ColumnNotFound(name.clone()));
            }
        }

        let forced: HashSet<&str> = options.categorical.iter().map(|s| s.as_str()).collect();
        let mut columns = Vec::with_capacity(options.columns.len());
        for name in &options.columns {
            let field = if forced.contains(name.as_str())
                || matches!(df.column(name)?.dtype(), DataType::String)
            {
                Field::Categorical(Factor::from_labels(&extract_text_column(df, name)?))
            } else {
                Field::numeric(extract_numeric_column(df, name)?)
            };
            log::debug!("Column '{name}' loaded as {}", field.kind());
            columns.push((name.clone(), field));
        }

        Dataset::new(columns)
    }

    fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = match series.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };

        if casted.null_count() > 0 {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }

        let chunked = casted.f64()?.rechunk();
        let values: Vec<f64> = chunked.into_no_null_iter().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(values)
    }

    fn extract_text_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = match series.cast(&DataType::String) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "text (categorical)",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };

        let chunked = casted.str()?.rechunk();
        Ok(chunked
            .into_no_null_iter()
            .map(|label| label.to_string())
            .collect())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::NamedTempFile;

    fn create_test_file(content: &str) -> io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    fn options(columns: &[&str], categorical: &[&str]) -> LoadOptions {
        LoadOptions {
            separator: b',',
            columns: columns.iter().map(|s| s.to_string()).collect(),
            categorical: categorical.iter().map(|s| s.to_string()).collect(),
        }
    }

    const CREDIT_SAMPLE: &str = "Amount,Duration,Age,Housing,Job,Notes\n\
        1169,6,67,own,2,\n\
        5951,48,22,own,2,late\n\
        2096,12,49,own,1,\n\
        7882,42,45,free,2,\n\
        4870,24,53,free,2,";

    #[test]
    fn factor_levels_are_sorted_and_coded() {
        let factor = Factor::from_labels(&["rent", "own", "free", "own"]);
        assert_eq!(factor.levels(), &["free", "own", "rent"]);
        assert_eq!(factor.codes(), &[2, 1, 0, 1]);
        assert_eq!(factor.label(3), "own");
    }

    #[test]
    fn numeric_codes_forced_to_factor_keep_numeric_order() {
        let factor = Factor::from_labels(&["10", "2", "1", "2", "11"]);
        assert_eq!(factor.levels(), &["1", "2", "10", "11"]);
        assert_eq!(factor.codes(), &[2, 1, 0, 1, 3]);
    }

    #[test]
    fn dataset_rejects_mismatched_lengths() {
        let err = Dataset::new(vec![
            ("x".to_string(), Field::numeric(vec![1.0, 2.0, 3.0])),
            ("y".to_string(), Field::numeric(vec![1.0, 2.0])),
        ])
        .unwrap_err();
        match err {
            DataError::LengthMismatch {
                field,
                found,
                expected,
            } => {
                assert_eq!(field, "y");
                assert_eq!(found, 2);
                assert_eq!(expected, 3);
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn dataset_rejects_duplicates_and_empty_input() {
        assert!(matches!(
            Dataset::new(Vec::new()),
            Err(DataError::EmptyDataset)
        ));
        let err = Dataset::new(vec![
            ("x".to_string(), Field::numeric(vec![1.0])),
            ("x".to_string(), Field::numeric(vec![2.0])),
        ])
        .unwrap_err();
        assert!(matches!(err, DataError::DuplicateField(name) if name == "x"));
    }

    #[test]
    fn dataset_rejects_non_finite_numeric_values() {
        let err = Dataset::new(vec![(
            "x".to_string(),
            Field::numeric(vec![1.0, f64::NAN]),
        )])
        .unwrap_err();
        assert!(matches!(err, DataError::NonFiniteValuesFound(name) if name == "x"));
    }

    #[test]
    fn load_projects_and_types_requested_columns() {
        let file = create_test_file(CREDIT_SAMPLE).unwrap();
        let data = load_dataset(
            file.path().to_str().unwrap(),
            &options(&["Amount", "Duration", "Housing", "Job"], &["Job"]),
        )
        .unwrap();

        assert_eq!(data.n_rows(), 5);
        assert_eq!(data.field_names(), &["Amount", "Duration", "Housing", "Job"]);
        assert_abs_diff_eq!(data.numeric("Amount").unwrap()[1], 5951.0, epsilon = 1e-12);
        assert_abs_diff_eq!(data.numeric("Duration").unwrap()[4], 24.0, epsilon = 1e-12);

        match data.field("Housing") {
            Some(Field::Categorical(factor)) => {
                assert_eq!(factor.levels(), &["free", "own"]);
                assert_eq!(factor.label(0), "own");
            }
            other => panic!("Expected categorical Housing, got {:?}", other),
        }
        match data.field("Job") {
            Some(Field::Categorical(factor)) => assert_eq!(factor.levels(), &["1", "2"]),
            other => panic!("Expected categorical Job, got {:?}", other),
        }
        // The sparse Notes column is never touched.
        assert!(data.field("Notes").is_none());
    }

    #[test]
    fn load_reports_missing_column() {
        let file = create_test_file(CREDIT_SAMPLE).unwrap();
        let err = load_dataset(
            file.path().to_str().unwrap(),
            &options(&["Amount", "Savings"], &[]),
        )
        .unwrap_err();
        match err {
            DataError::ColumnNotFound(col) => assert_eq!(col, "Savings"),
            other => panic!("Expected ColumnNotFound, got {:?}", other),
        }
    }

    #[test]
    fn load_reports_missing_values() {
        let file = create_test_file("Amount,Age\n100,20\n,30\n300,40").unwrap();
        let err = load_dataset(file.path().to_str().unwrap(), &options(&["Amount"], &[]))
            .unwrap_err();
        match err {
            DataError::MissingValuesFound(col) => assert_eq!(col, "Amount"),
            other => panic!("Expected MissingValuesFound, got {:?}", other),
        }
    }

    #[test]
    fn load_reads_tab_separated_files() {
        let file = create_test_file("y\tx\n1.5\t1\n2.5\t2\n3.5\t3").unwrap();
        let data = load_dataset(
            file.path().to_str().unwrap(),
            &LoadOptions {
                separator: b'\t',
                columns: vec!["y".to_string(), "x".to_string()],
                categorical: Vec::new(),
            },
        )
        .unwrap();
        assert_eq!(data.n_rows(), 3);
        assert_abs_diff_eq!(data.numeric("y").unwrap()[2], 3.5, epsilon = 1e-12);
    }
}
