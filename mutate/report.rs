//! Writers for the outputs of a run: the per-iteration table as TSV, the
//! summary as TOML, and a plain-text comparison table for the terminal.

use crate::evaluate::ResultTable;
use crate::reference::{CoefficientComparison, ReferenceFit};
use crate::summary::SummaryStats;
use itertools::Itertools;
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to write TSV table: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed to serialize summary to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// Writes one row per iteration: index, seed, partition sizes, every
/// coefficient, then both R-squared values.
pub fn write_iterations(table: &ResultTable, path: &Path) -> Result<(), ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let mut header = vec![
        "iteration".to_string(),
        "seed".to_string(),
        "n_train".to_string(),
        "n_holdout".to_string(),
    ];
    header.extend(table.coefficient_names().iter().cloned());
    header.push("train_r_squared".to_string());
    header.push("holdout_r_squared".to_string());
    writer.write_record(&header)?;

    for record in table.records() {
        let mut row = vec![
            record.iteration.to_string(),
            record.seed.to_string(),
            record.n_train.to_string(),
            record.n_holdout.to_string(),
        ];
        row.extend(record.coefficients.iter().map(|c| c.to_string()));
        row.push(record.train_r_squared.to_string());
        row.push(record.holdout_r_squared.to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    summary: &'a SummaryStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<&'a ReferenceFit>,
    comparison: &'a [CoefficientComparison],
}

/// Writes the summary, and optionally the reference fit and comparison, as TOML.
pub fn write_summary(
    summary: &SummaryStats,
    reference: Option<&ReferenceFit>,
    comparison: &[CoefficientComparison],
    path: &Path,
) -> Result<(), ReportError> {
    let document = SummaryDocument {
        summary,
        reference,
        comparison,
    };
    let toml_string = toml::to_string_pretty(&document)?;
    let mut file = BufWriter::new(fs::File::create(path)?);
    file.write_all(toml_string.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Renders the comparison as an aligned text table.
pub fn format_comparison(rows: &[CoefficientComparison]) -> String {
    let width = rows
        .iter()
        .map(|row| row.name.len())
        .chain(std::iter::once("coefficient".len()))
        .max()
        .unwrap_or(0);

    let header = format!(
        "{:<width$}  {:>12}  {:>12}  {:>12}  {:>12}  {:>8}",
        "coefficient", "full_est", "full_se", "mutate_mean", "mutate_sd", "sd/se"
    );
    let lines = rows.iter().map(|row| {
        format!(
            "{:<width$}  {:>12.4}  {:>12.4}  {:>12.4}  {:>12.4}  {:>8.3}",
            row.name,
            row.full_estimate,
            row.full_std_error,
            row.resampled_mean,
            row.resampled_sd,
            row.sd_ratio()
        )
    });
    std::iter::once(header).chain(lines).join("\n")
}

/// One-line description of an R-squared summary, e.g. for terminal output.
pub fn describe_r_squared(summary: &SummaryStats) -> String {
    format!(
        "train R2 {:.4} (sd {:.4}); holdout R2 {:.4} (sd {:.4}); mean gap {:+.4}",
        summary.train_r_squared.mean,
        summary.train_r_squared.sd,
        summary.holdout_r_squared.mean,
        summary.holdout_r_squared.sd,
        summary.mean_r_squared_gap
    )
}
