//! Delimited text input and output
//!
//! Readers detect tab or comma from the header line. Writers use commas for
//! `.csv` paths and tabs otherwise; missing values are written as `NA`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use ndarray::Array2;

use super::results::LimmaResults;
use crate::annotate::AnnotatedDeg;
use crate::data::{AnnotationRecord, AnnotationTable, ExpressionMatrix, RawIntensities};
use crate::error::{LimmaError, Result};
use crate::lm::DesignMatrix;

/// Tokens read as a missing value
const MISSING: [&str; 4] = ["", "NA", "NaN", "null"];

/// Detect the field delimiter from the first non-empty line
fn detect_delimiter(path: &Path) -> Result<u8> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        return Ok(if line.contains('\t') { b'\t' } else { b',' });
    }
    Err(LimmaError::EmptyData {
        reason: format!("{} is empty", path.display()),
    })
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>> {
    let delimiter = detect_delimiter(path)?;
    Ok(ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)?)
}

fn output_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    }
}

fn open_writer(path: &Path) -> Result<csv::Writer<File>> {
    Ok(WriterBuilder::new()
        .delimiter(output_delimiter(path))
        .from_path(path)?)
}

/// Format a statistic; NaN becomes `NA`
fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else if v.is_infinite() {
        if v > 0.0 {
            "Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else {
        format!("{:.6}", v)
    }
}

/// Format a probability in scientific notation; NaN becomes `NA`
fn fmt_pvalue(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.6e}", v)
    }
}

fn fmt_opt(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("NA")
}

fn parse_intensity(field: &str, probe: &str, sample: &str) -> Result<f64> {
    field.parse::<f64>().map_err(|_| LimmaError::MalformedInput {
        reason: format!(
            "Invalid intensity '{}' for probe '{}' in sample '{}'",
            field, probe, sample
        ),
    })
}

/// Read a raw intensity matrix: first column probe ids, header row sample ids
pub fn read_intensity_matrix<P: AsRef<Path>>(path: P) -> Result<RawIntensities> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;

    let header = reader.headers()?.clone();
    if header.len() < 2 {
        return Err(LimmaError::MalformedInput {
            reason: "Intensity header needs a probe id column and at least one sample".to_string(),
        });
    }
    let sample_ids: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
    let n_samples = sample_ids.len();

    let mut probe_ids: Vec<String> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut record = StringRecord::new();
    while reader.read_record(&mut record)? {
        if record.len() != n_samples + 1 {
            return Err(LimmaError::MalformedInput {
                reason: format!(
                    "Row {} has {} columns, expected {}",
                    probe_ids.len() + 2,
                    record.len(),
                    n_samples + 1
                ),
            });
        }
        let probe = record[0].to_string();
        for (j, field) in record.iter().skip(1).enumerate() {
            values.push(parse_intensity(field, &probe, &sample_ids[j])?);
        }
        probe_ids.push(probe);
    }

    if probe_ids.is_empty() {
        return Err(LimmaError::EmptyData {
            reason: format!("No probes found in {}", path.display()),
        });
    }

    let intensities = Array2::from_shape_vec((probe_ids.len(), n_samples), values).map_err(|e| {
        LimmaError::MalformedInput {
            reason: e.to_string(),
        }
    })?;

    log::info!(
        "Read {} probes x {} samples from {}",
        probe_ids.len(),
        n_samples,
        path.display()
    );
    RawIntensities::new(intensities, probe_ids, sample_ids)
}

/// Read a two-column probe to feature mapping (header row required)
pub fn read_probe_map<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let mut map = HashMap::new();

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() < 2 {
            return Err(LimmaError::MalformedInput {
                reason: format!("Probe map row {} needs a probe id and a feature id", row + 2),
            });
        }
        let probe = record[0].to_string();
        let feature = record[1].to_string();
        if MISSING.contains(&feature.as_str()) {
            continue;
        }
        if let Some(previous) = map.insert(probe.clone(), feature.clone()) {
            if previous != feature {
                return Err(LimmaError::MalformedInput {
                    reason: format!(
                        "Probe '{}' maps to both '{}' and '{}'",
                        probe, previous, feature
                    ),
                });
            }
        }
    }

    log::info!("Read {} probe mappings from {}", map.len(), path.display());
    Ok(map)
}

fn normalize_missing(value: Option<String>) -> Option<String> {
    value.filter(|v| !MISSING.contains(&v.as_str()))
}

/// Read an annotation table keyed by feature id
///
/// Column names follow [`AnnotationRecord`] (or the PROBEID / SYMBOL /
/// ENTREZID / GENENAME aliases); missing values read as empty fields.
pub fn read_annotation<P: AsRef<Path>>(path: P) -> Result<AnnotationTable> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;

    let mut records = Vec::new();
    for result in reader.deserialize() {
        let mut record: AnnotationRecord = result?;
        record.gene_symbol = normalize_missing(record.gene_symbol);
        record.entrez_id = normalize_missing(record.entrez_id);
        record.description = normalize_missing(record.description);
        records.push(record);
    }

    let table = AnnotationTable::new(records);
    let duplicated = table.duplicated_keys().len();
    log::info!(
        "Read {} annotation rows from {} ({} keys duplicated)",
        table.len(),
        path.display(),
        duplicated
    );
    Ok(table)
}

const RESULT_HEADER: [&str; 14] = [
    "feature_id",
    "logFC",
    "AveExpr",
    "t",
    "P.Value",
    "adj.P.Val",
    "B",
    "SE",
    "raw_t",
    "sigma2",
    "s2_post",
    "df_total",
    "status",
    "contrast",
];

/// Write a results table (full or DEG subset), one row per feature in table order
pub fn write_results<P: AsRef<Path>>(path: P, results: &LimmaResults) -> Result<()> {
    let path = path.as_ref();
    let mut writer = open_writer(path)?;
    writer.write_record(RESULT_HEADER)?;

    let contrast = results.contrast.describe();
    for i in 0..results.n_features() {
        let record = vec![
            results.feature_ids[i].clone(),
            fmt_value(results.log_fc[i]),
            fmt_value(results.ave_expr[i]),
            fmt_value(results.t[i]),
            fmt_pvalue(results.p_values[i]),
            fmt_pvalue(results.adj_p_values[i]),
            fmt_value(results.b[i]),
            fmt_value(results.std_error[i]),
            fmt_value(results.raw_t[i]),
            fmt_value(results.sigma2[i]),
            fmt_value(results.s2_post[i]),
            fmt_value(results.df_total[i]),
            results.status[i].as_str().to_string(),
            contrast.clone(),
        ];
        writer.write_record(&record)?;
    }
    writer.flush()?;

    log::info!("Wrote {} rows to {}", results.n_features(), path.display());
    Ok(())
}

/// Write annotated DEG rows
pub fn write_annotated<P: AsRef<Path>>(path: P, rows: &[AnnotatedDeg]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = open_writer(path)?;
    writer.write_record([
        "feature_id",
        "SYMBOL",
        "ENTREZID",
        "GENENAME",
        "logFC",
        "AveExpr",
        "t",
        "P.Value",
        "adj.P.Val",
        "B",
    ])?;

    for row in rows {
        let record = vec![
            row.feature_id.clone(),
            fmt_opt(&row.gene_symbol).to_string(),
            fmt_opt(&row.entrez_id).to_string(),
            fmt_opt(&row.description).to_string(),
            fmt_value(row.log_fc),
            fmt_value(row.ave_expr),
            fmt_value(row.t),
            fmt_pvalue(row.p_value),
            fmt_pvalue(row.adj_p_value),
            fmt_value(row.b),
        ];
        writer.write_record(&record)?;
    }
    writer.flush()?;

    log::info!("Wrote {} annotated rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write a log2 expression matrix: features as rows, samples as columns
pub fn write_expression<P: AsRef<Path>>(path: P, expr: &ExpressionMatrix) -> Result<()> {
    let path = path.as_ref();
    let mut writer = open_writer(path)?;

    let mut header = vec!["feature_id".to_string()];
    header.extend(expr.sample_ids().iter().cloned());
    writer.write_record(&header)?;

    for (i, feature_id) in expr.feature_ids().iter().enumerate() {
        let mut record = vec![feature_id.clone()];
        record.extend(expr.feature(i).iter().map(|&v| fmt_value(v)));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    log::info!(
        "Wrote expression matrix ({} features x {} samples) to {}",
        expr.n_features(),
        expr.n_samples(),
        path.display()
    );
    Ok(())
}

/// Write a design matrix as tab-separated text: sample, group, one column per group
pub fn write_design<W: Write>(out: W, design: &DesignMatrix) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(out);

    let mut header = vec!["sample".to_string(), "group".to_string()];
    header.extend(design.column_names().iter().map(|s| s.to_string()));
    writer.write_record(&header)?;

    let matrix = design.matrix();
    for (i, sample) in design.samples().iter().enumerate() {
        let mut record = vec![sample.id.clone(), sample.group.clone()];
        record.extend(matrix.row(i).iter().map(|v| format!("{}", v)));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
