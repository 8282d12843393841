use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use twoview_features::{CorrespondenceSummary, SummaryError};

/// Error types for the record module.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// The summary line of a record is malformed.
    #[error("Invalid summary on line {line}: {source}")]
    Summary {
        /// One-based line number.
        line: usize,
        /// Underlying parse error.
        source: SummaryError,
    },

    /// A metric value could not be parsed.
    #[error("Invalid metric on line {line}, column {column}: {message}")]
    Metric {
        /// One-based line number.
        line: usize,
        /// Zero-based column index.
        column: usize,
        /// Parser message.
        message: String,
    },

    /// The input ends after a summary line.
    #[error("Summary on line {line} has no metrics line")]
    MissingMetrics {
        /// One-based line number of the summary.
        line: usize,
    },
}

/// One correspondence batch: its raw summary and a row of quality metrics.
///
/// Serialized as two lines, the summary first. Metrics are comma-separated and an
/// unavailable metric is an empty field.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Statistics of the correspondence set.
    pub summary: CorrespondenceSummary,
    /// Quality metrics, `None` where not available.
    pub metrics: Vec<Option<f64>>,
}

impl Record {
    /// Creates a record.
    pub fn new(summary: CorrespondenceSummary, metrics: Vec<Option<f64>>) -> Self {
        Self { summary, metrics }
    }

    /// The metrics line without a trailing newline.
    pub fn metrics_line(&self) -> String {
        self.metrics
            .iter()
            .map(|m| m.map(|v| v.to_string()).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary)?;
        write!(f, "{}", self.metrics_line())
    }
}

/// Parse a metrics line. Any number of columns is accepted.
pub fn parse_metrics_line(line: &str) -> Result<Vec<Option<f64>>, RecordError> {
    parse_metrics(line, 0)
}

/// Parse records from text. Blank lines between records are skipped.
pub fn parse_records(text: &str) -> Result<Vec<Record>, RecordError> {
    parse_lines(text.lines().map(|l| Ok(l.to_string())))
}

/// Read every record of a file.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>, RecordError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    parse_lines(reader.lines())
}

/// Write records to a file, replacing its content.
pub fn write_records(path: impl AsRef<Path>, records: &[Record]) -> Result<(), RecordError> {
    let file = File::create(path)?;
    write_to(file, records)
}

/// Append records to a file, creating it if needed.
pub fn append_records(path: impl AsRef<Path>, records: &[Record]) -> Result<(), RecordError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    write_to(file, records)
}

fn write_to(file: File, records: &[Record]) -> Result<(), RecordError> {
    let mut writer = BufWriter::new(file);
    for record in records {
        writeln!(writer, "{record}")?;
    }
    writer.flush()?;
    log::debug!("wrote {} records", records.len());
    Ok(())
}

fn parse_lines(
    lines: impl Iterator<Item = std::io::Result<String>>,
) -> Result<Vec<Record>, RecordError> {
    let mut records = Vec::new();
    let mut pending: Option<(usize, CorrespondenceSummary)> = None;

    for (i, line) in lines.enumerate() {
        let line = line?;
        let number = i + 1;
        // a blank line right after a summary is an empty metrics line
        if pending.is_none() && line.trim().is_empty() {
            continue;
        }
        match pending.take() {
            None => {
                let summary = line
                    .parse::<CorrespondenceSummary>()
                    .map_err(|source| RecordError::Summary {
                        line: number,
                        source,
                    })?;
                pending = Some((number, summary));
            }
            Some((_, summary)) => {
                records.push(Record::new(summary, parse_metrics(&line, number)?));
            }
        }
    }

    if let Some((line, _)) = pending {
        return Err(RecordError::MissingMetrics { line });
    }
    Ok(records)
}

fn parse_metrics(line: &str, number: usize) -> Result<Vec<Option<f64>>, RecordError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    line.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(column, field)| {
            if field.is_empty() {
                return Ok(None);
            }
            field
                .parse::<f64>()
                .map(Some)
                .map_err(|e| RecordError::Metric {
                    line: number,
                    column,
                    message: format!("{field}: {e}"),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use twoview_geometry::Correspondence;

    fn sample_summary(shift: f64) -> CorrespondenceSummary {
        CorrespondenceSummary::compute(&[
            Correspondence::new(10.0, 20.0, 12.0 + shift, 25.0),
            Correspondence::new(320.5, 200.25, 300.0, 210.0 - shift),
        ])
    }

    #[test]
    fn test_metrics_line() -> Result<(), RecordError> {
        let record = Record::new(
            sample_summary(0.0),
            vec![Some(1.5), None, Some(-2.0), Some(f64::INFINITY)],
        );
        assert_eq!(record.metrics_line(), "1.5,,-2,inf");
        assert_eq!(
            parse_metrics_line("1.5,,-2,inf")?,
            vec![Some(1.5), None, Some(-2.0), Some(f64::INFINITY)]
        );
        assert!(parse_metrics_line("")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_nan_metric() -> Result<(), RecordError> {
        let metrics = parse_metrics_line("NaN,3")?;
        assert!(metrics[0].is_some_and(f64::is_nan));
        assert_eq!(metrics[1], Some(3.0));
        Ok(())
    }

    #[test]
    fn test_parse_records_skips_blank_lines() -> Result<(), RecordError> {
        let a = Record::new(sample_summary(0.0), vec![Some(1.0), Some(2.0)]);
        let b = Record::new(sample_summary(3.0), vec![None, Some(4.0), Some(5.0)]);
        let text = format!("{a}\n\n{b}\n\n");
        let records = parse_records(&text)?;
        assert_eq!(records, vec![a, b]);

        let empty = Record::new(sample_summary(0.0), Vec::new());
        assert_eq!(parse_records(&format!("{empty}\n"))?, vec![empty]);
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let a = Record::new(sample_summary(0.0), vec![Some(1.0)]);

        let res = parse_records(&a.summary.to_string());
        assert!(matches!(res, Err(RecordError::MissingMetrics { line: 1 })));

        let res = parse_records("1,2,3\n4");
        assert!(matches!(res, Err(RecordError::Summary { line: 1, .. })));

        let res = parse_records(&format!("{}\n1.0,x", a.summary));
        assert!(matches!(
            res,
            Err(RecordError::Metric {
                line: 2,
                column: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_append_and_read() -> Result<(), RecordError> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("records.csv");

        let a = Record::new(sample_summary(0.0), vec![Some(0.25); 9]);
        let b = Record::new(sample_summary(1.0), vec![None; 3]);

        append_records(&path, &[a.clone()])?;
        append_records(&path, &[b.clone()])?;
        assert_eq!(read_records(&path)?, vec![a.clone(), b]);

        write_records(&path, &[a.clone()])?;
        assert_eq!(read_records(&path)?, vec![a]);
        Ok(())
    }
}
