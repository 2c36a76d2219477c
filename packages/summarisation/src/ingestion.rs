//! Source dataset loading.
//!
//! Reads the consultation responses CSV into a normalized in-memory
//! structure, deduplicating repeated headers, and loads the optional
//! question-to-section mapping file.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::processing::clean_text;
use crate::types::record::{ColumnSpec, ConsultationData};

/// Load the consultation CSV into a normalized in-memory structure.
///
/// Duplicate headers get `__N` suffixes and short rows are padded so every
/// row exposes a value for every column.
pub fn load_consultation_csv(path: &Path) -> IngestResult<ConsultationData> {
    if !path.exists() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut records = reader.records();
    let header_row = match records.next() {
        Some(row) => row?,
        None => return Err(IngestError::EmptyDataset),
    };

    let headers: Vec<String> = header_row.iter().map(|h| h.to_string()).collect();
    let columns = build_columns(&headers);

    let mut rows = Vec::new();
    for row in records {
        let row = row?;
        let values: Vec<&str> = row.iter().collect();
        let mapped: HashMap<String, String> = columns
            .iter()
            .map(|col| {
                (
                    col.unique_name.clone(),
                    values
                        .get(col.index)
                        .map(|v| v.trim().to_string())
                        .unwrap_or_default(),
                )
            })
            .collect();
        rows.push(mapped);
    }

    debug!(
        path = %path.display(),
        columns = columns.len(),
        rows = rows.len(),
        "consultation CSV loaded"
    );

    Ok(ConsultationData { columns, rows })
}

/// Create unique column specs from raw headers.
fn build_columns(raw_headers: &[String]) -> Vec<ColumnSpec> {
    let mut name_counts: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::with_capacity(raw_headers.len());

    for (index, raw_name) in raw_headers.iter().enumerate() {
        let normalized = clean_text(raw_name);
        let count = name_counts.entry(normalized.clone()).or_insert(0);
        *count += 1;

        let unique_name = if *count == 1 {
            normalized.clone()
        } else {
            format!("{}__{}", normalized, count)
        };

        columns.push(ColumnSpec {
            unique_name,
            raw_name: normalized,
            index,
        });
    }

    columns
}

/// Load the question-to-section mapping and align it with the CSV columns.
///
/// The mapping file is a two-column CSV (question header, section name) with
/// one header row. Preferred alignment uses row order, which is expected to
/// mirror the survey header order; a header+occurrence fallback applies when
/// row-order validation fails. A missing or unreadable file yields an empty
/// mapping rather than an error.
pub fn load_section_mapping(columns: &[ColumnSpec], path: Option<&Path>) -> HashMap<usize, String> {
    let Some(path) = path else {
        return HashMap::new();
    };
    if !path.exists() {
        return HashMap::new();
    }

    let rows = match read_mapping_rows(path) {
        Ok(rows) => rows,
        Err(_) => return HashMap::new(),
    };

    if rows.len() <= 1 {
        return HashMap::new();
    }
    let data_rows = &rows[1..];

    let mapping = align_sections_by_index(columns, data_rows);
    if !mapping.is_empty() {
        return mapping;
    }

    align_sections_by_header_occurrence(columns, data_rows)
}

fn read_mapping_rows(path: &Path) -> IngestResult<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        rows.push(row.iter().map(|v| v.to_string()).collect());
    }
    Ok(rows)
}

/// Align section mapping by strict row order and exact header match.
fn align_sections_by_index(
    columns: &[ColumnSpec],
    data_rows: &[Vec<String>],
) -> HashMap<usize, String> {
    if data_rows.len() < columns.len() {
        return HashMap::new();
    }

    let mut mapping = HashMap::new();
    for (col, row) in columns.iter().zip(data_rows.iter()) {
        let mapped_question = clean_text(row.first().map(String::as_str).unwrap_or(""));
        if mapped_question != clean_text(&col.raw_name) {
            return HashMap::new();
        }

        let section = clean_text(row.get(1).map(String::as_str).unwrap_or(""));
        if !section.is_empty() {
            mapping.insert(col.index, section);
        }
    }

    mapping
}

/// Fallback alignment keyed by `(header_text, occurrence_number)`.
fn align_sections_by_header_occurrence(
    columns: &[ColumnSpec],
    data_rows: &[Vec<String>],
) -> HashMap<usize, String> {
    let mut occ_map: HashMap<(String, usize), String> = HashMap::new();
    let mut row_occ: HashMap<String, usize> = HashMap::new();

    for row in data_rows {
        let question = clean_text(row.first().map(String::as_str).unwrap_or(""));
        let section = clean_text(row.get(1).map(String::as_str).unwrap_or(""));
        if question.is_empty() {
            continue;
        }
        let occurrence = row_occ.entry(question.clone()).or_insert(0);
        *occurrence += 1;
        occ_map.insert((question, *occurrence), section);
    }

    let mut out = HashMap::new();
    let mut col_occ: HashMap<String, usize> = HashMap::new();
    for col in columns {
        let question = clean_text(&col.raw_name);
        let occurrence = col_occ.entry(question.clone()).or_insert(0);
        *occurrence += 1;

        if let Some(section) = occ_map.get(&(question, *occurrence)) {
            if !section.is_empty() {
                out.insert(col.index, section.clone());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "summarisation_test_{}_{}",
            std::process::id(),
            name
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv_deduplicates_headers() {
        let path = write_temp(
            "dedup.csv",
            "Response ID,Answer,Answer\nR1,first,second\n",
        );
        let data = load_consultation_csv(&path).unwrap();

        assert_eq!(data.columns.len(), 3);
        assert_eq!(data.columns[1].unique_name, "Answer");
        assert_eq!(data.columns[2].unique_name, "Answer__2");
        assert_eq!(data.rows[0].get("Answer__2").unwrap(), "second");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_csv_pads_short_rows() {
        let path = write_temp("pad.csv", "A,B,C\nonly-one\n");
        let data = load_consultation_csv(&path).unwrap();

        assert_eq!(data.rows[0].get("A").unwrap(), "only-one");
        assert_eq!(data.rows[0].get("C").unwrap(), "");

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_consultation_csv(Path::new("/nonexistent/data.csv"));
        assert!(matches!(result, Err(IngestError::FileNotFound { .. })));
    }

    #[test]
    fn test_section_mapping_by_row_order() {
        let columns = vec![
            ColumnSpec {
                unique_name: "Q A".to_string(),
                raw_name: "Q A".to_string(),
                index: 0,
            },
            ColumnSpec {
                unique_name: "Q B".to_string(),
                raw_name: "Q B".to_string(),
                index: 1,
            },
        ];
        let path = write_temp(
            "mapping.csv",
            "Question,Section\nQ A,First Section\nQ B,Second Section\n",
        );

        let mapping = load_section_mapping(&columns, Some(&path));
        assert_eq!(mapping.get(&0).map(String::as_str), Some("First Section"));
        assert_eq!(mapping.get(&1).map(String::as_str), Some("Second Section"));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_section_mapping_occurrence_fallback() {
        // Row order does not mirror the columns, so the occurrence
        // alignment has to kick in.
        let columns = vec![
            ColumnSpec {
                unique_name: "Q B".to_string(),
                raw_name: "Q B".to_string(),
                index: 0,
            },
            ColumnSpec {
                unique_name: "Q A".to_string(),
                raw_name: "Q A".to_string(),
                index: 1,
            },
        ];
        let path = write_temp(
            "mapping_occ.csv",
            "Question,Section\nQ A,First Section\nQ B,Second Section\n",
        );

        let mapping = load_section_mapping(&columns, Some(&path));
        assert_eq!(mapping.get(&0).map(String::as_str), Some("Second Section"));
        assert_eq!(mapping.get(&1).map(String::as_str), Some("First Section"));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_mapping_file_is_empty() {
        let mapping = load_section_mapping(&[], Some(Path::new("/nonexistent/mapping.csv")));
        assert!(mapping.is_empty());
    }
}
