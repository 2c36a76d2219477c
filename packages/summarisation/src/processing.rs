//! Dataset preprocessing: question inference and record assembly.
//!
//! Turns the flat survey column list into logical questions (primary answer
//! column plus attached free-text supplements) and builds one response
//! record per organisation per answered question.

use std::collections::{BTreeMap, HashMap};

use crate::error::{IngestError, IngestResult, SummariseError};
use crate::types::record::{
    ColumnSpec, ConsultationData, OrganisationCatalog, PreparedData, QuestionDefinition,
    QuestionSlice, ResponseRecord,
};

const SECTION_MARKERS: &[&str] = &["Strategic Investment Need", "Overall"];

const SUPPLEMENT_PREFIXES: &[&str] = &["if ", "please provide", "if not", "if you"];

const CATEGORICAL_HINTS: &[&str] = &[
    "strongly agree",
    "somewhat agree",
    "neither agree nor disagree",
    "somewhat disagree",
    "strongly disagree",
    "yes",
    "no",
    "maybe",
    "agree",
    "disagree",
    "neutral",
    "no comment",
];

const RESPONSE_ID_HEADER: &str = "Response ID";
const ORG_NAME_HEADER: &str = "4. What is your organisation name?";
const ORG_TYPE_HEADER: &str =
    "6. Which category best describes your organisation? (Select all that apply) - Selected Choice";
const REGION_HEADER: &str =
    "7. Which Nation or Region are you / your organisation located in, or interested in?";

/// Transform raw CSV structures into normalized questions and records.
pub fn prepare_data(
    consultation_data: ConsultationData,
    excerpt_chars: usize,
    section_by_index: &HashMap<usize, String>,
) -> IngestResult<PreparedData> {
    let questions = build_question_definitions(&consultation_data.columns, section_by_index);
    let response_records = build_response_records(&consultation_data, &questions, excerpt_chars)?;

    Ok(PreparedData {
        consultation_data,
        questions,
        response_records,
    })
}

/// Infer logical question blocks from the flat survey column list.
///
/// Supplemental headers (reasoning text, yes/maybe/no free text) attach to
/// the most recent primary question column. Section marker columns update
/// the running section without producing a question.
pub fn build_question_definitions(
    columns: &[ColumnSpec],
    section_by_index: &HashMap<usize, String>,
) -> Vec<QuestionDefinition> {
    let start = find_question_start_index(columns);
    let question_columns = columns.get(start..).unwrap_or(&[]);

    let mut questions: Vec<QuestionDefinition> = Vec::new();
    let mut current_section = "General".to_string();

    for column in question_columns {
        let raw = clean_text(&column.raw_name);
        let lowered = raw.to_lowercase();
        let mapped_section = section_by_index
            .get(&column.index)
            .map(|s| clean_text(s))
            .unwrap_or_default();

        if SECTION_MARKERS.contains(&raw.as_str()) {
            current_section = if mapped_section.is_empty() {
                raw
            } else {
                mapped_section
            };
            continue;
        }

        if is_supplemental_header(&lowered) {
            match questions.last_mut() {
                Some(question) => question.supplemental_columns.push(column.clone()),
                None => questions.push(QuestionDefinition {
                    question_id: format!("Q{:02}", questions.len() + 1),
                    question_text: raw,
                    section: current_section.clone(),
                    primary_column: column.clone(),
                    supplemental_columns: Vec::new(),
                }),
            }
            continue;
        }

        let section = if mapped_section.is_empty() {
            current_section.clone()
        } else {
            current_section = mapped_section.clone();
            mapped_section
        };

        questions.push(QuestionDefinition {
            question_id: format!("Q{:02}", questions.len() + 1),
            question_text: canonical_question_text(&raw),
            section,
            primary_column: column.clone(),
            supplemental_columns: Vec::new(),
        });
    }

    questions
}

/// Create per-question response records for downstream summarisation.
///
/// Choice-like values are detected heuristically and stored in
/// `choice_value`, while free text is assembled into `answer_text`.
pub fn build_response_records(
    consultation_data: &ConsultationData,
    questions: &[QuestionDefinition],
    excerpt_chars: usize,
) -> IngestResult<Vec<ResponseRecord>> {
    let response_id_col = find_column(&consultation_data.columns, RESPONSE_ID_HEADER)?;
    let org_name_col = find_column(&consultation_data.columns, ORG_NAME_HEADER)?;
    let org_type_col = find_column(&consultation_data.columns, ORG_TYPE_HEADER)?;
    let region_col = find_column(&consultation_data.columns, REGION_HEADER)?;

    let mut output = Vec::new();

    for row in &consultation_data.rows {
        let response_id = row_value(row, response_id_col);
        let organisation_name = {
            let name = row_value(row, org_name_col);
            if name.is_empty() {
                "Unknown organisation".to_string()
            } else {
                name
            }
        };
        let organisation_type = row_value(row, org_type_col);
        let region = row_value(row, region_col);

        for question in questions {
            let primary_value = clean_text(&row_value(row, &question.primary_column));
            let supplemental_values: Vec<String> = question
                .supplemental_columns
                .iter()
                .map(|col| clean_text(&row_value(row, col)))
                .filter(|value| !value.is_empty())
                .collect();

            let choice_value = if looks_categorical(&primary_value) {
                Some(primary_value.clone())
            } else {
                None
            };

            let mut text_parts: Vec<String> = Vec::new();
            if !primary_value.is_empty() && choice_value.is_none() {
                text_parts.push(primary_value.clone());
            }
            text_parts.extend(supplemental_values);

            let answer_text = match (&choice_value, text_parts.is_empty()) {
                (Some(choice), false) => {
                    format!("Choice: {}. {}", choice, text_parts.join(" "))
                }
                (Some(choice), true) => choice.clone(),
                (None, _) => text_parts.join(" "),
            };

            let answer_text = clean_text(&answer_text);
            if answer_text.is_empty() {
                continue;
            }

            output.push(ResponseRecord {
                record_id: format!("{}:{}", response_id, question.question_id),
                response_id: response_id.clone(),
                organisation_name: organisation_name.clone(),
                organisation_type: organisation_type.clone(),
                region: region.clone(),
                question_id: question.question_id.clone(),
                question_text: question.question_text.clone(),
                section: question.section.clone(),
                choice_value,
                answer_text: answer_text.clone(),
                excerpt: make_excerpt(&answer_text, excerpt_chars),
            });
        }
    }

    Ok(output)
}

/// Return unique organisation options suitable for CLI selection,
/// sorted by display label.
pub fn list_organisations(prepared: &PreparedData) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    let mut entries: Vec<(String, String)> = Vec::new();

    for record in &prepared.response_records {
        if record.response_id.is_empty() || !seen.insert(record.response_id.clone()) {
            continue;
        }
        entries.push((
            record.response_id.clone(),
            format!("{} ({})", record.organisation_name, record.response_id),
        ));
    }

    entries.sort_by_key(|(_, label)| label.to_lowercase());
    entries
}

/// Return question options as `(question_id, display_label)` pairs.
pub fn question_options(prepared: &PreparedData) -> Vec<(String, String)> {
    prepared
        .questions
        .iter()
        .map(|q| {
            (
                q.question_id.clone(),
                format!("{} | {}", q.question_id, q.question_text),
            )
        })
        .collect()
}

/// Build the Approach 1 input object for a specific organisation.
pub fn organisation_catalog(
    prepared: &PreparedData,
    response_id: &str,
) -> Result<OrganisationCatalog, SummariseError> {
    let records: Vec<ResponseRecord> = prepared
        .response_records
        .iter()
        .filter(|record| record.response_id == response_id)
        .cloned()
        .collect();

    let Some(first) = records.first() else {
        return Err(SummariseError::UnknownResponseId {
            id: response_id.to_string(),
        });
    };

    let answered: std::collections::HashSet<&str> =
        records.iter().map(|r| r.question_id.as_str()).collect();

    Ok(OrganisationCatalog {
        response_id: response_id.to_string(),
        organisation_name: first.organisation_name.clone(),
        organisation_type: first.organisation_type.clone(),
        region: first.region.clone(),
        answered_questions: answered.len(),
        total_questions: prepared.questions.len(),
        records,
    })
}

/// Build the Approach 2 input slice for one question across organisations.
pub fn question_slice(
    prepared: &PreparedData,
    question_id: &str,
) -> Result<QuestionSlice, SummariseError> {
    let question = prepared
        .questions
        .iter()
        .find(|q| q.question_id == question_id)
        .cloned()
        .ok_or_else(|| SummariseError::UnknownQuestionId {
            id: question_id.to_string(),
        })?;

    let records = prepared
        .response_records
        .iter()
        .filter(|record| record.question_id == question_id)
        .cloned()
        .collect();

    Ok(QuestionSlice { question, records })
}

/// Compute the percentage distribution of normalized categorical answers,
/// rounded to two decimals.
pub fn calculate_distribution(records: &[ResponseRecord]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for record in records {
        if let Some(label) = record.choice_value.as_deref().and_then(normalize_choice) {
            *counts.entry(label).or_insert(0) += 1;
        }
    }

    let total: usize = counts.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }

    counts
        .into_iter()
        .map(|(label, count)| {
            let pct = (count as f64 / total as f64) * 100.0;
            (label.to_string(), (pct * 100.0).round() / 100.0)
        })
        .collect()
}

/// Map variant raw choice text to the canonical labels used in summaries.
///
/// Case-insensitive prefix match; unknown text yields `None`.
pub fn normalize_choice(value: &str) -> Option<&'static str> {
    let text = clean_text(value).to_lowercase();
    if text.is_empty() {
        return None;
    }

    // Longer aliases first so "strongly agree" is not claimed by "agree".
    const ALIASES: &[(&str, &str)] = &[
        ("strongly agree", "Strongly agree"),
        ("somewhat agree", "Somewhat agree"),
        ("neither agree nor disagree", "Neither agree nor disagree"),
        ("somewhat disagree", "Somewhat disagree"),
        ("strongly disagree", "Strongly disagree"),
        ("no comment", "No comment"),
        ("disagree", "Disagree"),
        ("agree", "Agree"),
        ("yes", "Yes"),
        ("no", "No"),
        ("maybe", "Maybe"),
        ("neutral", "Neutral"),
    ];

    ALIASES
        .iter()
        .find(|(alias, _)| text.starts_with(alias))
        .map(|(_, label)| *label)
}

/// Normalize whitespace and remove hidden unicode markers.
pub fn clean_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|ch| *ch != '\u{feff}' && *ch != '\u{200b}')
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn find_question_start_index(columns: &[ColumnSpec]) -> usize {
    columns
        .iter()
        .find(|col| col.raw_name.starts_with("1. Do you agree"))
        .map(|col| col.index)
        .unwrap_or(13)
}

/// Identify headers that carry free-text supplements for a primary question.
fn is_supplemental_header(lowered: &str) -> bool {
    if lowered.contains(" - yes - text")
        || lowered.contains(" - maybe - text")
        || lowered.contains(" - no - text")
    {
        return true;
    }
    SUPPLEMENT_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// Heuristically decide whether a cell value is a structured choice label.
fn looks_categorical(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }

    let lowered = value.to_lowercase();
    let lowered = lowered.trim();
    if CATEGORICAL_HINTS.contains(&lowered) {
        return true;
    }

    if lowered.len() <= 24 && CATEGORICAL_HINTS.contains(&lowered.replace('-', " ").as_str()) {
        return true;
    }

    let word_count = lowered.split_whitespace().count();
    if word_count <= 3 && lowered.len() <= 25 && lowered.chars().all(|c| c.is_alphabetic()) {
        return true;
    }

    false
}

/// Normalize question headers into stable display text.
fn canonical_question_text(raw: &str) -> String {
    let text = raw.trim_start();
    let without_number = match text.find(". ") {
        Some(dot) if text[..dot].chars().all(|c| c.is_ascii_digit()) && dot > 0 => &text[dot + 2..],
        _ => text,
    };

    clean_text(&without_number.replace(" - Selected Choice", ""))
}

fn find_column<'a>(columns: &'a [ColumnSpec], startswith: &str) -> IngestResult<&'a ColumnSpec> {
    columns
        .iter()
        .find(|col| col.raw_name.starts_with(startswith))
        .ok_or_else(|| IngestError::MissingColumn {
            header: startswith.to_string(),
        })
}

fn row_value(row: &HashMap<String, String>, column: &ColumnSpec) -> String {
    row.get(&column.unique_name).cloned().unwrap_or_default()
}

fn make_excerpt(answer_text: &str, excerpt_chars: usize) -> String {
    let chars: Vec<char> = answer_text.chars().collect();
    if chars.len() <= excerpt_chars {
        return answer_text.to_string();
    }

    let truncated: String = chars[..excerpt_chars].iter().collect();
    format!("{}...", truncated.trim_end())
}
