//! Stance classification for response records.
//!
//! A prioritized rule cascade: the categorical choice wins when present,
//! free-text keywords are the fallback, and everything else is `Other`.

use crate::processing::normalize_choice;
use crate::types::record::ResponseRecord;
use crate::types::summary::Stance;

const SUPPORT_LABELS: &[&str] = &["Strongly agree", "Somewhat agree", "Agree", "Yes"];
const CONCERN_LABELS: &[&str] = &["Strongly disagree", "Somewhat disagree", "Disagree", "No"];
const NEUTRAL_LABELS: &[&str] = &["Neither agree nor disagree", "Neutral", "Maybe", "No comment"];

const SUPPORT_KEYWORDS: &[&str] = &["support", "welcome", "agree"];
const CONCERN_KEYWORDS: &[&str] = &["concern", "risk", "oppose", "disagree"];

/// Classify one record's stance. Pure function of the record.
pub fn classify_stance(record: &ResponseRecord) -> Stance {
    if let Some(normalized) = record
        .choice_value
        .as_deref()
        .and_then(normalize_choice)
    {
        if SUPPORT_LABELS.contains(&normalized) {
            return Stance::Support;
        }
        if CONCERN_LABELS.contains(&normalized) {
            return Stance::Concern;
        }
        if NEUTRAL_LABELS.contains(&normalized) {
            return Stance::Neutral;
        }
    }

    let text = record.answer_text.to_lowercase();
    if SUPPORT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return Stance::Support;
    }
    if CONCERN_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return Stance::Concern;
    }

    Stance::Other
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    #[test]
    fn test_choice_value_takes_priority() {
        let rec = record(
            "R1:Q01",
            "R1",
            "Org A",
            "Q01",
            Some("Strongly agree"),
            "we have deep concerns about everything",
        );
        // Categorical signal outranks the concern keyword in the text.
        assert_eq!(classify_stance(&rec), Stance::Support);
    }

    #[test]
    fn test_choice_prefix_match() {
        let rec = record(
            "R1:Q01",
            "R1",
            "Org A",
            "Q01",
            Some("no - with reservations"),
            "",
        );
        assert_eq!(classify_stance(&rec), Stance::Concern);
    }

    #[test]
    fn test_neutral_choices() {
        for choice in ["Neither agree nor disagree", "Maybe", "No comment", "neutral"] {
            let rec = record("R1:Q01", "R1", "Org A", "Q01", Some(choice), "");
            assert_eq!(classify_stance(&rec), Stance::Neutral, "choice: {choice}");
        }
    }

    #[test]
    fn test_keyword_fallback() {
        let rec = record(
            "R1:Q01",
            "R1",
            "Org A",
            "Q01",
            None,
            "We welcome this proposal",
        );
        assert_eq!(classify_stance(&rec), Stance::Support);

        let rec = record(
            "R2:Q01",
            "R2",
            "Org B",
            "Q01",
            None,
            "There is a material risk to delivery",
        );
        assert_eq!(classify_stance(&rec), Stance::Concern);
    }

    #[test]
    fn test_no_signal_is_other() {
        let rec = record(
            "R1:Q01",
            "R1",
            "Org A",
            "Q01",
            None,
            "Further detail is available on request",
        );
        assert_eq!(classify_stance(&rec), Stance::Other);
    }
}
