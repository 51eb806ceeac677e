// libs/appointment-cell/src/services/symptoms.rs
//
// Rule-based symptom intake. Dictionary order and tier order are part of
// the output contract: labels are emitted in table order and clinicians see
// them verbatim.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Sentiment, Severity, SymptomSignal};

const SYMPTOMS: &[(&str, &str)] = &[
    ("headache", "Headache"),
    ("fever", "Fever"),
    ("cough", "Cough"),
    ("sore throat", "Sore Throat"),
    ("nausea", "Nausea"),
    ("fatigue", "Fatigue"),
    ("pain", "Pain"),
    ("dizziness", "Dizziness"),
    ("chest pain", "Chest Pain"),
    ("shortness of breath", "Shortness of Breath"),
    ("vomiting", "Vomiting"),
    ("diarrhea", "Diarrhea"),
    ("rash", "Rash"),
    ("itchy", "Itchiness"),
    ("bleeding", "Bleeding"),
];

const BODY_PARTS: &[(&str, &str)] = &[
    ("head", "Head"),
    ("chest", "Chest"),
    ("stomach", "Stomach/Abdomen"),
    ("abdomen", "Stomach/Abdomen"),
    ("throat", "Throat"),
    ("limb", "Limb"),
    ("arm", "Arm"),
    ("leg", "Leg"),
    ("back", "Back"),
    ("eye", "Eye"),
    ("ear", "Ear"),
    ("nose", "Nose"),
];

const SEVERE_TERMS: &[&str] = &["severe", "terrible", "excruciating"];
const MODERATE_TERMS: &[&str] = &["moderate", "intense"];
const MILD_TERMS: &[&str] = &["mild", "slight", "little"];

const IMPROVEMENT_TERMS: &[&str] = &["better", "improving", "recovering"];
const WORSENING_TERMS: &[&str] = &["worse", "deteriorating"];

const STOP_WORDS: &[&str] = &[
    "i", "have", "a", "for", "and", "feel", "my", "the", "is", "it", "was", "am", "are", "not",
    "very", "been", "experiencing", "persistent", "last", "with", "of", "in", "an", "at", "on",
    "from", "to", "as",
];

const MAX_KEYWORDS: usize = 5;
const MIN_KEYWORD_CHARS: usize = 3;

// Plural units come first so "3 days" is captured whole.
static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]+\s*(?:days|day|weeks|week|months|month|years|year)")
        .expect("duration pattern is valid")
});

/// Map free text onto a [`SymptomSignal`]. Pure and deterministic.
pub fn normalize(text: &str) -> SymptomSignal {
    let lower = text.to_lowercase();

    let identified_symptoms = scan_dictionary(&lower, SYMPTOMS);
    let duration_mentions = extract_durations(&lower);
    let body_parts = scan_dictionary(&lower, BODY_PARTS);
    let (severity, tier_sentiment) = classify_severity(&lower);
    let sentiment = adjust_sentiment(&lower, tier_sentiment);
    let keywords = extract_keywords(&lower, &identified_symptoms, &duration_mentions, &body_parts);

    SymptomSignal {
        keywords,
        identified_symptoms,
        duration_mentions,
        body_parts,
        sentiment,
        severity,
    }
}

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| text.contains(term))
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

fn scan_dictionary(text: &str, dictionary: &[(&str, &str)]) -> Vec<String> {
    let mut labels = Vec::new();
    for (keyword, label) in dictionary {
        if text.contains(keyword) {
            push_unique(&mut labels, label);
        }
    }
    labels
}

fn extract_durations(text: &str) -> Vec<String> {
    let mut durations = Vec::new();
    for found in DURATION_PATTERN.find_iter(text) {
        push_unique(&mut durations, found.as_str());
    }
    durations
}

fn classify_severity(text: &str) -> (Severity, Sentiment) {
    if contains_any(text, SEVERE_TERMS) {
        (Severity::Severe, Sentiment::Negative)
    } else if contains_any(text, MODERATE_TERMS) {
        (Severity::Moderate, Sentiment::Negative)
    } else if contains_any(text, MILD_TERMS) {
        (Severity::Mild, Sentiment::MildNegative)
    } else {
        (Severity::Mild, Sentiment::Neutral)
    }
}

fn adjust_sentiment(text: &str, sentiment: Sentiment) -> Sentiment {
    if contains_any(text, IMPROVEMENT_TERMS) {
        Sentiment::Positive
    } else if sentiment == Sentiment::Neutral && contains_any(text, WORSENING_TERMS) {
        Sentiment::Negative
    } else {
        sentiment
    }
}

fn is_excluded(word: &str) -> bool {
    STOP_WORDS.contains(&word)
        || SYMPTOMS.iter().any(|(keyword, _)| *keyword == word)
        || BODY_PARTS.iter().any(|(keyword, _)| *keyword == word)
}

fn extract_keywords(
    text: &str,
    symptoms: &[String],
    durations: &[String],
    body_parts: &[String],
) -> Vec<String> {
    let mut keywords = Vec::new();

    for word in text.split_whitespace() {
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
        if word.chars().count() < MIN_KEYWORD_CHARS || is_excluded(word) {
            continue;
        }
        if symptoms.iter().any(|s| s.to_lowercase() == word)
            || body_parts.iter().any(|b| b.to_lowercase() == word)
            || durations.iter().any(|d| word.contains(d.as_str()))
        {
            continue;
        }
        push_unique(&mut keywords, word);
    }

    keywords
}
