//! Keyword categorizer.
//!
//! Maps post text to topical labels by case-insensitive whole-word or
//! whole-phrase matching. A phrase matches only when it is bounded by
//! non-word characters or the edges of the text, so `cursor` does not
//! match inside `cursory`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};

/// Built-in keyword table used when no keyword file is configured.
const BUILTIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "cursor",
        &["cursor", "cursor ide", "cursor ai", "cursor editor", "cursor.sh"],
    ),
    (
        "general",
        &[
            "ai ide",
            "ai code editor",
            "ai coding assistant",
            "ai pair programmer",
            "code completion",
            "copilot",
        ],
    ),
    ("lovable", &["lovable", "lovable.dev", "lovable ai"]),
    (
        "windsurf",
        &["windsurf", "windsurf ide", "codeium", "cascade ai"],
    ),
];

#[derive(Debug, Clone)]
struct LabelMatcher {
    phrases: Vec<String>,
    /// None when the label has no usable phrases
    pattern: Option<Regex>,
}

/// Deterministic keyword to label mapping.
#[derive(Debug, Clone)]
pub struct KeywordCategorizer {
    labels: BTreeMap<String, LabelMatcher>,
}

impl KeywordCategorizer {
    /// Builds a categorizer from `label -> phrases`.
    ///
    /// Phrases are trimmed and lower-cased; empty phrases are ignored.
    pub fn from_map(table: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut labels = BTreeMap::new();
        for (label, phrases) in table {
            let label = label.trim().to_string();
            if label.is_empty() {
                return Err(Error::config("keyword table contains an empty label"));
            }

            let phrases: Vec<String> = phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect();

            let pattern = if phrases.is_empty() {
                None
            } else {
                let alternation = phrases
                    .iter()
                    .map(|p| regex::escape(p))
                    .collect::<Vec<_>>()
                    .join("|");
                let source = format!(r"(?i)(?:^|\W)(?:{})(?:\W|$)", alternation);
                let regex = Regex::new(&source).map_err(|e| {
                    Error::config(format!("invalid keywords for label '{}': {}", label, e))
                })?;
                Some(regex)
            };

            labels.insert(label, LabelMatcher { phrases, pattern });
        }
        Ok(Self { labels })
    }

    /// Loads a JSON keyword table of the form `{"label": ["phrase", ...]}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read keywords file {}: {}", path.display(), e))
        })?;
        let table: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)?;
        Self::from_map(table)
    }

    /// Returns every label whose phrases occur in `text`.
    ///
    /// Each label is evaluated independently. Empty text yields an empty set.
    pub fn categorize(&self, text: &str) -> BTreeSet<String> {
        if text.trim().is_empty() {
            return BTreeSet::new();
        }
        self.labels
            .iter()
            .filter(|(_, matcher)| {
                matcher
                    .pattern
                    .as_ref()
                    .is_some_and(|pattern| pattern.is_match(text))
            })
            .map(|(label, _)| label.clone())
            .collect()
    }

    /// All configured labels, in stable sorted order.
    pub fn list_labels(&self) -> Vec<String> {
        self.labels.keys().cloned().collect()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// First phrase of each label, paired with the label.
    ///
    /// Used as search terms when looking inside communities.
    pub fn search_terms(&self) -> Vec<(String, String)> {
        self.labels
            .iter()
            .filter_map(|(label, matcher)| {
                matcher
                    .phrases
                    .first()
                    .map(|phrase| (label.clone(), phrase.clone()))
            })
            .collect()
    }
}

impl Default for KeywordCategorizer {
    fn default() -> Self {
        let table = BUILTIN_KEYWORDS
            .iter()
            .map(|(label, phrases)| {
                (
                    label.to_string(),
                    phrases.iter().map(|p| p.to_string()).collect(),
                )
            })
            .collect();
        // Built-in phrases are escaped literals; compilation cannot fail
        Self::from_map(table).unwrap_or(Self {
            labels: BTreeMap::new(),
        })
    }
}
