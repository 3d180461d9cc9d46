use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::alias::{self, NameKey};
use super::index::RecordIndex;
use super::model::Entry;

// ---------------------------------------------------------------------------
// Search configuration
// ---------------------------------------------------------------------------

/// Knobs for aliased and deep search. Passed to the index at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Case-insensitive deep search. Aliased search always ignores case.
    pub ignore_case: bool,
    /// Allowed edits per character of an alphabetic query token.
    pub max_typo_ratio: f64,
    /// Shortest alphabetic token that may match by truncation or typo.
    pub min_fuzzy_len: usize,
    /// Match names regardless of point mutations such as `K153E`.
    pub ignore_mutations: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ignore_case: true,
            max_typo_ratio: 0.25,
            min_fuzzy_len: 4,
            ignore_mutations: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid search pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One attribute found by [`RecordIndex::find_fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldHit<'a> {
    pub entry: &'a Entry,
    pub field: String,
    pub value: String,
}

// ---------------------------------------------------------------------------
// Search operations
// ---------------------------------------------------------------------------

impl RecordIndex {
    /// Entries whose long name approximately matches `query`, in index order.
    ///
    /// See [`alias`] for the matching policy.
    pub fn aliased_search(&self, query: &str) -> Vec<&Entry> {
        let key = NameKey::new(query);
        let hits: Vec<&Entry> = self
            .entries()
            .iter()
            .zip(&self.name_keys)
            .filter(|(_, name)| alias::keys_match(&key, name, &self.config))
            .map(|(entry, _)| entry)
            .collect();
        log::debug!(
            "Aliased {} search for {query:?} matched {} entries",
            self.kind(),
            hits.len()
        );
        hits
    }

    /// Entries where `pattern` matches the text of any attribute.
    pub fn deep_search(&self, pattern: &str) -> Result<Vec<&Entry>, SearchError> {
        let re = self.compile(pattern)?;
        let hits: Vec<&Entry> = self
            .entries()
            .iter()
            .zip(&self.texts)
            .filter(|(_, texts)| texts.iter().any(|(_, text)| re.is_match(text)))
            .map(|(entry, _)| entry)
            .collect();
        log::debug!(
            "Deep {} search for {pattern:?} matched {} entries",
            self.kind(),
            hits.len()
        );
        Ok(hits)
    }

    /// Entries with an attribute whose whole text equals `value`.
    pub fn deep_search_exact(&self, value: &str) -> Vec<&Entry> {
        let ignore_case = self.config.ignore_case;
        let equal = |text: &str| {
            if ignore_case {
                text.to_lowercase() == value.to_lowercase()
            } else {
                text == value
            }
        };
        self.entries()
            .iter()
            .zip(&self.texts)
            .filter(|(_, texts)| texts.iter().any(|(_, text)| equal(text)))
            .map(|(entry, _)| entry)
            .collect()
    }

    /// Every attribute whose field name matches `pattern`, entry by entry.
    pub fn find_fields(&self, pattern: &str) -> Result<Vec<FieldHit<'_>>, SearchError> {
        let re = self.compile(pattern)?;
        Ok(self
            .entries()
            .iter()
            .zip(&self.texts)
            .flat_map(|(entry, texts)| {
                texts
                    .iter()
                    .filter(|(field, _)| re.is_match(field))
                    .map(move |(field, value)| FieldHit {
                        entry,
                        field: field.clone(),
                        value: value.clone(),
                    })
            })
            .collect())
    }

    fn compile(&self, pattern: &str) -> Result<Regex, SearchError> {
        RegexBuilder::new(pattern)
            .case_insensitive(self.config.ignore_case)
            .build()
            .map_err(|source| SearchError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }
}

/// `(id, long)` pairs for presenting a result list.
pub fn labels<'a>(entries: &[&'a Entry]) -> Vec<(&'a str, &'a str)> {
    entries.iter().map(|e| e.label()).collect()
}
