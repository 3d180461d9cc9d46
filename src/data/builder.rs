use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::index::RecordIndex;
use super::matrix::{BuildWarning, TiterMatrix};
use super::model::{Entry, EntryKind};
use super::titer::{Measurement, TiterParseError, TiterToken};

// ---------------------------------------------------------------------------
// ResultSet – one raw results table
// ---------------------------------------------------------------------------

/// A raw results table as stored in a results document.
///
/// `titers[i][j]` is the reading of antigen `antigen_ids[i]` against serum
/// `serum_ids[j]`. Rows may be shorter than `serum_ids`; the tail is treated
/// as not measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub file: Option<String>,
    pub antigen_ids: Vec<String>,
    pub serum_ids: Vec<String>,
    pub titers: Vec<Vec<TiterToken>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("{expected} index expected, got a {actual} index")]
    WrongIndexKind {
        expected: EntryKind,
        actual: EntryKind,
    },

    #[error("{axis} id `{id}` is not present in the {axis} records")]
    UnresolvedReference { axis: EntryKind, id: String },

    #[error("{axis} id `{id}` is listed more than once in the results")]
    DuplicateReference { axis: EntryKind, id: String },

    #[error("results have {rows} titer rows for {antigens} antigens")]
    RowCount { rows: usize, antigens: usize },

    #[error("titer row for antigen `{antigen}` has {cells} cells for {sera} sera")]
    RowWidth {
        antigen: String,
        cells: usize,
        sera: usize,
    },

    #[error("antigen `{antigen}`, serum `{serum}`: {source}")]
    InvalidTiter {
        antigen: String,
        serum: String,
        #[source]
        source: TiterParseError,
    },
}

// ---------------------------------------------------------------------------
// ConsistencyBuilder
// ---------------------------------------------------------------------------

/// Cross-checks result sets against the master antigen and serum records.
///
/// # Invariants
/// - Every id of a built matrix resolves in the master index of its axis.
/// - Axis order follows the result set, never the master index.
/// - Master entries the result set does not mention are left out.
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyBuilder<'a> {
    antigens: &'a RecordIndex,
    sera: &'a RecordIndex,
}

impl<'a> ConsistencyBuilder<'a> {
    pub fn new(antigens: &'a RecordIndex, sera: &'a RecordIndex) -> Result<Self, BuildError> {
        expect_kind(antigens, EntryKind::Antigen)?;
        expect_kind(sera, EntryKind::Serum)?;
        Ok(Self { antigens, sera })
    }

    /// Validate `results` and materialize it as a [`TiterMatrix`].
    pub fn build(&self, results: &ResultSet) -> Result<TiterMatrix, BuildError> {
        let antigens = resolve(self.antigens, &results.antigen_ids)?;
        let sera = resolve(self.sera, &results.serum_ids)?;

        if results.titers.len() != antigens.len() {
            return Err(BuildError::RowCount {
                rows: results.titers.len(),
                antigens: antigens.len(),
            });
        }

        let mut cells = Vec::with_capacity(antigens.len());
        for (antigen, row) in antigens.iter().zip(&results.titers) {
            if row.len() > sera.len() {
                return Err(BuildError::RowWidth {
                    antigen: antigen.id.clone(),
                    cells: row.len(),
                    sera: sera.len(),
                });
            }
            let mut parsed = Vec::with_capacity(sera.len());
            for (serum, token) in sera.iter().zip(row) {
                let titer = token.parse().map_err(|source| BuildError::InvalidTiter {
                    antigen: antigen.id.clone(),
                    serum: serum.id.clone(),
                    source,
                })?;
                parsed.push(Measurement {
                    raw: token.as_str().to_string(),
                    titer,
                });
            }
            parsed.resize(sera.len(), Measurement::missing());
            cells.push(parsed);
        }

        let mut warnings = duplicate_strains(EntryKind::Antigen, &antigens);
        warnings.extend(duplicate_strains(EntryKind::Serum, &sera));
        for warning in &warnings {
            let BuildWarning::DuplicateStrain {
                axis,
                strain_id,
                ids,
            } = warning;
            log::warn!(
                "Possible repeated measurements: {axis} entries {ids:?} share strain id {strain_id}"
            );
        }

        log::info!(
            "Built titer table {} with {} antigens and {} sera",
            results.file.as_deref().unwrap_or("<unnamed>"),
            antigens.len(),
            sera.len()
        );

        Ok(TiterMatrix {
            file: results.file.clone(),
            antigen_pos: positions(&antigens),
            serum_pos: positions(&sera),
            antigens,
            sera,
            cells,
            warnings,
        })
    }
}

fn expect_kind(index: &RecordIndex, expected: EntryKind) -> Result<(), BuildError> {
    if index.kind() != expected {
        return Err(BuildError::WrongIndexKind {
            expected,
            actual: index.kind(),
        });
    }
    Ok(())
}

fn resolve(index: &RecordIndex, ids: &[String]) -> Result<Vec<Entry>, BuildError> {
    let axis = index.kind();
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .map(|id| {
            let entry = index
                .get_entry(id)
                .ok_or_else(|| BuildError::UnresolvedReference {
                    axis,
                    id: id.clone(),
                })?;
            if !seen.insert(id.as_str()) {
                return Err(BuildError::DuplicateReference {
                    axis,
                    id: id.clone(),
                });
            }
            Ok(entry.clone())
        })
        .collect()
}

fn positions(entries: &[Entry]) -> HashMap<String, usize> {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.clone(), i))
        .collect()
}

fn duplicate_strains(axis: EntryKind, entries: &[Entry]) -> Vec<BuildWarning> {
    let mut by_strain: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for entry in entries {
        if let Some(strain_id) = entry.attributes.strain_id.as_deref() {
            by_strain
                .entry(strain_id)
                .or_default()
                .push(entry.id.clone());
        }
    }
    by_strain
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(strain_id, ids)| BuildWarning::DuplicateStrain {
            axis,
            strain_id: strain_id.to_string(),
            ids,
        })
        .collect()
}
