use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use super::alias::NameKey;
use super::city::CityTable;
use super::model::{Entry, EntryError, EntryKind, Record};
use super::search::SearchConfig;

// ---------------------------------------------------------------------------
// Errors and health findings
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("record {position}: {source}")]
    InvalidRecord {
        position: usize,
        #[source]
        source: EntryError,
    },

    #[error("{kind} id `{id}` appears at records {first} and {second}")]
    DuplicateId {
        kind: EntryKind,
        id: String,
        first: usize,
        second: usize,
    },
}

/// Non-fatal oddity found while indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthIssue {
    /// Several entries share one long name. `identical` is set when at least
    /// two of them carry exactly the same fields (an accidental double entry).
    DuplicateLongName {
        long: String,
        ids: Vec<String>,
        identical: bool,
    },
}

// ---------------------------------------------------------------------------
// RecordIndex – immutable master data set
// ---------------------------------------------------------------------------

/// All antigens or all sera of a data set, with lookup structures.
///
/// Built once from records and read-only afterwards; rebuild to add entries.
#[derive(Debug, Clone)]
pub struct RecordIndex {
    kind: EntryKind,
    entries: Vec<Entry>,
    by_id: HashMap<String, usize>,
    pub(super) name_keys: Vec<NameKey>,
    pub(super) texts: Vec<Vec<(String, String)>>,
    pub(super) config: SearchConfig,
    health: Vec<HealthIssue>,
}

impl RecordIndex {
    pub fn antigens(
        records: Vec<Record>,
        cities: &CityTable,
        config: SearchConfig,
    ) -> Result<Self, IndexError> {
        Self::build(EntryKind::Antigen, records, cities, config)
    }

    pub fn sera(
        records: Vec<Record>,
        cities: &CityTable,
        config: SearchConfig,
    ) -> Result<Self, IndexError> {
        Self::build(EntryKind::Serum, records, cities, config)
    }

    /// Validate records and build the id, name and text lookups.
    pub fn build(
        kind: EntryKind,
        records: Vec<Record>,
        cities: &CityTable,
        config: SearchConfig,
    ) -> Result<Self, IndexError> {
        let mut entries = Vec::with_capacity(records.len());
        let mut by_id = HashMap::with_capacity(records.len());

        for (position, record) in records.into_iter().enumerate() {
            let entry = Entry::from_record(kind, record, cities)
                .map_err(|source| IndexError::InvalidRecord { position, source })?;
            if let Some(&first) = by_id.get(&entry.id) {
                return Err(IndexError::DuplicateId {
                    kind,
                    id: entry.id,
                    first,
                    second: position,
                });
            }
            by_id.insert(entry.id.clone(), position);
            entries.push(entry);
        }

        let name_keys = entries.iter().map(|e| NameKey::new(&e.long)).collect();
        let texts = entries.iter().map(Entry::text_fields).collect();
        let health = health_check(&entries);

        for issue in &health {
            match issue {
                HealthIssue::DuplicateLongName {
                    long,
                    ids,
                    identical,
                } => {
                    if *identical {
                        log::warn!("Identical {kind} entries with long name {long}: {ids:?}");
                    } else {
                        log::warn!("{kind} long name {long} is shared by {ids:?}");
                    }
                }
            }
        }
        log::info!("Indexed {} {kind} entries", entries.len());

        Ok(RecordIndex {
            kind,
            entries,
            by_id,
            name_keys,
            texts,
            config,
            health,
        })
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Entries in input order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Exact, case-sensitive id lookup.
    pub fn get_entry(&self, id: &str) -> Option<&Entry> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All entries whose long name equals `long` exactly, in index order.
    pub fn get_by_long(&self, long: &str) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.long == long).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// Union of field names over all entries. `id` and `long` are always present.
    pub fn fields(&self) -> BTreeSet<String> {
        let mut fields: BTreeSet<String> = ["id".to_string(), "long".to_string()].into();
        for entry in &self.entries {
            fields.extend(entry.field_names());
        }
        fields
    }

    pub fn health_issues(&self) -> &[HealthIssue] {
        &self.health
    }
}

fn health_check(entries: &[Entry]) -> Vec<HealthIssue> {
    let mut by_long: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut order = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        let slot = by_long.entry(entry.long.as_str()).or_default();
        if slot.is_empty() {
            order.push(entry.long.as_str());
        }
        slot.push(idx);
    }

    order
        .into_iter()
        .filter_map(|long| {
            let positions = &by_long[long];
            if positions.len() < 2 {
                return None;
            }
            let identical = positions.iter().enumerate().any(|(n, &a)| {
                positions[n + 1..]
                    .iter()
                    .any(|&b| same_fields(&entries[a], &entries[b]))
            });
            Some(HealthIssue::DuplicateLongName {
                long: long.to_string(),
                ids: positions.iter().map(|&i| entries[i].id.clone()).collect(),
                identical,
            })
        })
        .collect()
}

/// Field-for-field equality ignoring the id.
fn same_fields(a: &Entry, b: &Entry) -> bool {
    a.long == b.long && a.attributes == b.attributes
}
