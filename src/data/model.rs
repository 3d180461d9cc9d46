use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::city::CityTable;

// ---------------------------------------------------------------------------
// AttributeValue – a single value in a record's field bag
// ---------------------------------------------------------------------------

/// A dynamically-typed attribute value mirroring the JSON data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{s}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            AttributeValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            AttributeValue::Null => write!(f, "<null>"),
        }
    }
}

impl AttributeValue {
    /// Borrow the value as text when it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Push every scalar leaf of this value onto `out` as `(path, text)`.
    ///
    /// Lists keep the parent path; nested maps extend it with `.key`.
    /// `Null` leaves contribute nothing.
    fn collect_leaves(&self, path: &str, out: &mut Vec<(String, String)>) {
        match self {
            AttributeValue::Null => {}
            AttributeValue::List(items) => {
                for item in items {
                    item.collect_leaves(path, out);
                }
            }
            AttributeValue::Map(map) => {
                for (key, value) in map {
                    value.collect_leaves(&format!("{path}.{key}"), out);
                }
            }
            scalar => out.push((path.to_string(), scalar.to_string())),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

/// An unvalidated record as handed over by the loading layer.
pub type Record = BTreeMap<String, AttributeValue>;

// ---------------------------------------------------------------------------
// Entry – one antigen or serum
// ---------------------------------------------------------------------------

/// Which master data set an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Antigen,
    Serum,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Antigen => write!(f, "antigen"),
            EntryKind::Serum => write!(f, "serum"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EntryError {
    #[error("{kind} record is missing required field `{field}`")]
    MissingField { kind: EntryKind, field: &'static str },

    #[error("{kind} record field `{field}` must be a non-empty string, got {value}")]
    InvalidField {
        kind: EntryKind,
        field: &'static str,
        value: String,
    },
}

/// Known attribute fields, with everything else kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    /// Passage history, e.g. `SIAT2` or `E4/E2`.
    pub passage: Option<String>,
    /// For sera: id of the antigen strain the serum was raised against.
    pub strain_id: Option<String>,
    /// For antigens: id of the wildtype this antigen derives from.
    pub parent_id: Option<String>,
    pub wildtype: Option<bool>,
    /// Fields outside the known schema, kept verbatim.
    pub extra: BTreeMap<String, AttributeValue>,
}

/// A single antigen or serum record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub kind: EntryKind,
    pub id: String,
    /// Canonical long name, e.g. `A/VIETNAM/1194/2004-NIBRG-14`.
    pub long: String,
    /// Long name with city components abbreviated.
    pub short: String,
    pub attributes: Attributes,
}

impl Entry {
    /// Validate a raw record and split it into the known attribute schema.
    pub fn from_record(
        kind: EntryKind,
        mut record: Record,
        cities: &CityTable,
    ) -> Result<Self, EntryError> {
        let id = take_required_string(kind, &mut record, "id")?;
        let long = take_required_string(kind, &mut record, "long")?;

        let passage = take_optional_string(&mut record, "passage");
        let strain_id = take_optional_string(&mut record, "strain_id");
        let wildtype = match record.remove("wildtype") {
            Some(value) => match value.as_bool() {
                Some(b) => Some(b),
                None => {
                    record.insert("wildtype".to_string(), value);
                    None
                }
            },
            None => None,
        };

        let mut parent_id = take_optional_string(&mut record, "parent_id");
        if kind == EntryKind::Antigen && parent_id.is_none() && wildtype == Some(true) {
            parent_id = Some(id.clone());
        }

        let short = cities.abbreviate(&long);

        Ok(Entry {
            kind,
            id,
            long,
            short,
            attributes: Attributes {
                passage,
                strain_id,
                parent_id,
                wildtype,
                extra: record,
            },
        })
    }

    /// Every searchable `(field, text)` pair of this entry, known fields first.
    pub fn text_fields(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("id".to_string(), self.id.clone()),
            ("long".to_string(), self.long.clone()),
        ];
        let known = [
            ("passage", &self.attributes.passage),
            ("strain_id", &self.attributes.strain_id),
            ("parent_id", &self.attributes.parent_id),
        ];
        for (field, value) in known {
            if let Some(text) = value {
                out.push((field.to_string(), text.clone()));
            }
        }
        if let Some(wildtype) = self.attributes.wildtype {
            out.push(("wildtype".to_string(), wildtype.to_string()));
        }
        for (key, value) in &self.attributes.extra {
            value.collect_leaves(key, &mut out);
        }
        out
    }

    /// Names of all fields present on this entry.
    pub fn field_names(&self) -> Vec<String> {
        let mut names = vec!["id".to_string(), "long".to_string()];
        if self.attributes.passage.is_some() {
            names.push("passage".to_string());
        }
        if self.attributes.strain_id.is_some() {
            names.push("strain_id".to_string());
        }
        if self.attributes.parent_id.is_some() {
            names.push("parent_id".to_string());
        }
        if self.attributes.wildtype.is_some() {
            names.push("wildtype".to_string());
        }
        names.extend(self.attributes.extra.keys().cloned());
        names
    }

    /// The `(id, long)` pair used when presenting search results.
    pub fn label(&self) -> (&str, &str) {
        (&self.id, &self.long)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntryKind::Antigen => write!(f, "Antigen {} with name {}", self.id, self.long),
            EntryKind::Serum => write!(
                f,
                "Serum {} with name {} and strain id {}",
                self.id,
                self.long,
                self.attributes.strain_id.as_deref().unwrap_or("<none>")
            ),
        }
    }
}

fn take_required_string(
    kind: EntryKind,
    record: &mut Record,
    field: &'static str,
) -> Result<String, EntryError> {
    match record.remove(field) {
        None => Err(EntryError::MissingField { kind, field }),
        Some(AttributeValue::String(s)) if !s.is_empty() => Ok(s),
        Some(other) => Err(EntryError::InvalidField {
            kind,
            field,
            value: other.to_string(),
        }),
    }
}

/// Take a known field if it is a string; anything else stays in the bag.
fn take_optional_string(record: &mut Record, field: &str) -> Option<String> {
    match record.remove(field) {
        Some(AttributeValue::String(s)) => Some(s),
        Some(AttributeValue::Null) | None => None,
        Some(other) => {
            record.insert(field.to_string(), other);
            None
        }
    }
}
