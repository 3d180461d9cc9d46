use std::collections::HashMap;

use super::model::{Entry, EntryKind};
use super::titer::Measurement;

/// Non-fatal finding attached to a built matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildWarning {
    /// Several entries on one axis were raised from the same strain, i.e. the
    /// table probably holds repeated measurements. Nothing is merged.
    DuplicateStrain {
        axis: EntryKind,
        strain_id: String,
        ids: Vec<String>,
    },
}

/// A validated antigen × serum table. Rows are antigens, columns are sera.
///
/// Only [`ConsistencyBuilder`](super::builder::ConsistencyBuilder) creates
/// these, so every id here resolves in the master indexes it was built from.
#[derive(Debug, Clone)]
pub struct TiterMatrix {
    pub(super) file: Option<String>,
    pub(super) antigens: Vec<Entry>,
    pub(super) sera: Vec<Entry>,
    pub(super) antigen_pos: HashMap<String, usize>,
    pub(super) serum_pos: HashMap<String, usize>,
    pub(super) cells: Vec<Vec<Measurement>>,
    pub(super) warnings: Vec<BuildWarning>,
}

impl TiterMatrix {
    /// Label of the source file, when the result set carried one.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    pub fn antigen_ids(&self) -> Vec<&str> {
        self.antigens.iter().map(|e| e.id.as_str()).collect()
    }

    pub fn serum_ids(&self) -> Vec<&str> {
        self.sera.iter().map(|e| e.id.as_str()).collect()
    }

    /// Resolved antigen entries in row order.
    pub fn antigens(&self) -> &[Entry] {
        &self.antigens
    }

    /// Resolved serum entries in column order.
    pub fn sera(&self) -> &[Entry] {
        &self.sera
    }

    pub fn antigen(&self, id: &str) -> Option<&Entry> {
        self.antigen_pos.get(id).map(|&i| &self.antigens[i])
    }

    pub fn serum(&self, id: &str) -> Option<&Entry> {
        self.serum_pos.get(id).map(|&i| &self.sera[i])
    }

    /// `(antigens, sera)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.antigens.len(), self.sera.len())
    }

    pub fn titer(&self, antigen_id: &str, serum_id: &str) -> Option<&Measurement> {
        let row = *self.antigen_pos.get(antigen_id)?;
        let col = *self.serum_pos.get(serum_id)?;
        Some(&self.cells[row][col])
    }

    pub fn is_less_than(&self, antigen_id: &str, serum_id: &str) -> Option<bool> {
        self.titer(antigen_id, serum_id)
            .map(|m| m.titer.is_less_than())
    }

    pub fn is_greater_than(&self, antigen_id: &str, serum_id: &str) -> Option<bool> {
        self.titer(antigen_id, serum_id)
            .map(|m| m.titer.is_greater_than())
    }

    /// Cells in row-major order.
    pub fn rows(&self) -> &[Vec<Measurement>] {
        &self.cells
    }

    /// The first serum raised against `antigen_id`.
    pub fn homologous_serum(&self, antigen_id: &str) -> Option<&Entry> {
        self.sera
            .iter()
            .find(|s| s.attributes.strain_id.as_deref() == Some(antigen_id))
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }
}
