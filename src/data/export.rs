use std::collections::HashSet;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::matrix::TiterMatrix;
use super::model::{Entry, EntryKind};
use super::titer::{format_number, Measurement};

// ---------------------------------------------------------------------------
// Export configuration
// ---------------------------------------------------------------------------

/// A labelled row or column of caller-supplied values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoration {
    pub label: String,
    pub values: Vec<String>,
}

impl Decoration {
    pub fn new(label: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

/// How a [`TiterMatrix`] is projected into a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Write raw tokens verbatim. Overrides `thresholded` and `do_rounding`.
    pub as_is: bool,
    /// Keep censored cells as `<b` / `>b` in the presentation table.
    pub thresholded: bool,
    /// Round numeric values to the nearest integer.
    pub do_rounding: bool,
    /// Rows placed above the titers; each aligns with the serum columns.
    pub extra_rows: Vec<Decoration>,
    /// Columns placed left of the titers; each aligns with the antigen rows.
    pub extra_columns: Vec<Decoration>,
    /// Add an `id` row and an `id` column.
    pub add_ids: bool,
    /// Add a `serum strain id` row.
    pub add_serum_strain_ids: bool,
    /// Row headers to use instead of antigen long names.
    pub antigen_names: Option<Vec<String>>,
    /// Column headers to use instead of serum long names.
    pub serum_names: Option<Vec<String>>,
    /// Antigen ids to export, in this order.
    pub antigen_order: Option<Vec<String>>,
    /// Serum ids to export, in this order.
    pub serum_order: Option<Vec<String>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    #[error("{what} has {actual} values, expected {expected}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("{axis} id `{id}` is not part of the titer table")]
    UnknownId { axis: EntryKind, id: String },

    #[error("{axis} id `{id}` appears twice in the requested order")]
    RepeatedId { axis: EntryKind, id: String },
}

// ---------------------------------------------------------------------------
// Export output
// ---------------------------------------------------------------------------

/// Presentation table: decoration plus titers, all as text.
///
/// `cells` has `index.len()` rows of `columns.len()` values. The titer body
/// starts at `(body_row, body_col)`; cells where decoration rows and columns
/// cross are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedTable {
    pub columns: Vec<String>,
    pub index: Vec<String>,
    pub cells: Vec<Vec<String>>,
    pub body_row: usize,
    pub body_col: usize,
}

impl ExportedTable {
    /// The titer block without decoration.
    pub fn body(&self) -> Vec<&[String]> {
        self.cells[self.body_row..]
            .iter()
            .map(|row| &row[self.body_col..])
            .collect()
    }

    /// Write the table as CSV with an empty corner header.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(std::iter::once("").chain(self.columns.iter().map(String::as_str)))?;
        for (label, row) in self.index.iter().zip(&self.cells) {
            let record = std::iter::once(label.as_str()).chain(row.iter().map(String::as_str));
            out.write_record(record)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Numeric titers aligned with [`ExportedTable::body`]. `None` is not measured.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericMatrix {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub table: ExportedTable,
    pub numeric: NumericMatrix,
}

// ---------------------------------------------------------------------------
// MatrixExporter
// ---------------------------------------------------------------------------

/// Projects a validated matrix into a table. Never mutates the matrix.
#[derive(Debug, Clone, Copy)]
pub struct MatrixExporter<'a> {
    matrix: &'a TiterMatrix,
}

impl<'a> MatrixExporter<'a> {
    pub fn new(matrix: &'a TiterMatrix) -> Self {
        Self { matrix }
    }

    pub fn export(&self, config: &ExportConfig) -> Result<Export, ExportError> {
        let antigens = self.ordered(EntryKind::Antigen, config.antigen_order.as_deref())?;
        let sera = self.ordered(EntryKind::Serum, config.serum_order.as_deref())?;

        let mut extra_rows = config.extra_rows.clone();
        let mut extra_columns = config.extra_columns.clone();
        for row in &extra_rows {
            check_len(&format!("extra row `{}`", row.label), sera.len(), row.values.len())?;
        }
        for column in &extra_columns {
            check_len(
                &format!("extra column `{}`", column.label),
                antigens.len(),
                column.values.len(),
            )?;
        }
        if config.add_ids {
            set_decoration(&mut extra_columns, Decoration::new("id", ids(&antigens)));
            set_decoration(&mut extra_rows, Decoration::new("id", ids(&sera)));
        }
        if config.add_serum_strain_ids {
            let strain_ids = sera
                .iter()
                .map(|s| s.attributes.strain_id.clone().unwrap_or_default())
                .collect();
            set_decoration(&mut extra_rows, Decoration::new("serum strain id", strain_ids));
        }

        let antigen_names = headers("antigen names", &antigens, config.antigen_names.as_deref())?;
        let serum_names = headers("serum names", &sera, config.serum_names.as_deref())?;

        let body_row = extra_rows.len();
        let body_col = extra_columns.len();
        let width = body_col + sera.len();

        let mut cells = vec![vec![String::new(); width]; body_row + antigens.len()];
        for (r, row) in extra_rows.iter().enumerate() {
            for (j, value) in row.values.iter().enumerate() {
                cells[r][body_col + j] = value.clone();
            }
        }
        for (c, column) in extra_columns.iter().enumerate() {
            for (i, value) in column.values.iter().enumerate() {
                cells[body_row + i][c] = value.clone();
            }
        }

        let mut values = Vec::with_capacity(antigens.len());
        for (i, antigen) in antigens.iter().enumerate() {
            let mut numeric_row = Vec::with_capacity(sera.len());
            for (j, serum) in sera.iter().enumerate() {
                let measurement = self.measurement(antigen, serum);
                cells[body_row + i][body_col + j] = render(measurement, config);
                numeric_row.push(numeric(measurement, config));
            }
            values.push(numeric_row);
        }

        let columns = extra_columns
            .iter()
            .map(|c| c.label.clone())
            .chain(serum_names.iter().cloned())
            .collect();
        let index = extra_rows
            .iter()
            .map(|r| r.label.clone())
            .chain(antigen_names.iter().cloned())
            .collect();

        log::debug!(
            "Exported {}x{} titer table with {} decoration rows and {} decoration columns",
            antigens.len(),
            sera.len(),
            body_row,
            body_col
        );

        Ok(Export {
            table: ExportedTable {
                columns,
                index,
                cells,
                body_row,
                body_col,
            },
            numeric: NumericMatrix {
                row_labels: antigen_names,
                column_labels: serum_names,
                values,
            },
        })
    }

    fn ordered(
        &self,
        axis: EntryKind,
        order: Option<&[String]>,
    ) -> Result<Vec<&'a Entry>, ExportError> {
        let matrix: &'a TiterMatrix = self.matrix;
        let Some(order) = order else {
            return Ok(match axis {
                EntryKind::Antigen => matrix.antigens().iter().collect(),
                EntryKind::Serum => matrix.sera().iter().collect(),
            });
        };
        let lookup = |id: &str| match axis {
            EntryKind::Antigen => matrix.antigen(id),
            EntryKind::Serum => matrix.serum(id),
        };

        let mut seen = HashSet::new();
        order
            .iter()
            .map(|id| {
                if !seen.insert(id.as_str()) {
                    return Err(ExportError::RepeatedId {
                        axis,
                        id: id.clone(),
                    });
                }
                lookup(id).ok_or_else(|| ExportError::UnknownId {
                    axis,
                    id: id.clone(),
                })
            })
            .collect()
    }

    fn measurement(&self, antigen: &Entry, serum: &Entry) -> &'a Measurement {
        let matrix: &'a TiterMatrix = self.matrix;
        let row = matrix.antigen_pos[&antigen.id];
        let col = matrix.serum_pos[&serum.id];
        &matrix.cells[row][col]
    }
}

fn check_len(what: &str, expected: usize, actual: usize) -> Result<(), ExportError> {
    if expected != actual {
        return Err(ExportError::ShapeMismatch {
            what: what.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Replace the decoration carrying the same label, or append a new one.
fn set_decoration(decorations: &mut Vec<Decoration>, decoration: Decoration) {
    match decorations.iter_mut().find(|d| d.label == decoration.label) {
        Some(existing) => *existing = decoration,
        None => decorations.push(decoration),
    }
}

fn ids(entries: &[&Entry]) -> Vec<String> {
    entries.iter().map(|e| e.id.clone()).collect()
}

fn headers(
    what: &str,
    entries: &[&Entry],
    names: Option<&[String]>,
) -> Result<Vec<String>, ExportError> {
    match names {
        Some(names) => {
            check_len(what, entries.len(), names.len())?;
            Ok(names.to_vec())
        }
        None => Ok(entries.iter().map(|e| e.long.clone()).collect()),
    }
}

fn numeric(measurement: &Measurement, config: &ExportConfig) -> Option<f64> {
    let value = measurement.titer.numeric()?;
    Some(if config.do_rounding { value.round() } else { value })
}

fn render(measurement: &Measurement, config: &ExportConfig) -> String {
    if config.as_is {
        return measurement.raw.clone();
    }
    if config.thresholded && measurement.titer.is_censored() {
        return measurement.titer.to_string();
    }
    match numeric(measurement, config) {
        Some(value) => format_number(value),
        None => "*".to_string(),
    }
}
