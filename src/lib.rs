//! Resolve antigen and serum records and assemble validated titer tables.

pub mod data;

pub use data::builder::{BuildError, ConsistencyBuilder, ResultSet};
pub use data::city::{City, CityTable};
pub use data::export::{
    Decoration, Export, ExportConfig, ExportError, ExportedTable, MatrixExporter, NumericMatrix,
};
pub use data::index::{HealthIssue, IndexError, RecordIndex};
pub use data::matrix::{BuildWarning, TiterMatrix};
pub use data::model::{AttributeValue, Attributes, Entry, EntryError, EntryKind, Record};
pub use data::search::{FieldHit, SearchConfig, SearchError};
pub use data::titer::{Measurement, Titer, TiterParseError, TiterToken};
