//! Data layer: records, lookup, titer tables and export.
//!
//! Architecture:
//! ```text
//!  antigens.json   sera.json          results.json
//!        │              │                   │
//!        ▼              ▼                   ▼
//!   ┌──────────┐   ┌──────────┐       ┌───────────┐
//!   │  loader  │   │  loader  │       │  loader   │  JSON / CSV → Record, ResultSet
//!   └──────────┘   └──────────┘       └───────────┘
//!        │              │                   │
//!        ▼              ▼                   │
//!   ┌──────────────────────────┐            │
//!   │ RecordIndex (+ search)   │  id / alias / deep lookup
//!   └──────────────────────────┘            │
//!        │              │                   │
//!        ▼              ▼                   ▼
//!   ┌────────────────────────────────────────────┐
//!   │ ConsistencyBuilder   resolve ids → TiterMatrix
//!   └────────────────────────────────────────────┘
//!        │
//!        ▼
//!   ┌────────────────┐
//!   │ MatrixExporter │  decoration + censoring policy → table, numbers
//!   └────────────────┘
//! ```

pub mod alias;
pub mod builder;
pub mod city;
pub mod export;
pub mod index;
pub mod loader;
pub mod matrix;
pub mod model;
pub mod search;
pub mod titer;
