//! CEAL Statistics - annual survey of East Asian library collections
//!
//! Member libraries report ten forms per survey year. Every form's subtotals
//! and totals come from one shared formula table, recomputed on the server
//! before anything is stored or exported.
//!
//! # Features
//!
//! - Formula table and calculator for all ten forms
//! - Year-end Excel workbook with one worksheet per form
//! - AV, e-book and e-journal subscription lists that feed form sections
//! - HTTP API with cookie-based role gating
//!
//! # Example
//!
//! ```no_run
//! use ceal_stats::excel::YearEndExporter;
//! use ceal_stats::store::load_snapshot;
//! use ceal_stats::types::ExportSelection;
//! use std::path::Path;
//!
//! let snapshot = load_snapshot(Path::new("ceal.json"))?;
//! let records = snapshot.institution_years(2024);
//!
//! let exporter = YearEndExporter::new(2024, ExportSelection::All);
//! exporter.export(&records, Path::new(&exporter.file_name()))?;
//! # Ok::<(), ceal_stats::error::CealError>(())
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod error;
pub mod excel;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{CealError, CealResult};
pub use types::{CatalogEntry, FormEntry, FormType, Language, Library, LibraryYear, ListKind};
