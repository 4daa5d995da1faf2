//! `colsync-recon` — Two-table column reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables, returns a report (and, in
//! update mode, the rewritten target table). No CLI or IO dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod mask;
pub mod model;
pub mod report;

pub use config::JobConfig;
pub use engine::run;
pub use error::ReconError;
pub use model::{Mode, ReconOptions, ReconReport, RowRange, Selection, TargetColumn};
