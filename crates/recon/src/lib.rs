//! `icatadm-recon`: size/count reconciliation for ICAT.
//!
//! Recomputes `fileCount` and `fileSize` of Datasets and Investigations from
//! their Datafiles and compares them with the stored values. Pure engine: the
//! catalog comes in through [`Catalog`], output goes out through
//! [`Reporter`]. No HTTP or CLI dependencies.

pub mod catalog;
pub mod classify;
pub mod engine;
pub mod error;
pub mod model;
pub mod report;
pub mod selector;

pub use catalog::{Catalog, Records, SIZE_ATTRIBUTES};
pub use classify::{FieldStatus, Finding};
pub use engine::{run, CheckOptions};
pub use error::CheckError;
pub use model::{CheckSummary, Dataset, Investigation, Level, SizeField, StoredSizes, Totals};
pub use report::{Findings, LogReporter, Reporter};
pub use selector::InvestigationSelector;
