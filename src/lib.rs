//! Genlib Import - GEDCOM-import för släktforskning
//!
//! Läser GEDCOM 5.5/5.5.1, validerar filen och skriver personer, familjer,
//! källor, arkiv, anteckningar och media till ett släktträd i SQLite.

pub mod db;
pub mod gedcom;
pub mod import;
pub mod models;
pub mod services;
pub mod utils;

// Re-exports
pub use db::{Database, ImportStore};
pub use import::{ImportController, ImportError, ImportResult, JobRegistry, JobRun, JobStore};
pub use models::*;
