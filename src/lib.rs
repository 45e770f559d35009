//! jurisprudencia: capture, structure and store Portuguese court decisions
//!
//! Captured pages or pasted text are turned into structured [`LegalRecord`]s
//! by a heuristic extractor and persisted in either a user-granted directory
//! or an embedded SQLite database.

pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use extract::{ExtractionError, Extractor};
pub use ingest::{CaptureOutcome, Ingestor};
pub use models::{CapturedDocument, LegalRecord, RawCapture, UNKNOWN};
pub use store::{StorageMode, Store};
