//! # Clipcat Common Library
//!
//! Shared code for the clip catalog service and its admin tooling:
//! - Document store abstraction and the SQLite implementation
//! - Prefix registry (identifier allocation)
//! - Clip catalog (lookup, tagging)
//! - Playback volume setting and catalog reset
//! - Drop-folder ingestion workflow
//! - Configuration loading

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;

pub use catalog::{Clip, ClipCatalog, PlaybackVolume, PrefixMapping, PrefixRegistry};
pub use error::{Error, Result};
pub use ingest::IngestWorkflow;
