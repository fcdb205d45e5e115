//! Clip catalog core
//!
//! - [`PrefixRegistry`]: file prefix → identifier prefix + counter
//! - [`ClipCatalog`]: clip records, lookup and tagging
//! - [`PlaybackVolume`]: persisted playback volume
//! - [`reset_all`]: administrative wipe used by test/demo deployments

pub mod clips;
pub mod models;
pub mod registry;
pub mod reset;
pub mod volume;

pub use clips::ClipCatalog;
pub use models::*;
pub use registry::PrefixRegistry;
pub use reset::reset_all;
pub use volume::PlaybackVolume;
