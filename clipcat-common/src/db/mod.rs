//! Document persistence
//!
//! The catalog only talks to storage through [`DocumentStore`]. The SQLite
//! implementation keeps every collection as JSON documents in one table.

pub mod init;
pub mod sqlite;
pub mod store;

pub use init::init_database;
pub use sqlite::SqliteDocumentStore;
pub use store::*;
