//! # SubTrack Store
//!
//! SQLite implementation of the storage port. Survives restarts, supports
//! concurrent access, and gives the renewal transition its exclusive write
//! lock via immediate transactions.

pub mod sqlite;

pub use sqlite::SqliteStore;
