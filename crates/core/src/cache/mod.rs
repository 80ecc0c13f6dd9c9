//! SQLite-backed store for named response caches.
//!
//! This module provides a persistent store of cache namespaces using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Namespaces that are opened lazily and deleted as a whole
//! - Entries keyed by a SHA-256 of method and URL
//! - Transactional bulk writes for install-time population
//! - Controller version records
//! - Automatic schema migrations

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;
pub mod versions;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use versions::{VersionRecord, VersionState};
