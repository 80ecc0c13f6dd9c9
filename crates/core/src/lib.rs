//! Core types and shared functionality for harbor.
//!
//! This crate provides:
//! - Namespaced response cache with SQLite backend
//! - Request/response snapshot types
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CachedEntry, VersionRecord, VersionState};
pub use config::{AppConfig, ConfigError, Profile};
pub use error::Error;
pub use http::{RequestDescriptor, ResponseKind, ResponseSnapshot};
