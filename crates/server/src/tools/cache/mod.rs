//! Cache inspection tools.

pub mod get;
pub mod list;

pub use get::{CacheGetOutput, CacheGetParams};
pub use list::{CacheListOutput, CacheListParams};
