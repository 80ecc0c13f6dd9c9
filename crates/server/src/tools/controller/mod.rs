//! Controller tools: lifecycle, request interception, background sync.

pub mod fetch;
pub mod lifecycle;
pub mod sync;

pub use fetch::{ControllerFetchOutput, ControllerFetchParams};
pub use lifecycle::{ControllerRegisterParams, ControllerStatusOutput};
pub use sync::ControllerSyncParams;
