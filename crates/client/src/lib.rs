//! Client code for harbor.
//!
//! This crate provides the upstream fetch pipeline, request routing, the
//! offline cache controller, and controller version registration.

pub mod controller;
pub mod fetch;
pub mod registration;
pub mod routing;

#[cfg(test)]
mod testing;

pub use controller::{
    ActivationReport, Controller, ControllerConfig, Event, EventFuture, EventKind, EventOutcome, FetchOutcome,
    InstallReport, ResponseSource, RetentionRule, RoutingPolicy, Served, SyncOutcome,
};
pub use fetch::{FetchClient, FetchConfig, Upstream};
pub use registration::{RegisterOutcome, Registration, RegistrationStatus};
pub use routing::{AllowList, Route, classify};
