//! Deadline alert monitor.
//!
//! Polls a source of tracked entities, flags the ones at or past their
//! deadline, publishes the alert list to subscribers and raises a one-time,
//! staggered notification burst on first load.

pub mod alerts;
pub mod collectors;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod errors;
pub mod models;
pub mod util;

pub use alerts::{evaluate, Alert, Severity};
pub use coordinator::{CycleOutcome, Lifecycle, RefreshCoordinator};
pub use dispatcher::{DispatchPolicy, NotificationDispatcher};
pub use errors::{CoordinatorError, SourceError, StoreError};
pub use models::entity::{Owner, TrackedEntity};
