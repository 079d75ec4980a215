//! # lec-sync
//!
//! The reconciliation and synchronization core for Lectern.
//!
//! Mirrors the store's course, assignment, and instance collections through
//! live subscriptions, derives the active course's assignments, and makes
//! sure exactly one instance exists for every (assignment, student) pairing
//! the student observes:
//!
//! - [`subscriptions`]: slot lifecycles and generations
//! - [`cache`]: versioned mirror with the two-phase instance overlay
//! - [`selector`]: memoized active selection
//! - [`reconcile`]: partition and idempotent batched creation
//! - [`controller`]: the event loop tying them together
//!
//! The core is generic over [`CollectionGateway`](lec_core::gateway::CollectionGateway);
//! `lec-store` provides the libSQL implementation.

pub mod cache;
pub mod controller;
pub mod error;
pub mod reconcile;
pub mod selector;
pub mod submission;
pub mod subscriptions;

pub use controller::{SyncController, SyncHandle, SyncSettings};
pub use error::SyncError;
