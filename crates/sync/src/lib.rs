//! Pull-based synchronization between catalog nodes.
//!
//! A node serves its inventory through a [`Responder`](responder::Responder)
//! and mirrors other nodes with a [`Puller`](puller::Puller). Copies of
//! proxied nodes are garbage-collected by the
//! [`ProxyReconciler`](reconcile::ProxyReconciler), and stored digests are
//! kept fresh by the [`DigestScheduler`](digest::DigestScheduler).

pub mod config;
pub mod digest;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod puller;
pub mod reconcile;
pub mod responder;
pub mod scheduler;

pub use config::{DigestConfig, NodeDescriptor, SyncConfig};
pub use error::SyncError;
pub use scheduler::SyncScheduler;
