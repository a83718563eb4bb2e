//! Quick-start acceptance test for hosted clusters
//!
//! Provisions a hosted guest cluster on a management cluster the way the
//! quick-start guide does, waits until its nodes are ready, and tears
//! everything down again.
//!
//! # Architecture
//!
//! A run has two parts:
//! - Building a [`context::RunContext`] from credential files and a release image
//! - Driving the [`provision::QuickStart`] pipeline inside a per-run workspace
//!   namespace that is deleted on every exit path
//!
//! # Modules
//!
//! - [`context`] - Input validation and the immutable run context
//! - [`provision`] - The provisioning pipeline and its outcome report
//! - [`workspace`] - Scoped creation and deletion of the workspace namespace
//! - [`poll`] - Bounded polling used by every readiness wait
//! - [`client`] - Kubernetes client traits and their kube-rs implementations
//! - [`crd`] - The HostedCluster custom resource
//! - [`fixtures`] - The resources created for a run
//! - [`release`] - Default release image lookup
//! - [`kube_utils`] - Shared Kubernetes helpers
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod client;
pub mod context;
pub mod crd;
pub mod error;
pub mod fixtures;
pub mod kube_utils;
pub mod poll;
pub mod provision;
pub mod release;
pub mod workspace;

#[cfg(test)]
mod testing;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
