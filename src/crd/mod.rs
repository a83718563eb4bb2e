//! Custom Resource Definitions used by the quick start
//!
//! Only the subset of the HostedCluster API the quick start reads or writes
//! is modeled here.

mod cluster;
mod types;

pub use cluster::{HostedCluster, HostedClusterSpec, HostedClusterStatus};
pub use types::{ClusterVersionStatus, Release, SecretReference, UpdateHistory};
