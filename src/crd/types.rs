//! Shared types for HostedCluster specs and status

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to a Secret in the same namespace as the referencing object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretReference {
    /// Name of the Secret
    pub name: String,
}

impl SecretReference {
    /// Create a reference to the named secret
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Release payload selection
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Release {
    /// Pull spec of the release image
    pub image: String,
}

/// Version rollout status of a guest cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersionStatus {
    /// Release the cluster is converging to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<Release>,

    /// Versions applied so far, newest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<UpdateHistory>,
}

/// A single entry in the version history
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHistory {
    /// Rollout state ("Completed" or "Partial")
    pub state: String,

    /// Version string of the release
    #[serde(default)]
    pub version: String,

    /// Pull spec of the release image
    pub image: String,
}
