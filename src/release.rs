//! Default release image lookup
//!
//! When no release image is given, the quick start tests the latest stable
//! release published on the OpenShift release stream.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// Release stream endpoint for the latest stable release
pub const DEFAULT_RELEASE_STREAM_URL: &str =
    "https://amd64.ocp.releases.ci.openshift.org/api/v1/releasestream/4-stable/latest";

/// Trait for resolving the release image used when none is supplied
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DefaultImageResolver: Send + Sync {
    /// Look up the default release image pull spec
    async fn lookup(&self) -> Result<String, Error>;
}

/// A release as described by the release stream API
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Release name, e.g. "4.7.0"
    pub name: String,
    /// Pull spec of the release image
    pub pull_spec: String,
}

/// Resolver that queries the release stream over HTTP
pub struct ReleaseStreamResolver {
    url: String,
    http: reqwest::Client,
}

impl ReleaseStreamResolver {
    /// Create a resolver for the given release stream URL
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::resolution(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl DefaultImageResolver for ReleaseStreamResolver {
    async fn lookup(&self) -> Result<String, Error> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::resolution(format!("release stream request failed: {}", e)))?;

        let release: ReleaseInfo = response
            .json()
            .await
            .map_err(|e| Error::resolution(format!("invalid release stream response: {}", e)))?;

        debug!(release = %release.name, pull_spec = %release.pull_spec, "resolved default release");
        Ok(release.pull_spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_info_parses_stream_document() {
        let release: ReleaseInfo = serde_json::from_str(
            r#"{
                "name": "4.7.0",
                "phase": "Accepted",
                "pullSpec": "quay.io/openshift-release-dev/ocp-release:4.7.0-x86_64",
                "downloadURL": "https://example.com/4.7.0"
            }"#,
        )
        .expect("parse");
        assert_eq!(release.name, "4.7.0");
        assert_eq!(
            release.pull_spec,
            "quay.io/openshift-release-dev/ocp-release:4.7.0-x86_64"
        );
    }

    #[test]
    fn missing_pull_spec_is_rejected() {
        let result: Result<ReleaseInfo, _> = serde_json::from_str(r#"{"name": "4.7.0"}"#);
        assert!(result.is_err());
    }
}
