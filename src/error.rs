//! Error types for the quick-start acceptance test
//!
//! Each variant maps to one failure kind a run can report. Variants carry
//! the input, resource or stage that failed so a harness can tell them apart
//! without parsing messages.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::provision::Stage;

/// Main error type for quick-start runs
#[derive(Debug, Error)]
pub enum Error {
    /// A required credential or the release image was absent or empty
    #[error("missing input: {input} ({reason})")]
    MissingInput {
        /// Which input is missing (e.g. "pull secret")
        input: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The default release image could not be looked up
    #[error("couldn't look up default release image: {message}")]
    ResolutionFailure {
        /// Description of what failed
        message: String,
    },

    /// A Kubernetes client handle could not be constructed
    #[error("failed to create kube client: {message}")]
    ClientInitFailure {
        /// Description of what failed
        message: String,
    },

    /// Creating the workspace or a member of the resource set failed
    #[error("failed to create {resource}: {source}")]
    CreateFailure {
        /// The resource that could not be created (e.g. "secret e2e-abc/foo")
        resource: String,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },

    /// The guest access secret did not hold a usable kubeconfig
    #[error("guest kubeconfig secret {secret} is malformed: {message}")]
    MalformedSecret {
        /// namespace/name of the secret
        secret: String,
        /// Description of what is wrong with it
        message: String,
    },

    /// A readiness poll exhausted its deadline
    #[error("timed out after {timeout:?} waiting for {stage}")]
    ReadinessTimeout {
        /// The stage whose condition never became true
        stage: Stage,
        /// The deadline that was exhausted
        timeout: Duration,
    },

    /// The workspace delete call itself failed
    #[error("failed to delete namespace {namespace}: {source}")]
    CleanupFailure {
        /// Name of the workspace namespace
        namespace: String,
        /// The underlying error
        #[source]
        source: Box<Error>,
    },

    /// The workspace was not confirmed gone before the deadline
    #[error("timed out after {timeout:?} waiting for namespace {namespace} to be deleted")]
    CleanupTimeout {
        /// Name of the workspace namespace
        namespace: String,
        /// The deadline that was exhausted
        timeout: Duration,
    },

    /// Both the pipeline and its cleanup failed
    #[error("{pipeline}; additionally cleanup failed: {cleanup}")]
    PipelineAndCleanup {
        /// Error that aborted the pipeline
        pipeline: Box<Error>,
        /// Error raised by the compensating cleanup
        cleanup: Box<Error>,
    },

    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid fixture or CLI options
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a missing-input error for an empty value
    pub fn missing(input: &'static str) -> Self {
        Self::MissingInput {
            input,
            reason: "value is empty".to_string(),
        }
    }

    /// Create a missing-input error for a file that could not be read
    pub fn unreadable(input: &'static str, path: &Path, err: std::io::Error) -> Self {
        Self::MissingInput {
            input,
            reason: format!("couldn't read {}: {}", path.display(), err),
        }
    }

    /// Create a client construction error
    pub fn client_init(msg: impl Into<String>) -> Self {
        Self::ClientInitFailure {
            message: msg.into(),
        }
    }

    /// Create a default-image resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::ResolutionFailure {
            message: msg.into(),
        }
    }

    /// Wrap an error raised while creating `resource`
    pub fn create_failed(resource: impl Into<String>, source: Error) -> Self {
        Self::CreateFailure {
            resource: resource.into(),
            source: Box::new(source),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns true if the API server reported the object as not found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Kube {
                source: kube::Error::Api(ae)
            } if ae.code == 404
        )
    }

    /// Returns true if this error came from the compensating cleanup
    pub fn is_cleanup(&self) -> bool {
        matches!(
            self,
            Error::CleanupFailure { .. } | Error::CleanupTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{api_error, not_found};

    #[test]
    fn not_found_is_detected_from_status_code() {
        assert!(not_found("namespaces", "e2e-abc").is_not_found());
        assert!(!api_error(403, "Forbidden").is_not_found());
        assert!(!Error::validation("replicas must be positive").is_not_found());
    }

    #[test]
    fn not_found_is_not_detected_through_wrappers() {
        let err = Error::create_failed("namespace", not_found("namespaces", "e2e-abc"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn missing_input_names_the_field() {
        let err = Error::missing("SSH key");
        assert!(err.to_string().contains("SSH key"));
        assert!(matches!(err, Error::MissingInput { input: "SSH key", .. }));

        let path = std::path::PathBuf::from("/nonexistent/pull-secret");
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = Error::unreadable("pull secret", &path, io);
        assert!(err.to_string().contains("/nonexistent/pull-secret"));
    }

    #[test]
    fn timeouts_identify_their_stage() {
        let err = Error::ReadinessTimeout {
            stage: Stage::KubeConfig,
            timeout: Duration::from_secs(300),
        };
        assert!(err.to_string().contains("guest kubeconfig"));
        assert!(!err.is_cleanup());

        let err = Error::CleanupTimeout {
            namespace: "e2e-abc".to_string(),
            timeout: Duration::from_secs(600),
        };
        assert!(err.is_cleanup());
        assert!(err.to_string().contains("e2e-abc"));
    }

    #[test]
    fn combined_failure_mentions_both_errors() {
        let err = Error::PipelineAndCleanup {
            pipeline: Box::new(Error::ReadinessTimeout {
                stage: Stage::NodesReady,
                timeout: Duration::from_secs(600),
            }),
            cleanup: Box::new(Error::CleanupTimeout {
                namespace: "e2e-abc".to_string(),
                timeout: Duration::from_secs(600),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("guest nodes"));
        assert!(msg.contains("e2e-abc"));
    }
}
