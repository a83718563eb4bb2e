//! Shared fixtures for unit tests

use k8s_openapi::api::core::v1::{Namespace, Node, NodeCondition, NodeStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::Error;

/// Kubeconfig document a hosted cluster would publish for its guest API server
pub const GUEST_KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: guest
  cluster:
    server: https://api.example-e2e-abc.example.com:6443
    insecure-skip-tls-verify: true
users:
- name: admin
  user:
    token: not-a-real-token
contexts:
- name: guest
  context:
    cluster: guest
    user: admin
current-context: guest
"#;

/// An API error with the given status code
pub fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube {
        source: kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("request failed: {}", reason),
            reason: reason.to_string(),
            code,
        }),
    }
}

/// The error the API server returns for a missing object
pub fn not_found(resource: &str, name: &str) -> Error {
    Error::Kube {
        source: kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} \"{}\" not found", resource, name),
            reason: "NotFound".to_string(),
            code: 404,
        }),
    }
}

/// A transient connectivity error
pub fn unavailable() -> Error {
    api_error(503, "ServiceUnavailable")
}

/// A namespace as returned by the API server after creation
pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            generate_name: Some("e2e-".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A node with an optional Ready condition status
pub fn node(name: &str, ready: Option<&str>) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: ready.map(|status| NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: status.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `count` nodes that all report Ready=True
pub fn ready_nodes(count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| node(&format!("worker-{}", i), Some("True")))
        .collect()
}
