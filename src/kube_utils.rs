//! Kubernetes helpers shared by the client implementation and the pipeline

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, Node, NodeCondition, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::Error;

/// The "Ready" condition type for nodes
pub const CONDITION_READY: &str = "Ready";
/// The "True" status value for conditions
pub const STATUS_TRUE: &str = "True";

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Check if a node condition of the given type has status "True"
pub fn has_condition(conditions: Option<&[NodeCondition]>, condition_type: &str) -> bool {
    conditions
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == condition_type && c.status == STATUS_TRUE)
        })
        .unwrap_or(false)
}

/// Returns true if the node reports `Ready=True`
pub fn is_node_ready(node: &Node) -> bool {
    let conditions = node.status.as_ref().and_then(|s| s.conditions.as_deref());
    has_condition(conditions, CONDITION_READY)
}

/// Names of the nodes that report `Ready=True`
pub fn ready_node_names(nodes: &[Node]) -> Vec<&str> {
    nodes
        .iter()
        .filter(|node| is_node_ready(node))
        .map(|node| node.metadata.name.as_deref().unwrap_or_default())
        .collect()
}

/// Build a namespace request whose name is generated by the API server
pub fn generated_namespace(prefix: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            generate_name: Some(prefix.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Build an Opaque secret holding a single key
pub fn opaque_secret(namespace: &str, name: &str, key: &str, value: &[u8]) -> Secret {
    typed_secret(namespace, name, "Opaque", key, value)
}

/// Build a secret of the given type holding a single key
pub fn typed_secret(namespace: &str, name: &str, type_: &str, key: &str, value: &[u8]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some(type_.to_string()),
        data: Some(BTreeMap::from([(
            key.to_string(),
            ByteString(value.to_vec()),
        )])),
        ..Default::default()
    }
}

/// Get the raw bytes stored under `key`, if present
pub fn secret_data<'a>(secret: &'a Secret, key: &str) -> Option<&'a [u8]> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| v.0.as_slice())
}

/// Parse a kubeconfig document held in memory
pub fn parse_kubeconfig(raw: &[u8]) -> Result<Kubeconfig, String> {
    let text = std::str::from_utf8(raw).map_err(|e| format!("not valid UTF-8: {}", e))?;
    Kubeconfig::from_yaml(text).map_err(|e| format!("not a valid kubeconfig: {}", e))
}

/// Where a client's connection settings come from
#[derive(Clone, Debug)]
pub enum ConnectivityConfig {
    /// In-cluster config, then `KUBECONFIG`, then `~/.kube/config`
    Infer,
    /// A kubeconfig file on disk
    KubeconfigFile(std::path::PathBuf),
    /// A kubeconfig document already loaded in memory
    Kubeconfig(Kubeconfig),
}

impl ConnectivityConfig {
    /// Use the given kubeconfig path, or infer when none is set
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::KubeconfigFile(path.to_path_buf()),
            None => Self::Infer,
        }
    }
}

/// Create a kube client from connection settings with custom timeouts
pub async fn create_client_with_timeout(
    connectivity: &ConnectivityConfig,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, Error> {
    let mut config = match connectivity {
        ConnectivityConfig::Infer => Config::infer()
            .await
            .map_err(|e| Error::client_init(format!("failed to infer config: {}", e)))?,
        ConnectivityConfig::KubeconfigFile(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                Error::client_init(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            config_from_kubeconfig(kubeconfig).await?
        }
        ConnectivityConfig::Kubeconfig(kubeconfig) => {
            config_from_kubeconfig(kubeconfig.clone()).await?
        }
    };

    config.connect_timeout = Some(connect_timeout);
    config.read_timeout = Some(read_timeout);

    Client::try_from(config).map_err(|e| Error::client_init(format!("failed to create client: {}", e)))
}

async fn config_from_kubeconfig(kubeconfig: Kubeconfig) -> Result<Config, Error> {
    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| Error::client_init(format!("failed to load kubeconfig: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{node, GUEST_KUBECONFIG};

    #[test]
    fn node_readiness_requires_ready_true() {
        assert!(is_node_ready(&node("worker-0", Some("True"))));
        assert!(!is_node_ready(&node("worker-1", Some("False"))));
        assert!(!is_node_ready(&node("worker-2", Some("Unknown"))));
        assert!(!is_node_ready(&node("worker-3", None)));
    }

    #[test]
    fn ready_node_names_skips_unready_nodes() {
        let nodes = vec![
            node("worker-0", Some("True")),
            node("worker-1", Some("False")),
            node("worker-2", Some("True")),
        ];
        assert_eq!(ready_node_names(&nodes), vec!["worker-0", "worker-2"]);
        assert!(ready_node_names(&[]).is_empty());
    }

    #[test]
    fn other_true_conditions_do_not_count_as_ready() {
        let mut n = node("worker-0", None);
        n.status = Some(k8s_openapi::api::core::v1::NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "MemoryPressure".to_string(),
                status: STATUS_TRUE.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert!(!is_node_ready(&n));
    }

    #[test]
    fn generated_namespace_sets_only_prefix() {
        let ns = generated_namespace("e2e-");
        assert_eq!(ns.metadata.generate_name.as_deref(), Some("e2e-"));
        assert!(ns.metadata.name.is_none());
    }

    #[test]
    fn secret_data_reads_single_key() {
        let secret = opaque_secret("e2e-abc", "creds", "credentials", b"[default]");
        assert_eq!(secret_data(&secret, "credentials"), Some(&b"[default]"[..]));
        assert_eq!(secret_data(&secret, "missing"), None);
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(secret.metadata.namespace.as_deref(), Some("e2e-abc"));
    }

    #[test]
    fn parse_kubeconfig_accepts_valid_document() {
        let kubeconfig = parse_kubeconfig(GUEST_KUBECONFIG.as_bytes()).expect("valid kubeconfig");
        assert_eq!(kubeconfig.current_context.as_deref(), Some("guest"));
        assert_eq!(kubeconfig.clusters.len(), 1);
    }

    #[test]
    fn parse_kubeconfig_rejects_garbage() {
        assert!(parse_kubeconfig(&[0xff, 0xfe, 0x00]).is_err());
        assert!(parse_kubeconfig(b"clusters: [unterminated").is_err());
    }

    #[test]
    fn connectivity_from_path() {
        assert!(matches!(
            ConnectivityConfig::from_path(None),
            ConnectivityConfig::Infer
        ));
        let path = std::path::PathBuf::from("/tmp/mgmt-kubeconfig");
        assert!(matches!(
            ConnectivityConfig::from_path(Some(&path)),
            ConnectivityConfig::KubeconfigFile(p) if p == path
        ));
    }
}
