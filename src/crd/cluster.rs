//! HostedCluster Custom Resource Definition
//!
//! A HostedCluster describes a guest cluster whose control plane runs inside
//! the management cluster. The quick start only creates it and reads its
//! status; the hosting operator drives it to readiness.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterVersionStatus, Release, SecretReference};

/// Specification for a HostedCluster
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "hypershift.openshift.io",
    version = "v1alpha1",
    kind = "HostedCluster",
    plural = "hostedclusters",
    shortname = "hc",
    status = "HostedClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.version.history[0].version"}"#,
    printcolumn = r#"{"name":"KubeConfig","type":"string","jsonPath":".status.kubeconfig.name"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HostedClusterSpec {
    /// Release payload the guest cluster runs
    pub release: Release,

    /// Number of compute nodes the guest cluster starts with
    pub initial_compute_replicas: u32,

    /// Secret holding the image pull secret
    pub pull_secret: SecretReference,

    /// Secret holding cloud provider credentials
    pub provider_creds: SecretReference,

    /// Secret holding the SSH public key installed on nodes
    pub ssh_key: SecretReference,
}

impl HostedClusterSpec {
    /// Names of all secrets this spec references
    pub fn referenced_secrets(&self) -> [&str; 3] {
        [
            self.pull_secret.name.as_str(),
            self.provider_creds.name.as_str(),
            self.ssh_key.name.as_str(),
        ]
    }
}

/// Status for a HostedCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostedClusterStatus {
    /// Secret containing the guest cluster admin kubeconfig, once published
    #[serde(
        default,
        rename = "kubeconfig",
        skip_serializing_if = "Option::is_none"
    )]
    pub kube_config: Option<SecretReference>,

    /// Rollout history of the guest cluster version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ClusterVersionStatus>,
}

impl HostedCluster {
    /// Name of the published kubeconfig secret, if any
    pub fn kubeconfig_secret_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.kube_config.as_ref())
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Compute replicas requested by the spec
    pub fn requested_replicas(&self) -> u32 {
        self.spec.initial_compute_replicas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn generated_crd_is_namespaced_under_hypershift_group() {
        let crd = HostedCluster::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("hostedclusters.hypershift.openshift.io")
        );
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.short_names, Some(vec!["hc".to_string()]));
        let yaml = serde_yaml::to_string(&crd).expect("render crd");
        assert!(yaml.contains("initialComputeReplicas"));
    }

    fn sample_cluster() -> HostedCluster {
        HostedCluster::new(
            "example-e2e-abc",
            HostedClusterSpec {
                release: Release {
                    image: "example:v1".to_string(),
                },
                initial_compute_replicas: 2,
                pull_secret: SecretReference::new("example-e2e-abc-pull-secret"),
                provider_creds: SecretReference::new("example-e2e-abc-provider-creds"),
                ssh_key: SecretReference::new("example-e2e-abc-ssh-key"),
            },
        )
    }

    #[test]
    fn spec_serializes_with_api_field_names() {
        let json = serde_json::to_value(&sample_cluster()).expect("serialize");
        assert_eq!(json["apiVersion"], "hypershift.openshift.io/v1alpha1");
        assert_eq!(json["kind"], "HostedCluster");
        assert_eq!(json["spec"]["initialComputeReplicas"], 2);
        assert_eq!(json["spec"]["release"]["image"], "example:v1");
        assert_eq!(
            json["spec"]["providerCreds"]["name"],
            "example-e2e-abc-provider-creds"
        );
    }

    #[test]
    fn kubeconfig_reference_is_read_from_status() {
        let mut cluster = sample_cluster();
        assert_eq!(cluster.kubeconfig_secret_name(), None);

        cluster.status = Some(HostedClusterStatus::default());
        assert_eq!(cluster.kubeconfig_secret_name(), None);

        let status: HostedClusterStatus =
            serde_json::from_value(serde_json::json!({ "kubeconfig": { "name": "admin-kubeconfig" } }))
                .expect("deserialize");
        cluster.status = Some(status);
        assert_eq!(cluster.kubeconfig_secret_name(), Some("admin-kubeconfig"));
    }

    #[test]
    fn empty_kubeconfig_reference_is_not_published() {
        let mut cluster = sample_cluster();
        cluster.status = Some(HostedClusterStatus {
            kube_config: Some(SecretReference::new("")),
            ..Default::default()
        });
        assert_eq!(cluster.kubeconfig_secret_name(), None);
    }

    #[test]
    fn spec_references_all_credential_secrets() {
        let cluster = sample_cluster();
        assert_eq!(
            cluster.spec.referenced_secrets(),
            [
                "example-e2e-abc-pull-secret",
                "example-e2e-abc-provider-creds",
                "example-e2e-abc-ssh-key"
            ]
        );
        assert_eq!(cluster.requested_replicas(), 2);
    }
}
