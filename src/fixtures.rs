//! Resources created for a quick-start run
//!
//! A [`FixtureFactory`] turns a run context and workspace name into the
//! fixed [`ResourceSet`]. Building it has no side effects; nothing reaches
//! the API server until the pipeline creates the objects.

use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;

use crate::context::RunContext;
use crate::crd::{HostedCluster, HostedClusterSpec, Release, SecretReference};
use crate::kube_utils::{opaque_secret, typed_secret};
use crate::Error;

/// Data key of the pull secret
pub const PULL_SECRET_KEY: &str = ".dockerconfigjson";
/// Secret type of the pull secret
pub const PULL_SECRET_TYPE: &str = "kubernetes.io/dockerconfigjson";
/// Data key of the AWS credentials secret
pub const AWS_CREDENTIALS_KEY: &str = "credentials";
/// Data key of the SSH key secret
pub const SSH_KEY_KEY: &str = "id_rsa.pub";

/// Default number of compute nodes requested for the guest cluster
pub const DEFAULT_NODE_POOL_REPLICAS: u32 = 2;

/// The objects created for one run, in creation order
#[derive(Clone, Debug)]
pub struct ResourceSet {
    /// Image pull secret
    pub pull_secret: Secret,
    /// Cloud provider credentials
    pub aws_credentials: Secret,
    /// SSH public key for nodes
    pub ssh_key: Secret,
    /// The cluster descriptor, which references the three secrets by name
    pub cluster: HostedCluster,
}

impl ResourceSet {
    /// The credential secrets, in the order they must be created
    pub fn secrets(&self) -> [&Secret; 3] {
        [&self.pull_secret, &self.aws_credentials, &self.ssh_key]
    }

    /// Render all objects as a multi-document YAML stream
    pub fn to_yaml(&self) -> Result<String, Error> {
        let mut docs = Vec::with_capacity(4);
        for secret in self.secrets() {
            docs.push(serde_yaml::to_string(secret).map_err(|e| Error::validation(e.to_string()))?);
        }
        docs.push(
            serde_yaml::to_string(&self.cluster).map_err(|e| Error::validation(e.to_string()))?,
        );
        Ok(docs.join("---\n"))
    }
}

/// Produces the resource set for a run
pub trait FixtureFactory: Send + Sync {
    /// Build the resources to create inside `namespace`
    fn resources(&self, ctx: &RunContext, namespace: &str) -> ResourceSet;
}

/// The example cluster from the quick-start guide
#[derive(Clone, Debug)]
pub struct ExampleFixtures {
    node_pool_replicas: u32,
}

impl ExampleFixtures {
    /// Request `node_pool_replicas` compute nodes; must be at least one
    pub fn new(node_pool_replicas: u32) -> Result<Self, Error> {
        if node_pool_replicas == 0 {
            return Err(Error::validation("node pool replicas must be at least 1"));
        }
        Ok(Self { node_pool_replicas })
    }

    /// Build resources from raw parts, without a run context
    pub fn build(
        &self,
        namespace: &str,
        release_image: &str,
        pull_secret: &[u8],
        aws_credentials: &[u8],
        ssh_key: &[u8],
    ) -> ResourceSet {
        let name = cluster_name(namespace);
        let pull_secret_name = format!("{}-pull-secret", name);
        let creds_name = format!("{}-provider-creds", name);
        let ssh_key_name = format!("{}-ssh-key", name);

        let mut cluster = HostedCluster::new(
            &name,
            HostedClusterSpec {
                release: Release {
                    image: release_image.to_string(),
                },
                initial_compute_replicas: self.node_pool_replicas,
                pull_secret: SecretReference::new(&pull_secret_name),
                provider_creds: SecretReference::new(&creds_name),
                ssh_key: SecretReference::new(&ssh_key_name),
            },
        );
        cluster.metadata.namespace = Some(namespace.to_string());

        ResourceSet {
            pull_secret: typed_secret(
                namespace,
                &pull_secret_name,
                PULL_SECRET_TYPE,
                PULL_SECRET_KEY,
                pull_secret,
            ),
            aws_credentials: opaque_secret(namespace, &creds_name, AWS_CREDENTIALS_KEY, aws_credentials),
            ssh_key: opaque_secret(namespace, &ssh_key_name, SSH_KEY_KEY, ssh_key),
            cluster,
        }
    }
}

impl Default for ExampleFixtures {
    fn default() -> Self {
        Self {
            node_pool_replicas: DEFAULT_NODE_POOL_REPLICAS,
        }
    }
}

impl FixtureFactory for ExampleFixtures {
    fn resources(&self, ctx: &RunContext, namespace: &str) -> ResourceSet {
        self.build(
            namespace,
            ctx.release_image(),
            ctx.pull_secret(),
            ctx.aws_credentials(),
            ctx.ssh_key(),
        )
    }
}

/// Name of the example cluster for a workspace
pub fn cluster_name(namespace: &str) -> String {
    format!("example-{}", namespace)
}

/// Human-readable identity of a namespaced object, for errors and logs
pub fn describe<K: ResourceExt>(kind: &str, obj: &K) -> String {
    format!(
        "{} {}/{}",
        kind,
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube_utils::secret_data;

    fn example() -> ResourceSet {
        ExampleFixtures::new(2)
            .expect("valid replicas")
            .build("e2e-abc", "example:v1", b"{\"auths\":{}}", b"[default]", b"ssh-rsa AAAA")
    }

    #[test]
    fn every_object_is_scoped_to_the_workspace() {
        let set = example();
        for secret in set.secrets() {
            assert_eq!(secret.metadata.namespace.as_deref(), Some("e2e-abc"));
        }
        assert_eq!(set.cluster.namespace().as_deref(), Some("e2e-abc"));
        assert_eq!(set.cluster.name_any(), "example-e2e-abc");
    }

    #[test]
    fn cluster_references_the_created_secrets() {
        let set = example();
        let names: Vec<String> = set.secrets().iter().map(|s| s.name_any()).collect();
        let referenced: Vec<String> = set
            .cluster
            .spec
            .referenced_secrets()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, referenced);
    }

    #[test]
    fn credentials_are_stored_under_well_known_keys() {
        let set = example();
        assert_eq!(
            secret_data(&set.pull_secret, PULL_SECRET_KEY),
            Some(&b"{\"auths\":{}}"[..])
        );
        assert_eq!(set.pull_secret.type_.as_deref(), Some(PULL_SECRET_TYPE));
        assert_eq!(
            secret_data(&set.aws_credentials, AWS_CREDENTIALS_KEY),
            Some(&b"[default]"[..])
        );
        assert_eq!(
            secret_data(&set.ssh_key, SSH_KEY_KEY),
            Some(&b"ssh-rsa AAAA"[..])
        );
    }

    #[test]
    fn cluster_requests_release_and_replicas() {
        let set = example();
        assert_eq!(set.cluster.spec.release.image, "example:v1");
        assert_eq!(set.cluster.requested_replicas(), 2);
    }

    #[test]
    fn zero_replicas_is_rejected() {
        assert!(matches!(ExampleFixtures::new(0), Err(Error::Validation(_))));
        assert_eq!(
            ExampleFixtures::default().node_pool_replicas,
            DEFAULT_NODE_POOL_REPLICAS
        );
    }

    #[test]
    fn yaml_stream_contains_all_objects() {
        let yaml = example().to_yaml().expect("render");
        assert_eq!(yaml.matches("---\n").count(), 3);
        assert!(yaml.contains("kind: HostedCluster"));
        assert!(yaml.contains("example-e2e-abc-ssh-key"));
    }

    #[test]
    fn describe_includes_kind_and_key() {
        let set = example();
        assert_eq!(
            describe("secret", &set.ssh_key),
            "secret e2e-abc/example-e2e-abc-ssh-key"
        );
    }
}
