//! Kubernetes client abstraction
//!
//! The pipeline talks to both the management cluster and the guest cluster
//! through [`KubeClient`], and obtains handles through [`ClientFactory`].
//! Both traits are mocked in unit tests; production uses the kube-rs backed
//! implementations below.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Secret};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::HostedCluster;
use crate::kube_utils::{
    create_client_with_timeout, ConnectivityConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
};
use crate::Error;

/// Trait abstracting the Kubernetes operations a quick-start run needs
///
/// Errors keep the API status so callers can use [`Error::is_not_found`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Create a namespace, returning the object as stored by the server
    ///
    /// Used with `generateName`, so the returned object carries the real name.
    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, Error>;

    /// Get a namespace by name
    async fn get_namespace(&self, name: &str) -> Result<Namespace, Error>;

    /// Delete a namespace and, transitively, everything in it
    async fn delete_namespace(&self, name: &str) -> Result<(), Error>;

    /// Create a secret in the namespace set on its metadata
    async fn create_secret(&self, secret: &Secret) -> Result<(), Error>;

    /// Get a secret
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, Error>;

    /// Create a HostedCluster in the namespace set on its metadata
    async fn create_hosted_cluster(&self, cluster: &HostedCluster) -> Result<(), Error>;

    /// Get a HostedCluster
    async fn get_hosted_cluster(&self, namespace: &str, name: &str)
        -> Result<HostedCluster, Error>;

    /// List all nodes of the cluster this client points at
    async fn list_nodes(&self) -> Result<Vec<Node>, Error>;
}

/// Trait for constructing client handles from connection settings
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Build a client; fails if the settings are unusable or the API server is unreachable
    async fn connect(&self, config: &ConnectivityConfig) -> Result<Arc<dyn KubeClient>, Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn namespace_of<K: ResourceExt>(obj: &K) -> Result<String, Error> {
    obj.namespace().ok_or_else(|| {
        Error::validation(format!("{} has no namespace set", obj.name_any()))
    })
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn create_namespace(&self, namespace: &Namespace) -> Result<Namespace, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.create(&PostParams::default(), namespace).await?)
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get(name).await?)
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn create_secret(&self, secret: &Secret) -> Result<(), Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace_of(secret)?);
        api.create(&PostParams::default(), secret).await?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn create_hosted_cluster(&self, cluster: &HostedCluster) -> Result<(), Error> {
        let api: Api<HostedCluster> =
            Api::namespaced(self.client.clone(), &namespace_of(cluster)?);
        api.create(&PostParams::default(), cluster).await?;
        Ok(())
    }

    async fn get_hosted_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HostedCluster, Error> {
        let api: Api<HostedCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }
}

/// Client factory backed by kube-rs
///
/// Each connection is verified by asking the API server for its version, so
/// an unreachable endpoint fails here rather than on first use.
pub struct KubeClientFactory {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl KubeClientFactory {
    /// Create a factory with the default timeouts
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override connect and read timeouts
    pub fn with_timeouts(mut self, connect_timeout: Duration, read_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.read_timeout = read_timeout;
        self
    }
}

impl Default for KubeClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientFactory for KubeClientFactory {
    async fn connect(&self, config: &ConnectivityConfig) -> Result<Arc<dyn KubeClient>, Error> {
        let client =
            create_client_with_timeout(config, self.connect_timeout, self.read_timeout).await?;

        let version = client
            .apiserver_version()
            .await
            .map_err(|e| Error::client_init(format!("API server unreachable: {}", e)))?;
        debug!(git_version = %version.git_version, "connected to API server");

        Ok(Arc::new(KubeClientImpl::new(client)))
    }
}
