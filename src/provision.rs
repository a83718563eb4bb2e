//! Quick-start provisioning pipeline
//!
//! [`QuickStart::run`] drives one acceptance run from an empty management
//! cluster to a guest cluster with ready nodes:
//!
//! 1. Create the workspace namespace
//! 2. Create the credential secrets, then the HostedCluster
//! 3. Wait for the guest kubeconfig to be published
//! 4. Connect to the guest API server
//! 5. Wait for the requested number of guest nodes to become ready
//!
//! The workspace is deleted afterwards on every exit path, and the run
//! reports pipeline and cleanup outcomes separately.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kube::config::Kubeconfig;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{ClientFactory, KubeClient};
use crate::context::RunContext;
use crate::fixtures::{describe, FixtureFactory};
use crate::kube_utils::{parse_kubeconfig, ready_node_names, secret_data, ConnectivityConfig};
use crate::poll::{poll_until, PollPolicy};
use crate::workspace::{with_workspace, Scoped};
use crate::Error;

/// Data key of the kubeconfig in the guest access secret
pub const GUEST_KUBECONFIG_KEY: &str = "kubeconfig";

/// A bounded wait in the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for the guest kubeconfig secret
    KubeConfig,
    /// Waiting for the guest API server to accept a connection
    GuestClient,
    /// Waiting for guest nodes to report ready
    NodesReady,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::KubeConfig => write!(f, "guest kubeconfig"),
            Stage::GuestClient => write!(f, "guest API server"),
            Stage::NodesReady => write!(f, "guest nodes to become ready"),
        }
    }
}

/// Progress of a run, in the order phases are reached
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Nothing created yet
    Start,
    /// Workspace namespace exists
    WorkspaceCreated,
    /// Credential secrets exist
    ResourcesCreated,
    /// HostedCluster exists
    ClusterCreated,
    /// Guest kubeconfig retrieved
    KubeConfigAvailable,
    /// Guest API server reachable
    GuestClientEstablished,
    /// Requested number of guest nodes ready
    NodesReady,
    /// Workspace deleted and confirmed gone
    WorkspaceDeleted,
    /// Run finished
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Start => "Start",
            Phase::WorkspaceCreated => "WorkspaceCreated",
            Phase::ResourcesCreated => "ResourcesCreated",
            Phase::ClusterCreated => "ClusterCreated",
            Phase::KubeConfigAvailable => "KubeConfigAvailable",
            Phase::GuestClientEstablished => "GuestClientEstablished",
            Phase::NodesReady => "NodesReady",
            Phase::WorkspaceDeleted => "WorkspaceDeleted",
            Phase::Done => "Done",
        };
        write!(f, "{}", name)
    }
}

/// Poll interval and deadline for every bounded wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagePolicies {
    /// Waiting for the guest kubeconfig
    pub kubeconfig: PollPolicy,
    /// Connecting to the guest API server
    pub guest_client: PollPolicy,
    /// Waiting for guest nodes
    pub nodes_ready: PollPolicy,
    /// Confirming the workspace is gone
    pub cleanup: PollPolicy,
}

impl Default for StagePolicies {
    fn default() -> Self {
        Self {
            kubeconfig: PollPolicy::new(Duration::from_secs(1), Duration::from_secs(5 * 60)),
            guest_client: PollPolicy::new(Duration::from_secs(5), Duration::from_secs(5 * 60)),
            nodes_ready: PollPolicy::new(Duration::from_secs(5), Duration::from_secs(10 * 60)),
            cleanup: PollPolicy::new(Duration::from_secs(1), Duration::from_secs(10 * 60)),
        }
    }
}

/// Outcome of a run
///
/// The pipeline and the cleanup fail independently, so both are kept.
/// `cleanup` is `None` only when the workspace was never created.
#[derive(Debug)]
pub struct RunReport {
    /// Workspace namespace, if one was created
    pub workspace: Option<String>,
    /// Last phase completed. Cleanup only advances it after a successful pipeline.
    pub reached: Phase,
    /// Outcome of the provisioning pipeline
    pub pipeline: Result<(), Error>,
    /// Outcome of deleting the workspace
    pub cleanup: Option<Result<(), Error>>,
}

impl RunReport {
    /// Returns true if both the pipeline and the cleanup succeeded
    pub fn is_success(&self) -> bool {
        self.pipeline.is_ok() && !matches!(self.cleanup, Some(Err(_)))
    }

    /// Collapse into a single result, keeping both errors when both failed
    pub fn into_result(self) -> Result<(), Error> {
        match (self.pipeline, self.cleanup) {
            (Ok(()), None | Some(Ok(()))) => Ok(()),
            (Err(e), None | Some(Ok(()))) => Err(e),
            (Ok(()), Some(Err(cleanup))) => Err(cleanup),
            (Err(pipeline), Some(Err(cleanup))) => Err(Error::PipelineAndCleanup {
                pipeline: Box::new(pipeline),
                cleanup: Box::new(cleanup),
            }),
        }
    }
}

/// Orchestrates one quick-start run
pub struct QuickStart {
    ctx: RunContext,
    clients: Arc<dyn ClientFactory>,
    fixtures: Arc<dyn FixtureFactory>,
    policies: StagePolicies,
}

impl QuickStart {
    /// Create an orchestrator with the default stage policies
    ///
    /// `clients` builds the guest client once its kubeconfig is available.
    pub fn new(
        ctx: RunContext,
        clients: Arc<dyn ClientFactory>,
        fixtures: Arc<dyn FixtureFactory>,
    ) -> Self {
        Self {
            ctx,
            clients,
            fixtures,
            policies: StagePolicies::default(),
        }
    }

    /// Override the stage policies
    pub fn with_policies(mut self, policies: StagePolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Execute the run, always deleting the workspace once it exists
    #[instrument(skip(self), fields(release_image = %self.ctx.release_image()))]
    pub async fn run(&self) -> RunReport {
        let scoped = with_workspace(self.ctx.client(), &self.policies.cleanup, |namespace| async move {
            let mut reached = Phase::WorkspaceCreated;
            let result = self.provision(&namespace, &mut reached).await;
            (reached, result)
        })
        .await;

        let report = match scoped {
            Err(e) => RunReport {
                workspace: None,
                reached: Phase::Start,
                pipeline: Err(e),
                cleanup: None,
            },
            Ok(Scoped {
                namespace,
                value: (mut reached, pipeline),
                cleanup,
            }) => {
                if pipeline.is_ok() && cleanup.is_ok() {
                    advance(&mut reached, Phase::WorkspaceDeleted);
                    advance(&mut reached, Phase::Done);
                }
                RunReport {
                    workspace: Some(namespace),
                    reached,
                    pipeline,
                    cleanup: Some(cleanup),
                }
            }
        };

        if let Err(e) = &report.pipeline {
            error!(error = %e, reached = %report.reached, "quick start failed");
        }
        if let Some(Err(e)) = &report.cleanup {
            error!(error = %e, "workspace cleanup failed");
        }
        report
    }

    async fn provision(&self, namespace: &str, reached: &mut Phase) -> Result<(), Error> {
        let client = self.ctx.client();
        let resources = self.fixtures.resources(&self.ctx, namespace);

        for secret in resources.secrets() {
            client
                .create_secret(secret)
                .await
                .map_err(|e| Error::create_failed(describe("secret", secret), e))?;
        }
        advance(reached, Phase::ResourcesCreated);

        let cluster = &resources.cluster;
        client
            .create_hosted_cluster(cluster)
            .await
            .map_err(|e| Error::create_failed(describe("hostedcluster", cluster), e))?;
        advance(reached, Phase::ClusterCreated);

        let kubeconfig = self.wait_for_kubeconfig(namespace, &cluster.name_any()).await?;
        advance(reached, Phase::KubeConfigAvailable);

        let guest = self.connect_guest(kubeconfig).await?;
        advance(reached, Phase::GuestClientEstablished);

        self.wait_for_nodes(guest.as_ref(), cluster.requested_replicas())
            .await?;
        advance(reached, Phase::NodesReady);

        Ok(())
    }

    /// Poll the HostedCluster until it publishes a kubeconfig secret, then read it.
    ///
    /// Lookup errors are retried. A secret that exists but does not hold a
    /// parseable kubeconfig is fatal.
    async fn wait_for_kubeconfig(&self, namespace: &str, name: &str) -> Result<Kubeconfig, Error> {
        let client = self.ctx.client();

        let secret = poll_until(&self.policies.kubeconfig, "guest kubeconfig", || async move {
            let cluster = match client.get_hosted_cluster(namespace, name).await {
                Ok(cluster) => cluster,
                Err(e) => {
                    warn!(cluster = %name, error = %e, "failed to get hosted cluster, retrying");
                    return Ok(None);
                }
            };
            let Some(secret_name) = cluster.kubeconfig_secret_name() else {
                debug!(cluster = %name, "kubeconfig not published yet");
                return Ok(None);
            };
            match client.get_secret(namespace, secret_name).await {
                Ok(secret) => Ok(Some(secret)),
                Err(e) if e.is_not_found() => {
                    debug!(secret = %secret_name, "kubeconfig secret not created yet");
                    Ok(None)
                }
                Err(e) => {
                    warn!(secret = %secret_name, error = %e, "failed to get kubeconfig secret, retrying");
                    Ok(None)
                }
            }
        })
        .await
        .map_err(|e| {
            e.or_timeout(|timeout| Error::ReadinessTimeout {
                stage: Stage::KubeConfig,
                timeout,
            })
        })?;

        let secret_id = format!("{}/{}", namespace, secret.name_any());
        let raw = secret_data(&secret, GUEST_KUBECONFIG_KEY).ok_or_else(|| Error::MalformedSecret {
            secret: secret_id.clone(),
            message: format!("missing key {:?}", GUEST_KUBECONFIG_KEY),
        })?;
        let kubeconfig = parse_kubeconfig(raw).map_err(|message| Error::MalformedSecret {
            secret: secret_id.clone(),
            message,
        })?;

        info!(secret = %secret_id, "guest kubeconfig available");
        Ok(kubeconfig)
    }

    /// Keep trying to connect to the guest API server until it answers
    async fn connect_guest(&self, kubeconfig: Kubeconfig) -> Result<Arc<dyn KubeClient>, Error> {
        let clients = self.clients.as_ref();
        let config = &ConnectivityConfig::Kubeconfig(kubeconfig);

        let guest = poll_until(&self.policies.guest_client, "guest API server", || async move {
            match clients.connect(config).await {
                Ok(client) => Ok(Some(client)),
                Err(e) => {
                    warn!(error = %e, "guest API server not reachable yet");
                    Ok(None)
                }
            }
        })
        .await
        .map_err(|e| {
            e.or_timeout(|timeout| Error::ReadinessTimeout {
                stage: Stage::GuestClient,
                timeout,
            })
        })?;

        info!("connected to guest API server");
        Ok(guest)
    }

    /// Wait until exactly `expected` guest nodes report ready
    async fn wait_for_nodes(&self, guest: &dyn KubeClient, expected: u32) -> Result<(), Error> {
        let expected = expected as usize;

        poll_until(&self.policies.nodes_ready, "guest nodes ready", || async move {
            let nodes = match guest.list_nodes().await {
                Ok(nodes) => nodes,
                Err(e) => {
                    warn!(error = %e, "failed to list guest nodes, retrying");
                    return Ok(None);
                }
            };
            if nodes.is_empty() {
                return Ok(None);
            }
            let ready = ready_node_names(&nodes);
            debug!(total = nodes.len(), ready = ready.len(), expected, "guest node status");
            Ok((ready.len() == expected).then_some(()))
        })
        .await
        .map_err(|e| {
            e.or_timeout(|timeout| Error::ReadinessTimeout {
                stage: Stage::NodesReady,
                timeout,
            })
        })?;

        info!(nodes = expected, "guest nodes ready");
        Ok(())
    }
}

fn advance(reached: &mut Phase, next: Phase) {
    debug_assert!(next > *reached, "phases only move forward");
    info!(phase = %next, "phase reached");
    *reached = next;
}
