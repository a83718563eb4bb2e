//! Quick-start acceptance test runner

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kube::CustomResourceExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quickstart_e2e::client::KubeClientFactory;
use quickstart_e2e::context::QuickStartOptions;
use quickstart_e2e::crd::HostedCluster;
use quickstart_e2e::fixtures::{ExampleFixtures, DEFAULT_NODE_POOL_REPLICAS};
use quickstart_e2e::kube_utils::{
    ConnectivityConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT,
};
use quickstart_e2e::provision::QuickStart;
use quickstart_e2e::release::{ReleaseStreamResolver, DEFAULT_RELEASE_STREAM_URL};

/// Provision a hosted cluster the quick-start way and verify it comes up
#[derive(Parser, Debug)]
#[command(name = "quickstart-e2e", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the quick start against a management cluster
    ///
    /// Creates a workspace namespace, the credential secrets and a
    /// HostedCluster, waits for the guest nodes to become ready, then
    /// deletes the workspace. Exits non-zero if provisioning or cleanup fails.
    Run(RunArgs),

    /// Print the resources a run would create, without contacting a cluster
    Render(RenderArgs),

    /// Print the HostedCluster CRD
    Crd,
}

/// Credential inputs shared by `run` and `render`
#[derive(Args, Debug)]
struct InputArgs {
    /// Path to the image pull secret (dockerconfigjson format)
    #[arg(long, env = "QUICKSTART_PULL_SECRET_FILE")]
    pull_secret_file: PathBuf,

    /// Path to the AWS credentials file
    #[arg(long, env = "QUICKSTART_AWS_CREDENTIALS_FILE")]
    aws_credentials_file: PathBuf,

    /// Path to the SSH public key [default: $HOME/.ssh/id_rsa.pub]
    #[arg(long, env = "QUICKSTART_SSH_KEY_FILE")]
    ssh_key_file: Option<PathBuf>,

    /// Release image to test; the latest stable release is used when unset
    #[arg(long, env = "QUICKSTART_RELEASE_IMAGE")]
    release_image: Option<String>,

    /// Number of compute nodes to request
    #[arg(long, default_value_t = DEFAULT_NODE_POOL_REPLICAS)]
    node_pool_replicas: u32,

    /// Release stream queried for the default release image
    #[arg(long, default_value = DEFAULT_RELEASE_STREAM_URL)]
    release_stream_url: String,
}

impl InputArgs {
    fn options(&self) -> QuickStartOptions {
        QuickStartOptions {
            pull_secret_file: self.pull_secret_file.clone(),
            aws_credentials_file: self.aws_credentials_file.clone(),
            ssh_key_file: self
                .ssh_key_file
                .clone()
                .unwrap_or_else(QuickStartOptions::default_ssh_key_file),
            release_image: self.release_image.clone(),
        }
    }
}

/// Run mode arguments
#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Kubeconfig for the management cluster
    ///
    /// When unset, in-cluster config is tried first, then KUBECONFIG and
    /// ~/.kube/config.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Connect timeout for management and guest API requests, in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    connect_timeout_secs: u64,

    /// Read timeout for management and guest API requests, in seconds
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_secs())]
    read_timeout_secs: u64,
}

/// Render mode arguments
#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Workspace namespace to render the resources for
    namespace: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("failed to install TLS crypto provider: {:?}", e);
        std::process::exit(1);
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_quick_start(args).await,
        Commands::Render(args) => render(args).await,
        Commands::Crd => {
            let crd = serde_yaml::to_string(&HostedCluster::crd())
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("{crd}");
            Ok(())
        }
    }
}

/// Run the quick start end to end
async fn run_quick_start(args: RunArgs) -> anyhow::Result<()> {
    let fixtures = ExampleFixtures::new(args.inputs.node_pool_replicas)?;
    let resolver = ReleaseStreamResolver::new(&args.inputs.release_stream_url)?;
    let clients = Arc::new(KubeClientFactory::new().with_timeouts(
        Duration::from_secs(args.connect_timeout_secs),
        Duration::from_secs(args.read_timeout_secs),
    ));

    let ctx = args
        .inputs
        .options()
        .build_context(
            &ConnectivityConfig::from_path(args.kubeconfig.as_deref()),
            clients.as_ref(),
            &resolver,
        )
        .await?;
    tracing::info!(release_image = %ctx.release_image(), "starting quick start");

    let report = QuickStart::new(ctx, clients, Arc::new(fixtures)).run().await;

    if let Some(namespace) = &report.workspace {
        println!("Workspace: {}", namespace);
    }
    println!("Reached: {}", report.reached);
    if let Err(e) = &report.pipeline {
        eprintln!("Provisioning failed: {}", e);
    }
    if let Some(Err(e)) = &report.cleanup {
        eprintln!("Cleanup failed: {}", e);
    }

    report.into_result()?;
    println!("Quick start succeeded");
    Ok(())
}

/// Print the resource set for a namespace as a YAML stream
async fn render(args: RenderArgs) -> anyhow::Result<()> {
    let fixtures = ExampleFixtures::new(args.inputs.node_pool_replicas)?;
    let resolver = ReleaseStreamResolver::new(&args.inputs.release_stream_url)?;
    let inputs = args.inputs.options().load_inputs(&resolver).await?;

    let resources = fixtures.build(
        &args.namespace,
        &inputs.release_image,
        &inputs.pull_secret,
        &inputs.aws_credentials,
        &inputs.ssh_key,
    );
    print!("{}", resources.to_yaml()?);
    Ok(())
}
