//! Live quick-start test against a real management cluster
//!
//! Requires a management cluster with the hosted cluster operator installed
//! and credentials supplied through the environment:
//!
//! - `QUICKSTART_PULL_SECRET_FILE`
//! - `QUICKSTART_AWS_CREDENTIALS_FILE`
//! - `QUICKSTART_SSH_KEY_FILE` (optional, defaults to `$HOME/.ssh/id_rsa.pub`)
//! - `QUICKSTART_RELEASE_IMAGE` (optional, latest stable release otherwise)
//! - `KUBECONFIG` or in-cluster config for the management cluster
//!
//! Ignored by default; run with:
//!
//! ```bash
//! cargo test --test quickstart -- --ignored --nocapture
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use quickstart_e2e::client::KubeClientFactory;
use quickstart_e2e::context::QuickStartOptions;
use quickstart_e2e::fixtures::ExampleFixtures;
use quickstart_e2e::kube_utils::ConnectivityConfig;
use quickstart_e2e::provision::{Phase, QuickStart};
use quickstart_e2e::release::{ReleaseStreamResolver, DEFAULT_RELEASE_STREAM_URL};

fn required_path(var: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| panic!("{} must be set", var))
}

fn options_from_env() -> QuickStartOptions {
    QuickStartOptions {
        pull_secret_file: required_path("QUICKSTART_PULL_SECRET_FILE"),
        aws_credentials_file: required_path("QUICKSTART_AWS_CREDENTIALS_FILE"),
        ssh_key_file: std::env::var_os("QUICKSTART_SSH_KEY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(QuickStartOptions::default_ssh_key_file),
        release_image: std::env::var("QUICKSTART_RELEASE_IMAGE").ok(),
    }
}

#[tokio::test]
#[ignore = "requires a live management cluster and cloud credentials"]
async fn quick_start_provisions_ready_guest_cluster() {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let _ = tracing_subscriber::fmt()
        .with_env_filter("quickstart_e2e=debug")
        .with_test_writer()
        .try_init();

    let clients = Arc::new(KubeClientFactory::new());
    let resolver = ReleaseStreamResolver::new(DEFAULT_RELEASE_STREAM_URL).expect("http client");

    let ctx = options_from_env()
        .build_context(&ConnectivityConfig::Infer, clients.as_ref(), &resolver)
        .await
        .expect("run context should build");

    let report = QuickStart::new(ctx, clients, Arc::new(ExampleFixtures::default()))
        .run()
        .await;

    assert!(report.workspace.is_some());
    assert_eq!(report.reached, Phase::Done, "run did not finish: {:?}", report);
    report.into_result().expect("quick start should succeed");
}
