//! Per-run workspace namespace
//!
//! Every object a run creates lives inside one generated namespace, so
//! deleting that namespace removes them all. [`with_workspace`] ties the
//! namespace lifetime to a scope: once acquired it is released exactly once,
//! whether the body returns normally or panics.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::client::KubeClient;
use crate::kube_utils::generated_namespace;
use crate::poll::{poll_until, PollPolicy};
use crate::Error;

/// Prefix of generated workspace names
pub const WORKSPACE_PREFIX: &str = "e2e-";

/// Result of a body run inside a workspace
#[derive(Debug)]
pub struct Scoped<T> {
    /// Server-generated namespace name
    pub namespace: String,
    /// What the body returned
    pub value: T,
    /// Outcome of deleting the namespace afterwards
    pub cleanup: Result<(), Error>,
}

/// Create the workspace namespace and return its generated name.
///
/// Single attempt. Any failure, including a server response without a name,
/// is reported as a create failure for "namespace".
pub async fn create_workspace(client: &dyn KubeClient) -> Result<String, Error> {
    let created = client
        .create_namespace(&generated_namespace(WORKSPACE_PREFIX))
        .await
        .map_err(|e| Error::create_failed("namespace", e))?;

    match created.metadata.name.filter(|name| !name.is_empty()) {
        Some(name) => {
            info!(namespace = %name, "created workspace");
            Ok(name)
        }
        None => Err(Error::create_failed(
            "namespace",
            Error::validation("server returned no generated name"),
        )),
    }
}

/// Delete the workspace and wait until the server no longer has it.
///
/// A not-found on delete means the namespace is already gone, which counts
/// as success. While confirming, any error other than not-found is treated
/// as transient.
pub async fn release(
    client: &dyn KubeClient,
    namespace: &str,
    policy: &PollPolicy,
) -> Result<(), Error> {
    info!(namespace = %namespace, "deleting workspace");
    match client.delete_namespace(namespace).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            debug!(namespace = %namespace, "workspace already gone");
            return Ok(());
        }
        Err(e) => {
            return Err(Error::CleanupFailure {
                namespace: namespace.to_string(),
                source: Box::new(e),
            })
        }
    }

    poll_until(policy, "workspace deletion", || async move {
        match client.get_namespace(namespace).await {
            Err(e) if e.is_not_found() => Ok(Some(())),
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "failed to check workspace, retrying");
                Ok(None)
            }
            Ok(_) => Ok(None),
        }
    })
    .await
    .map_err(|e| {
        e.or_timeout(|timeout| Error::CleanupTimeout {
            namespace: namespace.to_string(),
            timeout,
        })
    })?;

    info!(namespace = %namespace, "workspace deleted");
    Ok(())
}

/// Run `body` inside a fresh workspace, releasing it afterwards.
///
/// Returns `Err` only when the workspace could not be created; in that case
/// `body` never runs and nothing is deleted. Otherwise the namespace is
/// released exactly once and the cleanup outcome is reported alongside the
/// body's value. A panic in `body` is resumed after cleanup.
pub async fn with_workspace<T, F, Fut>(
    client: &dyn KubeClient,
    cleanup: &PollPolicy,
    body: F,
) -> Result<Scoped<T>, Error>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = T>,
{
    let namespace = create_workspace(client).await?;

    let outcome = AssertUnwindSafe(async { body(namespace.clone()).await })
        .catch_unwind()
        .await;

    let cleanup = release(client, &namespace, cleanup).await;

    match outcome {
        Ok(value) => Ok(Scoped {
            namespace,
            value,
            cleanup,
        }),
        Err(panic) => {
            if let Err(e) = &cleanup {
                error!(namespace = %namespace, error = %e, "cleanup after panic failed");
            }
            std::panic::resume_unwind(panic)
        }
    }
}
