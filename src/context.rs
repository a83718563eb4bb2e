//! Run context for a quick-start run
//!
//! [`QuickStartOptions`] are the raw inputs (file paths and an optional
//! release image). [`QuickStartOptions::build_context`] validates them and
//! produces the immutable [`RunContext`] the pipeline consumes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{ClientFactory, KubeClient};
use crate::kube_utils::ConnectivityConfig;
use crate::release::DefaultImageResolver;
use crate::Error;

/// Raw user input used to construct the run context
#[derive(Clone, Debug, Default)]
pub struct QuickStartOptions {
    /// Path to the image pull secret
    pub pull_secret_file: PathBuf,
    /// Path to the AWS credentials file
    pub aws_credentials_file: PathBuf,
    /// Path to the SSH public key
    pub ssh_key_file: PathBuf,
    /// Release image to test; the default release is looked up when unset
    pub release_image: Option<String>,
}

impl QuickStartOptions {
    /// `$HOME/.ssh/id_rsa.pub`, the conventional SSH public key location
    pub fn default_ssh_key_file() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".ssh")
            .join("id_rsa.pub")
    }

    /// Read the credential files and settle the release image.
    ///
    /// Inputs are checked in order (pull secret, AWS credentials, SSH key,
    /// release image) and the first problem is reported. No cluster is
    /// contacted.
    pub async fn load_inputs(&self, resolver: &dyn DefaultImageResolver) -> Result<RunInputs, Error> {
        let pull_secret = read_required("pull secret", &self.pull_secret_file).await?;
        let aws_credentials = read_required("AWS credentials", &self.aws_credentials_file).await?;
        let ssh_key = read_required("SSH key", &self.ssh_key_file).await?;

        let release_image = match self.release_image.as_deref().filter(|i| !i.is_empty()) {
            Some(image) => image.to_string(),
            None => {
                debug!("no release image given, looking up default release");
                resolver.lookup().await.map_err(|e| match e {
                    Error::ResolutionFailure { .. } => e,
                    other => Error::resolution(other.to_string()),
                })?
            }
        };
        if release_image.is_empty() {
            return Err(Error::missing("release image"));
        }

        Ok(RunInputs {
            release_image,
            pull_secret,
            aws_credentials,
            ssh_key,
        })
    }

    /// Validate the options and build the run context.
    ///
    /// The management client is only constructed once every input is valid.
    pub async fn build_context(
        &self,
        connectivity: &ConnectivityConfig,
        clients: &dyn ClientFactory,
        resolver: &dyn DefaultImageResolver,
    ) -> Result<RunContext, Error> {
        let inputs = self.load_inputs(resolver).await?;

        let client = clients.connect(connectivity).await.map_err(|e| match e {
            Error::ClientInitFailure { .. } => e,
            other => Error::client_init(other.to_string()),
        })?;

        info!(release_image = %inputs.release_image, "built run context");
        RunContext::new(
            client,
            inputs.release_image,
            inputs.pull_secret,
            inputs.aws_credentials,
            inputs.ssh_key,
        )
    }
}

/// Read a credential file that must exist and be non-empty
pub async fn read_required(input: &'static str, path: &Path) -> Result<Vec<u8>, Error> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| Error::unreadable(input, path, e))?;
    if data.is_empty() {
        return Err(Error::MissingInput {
            input,
            reason: format!("{} is empty", path.display()),
        });
    }
    Ok(data)
}

/// Validated credential payloads and release image, not yet bound to a cluster
#[derive(Clone)]
pub struct RunInputs {
    /// Release image under test
    pub release_image: String,
    /// Image pull secret contents
    pub pull_secret: Vec<u8>,
    /// AWS credentials file contents
    pub aws_credentials: Vec<u8>,
    /// SSH public key contents
    pub ssh_key: Vec<u8>,
}

impl fmt::Debug for RunInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunInputs")
            .field("release_image", &self.release_image)
            .field("pull_secret_bytes", &self.pull_secret.len())
            .field("aws_credentials_bytes", &self.aws_credentials.len())
            .field("ssh_key_bytes", &self.ssh_key.len())
            .finish()
    }
}

/// Validated inputs for a run
///
/// Built once and read-only afterwards. Every payload field is non-empty.
#[derive(Clone)]
pub struct RunContext {
    client: Arc<dyn KubeClient>,
    release_image: String,
    pull_secret: Vec<u8>,
    aws_credentials: Vec<u8>,
    ssh_key: Vec<u8>,
}

impl RunContext {
    /// Assemble a context, rejecting empty payloads
    pub fn new(
        client: Arc<dyn KubeClient>,
        release_image: impl Into<String>,
        pull_secret: Vec<u8>,
        aws_credentials: Vec<u8>,
        ssh_key: Vec<u8>,
    ) -> Result<Self, Error> {
        let release_image = release_image.into();
        if pull_secret.is_empty() {
            return Err(Error::missing("pull secret"));
        }
        if aws_credentials.is_empty() {
            return Err(Error::missing("AWS credentials"));
        }
        if ssh_key.is_empty() {
            return Err(Error::missing("SSH key"));
        }
        if release_image.is_empty() {
            return Err(Error::missing("release image"));
        }
        Ok(Self {
            client,
            release_image,
            pull_secret,
            aws_credentials,
            ssh_key,
        })
    }

    /// Client for the management cluster
    pub fn client(&self) -> &dyn KubeClient {
        self.client.as_ref()
    }

    /// Release image under test
    pub fn release_image(&self) -> &str {
        &self.release_image
    }

    /// Image pull secret contents
    pub fn pull_secret(&self) -> &[u8] {
        &self.pull_secret
    }

    /// AWS credentials file contents
    pub fn aws_credentials(&self) -> &[u8] {
        &self.aws_credentials
    }

    /// SSH public key contents
    pub fn ssh_key(&self) -> &[u8] {
        &self.ssh_key
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("release_image", &self.release_image)
            .field("pull_secret_bytes", &self.pull_secret.len())
            .field("aws_credentials_bytes", &self.aws_credentials.len())
            .field("ssh_key_bytes", &self.ssh_key.len())
            .finish_non_exhaustive()
    }
}
