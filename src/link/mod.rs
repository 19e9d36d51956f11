/*!
 * Link to a Pipeline 2 service
 *
 * `Link` is what the command layer talks to. It owns the service client and
 * the session facts captured when the service was brought up, and exposes
 * job submission, inspection, message streaming and queue management.
 *
 * # Example
 *
 * ```rust,no_run
 * use dp2::config::LinkConfig;
 * use dp2::link::Link;
 * use dp2_connect::RemotePipeline;
 * use std::sync::Arc;
 *
 * # async fn example() -> anyhow::Result<()> {
 * let config = LinkConfig::default();
 * let api = RemotePipeline::new(&config.url(), config.call_timeout())?;
 * let link = Link::connect(Arc::new(api), config).await?;
 *
 * println!("Pipeline {} (local: {})", link.version(), link.is_local());
 * for job in link.jobs().await? {
 *     println!("{} {}", job.id, job.status);
 * }
 * # Ok(())
 * # }
 * ```
 */

pub mod bootstrap;
pub mod queue;
pub mod stream;
pub mod translate;

use dp2_core_interface::{Credentials, Job, PipelineApi, Script};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};

pub use stream::{MessageStream, StreamSettings};
pub use translate::{translate, JobDescription};

/// Facts about the service captured once at bring-up
#[derive(Debug, Clone, Default)]
pub struct LinkSession {
    /// Framework version reported by the service
    pub version: String,
    /// The service requires signed requests
    pub authentication: bool,
    /// The service accepts paths on our filesystem
    pub fs_allow: bool,
    pub credentials: Credentials,
    pub config: LinkConfig,
}

/// Client-side handle on a live service
///
/// Cheap to clone; clones share the client and the session.
#[derive(Clone)]
pub struct Link {
    api: Arc<dyn PipelineApi>,
    session: Arc<LinkSession>,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").field("session", &self.session).finish()
    }
}

/// Reject blank job ids before they reach the service
pub(crate) fn require_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(LinkError::Validation("job id must not be empty".to_string()));
    }
    Ok(id)
}

impl Link {
    /// Bring the service up and perform the authentication handshake
    ///
    /// # Errors
    ///
    /// - `Connectivity` if the service is unreachable and may not be started
    /// - `Startup` if starting a local instance failed
    /// - `Authentication` if the service requires authentication and only one
    ///   of `client_key`/`client_secret` is set
    pub async fn connect(api: Arc<dyn PipelineApi>, config: LinkConfig) -> Result<Self> {
        let alive = bootstrap::bring_up(api.as_ref(), &config).await?;

        let credentials = Credentials::new(config.client_key.as_str(), config.client_secret.as_str());
        if alive.authentication {
            bootstrap::authenticate(api.as_ref(), &credentials)?;
        }

        info!(
            version = %alive.version,
            local = alive.local_mode,
            authentication = alive.authentication,
            "Connected to pipeline"
        );

        let session = LinkSession {
            version: alive.version,
            authentication: alive.authentication,
            fs_allow: alive.local_mode,
            credentials,
            config,
        };
        Ok(Self::from_session(api, session))
    }

    /// Wrap a client with an already established session
    pub fn from_session(api: Arc<dyn PipelineApi>, session: LinkSession) -> Self {
        Self {
            api,
            session: Arc::new(session),
        }
    }

    pub fn session(&self) -> &LinkSession {
        &self.session
    }

    pub fn version(&self) -> &str {
        &self.session.version
    }

    pub fn authentication(&self) -> bool {
        self.session.authentication
    }

    /// Whether the service shares our filesystem
    ///
    /// Commands that hand local paths to the service, or expect it to write
    /// into them, are only allowed when this holds.
    pub fn is_local(&self) -> bool {
        self.session.fs_allow
    }

    /// Every script the service offers, with full descriptors
    pub async fn scripts(&self) -> Result<Vec<Script>> {
        let summaries = self.api.scripts().await?;
        let mut scripts = Vec::with_capacity(summaries.len());
        for summary in summaries {
            scripts.push(self.api.script(&summary.id).await?);
        }
        Ok(scripts)
    }

    pub async fn script(&self, id: &str) -> Result<Script> {
        let id = id.trim();
        if id.is_empty() {
            return Err(LinkError::Validation(
                "script id must not be empty".to_string(),
            ));
        }
        Ok(self.api.script(id).await?)
    }

    /// Translate and submit a job
    ///
    /// The description is checked against the script descriptor first; an
    /// undeclared slot fails without submitting anything.
    pub async fn submit(&self, description: &JobDescription) -> Result<Job> {
        let script = self.script(&description.script).await?;
        let request = translate(description, &script)?;

        debug!(
            script = %request.script.href,
            inputs = request.inputs.len(),
            options = request.options.len(),
            "Submitting job"
        );
        let job = self.api.submit_job(&request).await?;
        info!(job_id = %job.id, script = %script.id, "Job submitted");
        Ok(job)
    }

    pub async fn job(&self, id: &str) -> Result<Job> {
        Ok(self.api.job(require_id(id)?).await?)
    }

    pub async fn jobs(&self) -> Result<Vec<Job>> {
        Ok(self.api.jobs().await?)
    }

    /// Delete a job; `false` when the service did not delete it
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = require_id(id)?;
        let deleted = self.api.delete_job(id).await?;
        debug!(job_id = id, deleted, "Delete requested");
        Ok(deleted)
    }

    /// Zipped results of a job
    pub async fn results(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self.api.results(require_id(id)?).await?)
    }

    pub async fn log(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self.api.log(require_id(id)?).await?)
    }

    /// Stop the service with its administrator key
    pub async fn halt(&self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(LinkError::Validation(
                "halt key must not be empty".to_string(),
            ));
        }
        self.api.halt(key.trim()).await?;
        info!("Pipeline halted");
        Ok(())
    }

    /// Follow the messages of a job until it finishes
    ///
    /// Polling runs in a background task on the current tokio runtime; each
    /// call starts from scratch and replays every message the job has.
    pub fn stream_messages(&self, id: &str) -> Result<MessageStream> {
        let id = require_id(id)?;
        Ok(MessageStream::spawn(
            Arc::clone(&self.api),
            id.to_string(),
            StreamSettings::from_config(&self.session.config),
        ))
    }
}
