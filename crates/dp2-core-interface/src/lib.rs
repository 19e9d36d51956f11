//! DP2 Core Interface: capability set of the Pipeline 2 web service
//!
//! This crate defines the `PipelineApi` trait, which abstracts every remote
//! operation the command-line client needs so that the link layer can run
//! against either the live HTTP client or an in-memory fake.
//!
//! # Architecture
//!
//! The `PipelineApi` trait groups its operations as:
//!
//! 1. **Discovery**: liveness and script descriptors
//! 2. **Jobs**: submit, inspect, delete, fetch results and logs
//! 3. **Queue**: read and reorder the execution queue
//! 4. **Administration**: credentials and halting the service
//!
//! # Example
//!
//! ```rust,no_run
//! use dp2_core_interface::PipelineApi;
//!
//! async fn print_scripts<P: PipelineApi>(api: &P) -> Result<(), dp2_core_interface::ApiError> {
//!     for script in api.scripts().await? {
//!         println!("{}: {}", script.id, script.description);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

pub mod model;

pub use model::{
    Alive, Item, Job, JobRequest, JobStatus, Message, MessageLevel, OptionValue, Priority,
    QueueEntry, Script, ScriptRef, ScriptSummary, Slot, WireInput, WireOption,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The service could not be reached or did not answer in time
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// True when the failure means the service is unreachable
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Client key/secret pair used to sign requests
///
/// The secret never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Both halves empty: signing disabled
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() && self.secret.is_empty()
    }

    /// Exactly one half empty
    pub fn is_partial(&self) -> bool {
        self.key.is_empty() != self.secret.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The Pipeline 2 web service as seen by the client
///
/// Implementations:
/// - **RemotePipeline** (`dp2-connect`): HTTP client for a live service
/// - **MockPipeline** (`dp2::system::mock`): in-memory fake for tests
///
/// Implementations must be `Send + Sync + 'static` so a link can share one
/// instance with its background message streams.
#[async_trait]
pub trait PipelineApi: Send + Sync + 'static {
    // ═══════════════════════════════════════════════════════════════════════
    // 1. Discovery
    // ═══════════════════════════════════════════════════════════════════════

    /// Query the liveness resource
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the service is not reachable.
    async fn alive(&self) -> Result<Alive>;

    /// List the registered scripts (summaries only)
    async fn scripts(&self) -> Result<Vec<ScriptSummary>>;

    /// Fetch the full descriptor of one script
    async fn script(&self, id: &str) -> Result<Script>;

    // ═══════════════════════════════════════════════════════════════════════
    // 2. Jobs
    // ═══════════════════════════════════════════════════════════════════════

    /// Fetch the current snapshot of a job, messages included
    async fn job(&self, id: &str) -> Result<Job>;

    async fn jobs(&self) -> Result<Vec<Job>>;

    async fn submit_job(&self, request: &JobRequest) -> Result<Job>;

    /// Delete a job; `Ok(false)` when the service refused without an error
    async fn delete_job(&self, id: &str) -> Result<bool>;

    /// Zipped results of a finished job
    async fn results(&self, id: &str) -> Result<Vec<u8>>;

    /// Raw job log
    async fn log(&self, id: &str) -> Result<Vec<u8>>;

    // ═══════════════════════════════════════════════════════════════════════
    // 3. Queue
    // ═══════════════════════════════════════════════════════════════════════

    async fn queue(&self) -> Result<Vec<QueueEntry>>;

    /// Move a job one position up and return the new queue
    async fn move_up(&self, id: &str) -> Result<Vec<QueueEntry>>;

    /// Move a job one position down and return the new queue
    async fn move_down(&self, id: &str) -> Result<Vec<QueueEntry>>;

    // ═══════════════════════════════════════════════════════════════════════
    // 4. Administration
    // ═══════════════════════════════════════════════════════════════════════

    /// Stop the service using the administrator key
    async fn halt(&self, key: &str) -> Result<()>;

    /// Install the credentials used to sign every subsequent request
    fn set_credentials(&self, credentials: Credentials);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_emptiness() {
        assert!(Credentials::default().is_empty());
        assert!(!Credentials::default().is_partial());
        assert!(Credentials::new("key", "").is_partial());
        assert!(Credentials::new("", "shh").is_partial());
        assert!(!Credentials::new("key", "shh").is_partial());
        assert!(!Credentials::new("key", "shh").is_empty());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let out = format!("{:?}", Credentials::new("robot", "supersecret"));
        assert!(out.contains("robot"));
        assert!(!out.contains("supersecret"));
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(ApiError::Transport("refused".to_string()).is_connectivity());
        assert!(!ApiError::NotFound("job".to_string()).is_connectivity());
        assert!(!ApiError::Remote {
            status: 503,
            message: "busy".to_string()
        }
        .is_connectivity());
    }
}
