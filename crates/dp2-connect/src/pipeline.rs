//! RemotePipeline: PipelineApi implementation over the service's REST resources

use async_trait::async_trait;
use dp2_core_interface::{
    Alive, ApiError, Credentials, Job, JobRequest, PipelineApi, QueueEntry, Result, Script,
    ScriptSummary,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::ConnectError;
use crate::signer::RequestSigner;

/// HTTP client for a Pipeline 2 web service.
///
/// Cheap to clone: the connection pool and the signer are shared.
///
/// # Example
///
/// ```rust,no_run
/// use dp2_connect::RemotePipeline;
/// use dp2_core_interface::PipelineApi;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pipeline = RemotePipeline::new("http://localhost:8181/ws/", Duration::from_secs(10))?;
/// let alive = pipeline.alive().await?;
/// println!("Pipeline {} is up", alive.version);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RemotePipeline {
    http: Client,

    /// Service root, always ending with `/`
    base: Url,

    /// Installed once credentials are known
    signer: Arc<RwLock<Option<RequestSigner>>>,
}

impl RemotePipeline {
    /// Create a client for the service rooted at `base_url`.
    ///
    /// `timeout` bounds every single request.
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, ConnectError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base,
            signer: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve a resource path and sign it when credentials are installed
    fn endpoint(&self, path: &str) -> std::result::Result<Url, ConnectError> {
        let mut url = self.base.join(path)?;
        let signer = self
            .signer
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(signer) = signer.as_ref() {
            signer.sign(&mut url);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, ConnectError> {
        let bytes = self.get_bytes(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_bytes(&self, path: &str) -> std::result::Result<Vec<u8>, ConnectError> {
        let url = self.endpoint(path)?;
        debug!("GET {}", path);

        let response = check_status(self.http.get(url).send().await?).await?;
        let bytes = response.bytes().await?;

        debug!("GET {} returned {} bytes", path, bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Turn non-2xx answers into `ConnectError::Status`
async fn check_status(response: Response) -> std::result::Result<Response, ConnectError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(text) if !text.is_empty() => text,
        _ => status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string(),
    };

    Err(ConnectError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PipelineApi for RemotePipeline {
    async fn alive(&self) -> Result<Alive> {
        Ok(self.get_json("alive").await?)
    }

    async fn scripts(&self) -> Result<Vec<ScriptSummary>> {
        Ok(self.get_json("scripts").await?)
    }

    async fn script(&self, id: &str) -> Result<Script> {
        Ok(self.get_json(&format!("scripts/{}", id)).await?)
    }

    async fn job(&self, id: &str) -> Result<Job> {
        Ok(self.get_json(&format!("jobs/{}", id)).await?)
    }

    async fn jobs(&self) -> Result<Vec<Job>> {
        Ok(self.get_json("jobs").await?)
    }

    async fn submit_job(&self, request: &JobRequest) -> Result<Job> {
        let url = self.endpoint("jobs").map_err(ApiError::from)?;
        debug!(
            "POST jobs (script={}, inputs={}, options={})",
            request.script.href,
            request.inputs.len(),
            request.options.len()
        );

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(ConnectError::from)?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await.map_err(ConnectError::from)?;
        let job: Job = serde_json::from_slice(&bytes).map_err(ConnectError::from)?;

        info!("Job {} submitted", job.id);
        Ok(job)
    }

    async fn delete_job(&self, id: &str) -> Result<bool> {
        let url = self
            .endpoint(&format!("jobs/{}", id))
            .map_err(ApiError::from)?;
        debug!("DELETE jobs/{}", id);

        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(ConnectError::from)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }

    async fn results(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self.get_bytes(&format!("jobs/{}/result", id)).await?)
    }

    async fn log(&self, id: &str) -> Result<Vec<u8>> {
        Ok(self.get_bytes(&format!("jobs/{}/log", id)).await?)
    }

    async fn queue(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.get_json("queue").await?)
    }

    async fn move_up(&self, id: &str) -> Result<Vec<QueueEntry>> {
        Ok(self.get_json(&format!("queue/up/{}", id)).await?)
    }

    async fn move_down(&self, id: &str) -> Result<Vec<QueueEntry>> {
        Ok(self.get_json(&format!("queue/down/{}", id)).await?)
    }

    async fn halt(&self, key: &str) -> Result<()> {
        self.get_bytes(&format!("admin/halt/{}", key)).await?;
        info!("Halt request accepted");
        Ok(())
    }

    fn set_credentials(&self, credentials: Credentials) {
        let signer = if credentials.is_empty() {
            None
        } else {
            info!("Request signing enabled for client {}", credentials.key);
            Some(RequestSigner::new(&credentials))
        };

        let mut slot = self
            .signer
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = signer;
    }
}
