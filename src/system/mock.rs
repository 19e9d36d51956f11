//! In-memory Pipeline 2 service for testing
//!
//! `MockPipeline` implements `PipelineApi` without any network so that the
//! link layer can be exercised in unit and integration tests.

use async_trait::async_trait;
use dp2_core_interface::{
    Alive, ApiError, Credentials, Job, JobRequest, JobStatus, PipelineApi, QueueEntry, Result,
    Script, ScriptSummary,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug)]
struct MockState {
    alive: Alive,
    broken: bool,
    latency: Option<Duration>,
    scripts: Vec<Script>,
    /// Job ids in submission order
    job_order: Vec<String>,
    /// Upcoming snapshots per job; the last one repeats forever
    timelines: HashMap<String, VecDeque<Job>>,
    results: HashMap<String, Vec<u8>>,
    logs: HashMap<String, Vec<u8>>,
    queue: Vec<QueueEntry>,
    calls: Vec<String>,
    credentials: Option<Credentials>,
    submitted: Vec<JobRequest>,
    halt_key: String,
    halted: bool,
}

/// Fake Pipeline 2 service
///
/// Clones share the same state, so a test can keep a handle for assertions
/// while the link owns another.
///
/// # Example
///
/// ```rust
/// use dp2::system::MockPipeline;
/// use dp2_core_interface::{Job, JobStatus, PipelineApi};
///
/// # async fn example() -> Result<(), dp2_core_interface::ApiError> {
/// let pipeline = MockPipeline::new();
/// pipeline.add_job(Job::new("job1", JobStatus::Done));
///
/// let job = pipeline.job("job1").await?;
/// assert_eq!(job.status, JobStatus::Done);
/// assert_eq!(pipeline.last_call().as_deref(), Some("job"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockPipeline {
    state: Arc<Mutex<MockState>>,
}

impl MockPipeline {
    /// A live, unauthenticated service in local mode reporting version `test`
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                alive: Alive {
                    version: "test".to_string(),
                    local_mode: true,
                    authentication: false,
                },
                broken: false,
                latency: None,
                scripts: Vec::new(),
                job_order: Vec::new(),
                timelines: HashMap::new(),
                results: HashMap::new(),
                logs: HashMap::new(),
                queue: Vec::new(),
                calls: Vec::new(),
                credentials: None,
                submitted: Vec::new(),
                halt_key: String::new(),
                halted: false,
            })),
        }
    }

    /// A service whose every call fails with a transport error
    pub fn unreachable() -> Self {
        let mock = Self::new();
        mock.set_broken(true);
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_alive(&self, alive: Alive) {
        self.lock().alive = alive;
    }

    pub fn set_broken(&self, broken: bool) {
        self.lock().broken = broken;
    }

    /// Delay every job lookup by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    pub fn add_script(&self, script: Script) {
        self.lock().scripts.push(script);
    }

    /// Register a job with a single, unchanging snapshot
    pub fn add_job(&self, job: Job) {
        let id = job.id.clone();
        self.add_job_timeline(&id, vec![job]);
    }

    /// Register successive snapshots of a job, one per `job()` call
    pub fn add_job_timeline(&self, id: &str, snapshots: Vec<Job>) {
        let mut state = self.lock();
        if !state.timelines.contains_key(id) {
            state.job_order.push(id.to_string());
        }
        state.timelines.insert(id.to_string(), snapshots.into());
    }

    pub fn set_results(&self, id: &str, data: &[u8]) {
        self.lock().results.insert(id.to_string(), data.to_vec());
    }

    pub fn set_log(&self, id: &str, data: &[u8]) {
        self.lock().logs.insert(id.to_string(), data.to_vec());
    }

    pub fn set_queue(&self, queue: Vec<QueueEntry>) {
        self.lock().queue = queue;
    }

    pub fn set_halt_key(&self, key: &str) {
        self.lock().halt_key = key.to_string();
    }

    /// Every capability invoked so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn last_call(&self) -> Option<String> {
        self.lock().calls.last().cloned()
    }

    /// Number of times a capability was invoked
    pub fn call_count(&self, call: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.lock().credentials.clone()
    }

    pub fn submitted(&self) -> Vec<JobRequest> {
        self.lock().submitted.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.lock().halted
    }

    /// Record the call and fail it when the service is broken
    fn enter(&self, call: &str) -> Result<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(call.to_string());
        if state.broken {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        Ok(state)
    }

    fn move_in_queue(&self, call: &str, id: &str, up: bool) -> Result<Vec<QueueEntry>> {
        let mut state = self.enter(call)?;
        let idx = state
            .queue
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ApiError::NotFound(format!("job {} is not queued", id)))?;

        if up && idx > 0 {
            state.queue.swap(idx, idx - 1);
        } else if !up && idx + 1 < state.queue.len() {
            state.queue.swap(idx, idx + 1);
        }
        Ok(state.queue.clone())
    }
}

impl Default for MockPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineApi for MockPipeline {
    async fn alive(&self) -> Result<Alive> {
        Ok(self.enter("alive")?.alive.clone())
    }

    async fn scripts(&self) -> Result<Vec<ScriptSummary>> {
        let state = self.enter("scripts")?;
        Ok(state
            .scripts
            .iter()
            .map(|s| ScriptSummary {
                id: s.id.clone(),
                href: s.href.clone(),
                nicename: s.nicename.clone(),
                description: s.description.clone(),
            })
            .collect())
    }

    async fn script(&self, id: &str) -> Result<Script> {
        let state = self.enter("script")?;
        state
            .scripts
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("script {}", id)))
    }

    async fn job(&self, id: &str) -> Result<Job> {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.enter("job")?;
        let timeline = state
            .timelines
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("job {}", id)))?;

        let snapshot = if timeline.len() > 1 {
            timeline.pop_front()
        } else {
            timeline.front().cloned()
        };
        snapshot.ok_or_else(|| ApiError::NotFound(format!("job {}", id)))
    }

    async fn jobs(&self) -> Result<Vec<Job>> {
        let state = self.enter("jobs")?;
        Ok(state
            .job_order
            .iter()
            .filter_map(|id| state.timelines.get(id).and_then(|t| t.front().cloned()))
            .collect())
    }

    async fn submit_job(&self, request: &JobRequest) -> Result<Job> {
        let mut state = self.enter("submit_job")?;
        let known = state
            .scripts
            .iter()
            .any(|s| s.reference() == request.script);
        if !known {
            return Err(ApiError::NotFound(format!(
                "script {}",
                request.script.href
            )));
        }

        let mut job = Job::new(format!("job{}", state.submitted.len() + 1), JobStatus::Idle);
        job.nicename = request.nicename.clone();
        job.priority = request.priority.unwrap_or_default();

        state.submitted.push(request.clone());
        state.job_order.push(job.id.clone());
        state
            .timelines
            .insert(job.id.clone(), VecDeque::from(vec![job.clone()]));
        Ok(job)
    }

    async fn delete_job(&self, id: &str) -> Result<bool> {
        let mut state = self.enter("delete_job")?;
        let existed = state.timelines.remove(id).is_some();
        state.job_order.retain(|j| j != id);
        Ok(existed)
    }

    async fn results(&self, id: &str) -> Result<Vec<u8>> {
        let state = self.enter("results")?;
        state
            .results
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("results of job {}", id)))
    }

    async fn log(&self, id: &str) -> Result<Vec<u8>> {
        let state = self.enter("log")?;
        state
            .logs
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("log of job {}", id)))
    }

    async fn queue(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.enter("queue")?.queue.clone())
    }

    async fn move_up(&self, id: &str) -> Result<Vec<QueueEntry>> {
        self.move_in_queue("move_up", id, true)
    }

    async fn move_down(&self, id: &str) -> Result<Vec<QueueEntry>> {
        self.move_in_queue("move_down", id, false)
    }

    async fn halt(&self, key: &str) -> Result<()> {
        let mut state = self.enter("halt")?;
        if state.halt_key.is_empty() || state.halt_key != key {
            return Err(ApiError::Unauthorized("invalid halt key".to_string()));
        }
        state.halted = true;
        Ok(())
    }

    fn set_credentials(&self, credentials: Credentials) {
        let mut state = self.lock();
        state.calls.push("set_credentials".to_string());
        state.credentials = Some(credentials);
    }
}
