/*!
 * Live message stream of a running job
 *
 * A background task polls the job snapshot, forwards the messages it has not
 * delivered yet and closes the stream once the job is terminal. A failing
 * poll becomes a single error element followed by the end of the stream.
 */

use dp2_core_interface::{Message, PipelineApi};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};

/// Messages buffered between the polling task and the consumer
const STREAM_BUFFER: usize = 64;

/// Polling cadence of a message stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Pause between two polls
    pub interval: Duration,
    /// Upper bound for a single poll
    pub call_timeout: Duration,
}

impl StreamSettings {
    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            interval: config.message_poll_interval(),
            call_timeout: config.call_timeout(),
        }
    }
}

/// Consumer side of a job's message stream
///
/// Dropping the stream cancels the polling task.
#[derive(Debug)]
pub struct MessageStream {
    rx: mpsc::Receiver<Result<Message>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MessageStream {
    /// Start polling `job_id` in a background task
    pub(crate) fn spawn(api: Arc<dyn PipelineApi>, job_id: String, settings: StreamSettings) -> Self {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(poll_messages(api, job_id, settings, tx, cancel.clone()));

        Self {
            rx,
            cancel,
            task: Some(task),
        }
    }

    /// Next message, `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<Result<Message>> {
        self.rx.recv().await
    }

    /// Ask the polling task to stop at its next suspension point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop receiving and wait until the polling task has exited
    ///
    /// Messages not received yet are discarded.
    pub async fn join(mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Message polling task failed");
            }
        }
    }
}

impl Stream for MessageStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Messages of a snapshot above the watermark, ascending and without repeats
pub(crate) fn fresh_messages(mut messages: Vec<Message>, watermark: Option<u64>) -> Vec<Message> {
    if let Some(mark) = watermark {
        messages.retain(|m| m.sequence > mark);
    }
    messages.sort_by_key(|m| m.sequence);
    messages.dedup_by_key(|m| m.sequence);
    messages
}

/// Hand one element to the consumer; false when nobody is listening anymore
async fn deliver(
    tx: &mpsc::Sender<Result<Message>>,
    cancel: &CancellationToken,
    item: Result<Message>,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

async fn poll_messages(
    api: Arc<dyn PipelineApi>,
    job_id: String,
    settings: StreamSettings,
    tx: mpsc::Sender<Result<Message>>,
    cancel: CancellationToken,
) {
    let mut watermark: Option<u64> = None;
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    debug!(
        job_id = %job_id,
        interval_ms = settings.interval.as_millis(),
        "Message polling started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(job_id = %job_id, "Message polling cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(job_id = %job_id, "Message polling cancelled");
                return;
            }
            polled = tokio::time::timeout(settings.call_timeout, api.job(&job_id)) => polled,
        };

        let job = match polled {
            Ok(Ok(job)) => job,
            Ok(Err(e)) => {
                let err = LinkError::from(e);
                warn!(job_id = %job_id, error = %err, "Polling job messages failed");
                deliver(&tx, &cancel, Err(err)).await;
                return;
            }
            Err(_) => {
                let err = LinkError::Connectivity(format!(
                    "no answer for job {} within {:?}",
                    job_id, settings.call_timeout
                ));
                warn!(job_id = %job_id, error = %err, "Polling job messages timed out");
                deliver(&tx, &cancel, Err(err)).await;
                return;
            }
        };

        for message in fresh_messages(job.messages, watermark) {
            watermark = Some(message.sequence);
            if !deliver(&tx, &cancel, Ok(message)).await {
                debug!(job_id = %job_id, "Message consumer went away");
                return;
            }
        }

        if job.status.is_terminal() {
            info!(job_id = %job_id, status = %job.status, "Job finished");
            return;
        }
    }
}
