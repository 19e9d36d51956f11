/*!
 * Execution queue
 *
 * The service owns the ordering and the computed priorities; these calls hand
 * its snapshots through untouched.
 */

use dp2_core_interface::QueueEntry;
use tracing::debug;

use super::{require_id, Link};
use crate::error::Result;

impl Link {
    /// Current execution queue in service order
    pub async fn queue(&self) -> Result<Vec<QueueEntry>> {
        Ok(self.api.queue().await?)
    }

    /// Move a job one position towards the head of the queue
    pub async fn move_up(&self, id: &str) -> Result<Vec<QueueEntry>> {
        let id = require_id(id)?;
        debug!(job_id = id, "Moving job up");
        Ok(self.api.move_up(id).await?)
    }

    /// Move a job one position towards the tail of the queue
    pub async fn move_down(&self, id: &str) -> Result<Vec<QueueEntry>> {
        let id = require_id(id)?;
        debug!(job_id = id, "Moving job down");
        Ok(self.api.move_down(id).await?)
    }
}
