//! Wire payloads for `text/event-stream` generation endpoints.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tokio_util::sync::CancellationToken;
use ts_rs::TS;

/// Named stage pushed on the `progress` event while a tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolStage {
    Validation,
    Fetch,
    Analysis,
    Generation,
    Database,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProgressPayload {
    pub stage: ToolStage,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ErrorPayload {
    pub message: String,
}

/// Cancels the wrapped token when dropped. Held by the SSE response stream
/// so client disconnect aborts the in-flight generation task.
pub struct CancelOnDrop(pub CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
