//! Channel-backed progress reporting for streaming tool runs.

use serde_json::Value;
use tokio::sync::mpsc;
use utils::sse::{ErrorPayload, ProgressPayload, ToolStage};

/// Event pushed to the SSE stream while a tool runs.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Progress(ProgressPayload),
    Success(Value),
    Error(ErrorPayload),
}

/// Sender half handed to tool services. Sends are best-effort: a closed
/// channel means the client went away and the run is being cancelled.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: mpsc::Sender<ToolEvent>,
}

impl ProgressReporter {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ToolEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub async fn stage(&self, stage: ToolStage, message: impl Into<String>) {
        let _ = self
            .tx
            .send(ToolEvent::Progress(ProgressPayload {
                stage,
                message: message.into(),
            }))
            .await;
    }

    pub async fn success(&self, data: Value) {
        let _ = self.tx.send(ToolEvent::Success(data)).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        let _ = self
            .tx
            .send(ToolEvent::Error(ErrorPayload {
                message: message.into(),
            }))
            .await;
    }
}
