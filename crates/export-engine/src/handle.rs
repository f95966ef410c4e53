//! Background export worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use touchset_common::error::{TouchsetError, TouchsetResult};

use crate::pipeline::{ExportPipeline, ExportRequest};
use crate::progress::{ExportEvent, ExportOutcome};

/// Handle to an export running on a blocking worker thread.
pub struct ExportHandle {
    /// Progress reports followed by one `Finished` event.
    pub progress: UnboundedReceiver<ExportEvent>,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<TouchsetResult<ExportOutcome>>,
}

impl ExportHandle {
    /// Ask the job to stop at the next frame boundary.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> TouchsetResult<ExportOutcome> {
        self.task
            .await
            .map_err(|e| TouchsetError::Other(anyhow::anyhow!("Export worker panicked: {e}")))?
    }
}

/// Run `pipeline` on tokio's blocking pool.
///
/// Must be called from within a tokio runtime. Frames are processed in
/// order on the single worker; the caller stays free to drain progress.
pub fn spawn_export(mut pipeline: ExportPipeline, request: ExportRequest) -> ExportHandle {
    let (tx, rx) = unbounded_channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);

    let task = tokio::task::spawn_blocking(move || {
        let result = pipeline.run(&request, &worker_cancel, |progress| {
            // The receiver may have been dropped; the job still runs to the end.
            let _ = tx.send(ExportEvent::Progress(progress));
        });
        if let Ok(outcome) = &result {
            let _ = tx.send(ExportEvent::Finished(outcome.clone()));
        }
        result
    });

    ExportHandle {
        progress: rx,
        cancel,
        task,
    }
}
