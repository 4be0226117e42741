use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use super::{CancelToken, ProgressSink, Transform, TransformRequest};
use crate::canvas::PixelSurface;
use crate::error::TransformError;

/// The surface handed back by a background job together with its outcome.
pub type JobOutcome = (PixelSurface, Result<(), TransformError>);

/// Drives a [`Transform`] against a surface.
///
/// The transform works on a private copy. Only a successful run replaces the
/// surface's pixels; cancellation and failure leave it exactly as it was.
pub struct TransformRunner;

impl TransformRunner {
    pub fn run(
        transform: &dyn Transform,
        surface: &mut PixelSurface,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(), TransformError> {
        let name = transform.name().to_string();
        let start = Instant::now();
        info!(
            transform = %name,
            width = surface.width(),
            height = surface.height(),
            "transform started"
        );

        if cancel.is_cancelled() {
            info!(transform = %name, "transform cancelled before start");
            return Err(TransformError::Cancelled);
        }

        let mut working = surface.clone();
        let outcome = {
            let mut request = TransformRequest::new(surface, &mut working, progress, cancel);
            match catch_unwind(AssertUnwindSafe(|| transform.apply(&mut request))) {
                Ok(Ok(())) => Ok(request.last_reported() < 100),
                Ok(Err(e)) => Err(e),
                Err(payload) => Err(TransformError::failed(&name, panic_message(payload.as_ref()))),
            }
        };

        match outcome {
            Ok(needs_final) => {
                surface
                    .replace_pixels(working.into_rgba_image().into_raw())
                    .map_err(|e| TransformError::failed(&name, e))?;
                if needs_final {
                    progress.report(100);
                }
                info!(
                    transform = %name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "transform finished"
                );
                Ok(())
            }
            Err(TransformError::Cancelled) => {
                info!(
                    transform = %name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "transform cancelled; surface left unchanged"
                );
                Err(TransformError::Cancelled)
            }
            Err(e) => {
                error!(transform = %name, error = %e, "transform failed; surface left unchanged");
                Err(e)
            }
        }
    }

    /// Run a transform on the rayon pool. The surface is moved into the job
    /// and handed back when it completes, so nothing else can touch it while
    /// the transform is running.
    pub fn spawn(
        transform: Arc<dyn Transform>,
        surface: PixelSurface,
        progress: Arc<dyn ProgressSink>,
    ) -> TransformJob {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let name = transform.name().to_string();
        let (sender, receiver) = mpsc::channel();
        rayon::spawn(move || {
            let mut surface = surface;
            let result = Self::run(transform.as_ref(), &mut surface, progress.as_ref(), &token);
            let _ = sender.send((surface, result));
        });
        TransformJob {
            name,
            cancel,
            receiver,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================================
// BACKGROUND JOB HANDLE
// ============================================================================

pub struct TransformJob {
    name: String,
    cancel: CancelToken,
    receiver: Receiver<JobOutcome>,
}

impl TransformJob {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the running transform to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Non-blocking poll. `None` while the job is still running.
    pub fn try_finish(&self) -> Option<Result<JobOutcome, TransformError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(Ok(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.lost())),
        }
    }

    /// Block until the job completes.
    pub fn wait(self) -> Result<JobOutcome, TransformError> {
        self.receiver.recv().map_err(|_| self.lost())
    }

    fn lost(&self) -> TransformError {
        TransformError::failed(&self.name, "worker exited without returning the surface")
    }
}
