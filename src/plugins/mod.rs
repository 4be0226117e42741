// ============================================================================
// TRANSFORMS - cancellable pixel operations run by row
// ============================================================================

pub mod catalog;
pub mod geolocation;
pub mod grayscale;
pub mod median;
pub mod overlay;
pub mod runner;

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use crate::canvas::PixelSurface;
use crate::error::TransformError;

pub use catalog::TransformCatalog;
pub use runner::{JobOutcome, TransformJob, TransformRunner};

/// Author string shared by the bundled transforms.
pub const BUILTIN_AUTHOR: &str = "Vladimir";

/// A pixel operation the runner can drive against a surface.
///
/// Implementations read from [`TransformRequest::source`] and write into
/// [`TransformRequest::target_mut`]; the runner decides whether the target is
/// committed. Implementations should poll the cancel token at a fine grain and
/// return [`TransformError::Cancelled`] once they observe it.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;
    fn author(&self) -> &str;
    fn apply(&self, request: &mut TransformRequest<'_>) -> Result<(), TransformError>;
}

// ============================================================================
// PROGRESS + CANCELLATION
// ============================================================================

/// Receives percentages in `0..=100`. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, percent: u8) {
        self(percent)
    }
}

/// Forwards progress to another thread; a closed receiver is ignored.
impl ProgressSink for Sender<u8> {
    fn report(&self, percent: u8) {
        let _ = self.send(percent);
    }
}

/// Discards progress.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8) {}
}

/// Shared, set-once cancellation signal. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once the signal is set.
    pub fn check(&self) -> Result<(), TransformError> {
        if self.is_cancelled() {
            Err(TransformError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct ProgressState {
    completed_rows: usize,
    last: u8,
}

// ============================================================================
// REQUEST - one invocation's view of the surface
// ============================================================================

pub struct TransformRequest<'a> {
    source: &'a PixelSurface,
    target: &'a mut PixelSurface,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancelToken,
    state: Mutex<ProgressState>,
}

impl<'a> TransformRequest<'a> {
    pub fn new(
        source: &'a PixelSurface,
        target: &'a mut PixelSurface,
        progress: &'a dyn ProgressSink,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            source,
            target,
            progress,
            cancel,
            state: Mutex::new(ProgressState::default()),
        }
    }

    /// The frozen pre-invocation pixels.
    pub fn source(&self) -> &PixelSurface {
        self.source
    }

    /// The private working copy. Starts identical to the source.
    pub fn target_mut(&mut self) -> &mut PixelSurface {
        &mut *self.target
    }

    pub fn cancel(&self) -> &CancelToken {
        self.cancel
    }

    /// Report a milestone percentage. Values below the last delivered one are
    /// dropped so the sink only ever sees a non-decreasing sequence.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if percent > state.last {
            state.last = percent;
            self.progress.report(percent);
        }
    }

    /// Highest percentage delivered so far.
    pub fn last_reported(&self) -> u8 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).last
    }

    /// Run `f` for every row of the target in parallel.
    ///
    /// `f` receives the source snapshot, the row index and that row's bytes in
    /// the target. Cancellation is checked before each row; progress advances
    /// by one row's share after each row.
    pub fn for_each_row<F>(&mut self, f: F) -> Result<(), TransformError>
    where
        F: Fn(&PixelSurface, u32, &mut [u8]) -> Result<(), TransformError> + Sync,
    {
        let source = self.source;
        let cancel = self.cancel;
        let progress = self.progress;
        let state = &self.state;
        let height = source.height() as usize;
        let stride = source.stride();

        self.target
            .as_raw_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .try_for_each(|(y, row)| {
                cancel.check()?;
                f(source, y as u32, row)?;

                let mut st = state.lock().unwrap_or_else(|e| e.into_inner());
                st.completed_rows += 1;
                let percent = (st.completed_rows * 100 / height) as u8;
                if percent > st.last {
                    st.last = percent;
                    progress.report(percent);
                }
                Ok(())
            })
    }
}
