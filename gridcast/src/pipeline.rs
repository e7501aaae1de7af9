// THEORY:
// The `pipeline` module is the top-level driver. It pulls frames from a source,
// hands each one to the `GridAnalyzer`, forwards the records to a statistics
// sink, and lets any attached presenters look at the result. It is the only
// place that owns resources: the frame source and the presenters.
//
// Key architectural principles:
// 1.  **Collaborator Traits**: Capture, forwarding and presentation are seams
//     (`FrameSource`, `StatsSink`, `Presenter`). The engine knows nothing about
//     cameras, wire formats or windows.
// 2.  **Scoped Resources**: The source is opened through a `SourceGuard` and
//     released when the guard drops, on every exit path. Presenters are closed
//     after the loop no matter how it ended.
// 3.  **Error Policy**: Acquisition and malformed-frame failures end the run
//     and propagate. Forwarding and presentation failures are logged and the
//     run continues.
// 4.  **Real-Time Pacing**: Each iteration targets a fixed period. Early
//     iterations sleep off the remainder; late ones continue immediately and
//     never try to catch up.

use crate::core_modules::cell::CellData;
use crate::core_modules::frame::FrameBuffer;
use crate::core_modules::grid_analyzer::GridAnalyzer;
use crate::error::{GridcastError, GridcastResult};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A pull-based producer of frames.
pub trait FrameSource {
    /// Acquires the underlying device or stream.
    fn open(&mut self) -> GridcastResult<()>;

    /// The next frame, or `None` at end of stream.
    fn read_next_frame(&mut self) -> GridcastResult<Option<FrameBuffer>>;

    /// Releases whatever `open` acquired. Must be safe to call more than once.
    fn release(&mut self);
}

/// Receives the full record sequence of every frame.
pub trait StatsSink {
    fn send(&mut self, cells: &[CellData]) -> impl Future<Output = GridcastResult<()>>;
}

/// Observes records and frames; may ask the driver to stop.
pub trait Presenter {
    fn show(&mut self, cells: &[CellData], frame: &FrameBuffer) -> GridcastResult<()>;

    /// Polled once per frame after `show`.
    fn close_requested(&mut self) -> bool {
        false
    }

    fn close(&mut self) {}
}

/// Owns an opened source and releases it when dropped.
pub struct SourceGuard<'a, S: FrameSource> {
    source: &'a mut S,
}

impl<'a, S: FrameSource> SourceGuard<'a, S> {
    /// Opens `source`. If opening fails the source is released before returning.
    pub fn open(source: &'a mut S) -> GridcastResult<Self> {
        if let Err(e) = source.open() {
            source.release();
            return Err(match e {
                GridcastError::Acquisition { .. } => e,
                other => GridcastError::acquisition(other.to_string()),
            });
        }
        Ok(Self { source })
    }

    pub fn read_next_frame(&mut self) -> GridcastResult<Option<FrameBuffer>> {
        self.source.read_next_frame()
    }
}

impl<S: FrameSource> Drop for SourceGuard<'_, S> {
    fn drop(&mut self) {
        self.source.release();
    }
}

/// Fixed-period frame pacing without catch-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePacer {
    period: Duration,
}

impl FramePacer {
    pub fn from_fps(fps: f64) -> GridcastResult<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(GridcastError::config(format!(
                "target fps must be positive, got {fps}"
            )));
        }
        Ok(Self {
            period: Duration::from_secs_f64(1.0 / fps),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left in the current period, or `None` if it has already overrun.
    pub fn remaining(&self, elapsed: Duration) -> Option<Duration> {
        self.period.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Sleeps until one period after `started`, if that is still ahead.
    pub async fn pace(&self, started: Instant) {
        if let Some(rest) = self.remaining(started.elapsed()) {
            tokio::time::sleep(rest).await;
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    EndOfStream,
    CloseRequested,
    Shutdown,
    FrameLimit,
}

/// What happened during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames: u64,
    pub send_failures: u64,
    pub stop_reason: StopReason,
}

/// Tunables for the driver loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Spread cell analysis across cores.
    pub parallel: bool,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

/// The frame-by-frame driver loop.
pub struct StreamPipeline<S: FrameSource, K: StatsSink> {
    analyzer: GridAnalyzer,
    source: S,
    sink: K,
    presenters: Vec<Box<dyn Presenter>>,
    pacer: FramePacer,
    options: PipelineOptions,
}

impl<S: FrameSource, K: StatsSink> StreamPipeline<S, K> {
    pub fn new(analyzer: GridAnalyzer, source: S, sink: K, pacer: FramePacer) -> Self {
        Self {
            analyzer,
            source,
            sink,
            presenters: Vec::new(),
            pacer,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenters.push(Box::new(presenter));
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs until end of stream, a close request, the shutdown flag, or the
    /// frame limit. The source is released and presenters are closed on return.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> GridcastResult<RunSummary> {
        let result = self.run_loop(shutdown).await;
        for presenter in &mut self.presenters {
            presenter.close();
        }
        match &result {
            Ok(summary) => info!(
                "Stream stopped ({:?}) after {} frames, {} send failures",
                summary.stop_reason, summary.frames, summary.send_failures
            ),
            Err(e) => warn!("Stream aborted: {e}"),
        }
        result
    }

    async fn run_loop(&mut self, shutdown: watch::Receiver<bool>) -> GridcastResult<RunSummary> {
        let Self {
            analyzer,
            source,
            sink,
            presenters,
            pacer,
            options,
        } = self;
        let mut guard = SourceGuard::open(source)?;
        let grid = analyzer.grid();
        info!(
            "Streaming {}x{} grid at {:.1} fps",
            grid.rows,
            grid.cols,
            1.0 / pacer.period().as_secs_f64()
        );

        let mut summary = RunSummary::default();
        let stop_reason = loop {
            if *shutdown.borrow() {
                break StopReason::Shutdown;
            }
            if options.max_frames.is_some_and(|max| summary.frames >= max) {
                break StopReason::FrameLimit;
            }

            let started = Instant::now();
            let Some(buffer) = guard.read_next_frame()? else {
                break StopReason::EndOfStream;
            };
            let frame = buffer.as_frame()?;
            let cells = if options.parallel {
                analyzer.analyze_frame_parallel(&frame)?
            } else {
                analyzer.analyze_frame(&frame)?
            };
            summary.frames += 1;
            debug!(
                "Frame {}: {}x{} -> {} cells, mean brightness {:.3}",
                summary.frames,
                buffer.width,
                buffer.height,
                cells.len(),
                mean_brightness(&cells)
            );

            if let Err(e) = sink.send(&cells).await {
                if e.is_fatal() {
                    return Err(e);
                }
                summary.send_failures += 1;
                warn!("Failed to forward frame {}: {e}", summary.frames);
            }

            let mut close = false;
            for presenter in presenters.iter_mut() {
                if let Err(e) = presenter.show(&cells, &buffer) {
                    warn!("Presenter failed on frame {}: {e}", summary.frames);
                }
                close |= presenter.close_requested();
            }
            if close {
                break StopReason::CloseRequested;
            }

            pacer.pace(started).await;
        };
        summary.stop_reason = stop_reason;
        Ok(summary)
    }
}

fn mean_brightness(cells: &[CellData]) -> f32 {
    if cells.is_empty() {
        return 0.0;
    }
    cells.iter().map(|c| c.brightness).sum::<f32>() / cells.len() as f32
}
