// THEORY:
// This file is the main entry point for the `gridcast` library crate.
// It exposes the frame analysis engine (`GridAnalyzer` and its `CellData`
// records) together with the plumbing a driver needs around it: startup
// configuration, the OSC statistics sink, and the paced streaming pipeline.
//
// The analysis internals live under `core_modules`; everything a caller
// normally touches is re-exported here.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod osc;
pub mod pipeline;

pub use config::{AppConfig, GridConfig, OscConfig};
pub use core_modules::cell::{CellBounds, CellData};
pub use core_modules::frame::{Frame, FrameBuffer};
pub use core_modules::grid_analyzer::GridAnalyzer;
pub use core_modules::pixel::{ChannelOrder, Rgb};
pub use error::{GridcastError, GridcastResult};
pub use pipeline::{
    FramePacer, FrameSource, PipelineOptions, Presenter, RunSummary, StatsSink, StopReason,
    StreamPipeline,
};
