mod args;
mod logging;
mod presenters;
mod sources;

use anyhow::{Context, Result, bail};
use args::{RunnerArgs, SourceKind};
use clap::Parser;
use gridcast::osc::OscSender;
use gridcast::{
    AppConfig, FramePacer, FrameSource, GridAnalyzer, PipelineOptions, RunSummary, StreamPipeline,
};
use presenters::{LogPresenter, MosaicPresenter};
use sources::{ImageSequenceSource, SyntheticSource};
use tokio::sync::watch;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = RunnerArgs::parse();
    logging::init_logging(args.log_json);

    let config = args.resolve_config()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing the current frame");
            let _ = shutdown_tx.send(true);
        }
    });

    let summary = match args.source_kind() {
        SourceKind::Synthetic => {
            let source = SyntheticSource::new(args.width, args.height, None);
            stream(source, &args, &config, shutdown_rx).await?
        }
        SourceKind::Images => {
            let Some(dir) = &args.images else {
                bail!("--source images needs --images <DIR>");
            };
            let source = ImageSequenceSource::new(dir, args.loop_images);
            stream(source, &args, &config, shutdown_rx).await?
        }
        SourceKind::Camera => stream_camera(&args, &config, shutdown_rx).await?,
    };

    info!(
        "Done: {} frames streamed, {} forwarding failures",
        summary.frames, summary.send_failures
    );
    Ok(())
}

async fn stream<S: FrameSource>(
    source: S,
    args: &RunnerArgs,
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<RunSummary> {
    let analyzer = GridAnalyzer::new(config.grid)?;
    let pacer = FramePacer::from_fps(config.target_fps)?;
    let sender = OscSender::connect(&config.osc)
        .await
        .with_context(|| format!("connecting OSC sender to {}", config.osc.destination()))?;
    info!(
        "Streaming {}x{} grid to {}",
        config.grid.rows,
        config.grid.cols,
        sender.destination()
    );

    let log_every = config.target_fps.round().max(1.0) as u64;
    let mut pipeline = StreamPipeline::new(analyzer.clone(), source, sender, pacer)
        .with_options(PipelineOptions {
            parallel: args.parallel,
            max_frames: args.frames,
        })
        .with_presenter(LogPresenter::new(log_every));

    if let Some(dir) = &args.mosaic_dir {
        let mosaic = MosaicPresenter::new(analyzer.clone(), dir, args.mosaic_every)
            .with_context(|| format!("preparing mosaic directory {}", dir.display()))?;
        pipeline = pipeline.with_presenter(mosaic);
    }

    if config.show_camera || config.show_visualizer {
        pipeline = attach_preview(pipeline, analyzer, config);
    }

    Ok(pipeline.run(shutdown).await?)
}

#[cfg(feature = "camera")]
async fn stream_camera(
    args: &RunnerArgs,
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<RunSummary> {
    let source = sources::CameraSource::new(config.camera_index);
    stream(source, args, config, shutdown).await
}

#[cfg(not(feature = "camera"))]
async fn stream_camera(
    _args: &RunnerArgs,
    _config: &AppConfig,
    _shutdown: watch::Receiver<bool>,
) -> Result<RunSummary> {
    bail!("camera support is not compiled in; rebuild with `--features camera`")
}

#[cfg(feature = "camera")]
fn attach_preview<S: FrameSource>(
    pipeline: StreamPipeline<S, OscSender>,
    analyzer: GridAnalyzer,
    config: &AppConfig,
) -> StreamPipeline<S, OscSender> {
    let on_off = |flag: bool| if flag { "on" } else { "off" };
    info!(
        "Preview windows: camera {}, visualizer {}",
        on_off(config.show_camera),
        on_off(config.show_visualizer)
    );
    pipeline.with_presenter(presenters::HighguiPresenter::new(
        analyzer,
        config.show_camera,
        config.show_visualizer,
    ))
}

#[cfg(not(feature = "camera"))]
fn attach_preview<S: FrameSource>(
    pipeline: StreamPipeline<S, OscSender>,
    _analyzer: GridAnalyzer,
    _config: &AppConfig,
) -> StreamPipeline<S, OscSender> {
    tracing::warn!("Preview windows need the `camera` feature; continuing without them");
    pipeline
}
