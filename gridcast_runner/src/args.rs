// Command-line arguments for the gridcast runner, parsed with clap.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gridcast::AppConfig;
use std::path::PathBuf;

/// Where frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// A capture device through OpenCV (needs the `camera` feature)
    Camera,
    /// A generated, moving test pattern
    Synthetic,
    /// Still images read from a directory, in file-name order
    Images,
}

#[derive(Debug, Parser, Clone)]
#[command(version, about = "Streams per-cell video statistics over OSC")]
pub struct RunnerArgs {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of grid rows
    #[arg(long)]
    pub rows: Option<usize>,

    /// Number of grid columns
    #[arg(long)]
    pub cols: Option<usize>,

    /// Target frames per second
    #[arg(long)]
    pub fps: Option<f64>,

    /// OSC destination host
    #[arg(long)]
    pub host: Option<String>,

    /// OSC destination port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Capture device index
    #[arg(long)]
    pub camera: Option<i32>,

    /// Frame source; defaults to the camera when built with it, else synthetic
    #[arg(short, long, value_enum)]
    pub source: Option<SourceKind>,

    /// Directory of images for `--source images`
    #[arg(long)]
    pub images: Option<PathBuf>,

    /// Restart the image sequence instead of ending the stream
    #[arg(long)]
    pub loop_images: bool,

    /// Width of synthetic frames
    #[arg(long, default_value_t = 640)]
    pub width: usize,

    /// Height of synthetic frames
    #[arg(long, default_value_t = 480)]
    pub height: usize,

    /// Stop after this many frames
    #[arg(short = 'n', long)]
    pub frames: Option<u64>,

    /// Show the camera preview window
    #[arg(long)]
    pub show_camera: bool,

    /// Show the per-cell overlay window
    #[arg(long)]
    pub show_visualizer: bool,

    /// Write PNG mosaics of the cell statistics into this directory
    #[arg(long)]
    pub mosaic_dir: Option<PathBuf>,

    /// Write a mosaic every N frames
    #[arg(long, default_value_t = 30)]
    pub mosaic_every: u64,

    /// Analyze cells on all cores
    #[arg(long)]
    pub parallel: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl RunnerArgs {
    /// Defaults, then the config file, then flags; validated.
    pub fn resolve_config(&self) -> Result<AppConfig> {
        let base = match &self.config {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => AppConfig::default(),
        };
        let config = self.apply_overrides(base);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn apply_overrides(&self, mut config: AppConfig) -> AppConfig {
        if let Some(rows) = self.rows {
            config.grid.rows = rows;
        }
        if let Some(cols) = self.cols {
            config.grid.cols = cols;
        }
        if let Some(fps) = self.fps {
            config.target_fps = fps;
        }
        if let Some(host) = &self.host {
            config.osc.host = host.clone();
        }
        if let Some(port) = self.port {
            config.osc.port = port;
        }
        if let Some(camera) = self.camera {
            config.camera_index = camera;
        }
        config.show_camera |= self.show_camera;
        config.show_visualizer |= self.show_visualizer;
        config
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.unwrap_or(if cfg!(feature = "camera") {
            SourceKind::Camera
        } else {
            SourceKind::Synthetic
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = RunnerArgs::parse_from([
            "gridcast_runner",
            "--rows",
            "8",
            "--port",
            "9001",
            "--fps",
            "12.5",
            "--show-camera",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.grid.rows, 8);
        assert_eq!(config.grid.cols, 4);
        assert_eq!(config.osc.port, 9001);
        assert_eq!(config.target_fps, 12.5);
        assert!(config.show_camera);
        assert!(!config.show_visualizer);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let args = RunnerArgs::parse_from(["gridcast_runner", "--cols", "0"]);
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gridcast.json");
        std::fs::write(&path, r#"{ "grid": { "rows": 2, "cols": 3 }, "camera_index": 1 }"#)
            .unwrap();

        let args = RunnerArgs::parse_from([
            "gridcast_runner",
            "--config",
            path.to_str().unwrap(),
            "--cols",
            "6",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!((config.grid.rows, config.grid.cols), (2, 6));
        assert_eq!(config.camera_index, 1);
    }

    #[test]
    fn source_defaults_follow_the_build() {
        let args = RunnerArgs::parse_from(["gridcast_runner"]);
        let expected = if cfg!(feature = "camera") {
            SourceKind::Camera
        } else {
            SourceKind::Synthetic
        };
        assert_eq!(args.source_kind(), expected);
    }
}
