//! Startup configuration.
//!
//! Everything here is supplied once, before the first frame, and never changes
//! during a run. Values come from defaults, an optional JSON file, and finally
//! command-line overrides applied by the runner.

use crate::error::{GridcastError, GridcastResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shape of the partition applied to every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
}

impl GridConfig {
    pub fn new(rows: usize, cols: usize) -> GridcastResult<Self> {
        let config = Self { rows, cols };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GridcastResult<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(GridcastError::InvalidGrid {
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { rows: 4, cols: 4 }
    }
}

/// Where the statistics sink sends its datagrams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    pub host: String,
    pub port: u16,
    /// First address segment of every message, e.g. `grid` in `/grid/0/1/color`.
    pub address_root: String,
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5005,
            address_root: "grid".to_string(),
        }
    }
}

impl OscConfig {
    pub fn destination(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Global application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub osc: OscConfig,
    /// Index of the capture device to open.
    pub camera_index: i32,
    /// Target frames per second for the driver loop.
    pub target_fps: f64,
    /// Show the raw camera frame in a preview window.
    pub show_camera: bool,
    /// Show the per-cell statistics overlay.
    pub show_visualizer: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            osc: OscConfig::default(),
            camera_index: 0,
            target_fps: 30.0,
            show_camera: false,
            show_visualizer: false,
        }
    }
}

impl AppConfig {
    /// Parses a JSON document. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> GridcastResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> GridcastResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> GridcastResult<()> {
        self.grid.validate()?;
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(GridcastError::config(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }
        if self.osc.host.trim().is_empty() {
            return Err(GridcastError::config("osc.host must not be empty"));
        }
        if self.osc.address_root.contains('/') || self.osc.address_root.is_empty() {
            return Err(GridcastError::config(
                "osc.address_root must be a single non-empty path segment",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_reference_setup() {
        let config = AppConfig::default();
        assert_eq!(config.grid, GridConfig { rows: 4, cols: 4 });
        assert_eq!(config.osc.destination(), "127.0.0.1:5005");
        assert_eq!(config.target_fps, 30.0);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json_str(r#"{ "grid": { "rows": 8 }, "target_fps": 15 }"#)
            .unwrap();
        assert_eq!(config.grid.rows, 8);
        assert_eq!(config.grid.cols, 4);
        assert_eq!(config.target_fps, 15.0);
        assert_eq!(config.osc.port, 5005);
    }

    #[test]
    fn rejects_degenerate_values() {
        assert!(matches!(
            GridConfig::new(0, 3),
            Err(GridcastError::InvalidGrid { rows: 0, cols: 3 })
        ));
        assert!(AppConfig::from_json_str(r#"{ "target_fps": 0 }"#).is_err());
        assert!(AppConfig::from_json_str(r#"{ "osc": { "host": " " } }"#).is_err());
        assert!(AppConfig::from_json_str(r#"{ "osc": { "address_root": "a/b" } }"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "osc": {{ "port": 9000 }}, "show_camera": true }}"#).unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.osc.port, 9000);
        assert!(config.show_camera);
    }
}
