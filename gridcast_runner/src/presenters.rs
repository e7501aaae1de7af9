//! Presenters: read-only observers of each analyzed frame.

use gridcast::core_modules::mosaic::{render_mosaic, save_png};
use gridcast::{CellData, FrameBuffer, GridAnalyzer, GridcastResult, Presenter};
use std::path::PathBuf;
use tracing::info;

/// Logs a one-line digest of the grid every `every` frames.
pub struct LogPresenter {
    every: u64,
    seen: u64,
}

impl LogPresenter {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }

    fn digest(cells: &[CellData]) -> Option<String> {
        let brightest = cells
            .iter()
            .max_by(|a, b| a.brightness.total_cmp(&b.brightness))?;
        let busiest = cells
            .iter()
            .max_by(|a, b| a.contrast.total_cmp(&b.contrast))?;
        Some(format!(
            "brightest cell ({},{}) at {:.2}, highest contrast ({},{}) at {:.2}",
            brightest.row,
            brightest.col,
            brightest.brightness,
            busiest.row,
            busiest.col,
            busiest.contrast
        ))
    }
}

impl Presenter for LogPresenter {
    fn show(&mut self, cells: &[CellData], _frame: &FrameBuffer) -> GridcastResult<()> {
        self.seen += 1;
        if self.seen % self.every == 0 {
            if let Some(digest) = Self::digest(cells) {
                info!("Frame {}: {digest}", self.seen);
            }
        }
        Ok(())
    }
}

/// Saves a PNG mosaic of the cell statistics every `every` frames.
pub struct MosaicPresenter {
    analyzer: GridAnalyzer,
    dir: PathBuf,
    every: u64,
    seen: u64,
}

impl MosaicPresenter {
    pub fn new(analyzer: GridAnalyzer, dir: impl Into<PathBuf>, every: u64) -> GridcastResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            analyzer,
            dir,
            every: every.max(1),
            seen: 0,
        })
    }
}

impl Presenter for MosaicPresenter {
    fn show(&mut self, cells: &[CellData], frame: &FrameBuffer) -> GridcastResult<()> {
        self.seen += 1;
        if self.seen % self.every != 0 {
            return Ok(());
        }
        let mosaic = render_mosaic(&self.analyzer, cells, frame.width, frame.height, true)?;
        let path = self.dir.join(format!("mosaic_{:06}.png", self.seen));
        save_png(&mosaic, &path)?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(feature = "camera")]
pub use highgui::HighguiPresenter;

#[cfg(feature = "camera")]
mod highgui {
    use gridcast::core_modules::mosaic::render_mosaic;
    use gridcast::{
        CellData, ChannelOrder, FrameBuffer, GridAnalyzer, GridcastError, GridcastResult,
        Presenter,
    };
    use opencv::{
        core::{self, Mat, Rect, Scalar},
        highgui, imgproc,
        prelude::*,
    };

    const CAMERA_WINDOW: &str = "Webcam Grid";
    const DATA_WINDOW: &str = "Grid Data";

    fn presentation(e: opencv::Error) -> GridcastError {
        GridcastError::presentation(e.to_string())
    }

    /// Packs a frame into a BGR `Mat`, converting from its stored order.
    fn to_bgr_mat(frame: &FrameBuffer) -> GridcastResult<Mat> {
        let mut mat = Mat::new_rows_cols_with_default(
            frame.height as i32,
            frame.width as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(presentation)?;
        let bytes = mat.data_bytes_mut().map_err(presentation)?;
        match frame.order {
            ChannelOrder::Bgr => bytes.copy_from_slice(&frame.data),
            ChannelOrder::Rgb => {
                for (dst, src) in bytes.chunks_exact_mut(3).zip(frame.data.chunks_exact(3)) {
                    dst.copy_from_slice(&[src[2], src[1], src[0]]);
                }
            }
        }
        Ok(mat)
    }

    /// OpenCV windows: the raw camera preview and the cell overlay.
    pub struct HighguiPresenter {
        analyzer: GridAnalyzer,
        show_camera: bool,
        show_visualizer: bool,
        quit: bool,
    }

    impl HighguiPresenter {
        pub fn new(analyzer: GridAnalyzer, show_camera: bool, show_visualizer: bool) -> Self {
            Self {
                analyzer,
                show_camera,
                show_visualizer,
                quit: false,
            }
        }

        /// Average-color mosaic, blended over the camera frame when it is shown,
        /// with cell borders drawn on top.
        fn overlay(
            &self,
            cells: &[CellData],
            frame: &FrameBuffer,
            camera: &Mat,
        ) -> GridcastResult<Mat> {
            let mosaic = render_mosaic(&self.analyzer, cells, frame.width, frame.height, true)?;
            let mosaic = FrameBuffer::from_rgb_image(mosaic);
            let mosaic = to_bgr_mat(&mosaic)?;

            let mut output = Mat::default();
            if self.show_camera {
                core::add_weighted(camera, 0.4, &mosaic, 0.6, 0.0, &mut output, -1)
                    .map_err(presentation)?;
            } else {
                output = mosaic;
            }

            for bounds in self.analyzer.partition(frame.width, frame.height)? {
                let rect = Rect::new(
                    bounds.x_start as i32,
                    bounds.y_start as i32,
                    bounds.width() as i32,
                    bounds.height() as i32,
                );
                imgproc::rectangle(
                    &mut output,
                    rect,
                    Scalar::new(255.0, 255.0, 255.0, 0.0),
                    1,
                    imgproc::LINE_8,
                    0,
                )
                .map_err(presentation)?;
            }
            Ok(output)
        }

        fn window_closed(name: &str) -> bool {
            highgui::get_window_property(name, highgui::WND_PROP_VISIBLE)
                .map(|visible| visible < 1.0)
                .unwrap_or(true)
        }
    }

    impl Presenter for HighguiPresenter {
        fn show(&mut self, cells: &[CellData], frame: &FrameBuffer) -> GridcastResult<()> {
            let camera = to_bgr_mat(frame)?;
            if self.show_visualizer {
                let overlay = self.overlay(cells, frame, &camera)?;
                highgui::imshow(DATA_WINDOW, &overlay).map_err(presentation)?;
            } else if self.show_camera {
                highgui::imshow(CAMERA_WINDOW, &camera).map_err(presentation)?;
            }

            let key = highgui::wait_key(1).map_err(presentation)?;
            if key & 0xFF == i32::from(b'q') || key == 27 {
                self.quit = true;
            }
            let window = if self.show_visualizer { DATA_WINDOW } else { CAMERA_WINDOW };
            if Self::window_closed(window) {
                self.quit = true;
            }
            Ok(())
        }

        fn close_requested(&mut self) -> bool {
            self.quit
        }

        fn close(&mut self) {
            if let Err(e) = highgui::destroy_all_windows() {
                tracing::warn!("Failed to destroy windows: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcast::{ChannelOrder, GridConfig};

    fn analyzed(rows: usize, cols: usize) -> (GridAnalyzer, FrameBuffer, Vec<CellData>) {
        let analyzer = GridAnalyzer::new(GridConfig::new(rows, cols).unwrap()).unwrap();
        let frame = FrameBuffer::filled(12, 9, ChannelOrder::Bgr, [0, 128, 255]);
        let cells = analyzer.analyze_frame(&frame.as_frame().unwrap()).unwrap();
        (analyzer, frame, cells)
    }

    #[test]
    fn digest_names_the_extreme_cells() {
        let (_, _, mut cells) = analyzed(2, 2);
        cells[3].brightness = 0.99;
        cells[1].contrast = 0.5;
        let digest = LogPresenter::digest(&cells).unwrap();
        assert!(digest.contains("brightest cell (1,1)"));
        assert!(digest.contains("highest contrast (0,1)"));
        assert!(LogPresenter::digest(&[]).is_none());
    }

    #[test]
    fn mosaic_presenter_writes_every_nth_frame() {
        let (analyzer, frame, cells) = analyzed(3, 3);
        let dir = tempfile::tempdir().unwrap();
        let mut presenter = MosaicPresenter::new(analyzer, dir.path().join("out"), 2).unwrap();

        for _ in 0..4 {
            presenter.show(&cells, &frame).unwrap();
        }
        let mut written: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        written.sort();
        assert_eq!(written, vec!["mosaic_000002.png", "mosaic_000004.png"]);
        assert!(!presenter.close_requested());
    }
}
