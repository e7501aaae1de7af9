//! Concrete frame sources for the runner.

use gridcast::{ChannelOrder, FrameBuffer, FrameSource, GridcastError, GridcastResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// A moving test pattern, for running without a capture device.
///
/// Frames are BGR, like camera frames, so the channel conversion is exercised
/// the same way.
pub struct SyntheticSource {
    width: usize,
    height: usize,
    limit: Option<u64>,
    produced: u64,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(width: usize, height: usize, limit: Option<u64>) -> Self {
        Self {
            width,
            height,
            limit,
            produced: 0,
            opened: false,
        }
    }

    fn render(&self, t: usize) -> FrameBuffer {
        let (width, height) = (self.width, self.height);
        let mut data = Vec::with_capacity(width * height * 3);
        // A bright square sweeping left to right over diagonal color bands.
        let side = (width.min(height) / 4).max(1);
        let square_x = (t * 4) % width.max(1);
        let square_y = (height - side.min(height)) / 2;
        for y in 0..height {
            for x in 0..width {
                let in_square = (square_x..square_x + side).contains(&x)
                    && (square_y..square_y + side).contains(&y);
                if in_square {
                    data.extend_from_slice(&[255, 255, 255]);
                } else {
                    data.push(((x + t * 2) % 256) as u8);
                    data.push(((y * 2 + t) % 256) as u8);
                    data.push((((x + y) / 2 + t * 3) % 256) as u8);
                }
            }
        }
        FrameBuffer::new(data, width, height, ChannelOrder::Bgr)
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> GridcastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GridcastError::acquisition(format!(
                "synthetic frames cannot be {}x{}",
                self.width, self.height
            )));
        }
        self.opened = true;
        self.produced = 0;
        Ok(())
    }

    fn read_next_frame(&mut self) -> GridcastResult<Option<FrameBuffer>> {
        if !self.opened {
            return Err(GridcastError::acquisition("synthetic source is not open"));
        }
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }
        let frame = self.render(self.produced as usize);
        self.produced += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.opened = false;
    }
}

/// Still images from a directory, decoded with `image`, in file-name order.
pub struct ImageSequenceSource {
    dir: PathBuf,
    looping: bool,
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequenceSource {
    pub fn new(dir: impl Into<PathBuf>, looping: bool) -> Self {
        Self {
            dir: dir.into(),
            looping,
            paths: Vec::new(),
            next: 0,
        }
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> GridcastResult<()> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && Self::is_image(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(GridcastError::acquisition(format!(
                "no images found in {}",
                self.dir.display()
            )));
        }
        paths.sort();
        info!("Found {} images in {}", paths.len(), self.dir.display());
        self.paths = paths;
        self.next = 0;
        Ok(())
    }

    fn read_next_frame(&mut self) -> GridcastResult<Option<FrameBuffer>> {
        if self.next >= self.paths.len() {
            if !self.looping || self.paths.is_empty() {
                return Ok(None);
            }
            self.next = 0;
        }
        let path = &self.paths[self.next];
        self.next += 1;
        debug!("Reading {}", path.display());
        let image = image::open(path)
            .map_err(|e| GridcastError::acquisition(format!("{}: {e}", path.display())))?;
        Ok(Some(FrameBuffer::from_rgb_image(image.to_rgb8())))
    }

    fn release(&mut self) {
        self.paths.clear();
        self.next = 0;
    }
}

#[cfg(feature = "camera")]
pub use camera::CameraSource;

#[cfg(feature = "camera")]
mod camera {
    use gridcast::{ChannelOrder, FrameBuffer, FrameSource, GridcastError, GridcastResult};
    use opencv::{
        core::Mat,
        prelude::*,
        videoio::{self, VideoCapture},
    };
    use tracing::info;

    fn acquisition(e: opencv::Error) -> GridcastError {
        GridcastError::acquisition(e.to_string())
    }

    /// A capture device opened through OpenCV. Frames are BGR.
    pub struct CameraSource {
        index: i32,
        capture: Option<VideoCapture>,
        frame: Mat,
    }

    impl CameraSource {
        pub fn new(index: i32) -> Self {
            Self {
                index,
                capture: None,
                frame: Mat::default(),
            }
        }
    }

    impl FrameSource for CameraSource {
        fn open(&mut self) -> GridcastResult<()> {
            let capture = VideoCapture::new(self.index, videoio::CAP_ANY).map_err(acquisition)?;
            if !capture.is_opened().map_err(acquisition)? {
                return Err(GridcastError::acquisition(format!(
                    "failed to open camera {}",
                    self.index
                )));
            }
            info!("Opened camera {}", self.index);
            self.capture = Some(capture);
            Ok(())
        }

        fn read_next_frame(&mut self) -> GridcastResult<Option<FrameBuffer>> {
            let Some(capture) = self.capture.as_mut() else {
                return Err(GridcastError::acquisition("camera is not open"));
            };
            if !capture.read(&mut self.frame).map_err(acquisition)? || self.frame.empty() {
                return Ok(None);
            }
            if self.frame.channels() != 3 {
                return Err(GridcastError::malformed_frame(format!(
                    "camera delivered {} channels, expected 3",
                    self.frame.channels()
                )));
            }
            let data = if self.frame.is_continuous() {
                self.frame.data_bytes().map_err(acquisition)?.to_vec()
            } else {
                let packed = self.frame.try_clone().map_err(acquisition)?;
                packed.data_bytes().map_err(acquisition)?.to_vec()
            };
            Ok(Some(FrameBuffer::new(
                data,
                self.frame.cols() as usize,
                self.frame.rows() as usize,
                ChannelOrder::Bgr,
            )))
        }

        fn release(&mut self) {
            if let Some(mut capture) = self.capture.take() {
                if let Err(e) = capture.release() {
                    tracing::warn!("Failed to release camera {}: {e}", self.index);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_ends_at_its_limit() {
        let mut source = SyntheticSource::new(32, 24, Some(2));
        assert!(source.read_next_frame().is_err());
        source.open().unwrap();

        let first = source.read_next_frame().unwrap().unwrap();
        assert_eq!((first.width, first.height), (32, 24));
        assert_eq!(first.order, ChannelOrder::Bgr);
        first.as_frame().unwrap();

        let second = source.read_next_frame().unwrap().unwrap();
        assert_ne!(first, second);
        assert!(source.read_next_frame().unwrap().is_none());
    }

    #[test]
    fn synthetic_source_rejects_empty_frames() {
        assert!(SyntheticSource::new(0, 10, None).open().is_err());
    }

    #[test]
    fn image_sequence_reads_sorted_files_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(4, 2, image::Rgb([10, 20, 30]))
            .save(dir.path().join("b.png"))
            .unwrap();
        image::RgbImage::from_pixel(4, 2, image::Rgb([200, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let mut source = ImageSequenceSource::new(dir.path(), false);
        source.open().unwrap();
        let first = source.read_next_frame().unwrap().unwrap();
        assert_eq!(first.order, ChannelOrder::Rgb);
        assert_eq!(&first.data[..3], &[200, 0, 0]);
        let second = source.read_next_frame().unwrap().unwrap();
        assert_eq!(&second.data[..3], &[10, 20, 30]);
        assert!(source.read_next_frame().unwrap().is_none());
    }

    #[test]
    fn image_sequence_can_loop() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]))
            .save(dir.path().join("only.png"))
            .unwrap();

        let mut source = ImageSequenceSource::new(dir.path(), true);
        source.open().unwrap();
        for _ in 0..3 {
            assert!(source.read_next_frame().unwrap().is_some());
        }
    }

    #[test]
    fn empty_directory_is_an_acquisition_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageSequenceSource::new(dir.path(), false).open().unwrap_err();
        assert!(matches!(err, GridcastError::Acquisition { .. }));
    }
}
