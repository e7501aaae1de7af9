// THEORY:
// The mosaic is the visual counterpart of the OSC stream: the same `CellData`
// records painted back onto a canvas, each cell filled with its average color
// and, optionally, a swatch of its dominant color in the top-left corner. It
// only reads records and never feeds anything back into analysis.

use crate::core_modules::cell::CellData;
use crate::core_modules::grid_analyzer::GridAnalyzer;
use crate::error::{GridcastError, GridcastResult};
use image::{ImageEncoder, Rgb as ImageRgb, RgbImage};
use std::path::Path;

/// Fraction of a cell's shorter side used for the dominant-color swatch.
const SWATCH_FRACTION: usize = 3;

/// Paints `cells` onto a `width` x `height` canvas using the analyzer's partition.
pub fn render_mosaic(
    analyzer: &GridAnalyzer,
    cells: &[CellData],
    width: usize,
    height: usize,
    dominant_swatch: bool,
) -> GridcastResult<RgbImage> {
    let bounds = analyzer.partition(width, height)?;
    if bounds.len() != cells.len() {
        return Err(GridcastError::presentation(format!(
            "expected {} cell records, got {}",
            bounds.len(),
            cells.len()
        )));
    }

    let mut canvas = RgbImage::new(width as u32, height as u32);
    for (rect, cell) in bounds.iter().zip(cells) {
        let avg = cell.average_color().to_bytes();
        let dom = cell.dominant().to_bytes();
        let swatch = rect.height().min(rect.width()) / SWATCH_FRACTION;
        for y in rect.y_start..rect.y_end {
            for x in rect.x_start..rect.x_end {
                let in_swatch = dominant_swatch
                    && y - rect.y_start < swatch
                    && x - rect.x_start < swatch;
                let color = if in_swatch { dom } else { avg };
                canvas.put_pixel(
                    x as u32,
                    y as u32,
                    ImageRgb([color.red, color.green, color.blue]),
                );
            }
        }
    }
    Ok(canvas)
}

/// Writes `image` as a PNG file.
pub fn save_png(image: &RgbImage, path: impl AsRef<Path>) -> GridcastResult<()> {
    let output = std::io::BufWriter::new(std::fs::File::create(path)?);
    let encoder = image::codecs::png::PngEncoder::new(output);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::core_modules::frame::FrameBuffer;
    use crate::core_modules::pixel::ChannelOrder;

    fn two_tone() -> FrameBuffer {
        // Left half pure red, right half pure blue, stored as BGR.
        let (width, height) = (8, 4);
        let mut data = Vec::new();
        for _ in 0..height {
            for x in 0..width {
                let px: [u8; 3] = if x < 4 { [0, 0, 255] } else { [255, 0, 0] };
                data.extend_from_slice(&px);
            }
        }
        FrameBuffer::new(data, width, height, ChannelOrder::Bgr)
    }

    #[test]
    fn mosaic_paints_average_colors() {
        let analyzer = GridAnalyzer::new(GridConfig::new(1, 2).unwrap()).unwrap();
        let buffer = two_tone();
        let cells = analyzer.analyze_frame(&buffer.as_frame().unwrap()).unwrap();

        let mosaic = render_mosaic(&analyzer, &cells, 8, 4, false).unwrap();
        assert_eq!(mosaic.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(mosaic.get_pixel(7, 3).0, [0, 0, 255]);
    }

    #[test]
    fn mosaic_rejects_mismatched_records() {
        let analyzer = GridAnalyzer::new(GridConfig::new(2, 2).unwrap()).unwrap();
        assert!(render_mosaic(&analyzer, &[], 8, 8, true).is_err());
    }

    #[test]
    fn saves_a_readable_png() {
        let analyzer = GridAnalyzer::new(GridConfig::new(2, 2).unwrap()).unwrap();
        let buffer = two_tone();
        let cells = analyzer.analyze_frame(&buffer.as_frame().unwrap()).unwrap();
        let mosaic = render_mosaic(&analyzer, &cells, 8, 4, true).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosaic.png");
        save_png(&mosaic, &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded, mosaic);
    }
}
