// THEORY:
// A `Frame` is the analyzer's only view of the outside world: an immutable,
// externally-owned, 3-channel raster. The analyzer borrows it for one call and
// never keeps it. Sources, on the other hand, must hand out something they own,
// so the module has two types:
//
// 1.  **`FrameBuffer`**: the owned, tightly packed bytes a `FrameSource` yields
//     each iteration, tagged with its `ChannelOrder`.
// 2.  **`Frame<'a>`**: a validated, borrowed view over such bytes. Validation
//     happens once, at construction, so the statistics loop can index freely.

use crate::core_modules::pixel::{CHANNELS, ChannelOrder};
use crate::error::{GridcastError, GridcastResult};

/// A borrowed, validated view of a packed height x width x 3 raster.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    data: &'a [u8],
    width: usize,
    height: usize,
    order: ChannelOrder,
}

impl<'a> Frame<'a> {
    /// Wraps a packed buffer. Fails if either dimension is zero or the buffer
    /// length is not exactly `width * height * 3`.
    pub fn new(
        data: &'a [u8],
        width: usize,
        height: usize,
        order: ChannelOrder,
    ) -> GridcastResult<Self> {
        if width == 0 || height == 0 {
            return Err(GridcastError::malformed_frame(format!(
                "frame has zero size ({width}x{height})"
            )));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|px| px.checked_mul(CHANNELS))
            .ok_or_else(|| GridcastError::malformed_frame("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(GridcastError::malformed_frame(format!(
                "expected {expected} bytes for a {width}x{height}x{CHANNELS} frame, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            order,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The packed bytes of pixel row `y`, columns `x_start..x_end`.
    #[inline]
    pub fn row_span(&self, y: usize, x_start: usize, x_end: usize) -> &'a [u8] {
        let row = y * self.width * CHANNELS;
        &self.data[row + x_start * CHANNELS..row + x_end * CHANNELS]
    }
}

/// An owned frame, as produced by a `FrameSource`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub order: ChannelOrder,
}

impl FrameBuffer {
    pub fn new(data: Vec<u8>, width: usize, height: usize, order: ChannelOrder) -> Self {
        Self {
            data,
            width,
            height,
            order,
        }
    }

    /// A frame filled with one stored triple.
    pub fn filled(width: usize, height: usize, order: ChannelOrder, stored: [u8; 3]) -> Self {
        let data = stored
            .iter()
            .copied()
            .cycle()
            .take(width * height * CHANNELS)
            .collect();
        Self::new(data, width, height, order)
    }

    /// Validates the buffer and borrows it as a `Frame`.
    pub fn as_frame(&self) -> GridcastResult<Frame<'_>> {
        Frame::new(&self.data, self.width, self.height, self.order)
    }

    /// Takes ownership of a decoded RGB image.
    pub fn from_rgb_image(image: image::RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(
            image.into_raw(),
            width as usize,
            height as usize,
            ChannelOrder::Rgb,
        )
    }

    /// Copies this frame into an RGB image, converting from the stored order.
    pub fn to_rgb_image(&self) -> GridcastResult<image::RgbImage> {
        let frame = self.as_frame()?;
        let mut data = Vec::with_capacity(self.data.len());
        for px in frame.data().chunks_exact(CHANNELS) {
            let rgb = frame.order().to_rgb([px[0], px[1], px[2]]);
            data.extend_from_slice(&[rgb.red, rgb.green, rgb.blue]);
        }
        image::RgbImage::from_raw(self.width as u32, self.height as u32, data)
            .ok_or_else(|| GridcastError::malformed_frame("frame does not fit an RGB image"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sized_frames() {
        assert!(Frame::new(&[], 0, 4, ChannelOrder::Bgr).is_err());
        assert!(Frame::new(&[], 4, 0, ChannelOrder::Bgr).is_err());
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let data = vec![0u8; 2 * 2 * 4];
        let err = Frame::new(&data, 2, 2, ChannelOrder::Bgr).unwrap_err();
        assert!(matches!(err, GridcastError::MalformedFrame { .. }));
    }

    #[test]
    fn row_span_slices_packed_bytes() {
        let data: Vec<u8> = (0..(3 * 2 * 3) as u8).collect();
        let frame = Frame::new(&data, 3, 2, ChannelOrder::Rgb).unwrap();
        assert_eq!(frame.row_span(1, 1, 3), &[12, 13, 14, 15, 16, 17]);
    }

    #[test]
    fn image_conversion_normalizes_channel_order() {
        let buffer = FrameBuffer::filled(2, 2, ChannelOrder::Bgr, [1, 2, 3]);
        let image = buffer.to_rgb_image().unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [3, 2, 1]);

        let back = FrameBuffer::from_rgb_image(image);
        assert_eq!(back.order, ChannelOrder::Rgb);
        assert_eq!(&back.data[..3], &[3, 2, 1]);
    }
}
