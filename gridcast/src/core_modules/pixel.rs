// THEORY:
// The `pixel` module owns the channel-order contract between frame producers and
// the analysis engine. Capture devices hand us packed 3-byte pixels, but they do
// not agree on the order of those bytes: OpenCV delivers blue-green-red, while
// decoded image files deliver red-green-blue. Every consumer downstream of the
// analyzer (the OSC sink, the mosaic renderer, the overlay) speaks red-green-blue.
//
// Key architectural principles:
// 1.  **Explicit Order**: A frame never leaves its channel order implicit. It
//     carries a `ChannelOrder` tag and the analyzer converts at its boundary,
//     using the single conversion defined here.
// 2.  **Stored vs. Logical**: Stored triples (`[u8; 3]` in frame order) are what
//     the statistics loop iterates over. Logical triples (`Rgb`) are what the
//     outside world sees. Only `ChannelOrder::to_rgb` crosses that line.

/// Number of interleaved channels in every frame this engine accepts.
pub const CHANNELS: usize = 3;

/// Maximum value of an 8-bit channel, used to normalize statistics into [0, 1].
pub const CHANNEL_MAX: f64 = 255.0;

/// Byte order of the three interleaved channels in a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Blue, green, red. The capture-device convention.
    #[default]
    Bgr,
    /// Red, green, blue. The convention of decoded image files.
    Rgb,
}

impl ChannelOrder {
    /// Reorders a stored triple into a logical red-green-blue triple.
    #[inline]
    pub fn to_rgb<T: Copy>(self, stored: [T; 3]) -> Rgb<T> {
        match self {
            ChannelOrder::Bgr => Rgb {
                red: stored[2],
                green: stored[1],
                blue: stored[0],
            },
            ChannelOrder::Rgb => Rgb {
                red: stored[0],
                green: stored[1],
                blue: stored[2],
            },
        }
    }

    /// Inverse of `to_rgb`: lays a logical color out in this stored order.
    #[inline]
    pub fn from_rgb<T: Copy>(self, color: Rgb<T>) -> [T; 3] {
        match self {
            ChannelOrder::Bgr => [color.blue, color.green, color.red],
            ChannelOrder::Rgb => [color.red, color.green, color.blue],
        }
    }
}

/// A color triple in red, green, blue order regardless of where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb<T> {
    pub red: T,
    pub green: T,
    pub blue: T,
}

impl Rgb<u8> {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Divides each channel by 255.0.
    pub fn normalized(self) -> Rgb<f32> {
        Rgb {
            red: normalize(self.red as f64),
            green: normalize(self.green as f64),
            blue: normalize(self.blue as f64),
        }
    }
}

impl Rgb<f32> {
    /// Scales a normalized color back to 8-bit channels, rounding to nearest.
    pub fn to_bytes(self) -> Rgb<u8> {
        let scale = |v: f32| (v.clamp(0.0, 1.0) * CHANNEL_MAX as f32).round() as u8;
        Rgb {
            red: scale(self.red),
            green: scale(self.green),
            blue: scale(self.blue),
        }
    }

    pub fn as_array(self) -> [f32; 3] {
        [self.red, self.green, self.blue]
    }
}

/// Maps a 0..=255 magnitude into [0, 1] as `f32`.
#[inline]
pub fn normalize(value: f64) -> f32 {
    (value / CHANNEL_MAX).clamp(0.0, 1.0) as f32
}
