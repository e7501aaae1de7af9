//! Error types for the gridcast engine and its collaborators.

/// Top-level error type for gridcast operations.
#[derive(Debug, thiserror::Error)]
pub enum GridcastError {
    #[error("Invalid grid {rows}x{cols}: rows and cols must both be at least 1")]
    InvalidGrid { rows: usize, cols: usize },

    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String },

    #[error("Frame {width}x{height} is smaller than the {cols}x{rows} grid")]
    FrameSmallerThanGrid {
        width: usize,
        height: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Acquisition error: {message}")]
    Acquisition { message: String },

    #[error("Forwarding error: {message}")]
    Forwarding { message: String },

    #[error("Presentation error: {message}")]
    Presentation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Result type alias using GridcastError.
pub type GridcastResult<T> = Result<T, GridcastError>;

impl GridcastError {
    pub fn malformed_frame(msg: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: msg.into(),
        }
    }

    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition {
            message: msg.into(),
        }
    }

    pub fn forwarding(msg: impl Into<String>) -> Self {
        Self::Forwarding {
            message: msg.into(),
        }
    }

    pub fn presentation(msg: impl Into<String>) -> Self {
        Self::Presentation {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error should end a streaming run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Forwarding { .. } | Self::Presentation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarding_and_presentation_errors_are_not_fatal() {
        assert!(!GridcastError::forwarding("udp down").is_fatal());
        assert!(!GridcastError::presentation("window gone").is_fatal());
        assert!(GridcastError::acquisition("no camera").is_fatal());
        assert!(GridcastError::InvalidGrid { rows: 0, cols: 3 }.is_fatal());
    }

    #[test]
    fn messages_name_the_shape() {
        let err = GridcastError::FrameSmallerThanGrid {
            width: 2,
            height: 3,
            rows: 4,
            cols: 4,
        };
        assert_eq!(err.to_string(), "Frame 2x3 is smaller than the 4x4 grid");
    }
}
