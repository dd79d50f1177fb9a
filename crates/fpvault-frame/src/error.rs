/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload contains a marker byte. Marker values are outside the
    /// UTF-8 byte-value space, so this means the payload is not the UTF-8
    /// text the protocol requires.
    #[error("payload contains marker byte {byte:#04x} at offset {offset}")]
    MarkerInPayload { byte: u8, offset: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A delimited frame held bytes that are not valid UTF-8.
    #[error("frame payload is not valid UTF-8 ({len} bytes)")]
    InvalidUtf8 { len: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed before a complete frame was received.
    #[error("link closed (incomplete frame)")]
    LinkClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
