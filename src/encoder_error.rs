//! Encoder errors.

/// Errors thrown by the CELT encoder.
#[derive(Debug)]
pub enum CeltEncoderError {
    /// The requested frame size is not one of the four CELT frame sizes (2.5/5/10/20 ms).
    InvalidFrameSize,
    /// The input slice did not contain exactly `frame_size * channels` samples.
    InvalidInputLength,
    /// Encoding failed partway through, after the input passed initial validation.
    EncodingFailed(&'static str),
    /// The output buffer is too small to hold the encoded frame.
    BufferTooSmall,
}

impl std::fmt::Display for CeltEncoderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CeltEncoderError::InvalidFrameSize => write!(f, "invalid frame size"),
            CeltEncoderError::InvalidInputLength => write!(f, "invalid input length"),
            CeltEncoderError::EncodingFailed(message) => write!(f, "{}", message),
            CeltEncoderError::BufferTooSmall => write!(f, "output buffer is too small"),
        }
    }
}

impl std::error::Error for CeltEncoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
