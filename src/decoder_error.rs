//! Decoder errors.

/// Errors thrown by the CELT decoder.
#[derive(Debug)]
pub enum CeltDecoderError {
    /// The requested frame size is not one of the four CELT frame sizes (2.5/5/10/20 ms).
    InvalidFrameSize,
    /// The packet is too short, or its internal framing is inconsistent, to be a valid
    /// CELT frame.
    InvalidPacket,
    /// Decoding failed partway through, after the packet passed initial validation.
    DecodingFailed(&'static str),
}

impl std::fmt::Display for CeltDecoderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CeltDecoderError::InvalidFrameSize => write!(f, "invalid frame size"),
            CeltDecoderError::InvalidPacket => write!(f, "invalid packet"),
            CeltDecoderError::DecodingFailed(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CeltDecoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
