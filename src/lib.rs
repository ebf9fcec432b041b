#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
//! Implements the CELT layer of the free and open Opus audio codec in Rust.
//!
//! CELT (Constrained Energy Lapped Transform) is the low-latency, music-quality half of
//! Opus described by RFC 6716 §4.3: an MDCT-based transform coder using a range coder,
//! per-band energy quantization, and pyramid vector quantization (PVQ) for the normalized
//! band shapes. This crate implements CELT on its own, independent of the SILK speech
//! codec and of Opus's outer packet framing (TOC byte, multi-frame packing, Ogg
//! encapsulation) — callers hand it raw PCM and get back a CELT frame payload, and
//! vice versa.
//!
//! Its main features are:
//!
//! * Sampling rates from 8 to 48 kHz
//! * Bit-rates from 6 kb/s to 510 kb/s
//! * Frame sizes of 2.5, 5, 10, and 20 ms
//! * Support for mono and stereo
//!
//! # Example
//!
//! ```
//! use celt_codec::{Channels, Decoder, Encoder, SamplingRate};
//!
//! let mut encoder = Encoder::new(SamplingRate::Hz48000, Channels::Mono).unwrap();
//! let mut decoder = Decoder::new(SamplingRate::Hz48000, Channels::Mono).unwrap();
//!
//! let pcm = vec![0.0f32; 960];
//! let packet = encoder.encode_float(&pcm, 960).unwrap();
//! let decoded = decoder.decode_float(&packet, 960).unwrap();
//! assert_eq!(decoded.len(), 960);
//! ```

pub use decoder::Decoder;
pub use decoder_error::CeltDecoderError;
pub use encoder::Encoder;
pub use encoder_error::CeltEncoderError;

pub(crate) mod celt;
pub(crate) mod cwrs;
mod decoder;
mod decoder_error;
mod encoder;
mod encoder_error;
pub(crate) mod math;
pub(crate) mod range_coder;

// Affects the following targets: avr and msp430
#[cfg(any(target_pointer_width = "8", target_pointer_width = "16"))]
compile_error!("usize needs to be at least 32 bit wide");

/// Allows applications to use their own sample format.
pub trait Sample {
    /// Converts the given float into the custom sample.
    fn from_f32(float: f32) -> Self;
    /// Converts the custom sample back into a float.
    fn to_f32(&self) -> f32;
}

impl Sample for f32 {
    #[inline(always)]
    fn from_f32(float: f32) -> Self {
        float
    }

    #[inline(always)]
    fn to_f32(&self) -> f32 {
        *self
    }
}

impl Sample for i16 {
    #[inline(always)]
    fn from_f32(float: f32) -> Self {
        let float = float * 32768.0;
        if float > 32767.0 {
            32767
        } else if float < -32768.0 {
            -32768
        } else {
            float as i16
        }
    }

    #[inline(always)]
    fn to_f32(&self) -> f32 {
        f32::from(*self) / 32768.0
    }
}

/// Audio channels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Channels {
    /// Mono - 1 channel
    Mono = 1,
    /// Stereo - 2 channels
    Stereo = 2,
}

/// Samples per second.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SamplingRate {
    /// 8 kHz
    Hz8000 = 8000,
    /// 12 kHz
    Hz12000 = 12000,
    /// 16 kHz
    Hz16000 = 16000,
    /// 24 kHz
    Hz24000 = 24000,
    /// 48 kHz
    Hz48000 = 48000,
}

/// Audio bandwidth, expressed as the number of coded CELT bands (out of 21).
///
/// CELT has no separate bandwidth-detection logic of its own (that's an Opus-layer
/// decision, driven by the application or by SILK/hybrid mode); `setBandwidth` just caps
/// how many of the mode's 21 bands get allocated any bits.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bandwidth {
    /// Let the allocator use every coded band (the default).
    Auto,
    /// 4 kHz passband, 13 bands.
    Narrowband,
    /// 6 kHz passband, 15 bands.
    Mediumband,
    /// 8 kHz passband, 17 bands.
    Wideband,
    /// 12 kHz passband, 19 bands.
    Superwideband,
    /// 20 kHz passband, all 21 bands.
    Fullband,
}

impl Bandwidth {
    /// The number of CELT bands available at this bandwidth.
    pub(crate) fn band_count(self) -> usize {
        match self {
            Bandwidth::Auto | Bandwidth::Fullband => 21,
            Bandwidth::Narrowband => 13,
            Bandwidth::Mediumband => 15,
            Bandwidth::Wideband => 17,
            Bandwidth::Superwideband => 19,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandwidth_band_counts_match_mode_table() {
        assert_eq!(Bandwidth::Narrowband.band_count(), 13);
        assert_eq!(Bandwidth::Mediumband.band_count(), 15);
        assert_eq!(Bandwidth::Wideband.band_count(), 17);
        assert_eq!(Bandwidth::Superwideband.band_count(), 19);
        assert_eq!(Bandwidth::Fullband.band_count(), 21);
        assert_eq!(Bandwidth::Auto.band_count(), 21);
    }

    #[test]
    fn sample_i16_round_trips_within_quantization() {
        let original = 0.5f32;
        let quantized = i16::from_f32(original);
        assert!((quantized.to_f32() - original).abs() < 0.001);
    }
}
