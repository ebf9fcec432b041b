//! The top-level CELT frame decoder.

use crate::celt::CeltDecoder;
use crate::decoder_error::CeltDecoderError;
use crate::{Bandwidth, Channels, Sample, SamplingRate};

/// Decodes CELT frames back into PCM.
///
/// A `Decoder` is stateful: frames must be passed in the same order they were produced by
/// the matching [`crate::Encoder`], since coarse energy prediction, the MDCT overlap-add
/// tail, and the postfilter's pitch history all carry across calls to [`Decoder::decode_float`].
/// Use [`Decoder::reset`] when starting a new, unrelated stream.
pub struct Decoder {
    celt: CeltDecoder,
    channels: Channels,
    sampling_rate: SamplingRate,
    bandwidth: Bandwidth,
}

impl Decoder {
    /// Creates a new `Decoder` for the given sampling rate and channel count.
    ///
    /// CELT's mode tables are defined at a 48 kHz frame grid; frame sizes passed to
    /// [`Decoder::decode_float`] are always one of 120/240/480/960 samples (2.5/5/10/20 ms)
    /// regardless of `sampling_rate`. `sampling_rate` is accepted for API parity with the
    /// wider Opus interface and is not otherwise used by CELT decoding.
    pub fn new(sampling_rate: SamplingRate, channels: Channels) -> Result<Self, CeltDecoderError> {
        Ok(Self {
            celt: CeltDecoder::new(sampling_rate, channels)?,
            channels,
            sampling_rate,
            bandwidth: Bandwidth::Auto,
        })
    }

    /// Resets the decoder to be equivalent to a freshly created one.
    ///
    /// Call this when switching streams, to prevent the new stream's frames from being
    /// decoded against leftover energy and overlap-add state from the old one.
    pub fn reset(&mut self) -> Result<(), CeltDecoderError> {
        self.celt.reset()?;
        self.bandwidth = Bandwidth::Auto;
        Ok(())
    }

    /// Returns the sampling rate the decoder was created with.
    pub fn sampling_rate(&self) -> SamplingRate {
        self.sampling_rate
    }

    /// Returns the number of channels the decoder was created with.
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Returns the decoder's current bandwidth cap.
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Caps decoding to the bands covered by `bandwidth`.
    ///
    /// This only affects how many of the mode's 21 bands are read; it does not resample
    /// or otherwise filter the synthesized PCM.
    pub fn set_bandwidth(&mut self, bandwidth: Bandwidth) {
        self.bandwidth = bandwidth;
        self.celt.set_band_count(bandwidth.band_count());
    }

    /// Returns the pitch period (in samples) of the last decoded frame.
    pub fn pitch(&self) -> u32 {
        self.celt.pitch()
    }

    /// Decodes one CELT frame into floating-point PCM.
    ///
    /// `frame_size` is the number of samples per channel (120, 240, 480, or 960); the
    /// returned buffer is interleaved and has length `frame_size * channels`.
    pub fn decode_float(
        &mut self,
        data: &[u8],
        frame_size: usize,
    ) -> Result<Vec<f32>, CeltDecoderError> {
        self.celt.decode(data, frame_size)
    }

    /// Decodes one CELT frame into a caller-chosen sample format.
    pub fn decode<S: Sample>(
        &mut self,
        data: &[u8],
        frame_size: usize,
    ) -> Result<Vec<S>, CeltDecoderError> {
        let pcm = self.decode_float(data, frame_size)?;
        Ok(pcm.into_iter().map(S::from_f32).collect())
    }
}
