//! The top-level CELT frame encoder.

use crate::celt::CeltEncoder;
use crate::encoder_error::CeltEncoderError;
use crate::{Bandwidth, Channels, Sample, SamplingRate};

/// Lowest bitrate CELT is willing to target, in bits per second.
const MIN_BITRATE_BPS: u32 = 6_000;
/// Highest bitrate CELT is willing to target, in bits per second.
const MAX_BITRATE_BPS: u32 = 510_000;
/// The largest a single Opus/CELT packet is ever allowed to be.
const MAX_PACKET_BYTES: usize = 1275;
/// Bitrate used until [`Encoder::set_bitrate`] is called.
const DEFAULT_BITRATE_BPS: u32 = 64_000;
/// Highest complexity accepted by [`Encoder::set_complexity`].
const MAX_COMPLEXITY: u8 = 10;

/// Encodes PCM into CELT frames.
///
/// Like [`crate::Decoder`], an `Encoder` is stateful across calls: pre-emphasis and MDCT
/// analysis history, coarse energy prediction, and the PVQ folding seed all carry from one
/// [`Encoder::encode_float`] call to the next. Use [`Encoder::reset`] between unrelated
/// streams.
pub struct Encoder {
    celt: CeltEncoder,
    channels: Channels,
    sampling_rate: SamplingRate,
    bandwidth: Bandwidth,
    bitrate_bps: u32,
    complexity: u8,
    vbr: bool,
    vbr_constraint: bool,
}

impl Encoder {
    /// Creates a new `Encoder` for the given sampling rate and channel count, with the
    /// default bitrate (64 kb/s) and full complexity.
    ///
    /// See [`Decoder::new`](crate::Decoder::new) for why `sampling_rate` doesn't change
    /// which frame sizes are accepted.
    pub fn new(sampling_rate: SamplingRate, channels: Channels) -> Result<Self, CeltEncoderError> {
        Ok(Self {
            celt: CeltEncoder::new(channels)?,
            channels,
            sampling_rate,
            bandwidth: Bandwidth::Auto,
            bitrate_bps: DEFAULT_BITRATE_BPS,
            complexity: MAX_COMPLEXITY,
            vbr: false,
            vbr_constraint: true,
        })
    }

    /// Resets the encoder to be equivalent to a freshly created one, preserving the
    /// configured bitrate, bandwidth, and complexity.
    pub fn reset(&mut self) -> Result<(), CeltEncoderError> {
        self.celt.reset()
    }

    /// Returns the sampling rate the encoder was created with.
    pub fn sampling_rate(&self) -> SamplingRate {
        self.sampling_rate
    }

    /// Returns the number of channels the encoder was created with.
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Returns the currently configured bitrate, in bits per second.
    pub fn bitrate(&self) -> u32 {
        self.bitrate_bps
    }

    /// Sets the target bitrate, in bits per second, clamped to 6000..=510000 (the range
    /// CELT/Opus bitrates are defined over).
    pub fn set_bitrate(&mut self, bps: u32) {
        self.bitrate_bps = bps.clamp(MIN_BITRATE_BPS, MAX_BITRATE_BPS);
    }

    /// Returns the encoder's current bandwidth cap.
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth
    }

    /// Caps encoding to the bands covered by `bandwidth`, trading audio bandwidth for a
    /// smaller per-band bit allocation at a fixed bitrate.
    pub fn set_bandwidth(&mut self, bandwidth: Bandwidth) {
        self.bandwidth = bandwidth;
        self.celt.set_band_count(bandwidth.band_count());
    }

    /// Returns the encoder's current complexity setting (0 through 10).
    pub fn complexity(&self) -> u8 {
        self.complexity
    }

    /// Sets the encoder's complexity, clamped to 0..=10.
    ///
    /// This encoder always performs a full PVQ pulse search regardless of the configured
    /// value; `complexity` is tracked for API parity with the wider Opus interface but
    /// doesn't currently change the amount of search performed.
    pub fn set_complexity(&mut self, complexity: u8) {
        self.complexity = complexity.min(MAX_COMPLEXITY);
    }

    /// Returns whether variable bitrate is enabled.
    pub fn vbr(&self) -> bool {
        self.vbr
    }

    /// Enables or disables variable bitrate. When off (the default), every frame gets the
    /// same byte budget, derived only from `bitrate` and `frame_size`. When on, the budget
    /// is additionally scaled per frame by [`vbr_scale`], a signal-level proxy for how much
    /// a frame actually needs, within the `[0.5x, 2x]` band `spec.md` §4.7 describes around
    /// the CBR base target.
    pub fn set_vbr(&mut self, vbr: bool) {
        self.vbr = vbr;
    }

    /// Returns whether the constrained-VBR mode is enabled.
    pub fn vbr_constraint(&self) -> bool {
        self.vbr_constraint
    }

    /// Enables or disables constrained VBR.
    ///
    /// The reference encoder uses this to bound a transient frame's spend against a
    /// shared multi-frame bit reservoir; this encoder has no such reservoir (every frame's
    /// byte budget is computed independently, already capped at [`MAX_PACKET_BYTES`]), so
    /// the flag is tracked for API parity but doesn't currently change `encode_float`'s
    /// output.
    pub fn set_vbr_constraint(&mut self, constrained: bool) {
        self.vbr_constraint = constrained;
    }

    /// Encodes one frame of floating-point PCM into a CELT packet.
    ///
    /// `pcm` must hold exactly `frame_size * channels` interleaved samples, with
    /// `frame_size` one of 120, 240, 480, or 960. The output byte budget for the frame is
    /// derived from the configured bitrate and frame duration, then clamped to the 1275
    /// byte maximum Opus/CELT packet size.
    pub fn encode_float(
        &mut self,
        pcm: &[f32],
        frame_size: usize,
    ) -> Result<Vec<u8>, CeltEncoderError> {
        let base_bits = (self.bitrate_bps as u64 * frame_size as u64)
            / (self.sampling_rate as u64).max(1);

        let budget_bits = if self.vbr {
            ((base_bits as f64) * f64::from(vbr_scale(pcm))) as u64
        } else {
            base_bits
        };
        let budget_bytes = ((budget_bits / 8) as usize).clamp(1, MAX_PACKET_BYTES);

        let mut output = vec![0u8; budget_bytes];
        let len = self.celt.encode(pcm, frame_size, &mut output)?;
        output.truncate(len);
        Ok(output)
    }

    /// Encodes one frame from a caller-chosen sample format into a CELT packet.
    pub fn encode<S: Sample>(
        &mut self,
        pcm: &[S],
        frame_size: usize,
    ) -> Result<Vec<u8>, CeltEncoderError> {
        let floats: Vec<f32> = pcm.iter().map(Sample::to_f32).collect();
        self.encode_float(&floats, frame_size)
    }
}

/// A signal-level proxy for `spec.md` §4.7's VBR target computation, in `[0.5, 2.0]`.
///
/// The reference formula builds its target from per-band dynalloc boosts, a TF estimate,
/// and a tonality measurement, none of which this encoder's simplified single-pass
/// analysis computes per band (see `DESIGN.md`'s "Known simplifications"). This keeps the
/// shape of the formula — a floor that never starves a quiet frame, scaling up towards a
/// 2x cap as the frame gets louder — using the frame's RMS level as the whole-signal proxy
/// for "how much this frame actually needs".
fn vbr_scale(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 1.0;
    }
    let rms = (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt();
    (0.5 + rms.min(1.0) * 1.5).clamp(0.5, 2.0)
}
