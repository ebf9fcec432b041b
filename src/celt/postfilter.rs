//! Frame-level postfilter: decodes/encodes the pitch-prediction parameters (period, gain,
//! tapset) and applies the three-tap comb filter in [`crate::celt::comb_filter`] across the
//! frame.
//!
//! Only filter *application* lives here; choosing good parameters from the input signal
//! (pitch search, RDO gain/tapset selection) is an encoder-side estimation problem this
//! crate doesn't attempt — the encoder always codes "postfilter off".

use crate::celt::comb_filter;
use crate::celt::mode;
use crate::encoder_error::CeltEncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// Largest pitch period the comb filter needs to look back across frame boundaries.
const MAX_PERIOD: usize = 1024;

/// This frame's decoded (or chosen) postfilter parameters.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PostfilterParams {
    pub(crate) period: usize,
    pub(crate) gain: f32,
    pub(crate) tapset: usize,
}

/// Carries the tail of the previous frame across calls so the comb filter has enough
/// lookback at the start of the next one, plus the previous frame's own parameters (the
/// filter crossfades from the old parameters to the new ones across the overlap region).
pub(crate) struct Postfilter {
    history: Vec<f32>,
    prev: PostfilterParams,
}

impl Postfilter {
    pub(crate) fn new() -> Self {
        Self {
            history: vec![0.0; MAX_PERIOD + 2],
            prev: PostfilterParams::default(),
        }
    }

    /// The pitch period (in samples) used by the most recently applied frame.
    pub(crate) fn period(&self) -> usize {
        self.prev.period
    }

    /// Applies the postfilter to `signal` in place using `params` for this frame, then
    /// slides the lookback history forward.
    pub(crate) fn apply(&mut self, signal: &mut [f32], params: PostfilterParams, overlap: usize) {
        let n = signal.len();
        let lookback = self.history.len();

        let mut extended = vec![0.0f32; lookback + n];
        extended[..lookback].copy_from_slice(&self.history);
        extended[lookback..].copy_from_slice(signal);

        let mut out = extended.clone();
        let window = mode::window();
        let overlap = overlap.min(n).min(window.len());

        comb_filter::comb_filter(
            &mut out,
            lookback,
            &extended,
            lookback,
            self.prev.period,
            params.period,
            n,
            self.prev.gain,
            params.gain,
            self.prev.tapset,
            params.tapset,
            overlap,
            &window[..overlap],
        );

        signal.copy_from_slice(&out[lookback..lookback + n]);

        let total = out.len();
        self.history.copy_from_slice(&out[total - lookback..total]);
        self.prev = params;
    }
}

/// Decodes this frame's postfilter parameters, if the "postfilter active" flag is set.
pub(crate) fn decode(dec: &mut RangeDecoder) -> Option<PostfilterParams> {
    if !dec.decode_bit_logp(1) {
        return None;
    }
    let octave = dec.decode_uint(4);
    let period = (16u32 << octave) + dec.decode_bits(4 + octave) - 1;
    let qg = dec.decode_bits(3);
    let gain = 0.09375 * (qg as f32 + 1.0);
    let tapset = if dec.decode_bit_logp(1) {
        dec.decode_icdf(&mode::TAPSET_ICDF, 2) as usize
    } else {
        0
    };
    Some(PostfilterParams {
        period: period as usize,
        gain,
        tapset,
    })
}

/// Encodes `params`, or just the "postfilter off" flag if `None`.
pub(crate) fn encode(
    enc: &mut RangeEncoder,
    params: Option<PostfilterParams>,
) -> Result<(), CeltEncoderError> {
    let Some(params) = params else {
        return enc.encode_bit_logp(0, 1);
    };

    enc.encode_bit_logp(1, 1)?;
    let octave = (params.period + 1).max(16).ilog2().saturating_sub(4);
    let octave = octave.min(3);
    enc.encode_uint(octave, 4)?;
    let period_bits = (params.period as u32 + 1).saturating_sub(16 << octave);
    enc.encode_bits(period_bits, 4 + octave)?;
    let qg = ((params.gain / 0.09375).round() as u32).saturating_sub(1).min(7);
    enc.encode_bits(qg, 3)?;
    if params.tapset != 0 {
        enc.encode_bit_logp(1, 1)?;
        enc.encode_icdf(params.tapset, &mode::TAPSET_ICDF, 2)?;
    } else {
        enc.encode_bit_logp(0, 1)?;
    }
    Ok(())
}
