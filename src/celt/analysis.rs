//! Encoder-side signal analysis: transient detection, time/frequency (TF) resolution
//! selection, the spreading decision, and the allocation trim.
//!
//! Only the *decisions* and their entropy coding live here, grounded directly on the
//! corresponding decode side in [`crate::celt::decoder`] so the two stay bit-compatible.
//! Selecting genuinely better parameters (the reference encoder's psychoacoustic analysis
//! of tone/noise character, multi-frame lookahead, and trellis-optimal TF search) is a
//! deliberately out-of-scope refinement: this crate picks each parameter from a direct,
//! single-frame heuristic on the input signal rather than the full analysis pipeline. The
//! transient bit does drive the transform: a transient frame is split into short MDCT
//! blocks (see [`crate::celt::mdct::forward_frame`]).

use crate::celt::mode;
use crate::encoder_error::CeltEncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// Time/frequency resolution decision for one frame: a leading `select` bit, plus one
/// `changed` bit per subframe (`1 << lm` of them).
#[derive(Clone, Debug)]
pub(crate) struct TfDecision {
    pub(crate) select: bool,
    pub(crate) changed: Vec<bool>,
}

/// Whether the input looks like a sudden-onset (percussive) signal, based on the ratio of
/// the second half's energy to the first half's.
pub(crate) fn detect_transient(samples: &[f32]) -> bool {
    if samples.len() < 8 {
        return false;
    }
    let mid = samples.len() / 2;
    let energy = |s: &[f32]| -> f32 { s.iter().map(|x| x * x).sum::<f32>() / s.len() as f32 };
    let first = energy(&samples[..mid]).max(1e-9);
    let second = energy(&samples[mid..]).max(1e-9);
    second / first > 4.0
}

/// Picks the TF resolution for the frame: on a transient, allow each subframe to switch
/// resolution; otherwise keep every subframe at the frame's base resolution.
pub(crate) fn choose_tf(lm: usize, transient: bool) -> TfDecision {
    let subframes = 1usize << lm;
    TfDecision {
        select: transient,
        changed: vec![false; subframes],
    }
}

fn tf_logp(i: usize, transient: bool) -> u32 {
    if i == 0 {
        if transient {
            2
        } else {
            4
        }
    } else if transient {
        4
    } else {
        5
    }
}

pub(crate) fn encode_tf(
    enc: &mut RangeEncoder,
    decision: &TfDecision,
    transient: bool,
) -> Result<(), CeltEncoderError> {
    enc.encode_bit_logp(u32::from(decision.select), 1)?;
    for (i, &changed) in decision.changed.iter().enumerate() {
        enc.encode_bit_logp(u32::from(changed), tf_logp(i, transient))?;
    }
    Ok(())
}

pub(crate) fn decode_tf(dec: &mut RangeDecoder, lm: usize, transient: bool) -> TfDecision {
    let select = dec.decode_bit_logp(1);
    let subframes = 1usize << lm;
    let changed = (0..subframes)
        .map(|i| dec.decode_bit_logp(tf_logp(i, transient)))
        .collect();
    TfDecision { select, changed }
}

/// Resolves a [`TfDecision`] to the actual per-subframe TF resolution offset using
/// [`mode::TF_SELECT`], mirroring how the reference computes it from the same bits.
pub(crate) fn tf_resolution(lm: usize, transient: bool, decision: &TfDecision) -> Vec<i8> {
    decision
        .changed
        .iter()
        .map(|&changed| {
            mode::TF_SELECT[lm][usize::from(transient)][usize::from(decision.select)]
                [usize::from(changed)]
        })
        .collect()
}

/// Picks the spreading decision (RFC 6716 Table 58) from how tonal vs. noisy the frame
/// looks: a higher zero-crossing rate suggests noise, which benefits from more spreading.
pub(crate) fn choose_spread(samples: &[f32]) -> usize {
    if samples.len() < 2 {
        return 2;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    let rate = crossings as f32 / samples.len() as f32;
    if rate > 0.35 {
        3
    } else if rate > 0.2 {
        2
    } else if rate > 0.08 {
        1
    } else {
        0
    }
}

pub(crate) fn encode_spread(enc: &mut RangeEncoder, spread: usize) -> Result<(), CeltEncoderError> {
    enc.encode_icdf(spread, &mode::SPREAD_ICDF, 5)
}

pub(crate) fn decode_spread(dec: &mut RangeDecoder) -> usize {
    dec.decode_icdf(&mode::SPREAD_ICDF, 5) as usize
}

/// Picks the allocation trim (RFC 6716 Table 59, `-2..=2` after centering on `5`): nudges
/// bits towards high bands for tonal, high-energy-tilt material and towards low bands
/// otherwise.
pub(crate) fn choose_trim(samples: &[f32], transient: bool) -> i32 {
    if transient {
        return -1;
    }
    let rms: f32 = (samples.iter().map(|x| x * x).sum::<f32>() / samples.len().max(1) as f32).sqrt();
    if rms > 0.5 {
        1
    } else {
        0
    }
}

pub(crate) fn encode_trim(enc: &mut RangeEncoder, trim: i32) -> Result<(), CeltEncoderError> {
    let symbol = (trim + 5).clamp(0, 10) as usize;
    enc.encode_icdf(symbol, &mode::TRIM_ICDF, 7)
}

pub(crate) fn decode_trim(dec: &mut RangeDecoder) -> i32 {
    dec.decode_icdf(&mode::TRIM_ICDF, 7) as i32 - 5
}

/// Stereo coupling parameters for one frame: whether to code left/right independently
/// (`dual_stereo`), and the first band (reading `mid_energy`/`side_energy` from the
/// bottom) above which the side channel is negligible enough to drop (`intensity_band`).
#[derive(Clone, Copy, Debug)]
pub(crate) struct StereoParams {
    pub(crate) dual_stereo: bool,
    pub(crate) intensity_band: usize,
}

/// Picks stereo coupling from each band's mid/side energy split (both in log2 domain):
/// falls back to independent L/R coding (`dual_stereo = true`) when the two channels look
/// uncorrelated across most of the spectrum (the side channel carries as much energy as
/// the mid channel on average), since mid/side coding only pays off when the channels are
/// actually similar. Otherwise picks an intensity cutoff at the highest band where the
/// side channel still carries meaningful energy, contiguous from the top.
pub(crate) fn choose_stereo_params(
    bands: mode::BandRange,
    mid_energy: &[f32],
    side_energy: &[f32],
) -> StereoParams {
    let count = (bands.end - bands.start).max(1) as f32;
    let avg_gap: f32 = (bands.start..bands.end)
        .map(|b| mid_energy[b] - side_energy[b])
        .sum::<f32>()
        / count;
    let dual_stereo = avg_gap < 1.0;

    let mut intensity_band = bands.end;
    for b in (bands.start..bands.end).rev() {
        if side_energy[b] > -4.0 {
            break;
        }
        intensity_band = b;
    }

    StereoParams {
        dual_stereo,
        intensity_band,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_detects_sudden_onset() {
        let mut samples = vec![0.0f32; 256];
        for s in samples.iter_mut().skip(128) {
            *s = 1.0;
        }
        assert!(detect_transient(&samples));

        let steady = vec![0.3f32; 256];
        assert!(!detect_transient(&steady));
    }

    #[test]
    fn tf_decision_round_trips() {
        let decision = TfDecision {
            select: true,
            changed: vec![true, false, true, false],
        };
        let mut buf = vec![0u8; 64];
        {
            let mut enc = RangeEncoder::new(&mut buf);
            encode_tf(&mut enc, &decision, true).unwrap();
            enc.done().unwrap();
        }
        let mut dec = RangeDecoder::new(&buf);
        let decoded = decode_tf(&mut dec, 2, true);
        assert_eq!(decoded.select, decision.select);
        assert_eq!(decoded.changed, decision.changed);
    }

    #[test]
    fn spread_round_trips() {
        for spread in 0..4 {
            let mut buf = vec![0u8; 32];
            {
                let mut enc = RangeEncoder::new(&mut buf);
                encode_spread(&mut enc, spread).unwrap();
                enc.done().unwrap();
            }
            let mut dec = RangeDecoder::new(&buf);
            assert_eq!(decode_spread(&mut dec), spread);
        }
    }

    #[test]
    fn trim_round_trips() {
        for trim in -2..=2 {
            let mut buf = vec![0u8; 32];
            {
                let mut enc = RangeEncoder::new(&mut buf);
                encode_trim(&mut enc, trim).unwrap();
                enc.done().unwrap();
            }
            let mut dec = RangeDecoder::new(&buf);
            assert_eq!(decode_trim(&mut dec), trim);
        }
    }
}
