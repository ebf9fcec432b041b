//! Per-band energy quantization.
//!
//! Energy is coded in three passes, from coarsest to finest:
//!
//! 1. **Coarse**: a Laplace-coded residual against a two-term predictor (an `alpha` term
//!    carried over from the same band in the previous frame, and a `beta`-decayed running
//!    correction carried across bands within the current frame).
//! 2. **Fine**: `fine_bits[i]` raw bits per band, uniformly refining the coarse value.
//! 3. **Finalize**: any bits left over once every other part of the frame has been coded
//!    are handed out one at a time, highest-priority band first, for one more half-step
//!    of refinement.
use crate::celt::mode;
use crate::encoder_error::CeltEncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// Intra frames skip inter-frame prediction entirely; this is the decay applied to the
/// running inter-band correction in that case (the reference's `alpha` is `0` either way).
const BETA_INTRA: f32 = 0.15;

/// Greatest magnitude of a single coarse-energy quantization step, in the same log-energy
/// units as [`mode::E_MEANS`]. Keeps a single corrupt or extreme input from blowing up the
/// Laplace code's unary-ish worst case.
const MAX_COARSE_STEP: i32 = 63;

fn coarse_params(lm: usize, intra: bool, band: usize) -> (u32, u32, f32, f32) {
    let table = if intra {
        &mode::COARSE_ENERGY_INTRA[lm]
    } else {
        &mode::COARSE_ENERGY_INTER[lm]
    };
    let fs0 = u32::from(table[2 * band]) << 7;
    let decay = u32::from(table[2 * band + 1]) << 6;
    let alpha = if intra { 0.0 } else { mode::ALPHA_COEF[lm] };
    let beta = if intra { BETA_INTRA } else { mode::BETA_COEF[lm] };
    (fs0, decay, alpha, beta)
}

/// Decodes the coarse energy for every coded band and channel.
///
/// `prev_frame_energy` is the per-`(band, channel)` state carried from the previous
/// frame (indexed `band * channels + channel`); it is updated in place for next time.
/// Returns the coarse log-energy for each `(band, channel)`, in the same layout.
pub(crate) fn decode_coarse_energy(
    dec: &mut RangeDecoder,
    lm: usize,
    intra: bool,
    channels: usize,
    bands: mode::BandRange,
    prev_frame_energy: &mut [f32],
) -> Vec<f32> {
    let mut energy = vec![0.0f32; mode::MAX_BANDS * channels];
    let mut running = [0.0f32; 2];

    for band in bands.start..bands.end {
        for c in 0..channels {
            let (fs0, decay, alpha, beta) = coarse_params(lm, intra, band);
            let qi = dec.decode_laplace(fs0, decay);
            let q = qi as f32;

            let idx = band * channels + c;
            let predicted = alpha * prev_frame_energy[idx] + running[c];
            let value = predicted + q;

            energy[idx] = value + mode::E_MEANS[band];
            running[c] += q - beta * q;
            prev_frame_energy[idx] = value;
        }
    }
    energy
}

/// Encodes the coarse energy for every coded band and channel. `target` holds the actual
/// (pre-quantization) log-energy per `(band, channel)`; returns the quantized energy that
/// the decoder will reconstruct, which the caller should use for everything downstream
/// (PVQ shape normalization must match what the decoder sees).
pub(crate) fn encode_coarse_energy(
    enc: &mut RangeEncoder,
    lm: usize,
    intra: bool,
    channels: usize,
    bands: mode::BandRange,
    target: &[f32],
    prev_frame_energy: &mut [f32],
) -> Result<Vec<f32>, CeltEncoderError> {
    let mut energy = vec![0.0f32; mode::MAX_BANDS * channels];
    let mut running = [0.0f32; 2];

    for band in bands.start..bands.end {
        for c in 0..channels {
            let (fs0, decay, alpha, beta) = coarse_params(lm, intra, band);
            let idx = band * channels + c;
            let predicted = alpha * prev_frame_energy[idx] + running[c];
            let residual = target[idx] - mode::E_MEANS[band] - predicted;

            let mut qi = residual.round() as i32;
            qi = qi.clamp(-MAX_COARSE_STEP, MAX_COARSE_STEP);

            enc.encode_laplace(&mut qi, fs0, decay)
                .map_err(|_| CeltEncoderError::EncodingFailed("coarse energy"))?;

            let q = qi as f32;
            let value = predicted + q;
            energy[idx] = value + mode::E_MEANS[band];
            running[c] += q - beta * q;
            prev_frame_energy[idx] = value;
        }
    }
    Ok(energy)
}

/// Refines `energy` in place using `fine_bits[band]` raw bits per band and channel.
pub(crate) fn decode_fine_energy(
    dec: &mut RangeDecoder,
    channels: usize,
    bands: mode::BandRange,
    fine_bits: &[u32],
    energy: &mut [f32],
) {
    for band in bands.start..bands.end {
        let bits = fine_bits[band];
        if bits == 0 {
            continue;
        }
        let steps = (1u32 << bits) as f32;
        for c in 0..channels {
            let v = dec.decode_bits(bits);
            let offset = (v as f32 + 0.5) / steps - 0.5;
            energy[band * channels + c] += offset;
        }
    }
}

/// Encodes the fine-energy refinement against `target`, the actual log-energy, updating
/// `energy` in place to match what the decoder will reconstruct.
pub(crate) fn encode_fine_energy(
    enc: &mut RangeEncoder,
    channels: usize,
    bands: mode::BandRange,
    fine_bits: &[u32],
    target: &[f32],
    energy: &mut [f32],
) -> Result<(), CeltEncoderError> {
    for band in bands.start..bands.end {
        let bits = fine_bits[band];
        if bits == 0 {
            continue;
        }
        let steps = (1u32 << bits) as f32;
        for c in 0..channels {
            let idx = band * channels + c;
            let error = (target[idx] - energy[idx]).clamp(-0.5, 0.499_999);
            let v = (((error + 0.5) * steps) as u32).min(steps as u32 - 1);

            enc.encode_bits(v, bits)
                .map_err(|_| CeltEncoderError::EncodingFailed("fine energy"))?;

            let offset = (v as f32 + 0.5) / steps - 0.5;
            energy[idx] += offset;
        }
    }
    Ok(())
}

/// Spends `leftover_bits` one at a time on the highest-priority bands (those with
/// `fine_priority[band] == true` go first, in band order; then the rest, in band order),
/// each grant buying one more halving of that band's quantization step.
pub(crate) fn decode_energy_finalize(
    dec: &mut RangeDecoder,
    channels: usize,
    bands: mode::BandRange,
    fine_bits: &[u32],
    fine_priority: &[bool],
    leftover_bits: u32,
    energy: &mut [f32],
) {
    let mut remaining = leftover_bits;
    for &want_priority in &[true, false] {
        for band in bands.start..bands.end {
            if remaining == 0 {
                return;
            }
            if fine_priority[band] != want_priority {
                continue;
            }
            let steps = (1u32 << (fine_bits[band] + 1)) as f32;
            for c in 0..channels {
                if remaining == 0 {
                    return;
                }
                let v = dec.decode_bits(1);
                let offset = (v as f32 - 0.5) / steps;
                energy[band * channels + c] += offset;
                remaining -= 1;
            }
        }
    }
}

/// Encoding counterpart of [`decode_energy_finalize`].
pub(crate) fn encode_energy_finalize(
    enc: &mut RangeEncoder,
    channels: usize,
    bands: mode::BandRange,
    fine_bits: &[u32],
    fine_priority: &[bool],
    leftover_bits: u32,
    target: &[f32],
    energy: &mut [f32],
) -> Result<(), CeltEncoderError> {
    let mut remaining = leftover_bits;
    for &want_priority in &[true, false] {
        for band in bands.start..bands.end {
            if remaining == 0 {
                return Ok(());
            }
            if fine_priority[band] != want_priority {
                continue;
            }
            let steps = (1u32 << (fine_bits[band] + 1)) as f32;
            for c in 0..channels {
                if remaining == 0 {
                    return Ok(());
                }
                let idx = band * channels + c;
                let v = u32::from(target[idx] >= energy[idx]);

                enc.encode_bits(v, 1)
                    .map_err(|_| CeltEncoderError::EncodingFailed("energy finalize"))?;

                let offset = (v as f32 - 0.5) / steps;
                energy[idx] += offset;
                remaining -= 1;
            }
        }
    }
    Ok(())
}

/// Fallback band energy for a frame lost to packet loss: the previous frame's decoded
/// energy, decayed slightly towards the band mean to avoid runaway gain on repeated loss.
pub(crate) fn conceal(
    channels: usize,
    bands: mode::BandRange,
    prev_frame_energy: &[f32],
) -> Vec<f32> {
    let mut energy = vec![0.0f32; mode::MAX_BANDS * channels];
    for band in bands.start..bands.end {
        for c in 0..channels {
            let idx = band * channels + c;
            energy[idx] = prev_frame_energy[idx] * 0.9 + mode::E_MEANS[band];
        }
    }
    energy
}
