//! Per-band spectral shape quantization (PVQ over the combinatorial codebook in
//! [`crate::cwrs`]).
//!
//! Each band's normalized MDCT coefficients are quantized to an integer pulse vector by
//! greedy pursuit (the same "project onto the steepest-ascent direction, one pulse at a
//! time" search CELT calls `alg_quant`), indexed combinatorially, and range-coded as a
//! single arbitrary-range integer.
//!
//! A band wider than [`MAX_PVQ_WIDTH`] (wide bands at large frame sizes easily exceed the
//! combinatorial table's safe range) is split in half, with a range-coded `itheta` angle
//! describing how the band's energy divides between the two halves, and each half
//! recursing independently — the same "theta split" the reference allocator calls
//! `compute_theta`/`quant_band`.
//!
//! A band with no bits to spend falls back to folding a unit-normalized copy of the
//! nearest lower coded band with real content (tiling it across the wider band if
//! necessary), or to deterministic noise fill if no such band exists yet (seeded
//! identically on both sides, so no bits are needed to agree on it).

use crate::celt::mode;
use crate::cwrs;
use crate::encoder_error::CeltEncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// Largest band width coded as a single flat PVQ vector before the band is split. Chosen
/// below the widest bottom-block band (176 bins, band 20 at a 20ms/LM=3 frame) so that
/// band actually exercises the split path, while staying well clear of any width where
/// `cwrs::count_combinations` would need more than `u32::MAX` combinations for a
/// realistic pulse count.
const MAX_PVQ_WIDTH: usize = 128;

/// A small deterministic PRNG used to fill zero-bit bands with plausible-sounding noise.
///
/// Seeded identically by the encoder and decoder and advanced in lockstep, so no bits are
/// spent keeping the two in sync.
pub(crate) struct NoiseGen {
    state: u32,
}

impl NoiseGen {
    pub(crate) fn new(seed: u32) -> Self {
        Self { state: seed | 1 }
    }

    fn next_unit(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
    }

    fn fill(&mut self, n: usize) -> Vec<f32> {
        let mut v: Vec<f32> = (0..n).map(|_| self.next_unit()).collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

/// Builds a unit-norm shape of the given `width` by tiling `source` (wrapping around if
/// `source` is shorter) and renormalizing, the band-folding reconstruction of RFC 6716
/// §4.3's "copy a previous band" fallback.
fn fold_shape(width: usize, source: &[f32]) -> Vec<f32> {
    if source.is_empty() {
        return vec![0.0; width];
    }
    let tiled: Vec<f32> = (0..width).map(|i| source[i % source.len()]).collect();
    normalize(&tiled)
}

/// Largest `k` such that `cwrs::required_bits(width, k) <= budget_bits`, clamped so the
/// resulting combinatorial count never exceeds what [`RangeEncoder::encode_uint`]'s `u32`
/// total can represent.
fn max_pulses_for_budget(width: usize, budget_bits: u32) -> u32 {
    if width == 0 || budget_bits == 0 {
        return 0;
    }
    let mut k_max = 1usize;
    while cwrs::required_bits(width, k_max) as u32 <= budget_bits
        && k_max < width * 64
        && cwrs::count_combinations(width, k_max) <= u64::from(u32::MAX)
    {
        k_max *= 2;
    }
    let mut k = 0u32;
    for candidate in 1..=k_max {
        if cwrs::required_bits(width, candidate) as u32 > budget_bits {
            break;
        }
        if cwrs::count_combinations(width, candidate) > u64::from(u32::MAX) {
            break;
        }
        k = candidate as u32;
    }
    k
}

/// Greedily builds the `k`-pulse integer vector in `target`'s direction, one pulse at a
/// time, always placing the next pulse on whichever coordinate most increases the
/// correlation with `target` relative to the resulting vector norm.
fn pvq_search(target: &[f32], k: u32) -> Vec<i32> {
    let n = target.len();
    let mut y = vec![0i32; n];
    if k == 0 || n == 0 {
        return y;
    }

    let mut xy = 0.0f32;
    let mut yy = 0.0f32;
    for _ in 0..k {
        let mut best_i = 0usize;
        let mut best_rxy = 0.0f32;
        let mut best_ryy = 1.0f32;
        let mut best_sign = 1i32;
        let mut found = false;

        for (i, &xi) in target.iter().enumerate() {
            let s: f32 = if xi < 0.0 { -1.0 } else { 1.0 };
            let rxy = xy + s * xi;
            if rxy <= 0.0 {
                continue;
            }
            let ryy = yy + 2.0 * s * y[i] as f32 + 1.0;
            if !found || rxy * rxy * best_ryy > best_rxy * best_rxy * ryy {
                best_i = i;
                best_rxy = rxy;
                best_ryy = ryy;
                best_sign = s as i32;
                found = true;
            }
        }

        if !found {
            // Every remaining correlation is non-positive (e.g. an all-zero target);
            // dump the rest of the budget on the first coordinate so the pulse count
            // still matches what was allocated.
            y[0] += 1;
            xy += target[0];
            yy += 2.0 * (y[0] - 1) as f32 + 1.0;
            continue;
        }

        y[best_i] += best_sign;
        xy = best_rxy;
        yy = best_ryy;
    }
    y
}

fn normalize(target: &[f32]) -> Vec<f32> {
    let norm: f32 = target.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        target.iter().map(|x| x / norm).collect()
    } else {
        vec![0.0; target.len()]
    }
}

fn pulses_to_unit_shape(pulses: &[i32]) -> Vec<f32> {
    let norm: f32 = pulses.iter().map(|&p| (p * p) as f32).sum::<f32>().sqrt();
    if norm == 0.0 {
        return vec![0.0; pulses.len()];
    }
    pulses.iter().map(|&p| p as f32 / norm).collect()
}

/// 8-bit resolution for the `itheta` angle coded at each PVQ split.
const ITHETA_BITS: u32 = 8;
const ITHETA_RANGE: u32 = 1 << ITHETA_BITS;

/// Codes the energy ratio between a band's two halves as an angle in `[0, pi/2]`,
/// quantized to `ITHETA_BITS` bits, mirroring the reference's `theta` split.
fn itheta_from_halves(left: &[f32], right: &[f32]) -> u32 {
    let el: f32 = left.iter().map(|x| x * x).sum::<f32>().sqrt();
    let er: f32 = right.iter().map(|x| x * x).sum::<f32>().sqrt();
    if el == 0.0 && er == 0.0 {
        return ITHETA_RANGE / 2;
    }
    let angle = er.atan2(el); // in [0, pi/2]
    let symbol = (angle / std::f32::consts::FRAC_PI_2 * (ITHETA_RANGE - 1) as f32).round();
    symbol.clamp(0.0, (ITHETA_RANGE - 1) as f32) as u32
}

fn itheta_to_angle(itheta: u32) -> (f32, f32) {
    let angle = itheta as f32 / (ITHETA_RANGE - 1) as f32 * std::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Quantizes and range-codes one band's normalized shape, recursively splitting bands
/// wider than [`MAX_PVQ_WIDTH`].
///
/// `bit_budget` is in 1/8-bit units, as produced by the allocator. `fold_source` is the
/// nearest lower coded band's unit shape (if any), used when this band has no bits to
/// spend. Returns the unit-norm shape the decoder will reconstruct and whether any pulses
/// were actually coded (`false` means the band fell back to folding or noise fill).
pub(crate) fn encode_band_shape(
    enc: &mut RangeEncoder,
    width: usize,
    bit_budget: u32,
    target: &[f32],
    noise: &mut NoiseGen,
    fold_source: Option<&[f32]>,
) -> Result<(Vec<f32>, bool), CeltEncoderError> {
    if width > MAX_PVQ_WIDTH {
        let half = width / 2;
        let (left_target, right_target) = target.split_at(half);
        let itheta = itheta_from_halves(left_target, right_target);
        enc.encode_bits(itheta, ITHETA_BITS)
            .map_err(|_| CeltEncoderError::EncodingFailed("itheta"))?;
        let (cos_t, sin_t) = itheta_to_angle(itheta);

        let half_budget = bit_budget / 2;
        let (left_shape, left_nonzero) = encode_band_shape(
            enc,
            half,
            half_budget,
            left_target,
            noise,
            fold_source,
        )?;
        let right_fold_source = if left_nonzero {
            Some(left_shape.as_slice())
        } else {
            fold_source
        };
        let (right_shape, right_nonzero) = encode_band_shape(
            enc,
            width - half,
            bit_budget - half_budget,
            right_target,
            noise,
            right_fold_source,
        )?;

        let mut shape = Vec::with_capacity(width);
        shape.extend(left_shape.into_iter().map(|v| v * cos_t));
        shape.extend(right_shape.into_iter().map(|v| v * sin_t));
        return Ok((shape, left_nonzero || right_nonzero));
    }

    let k = max_pulses_for_budget(width, bit_budget >> 3);
    if k == 0 {
        return Ok((fold_or_noise(width, fold_source, noise), false));
    }

    let pulses = pvq_search(&normalize(target), k);
    let index = cwrs::encode_pulses(&pulses);
    let combinations = cwrs::count_combinations(width, k as usize);
    enc.encode_uint(index as u32, combinations as u32)
        .map_err(|_| CeltEncoderError::EncodingFailed("pvq index"))?;

    Ok((pulses_to_unit_shape(&pulses), true))
}

/// Decoding counterpart of [`encode_band_shape`].
pub(crate) fn decode_band_shape(
    dec: &mut RangeDecoder,
    width: usize,
    bit_budget: u32,
    noise: &mut NoiseGen,
    fold_source: Option<&[f32]>,
) -> (Vec<f32>, bool) {
    if width > MAX_PVQ_WIDTH {
        let half = width / 2;
        let itheta = dec.decode_bits(ITHETA_BITS);
        let (cos_t, sin_t) = itheta_to_angle(itheta);

        let half_budget = bit_budget / 2;
        let (left_shape, left_nonzero) =
            decode_band_shape(dec, half, half_budget, noise, fold_source);
        let right_fold_source = if left_nonzero {
            Some(left_shape.as_slice())
        } else {
            fold_source
        };
        let (right_shape, right_nonzero) = decode_band_shape(
            dec,
            width - half,
            bit_budget - half_budget,
            noise,
            right_fold_source,
        );

        let mut shape = Vec::with_capacity(width);
        shape.extend(left_shape.into_iter().map(|v| v * cos_t));
        shape.extend(right_shape.into_iter().map(|v| v * sin_t));
        return (shape, left_nonzero || right_nonzero);
    }

    let k = max_pulses_for_budget(width, bit_budget >> 3);
    if k == 0 {
        return (fold_or_noise(width, fold_source, noise), false);
    }

    let combinations = cwrs::count_combinations(width, k as usize);
    let index = u64::from(dec.decode_uint(combinations as u32));
    let pulses = cwrs::decode_pulses(width, k, index);
    (pulses_to_unit_shape(&pulses), true)
}

fn fold_or_noise(width: usize, fold_source: Option<&[f32]>, noise: &mut NoiseGen) -> Vec<f32> {
    match fold_source {
        Some(source) if source.iter().any(|&v| v != 0.0) => fold_shape(width, source),
        _ => noise.fill(width),
    }
}

/// Encodes every coded band's shape for one channel, returning the per-band collapse
/// mask (`true` where real pulses were coded, `false` where the band fell back to
/// folding or noise fill).
pub(crate) fn encode_bands(
    enc: &mut RangeEncoder,
    bands: mode::BandRange,
    widths: &[usize],
    bit_budget: &[u32],
    target_shape: &[Vec<f32>],
    seed: u32,
) -> Result<Vec<bool>, CeltEncoderError> {
    let mut collapse = vec![false; mode::MAX_BANDS];
    let mut noise = NoiseGen::new(seed);
    let mut fold_source: Option<Vec<f32>> = None;
    for band in bands.start..bands.end {
        let (shape, nonzero) = encode_band_shape(
            enc,
            widths[band],
            bit_budget[band],
            &target_shape[band],
            &mut noise,
            fold_source.as_deref(),
        )?;
        collapse[band] = nonzero;
        if nonzero {
            fold_source = Some(shape);
        }
    }
    Ok(collapse)
}

/// Decodes every coded band's shape for one channel, scaling each by its band's
/// reconstructed energy. Returns the per-band spectral coefficients and collapse mask.
pub(crate) fn decode_bands(
    dec: &mut RangeDecoder,
    bands: mode::BandRange,
    widths: &[usize],
    bit_budget: &[u32],
    energy: &[f32],
    seed: u32,
) -> (Vec<Vec<f32>>, Vec<bool>) {
    let mut shapes = vec![Vec::new(); mode::MAX_BANDS];
    let mut collapse = vec![false; mode::MAX_BANDS];
    let mut noise = NoiseGen::new(seed);
    let mut fold_source: Option<Vec<f32>> = None;
    for band in bands.start..bands.end {
        let (shape, nonzero) = decode_band_shape(
            dec,
            widths[band],
            bit_budget[band],
            &mut noise,
            fold_source.as_deref(),
        );
        if nonzero {
            fold_source = Some(shape.clone());
        }
        let gain = energy[band].exp2();
        shapes[band] = shape.iter().map(|&s| s * gain).collect();
        collapse[band] = nonzero;
    }
    (shapes, collapse)
}

/// Anti-collapse reconstruction (RFC 6716 §4.3's `anti_collapse`, applied only to
/// transient frames with `LM >= 2`): a short-block frame's bands are already
/// frequency-interleaved across `shorts` sub-blocks (`out[i * shorts + s]`), so a
/// sub-block can end up entirely zero within an otherwise-coded band when PVQ's limited
/// pulse budget happened to land on other sub-blocks. For every band and every such
/// collapsed sub-block, this re-injects deterministic noise scaled by the smaller of this
/// frame's and the previous frame's band energy, so a bit-starved transient never produces
/// a sub-block of literal silence next to fully-coded neighbors.
pub(crate) fn apply_anti_collapse(
    spectrum: &mut [f32],
    bands: mode::BandRange,
    widths: &[usize],
    offsets: &[usize],
    shorts: usize,
    cur_energy: &[f32],
    prev_energy: &[f32],
    seed: u32,
) {
    if shorts <= 1 {
        return;
    }
    let mut noise = NoiseGen::new(seed);
    for band in bands.start..bands.end {
        let lo = offsets[band];
        let width = widths[band];
        if width == 0 {
            continue;
        }
        let scale = (2.0f32.powf(cur_energy[band]).min(2.0f32.powf(prev_energy[band]))).sqrt();
        if scale <= 0.0 {
            continue;
        }
        for s in 0..shorts {
            let collapsed = (s..width)
                .step_by(shorts)
                .all(|j| spectrum[lo + j] == 0.0);
            if !collapsed {
                continue;
            }
            for j in (s..width).step_by(shorts) {
                spectrum[lo + j] = noise.next_unit() * scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pvq_search_produces_exactly_k_pulses() {
        let target = vec![0.8, -0.3, 0.1, -0.5, 0.2];
        let pulses = pvq_search(&normalize(&target), 6);
        let total: i32 = pulses.iter().map(|p| p.abs()).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn band_shape_round_trips() {
        let width = 6;
        let bit_budget = 40 << 3; // plenty of bits for a handful of pulses
        let target = vec![0.9, -0.2, 0.4, -0.6, 0.1, -0.05];

        let mut buf = vec![0u8; 256];
        let mut noise_enc = NoiseGen::new(7);
        let (shape_enc, nonzero_enc) = {
            let mut enc = RangeEncoder::new(&mut buf);
            let result =
                encode_band_shape(&mut enc, width, bit_budget, &target, &mut noise_enc, None)
                    .unwrap();
            enc.done().unwrap();
            result
        };
        assert!(nonzero_enc);

        let mut noise_dec = NoiseGen::new(7);
        let mut dec = RangeDecoder::new(&buf);
        let (shape_dec, nonzero_dec) =
            decode_band_shape(&mut dec, width, bit_budget, &mut noise_dec, None);

        assert!(nonzero_dec);
        for (a, b) in shape_enc.iter().zip(shape_dec.iter()) {
            assert!((a - b).abs() < 1e-5, "{} != {}", a, b);
        }
    }

    #[test]
    fn zero_budget_falls_back_to_matching_noise() {
        let width = 4;
        let mut noise_enc = NoiseGen::new(42);
        let mut noise_dec = NoiseGen::new(42);
        let (shape_enc, used_enc) = {
            let mut buf = vec![0u8; 32];
            let mut enc = RangeEncoder::new(&mut buf);
            encode_band_shape(&mut enc, width, 0, &[0.0; 4], &mut noise_enc, None).unwrap()
        };
        let buf = vec![0u8; 32];
        let mut dec = RangeDecoder::new(&buf);
        let (shape_dec, used_dec) = decode_band_shape(&mut dec, width, 0, &mut noise_dec, None);

        assert!(!used_enc && !used_dec);
        assert_eq!(shape_enc, shape_dec);
    }

    #[test]
    fn zero_budget_folds_from_a_prior_coded_band_instead_of_noise() {
        let source = vec![0.6f32, -0.8, 0.0];
        let mut noise = NoiseGen::new(1);
        let folded = fold_or_noise(6, Some(&source), &mut noise);
        let norm: f32 = folded.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        // Tiling repeats the 3-sample source twice across the 6-wide band.
        assert!((folded[0] - folded[3]).abs() < 1e-6);
        assert!((folded[1] - folded[4]).abs() < 1e-6);
    }

    #[test]
    fn wide_band_splits_and_round_trips_through_itheta() {
        let width = MAX_PVQ_WIDTH + 40;
        let bit_budget = 400 << 3;
        let target: Vec<f32> = (0..width)
            .map(|i| ((i as f32) * 0.2).sin() * if i < width / 2 { 1.0 } else { 0.3 })
            .collect();

        let mut buf = vec![0u8; 2048];
        let mut noise_enc = NoiseGen::new(3);
        let (shape_enc, _) = {
            let mut enc = RangeEncoder::new(&mut buf);
            let result = encode_band_shape(
                &mut enc,
                width,
                bit_budget,
                &target,
                &mut noise_enc,
                None,
            )
            .unwrap();
            enc.done().unwrap();
            result
        };

        let mut noise_dec = NoiseGen::new(3);
        let mut dec = RangeDecoder::new(&buf);
        let (shape_dec, _) =
            decode_band_shape(&mut dec, width, bit_budget, &mut noise_dec, None);

        assert_eq!(shape_enc.len(), width);
        for (a, b) in shape_enc.iter().zip(shape_dec.iter()) {
            assert!((a - b).abs() < 1e-4, "{a} != {b}");
        }
    }

    #[test]
    fn anti_collapse_fills_a_fully_zeroed_subframe_within_a_band() {
        let widths = vec![8];
        let offsets = vec![0];
        let bands = mode::BandRange { start: 0, end: 1 };
        let mut spectrum = vec![0.0f32; 8];
        // Sub-block 0 (even indices) got real pulses; sub-block 1 (odd indices)
        // collapsed to all-zero.
        for i in (0..8).step_by(2) {
            spectrum[i] = 0.5;
        }
        let cur_energy = vec![2.0f32];
        let prev_energy = vec![2.0f32];
        apply_anti_collapse(
            &mut spectrum,
            bands,
            &widths,
            &offsets,
            2,
            &cur_energy,
            &prev_energy,
            9,
        );
        assert!((0..8).step_by(2).all(|i| spectrum[i] == 0.5));
        assert!((1..8).step_by(2).any(|i| spectrum[i] != 0.0));
    }
}
