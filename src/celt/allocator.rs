//! Dynamic bit allocation: converts a frame's total bit budget into a per-band split
//! between PVQ shape bits and fine-energy bits, and range-codes the handful of
//! frame-level decisions ("skip", intensity stereo cutoff, dual-stereo) that ride along
//! with it so encoder and decoder stay in lockstep.
//!
//! Mirrors the reference allocator's two-stage bisection: first locate the bracketing
//! pair of rows in the base [`mode::STATIC_ALLOC`] table by total bits, then bisect
//! [`mode::ALLOC_STEPS`] times between those two rows for a finer-grained total.

use crate::celt::mode;
use crate::encoder_error::CeltEncoderError;
use crate::range_coder::{RangeDecoder, RangeEncoder};

/// A band whose loudness (in the same log2 domain as quantized band energy) falls below
/// this is considered negligible enough to skip entirely when scanning down from the top
/// band for bits to reclaim.
const SKIP_LOUDNESS_THRESHOLD: f32 = -4.0;

/// The result of the bit allocation for one frame.
pub(crate) struct Allocation {
    /// Bits (in 1/8-bit units) given to each band's PVQ shape coding, indexed by band.
    pub(crate) pulse_bits: Vec<u32>,
    /// Raw bits given to each band's fine-energy refinement, indexed by band.
    pub(crate) fine_bits: Vec<u32>,
    /// Whether each band is in the high-priority group for leftover-bit finalization.
    pub(crate) fine_priority: Vec<bool>,
    /// One past the last band that received any bits at all.
    pub(crate) coded_bands: usize,
    /// First band, at and above which the side channel carries no shape bits (coded as
    /// mono via the mid channel only). Equal to `bands.end` when stereo coupling never
    /// narrows the stereo image.
    pub(crate) intensity_band: usize,
    /// When `true`, the two channels are coded independently (no mid/side transform).
    /// Always `true` for a mono stream.
    pub(crate) dual_stereo: bool,
}

/// Interpolates [`mode::STATIC_ALLOC`] to the row (and fractional step within
/// [`mode::ALLOC_STEPS`]) that best matches `target_bits` (in 1/8-bit units, summed over
/// all coded bands) without exceeding it, returning the per-band allocation.
fn interpolate_static_alloc(lm: usize, bands: mode::BandRange, target_bits: i64) -> Vec<i64> {
    let row_total = |row: usize| -> i64 {
        (bands.start..bands.end)
            .map(|b| i64::from(mode::STATIC_ALLOC[row][b]) << lm)
            .sum()
    };

    let mut lo = 0usize;
    while lo + 1 < mode::CELT_VECTOR && row_total(lo + 1) <= target_bits {
        lo += 1;
    }
    let hi = (lo + 1).min(mode::CELT_VECTOR - 1);

    let row_at = |frac: u32| -> Vec<i64> {
        (bands.start..bands.end)
            .map(|b| {
                let a = i64::from(mode::STATIC_ALLOC[lo][b]);
                let h = i64::from(mode::STATIC_ALLOC[hi][b]);
                let steps = i64::from(mode::ALLOC_STEPS as u32);
                ((a * (steps - i64::from(frac)) + h * i64::from(frac)) / steps) << lm
            })
            .collect()
    };

    if lo == hi {
        return row_at(0);
    }

    // Bisect the interpolation fraction between `lo` and `hi`, homing in on whichever
    // fraction's total is closest to (without exceeding) `target_bits`.
    let mut best_frac = 0u32;
    let mut lo_bound = 0u32;
    let mut hi_bound = mode::ALLOC_STEPS as u32;
    loop {
        let mid = (lo_bound + hi_bound) / 2;
        let total: i64 = row_at(mid).iter().sum();
        if total <= target_bits {
            best_frac = mid;
            lo_bound = mid + 1;
        } else {
            if mid == 0 {
                break;
            }
            hi_bound = mid - 1;
        }
        if lo_bound > hi_bound {
            break;
        }
    }

    row_at(best_frac)
}

/// Shared base allocation: table interpolation, trim adjustment, static-cap clamping, and
/// greedy leftover-bit redistribution. Identical on the encode and decode side since it
/// only depends on values both sides already agree on (`lm`, `stereo`, `bands`,
/// `total_bits`, `trim`).
fn base_allocation(lm: usize, stereo: bool, bands: mode::BandRange, total_bits: u32, trim: i32) -> Vec<i64> {
    let channels_factor = if stereo { 2 } else { 1 };
    let target = i64::from(total_bits) / channels_factor;

    let mut bits = interpolate_static_alloc(lm, bands, target);

    // Allocation trim: shift a small amount of budget from the low bands to the high
    // bands (or back), proportional to distance from the middle of the band range.
    let mid = (bands.start + bands.end) as i64 / 2;
    for (offset, b) in (bands.start..bands.end).enumerate() {
        let distance = b as i64 - mid;
        bits[offset] = (bits[offset] + i64::from(trim) * distance * 4).max(0);
    }

    // Enforce the static per-band cap.
    let stereo_idx = if stereo { 1 } else { 0 };
    for (offset, b) in (bands.start..bands.end).enumerate() {
        let cap = i64::from(mode::STATIC_CAPS[lm][stereo_idx][b]) << lm;
        bits[offset] = bits[offset].min(cap);
    }

    // Spend any bits the table allocation left on the table, greedily, low band first.
    let spent: i64 = bits.iter().sum();
    let mut leftover = (target - spent).max(0);
    if leftover > 0 {
        for (offset, b) in (bands.start..bands.end).enumerate() {
            let cap = i64::from(mode::STATIC_CAPS[lm][stereo_idx][b]) << lm;
            let room = (cap - bits[offset]).max(0);
            let grant = room.min(leftover);
            bits[offset] += grant;
            leftover -= grant;
            if leftover == 0 {
                break;
            }
        }
    }

    bits
}

/// Splits the finalized per-band bit totals (after any skip reclamation) into pulse/fine
/// shares, returning the `(pulse_bits, fine_bits, fine_priority, coded_bands)` tuple.
fn finalize_bits(bands: mode::BandRange, bits: &[i64]) -> (Vec<u32>, Vec<u32>, Vec<bool>, usize) {
    let mut pulse_bits = vec![0u32; mode::MAX_BANDS];
    let mut fine_bits = vec![0u32; mode::MAX_BANDS];
    let mut fine_priority = vec![false; mode::MAX_BANDS];
    let mut coded_bands = bands.start;

    for (offset, b) in (bands.start..bands.end).enumerate() {
        let total_band_bits = bits[offset].max(0) as u32;
        if total_band_bits == 0 {
            continue;
        }
        coded_bands = b + 1;

        // Reserve up to two bits per band for fine-energy refinement before spending
        // the rest on the PVQ shape.
        let max_fine = 2u32;
        let reserved = (total_band_bits / 8).min(max_fine);
        fine_bits[b] = reserved;
        fine_priority[b] = offset % 2 == 0;
        pulse_bits[b] = total_band_bits - reserved * 8;
    }

    (pulse_bits, fine_bits, fine_priority, coded_bands)
}

/// Scans the bit-bearing bands from the top down, range-coding a real skip decision for
/// each contiguous silent band and reclaiming its bits onto the highest band that's kept.
/// `loudness` drives the encoder's skip decisions; the decoder mirrors the same
/// bit-bearing band list and stopping rule, so no extra side information is needed beyond
/// the coded bits themselves.
fn apply_skip_encode(
    enc: &mut RangeEncoder,
    bands: mode::BandRange,
    bits: &mut [i64],
    loudness: &[f32],
) -> Result<(), CeltEncoderError> {
    let candidates: Vec<usize> = (bands.start..bands.end)
        .filter(|&b| bits[b - bands.start] > 0)
        .collect();
    let mut reclaimed = 0i64;
    let mut kept_top: Option<usize> = None;
    for &b in candidates.iter().rev() {
        let silent = loudness[b] < SKIP_LOUDNESS_THRESHOLD;
        enc.encode_bit_logp(u32::from(silent), 1)?;
        if silent {
            reclaimed += bits[b - bands.start];
            bits[b - bands.start] = 0;
        } else {
            kept_top = Some(b);
            break;
        }
    }
    if let Some(top) = kept_top {
        bits[top - bands.start] += reclaimed;
    }
    Ok(())
}

fn apply_skip_decode(dec: &mut RangeDecoder, bands: mode::BandRange, bits: &mut [i64]) {
    let candidates: Vec<usize> = (bands.start..bands.end)
        .filter(|&b| bits[b - bands.start] > 0)
        .collect();
    let mut reclaimed = 0i64;
    let mut kept_top: Option<usize> = None;
    for &b in candidates.iter().rev() {
        let silent = dec.decode_bit_logp(1);
        if silent {
            reclaimed += bits[b - bands.start];
            bits[b - bands.start] = 0;
        } else {
            kept_top = Some(b);
            break;
        }
    }
    if let Some(top) = kept_top {
        bits[top - bands.start] += reclaimed;
    }
}

/// Computes the full per-band allocation for one frame and range-codes the dual-stereo
/// flag, intensity cutoff, and per-band skip decisions that go with it.
///
/// `total_bits` is the whole bit budget (already excluding the fixed per-frame header
/// overhead) available for band coding, in 1/8-bit units. `trim` is the small
/// allocation-trim adjustment decoded from [`mode::TRIM_ICDF`] (centered at `0`). `loudness`
/// is a per-band loudness proxy (e.g. the louder of the two channels' target log2 energy)
/// driving which trailing bands are worth skipping. `intensity_band`/`dual_stereo` are the
/// encoder's already-chosen stereo parameters, written to the bitstream here; pass
/// `bands.end`/`true` for a mono stream (nothing is coded in that case).
#[allow(clippy::too_many_arguments)]
pub(crate) fn allocate_encode(
    enc: &mut RangeEncoder,
    lm: usize,
    stereo: bool,
    bands: mode::BandRange,
    total_bits: u32,
    trim: i32,
    loudness: &[f32],
    intensity_band: usize,
    dual_stereo: bool,
) -> Result<Allocation, CeltEncoderError> {
    if stereo {
        enc.encode_bit_logp(u32::from(dual_stereo), 1)?;
        let span = (bands.end - bands.start + 1) as u32;
        enc.encode_uint((intensity_band - bands.start) as u32, span)
            .map_err(|_| CeltEncoderError::EncodingFailed("intensity band"))?;
    }

    let mut bits = base_allocation(lm, stereo, bands, total_bits, trim);
    apply_skip_encode(enc, bands, &mut bits, loudness)?;
    let (pulse_bits, fine_bits, fine_priority, coded_bands) = finalize_bits(bands, &bits);

    Ok(Allocation {
        pulse_bits,
        fine_bits,
        fine_priority,
        coded_bands,
        intensity_band: if stereo { intensity_band } else { bands.end },
        dual_stereo: if stereo { dual_stereo } else { true },
    })
}

/// Decoding counterpart of [`allocate_encode`].
pub(crate) fn allocate_decode(
    dec: &mut RangeDecoder,
    lm: usize,
    stereo: bool,
    bands: mode::BandRange,
    total_bits: u32,
    trim: i32,
) -> Allocation {
    let (dual_stereo, intensity_band) = if stereo {
        let dual_stereo = dec.decode_bit_logp(1);
        let span = (bands.end - bands.start + 1) as u32;
        let intensity_band = bands.start + dec.decode_uint(span) as usize;
        (dual_stereo, intensity_band)
    } else {
        (true, bands.end)
    };

    let mut bits = base_allocation(lm, stereo, bands, total_bits, trim);
    apply_skip_decode(dec, bands, &mut bits);
    let (pulse_bits, fine_bits, fine_priority, coded_bands) = finalize_bits(bands, &bits);

    Allocation {
        pulse_bits,
        fine_bits,
        fine_priority,
        coded_bands,
        intensity_band,
        dual_stereo,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud(bands: mode::BandRange) -> Vec<f32> {
        vec![10.0f32; bands.end]
    }

    #[test]
    fn allocation_never_exceeds_total_budget() {
        let bands = mode::BandRange::new(21);
        for &total in &[200u32, 2000, 8000, 20000] {
            let mut buf = vec![0u8; total as usize];
            let mut enc = RangeEncoder::new(&mut buf);
            let alloc = allocate_encode(
                &mut enc,
                3,
                false,
                bands,
                total,
                0,
                &loud(bands),
                bands.end,
                true,
            )
            .unwrap();
            let spent: u32 = alloc
                .pulse_bits
                .iter()
                .zip(alloc.fine_bits.iter())
                .map(|(&p, &f)| p + f * 8)
                .sum();
            assert!(spent <= total, "{spent} > {total}");
        }
    }

    #[test]
    fn more_bits_reach_more_bands() {
        let bands = mode::BandRange::new(21);
        let mut buf_small = vec![0u8; 4096];
        let mut enc_small = RangeEncoder::new(&mut buf_small);
        let small = allocate_encode(&mut enc_small, 3, false, bands, 200, 0, &loud(bands), bands.end, true).unwrap();

        let mut buf_large = vec![0u8; 4096];
        let mut enc_large = RangeEncoder::new(&mut buf_large);
        let large = allocate_encode(&mut enc_large, 3, false, bands, 20000, 0, &loud(bands), bands.end, true).unwrap();

        assert!(large.coded_bands >= small.coded_bands);
        assert!(large.coded_bands > 10);
    }

    #[test]
    fn stereo_halves_the_per_channel_budget() {
        let bands = mode::BandRange::new(21);
        let mut buf_mono = vec![0u8; 4096];
        let mut enc_mono = RangeEncoder::new(&mut buf_mono);
        let mono = allocate_encode(&mut enc_mono, 3, false, bands, 4000, 0, &loud(bands), bands.end, true).unwrap();

        let mut buf_stereo = vec![0u8; 4096];
        let mut enc_stereo = RangeEncoder::new(&mut buf_stereo);
        let stereo = allocate_encode(&mut enc_stereo, 3, true, bands, 4000, 0, &loud(bands), bands.end, true).unwrap();

        let mono_spent: u32 = mono.pulse_bits.iter().sum::<u32>()
            + mono.fine_bits.iter().sum::<u32>() * 8;
        let stereo_spent: u32 = stereo.pulse_bits.iter().sum::<u32>()
            + stereo.fine_bits.iter().sum::<u32>() * 8;
        assert!(stereo_spent <= mono_spent);
    }

    #[test]
    fn skip_and_stereo_params_round_trip() {
        let bands = mode::BandRange::new(21);
        let mut loudness = loud(bands);
        // Silence the top few bands so the skip path actually reclaims bits.
        for b in 18..21 {
            loudness[b] = -20.0;
        }

        let mut buf = vec![0u8; 4096];
        let encoded = {
            let mut enc = RangeEncoder::new(&mut buf);
            let alloc =
                allocate_encode(&mut enc, 3, true, bands, 4000, 0, &loudness, 15, false).unwrap();
            enc.done().unwrap();
            alloc
        };

        let mut dec = RangeDecoder::new(&buf);
        let decoded = allocate_decode(&mut dec, 3, true, bands, 4000, 0);

        assert_eq!(encoded.intensity_band, decoded.intensity_band);
        assert_eq!(encoded.dual_stereo, decoded.dual_stereo);
        assert_eq!(encoded.pulse_bits, decoded.pulse_bits);
        assert_eq!(encoded.fine_bits, decoded.fine_bits);
        assert_eq!(encoded.coded_bands, decoded.coded_bands);
    }
}
