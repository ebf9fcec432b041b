//! Static tables describing the CELT mode: band layout, allocation tables, and the
//! probability models used by the range coder.
//!
//! These tables are part of the bitstream format itself (RFC 6716 Tables 55-61):
//! changing a single byte here would make this decoder incompatible with every other
//! CELT implementation.

/// Number of bands in the fullband (21-band) layout.
pub(crate) const MAX_BANDS: usize = 21;

/// Minimum allowed pitch period for the postfilter / comb filter.
pub(crate) const COMBFILTER_MINPERIOD: usize = 15;

/// Band edges at a 2.5 ms (120-sample) granularity, in units of 400 Hz.
///
/// `eBands[i]..eBands[i + 1]` gives the width, in MDCT bins at the shortest block size, of
/// coded band `i`. Scaling by `1 << LM` gives the width at other frame sizes.
pub(crate) const EBANDS: [u8; MAX_BANDS + 1] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14, 16, 20, 24, 28, 34, 40, 48, 60, 78, 100,
];

/// `EBANDS[i + 1] - EBANDS[i]`: width in bins of each band at the 120-sample block size.
pub(crate) const FREQ_RANGE: [u8; MAX_BANDS] = [
    1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 6, 6, 8, 12, 18, 22,
];

/// Bias added to a band's log-energy mean before coarse quantization (RFC 6716 Table 56
/// `eMeans`), reflecting the average spectral tilt of real audio.
pub(crate) const E_MEANS: [f32; MAX_BANDS] = [
    6.3375, 6.6875, 6.75, 6.4375, 5.8125, 5.1875, 4.5, 3.7812, 3.125, 2.5625, 2.0, 1.5, 1.0625,
    0.6875, 0.375, 0.1875, -0.0625, -0.375, -0.5625, -0.75, -0.8125,
];

/// Two-tap coarse-energy predictor weights (inter-frame term), indexed by `LM`.
pub(crate) const ALPHA_COEF: [f32; 4] = [
    29440.0 / 32768.0,
    26112.0 / 32768.0,
    21248.0 / 32768.0,
    16384.0 / 32768.0,
];

/// Two-tap coarse-energy predictor weights (inter-band term), indexed by `LM`.
pub(crate) const BETA_COEF: [f32; 4] = [
    1.0 - 30147.0 / 32768.0,
    1.0 - 22282.0 / 32768.0,
    1.0 - 12124.0 / 32768.0,
    1.0 - 6554.0 / 32768.0,
];

/// Laplace model parameters `(fs0, decay)` pairs for intra-frame coarse energy, per `LM`.
pub(crate) const COARSE_ENERGY_INTRA: [[u8; 2 * MAX_BANDS]; 4] = [
    [
        24, 179, 48, 138, 54, 135, 54, 132, 53, 134, 56, 133, 55, 132, 55, 132, 61, 114, 70, 96,
        74, 88, 75, 88, 87, 74, 89, 66, 91, 67, 100, 59, 108, 50, 120, 40, 122, 37, 97, 43, 78, 50,
    ],
    [
        23, 178, 54, 115, 63, 102, 66, 98, 69, 99, 74, 89, 71, 91, 73, 91, 78, 89, 86, 80, 92, 66,
        93, 64, 102, 59, 103, 60, 104, 60, 117, 52, 123, 44, 138, 35, 133, 31, 97, 38, 77, 45,
    ],
    [
        21, 178, 59, 110, 71, 86, 75, 85, 84, 83, 91, 66, 88, 73, 87, 72, 92, 75, 98, 72, 105, 58,
        107, 54, 115, 52, 114, 55, 112, 56, 129, 51, 132, 40, 150, 33, 140, 29, 98, 35, 77, 42,
    ],
    [
        22, 178, 63, 114, 74, 82, 84, 83, 92, 82, 103, 62, 96, 72, 96, 67, 101, 73, 107, 72, 113,
        55, 118, 52, 125, 52, 118, 52, 117, 55, 135, 49, 137, 39, 157, 32, 145, 29, 97, 33, 77, 40,
    ],
];

/// Laplace model parameters `(fs0, decay)` pairs for inter-frame coarse energy, per `LM`.
pub(crate) const COARSE_ENERGY_INTER: [[u8; 2 * MAX_BANDS]; 4] = [
    [
        72, 127, 65, 129, 66, 128, 65, 128, 64, 128, 62, 128, 64, 128, 64, 128, 92, 78, 92, 79,
        92, 78, 90, 79, 116, 41, 115, 40, 114, 40, 132, 26, 132, 26, 145, 17, 161, 12, 176, 10,
        177, 11,
    ],
    [
        83, 78, 84, 81, 88, 75, 86, 74, 87, 71, 90, 73, 93, 74, 93, 74, 109, 40, 114, 36, 117, 34,
        117, 34, 143, 17, 145, 18, 146, 19, 162, 12, 165, 10, 178, 7, 189, 6, 190, 8, 177, 9,
    ],
    [
        61, 90, 93, 60, 105, 42, 107, 41, 110, 45, 116, 38, 113, 38, 112, 38, 124, 26, 132, 27,
        136, 19, 140, 20, 155, 14, 159, 16, 158, 18, 170, 13, 177, 10, 187, 8, 192, 6, 175, 9,
        159, 10,
    ],
    [
        42, 121, 96, 66, 108, 43, 111, 40, 117, 44, 123, 32, 120, 36, 119, 33, 127, 33, 134, 34,
        139, 21, 147, 23, 152, 20, 158, 25, 154, 26, 166, 21, 173, 16, 184, 13, 184, 10, 150, 13,
        139, 15,
    ],
];

/// Per-band bit-allocation caps, indexed by `[LM][stereo][band]`.
pub(crate) const STATIC_CAPS: [[[u8; MAX_BANDS]; 2]; 4] = [
    [
        [
            224, 224, 224, 224, 224, 224, 224, 224, 160, 160, 160, 160, 185, 185, 185, 178, 178,
            168, 134, 61, 37,
        ],
        [
            224, 224, 224, 224, 224, 224, 224, 224, 240, 240, 240, 240, 207, 207, 207, 198, 198,
            183, 144, 66, 40,
        ],
    ],
    [
        [
            160, 160, 160, 160, 160, 160, 160, 160, 185, 185, 185, 185, 193, 193, 193, 183, 183,
            172, 138, 64, 38,
        ],
        [
            240, 240, 240, 240, 240, 240, 240, 240, 207, 207, 207, 207, 204, 204, 204, 193, 193,
            180, 143, 66, 40,
        ],
    ],
    [
        [
            185, 185, 185, 185, 185, 185, 185, 185, 193, 193, 193, 193, 193, 193, 193, 183, 183,
            172, 138, 65, 39,
        ],
        [
            207, 207, 207, 207, 207, 207, 207, 207, 204, 204, 204, 204, 201, 201, 201, 188, 188,
            176, 141, 66, 40,
        ],
    ],
    [
        [
            193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 193, 194, 194, 194, 184, 184,
            173, 139, 65, 39,
        ],
        [
            204, 204, 204, 204, 204, 204, 204, 204, 201, 201, 201, 201, 198, 198, 198, 187, 187,
            175, 140, 66, 40,
        ],
    ],
];

/// Base per-quality-row, per-band bit allocation (in 1/32 bit/sample units), indexed
/// `[quality][band]`. Interpolated between two adjacent rows by the bisection search in
/// the allocator.
pub(crate) const STATIC_ALLOC: [[u8; MAX_BANDS]; 11] = [
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [
        90, 80, 75, 69, 63, 56, 49, 40, 34, 29, 20, 18, 10, 0, 0, 0, 0, 0, 0, 0, 0,
    ],
    [
        110, 100, 90, 84, 78, 71, 65, 58, 51, 45, 39, 32, 26, 20, 12, 0, 0, 0, 0, 0, 0,
    ],
    [
        118, 110, 103, 93, 86, 80, 75, 70, 65, 59, 53, 47, 40, 31, 23, 15, 4, 0, 0, 0, 0,
    ],
    [
        126, 119, 112, 104, 95, 89, 83, 78, 72, 66, 60, 54, 47, 39, 32, 25, 17, 12, 1, 0, 0,
    ],
    [
        134, 127, 120, 114, 103, 97, 91, 85, 78, 72, 66, 60, 54, 47, 41, 35, 29, 23, 16, 10, 1,
    ],
    [
        144, 137, 130, 124, 113, 107, 101, 95, 88, 82, 76, 70, 64, 57, 51, 45, 39, 33, 26, 15, 1,
    ],
    [
        152, 145, 138, 132, 123, 117, 111, 105, 98, 92, 86, 80, 74, 67, 61, 55, 49, 43, 36, 20, 1,
    ],
    [
        162, 155, 148, 142, 133, 127, 121, 115, 108, 102, 96, 90, 84, 77, 71, 65, 59, 53, 46, 30,
        1,
    ],
    [
        172, 165, 158, 152, 143, 137, 131, 125, 118, 112, 106, 100, 94, 87, 81, 75, 69, 63, 56,
        45, 20,
    ],
    [
        200, 200, 200, 200, 200, 200, 200, 200, 198, 193, 188, 183, 178, 173, 168, 163, 158, 153,
        148, 129, 104,
    ],
];

/// Number of rows in `STATIC_ALLOC`.
pub(crate) const CELT_VECTOR: usize = 11;
/// Number of bisection steps used to interpolate between two adjacent `STATIC_ALLOC` rows.
pub(crate) const ALLOC_STEPS: usize = 6;

/// log2(N) in 1/8-bit units, indexed by coded-band count, used for the intensity-stereo
/// bit-cost estimate.
pub(crate) const LOG2_FRAC: [u8; 24] = [
    0, 8, 13, 16, 19, 21, 23, 24, 26, 27, 28, 29, 30, 31, 32, 32, 33, 34, 34, 35, 36, 36, 37, 37,
];

/// Inverse-CDF of the per-band tonal-surgency "spread" decision (RFC 6716 Table 58).
pub(crate) const SPREAD_ICDF: [u8; 4] = [25, 23, 2, 0];

/// Inverse-CDF of the allocation-trim parameter (RFC 6716 Table 59), `ft = 128`.
pub(crate) const TRIM_ICDF: [u8; 11] = [126, 124, 119, 109, 87, 41, 19, 9, 4, 2, 0];

/// Inverse-CDF of the pitch-tapset selector (RFC 6716 Table 57), `ft = 4`.
pub(crate) const TAPSET_ICDF: [u8; 3] = [2, 1, 0];

/// Three-tap postfilter gain coefficients, indexed `[tapset][tap]`.
pub(crate) const POSTFILTER_TAPS: [[f32; 3]; 3] = [
    [0.3066406250, 0.2170410156, 0.1296386719],
    [0.4638671875, 0.2680664062, 0.0],
    [0.7998046875, 0.1000976562, 0.0],
];

/// `TF_SELECT[LM][transient][curr_select][tf_changed]`.
pub(crate) const TF_SELECT: [[[[i8; 2]; 2]; 2]; 4] = [
    [[[0, -1], [0, -1]], [[0, -1], [0, -1]]],
    [[[0, -1], [0, -2]], [[1, 0], [1, -1]]],
    [[[0, -2], [0, -3]], [[2, 0], [1, -1]]],
    [[[0, -2], [0, -3]], [[3, 0], [1, -1]]],
];

/// The 120-sample half of a Vorbis-style squared-sine analysis/synthesis window, used for
/// both the MDCT overlap-add and the postfilter's crossfade region.
///
/// `w[i] = sin(0.5 * PI * sin(0.5 * PI * (i + 0.5) / N) ^ 2)`, `N = 120`.
pub(crate) fn vorbis_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let inner = (std::f64::consts::FRAC_PI_2 * (i as f64 + 0.5) / len as f64).sin();
            (std::f64::consts::FRAC_PI_2 * inner * inner).sin() as f32
        })
        .collect()
}

/// The overlap length (in samples) used by the standard CELT fullband mode at the
/// shortest block size.
pub(crate) const OVERLAP: usize = 120;

/// Lazily-equivalent, precomputed overlap window at the standard 120-sample overlap length.
///
/// Kept as a `lazy` function rather than a `const` array since it is derived from
/// transcendental functions that are not `const fn` in stable Rust.
pub(crate) fn window() -> [f32; OVERLAP] {
    let v = vorbis_window(OVERLAP);
    let mut out = [0f32; OVERLAP];
    out.copy_from_slice(&v);
    out
}

/// CELT coded bandwidth as it affects bit allocation and band count, mirroring
/// [`crate::Bandwidth`] but carrying the internal `start`/`end` band range used by the
/// codec core (hybrid mode, which starts coding at band 17, is out of scope here, so
/// `start` is always `0`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct BandRange {
    /// First coded band, inclusive.
    pub(crate) start: usize,
    /// One past the last coded band.
    pub(crate) end: usize,
}

impl BandRange {
    pub(crate) fn new(end: usize) -> Self {
        Self { start: 0, end }
    }
}

/// Returns `log2(frame_size / 120)`, the CELT "LM" (duration index): `0` for a 120-sample
/// (2.5 ms) frame, up to `3` for a 960-sample (20 ms) frame.
pub(crate) fn frame_size_to_lm(frame_size: usize) -> Option<usize> {
    match frame_size {
        120 => Some(0),
        240 => Some(1),
        480 => Some(2),
        960 => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freq_range_matches_eband_deltas() {
        for i in 0..MAX_BANDS {
            assert_eq!(FREQ_RANGE[i], EBANDS[i + 1] - EBANDS[i]);
        }
    }

    #[test]
    fn frame_sizes_map_to_lm() {
        assert_eq!(frame_size_to_lm(120), Some(0));
        assert_eq!(frame_size_to_lm(960), Some(3));
        assert_eq!(frame_size_to_lm(100), None);
    }

    #[test]
    fn window_is_symmetric_half_sine() {
        let w = window();
        assert!((w[0] - 0.0).abs() < 0.01);
        assert!((w[OVERLAP - 1] - 1.0).abs() < 0.01);
    }
}
