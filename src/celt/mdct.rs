//! Implements the modified discrete cosine transform with windowed overlap-add.
//!
//! Folds the direct `O(n^2)` trigonometric sum down to a single `2n`-point complex FFT
//! (via [`crate::celt::kiss_fft::KissFft`]) plus a pre-rotation on the way in and a
//! post-rotation on the way out, the same "complex-FFT folding" the reference CELT MDCT
//! uses. `Mdct::new`/`forward`/`inverse` handle one fixed-size transform; [`forward_frame`]
//! and [`inverse_frame`] additionally handle the short-block case, where a transient
//! frame is coded as several independent 120-sample sub-transforms instead of one
//! frame-sized one.

use num_complex::Complex;

use crate::celt::kiss_fft::KissFft;
use crate::celt::mode;

/// A precomputed MDCT plan for one transform size.
pub(crate) struct Mdct {
    /// Number of frequency-domain bins produced per transform.
    n: usize,
    /// The `2 * n`-sample analysis/synthesis window: tapered for `overlap` samples at
    /// each edge via the shared Vorbis-style half window, flat at `1.0` in between.
    window: Vec<f32>,
    /// The `2n`-point complex FFT this transform folds onto.
    fft: KissFft,
    /// `cos`/`sin` of the post-rotation (forward) / pre-rotation (inverse) angle
    /// `gamma(k) = (pi/2 + pi/(2n)) * (k + 0.5)`, indexed by frequency bin `k`.
    cos_gamma: Vec<f32>,
    sin_gamma: Vec<f32>,
    /// `cos`/`sin` of the pre-rotation (forward) / post-rotation (inverse) angle
    /// `beta(t) = pi * t / (2n)`, indexed by time sample `t`.
    cos_beta: Vec<f32>,
    sin_beta: Vec<f32>,
}

impl Mdct {
    /// Builds a plan for frame size `n`.
    pub(crate) fn new(n: usize) -> Self {
        debug_assert!(n > 0);
        let overlap = mode::OVERLAP.min(2 * n);
        let half = mode::vorbis_window(overlap);
        let mut window = vec![1.0f32; 2 * n];
        for i in 0..overlap {
            window[i] = half[i];
            window[2 * n - 1 - i] = half[i];
        }

        let nf = n as f64;
        let gamma = |k: usize| (std::f64::consts::FRAC_PI_2 + std::f64::consts::PI / (2.0 * nf)) * (k as f64 + 0.5);
        let beta = |t: usize| std::f64::consts::PI * t as f64 / (2.0 * nf);

        let cos_gamma = (0..n).map(|k| gamma(k).cos() as f32).collect();
        let sin_gamma = (0..n).map(|k| gamma(k).sin() as f32).collect();
        let cos_beta = (0..2 * n).map(|t| beta(t).cos() as f32).collect();
        let sin_beta = (0..2 * n).map(|t| beta(t).sin() as f32).collect();

        Self {
            n,
            window,
            fft: KissFft::new(2 * n),
            cos_gamma,
            sin_gamma,
            cos_beta,
            sin_beta,
        }
    }

    /// Number of frequency bins this plan produces/consumes.
    pub(crate) fn len(&self) -> usize {
        self.n
    }

    /// Forward transform: windows `input` (length `2 * n`) and writes `n` MDCT
    /// coefficients to `out`.
    ///
    /// Pre-rotates the windowed input by `exp(-i*beta(t))`, runs it through the `2n`-point
    /// FFT, then combines the real/imaginary parts of each output bin with `gamma(k)` to
    /// recover the real-valued MDCT coefficient (the algebraic identity that replaces the
    /// direct `cos((pi/n)(t + n/2 + 0.5)(k + 0.5))` summation).
    pub(crate) fn forward(&self, input: &[f32], out: &mut [f32]) {
        let n = self.n;
        debug_assert_eq!(input.len(), 2 * n);
        debug_assert_eq!(out.len(), n);

        let mut q = vec![Complex::new(0.0f32, 0.0f32); 2 * n];
        for t in 0..2 * n {
            let wx = input[t] * self.window[t];
            q[t] = Complex::new(wx * self.cos_beta[t], -wx * self.sin_beta[t]);
        }

        let mut f = vec![Complex::new(0.0f32, 0.0f32); 2 * n];
        self.fft.forward(&q, &mut f);

        for k in 0..n {
            out[k] = self.cos_gamma[k] * f[k].re + self.sin_gamma[k] * f[k].im;
        }
    }

    /// Inverse transform: expands `input` (length `n` MDCT coefficients) into a windowed
    /// `2 * n`-sample synthesis buffer in `out`, ready to be overlap-added with the tail
    /// of the previous frame's synthesis output.
    pub(crate) fn inverse(&self, input: &[f32], out: &mut [f32]) {
        let n = self.n;
        debug_assert_eq!(input.len(), n);
        debug_assert_eq!(out.len(), 2 * n);

        let mut r = vec![Complex::new(0.0f32, 0.0f32); 2 * n];
        for k in 0..n {
            r[k] = Complex::new(input[k] * self.cos_gamma[k], input[k] * self.sin_gamma[k]);
        }

        let mut g = vec![Complex::new(0.0f32, 0.0f32); 2 * n];
        self.fft.inverse(&r, &mut g);

        let norm = 1.0 / n as f32;
        for t in 0..2 * n {
            let x = self.cos_beta[t] * g[t].re - self.sin_beta[t] * g[t].im;
            out[t] = x * norm * self.window[t];
        }
    }
}

/// Forward-transforms one whole frame, splitting into `shorts` independent sub-MDCTs when
/// `shorts > 1` (the transient case).
///
/// `history` and `current` are both `frame_size` raw (pre-MDCT) samples: the previous
/// frame's tail and this frame's own samples, respectively. When `shorts == 1` this is
/// exactly one `Mdct::new(frame_size)` call over `[history, current]`. When `shorts > 1`,
/// `frame_size` splits evenly into `shorts` sub-blocks of `frame_size / shorts` samples
/// each; each sub-block is transformed independently (chaining the previous sub-block's
/// own samples as its 120-sample history, exactly as consecutive whole frames chain), and
/// the `shorts` sub-transforms' bins are frequency-interleaved: `out[i * shorts + s] =
/// sub_s[i]`.
pub(crate) fn forward_frame(frame_size: usize, shorts: usize, history: &[f32], current: &[f32], out: &mut [f32]) {
    debug_assert_eq!(history.len(), frame_size);
    debug_assert_eq!(current.len(), frame_size);
    debug_assert_eq!(out.len(), frame_size);

    if shorts <= 1 {
        let mdct = Mdct::new(frame_size);
        let mut window_input = vec![0.0f32; 2 * frame_size];
        window_input[..frame_size].copy_from_slice(history);
        window_input[frame_size..].copy_from_slice(current);
        mdct.forward(&window_input, out);
        return;
    }

    debug_assert_eq!(frame_size % shorts, 0);
    let sub_n = frame_size / shorts;
    let mdct = Mdct::new(sub_n);
    let mut prev_tail = history[frame_size - sub_n..].to_vec();
    let mut window_input = vec![0.0f32; 2 * sub_n];
    let mut sub_out = vec![0.0f32; sub_n];

    for s in 0..shorts {
        let chunk = &current[s * sub_n..(s + 1) * sub_n];
        window_input[..sub_n].copy_from_slice(&prev_tail);
        window_input[sub_n..].copy_from_slice(chunk);
        mdct.forward(&window_input, &mut sub_out);
        for (i, &coeff) in sub_out.iter().enumerate() {
            out[i * shorts + s] = coeff;
        }
        prev_tail.copy_from_slice(chunk);
    }
}

/// Inverse-transforms one whole frame, splitting into `shorts` independent sub-MDCTs when
/// `shorts > 1`, the counterpart of [`forward_frame`].
///
/// `carry` is the persistent `frame_size`-long overlap-add tail (as already used by the
/// non-short decoder path): on entry it holds the previous frame's tail; on exit it holds
/// this frame's. When `shorts > 1`, only the carry's first `frame_size / shorts` samples
/// are meaningful sub-block-to-sub-block tail (the rest is zeroed on exit) — chaining a
/// short-block frame's tail into a following long-block frame (or vice versa) is therefore
/// approximate at that single boundary, since the two block sizes don't share a tail
/// length; see `DESIGN.md`.
pub(crate) fn inverse_frame(frame_size: usize, shorts: usize, coeffs: &[f32], carry: &mut [f32], out: &mut [f32]) {
    debug_assert_eq!(coeffs.len(), frame_size);
    debug_assert_eq!(carry.len(), frame_size);
    debug_assert_eq!(out.len(), frame_size);

    if shorts <= 1 {
        let mdct = Mdct::new(frame_size);
        let mut synth = vec![0.0f32; 2 * frame_size];
        mdct.inverse(coeffs, &mut synth);
        for i in 0..frame_size {
            out[i] = synth[i] + carry[i];
        }
        carry.copy_from_slice(&synth[frame_size..]);
        return;
    }

    debug_assert_eq!(frame_size % shorts, 0);
    let sub_n = frame_size / shorts;
    let mdct = Mdct::new(sub_n);
    let mut sub_carry = carry[..sub_n].to_vec();
    let mut sub_coeffs = vec![0.0f32; sub_n];
    let mut synth = vec![0.0f32; 2 * sub_n];

    for s in 0..shorts {
        for (i, slot) in sub_coeffs.iter_mut().enumerate() {
            *slot = coeffs[i * shorts + s];
        }
        mdct.inverse(&sub_coeffs, &mut synth);
        for i in 0..sub_n {
            out[s * sub_n + i] = synth[i] + sub_carry[i];
        }
        sub_carry.copy_from_slice(&synth[sub_n..]);
    }

    carry[..sub_n].copy_from_slice(&sub_carry);
    for c in &mut carry[sub_n..] {
        *c = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_produces_n_bins() {
        let mdct = Mdct::new(120);
        let input = vec![0.0f32; 240];
        let mut out = vec![0.0f32; 120];
        mdct.forward(&input, &mut out);
        assert_eq!(out.len(), 120);
    }

    #[test]
    fn two_frame_overlap_add_reconstructs_constant_signal() {
        // A constant signal is invariant to windowing aliasing in the flat, non-overlap
        // region, so it is a good sanity check for the overlap-add plumbing even without
        // a known-good reference transform to compare against.
        let n = 60;
        let mdct = Mdct::new(n);
        let value = 0.25f32;
        let frame = vec![value; 2 * n];

        let mut coeffs = vec![0.0f32; n];
        mdct.forward(&frame, &mut coeffs);

        let mut synth_a = vec![0.0f32; 2 * n];
        mdct.inverse(&coeffs, &mut synth_a);
        let mut synth_b = vec![0.0f32; 2 * n];
        mdct.inverse(&coeffs, &mut synth_b);

        let mut reconstructed = vec![0.0f32; n];
        for i in 0..n {
            reconstructed[i] = synth_a[n + i] + synth_b[i];
        }

        for &sample in &reconstructed[mode::OVERLAP.min(n)..n - mode::OVERLAP.min(n) / 4] {
            assert!(
                (sample - value).abs() < 0.2,
                "expected ~{value}, got {sample}"
            );
        }
    }

    #[test]
    fn forward_frame_with_one_short_block_matches_plain_forward() {
        let frame_size = 120;
        let history = vec![0.1f32; frame_size];
        let current: Vec<f32> = (0..frame_size).map(|i| (i as f32 * 0.03).sin() * 0.5).collect();

        let mut via_frame = vec![0.0f32; frame_size];
        forward_frame(frame_size, 1, &history, &current, &mut via_frame);

        let mdct = Mdct::new(frame_size);
        let mut window_input = vec![0.0f32; 2 * frame_size];
        window_input[..frame_size].copy_from_slice(&history);
        window_input[frame_size..].copy_from_slice(&current);
        let mut direct = vec![0.0f32; frame_size];
        mdct.forward(&window_input, &mut direct);

        for (a, b) in via_frame.iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} != {b}");
        }
    }

    #[test]
    fn short_block_round_trip_stays_finite_and_in_range() {
        let frame_size = 480;
        let shorts = 4;
        let history = vec![0.0f32; frame_size];
        let current: Vec<f32> = (0..frame_size).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();

        let mut coeffs = vec![0.0f32; frame_size];
        forward_frame(frame_size, shorts, &history, &current, &mut coeffs);
        assert!(coeffs.iter().all(|x| x.is_finite()));

        let mut carry = vec![0.0f32; frame_size];
        let mut out = vec![0.0f32; frame_size];
        inverse_frame(frame_size, shorts, &coeffs, &mut carry, &mut out);

        assert!(out.iter().all(|x| x.is_finite()));
        assert!(carry.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn short_block_sub_transforms_use_120_sample_width() {
        // At every LM that allows transients (LM >= 1), frame_size = 120 * shorts, so
        // each sub-block is the same 120-sample width used at the 2.5ms block size.
        for (frame_size, shorts) in [(240, 2), (480, 4), (960, 8)] {
            assert_eq!(frame_size / shorts, 120);
        }
    }
}
