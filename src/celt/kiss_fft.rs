//! A mixed-radix Fast Fourier Transform used by [`crate::celt::mdct`] to fold the MDCT's
//! direct `O(n^2)` trigonometric sum down to `O(n log n)`.
//!
//! Named after Mark Borgerding's KISS-FFT ("Keep It Simple, Stupid"), which the reference
//! CELT implementation builds its MDCT on top of. This port keeps the spirit (a plain
//! recursive Cooley-Tukey decomposition over small radices, no platform-specific
//! butterflies) rather than KISS-FFT's specific optimized kernels, since those aren't
//! reproducible from memory without a way to check them.

use num_complex::Complex;
use num_traits::Zero;

/// Factors `n` into a product of small radices (preferring 4, then 2, 3, 5), falling back
/// to `n` itself as a single "radix" if nothing else divides it (which never happens for
/// the `2n` sizes this crate actually calls `KissFft::new` with: 240, 480, 960, 1920 all
/// factor completely into 2, 3, and 5).
fn factorize(n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut remaining = n;
    for radix in [4, 2, 3, 5] {
        while remaining % radix == 0 && remaining > radix {
            factors.push(radix);
            remaining /= radix;
        }
    }
    if remaining > 1 {
        factors.push(remaining);
    }
    factors
}

/// A mixed-radix FFT plan for a fixed transform length.
pub(crate) struct KissFft {
    n: usize,
    factors: Vec<usize>,
}

impl KissFft {
    /// Builds a plan for a complex FFT of length `n`.
    pub(crate) fn new(n: usize) -> Self {
        debug_assert!(n > 0);
        Self {
            n,
            factors: factorize(n),
        }
    }

    /// Length this plan transforms.
    pub(crate) fn len(&self) -> usize {
        self.n
    }

    /// Computes the forward DFT: `out[k] = sum_t in[t] * exp(-2*pi*i*t*k/n)`.
    pub(crate) fn forward(&self, input: &[Complex<f32>], out: &mut [Complex<f32>]) {
        debug_assert_eq!(input.len(), self.n);
        debug_assert_eq!(out.len(), self.n);
        recurse(input, out, &self.factors, -1.0);
    }

    /// Computes the inverse-sense DFT (same sign convention as [`KissFft::forward`] but
    /// with the twiddle sign flipped, i.e. `out[k] = sum_t in[t] * exp(+2*pi*i*t*k/n)`).
    /// Callers are responsible for any `1/n` normalization; [`crate::celt::mdct`] folds
    /// that into its own fixed-point scale instead of paying for it here.
    pub(crate) fn inverse(&self, input: &[Complex<f32>], out: &mut [Complex<f32>]) {
        debug_assert_eq!(input.len(), self.n);
        debug_assert_eq!(out.len(), self.n);
        recurse(input, out, &self.factors, 1.0);
    }
}

/// Recursive decimation-in-time Cooley-Tukey step: splits `input` (length `n =
/// factors.iter().product()`, densely packed) into `radix = factors[0]` interleaved
/// sub-problems of length `n / radix`, solves each recursively against the remaining
/// factors, and recombines with the standard CT butterfly. `sign` is `-1.0` for a forward
/// transform and `+1.0` for an inverse-sense one, per the usual DFT sign convention.
fn recurse(input: &[Complex<f32>], out: &mut [Complex<f32>], factors: &[usize], sign: f32) {
    let n = out.len();
    let Some((&radix, rest)) = factors.split_first() else {
        dft(input, out, sign);
        return;
    };
    if radix == n {
        dft(input, out, sign);
        return;
    }

    let m = n / radix;
    // Each of the `radix` sub-transforms operates on every `radix`-th sample of `input`
    // (decimation in time), each starting one step further in.
    let mut subs = vec![vec![Complex::zero(); m]; radix];
    for r in 0..radix {
        let sub_input: Vec<Complex<f32>> = (0..m).map(|j| input[r + j * radix]).collect();
        recurse(&sub_input, &mut subs[r], rest, sign);
    }

    // Explicit-recombination Cooley-Tukey butterfly: for each output bin `k`, sum the
    // `radix` sub-transform outputs (indexed modulo `m`) weighted by the twiddle factor
    // for this radix and position.
    for k in 0..n {
        let mut acc = Complex::zero();
        for r in 0..radix {
            acc += twiddle(sign, r, k, n) * subs[r][k % m];
        }
        out[k] = acc;
    }
}

/// `exp(sign * 2*pi*i * r * k / n)`.
fn twiddle(sign: f32, r: usize, k: usize, n: usize) -> Complex<f32> {
    let angle = sign * 2.0 * std::f64::consts::PI * (r * k) as f64 / n as f64;
    Complex::new(angle.cos() as f32, angle.sin() as f32)
}

/// Brute-force `O(n^2)` DFT, used as the base case of the recursion.
fn dft(input: &[Complex<f32>], out: &mut [Complex<f32>], sign: f32) {
    let n = out.len();
    for k in 0..n {
        let mut acc = Complex::zero();
        for (t, &x) in input.iter().enumerate() {
            acc += x * twiddle(sign, t, k, n);
        }
        out[k] = acc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_dft(input: &[Complex<f32>], sign: f32) -> Vec<Complex<f32>> {
        let n = input.len();
        (0..n)
            .map(|k| {
                let mut acc = Complex::zero();
                for t in 0..n {
                    acc += input[t] * twiddle(sign, t, k, n);
                }
                acc
            })
            .collect()
    }

    #[test]
    fn forward_matches_direct_dft_for_composite_length() {
        let n = 60; // 60 = 4 * 3 * 5, exercises the mixed-radix path.
        let input: Vec<Complex<f32>> = (0..n)
            .map(|i| Complex::new((i as f32 * 0.37).sin(), (i as f32 * 0.19).cos()))
            .collect();
        let plan = KissFft::new(n);
        let mut out = vec![Complex::zero(); n];
        plan.forward(&input, &mut out);
        let expected = direct_dft(&input, -1.0);
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).norm() < 1e-2, "{a} != {b}");
        }
    }

    #[test]
    fn inverse_of_forward_recovers_input_up_to_scale() {
        let n = 48;
        let input: Vec<Complex<f32>> = (0..n).map(|i| Complex::new(i as f32 - 24.0, 0.0)).collect();
        let plan = KissFft::new(n);
        let mut freq = vec![Complex::zero(); n];
        plan.forward(&input, &mut freq);
        let mut back = vec![Complex::zero(); n];
        plan.inverse(&freq, &mut back);
        for (a, b) in back.iter().zip(input.iter()) {
            assert!((a / n as f32 - b).norm() < 1e-2, "{a} != {b}");
        }
    }
}
