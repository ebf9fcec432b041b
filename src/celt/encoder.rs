//! Implements the CELT encoder.
//!
//! Mirrors [`crate::celt::decoder::CeltDecoder`] step for step in the encode direction:
//! pre-emphasis and forward MDCT analysis, then header flags, energy, allocation, and
//! per-band PVQ shape coding.

use crate::celt::mdct;
use crate::celt::postfilter;
use crate::celt::preemphasis::Preemphasis;
use crate::celt::{allocator, analysis, bands, energy, mode};
use crate::encoder_error::CeltEncoderError;
use crate::range_coder::{RangeEncoder, Tell};
use crate::Channels;

/// A frame is treated as silent (and coded with just the single silence flag) once its
/// total energy drops below this threshold.
const SILENCE_THRESHOLD: f32 = 1e-9;

/// The CELT encoder.
///
/// Owns everything that must persist across frames: per-band energy history, the
/// pre-emphasis filter state, the MDCT analysis history (the previous frame's tail,
/// needed to build the next `2n`-sample analysis window), and the folding/noise seed.
pub(crate) struct CeltEncoder {
    channels: usize,
    band_count: usize,
    prev_energy: Vec<f32>,
    preemphasis: Vec<Preemphasis>,
    history: Vec<Vec<f32>>,
    seed: u32,
    first_frame: bool,
    final_range: u32,
}

impl CeltEncoder {
    /// Creates a new CELT encoder.
    pub(crate) fn new(channels: Channels) -> Result<Self, CeltEncoderError> {
        let n = channels as usize;
        Ok(Self {
            channels: n,
            band_count: mode::MAX_BANDS,
            prev_energy: vec![0.0; mode::MAX_BANDS * n],
            preemphasis: vec![Preemphasis::new(); n],
            history: Vec::new(),
            seed: 0,
            first_frame: true,
            final_range: 0,
        })
    }

    /// Resets the CELT encoder to its just-created state.
    pub(crate) fn reset(&mut self) -> Result<(), CeltEncoderError> {
        let n = self.channels;
        self.prev_energy = vec![0.0; mode::MAX_BANDS * n];
        self.preemphasis = vec![Preemphasis::new(); n];
        self.history = Vec::new();
        self.seed = 0;
        self.first_frame = true;
        self.final_range = 0;
        Ok(())
    }

    /// Caps how many of the mode's bands encoding will use, trading bandwidth for bits.
    pub(crate) fn set_band_count(&mut self, band_count: usize) {
        self.band_count = band_count.min(mode::MAX_BANDS);
    }

    /// The range coder's range value as of the end of the last encoded frame, captured
    /// just before the final `done()` flush. Matches what the decoder reports for the
    /// same frame when nothing was corrupted in between.
    pub(crate) fn final_range(&self) -> u32 {
        self.final_range
    }

    /// Encodes one frame of interleaved PCM into `output`, returning the number of bytes
    /// written. `output`'s length is the bit budget available to this frame.
    pub(crate) fn encode(
        &mut self,
        pcm: &[f32],
        frame_size: usize,
        output: &mut [u8],
    ) -> Result<usize, CeltEncoderError> {
        let lm = mode::frame_size_to_lm(frame_size).ok_or(CeltEncoderError::InvalidFrameSize)?;
        let channels = self.channels;
        let stereo = channels == 2;
        let band_range = mode::BandRange::new(self.band_count);

        if pcm.len() != frame_size * channels {
            return Err(CeltEncoderError::InvalidInputLength);
        }

        if self.history.len() != channels || self.history.first().map(Vec::len) != Some(frame_size)
        {
            self.history = vec![vec![0.0; frame_size]; channels];
        }

        let mut deinterleaved = vec![vec![0.0f32; frame_size]; channels];
        for (i, frame) in pcm.chunks_exact(channels).enumerate() {
            for (c, &s) in frame.iter().enumerate() {
                deinterleaved[c][i] = s;
            }
        }
        for (c, samples) in deinterleaved.iter_mut().enumerate() {
            self.preemphasis[c].apply(samples);
        }

        let total_bits = (output.len() as u32) * 8;
        let total_eighths = total_bits << 3;
        let mut enc = RangeEncoder::new(output);

        let silence = deinterleaved
            .iter()
            .flatten()
            .map(|x| x * x)
            .sum::<f32>()
            < SILENCE_THRESHOLD;
        enc.encode_bit_logp(u32::from(silence), 15)?;

        // Transient detection drives the transform itself (a transient frame splits its
        // MDCT into `2^lm` short blocks), so it has to run before the forward transform
        // regardless of whether the silence flag ends up being set.
        let transient = if lm > 0 {
            analysis::detect_transient(&deinterleaved[0])
        } else {
            false
        };
        let shorts = if transient { 1usize << lm } else { 1usize };

        let mut coeffs = vec![vec![0.0f32; frame_size]; channels];
        for c in 0..channels {
            mdct::forward_frame(
                frame_size,
                shorts,
                &self.history[c],
                &deinterleaved[c],
                &mut coeffs[c],
            );
            self.history[c].copy_from_slice(&deinterleaved[c]);
        }

        if !silence {
            postfilter::encode(&mut enc, None)?;

            // Mirrors the decoder's `lm > 0 && dec.decode_bit_logp(3)` short-circuit: a
            // 2.5 ms frame has only one subframe, so there's nothing for the transient
            // flag to describe and no bit is spent on it.
            if lm > 0 {
                enc.encode_bit_logp(u32::from(transient), 3)?;
            }

            let intra = self.first_frame;
            enc.encode_bit_logp(u32::from(intra), 3)?;
            self.first_frame = false;

            let widths: Vec<usize> = (0..mode::MAX_BANDS)
                .map(|b| usize::from(mode::FREQ_RANGE[b]) << lm)
                .collect();

            let band_energy = |spectrum: &[f32]| -> Vec<f32> {
                (0..mode::MAX_BANDS)
                    .map(|b| {
                        let lo = usize::from(mode::EBANDS[b]) << lm;
                        let hi = (usize::from(mode::EBANDS[b + 1]) << lm).min(frame_size);
                        let norm: f32 = spectrum[lo..hi].iter().map(|x| x * x).sum::<f32>().sqrt();
                        norm.max(1e-9).log2()
                    })
                    .collect()
            };

            // Decide stereo coupling (mid/side vs. independent L/R, intensity cutoff)
            // from the raw per-channel spectra before anything downstream commits to a
            // channel layout.
            let mut working_coeffs = coeffs;
            let mut stereo_params = analysis::StereoParams {
                dual_stereo: true,
                intensity_band: band_range.end,
            };
            if stereo {
                let inv_sqrt2 = std::f32::consts::FRAC_1_SQRT_2;
                let mid: Vec<f32> = (0..frame_size)
                    .map(|i| (working_coeffs[0][i] + working_coeffs[1][i]) * inv_sqrt2)
                    .collect();
                let side: Vec<f32> = (0..frame_size)
                    .map(|i| (working_coeffs[0][i] - working_coeffs[1][i]) * inv_sqrt2)
                    .collect();
                let mid_energy = band_energy(&mid);
                let side_energy = band_energy(&side);
                stereo_params = analysis::choose_stereo_params(band_range, &mid_energy, &side_energy);
                if !stereo_params.dual_stereo {
                    working_coeffs = vec![mid, side];
                }
            }

            let mut target_energy = vec![0.0f32; mode::MAX_BANDS * channels];
            for (c, spectrum) in working_coeffs.iter().enumerate().take(channels) {
                for b in band_range.start..band_range.end {
                    let lo = usize::from(mode::EBANDS[b]) << lm;
                    let hi = (usize::from(mode::EBANDS[b + 1]) << lm).min(frame_size);
                    let norm: f32 = spectrum[lo..hi].iter().map(|x| x * x).sum::<f32>().sqrt();
                    target_energy[b * channels + c] = norm.max(1e-9).log2();
                }
            }

            let mut quantized_energy = energy::encode_coarse_energy(
                &mut enc,
                lm,
                intra,
                channels,
                band_range,
                &target_energy,
                &mut self.prev_energy,
            )?;

            let tf_decision = analysis::choose_tf(lm, transient);
            analysis::encode_tf(&mut enc, &tf_decision, transient)?;

            let spread = analysis::choose_spread(&deinterleaved[0]);
            analysis::encode_spread(&mut enc, spread)?;

            let trim = analysis::choose_trim(&deinterleaved[0], transient);
            analysis::encode_trim(&mut enc, trim)?;

            let loudness: Vec<f32> = (0..mode::MAX_BANDS)
                .map(|b| {
                    (0..channels)
                        .map(|c| target_energy[b * channels + c])
                        .fold(f32::NEG_INFINITY, f32::max)
                })
                .collect();

            let remaining_eighths = total_eighths.saturating_sub(enc.tell_frac());
            let alloc = allocator::allocate_encode(
                &mut enc,
                lm,
                stereo,
                band_range,
                remaining_eighths,
                trim,
                &loudness,
                stereo_params.intensity_band,
                stereo_params.dual_stereo,
            )?;

            energy::encode_fine_energy(
                &mut enc,
                channels,
                band_range,
                &alloc.fine_bits,
                &target_energy,
                &mut quantized_energy,
            )?;

            for (c, spectrum) in working_coeffs.iter().enumerate().take(channels) {
                // Above the intensity cutoff, the side channel contributes no shape bits
                // at all: its bins stay implicitly zero and the decoder reconstructs that
                // band as pure mid (mono).
                let channel_bands = if c == 1 && stereo && !alloc.dual_stereo {
                    mode::BandRange {
                        start: band_range.start,
                        end: alloc.intensity_band.max(band_range.start),
                    }
                } else {
                    band_range
                };

                let mut target_shape = vec![Vec::new(); mode::MAX_BANDS];
                for b in channel_bands.start..channel_bands.end {
                    let lo = usize::from(mode::EBANDS[b]) << lm;
                    let hi = (usize::from(mode::EBANDS[b + 1]) << lm).min(frame_size);
                    target_shape[b] = spectrum[lo..hi].to_vec();
                }
                let seed = self.seed.wrapping_add(c as u32).wrapping_mul(0x9E37_79B9);
                bands::encode_bands(
                    &mut enc,
                    channel_bands,
                    &widths,
                    &alloc.pulse_bits,
                    &target_shape,
                    seed,
                )?;
            }
            self.seed = self
                .seed
                .wrapping_mul(1_664_525)
                .wrapping_add(1_013_904_223);

            if transient && lm >= 2 {
                // Anti-collapse is a free, deterministic decoder-side reconstruction (see
                // `bands::apply_anti_collapse`), so this encoder always spends the bit to
                // enable it rather than picking a data-dependent policy for when it helps.
                enc.encode_bits(1, 1)?;
            }

            let leftover = total_bits.saturating_sub(enc.tell());
            energy::encode_energy_finalize(
                &mut enc,
                channels,
                band_range,
                &alloc.fine_bits,
                &alloc.fine_priority,
                leftover,
                &target_energy,
                &mut quantized_energy,
            )?;
        }

        self.final_range = enc.range();
        enc.done()?;
        Ok(enc.range_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(feature = "decoder")]
    use crate::celt::decoder::CeltDecoder;
    #[cfg(feature = "decoder")]
    use crate::SamplingRate;

    #[test]
    fn encode_fits_in_output_buffer() {
        let mut encoder = CeltEncoder::new(Channels::Mono).unwrap();
        let pcm: Vec<f32> = (0..960).map(|i| (i as f32 * 0.05).sin() * 0.4).collect();
        let mut output = vec![0u8; 100];
        let len = encoder.encode(&pcm, 960, &mut output).unwrap();
        assert!(len <= output.len());
        assert!(len > 0);
    }

    #[test]
    fn rejects_mismatched_input_length() {
        let mut encoder = CeltEncoder::new(Channels::Mono).unwrap();
        let pcm = vec![0.0f32; 100];
        let mut output = vec![0u8; 64];
        assert!(matches!(
            encoder.encode(&pcm, 960, &mut output),
            Err(CeltEncoderError::InvalidInputLength)
        ));
    }

    #[test]
    fn silence_encodes_to_a_single_bit_frame() {
        let mut encoder = CeltEncoder::new(Channels::Mono).unwrap();
        let pcm = vec![0.0f32; 480];
        let mut output = vec![0xFFu8; 64];
        let len = encoder.encode(&pcm, 480, &mut output).unwrap();
        assert!(len <= 2);
    }

    #[test]
    #[cfg(feature = "decoder")]
    fn round_trip_produces_finite_pcm_of_expected_length() {
        let mut encoder = CeltEncoder::new(Channels::Mono).unwrap();
        let mut decoder = CeltDecoder::new(SamplingRate::Hz48000, Channels::Mono).unwrap();

        let pcm: Vec<f32> = (0..960).map(|i| (i as f32 * 0.1).sin() * 0.3).collect();
        let mut output = vec![0u8; 200];
        let len = encoder.encode(&pcm, 960, &mut output).unwrap();

        let decoded = decoder.decode(&output[..len], 960).unwrap();
        assert_eq!(decoded.len(), 960);
        assert!(decoded.iter().all(|x| x.is_finite()));
    }

    #[test]
    #[cfg(feature = "decoder")]
    fn encoder_and_decoder_agree_on_final_range() {
        let mut encoder = CeltEncoder::new(Channels::Stereo).unwrap();
        let mut decoder = CeltDecoder::new(SamplingRate::Hz48000, Channels::Stereo).unwrap();

        let pcm: Vec<f32> = (0..480 * 2)
            .map(|i| (i as f32 * 0.07).sin() * 0.5)
            .collect();
        let mut output = vec![0u8; 200];
        let len = encoder.encode(&pcm, 480, &mut output).unwrap();
        decoder.decode(&output[..len], 480).unwrap();

        assert_eq!(encoder.final_range(), decoder.final_range());
    }

    #[test]
    #[cfg(feature = "decoder")]
    fn transient_stereo_round_trip_produces_finite_pcm() {
        let mut encoder = CeltEncoder::new(Channels::Stereo).unwrap();
        let mut decoder = CeltDecoder::new(SamplingRate::Hz48000, Channels::Stereo).unwrap();

        // A sudden onset partway through each channel, with mismatched L/R content so
        // dual-stereo and intensity decisions both get exercised across frames.
        let mut pcm = vec![0.0f32; 960 * 2];
        for i in 480..960 {
            pcm[i * 2] = ((i as f32) * 0.3).sin() * 0.8;
            pcm[i * 2 + 1] = ((i as f32) * 0.31).cos() * 0.2;
        }
        let mut output = vec![0u8; 400];
        let len = encoder.encode(&pcm, 960, &mut output).unwrap();

        let decoded = decoder.decode(&output[..len], 960).unwrap();
        assert_eq!(decoded.len(), 960 * 2);
        assert!(decoded.iter().all(|x| x.is_finite()));
    }
}
