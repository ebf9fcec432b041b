//! Implements the CELT decoder.
//!
//! Ties together the range decoder, energy/band quantizers, allocator, and synthesis
//! (inverse MDCT, postfilter, de-emphasis) into the per-frame pipeline described by
//! RFC 6716 §4.3's decode path.

use crate::celt::mdct;
use crate::celt::postfilter::{self, Postfilter};
use crate::celt::preemphasis::Deemphasis;
use crate::celt::{allocator, analysis, bands, energy, mode};
use crate::decoder_error::CeltDecoderError;
use crate::range_coder::{RangeDecoder, Tell};
use crate::{Channels, SamplingRate};

/// The CELT decoder.
///
/// Owns everything that must persist across frames: per-band energy history (for
/// coarse-energy prediction), the MDCT overlap-add tail, postfilter history, de-emphasis
/// state, and the folding/noise seed.
pub(crate) struct CeltDecoder {
    channels: usize,
    band_count: usize,
    prev_energy: Vec<f32>,
    overlap: Vec<Vec<f32>>,
    postfilter: Vec<Postfilter>,
    deemphasis: Vec<Deemphasis>,
    seed: u32,
    final_range: u32,
}

impl CeltDecoder {
    /// Creates a new CELT decoder.
    pub(crate) fn new(
        _sampling_rate: SamplingRate,
        channels: Channels,
    ) -> Result<Self, CeltDecoderError> {
        let n = channels as usize;
        Ok(Self {
            channels: n,
            band_count: mode::MAX_BANDS,
            prev_energy: vec![0.0; mode::MAX_BANDS * n],
            overlap: Vec::new(),
            postfilter: (0..n).map(|_| Postfilter::new()).collect(),
            deemphasis: vec![Deemphasis::new(); n],
            seed: 0,
            final_range: 0,
        })
    }

    /// Resets the CELT decoder to its just-created state.
    pub(crate) fn reset(&mut self) -> Result<(), CeltDecoderError> {
        let n = self.channels;
        self.prev_energy = vec![0.0; mode::MAX_BANDS * n];
        self.overlap = Vec::new();
        self.postfilter = (0..n).map(|_| Postfilter::new()).collect();
        self.deemphasis = vec![Deemphasis::new(); n];
        self.seed = 0;
        self.final_range = 0;
        Ok(())
    }

    /// Caps how many of the mode's bands decoding will use, mirroring a narrower
    /// bandwidth than the encoder's mode was built for.
    pub(crate) fn set_band_count(&mut self, band_count: usize) {
        self.band_count = band_count.min(mode::MAX_BANDS);
    }

    /// The range coder's range value as of the end of the last decoded frame. Matches the
    /// encoder's own `final_range()` for the same frame when nothing was corrupted in
    /// between.
    pub(crate) fn final_range(&self) -> u32 {
        self.final_range
    }

    /// Gets the pitch period (in samples) of the last decoded frame.
    pub(crate) fn pitch(&self) -> u32 {
        self.postfilter
            .first()
            .map(|p| p.period() as u32)
            .unwrap_or(0)
    }

    /// Decodes one CELT frame's payload into interleaved PCM.
    pub(crate) fn decode(
        &mut self,
        data: &[u8],
        frame_size: usize,
    ) -> Result<Vec<f32>, CeltDecoderError> {
        let lm = mode::frame_size_to_lm(frame_size).ok_or(CeltDecoderError::InvalidFrameSize)?;
        if data.is_empty() {
            return Err(CeltDecoderError::InvalidPacket);
        }
        let channels = self.channels;
        let stereo = channels == 2;
        let band_range = mode::BandRange::new(self.band_count);

        if self.overlap.len() != channels || self.overlap.first().map(Vec::len) != Some(frame_size)
        {
            self.overlap = vec![vec![0.0; frame_size]; channels];
        }

        let mut dec = RangeDecoder::new(data);
        let total_bits = (data.len() as u32) * 8;
        let total_eighths = total_bits << 3;

        let silence = dec.decode_bit_logp(15);
        let mut spectra = vec![vec![0.0f32; frame_size]; channels];
        let mut postfilter_params = None;
        let mut transient = false;
        let mut shorts = 1usize;
        let mut mid_side_coded = false;

        let widths: Vec<usize> = (0..mode::MAX_BANDS)
            .map(|b| usize::from(mode::FREQ_RANGE[b]) << lm)
            .collect();
        let offsets: Vec<usize> = (0..mode::MAX_BANDS)
            .map(|b| usize::from(mode::EBANDS[b]) << lm)
            .collect();

        if !silence {
            postfilter_params = postfilter::decode(&mut dec);
            transient = lm > 0 && dec.decode_bit_logp(3);
            shorts = if transient { 1usize << lm } else { 1usize };
            let intra = dec.decode_bit_logp(3);

            // Snapshot last frame's coarse energy before prediction overwrites it: the
            // anti-collapse reconstruction needs both this frame's and the previous
            // frame's band energy.
            let prev_energy_snapshot = self.prev_energy.clone();

            let mut energies = energy::decode_coarse_energy(
                &mut dec,
                lm,
                intra,
                channels,
                band_range,
                &mut self.prev_energy,
            );

            let tf = analysis::decode_tf(&mut dec, lm, transient);
            let _ = analysis::tf_resolution(lm, transient, &tf);
            let _spread = analysis::decode_spread(&mut dec);
            let trim = analysis::decode_trim(&mut dec);

            let remaining_eighths = total_eighths.saturating_sub(dec.tell_frac());
            let alloc = allocator::allocate_decode(&mut dec, lm, stereo, band_range, remaining_eighths, trim);
            mid_side_coded = stereo && !alloc.dual_stereo;

            energy::decode_fine_energy(&mut dec, channels, band_range, &alloc.fine_bits, &mut energies);

            for (c, spectrum) in spectra.iter_mut().enumerate().take(channels) {
                let channel_bands = if c == 1 && stereo && !alloc.dual_stereo {
                    mode::BandRange {
                        start: band_range.start,
                        end: alloc.intensity_band.max(band_range.start),
                    }
                } else {
                    band_range
                };

                let mut per_band_energy = vec![0.0f32; mode::MAX_BANDS];
                for b in band_range.start..band_range.end {
                    per_band_energy[b] = energies[b * channels + c];
                }
                let seed = self.seed.wrapping_add(c as u32).wrapping_mul(0x9E37_79B9);
                let (shapes, _collapse) = bands::decode_bands(
                    &mut dec,
                    channel_bands,
                    &widths,
                    &alloc.pulse_bits,
                    &per_band_energy,
                    seed,
                );
                for b in channel_bands.start..channel_bands.end {
                    let lo = usize::from(mode::EBANDS[b]) << lm;
                    let hi = (usize::from(mode::EBANDS[b + 1]) << lm).min(frame_size);
                    let width = hi.saturating_sub(lo).min(shapes[b].len());
                    if width > 0 {
                        spectrum[lo..lo + width].copy_from_slice(&shapes[b][..width]);
                    }
                }
            }
            self.seed = self
                .seed
                .wrapping_mul(1_664_525)
                .wrapping_add(1_013_904_223);

            if transient && lm >= 2 {
                let anti_collapse = dec.decode_bits(1) != 0;
                if anti_collapse {
                    for (c, spectrum) in spectra.iter_mut().enumerate().take(channels) {
                        let cur_energy: Vec<f32> = (0..mode::MAX_BANDS)
                            .map(|b| energies[b * channels + c])
                            .collect();
                        let prev_energy: Vec<f32> = (0..mode::MAX_BANDS)
                            .map(|b| prev_energy_snapshot[b * channels + c])
                            .collect();
                        let seed = self
                            .seed
                            .wrapping_add(c as u32)
                            .wrapping_mul(0x5bd1_e995);
                        bands::apply_anti_collapse(
                            spectrum,
                            band_range,
                            &widths,
                            &offsets,
                            shorts,
                            &cur_energy,
                            &prev_energy,
                            seed,
                        );
                    }
                }
            }

            let leftover = total_bits.saturating_sub(dec.tell());
            energy::decode_energy_finalize(
                &mut dec,
                channels,
                band_range,
                &alloc.fine_bits,
                &alloc.fine_priority,
                leftover,
                &mut energies,
            );
        }

        self.final_range = dec.range();

        let mut output = vec![0.0f32; frame_size * channels];

        let mut time_domain = vec![vec![0.0f32; frame_size]; channels];
        for c in 0..channels {
            mdct::inverse_frame(
                frame_size,
                shorts,
                &spectra[c],
                &mut self.overlap[c],
                &mut time_domain[c],
            );
        }

        // `spectra`/`time_domain` hold mid/side-domain signal whenever stereo coupling was
        // used (see `analysis::choose_stereo_params`/`allocator::allocate_decode`'s
        // `dual_stereo` decision). Undo that combination here, in the time domain
        // (equivalent to undoing it before the IMDCT, since the IMDCT is linear and applied
        // independently per channel) so the postfilter/de-emphasis below run on the actual
        // left/right signal rather than mid/side.
        if stereo && mid_side_coded {
            let inv_sqrt2 = std::f32::consts::FRAC_1_SQRT_2;
            for i in 0..frame_size {
                let mid = time_domain[0][i];
                let side = time_domain[1][i];
                time_domain[0][i] = (mid + side) * inv_sqrt2;
                time_domain[1][i] = (mid - side) * inv_sqrt2;
            }
        }

        for c in 0..channels {
            if let Some(params) = postfilter_params {
                self.postfilter[c].apply(&mut time_domain[c], params, mode::OVERLAP.min(frame_size));
            }
            self.deemphasis[c].apply(&mut time_domain[c]);
            for (i, &s) in time_domain[c].iter().enumerate() {
                output[i * channels + c] = s;
            }
        }

        Ok(output)
    }
}
