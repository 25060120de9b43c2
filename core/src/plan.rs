//! The immutable FSK plan: sample rate, band geometry, frame shape.

use crate::error::{ModemError, Result};
use crate::tone::ToneAnalyzer;

fn next_pow2(x: usize) -> usize {
    if x <= 1 {
        return 1;
    }
    let mut p = 1usize;
    while p < x {
        p <<= 1;
    }
    p
}

fn round_to_band(freq_hz: f32, band_width: f32) -> u32 {
    (freq_hz / band_width).round().max(0.0) as u32
}

/// Binds a session's sample rate, tone frequencies, frame shape, and DFT
/// size together. Immutable except for [`FskPlan::set_tones_by_bandshift`],
/// which is only valid before any `find_frame` result has been committed.
#[derive(Debug, Clone)]
pub struct FskPlan {
    sample_rate: u32,
    band_width: f32,
    b_mark: u32,
    b_space: u32,
    n_data_bits: u8,
    fftsize: usize,
}

impl FskPlan {
    /// Rounds `mark_hz`/`space_hz` to the nearest multiple of `band_width`
    /// to obtain `b_mark`/`b_space`; computes `fftsize` as the smallest
    /// power of two `>= sample_rate / band_width`.
    pub fn new(
        sample_rate: u32,
        mark_hz: f32,
        space_hz: f32,
        band_width: f32,
        n_data_bits: u8,
    ) -> Result<Self> {
        if band_width <= 0.0 {
            return Err(ModemError::InvalidBandwidth(band_width));
        }
        if n_data_bits != 5 && n_data_bits != 8 {
            return Err(ModemError::InvalidDataBits(n_data_bits));
        }

        let b_mark = round_to_band(mark_hz, band_width);
        let b_space = round_to_band(space_hz, band_width);
        if b_mark == b_space {
            return Err(ModemError::BandsCoincide(b_mark));
        }

        let nyquist = sample_rate as f32 / 2.0;
        for (band, hz) in [(b_mark, mark_hz), (b_space, space_hz)] {
            if hz >= nyquist {
                return Err(ModemError::BandExceedsNyquist {
                    band,
                    freq_hz: hz,
                    sample_rate,
                });
            }
        }

        let fftsize = next_pow2((sample_rate as f32 / band_width).ceil() as usize);

        Ok(Self {
            sample_rate,
            band_width,
            b_mark,
            b_space,
            n_data_bits,
            fftsize,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn band_width(&self) -> f32 {
        self.band_width
    }

    pub fn b_mark(&self) -> u32 {
        self.b_mark
    }

    pub fn b_space(&self) -> u32 {
        self.b_space
    }

    pub fn n_data_bits(&self) -> u8 {
        self.n_data_bits
    }

    /// `F = D + 2`: prev_stop + start + D data bits (the trailing stop is
    /// implied by the next frame's prev_stop).
    pub fn n_frame_bits(&self) -> u8 {
        self.n_data_bits + 2
    }

    pub fn fftsize(&self) -> usize {
        self.fftsize
    }

    pub fn data_mask(&self) -> u16 {
        (1u16 << self.n_data_bits) - 1
    }

    pub fn mark_hz(&self) -> f32 {
        self.b_mark as f32 * self.band_width
    }

    pub fn space_hz(&self) -> f32 {
        self.b_space as f32 * self.band_width
    }

    /// Full-spectrum scan over exactly `fftsize` samples; returns the
    /// strongest band whose magnitude exceeds `threshold * mean_magnitude`,
    /// or `None`.
    pub fn detect_carrier(&self, samples: &[f32], threshold: f32) -> Result<Option<u32>> {
        let analyzer = ToneAnalyzer::new(self.fftsize);
        let spectrum = analyzer.magnitude_spectrum(samples)?;
        if spectrum.is_empty() {
            return Ok(None);
        }

        let mean: f32 = spectrum.iter().sum::<f32>() / spectrum.len() as f32;
        let (peak_idx, &peak_mag) = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();

        if peak_mag > threshold * mean {
            // spectrum[0] corresponds to bin 1 (magnitude_spectrum skips DC).
            Ok(Some(peak_idx as u32 + 1))
        } else {
            Ok(None)
        }
    }

    /// Rebinds mark to `b_mark`, space to `b_mark + b_shift`. `b_shift` is
    /// signed (the reference auto-carrier logic always computes a negative
    /// shift; whether inverted spectra should ever produce a positive one
    /// is left open per spec.md §9 and not exercised by this engine).
    pub fn set_tones_by_bandshift(&mut self, b_mark: u32, b_shift: i32) -> Result<()> {
        let b_space = b_mark as i64 + b_shift as i64;
        if b_space < 1 {
            return Err(ModemError::AutoCarrierBandUnderflow { b_mark, b_shift });
        }
        self.b_mark = b_mark;
        self.b_space = b_space as u32;
        Ok(())
    }
}
