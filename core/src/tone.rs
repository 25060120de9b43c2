//! Single-bin DFT (Goertzel) tone analysis.
//!
//! The analyzer never normalizes: magnitudes scale with signal energy,
//! and every caller (frame locator, carrier detector) works with magnitude
//! *ratios*, not absolute levels.

use crate::error::{ModemError, Result};
use std::f32::consts::PI;

/// Precomputed Hann window of the plan's `fftsize`, shared by every
/// Goertzel evaluation so each bit-cell classification only pays for the
/// recurrence itself.
///
/// A rectangular window's slow sidelobe rolloff leaks adjacent-band
/// energy into the bin being tested, which matters most exactly when
/// mark/space sit close together (e.g. Bell 103's 200 Hz shift). Hann
/// costs one extra multiply per sample and removes that leakage.
fn hann_window(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    let n = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n).cos())
        .collect()
}

/// Analyzes fixed-length sample windows for the energy present at
/// specific DFT bins ("bands" in the plan's vocabulary).
pub struct ToneAnalyzer {
    fftsize: usize,
    window: Vec<f32>,
}

impl ToneAnalyzer {
    pub fn new(fftsize: usize) -> Self {
        Self {
            fftsize,
            window: hann_window(fftsize),
        }
    }

    pub fn fftsize(&self) -> usize {
        self.fftsize
    }

    /// Goertzel magnitude at DFT bin `bin` over `samples` (must be
    /// `fftsize` long).
    fn goertzel_magnitude(&self, samples: &[f32], bin: u32) -> f32 {
        let n = self.fftsize as f32;
        let omega = 2.0 * PI * bin as f32 / n;
        let coeff = 2.0 * omega.cos();

        let mut q1 = 0.0f32;
        let mut q2 = 0.0f32;
        for (sample, &w) in samples.iter().zip(self.window.iter()) {
            let q0 = coeff * q1 - q2 + sample * w;
            q2 = q1;
            q1 = q0;
        }

        let real = q1 - q2 * omega.cos();
        let imag = q2 * omega.sin();
        (real * real + imag * imag).sqrt()
    }

    /// `analyze(samples, mark_band, space_band) -> (mark_mag, space_mag)`.
    ///
    /// `samples.len()` must equal `fftsize`.
    pub fn analyze(&self, samples: &[f32], mark_band: u32, space_band: u32) -> Result<(f32, f32)> {
        if samples.len() != self.fftsize {
            return Err(ModemError::WindowLengthMismatch {
                expected: self.fftsize,
                got: samples.len(),
            });
        }
        let mark_mag = self.goertzel_magnitude(samples, mark_band);
        let space_mag = self.goertzel_magnitude(samples, space_band);
        Ok((mark_mag, space_mag))
    }

    /// Full-spectrum magnitude per bin, bins `1..fftsize/2` (DC and the
    /// Nyquist bin itself carry no usable tone energy for this engine).
    pub fn magnitude_spectrum(&self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.len() != self.fftsize {
            return Err(ModemError::WindowLengthMismatch {
                expected: self.fftsize,
                got: samples.len(),
            });
        }
        let nyquist_bin = (self.fftsize / 2) as u32;
        Ok((1..nyquist_bin)
            .map(|bin| self.goertzel_magnitude(samples, bin))
            .collect())
    }
}
