//! The receive loop: owns the sliding sample buffer, drives carrier
//! acquisition, and decodes accepted frames through a framebits codec.

use std::io::Write;

use crate::audio::AudioSource;
use crate::baudot::FramebitsCodec;
use crate::carrier::{format_carrier, CarrierState};
use crate::error::{ModemError, Result};
use crate::locator::{find_frame, FrameCandidate};
use crate::plan::FskPlan;
use crate::tone::ToneAnalyzer;
use crate::MAX_NOCONFIDENCE_BITS;

/// Options controlling a single receive session, independent of the plan
/// itself (mirrors the CLI flags that affect the loop rather than the
/// tone geometry).
#[derive(Debug, Clone)]
pub struct ReceiveOptions {
    pub confidence_threshold: f32,
    pub search_limit: f32,
    pub auto_carrier: bool,
    pub auto_carrier_threshold: f32,
    pub quiet: bool,
    pub data_rate_bps: f32,
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: crate::DEFAULT_CONFIDENCE_THRESHOLD,
            search_limit: crate::DEFAULT_SEARCH_LIMIT,
            auto_carrier: false,
            auto_carrier_threshold: crate::AUTO_CARRIER_THRESHOLD,
            quiet: false,
            data_rate_bps: 300.0,
        }
    }
}

/// Tallies returned once a receive session runs to EOF.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReceiveStats {
    pub bytes_decoded: usize,
    pub frames_decoded: u32,
}

/// The sliding sample buffer the main loop shifts and refills each
/// iteration. `n_valid` leading samples are live; everything past that is
/// stale.
struct SampleBuffer {
    data: Vec<f32>,
    n_valid: usize,
}

impl SampleBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity],
            n_valid: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Shifts the first `advance` samples out, compacting the remainder
    /// to the front. `advance` must not exceed `n_valid`.
    fn shift(&mut self, advance: usize) -> Result<()> {
        if advance > self.n_valid {
            return Err(ModemError::BufferUnderflow {
                advance,
                n_valid: self.n_valid,
            });
        }
        if advance == 0 {
            return Ok(());
        }
        self.data.copy_within(advance..self.n_valid, 0);
        self.n_valid -= advance;
        Ok(())
    }

    /// Reads as much as the source offers into the free tail of the
    /// buffer, returning the number of samples read (0 = EOF).
    fn fill(&mut self, source: &mut impl AudioSource) -> Result<usize> {
        let capacity = self.capacity();
        let n_read = source.read(&mut self.data[self.n_valid..capacity])?;
        self.n_valid += n_read;
        Ok(n_read)
    }

    fn live(&self) -> &[f32] {
        &self.data[..self.n_valid]
    }
}

/// Drives the demodulation main loop described in the system overview:
/// shift, fill, optionally auto-detect carrier, locate a frame, evaluate
/// its confidence, accept or reject it, advance, decode.
pub struct ReceiveLoop {
    plan: FskPlan,
    options: ReceiveOptions,
    analyzer: ToneAnalyzer,
    carrier: CarrierState,
    nsamples_per_bit: usize,
    nsamples_overscan: usize,
    /// `b_space - b_mark` at construction time, preserved across
    /// auto-carrier rebinding so the configured tone spacing survives
    /// even though the absolute bands move.
    configured_b_shift: i32,
}

impl ReceiveLoop {
    pub fn new(plan: FskPlan, options: ReceiveOptions) -> Result<Self> {
        let nsamples_per_bit = (plan.sample_rate() as f32 / options.data_rate_bps).ceil() as usize;
        let nsamples_overscan = ((nsamples_per_bit as f32 * 0.5).round() as usize).max(1);
        let analyzer = ToneAnalyzer::new(plan.fftsize());
        let configured_b_shift = plan.b_space() as i32 - plan.b_mark() as i32;

        Ok(Self {
            plan,
            options,
            analyzer,
            carrier: CarrierState::new(),
            nsamples_per_bit,
            nsamples_overscan,
            configured_b_shift,
        })
    }

    fn buffer_capacity(&self) -> usize {
        self.nsamples_per_bit * (self.plan.n_frame_bits() as usize + 2)
    }

    /// Runs until the source signals EOF, writing decoded bytes to `out`
    /// (non-printable, non-whitespace bytes rendered as `.`) and
    /// CARRIER/NOCARRIER report lines to `report` (suppressed entirely
    /// under `quiet`).
    pub fn run(
        &mut self,
        source: &mut impl AudioSource,
        codec: &mut impl FramebitsCodec,
        out: &mut impl Write,
        report: &mut impl Write,
    ) -> Result<ReceiveStats> {
        let mut buf = SampleBuffer::new(self.buffer_capacity());
        let mut advance = 0usize;
        let mut stats = ReceiveStats::default();

        loop {
            buf.shift(advance)?;

            let n_read = buf.fill(source)?;
            if n_read == 0 && buf.n_valid < self.nsamples_per_bit * self.plan.n_frame_bits() as usize {
                // Not enough data left to ever form a frame: clean EOF.
                break;
            }

            if self.options.auto_carrier && self.carrier.carrier_band().is_none() {
                if let Some((band, scanned)) = self.try_auto_carrier(buf.live())? {
                    if self.plan.set_tones_by_bandshift(band, self.configured_b_shift).is_err() {
                        advance = scanned;
                        continue;
                    }
                } else {
                    advance = scanned_fallback(self.nsamples_per_bit, self.analyzer.fftsize());
                    continue;
                }
            }

            let try_max = self.nsamples_per_bit + self.nsamples_overscan;
            let try_step = (self.nsamples_per_bit / 10).max(1);
            let (first_sample, search_limit) = if self.carrier.is_acquired() {
                (self.nsamples_overscan, Some(self.options.search_limit))
            } else {
                (0, None)
            };

            let candidate = find_frame(
                &self.plan,
                &self.analyzer,
                buf.live(),
                self.nsamples_per_bit,
                first_sample,
                try_max,
                try_step,
                search_limit,
            );

            let frame_nsamples = self.nsamples_per_bit as u64 * self.plan.n_frame_bits() as u64;

            let candidate = match candidate {
                Some(c) if c.confidence > self.options.confidence_threshold => c,
                _ => {
                    let lost = self.carrier.note_low_confidence(MAX_NOCONFIDENCE_BITS);
                    if lost && self.carrier.is_acquired() {
                        let line = self.carrier.release_report(
                            self.plan.n_frame_bits(),
                            self.plan.sample_rate(),
                            self.options.data_rate_bps,
                        );
                        if !self.options.quiet {
                            writeln!(report, "{line}")?;
                        }
                    }
                    advance = try_max;
                    continue;
                }
            };

            self.accept_frame(&candidate, frame_nsamples, report)?;
            stats.frames_decoded += 1;

            let data = (candidate.bits >> 2) & self.plan.data_mask();
            let mut decoded = Vec::new();
            codec.decode(data, &mut decoded);
            stats.bytes_decoded += decoded.len();
            out.write_all(&decoded)?;

            advance = candidate.start_sample + self.nsamples_per_bit * self.plan.n_frame_bits() as usize
                - self.nsamples_overscan;
        }

        if self.carrier.is_acquired() {
            let line = self.carrier.release_report(
                self.plan.n_frame_bits(),
                self.plan.sample_rate(),
                self.options.data_rate_bps,
            );
            if !self.options.quiet {
                writeln!(report, "{line}")?;
            }
        }

        Ok(stats)
    }

    fn accept_frame(
        &mut self,
        candidate: &FrameCandidate,
        frame_nsamples: u64,
        report: &mut impl Write,
    ) -> Result<()> {
        if !self.carrier.is_acquired() {
            self.carrier.acquire(self.plan.b_mark());
            if !self.options.quiet {
                let line = format_carrier(self.options.data_rate_bps, self.plan.b_mark(), self.plan.band_width());
                writeln!(report, "{line}")?;
            }
        }
        self.carrier.accept_frame(candidate.confidence, frame_nsamples);
        Ok(())
    }

    /// Scans non-overlapping windows for a strong carrier band. Returns
    /// `(band, samples_scanned)` on a hit.
    fn try_auto_carrier(&self, buf: &[f32]) -> Result<Option<(u32, usize)>> {
        let window = self.nsamples_per_bit.min(self.analyzer.fftsize());
        if window == 0 || buf.len() < self.analyzer.fftsize() {
            return Ok(None);
        }
        let mut offset = 0;
        while offset + self.analyzer.fftsize() <= buf.len() {
            let slice = &buf[offset..offset + self.analyzer.fftsize()];
            if let Some(band) = self
                .plan
                .detect_carrier(slice, self.options.auto_carrier_threshold)?
            {
                return Ok(Some((band, offset + window)));
            }
            offset += window;
        }
        Ok(None)
    }
}

fn scanned_fallback(nsamples_per_bit: usize, fftsize: usize) -> usize {
    nsamples_per_bit.min(fftsize).max(1)
}
