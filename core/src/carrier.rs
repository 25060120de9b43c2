//! Carrier acquisition/loss tracking and the `### CARRIER`/`### NOCARRIER`
//! diagnostic reports emitted to the receive loop's report stream.

/// Tracks whether a carrier is currently considered present, and
/// accumulates the statistics `NOCARRIER` reports on loss.
#[derive(Debug, Clone, Default)]
pub struct CarrierState {
    acquired: bool,
    carrier_band: Option<u32>,
    carrier_nsamples: u64,
    confidence_total: f32,
    nframes_decoded: u32,
    noconfidence_run: u32,
}

impl CarrierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    pub fn carrier_band(&self) -> Option<u32> {
        self.carrier_band
    }

    /// Transitions into the acquired state. Resets the per-carrier
    /// accounting used for the eventual `NOCARRIER` report.
    pub fn acquire(&mut self, band: u32) {
        self.acquired = true;
        self.carrier_band = Some(band);
        self.carrier_nsamples = 0;
        self.confidence_total = 0.0;
        self.nframes_decoded = 0;
        self.noconfidence_run = 0;
    }

    /// Records one decoded frame's confidence and extends the carrier's
    /// elapsed sample count by one frame.
    pub fn accept_frame(&mut self, confidence: f32, frame_nsamples: u64) {
        self.carrier_nsamples += frame_nsamples;
        self.confidence_total += confidence;
        self.nframes_decoded += 1;
        self.noconfidence_run = 0;
    }

    /// Records a bit-cell region that failed to produce a usable frame.
    /// Returns `true` once `max_run` consecutive low-confidence regions
    /// have been seen, signaling the caller should declare carrier loss.
    pub fn note_low_confidence(&mut self, max_run: u32) -> bool {
        self.noconfidence_run += 1;
        self.noconfidence_run >= max_run
    }

    /// Average confidence over the carrier's lifetime so far (0.0 if no
    /// frames have been decoded yet).
    pub fn average_confidence(&self) -> f32 {
        if self.nframes_decoded == 0 {
            0.0
        } else {
            self.confidence_total / self.nframes_decoded as f32
        }
    }

    /// Ends the carrier, returning the accumulated stats for reporting,
    /// and resets to the idle state.
    fn release(&mut self) -> (Option<u32>, u32, f32, u64) {
        let band = self.carrier_band;
        let nframes = self.nframes_decoded;
        let avg_confidence = self.average_confidence();
        let nsamples = self.carrier_nsamples;
        *self = Self::default();
        (band, nframes, avg_confidence, nsamples)
    }

    /// Ends the carrier and formats the `### NOCARRIER` report line.
    ///
    /// `expected_bps` is the plan's nominal bit rate; `carrier_nsamples`
    /// (hence `elapsed_secs`) accumulates a full `n_frame_bits` (`D+2`,
    /// start+data+stop) per frame, so the measured throughput must use the
    /// same `n_frame_bits` multiplier as its numerator — `nframes *
    /// n_frame_bits / elapsed_seconds` — or the two would scale by
    /// different bit counts and the ratio would never settle on the
    /// configured rate. The trailing parenthetical reports how far that
    /// measured rate drifted from the expectation: `(rate perfect)` within
    /// 1%, otherwise `(P.P% slow)` / `(P.P% fast)`.
    pub fn release_report(&mut self, n_frame_bits: u8, sample_rate: u32, expected_bps: f32) -> String {
        let (_band, nframes, avg_confidence, nsamples) = self.release();

        let elapsed_secs = nsamples as f32 / sample_rate as f32;
        let measured_bps = if elapsed_secs > 0.0 {
            (nframes as f32 * n_frame_bits as f32) / elapsed_secs
        } else {
            0.0
        };

        let drift_pct = if expected_bps > 0.0 {
            (measured_bps - expected_bps) / expected_bps * 100.0
        } else {
            0.0
        };

        let drift_note = if drift_pct.abs() < 1.0 {
            "rate perfect".to_string()
        } else if drift_pct < 0.0 {
            format!("{:.1}% slow", -drift_pct)
        } else {
            format!("{:.1}% fast", drift_pct)
        };

        format!(
            "### NOCARRIER ndata={ndata} confidence={confidence:.3} throughput={bps:.1} ({note})",
            ndata = nframes,
            confidence = avg_confidence,
            bps = measured_bps,
            note = drift_note,
        )
    }
}

/// Formats the `### CARRIER` report for a newly acquired carrier.
pub fn format_carrier(bps: f32, band: u32, band_width: f32) -> String {
    format!("### CARRIER {bps} baud (band {band}, bandwidth {band_width} Hz)")
}
