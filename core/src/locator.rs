//! Frame locator: searches a candidate region of the sample buffer at
//! sub-bit granularity for the best-scoring start+data+stop frame.

use crate::plan::FskPlan;
use crate::tone::ToneAnalyzer;

/// A transient located frame: bits packed LSB-first with framing bits
/// retained (prev_stop at bit 0, start at bit 1, stop at bit `F-1`),
/// a confidence score, and the sample offset of its leading boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCandidate {
    pub bits: u16,
    pub confidence: f32,
    pub start_sample: usize,
}

/// Central analysis window for bit cell `cell_start..cell_start+nsamples_per_bit`,
/// sized to the analyzer's `fftsize` and centered within the cell. Returns
/// `None` if the window would run off either end of `buf`.
fn bit_window(
    buf_len: usize,
    cell_start: usize,
    nsamples_per_bit: usize,
    fftsize: usize,
) -> Option<(usize, usize)> {
    let offset = (nsamples_per_bit as isize - fftsize as isize) / 2;
    let window_start = cell_start as isize + offset;
    if window_start < 0 {
        return None;
    }
    let window_start = window_start as usize;
    if window_start + fftsize > buf_len {
        return None;
    }
    Some((window_start, fftsize))
}

/// Classifies and scores the frame candidate beginning at `s`, validating
/// start/stop framing. Returns `None` if framing fails or the buffer runs
/// short.
fn score_candidate(
    plan: &FskPlan,
    analyzer: &ToneAnalyzer,
    buf: &[f32],
    s: usize,
    nsamples_per_bit: usize,
) -> Option<FrameCandidate> {
    let n_frame_bits = plan.n_frame_bits() as usize;
    let n_data_bits = plan.n_data_bits() as usize;

    let mut bits: u16 = 0;
    let mut confidence_sum = 0.0f32;

    for i in 0..n_frame_bits {
        let cell_start = s + i * nsamples_per_bit;
        let (window_start, window_len) =
            bit_window(buf.len(), cell_start, nsamples_per_bit, analyzer.fftsize())?;
        let window = &buf[window_start..window_start + window_len];
        let (mark_mag, space_mag) = analyzer.analyze(window, plan.b_mark(), plan.b_space()).ok()?;

        let bit = mark_mag > space_mag;
        if bit {
            bits |= 1 << i;
        }

        // Framing validation: bit 0 = prev_stop (1), bit 1 = start (0),
        // bit F-1 = stop (1).
        if i == 0 && !bit {
            return None;
        }
        if i == 1 && bit {
            return None;
        }
        if i == n_frame_bits - 1 && !bit {
            return None;
        }

        // Data bits are indices 2..F-1.
        if i >= 2 && i < n_frame_bits - 1 {
            let denom = mark_mag + space_mag;
            if denom > 0.0 {
                confidence_sum += (mark_mag - space_mag).abs() / denom;
            }
        }
    }

    let confidence = confidence_sum / n_data_bits as f32;

    Some(FrameCandidate {
        bits,
        confidence,
        start_sample: s,
    })
}

/// Searches `{first_sample, first_sample+step, ...}` within `max_try` for
/// the best-scoring frame, returning the maximum-confidence candidate
/// (ties resolve to the earliest offset since later equal scores never
/// displace an existing best). Early-exits the moment a candidate reaches
/// `search_limit` (`None` forces an exhaustive search).
pub fn find_frame(
    plan: &FskPlan,
    analyzer: &ToneAnalyzer,
    buf: &[f32],
    nsamples_per_bit: usize,
    first_sample: usize,
    max_try: usize,
    step: usize,
    search_limit: Option<f32>,
) -> Option<FrameCandidate> {
    let step = if step == 0 { 1 } else { step };
    let frame_nsamples = nsamples_per_bit * plan.n_frame_bits() as usize;

    let max_try = if buf.len() >= frame_nsamples {
        max_try.min(buf.len() - frame_nsamples)
    } else {
        0
    };

    let mut best: Option<FrameCandidate> = None;
    let mut s = first_sample;
    while s <= first_sample + max_try {
        if let Some(candidate) = score_candidate(plan, analyzer, buf, s, nsamples_per_bit) {
            let improves = best.map(|b| candidate.confidence > b.confidence).unwrap_or(true);
            if improves {
                best = Some(candidate);
            }
            if let Some(limit) = search_limit {
                if candidate.confidence >= limit {
                    return best;
                }
            }
        }
        s += step;
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn plan_8bit() -> FskPlan {
        FskPlan::new(48000, 1270.0, 1070.0, 200.0, 8).unwrap()
    }

    /// Synthesizes a clean start+8 data bits+stop frame (with a leading
    /// prev_stop mark bit) at the given bit rate, LSB-first in `byte`.
    fn synth_frame(plan: &FskPlan, byte: u8, nsamples_per_bit: usize) -> Vec<f32> {
        let mut bits = vec![true]; // prev_stop
        bits.push(false); // start
        for i in 0..8 {
            bits.push((byte >> i) & 1 == 1);
        }
        bits.push(true); // stop

        let mut samples = Vec::new();
        for bit in bits {
            let freq_hz = if bit { plan.mark_hz() } else { plan.space_hz() };
            let omega = 2.0 * PI * freq_hz / plan.sample_rate() as f32;
            for n in 0..nsamples_per_bit {
                samples.push((omega * n as f32).sin());
            }
        }
        samples
    }

    #[test]
    fn find_frame_locates_clean_frame_at_offset_zero() {
        let plan = plan_8bit();
        let analyzer = ToneAnalyzer::new(plan.fftsize());
        let nsamples_per_bit = 48000 / 300;
        let samples = synth_frame(&plan, 0b0110_0001, nsamples_per_bit);

        let candidate = find_frame(
            &plan,
            &analyzer,
            &samples,
            nsamples_per_bit,
            0,
            nsamples_per_bit,
            1,
            None,
        )
        .expect("frame should be found");

        assert_eq!(candidate.start_sample, 0);
        let data = (candidate.bits >> 2) & plan.data_mask();
        assert_eq!(data as u8, 0b0110_0001);
        assert!(candidate.confidence > 0.5);
    }

    #[test]
    fn find_frame_rejects_all_silence() {
        let plan = plan_8bit();
        let analyzer = ToneAnalyzer::new(plan.fftsize());
        let nsamples_per_bit = 48000 / 300;
        let frame_nsamples = nsamples_per_bit * plan.n_frame_bits() as usize;
        let samples = vec![0.0f32; frame_nsamples + nsamples_per_bit];

        let candidate = find_frame(
            &plan,
            &analyzer,
            &samples,
            nsamples_per_bit,
            0,
            nsamples_per_bit,
            1,
            None,
        );
        assert!(candidate.is_none());
    }

    #[test]
    fn find_frame_locates_frame_at_sub_bit_offset() {
        let plan = plan_8bit();
        let analyzer = ToneAnalyzer::new(plan.fftsize());
        let nsamples_per_bit = 48000 / 300;
        let true_offset = nsamples_per_bit / 3;

        let mut samples = vec![0.0f32; true_offset];
        samples.extend(synth_frame(&plan, 0xA5, nsamples_per_bit));

        let candidate = find_frame(
            &plan,
            &analyzer,
            &samples,
            nsamples_per_bit,
            0,
            nsamples_per_bit,
            1,
            None,
        )
        .expect("frame should be found despite sub-bit offset");

        // Should land close to the true offset (exact hit isn't guaranteed
        // at arbitrary offsets, but it should be within one search step).
        assert!(
            (candidate.start_sample as isize - true_offset as isize).abs() <= 1,
            "start_sample={} true_offset={}",
            candidate.start_sample,
            true_offset
        );
        let data = (candidate.bits >> 2) & plan.data_mask();
        assert_eq!(data as u8, 0xA5);
    }

    #[test]
    fn find_frame_early_exits_on_search_limit() {
        let plan = plan_8bit();
        let analyzer = ToneAnalyzer::new(plan.fftsize());
        let nsamples_per_bit = 48000 / 300;
        let samples = synth_frame(&plan, 0xFF, nsamples_per_bit);

        // A clean noiseless frame has near-maximal confidence, so even a
        // modest limit should trigger early exit at the first valid s.
        let candidate = find_frame(
            &plan,
            &analyzer,
            &samples,
            nsamples_per_bit,
            0,
            nsamples_per_bit,
            1,
            Some(0.5),
        )
        .expect("frame should be found");
        assert_eq!(candidate.start_sample, 0);
    }

    #[test]
    fn find_frame_step_zero_treated_as_one() {
        let plan = plan_8bit();
        let analyzer = ToneAnalyzer::new(plan.fftsize());
        let nsamples_per_bit = 48000 / 300;
        let samples = synth_frame(&plan, 0x3C, nsamples_per_bit);

        let candidate = find_frame(
            &plan,
            &analyzer,
            &samples,
            nsamples_per_bit,
            0,
            nsamples_per_bit,
            0,
            None,
        );
        assert!(candidate.is_some());
    }

    #[test]
    fn find_frame_clamps_max_try_beyond_buffer() {
        let plan = plan_8bit();
        let analyzer = ToneAnalyzer::new(plan.fftsize());
        let nsamples_per_bit = 48000 / 300;
        let samples = synth_frame(&plan, 0x01, nsamples_per_bit);

        // max_try far beyond what the buffer can support should not panic
        // and should still locate the frame at offset 0.
        let candidate = find_frame(
            &plan,
            &analyzer,
            &samples,
            nsamples_per_bit,
            0,
            samples.len() * 10,
            1,
            None,
        );
        assert_eq!(candidate.unwrap().start_sample, 0);
    }
}
