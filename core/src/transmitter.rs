//! Transmit path: sine-tone synthesis and the blocking byte-to-tones
//! loop. Shares the framebits codec with the receive path, emits
//! directly through an `AudioSink`.

use std::io::Read;

use crate::audio::AudioSink;
use crate::baudot::FramebitsCodec;
use crate::error::Result;
use crate::plan::FskPlan;

use std::f32::consts::PI;

const TX_LEADER_BITS: u32 = 2;
const TX_TRAILER_BITS: u32 = 2;
const TRAILING_SILENCE_SECS: f32 = 0.5;

/// Synthesizes two-tone audio with phase continuity across tone
/// switches, optionally via a precomputed sine lookup table.
struct ToneSynth {
    sample_rate: u32,
    lut: Vec<f32>,
    phase: f32,
}

impl ToneSynth {
    fn new(sample_rate: u32, lut_len: usize) -> Self {
        let lut = if lut_len == 0 {
            Vec::new()
        } else {
            (0..lut_len)
                .map(|i| (2.0 * PI * i as f32 / lut_len as f32).sin())
                .collect()
        };
        Self {
            sample_rate,
            lut,
            phase: 0.0,
        }
    }

    fn sample_at_phase(&self, phase: f32) -> f32 {
        if self.lut.is_empty() {
            phase.sin()
        } else {
            let len = self.lut.len() as f32;
            let idx = ((phase / (2.0 * PI)).rem_euclid(1.0) * len) as usize;
            self.lut[idx.min(self.lut.len() - 1)]
        }
    }

    /// Appends `n` samples of a `freq_hz` tone to `out`, carrying phase
    /// forward so the next call (possibly at a different frequency)
    /// starts exactly where this one ended.
    fn emit_tone(&mut self, freq_hz: f32, n: usize, out: &mut Vec<f32>) {
        let step = 2.0 * PI * freq_hz / self.sample_rate as f32;
        for _ in 0..n {
            out.push(self.sample_at_phase(self.phase));
            self.phase = (self.phase + step).rem_euclid(2.0 * PI);
        }
    }
}

/// Options controlling a transmit session, independent of the plan's
/// tone geometry.
#[derive(Debug, Clone)]
pub struct TransmitOptions {
    pub data_rate_bps: f32,
    pub tx_stopbits: f32,
    pub lut_len: usize,
    /// Idle-timer-driven trailer flush, used only by the live-device
    /// backend reading from an interactive terminal.
    pub interactive: bool,
}

impl Default for TransmitOptions {
    fn default() -> Self {
        Self {
            data_rate_bps: 300.0,
            tx_stopbits: 1.0,
            lut_len: crate::DEFAULT_LUT_LEN,
            interactive: false,
        }
    }
}

/// Drives the byte-to-tones transmit loop described in the system
/// overview. Generic over the user input stream and the audio sink so
/// tests can run entirely in memory.
pub struct TransmitLoop<C: FramebitsCodec> {
    plan: FskPlan,
    codec: C,
    options: TransmitOptions,
    synth: ToneSynth,
    nsamples_per_bit: usize,
}

impl<C: FramebitsCodec> TransmitLoop<C> {
    pub fn new(plan: FskPlan, codec: C, options: TransmitOptions) -> Self {
        let nsamples_per_bit = (plan.sample_rate() as f32 / options.data_rate_bps).round() as usize;
        let synth = ToneSynth::new(plan.sample_rate(), options.lut_len);
        Self {
            plan,
            codec,
            options,
            synth,
            nsamples_per_bit,
        }
    }

    fn emit_bit(&mut self, mark: bool, n: usize, out: &mut Vec<f32>) {
        let freq_hz = if mark { self.plan.mark_hz() } else { self.plan.space_hz() };
        self.synth.emit_tone(freq_hz, n, out);
    }

    fn emit_mark_bits(&mut self, count: f32, out: &mut Vec<f32>) {
        let n = (count * self.nsamples_per_bit as f32).round() as usize;
        self.emit_bit(true, n, out);
    }

    fn emit_word(&mut self, word: u16, out: &mut Vec<f32>) {
        // Start bit.
        self.emit_bit(false, self.nsamples_per_bit, out);
        // Data bits, LSB first.
        let d = self.plan.n_data_bits();
        for i in 0..d {
            let mark = (word >> i) & 1 == 1;
            self.emit_bit(mark, self.nsamples_per_bit, out);
        }
        // Stop bits (may be fractional).
        self.emit_mark_bits(self.options.tx_stopbits, out);
    }

    fn emit_trailer_and_silence(&mut self, out: &mut Vec<f32>) {
        self.emit_mark_bits(TX_TRAILER_BITS as f32, out);
        let n_silence = (TRAILING_SILENCE_SECS * self.plan.sample_rate() as f32) as usize;
        out.extend(std::iter::repeat(0.0f32).take(n_silence));
    }

    /// Runs the loop to EOF on `input`, writing synthesized samples to
    /// `sink`. Batches each byte's tones into a scratch buffer before a
    /// single `sink.write` call.
    pub fn run(&mut self, input: &mut impl Read, sink: &mut impl AudioSink) -> Result<()> {
        let mut byte_buf = [0u8; 1];
        let mut idle = true;
        let mut scratch = Vec::new();

        loop {
            let n = input.read(&mut byte_buf)?;
            if n == 0 {
                break;
            }

            scratch.clear();
            if idle {
                self.emit_mark_bits(TX_LEADER_BITS as f32, &mut scratch);
                idle = false;
            }

            let words = self.codec.encode(byte_buf[0]);
            for &word in words.as_slice() {
                self.emit_word(word, &mut scratch);
            }

            sink.write(&scratch)?;

            // Interactive sessions read one blocking byte per keystroke,
            // so the gap before the next `read()` call already stands in
            // for the idle timer: flush the trailer now rather than wait
            // for a signal that a blocking `read` can't observe.
            if self.options.interactive {
                scratch.clear();
                self.emit_trailer_and_silence(&mut scratch);
                sink.write(&scratch)?;
                idle = true;
            }
        }

        if !self.options.interactive {
            scratch.clear();
            self.emit_trailer_and_silence(&mut scratch);
            sink.write(&scratch)?;
        }
        sink.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baudot::Ascii;
    use crate::locator::find_frame;
    use crate::tone::ToneAnalyzer;
    use std::io::Cursor;

    struct VecSink(Vec<f32>);

    impl AudioSink for VecSink {
        fn write(&mut self, samples: &[f32]) -> std::io::Result<()> {
            self.0.extend_from_slice(samples);
            Ok(())
        }
    }

    fn plan_300bps() -> FskPlan {
        FskPlan::new(48000, 1270.0, 1070.0, 200.0, 8).unwrap()
    }

    #[test]
    fn tone_synth_lut_matches_direct_sin_closely() {
        let mut lut_synth = ToneSynth::new(48000, 4096);
        let mut direct_synth = ToneSynth::new(48000, 0);
        let mut lut_out = Vec::new();
        let mut direct_out = Vec::new();
        lut_synth.emit_tone(1000.0, 100, &mut lut_out);
        direct_synth.emit_tone(1000.0, 100, &mut direct_out);
        for (a, b) in lut_out.iter().zip(direct_out.iter()) {
            assert!((a - b).abs() < 0.01, "a={a} b={b}");
        }
    }

    #[test]
    fn transmit_produces_nonempty_audio_with_trailing_silence() {
        let plan = plan_300bps();
        let options = TransmitOptions {
            data_rate_bps: 300.0,
            ..Default::default()
        };
        let mut tx = TransmitLoop::new(plan, Ascii, options);
        let mut input = Cursor::new(b"Hi".to_vec());
        let mut sink = VecSink(Vec::new());
        tx.run(&mut input, &mut sink).unwrap();

        assert!(!sink.0.is_empty());
        let tail = &sink.0[sink.0.len() - 100..];
        assert!(tail.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn transmitted_audio_decodes_back_via_locator() {
        let plan = plan_300bps();
        let nsamples_per_bit = 48000 / 300;
        let options = TransmitOptions {
            data_rate_bps: 300.0,
            ..Default::default()
        };
        let mut tx = TransmitLoop::new(plan.clone(), Ascii, options);
        let mut input = Cursor::new(b"Q".to_vec());
        let mut sink = VecSink(Vec::new());
        tx.run(&mut input, &mut sink).unwrap();

        let analyzer = ToneAnalyzer::new(plan.fftsize());
        // Leader is 2 mark bits; the frame's prev_stop cell starts there.
        let first_sample = 0;
        let candidate = find_frame(
            &plan,
            &analyzer,
            &sink.0,
            nsamples_per_bit,
            first_sample,
            nsamples_per_bit * 3,
            1,
            None,
        )
        .expect("should locate the transmitted frame");

        let data = (candidate.bits >> 2) & plan.data_mask();
        assert_eq!(data as u8, b'Q');
    }
}
