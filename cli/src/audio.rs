//! Concrete `AudioSource`/`AudioSink` backends: WAV file I/O via `hound`,
//! a discard sink for benchmarking, and (behind the `live` feature) the
//! system default device via `cpal`.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use fskmodem_core::{AudioSink, AudioSource};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Reads mono `f32` samples from a WAV file. The whole file is decoded
/// into memory up front (the teacher's `cli/src/main.rs` does the same
/// via `reader.samples::<_>().collect()`), with stereo downmixed by
/// averaging channels; `read` then just slices the decoded buffer.
pub struct WavFileSource {
    samples: Vec<f32>,
    pos: usize,
}

impl WavFileSource {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut reader = WavReader::open(path).map_err(hound_to_io)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        // Mirrors the teacher's `decode_legacy_command`: dispatch on
        // `bits_per_sample` rather than assuming one fixed integer width,
        // and reject depths this engine doesn't know how to rescale
        // instead of silently misinterpreting their amplitude.
        let mono: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(hound_to_io)?,
            (SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(hound_to_io)?
                .into_iter()
                .map(|v| v as f32 / 32768.0)
                .collect(),
            (SampleFormat::Int, 8) => reader
                .samples::<i8>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(hound_to_io)?
                .into_iter()
                .map(|v| v as f32 / 128.0)
                .collect(),
            (format, bits) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unsupported WAV sample format {format:?}/{bits}-bit"),
                ))
            }
        };

        let samples = if channels <= 1 {
            mono
        } else {
            mono.chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        Ok(Self { samples, pos: 0 })
    }
}

impl AudioSource for WavFileSource {
    fn read(&mut self, buf: &mut [f32]) -> io::Result<usize> {
        let remaining = self.samples.len() - self.pos;
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Writes mono `f32` samples to a WAV file, either as `f32` PCM
/// (`--float-samples`) or 16-bit integer PCM (the default).
pub struct WavFileSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    float_samples: bool,
}

impl WavFileSink {
    pub fn create(path: &Path, sample_rate: u32, float_samples: bool) -> io::Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: if float_samples { 32 } else { 16 },
            sample_format: if float_samples {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        };
        let writer = WavWriter::create(path, spec).map_err(hound_to_io)?;
        Ok(Self {
            writer: Some(writer),
            float_samples,
        })
    }
}

impl AudioSink for WavFileSink {
    fn write(&mut self, samples: &[f32]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "sink already finalized"))?;
        for &s in samples {
            if self.float_samples {
                writer.write_sample(s).map_err(hound_to_io)?;
            } else {
                let clamped = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(clamped).map_err(hound_to_io)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(hound_to_io)?;
        }
        Ok(())
    }
}

fn hound_to_io(e: hound::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Discards everything written; used by `--benchmarks` to measure pure
/// synthesis throughput without file or device I/O.
#[derive(Debug, Default)]
pub struct NullSink {
    pub samples_written: u64,
}

impl AudioSink for NullSink {
    fn write(&mut self, samples: &[f32]) -> io::Result<()> {
        self.samples_written += samples.len() as u64;
        Ok(())
    }
}

#[cfg(feature = "live")]
pub use live::{DeviceSink, DeviceSource};

#[cfg(feature = "live")]
mod live {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use fskmodem_core::{AudioSink, AudioSource};

    const POLL_INTERVAL: Duration = Duration::from_millis(5);
    const RING_CAPACITY: usize = 1 << 16;

    fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stream_config(sample_rate: u32) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }

    /// The system default input device, bridged to the blocking
    /// `AudioSource` contract via a mutex-guarded ring buffer. `cpal`'s
    /// callback only pushes samples and never blocks; `read` polls the
    /// buffer and sleeps briefly when it's empty.
    pub struct DeviceSource {
        buffer: Arc<Mutex<VecDeque<f32>>>,
        _stream: cpal::Stream,
    }

    impl DeviceSource {
        pub fn open(sample_rate: u32) -> io::Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no input audio device available"))?;
            let config = stream_config(sample_rate);
            let buffer = Arc::new(Mutex::new(VecDeque::with_capacity(RING_CAPACITY)));
            let buffer_cb = Arc::clone(&buffer);

            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mut guard = lock_or_recover(&buffer_cb);
                        guard.extend(data.iter().copied());
                        let excess = guard.len().saturating_sub(RING_CAPACITY);
                        for _ in 0..excess {
                            guard.pop_front();
                        }
                    },
                    |err| log::error!("input stream error: {err}"),
                    None,
                )
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            stream.play().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

            Ok(Self {
                buffer,
                _stream: stream,
            })
        }
    }

    impl AudioSource for DeviceSource {
        fn read(&mut self, buf: &mut [f32]) -> io::Result<usize> {
            loop {
                let mut guard = lock_or_recover(&self.buffer);
                let n = guard.len().min(buf.len());
                if n > 0 {
                    for slot in buf.iter_mut().take(n) {
                        *slot = guard.pop_front().unwrap();
                    }
                    return Ok(n);
                }
                drop(guard);
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }

    /// The system default output device, bridged the same way as
    /// [`DeviceSource`]: `write` pushes into the ring buffer and blocks
    /// (poll-sleeping) only if the buffer is already full; the callback
    /// pulls samples and pads with silence if it runs dry.
    pub struct DeviceSink {
        buffer: Arc<Mutex<VecDeque<f32>>>,
        _stream: cpal::Stream,
    }

    impl DeviceSink {
        pub fn open(sample_rate: u32) -> io::Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no output audio device available"))?;
            let config = stream_config(sample_rate);
            let buffer = Arc::new(Mutex::new(VecDeque::with_capacity(RING_CAPACITY)));
            let buffer_cb = Arc::clone(&buffer);

            let stream = device
                .build_output_stream(
                    &config,
                    move |output: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut guard = lock_or_recover(&buffer_cb);
                        for slot in output.iter_mut() {
                            *slot = guard.pop_front().unwrap_or(0.0);
                        }
                    },
                    |err| log::error!("output stream error: {err}"),
                    None,
                )
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            stream.play().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

            Ok(Self {
                buffer,
                _stream: stream,
            })
        }
    }

    impl AudioSink for DeviceSink {
        fn write(&mut self, samples: &[f32]) -> io::Result<()> {
            let mut remaining = samples;
            while !remaining.is_empty() {
                let mut guard = lock_or_recover(&self.buffer);
                let room = RING_CAPACITY.saturating_sub(guard.len());
                if room == 0 {
                    drop(guard);
                    std::thread::sleep(POLL_INTERVAL);
                    continue;
                }
                let n = room.min(remaining.len());
                guard.extend(remaining[..n].iter().copied());
                remaining = &remaining[n..];
            }
            Ok(())
        }
    }
}
