mod audio;

use std::io::{self, BufWriter, IsTerminal, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use fskmodem_core::{
    default_bandwidth, resolve_baudmode, Ascii, Baudot, FskPlan, FramebitsCodec, ReceiveLoop,
    ReceiveOptions, TransmitLoop, TransmitOptions, AUTO_CARRIER_THRESHOLD, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_LUT_LEN, DEFAULT_SAMPLE_RATE, DEFAULT_SEARCH_LIMIT,
};

use crate::audio::{NullSink, WavFileSink, WavFileSource};

#[cfg(feature = "live")]
use crate::audio::{DeviceSink, DeviceSource};

/// Software FSK modem: Bell 103 / Bell 202 / ITU-T V.21 / RTTY over an
/// audio channel.
#[derive(Parser, Debug)]
#[command(name = "fskmodem", version, about)]
struct Cli {
    /// Transmit instead of receive.
    #[arg(short = 't', long)]
    tx: bool,

    /// Receive (default mode).
    #[arg(short = 'r', long)]
    rx: bool,

    /// Minimum confidence to accept a frame.
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence: f32,

    /// Early-exit confidence in frame search.
    #[arg(short = 'l', long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    limit: f32,

    /// Enable carrier-band auto-detection.
    #[arg(short = 'a', long)]
    auto_carrier: bool,

    /// Force 8-bit ASCII data words.
    #[arg(short = '8', long)]
    ascii: bool,

    /// Force 5-bit Baudot (ITA-2) data words.
    #[arg(short = '5', long)]
    baudot: bool,

    /// Read/write audio from/to this file instead of the system device.
    #[arg(short = 'f', long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Receive DFT bin width in Hz (defaults by rate band).
    #[arg(short = 'b', long, value_name = "HZ")]
    bandwidth: Option<f32>,

    /// Mark tone frequency override, in Hz.
    #[arg(short = 'M', long, value_name = "HZ")]
    mark: Option<f32>,

    /// Space tone frequency override, in Hz.
    #[arg(short = 'S', long, value_name = "HZ")]
    space: Option<f32>,

    /// Transmit stop-bit length in bits (1.5 for RTTY).
    #[arg(short = 'T', long, value_name = "M.N")]
    txstopbits: Option<f32>,

    /// Suppress CARRIER/NOCARRIER lines on stderr.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Audio sample rate.
    #[arg(short = 'R', long, default_value_t = DEFAULT_SAMPLE_RATE)]
    samplerate: u32,

    /// Sine lookup table length (0 disables the LUT).
    #[arg(long, default_value_t = DEFAULT_LUT_LEN)]
    lut: usize,

    /// Request an `f32` sample format sink on transmit.
    #[arg(long)]
    float_samples: bool,

    /// Discard transmit audio instead of writing it; report throughput.
    #[arg(long)]
    benchmarks: bool,

    /// `rtty` or a numeric bits-per-second rate.
    baudmode: String,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("fskmodem: {msg}");
    std::process::exit(1);
}

/// Replaces non-printable, non-whitespace bytes with `.` before handing
/// decoded output to the terminal, mirroring classic TTY display
/// conventions for raw 5-/8-bit data.
struct SanitizingWriter<W> {
    inner: W,
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut scratch = Vec::with_capacity(buf.len());
        for &b in buf {
            let printable = b.is_ascii_graphic() || b == b' ' || b == b'\t' || b == b'\n' || b == b'\r';
            scratch.push(if printable { b } else { b'.' });
        }
        self.inner.write_all(&scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn main() {
    let cli = Cli::parse();
    env_logger::init();

    if cli.tx && cli.rx {
        fail("-t/--tx and -r/--rx are mutually exclusive");
    }
    if cli.ascii && cli.baudot {
        fail("-8/--ascii and -5/--baudot are mutually exclusive");
    }

    let baudmode_params = resolve_baudmode(&cli.baudmode).unwrap_or_else(|e| fail(e));

    let n_data_bits = if cli.ascii {
        8
    } else if cli.baudot {
        5
    } else {
        baudmode_params.n_data_bits
    };

    let mark_hz = cli.mark.unwrap_or(baudmode_params.mark_hz);
    let space_hz = cli.space.unwrap_or(baudmode_params.space_hz);
    let band_width = cli
        .bandwidth
        .unwrap_or_else(|| default_bandwidth(baudmode_params.data_rate_bps));
    let tx_stopbits = cli.txstopbits.unwrap_or(baudmode_params.tx_stopbits);

    let plan = FskPlan::new(cli.samplerate, mark_hz, space_hz, band_width, n_data_bits)
        .unwrap_or_else(|e| fail(e));

    let result = if cli.tx {
        run_tx(cli, plan, baudmode_params.data_rate_bps, tx_stopbits)
    } else {
        run_rx(cli, plan, baudmode_params.data_rate_bps)
    };

    if let Err(e) = result {
        eprintln!("fskmodem: {e}");
        std::process::exit(1);
    }
}

fn run_tx(
    cli: Cli,
    plan: FskPlan,
    data_rate_bps: f32,
    tx_stopbits: f32,
) -> fskmodem_core::Result<()> {
    let options = TransmitOptions {
        data_rate_bps,
        tx_stopbits,
        lut_len: cli.lut,
        interactive: cli.file.is_none() && !cli.benchmarks && io::stdin().is_terminal(),
    };

    let mut stdin = io::stdin();

    if cli.benchmarks {
        let mut sink = NullSink::default();
        run_tx_with_codec(&plan, options, n_data_bits_codec(&plan), &mut stdin, &mut sink)?;
        eprintln!(
            "fskmodem: benchmark: synthesized {} samples ({:.2}s at {} Hz)",
            sink.samples_written,
            sink.samples_written as f64 / plan.sample_rate() as f64,
            plan.sample_rate()
        );
        return Ok(());
    }

    if let Some(path) = &cli.file {
        let mut sink = WavFileSink::create(path, plan.sample_rate(), cli.float_samples)
            .map_err(fskmodem_core::ModemError::Io)?;
        run_tx_with_codec(&plan, options, n_data_bits_codec(&plan), &mut stdin, &mut sink)?;
        return Ok(());
    }

    #[cfg(feature = "live")]
    {
        let mut sink = DeviceSink::open(plan.sample_rate()).map_err(fskmodem_core::ModemError::Io)?;
        run_tx_with_codec(&plan, options, n_data_bits_codec(&plan), &mut stdin, &mut sink)?;
        return Ok(());
    }

    #[cfg(not(feature = "live"))]
    {
        fail("live audio output requires -f/--file or the `live` build feature");
    }
}

enum Codec {
    Ascii(Ascii),
    Baudot(Baudot),
}

fn n_data_bits_codec(plan: &FskPlan) -> Codec {
    if plan.n_data_bits() == 5 {
        Codec::Baudot(Baudot::new())
    } else {
        Codec::Ascii(Ascii)
    }
}

impl FramebitsCodec for Codec {
    fn encode(&mut self, byte: u8) -> fskmodem_core::EncodedWords {
        match self {
            Codec::Ascii(c) => c.encode(byte),
            Codec::Baudot(c) => c.encode(byte),
        }
    }

    fn decode(&mut self, data_bits: u16, out: &mut Vec<u8>) {
        match self {
            Codec::Ascii(c) => c.decode(data_bits, out),
            Codec::Baudot(c) => c.decode(data_bits, out),
        }
    }

    fn reset(&mut self) {
        match self {
            Codec::Ascii(c) => c.reset(),
            Codec::Baudot(c) => c.reset(),
        }
    }

    fn n_data_bits(&self) -> u8 {
        match self {
            Codec::Ascii(c) => c.n_data_bits(),
            Codec::Baudot(c) => c.n_data_bits(),
        }
    }
}

fn run_tx_with_codec(
    plan: &FskPlan,
    options: TransmitOptions,
    codec: Codec,
    input: &mut impl Read,
    sink: &mut impl fskmodem_core::AudioSink,
) -> fskmodem_core::Result<()> {
    let mut tx = TransmitLoop::new(plan.clone(), codec, options);
    tx.run(input, sink)
}

fn run_rx(cli: Cli, plan: FskPlan, data_rate_bps: f32) -> fskmodem_core::Result<()> {
    let options = ReceiveOptions {
        confidence_threshold: cli.confidence,
        search_limit: cli.limit,
        auto_carrier: cli.auto_carrier,
        auto_carrier_threshold: AUTO_CARRIER_THRESHOLD,
        quiet: cli.quiet,
        data_rate_bps,
    };

    let mut codec = n_data_bits_codec(&plan);
    let stdout = io::stdout();
    let mut out = SanitizingWriter {
        inner: BufWriter::new(stdout.lock()),
    };
    let stderr = io::stderr();
    let mut report = stderr.lock();

    let mut rx = ReceiveLoop::new(plan, options)?;

    if let Some(path) = &cli.file {
        let mut source = WavFileSource::open(path).map_err(fskmodem_core::ModemError::Io)?;
        rx.run(&mut source, &mut codec, &mut out, &mut report)?;
        out.flush().map_err(fskmodem_core::ModemError::Io)?;
        return Ok(());
    }

    #[cfg(feature = "live")]
    {
        let mut source = DeviceSource::open(cli.samplerate).map_err(fskmodem_core::ModemError::Io)?;
        rx.run(&mut source, &mut codec, &mut out, &mut report)?;
        out.flush().map_err(fskmodem_core::ModemError::Io)?;
        return Ok(());
    }

    #[cfg(not(feature = "live"))]
    {
        fail("live audio input requires -f/--file or the `live` build feature");
    }
}
