//! Core signal-processing and framing engine for a software FSK modem:
//! Bell 103 / Bell 202 / ITU-T V.21 / RTTY two-tone signaling over a
//! blocking mono `f32` audio stream.
//!
//! Five cooperating pieces, leaves-first: [`tone`] (single-bin DFT tone
//! analysis), [`plan`] (the immutable session plan), [`locator`] (the
//! sub-bit-granularity frame search), [`receiver`] (the main demodulation
//! loop and carrier state machine, composed with [`carrier`] and
//! [`baudot`]), and [`transmitter`] (tone synthesis and the byte-to-tones
//! loop). [`audio`] fixes the abstract boundary to the pluggable source/
//! sink a caller supplies; [`params`] resolves the CLI's baudmode
//! argument into concrete tone parameters.

pub mod audio;
pub mod baudot;
pub mod carrier;
pub mod error;
pub mod locator;
pub mod params;
pub mod plan;
pub mod receiver;
pub mod tone;
pub mod transmitter;

pub use audio::{AudioSink, AudioSource};
pub use baudot::{Ascii, Baudot, EncodedWords, FramebitsCodec};
pub use carrier::{format_carrier, CarrierState};
pub use error::{ModemError, Result};
pub use locator::{find_frame, FrameCandidate};
pub use params::{default_bandwidth, resolve_baudmode, BaudmodeParams};
pub use plan::FskPlan;
pub use receiver::{ReceiveLoop, ReceiveOptions, ReceiveStats};
pub use tone::ToneAnalyzer;
pub use transmitter::{TransmitLoop, TransmitOptions};

/// Default sample rate when `-R/--samplerate` is not given.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default early-exit confidence for the frame locator once carrier is
/// acquired (`-l/--limit`).
pub const DEFAULT_SEARCH_LIMIT: f32 = 2.3;

/// Default minimum confidence to accept a frame (`-c/--confidence`).
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 2.0;

/// Default sine lookup table length (`--lut`); 0 disables the LUT.
pub const DEFAULT_LUT_LEN: usize = 4096;

/// Fixed auto-carrier detection threshold (`-a/--auto-carrier`).
pub const AUTO_CARRIER_THRESHOLD: f32 = 0.001;

/// Consecutive low-confidence frame attempts before an acquired carrier
/// is declared lost.
pub const MAX_NOCONFIDENCE_BITS: u32 = 20;
