use thiserror::Error;

/// Errors the FSK engine itself can produce.
///
/// I/O failures surfaced through [`crate::audio::AudioSource`] /
/// [`crate::audio::AudioSink`] are folded in via `Io` so callers get a
/// single error type out of [`crate::receiver::ReceiveLoop::run`] and
/// [`crate::transmitter::TransmitLoop::run`].
#[derive(Debug, Error)]
pub enum ModemError {
    #[error("mark and space bands coincide (both resolve to band {0})")]
    BandsCoincide(u32),

    #[error("band {band} (freq ~{freq_hz} Hz) exceeds Nyquist for sample rate {sample_rate}")]
    BandExceedsNyquist {
        band: u32,
        freq_hz: f32,
        sample_rate: u32,
    },

    #[error("n_data_bits must be 5 or 8, got {0}")]
    InvalidDataBits(u8),

    #[error("band_width must be positive, got {0}")]
    InvalidBandwidth(f32),

    #[error("auto-carrier bandshift would push b_mark below 1 (b_mark={b_mark}, b_shift={b_shift})")]
    AutoCarrierBandUnderflow { b_mark: u32, b_shift: i32 },

    #[error("tone analysis window length mismatch: expected {expected}, got {got}")]
    WindowLengthMismatch { expected: usize, got: usize },

    #[error("receive buffer advance {advance} exceeds {n_valid} valid samples")]
    BufferUnderflow { advance: usize, n_valid: usize },

    #[error("unknown baudmode {0:?}")]
    InvalidBaudmode(String),

    #[error("audio I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModemError>;
