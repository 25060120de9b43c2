//! Abstract blocking audio stream contract. Concrete backends (WAV file,
//! live device, benchmark sink) are external collaborators and live in
//! the `fskmodem-cli` crate; this module only fixes the boundary.

use std::io;

/// A blocking source of mono `f32` PCM samples at a fixed rate.
///
/// `read` mirrors `std::io::Read` in spirit but works in samples, not
/// bytes: it fills as much of `buf` as is currently available and
/// returns the count, with `Ok(0)` meaning clean end-of-stream.
pub trait AudioSource {
    fn read(&mut self, buf: &mut [f32]) -> io::Result<usize>;
}

/// A blocking sink for mono `f32` PCM samples at a fixed rate.
pub trait AudioSink {
    fn write(&mut self, samples: &[f32]) -> io::Result<()>;

    /// Flushes any internal buffering. Default no-op; file-backed sinks
    /// override this to finalize their container format.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
