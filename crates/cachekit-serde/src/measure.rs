//! Byte-accounting probe used to decide, while an entry is being
//! serialized, whether it should end up stored inline or as a lazy blob.
//! Wrapping the encoder's output in a [`MeasuringWriter`] means the size
//! check falls out of the write path itself instead of re-serializing the
//! value a second time just to measure it.

use std::io::{self, Write};

pub struct MeasuringWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> MeasuringWriter<W> {
    pub fn begin_measure(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Consume the wrapper, returning the inner writer and the total
    /// number of bytes written since `begin_measure`.
    pub fn end_measure(self) -> (W, u64) {
        (self.inner, self.written)
    }

    pub fn bytes_written_so_far(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for MeasuringWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
