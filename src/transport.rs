use std::io;

/// A serial-like byte stream that never blocks on read.
pub trait Transport {
    /// Reads whatever is already buffered, returning 0 when nothing is waiting.
    fn read_available(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}
