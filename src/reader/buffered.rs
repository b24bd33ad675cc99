//! Buffered reader source
//!
//! Adapts any `std::io::Read` into a [`Source`], reading into an internal
//! buffer one chunk at a time.

use super::Source;
use std::io::Read;

/// Buffer size for reading chunks
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Source over any `Read` implementation
pub struct ReadSource<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    filled: usize,
    eof: bool,
}

impl<R: Read> ReadSource<R> {
    /// Create a new source with the default buffer capacity
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new source with the specified buffer capacity
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        ReadSource {
            reader,
            buffer: vec![0u8; capacity.max(1)],
            filled: 0,
            eof: false,
        }
    }
}

impl<R: Read> Source for ReadSource<R> {
    fn next_chunk(&mut self) -> std::io::Result<Option<&[u8]>> {
        if self.eof {
            return Ok(None);
        }
        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(None);
                }
                Ok(n) => {
                    self.filled = n;
                    return Ok(Some(&self.buffer[..self.filled]));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
