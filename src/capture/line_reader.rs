//! Incremental newline-delimited reader with bounded memory.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::warn;

/// Bytes requested from the source per read.
pub const CHUNK_SIZE: usize = 1024;

const DELIMITER: u8 = b'\n';

/// Yields one trimmed line per call without loading the whole source.
///
/// Only the current chunk plus any not-yet-terminated line is buffered. A
/// trailing line with no delimiter is yielded exactly once at end of input.
/// Invalid UTF-8 is replaced rather than ending the stream.
pub struct LineStreamReader<R> {
    source: R,
    buffer: Vec<u8>,
    chunk: Box<[u8]>,
    exhausted: bool,
}

impl LineStreamReader<File> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> LineStreamReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_chunk_size(source, CHUNK_SIZE)
    }

    pub fn with_chunk_size(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            buffer: Vec::with_capacity(chunk_size),
            chunk: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            exhausted: false,
        }
    }

    /// Next line with surrounding whitespace trimmed, or `None` once the
    /// source and the pending partial line are both used up.
    pub fn read_line(&mut self) -> Option<String> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buffer[scanned..].iter().position(|&b| b == DELIMITER) {
                let end = scanned + pos + 1;
                let line = decode_trimmed(&self.buffer[..end]);
                self.buffer.drain(..end);
                return Some(line);
            }
            scanned = self.buffer.len();

            if self.exhausted || !self.fill() {
                self.exhausted = true;
                if self.buffer.is_empty() {
                    return None;
                }
                let line = decode_trimmed(&self.buffer);
                self.buffer.clear();
                return Some(line);
            }
        }
    }

    /// Append one chunk to the buffer. False at end of input; read errors
    /// count as end of input.
    fn fill(&mut self) -> bool {
        loop {
            match self.source.read(&mut self.chunk) {
                Ok(0) => return false,
                Ok(n) => {
                    self.buffer.extend_from_slice(&self.chunk[..n]);
                    return true;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "line reader: read failed, treating as end of input");
                    return false;
                }
            }
        }
    }
}

impl<R: Read> Iterator for LineStreamReader<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.read_line()
    }
}

fn decode_trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
