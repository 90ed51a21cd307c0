//! Forward-only, bounded-memory line scanning
//!
//! A line is the byte span between two `\n` separators (or the start/end of
//! the stream) with the separator removed. The stream always ends with one
//! final segment, so `""` is one empty line and `"a\n"` is `["a", ""]`. This
//! is exactly what [`split_lines`] produces for in-memory content, which keeps
//! line counts identical whichever way a file is read.

use std::borrow::Cow;
use std::io::{BufRead, BufReader, ErrorKind, Read};

const SEPARATOR: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Starting capacity of the read and line buffers
    pub initial_buffer: usize,
    /// Longest accepted line, separator excluded
    pub max_line_length: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            initial_buffer: 64 * 1024,
            max_line_length: 1024 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line} exceeds {max_length} bytes")]
    LineTooLong { line: usize, max_length: usize },
}

/// Lazily splits a byte stream into lines.
///
/// To read from the start again, rewind the underlying stream and build a
/// new scanner; a scanner never seeks.
pub struct LineScanner<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
    max_line_length: usize,
    lines_read: usize,
    consumed: u64,
    finished: bool,
}

impl<R: Read> LineScanner<R> {
    pub fn new(reader: R, limits: ScanLimits) -> Self {
        let initial = limits.initial_buffer.max(1);
        Self {
            reader: BufReader::with_capacity(initial, reader),
            line: Vec::with_capacity(initial.min(limits.max_line_length)),
            max_line_length: limits.max_line_length,
            lines_read: 0,
            consumed: 0,
            finished: false,
        }
    }

    /// Load the next line into the scanner.
    ///
    /// Returns `Ok(false)` once the final segment has been produced. After an
    /// error the scanner is finished.
    pub fn advance(&mut self) -> Result<bool, ScanError> {
        if self.finished {
            return Ok(false);
        }
        self.line.clear();

        loop {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Err(e.into());
                }
            };

            if available.is_empty() {
                self.finished = true;
                self.lines_read += 1;
                return Ok(true);
            }

            let (chunk, found) = match available.iter().position(|&b| b == SEPARATOR) {
                Some(end) => (&available[..end], true),
                None => (available, false),
            };

            if self.line.len() + chunk.len() > self.max_line_length {
                self.finished = true;
                return Err(ScanError::LineTooLong {
                    line: self.lines_read + 1,
                    max_length: self.max_line_length,
                });
            }

            self.line.extend_from_slice(chunk);
            let used = chunk.len() + usize::from(found);
            self.reader.consume(used);
            self.consumed += used as u64;

            if found {
                self.lines_read += 1;
                return Ok(true);
            }
        }
    }

    /// Current line decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.line)
    }

    /// Lines produced so far; also the 1-based number of the current line
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Stream offset where the next line starts
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: Read> Iterator for LineScanner<R> {
    type Item = Result<String, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => Some(Ok(self.text().into_owned())),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Split in-memory content with the same semantics as [`LineScanner`]
pub fn split_lines(content: &[u8]) -> Vec<String> {
    content
        .split(|&b| b == SEPARATOR)
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}
