//! `Transfer-Encoding: chunked` decoding.
//!
//! Captures are frequently cut short by the crawler, so a stream that ends
//! mid-chunk is treated as the end of the body rather than an error. A chunk
//! size line that isn't hexadecimal is still rejected.

use memchr::memchr;
use std::io::{BufRead, Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data(u64),
    DataEnd,
    Trailers,
    Done,
}

/// A [`Read`] adapter that strips chunk framing from the wrapped reader.
///
/// ```
/// use std::io::Read;
/// use mirror_encoding::ChunkedDecoder;
///
/// let mut decoder = ChunkedDecoder::new(&b"5\r\nhello\r\n0\r\n\r\n"[..]);
/// let mut body = String::new();
/// decoder.read_to_string(&mut body).unwrap();
/// assert_eq!(body, "hello");
/// ```
pub struct ChunkedDecoder<R> {
    inner: R,
    state: State,
    line: Vec<u8>,
}

impl<R: BufRead> ChunkedDecoder<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, state: State::Size, line: Vec::new() }
    }

    /// Unwrap, returning the inner reader positioned after whatever was
    /// consumed so far.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads one line into `self.line`, returning `false` on EOF.
    fn next_line(&mut self) -> IoResult<bool> {
        self.line.clear();
        Ok(self.inner.read_until(b'\n', &mut self.line)? > 0)
    }

    fn parse_size(&self) -> IoResult<u64> {
        let end = memchr(b';', &self.line).unwrap_or(self.line.len());
        let digits = std::str::from_utf8(&self.line[..end])
            .map_err(|_| IoError::new(IoErrorKind::InvalidData, "chunk size is not ASCII"))?
            .trim();
        u64::from_str_radix(digits, 16)
            .map_err(|_| IoError::new(IoErrorKind::InvalidData, format!("invalid chunk size: {digits:?}")))
    }
}

impl<R: BufRead> Read for ChunkedDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.state {
                State::Size => {
                    if !self.next_line()? {
                        tracing::debug!("chunked body ended before terminating chunk");
                        self.state = State::Done;
                        continue;
                    }
                    // Tolerate stray blank lines between chunks.
                    if self.line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    self.state = match self.parse_size()? {
                        0 => State::Trailers,
                        size => State::Data(size),
                    };
                },
                State::Data(remaining) => {
                    let available = self.inner.fill_buf()?;
                    if available.is_empty() {
                        tracing::debug!(remaining, "chunked body truncated mid-chunk");
                        self.state = State::Done;
                        continue;
                    }
                    let count = buf.len().min(available.len()).min(usize::try_from(remaining).unwrap_or(usize::MAX));
                    buf[..count].copy_from_slice(&available[..count]);
                    self.inner.consume(count);
                    let remaining = remaining - count as u64;
                    self.state = if remaining == 0 { State::DataEnd } else { State::Data(remaining) };
                    return Ok(count);
                },
                State::DataEnd => {
                    self.next_line()?;
                    self.state = State::Size;
                },
                State::Trailers => {
                    if !self.next_line()? || self.line.iter().all(u8::is_ascii_whitespace) {
                        self.state = State::Done;
                    }
                },
                State::Done => return Ok(0),
            }
        }
    }
}
