//! Looking at the head of a decoded payload.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::Read;

/// A [`Read`]er that buffers what it has been asked to look at.
///
/// Used to check whether a response mislabelled as `text/plain` (or not
/// labelled at all) is really HTML without reading the whole body.
pub struct PeekableReader<R> {
    inner: R,
    head: Vec<u8>,
}

impl<R: Read> PeekableReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, head: Vec::new() }
    }

    /// Buffer up to `limit` bytes and return them.
    ///
    /// Later calls with a smaller limit are served from the buffer; a larger
    /// limit only reads the difference.
    pub fn peek(&mut self, limit: usize) -> Result<&[u8]> {
        if self.head.len() < limit {
            let needed = (limit - self.head.len()) as u64;
            (&mut self.inner).take(needed).read_to_end(&mut self.head).or_raise(|| ErrorKind::InvalidData)?;
        }
        Ok(&self.head[..self.head.len().min(limit)])
    }
}
