//! Record bodies.
//!
//! A [`Body`] is a single seekable byte source owned by one record. Small
//! bodies stay in memory, large ones spill to an anonymous temp file, and
//! local captures read straight from their file.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::SpooledTempFile;

/// Bodies up to this size are kept in memory while being read.
pub const DEFAULT_SPOOL_THRESHOLD: usize = 16 * 1024 * 1024;

#[derive(Debug)]
enum Inner {
    Memory(Cursor<Vec<u8>>),
    Spooled(SpooledTempFile),
    File { file: File, path: PathBuf },
}

/// One record's payload. Reads always start wherever the last read or seek
/// left off; call [`rewind`](Seek::rewind) before reading from the start.
#[derive(Debug)]
pub struct Body {
    inner: Inner,
    len: u64,
}

impl Body {
    pub fn empty() -> Self {
        Self::from_bytes(Vec::new())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self { inner: Inner::Memory(Cursor::new(bytes)), len }
    }

    /// A body backed by an existing file, read in place.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).or_raise(|| ErrorKind::Io)?;
        let len = file.metadata().or_raise(|| ErrorKind::Io)?.len();
        Ok(Self { inner: Inner::File { file, path }, len })
    }

    /// Copy exactly `len` bytes from `reader`, spilling to disk past
    /// `spool_threshold`. A short read is a format error: the declared length
    /// is part of the framing.
    pub(crate) fn read_exact_from(reader: &mut impl Read, len: u64, spool_threshold: usize) -> Result<Self> {
        let mut limited = reader.take(len);
        let (inner, copied) = if len <= spool_threshold as u64 {
            let mut bytes = Vec::with_capacity(len as usize);
            let copied = limited.read_to_end(&mut bytes).or_raise(|| ErrorKind::Io)? as u64;
            (Inner::Memory(Cursor::new(bytes)), copied)
        } else {
            let mut spooled = SpooledTempFile::new(spool_threshold);
            let copied = io::copy(&mut limited, &mut spooled).or_raise(|| ErrorKind::Io)?;
            spooled.rewind().or_raise(|| ErrorKind::Io)?;
            (Inner::Spooled(spooled), copied)
        };
        if copied != len {
            exn::bail!(ErrorKind::Format(format!("body ended after {copied} of {len} bytes")));
        }
        Ok(Self { inner, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the backing file, when the body is read in place from one.
    pub fn path(&self) -> Option<&Path> {
        match &self.inner {
            Inner::File { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether the body lives on disk rather than in memory.
    pub fn is_file_backed(&self) -> bool {
        match &self.inner {
            Inner::Memory(_) => false,
            Inner::Spooled(spooled) => spooled.is_rolled(),
            Inner::File { .. } => true,
        }
    }

    /// The whole body from the start, leaving the cursor at the end.
    pub fn to_vec(&mut self) -> Result<Vec<u8>> {
        self.rewind().or_raise(|| ErrorKind::Io)?;
        let mut bytes = Vec::with_capacity(self.len as usize);
        self.read_to_end(&mut bytes).or_raise(|| ErrorKind::Io)?;
        Ok(bytes)
    }

    /// Copy the whole body from the start into `writer`.
    pub fn copy_to(&mut self, writer: &mut impl Write) -> Result<u64> {
        self.rewind().or_raise(|| ErrorKind::Io)?;
        io::copy(self, writer).or_raise(|| ErrorKind::Io)
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Memory(cursor) => cursor.read(buf),
            Inner::Spooled(spooled) => spooled.read(buf),
            Inner::File { file, .. } => file.read(buf),
        }
    }
}

impl Seek for Body {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match &mut self.inner {
            Inner::Memory(cursor) => cursor.seek(pos),
            Inner::Spooled(spooled) => spooled.seek(pos),
            Inner::File { file, .. } => file.seek(pos),
        }
    }
}
