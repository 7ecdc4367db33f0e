use crate::error::{ErrorKind, Result};
use crate::record::{ArchivedRecord, HTTP_RESPONSE_TYPES};
use exn::ResultExt;
use std::fs::File;
use std::io::{Cursor, Seek, Write};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;

/// A byte sink records can be written to. Files hold an exclusive OS lock
/// for the duration of each record so concurrent writers never interleave.
pub trait RecordSink: Write {
    fn lock_exclusive(&self) -> std::io::Result<()> {
        Ok(())
    }

    fn unlock(&self) -> std::io::Result<()> {
        Ok(())
    }
}

impl RecordSink for File {
    fn lock_exclusive(&self) -> std::io::Result<()> {
        fs2::FileExt::lock_exclusive(self)
    }

    fn unlock(&self) -> std::io::Result<()> {
        fs2::FileExt::unlock(self)
    }
}

impl RecordSink for Vec<u8> {}
impl RecordSink for Cursor<Vec<u8>> {}

/// Serializes records onto a [`RecordSink`].
#[derive(Debug)]
pub struct WarcWriter<W> {
    sink: W,
    file_name: String,
    written: u64,
}

impl<W: RecordSink> WarcWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, file_name: String::new(), written: 0 }
    }

    /// Name announced in the `warcinfo` record.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Bytes written through this writer.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Write the `warcinfo` record that opens a file.
    pub fn write_start(&mut self) -> Result<u64> {
        let now = OffsetDateTime::now_utc();
        let date = now.replace_nanosecond(0).unwrap_or(now).format(&Rfc3339).or_raise(|| ErrorKind::Io)?;
        let record = format!(
            "WARC/1.0\r\nWARC-Type: warcinfo\r\nWARC-Date: {date}\r\nWARC-Filename: {}\r\nContent-Type: application/warc-fields\r\nContent-Length: 0\r\n\r\n\r\n\r\n",
            self.file_name
        );
        self.locked(|sink| {
            sink.write_all(record.as_bytes())?;
            Ok(record.len() as u64)
        })
    }

    /// Write one HTTP record, returning the bytes written.
    ///
    /// `Content-Length` is always recomputed from what is written. Without
    /// `include_body` only the HTTP head is kept. Records without an embedded
    /// HTTP response aren't supported.
    #[instrument(skip_all, fields(file = %self.file_name, uri = record.target_uri().unwrap_or_default(), length))]
    pub fn write_entry(&mut self, record: &mut ArchivedRecord, include_body: bool) -> Result<u64> {
        let is_http = record.warc_content_type().is_some_and(|ct| HTTP_RESPONSE_TYPES.contains(&ct));
        let Some(http) = record.http().filter(|_| is_http) else {
            exn::bail!(ErrorKind::Unsupported("writing records without an HTTP response".to_string()));
        };

        let head = http.to_wire();
        let body_length = if include_body { record.body().len() } else { 0 };
        let mut warc_head = String::from("WARC/1.0\r\n");
        for (name, value) in record.headers().iter().filter(|(name, _)| !name.eq_ignore_ascii_case("Content-Length")) {
            warc_head.push_str(&format!("{name}: {value}\r\n"));
        }
        warc_head.push_str(&format!("Content-Length: {}\r\n\r\n", head.len() as u64 + body_length));

        let length = self.locked(|sink| {
            sink.write_all(warc_head.as_bytes())?;
            sink.write_all(head.as_bytes())?;
            let mut copied = 0;
            if include_body {
                let body = record.body_mut();
                body.rewind()?;
                copied = std::io::copy(body, sink)?;
            }
            sink.write_all(b"\r\n\r\n")?;
            Ok((warc_head.len() + head.len() + 4) as u64 + copied)
        })?;
        tracing::Span::current().record("length", length);
        Ok(length)
    }

    fn locked(&mut self, write: impl FnOnce(&mut W) -> std::io::Result<u64>) -> Result<u64> {
        self.sink.lock_exclusive().or_raise(|| ErrorKind::Io)?;
        let result = write(&mut self.sink).and_then(|length| self.sink.flush().map(|()| length));
        let unlocked = self.sink.unlock();
        let length = result.or_raise(|| ErrorKind::Io)?;
        unlocked.or_raise(|| ErrorKind::Io)?;
        self.written += length;
        Ok(length)
    }
}
