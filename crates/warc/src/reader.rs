use crate::body::{Body, DEFAULT_SPOOL_THRESHOLD};
use crate::error::{Error, ErrorKind, Result};
use crate::headers::Headers;
use crate::record::{ArchivedRecord, HTTP_RESPONSE_TYPES, HttpHead, Provenance};
use exn::{OptionExt, ResultExt};
use std::io::{BufRead, Seek, SeekFrom};
use std::iter::FusedIterator;
use tracing::instrument;

const VERSION_LINE: &str = "WARC/1.0";

/// Sequential record parser over a buffered stream.
///
/// One reader per stream, one caller per reader: record boundaries are only
/// known by reading every record in order.
pub struct WarcReader<R> {
    inner: R,
    position: u64,
    source: String,
    spool_threshold: usize,
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            source: String::new(),
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
        }
    }

    /// Name recorded in each record's [`Provenance`].
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// The stream's current offset, when it was positioned before being
    /// handed over.
    pub fn with_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    pub fn with_spool_threshold(mut self, bytes: usize) -> Self {
        self.spool_threshold = bytes;
        self
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Iterate the remaining records. With `merge`, a record sharing the
    /// previous record's target URI is attached to it instead of emitted.
    pub fn records(self, merge: bool) -> Records<R> {
        Records { reader: self, merge, pending: None, error: None, done: false }
    }

    /// Parse the next record, or `None` if only whitespace remains.
    #[instrument(skip(self), fields(source = %self.source, offset = self.position, warc_type, length))]
    pub fn next_record(&mut self) -> Result<Option<ArchivedRecord>> {
        let version = loop {
            let offset = self.position;
            match self.read_line()? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break (offset, line),
            }
        };
        let (offset, version) = version;
        if version.trim() != VERSION_LINE {
            exn::bail!(ErrorKind::Format(format!(
                "expected {VERSION_LINE} at offset {offset}, found {:?}",
                truncate(version.trim())
            )));
        }

        let headers = self.read_header_block(true)?;
        let warc_type = headers
            .get("WARC-Type")
            .ok_or_raise(|| ErrorKind::Format("missing WARC-Type".to_string()))?
            .to_string();
        let content_length: u64 = headers
            .get("Content-Length")
            .ok_or_raise(|| ErrorKind::Format("missing Content-Length".to_string()))?
            .parse::<u64>()
            .or_raise(|| ErrorKind::Format("Content-Length is not a number".to_string()))?;
        let is_capture = matches!(warc_type.as_str(), "response" | "revisit");
        if warc_type == "response" && !headers.contains("Content-Type") {
            exn::bail!(ErrorKind::Format("response without Content-Type".to_string()));
        }
        if is_capture && !headers.contains("WARC-Target-URI") {
            exn::bail!(ErrorKind::Format(format!("{warc_type} without WARC-Target-URI")));
        }

        let is_http = is_capture && headers.get("Content-Type").is_some_and(|ct| HTTP_RESPONSE_TYPES.contains(&ct));
        let (http, body) = match is_http {
            true => {
                let block_start = self.position;
                let http = self.read_http_head()?;
                let head_length = self.position - block_start;
                let Some(body_length) = content_length.checked_sub(head_length) else {
                    exn::bail!(ErrorKind::Format(format!(
                        "HTTP head of {head_length} bytes exceeds Content-Length {content_length}"
                    )));
                };
                (Some(http), self.read_body(body_length)?)
            },
            false => (None, self.read_body(content_length)?),
        };

        let length = self.position - offset;
        let span = tracing::Span::current();
        span.record("warc_type", warc_type.as_str());
        span.record("length", length);
        tracing::debug!(status = http.as_ref().map(|h| h.status), body = body.len(), "parsed record");

        let provenance = Provenance { file: self.source.clone(), offset, length };
        Ok(Some(ArchivedRecord::new(headers, http, body).with_provenance(provenance)))
    }

    fn read_http_head(&mut self) -> Result<HttpHead> {
        let status_line = loop {
            match self.read_line()? {
                None => exn::bail!(ErrorKind::Format("stream ended before HTTP status line".to_string())),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
            }
        };
        let status_line = status_line.trim();
        if !status_line.starts_with("HTTP/") {
            exn::bail!(ErrorKind::Format(format!("invalid HTTP status line {:?}", truncate(status_line))));
        }
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default().to_string();
        let raw_status: u16 = parts
            .next()
            .unwrap_or_default()
            .parse::<u16>()
            .or_raise(|| ErrorKind::Format(format!("invalid HTTP status in {:?}", truncate(status_line))))?;
        let reason = parts.next().unwrap_or_default().to_string();

        let headers = self.read_header_block(false)?;
        if headers.is_empty() {
            tracing::warn!(status = raw_status, "HTTP response without headers");
        }

        let status = HttpHead::normalize_status(raw_status);
        let mut http = HttpHead::new(status, headers);
        http.version = version;
        if status == raw_status {
            http.reason = reason;
        }
        Ok(http)
    }

    /// Header lines up to the first blank line. WARC header blocks are strict;
    /// HTTP header blocks skip lines they can't parse.
    fn read_header_block(&mut self, strict: bool) -> Result<Headers> {
        let mut headers = Headers::new();
        loop {
            let Some(line) = self.read_line()? else {
                exn::bail!(ErrorKind::Format("stream ended inside a header block".to_string()));
            };
            let line = line.trim();
            if line.is_empty() {
                return Ok(headers);
            }
            if !headers.push_line(line) {
                match strict {
                    true => exn::bail!(ErrorKind::Format(format!("header line without a name: {:?}", truncate(line)))),
                    false => tracing::warn!(line = truncate(line), "skipping malformed HTTP header line"),
                }
            }
        }
    }

    fn read_body(&mut self, length: u64) -> Result<Body> {
        let body = Body::read_exact_from(&mut self.inner, length, self.spool_threshold)?;
        self.position += length;
        Ok(body)
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        let read = self.inner.read_until(b'\n', &mut line).or_raise(|| ErrorKind::Io)?;
        self.position += read as u64;
        Ok((read > 0).then(|| String::from_utf8_lossy(&line).into_owned()))
    }
}

impl<R: BufRead + Seek> WarcReader<R> {
    /// Reposition at a known record offset.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.position = self.inner.seek(SeekFrom::Start(offset)).or_raise(|| ErrorKind::Io)?;
        Ok(())
    }
}

fn truncate(line: &str) -> &str {
    let end = line.char_indices().nth(80).map_or(line.len(), |(i, _)| i);
    &line[..end]
}

/// Forward-only record sequence from [`WarcReader::records`].
///
/// Stops after the first error; a malformed record leaves the stream at an
/// unknown boundary.
pub struct Records<R> {
    reader: WarcReader<R>,
    merge: bool,
    pending: Option<ArchivedRecord>,
    error: Option<Error>,
    done: bool,
}

impl<R: BufRead> Iterator for Records<R> {
    type Item = Result<ArchivedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return match self.pending.take() {
                    Some(record) => Some(Ok(record)),
                    None => self.error.take().map(Err),
                };
            }
            match self.reader.next_record() {
                Err(err) => {
                    self.done = true;
                    self.error = Some(err);
                },
                Ok(None) => self.done = true,
                Ok(Some(record)) => match self.pending.take() {
                    Some(mut previous)
                        if self.merge && previous.target_uri().is_some() && previous.target_uri() == record.target_uri() =>
                    {
                        previous.attach(record);
                        self.pending = Some(previous);
                    },
                    Some(previous) => {
                        self.pending = Some(record);
                        return Some(Ok(previous));
                    },
                    None => self.pending = Some(record),
                },
            }
        }
    }
}

impl<R: BufRead> FusedIterator for Records<R> {}
