use crate::body::Body;
use crate::error::{ErrorKind, Result};
use crate::headers::Headers;
use exn::ResultExt;
use mirror_config::{SiteConfig, SiteConfigs};
use mirror_encoding::{ChunkedDecoder, Encoding};
use std::io::{self, BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tempfile::{NamedTempFile, TempPath};

/// `Content-Type` values marking a record block as an embedded HTTP response.
pub const HTTP_RESPONSE_TYPES: [&str; 2] = ["application/http; msgtype=response", "application/http;msgtype=response"];

/// `WARC-Profile` of revisit records this system knows how to resolve.
pub const SUPPORTED_REVISIT_PROFILE: &str = "mirrorreader2";

/// Status line and headers of an embedded HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpHead {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
}

impl HttpHead {
    pub fn new(status: u16, headers: Headers) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status,
            reason: reason_phrase(status).to_string(),
            headers,
        }
    }

    /// Map non-standard codes onto the nearest standard bucket.
    pub fn normalize_status(status: u16) -> u16 {
        match status {
            209..=299 => 200,
            309..=399 => 300,
            418..=499 => 400,
            509 | 512.. => 500,
            _ => status,
        }
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_all("Transfer-Encoding")
            .any(|value| value.split(',').any(|coding| coding.trim().eq_ignore_ascii_case("chunked")))
    }

    /// Every content coding applied, in application order. Unknown codings
    /// leave the body as stored.
    pub fn content_codings(&self) -> Vec<Encoding> {
        let mut codings = Vec::new();
        for value in self.headers.get_all("Content-Encoding") {
            match Encoding::from_header(value) {
                Ok(parsed) => codings.extend(parsed),
                Err(err) => {
                    tracing::warn!(value, error = %err, "unrecognized content coding, serving body as stored");
                    return Vec::new();
                },
            }
        }
        codings
    }

    /// Status line, headers and blank line as written on the wire.
    pub(crate) fn to_wire(&self) -> String {
        format!("{} {} {}\r\n{}\r\n", self.version, self.status, self.reason, self.headers.to_wire())
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// Where a record came from, for re-reading it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Container file name.
    pub file: String,
    /// Byte offset of the record's version line.
    pub offset: u64,
    /// Bytes from `offset` through the end of the record body.
    pub length: u64,
}

/// Values supplied by the index, used where the record itself is silent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexHints {
    pub url: Option<String>,
    pub content_type: Option<String>,
}

/// One parsed container record.
///
/// The record owns its body exclusively. Temporary files made from the body
/// are removed when the record is dropped.
#[derive(Debug)]
pub struct ArchivedRecord {
    headers: Headers,
    http: Option<HttpHead>,
    body: Body,
    attachments: Vec<ArchivedRecord>,
    provenance: Option<Provenance>,
    hints: IndexHints,
    site: OnceLock<Arc<SiteConfig>>,
    temporary_files: Vec<TempPath>,
}

impl ArchivedRecord {
    pub fn new(headers: Headers, http: Option<HttpHead>, body: Body) -> Self {
        Self {
            headers,
            http,
            body,
            attachments: Vec::new(),
            provenance: None,
            hints: IndexHints::default(),
            site: OnceLock::new(),
            temporary_files: Vec::new(),
        }
    }

    /// A capture stored as a plain file rather than inside a container. It
    /// has no headers of its own; URL and type come from [`IndexHints`].
    pub fn local_file(path: impl AsRef<Path>) -> Result<Self> {
        let body = Body::from_file(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), size = body.len(), "opened local capture");
        Ok(Self::new(Headers::new(), None, body))
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn with_index_hints(mut self, hints: IndexHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn http(&self) -> Option<&HttpHead> {
        self.http.as_ref()
    }

    pub fn status(&self) -> Option<u16> {
        self.http.as_ref().map(|http| http.status)
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn warc_type(&self) -> Option<&str> {
        self.headers.get("WARC-Type")
    }

    pub fn is_response(&self) -> bool {
        self.warc_type() == Some("response")
    }

    pub fn is_supported_revisit(&self) -> bool {
        self.warc_type() == Some("revisit") && self.headers.get("WARC-Profile") == Some(SUPPORTED_REVISIT_PROFILE)
    }

    /// The block's own `Content-Type`, e.g. `application/http; msgtype=response`.
    pub fn warc_content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    /// Whether the block is an embedded HTTP response.
    pub fn is_http(&self) -> bool {
        self.warc_content_type().is_some_and(|ct| HTTP_RESPONSE_TYPES.contains(&ct))
    }

    pub fn target_uri(&self) -> Option<&str> {
        self.headers.get("WARC-Target-URI").or(self.hints.url.as_deref())
    }

    /// The payload's media type: the HTTP `Content-Type`, else the index's.
    pub fn content_type(&self) -> Option<&str> {
        self.http
            .as_ref()
            .and_then(|http| http.headers.get("Content-Type"))
            .or(self.hints.content_type.as_deref())
    }

    pub fn attach(&mut self, record: ArchivedRecord) {
        self.attachments.push(record);
    }

    /// Records merged into this one because they share its target URI.
    pub fn attachments(&self) -> &[ArchivedRecord] {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut [ArchivedRecord] {
        &mut self.attachments
    }

    /// The attached `metadata` record, which carries discovered outlinks.
    pub fn outlinks_attachment(&mut self) -> Option<&mut ArchivedRecord> {
        self.attachments.iter_mut().find(|record| record.warc_type() == Some("metadata"))
    }

    /// Effective site rules for this record's target URI, resolved once.
    pub fn site_config(&self, sites: &SiteConfigs) -> Result<Arc<SiteConfig>> {
        if let Some(config) = self.site.get() {
            return Ok(Arc::clone(config));
        }
        let config = sites.for_url(self.target_uri().unwrap_or_default()).or_raise(|| ErrorKind::Config)?;
        Ok(Arc::clone(self.site.get_or_init(|| config)))
    }

    /// The body with transfer and content codings undone, read from the
    /// start.
    pub fn decoded_reader(&mut self) -> Result<Box<dyn Read + '_>> {
        self.body.rewind().or_raise(|| ErrorKind::Io)?;
        let (chunked, codings) = match &self.http {
            Some(http) => (http.is_chunked(), http.content_codings()),
            None => (false, Vec::new()),
        };
        let reader = BufReader::new(&mut self.body);
        let reader: Box<dyn Read + '_> = match chunked {
            true => Box::new(ChunkedDecoder::new(reader)),
            false => Box::new(reader),
        };
        Encoding::wrap_reader_stack(&codings, reader).or_raise(|| ErrorKind::Encoding)
    }

    pub fn decoded_body(&mut self) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        self.decoded_reader()?.read_to_end(&mut decoded).or_raise(|| ErrorKind::Encoding)?;
        Ok(decoded)
    }

    /// A path external tools can read the decoded body from.
    ///
    /// Local captures return their own file. Everything else is decoded into
    /// a temp file that lives as long as this record.
    pub fn body_as_physical_file(&mut self) -> Result<PathBuf> {
        if self.http.is_none()
            && let Some(path) = self.body.path()
        {
            return Ok(path.to_path_buf());
        }
        let mut file = NamedTempFile::new().or_raise(|| ErrorKind::Io)?;
        let copied = io::copy(&mut self.decoded_reader()?, file.as_file_mut()).or_raise(|| ErrorKind::Encoding)?;
        let path = file.into_temp_path();
        tracing::debug!(path = %path.display(), size = copied, "materialized record body");
        let owned = path.to_path_buf();
        self.temporary_files.push(path);
        Ok(owned)
    }

    /// Parse a non-HTTP body of `Name: value` lines, such as a `metadata`
    /// record's outlinks.
    pub fn body_as_metadata(&mut self) -> Result<Headers> {
        if self.is_http() {
            exn::bail!(ErrorKind::Unsupported("metadata parsing of an HTTP record".to_string()));
        }
        let bytes = self.body.to_vec()?;
        let mut metadata = Headers::new();
        for line in String::from_utf8_lossy(&bytes).lines().map(str::trim).filter(|line| !line.is_empty()) {
            if !metadata.push_line(line) {
                tracing::debug!(line, "skipping metadata line without a name");
            }
        }
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn http_record(http_headers: Headers, body: impl Into<Vec<u8>>) -> ArchivedRecord {
        let headers: Headers = [
            ("WARC-Type", "response"),
            ("WARC-Target-URI", "https://example.com/"),
            ("Content-Type", HTTP_RESPONSE_TYPES[0]),
        ]
        .into_iter()
        .collect();
        ArchivedRecord::new(headers, Some(HttpHead::new(200, http_headers)), Body::from_bytes(body))
    }

    #[rstest]
    #[case(200, 200)]
    #[case(204, 204)]
    #[case(208, 208)]
    #[case(226, 200)]
    #[case(308, 308)]
    #[case(350, 300)]
    #[case(417, 417)]
    #[case(451, 400)]
    #[case(509, 500)]
    #[case(511, 511)]
    #[case(599, 500)]
    fn status_normalization(#[case] status: u16, #[case] expected: u16) {
        assert_eq!(HttpHead::normalize_status(status), expected);
    }

    #[test]
    fn chunked_and_gzipped_bodies_are_decoded() {
        let gzipped = Encoding::Gzip.encode(b"hello archived world").unwrap();
        let mut chunked = format!("{:x}\r\n", gzipped.len()).into_bytes();
        chunked.extend_from_slice(&gzipped);
        chunked.extend_from_slice(b"\r\n0\r\n\r\n");
        let headers = [("Transfer-Encoding", "chunked"), ("Content-Encoding", "gzip")].into_iter().collect();
        let mut record = http_record(headers, chunked);
        assert_eq!(record.decoded_body().unwrap(), b"hello archived world");
        // Decoding doesn't consume the stored body.
        assert_eq!(record.decoded_body().unwrap(), b"hello archived world");
    }

    #[test]
    fn unknown_codings_serve_the_stored_body() {
        let headers = [("Content-Encoding", "x-unheard-of")].into_iter().collect();
        let mut record = http_record(headers, "as stored");
        assert_eq!(record.decoded_body().unwrap(), b"as stored");
    }

    #[test]
    fn index_hints_fill_missing_fields() {
        let record = ArchivedRecord::new(Headers::new(), None, Body::empty()).with_index_hints(IndexHints {
            url: Some("https://example.com/hint".into()),
            content_type: Some("image/png".into()),
        });
        assert_eq!(record.target_uri(), Some("https://example.com/hint"));
        assert_eq!(record.content_type(), Some("image/png"));

        let record = http_record([("Content-Type", "text/html")].into_iter().collect(), "")
            .with_index_hints(IndexHints { url: Some("https://ignored/".into()), content_type: Some("image/png".into()) });
        assert_eq!(record.target_uri(), Some("https://example.com/"));
        assert_eq!(record.content_type(), Some("text/html"));
    }

    #[test]
    fn metadata_bodies_parse_into_repeatable_fields() {
        let headers = [("WARC-Type", "metadata"), ("Content-Type", "application/warc-fields")].into_iter().collect();
        let body = "outlink: https://a.test/\r\n\r\noutlink: https://b.test/\r\nvia: https://c.test/\r\n";
        let mut record = ArchivedRecord::new(headers, None, Body::from_bytes(body));
        let metadata = record.body_as_metadata().unwrap();
        assert_eq!(metadata.get_all("outlink").collect::<Vec<_>>(), vec!["https://a.test/", "https://b.test/"]);
        assert_eq!(metadata.get("via"), Some("https://c.test/"));

        let err = http_record(Headers::new(), "").body_as_metadata().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unsupported(_)));
    }

    #[test]
    fn outlinks_come_from_the_metadata_attachment() {
        let mut record = http_record(Headers::new(), "");
        record.attach(ArchivedRecord::new([("WARC-Type", "request")].into_iter().collect(), None, Body::empty()));
        assert!(record.outlinks_attachment().is_none());
        record.attach(ArchivedRecord::new([("WARC-Type", "metadata")].into_iter().collect(), None, Body::empty()));
        assert_eq!(record.outlinks_attachment().and_then(|r| r.warc_type().map(str::to_string)).as_deref(), Some("metadata"));
        assert_eq!(record.attachments().len(), 2);
    }

    #[test]
    fn physical_files_are_removed_with_the_record() {
        let mut record = http_record(Headers::new(), "materialize me");
        let path = record.body_as_physical_file().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"materialize me");
        drop(record);
        assert!(!path.exists());
    }

    #[test]
    fn local_captures_use_their_own_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"<html></html>").unwrap();
        let mut record = ArchivedRecord::local_file(file.path()).unwrap();
        assert_eq!(record.body_as_physical_file().unwrap(), file.path());
        assert_eq!(record.decoded_body().unwrap(), b"<html></html>");
        assert!(!record.is_http());
        assert!(record.warc_type().is_none());
    }

    #[test]
    fn revisit_profile_detection() {
        let headers: Headers = [("WARC-Type", "revisit"), ("WARC-Profile", SUPPORTED_REVISIT_PROFILE)].into_iter().collect();
        assert!(ArchivedRecord::new(headers, None, Body::empty()).is_supported_revisit());
        let headers: Headers = [("WARC-Type", "revisit"), ("WARC-Profile", "http://netpreserve.org/warc/1.0/revisit/identical-payload-digest")]
            .into_iter()
            .collect();
        assert!(!ArchivedRecord::new(headers, None, Body::empty()).is_supported_revisit());
    }

    #[test]
    fn site_config_is_resolved_once() {
        let sites = SiteConfigs::from_toml_str("[\"example.com\"]\ndeactivate_scripts = true").unwrap();
        let record = http_record(Headers::new(), "");
        let first = record.site_config(&sites).unwrap();
        assert!(first.deactivate_scripts);
        assert!(Arc::ptr_eq(&first, &record.site_config(&sites).unwrap()));
    }
}
