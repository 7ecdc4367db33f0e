//! Deciding what a record is served as, and producing it.

use crate::consts::{HTML_SIGNATURE, JAVASCRIPT_TYPES, SNIFF_LENGTH};
use crate::context::RewriteContext;
use crate::error::{ErrorKind, Result};
use crate::link::LinkInterceptor;
use crate::media::{Ffmpeg, MediaConverter};
use crate::representation::Representation;
use crate::{css, html, javascript};
use exn::ResultExt;
use mirror_config::{MediaSettings, Memo, ReplaySettings, Settings, SiteConfigs};
use mirror_encoding::PeekableReader;
use mirror_resolve::{IndexResolver, Locator};
use mirror_warc::ArchivedRecord;
use mirror_warc::error::ErrorKind as RecordErrorKind;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// What a render produced.
#[derive(Debug)]
pub enum Output {
    /// The record itself, to be streamed as stored.
    Record(Box<ArchivedRecord>),
    /// Rewritten or converted bytes.
    Bytes(Arc<[u8]>),
}

impl Output {
    /// Copy the output into `writer`, decoding streamed records on the way.
    pub fn write_to(self, writer: &mut impl Write) -> Result<u64> {
        match self {
            Output::Record(mut record) => {
                let mut reader = record.decoded_reader().map_err(ErrorKind::record)?;
                std::io::copy(&mut reader, writer).or_raise(|| ErrorKind::Record(RecordErrorKind::Io))
            },
            Output::Bytes(bytes) => {
                writer.write_all(&bytes).or_raise(|| ErrorKind::Record(RecordErrorKind::Io))?;
                Ok(bytes.len() as u64)
            },
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Output::Record(mut record) => record.decoded_body().map_err(ErrorKind::record),
            Output::Bytes(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self, Output::Record(_))
    }
}

#[derive(Debug)]
pub struct Rendered {
    pub content_type: String,
    pub output: Output,
    /// Links discovered in the document, empty unless it was rewritten.
    pub outlinks: Vec<String>,
}

struct Rewritten {
    body: Arc<[u8]>,
    outlinks: Vec<String>,
}

/// Shared replay state: site rules, the optional resolver and converter, and
/// the memoized results of expensive renders.
///
/// Construct once and share by reference; every request gets its own
/// [`RewriteEngine`] from [`Replayer::engine`].
pub struct Replayer {
    host: String,
    stream_file_size: u64,
    max_render_depth: usize,
    media: MediaSettings,
    sites: Arc<SiteConfigs>,
    resolver: Option<IndexResolver>,
    converter: Option<Arc<dyn MediaConverter>>,
    rewritten: Memo<String, Arc<Rewritten>>,
    thumbnails: Memo<String, Arc<[u8]>>,
}

impl Replayer {
    pub fn new(host: impl Into<String>, sites: Arc<SiteConfigs>) -> Self {
        let replay = ReplaySettings::default();
        Self {
            host: host.into(),
            stream_file_size: replay.stream_file_size,
            max_render_depth: replay.max_render_depth,
            media: MediaSettings::default(),
            sites,
            resolver: None,
            converter: None,
            rewritten: Memo::new(),
            thumbnails: Memo::new(),
        }
    }

    /// Replay state from settings, with `ffmpeg` picked up from the `PATH`
    /// when it is installed.
    pub fn from_settings(settings: &Settings, sites: Arc<SiteConfigs>) -> Self {
        let mut replayer = Self::new(&settings.replay.host, sites)
            .with_stream_file_size(settings.replay.stream_file_size)
            .with_max_render_depth(settings.replay.max_render_depth);
        replayer.media = settings.media.clone();
        if let Some(ffmpeg) = Ffmpeg::discover() {
            replayer.converter = Some(Arc::new(ffmpeg));
        }
        replayer
    }

    /// Needed to find the images and videos a page stands for.
    pub fn with_resolver(mut self, resolver: IndexResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_media_converter(mut self, converter: Arc<dyn MediaConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn with_media_settings(mut self, media: MediaSettings) -> Self {
        self.media = media;
        self
    }

    /// Bodies larger than this are streamed untouched.
    pub fn with_stream_file_size(mut self, size: u64) -> Self {
        self.stream_file_size = size;
        self
    }

    pub fn with_max_render_depth(mut self, depth: usize) -> Self {
        self.max_render_depth = depth;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn sites(&self) -> &SiteConfigs {
        &self.sites
    }

    pub fn engine(&self, record: ArchivedRecord, representation: Representation) -> RewriteEngine<'_> {
        RewriteEngine {
            replayer: self,
            record,
            locator: None,
            context: RewriteContext::new(representation),
            content_type: None,
        }
    }

    /// Resolve `uri` and render what it resolves to.
    pub fn render_uri(&self, uri: &str, representation: Representation) -> Result<Rendered> {
        let Some(resolver) = &self.resolver else {
            tracing::warn!(uri, "no resolver configured");
            exn::bail!(ErrorKind::Config);
        };
        let resolution = resolver.resolve(uri).map_err(ErrorKind::resolve)?;
        self.engine(resolution.record, representation).with_locator(resolution.locator).render()
    }
}

/// One record bound to one request.
pub struct RewriteEngine<'a> {
    replayer: &'a Replayer,
    record: ArchivedRecord,
    locator: Option<Locator>,
    context: RewriteContext,
    content_type: Option<String>,
}

impl<'a> RewriteEngine<'a> {
    /// The index entry the record came from, which lists the media a page
    /// links to.
    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Serve the record as this type whatever it declares.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Resolve relative links against `url` instead of the record's URI.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.context.base_override = Some(url.into());
        self
    }

    pub fn context(&self) -> &RewriteContext {
        &self.context
    }

    pub fn record(&self) -> &ArchivedRecord {
        &self.record
    }

    /// The type the record is served as.
    ///
    /// In order: an explicit override, the requested representation, the
    /// captured `Content-Type` (or the index's), the container's own type for
    /// non-HTTP records, and finally a look at the first bytes of the body.
    pub fn effective_content_type(&mut self) -> Result<String> {
        if let Some(content_type) = &self.content_type {
            return Ok(content_type.clone());
        }
        if let Some(mime) = self.context.representation.mime_type() {
            return Ok(mime.to_string());
        }
        if let Some(content_type) = self.record.content_type().filter(|ct| !ct.trim().is_empty()) {
            return Ok(content_type.to_string());
        }
        if !self.record.is_http()
            && let Some(content_type) = self.record.warc_content_type()
        {
            return Ok(content_type.to_string());
        }

        let mut body = PeekableReader::new(self.record.decoded_reader().map_err(ErrorKind::record)?);
        let head = body.peek(SNIFF_LENGTH).or_raise(|| ErrorKind::Record(RecordErrorKind::Encoding))?;
        Ok(match HTML_SIGNATURE.is_match(head) {
            true => "text/html".to_string(),
            false => FALLBACK_CONTENT_TYPE.to_string(),
        })
    }

    #[instrument(skip(self), fields(
        uri = self.record.target_uri(),
        representation = %self.context.representation,
        depth = self.context.depth,
        content_type,
    ))]
    pub fn render(mut self) -> Result<Rendered> {
        let content_type = self.effective_content_type()?;
        let mime = essence(&content_type);
        tracing::Span::current().record("content_type", mime.as_str());
        let representation = self.context.representation;

        let is_local = self.record.http().is_none() && self.record.body().path().is_some();
        let is_video = mime.starts_with("video/");
        if representation != Representation::Image
            && (is_local || is_video || self.record.body().len() > self.replayer.stream_file_size)
        {
            tracing::debug!(size = self.record.body().len(), is_local, "streaming record as stored");
            return Ok(Rendered { content_type, output: Output::Record(Box::new(self.record)), outlinks: Vec::new() });
        }

        if mime == "text/html" && representation.is_media() {
            return self.render_media_for_page(representation);
        }
        if representation == Representation::Image && is_video {
            return self.thumbnail();
        }
        if mime == "text/html" || mime == "text/css" || JAVASCRIPT_TYPES.contains(&mime.as_str()) {
            return self.rewrite(content_type, mime);
        }

        let body = self.record.decoded_body().map_err(ErrorKind::record)?;
        Ok(Rendered { content_type, output: Output::Bytes(Arc::from(body)), outlinks: Vec::new() })
    }

    /// A page requested as an image or video: the first of its linked media
    /// that renders, else the page itself.
    fn render_media_for_page(mut self, representation: Representation) -> Result<Rendered> {
        let replayer = self.replayer;
        let resolver = replayer.resolver.as_ref().filter(|_| self.context.depth < replayer.max_render_depth);
        if let Some(resolver) = resolver {
            let resolver = resolver.clone().with_best_effort(true);
            for candidate in self.media_candidates(representation)? {
                let resolution = match resolver.resolve(&candidate) {
                    Ok(resolution) => resolution,
                    Err(err) => {
                        tracing::debug!(candidate = %candidate, error = %err, "media candidate not archived");
                        continue;
                    },
                };
                let nested = RewriteEngine {
                    replayer,
                    record: resolution.record,
                    locator: Some(resolution.locator),
                    context: self.context.nested(representation),
                    content_type: None,
                };
                match nested.render() {
                    Ok(rendered) => return Ok(rendered),
                    Err(err) => tracing::debug!(candidate = %candidate, error = %err, "media candidate failed to render"),
                }
            }
        } else if self.context.depth >= replayer.max_render_depth {
            tracing::debug!(depth = self.context.depth, "render depth reached, serving the page");
        }

        self.context.representation = Representation::Html;
        self.render()
    }

    fn media_candidates(&mut self, representation: Representation) -> Result<Vec<String>> {
        let mut candidates = Vec::new();
        if let Some(locator) = &self.locator {
            candidates.extend(locator.video.iter().cloned());
            if representation == Representation::Image {
                candidates.extend(locator.image.iter().cloned());
            }
        }
        if representation == Representation::Image {
            let body = self.record.decoded_body().map_err(ErrorKind::record)?;
            if let Some(image) = html::social_image(&String::from_utf8_lossy(&body)) {
                let page = self.context.base_override.as_deref().or(self.record.target_uri());
                let absolute = page.and_then(|page| Url::parse(page).ok()).and_then(|page| page.join(&image).ok());
                candidates.push(absolute.map(String::from).unwrap_or(image));
            }
        }
        Ok(candidates)
    }

    fn thumbnail(mut self) -> Result<Rendered> {
        let replayer = self.replayer;
        let Some(converter) = replayer.converter.clone() else {
            exn::bail!(ErrorKind::ExternalProcess("no media converter available".to_string()));
        };
        let method = replayer.media.thumbnail_method;
        let quality = replayer.media.thumbnail_quality;
        let key = self.record.target_uri().map(|uri| format!("{method:?}:{uri}"));

        let record = &mut self.record;
        let mut produce = || -> Result<Arc<[u8]>> {
            let path = record.body_as_physical_file().map_err(ErrorKind::record)?;
            converter.thumbnail(&path, method, quality).map(Arc::from)
        };
        let bytes = match key {
            Some(key) => replayer.thumbnails.try_get_or_populate(key, Duration::ZERO, produce)?,
            None => produce()?,
        };
        Ok(Rendered { content_type: method.mime_type().to_string(), output: Output::Bytes(bytes), outlinks: Vec::new() })
    }

    fn rewrite(mut self, content_type: String, mime: String) -> Result<Rendered> {
        let replayer = self.replayer;
        let document = self.context.base_override.clone().or_else(|| self.record.target_uri().map(str::to_string));
        let key = document.as_ref().map(|document| format!("{mime}:{document}"));

        let record = &mut self.record;
        let mut produce = || -> Result<Arc<Rewritten>> {
            let site = record.site_config(&replayer.sites).map_err(ErrorKind::record)?;
            let body = record.decoded_body().map_err(ErrorKind::record)?;
            let text = String::from_utf8_lossy(&body);
            let mut links = LinkInterceptor::new(&replayer.host, &replayer.sites, site, document.as_deref());
            let output = match mime.as_str() {
                "text/html" => html::rewrite(&text, &mut links),
                "text/css" => css::rewrite(&text, false, &mut links),
                _ => javascript::rewrite(&text, false, &mut links),
            };
            let outlinks = links.into_outlinks().into_vec();
            tracing::debug!(size = output.len(), outlinks = outlinks.len(), "rewrote document");
            Ok(Arc::new(Rewritten { body: Arc::from(output.into_bytes()), outlinks }))
        };
        let rewritten = match key {
            Some(key) => replayer.rewritten.try_get_or_populate(key, Duration::ZERO, produce)?,
            None => produce()?,
        };
        Ok(Rendered {
            content_type,
            output: Output::Bytes(Arc::clone(&rewritten.body)),
            outlinks: rewritten.outlinks.clone(),
        })
    }
}

/// The media type without parameters, lowercased.
fn essence(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_config::ThumbnailMethod;
    use mirror_resolve::{BuiltinBrotli, Constraint, Field, FileResolver, IndexQuery, IndexService, MemoryIndex};
    use mirror_url::{Canonicalizer, UrlParts};
    use mirror_warc::{Body, HTTP_RESPONSE_TYPES, Headers, HttpHead, WarcWriter};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PAGE: &str = "https://site.test/index";

    fn replayer() -> Replayer {
        Replayer::new("http://localhost/", Arc::new(SiteConfigs::from_toml_str("").unwrap()))
    }

    fn record(uri: &str, content_type: Option<&str>, body: &[u8]) -> ArchivedRecord {
        let headers: Headers =
            [("WARC-Type", "response"), ("WARC-Target-URI", uri), ("Content-Type", HTTP_RESPONSE_TYPES[0])].into_iter().collect();
        let http_headers: Headers = content_type.map(|ct| ("Content-Type", ct)).into_iter().collect();
        ArchivedRecord::new(headers, Some(HttpHead::new(200, http_headers)), Body::from_bytes(body.to_vec()))
    }

    /// Returns the same bytes for every video and counts the calls.
    #[derive(Default)]
    struct FakeConverter {
        calls: AtomicUsize,
    }

    impl MediaConverter for FakeConverter {
        fn thumbnail(&self, source: &Path, _: ThumbnailMethod, _: u8) -> Result<Vec<u8>> {
            assert!(source.exists());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(b"PNG".to_vec())
        }
    }

    #[test]
    fn pages_are_rewritten_with_outlinks() {
        let replayer = replayer();
        let page = record(PAGE, Some("text/html; charset=utf-8"), br#"<a href="/foo">x</a><a href="/foo">y</a>"#);
        let rendered = replayer.engine(page, Representation::None).render().unwrap();
        assert_eq!(rendered.content_type, "text/html; charset=utf-8");
        assert_eq!(rendered.outlinks, ["https://site.test/foo"]);
        let body = String::from_utf8(rendered.output.into_bytes().unwrap()).unwrap();
        assert!(body.contains(r#"href="http://localhost/https://site.test/foo""#));
    }

    #[test]
    fn rewrites_are_memoized_per_document() {
        let replayer = replayer();
        let first = replayer.engine(record(PAGE, Some("text/html"), b"<p>first</p>"), Representation::None).render().unwrap();
        let second = replayer.engine(record(PAGE, Some("text/html"), b"<p>second</p>"), Representation::None).render().unwrap();
        assert_eq!(first.output.into_bytes().unwrap(), second.output.into_bytes().unwrap());

        // The same document as a stylesheet is a different rewrite.
        let css = replayer.engine(record(PAGE, Some("text/html"), b"<p>third</p>"), Representation::Css).render().unwrap();
        assert_eq!(css.content_type, "text/css");
        assert_eq!(css.output.into_bytes().unwrap(), b"<p>third</p>");
    }

    #[test]
    fn representations_force_the_pass() {
        let replayer = replayer();
        let sheet = record("https://site.test/s", Some("text/plain"), b"a { background: url(/bg.png) }");
        let rendered = replayer.engine(sheet, Representation::Css).render().unwrap();
        assert_eq!(rendered.content_type, "text/css");
        assert_eq!(rendered.output.into_bytes().unwrap(), b"a { background: url(http://localhost/https://site.test/bg.png) }");
        assert_eq!(rendered.outlinks, ["https://site.test/bg.png"]);
    }

    #[test]
    fn large_bodies_are_streamed() {
        let replayer = replayer().with_stream_file_size(4);
        let rendered = replayer.engine(record(PAGE, Some("text/html"), b"<a href=/x>x</a>"), Representation::None).render().unwrap();
        assert!(rendered.output.is_streamed());
        assert!(rendered.outlinks.is_empty());
        let mut served = Vec::new();
        rendered.output.write_to(&mut served).unwrap();
        assert_eq!(served, b"<a href=/x>x</a>");
    }

    #[test]
    fn other_types_pass_through() {
        let rendered = replayer().engine(record("https://site.test/a.png", Some("image/png"), b"\x89PNG"), Representation::None).render().unwrap();
        assert_eq!(rendered.content_type, "image/png");
        assert!(!rendered.output.is_streamed());
        assert_eq!(rendered.output.into_bytes().unwrap(), b"\x89PNG");
    }

    #[test]
    fn undeclared_types_are_sniffed() {
        let replayer = replayer();
        let mut html = replayer.engine(record(PAGE, None, b"\xEF\xBB\xBF  <!DOCTYPE html><p>"), Representation::None);
        assert_eq!(html.effective_content_type().unwrap(), "text/html");
        let mut binary = replayer.engine(record(PAGE, None, b"\x00\x01"), Representation::None);
        assert_eq!(binary.effective_content_type().unwrap(), FALLBACK_CONTENT_TYPE);
        let mut forced = replayer.engine(record(PAGE, None, b"\x00"), Representation::None).with_content_type("text/plain");
        assert_eq!(forced.effective_content_type().unwrap(), "text/plain");
    }

    #[test]
    fn sniffing_looks_at_the_decoded_body() {
        let body = mirror_encoding::Encoding::Gzip.encode(b"<html><p>zipped</p></html>").unwrap();
        let headers: Headers =
            [("WARC-Type", "response"), ("WARC-Target-URI", PAGE), ("Content-Type", HTTP_RESPONSE_TYPES[0])].into_iter().collect();
        let http_headers: Headers = [("Content-Encoding", "gzip")].into_iter().collect();
        let zipped = ArchivedRecord::new(headers, Some(HttpHead::new(200, http_headers)), Body::from_bytes(body));
        let replayer = replayer();
        let mut engine = replayer.engine(zipped, Representation::None);
        assert_eq!(engine.effective_content_type().unwrap(), "text/html");
    }

    #[test]
    fn base_urls_override_the_record() {
        let page = record(PAGE, Some("text/html"), br#"<img src="a.png">"#);
        let rendered = replayer().engine(page, Representation::None).with_base_url("https://mirror.test/dir/").render().unwrap();
        assert_eq!(rendered.outlinks, ["https://mirror.test/dir/a.png"]);
    }

    #[test]
    fn video_thumbnails_are_memoized() {
        let converter = Arc::new(FakeConverter::default());
        let replayer = replayer().with_media_converter(converter.clone());
        for _ in 0..2 {
            let video = record("https://site.test/v.mp4", Some("video/mp4"), b"not really a video");
            let rendered = replayer.engine(video, Representation::Image).render().unwrap();
            assert_eq!(rendered.content_type, "image/png");
            assert_eq!(rendered.output.into_bytes().unwrap(), b"PNG");
        }
        assert_eq!(converter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn videos_stream_unless_an_image_is_asked_for() {
        let video = record("https://site.test/v.mp4", Some("video/mp4"), b"frames");
        let rendered = replayer().engine(video, Representation::Video).render().unwrap();
        assert!(rendered.output.is_streamed());
    }

    #[test]
    fn thumbnails_need_a_converter() {
        let video = record("https://site.test/v.mp4", Some("video/mp4"), b"frames");
        let err = replayer().engine(video, Representation::Image).render().unwrap_err();
        assert!(matches!(&*err, ErrorKind::ExternalProcess(_)));
    }

    #[test]
    fn pages_without_media_fall_back_to_the_page() {
        let page = record(PAGE, Some("text/html"), br#"<a href="/foo">x</a>"#);
        let rendered = replayer().engine(page, Representation::Image).render().unwrap();
        assert_eq!(rendered.content_type, "text/html");
        assert_eq!(rendered.outlinks, ["https://site.test/foo"]);
    }

    /// Write the captures into one container under `dir/warc` and index them.
    fn archive(dir: &Path, captures: &[(&str, &str, &str, &str)]) -> MemoryIndex {
        let mut writer = WarcWriter::new(Vec::new());
        writer.write_start().unwrap();
        let index = MemoryIndex::default();
        for (id, url, content_type, body) in captures {
            let mut capture = record(url, Some(*content_type), body.as_bytes());
            let position = writer.written();
            writer.write_entry(&mut capture, true).unwrap();
            let parts = UrlParts::parse(url).unwrap();
            index.insert(Locator {
                id: id.to_string(),
                source_file: "crawl.warc".into(),
                position,
                warc_type: Some("response".into()),
                status: Some(200),
                url: url.to_string(),
                content_type: Some(content_type.to_string()),
                basename: parts.basename,
                tlds: parts.tlds,
                ..Locator::default()
            });
        }
        std::fs::create_dir_all(dir.join("warc")).unwrap();
        std::fs::write(dir.join("warc/crawl.warc"), writer.into_inner()).unwrap();
        index
    }

    fn resolver(dir: &Path, index: MemoryIndex) -> IndexResolver {
        let files = FileResolver::new(dir.join("warc"), dir.join("cache")).with_decompressor(Arc::new(BuiltinBrotli));
        IndexResolver::new(Arc::new(index), Arc::new(files), Arc::new(Canonicalizer::empty()))
    }

    const CARD_PAGE: &str = r#"<html><head><meta property="og:image" content="/cat.png"></head><body>cat</body></html>"#;

    #[test]
    fn pages_requested_as_images_serve_their_card() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[
            ("page", PAGE, "text/html", CARD_PAGE),
            ("cat", "https://site.test/cat.png", "image/png", "PNG cat"),
        ]);
        let replayer = replayer().with_resolver(resolver(dir.path(), index));
        let rendered = replayer.render_uri(PAGE, Representation::Image).unwrap();
        assert_eq!(rendered.content_type, "image/png");
        assert_eq!(rendered.output.into_bytes().unwrap(), b"PNG cat");

        let page = replayer.render_uri(PAGE, Representation::None).unwrap();
        assert_eq!(page.content_type, "text/html");
    }

    #[test]
    fn linked_videos_become_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[
            ("page", PAGE, "text/html", "<p>watch</p>"),
            ("clip", "https://site.test/clip.mp4", "video/mp4", "frames"),
        ]);
        let locator = index.search(&IndexQuery::new(Constraint::term(Field::Id, "page"))).unwrap().remove(0);
        let locator = Locator { video: vec!["https://site.test/clip.mp4".into()], ..locator };
        let replayer = replayer().with_resolver(resolver(dir.path(), index)).with_media_converter(Arc::new(FakeConverter::default()));

        let page = record(PAGE, Some("text/html"), b"<p>watch</p>");
        let rendered = replayer.engine(page, Representation::Image).with_locator(locator).render().unwrap();
        assert_eq!(rendered.content_type, "image/png");
        assert_eq!(rendered.output.into_bytes().unwrap(), b"PNG");
    }

    #[test]
    fn nested_renders_stop_at_the_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[
            ("page", PAGE, "text/html", CARD_PAGE),
            ("cat", "https://site.test/cat.png", "image/png", "PNG cat"),
        ]);
        let replayer = replayer().with_resolver(resolver(dir.path(), index)).with_max_render_depth(0);
        let rendered = replayer.render_uri(PAGE, Representation::Image).unwrap();
        assert_eq!(rendered.content_type, "text/html");
    }

    #[test]
    fn missing_resolvers_are_configuration_errors() {
        let err = replayer().render_uri(PAGE, Representation::None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config));
    }

    #[test]
    fn unknown_uris_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[]);
        let replayer = replayer().with_resolver(resolver(dir.path(), index));
        let err = replayer.render_uri("https://site.test/missing", Representation::None).unwrap_err();
        assert!(err.is_not_found());
    }
}
