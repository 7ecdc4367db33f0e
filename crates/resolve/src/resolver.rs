//! From a requested URL to the record that answers it.

use crate::error::{ErrorKind, Result};
use crate::files::FileResolver;
use crate::index::{Constraint, Field, IndexHandle, IndexQuery, IndexService, Locator, Sort};
use exn::{OptionExt, ResultExt};
use mirror_config::Settings;
use mirror_url::{Canonicalizer, Flags, UrlParts};
use mirror_warc::{ArchivedRecord, IndexHints};
use percent_encoding::percent_decode_str;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;
use url::Url;

/// Most locators returned by [`IndexResolver::get_matches`].
pub const MAX_MATCHES: usize = 10;

/// A resolved request.
#[derive(Debug)]
pub struct Resolution {
    pub record: ArchivedRecord,
    /// The index entry the record was loaded from.
    pub locator: Locator,
    /// Every URL looked up, starting with the request and ending with the
    /// one that produced `record`.
    pub chain: Vec<String>,
}

impl Resolution {
    /// Redirects followed.
    pub fn hops(&self) -> usize {
        self.chain.len().saturating_sub(1)
    }
}

/// Looks captures up in the index and loads them from their containers.
///
/// Redirect chains are followed up to a fixed number of hops and abandoned
/// as soon as they revisit a URL.
#[derive(Clone)]
pub struct IndexResolver {
    index: IndexHandle,
    files: Arc<FileResolver>,
    canonicalizer: Arc<Canonicalizer>,
    max_redirects: usize,
    best_effort: bool,
}

impl IndexResolver {
    pub fn new(index: IndexHandle, files: Arc<FileResolver>, canonicalizer: Arc<Canonicalizer>) -> Self {
        Self { index, files, canonicalizer, max_redirects: 10, best_effort: false }
    }

    pub fn from_settings(
        settings: &Settings,
        index: IndexHandle,
        files: Arc<FileResolver>,
        canonicalizer: Arc<Canonicalizer>,
    ) -> Self {
        Self::new(index, files, canonicalizer).with_max_redirects(settings.replay.max_redirects)
    }

    pub fn with_max_redirects(mut self, hops: usize) -> Self {
        self.max_redirects = hops;
        self
    }

    /// Also match captures sharing only a file name and a host label.
    pub fn with_best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    pub fn best_effort(&self) -> bool {
        self.best_effort
    }

    pub fn canonicalizer(&self) -> &Arc<Canonicalizer> {
        &self.canonicalizer
    }

    /// Index entries for `uri`, best first.
    ///
    /// Input without a scheme is an index identifier. A URL is looked up in
    /// three passes whose results are kept in this order:
    ///
    /// 1. Successful responses under any duplicate or filetype-equivalent
    ///    variant, or a local capture stored under the decoded URL
    /// 2. Any capture under the plain variants, except `307` redirects
    /// 3. With best effort only, `200` responses sharing the file name and
    ///    at least one host label
    ///
    /// Each pass is sorted newest first. Repeats are dropped.
    #[instrument(skip(self), fields(matches))]
    pub fn get_matches(&self, uri: &str) -> Result<Vec<Locator>> {
        if !uri.contains(':') {
            let found = self.index.search(&IndexQuery::new(Constraint::term(Field::Id, uri)).limit(1))?;
            tracing::Span::current().record("matches", found.len());
            return Ok(found);
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for query in self.queries(uri) {
            for locator in self.index.search(&query.limit(MAX_MATCHES))? {
                if seen.insert(locator.id.clone()) {
                    found.push(locator);
                }
            }
        }
        found.truncate(MAX_MATCHES);
        tracing::Span::current().record("matches", found.len());
        Ok(found)
    }

    fn queries(&self, uri: &str) -> Vec<IndexQuery> {
        let all_variants = self.canonicalizer.canonicalize(
            uri,
            Flags::DUPLICATES | Flags::UNCERTAIN_DUPLICATES | Flags::FILETYPE_EQUIVALENTS,
        );
        let duplicates = self.canonicalizer.canonicalize(uri, Flags::DUPLICATES);
        let plain = self.canonicalizer.canonicalize(uri, Flags::NONE);

        let mut queries = vec![
            IndexQuery::new(Constraint::Should(vec![
                Constraint::Must(vec![
                    Constraint::term(Field::WarcType, "response"),
                    Constraint::term(Field::Status, 200),
                    Constraint::terms(Field::Url, &all_variants),
                ]),
                Constraint::Must(vec![
                    Constraint::term(Field::LocalFile, true),
                    Constraint::term(Field::Url, url_decode(uri)),
                ]),
            ])),
            IndexQuery::new(Constraint::Must(vec![
                Constraint::Should(vec![
                    Constraint::terms(Field::Url, &duplicates),
                    Constraint::terms(Field::Url, &plain),
                    Constraint::terms(Field::FullyCanonicalizedUrl, &plain),
                ]),
                Constraint::must_not(Constraint::term(Field::Status, 307)),
            ])),
        ];

        if self.best_effort {
            let canonical = duplicates.first().map(String::as_str).unwrap_or(uri);
            match (UrlParts::parse(uri), UrlParts::parse(canonical)) {
                (Ok(requested), Ok(canonical)) => queries.push(IndexQuery::new(Constraint::Must(vec![
                    Constraint::terms(Field::Basename, [&requested.basename, &canonical.basename]),
                    Constraint::Should(vec![
                        Constraint::terms(Field::Tlds, &requested.tlds),
                        Constraint::terms(Field::Tlds, &canonical.tlds),
                    ]),
                    Constraint::term(Field::Status, 200),
                ]))),
                (Err(err), _) | (_, Err(err)) => {
                    tracing::debug!(uri, error = %err, "skipping best-effort lookup for unparseable URL");
                },
            }
        }
        queries
    }

    /// Follow `uri` through revisits and redirects to a loaded record.
    #[instrument(skip(self), fields(hops))]
    pub fn resolve(&self, uri: &str) -> Result<Resolution> {
        let mut chain = vec![uri.to_string()];
        loop {
            let current = chain.last().map(String::as_str).unwrap_or(uri);
            let mut locator = self.get_matches(current)?.into_iter().next();
            if let Some(revisit) = locator.take_if(|l| l.is_revisit()) {
                locator = self.revisited(&revisit)?;
            }
            let locator = locator.ok_or_raise(|| ErrorKind::NotFound(current.to_string()))?;

            let location = locator.header("Location").filter(|l| !l.trim().is_empty());
            if let (true, Some(location)) = (locator.is_redirect(), location) {
                let next = join(current, location.trim())?;
                if chain.len() > self.max_redirects {
                    tracing::warn!(uri, hops = chain.len() - 1, "redirect limit reached");
                    exn::bail!(ErrorKind::NotFound(format!("{uri} (more than {} redirects)", self.max_redirects)));
                }
                if chain.contains(&next) {
                    tracing::warn!(uri, next = %next, "redirect loop");
                    exn::bail!(ErrorKind::NotFound(format!("{uri} (redirect loop at {next})")));
                }
                tracing::debug!(from = current, to = %next, status = locator.status, "following redirect");
                chain.push(next);
                continue;
            }

            // Redirects without a usable Location are served as captured.
            let record = self.load(&locator)?;
            tracing::Span::current().record("hops", chain.len() - 1);
            return Ok(Resolution { record, locator, chain });
        }
    }

    /// The record answering `uri`.
    pub fn get_archived_record(&self, uri: &str) -> Result<ArchivedRecord> {
        self.resolve(uri).map(|resolution| resolution.record)
    }

    /// The first capture of the content a revisit repeats.
    fn revisited(&self, revisit: &Locator) -> Result<Option<Locator>> {
        let Some(hash) = revisit.revisit_of.as_deref().filter(|h| !h.is_empty()) else {
            tracing::debug!(id = %revisit.id, "revisit without a content hash");
            return Ok(None);
        };
        let query = IndexQuery::new(Constraint::term(Field::ContentHash, hash)).sorted(Sort::Oldest).limit(1);
        let found = self.index.search(&query)?.into_iter().next();
        if found.is_none() {
            tracing::debug!(id = %revisit.id, hash, "revisited capture not indexed");
        }
        Ok(found)
    }

    /// Read the record a locator points at.
    #[instrument(skip_all, fields(source = %locator.source_file, position = locator.position, local = locator.local_file))]
    pub fn load(&self, locator: &Locator) -> Result<ArchivedRecord> {
        let hints = IndexHints {
            url: Some(locator.url.clone()).filter(|url| !url.is_empty()),
            content_type: locator.content_type.clone(),
        };
        if locator.local_file {
            let path = self.files.resolve_physical_path(&locator.source_file)?;
            let record = ArchivedRecord::local_file(&path).or_raise(|| ErrorKind::Io)?;
            return Ok(record.with_index_hints(hints));
        }
        let mut reader = self.files.open_as_container(&locator.source_file, locator.position)?;
        let record = reader
            .next_record()
            .or_raise(|| ErrorKind::Format)?
            .ok_or_raise(|| ErrorKind::NotFound(format!("{}@{}", locator.source_file, locator.position)))?;
        Ok(record.with_index_hints(hints))
    }
}

/// Decode a URL the way form submissions are decoded.
fn url_decode(uri: &str) -> String {
    percent_decode_str(&uri.replace('+', " ")).decode_utf8_lossy().into_owned()
}

/// Resolve a `Location` value against the URL that returned it.
fn join(base: &str, location: &str) -> Result<String> {
    let joined = match Url::parse(base) {
        Ok(base) => base.join(location),
        Err(_) => Url::parse(location),
    };
    joined.map(String::from).or_raise(|| ErrorKind::NotFound(location.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompress::BuiltinBrotli;
    use crate::memory::MemoryIndex;
    use mirror_warc::{Body, HTTP_RESPONSE_TYPES, Headers, HttpHead, WarcWriter};
    use std::path::Path;

    struct Capture {
        id: &'static str,
        url: &'static str,
        status: u16,
        location: Option<&'static str>,
        body: &'static str,
    }

    const fn capture(id: &'static str, url: &'static str, status: u16, location: Option<&'static str>, body: &'static str) -> Capture {
        Capture { id, url, status, location, body }
    }

    /// Write the captures into one container and index them.
    fn archive(dir: &Path, captures: &[Capture]) -> MemoryIndex {
        let mut writer = WarcWriter::new(Vec::new());
        writer.write_start().unwrap();
        let index = MemoryIndex::default();
        for (n, capture) in captures.iter().enumerate() {
            let mut http_headers = Headers::new();
            if let Some(location) = capture.location {
                http_headers.append("Location", location);
            }
            let headers: Headers = [
                ("WARC-Type", "response"),
                ("WARC-Target-URI", capture.url),
                ("Content-Type", HTTP_RESPONSE_TYPES[0]),
            ]
            .into_iter()
            .collect();
            let mut record = ArchivedRecord::new(headers, Some(HttpHead::new(capture.status, http_headers)), Body::from_bytes(capture.body));
            let position = writer.written();
            writer.write_entry(&mut record, true).unwrap();
            let parts = UrlParts::parse(capture.url).unwrap();
            index.insert(Locator {
                id: capture.id.into(),
                source_file: "crawl.warc".into(),
                position,
                warc_type: Some("response".into()),
                status: Some(capture.status),
                headers: capture.location.map(|l| ("Location".to_string(), l.to_string())).into_iter().collect(),
                url: capture.url.into(),
                basename: parts.basename,
                tlds: parts.tlds,
                captured_at: n as i64,
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

    #[test]
    fn redirect_chains_are_followed() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[
            capture("a", "https://site.test/a", 301, Some("https://site.test/b"), ""),
            capture("b", "https://site.test/b", 302, Some("/c"), ""),
            capture("c", "https://site.test/c", 200, None, "X"),
        ]);
        let mut resolution = resolver(dir.path(), index).resolve("https://site.test/a").unwrap();
        assert_eq!(resolution.hops(), 2);
        assert_eq!(resolution.chain, ["https://site.test/a", "https://site.test/b", "https://site.test/c"]);
        assert_eq!(resolution.locator.id, "c");
        assert_eq!(resolution.record.decoded_body().unwrap(), b"X");
    }

    #[test]
    fn redirect_loops_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[
            capture("a", "https://site.test/a", 301, Some("/b"), ""),
            capture("b", "https://site.test/b", 301, Some("/a"), ""),
        ]);
        let err = resolver(dir.path(), index).resolve("https://site.test/a").unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn redirect_chains_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[
            capture("a", "https://site.test/a", 301, Some("/b"), ""),
            capture("b", "https://site.test/b", 301, Some("/c"), ""),
            capture("c", "https://site.test/c", 200, None, "X"),
        ]);
        let resolver = resolver(dir.path(), index).with_max_redirects(1);
        let err = resolver.resolve("https://site.test/a").unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
        assert_eq!(resolver.with_max_redirects(2).resolve("https://site.test/a").unwrap().hops(), 2);
    }

    #[test]
    fn redirects_without_location_are_served_as_captured() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[capture("a", "https://site.test/a", 302, None, "moved")]);
        let resolution = resolver(dir.path(), index).resolve("https://site.test/a").unwrap();
        assert_eq!(resolution.record.status(), Some(302));
        assert_eq!(resolution.hops(), 0);
    }

    #[test]
    fn revisits_without_a_hash_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[]);
        index.insert(Locator {
            id: "r".into(),
            warc_type: Some("revisit".into()),
            url: "https://site.test/a".into(),
            ..Locator::default()
        });
        let err = resolver(dir.path(), index).resolve("https://site.test/a").unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn revisits_resolve_to_the_first_capture() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[
            capture("first", "https://site.test/old", 200, None, "first"),
            capture("second", "https://site.test/older", 200, None, "second"),
        ]);
        for (id, hash, captured_at) in [("first", "h", 5), ("second", "h", 1)] {
            let mut locator = index.search(&IndexQuery::new(Constraint::term(Field::Id, id))).unwrap().remove(0);
            locator.id = format!("{id}-hashed");
            locator.content_hash = Some(hash.into());
            locator.captured_at = captured_at;
            locator.url = String::new();
            index.insert(locator);
        }
        index.insert(Locator {
            id: "r".into(),
            warc_type: Some("revisit".into()),
            revisit_of: Some("h".into()),
            url: "https://site.test/a".into(),
            ..Locator::default()
        });
        let mut resolution = resolver(dir.path(), index).resolve("https://site.test/a").unwrap();
        assert_eq!(resolution.locator.id, "second-hashed");
        assert_eq!(resolution.record.decoded_body().unwrap(), b"second");
    }

    #[test]
    fn unknown_urls_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[capture("a", "https://site.test/a", 200, None, "")]);
        let err = resolver(dir.path(), index).resolve("https://site.test/missing").unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn schemeless_input_is_an_index_id() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[capture("abc123", "https://site.test/a", 200, None, "by id")]);
        let mut record = resolver(dir.path(), index).get_archived_record("abc123").unwrap();
        assert_eq!(record.decoded_body().unwrap(), b"by id");
        assert_eq!(record.target_uri(), Some("https://site.test/a"));
    }

    #[test]
    fn successful_responses_outrank_newer_redirects() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[
            capture("ok", "https://site.test/a", 200, None, "page"),
            capture("moved", "https://site.test/a", 301, Some("https://elsewhere.test/"), ""),
        ]);
        let matches = resolver(dir.path(), index).get_matches("http://site.test/a").unwrap();
        let ids: Vec<_> = matches.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["ok", "moved"]);
    }

    #[test]
    fn temporary_redirects_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[capture("t", "https://site.test/a", 307, Some("/login"), "")]);
        assert!(resolver(dir.path(), index).get_matches("https://site.test/a").unwrap().is_empty());
    }

    #[test]
    fn best_effort_matches_file_names_on_the_same_site() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[capture("img", "https://cdn.site.test/x/photo.jpg", 200, None, "jpg")]);
        let index = Arc::new(index);
        let files = Arc::new(FileResolver::new(dir.path().join("warc"), dir.path().join("cache")));
        let strict = IndexResolver::new(index.clone(), files, Arc::new(Canonicalizer::empty()));
        assert!(strict.get_matches("https://site.test/photo.jpg").unwrap().is_empty());
        let fuzzy = strict.with_best_effort(true);
        assert!(fuzzy.best_effort());
        assert_eq!(fuzzy.get_matches("https://site.test/photo.jpg").unwrap()[0].id, "img");
    }

    #[test]
    fn local_captures_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let index = archive(dir.path(), &[]);
        std::fs::write(dir.path().join("warc/page one.html"), "<p>local</p>").unwrap();
        index.insert(Locator {
            id: "local".into(),
            source_file: "page one.html".into(),
            local_file: true,
            url: "https://site.test/page one.html".into(),
            content_type: Some("text/html".into()),
            ..Locator::default()
        });
        let mut record = resolver(dir.path(), index).get_archived_record("https://site.test/page%20one.html").unwrap();
        assert_eq!(record.decoded_body().unwrap(), b"<p>local</p>");
        assert_eq!(record.content_type(), Some("text/html"));
        assert!(record.http().is_none());
    }
}
