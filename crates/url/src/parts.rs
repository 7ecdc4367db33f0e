use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use url::Url;

/// The pieces of a URL used for fuzzy index lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: Option<String>,
    /// Final path segment, empty for directory URLs.
    pub basename: String,
    /// Every non-empty path segment, the basename included.
    pub directories: Vec<String>,
    /// Host labels, most significant last (`["www", "example", "com"]`).
    pub tlds: Vec<String>,
}

impl UrlParts {
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).or_raise(|| ErrorKind::InvalidUrl(url.to_string()))?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        let mut segments: Vec<String> = parsed
            .path_segments()
            .map(|segments| segments.map(str::to_string).collect())
            .unwrap_or_default();
        let basename = segments.last().cloned().unwrap_or_default();
        segments.retain(|segment| !segment.is_empty());

        Ok(Self {
            scheme: parsed.scheme().to_string(),
            tlds: host.split('.').filter(|label| !label.is_empty()).map(str::to_string).collect(),
            host,
            path: parsed.path().to_string(),
            query: parsed.query().map(str::to_string),
            basename,
            directories: segments,
        })
    }
}
