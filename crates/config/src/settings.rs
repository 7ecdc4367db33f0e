//! Process-wide settings.
//!
//! Sources, lowest priority first:
//!
//! 1. Compiled defaults ([`Settings::default`])
//! 2. A TOML file, by default `settings.toml` in the platform config directory
//! 3. `MIRROR_`-prefixed environment variables, with `__` separating
//!    sections (`MIRROR_REPLAY__HOST=https://mirror.test/`)

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "MIRROR_";
const SETTINGS_FILE: &str = "settings.toml";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "mirror", "mirror")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub archive: ArchiveSettings,
    pub writer: WriterSettings,
    pub replay: ReplaySettings,
    pub media: MediaSettings,
    pub rules: RuleSettings,
}

/// Where containers live and how much decompressed data may be cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    /// Root searched for container files.
    pub warc_directory: PathBuf,
    /// Decompressed copies of compressed containers.
    pub cache_directory: PathBuf,
    /// Cache budget in bytes; oldest files are evicted past this.
    pub cache_cleanup_size: u64,
    /// How many directory levels below the root to search.
    pub search_depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    pub directory: PathBuf,
    /// Output files past this many bytes are closed and replaced.
    pub rollover_size: u64,
    /// Open handle limit; the oldest handle is closed past this.
    pub max_open_files: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Public prefix replayed links are rewritten onto.
    pub host: String,
    /// Bodies larger than this are streamed, never rewritten.
    pub stream_file_size: u64,
    /// Bodies larger than this are spooled to a temp file while parsing.
    pub spool_threshold: u64,
    /// Redirect and revisit hops followed before giving up.
    pub max_redirects: usize,
    /// Nested renders (HTML to linked image, and so on) before giving up.
    pub max_render_depth: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailMethod {
    /// A single PNG frame.
    #[default]
    Frame,
    /// A short animated GIF.
    Gif,
    /// A short animated WebP.
    Webp,
}

impl ThumbnailMethod {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ThumbnailMethod::Frame => "image/png",
            ThumbnailMethod::Gif => "image/gif",
            ThumbnailMethod::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub thumbnail_method: ThumbnailMethod,
    /// WebP quality, 0 to 100.
    pub thumbnail_quality: u8,
}

/// Optional user rule files layered over the built-in ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    pub sites_file: Option<PathBuf>,
    /// Directory holding `canonical*.toml` overrides.
    pub canonical_directory: Option<PathBuf>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        let dirs = project_dirs();
        Self {
            warc_directory: dirs.as_ref().map(|d| d.data_dir().join("warc")).unwrap_or_else(|| "warc".into()),
            cache_directory: dirs.as_ref().map(|d| d.cache_dir().join("warc")).unwrap_or_else(|| "cache".into()),
            cache_cleanup_size: 20 * 1024 * 1024 * 1024,
            search_depth: 2,
        }
    }
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            directory: project_dirs().map(|d| d.data_dir().join("incoming")).unwrap_or_else(|| "incoming".into()),
            rollover_size: 1024 * 1024 * 1024,
            max_open_files: 5000,
        }
    }
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            host: "http://localhost/".to_string(),
            stream_file_size: 64 * 1024 * 1024,
            spool_threshold: 16 * 1024 * 1024,
            max_redirects: 10,
            max_render_depth: 3,
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self { thumbnail_method: ThumbnailMethod::Frame, thumbnail_quality: 50 }
    }
}

impl Settings {
    /// Default settings file location for this platform.
    pub fn default_file() -> Option<PathBuf> {
        project_dirs().map(|d| d.config_dir().join(SETTINGS_FILE))
    }

    /// The layered source, exposed so callers can add providers.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(file) = file.map(Path::to_path_buf).or_else(Self::default_file) {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    #[tracing::instrument]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let settings: Settings = Self::figment(file).extract().or_raise(|| ErrorKind::Invalid("settings".to_string()))?;
        tracing::debug!(
            warc_directory = %settings.archive.warc_directory.display(),
            replay_host = %settings.replay.host,
            "settings loaded"
        );
        Ok(settings)
    }
}
