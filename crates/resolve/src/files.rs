//! Mapping container names onto physical, decompressed files.

use crate::decompress::{DecompressorHandle, PreferExternal};
use crate::error::{ErrorKind, Result};
use crate::path::validate;
use exn::{OptionExt, ResultExt};
use mirror_config::Settings;
use mirror_warc::{DEFAULT_SPOOL_THRESHOLD, WarcReader};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, ErrorKind as IoErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

const COMPRESSED_EXTENSION: &str = "br";
const CONTAINER_EXTENSION: &str = "warc";

/// Finds container files below the archive root and keeps decompressed
/// copies of compressed ones in a size-bounded cache directory.
///
/// The cache is shared between processes. A copy that appears while this
/// process was producing its own is used as-is.
pub struct FileResolver {
    warc_directory: PathBuf,
    cache_directory: PathBuf,
    cache_budget: u64,
    search_depth: usize,
    spool_threshold: usize,
    decompressor: DecompressorHandle,
}

impl FileResolver {
    pub fn new(warc_directory: impl Into<PathBuf>, cache_directory: impl Into<PathBuf>) -> Self {
        Self {
            warc_directory: warc_directory.into(),
            cache_directory: cache_directory.into(),
            cache_budget: u64::MAX,
            search_depth: 2,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
            decompressor: Arc::new(PreferExternal::discover()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let spool_threshold = usize::try_from(settings.replay.spool_threshold).unwrap_or(usize::MAX);
        Self::new(&settings.archive.warc_directory, &settings.archive.cache_directory)
            .with_cache_budget(settings.archive.cache_cleanup_size)
            .with_search_depth(settings.archive.search_depth)
            .with_spool_threshold(spool_threshold)
    }

    /// Bytes of decompressed containers kept before the oldest are evicted.
    pub fn with_cache_budget(mut self, bytes: u64) -> Self {
        self.cache_budget = bytes;
        self
    }

    /// Directory levels below the root searched for a container.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    pub fn with_spool_threshold(mut self, bytes: usize) -> Self {
        self.spool_threshold = bytes;
        self
    }

    pub fn with_decompressor(mut self, decompressor: DecompressorHandle) -> Self {
        self.decompressor = decompressor;
        self
    }

    pub fn warc_directory(&self) -> &Path {
        &self.warc_directory
    }

    pub fn cache_directory(&self) -> &Path {
        &self.cache_directory
    }

    /// Where the container called `name` lives on disk.
    ///
    /// An existing absolute path, or a path relative to the root, is used
    /// directly. Otherwise every directory `depth` levels below the root is
    /// tried for `name` and then for `name.br`, shallowest depth first,
    /// directories in name order.
    #[tracing::instrument(skip(self))]
    pub fn resolve_physical_path(&self, name: &str) -> Result<PathBuf> {
        let direct = Path::new(name);
        if direct.is_absolute() && direct.is_file() {
            return Ok(direct.to_path_buf());
        }
        let relative = validate(name)?;
        let rooted = self.warc_directory.join(&relative);
        if rooted.is_file() {
            return Ok(rooted);
        }

        let compressed = with_extension_appended(&relative, COMPRESSED_EXTENSION);
        for depth in 0..=self.search_depth {
            let directories: Vec<PathBuf> = WalkDir::new(&self.warc_directory)
                .min_depth(depth)
                .max_depth(depth)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_dir())
                .map(|entry| entry.into_path())
                .collect();
            for candidate in [&relative, &compressed] {
                if let Some(found) = directories.iter().map(|dir| dir.join(candidate)).find(|path| path.is_file()) {
                    tracing::debug!(path = %found.display(), depth, "container found");
                    return Ok(found);
                }
            }
        }
        exn::bail!(ErrorKind::NotFound(name.to_string()))
    }

    /// A plain copy of the container called `name`.
    ///
    /// Uncompressed containers are returned where they are. Compressed ones
    /// are decompressed once into the cache directory; producing a new copy
    /// evicts the least recently modified cached containers until the cache
    /// fits its budget again.
    #[tracing::instrument(skip(self))]
    pub fn materialize_uncompressed(&self, name: &str) -> Result<PathBuf> {
        let physical = self.resolve_physical_path(name)?;
        if physical.extension().is_none_or(|ext| ext != COMPRESSED_EXTENSION) {
            return Ok(physical);
        }
        let cached_name = physical.file_stem().ok_or_raise(|| ErrorKind::InvalidPath(physical.clone()))?;
        let cached = self.cache_directory.join(cached_name);
        if cached.is_file() {
            return Ok(cached);
        }

        std::fs::create_dir_all(&self.cache_directory).or_raise(|| ErrorKind::Io)?;
        let staging = NamedTempFile::new_in(&self.cache_directory).or_raise(|| ErrorKind::Io)?;
        self.decompressor.decompress(&physical, staging.path())?;
        match staging.persist_noclobber(&cached) {
            Ok(_) => tracing::info!(source = %physical.display(), cached = %cached.display(), "decompressed container"),
            Err(err) if err.error.kind() == IoErrorKind::AlreadyExists => {
                tracing::debug!(cached = %cached.display(), "container decompressed concurrently, using existing copy");
                return Ok(cached);
            },
            Err(err) => return Err(err.error).or_raise(|| ErrorKind::Io),
        }
        self.enforce_cache_budget(&cached);
        Ok(cached)
    }

    /// A reader over the container called `name`, positioned at `offset`.
    pub fn open_as_container(&self, name: &str, offset: u64) -> Result<WarcReader<BufReader<File>>> {
        let path = self.materialize_uncompressed(name)?;
        let mut file = File::open(&path).or_raise(|| ErrorKind::Io)?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).or_raise(|| ErrorKind::Io)?;
        }
        Ok(WarcReader::new(BufReader::new(file))
            .with_source(name)
            .with_position(offset)
            .with_spool_threshold(self.spool_threshold))
    }

    /// Failures here only leave the cache over budget, so they are logged
    /// and otherwise ignored.
    fn enforce_cache_budget(&self, keep: &Path) {
        let entries = match std::fs::read_dir(&self.cache_directory) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "unable to list container cache");
                return;
            },
        };
        let mut cached: Vec<(SystemTime, u64, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == CONTAINER_EXTENSION))
            .filter_map(|path| {
                let metadata = path.metadata().ok()?;
                Some((metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH), metadata.len(), path))
            })
            .collect();
        let mut total: u64 = cached.iter().map(|(_, size, _)| size).sum();
        cached.sort();

        for (_, size, path) in cached {
            if total <= self.cache_budget {
                break;
            }
            if path == keep {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    total = total.saturating_sub(size);
                    tracing::info!(path = %path.display(), size, "evicted cached container");
                },
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "unable to evict cached container"),
            }
        }
    }
}

fn with_extension_appended(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
