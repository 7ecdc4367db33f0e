//! Pooled output files, one per canonical host.

use crate::error::{ErrorKind, Result};
use crate::writer::WarcWriter;
use exn::{OptionExt, ResultExt};
use mirror_config::WriterSettings;
use mirror_url::Canonicalizer;
use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Hosts longer than this are keyed by their digest instead.
const MAX_HOST_LENGTH: usize = 200;
/// Attempts at finding an unused file name before giving up.
const CREATE_ATTEMPTS: u32 = 16;

static UNIQUE: AtomicU64 = AtomicU64::new(0);

/// A pooled writer. Lock it for the duration of one record.
pub type PooledWriter = Arc<Mutex<WarcWriter<File>>>;

#[derive(Default)]
struct Handles {
    writers: HashMap<String, PooledWriter>,
    /// Keys in the order their files were opened.
    opened: VecDeque<String>,
}

/// Open output files keyed by the canonical host of what they hold.
///
/// Construct once and share by reference. Past `capacity` the oldest-opened
/// handle is closed; a file past `rollover_size` is replaced by a fresh one
/// on its next use. Files are created exclusively and never reopened.
pub struct WriterPool {
    directory: PathBuf,
    capacity: usize,
    rollover_size: u64,
    canonicalizer: Arc<Canonicalizer>,
    handles: Mutex<Handles>,
}

impl WriterPool {
    pub fn new(directory: impl Into<PathBuf>, capacity: usize, rollover_size: u64, canonicalizer: Arc<Canonicalizer>) -> Self {
        Self {
            directory: directory.into(),
            capacity: capacity.max(1),
            rollover_size,
            canonicalizer,
            handles: Mutex::new(Handles::default()),
        }
    }

    pub fn from_settings(settings: &WriterSettings, canonicalizer: Arc<Canonicalizer>) -> Self {
        Self::new(&settings.directory, settings.max_open_files, settings.rollover_size, canonicalizer)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The writer records for `uri` should go to.
    #[tracing::instrument(skip(self))]
    pub fn target_for(&self, uri: &str) -> Result<PooledWriter> {
        let key = self.key_for(uri)?;
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(writer) = handles.writers.get(&key) {
            let written = writer.lock().unwrap_or_else(PoisonError::into_inner).written();
            if written <= self.rollover_size {
                return Ok(Arc::clone(writer));
            }
            tracing::info!(key = %key, written, "output file past rollover size, starting a new one");
            handles.writers.remove(&key);
            handles.opened.retain(|k| k != &key);
        }

        while handles.writers.len() >= self.capacity {
            let Some(oldest) = handles.opened.pop_front() else { break };
            tracing::info!(key = %oldest, "too many open output files, closing the oldest");
            handles.writers.remove(&oldest);
        }

        let writer = Arc::new(Mutex::new(self.create(&key)?));
        handles.writers.insert(key.clone(), Arc::clone(&writer));
        handles.opened.push_back(key);
        Ok(writer)
    }

    fn key_for(&self, uri: &str) -> Result<String> {
        let canonical = self.canonicalizer.canonical(uri);
        let host = url::Url::parse(&canonical)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_raise(|| ErrorKind::InvalidTarget(uri.to_string()))?;
        Ok(match host.len() > MAX_HOST_LENGTH {
            true => blake3::hash(host.as_bytes()).to_hex().to_string(),
            false => host,
        })
    }

    fn create(&self, key: &str) -> Result<WarcWriter<File>> {
        std::fs::create_dir_all(&self.directory).or_raise(|| ErrorKind::Io)?;
        for _ in 0..CREATE_ATTEMPTS {
            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            let unique = UNIQUE.fetch_add(1, Ordering::Relaxed);
            let name = format!("{key}_{}_{:08x}{unique:04x}.warc", now.as_secs(), now.subsec_nanos());
            let path = self.directory.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    tracing::info!(path = %path.display(), "opened output file");
                    let mut writer = WarcWriter::new(file).with_file_name(name);
                    writer.write_start()?;
                    return Ok(writer);
                },
                Err(err) if err.kind() == IoErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err).or_raise(|| ErrorKind::Io),
            }
        }
        exn::bail!(ErrorKind::Io)
    }
}
