//! Decompression of whole container files into the cache.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mirror_encoding::Encoding;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Turns a compressed container into its plain form.
///
/// Implementations write `destination` completely or fail; a partially
/// written destination is the caller's to clean up.
pub trait Decompressor: Send + Sync {
    fn decompress(&self, source: &Path, destination: &Path) -> Result<()>;
}

/// Handle to the decompressor a [`FileResolver`](crate::FileResolver) uses.
pub type DecompressorHandle = Arc<dyn Decompressor>;

/// The `brotli` command line tool.
pub struct ExternalBrotli {
    program: PathBuf,
}

impl ExternalBrotli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    /// Find `brotli` on the `PATH`.
    pub fn discover() -> Option<Self> {
        match which::which("brotli") {
            Ok(program) => {
                tracing::debug!(program = %program.display(), "found brotli executable");
                Some(Self::new(program))
            },
            Err(_) => {
                tracing::info!("brotli executable not found in PATH; decompressing in-process");
                None
            },
        }
    }
}

impl Decompressor for ExternalBrotli {
    #[tracing::instrument(skip(self), fields(program = %self.program.display()))]
    fn decompress(&self, source: &Path, destination: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-d")
            .arg("-f")
            .arg("-n")
            .arg("-o")
            .arg(destination)
            .arg(source)
            .output()
            .or_raise(|| ErrorKind::ExternalProcess(self.program.display().to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, stderr = %stderr.trim(), "brotli failed");
            exn::bail!(ErrorKind::ExternalProcess(format!("{} exited with {}", self.program.display(), output.status)));
        }
        Ok(())
    }
}

/// In-process Brotli decoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinBrotli;

impl Decompressor for BuiltinBrotli {
    #[tracing::instrument(skip(self))]
    fn decompress(&self, source: &Path, destination: &Path) -> Result<()> {
        let input = BufReader::new(File::open(source).or_raise(|| ErrorKind::Io)?);
        let mut output = BufWriter::new(File::create(destination).or_raise(|| ErrorKind::Io)?);
        Encoding::Brotli.decode_stream(input, &mut output).or_raise(|| ErrorKind::Io)?;
        output.flush().or_raise(|| ErrorKind::Io)?;
        Ok(())
    }
}

/// Tries the external tool first and falls back to [`BuiltinBrotli`] when it
/// is missing or fails.
pub struct PreferExternal {
    external: Option<ExternalBrotli>,
}

impl PreferExternal {
    pub fn discover() -> Self {
        Self { external: ExternalBrotli::discover() }
    }
}

impl Decompressor for PreferExternal {
    fn decompress(&self, source: &Path, destination: &Path) -> Result<()> {
        if let Some(external) = &self.external {
            match external.decompress(source, destination) {
                Ok(()) => return Ok(()),
                Err(err) => tracing::warn!(error = %err, "external decompression failed, retrying in-process"),
            }
        }
        BuiltinBrotli.decompress(source, destination)
    }
}
