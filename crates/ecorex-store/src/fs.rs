//! Filesystem byte-stream provider
//!
//! Resource URIs are file paths, optionally with a `file://` scheme.
//! Relative paths resolve against the provider's base directory.
//!
//! Writes use the temp→rename pattern: bytes are buffered until the writer
//! is flushed, then written to a sibling `.tmp` file and renamed over the
//! target, so a reader never sees a partial document.

use std::fs;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use ecorex_core::errors::{ExError, Result as ModelResult};
use ecorex_core::persistence::{ByteStreamProvider, UriConverter};

use crate::errors::{io_error, provider_error, Result};

/// Serves resource URIs from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileProvider {
    base: Option<PathBuf>,
}

impl FileProvider {
    /// Provider resolving relative paths against the working directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider resolving relative paths against `base`
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        FileProvider {
            base: Some(base.into()),
        }
    }

    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// Filesystem path for a resource URI
    pub fn path_for(&self, uri: &str) -> PathBuf {
        let path = uri.split('#').next().unwrap_or(uri);
        let path = Path::new(path.strip_prefix("file://").unwrap_or(path));
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ByteStreamProvider for FileProvider {
    fn open_in(&self, uri: &str) -> ModelResult<Box<dyn Read>> {
        let path = self.path_for(uri);
        tracing::debug!(resource_uri = %uri, path = %path.display(), "open for reading");
        let file = fs::File::open(&path).map_err(|e| provider_error(uri, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_out(&self, uri: &str) -> ModelResult<Box<dyn Write>> {
        Ok(Box::new(AtomicFileWriter {
            target: self.path_for(uri),
            buffer: Vec::new(),
        }))
    }
}

impl UriConverter for FileProvider {
    /// Plain paths and `file:` URIs; anything with another scheme is left to
    /// other converters
    fn claims(&self, uri: &str) -> bool {
        match uri.split_once(':') {
            Some((scheme, _)) if scheme.len() > 1 => scheme == "file",
            _ => true,
        }
    }
}

/// Buffers writes and commits them atomically on flush
struct AtomicFileWriter {
    target: PathBuf,
    buffer: Vec<u8>,
}

impl Write for AtomicFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        atomic_write(&self.target, &self.buffer).map_err(|e: ExError| std::io::Error::other(e.to_string()))
    }
}

/// Atomically write bytes to a file
///
/// Creates missing parent directories, writes a sibling temp file and
/// renames it over the target.
///
/// # Errors
///
/// `Io` when any filesystem step fails.
pub fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error("create_resource_dir", e))?;
    }

    let temp = temp_path(target);
    fs::write(&temp, content).map_err(|e| io_error("write_resource_temp", e))?;
    if let Err(e) = fs::rename(&temp, target) {
        fs::remove_file(&temp).ok();
        return Err(io_error("rename_resource_temp", e));
    }
    Ok(())
}

/// `name.ext.tmp` next to `name.ext`
fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecorex_core::errors::ModelError;
    use tempfile::TempDir;

    #[test]
    fn test_write_commits_on_flush() {
        let temp_dir = TempDir::new().unwrap();
        let provider = FileProvider::with_base(temp_dir.path());

        let mut out = provider.open_out("nested/lib.xmi").unwrap();
        out.write_all(b"<r/>").unwrap();
        assert!(!temp_dir.path().join("nested/lib.xmi").exists());

        out.flush().unwrap();
        let mut text = String::new();
        provider.open_in("nested/lib.xmi").unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "<r/>");
    }

    #[test]
    fn test_missing_file_is_resource_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let provider = FileProvider::with_base(temp_dir.path());
        assert!(matches!(
            provider.open_in("absent.xmi"),
            Err(ModelError::ResourceNotFound { .. })
        ));
    }

    #[test]
    fn test_file_scheme_and_absolute_paths_ignore_base() {
        let provider = FileProvider::with_base("/work");
        assert_eq!(provider.path_for("file:///data/a.xmi"), PathBuf::from("/data/a.xmi"));
        assert_eq!(provider.path_for("models/a.xmi#/0"), PathBuf::from("/work/models/a.xmi"));
        assert!(provider.claims("models/a.xmi"));
        assert!(provider.claims("file:///data/a.xmi"));
        assert!(!provider.claims("platform:/resource/a.xmi"));
    }

    #[test]
    fn test_no_tmp_files_after_write() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a.json");

        atomic_write(&target, b"first").unwrap();
        atomic_write(&target, b"second").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"second");
        let tmp_count = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().is_some_and(|s| s.ends_with(".tmp")))
            .count();
        assert_eq!(tmp_count, 0);
    }
}
