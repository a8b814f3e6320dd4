// src/engine/io.rs
//
// I/O: input sources (bytes, memory-mapped files, lazy paths) and atomic file output.

use crate::engine::common::EngineResult;
use crate::error::CompositorError;
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Encoded image input. Cloning is cheap; pixel data is never copied by clone.
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory image data
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access)
    Mapped(Arc<Mmap>),
    /// File path for lazy loading (data is read only when needed)
    Path(PathBuf),
}

impl Source {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Source::Memory(Arc::new(data.into()))
    }

    /// Memory-map `path`. The OS pages in only what the decoder touches.
    pub fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let display = path.to_string_lossy().into_owned();
        if !path.exists() {
            return Err(CompositorError::file_not_found(display));
        }
        let file =
            File::open(path).map_err(|e| CompositorError::file_read_failed(display.clone(), e))?;
        // Safety: the file is assumed not to be truncated by another process while
        // the request runs; the mapping is read-only and dropped with the request.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| CompositorError::file_read_failed(display, e))?;
        Ok(Source::Mapped(Arc::new(mmap)))
    }

    /// Borrow the bytes, reading the file first for `Path` sources.
    pub fn bytes(&self) -> EngineResult<Cow<'_, [u8]>> {
        match self {
            Source::Memory(data) => Ok(Cow::Borrowed(data.as_slice())),
            Source::Mapped(mmap) => Ok(Cow::Borrowed(mmap.as_ref())),
            Source::Path(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    let display = path.to_string_lossy().into_owned();
                    if e.kind() == std::io::ErrorKind::NotFound {
                        CompositorError::file_not_found(display)
                    } else {
                        CompositorError::file_read_failed(display, e)
                    }
                })?;
                Ok(Cow::Owned(data))
            }
        }
    }

    /// Get the bytes directly - works for both Memory and Mapped sources
    /// Returns None only for Path sources (which need to be loaded first)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Source::Memory(data) => Some(data.as_slice()),
            Source::Mapped(mmap) => Some(mmap.as_ref()),
            Source::Path(_) => None,
        }
    }

    /// Byte length, or 0 for a path that has not been read.
    pub fn len(&self) -> usize {
        self.as_bytes().map_or(0, <[u8]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Source::from_bytes(data)
    }
}

/// Write `data` to `path` atomically: temp file in the same directory, fsync, rename.
///
/// Returns the number of bytes written. A failed write leaves any existing file untouched.
pub fn write_file(path: impl AsRef<Path>, data: &[u8]) -> EngineResult<usize> {
    let path = path.as_ref();
    let output_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => {
            return Err(CompositorError::invalid_argument(
                "path",
                path.to_string_lossy().into_owned(),
                "output path must name a file",
            ))
        }
    };

    // Same directory as the target so the final rename never crosses filesystems.
    let mut temp_file = NamedTempFile::new_in(output_dir).map_err(|e| {
        CompositorError::file_write_failed(output_dir.to_string_lossy().into_owned(), e)
    })?;
    let temp_path = temp_file.path().display().to_string();
    temp_file
        .write_all(data)
        .map_err(|e| CompositorError::file_write_failed(temp_path.clone(), e))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| CompositorError::file_write_failed(temp_path, e))?;

    temp_file.persist(path).map_err(|e| {
        CompositorError::file_write_failed(path.to_string_lossy().into_owned(), e.error)
    })?;
    Ok(data.len())
}
