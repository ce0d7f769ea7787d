//! Memory-mapped capture reader.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use log::debug;
use memmap2::Mmap;
use netprof_stream::{load_with_config, Capture, LoadConfig};

use crate::{Error, Result};

/// A capture file mapped into memory.
///
/// Decoding reads straight from the mapping, so a capture of any size is
/// never copied into a buffer first.
pub struct MappedCaptureReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedCaptureReader {
    /// Opens a capture for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::MmapError(format!("{}: {e}", path.display())))?;
        debug!("Mapped {} ({} bytes)", path.display(), mmap.len());
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes the mapped capture.
    ///
    /// # Errors
    /// Returns [`Error::Decode`] if the capture is malformed or the load
    /// is cancelled.
    pub fn load(
        &self,
        config: &LoadConfig,
        cancel: &AtomicBool,
        progress: impl FnMut(f32),
    ) -> Result<Capture> {
        Ok(load_with_config(self.as_bytes(), config, cancel, progress)?)
    }
}

/// Maps and decodes the capture at `path`.
///
/// # Errors
/// Returns an error if the file cannot be mapped or decoded.
pub fn load_file<P: AsRef<Path>>(
    path: P,
    config: &LoadConfig,
    cancel: &AtomicBool,
    progress: impl FnMut(f32),
) -> Result<Capture> {
    MappedCaptureReader::open(path)?.load(config, cancel, progress)
}
