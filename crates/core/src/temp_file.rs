//! Scoped staging files for downloaded or uploaded blobs.
//!
//! A [`TempFileHandle`] is exclusively owned by the operation that created
//! it. The file is removed when the handle is dropped, so every exit path
//! releases it; [`TempFileHandle::close`] does the same but reports errors.

use std::io::{self, Write};
use std::path::Path;

use tempfile::TempPath;

#[derive(Debug)]
pub struct TempFileHandle {
    path: TempPath,
}

impl TempFileHandle {
    /// Create an empty temp file named `<prefix>XXXX<suffix>`.
    pub fn new(prefix: &str, suffix: &str) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile()?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    /// Create a temp file holding `bytes`.
    pub fn from_bytes(prefix: &str, suffix: &str, bytes: &[u8]) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    /// Delete the file now.
    pub fn close(self) -> io::Result<()> {
        self.path.close()
    }
}
