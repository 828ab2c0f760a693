//! Shared SHA-256 hex digest utilities.

use std::io::{self, Read};
use std::path::Path;

use sha2::digest::Output;
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Compute the raw SHA-256 digest of a file without loading it into memory.
pub fn sha256_file(path: &Path) -> io::Result<[u8; 32]> {
    Ok(file_digest(path)?.into())
}

/// Hex form of [`sha256_file`].
pub fn sha256_file_hex(path: &Path) -> io::Result<String> {
    let hash = file_digest(path)?;
    Ok(format!("{hash:x}"))
}

fn file_digest(path: &Path) -> io::Result<Output<Sha256>> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}
