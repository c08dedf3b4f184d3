//! Content digesting.
//!
//! The cache's on-disk format is part of its data model: sidecars store the
//! hex SHA-1 of the file they digest, one hex string per line. This is not
//! an arbitrary choice of hash function — it is the wire format the rest of
//! the mirror tree agrees on, so it must stay SHA-1 even where a different
//! hash might otherwise be preferred for speed.

use std::io::Read as _;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::error::UtilError;

/// Source files are streamed in 4 KiB chunks rather than read whole, so a
/// multi-gigabyte generated source file cannot blow up memory use.
const CHUNK_SIZE: usize = 4096;

/// Compute the SHA-1 hex digest of a byte slice.
pub fn sha1_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-1 hex digest of a file using streaming, 4 KiB reads.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn sha1_file(path: &Path) -> Result<String, UtilError> {
    let file = std::fs::File::open(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut reader = std::io::BufReader::new(file);
    let mut hasher = Sha1::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).map_err(|source| UtilError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if n == 0 {
            break;
        }
        let Some(chunk) = buf.get(..n) else {
            break; // unreachable: n is bounded by buf.len()
        };
        hasher.update(chunk);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest `source` and write the hex digest followed by a newline to
/// `sidecar`, creating or truncating it.
///
/// This is the one place the on-disk `.sha1` format is produced, so the
/// trailing newline is not cosmetic: readers compare sidecar content against
/// freshly computed digests, and some compare file content byte-for-byte
/// against a freshly written digest buffer (see `toolstamp_is_uptodate` in
/// `makelint-core`), so the format must be stable.
///
/// # Errors
/// Returns an error if `source` cannot be read or `sidecar` cannot be
/// written.
pub fn digest_file_to_sidecar(source: &Path, sidecar: &Path) -> Result<String, UtilError> {
    let digest = sha1_file(source)?;
    write_digest(sidecar, &digest)?;
    Ok(digest)
}

/// Write a precomputed digest to `sidecar` in the same format as
/// [`digest_file_to_sidecar`].
///
/// # Errors
/// Returns an error if `sidecar` cannot be written.
pub fn write_digest(sidecar: &Path, digest: &str) -> Result<(), UtilError> {
    let mut contents = String::with_capacity(digest.len() + 1);
    contents.push_str(digest);
    contents.push('\n');
    std::fs::write(sidecar, contents).map_err(|source| UtilError::Io {
        path: sidecar.display().to_string(),
        source,
    })
}

/// Read a digest sidecar and return its digest, stripped of the trailing
/// newline.
///
/// # Errors
/// Returns an error if `sidecar` cannot be read.
pub fn read_digest(sidecar: &Path) -> Result<String, UtilError> {
    let raw = std::fs::read_to_string(sidecar).map_err(|source| UtilError::Io {
        path: sidecar.display().to_string(),
        source,
    })?;
    Ok(raw.trim_end().to_owned())
}
