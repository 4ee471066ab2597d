//! Reading origin URLs and verifying checksums.

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use stowage_core::FileReferenceMetaInfo;
use stowage_error::{StorageError, StorageErrorKind, StowageResult};
use url::Url;

/// Convert a `file://` URL to a local path.
pub(crate) fn file_path(url: &str) -> StowageResult<PathBuf> {
    let parsed = Url::parse(url)
        .map_err(|e| StorageError::new(StorageErrorKind::InvalidUrl(format!("{}: {}", url, e))))?;
    if parsed.scheme() != "file" {
        return Err(StorageError::new(StorageErrorKind::Unsupported(format!(
            "scheme {} in {}",
            parsed.scheme(),
            url
        )))
        .into());
    }
    parsed.to_file_path().map_err(|_| {
        StorageError::new(StorageErrorKind::InvalidUrl(format!("{} is not a local path", url))).into()
    })
}

/// Read the bytes behind a `file://` origin URL.
pub(crate) async fn read_file(origin_url: &str) -> StowageResult<Vec<u8>> {
    let path = file_path(origin_url)?;
    tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::new(StorageErrorKind::NotFound(origin_url.to_string())).into()
        } else {
            StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e))).into()
        }
    })
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Verify the content against its declared checksum.
///
/// Only SHA-256 checksums are computed; other algorithms are trusted.
pub fn verify_checksum(data: &[u8], meta_info: &FileReferenceMetaInfo) -> StowageResult<()> {
    let algorithm = meta_info.algorithm.to_ascii_uppercase().replace('-', "");
    if algorithm != "SHA256" {
        return Ok(());
    }
    let actual = sha256_hex(data);
    if !actual.eq_ignore_ascii_case(&meta_info.checksum) {
        return Err(StorageError::new(StorageErrorKind::ChecksumMismatch(format!(
            "expected {}, got {}",
            meta_info.checksum, actual
        )))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_verified() {
        let data = b"hello";
        let checksum = sha256_hex(data);
        let meta = FileReferenceMetaInfo::new(checksum, "SHA-256", "hello.txt", "text/plain");
        assert!(verify_checksum(data, &meta).is_ok());
        assert!(verify_checksum(b"other", &meta).is_err());
    }

    #[test]
    fn test_other_algorithms_trusted() {
        let meta = FileReferenceMetaInfo::new("not-a-hash", "MD5", "hello.txt", "text/plain");
        assert!(verify_checksum(b"hello", &meta).is_ok());
    }

    #[test]
    fn test_non_file_scheme_rejected() {
        assert!(file_path("https://example.com/a.txt").is_err());
        assert!(file_path("not a url").is_err());
    }
}
