//! Content-addressed download cache.
//!
//! Downloads are stored under `<cache>/<sha256>`. A file at that path is a
//! cache hit and is returned without touching the network or re-hashing it.
//! Misses stream the response into a temporary file in the cache directory
//! while hashing, and only a verified file is renamed into place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::util::hash::{ContentHash, HashError};

#[derive(Debug, Error)]
pub enum FetchError {
  #[error(transparent)]
  InvalidDigest(#[from] HashError),

  /// HTTP request failed.
  #[error("fetch failed for {url}: {message}")]
  Request { url: String, message: String },

  /// SHA256 hash mismatch after download.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  #[error("download cache error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl FetchError {
  fn io(path: &Path) -> impl FnOnce(std::io::Error) -> FetchError + '_ {
    move |source| FetchError::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  fn request(url: &str) -> impl FnOnce(reqwest::Error) -> FetchError + '_ {
    move |e| FetchError::Request {
      url: url.to_string(),
      message: e.to_string(),
    }
  }
}

const PARTIAL_PREFIX: &str = ".partial-";

/// Partial downloads older than this were left behind by an interrupted run.
const STALE_PARTIAL_AGE: Duration = Duration::from_secs(60 * 60);

/// Verified downloads keyed by their SHA-256.
#[derive(Debug, Clone)]
pub struct DownloadCache {
  dir: PathBuf,
  client: reqwest::Client,
}

impl DownloadCache {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      client: reqwest::Client::new(),
    }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  /// Canonical location for a digest.
  pub fn path_for(&self, digest: &ContentHash) -> PathBuf {
    self.dir.join(digest.as_str())
  }

  /// Fetch `url`, verify it against `expected_sha256`, and return its cache path.
  ///
  /// # Arguments
  ///
  /// * `url` - The URL to download from
  /// * `expected_sha256` - The expected SHA256 hash (hex, either case)
  ///
  /// # Errors
  ///
  /// Fails on an invalid digest, a failed or non-2xx request, or a content
  /// hash that differs from `expected_sha256`. In the last case the partial
  /// download is removed and nothing is left at the canonical path.
  pub async fn fetch(&self, url: &str, expected_sha256: &str) -> Result<PathBuf, FetchError> {
    let expected = ContentHash::parse(expected_sha256)?;
    let dest_path = self.path_for(&expected);

    if dest_path.is_file() {
      debug!(url = %url, path = ?dest_path, "using cached download");
      return Ok(dest_path);
    }

    info!(url = %url, "fetching URL");
    tokio::fs::create_dir_all(&self.dir).await.map_err(FetchError::io(&self.dir))?;
    self.sweep_partials().await?;

    // Same directory as the destination so the final rename stays on one
    // filesystem. Dropping `temp` before `persist` deletes it.
    let temp = tempfile::Builder::new()
      .prefix(PARTIAL_PREFIX)
      .tempfile_in(&self.dir)
      .map_err(FetchError::io(&self.dir))?;

    let mut response = self
      .client
      .get(url)
      .send()
      .await
      .and_then(reqwest::Response::error_for_status)
      .map_err(FetchError::request(url))?;

    let writer = temp.reopen().map_err(FetchError::io(temp.path()))?;
    let mut file = tokio::fs::File::from_std(writer);
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    while let Some(chunk) = response.chunk().await.map_err(FetchError::request(url))? {
      hasher.update(&chunk);
      file.write_all(&chunk).await.map_err(FetchError::io(temp.path()))?;
      size += chunk.len() as u64;
    }
    file.flush().await.map_err(FetchError::io(temp.path()))?;
    file.sync_all().await.map_err(FetchError::io(temp.path()))?;
    drop(file);

    let actual = hex::encode(hasher.finalize());
    if actual != expected.as_str() {
      temp.close().map_err(FetchError::io(&self.dir))?;
      return Err(FetchError::HashMismatch {
        url: url.to_string(),
        expected: expected.0,
        actual,
      });
    }

    temp
      .persist(&dest_path)
      .map_err(|e| FetchError::io(&dest_path)(e.error))?;

    info!(path = ?dest_path, size, "download complete");
    Ok(dest_path)
  }

  /// Remove partial downloads older than [`STALE_PARTIAL_AGE`].
  ///
  /// Younger ones may belong to a download still in progress elsewhere.
  async fn sweep_partials(&self) -> Result<(), FetchError> {
    let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(FetchError::io(&self.dir))?;
    while let Some(entry) = entries.next_entry().await.map_err(FetchError::io(&self.dir))? {
      if !entry.file_name().as_encoded_bytes().starts_with(PARTIAL_PREFIX.as_bytes()) {
        continue;
      }
      let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
        continue;
      };
      if modified.elapsed().unwrap_or_default() < STALE_PARTIAL_AGE {
        continue;
      }

      let path = entry.path();
      match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(path = ?path, "removed stale partial download"),
        Err(e) => warn!(path = ?path, error = %e, "failed to remove stale partial download"),
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::hash::hash_bytes;
  use tempfile::TempDir;

  const PAYLOAD: &[u8] = b"#!/bin/sh\necho tool\n";

  fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
      .collect();
    names.sort();
    names
  }

  #[tokio::test]
  async fn fetch_stores_by_digest() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/tool.sh")
      .with_body(PAYLOAD)
      .expect(1)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let cache = DownloadCache::new(temp.path().join("downloads"));
    let digest = hash_bytes(PAYLOAD);

    let path = cache.fetch(&format!("{}/tool.sh", server.url()), &digest.0).await.unwrap();

    assert_eq!(path, cache.dir().join(&digest.0));
    assert_eq!(std::fs::read(&path).unwrap(), PAYLOAD);
    assert_eq!(entries(cache.dir()), vec![digest.0.clone()]);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn second_fetch_does_not_hit_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/tool.sh")
      .with_body(PAYLOAD)
      .expect(1)
      .create_async()
      .await;

    let temp = TempDir::new().unwrap();
    let cache = DownloadCache::new(temp.path());
    let url = format!("{}/tool.sh", server.url());
    let digest = hash_bytes(PAYLOAD);

    let first = cache.fetch(&url, &digest.0).await.unwrap();
    let second = cache.fetch(&url, &digest.0).await.unwrap();

    assert_eq!(first, second);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn present_file_is_trusted_without_verification() {
    let temp = TempDir::new().unwrap();
    let cache = DownloadCache::new(temp.path());
    let digest = hash_bytes(b"expected");
    std::fs::write(cache.path_for(&digest), b"something else entirely").unwrap();

    // Unroutable URL: any network access would fail the test.
    let path = cache.fetch("http://127.0.0.1:9/never", &digest.0).await.unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"something else entirely");
  }

  #[tokio::test]
  async fn mismatch_fails_and_leaves_nothing_behind() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/file.bin").with_body("tampered").create_async().await;

    let temp = TempDir::new().unwrap();
    let cache = DownloadCache::new(temp.path());
    let expected = hash_bytes(b"original");

    let err = cache
      .fetch(&format!("{}/file.bin", server.url()), &expected.0)
      .await
      .unwrap_err();

    match err {
      FetchError::HashMismatch {
        url,
        expected: e,
        actual,
      } => {
        assert!(url.ends_with("/file.bin"));
        assert_eq!(e, expected.0);
        assert_eq!(actual, hash_bytes(b"tampered").0);
      }
      other => panic!("expected hash mismatch, got {other:?}"),
    }
    assert!(!cache.path_for(&expected).exists());
    assert!(entries(temp.path()).is_empty(), "temporary file must be removed");
  }

  #[tokio::test]
  async fn http_error_status_fails() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/gone").with_status(404).create_async().await;

    let temp = TempDir::new().unwrap();
    let cache = DownloadCache::new(temp.path());
    let digest = hash_bytes(b"whatever");

    let err = cache.fetch(&format!("{}/gone", server.url()), &digest.0).await.unwrap_err();
    assert!(matches!(err, FetchError::Request { .. }));
    assert!(entries(temp.path()).is_empty());
  }

  #[tokio::test]
  async fn stale_partials_are_swept_on_fetch() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/tool.sh").with_body(PAYLOAD).create_async().await;

    let temp = TempDir::new().unwrap();
    let cache = DownloadCache::new(temp.path());
    let stale = temp.path().join(".partial-interrupted");
    let recent = temp.path().join(".partial-in-progress");
    std::fs::write(&recent, b"half").unwrap();
    let file = std::fs::File::create(&stale).unwrap();
    file
      .set_modified(std::time::SystemTime::now() - STALE_PARTIAL_AGE * 2)
      .unwrap();
    drop(file);

    let digest = hash_bytes(PAYLOAD);
    cache.fetch(&format!("{}/tool.sh", server.url()), &digest.0).await.unwrap();

    assert_eq!(entries(temp.path()), vec![".partial-in-progress".to_string(), digest.0.clone()]);
  }

  #[tokio::test]
  async fn invalid_digest_rejected_before_io() {
    let temp = TempDir::new().unwrap();
    let cache = DownloadCache::new(temp.path().join("never-created"));

    let err = cache.fetch("http://127.0.0.1:9/x", "../escape").await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidDigest(_)));
    assert!(!cache.dir().exists());
  }

  #[tokio::test]
  async fn uppercase_digest_is_normalized() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("GET", "/a").with_body(PAYLOAD).create_async().await;

    let temp = TempDir::new().unwrap();
    let cache = DownloadCache::new(temp.path());
    let digest = hash_bytes(PAYLOAD);

    let path = cache
      .fetch(&format!("{}/a", server.url()), &digest.0.to_ascii_uppercase())
      .await
      .unwrap();
    assert_eq!(path.file_name().unwrap().to_string_lossy(), digest.0);
  }
}
