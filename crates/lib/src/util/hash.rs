//! Hashing utilities for content addressing and verification.
//!
//! This module provides:
//! - `ContentHash`: A validated 64-character lowercase SHA-256 hex digest
//! - `hash_files()`: One digest over the concatenated contents of many files
//! - `hash_bytes()`: Arbitrary byte hashing

use std::fs;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::consts::SHA256_HEX_LEN;

const READ_CHUNK: usize = 8192;

/// A full 64-character SHA-256 hash.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters). Values coming
/// from users go through [`ContentHash::parse`], which also makes the hash safe
/// to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Parse a user-supplied SHA-256 hex digest, normalizing it to lowercase.
  pub fn parse(value: &str) -> Result<Self, HashError> {
    let trimmed = value.trim();
    if trimmed.len() != SHA256_HEX_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
      return Err(HashError::InvalidDigest(value.to_string()));
    }
    Ok(ContentHash(trimmed.to_ascii_lowercase()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Errors raised while hashing.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("invalid sha256 digest '{0}': expected {SHA256_HEX_LEN} hex characters")]
  InvalidDigest(String),

  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },
}

/// Hash the contents of `paths`, in the given order, into one digest.
///
/// Only raw file bytes are fed to the hasher: no names, separators or
/// metadata. Callers are responsible for ordering `paths` deterministically.
pub fn hash_files<P: AsRef<Path>>(paths: &[P]) -> Result<ContentHash, HashError> {
  let mut hasher = Sha256::new();
  for path in paths {
    stream_file(path.as_ref(), &mut hasher)?;
  }
  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

fn stream_file(path: &Path, hasher: &mut Sha256) -> Result<(), HashError> {
  let read_error = |e: std::io::Error| HashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };

  let mut file = fs::File::open(path).map_err(read_error)?;
  let mut buffer = [0u8; READ_CHUNK];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_error)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(())
}
