//! Checksum computation for verify-after-copy.
//!
//! Copies are byte-for-byte, so a verified record should always report equal
//! digests; a mismatch is recorded on the FileRecord rather than failing it.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{FileRecord, FileState, Verification};

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// MD5 (fast, matches the digests published alongside archive files)
    Md5,
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl ChecksumAlgorithm {
    /// Parse algorithm from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    pub fn new(algorithm: ChecksumAlgorithm, hex: String) -> Self {
        ChecksumValue { algorithm, hex }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

enum Hasher {
    Md5(md5::Context),
    Sha256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(<sha2::Sha256 as sha2::Digest>::new()),
            ChecksumAlgorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(ctx) => ctx.consume(data),
            Hasher::Sha256(h) => sha2::Digest::update(h, data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> ChecksumValue {
        match self {
            Hasher::Md5(ctx) => {
                ChecksumValue::new(ChecksumAlgorithm::Md5, format!("{:x}", ctx.compute()))
            }
            Hasher::Sha256(h) => ChecksumValue::new(
                ChecksumAlgorithm::Sha256,
                format!("{:x}", sha2::Digest::finalize(h)),
            ),
            Hasher::Blake3(h) => {
                ChecksumValue::new(ChecksumAlgorithm::Blake3, h.finalize().to_hex().to_string())
            }
        }
    }
}

/// Compute checksum for a file
pub fn compute_file_checksum(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> std::io::Result<ChecksumValue> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 65536]; // 64 KB buffer

    loop {
        match file.read(&mut buffer)? {
            0 => break,
            n => hasher.update(&buffer[..n]),
        }
    }

    Ok(hasher.finalize())
}

/// Verify a copied record by comparing source and destination checksums.
///
/// Only records in the Done state are verified. The comparison is stored on
/// the record; `Ok(true)` means the digests matched.
pub fn verify_record(
    record: &mut FileRecord,
    algorithm: ChecksumAlgorithm,
) -> std::io::Result<bool> {
    if record.state != FileState::Done {
        return Ok(false);
    }

    let source = compute_file_checksum(&record.source_path, algorithm)?;
    let destination = compute_file_checksum(&record.destination_path, algorithm)?;
    let verification = Verification {
        source,
        destination,
    };
    let passed = verification.passed();
    record.verification = Some(verification);
    Ok(passed)
}
