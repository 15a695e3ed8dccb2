//! Upload-side models: content types, duplicate policy, fingerprints and the acting user.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::constants::GENERIC_CONTENT_TYPE;

/// A normalized MIME type (`type/subtype`).
///
/// Normalization trims whitespace, lowercases, and drops `;` parameters, so
/// `Image/JPEG; charset=binary` and `image/jpeg` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentType(String);

impl ContentType {
    pub fn new(raw: &str) -> Self {
        let essence = raw.split(';').next().unwrap_or(raw).trim().to_lowercase();
        ContentType(essence)
    }

    pub fn generic() -> Self {
        ContentType(GENERIC_CONTENT_TYPE.to_string())
    }

    /// Empty or `application/octet-stream`.
    pub fn is_generic(&self) -> bool {
        self.0.is_empty() || self.0 == GENERIC_CONTENT_TYPE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentType {
    fn from(raw: &str) -> Self {
        ContentType::new(raw)
    }
}

/// What to do when an upload's fingerprint matches an existing object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    /// Return the existing key without writing.
    Skip,
    /// Write anyway, flag the response.
    Warn,
    /// Reject with `DuplicateContent`.
    Block,
}

impl FromStr for DuplicateMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(DuplicateMode::Skip),
            "warn" => Ok(DuplicateMode::Warn),
            "block" => Ok(DuplicateMode::Block),
            _ => Err(anyhow::anyhow!("Invalid duplicate check mode: {}", s)),
        }
    }
}

impl Display for DuplicateMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DuplicateMode::Skip => write!(f, "skip"),
            DuplicateMode::Warn => write!(f, "warn"),
            DuplicateMode::Block => write!(f, "block"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicatePolicy {
    pub enabled: bool,
    pub mode: DuplicateMode,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: DuplicateMode::Skip,
        }
    }
}

/// Stable content-derived identifier used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Fingerprint(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// The authenticated user performing an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub name: String,
}
