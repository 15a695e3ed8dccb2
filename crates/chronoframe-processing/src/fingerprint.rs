//! Content fingerprints for duplicate detection.
//!
//! The pipeline only needs a stable content-derived identifier; the algorithm
//! is injected through [`Fingerprinter`]. SHA-256 of the full payload is the default.

use chronoframe_core::models::Fingerprint;
use sha2::{Digest, Sha256};

/// Incremental hasher fed while the payload streams in.
pub trait FingerprintHasher: Send {
    fn update(&mut self, data: &[u8]);

    fn finish(self: Box<Self>) -> Fingerprint;
}

/// Source of fresh hashers, one per upload.
pub trait Fingerprinter: Send + Sync {
    fn start(&self) -> Box<dyn FingerprintHasher>;
}

/// Hex-encoded SHA-256 of the payload bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Fingerprinter;

struct Sha256Hasher(Sha256);

impl FingerprintHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finish(self: Box<Self>) -> Fingerprint {
        Fingerprint::new(hex::encode(self.0.finalize()))
    }
}

impl Fingerprinter for Sha256Fingerprinter {
    fn start(&self) -> Box<dyn FingerprintHasher> {
        Box::new(Sha256Hasher(Sha256::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_is_incremental() {
        let mut whole = Sha256Fingerprinter.start();
        whole.update(b"hello world");

        let mut split = Sha256Fingerprinter.start();
        split.update(b"hello ");
        split.update(b"world");

        let expected = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert_eq!(whole.finish().as_str(), expected);
        assert_eq!(split.finish().as_str(), expected);
    }
}
