//! Request body spooling.
//!
//! The body is read once, chunk by chunk: kept in memory up to a threshold,
//! then spilled to a temp file. Reading stops as soon as the size ceiling is
//! exceeded, and the fingerprint is computed on the way through when asked for.

use bytes::Bytes;
use chronoframe_core::models::Fingerprint;
use chronoframe_storage::{ByteStream, StorageError};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::fingerprint::FingerprintHasher;

#[derive(Debug, thiserror::Error)]
pub enum SpoolError {
    #[error("Payload exceeds {max} bytes (read {observed} so far)")]
    TooLarge { observed: u64, max: u64 },

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Failed to spool request body: {0}")]
    Io(#[from] std::io::Error),
}

enum Spooled {
    Memory(Vec<Bytes>),
    File(TempPath),
}

/// A fully received payload, ready to hand to a storage backend.
pub struct SpooledPayload {
    spooled: Spooled,
    size: u64,
    fingerprint: Option<Fingerprint>,
}

impl SpooledPayload {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn is_on_disk(&self) -> bool {
        matches!(self.spooled, Spooled::File(_))
    }

    /// Replay the payload. The temp file, if any, is removed once the stream is dropped.
    pub async fn into_stream(self) -> Result<ByteStream, StorageError> {
        match self.spooled {
            Spooled::Memory(chunks) => {
                Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
            }
            Spooled::File(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let stream = tokio_util::io::ReaderStream::new(file).map(move |chunk| {
                    let _keep_alive = &path;
                    chunk.map_err(StorageError::from)
                });
                Ok(Box::pin(stream))
            }
        }
    }
}

/// Read `body` to the end, aborting once more than `max_bytes` have arrived.
pub async fn spool<S, E>(
    mut body: S,
    max_bytes: u64,
    memory_limit: u64,
    mut hasher: Option<Box<dyn FingerprintHasher>>,
) -> Result<SpooledPayload, SpoolError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut size = 0u64;
    let mut memory: Vec<Bytes> = Vec::new();
    let mut file: Option<(tokio::fs::File, TempPath)> = None;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| SpoolError::Body(e.to_string()))?;
        if chunk.is_empty() {
            continue;
        }

        size += chunk.len() as u64;
        if size > max_bytes {
            return Err(SpoolError::TooLarge {
                observed: size,
                max: max_bytes,
            });
        }

        if let Some(ref mut hasher) = hasher {
            hasher.update(&chunk);
        }

        match file {
            Some((ref mut out, _)) => out.write_all(&chunk).await?,
            None if size > memory_limit => {
                let (std_file, path) = tempfile::NamedTempFile::new()?.into_parts();
                let mut out = tokio::fs::File::from_std(std_file);
                for buffered in memory.drain(..) {
                    out.write_all(&buffered).await?;
                }
                out.write_all(&chunk).await?;
                file = Some((out, path));
            }
            None => memory.push(chunk),
        }
    }

    let spooled = match file {
        Some((mut out, path)) => {
            out.flush().await?;
            Spooled::File(path)
        }
        None => Spooled::Memory(memory),
    };

    Ok(SpooledPayload {
        spooled,
        size,
        fingerprint: hasher.map(|h| h.finish()),
    })
}
