//! Source-to-filename strategies for the disk tier.

use sha2::{Digest, Sha256};

/// Derives the on-disk file name for a source identifier.
///
/// Implementations must be deterministic: the same source must always map
/// to the same name, across process restarts, or persisted entries become
/// unreachable.
pub trait FileNameGenerator: Send + Sync {
    /// File name (no directory components) for `source`.
    fn file_name(&self, source: &str) -> String;
}

impl<F> FileNameGenerator for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn file_name(&self, source: &str) -> String {
        self(source)
    }
}

/// Default strategy: lowercase hex SHA-256 of the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedFileNames;

impl FileNameGenerator for HashedFileNames {
    fn file_name(&self, source: &str) -> String {
        hex::encode(Sha256::digest(source.as_bytes()))
    }
}
