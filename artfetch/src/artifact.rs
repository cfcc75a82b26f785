//! Resolved artifacts and the tier they were resolved from.

use bytes::Bytes;
use std::fmt;

/// A resolved visual resource.
///
/// The loader never interprets the payload: decoding, scaling and rendering
/// belong to the consumer. Cloning is cheap (reference counted).
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    data: Bytes,
}

impl Artifact {
    /// Wrap raw artifact bytes.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Borrow the raw payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the artifact, returning the underlying buffer.
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Vec<u8>> for Artifact {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for Artifact {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("len", &self.data.len())
            .finish()
    }
}

/// Resolution tier that produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadedFrom {
    /// Served synchronously from the in-memory cache.
    MemoryCache,
    /// Read back from the persistent disk cache.
    DiskCache,
    /// Fetched by the downloader.
    Remote,
}

impl fmt::Display for LoadedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_clone_shares_payload() {
        let artifact = Artifact::from(vec![1u8, 2, 3]);
        let clone = artifact.clone();

        assert_eq!(clone.as_bytes(), &[1, 2, 3]);
        assert_eq!(clone.len(), 3);
        assert_eq!(artifact, clone);
    }

    #[test]
    fn test_artifact_debug_hides_payload() {
        let artifact = Artifact::from(vec![0u8; 4096]);
        assert_eq!(format!("{:?}", artifact), "Artifact { len: 4096 }");
    }

    #[test]
    fn test_loaded_from_display() {
        assert_eq!(LoadedFrom::MemoryCache.to_string(), "memory");
        assert_eq!(LoadedFrom::DiskCache.to_string(), "disk");
        assert_eq!(LoadedFrom::Remote.to_string(), "remote");
    }
}
