//! Graph checksums
//!
//! A [`Checksum`] digests kind, UUID and field payload of every box fed to
//! a [`ChecksumBuilder`]. Creation indices are not part of it, so two graphs
//! with the same content agree no matter how they were built.

use crate::boxes::GraphBox;
use std::fmt::{self, Display, Formatter};

/// BLAKE3 digest of graph content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Raw digest
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl serde::Serialize for Checksum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Accumulates boxes into a [`Checksum`]
///
/// Boxes must be fed in UUID order for the digest to be canonical.
#[derive(Debug, Default, Clone)]
pub struct ChecksumBuilder {
    hasher: blake3::Hasher,
}

impl ChecksumBuilder {
    /// Create an empty accumulator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one box
    pub fn add_box(&mut self, graph_box: &GraphBox) -> &mut Self {
        self.chunk(graph_box.name().as_bytes());
        self.chunk(graph_box.uuid().as_bytes());
        self.chunk(&graph_box.field_bytes());
        self
    }

    // length prefix keeps ["ab", "c"] apart from ["a", "bc"]
    fn chunk(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_be_bytes());
        self.hasher.update(bytes);
    }

    /// Digest of everything fed so far
    #[must_use]
    pub fn finish(&self) -> Checksum {
        Checksum(*self.hasher.finalize().as_bytes())
    }
}
