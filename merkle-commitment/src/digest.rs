use core::{fmt, str::FromStr};

use binary_field::Gf2_128;
use bincode::{Decode, Encode};

use crate::{CommitmentError, layout::BLOCK_SIZE};

/// Size of a digest in bytes.
pub const DIGEST_SIZE: usize = BLOCK_SIZE;

/// A 16-byte tree node value.
///
/// Ordering is lexicographic over the bytes, which is what sparse layers and
/// proof encodings rely on.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a digest out of a slice of exactly [`DIGEST_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CommitmentError> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| CommitmentError::InvalidDigestLength(bytes.len()))
    }

    /// Borrow the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// The raw bytes.
    pub const fn into_bytes(self) -> [u8; DIGEST_SIZE] {
        self.0
    }

    /// Interpret the digest as a field element (little-endian).
    pub const fn to_field(self) -> Gf2_128 {
        Gf2_128::from_le_bytes(self.0)
    }

    /// Encode a field element as a digest (little-endian).
    pub const fn from_field(element: Gf2_128) -> Self {
        Self(element.to_le_bytes())
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; DIGEST_SIZE] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl From<Gf2_128> for Digest {
    fn from(element: Gf2_128) -> Self {
        Self::from_field(element)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}

impl FromStr for Digest {
    type Err = CommitmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| CommitmentError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}
