use sha2::{Digest, Sha512};
use std::fmt;

/// Number of bytes in a chunk or source id.
pub const HASH_SIZE: usize = 32;

/// A chunk or source identity.
///
/// Computed as SHA-512 over the plaintext, truncated to the first 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HashSum([u8; HASH_SIZE]);

impl HashSum {
    /// Digest the given data into an id.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(data);
        let mut sum = [0u8; HASH_SIZE];
        sum.copy_from_slice(&hasher.finalize()[..HASH_SIZE]);
        Self(sum)
    }
    /// Create from a slice of exactly [`HASH_SIZE`] bytes.
    pub fn from_slice(s: &[u8]) -> Option<Self> {
        let mut sum = [0u8; HASH_SIZE];
        if s.len() != HASH_SIZE {
            return None;
        }
        sum.copy_from_slice(s);
        Some(Self(sum))
    }
    /// Parse from a 64 character hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != HASH_SIZE * 2 {
            return None;
        }
        let mut sum = [0u8; HASH_SIZE];
        for (index, byte) in sum.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16).ok()?;
        }
        Some(Self(sum))
    }
    /// The id as a slice.
    pub fn slice(&self) -> &[u8] {
        &self.0[..]
    }
    /// Returns a new vec containing the id.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<[u8; HASH_SIZE]> for HashSum {
    fn from(sum: [u8; HASH_SIZE]) -> Self {
        Self(sum)
    }
}

impl AsRef<[u8]> for HashSum {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl PartialEq<&[u8]> for HashSum {
    fn eq(&self, other: &&[u8]) -> bool {
        self.0[..] == **other
    }
}

impl fmt::Display for HashSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HashSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashSum({})", self)
    }
}
