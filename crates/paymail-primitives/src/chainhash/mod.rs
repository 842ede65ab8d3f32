//! Chain hash type for transaction IDs and Merkle tree nodes.
//!
//! Provides a `Hash` type, a 32-byte array displayed as byte-reversed hex,
//! matching Bitcoin's convention for transaction IDs and block hashes.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize, Serializer, Deserializer};
use crate::hash::sha256d;
use crate::PrimitivesError;

/// Size of a Hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Hex string length of a Hash (64 hex characters).
pub const HASH_STRING_SIZE: usize = HASH_SIZE * 2;

/// A 32-byte hash used for transaction IDs and Merkle tree nodes.
///
/// The bytes are kept in internal (wire) order. When displayed as a
/// string, they are reversed to match Bitcoin's standard representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Create a Hash from a raw 32-byte array in internal order.
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    /// Create a Hash from a byte slice in internal order.
    ///
    /// # Arguments
    /// * `bytes` - A slice that must be exactly 32 bytes.
    ///
    /// # Returns
    /// `Ok(Hash)` if the slice is 32 bytes, or an error otherwise.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let arr: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| {
            PrimitivesError::InvalidHash(format!(
                "invalid hash length of {}, want {}",
                bytes.len(),
                HASH_SIZE
            ))
        })?;
        Ok(Hash(arr))
    }

    /// Create a Hash from bytes in display (big-endian) order.
    ///
    /// An empty slice yields the all-zero hash. Any length other than
    /// 0 or 32 is an error.
    pub fn from_display_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.is_empty() {
            return Ok(Hash::default());
        }
        let mut hash = Self::from_bytes(bytes)?;
        hash.0.reverse();
        Ok(hash)
    }

    /// Create a Hash from a byte-reversed (display order) hex string.
    ///
    /// The empty string yields the all-zero hash. Otherwise the string
    /// must be exactly 64 hex characters.
    ///
    /// # Arguments
    /// * `hex_str` - The display-order hex string.
    ///
    /// # Returns
    /// `Ok(Hash)` on success, or an error for odd length, non-hex
    /// characters, or a wrong length.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.is_empty() {
            return Ok(Hash::default());
        }
        if hex_str.len() != HASH_STRING_SIZE {
            // Surface non-hex content before the length complaint.
            hex::decode(hex_str)?;
            return Err(PrimitivesError::InvalidHash(format!(
                "hash string must be {} hex characters, got {}",
                HASH_STRING_SIZE,
                hex_str.len()
            )));
        }
        let decoded = hex::decode(hex_str)?;
        Self::from_display_bytes(&decoded)
    }

    /// Access the internal byte array.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Return the bytes in display (big-endian) order.
    pub fn to_display_bytes(&self) -> [u8; HASH_SIZE] {
        let mut reversed = self.0;
        reversed.reverse();
        reversed
    }

    /// `true` for the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }
}

/// Display the hash as byte-reversed hex (Bitcoin convention).
impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_display_bytes()))
    }
}

impl FromStr for Hash {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

/// Serialize as a display-order hex string.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute double SHA-256 of the input and return the result as a Hash.
pub fn double_hash_h(data: &[u8]) -> Hash {
    Hash(sha256d(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Genesis block hash bytes in internal (little-endian) order.
    const MAIN_NET_GENESIS_HASH: Hash = Hash([
        0x6f, 0xe2, 0x8c, 0x0a, 0xb6, 0xf1, 0xb3, 0x72,
        0xc1, 0xa6, 0xa2, 0x46, 0xae, 0x63, 0xf7, 0x4f,
        0x93, 0x1e, 0x83, 0x65, 0xe1, 0x5a, 0x08, 0x9c,
        0x68, 0xd6, 0x19, 0x00, 0x00, 0x00, 0x00, 0x00,
    ]);

    #[test]
    fn test_hash_string() {
        // Block 100000 hash in internal byte order.
        let hash = Hash::new([
            0x06, 0xe5, 0x33, 0xfd, 0x1a, 0xda, 0x86, 0x39,
            0x1f, 0x3f, 0x6c, 0x34, 0x32, 0x04, 0xb0, 0xd2,
            0x78, 0xd4, 0xaa, 0xec, 0x1c, 0x0b, 0x20, 0xaa,
            0x27, 0xba, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);
        assert_eq!(
            hash.to_string(),
            "000000000003ba27aa200b1cecaad478d2b00432346c3f1f3986da1afd33e506"
        );
    }

    #[test]
    fn test_from_hex() {
        let result = Hash::from_hex(
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        ).unwrap();
        assert_eq!(result, MAIN_NET_GENESIS_HASH);

        assert_eq!(Hash::from_hex("").unwrap(), Hash::default());
        assert!(Hash::from_hex("").unwrap().is_zero());

        // Short, odd-length, too long and non-hex inputs are all rejected.
        assert!(Hash::from_hex("19d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f").is_err());
        assert!(Hash::from_hex("abc").is_err());
        assert!(Hash::from_hex(
            "01234567890123456789012345678901234567890123456789012345678912345"
        ).is_err());
        assert!(matches!(
            Hash::from_hex("zz0000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"),
            Err(PrimitivesError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_from_bytes_length() {
        assert!(Hash::from_bytes(&[0u8; HASH_SIZE]).is_ok());
        assert!(Hash::from_bytes(&[0u8; HASH_SIZE + 1]).is_err());
        assert!(Hash::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_display_bytes_roundtrip() {
        let display = MAIN_NET_GENESIS_HASH.to_display_bytes();
        assert_eq!(display[0], 0x00);
        assert_eq!(display[31], 0x6f);
        assert_eq!(Hash::from_display_bytes(&display).unwrap(), MAIN_NET_GENESIS_HASH);
        assert_eq!(Hash::from_display_bytes(&[]).unwrap(), Hash::default());
        assert!(Hash::from_display_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_marshalling() {
        #[derive(Serialize, Deserialize)]
        struct TestData {
            hash: Hash,
        }

        let data = TestData {
            hash: Hash::new(crate::hash::sha256(b"hello")),
        };
        assert_eq!(
            data.hash.to_string(),
            "24988b93623304735e42a71f5c1e161b9ee2b9c52a3be8260ea3b05fba4df22c"
        );

        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(
            json,
            r#"{"hash":"24988b93623304735e42a71f5c1e161b9ee2b9c52a3be8260ea3b05fba4df22c"}"#
        );

        let data2: TestData = serde_json::from_str(&json).unwrap();
        assert_eq!(data2.hash, data.hash);
    }

    #[test]
    fn test_double_hash_h() {
        assert_eq!(
            double_hash_h(b"").to_string(),
            "56944c5d3f98413ef45cf54545538103cc9f298e0575820ad3591376e2e0f65d"
        );
    }
}
