//! Content-derived 32-byte identifiers.

use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, Read, ReadExt, Write};
use commonware_cryptography::{Hasher, Sha256};
use std::fmt::{Debug, Display, Formatter};

const IDENTIFIER_LENGTH: usize = 32;

/// Identifies a node, block or message by a SHA-256 digest.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Identifier([u8; IDENTIFIER_LENGTH]);

impl Identifier {
    /// Computes the identifier of `message`.
    pub fn hash(message: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(message);
        let digest = hasher.finalize();
        let mut value = [0u8; IDENTIFIER_LENGTH];
        value.copy_from_slice(digest.as_ref());
        Self(value)
    }

    /// Returns a deterministic identifier derived from `seed`.
    ///
    /// Intended for tests and fixtures.
    pub fn from_seed(seed: u64) -> Self {
        Self::hash(&seed.to_be_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LENGTH] {
        &self.0
    }
}

impl From<[u8; IDENTIFIER_LENGTH]> for Identifier {
    fn from(value: [u8; IDENTIFIER_LENGTH]) -> Self {
        Self(value)
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Debug for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Write for Identifier {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl EncodeSize for Identifier {
    fn encode_size(&self) -> usize {
        IDENTIFIER_LENGTH
    }
}

impl Read for Identifier {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Ok(Self(<[u8; IDENTIFIER_LENGTH]>::read(buf)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};

    #[test]
    fn test_hash_known_vector() {
        let id = Identifier::hash(b"");
        assert_eq!(
            id.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_codec() {
        let id = Identifier::from_seed(42);
        let encoded = id.encode();
        assert_eq!(encoded.len(), IDENTIFIER_LENGTH);
        assert_eq!(Identifier::decode(encoded).unwrap(), id);
        assert!(matches!(
            Identifier::decode(&[0u8; 31][..]),
            Err(CodecError::EndOfBuffer)
        ));
    }

    #[test]
    fn test_ordering() {
        let low = Identifier::from([0u8; 32]);
        let high = Identifier::from([1u8; 32]);
        assert!(low < high);
        assert_ne!(Identifier::from_seed(1), Identifier::from_seed(2));
    }
}
