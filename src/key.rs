//! Fixed-size key material exchanged with the secure element.
use crate::error::{Error, ErrorKind};

use generic_array::typenum::{U32, U64};
use generic_array::GenericArray;

/// Length of a raw, uncompressed P-256 point (X || Y).
pub const PUBLIC_KEY_LENGTH: usize = 64;
/// Length of a raw ECDSA P-256 signature (r || s).
pub const SIGNATURE_LENGTH: usize = 64;
/// Length of a SHA-256 digest.
pub const DIGEST_LENGTH: usize = 32;

// Raw EC point: 32-byte X followed by 32-byte Y, no SEC1 tag byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublicKey {
    pub(crate) value: GenericArray<u8, U64>,
}

impl PublicKey {
    pub fn x(&self) -> &[u8] {
        &self.value[..32]
    }

    pub fn y(&self) -> &[u8] {
        &self.value[32..]
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        self.value.as_ref()
    }
}

impl AsMut<[u8]> for PublicKey {
    fn as_mut(&mut self) -> &mut [u8] {
        self.value.as_mut()
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = Error;
    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        if buffer.len() != PUBLIC_KEY_LENGTH {
            return Err(ErrorKind::LengthMismatch.into());
        }

        let mut value = Self::default();
        value.as_mut().copy_from_slice(buffer);
        Ok(value)
    }
}

// Raw signature: 32-byte r followed by 32-byte s, both unsigned big endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSignature {
    pub(crate) value: GenericArray<u8, U64>,
}

impl RawSignature {
    pub fn r(&self) -> &[u8] {
        &self.value[..32]
    }

    pub fn s(&self) -> &[u8] {
        &self.value[32..]
    }

    pub(crate) fn from_components(r: &[u8], s: &[u8]) -> Result<Self, Error> {
        if r.len() > 32 || s.len() > 32 {
            return Err(ErrorKind::LengthMismatch.into());
        }
        // Right-align each component in its 32-byte half.
        let mut value = Self::default();
        value.as_mut()[32 - r.len()..32].copy_from_slice(r);
        value.as_mut()[64 - s.len()..].copy_from_slice(s);
        Ok(value)
    }
}

impl AsRef<[u8]> for RawSignature {
    fn as_ref(&self) -> &[u8] {
        self.value.as_ref()
    }
}

impl AsMut<[u8]> for RawSignature {
    fn as_mut(&mut self) -> &mut [u8] {
        self.value.as_mut()
    }
}

impl TryFrom<&[u8]> for RawSignature {
    type Error = Error;
    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        if buffer.len() != SIGNATURE_LENGTH {
            return Err(ErrorKind::LengthMismatch.into());
        }

        let mut value = Self::default();
        value.as_mut().copy_from_slice(buffer);
        Ok(value)
    }
}

// SHA-256 output handed to the signer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Digest {
    pub(crate) value: GenericArray<u8, U32>,
}

impl TryFrom<&[u8]> for Digest {
    type Error = Error;
    fn try_from(buffer: &[u8]) -> Result<Self, Self::Error> {
        if buffer.len() != DIGEST_LENGTH {
            return Err(ErrorKind::LengthMismatch.into());
        }

        let mut value = Self::default();
        value.as_mut().copy_from_slice(buffer);
        Ok(value)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        self.value.as_ref()
    }
}

impl AsMut<[u8]> for Digest {
    fn as_mut(&mut self) -> &mut [u8] {
        self.value.as_mut()
    }
}
