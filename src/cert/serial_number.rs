//! X.509 serial number

use core::fmt::Display;

use der::{
    asn1::UintRef, DecodeValue, EncodeValue, ErrorKind, FixedTag, Header, Length, Reader, Result,
    Tag, Writer,
};

/// Width of the serial number field kept by a document and by the
/// compressed certificate.
pub const SERIAL_NUMBER_LENGTH: usize = 16;

/// [RFC 5280 Section 4.1.2.2.]  Serial Number
///
///   The serial number MUST be a positive integer assigned by the CA to
///   each certificate.
///
/// Serials handled here are unsigned magnitudes of at most
/// [`SERIAL_NUMBER_LENGTH`] bytes. Leading zeros are dropped on encode and a
/// `00` is prepended when the most significant bit is set.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SerialNumber<'a> {
    inner: UintRef<'a>,
}

impl<'a> SerialNumber<'a> {
    /// Maximum encoded value length: 16 magnitude bytes plus sign padding.
    pub const MAX_LEN: Length = Length::new(SERIAL_NUMBER_LENGTH as u16 + 1);

    /// Create a new [`SerialNumber`] from a big endian unsigned magnitude.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let inner = UintRef::new(bytes)?;
        if inner.as_bytes().len() > SERIAL_NUMBER_LENGTH {
            return Err(ErrorKind::Overlength.into());
        }
        Ok(Self { inner })
    }

    /// Borrow the magnitude with all leading zeros stripped.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Right-aligns the magnitude into a zero-padded fixed field.
    pub fn to_fixed(&self) -> [u8; SERIAL_NUMBER_LENGTH] {
        let mut out = [0u8; SERIAL_NUMBER_LENGTH];
        let bytes = self.as_bytes();
        out[SERIAL_NUMBER_LENGTH - bytes.len()..].copy_from_slice(bytes);
        out
    }
}

impl<'a> EncodeValue for SerialNumber<'a> {
    fn value_len(&self) -> Result<Length> {
        self.inner.value_len()
    }

    fn encode_value(&self, writer: &mut impl Writer) -> Result<()> {
        self.inner.encode_value(writer)
    }
}

impl<'a> DecodeValue<'a> for SerialNumber<'a> {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> Result<Self> {
        if header.length > Self::MAX_LEN {
            return Err(ErrorKind::Overlength.into());
        }
        let inner = UintRef::decode_value(reader, header)?;
        if inner.as_bytes().len() > SERIAL_NUMBER_LENGTH {
            return Err(ErrorKind::Overlength.into());
        }
        Ok(Self { inner })
    }
}

impl FixedTag for SerialNumber<'_> {
    const TAG: Tag = <UintRef<'_> as FixedTag>::TAG;
}

impl Display for SerialNumber<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut iter = self.as_bytes().iter().peekable();

        while let Some(byte) = iter.next() {
            match iter.peek() {
                Some(_) => write!(f, "{:02X}:", byte)?,
                None => write!(f, "{:02X}", byte)?,
            }
        }

        Ok(())
    }
}
