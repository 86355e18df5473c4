//! DER field primitives shared by the certificate, CSR and JWS encoders.
//!
//! Every field type here implements [`der::EncodeValue`], which couples the
//! length computation (`value_len`) and the byte emission (`encode_value`)
//! in one place. Composite structures are sized bottom-up by summing these
//! lengths and then written depth-first in the same field order by
//! [`encode_exact`], into a buffer allocated once at the predicted size.

use alloc::vec;
use alloc::vec::Vec;

use const_oid::db::rfc5912::{ECDSA_WITH_SHA_256, ID_EC_PUBLIC_KEY, SECP_256_R_1};
use der::asn1::UintRef;
use der::{
    DecodeValue, Encode, EncodeValue, FixedTag, Header, Length, Reader, Sequence, SliceWriter,
    Tag, Writer,
};
use spki::{AlgorithmIdentifier, AlgorithmIdentifierRef, ObjectIdentifier};

use crate::error::{Error, ErrorKind};
use crate::key::{PublicKey, RawSignature, PUBLIC_KEY_LENGTH};

/// SEC1 tag byte of an uncompressed point.
const UNCOMPRESSED_POINT: u8 = 0x04;

/// `SubjectPublicKeyInfo` restricted to named-curve P-256 keys.
pub type EcPublicKeyInfo = spki::SubjectPublicKeyInfo<ObjectIdentifier, PublicKeyBitString>;

/// Two-pass encode: predict the length, allocate exactly, then append.
///
/// The written length must match the prediction; a mismatch is a bug in a
/// field's `value_len`/`encode_value` pair and is reported as
/// `ErrorKind::AssertFailure`.
pub fn encode_exact<T: Encode>(value: &T) -> Result<Vec<u8>, Error> {
    let len = usize::try_from(value.encoded_len()?)?;
    let mut buf = vec![0u8; len];

    let mut writer = SliceWriter::new(&mut buf);
    value.encode(&mut writer)?;
    let written = writer.finish()?.len();

    if written != len {
        error!("predicted {} bytes but wrote {}", len, written);
        return Err(ErrorKind::AssertFailure.into());
    }
    trace!("encoded {} bytes", len);
    Ok(buf)
}

/// Length of a complete TLV whose value is `value_len` bytes long.
///
/// Short form below 128, then one or two length-of-length bytes.
pub fn header_len(value_len: usize) -> Result<usize, Error> {
    let len = Length::try_from(value_len)?;
    let header = Header::new(Tag::Sequence, len)?;
    Ok(usize::try_from(header.encoded_len()?)?)
}

/// `ecdsa-with-SHA256` with absent parameters.
pub fn ecdsa_with_sha256() -> AlgorithmIdentifierRef<'static> {
    AlgorithmIdentifier {
        oid: ECDSA_WITH_SHA_256,
        parameters: None,
    }
}

/// `id-ecPublicKey` over `prime256v1`.
pub fn ec_public_key_info(public_key: &PublicKey) -> EcPublicKeyInfo {
    spki::SubjectPublicKeyInfo {
        algorithm: AlgorithmIdentifier {
            oid: ID_EC_PUBLIC_KEY,
            parameters: Some(SECP_256_R_1),
        },
        subject_public_key: PublicKeyBitString(*public_key),
    }
}

/// BIT STRING carrying an uncompressed P-256 point.
///
/// Value layout: `00` (no unused bits) `04` X Y, always 66 bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyBitString(pub PublicKey);

impl PublicKeyBitString {
    const VALUE_LEN: usize = 2 + PUBLIC_KEY_LENGTH;
}

impl FixedTag for PublicKeyBitString {
    const TAG: Tag = Tag::BitString;
}

impl<'a> DecodeValue<'a> for PublicKeyBitString {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        if usize::try_from(header.length)? != Self::VALUE_LEN {
            return Err(der::ErrorKind::Length { tag: Tag::BitString }.into());
        }

        let unused_bits = reader.read_byte()?;
        let point_tag = reader.read_byte()?;
        // Only uncompressed points with no unused bits are accepted.
        if unused_bits != 0 || point_tag != UNCOMPRESSED_POINT {
            return Err(Tag::BitString.value_error());
        }

        let mut key = PublicKey::default();
        reader.read_into(key.as_mut())?;
        Ok(Self(key))
    }
}

impl EncodeValue for PublicKeyBitString {
    fn value_len(&self) -> der::Result<Length> {
        Length::try_from(Self::VALUE_LEN)
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        writer.write(&[0u8, UNCOMPRESSED_POINT])?;
        writer.write(self.0.as_ref())
    }
}

/// `Ecdsa-Sig-Value ::= SEQUENCE { r INTEGER, s INTEGER }` (RFC 3279).
///
/// Both components are unsigned magnitudes: leading zeros are dropped and a
/// `00` is prepended whenever the top bit of the first remaining byte is set,
/// independently for `r` and `s`.
#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct EcdsaSignatureValue<'a> {
    pub r: UintRef<'a>,
    pub s: UintRef<'a>,
}

impl<'a> EcdsaSignatureValue<'a> {
    pub fn new(signature: &'a RawSignature) -> der::Result<Self> {
        Ok(Self {
            r: UintRef::new(signature.r())?,
            s: UintRef::new(signature.s())?,
        })
    }

    pub fn to_raw(&self) -> Result<RawSignature, Error> {
        RawSignature::from_components(self.r.as_bytes(), self.s.as_bytes())
    }
}

/// BIT STRING carrying a DER `Ecdsa-Sig-Value` built from a raw signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureBitString(pub RawSignature);

impl FixedTag for SignatureBitString {
    const TAG: Tag = Tag::BitString;
}

impl<'a> DecodeValue<'a> for SignatureBitString {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        let inner_len = (header.length - Length::ONE)?;
        let unused_bits = reader.read_byte()?;

        // BIT STRING must have 0 unused bits for a valid DER signature
        if unused_bits != 0 {
            return Err(Tag::BitString.value_error());
        }

        let mut sig_bytes = [0u8; 72];
        let len = usize::try_from(inner_len)?;
        if len > sig_bytes.len() {
            return Err(der::ErrorKind::Length { tag: Tag::BitString }.into());
        }
        reader.read_into(&mut sig_bytes[..len])?;

        let value = <EcdsaSignatureValue<'_> as der::Decode>::from_der(&sig_bytes[..len])?;
        let raw = value.to_raw().map_err(|_| Tag::Integer.value_error())?;
        Ok(Self(raw))
    }
}

impl EncodeValue for SignatureBitString {
    fn value_len(&self) -> der::Result<Length> {
        Length::ONE + EcdsaSignatureValue::new(&self.0)?.encoded_len()?
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        writer.write_byte(0)?;
        EcdsaSignatureValue::new(&self.0)?.encode(writer)
    }
}
