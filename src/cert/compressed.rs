//! Compressed certificate format for storage-constrained secure elements
//!
//! The compressed form keeps only the parts of a certificate that cannot be
//! rebuilt from configuration, in a fixed 108-byte record split over two
//! slots:
//!
//! - Slot one, 72 bytes: signature (64, r || s), packed dates (3), reserved (5)
//! - Slot two, 36 bytes: serial number (16, right-aligned), authority key id (20)
//!
//! Names, public key and algorithm identifiers are supplied again when the
//! certificate is rebuilt with [`Document::decompress`].

use core::ops::Range;

use bitfield_struct::bitfield;

use super::document::{Document, DocumentKind, State};
use super::ext::AUTHORITY_KEY_ID_LENGTH;
use super::name::NameComponents;
use super::serial_number::SERIAL_NUMBER_LENGTH;
use super::time::ValidityInfo;
use crate::error::{Error, ErrorKind};
use crate::key::{PublicKey, RawSignature};

/// Length of the packed date field in bytes.
pub const DATES_LENGTH: usize = 3;

/// Issue date and validity period packed into 24 bits.
///
/// Layout, most significant bit first:
/// - Bits 23-19: Year (years since 2000, valid 0-31 = 2000-2031)
/// - Bits 18-15: Month (1-12)
/// - Bits 14-10: Day (1-31)
/// - Bits 9-5: Hour (0-23)
/// - Bits 4-0: Expire years (0-31 years validity)
///
/// Minutes and seconds are not stored.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct CompressedDate {
    #[bits(5)]
    pub expire_years: u8,
    #[bits(5)]
    pub hour: u8,
    #[bits(5)]
    pub day: u8,
    #[bits(4)]
    pub month: u8,
    #[bits(5)]
    pub year: u8,
    #[bits(8)]
    __: u8,
}

impl CompressedDate {
    /// Base year for compressed date encoding
    pub const BASE_YEAR: u16 = 2000;

    /// Maximum year offset (5 bits)
    pub const MAX_YEAR_OFFSET: u8 = 31;

    /// Maximum expire years (5 bits)
    pub const MAX_EXPIRE_YEARS: u8 = 31;

    pub fn from_validity_info(validity: &ValidityInfo) -> Result<Self, Error> {
        let year = validity
            .issue_year
            .checked_sub(Self::BASE_YEAR)
            .and_then(|offset| u8::try_from(offset).ok())
            .filter(|&offset| offset <= Self::MAX_YEAR_OFFSET)
            .ok_or(ErrorKind::OutOfRange)?;

        if validity.expire_years > Self::MAX_EXPIRE_YEARS
            || validity.issue_month > 15
            || validity.issue_day > 31
            || validity.issue_hour > 31
        {
            return Err(ErrorKind::OutOfRange.into());
        }

        Ok(Self::new()
            .with_year(year)
            .with_month(validity.issue_month)
            .with_day(validity.issue_day)
            .with_hour(validity.issue_hour)
            .with_expire_years(validity.expire_years))
    }

    pub fn to_validity_info(&self) -> ValidityInfo {
        ValidityInfo {
            issue_year: Self::BASE_YEAR + u16::from(self.year()),
            issue_month: self.month(),
            issue_day: self.day(),
            issue_hour: self.hour(),
            expire_years: self.expire_years(),
        }
    }

    pub fn to_bytes(&self) -> [u8; DATES_LENGTH] {
        let raw = self.into_bits().to_be_bytes();
        [raw[1], raw[2], raw[3]]
    }

    pub fn from_bytes(bytes: [u8; DATES_LENGTH]) -> Self {
        Self::from_bits(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }
}

/// 108-byte compressed certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedCertificate {
    data: [u8; Self::SIZE],
}

impl CompressedCertificate {
    /// Total size of compressed certificate in bytes
    pub const SIZE: usize = Self::SLOT_ONE_LENGTH + Self::SLOT_TWO_LENGTH;
    /// Signature and dates slot
    pub const SLOT_ONE_LENGTH: usize = 72;
    /// Serial number and authority key id slot
    pub const SLOT_TWO_LENGTH: usize = 36;

    const SIGNATURE: Range<usize> = 0..64;
    const DATES: Range<usize> = 64..64 + DATES_LENGTH;
    const SLOT_ONE: Range<usize> = 0..Self::SLOT_ONE_LENGTH;
    const SERIAL_NUMBER: Range<usize> = 72..72 + SERIAL_NUMBER_LENGTH;
    const AUTHORITY_KEY_ID: Range<usize> = 88..88 + AUTHORITY_KEY_ID_LENGTH;
    const SLOT_TWO: Range<usize> = Self::SLOT_ONE_LENGTH..Self::SIZE;

    /// Create a zeroed compressed certificate
    pub fn zeroed() -> Self {
        Self {
            data: [0u8; Self::SIZE],
        }
    }

    /// Reassembles a record from its two independently stored slots.
    pub fn from_slots(one: &[u8], two: &[u8]) -> Result<Self, Error> {
        if one.len() != Self::SLOT_ONE_LENGTH || two.len() != Self::SLOT_TWO_LENGTH {
            return Err(ErrorKind::LengthMismatch.into());
        }
        let mut cert = Self::zeroed();
        cert.data[Self::SLOT_ONE].copy_from_slice(one);
        cert.data[Self::SLOT_TWO].copy_from_slice(two);
        Ok(cert)
    }

    pub fn slot_one(&self) -> &[u8] {
        &self.data[Self::SLOT_ONE]
    }

    pub fn slot_one_mut(&mut self) -> &mut [u8] {
        &mut self.data[Self::SLOT_ONE]
    }

    pub fn slot_two(&self) -> &[u8] {
        &self.data[Self::SLOT_TWO]
    }

    pub fn slot_two_mut(&mut self) -> &mut [u8] {
        &mut self.data[Self::SLOT_TWO]
    }

    pub fn signature(&self) -> RawSignature {
        let mut signature = RawSignature::default();
        signature
            .as_mut()
            .copy_from_slice(&self.data[Self::SIGNATURE]);
        signature
    }

    pub fn set_signature(&mut self, signature: &RawSignature) {
        self.data[Self::SIGNATURE].copy_from_slice(signature.as_ref());
    }

    pub fn dates(&self) -> CompressedDate {
        let mut bytes = [0u8; DATES_LENGTH];
        bytes.copy_from_slice(&self.data[Self::DATES]);
        CompressedDate::from_bytes(bytes)
    }

    pub fn set_dates(&mut self, date: CompressedDate) {
        self.data[Self::DATES].copy_from_slice(&date.to_bytes());
    }

    pub fn serial_number(&self) -> [u8; SERIAL_NUMBER_LENGTH] {
        let mut serial = [0u8; SERIAL_NUMBER_LENGTH];
        serial.copy_from_slice(&self.data[Self::SERIAL_NUMBER]);
        serial
    }

    pub fn set_serial_number(&mut self, serial: &[u8; SERIAL_NUMBER_LENGTH]) {
        self.data[Self::SERIAL_NUMBER].copy_from_slice(serial);
    }

    /// All zero when the certificate had no authority key id.
    pub fn authority_key_id(&self) -> [u8; AUTHORITY_KEY_ID_LENGTH] {
        let mut key_id = [0u8; AUTHORITY_KEY_ID_LENGTH];
        key_id.copy_from_slice(&self.data[Self::AUTHORITY_KEY_ID]);
        key_id
    }

    pub fn set_authority_key_id(&mut self, key_id: &[u8; AUTHORITY_KEY_ID_LENGTH]) {
        self.data[Self::AUTHORITY_KEY_ID].copy_from_slice(key_id);
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.data
    }

    /// Extracts the stored parts of a signed certificate.
    pub fn compress(document: &Document) -> Result<Self, Error> {
        if document.state() != State::Signed(DocumentKind::Certificate) {
            return Err(ErrorKind::IncompleteState.into());
        }
        let signature = document.signature().ok_or(ErrorKind::IncompleteState)?;

        let mut cert = Self::zeroed();
        cert.set_signature(signature);
        cert.set_dates(CompressedDate::from_validity_info(document.validity())?);
        cert.set_serial_number(document.serial_number());
        cert.set_authority_key_id(document.authority_key_id());
        debug!("compressed certificate");
        Ok(cert)
    }
}

impl Default for CompressedCertificate {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl AsRef<[u8]> for CompressedCertificate {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl TryFrom<&[u8]> for CompressedCertificate {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != Self::SIZE {
            return Err(ErrorKind::LengthMismatch.into());
        }
        let mut data = [0u8; Self::SIZE];
        data.copy_from_slice(bytes);
        Ok(Self { data })
    }
}

impl Document {
    /// The compressed view of a signed certificate.
    pub fn compressed(&self) -> Result<CompressedCertificate, Error> {
        CompressedCertificate::compress(self)
    }

    /// Rebuilds and signs a certificate from its compressed parts.
    ///
    /// The issuer, subject common name and public key come from the caller;
    /// the stored signature is attached as is.
    pub fn decompress(
        compressed: &CompressedCertificate,
        issuer: &NameComponents,
        subject_common_name: &str,
        public_key: &PublicKey,
    ) -> Result<Self, Error> {
        let mut document = Document::new();
        document.set_issuer_name(issuer.clone());
        document.set_subject_common_name(subject_common_name)?;
        document.set_validity(compressed.dates().to_validity_info())?;
        document.set_serial_number(&compressed.serial_number())?;
        document.set_authority_key_id(&compressed.authority_key_id())?;
        document.set_public_key(public_key.as_ref())?;
        document.set_signature(compressed.signature().as_ref())?;

        document.build_cert()?;
        document.sign_cert_stored()?;
        debug!("decompressed certificate, {} bytes", document.length());
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::document::tests::{
        arduino_issuer, certificate_fields, test_signature, TEST_PUBLIC_KEY,
    };
    use der::{DateTime, Decode};
    use hex_literal::hex;

    fn signed_certificate() -> Document {
        let mut doc = certificate_fields();
        doc.build_cert().unwrap();
        doc.sign_cert(&test_signature(true, false)).unwrap();
        doc
    }

    #[test]
    fn date_bit_layout() {
        let date = CompressedDate::from_validity_info(&ValidityInfo {
            issue_year: 2024,
            issue_month: 1,
            issue_day: 15,
            issue_hour: 10,
            expire_years: 25,
        })
        .unwrap();

        assert_eq!(date.year(), 24);
        assert_eq!(date.expire_years(), 25);
        // 11000 0001 01111 01010 11001
        assert_eq!(date.to_bytes(), hex!("c0bd59"));
        assert_eq!(CompressedDate::from_bytes(hex!("c0bd59")), date);
    }

    #[test]
    fn date_range_limits() {
        let mut validity = ValidityInfo {
            issue_year: 2031,
            issue_month: 12,
            issue_day: 31,
            issue_hour: 23,
            expire_years: 31,
        };
        let date = CompressedDate::from_validity_info(&validity).unwrap();
        assert_eq!(date.to_validity_info(), validity);

        validity.issue_year = 2032;
        assert_eq!(
            CompressedDate::from_validity_info(&validity).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        validity.issue_year = 1999;
        assert_eq!(
            CompressedDate::from_validity_info(&validity).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        validity.issue_year = 2020;
        validity.expire_years = 32;
        assert_eq!(
            CompressedDate::from_validity_info(&validity).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
    }

    #[test]
    fn slot_layout() {
        let doc = signed_certificate();
        let compressed = doc.compressed().unwrap();

        let one = compressed.slot_one();
        assert_eq!(one.len(), 72);
        assert_eq!(&one[..64], test_signature(true, false).as_ref());
        assert_eq!(&one[64..67], &hex!("c0bd59"));
        assert_eq!(&one[67..], &[0u8; 5]);

        let two = compressed.slot_two();
        assert_eq!(two.len(), 36);
        assert_eq!(&two[..16], &hex!("0000000000000000000000 5fa3e0c2d1"));
        assert_eq!(&two[16..], doc.authority_key_id());

        let rebuilt = CompressedCertificate::from_slots(one, two).unwrap();
        assert_eq!(rebuilt, compressed);
        assert_eq!(
            CompressedCertificate::from_slots(&one[1..], two).unwrap_err().kind(),
            ErrorKind::LengthMismatch
        );
    }

    #[test]
    fn compress_requires_signed_certificate() {
        let mut doc = certificate_fields();
        assert_eq!(doc.compressed().unwrap_err().kind(), ErrorKind::IncompleteState);
        doc.build_cert().unwrap();
        assert_eq!(doc.compressed().unwrap_err().kind(), ErrorKind::IncompleteState);
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let doc = signed_certificate();
        let compressed = doc.compressed().unwrap();
        let public_key = PublicKey::try_from(&TEST_PUBLIC_KEY[..]).unwrap();

        let rebuilt =
            Document::decompress(&compressed, &arduino_issuer(), "device-1", &public_key).unwrap();

        assert_eq!(rebuilt.signature(), doc.signature());
        assert_eq!(rebuilt.serial_number(), doc.serial_number());
        assert_eq!(rebuilt.authority_key_id(), doc.authority_key_id());
        assert_eq!(rebuilt.validity(), doc.validity());
        assert_eq!(rebuilt.bytes(), doc.bytes());
    }

    #[test]
    fn decompressed_validity_matches() {
        let compressed = signed_certificate().compressed().unwrap();
        let public_key = PublicKey::try_from(&TEST_PUBLIC_KEY[..]).unwrap();
        let rebuilt =
            Document::decompress(&compressed, &arduino_issuer(), "device-1", &public_key).unwrap();

        let cert = x509_cert::Certificate::from_der(rebuilt.bytes()).unwrap();
        let validity = cert.tbs_certificate.validity;
        assert_eq!(
            validity.not_before.to_date_time(),
            DateTime::new(2024, 1, 15, 10, 0, 0).unwrap()
        );
        assert_eq!(
            validity.not_after.to_date_time(),
            DateTime::new(2049, 1, 15, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn empty_record_does_not_decompress() {
        let public_key = PublicKey::try_from(&TEST_PUBLIC_KEY[..]).unwrap();
        let err = Document::decompress(
            &CompressedCertificate::zeroed(),
            &arduino_issuer(),
            "device-1",
            &public_key,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }
}
