//! Device-side certificate provisioning through a secure element.
//!
//! Builds and signs CSRs and certificates with the element's key, persists
//! the device certificate in the form the element supports, rebuilds it from
//! fields returned by the cloud service, and issues login JWTs.

use alloc::string::String;
use alloc::vec;

use crate::cert::compressed::CompressedCertificate;
use crate::cert::ext::AUTHORITY_KEY_ID_LENGTH;
use crate::cert::name::{AttributeKind, NameComponents, MAX_ATTRIBUTE_LEN};
use crate::cert::serial_number::SERIAL_NUMBER_LENGTH;
use crate::cert::time::ValidityInfo;
use crate::cert::{Document, DocumentKind, State};
use crate::element::soft::DER_SLOT_CAPACITY;
use crate::element::{CertificateStorage, SecureElement, Slot};
use crate::error::{Error, ErrorKind};
use crate::jws::Jws;
use crate::key::SIGNATURE_LENGTH;

/// Size of the NUL-padded device id record.
pub const DEVICE_ID_LENGTH: usize = 72;

/// JOSE header of cloud login tokens.
pub const JWT_HEADER: &str = r#"{"alg":"ES256","typ":"JWT"}"#;

type DeviceId = heapless::String<DEVICE_ID_LENGTH>;

/// Issuer name of device certificates signed by the cloud CA.
///
/// The compressed form does not store it; it is applied again on every read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IssuerConfig {
    pub country: &'static str,
    pub organization: &'static str,
    pub organizational_unit: &'static str,
    pub common_name: &'static str,
}

impl IssuerConfig {
    pub const ARDUINO: Self = Self {
        country: "US",
        organization: "Arduino LLC US",
        organizational_unit: "IT",
        common_name: "Arduino",
    };

    pub fn to_name(&self) -> Result<NameComponents, Error> {
        let mut name = NameComponents::new();
        name.set(AttributeKind::Country, self.country)?;
        name.set(AttributeKind::Organization, self.organization)?;
        name.set(AttributeKind::OrganizationalUnit, self.organizational_unit)?;
        name.set(AttributeKind::CommonName, self.common_name)?;
        Ok(name)
    }
}

/// Slot assignment of the cloud credentials.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CloudSlots {
    pub key: Slot,
    /// Slot one of the compressed certificate, or the DER object.
    pub certificate: Slot,
    /// Slot two of the compressed certificate.
    pub serial_number_and_authority_key_id: Slot,
    /// Device id; doubles as the subject common name of the certificate.
    pub device_id: Slot,
}

impl Default for CloudSlots {
    fn default() -> Self {
        Self {
            key: 0,
            certificate: 10,
            serial_number_and_authority_key_id: 11,
            device_id: 12,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CloudConfig {
    pub issuer: IssuerConfig,
    pub slots: CloudSlots,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            issuer: IssuerConfig::ARDUINO,
            slots: CloudSlots::default(),
        }
    }
}

impl CloudConfig {
    /// Shifts every slot by `offset`, e.g. 100 on elements storing DER
    /// objects.
    pub fn with_slot_offset(mut self, offset: Slot) -> Result<Self, Error> {
        let shift = |slot: Slot| -> Result<Slot, Error> {
            slot.checked_add(offset).ok_or_else(|| ErrorKind::OutOfRange.into())
        };
        self.slots = CloudSlots {
            key: shift(self.slots.key)?,
            certificate: shift(self.slots.certificate)?,
            serial_number_and_authority_key_id: shift(
                self.slots.serial_number_and_authority_key_id,
            )?,
            device_id: shift(self.slots.device_id)?,
        };
        Ok(self)
    }
}

/// Certificate fields as returned by the cloud after signing a CSR.
///
/// Binary fields are hex strings; dates are ISO 8601
/// (`YYYY-MM-DDTHH:MM:SSZ`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CloudCertificate<'a> {
    pub device_id: &'a str,
    pub not_before: &'a str,
    pub not_after: &'a str,
    pub serial_number: &'a str,
    pub authority_key_id: &'a str,
    pub signature: &'a str,
}

/// Builds and signs a CSR with the key in `key_slot`.
///
/// `doc` is only updated once the request is signed.
pub fn build_csr<SE: SecureElement>(
    se: &mut SE,
    doc: &mut Document,
    key_slot: Slot,
    new_private_key: bool,
) -> Result<(), Error> {
    let mut request = doc.clone();
    sign_request(se, &mut request, key_slot, new_private_key).map_err(|e| {
        error!("CSR generation failed: {}", e.kind());
        e
    })?;
    debug!("CSR ready, {} bytes", request.length());
    *doc = request;
    Ok(())
}

fn sign_request<SE: SecureElement>(
    se: &mut SE,
    request: &mut Document,
    key_slot: Slot,
    new_private_key: bool,
) -> Result<(), Error> {
    let public_key = if new_private_key {
        se.generate_private_key(key_slot)?
    } else {
        se.generate_public_key(key_slot)?
    };
    request.set_public_key(public_key.as_ref())?;
    request.build_csr()?;

    let digest = se.sha256(request.bytes())?;
    let signature = se.ec_sign(key_slot, &digest)?;
    request.sign_csr(&signature)
}

/// Builds a certificate for the key in `key_slot`.
///
/// With `self_sign` the body is signed by that key, otherwise the signature
/// set on `doc` beforehand is attached. `doc` is only updated once the
/// certificate is signed.
pub fn build_cert<SE: SecureElement>(
    se: &mut SE,
    doc: &mut Document,
    key_slot: Slot,
    self_sign: bool,
) -> Result<(), Error> {
    let mut cert = doc.clone();
    sign_certificate(se, &mut cert, key_slot, self_sign).map_err(|e| {
        error!("certificate generation failed: {}", e.kind());
        e
    })?;
    debug!("certificate ready, {} bytes", cert.length());
    *doc = cert;
    Ok(())
}

fn sign_certificate<SE: SecureElement>(
    se: &mut SE,
    cert: &mut Document,
    key_slot: Slot,
    self_sign: bool,
) -> Result<(), Error> {
    let public_key = se.generate_public_key(key_slot)?;
    cert.set_public_key(public_key.as_ref())?;
    cert.build_cert()?;

    if self_sign {
        let digest = se.sha256(cert.bytes())?;
        let signature = se.ec_sign(key_slot, &digest)?;
        cert.sign_cert(&signature)
    } else {
        cert.sign_cert_stored()
    }
}

/// Persists a signed certificate in the form the element supports.
///
/// Compressed elements take slot one, slot two and the subject common name
/// in the certificate, serial/key id and device id slots.
pub fn write_cert<SE: SecureElement>(
    se: &mut SE,
    doc: &Document,
    config: &CloudConfig,
) -> Result<(), Error> {
    let slot = config.slots.certificate;
    match se.certificate_storage() {
        CertificateStorage::Der => {
            if doc.state() != State::Signed(DocumentKind::Certificate) {
                return Err(ErrorKind::IncompleteState.into());
            }
            se.write_slot(slot, doc.bytes())?;
        }
        CertificateStorage::Compressed => {
            let compressed = doc.compressed()?;
            se.write_slot(slot, compressed.slot_one())?;
            se.write_slot(
                config.slots.serial_number_and_authority_key_id,
                compressed.slot_two(),
            )?;
            write_device_id(
                se,
                doc.subject().get(AttributeKind::CommonName),
                config.slots.device_id,
            )?;
        }
    }
    debug!("certificate written to slot {}", slot);
    Ok(())
}

fn read_exact<SE: SecureElement>(se: &mut SE, slot: Slot, buf: &mut [u8]) -> Result<(), Error> {
    let len = se.read_slot(slot, buf)?;
    if len != buf.len() {
        warn!("slot {} holds {} of {} bytes", slot, len, buf.len());
        return Err(ErrorKind::FormatMismatch.into());
    }
    Ok(())
}

/// Loads the stored device certificate into `doc`.
///
/// Compressed certificates are rebuilt with the configured issuer and the
/// public key of the configured key slot.
pub fn read_cert<SE: SecureElement>(
    se: &mut SE,
    doc: &mut Document,
    config: &CloudConfig,
) -> Result<(), Error> {
    let slot = config.slots.certificate;
    match se.certificate_storage() {
        CertificateStorage::Der => {
            let mut buf = vec![0u8; DER_SLOT_CAPACITY];
            let len = se.read_slot(slot, &mut buf)?;
            doc.import_cert(&buf[..len])?;
        }
        CertificateStorage::Compressed => {
            let mut one = [0u8; CompressedCertificate::SLOT_ONE_LENGTH];
            let mut two = [0u8; CompressedCertificate::SLOT_TWO_LENGTH];
            read_exact(se, slot, &mut one)?;
            read_exact(se, config.slots.serial_number_and_authority_key_id, &mut two)?;
            let common_name = read_device_id(se, config.slots.device_id)?;
            let public_key = se.generate_public_key(config.slots.key)?;

            let compressed = CompressedCertificate::from_slots(&one, &two)?;
            *doc = Document::decompress(
                &compressed,
                &config.issuer.to_name()?,
                &common_name,
                &public_key,
            )?;
        }
    }
    debug!("certificate read from slot {}", slot);
    Ok(())
}

fn decode_hex(input: &str, out: &mut [u8]) -> Result<(), Error> {
    hex::decode_to_slice(input, out).map_err(|_| {
        warn!("malformed hex field");
        Error::from(ErrorKind::FormatMismatch)
    })
}

/// Year, month, day and hour of an ISO 8601 timestamp.
fn parse_timestamp(input: &str) -> Result<(u16, u8, u8, u8), Error> {
    fn field<T: core::str::FromStr>(input: &str, range: core::ops::Range<usize>) -> Result<T, Error> {
        input
            .get(range)
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| ErrorKind::FormatMismatch.into())
    }

    Ok((
        field(input, 0..4)?,
        field(input, 5..7)?,
        field(input, 8..10)?,
        field(input, 11..13)?,
    ))
}

/// Rebuilds the device certificate from cloud-provided fields and signs it
/// with the provided signature. `doc` is only replaced on success.
pub fn rebuild<SE: SecureElement>(
    se: &mut SE,
    doc: &mut Document,
    cert: &CloudCertificate<'_>,
    config: &CloudConfig,
) -> Result<(), Error> {
    if cert.device_id.is_empty() || cert.serial_number.len() > 2 * SERIAL_NUMBER_LENGTH {
        return Err(ErrorKind::FormatMismatch.into());
    }

    let mut serial_number = [0u8; SERIAL_NUMBER_LENGTH];
    let serial_number = &mut serial_number[..cert.serial_number.len() / 2];
    decode_hex(cert.serial_number, serial_number)?;
    let mut authority_key_id = [0u8; AUTHORITY_KEY_ID_LENGTH];
    decode_hex(cert.authority_key_id, &mut authority_key_id)?;
    let mut signature = [0u8; SIGNATURE_LENGTH];
    decode_hex(cert.signature, &mut signature)?;

    let (issue_year, issue_month, issue_day, issue_hour) = parse_timestamp(cert.not_before)?;
    let (expire_year, ..) = parse_timestamp(cert.not_after)?;
    let expire_years = expire_year
        .checked_sub(issue_year)
        .and_then(|years| u8::try_from(years).ok())
        .ok_or(ErrorKind::OutOfRange)?;

    let mut rebuilt = Document::new();
    rebuilt.set_subject_common_name(cert.device_id)?;
    rebuilt.set_issuer_name(config.issuer.to_name()?);
    rebuilt.set_signature(&signature)?;
    rebuilt.set_authority_key_id(&authority_key_id)?;
    rebuilt.set_serial_number(serial_number)?;
    rebuilt.set_validity(ValidityInfo {
        issue_year,
        issue_month,
        issue_day,
        issue_hour,
        expire_years,
    })?;

    build_cert(se, &mut rebuilt, config.slots.key, false)?;
    *doc = rebuilt;
    Ok(())
}

/// Whether `authority_key_id` (hex) differs from the one in `doc`.
pub fn is_authority_key_id_different(
    doc: &Document,
    authority_key_id: &str,
) -> Result<bool, Error> {
    let mut key_id = [0u8; AUTHORITY_KEY_ID_LENGTH];
    decode_hex(authority_key_id, &mut key_id)?;
    Ok(&key_id != doc.authority_key_id())
}

/// Stores `device_id` NUL-padded to [`DEVICE_ID_LENGTH`] bytes.
///
/// The id is the certificate's subject common name, so it is limited to
/// [`MAX_ATTRIBUTE_LEN`] bytes.
pub fn write_device_id<SE: SecureElement>(
    se: &mut SE,
    device_id: &str,
    slot: Slot,
) -> Result<(), Error> {
    if device_id.len() > MAX_ATTRIBUTE_LEN {
        return Err(ErrorKind::LengthMismatch.into());
    }
    let mut record = [0u8; DEVICE_ID_LENGTH];
    record[..device_id.len()].copy_from_slice(device_id.as_bytes());
    se.write_slot(slot, &record)
}

pub fn read_device_id<SE: SecureElement>(se: &mut SE, slot: Slot) -> Result<DeviceId, Error> {
    let mut record = [0u8; DEVICE_ID_LENGTH];
    read_exact(se, slot, &mut record)?;

    let len = record.iter().position(|&b| b == 0).unwrap_or(DEVICE_ID_LENGTH);
    let text = core::str::from_utf8(&record[..len])
        .map_err(|_| Error::from(ErrorKind::FormatMismatch))?;

    let mut device_id = DeviceId::new();
    device_id
        .push_str(text)
        .map_err(|_| Error::from(ErrorKind::LengthMismatch))?;
    Ok(device_id)
}

/// Cloud login token: `{"iat":<iat>,"iss":"<issuer>"}` signed with the key
/// in `slot`.
pub fn cloud_jwt<SE: SecureElement>(
    se: &mut SE,
    issuer: &str,
    iat: u64,
    slot: Slot,
) -> Result<String, Error> {
    let claims = alloc::format!(r#"{{"iat":{},"iss":"{}"}}"#, iat, issuer);
    Jws::new(se).sign(slot, JWT_HEADER.as_bytes(), claims.as_bytes())
}
