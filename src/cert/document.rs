//! Certificate and certification request documents.
//!
//! A [`Document`] collects the fields of one certificate or CSR, encodes the
//! unsigned body on `build_*` and the complete signed structure on `sign_*`.
//! Both steps size the output first and write it into a buffer allocated
//! once at that size.

use alloc::string::String;
use alloc::vec::Vec;

use der::asn1::SequenceOf;

use super::certificate::{self, Certificate, TbsCertificate, Version};
use super::ext::{AuthorityKeyIdValue, AUTHORITY_KEY_ID_LENGTH};
use super::name::{AttributeKind, NameComponents};
use super::request::{self, Attributes, CertReq, CertReqInfo};
use super::serial_number::{SerialNumber, SERIAL_NUMBER_LENGTH};
use super::time::ValidityInfo;
use crate::asn1::{ec_public_key_info, ecdsa_with_sha256, encode_exact, SignatureBitString};
use crate::b64;
use crate::error::{Error, ErrorKind};
use crate::key::{PublicKey, RawSignature};

/// What a built or signed document encodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DocumentKind {
    CertificateRequest,
    Certificate,
}

/// Lifecycle of a [`Document`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    #[default]
    Empty,
    FieldsSet,
    /// The buffer holds the unsigned body.
    Built(DocumentKind),
    /// The buffer holds the complete signed DER.
    Signed(DocumentKind),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub(super) issuer: NameComponents,
    pub(super) subject: NameComponents,
    pub(super) validity: ValidityInfo,
    pub(super) serial_number: [u8; SERIAL_NUMBER_LENGTH],
    pub(super) authority_key_id: [u8; AUTHORITY_KEY_ID_LENGTH],
    pub(super) public_key: Option<PublicKey>,
    pub(super) signature: Option<RawSignature>,
    pub(super) state: State,
    pub(super) buffer: Vec<u8>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every field and the buffer.
    pub fn begin(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Any field change drops the encoded buffer.
    fn touch(&mut self) {
        self.buffer.clear();
        self.state = State::FieldsSet;
    }

    pub fn set_subject(&mut self, kind: AttributeKind, value: &str) -> Result<(), Error> {
        self.subject.set(kind, value)?;
        self.touch();
        Ok(())
    }

    pub fn set_issuer(&mut self, kind: AttributeKind, value: &str) -> Result<(), Error> {
        self.issuer.set(kind, value)?;
        self.touch();
        Ok(())
    }

    pub fn set_subject_common_name(&mut self, value: &str) -> Result<(), Error> {
        self.set_subject(AttributeKind::CommonName, value)
    }

    pub fn set_subject_name(&mut self, subject: NameComponents) {
        self.subject = subject;
        self.touch();
    }

    pub fn set_issuer_name(&mut self, issuer: NameComponents) {
        self.issuer = issuer;
        self.touch();
    }

    pub fn set_issue_year(&mut self, year: u16) -> Result<(), Error> {
        self.validity.set_issue_year(year)?;
        self.touch();
        Ok(())
    }

    pub fn set_issue_month(&mut self, month: u8) -> Result<(), Error> {
        self.validity.set_issue_month(month)?;
        self.touch();
        Ok(())
    }

    pub fn set_issue_day(&mut self, day: u8) -> Result<(), Error> {
        self.validity.set_issue_day(day)?;
        self.touch();
        Ok(())
    }

    pub fn set_issue_hour(&mut self, hour: u8) -> Result<(), Error> {
        self.validity.set_issue_hour(hour)?;
        self.touch();
        Ok(())
    }

    pub fn set_expire_years(&mut self, years: u8) -> Result<(), Error> {
        self.validity.set_expire_years(years)?;
        self.touch();
        Ok(())
    }

    /// Sets all validity fields at once, checking each one.
    pub fn set_validity(&mut self, validity: ValidityInfo) -> Result<(), Error> {
        let mut checked = ValidityInfo::default();
        checked.set_issue_year(validity.issue_year)?;
        checked.set_issue_month(validity.issue_month)?;
        checked.set_issue_day(validity.issue_day)?;
        checked.set_issue_hour(validity.issue_hour)?;
        checked.set_expire_years(validity.expire_years)?;
        self.validity = checked;
        self.touch();
        Ok(())
    }

    /// Stores up to 16 bytes, right-aligned and zero-padded on the left.
    pub fn set_serial_number(&mut self, serial: &[u8]) -> Result<(), Error> {
        if serial.len() > SERIAL_NUMBER_LENGTH {
            return Err(ErrorKind::LengthMismatch.into());
        }
        let mut value = [0u8; SERIAL_NUMBER_LENGTH];
        value[SERIAL_NUMBER_LENGTH - serial.len()..].copy_from_slice(serial);
        self.serial_number = value;
        self.touch();
        Ok(())
    }

    /// An all-zero id counts as unset and omits the extension.
    pub fn set_authority_key_id(&mut self, key_id: &[u8]) -> Result<(), Error> {
        self.authority_key_id = key_id
            .try_into()
            .map_err(|_| Error::from(ErrorKind::LengthMismatch))?;
        self.touch();
        Ok(())
    }

    pub fn set_public_key(&mut self, public_key: &[u8]) -> Result<(), Error> {
        self.public_key = Some(PublicKey::try_from(public_key)?);
        self.touch();
        Ok(())
    }

    /// Stores a signature for [`Document::sign_cert_stored`].
    ///
    /// The unsigned body does not depend on the signature, so a built
    /// document stays built; a signed one is invalidated.
    pub fn set_signature(&mut self, signature: &[u8]) -> Result<(), Error> {
        self.signature = Some(RawSignature::try_from(signature)?);
        match self.state {
            State::Built(_) => {}
            _ => self.touch(),
        }
        Ok(())
    }

    pub fn subject(&self) -> &NameComponents {
        &self.subject
    }

    pub fn issuer(&self) -> &NameComponents {
        &self.issuer
    }

    pub fn validity(&self) -> &ValidityInfo {
        &self.validity
    }

    pub fn serial_number(&self) -> &[u8; SERIAL_NUMBER_LENGTH] {
        &self.serial_number
    }

    pub fn authority_key_id(&self) -> &[u8; AUTHORITY_KEY_ID_LENGTH] {
        &self.authority_key_id
    }

    pub fn has_authority_key_id(&self) -> bool {
        self.authority_key_id.iter().any(|&b| b != 0)
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn signature(&self) -> Option<&RawSignature> {
        self.signature.as_ref()
    }

    /// Built body or signed DER; empty in any other state.
    pub fn bytes(&self) -> &[u8] {
        match self.state {
            State::Built(_) | State::Signed(_) => &self.buffer,
            State::Empty | State::FieldsSet => &[],
        }
    }

    pub fn length(&self) -> usize {
        self.bytes().len()
    }

    fn require_fields(&self) -> Result<&PublicKey, Error> {
        if self.state == State::Empty {
            return Err(ErrorKind::IncompleteState.into());
        }
        self.public_key
            .as_ref()
            .ok_or_else(|| ErrorKind::IncompleteState.into())
    }

    fn require_built(&self, kind: DocumentKind) -> Result<(), Error> {
        if self.state != State::Built(kind) {
            warn!("sign called without a built body");
            return Err(ErrorKind::IncompleteState.into());
        }
        Ok(())
    }

    fn cert_req_info(&self) -> Result<CertReqInfo<'_>, Error> {
        let public_key = self.require_fields()?;
        Ok(CertReqInfo {
            version: request::Version::V1,
            subject: self.subject.to_name()?,
            public_key: ec_public_key_info(public_key),
            attributes: Attributes::new(),
        })
    }

    fn authority_key_id_value(&self) -> Result<Option<AuthorityKeyIdValue>, Error> {
        if !self.has_authority_key_id() {
            return Ok(None);
        }
        AuthorityKeyIdValue::new(&self.authority_key_id).map(Some)
    }

    fn tbs_certificate<'a>(
        &'a self,
        aki: Option<&'a AuthorityKeyIdValue>,
    ) -> Result<TbsCertificate<'a>, Error> {
        let public_key = self.require_fields()?;
        if self.validity == ValidityInfo::default() {
            return Err(ErrorKind::IncompleteState.into());
        }

        let extensions = match aki {
            Some(value) => {
                let mut extensions = SequenceOf::new();
                extensions.add(value.extension()?)?;
                Some(extensions)
            }
            None => None,
        };

        Ok(TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&self.serial_number)?,
            signature: ecdsa_with_sha256(),
            issuer: self.issuer.to_name()?,
            validity: self.validity.to_validity()?,
            subject: self.subject.to_name()?,
            subject_public_key_info: ec_public_key_info(public_key),
            extensions,
        })
    }

    /// Encodes the unsigned `CertificationRequestInfo`.
    pub fn build_csr(&mut self) -> Result<(), Error> {
        let buffer = encode_exact(&self.cert_req_info()?)?;
        debug!("built CSR body, {} bytes", buffer.len());

        self.buffer = buffer;
        self.state = State::Built(DocumentKind::CertificateRequest);
        Ok(())
    }

    /// Attaches `signature`, computed over the SHA-256 of the built body.
    pub fn sign_csr(&mut self, signature: &RawSignature) -> Result<(), Error> {
        self.require_built(DocumentKind::CertificateRequest)?;

        let request = CertReq {
            info: self.cert_req_info()?,
            algorithm: ecdsa_with_sha256(),
            signature: SignatureBitString(*signature),
        };
        let buffer = encode_exact(&request)?;
        debug!("signed CSR, {} bytes", buffer.len());

        self.buffer = buffer;
        self.signature = Some(*signature);
        self.state = State::Signed(DocumentKind::CertificateRequest);
        Ok(())
    }

    /// Encodes the unsigned `TBSCertificate`.
    pub fn build_cert(&mut self) -> Result<(), Error> {
        let aki = self.authority_key_id_value()?;
        let buffer = encode_exact(&self.tbs_certificate(aki.as_ref())?)?;
        debug!("built certificate body, {} bytes", buffer.len());

        self.buffer = buffer;
        self.state = State::Built(DocumentKind::Certificate);
        Ok(())
    }

    /// Attaches `signature` and records it for compression.
    pub fn sign_cert(&mut self, signature: &RawSignature) -> Result<(), Error> {
        self.require_built(DocumentKind::Certificate)?;

        let aki = self.authority_key_id_value()?;
        let certificate = Certificate {
            tbs_certificate: self.tbs_certificate(aki.as_ref())?,
            signature_algorithm: ecdsa_with_sha256(),
            signature: SignatureBitString(*signature),
        };
        let buffer = encode_exact(&certificate)?;
        debug!("signed certificate, {} bytes", buffer.len());

        self.buffer = buffer;
        self.signature = Some(*signature);
        self.state = State::Signed(DocumentKind::Certificate);
        Ok(())
    }

    /// Attaches the signature given earlier through [`Document::set_signature`].
    pub fn sign_cert_stored(&mut self) -> Result<(), Error> {
        let signature = self.signature.ok_or(ErrorKind::IncompleteState)?;
        self.sign_cert(&signature)
    }

    fn pem(&self, kind: DocumentKind, label: &str) -> Result<String, Error> {
        if self.state != State::Signed(kind) {
            return Err(ErrorKind::IncompleteState.into());
        }
        Ok(b64::pem_document(&self.buffer, label))
    }

    /// `-----BEGIN CERTIFICATE REQUEST-----` rendering of a signed CSR.
    pub fn csr_pem(&self) -> Result<String, Error> {
        self.pem(DocumentKind::CertificateRequest, request::PEM_LABEL)
    }

    /// `-----BEGIN CERTIFICATE-----` rendering of a signed certificate.
    pub fn cert_pem(&self) -> Result<String, Error> {
        self.pem(DocumentKind::Certificate, certificate::PEM_LABEL)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use der::{Decode, Encode};
    use hex_literal::hex;

    pub(crate) const TEST_PUBLIC_KEY: [u8; 64] = hex!(
        "1ccbe91c075fc7f4f033bfa248db8fccd3565de94bbfb12f3c59ff46c271bf83"
        "ce4014c68811f9a21a1fdb2c0e6113e06db7ca93b7404e78dc7ccd5ca89a4ca9"
    );
    pub(crate) const TEST_AUTHORITY_KEY_ID: [u8; 20] =
        hex!("a1b2c3d4e5f60718293a4b5c6d7e8f9011223344");

    pub(crate) fn test_signature(r_high: bool, s_high: bool) -> RawSignature {
        let mut raw = [0u8; 64];
        raw[..32].copy_from_slice(&[if r_high { 0xc1 } else { 0x31 }; 32]);
        raw[32..].copy_from_slice(&[if s_high { 0xf2 } else { 0x12 }; 32]);
        RawSignature::try_from(&raw[..]).unwrap()
    }

    pub(crate) fn arduino_issuer() -> NameComponents {
        let mut issuer = NameComponents::new();
        issuer.set(AttributeKind::Country, "US").unwrap();
        issuer.set(AttributeKind::Organization, "Arduino LLC US").unwrap();
        issuer.set(AttributeKind::OrganizationalUnit, "IT").unwrap();
        issuer.set(AttributeKind::CommonName, "Arduino").unwrap();
        issuer
    }

    pub(crate) fn certificate_fields() -> Document {
        let mut doc = Document::new();
        doc.set_issuer_name(arduino_issuer());
        doc.set_subject_common_name("device-1").unwrap();
        doc.set_validity(ValidityInfo {
            issue_year: 2024,
            issue_month: 1,
            issue_day: 15,
            issue_hour: 10,
            expire_years: 25,
        })
        .unwrap();
        doc.set_serial_number(&hex!("5fa3e0c2d1")).unwrap();
        doc.set_authority_key_id(&TEST_AUTHORITY_KEY_ID).unwrap();
        doc.set_public_key(&TEST_PUBLIC_KEY).unwrap();
        doc
    }

    #[test]
    fn state_machine() {
        let mut doc = Document::new();
        assert_eq!(doc.state(), State::Empty);
        assert_eq!(doc.build_csr().unwrap_err().kind(), ErrorKind::IncompleteState);

        doc.set_subject_common_name("device-1").unwrap();
        assert_eq!(doc.state(), State::FieldsSet);
        // Still no public key.
        assert_eq!(doc.build_csr().unwrap_err().kind(), ErrorKind::IncompleteState);
        assert_eq!(doc.state(), State::FieldsSet);

        doc.set_public_key(&TEST_PUBLIC_KEY).unwrap();
        doc.build_csr().unwrap();
        assert_eq!(doc.state(), State::Built(DocumentKind::CertificateRequest));
        assert!(!doc.bytes().is_empty());

        // Signing as the other kind is rejected and keeps the body.
        let body = doc.bytes().to_vec();
        assert_eq!(
            doc.sign_cert(&test_signature(false, false)).unwrap_err().kind(),
            ErrorKind::IncompleteState
        );
        assert_eq!(doc.bytes(), &body[..]);

        doc.sign_csr(&test_signature(false, false)).unwrap();
        assert_eq!(doc.state(), State::Signed(DocumentKind::CertificateRequest));

        doc.set_subject_common_name("device-2").unwrap();
        assert_eq!(doc.state(), State::FieldsSet);
        assert!(doc.bytes().is_empty());

        doc.begin();
        assert_eq!(doc, Document::new());
    }

    #[test]
    fn failed_setters_do_not_mutate() {
        let mut doc = Document::new();
        assert_eq!(
            doc.set_serial_number(&[1u8; 17]).unwrap_err().kind(),
            ErrorKind::LengthMismatch
        );
        assert_eq!(
            doc.set_authority_key_id(&[1u8; 19]).unwrap_err().kind(),
            ErrorKind::LengthMismatch
        );
        assert_eq!(
            doc.set_public_key(&[1u8; 65]).unwrap_err().kind(),
            ErrorKind::LengthMismatch
        );
        assert_eq!(doc, Document::new());
    }

    #[test]
    fn build_is_repeatable() {
        let mut doc = certificate_fields();
        doc.build_cert().unwrap();
        let first = doc.bytes().to_vec();
        doc.build_cert().unwrap();
        assert_eq!(doc.bytes(), &first[..]);
    }

    #[test]
    fn signed_certificate_contains_built_body() {
        for (r_high, s_high) in [(false, false), (true, false), (false, true), (true, true)] {
            let mut doc = certificate_fields();
            doc.build_cert().unwrap();
            let body = doc.bytes().to_vec();

            let signature = test_signature(r_high, s_high);
            doc.sign_cert(&signature).unwrap();

            let cert = Certificate::from_der(doc.bytes()).unwrap();
            assert_eq!(cert.tbs_certificate.to_der().unwrap(), body);
            assert_eq!(cert.signature.0, signature);

            // 4-byte header, body, 12-byte algorithm, BIT STRING with a
            // 2..=4 byte sequence header plus padded r and s.
            let sig_len = 3 + 2 + (2 + 32 + r_high as usize) + (2 + 32 + s_high as usize);
            assert_eq!(doc.length(), 4 + body.len() + 12 + sig_len);
        }
    }

    #[test]
    fn authority_key_id_only_when_set() {
        let mut doc = certificate_fields();
        doc.build_cert().unwrap();
        let with = doc.length();

        doc.set_authority_key_id(&[0u8; 20]).unwrap();
        doc.build_cert().unwrap();
        let tbs = TbsCertificate::from_der(doc.bytes()).unwrap();
        assert!(tbs.extensions.is_none());
        // `a3 23` wrapper plus the 33-byte extension, and the body length
        // drops below 256 so its header loses a byte.
        assert_eq!(with - doc.length(), 38);
    }

    #[test]
    fn sign_stored_signature() {
        let mut doc = certificate_fields();
        doc.build_cert().unwrap();
        assert_eq!(doc.sign_cert_stored().unwrap_err().kind(), ErrorKind::IncompleteState);

        doc.set_signature(test_signature(true, true).as_ref()).unwrap();
        assert_eq!(doc.state(), State::Built(DocumentKind::Certificate));
        doc.sign_cert_stored().unwrap();
        assert_eq!(doc.signature(), Some(&test_signature(true, true)));
        assert_eq!(doc.state(), State::Signed(DocumentKind::Certificate));
    }

    #[test]
    fn certificate_without_validity_is_incomplete() {
        let mut doc = Document::new();
        doc.set_public_key(&TEST_PUBLIC_KEY).unwrap();
        assert_eq!(doc.build_cert().unwrap_err().kind(), ErrorKind::IncompleteState);
        doc.build_csr().unwrap();
    }

    #[test]
    fn pem_requires_matching_signed_kind() {
        let mut doc = certificate_fields();
        assert!(doc.cert_pem().is_err());
        doc.build_cert().unwrap();
        doc.sign_cert(&test_signature(false, true)).unwrap();
        assert!(doc.csr_pem().is_err());

        let pem = doc.cert_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.ends_with("\n-----END CERTIFICATE-----\n"));
        assert!(pem.lines().all(|line| line.len() <= 76));
    }

    #[test]
    fn csr_parses_with_x509_cert() {
        let mut doc = Document::new();
        doc.set_subject_common_name("device-1").unwrap();
        doc.set_public_key(&TEST_PUBLIC_KEY).unwrap();
        doc.build_csr().unwrap();
        doc.sign_csr(&test_signature(true, false)).unwrap();

        let req = x509_cert::request::CertReq::from_der(doc.bytes()).unwrap();
        assert_eq!(req.info.subject.to_string(), "CN=device-1");
        let spki = req.info.public_key;
        let point = spki.subject_public_key.raw_bytes();
        assert_eq!(point[0], 0x04);
        assert_eq!(&point[1..], &TEST_PUBLIC_KEY);
        assert!(req.info.attributes.is_empty());

        let pem = doc.csr_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----\n"));
    }

    #[test]
    fn certificate_parses_with_x509_cert() {
        let mut doc = certificate_fields();
        doc.build_cert().unwrap();
        doc.sign_cert(&test_signature(true, true)).unwrap();

        let cert = x509_cert::Certificate::from_der(doc.bytes()).unwrap();
        let tbs = &cert.tbs_certificate;
        assert_eq!(tbs.version, x509_cert::Version::V3);
        assert_eq!(tbs.serial_number.as_bytes(), &hex!("5fa3e0c2d1"));
        assert_eq!(
            tbs.issuer.to_string(),
            "CN=Arduino,OU=IT,O=Arduino LLC US,C=US"
        );
        assert_eq!(tbs.subject.to_string(), "CN=device-1");

        let extensions = tbs.extensions.as_ref().unwrap();
        assert_eq!(extensions.len(), 1);
        assert!(!extensions[0].critical);
    }
}
