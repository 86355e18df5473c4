//! Reading back a stored DER certificate.

use der::Decode;

use super::certificate::Certificate;
use super::document::{Document, DocumentKind, State};
use super::ext::find_authority_key_id;
use super::name::NameComponents;
use super::time::ValidityInfo;
use crate::error::{Error, ErrorKind};

/// Header of a certificate between 256 and 65535 bytes: `30 82 LL LL`.
const HEADER_LENGTH: usize = 4;

/// Total length of the certificate at the start of `buf`.
///
/// Only the two-byte long-form SEQUENCE header is accepted. Any P-256
/// certificate with names and validity is longer than 255 bytes, so shorter
/// header forms are reported as `FormatMismatch` rather than parsed.
pub fn der_certificate_len(buf: &[u8]) -> Result<usize, Error> {
    match buf {
        [0x30, 0x82, hi, lo, ..] => {
            Ok(HEADER_LENGTH + usize::from(u16::from_be_bytes([*hi, *lo])))
        }
        _ => Err(ErrorKind::FormatMismatch.into()),
    }
}

impl Document {
    /// Replaces this document with the certificate stored in `der`.
    ///
    /// `der` may carry trailing bytes, e.g. the unused rest of a storage
    /// slot; the certificate length is taken from its header. The document
    /// is left untouched on failure, and a certificate without an authority
    /// key identifier fails with `NotFound`.
    pub fn import_cert(&mut self, der: &[u8]) -> Result<(), Error> {
        let length = der_certificate_len(der)?;
        let der = der.get(..length).ok_or(ErrorKind::FormatMismatch)?;

        let cert = Certificate::from_der(der).map_err(|_e| {
            warn!("stored certificate does not decode");
            Error::from(ErrorKind::FormatMismatch)
        })?;
        let tbs = &cert.tbs_certificate;

        let authority_key_id = match &tbs.extensions {
            Some(extensions) => find_authority_key_id(extensions)?,
            None => return Err(ErrorKind::NotFound.into()),
        };

        let imported = Document {
            issuer: NameComponents::from_name(&tbs.issuer)?,
            subject: NameComponents::from_name(&tbs.subject)?,
            validity: ValidityInfo::from_validity(&tbs.validity)?,
            serial_number: tbs.serial_number.to_fixed(),
            authority_key_id,
            public_key: Some(tbs.subject_public_key_info.subject_public_key.0),
            signature: Some(cert.signature.0),
            state: State::Signed(DocumentKind::Certificate),
            buffer: der.to_vec(),
        };
        debug!("imported certificate, {} bytes", length);

        *self = imported;
        Ok(())
    }
}
