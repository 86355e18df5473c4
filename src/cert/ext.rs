//! Standardized X.509 Certificate Extensions

use const_oid::db::rfc5280::ID_CE_AUTHORITY_KEY_IDENTIFIER;
use der::asn1::{ObjectIdentifier, OctetStringRef, SequenceOf};
use der::{Decode, Encode, Sequence};

use crate::error::{Error, ErrorKind};

/// Upper bound of extensions a decoded certificate may carry.
pub const MAX_EXTENSIONS: usize = 8;

/// Width of a key identifier (a SHA-1 of the issuer key, opaque here).
pub const AUTHORITY_KEY_ID_LENGTH: usize = 20;

/// Encoded `AuthorityKeyIdentifier` holding only a 20-byte key id:
/// `30 16 80 14 <id>`.
const AUTHORITY_KEY_ID_DER_LENGTH: usize = 4 + AUTHORITY_KEY_ID_LENGTH;

/// Extension as defined in [RFC 5280 Section 4.1.2.9].
///
/// ```text
/// Extension  ::=  SEQUENCE  {
///      extnID      OBJECT IDENTIFIER,
///      critical    BOOLEAN DEFAULT FALSE,
///      extnValue   OCTET STRING
///                  -- contains the DER encoding of an ASN.1 value
///                  -- corresponding to the extension type identified
///                  -- by extnID
/// }
/// ```
///
/// [RFC 5280 Section 4.1.2.9]: https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.9
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct Extension<'a> {
    pub extn_id: ObjectIdentifier,

    #[asn1(default = "Default::default")]
    pub critical: bool,

    pub extn_value: OctetStringRef<'a>,
}

/// Extensions as defined in [RFC 5280 Section 4.1.2.9].
///
/// ```text
/// Extensions  ::=  SEQUENCE SIZE (1..MAX) OF Extension
/// ```
///
/// [RFC 5280 Section 4.1.2.9]: https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.9
pub type Extensions<'a> = SequenceOf<Extension<'a>, MAX_EXTENSIONS>;

/// AuthorityKeyIdentifier as defined in [RFC 5280 Section 4.2.1.1].
///
/// Only the key identifier form is produced or understood:
///
/// ```text
/// AuthorityKeyIdentifier ::= SEQUENCE {
///     keyIdentifier             [0] KeyIdentifier           OPTIONAL,
///     ...
/// }
///
/// KeyIdentifier ::= OCTET STRING
/// ```
///
/// [RFC 5280 Section 4.2.1.1]: https://datatracker.ietf.org/doc/html/rfc5280#section-4.2.1.1
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AuthorityKeyIdentifier<'a> {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub key_identifier: Option<OctetStringRef<'a>>,
}

/// Pre-encoded authority key identifier extension value.
///
/// The extension borrows its `extnValue` from this buffer, so it must
/// outlive the `Extension` handed to the encoder.
#[derive(Clone, Debug)]
pub struct AuthorityKeyIdValue {
    der: [u8; AUTHORITY_KEY_ID_DER_LENGTH],
}

impl AuthorityKeyIdValue {
    pub fn new(key_id: &[u8; AUTHORITY_KEY_ID_LENGTH]) -> Result<Self, Error> {
        let aki = AuthorityKeyIdentifier {
            key_identifier: Some(OctetStringRef::new(key_id)?),
        };
        let mut der = [0u8; AUTHORITY_KEY_ID_DER_LENGTH];
        let written = aki.encode_to_slice(&mut der)?.len();
        if written != AUTHORITY_KEY_ID_DER_LENGTH {
            return Err(ErrorKind::AssertFailure.into());
        }
        Ok(Self { der })
    }

    pub fn extension(&self) -> Result<Extension<'_>, Error> {
        Ok(Extension {
            extn_id: ID_CE_AUTHORITY_KEY_IDENTIFIER,
            critical: false,
            extn_value: OctetStringRef::new(&self.der)?,
        })
    }
}

/// Finds the authority key id among decoded extensions.
///
/// Fails with `NotFound` when the extension or its key identifier is
/// absent, and with `FormatMismatch` when the identifier is not 20 bytes.
pub fn find_authority_key_id(
    extensions: &Extensions<'_>,
) -> Result<[u8; AUTHORITY_KEY_ID_LENGTH], Error> {
    let extension = extensions
        .iter()
        .find(|ext| ext.extn_id == ID_CE_AUTHORITY_KEY_IDENTIFIER)
        .ok_or(ErrorKind::NotFound)?;

    let aki = AuthorityKeyIdentifier::from_der(extension.extn_value.as_bytes())?;
    let key_id = aki.key_identifier.ok_or(ErrorKind::NotFound)?;

    key_id
        .as_bytes()
        .try_into()
        .map_err(|_| ErrorKind::FormatMismatch.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::tests::assert_symmetric;
    use hex_literal::hex;

    const KEY_ID: [u8; 20] = hex!("0102030405060708090a0b0c0d0e0f1011121314");

    #[test]
    fn authority_key_id_extension_bytes() {
        let value = AuthorityKeyIdValue::new(&KEY_ID).unwrap();
        let der = assert_symmetric(&value.extension().unwrap());
        assert_eq!(der.len(), 33);
        assert_eq!(&der[..13], &hex!("301f0603551d230418301680 14"));
        assert_eq!(&der[13..], &KEY_ID);
    }

    #[test]
    fn key_id_is_found() {
        let value = AuthorityKeyIdValue::new(&KEY_ID).unwrap();
        let mut extensions = Extensions::new();
        extensions
            .add(Extension {
                extn_id: ObjectIdentifier::new_unwrap("2.5.29.19"),
                critical: true,
                extn_value: OctetStringRef::new(&hex!("3000")).unwrap(),
            })
            .unwrap();
        extensions.add(value.extension().unwrap()).unwrap();

        assert_eq!(find_authority_key_id(&extensions).unwrap(), KEY_ID);
    }

    #[test]
    fn missing_extension_is_not_found() {
        let extensions = Extensions::new();
        assert_eq!(
            find_authority_key_id(&extensions).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn critical_flag_is_encoded_only_when_set() {
        let ext = Extension {
            extn_id: ObjectIdentifier::new_unwrap("2.5.29.19"),
            critical: true,
            extn_value: OctetStringRef::new(&hex!("3000")).unwrap(),
        };
        let der = assert_symmetric(&ext);
        assert_eq!(der, hex!("300c 0603551d13 0101ff 04023000"));
    }
}
