//! PKCS#10 Certification Request types

use der::asn1::{AnyRef, ObjectIdentifier, SetOf};
use der::{Enumerated, Sequence, ValueOrd};
use spki::AlgorithmIdentifierRef;

use super::name::Name;
use crate::asn1::{EcPublicKeyInfo, SignatureBitString};

/// PEM label of a certification request.
pub const PEM_LABEL: &str = "CERTIFICATE REQUEST";

/// Requests built here carry no attributes; the `[0]` set is always empty.
pub type Attributes<'a> = SetOf<Attribute<'a>, 1>;

/// PKCS#10 request attribute (`type` plus a set of values).
#[derive(Clone, Debug, PartialEq, Eq, Sequence, ValueOrd)]
pub struct Attribute<'a> {
    pub oid: ObjectIdentifier,
    pub values: SetOf<AnyRef<'a>, 1>,
}

/// Version identifier for certification request information.
///
/// (RFC 2986 designates `0` as the only valid version)
#[derive(Clone, Debug, Copy, PartialEq, Eq, Enumerated, Default)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
pub enum Version {
    /// Denotes PKCS#8 v1
    #[default]
    V1 = 0,
}

/// PKCS#10 `CertificationRequestInfo` as defined in [RFC 2986 Section 4].
///
/// ```text
/// CertificationRequestInfo ::= SEQUENCE {
///     version       INTEGER { v1(0) } (v1,...),
///     subject       Name,
///     subjectPKInfo SubjectPublicKeyInfo{{ PKInfoAlgorithms }},
///     attributes    [0] Attributes{{ CRIAttributes }}
/// }
/// ```
///
/// [RFC 2986 Section 4]: https://datatracker.ietf.org/doc/html/rfc2986#section-4
#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct CertReqInfo<'a> {
    /// Certification request version.
    pub version: Version,

    /// Subject name.
    pub subject: Name<'a>,

    /// Subject public key info.
    pub public_key: EcPublicKeyInfo,

    /// Request attributes. Always empty when built here.
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT")]
    pub attributes: Attributes<'a>,
}

/// PKCS#10 `CertificationRequest` as defined in [RFC 2986 Section 4].
///
/// ```text
/// CertificationRequest ::= SEQUENCE {
///     certificationRequestInfo CertificationRequestInfo,
///     signatureAlgorithm AlgorithmIdentifier{{ SignatureAlgorithms }},
///     signature          BIT STRING
/// }
/// ```
///
/// [RFC 2986 Section 4]: https://datatracker.ietf.org/doc/html/rfc2986#section-4
#[derive(Clone, Debug, PartialEq, Eq, Sequence)]
pub struct CertReq<'a> {
    /// Certification request information.
    pub info: CertReqInfo<'a>,

    /// Signature algorithm identifier.
    pub algorithm: AlgorithmIdentifierRef<'a>,

    /// Signature.
    pub signature: SignatureBitString,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::ec_public_key_info;
    use crate::asn1::tests::assert_symmetric;
    use crate::cert::name::NameComponents;
    use crate::key::PublicKey;

    #[test]
    fn empty_attributes_are_implicit_zero() {
        let subject = NameComponents::new();
        let key = PublicKey::try_from(&[0x11u8; 64][..]).unwrap();
        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.to_name().unwrap(),
            public_key: ec_public_key_info(&key),
            attributes: Attributes::new(),
        };

        let der = assert_symmetric(&info);
        // version, empty name, 91-byte SPKI, `a0 00`
        assert_eq!(der.len(), 2 + 3 + 2 + 91 + 2);
        assert_eq!(&der[..7], &[0x30, 0x62, 0x02, 0x01, 0x00, 0x30, 0x00]);
        assert_eq!(&der[der.len() - 2..], &[0xa0, 0x00]);
    }
}
