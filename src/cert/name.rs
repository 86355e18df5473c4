//! Name-related definitions as defined in X.501 (and updated by RFC 5280).

use crate::error::{Error, ErrorKind};
use crate::impl_newtype;

use der::asn1::{AnyRef, ObjectIdentifier, SequenceOf, SetOf};
use der::{Sequence, Tag, ValueOrd};

/// Upper bound of distinguished name components a decoded name may carry.
const MAX_RDN_SEQ: usize = 8;
const MAX_RDN_ATTRS: usize = 1;

/// Longest accepted attribute value, in bytes (X.520 `ub-name`-style limit).
pub const MAX_ATTRIBUTE_LEN: usize = 64;

/// X.501 Name as defined in [RFC 5280 Section 4.1.2.4]. X.501 Name is used to represent distinguished names.
///
/// ```text
/// Name ::= CHOICE { rdnSequence  RDNSequence }
/// ```
///
/// [RFC 5280 Section 4.1.2.4]: https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.4
pub type Name<'a> = RdnSequence<'a>;

/// X.501 RDNSequence as defined in [RFC 5280 Section 4.1.2.4].
///
/// ```text
/// RDNSequence ::= SEQUENCE OF RelativeDistinguishedName
/// ```
///
/// [RFC 5280 Section 4.1.2.4]: https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.4
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RdnSequence<'a>(pub SequenceOf<RelativeDistinguishedName<'a>, MAX_RDN_SEQ>);

impl RdnSequence<'_> {
    /// Is this [`RdnSequence`] empty?
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl_newtype!(
    RdnSequence<'a>,
    SequenceOf<RelativeDistinguishedName<'a>, MAX_RDN_SEQ>
);

/// RelativeDistinguishedName as defined in [RFC 5280 Section 4.1.2.4].
///
/// ```text
/// RelativeDistinguishedName ::= SET SIZE (1..MAX) OF AttributeTypeAndValue
/// ```
///
/// Names built here always hold exactly one attribute per RDN.
///
/// [RFC 5280 Section 4.1.2.4]: https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.4
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelativeDistinguishedName<'a>(pub SetOf<AttributeTypeAndValue<'a>, MAX_RDN_ATTRS>);

impl_newtype!(
    RelativeDistinguishedName<'a>,
    SetOf<AttributeTypeAndValue<'a>, MAX_RDN_ATTRS>
);

/// One `type`/`value` pair of a relative distinguished name.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Sequence, ValueOrd)]
pub struct AttributeTypeAndValue<'a> {
    pub oid: ObjectIdentifier,
    pub value: AnyRef<'a>,
}

/// The six name attributes a certificate or request may carry, in
/// encoding order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttributeKind {
    Country,
    StateOrProvince,
    Locality,
    Organization,
    OrganizationalUnit,
    CommonName,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 6] = [
        AttributeKind::Country,
        AttributeKind::StateOrProvince,
        AttributeKind::Locality,
        AttributeKind::Organization,
        AttributeKind::OrganizationalUnit,
        AttributeKind::CommonName,
    ];

    /// `id-at-*` arc under 2.5.4.
    pub const fn oid(&self) -> ObjectIdentifier {
        match self {
            AttributeKind::Country => ObjectIdentifier::new_unwrap("2.5.4.6"),
            AttributeKind::StateOrProvince => ObjectIdentifier::new_unwrap("2.5.4.8"),
            AttributeKind::Locality => ObjectIdentifier::new_unwrap("2.5.4.7"),
            AttributeKind::Organization => ObjectIdentifier::new_unwrap("2.5.4.10"),
            AttributeKind::OrganizationalUnit => ObjectIdentifier::new_unwrap("2.5.4.11"),
            AttributeKind::CommonName => ObjectIdentifier::new_unwrap("2.5.4.3"),
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.oid() == *oid)
    }
}

type AttributeString = heapless::String<MAX_ATTRIBUTE_LEN>;

/// Issuer or subject name components.
///
/// Empty components are absent from the encoding; the others are emitted in
/// the order of [`AttributeKind::ALL`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameComponents {
    values: [AttributeString; 6],
}

impl NameComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one component. Values longer than [`MAX_ATTRIBUTE_LEN`] are
    /// rejected and leave the previous value in place.
    pub fn set(&mut self, kind: AttributeKind, value: &str) -> Result<(), Error> {
        let mut string = AttributeString::new();
        string
            .push_str(value)
            .map_err(|_| Error::from(ErrorKind::LengthMismatch))?;
        self.values[kind as usize] = string;
        Ok(())
    }

    pub fn get(&self, kind: AttributeKind) -> &str {
        self.values[kind as usize].as_str()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Present components, in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeKind, &str)> + '_ {
        AttributeKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
            .filter(|(_, value)| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Builds the DER `Name` borrowing these components.
    ///
    /// The same value is used for sizing and writing, so both passes see
    /// the same set of present attributes.
    pub fn to_name(&self) -> Result<Name<'_>, Error> {
        let mut rdns = SequenceOf::new();
        for (kind, value) in self.iter() {
            let tag = if is_printable(value) {
                Tag::PrintableString
            } else {
                Tag::Utf8String
            };
            let atv = AttributeTypeAndValue {
                oid: kind.oid(),
                value: AnyRef::new(tag, value.as_bytes())?,
            };

            let mut rdn = SetOf::new();
            rdn.insert(atv)?;
            rdns.add(RelativeDistinguishedName(rdn))?;
        }
        Ok(RdnSequence(rdns))
    }

    /// Collects the recognised string attributes of a decoded name.
    /// Attributes of other types are skipped.
    pub fn from_name(name: &Name<'_>) -> Result<Self, Error> {
        let mut components = Self::new();
        for rdn in name.0.iter() {
            for atv in rdn.0.iter() {
                let kind = match AttributeKind::from_oid(&atv.oid) {
                    Some(kind) => kind,
                    None => continue,
                };
                let value = core::str::from_utf8(atv.value.value())
                    .map_err(|_| Error::from(ErrorKind::FormatMismatch))?;
                components.set(kind, value)?;
            }
        }
        Ok(components)
    }
}

/// Whether `value` fits the ASN.1 PrintableString character set.
pub fn is_printable(value: &str) -> bool {
    value.bytes().all(|c| {
        matches!(c,
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b' '
            | b'\''
            | b'('
            | b')'
            | b'+'
            | b','
            | b'-'
            | b'.'
            | b'/'
            | b':'
            | b'='
            | b'?')
    })
}
