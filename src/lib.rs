#![cfg_attr(not(test), no_std)]
extern crate alloc;

mod fmt;

mod asn1;
pub mod b64;
pub mod cert;
pub mod element;
pub mod error;
pub mod jws;
pub mod key;
pub mod provisioning;

pub use cert::{
    CompressedCertificate, CompressedDate, Document, DocumentKind, NameComponents, State,
    ValidityInfo,
};
pub use element::{CertificateStorage, SecureElement, Slot};
pub use error::{Error, ErrorKind};
pub use jws::Jws;
pub use key::{Digest, PublicKey, RawSignature};
