//! X.509 certificate and PKCS#10 request handling for P-256 keys.
//!
//! ## Modules
//!
//! - [`document`]: Certificate/CSR document with the build and sign lifecycle
//! - [`certificate`]: X.509 certificate structures
//! - [`request`]: Certificate Signing Request (CSR) structures
//! - [`compressed`]: 108-byte compressed certificate format
//! - [`import`]: Reading back stored DER certificates
//! - [`time`]: Validity period and timestamp handling
//! - [`name`]: X.500 Distinguished Name support
//! - [`ext`]: X.509 extensions
//! - [`serial_number`]: Certificate serial number handling

pub mod certificate;
pub mod compressed;
pub mod document;
pub mod ext;
pub mod import;
mod macros;
pub mod name;
pub mod request;
pub mod serial_number;
pub mod time;

pub use compressed::{CompressedCertificate, CompressedDate};
pub use document::{Document, DocumentKind, State};
pub use ext::AUTHORITY_KEY_ID_LENGTH;
pub use import::der_certificate_len;
pub use name::{AttributeKind, NameComponents};
pub use serial_number::SERIAL_NUMBER_LENGTH;
pub use time::ValidityInfo;
