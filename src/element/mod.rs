//! Secure element capability interface.
//!
//! Certificate and JWS code reaches key generation, signing, hashing and
//! persistent storage only through [`SecureElement`]. Backends are chosen by
//! construction; [`soft::SoftElement`] keeps everything in memory.

use crate::error::Error;
use crate::key::{Digest, PublicKey, RawSignature};

pub mod soft;

/// Slot number on the element. Numbering is backend specific.
pub type Slot = u16;

/// How a backend persists the device certificate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CertificateStorage {
    /// Narrow slots: the 108-byte compressed form across two slots.
    Compressed,
    /// One large object holding the full DER certificate.
    Der,
}

/// Operations consumed from a secure element.
///
/// Every call is synchronous. Failures are reported with
/// `ErrorKind::CapabilityFailure` and are never retried here.
pub trait SecureElement {
    /// Creates a new private key in `slot` and returns its public key.
    fn generate_private_key(&mut self, slot: Slot) -> Result<PublicKey, Error>;

    /// Public key of the private key already held in `slot`.
    fn generate_public_key(&mut self, slot: Slot) -> Result<PublicKey, Error>;

    /// Signs a SHA-256 digest with the private key in `slot`.
    fn ec_sign(&mut self, slot: Slot, digest: &Digest) -> Result<RawSignature, Error>;

    fn sha256(&mut self, message: &[u8]) -> Result<Digest, Error>;

    /// Fills `buf` from `slot` and returns the number of stored bytes copied.
    fn read_slot(&mut self, slot: Slot, buf: &mut [u8]) -> Result<usize, Error>;

    fn write_slot(&mut self, slot: Slot, data: &[u8]) -> Result<(), Error>;

    fn certificate_storage(&self) -> CertificateStorage;
}

impl<T: SecureElement + ?Sized> SecureElement for &mut T {
    fn generate_private_key(&mut self, slot: Slot) -> Result<PublicKey, Error> {
        (**self).generate_private_key(slot)
    }

    fn generate_public_key(&mut self, slot: Slot) -> Result<PublicKey, Error> {
        (**self).generate_public_key(slot)
    }

    fn ec_sign(&mut self, slot: Slot, digest: &Digest) -> Result<RawSignature, Error> {
        (**self).ec_sign(slot, digest)
    }

    fn sha256(&mut self, message: &[u8]) -> Result<Digest, Error> {
        (**self).sha256(message)
    }

    fn read_slot(&mut self, slot: Slot, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).read_slot(slot, buf)
    }

    fn write_slot(&mut self, slot: Slot, data: &[u8]) -> Result<(), Error> {
        (**self).write_slot(slot, data)
    }

    fn certificate_storage(&self) -> CertificateStorage {
        (**self).certificate_storage()
    }
}
