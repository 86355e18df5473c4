//! In-memory secure element backed by `p256` and `sha2`.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use p256::ecdsa::{Signature, SigningKey};
use sha2::{Digest as _, Sha256};
use signature::hazmat::PrehashSigner;
use signature::rand_core::CryptoRngCore;

use super::{CertificateStorage, SecureElement, Slot};
use crate::error::{Error, ErrorKind};
use crate::key::{Digest, PublicKey, RawSignature};

/// Slot size of elements that store compressed certificates.
pub const COMPRESSED_SLOT_CAPACITY: usize = 72;
/// Object size of elements that store full DER certificates.
pub const DER_SLOT_CAPACITY: usize = 1024;

pub struct SoftElement<R> {
    rng: R,
    storage: CertificateStorage,
    slot_capacity: usize,
    keys: BTreeMap<Slot, SigningKey>,
    slots: BTreeMap<Slot, Vec<u8>>,
}

impl<R: CryptoRngCore> SoftElement<R> {
    pub fn new(rng: R, storage: CertificateStorage) -> Self {
        let slot_capacity = match storage {
            CertificateStorage::Compressed => COMPRESSED_SLOT_CAPACITY,
            CertificateStorage::Der => DER_SLOT_CAPACITY,
        };
        Self {
            rng,
            storage,
            slot_capacity,
            keys: BTreeMap::new(),
            slots: BTreeMap::new(),
        }
    }

    /// Installs an existing private key in `slot`.
    pub fn with_key(mut self, slot: Slot, key: SigningKey) -> Self {
        self.keys.insert(slot, key);
        self
    }

    fn key(&self, slot: Slot) -> Result<&SigningKey, Error> {
        self.keys.get(&slot).ok_or_else(|| {
            error!("no key in slot {}", slot);
            ErrorKind::CapabilityFailure.into()
        })
    }
}

fn raw_public_key(key: &SigningKey) -> Result<PublicKey, Error> {
    let point = key.verifying_key().to_encoded_point(false);
    // Drop the SEC1 `04` tag.
    let coordinates = point
        .as_bytes()
        .get(1..)
        .ok_or(ErrorKind::CapabilityFailure)?;
    PublicKey::try_from(coordinates)
}

impl<R: CryptoRngCore> SecureElement for SoftElement<R> {
    fn generate_private_key(&mut self, slot: Slot) -> Result<PublicKey, Error> {
        let key = SigningKey::random(&mut self.rng);
        let public_key = raw_public_key(&key)?;
        self.keys.insert(slot, key);
        debug!("generated key in slot {}", slot);
        Ok(public_key)
    }

    fn generate_public_key(&mut self, slot: Slot) -> Result<PublicKey, Error> {
        raw_public_key(self.key(slot)?)
    }

    fn ec_sign(&mut self, slot: Slot, digest: &Digest) -> Result<RawSignature, Error> {
        let signature: Signature = self
            .key(slot)?
            .sign_prehash(digest.as_ref())
            .map_err(|_| Error::from(ErrorKind::CapabilityFailure))?;
        RawSignature::try_from(signature.to_bytes().as_slice())
    }

    fn sha256(&mut self, message: &[u8]) -> Result<Digest, Error> {
        Digest::try_from(Sha256::digest(message).as_slice())
    }

    fn read_slot(&mut self, slot: Slot, buf: &mut [u8]) -> Result<usize, Error> {
        buf.fill(0);
        let stored = match self.slots.get(&slot) {
            Some(stored) => stored,
            None => return Ok(0),
        };
        let len = stored.len().min(buf.len());
        buf[..len].copy_from_slice(&stored[..len]);
        Ok(len)
    }

    fn write_slot(&mut self, slot: Slot, data: &[u8]) -> Result<(), Error> {
        if data.len() > self.slot_capacity {
            warn!("{} bytes exceed the slot capacity", data.len());
            return Err(ErrorKind::LengthMismatch.into());
        }
        self.slots.insert(slot, data.to_vec());
        Ok(())
    }

    fn certificate_storage(&self) -> CertificateStorage {
        self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::hazmat::PrehashVerifier;
    use p256::ecdsa::VerifyingKey;
    use p256::EncodedPoint;
    use rand_core::OsRng;

    fn verifying_key(public_key: &PublicKey) -> VerifyingKey {
        let point = EncodedPoint::from_untagged_bytes(public_key.as_ref().into());
        VerifyingKey::from_encoded_point(&point).unwrap()
    }

    #[test]
    fn signatures_verify() {
        let mut se = SoftElement::new(OsRng, CertificateStorage::Compressed);
        let public_key = se.generate_private_key(0).unwrap();
        assert_eq!(se.generate_public_key(0).unwrap(), public_key);

        let digest = se.sha256(b"abc").unwrap();
        assert_eq!(
            digest.as_ref(),
            &hex_literal::hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );

        let raw = se.ec_sign(0, &digest).unwrap();
        let signature = Signature::try_from(raw.as_ref()).unwrap();
        verifying_key(&public_key)
            .verify_prehash(digest.as_ref(), &signature)
            .unwrap();
    }

    #[test]
    fn missing_key_is_a_capability_failure() {
        let mut se = SoftElement::new(OsRng, CertificateStorage::Compressed);
        assert_eq!(
            se.generate_public_key(3).unwrap_err().kind(),
            ErrorKind::CapabilityFailure
        );
        let digest = se.sha256(b"").unwrap();
        assert_eq!(
            se.ec_sign(3, &digest).unwrap_err().kind(),
            ErrorKind::CapabilityFailure
        );
    }

    #[test]
    fn slots_are_bounded() {
        let mut se = SoftElement::new(OsRng, CertificateStorage::Compressed);
        se.write_slot(10, &[0xaa; 72]).unwrap();
        assert_eq!(
            se.write_slot(10, &[0xbb; 73]).unwrap_err().kind(),
            ErrorKind::LengthMismatch
        );

        let mut buf = [0xffu8; 80];
        assert_eq!(se.read_slot(10, &mut buf).unwrap(), 72);
        assert_eq!(&buf[..72], &[0xaa; 72]);
        assert_eq!(&buf[72..], &[0u8; 8]);

        assert_eq!(se.read_slot(11, &mut buf).unwrap(), 0);
        assert_eq!(buf, [0u8; 80]);
    }
}
