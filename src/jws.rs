//! Compact JWS signing with a secure element key.
//!
//! Tokens are `base64url(header).base64url(payload).base64url(signature)`
//! without padding, signed with ES256 over the first two segments.

use alloc::string::String;

use crate::asn1::{ec_public_key_info, encode_exact};
use crate::b64;
use crate::element::{SecureElement, Slot};
use crate::error::Error;
use crate::key::PublicKey;

/// PEM label of a `SubjectPublicKeyInfo`.
pub const PUBLIC_KEY_PEM_LABEL: &str = "PUBLIC KEY";

/// Renders a raw P-256 point as a `-----BEGIN PUBLIC KEY-----` block.
pub fn public_key_pem(public_key: &PublicKey) -> Result<String, Error> {
    let der = encode_exact(&ec_public_key_info(public_key))?;
    Ok(b64::pem_document(&der, PUBLIC_KEY_PEM_LABEL))
}

/// Compact JWS signer bound to a secure element.
pub struct Jws<SE> {
    se: SE,
}

impl<SE: SecureElement> Jws<SE> {
    pub fn new(se: SE) -> Self {
        Self { se }
    }

    pub fn into_inner(self) -> SE {
        self.se
    }

    /// PEM public key of the key in `slot`, optionally creating that key
    /// first.
    pub fn public_key(&mut self, slot: Slot, new_private_key: bool) -> Result<String, Error> {
        let public_key = if new_private_key {
            self.se.generate_private_key(slot)?
        } else {
            self.se.generate_public_key(slot)?
        };
        public_key_pem(&public_key)
    }

    /// Signs `header` and `payload` with the key in `slot`.
    pub fn sign(&mut self, slot: Slot, header: &[u8], payload: &[u8]) -> Result<String, Error> {
        let mut token = b64::url_encode(header);
        token.push('.');
        token.push_str(&b64::url_encode(payload));

        let digest = self.se.sha256(token.as_bytes())?;
        let signature = self.se.ec_sign(slot, &digest).map_err(|e| {
            error!("JWS signing failed: {}", e.kind());
            e
        })?;

        token.push('.');
        token.push_str(&b64::url_encode(signature.as_ref()));
        trace!("signed JWS, {} characters", token.len());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::soft::SoftElement;
    use crate::element::CertificateStorage;
    use crate::error::ErrorKind;
    use crate::key::{Digest, RawSignature};
    use ::base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use ::base64::Engine as _;
    use alloc::vec::Vec;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::{Signature, VerifyingKey};
    use p256::pkcs8::DecodePublicKey;
    use rand_core::OsRng;

    const HEADER: &[u8] = br#"{"alg":"ES256","typ":"JWT"}"#;
    const PAYLOAD: &[u8] = br#"{"iat":1700000000,"iss":"device-1"}"#;

    /// Element that returns a fixed signature and records what it signed.
    struct FixedSigner {
        signature: RawSignature,
        signed: Option<Digest>,
    }

    impl SecureElement for FixedSigner {
        fn generate_private_key(&mut self, _slot: Slot) -> Result<PublicKey, Error> {
            Err(ErrorKind::CapabilityFailure.into())
        }

        fn generate_public_key(&mut self, _slot: Slot) -> Result<PublicKey, Error> {
            Err(ErrorKind::CapabilityFailure.into())
        }

        fn ec_sign(&mut self, _slot: Slot, digest: &Digest) -> Result<RawSignature, Error> {
            self.signed = Some(*digest);
            Ok(self.signature)
        }

        fn sha256(&mut self, message: &[u8]) -> Result<Digest, Error> {
            use sha2::Digest as _;
            Digest::try_from(sha2::Sha256::digest(message).as_slice())
        }

        fn read_slot(&mut self, _slot: Slot, _buf: &mut [u8]) -> Result<usize, Error> {
            Ok(0)
        }

        fn write_slot(&mut self, _slot: Slot, _data: &[u8]) -> Result<(), Error> {
            Ok(())
        }

        fn certificate_storage(&self) -> CertificateStorage {
            CertificateStorage::Compressed
        }
    }

    #[test]
    fn segments_decode_to_inputs() {
        let mut raw = [0u8; 64];
        raw.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8 | 0x80);
        let signature = RawSignature::try_from(&raw[..]).unwrap();

        let mut jws = Jws::new(FixedSigner {
            signature,
            signed: None,
        });
        let token = jws.sign(0, HEADER, PAYLOAD).unwrap();

        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(URL_SAFE_NO_PAD.decode(segments[0]).unwrap(), HEADER);
        assert_eq!(URL_SAFE_NO_PAD.decode(segments[1]).unwrap(), PAYLOAD);
        assert_eq!(URL_SAFE_NO_PAD.decode(segments[2]).unwrap(), &raw[..]);
        assert!(!token.contains('='));

        // The signer saw the digest of the first two segments.
        let signing_input = &token[..segments[0].len() + 1 + segments[1].len()];
        let signer = jws.into_inner();
        let mut expected = FixedSigner {
            signature,
            signed: None,
        };
        assert_eq!(
            signer.signed.unwrap(),
            expected.sha256(signing_input.as_bytes()).unwrap()
        );
    }

    #[test]
    fn token_verifies_with_public_key() {
        let mut jws = Jws::new(SoftElement::new(OsRng, CertificateStorage::Compressed));
        let pem = jws.public_key(0, true).unwrap();
        let token = jws.sign(0, HEADER, PAYLOAD).unwrap();

        let body = pem
            .trim_start_matches("-----BEGIN PUBLIC KEY-----\n")
            .trim_end_matches("\n-----END PUBLIC KEY-----\n");
        let der = STANDARD.decode(body.replace('\n', "")).unwrap();
        let verifying_key = VerifyingKey::from_public_key_der(&der).unwrap();
        let (signing_input, signature) = token.rsplit_once('.').unwrap();
        let signature = URL_SAFE_NO_PAD.decode(signature).unwrap();
        let signature = Signature::try_from(signature.as_slice()).unwrap();
        verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .unwrap();
    }

    #[test]
    fn public_key_pem_framing() {
        let public_key = PublicKey::try_from(&[0x5au8; 64][..]).unwrap();
        let pem = public_key_pem(&public_key).unwrap();

        let body = pem
            .strip_prefix("-----BEGIN PUBLIC KEY-----\n")
            .and_then(|rest| rest.strip_suffix("\n-----END PUBLIC KEY-----\n"))
            .unwrap();
        let der = STANDARD.decode(body.replace('\n', "")).unwrap();
        assert_eq!(der.len(), 91);
        assert_eq!(&der[27..], &[0x5au8; 64]);
    }

    #[test]
    fn signer_failure_propagates() {
        let mut jws = Jws::new(SoftElement::new(OsRng, CertificateStorage::Der));
        assert_eq!(
            jws.sign(4, HEADER, PAYLOAD).unwrap_err().kind(),
            ErrorKind::CapabilityFailure
        );
    }
}
