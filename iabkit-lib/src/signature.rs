//! # Receipt signature verification
//!
//! Receipts are signed by the billing service with Ed25519. The signature
//! covers the receipt JSON exactly as delivered; it is never re-serialized
//! before verification. Key and signature travel as standard padded base64,
//! the key being the raw 32-byte verifying key.
//!
//! Verification never fails with an error: anything malformed is reported as
//! "not verified".

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Verify `signature_b64` over `receipt` with `public_key_b64`.
///
/// Returns `false` for an undecodable key or signature, a key that is not a
/// valid curve point, or a signature that does not match.
pub fn verify_purchase(public_key_b64: &str, receipt: &str, signature_b64: &str) -> bool {
    let Some(key) = decode_verifying_key(public_key_b64) else {
        tracing::warn!("receipt verification key is malformed");
        return false;
    };
    verify_with_key(&key, receipt, signature_b64)
}

fn decode_verifying_key(public_key_b64: &str) -> Option<VerifyingKey> {
    let bytes = STANDARD.decode(public_key_b64.trim()).ok()?;
    let bytes: [u8; 32] = bytes.as_slice().try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

fn verify_with_key(key: &VerifyingKey, receipt: &str, signature_b64: &str) -> bool {
    let Ok(sig_bytes) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    key.verify(receipt.as_bytes(), &signature).is_ok()
}

/// Verifier bound to the key configured for a session.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    public_key: Option<String>,
}

impl SignatureVerifier {
    /// A `None` or blank key makes every receipt pass.
    pub fn new(public_key: Option<String>) -> Self {
        let public_key = public_key.filter(|key| !key.trim().is_empty());
        Self { public_key }
    }

    pub fn verify(&self, receipt: &str, signature_b64: &str) -> bool {
        match &self.public_key {
            Some(key) => verify_purchase(key, receipt, signature_b64),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    const RECEIPT: &str = r#"{"productId":"coins100","purchaseToken":"tok"}"#;

    fn keypair() -> (SigningKey, String) {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let public = STANDARD.encode(signing.verifying_key().to_bytes());
        (signing, public)
    }

    fn sign(key: &SigningKey, data: &str) -> String {
        STANDARD.encode(key.sign(data.as_bytes()).to_bytes())
    }

    #[test]
    fn test_valid_signature_verifies() {
        let (signing, public) = keypair();
        let sig = sign(&signing, RECEIPT);
        assert!(verify_purchase(&public, RECEIPT, &sig));
    }

    #[test]
    fn test_tampered_receipt_rejected() {
        let (signing, public) = keypair();
        let sig = sign(&signing, RECEIPT);
        let tampered = RECEIPT.replace("coins100", "coins999");
        assert!(!verify_purchase(&public, &tampered, &sig));
    }

    #[test]
    fn test_reserialized_receipt_rejected() {
        let (signing, public) = keypair();
        let sig = sign(&signing, RECEIPT);
        let spaced = RECEIPT.replace(',', ", ");
        assert!(!verify_purchase(&public, &spaced, &sig));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (signing, _) = keypair();
        let other = SigningKey::from_bytes(&[9u8; 32]);
        let other_public = STANDARD.encode(other.verifying_key().to_bytes());
        assert!(!verify_purchase(&other_public, RECEIPT, &sign(&signing, RECEIPT)));
    }

    #[test]
    fn test_malformed_inputs_never_verify() {
        let (signing, public) = keypair();
        let sig = sign(&signing, RECEIPT);

        assert!(!verify_purchase("not base64!", RECEIPT, &sig));
        assert!(!verify_purchase(&STANDARD.encode([1u8; 5]), RECEIPT, &sig));
        assert!(!verify_purchase(&public, RECEIPT, "%%%"));
        assert!(!verify_purchase(&public, RECEIPT, &STANDARD.encode([0u8; 10])));
        assert!(!verify_purchase(&public, RECEIPT, ""));
    }

    #[test]
    fn test_verifier_without_key_passes() {
        assert!(SignatureVerifier::new(None).verify(RECEIPT, "garbage"));
        let blank = SignatureVerifier::new(Some("  ".to_string()));
        assert!(blank.verify(RECEIPT, ""));
    }

    #[test]
    fn test_verifier_with_key_enforces() {
        let (signing, public) = keypair();
        let verifier = SignatureVerifier::new(Some(public));
        assert!(verifier.verify(RECEIPT, &sign(&signing, RECEIPT)));
        assert!(!verifier.verify(RECEIPT, "garbage"));
    }
}
