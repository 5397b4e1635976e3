//! Receipt fixtures.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};

/// Receipt JSON in the shape the billing service delivers.
pub fn receipt_json(product_id: &str, purchase_token: &str, developer_payload: &str) -> String {
    serde_json::json!({
        "packageName": "com.example.app",
        "orderId": format!("GPA.{}", purchase_token),
        "productId": product_id,
        "developerPayload": developer_payload,
        "purchaseTime": 1_400_000_000_000i64,
        "purchaseState": 0,
        "purchaseToken": purchase_token,
    })
    .to_string()
}

/// Signs receipts the way the billing service would.
pub struct ReceiptSigner {
    key: SigningKey,
}

impl ReceiptSigner {
    /// Deterministic signer derived from `seed`.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Base64 verifying key, suitable for `BillingConfig::license_key`.
    pub fn public_key_b64(&self) -> String {
        STANDARD.encode(self.key.verifying_key().to_bytes())
    }

    /// Base64 signature over the exact bytes of `receipt`.
    pub fn sign(&self, receipt: &str) -> String {
        STANDARD.encode(self.key.sign(receipt.as_bytes()).to_bytes())
    }
}

impl Default for ReceiptSigner {
    fn default() -> Self {
        Self::from_seed([42u8; 32])
    }
}
