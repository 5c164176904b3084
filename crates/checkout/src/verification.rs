//! Payment completion signature checks.
//!
//! The provider signs `"{externalPaymentOrderId}|{externalPaymentTransactionId}"`
//! with HMAC-SHA256 under the shared key secret and hands the lowercase hex
//! digest to the client. The key never leaves the server.

use std::fmt;

use common::Secret;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CheckoutError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Outcome of checking a completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Authentic,
    Inauthentic,
}

impl Verification {
    pub fn is_authentic(&self) -> bool {
        matches!(self, Verification::Authentic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verification::Authentic => "authentic",
            Verification::Inauthentic => "inauthentic",
        }
    }
}

/// Recomputes and compares completion signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    keyed: HmacSha256,
}

impl SignatureVerifier {
    /// Keys the verifier. A blank key is refused, since anyone could sign with it.
    pub fn new(key: &Secret<String>) -> Result<Self> {
        if key.reveal().trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "payment key secret is not set".to_string(),
            ));
        }
        let keyed = HmacSha256::new_from_slice(key.reveal().as_bytes())
            .map_err(|e| CheckoutError::Configuration(format!("invalid signing key: {e}")))?;
        Ok(Self { keyed })
    }

    fn mac(&self, external_order_id: &str, external_transaction_id: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(external_order_id.as_bytes());
        mac.update(b"|");
        mac.update(external_transaction_id.as_bytes());
        mac
    }

    /// Produces the hex signature the provider would send for this pair.
    pub fn sign(&self, external_order_id: &str, external_transaction_id: &str) -> String {
        hex::encode(
            self.mac(external_order_id, external_transaction_id)
                .finalize()
                .into_bytes(),
        )
    }

    /// Checks `signature` in constant time.
    ///
    /// Anything that is not a lowercase hex digest of the right length is
    /// `Inauthentic`.
    pub fn verify(
        &self,
        external_order_id: &str,
        external_transaction_id: &str,
        signature: &str,
    ) -> Verification {
        if !signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Verification::Inauthentic;
        }
        let Ok(supplied) = hex::decode(signature) else {
            return Verification::Inauthentic;
        };
        match self
            .mac(external_order_id, external_transaction_id)
            .verify_slice(&supplied)
        {
            Ok(()) => Verification::Authentic,
            Err(_) => Verification::Inauthentic,
        }
    }
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("key", &"****")
            .finish()
    }
}
