//! Signatures of payment gateway callbacks.
//!
//! The gateway signs the raw request body with HMAC-SHA256 using the shared
//! secret and sends the lowercase hex digest in the `X-Signature` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Hex HMAC-SHA256 of `body`.
///
/// # Examples
///
/// ```
/// use cantina_auth::signature::{sign, verify};
///
/// let signature = sign(b"secret", br#"{"status":"CONFIRMED"}"#);
/// assert!(verify(b"secret", br#"{"status":"CONFIRMED"}"#, &signature));
/// assert!(!verify(b"secret", br#"{"status":"FAILED"}"#, &signature));
/// ```
pub fn sign(secret: &[u8], body: &[u8]) -> String {
	// HMAC accepts keys of any length
	let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
		return String::new();
	};
	mac.update(body);
	hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
	if secret.is_empty() {
		return false;
	}
	let Ok(expected) = hex::decode(signature_hex.trim()) else {
		return false;
	};
	let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
		return false;
	};
	mac.update(body);
	mac.verify_slice(&expected).is_ok()
}
