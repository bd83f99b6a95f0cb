use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 signature over the canonical body.
pub fn sign(secret: &str, canonical_body: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical_body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a hex HMAC-SHA256 signature in constant time. Malformed hex and
/// wrong-length signatures are treated as a plain mismatch.
pub fn verify(secret: &str, canonical_body: &str, signature_hex: &str) -> bool {
    let Ok(claimed) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(canonical_body.as_bytes());
    mac.verify_slice(&claimed).is_ok()
}
