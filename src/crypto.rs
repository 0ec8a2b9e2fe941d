use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Length of a derived ledger address (truncated digest).
pub const ADDRESS_HEX_LEN: usize = 40;

/// Computes an HMAC-SHA256 tag over `data` and returns it as a hex string.
///
/// This is the crate's only "signature" primitive. It is a keyed MAC, not a
/// real digital signature: the network is simulated and every participant
/// shares the signing keys.
pub fn hmac_hex(key: &[u8], data: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Computes a plain SHA-256 digest of `data` as a hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Derives a ledger address from a signing key.
///
/// The address is the truncated digest of the key's synthetic "public" form.
/// Deterministic: the same key always maps to the same address.
pub fn derive_address(signing_key: &str) -> String {
    let digest = sha256_hex(format!("{}-public", signing_key).as_bytes());
    digest[..ADDRESS_HEX_LEN].to_string()
}

/// Generates `N` random bytes from the thread-local RNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generates a random 16-byte token as a hex string.
pub fn random_token() -> String {
    hex::encode(random_bytes::<16>())
}
