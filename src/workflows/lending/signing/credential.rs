use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a 6-digit numeric one-time code in the inclusive range
/// 100000–999999.
pub(crate) fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    code.to_string()
}

/// Generate a random 16-byte salt, hex-encoded for storage.
pub(crate) fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Digest of salt ‖ code. Only this hash is ever persisted; the raw code
/// travels out-of-band.
pub(crate) fn hash_code(salt: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}
