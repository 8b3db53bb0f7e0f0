//! Random mask generation, the cyclic XOR transform, and the SHA-1+Base64
//! accept-key law (spec §3, §4.4, §8 property 2 and 5).

use crate::frame::WS_GUID;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::RngCore;
use sha1::{Digest, Sha1};

/// Generates a fresh 4-byte masking key. Client-to-server frames MUST be
/// masked (RFC 6455 §5.3); the writer calls this once per frame.
pub fn generate_mask() -> [u8; 4] {
    let mut mask = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut mask);
    mask
}

/// XORs `data` with `mask`, cycling the 4-byte key over the payload.
/// Applying the same mask twice recovers the original bytes (§8 property 2).
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Generates the `Sec-WebSocket-Key` nonce: Base64 of 16 random bytes.
pub fn generate_sec_key() -> String {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    BASE64_STANDARD.encode(nonce)
}

/// Computes the expected `Sec-WebSocket-Accept` value for a given
/// `Sec-WebSocket-Key`: `Base64(SHA1(key ++ GUID))`.
pub fn generate_accept_key(sec_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(sec_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_key_matches_rfc_example() {
        // RFC 6455 §1.3 worked example.
        assert_eq!(
            generate_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn mask_is_its_own_inverse() {
        let mask = [0x12, 0x34, 0x56, 0x78];
        let original = b"the quick brown fox".to_vec();

        let mut data = original.clone();
        apply_mask(&mut data, mask);
        assert_ne!(data, original);
        apply_mask(&mut data, mask);
        assert_eq!(data, original);
    }

    #[test]
    fn sec_key_is_16_bytes_base64() {
        let key = generate_sec_key();
        let decoded = BASE64_STANDARD.decode(key).unwrap();
        assert_eq!(decoded.len(), 16);
    }
}
