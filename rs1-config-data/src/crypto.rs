//! Device-bound encryption for sensitive records.
//!
//! The 128-bit key is derived from the device MAC with HMAC-SHA-256 keyed
//! by a fixed label, truncated to 16 bytes; records are sealed with
//! AES-128-GCM (96-bit random nonce prefixed to the ciphertext) so any
//! bit flip in the stored blob fails authentication instead of decrypting
//! to garbage.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;

const KEY_LABEL: &[u8] = b"rs1_config_key_v1";
const NONCE_LEN: usize = 12;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("sealed blob too short")]
    Truncated,
    #[error("authentication failed")]
    Authentication,
}

/// Derive the device-bound record key from the MAC address.
pub fn derive_device_key(mac: &[u8; 6]) -> [u8; 16] {
    let mut hm =
        <Hmac<Sha256> as Mac>::new_from_slice(KEY_LABEL).expect("hmac accepts any key length");
    hm.update(mac);
    let digest = hm.finalize().into_bytes();
    let mut key = [0u8; 16];
    key.copy_from_slice(&digest[..16]);
    key
}

pub fn seal(key: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));
    let nonce = Aes128Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .expect("AES-GCM encryption is infallible for in-memory buffers");
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    out
}

pub fn open(key: &[u8; 16], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < NONCE_LEN {
        return Err(CryptoError::Truncated);
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Authentication)
}
