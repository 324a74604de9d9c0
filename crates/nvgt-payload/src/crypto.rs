//! AES-128-CBC encryption of the bytecode stream. The key is a fixed
//! application-identifying string rather than a user secret (the payload's
//! confidentiality goal is "not trivially grep-able", not key management); the
//! IV is derived from the key hash rather than carried alongside it.
//!
//! `spec.md` states `iv[i] = key[i*2+1] ^ (31 + i*4)`; the retrieved original
//! implementation instead computes `iv[i] = key_hash[i*2] ^ (4*i + 1)` — even
//! rather than odd key-hash bytes, and a different additive constant. This
//! follows the original formula; see `DESIGN.md`.

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};

use crate::error::{PayloadError, Result};

const KEY_MATERIAL: &[u8] = b"Kernel32.lib";

fn derive_key_iv() -> ([u8; 16], [u8; 16]) {
    let hash = Sha256::digest(KEY_MATERIAL);
    let mut key = [0u8; 16];
    key.copy_from_slice(&hash[0..16]);
    let mut iv = [0u8; 16];
    for (i, byte) in iv.iter_mut().enumerate() {
        *byte = hash[i * 2] ^ ((4 * i + 1) as u8);
    }
    (key, iv)
}

pub fn encrypt(plaintext: &[u8]) -> Vec<u8> {
    let (key, iv) = derive_key_iv();
    cbc::Encryptor::<Aes128>::new((&key).into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

pub fn decrypt(ciphertext: &[u8]) -> Result<Vec<u8>> {
    let (key, iv) = derive_key_iv();
    cbc::Decryptor::<Aes128>::new((&key).into(), (&iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| PayloadError::BadPadding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_length_plaintext() {
        for len in [0, 1, 15, 16, 17, 1000] {
            let plaintext = vec![0xABu8; len];
            let ciphertext = encrypt(&plaintext);
            assert_eq!(ciphertext.len() % 16, 0);
            let decrypted = decrypt(&ciphertext).unwrap();
            assert_eq!(decrypted, plaintext);
        }
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let mut ciphertext = encrypt(b"hello world, this is bytecode");
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(decrypt(&ciphertext).is_err());
    }
}
