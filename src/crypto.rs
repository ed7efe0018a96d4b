//! Cryptographic primitives: AES-256-CBC chunk decryption with carried chain
//! state, PKCS#7 stripping, salted-hash verification, and the two session-key
//! unwrap paths (password-derived and RSA-OAEP).

use aes::cipher::{BlockDecryptMut, KeyIvInit};
use aes::Block;
use base64::{engine::general_purpose, Engine};
use md5::{Digest, Md5};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Oaep, RsaPrivateKey};
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::format::AES_BLOCK_SIZE;
use crate::kdf::csenc_pbkdf;
use crate::types::DecryptError;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Longest salt prefix a salted hash may carry.
const SALTED_HASH_MAX_SALT: usize = 10;

/// AES-256-CBC decryptor that carries its chain state across chunks.
///
/// Cloud Sync splits one CBC stream over many `data` chunks, so the IV for
/// each chunk is the last ciphertext block of the previous one. Padding is
/// never handled here; the pipeline strips it from the held-back final chunk.
pub struct CbcChunkDecryptor {
    inner: Aes256CbcDec,
}

impl CbcChunkDecryptor {
    /// `key` must be 32 bytes and `iv` 16, as produced by the KDF.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, DecryptError> {
        let inner = Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| DecryptError::CryptoFailure("bad AES key or IV length"))?;
        Ok(Self { inner })
    }

    /// Decrypt one ciphertext chunk in place of a copy, advancing the chain.
    pub fn decrypt_chunk(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, DecryptError> {
        if ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(DecryptError::CryptoFailure(
                "ciphertext chunk is not a multiple of the AES block size",
            ));
        }
        let mut plaintext = ciphertext.to_vec();
        for block in plaintext.chunks_exact_mut(AES_BLOCK_SIZE) {
            self.inner
                .decrypt_block_mut(Block::from_mut_slice(block));
        }
        Ok(plaintext)
    }
}

/// Strip PKCS#7 padding in place.
///
/// The buffer must be a non-empty multiple of the block size, the padding
/// byte must be in `1..=16`, and every padding byte must match.
pub fn strip_pkcs7_padding(data: &mut Vec<u8>) -> Result<(), DecryptError> {
    if data.is_empty() || data.len() % AES_BLOCK_SIZE != 0 {
        return Err(DecryptError::BadPadding);
    }
    let pad = data[data.len() - 1] as usize;
    if pad == 0 || pad > AES_BLOCK_SIZE {
        return Err(DecryptError::BadPadding);
    }
    if data[data.len() - pad..].iter().any(|&b| b != data[data.len() - 1]) {
        return Err(DecryptError::BadPadding);
    }
    data.truncate(data.len() - pad);
    Ok(())
}

/// Unwrap the session key from `enc_key1` using the password path:
/// AES-256-CBC under the CSENC-PBKDF key/IV, then PKCS#7 strip.
pub fn unwrap_with_password(
    enc_key1: &[u8],
    password: &[u8],
    salt: &[u8],
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    let (key, iv) = csenc_pbkdf(password, salt);
    let mut decryptor = CbcChunkDecryptor::new(&key, &iv)?;
    let mut session_key = Zeroizing::new(decryptor.decrypt_chunk(enc_key1)?);
    strip_pkcs7_padding(&mut session_key)?;
    Ok(session_key)
}

/// Unwrap the session key from `enc_key2` using RSA-OAEP with SHA-1 mask
/// generation.
///
/// The private key is accepted as PKCS#1 or PKCS#8, DER or PEM.
pub fn unwrap_with_private_key(
    enc_key2: &[u8],
    private_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    let key = parse_private_key(private_key)?;
    key.decrypt(Oaep::new::<Sha1>(), enc_key2)
        .map(Zeroizing::new)
        .map_err(|_| DecryptError::CryptoFailure("RSA-OAEP decryption failed"))
}

fn parse_private_key(raw: &[u8]) -> Result<RsaPrivateKey, DecryptError> {
    if raw.starts_with(b"-----BEGIN") {
        let pem = std::str::from_utf8(raw)
            .map_err(|_| DecryptError::CryptoFailure("private key PEM is not UTF-8"))?;
        return RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|_| DecryptError::CryptoFailure("cannot parse RSA private key"));
    }
    RsaPrivateKey::from_pkcs1_der(raw)
        .or_else(|_| RsaPrivateKey::from_pkcs8_der(raw))
        .map_err(|_| DecryptError::CryptoFailure("cannot parse RSA private key"))
}

/// Format a salted hash: `salt || hex(MD5(salt || payload))`.
pub fn salted_hash_of(salt: &str, payload: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(salt.as_bytes());
    hasher.update(payload);
    format!("{salt}{}", hex::encode(hasher.finalize()))
}

/// Verify a self-describing salted hash against a payload.
///
/// The salt prefix is the first `min(10, len - 32)` characters; anything
/// shorter than a bare 32-character digest never verifies.
pub fn is_salted_hash_correct(salted_hash: &str, payload: &[u8]) -> bool {
    if salted_hash.len() < 32 || !salted_hash.is_char_boundary(salt_len(salted_hash)) {
        return false;
    }
    let expected = salted_hash_of(&salted_hash[..salt_len(salted_hash)], payload);
    expected == salted_hash
}

fn salt_len(salted_hash: &str) -> usize {
    (salted_hash.len() - 32).min(SALTED_HASH_MAX_SALT)
}

/// Hex MD5 of a byte slice, as carried in `file_md5`.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Standard-alphabet base64 decode with a typed error.
pub(crate) fn base64_decode(text: &str, context: &'static str) -> Result<Vec<u8>, DecryptError> {
    general_purpose::STANDARD
        .decode(text)
        .map_err(|_| DecryptError::CryptoFailure(context))
}
