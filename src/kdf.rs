//! Key derivation: the legacy OpenSSL EVP_BytesToKey scheme (MD5 variant)
//! that Cloud Sync uses both to unwrap `enc_key1` and to expand the session
//! key into the data-stream key/IV.

use md5::{Digest, Md5};
use zeroize::Zeroizing;

/// Iteration count when a salt is present; an empty salt means one round.
const SALTED_ITERATIONS: usize = 1000;

/// OpenSSL `EVP_BytesToKey` with MD5.
///
/// Block chain: `H_i = MD5^count(H_{i-1} || password || salt)` with `H_0`
/// empty, concatenated until `key_len + iv_len` bytes are available. The
/// output is a deterministic function of all four inputs.
pub fn openssl_kdf(
    password: &[u8],
    salt: &[u8],
    key_len: usize,
    iv_len: usize,
) -> (Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>) {
    let count = if salt.is_empty() { 1 } else { SALTED_ITERATIONS };

    let mut derived = Zeroizing::new(Vec::with_capacity(key_len + iv_len));
    let mut block = Zeroizing::new(Vec::new());

    while derived.len() < key_len + iv_len {
        let mut material = Zeroizing::new(Vec::with_capacity(
            block.len() + password.len() + salt.len(),
        ));
        material.extend_from_slice(&block);
        material.extend_from_slice(password);
        material.extend_from_slice(salt);

        let mut digest = Md5::digest(&*material);
        for _ in 1..count {
            digest = Md5::digest(digest);
        }

        *block = digest.to_vec();
        derived.extend_from_slice(&block);
    }

    let key = Zeroizing::new(derived[..key_len].to_vec());
    let iv = Zeroizing::new(derived[key_len..key_len + iv_len].to_vec());
    (key, iv)
}

/// The Synology-specific derivation: a 32-byte AES key and a 16-byte IV.
pub fn csenc_pbkdf(password: &[u8], salt: &[u8]) -> (Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>) {
    openssl_kdf(password, salt, 32, 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_lengths_match_request() {
        let (key, iv) = openssl_kdf(b"testpassword", b"testsalt", 32, 16);
        assert_eq!(key.len(), 32);
        assert_eq!(iv.len(), 16);

        let (key, iv) = openssl_kdf(b"testpassword", b"", 32, 16);
        assert_eq!(key.len(), 32);
        assert_eq!(iv.len(), 16);
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = openssl_kdf(b"pw", b"salt", 32, 16);
        let b = openssl_kdf(b"pw", b"salt", 32, 16);
        assert_eq!(a.0, b.0);
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn salt_changes_the_output() {
        let (salted, _) = openssl_kdf(b"pw", b"salt", 32, 16);
        let (unsalted, _) = openssl_kdf(b"pw", b"", 32, 16);
        assert_ne!(salted, unsalted);
    }

    #[test]
    fn empty_salt_is_single_iteration() {
        // With no salt the first block is exactly MD5(password), so the first
        // 16 derived bytes must equal the plain digest.
        let (key, _) = openssl_kdf(b"pw", b"", 32, 16);
        let first = Md5::digest(b"pw");
        assert_eq!(&key[..16], first.as_slice());
    }

    #[test]
    fn second_block_chains_the_first() {
        let (key, iv) = openssl_kdf(b"pw", b"", 16, 16);
        // H1 = MD5(pw); H2 = MD5(H1 || pw).
        let h1 = Md5::digest(b"pw");
        let mut material = h1.to_vec();
        material.extend_from_slice(b"pw");
        let h2 = Md5::digest(&material);
        assert_eq!(key.as_slice(), h1.as_slice());
        assert_eq!(iv.as_slice(), h2.as_slice());
    }

    #[test]
    fn salted_mode_iterates_the_digest() {
        // One block, salt present: MD5 applied 1000 times to pw || salt.
        let (key, _) = openssl_kdf(b"pw", b"na", 16, 0);
        let mut digest = Md5::digest(b"pwna");
        for _ in 1..1000 {
            digest = Md5::digest(digest);
        }
        assert_eq!(key.as_slice(), digest.as_slice());
    }
}
