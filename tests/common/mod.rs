//! Shared helpers: build valid Cloud Sync containers for the decryption
//! pipeline to chew on.

#![allow(dead_code)]

use aes::cipher::{BlockEncryptMut, KeyIvInit};
use aes::Block;
use base64::{engine::general_purpose, Engine};
use std::io::Write;

use cloudsync_decrypt::kdf::{csenc_pbkdf, openssl_kdf};
use cloudsync_decrypt::{md5_hex, salted_hash_of, MAGIC};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

pub const TAG_INT: u8 = 0x01;
pub const TAG_TEXT: u8 = 0x10;
pub const TAG_BYTES: u8 = 0x11;
pub const TAG_NULL: u8 = 0x40;
pub const TAG_DICT: u8 = 0x42;

/// Wire object for the test-side encoder.
#[derive(Clone)]
pub enum Obj {
    Int(u64),
    Bytes(Vec<u8>),
    Text(String),
    Map(Vec<(String, Obj)>),
}

impl Obj {
    pub fn text(s: &str) -> Self {
        Obj::Text(s.to_owned())
    }
}

pub fn encode(obj: &Obj, out: &mut Vec<u8>) {
    match obj {
        Obj::Int(v) => {
            let len = (8 - v.leading_zeros() as usize / 8).min(8);
            out.push(TAG_INT);
            out.push(len as u8);
            out.extend_from_slice(&v.to_be_bytes()[8 - len..]);
        }
        Obj::Bytes(b) => {
            out.push(TAG_BYTES);
            out.extend_from_slice(&(b.len() as u16).to_be_bytes());
            out.extend_from_slice(b);
        }
        Obj::Text(s) => {
            out.push(TAG_TEXT);
            out.extend_from_slice(&(s.len() as u16).to_be_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Obj::Map(pairs) => {
            out.push(TAG_DICT);
            for (key, value) in pairs {
                encode(&Obj::text(key), out);
                encode(value, out);
            }
            out.push(TAG_NULL);
        }
    }
}

pub fn preamble() -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(md5_hex(MAGIC).as_bytes());
    out
}

pub fn pkcs7_pad(data: &[u8]) -> Vec<u8> {
    let pad = 16 - data.len() % 16;
    let mut out = data.to_vec();
    out.extend(std::iter::repeat(pad as u8).take(pad));
    out
}

/// One-shot CBC encrypt of an already padded buffer.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8], padded: &[u8]) -> Vec<u8> {
    assert_eq!(padded.len() % 16, 0);
    let mut enc = Aes256CbcEnc::new_from_slices(key, iv).unwrap();
    let mut out = padded.to_vec();
    for block in out.chunks_exact_mut(16) {
        enc.encrypt_block_mut(Block::from_mut_slice(block));
    }
    out
}

pub fn lz4_compress(data: &[u8]) -> Vec<u8> {
    let mut enc = lz4_flex::frame::FrameEncoder::new(Vec::new());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn base64_encode(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

/// Knobs for container construction; defaults build a well-formed major-3
/// password container with a trailing `file_md5`.
pub struct ContainerOptions {
    /// 1 or 3; `None` omits the version header entirely.
    pub version_major: Option<u64>,
    pub version_minor: u64,
    /// Ciphertext split size; must be a multiple of 16.
    pub chunk_size: usize,
    pub include_key1_hash: bool,
    pub include_session_key_hash: bool,
    pub include_file_md5: bool,
    /// Put `file_md5` in the leading metadata map instead of a trailing one.
    pub leading_file_md5: bool,
    /// Corrupt the recorded `file_md5` (one hex digit).
    pub wrong_file_md5: bool,
    pub include_digest: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            version_major: Some(3),
            version_minor: 1,
            chunk_size: 8192,
            include_key1_hash: true,
            include_session_key_hash: true,
            include_file_md5: true,
            leading_file_md5: false,
            wrong_file_md5: false,
            include_digest: true,
        }
    }
}

/// The session key a built container wraps, exactly as it sits on the wire
/// after unwrapping (major 3 stores it hex-encoded).
pub fn session_key_plain(opts: &ContainerOptions) -> Vec<u8> {
    let raw: Vec<u8> = (0u8..32).map(|i| i.wrapping_mul(7).wrapping_add(3)).collect();
    match opts.version_major {
        Some(1) => raw,
        // Major 3 and versionless containers carry the key hex-encoded.
        _ => hex::encode(raw).into_bytes(),
    }
}

fn salt_for(opts: &ContainerOptions) -> Vec<u8> {
    match opts.version_major {
        Some(1) => Vec::new(),
        _ => b"saltsalt12".to_vec(),
    }
}

/// Assemble a full container around pre-wrapped key material.
fn assemble(
    plaintext: &[u8],
    session_key: &[u8],
    wrap_field: (&str, String),
    extra_leading: Vec<(String, Obj)>,
    opts: &ContainerOptions,
) -> Vec<u8> {
    let salt = salt_for(opts);

    // Data-stream key/IV from the session key material.
    let material = match opts.version_major {
        Some(1) => session_key.to_vec(),
        _ => hex::decode(session_key).unwrap(),
    };
    let (key, iv) = openssl_kdf(&material, &[], 32, 16);

    let compressed = lz4_compress(plaintext);
    let ciphertext = aes_cbc_encrypt(&key, &iv, &pkcs7_pad(&compressed));

    let mut file_md5 = md5_hex(plaintext);
    if opts.wrong_file_md5 {
        let last = file_md5.pop().unwrap();
        file_md5.push(if last == '0' { '1' } else { '0' });
    }

    let mut metadata = vec![("type".to_owned(), Obj::text("metadata"))];
    if let Some(major) = opts.version_major {
        metadata.push((
            "version".to_owned(),
            Obj::Map(vec![
                ("major".to_owned(), Obj::Int(major)),
                ("minor".to_owned(), Obj::Int(opts.version_minor)),
            ]),
        ));
    }
    if opts.include_digest {
        metadata.push(("digest".to_owned(), Obj::text("md5")));
    }
    metadata.push(("salt".to_owned(), Obj::Text(String::from_utf8(salt).unwrap())));
    let (field, wrapped) = wrap_field;
    metadata.push((field.to_owned(), Obj::Text(wrapped)));
    metadata.extend(extra_leading);
    if opts.include_session_key_hash {
        metadata.push((
            "session_key_hash".to_owned(),
            Obj::Text(salted_hash_of("kh", session_key)),
        ));
    }
    if opts.include_file_md5 && opts.leading_file_md5 {
        metadata.push(("file_md5".to_owned(), Obj::Text(file_md5.clone())));
    }

    let mut container = preamble();
    encode(&Obj::Map(metadata), &mut container);

    assert_eq!(opts.chunk_size % 16, 0);
    for chunk in ciphertext.chunks(opts.chunk_size.max(16)) {
        encode(
            &Obj::Map(vec![
                ("type".to_owned(), Obj::text("data")),
                ("data".to_owned(), Obj::Bytes(chunk.to_vec())),
            ]),
            &mut container,
        );
    }

    if opts.include_file_md5 && !opts.leading_file_md5 {
        encode(
            &Obj::Map(vec![
                ("type".to_owned(), Obj::text("metadata")),
                ("file_md5".to_owned(), Obj::Text(file_md5)),
            ]),
            &mut container,
        );
    }

    container
}

/// Build a container whose session key is wrapped under `password`.
pub fn build_password_container(
    plaintext: &[u8],
    password: &[u8],
    opts: &ContainerOptions,
) -> Vec<u8> {
    let session_key = session_key_plain(opts);
    let salt = salt_for(opts);

    let (key, iv) = csenc_pbkdf(password, &salt);
    let enc_key1 = aes_cbc_encrypt(&key, &iv, &pkcs7_pad(&session_key));

    let mut extra = Vec::new();
    if opts.include_key1_hash {
        extra.push((
            "key1_hash".to_owned(),
            Obj::Text(salted_hash_of("pwhashsalt", password)),
        ));
    }

    assemble(
        plaintext,
        &session_key,
        ("enc_key1", base64_encode(&enc_key1)),
        extra,
        opts,
    )
}

/// Build a container whose session key is wrapped under an RSA public key.
pub fn build_rsa_container(
    plaintext: &[u8],
    public_key: &rsa::RsaPublicKey,
    opts: &ContainerOptions,
) -> Vec<u8> {
    use rsa::Oaep;
    use sha1::Sha1;

    let session_key = session_key_plain(opts);
    let enc_key2 = public_key
        .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), &session_key)
        .unwrap();

    assemble(
        plaintext,
        &session_key,
        ("enc_key2", base64_encode(&enc_key2)),
        Vec::new(),
        opts,
    )
}

/// Deterministic filler plaintext.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(1103515245).wrapping_add(12345) as u8)
        .collect()
}
