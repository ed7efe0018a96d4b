//! Container constants and the accumulated header state.

use crate::crypto::base64_decode;
use crate::decoder::Value;
use crate::types::DecryptError;

/// Magic literal at offset 0, followed on the wire by the 32-byte
/// lowercase-hex MD5 of this literal.
pub const MAGIC: &[u8; 17] = b"__CLOUDSYNC_ENC__";

/// Total preamble length: magic literal + its hex MD5.
pub const PREAMBLE_LEN: usize = MAGIC.len() + 32;

/// AES block size; every data chunk is a multiple of this.
pub const AES_BLOCK_SIZE: usize = 16;

/// Container format version, from the `version` metadata map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
}

impl Version {
    /// Majors with known data-stream key handling. Major 1 uses the raw
    /// session key; major 3 hex-decodes it first.
    pub fn is_supported(&self) -> bool {
        matches!(self.major, 1 | 3)
    }
}

/// Recognized metadata fields, accumulated while the stream is decoded.
///
/// Built up during `AwaitHeaders`, still appended to while streaming (a
/// trailing `file_md5` is the common case), and read back by the driver at
/// unwrap time and at finalization.
#[derive(Debug, Default)]
pub struct ContainerHeader {
    pub version: Option<Version>,
    /// KDF salt; empty selects the legacy one-iteration mode.
    pub salt: Vec<u8>,
    /// Set when `digest = "md5"` was declared; gates the integrity sink.
    pub digest_declared: bool,
    /// Session key wrapped under the password-derived key, base64-decoded.
    pub enc_key1: Option<Vec<u8>>,
    /// Session key wrapped under RSA-OAEP, base64-decoded.
    pub enc_key2: Option<Vec<u8>>,
    /// Salted MD5 of the password.
    pub key1_hash: Option<String>,
    /// Salted MD5 of the unwrapped session key.
    pub session_key_hash: Option<String>,
    /// Hex MD5 of the emitted plaintext.
    pub file_md5: Option<String>,
}

impl ContainerHeader {
    /// Fold one metadata KV pair into the header.
    ///
    /// Unrecognized keys are ignored; recognized keys with the wrong value
    /// shape are a [`DecryptError::TypeMismatch`]. An unsupported `version`
    /// major is rejected here, as soon as it is seen.
    pub fn absorb(&mut self, key: &str, value: Value) -> Result<(), DecryptError> {
        match key {
            "digest" => match value {
                Value::Text(ref s) if s == "md5" => self.digest_declared = true,
                other => return Err(mismatch("digest", "the text \"md5\"", &other)),
            },
            "enc_key1" => match value {
                Value::Text(s) => {
                    self.enc_key1 = Some(base64_decode(&s, "enc_key1 is not valid base64")?)
                }
                other => return Err(mismatch("enc_key1", "base64 text", &other)),
            },
            "enc_key2" => match value {
                Value::Text(s) => {
                    self.enc_key2 = Some(base64_decode(&s, "enc_key2 is not valid base64")?)
                }
                other => return Err(mismatch("enc_key2", "base64 text", &other)),
            },
            "key1_hash" => match value {
                Value::Text(s) => self.key1_hash = Some(s),
                other => return Err(mismatch("key1_hash", "text", &other)),
            },
            "session_key_hash" => match value {
                Value::Text(s) => self.session_key_hash = Some(s),
                other => return Err(mismatch("session_key_hash", "text", &other)),
            },
            "file_md5" => match value {
                Value::Text(s) => self.file_md5 = Some(s),
                other => return Err(mismatch("file_md5", "text", &other)),
            },
            // Observed both as text and as a byte string in the wild.
            "salt" => match value {
                Value::Text(s) => self.salt = s.into_bytes(),
                Value::Bytes(b) => self.salt = b,
                other => return Err(mismatch("salt", "text or bytes", &other)),
            },
            "version" => {
                let major = match value.get("major") {
                    Some(Value::Int(n)) => *n,
                    Some(other) => return Err(mismatch("version.major", "integer", other)),
                    None => return Err(mismatch("version", "map with major/minor", &value)),
                };
                let minor = match value.get("minor") {
                    Some(Value::Int(n)) => *n,
                    Some(other) => return Err(mismatch("version.minor", "integer", other)),
                    None => return Err(mismatch("version", "map with major/minor", &value)),
                };
                let version = Version { major, minor };
                if !version.is_supported() {
                    return Err(DecryptError::UnsupportedVersion(major, minor));
                }
                self.version = Some(version);
            }
            _ => {}
        }
        Ok(())
    }
}

fn mismatch(field: &'static str, expected: &'static str, got: &Value) -> DecryptError {
    DecryptError::TypeMismatch {
        field,
        expected,
        got: got.kind().to_owned(),
    }
}
