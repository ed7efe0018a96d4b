//! Core types and the library error enum.

use secrecy::{ExposeSecret, SecretSlice};
use thiserror::Error;

/// Credential material for one decryption run.
///
/// A Cloud Sync container wraps its AES session key twice: once under a
/// password-derived key (`enc_key1`) and once under an RSA public key
/// (`enc_key2`). Exactly one unwrap path fires per file, selected by which
/// credential is supplied here and which wrapped key the container carries.
#[derive(Debug)]
pub enum Credentials {
    /// Decrypt via the password path (`enc_key1`).
    ///
    /// The password is kept as raw bytes: Synology accepts arbitrary byte
    /// sequences and password files are read verbatim.
    Password(SecretSlice<u8>),
    /// Decrypt via the RSA path (`enc_key2`).
    KeyPair {
        /// RSA private key, PKCS#1 or PKCS#8, DER or PEM.
        private_key: SecretSlice<u8>,
        /// Matching public key. Accepted and stored for API compatibility;
        /// the decryption path never consults it.
        public_key: Option<Vec<u8>>,
    },
}

impl Credentials {
    /// Build password credentials from raw bytes.
    pub fn password(bytes: Vec<u8>) -> Self {
        Credentials::Password(SecretSlice::from(bytes))
    }

    /// Build RSA credentials from a private key and an optional public key.
    pub fn key_pair(private_key: Vec<u8>, public_key: Option<Vec<u8>>) -> Self {
        Credentials::KeyPair {
            private_key: SecretSlice::from(private_key),
            public_key,
        }
    }

    pub(crate) fn password_bytes(&self) -> Option<&[u8]> {
        match self {
            Credentials::Password(pw) => Some(pw.expose_secret()),
            Credentials::KeyPair { .. } => None,
        }
    }

    pub(crate) fn private_key_bytes(&self) -> Option<&[u8]> {
        match self {
            Credentials::Password(_) => None,
            Credentials::KeyPair { private_key, .. } => Some(private_key.expose_secret()),
        }
    }
}

/// Immutable configuration for one decryption invocation.
#[derive(Debug)]
pub struct DecryptConfig {
    pub credentials: Credentials,
    /// When `true`, a trailing `file_md5` mismatch is an error instead of a
    /// logged warning. Off by default: container writers disagree about which
    /// bytes feed the digest, and padding + magic already anchor correctness.
    pub strict_digest: bool,
}

impl DecryptConfig {
    /// Configuration for the password path.
    pub fn with_password(password: Vec<u8>) -> Self {
        Self {
            credentials: Credentials::password(password),
            strict_digest: false,
        }
    }

    /// Configuration for the RSA private-key path.
    pub fn with_key_pair(private_key: Vec<u8>, public_key: Option<Vec<u8>>) -> Self {
        Self {
            credentials: Credentials::key_pair(private_key, public_key),
            strict_digest: false,
        }
    }

    /// Enable/disable strict digest checking in a builder-friendly way.
    pub fn strict_digest(mut self, on: bool) -> Self {
        self.strict_digest = on;
        self
    }
}

/// Library error type (no panics for expected failures).
#[derive(Error, Debug)]
pub enum DecryptError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// The 49-byte preamble (magic literal + hex MD5 of the literal) is
    /// present but wrong.
    #[error("not a Cloud Sync container: bad magic preamble")]
    BadMagic,

    /// Input ended mid-object or mid-payload.
    #[error("container truncated mid-object")]
    Truncated,

    /// The object decoder saw a type tag it does not know.
    #[error("unknown object tag 0x{0:02X}")]
    UnknownTag(u8),

    /// Integer length byte > 8, or the integer body was shorter than declared.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A header field carried the wrong value shape.
    #[error("header field `{field}`: expected {expected}, got {got}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        got: String,
    },

    /// The first data chunk arrived before the headers required to unwrap
    /// the session key (`enc_key1` for the password path, `enc_key2` for the
    /// private-key path).
    #[error("not enough header information to unwrap the session key")]
    MissingHeader,

    #[error("unsupported container version {0}.{1}")]
    UnsupportedVersion(u64, u64),

    #[error("password does not match the container's key1_hash")]
    PasswordHashMismatch,

    #[error("unwrapped session key does not match the container's session_key_hash")]
    SessionKeyHashMismatch,

    /// A cryptographic primitive refused its input (malformed key, bad
    /// ciphertext length, undecodable header value).
    #[error("crypto failure: {0}")]
    CryptoFailure(&'static str),

    #[error("invalid PKCS#7 padding on the final block")]
    BadPadding,

    #[error("LZ4 decompression failed: {0}")]
    DecompressionFailed(String),

    /// Plaintext MD5 differed from the `file_md5` header. Only raised when
    /// [`DecryptConfig::strict_digest`] is set; the default is a logged
    /// warning.
    #[error("plaintext MD5 does not match the container's file_md5")]
    DigestMismatch,

    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}
