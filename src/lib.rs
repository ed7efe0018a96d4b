#![forbid(unsafe_code)]
//! # cloudsync-decrypt — decrypt Synology Cloud Sync files.
//!
//! Synology's Cloud Sync feature encrypts uploaded objects with a hybrid
//! scheme: an AES-256-CBC session key wrapped either under a password-derived
//! key (OpenSSL `EVP_BytesToKey`, MD5 variant) or under RSA-OAEP, LZ4 frame
//! compression of the plaintext, and MD5 integrity metadata. This crate
//! parses the self-describing container (`.cse`, `.enc`, `.cloudsync`,
//! `.csenc`), unwraps the session key, and streams the original file back
//! out in bounded memory.
//!
//! ## Example: decrypt one file with a password
//! ```no_run
//! use cloudsync_decrypt::{decrypt_file, DecryptConfig};
//! use std::path::Path;
//!
//! let config = DecryptConfig::with_password(b"my password".to_vec());
//! decrypt_file(Path::new("photo.jpg.cse"), Path::new("photo.jpg"), &config, false)?;
//! # Ok::<(), cloudsync_decrypt::DecryptError>(())
//! ```
//!
//! ## Example: stream between arbitrary endpoints
//! ```no_run
//! use cloudsync_decrypt::{decrypt_stream, DecryptConfig};
//! use std::fs::File;
//!
//! let config = DecryptConfig::with_password(b"my password".to_vec());
//! let input = File::open("backup.csenc")?;
//! let mut output = Vec::new();
//! decrypt_stream(input, &mut output, &config, "backup.csenc")?;
//! # Ok::<(), cloudsync_decrypt::DecryptError>(())
//! ```
//!
//! Decryption only: this crate never writes containers, and it validates RSA
//! key material only as far as decrypting a single OAEP payload requires.

// Module declarations
mod batch;
mod crypto;
mod file;
mod report;
mod streaming;
mod types;

pub mod decoder;
pub mod format;
pub mod kdf;

// High-level API — this is what most users import.
pub use batch::{decrypt_directory, decrypt_path};
pub use file::{decrypt_file, decrypted_file_name, is_encrypted_file, ENCRYPTED_EXTENSIONS};
pub use report::{FileResult, Report};
pub use streaming::decrypt_stream;
pub use types::{Credentials, DecryptConfig, DecryptError};

// Lower-level pieces, public for tooling that inspects containers.
pub use crypto::{is_salted_hash_correct, md5_hex, salted_hash_of};
pub use decoder::{ObjectDecoder, StreamItem, Value};
pub use format::{ContainerHeader, Version, AES_BLOCK_SIZE, MAGIC, PREAMBLE_LEN};
