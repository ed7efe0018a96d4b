//! Filesystem ergonomics around the core pipeline: encrypted-extension
//! recognition, output path derivation, overwrite policy, and atomic output
//! placement.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::streaming::decrypt_stream;
use crate::types::{DecryptConfig, DecryptError};

/// Extensions produced by Cloud Sync clients, matched case-insensitively.
pub const ENCRYPTED_EXTENSIONS: &[&str] = &["cse", "enc", "cloudsync", "csenc"];

/// Whether a path carries one of the recognized encrypted extensions.
pub fn is_encrypted_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ENCRYPTED_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Derive the plaintext file name for an encrypted input.
///
/// A matching trailing extension is stripped; otherwise the base name is kept
/// as-is.
pub fn decrypted_file_name(input: &Path) -> PathBuf {
    let name = input.file_name().unwrap_or(input.as_os_str());
    if is_encrypted_file(input) {
        if let Some(stem) = input.file_stem() {
            return PathBuf::from(stem);
        }
    }
    PathBuf::from(name)
}

/// Decrypt a single `.cse`/`.enc`/`.cloudsync`/`.csenc` file to an explicit
/// output path.
///
/// The plaintext is staged in a tempfile beside the target and only renamed
/// into place once the whole container decrypted cleanly, so a failure never
/// leaves a partial output behind. A pre-existing output is refused up front
/// unless `force` is set; without `force` the final rename is no-clobber as
/// well, so the output cannot be stomped even if something creates it while
/// the decryption runs.
pub fn decrypt_file(
    input: &Path,
    output: &Path,
    config: &DecryptConfig,
    force: bool,
) -> Result<(), DecryptError> {
    if !force && output.exists() {
        return Err(DecryptError::Invalid(
            "refusing to overwrite existing decrypted output; use --force",
        ));
    }

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let input_file = File::open(input)?;
    let mut tmp = NamedTempFile::new_in(&parent)?;

    decrypt_stream(
        input_file,
        &mut tmp,
        config,
        &input.display().to_string(),
    )?;

    tmp.as_file().sync_all()?;

    let staged = tmp.into_temp_path();
    let renamed = if force {
        staged.persist(output)
    } else {
        staged.persist_noclobber(output)
    };
    renamed.map_err(|e| DecryptError::Io(e.error))?;
    Ok(())
}
