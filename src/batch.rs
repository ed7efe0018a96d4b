//! Batch decryption: multi-input dispatch and the recursive directory walk.
//!
//! Per-file errors are recorded in the [`Report`] and never abort the batch.

use std::fs;
use std::path::Path;
use std::time::Instant;

use walkdir::WalkDir;

use crate::file::{decrypt_file, decrypted_file_name};
use crate::report::{FileResult, Report};
use crate::types::DecryptConfig;

/// Decrypt a file or directory into `output_dir`, recording results.
///
/// A directory is walked recursively and mirrored under `output_dir`; a
/// single file lands directly in `output_dir` under its derived name.
pub fn decrypt_path(
    input: &Path,
    output_dir: &Path,
    config: &DecryptConfig,
    force: bool,
    report: &mut Report,
) {
    match fs::metadata(input) {
        Ok(meta) if meta.is_dir() => decrypt_directory(input, output_dir, config, force, report),
        Ok(_) => {
            let output = output_dir.join(decrypted_file_name(input));
            run_one(input, &output, config, force, report);
        }
        Err(e) => report.record(FileResult {
            input: input.to_path_buf(),
            output: output_dir.to_path_buf(),
            error: Some(format!("cannot access input: {e}")),
            output_size: 0,
            elapsed: Default::default(),
        }),
    }
}

/// Recursively decrypt every regular file under `input_dir`, mirroring the
/// directory structure under `output_dir` with encrypted extensions stripped.
pub fn decrypt_directory(
    input_dir: &Path,
    output_dir: &Path,
    config: &DecryptConfig,
    force: bool,
    report: &mut Report,
) {
    for entry in WalkDir::new(input_dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let at = e.path().unwrap_or(input_dir).to_path_buf();
                report.record(FileResult {
                    input: at,
                    output: output_dir.to_path_buf(),
                    error: Some(format!("walk failed: {e}")),
                    output_size: 0,
                    elapsed: Default::default(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(input_dir).unwrap_or(path);
        let output = match relative.parent() {
            Some(parent) => output_dir.join(parent).join(decrypted_file_name(path)),
            None => output_dir.join(decrypted_file_name(path)),
        };
        run_one(path, &output, config, force, report);
    }
}

fn run_one(input: &Path, output: &Path, config: &DecryptConfig, force: bool, report: &mut Report) {
    let started = Instant::now();
    let outcome = decrypt_file(input, output, config, force);
    let elapsed = started.elapsed();

    match outcome {
        Ok(()) => {
            let output_size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
            report.record(FileResult {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                error: None,
                output_size,
                elapsed,
            });
        }
        Err(e) => {
            eprintln!("  {} - {e}", input.display());
            report.record(FileResult {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                error: Some(e.to_string()),
                output_size: 0,
                elapsed,
            });
        }
    }
}
