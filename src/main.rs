#![forbid(unsafe_code)]
//! Command-line frontend: decrypt Cloud Sync files and directories.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cloudsync_decrypt::{decrypt_path, Credentials, DecryptConfig, Report};

#[derive(Parser, Debug)]
#[command(
    name = "cloudsync-decrypt",
    version,
    about = "Decrypt Synology Cloud Sync files (.cse/.enc/.cloudsync/.csenc)"
)]
struct Cli {
    /// Encrypted files or directories (directories are walked recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short = 'O', long = "output-dir")]
    output_dir: PathBuf,

    /// Read the decryption password from a file (trailing newline trimmed)
    #[arg(
        short = 'p',
        long = "password-file",
        conflicts_with = "private_key_file"
    )]
    password_file: Option<PathBuf>,

    /// Read the RSA private key from a file (PKCS#1/PKCS#8, DER or PEM)
    #[arg(short = 'k', long = "private-key-file")]
    private_key_file: Option<PathBuf>,

    /// Read the matching RSA public key from a file (stored, not used)
    #[arg(
        short = 'l',
        long = "public-key-file",
        requires = "private_key_file"
    )]
    public_key_file: Option<PathBuf>,

    /// Overwrite output files that already exist
    #[arg(short = 'f', long = "force")]
    force: bool,

    /// Treat a plaintext MD5 mismatch as a hard error
    #[arg(long)]
    strict_digest: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let credentials = load_credentials(&cli)?;
    let config = DecryptConfig {
        credentials,
        strict_digest: cli.strict_digest,
    };

    fs::create_dir_all(&cli.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            cli.output_dir.display()
        )
    })?;

    let mut report = Report::new();
    for input in &cli.inputs {
        decrypt_path(input, &cli.output_dir, &config, cli.force, &mut report);
    }
    report.print_summary();

    if report.failures() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn load_credentials(cli: &Cli) -> Result<Credentials> {
    if let Some(path) = &cli.password_file {
        let mut password = fs::read(path)
            .with_context(|| format!("failed to read password file {}", path.display()))?;
        trim_trailing_newline(&mut password);
        return Ok(Credentials::password(password));
    }

    if let Some(path) = &cli.private_key_file {
        let private_key = fs::read(path)
            .with_context(|| format!("failed to read private key file {}", path.display()))?;
        let public_key = match &cli.public_key_file {
            Some(path) => Some(
                fs::read(path)
                    .with_context(|| format!("failed to read public key file {}", path.display()))?,
            ),
            None => None,
        };
        return Ok(Credentials::key_pair(private_key, public_key));
    }

    let password = rpassword::prompt_password("Password: ").context("failed to read password")?;
    Ok(Credentials::password(password.into_bytes()))
}

/// Drop one trailing newline (LF or CRLF) that editors and shells append to
/// password files.
fn trim_trailing_newline(bytes: &mut Vec<u8>) {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
}
