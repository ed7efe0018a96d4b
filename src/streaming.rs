//! The streaming decryption pipeline.
//!
//! Five stages, pulled leaves-first in bounded memory: byte reader → object
//! decoder → key-unwrap controller → CBC block decryptor → LZ4 decompressor
//! feeding the output sink and a running MD5. The whole pipeline is a single
//! linear pull per file; no threads, no shared state across invocations.

use std::io::{self, BufReader, Read, Write};

use md5::{Digest, Md5};
use zeroize::Zeroizing;

use crate::crypto::{
    is_salted_hash_correct, unwrap_with_password, unwrap_with_private_key, CbcChunkDecryptor,
    strip_pkcs7_padding,
};
use crate::decoder::{ObjectDecoder, StreamItem};
use crate::format::ContainerHeader;
use crate::kdf::openssl_kdf;
use crate::types::{DecryptConfig, DecryptError};

/// Decrypt one Cloud Sync container from `input` into `output`.
///
/// The caller owns both endpoints. Bytes are written in strict file order; on
/// a hard error the sink may already hold a partial prefix and it is the
/// caller's job to discard it. `filename_hint` only annotates diagnostics.
///
/// A trailing `file_md5` mismatch is a soft failure: logged, but still `Ok`,
/// unless [`DecryptConfig::strict_digest`] is set.
pub fn decrypt_stream<R: Read, W: Write>(
    input: R,
    output: &mut W,
    config: &DecryptConfig,
    filename_hint: &str,
) -> Result<(), DecryptError> {
    let mut decoder = ObjectDecoder::new(BufReader::with_capacity(64 * 1024, input))?;
    let mut header = ContainerHeader::default();

    // AwaitHeaders: accumulate metadata until the first ciphertext chunk.
    let first_chunk = loop {
        match decoder.next() {
            Some(Ok(StreamItem::Header { key, value })) => header.absorb(&key, value)?,
            Some(Ok(StreamItem::Data(chunk))) => break Some(chunk),
            Some(Err(e)) => return Err(e),
            None => break None,
        }
    };

    let mut digest = header.digest_declared.then(Md5::new);

    let Some(first_chunk) = first_chunk else {
        // No data chunks at all: an empty plaintext, no decompression stage.
        finish_digest(digest, &header, config.strict_digest, filename_hint)?;
        output.flush()?;
        return Ok(());
    };

    // HaveEnoughToDeriveKey: exactly one unwrap path fires.
    let session_key = unwrap_session_key(config, &header)?;
    if let Some(expected) = header.session_key_hash.as_deref() {
        if !is_salted_hash_correct(expected, &session_key) {
            return Err(DecryptError::SessionKeyHashMismatch);
        }
    }

    let material = session_key_material(&session_key, &header)?;
    let (key, iv) = openssl_kdf(&material, &[], 32, 16);
    let mut decryptor = CbcChunkDecryptor::new(&key, &iv)?;
    let held = decryptor.decrypt_chunk(&first_chunk)?;

    log::debug!(
        "{}: session key unwrapped, streaming (container version {:?})",
        display_name(filename_hint),
        header.version,
    );

    // Streaming: the LZ4 frame decoder pulls plaintext out of the cipher
    // stream, which holds the newest decrypted chunk back until its successor
    // arrives so padding is only ever stripped from the true final block.
    let cipher = CipherStream {
        decoder,
        decryptor,
        header,
        held: Some(held),
        buf: Vec::new(),
        pos: 0,
        finished: false,
    };
    let mut frame = lz4_flex::frame::FrameDecoder::new(cipher);

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = frame.read(&mut buf).map_err(map_stream_error)?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n])?;
        if let Some(d) = digest.as_mut() {
            d.update(&buf[..n]);
        }
    }

    // Finalizing: pick up metadata that trails the data chunks.
    let mut cipher = frame.into_inner();
    cipher.drain()?;

    finish_digest(digest, &cipher.header, config.strict_digest, filename_hint)?;
    output.flush()?;
    Ok(())
}

/// Select and run the session-key unwrap path.
fn unwrap_session_key(
    config: &DecryptConfig,
    header: &ContainerHeader,
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    if let (Some(password), Some(enc_key1)) = (
        config.credentials.password_bytes(),
        header.enc_key1.as_deref(),
    ) {
        if let Some(expected) = header.key1_hash.as_deref() {
            if !is_salted_hash_correct(expected, password) {
                return Err(DecryptError::PasswordHashMismatch);
            }
        }
        return unwrap_with_password(enc_key1, password, &header.salt);
    }

    if let (Some(private_key), Some(enc_key2)) = (
        config.credentials.private_key_bytes(),
        header.enc_key2.as_deref(),
    ) {
        return unwrap_with_private_key(enc_key2, private_key);
    }

    Err(DecryptError::MissingHeader)
}

/// Resolve the bytes fed to the data-stream KDF.
///
/// Major 1 carries the session key raw; major 3 carries it hex-encoded.
/// Without a version header, fall back to the legacy heuristic: a non-empty
/// salt suggests hex, with raw as the fallback when decoding fails.
fn session_key_material(
    session_key: &[u8],
    header: &ContainerHeader,
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    match header.version {
        Some(v) if v.major == 1 => Ok(Zeroizing::new(session_key.to_vec())),
        Some(v) if v.major == 3 => hex::decode(session_key)
            .map(Zeroizing::new)
            .map_err(|_| DecryptError::CryptoFailure("session key is not valid hex")),
        Some(v) => Err(DecryptError::UnsupportedVersion(v.major, v.minor)),
        None => {
            if !header.salt.is_empty() {
                if let Ok(decoded) = hex::decode(session_key) {
                    return Ok(Zeroizing::new(decoded));
                }
            }
            Ok(Zeroizing::new(session_key.to_vec()))
        }
    }
}

/// Compare the running plaintext MD5 against a trailing `file_md5`.
fn finish_digest(
    digest: Option<Md5>,
    header: &ContainerHeader,
    strict: bool,
    filename_hint: &str,
) -> Result<(), DecryptError> {
    let (Some(digest), Some(expected)) = (digest, header.file_md5.as_deref()) else {
        return Ok(());
    };
    let actual = hex::encode(digest.finalize());
    if actual != expected {
        if strict {
            return Err(DecryptError::DigestMismatch);
        }
        log::warn!(
            "{}: plaintext MD5 {actual} does not match the container's file_md5 {expected}",
            display_name(filename_hint),
        );
    }
    Ok(())
}

fn display_name(filename_hint: &str) -> &str {
    if filename_hint.is_empty() {
        "<input>"
    } else {
        filename_hint
    }
}

/// `Read` adapter that yields decrypted plaintext to the LZ4 stage.
///
/// Pulls container items on demand: metadata is folded into the header (a
/// trailing `file_md5` arrives this way), ciphertext chunks are CBC-decrypted
/// with chain state carried across chunks, and the most recent decrypted
/// chunk is withheld until end of input, where its PKCS#7 padding is
/// stripped.
struct CipherStream<R> {
    decoder: ObjectDecoder<R>,
    decryptor: CbcChunkDecryptor,
    header: ContainerHeader,
    held: Option<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl<R: Read> CipherStream<R> {
    /// Consume container items left behind after the LZ4 frame ended, so
    /// trailing metadata still lands in the header.
    ///
    /// Chunks past the end of the compressed stream carry nothing the
    /// pipeline needs, but they still must satisfy the block-size invariant.
    fn drain(&mut self) -> Result<(), DecryptError> {
        for item in self.decoder.by_ref() {
            match item? {
                StreamItem::Header { key, value } => self.header.absorb(&key, value)?,
                StreamItem::Data(chunk) => {
                    if chunk.len() % crate::format::AES_BLOCK_SIZE != 0 {
                        return Err(DecryptError::CryptoFailure(
                            "ciphertext chunk is not a multiple of the AES block size",
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for CipherStream<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.buf.len() {
                let n = (self.buf.len() - self.pos).min(out.len());
                out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }

            match self.decoder.next() {
                Some(Ok(StreamItem::Header { key, value })) => {
                    self.header
                        .absorb(&key, value)
                        .map_err(io::Error::other)?;
                }
                Some(Ok(StreamItem::Data(chunk))) => {
                    let plain = self
                        .decryptor
                        .decrypt_chunk(&chunk)
                        .map_err(io::Error::other)?;
                    if let Some(released) = self.held.replace(plain) {
                        self.buf = released;
                        self.pos = 0;
                    }
                }
                Some(Err(e)) => return Err(io::Error::other(e)),
                None => {
                    self.finished = true;
                    if let Some(mut last) = self.held.take() {
                        strip_pkcs7_padding(&mut last).map_err(io::Error::other)?;
                        self.buf = last;
                        self.pos = 0;
                    }
                }
            }
        }
    }
}

/// Recover the typed pipeline error from the LZ4 stage's `io::Error`.
///
/// Errors raised inside [`CipherStream`] travel through the frame decoder
/// boxed in `io::Error`; anything genuinely produced by the decompressor maps
/// to [`DecryptError::DecompressionFailed`].
fn map_stream_error(e: io::Error) -> DecryptError {
    match e.downcast::<DecryptError>() {
        Ok(inner) => inner,
        Err(e) => match e.downcast::<lz4_flex::frame::Error>() {
            Ok(lz4) => DecryptError::DecompressionFailed(lz4.to_string()),
            Err(e) => DecryptError::DecompressionFailed(e.to_string()),
        },
    }
}
