//! Subcommand implementations.
//!
//! Each command writes its report to `out` and returns; exit codes are
//! decided by the caller from the returned error.

use std::{io::Write, time::Instant};

use bmsc_crypto::{
    Backend, BmscError, Cipher, CipherConfig, Entropy, Envelope, ParamSource, SystemEntropy,
};
use tracing::{info, warn};

use crate::{
    args::{BenchArgs, DecryptArgs, DecryptFileArgs, EncryptArgs, KeyArgs, SelftestArgs},
    error::{CliError, Result},
    input::{self, KeySource, LoadedKey},
};

/// Encrypt `--text` or `--in-file`.
///
/// With `--out` the result is written as an envelope of `--format`,
/// otherwise nonce, ciphertext and tag are printed as Base64.
pub fn encrypt(backend: Backend, args: &EncryptArgs, out: &mut dyn Write) -> Result<()> {
    let key = input::load_key(&args.key)?;
    let plaintext = match (&args.text, &args.in_file) {
        (Some(text), _) => text.as_bytes().to_vec(),
        (None, Some(path)) => input::read_file(path)?,
        (None, None) => Vec::new(),
    };
    let aad = input::load_aad(&args.binding)?;
    let context = args.binding.context.as_bytes();

    let cipher = Cipher::system(CipherConfig::with_backend(backend));
    report_key(&key, &args.key, out)?;
    writeln!(out, "CONTEXT: {}", args.binding.context)?;

    if let Some(path) = &args.out {
        let blob = cipher.seal_envelope(args.format, &plaintext, &key.bytes, context, &aad)?;
        input::write_file(path, &blob)?;
        info!(format = %args.format, bytes = blob.len(), path = %path.display(), "envelope written");
        writeln!(out, "Wrote: {} ({}, {} bytes)", path.display(), args.format, blob.len())?;
        return Ok(());
    }

    let sealed = cipher.encrypt(&plaintext, &key.bytes, context, &aad)?;
    writeln!(out, "NONCE(Base64): {}", input::encode_b64(&sealed.nonce))?;
    writeln!(out, "CT(Base64): {}", input::encode_b64(&sealed.ciphertext))?;
    writeln!(out, "TAG(Base64): {}", input::encode_b64(&sealed.tag))?;
    Ok(())
}

/// Decrypt Base64 fields and print the plaintext.
pub fn decrypt(backend: Backend, args: &DecryptArgs, out: &mut dyn Write) -> Result<()> {
    let key = input::load_key(&args.key)?;
    let nonce = input::decode_b64("nonce", &args.nonce_b64)?;
    let ciphertext = input::decode_b64("ciphertext", &args.ct_b64)?;
    let tag = input::decode_b64("tag", &args.tag_b64)?;
    let aad = input::load_aad(&args.binding)?;

    let cipher = Cipher::system(CipherConfig::with_backend(backend));
    let plaintext = cipher.decrypt(
        &nonce,
        &ciphertext,
        &tag,
        &key.bytes,
        args.binding.context.as_bytes(),
        &aad,
    )?;

    report_key(&key, &args.key, out)?;
    match std::str::from_utf8(&plaintext) {
        Ok(text) => writeln!(out, "PLAINTEXT(utf-8): {text}")?,
        Err(_) => writeln!(out, "PLAINTEXT(hex): {}", hex::encode(&plaintext))?,
    }
    Ok(())
}

/// Decrypt an envelope file, detecting raw, v1 and v2 layouts.
///
/// A context embedded in a v2 envelope is used unless
/// `--ignore-embedded-context` is given. An embedded AAD is used unless
/// `--aad`/`--aad-file` supply a non-empty one.
pub fn decrypt_file(backend: Backend, args: &DecryptFileArgs, out: &mut dyn Write) -> Result<()> {
    let key = input::load_key(&args.key)?;
    let blob = input::read_file(&args.in_enc_file)?;
    let external_aad = input::load_aad(&args.binding)?;
    let external_context = args.binding.context.as_bytes();

    let cipher = Cipher::system(CipherConfig::with_backend(backend));

    let mut envelope = Envelope::decode(&blob, cipher.nonce_len())?;
    if args.ignore_embedded_context && envelope.discard_embedded_context().is_some() {
        warn!("ignoring context embedded in the envelope");
    }
    let opened = cipher.open_decoded(&envelope, &key.bytes, external_context, &external_aad)?;
    info!(version = %opened.version, bytes = opened.plaintext.len(), "envelope opened");

    match opened.context_source {
        ParamSource::Embedded => {
            writeln!(out, "CONTEXT(from file): {}", String::from_utf8_lossy(&opened.context))?;
        },
        ParamSource::External => writeln!(out, "CONTEXT(from args): {}", args.binding.context)?,
    }
    match (opened.aad_source, external_aad.is_empty()) {
        (ParamSource::Embedded, _) => writeln!(out, "AAD: embedded (used)")?,
        (ParamSource::External, false) => writeln!(out, "AAD: from args/file (used)")?,
        (ParamSource::External, true) => writeln!(out, "AAD: empty")?,
    }

    if let Some(path) = &args.out {
        input::write_file(path, &opened.plaintext)?;
        writeln!(out, "Wrote: {}", path.display())?;
    } else {
        writeln!(out, "PLAINTEXT(hex): {}", hex::encode(&opened.plaintext))?;
    }
    Ok(())
}

/// Round trip, tamper detection and nonce freshness with a random key.
pub fn selftest(backend: Backend, args: &SelftestArgs, out: &mut dyn Write) -> Result<()> {
    let key = input::load_key(&KeyArgs::default())?;
    let context = args.context.as_bytes();
    let plaintext = "hello 🍋".as_bytes();
    let cipher = Cipher::system(CipherConfig::with_backend(backend));

    let sealed = cipher.encrypt(plaintext, &key.bytes, context, &[])?;
    let opened =
        cipher.decrypt(&sealed.nonce, &sealed.ciphertext, &sealed.tag, &key.bytes, context, &[])?;
    if opened != plaintext {
        return Err(CliError::Selftest("round trip changed the plaintext"));
    }
    writeln!(out, "round trip OK")?;

    let mut tampered = sealed.ciphertext.clone();
    tampered[0] ^= 0x01;
    match cipher.decrypt(&sealed.nonce, &tampered, &sealed.tag, &key.bytes, context, &[]) {
        Err(BmscError::AuthenticationFailure) => writeln!(out, "tamper detected")?,
        _ => return Err(CliError::Selftest("tampered ciphertext was accepted")),
    }

    let again = cipher.encrypt(plaintext, &key.bytes, context, &[])?;
    if again.nonce == sealed.nonce {
        return Err(CliError::Selftest("nonce repeated across encryptions"));
    }
    writeln!(out, "nonces fresh")?;

    writeln!(out, "selftest OK ({backend})")?;
    Ok(())
}

/// Time encrypt and decrypt of random messages.
#[allow(clippy::disallowed_methods)]
pub fn bench(backend: Backend, args: &BenchArgs, out: &mut dyn Write) -> Result<()> {
    let key = input::load_key(&KeyArgs::default())?;
    let cipher = Cipher::system(CipherConfig::with_backend(backend));
    let rounds = args.rounds.max(1);

    writeln!(out, "backend: {backend}, rounds: {rounds}")?;
    for &size in &args.sizes {
        let mut plaintext = vec![0u8; size];
        SystemEntropy::new().random_bytes(&mut plaintext);

        let mut sealed = cipher.encrypt(&plaintext, &key.bytes, b"bench", &[])?;
        let start = Instant::now();
        for _ in 0..rounds {
            sealed = cipher.encrypt(&plaintext, &key.bytes, b"bench", &[])?;
        }
        let encrypt_secs = start.elapsed().as_secs_f64();

        let start = Instant::now();
        for _ in 0..rounds {
            cipher.decrypt(&sealed.nonce, &sealed.ciphertext, &sealed.tag, &key.bytes, b"bench", &[])?;
        }
        let decrypt_secs = start.elapsed().as_secs_f64();

        writeln!(
            out,
            "{size:>10} B  encrypt {:>10.2} MiB/s  decrypt {:>10.2} MiB/s",
            throughput(size, rounds, encrypt_secs),
            throughput(size, rounds, decrypt_secs),
        )?;
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn throughput(size: usize, rounds: u32, secs: f64) -> f64 {
    if secs <= 0.0 {
        return f64::INFINITY;
    }
    (size as f64 * f64::from(rounds)) / (1024.0 * 1024.0) / secs
}

fn report_key(key: &LoadedKey, args: &KeyArgs, out: &mut dyn Write) -> Result<()> {
    let show = key.should_show(args.show_key);
    if key.source == KeySource::Random {
        if show {
            warn!("no key given: generated a random 32-byte key");
        } else {
            warn!("no key given: generated a random 32-byte key (pass --show-key to print it)");
        }
    }
    if show {
        writeln!(out, "KEY(HEX): {}", hex::encode(&*key.bytes))?;
    }
    Ok(())
}
