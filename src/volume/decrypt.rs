//! The decryption pipeline.
//!
//! Phases, in order: recombine split chunks, strip the deniability layer,
//! read the header (preserving raw field bytes), derive the key, compose
//! keyfiles, verify (v1 key hash or v2 header MAC, keyfile fingerprint
//! first for better messages), stream-decrypt, then verify the payload MAC.
//!
//! With Reed-Solomon payloads the first pass decodes fast (no repair). If
//! the auth tag then fails, the HKDF stream and cipher suite are rebuilt
//! from the retained keys and the payload is re-streamed once with full
//! error correction. Exactly one retry: correction is deterministic, so a
//! second one could not change the outcome.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Seek, SeekFrom, Write};

use secrecy::ExposeSecret;
use sha3::{Digest, Sha3_512};
use tracing::{info, warn};

use crate::config::{CHUNK_SIZE, HEADER_SUBKEY_SIZE, KEY_REF_SIZE, RS_CHUNK_SIZE, RS_DATA_SIZE, RS_ENCODED_SIZE};
use crate::crypto::keyfile::{self, ComposedKeyfiles};
use crate::crypto::mac::{header_mac, verify_tags};
use crate::crypto::{derive_key, params_for, CipherSuite, SubkeyStream};
use crate::error::{Error, Result};
use crate::fec::CodecSet;
use crate::header::{Deserializer, ParsedHeader, VolumeHeader};
use crate::padding;
use crate::secret::{xor_keys, Protected, SecretKey};
use crate::volume::context::OperationContext;
use crate::volume::{check_cancelled, deniability, incomplete_path, read_full, split, temp_path, DecryptRequest, Progress};

/// How a completed decryption ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// Payload MAC verified; the output is authentic.
    Verified,
    /// Force mode kept the output despite a failed payload MAC. The bytes
    /// may be garbage and the caller must surface a prominent warning.
    MacMismatch,
}

/// Opens `request.input` and writes the recovered plaintext to
/// `request.output`.
///
/// On error the partial output and all intermediate files are removed. In
/// force mode, damage and payload-MAC failure downgrade to
/// [`DecryptOutcome::MacMismatch`]; wrong passwords and wrong keyfiles never
/// do.
pub fn decrypt(request: &DecryptRequest, progress: &dyn Progress) -> Result<DecryptOutcome> {
    let mut ctx = OperationContext::new();
    run(request, &mut ctx, progress)
}

fn run(request: &DecryptRequest, ctx: &mut OperationContext, progress: &dyn Progress) -> Result<DecryptOutcome> {
    progress.set_can_cancel(true);
    let codecs = CodecSet::new();

    // Phase 1: preprocessing. Join chunks, then strip the outer layer.
    let mut source = request.input.clone();
    if request.recombine {
        progress.set_status("Recombining split chunks");
        let joined = temp_path(&source);
        ctx.stage(joined.clone());
        split::join(&source, &joined, progress)?;
        source = joined;
    } else if fs::metadata(&source).is_err() {
        return Err(Error::InvalidInput(format!("input file not found: {}", source.display())));
    }

    if request.deniability || deniability::is_wrapped(&source, &codecs)? {
        progress.set_status("Stripping deniability layer");
        check_cancelled(progress)?;
        let peeled = temp_path(&source);
        ctx.stage(peeled.clone());
        deniability::unwrap(&source, &request.password, &peeled, progress)?;
        source = peeled;
    }

    // Phase 2: header, with raw bytes kept for MAC verification.
    let total = fs::metadata(&source)?.len();
    let parsed = read_header(&source, &codecs)?;
    let ParsedHeader { header, raw, damaged: header_damaged } = parsed;
    if header_damaged {
        warn!("header carries uncorrectable damage");
    }
    let payload_len = total - header.encoded_len();

    // Phase 3: key derivation, parameterized by the volume's own flags.
    progress.set_status("Deriving decryption key");
    progress.update();
    check_cancelled(progress)?;
    let pw_key = derive_key(request.password.expose_secret().as_bytes(), &header.argon_salt, params_for(header.flags.paranoid))?;
    check_cancelled(progress)?;

    // Phase 4: keyfiles, only if the volume was sealed with them.
    let composed = if header.flags.uses_keyfiles {
        keyfile::compose(&request.keyfiles, header.flags.ordered_keyfiles)?
    } else {
        ComposedKeyfiles::absent()
    };

    // Phase 5: verification. With force mode and a damaged header the
    // failures are noted and the stream proceeds; a clean header always
    // aborts on mismatch.
    let tolerate_mismatch = request.force && header_damaged;
    let (mut subkeys, suite, header_subkey) = stream_state(&header, &pw_key, &composed.key)?;

    if header.is_legacy() {
        let mut expected = [0u8; KEY_REF_SIZE];
        expected.copy_from_slice(&Sha3_512::digest(pw_key.expose()));
        if !verify_tags(&raw.key_ref, &expected) {
            if !tolerate_mismatch {
                return Err(Error::PasswordIncorrect);
            }
            warn!("continuing past failed key hash (force)");
        }
        if header.flags.uses_keyfiles && !verify_tags(&raw.keyfile_fingerprint, &composed.fingerprint) {
            if !tolerate_mismatch {
                return Err(Error::KeyfileAuth { ordered: header.flags.ordered_keyfiles });
            }
            warn!("continuing past failed keyfile fingerprint (force)");
        }
    } else {
        let subkey = header_subkey.as_ref().ok_or(Error::SubkeyOrder("missing header subkey for v2 volume"))?;
        let expected = header_mac(subkey.expose(), &[&raw.mac_message()])?;

        // Fingerprint first: a wrong keyfile also breaks the header MAC, and
        // the specific message is worth more than the generic one.
        if header.flags.uses_keyfiles && !verify_tags(&raw.keyfile_fingerprint, &composed.fingerprint) {
            if !tolerate_mismatch {
                return Err(Error::KeyfileAuth { ordered: header.flags.ordered_keyfiles });
            }
            warn!("continuing past failed keyfile fingerprint (force)");
        }
        if !verify_tags(&raw.key_ref, &expected) {
            if !tolerate_mismatch {
                return Err(Error::HeaderAuth);
            }
            warn!("continuing past failed header authentication (force)");
        }
    }

    // Phases 6-7: stream decrypt, fast FEC first.
    progress.set_status("Decrypting");
    let out_tmp = incomplete_path(&request.output);
    ctx.stage(out_tmp.clone());

    let fast = header.flags.payload_rs;
    let computed = stream_pass(&source, &header, payload_len, &codecs, suite, &mut subkeys, fast, request.force, &out_tmp, progress)?;
    let mut tag_ok = verify_tags(&raw.auth_tag, &computed);

    // Phase 8: one full-repair retry, rebuilding the stream state from the
    // retained keys (bit-identical to re-running derivation).
    if !tag_ok && fast {
        info!("auth tag mismatch; retrying with full error correction");
        progress.set_status("Repairing payload");
        let (mut retry_subkeys, retry_suite, _) = stream_state(&header, &pw_key, &composed.key)?;
        let recomputed = stream_pass(&source, &header, payload_len, &codecs, retry_suite, &mut retry_subkeys, false, request.force, &out_tmp, progress)?;
        tag_ok = verify_tags(&raw.auth_tag, &recomputed);
    }

    // Phase 9: promote or report.
    if tag_ok {
        ctx.promote(&out_tmp, &request.output)?;
        info!(output = %request.output.display(), "volume verified and decrypted");
        return Ok(DecryptOutcome::Verified);
    }
    if request.force {
        ctx.promote(&out_tmp, &request.output)?;
        warn!(output = %request.output.display(), "auth tag mismatch; keeping unverified output (force)");
        return Ok(DecryptOutcome::MacMismatch);
    }
    Err(Error::PayloadAuth)
}

/// Reads and decodes the header; a stream that ends inside the header is
/// reported as corruption, not EOF.
fn read_header(source: &std::path::Path, codecs: &CodecSet) -> Result<ParsedHeader> {
    let mut reader = BufReader::new(File::open(source)?);
    Deserializer::new(codecs).deserialize(&mut reader).map_err(|e| match e {
        Error::Io(ref io) if io.kind() == ErrorKind::UnexpectedEof => Error::CorruptHeader,
        other => other,
    })
}

/// Rebuilds the HKDF stream and cipher suite for one streaming pass,
/// applying the two-axis version rule: v1 XORs the keyfile key into the HKDF
/// key itself, v2 only into the cipher key.
fn stream_state(
    header: &VolumeHeader,
    pw_key: &SecretKey,
    keyfile_key: &SecretKey,
) -> Result<(SubkeyStream, CipherSuite, Option<Protected<[u8; HEADER_SUBKEY_SIZE]>>)> {
    let legacy = header.is_legacy();
    let (hkdf_key, cipher_key) = if legacy {
        let mut key = pw_key.clone();
        xor_keys(&mut key, keyfile_key);
        (key.clone(), key)
    } else {
        let mut cipher_key = pw_key.clone();
        xor_keys(&mut cipher_key, keyfile_key);
        (pw_key.clone(), cipher_key)
    };

    let mut subkeys = SubkeyStream::new(&hkdf_key, &header.hkdf_salt, legacy)?;
    let header_subkey = if legacy { None } else { Some(subkeys.header_subkey()?) };
    let mac_subkey = subkeys.mac_subkey()?;
    let outer_key = subkeys.outer_key()?;
    let suite = CipherSuite::new(cipher_key, &header.nonce, &mac_subkey, outer_key, &header.outer_iv, header.flags.paranoid)?;

    Ok((subkeys, suite, header_subkey))
}

/// Streams the whole payload once, writing plaintext to `out_tmp`, and
/// returns the computed payload MAC.
#[allow(clippy::too_many_arguments)]
fn stream_pass(
    source: &std::path::Path,
    header: &VolumeHeader,
    payload_len: u64,
    codecs: &CodecSet,
    mut suite: CipherSuite,
    subkeys: &mut SubkeyStream,
    fast: bool,
    force: bool,
    out_tmp: &std::path::Path,
    progress: &dyn Progress,
) -> Result<[u8; crate::config::AUTH_TAG_SIZE]> {
    let mut input = File::open(source)?;
    input.seek(SeekFrom::Start(header.encoded_len()))?;
    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(File::create(out_tmp)?);

    let payload_rs = header.flags.payload_rs;
    let cap = if payload_rs { RS_CHUNK_SIZE } else { CHUNK_SIZE };
    let mut buf = vec![0u8; cap];
    let mut remaining = payload_len;

    while remaining > 0 {
        check_cancelled(progress)?;
        let want = remaining.min(cap as u64) as usize;
        let n = read_full(&mut reader, &mut buf[..want])?;
        if n != want {
            return Err(Error::CorruptPayload);
        }
        remaining -= n as u64;
        let last = remaining == 0;

        let mut chunk = if payload_rs {
            if n % RS_ENCODED_SIZE != 0 && !force {
                return Err(Error::CorruptPayload);
            }
            let blocks = n / RS_ENCODED_SIZE;
            let mut decoded = Vec::with_capacity(blocks * RS_DATA_SIZE);
            for i in 0..blocks {
                let block = &buf[i * RS_ENCODED_SIZE..(i + 1) * RS_ENCODED_SIZE];
                let (data, block_damaged) = codecs.rs128.decode(block, fast)?;
                if block_damaged && !force {
                    return Err(Error::CorruptPayload);
                }
                decoded.extend_from_slice(&data);
            }
            if last && header.flags.padded {
                let unpadded = padding::unpad(&decoded).len();
                decoded.truncate(unpadded);
            }
            decoded
        } else {
            buf[..n].to_vec()
        };

        suite.decrypt_chunk(&mut chunk, subkeys)?;
        writer.write_all(&chunk)?;

        progress.set_progress(1.0 - remaining as f64 / payload_len.max(1) as f64, "");
        progress.update();
    }

    writer.flush()?;
    let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(suite.finalize())
}
