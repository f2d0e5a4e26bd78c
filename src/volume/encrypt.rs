//! The encryption pipeline.
//!
//! Phases, in order: generate parameters, write the header with zeroed auth
//! fields, derive the password key, compose keyfiles, initialize the HKDF
//! stream and compute the header MAC, build the cipher suite, stream the
//! payload, then patch the three auth fields and promote the output. The
//! ordering between subkey reads, the keyfile XOR and the header MAC is
//! load-bearing; see `crypto::subkeys` for the stream contract.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};

use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::config::{CHUNK_SIZE, MAX_COMMENT_LEN, RS_DATA_SIZE};
use crate::crypto::{derive_key, keyfile, params_for, random_bytes, CipherSuite, SubkeyStream};
use crate::crypto::mac::header_mac;
use crate::error::{Error, Result};
use crate::fec::CodecSet;
use crate::header::{Flags, Serializer, VolumeHeader};
use crate::padding;
use crate::secret::xor_keys;
use crate::volume::context::OperationContext;
use crate::volume::{check_cancelled, deniability, incomplete_path, read_full, split, EncryptRequest, Progress};

/// Seals `request.input` into a `.pcv` volume at `request.output`.
///
/// On any failure the `.incomplete` output and every intermediate file are
/// removed; nothing is ever promoted to the final name.
pub fn encrypt(request: &EncryptRequest, progress: &dyn Progress) -> Result<()> {
    validate(request)?;
    let mut ctx = OperationContext::new();
    run(request, &mut ctx, progress)
}

fn validate(request: &EncryptRequest) -> Result<()> {
    if fs::metadata(&request.input).is_err() {
        return Err(Error::InvalidInput(format!("input file not found: {}", request.input.display())));
    }
    if request.password.expose_secret().is_empty() && request.keyfiles.is_empty() {
        return Err(Error::InvalidInput("a password or at least one keyfile is required".into()));
    }
    if request.comments.len() > MAX_COMMENT_LEN {
        return Err(Error::InvalidInput(format!(
            "comments are {} bytes; the header can carry at most {}",
            request.comments.len(),
            MAX_COMMENT_LEN
        )));
    }
    if let Some(size) = &request.split {
        size.validate()?;
    }
    Ok(())
}

fn run(request: &EncryptRequest, ctx: &mut OperationContext, progress: &dyn Progress) -> Result<()> {
    let size = fs::metadata(&request.input)?.len();
    progress.set_can_cancel(true);

    // Phase 1: fresh randomness and flags.
    progress.set_status("Generating volume parameters");
    let flags = Flags {
        paranoid: request.paranoid,
        uses_keyfiles: !request.keyfiles.is_empty(),
        ordered_keyfiles: !request.keyfiles.is_empty() && request.ordered_keyfiles,
        payload_rs: request.payload_rs,
        padded: request.payload_rs && (size % CHUNK_SIZE as u64) % RS_DATA_SIZE as u64 != 0,
    };
    let mut header = VolumeHeader::new(
        request.comments.clone().into_bytes(),
        flags,
        random_bytes()?,
        random_bytes()?,
        random_bytes()?,
        random_bytes()?,
    );

    // Phase 2: header with zeroed auth fields.
    let out_tmp = incomplete_path(&request.output);
    ctx.stage(out_tmp.clone());
    let codecs = CodecSet::new();
    let serializer = Serializer::new(&codecs);
    let mut writer = BufWriter::new(File::create(&out_tmp)?);
    writer.write_all(&serializer.serialize(&header)?)?;

    // Phase 3: password key.
    progress.set_status("Deriving encryption key");
    progress.update();
    check_cancelled(progress)?;
    let pw_key = derive_key(request.password.expose_secret().as_bytes(), &header.argon_salt, params_for(request.paranoid))?;
    check_cancelled(progress)?;

    // Phase 4: keyfiles. An all-zero composed key means duplicates
    // cancelled each other out.
    let composed = keyfile::compose(&request.keyfiles, flags.ordered_keyfiles)?;
    if flags.uses_keyfiles && composed.is_zero() {
        return Err(Error::DuplicateKeyfiles);
    }
    header.keyfile_fingerprint = composed.fingerprint;

    // Phase 5: subkey stream and header MAC. The HKDF key is the password
    // key alone; the keyfile key joins the cipher key only afterwards.
    let mut subkeys = SubkeyStream::new(&pw_key, &header.hkdf_salt, false)?;
    let header_subkey = subkeys.header_subkey()?;
    header.key_ref = header_mac(header_subkey.expose(), &[&header.mac_message()])?;
    drop(header_subkey);

    // Phase 6: cipher key and suite.
    let mut cipher_key = pw_key;
    xor_keys(&mut cipher_key, &composed.key);
    let mac_subkey = subkeys.mac_subkey()?;
    let outer_key = subkeys.outer_key()?;
    let mut suite = CipherSuite::new(cipher_key, &header.nonce, &mac_subkey, outer_key, &header.outer_iv, flags.paranoid)?;
    debug!(paranoid = flags.paranoid, payload_rs = flags.payload_rs, padded = flags.padded, "cipher suite ready");

    // Phase 7: stream the payload.
    progress.set_status("Encrypting");
    let mut reader = BufReader::new(File::open(&request.input)?);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut done = 0u64;
    loop {
        check_cancelled(progress)?;
        let n = read_full(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }

        let chunk = &mut buf[..n];
        suite.encrypt_chunk(chunk, &mut subkeys)?;
        if flags.payload_rs {
            writer.write_all(&rs_pack(&codecs, chunk)?)?;
        } else {
            writer.write_all(chunk)?;
        }

        done += n as u64;
        progress.set_progress(done as f64 / size.max(1) as f64, "");
        progress.update();

        if n < CHUNK_SIZE {
            break;
        }
    }

    // Phase 8: finalize. Patch auth fields in place, then promote.
    header.auth_tag = suite.finalize();
    writer.flush()?;
    let mut file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    serializer.patch_auth_fields(&mut file, header.comments.len(), &header.key_ref, &header.keyfile_fingerprint, &header.auth_tag)?;
    file.sync_all()?;
    drop(file);
    ctx.promote(&out_tmp, &request.output)?;
    info!(output = %request.output.display(), bytes = done, "volume sealed");

    // Phase 9: optional outer layers over the finished volume.
    ctx.stage(request.output.clone());
    if request.deniability {
        progress.set_status("Applying deniability layer");
        deniability::wrap(&request.output, &request.password, ctx, progress)?;
    }
    if let Some(size) = &request.split {
        progress.set_status("Splitting volume");
        let chunks = split::split(&request.output, size, progress)?;
        fs::remove_file(&request.output)?;
        info!(chunks = chunks.len(), "volume split into chunks");
    }
    ctx.unstage(&request.output);

    Ok(())
}

/// Expands one encrypted chunk into Reed-Solomon codewords. The final
/// sub-block of a partial chunk is padded to the codec boundary first.
fn rs_pack(codecs: &CodecSet, chunk: &[u8]) -> Result<Vec<u8>> {
    let mut packed = Vec::with_capacity(chunk.len() / RS_DATA_SIZE * codecs.rs128.encoded_len() + codecs.rs128.encoded_len());
    let mut offset = 0;
    while offset < chunk.len() {
        if offset + RS_DATA_SIZE <= chunk.len() {
            packed.extend_from_slice(&codecs.rs128.encode(&chunk[offset..offset + RS_DATA_SIZE])?);
        } else {
            let padded = padding::pad(&chunk[offset..]);
            packed.extend_from_slice(&codecs.rs128.encode(&padded)?);
        }
        offset += RS_DATA_SIZE;
    }
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rs_pack_expands_aligned_chunks() {
        let codecs = CodecSet::new();
        let chunk = vec![0xABu8; 4 * RS_DATA_SIZE];
        let packed = rs_pack(&codecs, &chunk).unwrap();
        assert_eq!(packed.len(), 4 * 136);
    }

    #[test]
    fn rs_pack_pads_the_tail() {
        let codecs = CodecSet::new();
        let chunk = vec![0xCDu8; 2 * RS_DATA_SIZE + 17];
        let packed = rs_pack(&codecs, &chunk).unwrap();
        assert_eq!(packed.len(), 3 * 136);

        // The tail block decodes to a padded sub-block.
        let (tail, damaged) = codecs.rs128.decode(&packed[2 * 136..], false).unwrap();
        assert!(!damaged);
        assert_eq!(crate::padding::unpad(&tail), &chunk[2 * RS_DATA_SIZE..]);
    }
}
