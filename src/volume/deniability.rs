//! The deniability wrapper.
//!
//! A finished volume can be wrapped in a stand-alone XChaCha20 layer:
//! `salt(16) ‖ nonce(24) ‖ keystream ⊕ volume`. The key comes from Argon2id
//! at normal-mode cost over a fresh salt. There is no MAC: the layer exists
//! so the file is indistinguishable from random bytes, not to add integrity
//! (the volume inside still carries its own).
//!
//! Every 60 GiB the nonce is replaced by SHA3-256 of the current nonce
//! truncated to 24 bytes, identically on both sides. A wrapped file is
//! recognized by its first 15 bytes failing to decode to a valid version
//! string.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chacha20::XChaCha20;
use cipher::{KeyIvInit, StreamCipher};
use secrecy::{ExposeSecret, SecretString};
use sha3::{Digest, Sha3_256};
use tracing::debug;

use crate::config::{ARGON_NORMAL, ARGON_SALT_SIZE, CHUNK_SIZE, NONCE_SIZE, REKEY_INTERVAL, VERSION_SIZE};
use crate::crypto::{derive_key, random_bytes};
use crate::error::Result;
use crate::fec::CodecSet;
use crate::header::version_valid;
use crate::secret::SecretKey;
use crate::volume::context::OperationContext;
use crate::volume::{check_cancelled, read_full, temp_path, Progress};

/// Encoded size of the version field, the detection window.
const VERSION_PEEK: usize = 3 * VERSION_SIZE;

/// Wraps the volume at `path` in place (via a staged temp file).
pub fn wrap(path: &Path, password: &SecretString, ctx: &mut OperationContext, progress: &dyn Progress) -> Result<()> {
    let salt: [u8; ARGON_SALT_SIZE] = random_bytes()?;
    let nonce: [u8; NONCE_SIZE] = random_bytes()?;
    let key = derive_key(password.expose_secret().as_bytes(), &salt, ARGON_NORMAL)?;

    let wrapped = temp_path(path);
    ctx.stage(wrapped.clone());
    {
        let mut reader = BufReader::new(File::open(path)?);
        let mut writer = BufWriter::new(File::create(&wrapped)?);
        writer.write_all(&salt)?;
        writer.write_all(&nonce)?;
        crypt_stream(&mut reader, &mut writer, &key, nonce, progress)?;
        writer.flush()?;
    }
    ctx.promote(&wrapped, path)?;
    debug!(path = %path.display(), "deniability layer applied");
    Ok(())
}

/// Strips the wrapper from `source` into `dest`.
pub fn unwrap(source: &Path, password: &SecretString, dest: &Path, progress: &dyn Progress) -> Result<()> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut salt = [0u8; ARGON_SALT_SIZE];
    let mut nonce = [0u8; NONCE_SIZE];
    reader.read_exact(&mut salt)?;
    reader.read_exact(&mut nonce)?;

    let key = derive_key(password.expose_secret().as_bytes(), &salt, ARGON_NORMAL)?;
    let mut writer = BufWriter::new(File::create(dest)?);
    crypt_stream(&mut reader, &mut writer, &key, nonce, progress)?;
    writer.flush()?;
    Ok(())
}

/// Detection heuristic: a file is wrapped when its first 15 bytes do not
/// decode to a plausible version string. Files too short to peek are
/// trivially not plain volumes.
pub fn is_wrapped(path: &Path, codecs: &CodecSet) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut peek = [0u8; VERSION_PEEK];
    if read_full(&mut file, &mut peek)? < VERSION_PEEK {
        return Ok(true);
    }

    let (decoded, damaged) = codecs.rs5.decode(&peek, false)?;
    let mut version = [0u8; VERSION_SIZE];
    version.copy_from_slice(&decoded);
    Ok(damaged || !version_valid(&version))
}

/// XORs the keystream over a whole stream, rotating the nonce every
/// [`REKEY_INTERVAL`] bytes. Symmetric, so it both applies and removes the
/// layer.
fn crypt_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    key: &SecretKey,
    mut nonce: [u8; NONCE_SIZE],
    progress: &dyn Progress,
) -> Result<()> {
    let mut cipher = XChaCha20::new(key.expose().into(), (&nonce).into());
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut since_rekey = 0u64;

    loop {
        check_cancelled(progress)?;
        let n = read_full(reader, &mut buf)?;
        if n == 0 {
            break;
        }

        cipher.apply_keystream(&mut buf[..n]);
        writer.write_all(&buf[..n])?;
        progress.update();

        since_rekey += n as u64;
        if since_rekey >= REKEY_INTERVAL {
            let mut next = [0u8; NONCE_SIZE];
            next.copy_from_slice(&Sha3_256::digest(nonce)[..NONCE_SIZE]);
            nonce = next;
            cipher = XChaCha20::new(key.expose().into(), (&nonce).into());
            since_rekey = 0;
        }

        if n < CHUNK_SIZE {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::secret::Protected;
    use crate::volume::NullProgress;

    use super::*;

    #[test]
    fn crypt_stream_is_symmetric() {
        let key = Protected::new([0x31u8; 32]);
        let nonce = [0x07u8; NONCE_SIZE];
        let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i % 255) as u8).collect();

        let mut wrapped = Vec::new();
        crypt_stream(&mut &plaintext[..], &mut wrapped, &key, nonce, &NullProgress).unwrap();
        assert_ne!(wrapped, plaintext);

        let mut unwrapped = Vec::new();
        crypt_stream(&mut &wrapped[..], &mut unwrapped, &key, nonce, &NullProgress).unwrap();
        assert_eq!(unwrapped, plaintext);
    }

    #[test]
    fn short_files_read_as_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub");
        fs::write(&path, b"tiny").unwrap();
        assert!(is_wrapped(&path, &CodecSet::new()).unwrap());
    }

    #[test]
    fn plain_header_prefix_reads_as_volume() {
        let codecs = CodecSet::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vol");
        let mut bytes = codecs.rs5.encode(b"v2.01").unwrap();
        bytes.extend_from_slice(&[0u8; 64]);
        fs::write(&path, &bytes).unwrap();
        assert!(!is_wrapped(&path, &codecs).unwrap());
    }
}
