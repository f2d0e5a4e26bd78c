//! Keyfile composition.
//!
//! One or more keyfiles combine into a single 32-byte key that is folded
//! into the cipher key, plus a fingerprint stored in the header so the
//! decryptor can tell a wrong keyfile from a wrong password.
//!
//! Two modes:
//! - unordered: each file is hashed independently and the digests are
//!   XOR-folded, so any permutation of the same set produces the same key.
//!   Two identical files cancel to zero; the encrypt pipeline rejects that.
//! - ordered: all files are fed through one running hash, so the sequence
//!   matters.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use sha3::{Digest, Sha3_256};

use crate::config::{FINGERPRINT_SIZE, KEY_SIZE};
use crate::error::{Error, Result};
use crate::secret::{Protected, SecretKey};

/// Read buffer for hashing keyfiles.
const HASH_BUF_SIZE: usize = 64 * 1024;

/// The composed keyfile key and its public fingerprint.
#[derive(Debug)]
pub struct ComposedKeyfiles {
    /// XOR-fold or chained SHA3-256 of the keyfile contents. All zeros when
    /// no keyfiles are in use.
    pub key: SecretKey,
    /// SHA3-256 of the composed key; all zeros when no keyfiles are in use.
    pub fingerprint: [u8; FINGERPRINT_SIZE],
}

impl ComposedKeyfiles {
    /// The all-zero composition used when no keyfiles are given.
    #[must_use]
    pub fn absent() -> Self {
        Self { key: Protected::new([0u8; KEY_SIZE]), fingerprint: [0u8; FINGERPRINT_SIZE] }
    }

    /// Whether the composed key is all zeros (absent, or cancelled-out
    /// duplicates in unordered mode).
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.key.expose().iter().all(|&b| b == 0)
    }
}

/// Composes the given keyfiles into a key and fingerprint.
pub fn compose(paths: &[PathBuf], ordered: bool) -> Result<ComposedKeyfiles> {
    if paths.is_empty() {
        return Ok(ComposedKeyfiles::absent());
    }

    let mut combined = Protected::new([0u8; KEY_SIZE]);

    if ordered {
        let mut hasher = Sha3_256::new();
        for path in paths {
            hash_file_into(path, &mut hasher)?;
        }
        combined.expose_mut().copy_from_slice(&hasher.finalize());
    } else {
        for path in paths {
            let mut hasher = Sha3_256::new();
            hash_file_into(path, &mut hasher)?;
            let digest = hasher.finalize();
            for (c, d) in combined.expose_mut().iter_mut().zip(digest.iter()) {
                *c ^= d;
            }
        }
    }

    let mut fingerprint = [0u8; FINGERPRINT_SIZE];
    fingerprint.copy_from_slice(&Sha3_256::digest(combined.expose()));

    Ok(ComposedKeyfiles { key: combined, fingerprint })
}

/// Streams one file into the hasher.
fn hash_file_into(path: &Path, hasher: &mut Sha3_256) -> Result<()> {
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            Error::InvalidInput(format!("keyfile not found: {}", path.display()))
        } else {
            Error::Io(e)
        }
    })?;

    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;

    fn write_keyfile(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    #[test]
    fn empty_list_is_all_zeros() {
        let composed = compose(&[], false).unwrap();
        assert!(composed.is_zero());
        assert_eq!(composed.fingerprint, [0u8; FINGERPRINT_SIZE]);
    }

    #[test]
    fn unordered_is_permutation_invariant() {
        let dir = tempdir().unwrap();
        let k1 = write_keyfile(dir.path(), "k1", b"first keyfile");
        let k2 = write_keyfile(dir.path(), "k2", b"second keyfile");

        let forward = compose(&[k1.clone(), k2.clone()], false).unwrap();
        let reversed = compose(&[k2, k1], false).unwrap();

        assert_eq!(forward.key.expose(), reversed.key.expose());
        assert_eq!(forward.fingerprint, reversed.fingerprint);
    }

    #[test]
    fn ordered_depends_on_sequence() {
        let dir = tempdir().unwrap();
        let k1 = write_keyfile(dir.path(), "k1", b"first keyfile");
        let k2 = write_keyfile(dir.path(), "k2", b"second keyfile");

        let forward = compose(&[k1.clone(), k2.clone()], true).unwrap();
        let reversed = compose(&[k2, k1], true).unwrap();

        assert_ne!(forward.fingerprint, reversed.fingerprint);
    }

    #[test]
    fn unordered_duplicates_cancel_to_zero() {
        let dir = tempdir().unwrap();
        let k = write_keyfile(dir.path(), "k", b"same bytes");
        let composed = compose(&[k.clone(), k], false).unwrap();
        assert!(composed.is_zero());
    }

    #[test]
    fn missing_keyfile_is_invalid_input() {
        let err = compose(&[PathBuf::from("/definitely/not/here")], false).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
