//! Password key derivation and secure randomness.
//!
//! Argon2id turns the password into the 32-byte master key. The parameter
//! set is fixed per mode (normal or paranoid) and recorded only through the
//! header's paranoid flag, so both sides must agree on the constants in
//! [`crate::config`].

use argon2::Algorithm::Argon2id;
use argon2::Version::V0x13;
use argon2::{Argon2, Params};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::{ArgonParams, ARGON_NORMAL, ARGON_PARANOID, ARGON_SALT_SIZE, KEY_SIZE};
use crate::error::{Error, Result};
use crate::secret::{Protected, SecretKey};

/// Returns the Argon2id parameter set for the requested mode.
pub fn params_for(paranoid: bool) -> ArgonParams {
    if paranoid {
        ARGON_PARANOID
    } else {
        ARGON_NORMAL
    }
}

/// Derives the 32-byte master key from a password and salt.
///
/// An all-zero result is rejected as hardware failure; a healthy KDF output
/// is never the zero string.
pub fn derive_key(password: &[u8], salt: &[u8; ARGON_SALT_SIZE], params: ArgonParams) -> Result<SecretKey> {
    let params = Params::new(params.memory_kib, params.passes, params.lanes, Some(KEY_SIZE))
        .map_err(|_| Error::CryptoFailure("invalid argon2 parameters"))?;
    let argon2 = Argon2::new(Argon2id, V0x13, params);

    let mut key = Protected::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(password, salt, key.expose_mut())
        .map_err(|_| Error::CryptoFailure("argon2 derivation failed"))?;

    if key.expose().iter().all(|&b| b == 0) {
        return Err(Error::CryptoFailure("argon2 returned all zeros"));
    }

    Ok(key)
}

/// Fills an array with cryptographically secure random bytes.
///
/// An all-zero fill is rejected as hardware failure, same policy as
/// [`derive_key`].
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| Error::CryptoFailure("system rng unavailable"))?;

    if bytes.iter().all(|&b| b == 0) {
        return Err(Error::CryptoFailure("rng returned all zeros"));
    }

    Ok(bytes)
}
