//! Ephemeral cipher hook for the multi-file packer.
//!
//! When several inputs are combined into one archive before encryption, the
//! intermediate stream must not hit disk in the clear. The packer wraps its
//! reader with an [`EphemeralCipher`]: XChaCha20 under a random key that
//! exists only in this process's memory and is wiped on drop. The same
//! wrapper both applies and strips the layer, since the keystream is XOR.

use std::io::{Read, Result as IoResult};

use chacha20::XChaCha20;
use cipher::{KeyIvInit, StreamCipher};

use crate::config::{KEY_SIZE, NONCE_SIZE};
use crate::crypto::derive::random_bytes;
use crate::error::Result;
use crate::secret::{Protected, SecretKey};

/// A random one-shot key for wrapping intermediate streams.
pub struct EphemeralCipher {
    key: SecretKey,
    nonce: [u8; NONCE_SIZE],
}

impl EphemeralCipher {
    /// Samples a fresh key and nonce.
    pub fn generate() -> Result<Self> {
        Ok(Self { key: Protected::new(random_bytes::<KEY_SIZE>()?), nonce: random_bytes()? })
    }

    /// Wraps `inner` so every byte read through it is XORed with the
    /// keystream. Wrapping an already-wrapped stream with the same cipher
    /// state restores the original bytes.
    #[must_use]
    pub fn wrap_reader<R: Read>(&self, inner: R) -> EphemeralReader<R> {
        EphemeralReader { inner, cipher: XChaCha20::new(self.key.expose().into(), (&self.nonce).into()) }
    }
}

/// A [`Read`] adapter applying the ephemeral keystream.
pub struct EphemeralReader<R> {
    inner: R,
    cipher: XChaCha20,
}

impl<R: Read> Read for EphemeralReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}
