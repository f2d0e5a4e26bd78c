//! Zeroize-on-drop containers for key material.
//!
//! Every derived key, subkey and keystream seed in the pipeline lives inside
//! [`Protected`], which overwrites its contents with zeros on every exit path
//! (success, error, cancellation, unwind). Debug output is redacted so key
//! bytes cannot leak through logging.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::ops::Deref;

use zeroize::Zeroize;

/// Owning wrapper that zeroizes its contents on drop.
#[derive(Clone)]
pub struct Protected<T>
where
    T: Zeroize,
{
    data: T,
}

impl<T> Protected<T>
where
    T: Zeroize,
{
    /// Takes ownership of `value`; it is wiped when the wrapper drops.
    #[inline]
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { data: value }
    }

    /// Read access to the protected value.
    #[inline]
    #[must_use]
    pub const fn expose(&self) -> &T {
        &self.data
    }

    /// Mutable access, for in-place derivation into the buffer.
    #[inline]
    #[must_use]
    pub fn expose_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T> Deref for Protected<T>
where
    T: Zeroize,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> Drop for Protected<T>
where
    T: Zeroize,
{
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl<T> Debug for Protected<T>
where
    T: Zeroize,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("[REDACTED]")
    }
}

/// A protected 32-byte symmetric key.
pub type SecretKey = Protected<[u8; crate::config::KEY_SIZE]>;

/// XORs `other` into `key` in place. Used to fold the keyfile key into the
/// password key; a no-op when `other` is all zeros.
pub fn xor_keys(key: &mut SecretKey, other: &SecretKey) {
    let dst = key.expose_mut();
    for (d, s) in dst.iter_mut().zip(other.expose().iter()) {
        *d ^= s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let secret = Protected::new([0xAAu8; 32]);
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
    }

    #[test]
    fn xor_with_zeros_is_identity() {
        let mut key = Protected::new([0x5Au8; 32]);
        let zeros = Protected::new([0u8; 32]);
        xor_keys(&mut key, &zeros);
        assert_eq!(*key.expose(), [0x5Au8; 32]);
    }

    #[test]
    fn xor_folds_both_inputs() {
        let mut key = Protected::new([0b1100_0011u8; 32]);
        let other = Protected::new([0b0101_0101u8; 32]);
        xor_keys(&mut key, &other);
        assert_eq!(key.expose()[0], 0b1001_0110);
    }
}
