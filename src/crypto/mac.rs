//! Message authentication for header and payload.
//!
//! The payload MAC is a 64-byte tag over all ciphertext: keyed BLAKE2b-512
//! in normal mode, HMAC-SHA3-512 in paranoid mode. Which one is in use is
//! implied by the header's paranoid flag, never negotiated.
//!
//! The v2 header MAC is always HMAC-SHA3-512, keyed by the 64-byte header
//! subkey and computed over the raw header field bytes.

use blake2::Blake2bMac512;
use hmac::{Hmac, Mac};
use sha3::Sha3_512;
use subtle::ConstantTimeEq;

use crate::config::{AUTH_TAG_SIZE, HEADER_SUBKEY_SIZE, KEY_REF_SIZE, KEY_SIZE};
use crate::error::{Error, Result};

type HmacSha3_512 = Hmac<Sha3_512>;

/// Streaming payload MAC, one of two closed variants.
pub enum PayloadMac {
    /// Keyed BLAKE2b-512 (normal mode).
    Standard(Box<Blake2bMac512>),
    /// HMAC-SHA3-512 (paranoid mode).
    Paranoid(Box<HmacSha3_512>),
}

impl PayloadMac {
    /// Creates the MAC for the given mode, keyed by the MAC subkey.
    pub fn new(key: &[u8; KEY_SIZE], paranoid: bool) -> Result<Self> {
        if paranoid {
            let mac = HmacSha3_512::new_from_slice(key)
                .map_err(|_| Error::CryptoFailure("hmac key rejected"))?;
            Ok(Self::Paranoid(Box::new(mac)))
        } else {
            let mac = Blake2bMac512::new_from_slice(key)
                .map_err(|_| Error::CryptoFailure("blake2b key rejected"))?;
            Ok(Self::Standard(Box::new(mac)))
        }
    }

    /// Absorbs ciphertext.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Standard(mac) => Mac::update(mac.as_mut(), data),
            Self::Paranoid(mac) => Mac::update(mac.as_mut(), data),
        }
    }

    /// Produces the 64-byte auth tag, consuming the accumulator.
    #[must_use]
    pub fn finalize(self) -> [u8; AUTH_TAG_SIZE] {
        let mut tag = [0u8; AUTH_TAG_SIZE];
        match self {
            Self::Standard(mac) => tag.copy_from_slice(&mac.finalize().into_bytes()),
            Self::Paranoid(mac) => tag.copy_from_slice(&mac.finalize().into_bytes()),
        }
        tag
    }
}

/// Computes the v2 header MAC over the concatenated raw field bytes.
pub fn header_mac(subkey: &[u8; HEADER_SUBKEY_SIZE], fields: &[&[u8]]) -> Result<[u8; KEY_REF_SIZE]> {
    let mut mac = HmacSha3_512::new_from_slice(subkey)
        .map_err(|_| Error::CryptoFailure("header mac key rejected"))?;
    for field in fields {
        Mac::update(&mut mac, field);
    }

    let mut out = [0u8; KEY_REF_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Constant-time tag comparison.
#[must_use]
pub fn verify_tags(expected: &[u8], actual: &[u8]) -> bool {
    expected.len() == actual.len() && bool::from(expected.ct_eq(actual))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_disagree() {
        let key = [9u8; KEY_SIZE];
        let mut standard = PayloadMac::new(&key, false).unwrap();
        let mut paranoid = PayloadMac::new(&key, true).unwrap();
        standard.update(b"ciphertext");
        paranoid.update(b"ciphertext");
        assert_ne!(standard.finalize(), paranoid.finalize());
    }

    #[test]
    fn tag_is_deterministic_and_streaming() {
        let key = [3u8; KEY_SIZE];
        let mut whole = PayloadMac::new(&key, false).unwrap();
        whole.update(b"hello world");

        let mut split = PayloadMac::new(&key, false).unwrap();
        split.update(b"hello ");
        split.update(b"world");

        assert_eq!(whole.finalize(), split.finalize());
    }

    #[test]
    fn header_mac_binds_every_field() {
        let subkey = [5u8; HEADER_SUBKEY_SIZE];
        let a = header_mac(&subkey, &[b"v2.01", b"00000"]).unwrap();
        let b = header_mac(&subkey, &[b"v2.01", b"00001"]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_is_length_sensitive() {
        let tag = [1u8; AUTH_TAG_SIZE];
        assert!(verify_tags(&tag, &tag));
        assert!(!verify_tags(&tag, &tag[..32]));
        let mut other = tag;
        other[63] ^= 1;
        assert!(!verify_tags(&tag, &other));
    }
}
