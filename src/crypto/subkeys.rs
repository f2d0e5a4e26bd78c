//! The ordered HKDF subkey stream.
//!
//! All per-volume subkeys come from one HKDF-SHA3-256 stream, read in a
//! fixed order that both sides must follow exactly:
//!
//! - v2 volumes: 64-byte header subkey, 32-byte MAC subkey, 32-byte outer
//!   cipher key, then 24+16 bytes per rekey cycle.
//! - v1 volumes: no header subkey; the stream starts at the MAC subkey.
//!
//! The reader is typed so each subkey can be taken at most once and only in
//! stream order; any violation is a programmer error and fails immediately.
//! The outer-cipher key is consumed even when the outer layer is disabled,
//! keeping the rekey cycle positions identical across modes.

use hkdf::Hkdf;
use sha3::Sha3_256;

use crate::config::{HEADER_SUBKEY_SIZE, HKDF_MAX_OUTPUT, HKDF_SALT_SIZE, KEY_SIZE, NONCE_SIZE, OUTER_IV_SIZE};
use crate::error::{Error, Result};
use crate::secret::{Protected, SecretKey};

/// Which subkey the stream will yield next.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    HeaderKey,
    MacKey,
    OuterKey,
    Rekey,
}

/// Sequential, order-enforcing reader over the HKDF output.
pub struct SubkeyStream {
    okm: Protected<Vec<u8>>,
    pos: usize,
    stage: Stage,
    cycles: u64,
}

impl SubkeyStream {
    /// Initializes the stream from the HKDF input key and the header's HKDF
    /// salt. With `legacy` set the v1 prefix is used (no header subkey).
    ///
    /// The entire expandable output (255 hash blocks) is materialized up
    /// front into a zeroized buffer; reads then just advance a cursor.
    pub fn new(key: &SecretKey, salt: &[u8; HKDF_SALT_SIZE], legacy: bool) -> Result<Self> {
        let hkdf = Hkdf::<Sha3_256>::new(Some(salt), key.expose());
        let mut okm = Protected::new(vec![0u8; HKDF_MAX_OUTPUT]);
        hkdf.expand(&[], okm.expose_mut())
            .map_err(|_| Error::CryptoFailure("hkdf expansion failed"))?;

        let stage = if legacy { Stage::MacKey } else { Stage::HeaderKey };
        Ok(Self { okm, pos: 0, stage, cycles: 0 })
    }

    /// The 64-byte key for the v2 header MAC. First read, v2 only.
    pub fn header_subkey(&mut self) -> Result<Protected<[u8; HEADER_SUBKEY_SIZE]>> {
        if self.stage != Stage::HeaderKey {
            return Err(Error::SubkeyOrder("header subkey must be the first and only first read"));
        }
        self.stage = Stage::MacKey;
        Ok(Protected::new(self.take()?))
    }

    /// The 32-byte payload MAC key. Must precede the outer key.
    pub fn mac_subkey(&mut self) -> Result<Protected<[u8; KEY_SIZE]>> {
        if self.stage != Stage::MacKey {
            return Err(Error::SubkeyOrder("mac subkey read out of order"));
        }
        self.stage = Stage::OuterKey;
        Ok(Protected::new(self.take()?))
    }

    /// The 32-byte outer-cipher key. Must precede any rekey values.
    pub fn outer_key(&mut self) -> Result<SecretKey> {
        if self.stage != Stage::OuterKey {
            return Err(Error::SubkeyOrder("outer key read out of order"));
        }
        self.stage = Stage::Rekey;
        Ok(Protected::new(self.take()?))
    }

    /// The next rekey cycle: a fresh XChaCha20 nonce and outer-cipher IV.
    pub fn rekey_values(&mut self) -> Result<([u8; NONCE_SIZE], [u8; OUTER_IV_SIZE])> {
        if self.stage != Stage::Rekey {
            return Err(Error::SubkeyOrder("rekey values requested before key setup"));
        }
        let nonce = self.take()?;
        let iv = self.take()?;
        self.cycles += 1;
        Ok((nonce, iv))
    }

    /// Number of completed rekey cycles.
    #[inline]
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Reads the next `N` bytes off the stream.
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        if end > self.okm.expose().len() {
            return Err(Error::CryptoFailure("subkey stream exhausted"));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.okm.expose()[self.pos..end]);
        self.pos = end;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(legacy: bool) -> SubkeyStream {
        let key = Protected::new([0x11u8; KEY_SIZE]);
        let salt = [0x22u8; HKDF_SALT_SIZE];
        SubkeyStream::new(&key, &salt, legacy).unwrap()
    }

    #[test]
    fn v2_order_is_enforced() {
        let mut s = stream(false);
        assert!(s.mac_subkey().is_err());
        assert!(s.outer_key().is_err());
        assert!(s.rekey_values().is_err());

        s.header_subkey().unwrap();
        assert!(s.header_subkey().is_err());

        s.mac_subkey().unwrap();
        assert!(s.mac_subkey().is_err());

        s.outer_key().unwrap();
        s.rekey_values().unwrap();
        s.rekey_values().unwrap();
        assert_eq!(s.cycles(), 2);
    }

    #[test]
    fn v1_stream_has_no_header_subkey() {
        let mut s = stream(true);
        assert!(s.header_subkey().is_err());
        s.mac_subkey().unwrap();
        s.outer_key().unwrap();
        s.rekey_values().unwrap();
    }

    #[test]
    fn v1_and_v2_share_tail_layout() {
        // With identical inputs, the v1 MAC subkey equals the first 32 bytes
        // of the stream, while v2 reads the 64-byte header subkey first.
        let mut v1 = stream(true);
        let mut v2 = stream(false);

        let header = v2.header_subkey().unwrap();
        let v1_mac = v1.mac_subkey().unwrap();
        let v2_mac = v2.mac_subkey().unwrap();

        assert_eq!(&v1_mac.expose()[..], &header.expose()[..KEY_SIZE]);
        assert_ne!(v1_mac.expose(), v2_mac.expose());
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let mut a = stream(false);
        let mut b = stream(false);
        a.header_subkey().unwrap();
        b.header_subkey().unwrap();
        assert_eq!(a.mac_subkey().unwrap().expose(), b.mac_subkey().unwrap().expose());
    }
}
