//! The streaming cipher stack.
//!
//! One [`CipherSuite`] owns everything that touches payload bytes: the
//! XChaCha20 keystream, the optional Serpent-CTR outer layer (paranoid
//! mode), and the payload MAC accumulator. Step order is part of the format
//! and is not commutable:
//!
//! - encrypt: outer cipher, then XChaCha20, then MAC over the ciphertext.
//! - decrypt: MAC over the received ciphertext, then XChaCha20, then the
//!   outer cipher.
//!
//! After every 60 GiB of processed payload the suite pulls a fresh nonce and
//! IV from the subkey stream and rebuilds both keystreams with the same
//! keys, keeping each cipher inside its safe counter range.

use chacha20::XChaCha20;
use cipher::{InnerIvInit, KeyInit, KeyIvInit, StreamCipher, StreamCipherCoreWrapper};
use ctr::flavors::Ctr128BE;
use ctr::CtrCore;
use serpent::Serpent;
use tracing::debug;

use crate::config::{KEY_SIZE, NONCE_SIZE, OUTER_IV_SIZE, REKEY_INTERVAL};
use crate::crypto::mac::PayloadMac;
use crate::crypto::subkeys::SubkeyStream;
use crate::error::{Error, Result};
use crate::secret::{Protected, SecretKey};

type SerpentCtr = StreamCipherCoreWrapper<CtrCore<Serpent, Ctr128BE>>;

/// Stateful processor for one volume's payload stream.
pub struct CipherSuite {
    chacha: XChaCha20,
    outer: Option<SerpentCtr>,
    mac: PayloadMac,
    key: SecretKey,
    outer_key: SecretKey,
    processed: u64,
}

impl CipherSuite {
    /// Assembles the suite from the cipher key, header nonce/IV, and the
    /// subkeys read from the HKDF stream. The outer key is always supplied
    /// (the stream yields it unconditionally); it is only used when
    /// `paranoid` is set.
    pub fn new(
        key: SecretKey,
        nonce: &[u8; NONCE_SIZE],
        mac_key: &Protected<[u8; KEY_SIZE]>,
        outer_key: SecretKey,
        outer_iv: &[u8; OUTER_IV_SIZE],
        paranoid: bool,
    ) -> Result<Self> {
        let chacha = make_chacha(&key, nonce);
        let outer = if paranoid { Some(make_outer(&outer_key, outer_iv)?) } else { None };
        let mac = PayloadMac::new(mac_key.expose(), paranoid)?;

        Ok(Self { chacha, outer, mac, key, outer_key, processed: 0 })
    }

    /// Encrypts one chunk in place and absorbs the resulting ciphertext into
    /// the MAC. Chunks must not span the rekey boundary; the pipeline's
    /// 1 MiB chunking guarantees that.
    pub fn encrypt_chunk(&mut self, data: &mut [u8], subkeys: &mut SubkeyStream) -> Result<()> {
        if let Some(outer) = &mut self.outer {
            outer.apply_keystream(data);
        }
        self.chacha.apply_keystream(data);
        self.mac.update(data);
        self.advance(data.len() as u64, subkeys)
    }

    /// Absorbs one chunk of received ciphertext into the MAC, then decrypts
    /// it in place.
    pub fn decrypt_chunk(&mut self, data: &mut [u8], subkeys: &mut SubkeyStream) -> Result<()> {
        self.mac.update(data);
        self.chacha.apply_keystream(data);
        if let Some(outer) = &mut self.outer {
            outer.apply_keystream(data);
        }
        self.advance(data.len() as u64, subkeys)
    }

    /// Consumes the suite and returns the payload auth tag.
    #[must_use]
    pub fn finalize(self) -> [u8; crate::config::AUTH_TAG_SIZE] {
        self.mac.finalize()
    }

    fn advance(&mut self, len: u64, subkeys: &mut SubkeyStream) -> Result<()> {
        self.processed += len;
        if self.processed >= REKEY_INTERVAL {
            self.rekey(subkeys)?;
            self.processed = 0;
        }
        Ok(())
    }

    /// Rebuilds both keystreams with fresh nonce/IV from the subkey stream.
    fn rekey(&mut self, subkeys: &mut SubkeyStream) -> Result<()> {
        let (nonce, iv) = subkeys.rekey_values()?;
        self.chacha = make_chacha(&self.key, &nonce);
        if self.outer.is_some() {
            self.outer = Some(make_outer(&self.outer_key, &iv)?);
        }
        debug!(cycle = subkeys.cycles(), "refreshed cipher nonce and iv");
        Ok(())
    }
}

fn make_chacha(key: &SecretKey, nonce: &[u8; NONCE_SIZE]) -> XChaCha20 {
    XChaCha20::new(key.expose().into(), nonce.into())
}

/// Serpent takes 128-256 bit keys; the block cipher is built first so the
/// 32-byte key bypasses the nominal CTR key-size check.
fn make_outer(key: &SecretKey, iv: &[u8; OUTER_IV_SIZE]) -> Result<SerpentCtr> {
    let serpent = Serpent::new_from_slice(key.expose())
        .map_err(|_| Error::CryptoFailure("serpent key rejected"))?;
    let core = CtrCore::inner_iv_slice_init(serpent, iv)
        .map_err(|_| Error::CryptoFailure("serpent iv rejected"))?;
    Ok(SerpentCtr::from_core(core))
}

#[cfg(test)]
mod tests {
    use crate::config::HKDF_SALT_SIZE;

    use super::*;

    fn subkeys() -> SubkeyStream {
        let key = Protected::new([0x42u8; KEY_SIZE]);
        SubkeyStream::new(&key, &[0x24u8; HKDF_SALT_SIZE], true).unwrap()
    }

    fn suite(paranoid: bool) -> (CipherSuite, SubkeyStream) {
        let mut stream = subkeys();
        let mac_key = stream.mac_subkey().unwrap();
        let outer_key = stream.outer_key().unwrap();
        let suite = CipherSuite::new(
            Protected::new([0x01u8; KEY_SIZE]),
            &[0x02u8; NONCE_SIZE],
            &mac_key,
            outer_key,
            &[0x03u8; OUTER_IV_SIZE],
            paranoid,
        )
        .unwrap();
        (suite, stream)
    }

    #[test]
    fn roundtrip_restores_plaintext() {
        for paranoid in [false, true] {
            let plaintext: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

            let (mut enc, mut enc_keys) = suite(paranoid);
            let mut data = plaintext.clone();
            enc.encrypt_chunk(&mut data, &mut enc_keys).unwrap();
            assert_ne!(data, plaintext);
            let enc_tag = enc.finalize();

            let (mut dec, mut dec_keys) = suite(paranoid);
            dec.decrypt_chunk(&mut data, &mut dec_keys).unwrap();
            assert_eq!(data, plaintext);
            assert_eq!(dec.finalize(), enc_tag);
        }
    }

    #[test]
    fn paranoid_layer_changes_ciphertext() {
        let plaintext = vec![0u8; 256];

        let (mut normal, mut normal_keys) = suite(false);
        let mut a = plaintext.clone();
        normal.encrypt_chunk(&mut a, &mut normal_keys).unwrap();

        let (mut paranoid, mut paranoid_keys) = suite(true);
        let mut b = plaintext;
        paranoid.encrypt_chunk(&mut b, &mut paranoid_keys).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn tag_covers_ciphertext_not_plaintext() {
        // Tampering with ciphertext after encryption must change the
        // decryptor's computed tag.
        let (mut enc, mut enc_keys) = suite(false);
        let mut data = vec![7u8; 128];
        enc.encrypt_chunk(&mut data, &mut enc_keys).unwrap();
        let good_tag = enc.finalize();

        data[64] ^= 0xFF;
        let (mut dec, mut dec_keys) = suite(false);
        dec.decrypt_chunk(&mut data, &mut dec_keys).unwrap();
        assert_ne!(dec.finalize(), good_tag);
    }
}
