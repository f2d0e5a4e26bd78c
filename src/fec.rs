//! Reed-Solomon forward error correction.
//!
//! The volume format uses seven fixed systematic codecs, one per header field
//! size plus the payload sub-block codec. Each codec turns a `k`-byte block
//! into an `n`-byte codeword whose first `k` bytes are the data itself, and
//! can correct up to `(n - k) / 2` corrupted bytes at unknown positions.
//!
//! Decoding never hard-fails on damage: when a codeword is beyond repair the
//! raw first `k` bytes are returned alongside a damage marker so force-mode
//! callers can push through.

use reed_solomon::{Decoder, Encoder};

use crate::error::{Error, Result};

/// One fixed-geometry Reed-Solomon codec.
pub struct Codec {
    data_len: usize,
    encoded_len: usize,
    encoder: Encoder,
    decoder: Decoder,
}

impl Codec {
    /// Builds the codec for `data_len` raw bytes and `encoded_len` codeword
    /// bytes. Geometry is fixed at compile time by [`CodecSet`].
    fn new(data_len: usize, encoded_len: usize) -> Self {
        let parity = encoded_len - data_len;
        Self { data_len, encoded_len, encoder: Encoder::new(parity), decoder: Decoder::new(parity) }
    }

    /// Raw block size accepted by [`Codec::encode`].
    #[inline]
    #[must_use]
    pub const fn data_len(&self) -> usize {
        self.data_len
    }

    /// Codeword size produced by [`Codec::encode`].
    #[inline]
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// Encodes one raw block into a codeword.
    ///
    /// # Errors
    /// Only on a caller bug: `block` must be exactly [`Codec::data_len`]
    /// bytes.
    pub fn encode(&self, block: &[u8]) -> Result<Vec<u8>> {
        if block.len() != self.data_len {
            return Err(Error::InvalidInput(format!(
                "fec encode: expected {} bytes, got {}",
                self.data_len,
                block.len()
            )));
        }
        Ok(self.encoder.encode(block).to_vec())
    }

    /// Decodes one codeword back into its raw block.
    ///
    /// With `fast` set the first `data_len` bytes are returned verbatim with
    /// no verification; the payload path uses this because the common case is
    /// an undamaged volume and full decoding is expensive.
    ///
    /// Returns the recovered block plus a flag that is `true` when the
    /// codeword held uncorrectable errors (in which case the block is the raw
    /// data portion, possibly corrupt).
    pub fn decode(&self, block: &[u8], fast: bool) -> Result<(Vec<u8>, bool)> {
        if block.len() != self.encoded_len {
            return Err(Error::InvalidInput(format!(
                "fec decode: expected {} bytes, got {}",
                self.encoded_len,
                block.len()
            )));
        }

        if fast || !self.decoder.is_corrupted(block) {
            return Ok((block[..self.data_len].to_vec(), false));
        }

        match self.decoder.correct(block, None) {
            Ok(fixed) => Ok((fixed.data().to_vec(), false)),
            // Beyond repair: hand back the systematic prefix and let the
            // caller decide whether to force through.
            Err(_) => Ok((block[..self.data_len].to_vec(), true)),
        }
    }
}

/// The seven codecs used across the header and payload.
pub struct CodecSet {
    /// (1, 3) - one codec block per comment byte.
    pub rs1: Codec,
    /// (5, 15) - version, comment length, flags.
    pub rs5: Codec,
    /// (16, 48) - Argon2 salt, outer-cipher IV.
    pub rs16: Codec,
    /// (24, 72) - XChaCha20 nonce.
    pub rs24: Codec,
    /// (32, 96) - HKDF salt, keyfile fingerprint.
    pub rs32: Codec,
    /// (64, 192) - key reference, auth tag.
    pub rs64: Codec,
    /// (128, 136) - payload sub-blocks.
    pub rs128: Codec,
}

impl CodecSet {
    /// Builds all seven codecs. Not `const`: the underlying encoder and
    /// decoder tables are computed at run time.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            rs1: Codec::new(1, 3),
            rs5: Codec::new(5, 15),
            rs16: Codec::new(16, 48),
            rs24: Codec::new(24, 72),
            rs32: Codec::new(32, 96),
            rs64: Codec::new(64, 192),
            rs128: Codec::new(128, 136),
        }
    }
}

impl Default for CodecSet {
    fn default() -> Self {
        Self::new()
    }
}
