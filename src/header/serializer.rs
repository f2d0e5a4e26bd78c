//! Header serialization with per-field Reed-Solomon encoding.
//!
//! The writer emits every field in wire order, encoding each with the codec
//! matching its raw size. During encryption the three authentication fields
//! (key reference, keyfile fingerprint, auth tag) are whatever the in-memory
//! header holds (zeros) and their final values are patched in by
//! positioned writes once the payload stream has finished.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

use crate::config::MAX_COMMENT_LEN;
use crate::error::{Error, Result};
use crate::fec::CodecSet;
use crate::header::VolumeHeader;

/// Byte offset of the key-reference field for a given comment length.
const fn key_ref_offset(comment_len: usize) -> u64 {
    // version(15) + comment-length(15) + comments(3N) + flags(15)
    // + argon salt(48) + hkdf salt(96) + outer iv(48) + nonce(72)
    309 + 3 * comment_len as u64
}

/// Header writer over a [`CodecSet`].
pub struct Serializer<'a> {
    codecs: &'a CodecSet,
}

impl<'a> Serializer<'a> {
    #[inline]
    #[must_use]
    pub const fn new(codecs: &'a CodecSet) -> Self {
        Self { codecs }
    }

    /// Serializes the full header to its on-disk form.
    pub fn serialize(&self, header: &VolumeHeader) -> Result<Vec<u8>> {
        if header.comments.len() > MAX_COMMENT_LEN {
            return Err(Error::InvalidInput(format!(
                "comments are {} bytes; the header can carry at most {}",
                header.comments.len(),
                MAX_COMMENT_LEN
            )));
        }

        let codecs = self.codecs;
        let mut out = Vec::with_capacity(header.encoded_len() as usize);

        out.extend_from_slice(&codecs.rs5.encode(&header.version)?);
        out.extend_from_slice(&codecs.rs5.encode(&header.comment_len_field())?);
        for byte in &header.comments {
            out.extend_from_slice(&codecs.rs1.encode(std::slice::from_ref(byte))?);
        }
        out.extend_from_slice(&codecs.rs5.encode(&header.flags.to_bytes())?);
        out.extend_from_slice(&codecs.rs16.encode(&header.argon_salt)?);
        out.extend_from_slice(&codecs.rs32.encode(&header.hkdf_salt)?);
        out.extend_from_slice(&codecs.rs16.encode(&header.outer_iv)?);
        out.extend_from_slice(&codecs.rs24.encode(&header.nonce)?);
        out.extend_from_slice(&codecs.rs64.encode(&header.key_ref)?);
        out.extend_from_slice(&codecs.rs32.encode(&header.keyfile_fingerprint)?);
        out.extend_from_slice(&codecs.rs64.encode(&header.auth_tag)?);

        debug_assert_eq!(out.len() as u64, header.encoded_len());
        Ok(out)
    }

    /// Overwrites the three authentication fields in an already-written
    /// header by positioned writes. `comment_len` must match the length the
    /// header was serialized with.
    pub fn patch_auth_fields(
        &self,
        file: &mut File,
        comment_len: usize,
        key_ref: &[u8; crate::config::KEY_REF_SIZE],
        fingerprint: &[u8; crate::config::FINGERPRINT_SIZE],
        auth_tag: &[u8; crate::config::AUTH_TAG_SIZE],
    ) -> Result<()> {
        let offset = key_ref_offset(comment_len);

        // The three fields are adjacent, so one seek suffices.
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&self.codecs.rs64.encode(key_ref)?)?;
        file.write_all(&self.codecs.rs32.encode(fingerprint)?)?;
        file.write_all(&self.codecs.rs64.encode(auth_tag)?)?;

        Ok(())
    }
}
