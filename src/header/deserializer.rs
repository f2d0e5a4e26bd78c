//! Header parsing with error accumulation and raw-field preservation.
//!
//! The reader consumes fields in wire order, full-decoding every codeword.
//! Uncorrectable damage on any field does not stop the parse; it is folded
//! into a single `damaged` flag so force-mode callers can still attempt the
//! payload. The exception is the comment-length field: if it cannot be
//! parsed as five ASCII digits, no later field offset is knowable and the
//! header is rejected outright.
//!
//! Alongside the parsed header, the exact post-decode bytes of every field
//! are preserved. The v2 header MAC is computed over those bytes and must
//! agree bit-for-bit with what the writer signed, so verification never goes
//! through re-serialization.

use std::io::Read;

use crate::config::{
    ARGON_SALT_SIZE, AUTH_TAG_SIZE, COMMENT_LEN_SIZE, FINGERPRINT_SIZE, FLAGS_SIZE, HKDF_SALT_SIZE, KEY_REF_SIZE,
    NONCE_SIZE, OUTER_IV_SIZE, VERSION_SIZE,
};
use crate::error::{Error, Result};
use crate::fec::{Codec, CodecSet};
use crate::header::{mac_message, version_valid, Flags, VolumeHeader};

/// Exact post-Reed-Solomon bytes of every header field.
pub struct RawFields {
    pub version: [u8; VERSION_SIZE],
    pub comment_len: [u8; COMMENT_LEN_SIZE],
    pub comments: Vec<u8>,
    pub flags: [u8; FLAGS_SIZE],
    pub argon_salt: [u8; ARGON_SALT_SIZE],
    pub hkdf_salt: [u8; HKDF_SALT_SIZE],
    pub outer_iv: [u8; OUTER_IV_SIZE],
    pub nonce: [u8; NONCE_SIZE],
    pub key_ref: [u8; KEY_REF_SIZE],
    pub keyfile_fingerprint: [u8; FINGERPRINT_SIZE],
    pub auth_tag: [u8; AUTH_TAG_SIZE],
}

impl RawFields {
    /// The header-MAC input, byte-for-byte as read off the volume.
    #[must_use]
    pub fn mac_message(&self) -> Vec<u8> {
        mac_message(
            &self.version,
            &self.comment_len,
            &self.comments,
            &self.flags,
            &self.argon_salt,
            &self.hkdf_salt,
            &self.outer_iv,
            &self.nonce,
            &self.keyfile_fingerprint,
        )
    }
}

/// A fully-read header: parsed view, raw bytes, and accumulated damage.
pub struct ParsedHeader {
    pub header: VolumeHeader,
    pub raw: RawFields,
    /// True when any field held uncorrectable Reed-Solomon errors.
    pub damaged: bool,
}

/// Header reader over a [`CodecSet`].
pub struct Deserializer<'a> {
    codecs: &'a CodecSet,
}

impl<'a> Deserializer<'a> {
    #[inline]
    #[must_use]
    pub const fn new(codecs: &'a CodecSet) -> Self {
        Self { codecs }
    }

    /// Reads and decodes one header, consuming exactly its encoded length
    /// from `reader`.
    pub fn deserialize<R: Read>(&self, reader: &mut R) -> Result<ParsedHeader> {
        let codecs = self.codecs;
        let mut damaged = false;

        let version: [u8; VERSION_SIZE] = self.read_field(reader, &codecs.rs5, &mut damaged)?;
        let comment_len: [u8; COMMENT_LEN_SIZE] = self.read_field(reader, &codecs.rs5, &mut damaged)?;

        // Without a readable length the remaining offsets are unknowable;
        // this is the one non-recoverable parse failure.
        let comments_len = parse_comment_len(&comment_len).ok_or(Error::CorruptHeader)?;

        let mut comments = Vec::with_capacity(comments_len);
        let mut block = [0u8; 3];
        for _ in 0..comments_len {
            reader.read_exact(&mut block)?;
            let (byte, byte_damaged) = codecs.rs1.decode(&block, false)?;
            damaged |= byte_damaged;
            comments.push(byte[0]);
        }

        let flags: [u8; FLAGS_SIZE] = self.read_field(reader, &codecs.rs5, &mut damaged)?;
        let argon_salt: [u8; ARGON_SALT_SIZE] = self.read_field(reader, &codecs.rs16, &mut damaged)?;
        let hkdf_salt: [u8; HKDF_SALT_SIZE] = self.read_field(reader, &codecs.rs32, &mut damaged)?;
        let outer_iv: [u8; OUTER_IV_SIZE] = self.read_field(reader, &codecs.rs16, &mut damaged)?;
        let nonce: [u8; NONCE_SIZE] = self.read_field(reader, &codecs.rs24, &mut damaged)?;
        let key_ref: [u8; KEY_REF_SIZE] = self.read_field(reader, &codecs.rs64, &mut damaged)?;
        let keyfile_fingerprint: [u8; FINGERPRINT_SIZE] = self.read_field(reader, &codecs.rs32, &mut damaged)?;
        let auth_tag: [u8; AUTH_TAG_SIZE] = self.read_field(reader, &codecs.rs64, &mut damaged)?;

        if !version_valid(&version) {
            // An undecodable version is corruption; a well-recovered but
            // unrecognized one is a format mismatch.
            return if damaged {
                Err(Error::CorruptHeader)
            } else {
                Err(Error::InvalidInput(format!("unrecognized version field {:?}", String::from_utf8_lossy(&version))))
            };
        }

        let raw = RawFields {
            version,
            comment_len,
            comments: comments.clone(),
            flags,
            argon_salt,
            hkdf_salt,
            outer_iv,
            nonce,
            key_ref,
            keyfile_fingerprint,
            auth_tag,
        };

        let header = VolumeHeader {
            version,
            comments,
            flags: Flags::from_bytes(&flags),
            argon_salt,
            hkdf_salt,
            outer_iv,
            nonce,
            key_ref,
            keyfile_fingerprint,
            auth_tag,
        };

        Ok(ParsedHeader { header, raw, damaged })
    }

    /// Reads one encoded field and full-decodes it into a fixed-size array.
    fn read_field<R: Read, const N: usize>(&self, reader: &mut R, codec: &Codec, damaged: &mut bool) -> Result<[u8; N]> {
        debug_assert_eq!(codec.data_len(), N);
        let mut encoded = vec![0u8; codec.encoded_len()];
        reader.read_exact(&mut encoded)?;
        let (decoded, field_damaged) = codec.decode(&encoded, false)?;
        *damaged |= field_damaged;

        let mut out = [0u8; N];
        out.copy_from_slice(&decoded);
        Ok(out)
    }
}

/// Parses the five-digit ASCII comment length.
fn parse_comment_len(field: &[u8; COMMENT_LEN_SIZE]) -> Option<usize> {
    if !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut len = 0usize;
    for &digit in field {
        len = len * 10 + (digit - b'0') as usize;
    }
    Some(len)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::header::Serializer;

    use super::*;

    fn sample_header(comments: Vec<u8>) -> VolumeHeader {
        let mut header = VolumeHeader::new(
            comments,
            Flags { paranoid: true, payload_rs: true, ..Flags::default() },
            [10u8; ARGON_SALT_SIZE],
            [20u8; HKDF_SALT_SIZE],
            [30u8; OUTER_IV_SIZE],
            [40u8; NONCE_SIZE],
        );
        header.key_ref = [50u8; KEY_REF_SIZE];
        header.keyfile_fingerprint = [60u8; FINGERPRINT_SIZE];
        header.auth_tag = [70u8; AUTH_TAG_SIZE];
        header
    }

    fn roundtrip(header: &VolumeHeader) -> ParsedHeader {
        let codecs = CodecSet::new();
        let bytes = Serializer::new(&codecs).serialize(header).unwrap();
        Deserializer::new(&codecs).deserialize(&mut Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn roundtrip_preserves_every_field() {
        let header = sample_header(b"some comment".to_vec());
        let parsed = roundtrip(&header);

        assert!(!parsed.damaged);
        assert_eq!(parsed.header.version, header.version);
        assert_eq!(parsed.header.comments, header.comments);
        assert_eq!(parsed.header.flags, header.flags);
        assert_eq!(parsed.header.argon_salt, header.argon_salt);
        assert_eq!(parsed.header.hkdf_salt, header.hkdf_salt);
        assert_eq!(parsed.header.outer_iv, header.outer_iv);
        assert_eq!(parsed.header.nonce, header.nonce);
        assert_eq!(parsed.header.key_ref, header.key_ref);
        assert_eq!(parsed.header.keyfile_fingerprint, header.keyfile_fingerprint);
        assert_eq!(parsed.header.auth_tag, header.auth_tag);
    }

    #[test]
    fn comments_survive_embedded_nulls() {
        let header = sample_header(vec![0x00, 0xFF, 0x00, b'x', 0x00]);
        let parsed = roundtrip(&header);
        assert_eq!(parsed.header.comments, header.comments);
    }

    #[test]
    fn raw_mac_message_matches_writer_side() {
        let header = sample_header(b"audit".to_vec());
        let parsed = roundtrip(&header);
        assert_eq!(parsed.raw.mac_message(), header.mac_message());
    }

    #[test]
    fn correctable_corruption_is_transparent() {
        let codecs = CodecSet::new();
        let header = sample_header(b"x".to_vec());
        let mut bytes = Serializer::new(&codecs).serialize(&header).unwrap();
        // Flip a few bytes inside the nonce field, within codec capacity.
        let nonce_offset = 15 + 15 + 3 + 15 + 48 + 96 + 48;
        for i in 0..3 {
            bytes[nonce_offset + i * 7] ^= 0xFF;
        }

        let parsed = Deserializer::new(&codecs).deserialize(&mut Cursor::new(bytes)).unwrap();
        assert!(!parsed.damaged);
        assert_eq!(parsed.header.nonce, header.nonce);
    }

    #[test]
    fn heavy_corruption_sets_damaged_but_parses() {
        let codecs = CodecSet::new();
        let header = sample_header(Vec::new());
        let mut bytes = Serializer::new(&codecs).serialize(&header).unwrap();
        // Destroy most of the auth-tag field (offset 597, 192 bytes).
        for byte in bytes.iter_mut().skip(597).take(150) {
            *byte ^= 0xA5;
        }

        let parsed = Deserializer::new(&codecs).deserialize(&mut Cursor::new(bytes)).unwrap();
        assert!(parsed.damaged);
        assert_eq!(parsed.header.nonce, header.nonce);
    }

    #[test]
    fn unparseable_comment_length_is_corrupt_header() {
        let codecs = CodecSet::new();
        let header = sample_header(Vec::new());
        let mut bytes = Serializer::new(&codecs).serialize(&header).unwrap();
        // Obliterate the whole comment-length codeword (offset 15..30) so
        // decoding cannot recover digits.
        for (i, byte) in bytes.iter_mut().skip(15).take(15).enumerate() {
            *byte = b'A' + (i as u8 % 26);
        }
        let result = Deserializer::new(&codecs).deserialize(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(Error::CorruptHeader)));
    }

    #[test]
    fn comment_len_parser() {
        assert_eq!(parse_comment_len(b"00000"), Some(0));
        assert_eq!(parse_comment_len(b"00042"), Some(42));
        assert_eq!(parse_comment_len(b"99999"), Some(99_999));
        assert_eq!(parse_comment_len(b"0004x"), None);
    }
}
