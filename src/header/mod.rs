//! Volume header model and field layout.
//!
//! A `.pcv` header is a fixed sequence of fields, each independently
//! Reed-Solomon encoded with the codec matching its raw size:
//!
//! | Field | Raw | Encoded |
//! |---|---|---|
//! | Version | 5 | 15 |
//! | Comment length | 5 | 15 |
//! | Comments | N | 3N |
//! | Flags | 5 | 15 |
//! | Argon2 salt | 16 | 48 |
//! | HKDF salt | 32 | 96 |
//! | Outer-cipher IV | 16 | 48 |
//! | Nonce | 24 | 72 |
//! | Key reference | 64 | 192 |
//! | Keyfile fingerprint | 32 | 96 |
//! | Auth tag | 64 | 192 |
//!
//! A base header with no comments is exactly 789 bytes. The key-reference
//! field holds the header MAC on v2 volumes and SHA3-512 of the derived key
//! on legacy v1 volumes; the auth tag holds the payload MAC, patched in
//! after encryption completes.

use zeroize::Zeroize;

use crate::config::{
    ARGON_SALT_SIZE, AUTH_TAG_SIZE, BASE_HEADER_SIZE, COMMENT_LEN_SIZE, CURRENT_VERSION, FINGERPRINT_SIZE, FLAGS_SIZE,
    HKDF_SALT_SIZE, KEY_REF_SIZE, NONCE_SIZE, OUTER_IV_SIZE, VERSION_SIZE,
};

pub mod deserializer;
pub mod serializer;

pub use deserializer::{Deserializer, ParsedHeader, RawFields};
pub use serializer::Serializer;

/// The five boolean header flags, in wire order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// Two-cipher stack, HMAC-SHA3-512 MAC, heavier Argon2.
    pub paranoid: bool,
    /// The volume was sealed with one or more keyfiles.
    pub uses_keyfiles: bool,
    /// Keyfile order matters (chained hash instead of XOR fold).
    pub ordered_keyfiles: bool,
    /// Payload sub-blocks carry Reed-Solomon parity.
    pub payload_rs: bool,
    /// The final payload sub-block was padded to the codec boundary.
    pub padded: bool,
}

impl Flags {
    /// Wire encoding: one byte per flag, 1 = true.
    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; FLAGS_SIZE] {
        [
            self.paranoid as u8,
            self.uses_keyfiles as u8,
            self.ordered_keyfiles as u8,
            self.payload_rs as u8,
            self.padded as u8,
        ]
    }

    /// Parses the wire encoding; any nonzero byte reads as true.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: &[u8; FLAGS_SIZE]) -> Self {
        Self {
            paranoid: bytes[0] != 0,
            uses_keyfiles: bytes[1] != 0,
            ordered_keyfiles: bytes[2] != 0,
            payload_rs: bytes[3] != 0,
            padded: bytes[4] != 0,
        }
    }
}

/// In-memory form of a volume header.
#[derive(Clone)]
pub struct VolumeHeader {
    /// ASCII version string, e.g. `v2.01`.
    pub version: [u8; VERSION_SIZE],
    /// Plaintext metadata, up to 99999 bytes, arbitrary content.
    pub comments: Vec<u8>,
    pub flags: Flags,
    pub argon_salt: [u8; ARGON_SALT_SIZE],
    pub hkdf_salt: [u8; HKDF_SALT_SIZE],
    pub outer_iv: [u8; OUTER_IV_SIZE],
    pub nonce: [u8; NONCE_SIZE],
    /// v2: header MAC. v1: SHA3-512 of the derived key.
    pub key_ref: [u8; KEY_REF_SIZE],
    /// SHA3-256 of the composed keyfile key; zeros when keyfiles are absent.
    pub keyfile_fingerprint: [u8; FINGERPRINT_SIZE],
    /// Payload MAC, zeros until encryption finishes.
    pub auth_tag: [u8; AUTH_TAG_SIZE],
}

impl VolumeHeader {
    /// Builds a fresh v2 header with zeroed authentication fields.
    pub fn new(
        comments: Vec<u8>,
        flags: Flags,
        argon_salt: [u8; ARGON_SALT_SIZE],
        hkdf_salt: [u8; HKDF_SALT_SIZE],
        outer_iv: [u8; OUTER_IV_SIZE],
        nonce: [u8; NONCE_SIZE],
    ) -> Self {
        Self {
            version: *CURRENT_VERSION,
            comments,
            flags,
            argon_salt,
            hkdf_salt,
            outer_iv,
            nonce,
            key_ref: [0u8; KEY_REF_SIZE],
            keyfile_fingerprint: [0u8; FINGERPRINT_SIZE],
            auth_tag: [0u8; AUTH_TAG_SIZE],
        }
    }

    /// Whether this header selects the legacy v1 branch.
    #[inline]
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.version.starts_with(b"v1")
    }

    /// The comment-length field as five zero-padded ASCII digits.
    #[must_use]
    pub fn comment_len_field(&self) -> [u8; COMMENT_LEN_SIZE] {
        let mut field = [0u8; COMMENT_LEN_SIZE];
        field.copy_from_slice(format!("{:05}", self.comments.len()).as_bytes());
        field
    }

    /// Total encoded size of this header on disk.
    #[inline]
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        BASE_HEADER_SIZE + 3 * self.comments.len() as u64
    }

    /// The exact byte string covered by the v2 header MAC.
    #[must_use]
    pub fn mac_message(&self) -> Vec<u8> {
        mac_message(
            &self.version,
            &self.comment_len_field(),
            &self.comments,
            &self.flags.to_bytes(),
            &self.argon_salt,
            &self.hkdf_salt,
            &self.outer_iv,
            &self.nonce,
            &self.keyfile_fingerprint,
        )
    }
}

impl Drop for VolumeHeader {
    fn drop(&mut self) {
        // The authentication fields are derived from key material; null them
        // on release like the rest of the operation context.
        self.key_ref.zeroize();
        self.auth_tag.zeroize();
    }
}

/// Checks the `v<digit>.<digit><digit>` version shape.
#[inline]
#[must_use]
pub const fn version_valid(version: &[u8; VERSION_SIZE]) -> bool {
    version[0] == b'v'
        && version[1].is_ascii_digit()
        && version[2] == b'.'
        && version[3].is_ascii_digit()
        && version[4].is_ascii_digit()
}

/// Concatenates the header-MAC input: every field in wire order except the
/// key reference and auth tag, which the MAC itself fills.
#[allow(clippy::too_many_arguments)]
pub(crate) fn mac_message(
    version: &[u8],
    comment_len: &[u8],
    comments: &[u8],
    flags: &[u8],
    argon_salt: &[u8],
    hkdf_salt: &[u8],
    outer_iv: &[u8],
    nonce: &[u8],
    fingerprint: &[u8],
) -> Vec<u8> {
    let mut message = Vec::with_capacity(
        version.len()
            + comment_len.len()
            + comments.len()
            + flags.len()
            + argon_salt.len()
            + hkdf_salt.len()
            + outer_iv.len()
            + nonce.len()
            + fingerprint.len(),
    );
    message.extend_from_slice(version);
    message.extend_from_slice(comment_len);
    message.extend_from_slice(comments);
    message.extend_from_slice(flags);
    message.extend_from_slice(argon_salt);
    message.extend_from_slice(hkdf_salt);
    message.extend_from_slice(outer_iv);
    message.extend_from_slice(nonce);
    message.extend_from_slice(fingerprint);
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> VolumeHeader {
        VolumeHeader::new(
            b"hello".to_vec(),
            Flags { payload_rs: true, ..Flags::default() },
            [1u8; ARGON_SALT_SIZE],
            [2u8; HKDF_SALT_SIZE],
            [3u8; OUTER_IV_SIZE],
            [4u8; NONCE_SIZE],
        )
    }

    #[test]
    fn flags_roundtrip() {
        let flags = Flags { paranoid: true, ordered_keyfiles: true, ..Flags::default() };
        assert_eq!(Flags::from_bytes(&flags.to_bytes()), flags);
        assert_eq!(flags.to_bytes(), [1, 0, 1, 0, 0]);
    }

    #[test]
    fn comment_len_is_zero_padded() {
        let header = sample_header();
        assert_eq!(&header.comment_len_field(), b"00005");
    }

    #[test]
    fn encoded_len_tracks_comments() {
        let header = sample_header();
        assert_eq!(header.encoded_len(), BASE_HEADER_SIZE + 15);
    }

    #[test]
    fn version_shape() {
        assert!(version_valid(b"v2.01"));
        assert!(version_valid(b"v1.14"));
        assert!(!version_valid(b"V2.01"));
        assert!(!version_valid(b"v2_01"));
        assert!(!version_valid(b"v2.1x"));
    }

    #[test]
    fn legacy_detection() {
        let mut header = sample_header();
        assert!(!header.is_legacy());
        header.version = *b"v1.14";
        assert!(header.is_legacy());
    }

    #[test]
    fn mac_message_excludes_auth_fields() {
        let mut header = sample_header();
        let before = header.mac_message();
        header.key_ref = [0xFFu8; KEY_REF_SIZE];
        header.auth_tag = [0xEEu8; AUTH_TAG_SIZE];
        assert_eq!(header.mac_message(), before);

        header.keyfile_fingerprint = [9u8; FINGERPRINT_SIZE];
        assert_ne!(header.mac_message(), before);
    }
}
