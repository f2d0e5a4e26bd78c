//! Application configuration and format constants.
//!
//! This module is the single source of truth for the `.pcv` volume format:
//! field sizes, Reed-Solomon geometry, Argon2id parameter sets, chunk sizes,
//! and the rekey interval. Both the writer and the reader derive every offset
//! from these values, so changing any of them breaks compatibility with
//! existing volumes.

/// The application name used in user-facing output and prompts.
pub const APP_NAME: &str = "PicoVault";

/// The file extension carried by encrypted volumes.
pub const FILE_EXTENSION: &str = ".pcv";

/// Version string written into every new volume header.
///
/// Format is `v<major>.<minor><minor>` in ASCII, always five bytes.
pub const CURRENT_VERSION: &[u8; VERSION_SIZE] = b"v2.01";

/// Raw size of the version field.
pub const VERSION_SIZE: usize = 5;

/// Raw size of the comment-length field (ASCII zero-padded decimal).
pub const COMMENT_LEN_SIZE: usize = 5;

/// Maximum comment length representable by the five-digit length field.
pub const MAX_COMMENT_LEN: usize = 99_999;

/// Number of boolean flags in the header.
pub const FLAGS_SIZE: usize = 5;

/// Argon2id salt length in bytes.
pub const ARGON_SALT_SIZE: usize = 16;

/// HKDF salt length in bytes.
pub const HKDF_SALT_SIZE: usize = 32;

/// Outer-cipher (Serpent-CTR) IV length in bytes.
pub const OUTER_IV_SIZE: usize = 16;

/// XChaCha20 nonce length in bytes.
pub const NONCE_SIZE: usize = 24;

/// Symmetric key length in bytes.
pub const KEY_SIZE: usize = 32;

/// Length of the key-reference field (v2 header MAC, v1 key hash).
pub const KEY_REF_SIZE: usize = 64;

/// Length of the keyfile fingerprint field.
pub const FINGERPRINT_SIZE: usize = 32;

/// Length of the payload authentication tag.
pub const AUTH_TAG_SIZE: usize = 64;

/// Length of the header subkey used to key the v2 header MAC.
pub const HEADER_SUBKEY_SIZE: usize = 64;

/// Size of a base header with no comments: the sum of every RS-encoded
/// fixed field (15 + 15 + 15 + 48 + 96 + 48 + 72 + 192 + 96 + 192).
pub const BASE_HEADER_SIZE: u64 = 789;

/// Payload chunk size processed per pipeline step (1 MiB).
pub const CHUNK_SIZE: usize = 1 << 20;

/// Raw size of a payload Reed-Solomon sub-block.
pub const RS_DATA_SIZE: usize = 128;

/// Encoded size of a payload Reed-Solomon sub-block.
pub const RS_ENCODED_SIZE: usize = 136;

/// Encoded size of a full payload chunk when Reed-Solomon is enabled.
pub const RS_CHUNK_SIZE: usize = CHUNK_SIZE / RS_DATA_SIZE * RS_ENCODED_SIZE;

/// Number of payload bytes processed between nonce/IV refreshes (60 GiB).
///
/// A multiple of [`CHUNK_SIZE`], so the boundary always falls between chunks.
pub const REKEY_INTERVAL: u64 = 60 * (1 << 30);

/// Argon2id parameter set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgonParams {
    /// Number of passes over memory.
    pub passes: u32,
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Degree of parallelism.
    pub lanes: u32,
}

/// Normal-mode key derivation: 4 passes, 1 GiB, 4 lanes.
pub const ARGON_NORMAL: ArgonParams = ArgonParams { passes: 4, memory_kib: 1 << 20, lanes: 4 };

/// Paranoid-mode key derivation: 8 passes, 1 GiB, 8 lanes.
pub const ARGON_PARANOID: ArgonParams = ArgonParams { passes: 8, memory_kib: 1 << 20, lanes: 8 };

/// Maximum output of a single HKDF expansion (255 blocks of SHA3-256).
///
/// The subkey stream reads at most this many bytes over the lifetime of one
/// volume; at 40 bytes per rekey cycle that bounds a volume to roughly
/// 12 TiB of payload.
pub const HKDF_MAX_OUTPUT: usize = 255 * 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_header_matches_field_sum() {
        // Each field is encoded at 3x its raw size except the payload codec.
        let encoded = 3 * (VERSION_SIZE
            + COMMENT_LEN_SIZE
            + FLAGS_SIZE
            + ARGON_SALT_SIZE
            + HKDF_SALT_SIZE
            + OUTER_IV_SIZE
            + NONCE_SIZE
            + KEY_REF_SIZE
            + FINGERPRINT_SIZE
            + AUTH_TAG_SIZE);
        assert_eq!(BASE_HEADER_SIZE, encoded as u64);
    }

    #[test]
    fn rekey_interval_is_chunk_aligned() {
        assert_eq!(REKEY_INTERVAL % CHUNK_SIZE as u64, 0);
    }

    #[test]
    fn rs_chunk_size() {
        assert_eq!(RS_CHUNK_SIZE, 1_114_112);
    }
}
