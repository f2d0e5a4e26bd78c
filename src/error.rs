//! Error taxonomy for volume operations.
//!
//! Every failure mode that callers need to tell apart is a distinct variant;
//! the CLI maps these onto user-facing messages and exit behavior. Force mode
//! downgrades [`Error::PayloadAuth`], [`Error::CorruptHeader`] and
//! [`Error::CorruptPayload`] to completed-with-warning, and never downgrades
//! the password/keyfile variants or [`Error::Cancelled`].

use std::io;

use thiserror::Error;

/// Result alias used throughout the core.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All distinct outcomes of an encrypt or decrypt operation.
#[derive(Debug, Error)]
pub enum Error {
    /// User-initiated abort via the cancellation flag.
    #[error("operation cancelled")]
    Cancelled,

    /// Legacy (v1) key-hash mismatch.
    #[error("password incorrect")]
    PasswordIncorrect,

    /// v2 header MAC mismatch. A wrong password and a tampered header are
    /// indistinguishable from the outside, so the message names both.
    #[error("password incorrect or header tampered")]
    HeaderAuth,

    /// Keyfile fingerprint mismatch.
    #[error("keyfile incorrect{}", if *.ordered { " (order matters)" } else { "" })]
    KeyfileAuth {
        /// Whether the volume was sealed with order-dependent keyfiles.
        ordered: bool,
    },

    /// Stored auth tag does not match the computed payload MAC, after any
    /// error-correction retry.
    #[error("volume authentication failed: payload is corrupted or modified")]
    PayloadAuth,

    /// Required header fields could not be recovered.
    #[error("volume header is damaged beyond repair")]
    CorruptHeader,

    /// A payload block could not be recovered by error correction.
    #[error("volume payload is damaged beyond repair")]
    CorruptPayload,

    /// Two identical keyfiles in unordered mode cancel each other out.
    #[error("duplicate keyfiles cancel out; remove one or enable ordering")]
    DuplicateKeyfiles,

    /// Malformed request or malformed volume metadata.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A cryptographic primitive produced an impossible result, treated as
    /// hardware failure (e.g. the RNG or Argon2 returned all zeros).
    #[error("cryptographic failure: {0}")]
    CryptoFailure(&'static str),

    /// The typed HKDF reader was used out of order. Programmer error.
    #[error("subkey stream misuse: {0}")]
    SubkeyOrder(&'static str),

    /// Any underlying file operation failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether force mode may downgrade this error to a kept-output warning.
    #[inline]
    #[must_use]
    pub const fn force_downgradable(&self) -> bool {
        matches!(self, Self::PayloadAuth | Self::CorruptHeader | Self::CorruptPayload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyfile_message_mentions_order() {
        let ordered = Error::KeyfileAuth { ordered: true };
        let unordered = Error::KeyfileAuth { ordered: false };
        assert_eq!(ordered.to_string(), "keyfile incorrect (order matters)");
        assert_eq!(unordered.to_string(), "keyfile incorrect");
    }

    #[test]
    fn force_downgrade_excludes_auth() {
        assert!(Error::PayloadAuth.force_downgradable());
        assert!(Error::CorruptPayload.force_downgradable());
        assert!(!Error::PasswordIncorrect.force_downgradable());
        assert!(!Error::KeyfileAuth { ordered: false }.force_downgradable());
        assert!(!Error::Cancelled.force_downgradable());
    }
}
