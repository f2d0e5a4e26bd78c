//! Cryptographic building blocks for volume operations.
//!
//! The pieces here are deliberately small and composable: key derivation,
//! keyfile composition, the ordered HKDF subkey stream, the two payload MAC
//! variants, and the streaming cipher stack. The pipelines in
//! [`crate::volume`] wire them together in the order the format requires.

pub mod derive;
pub mod ephemeral;
pub mod keyfile;
pub mod mac;
pub mod subkeys;
pub mod suite;

pub use derive::{derive_key, params_for, random_bytes};
pub use ephemeral::EphemeralCipher;
pub use keyfile::ComposedKeyfiles;
pub use mac::PayloadMac;
pub use subkeys::SubkeyStream;
pub use suite::CipherSuite;
