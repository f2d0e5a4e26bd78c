//! PicoVault - paranoid file encryption producing `.pcv` volumes.
//!
//! A volume is self-describing: a Reed-Solomon protected header carries the
//! salts, nonce, flags and authentication fields, followed by the encrypted
//! payload. The pipeline stacks:
//! - Argon2id for password key derivation
//! - XChaCha20 (plus Serpent-CTR in paranoid mode) for encryption
//! - keyed BLAKE2b-512 or HMAC-SHA3-512 for the payload MAC
//! - HKDF-SHA3-256 for the ordered subkey stream
//! - Reed-Solomon error correction over header fields and, optionally, the
//!   payload
//!
//! The [`volume`] module exposes the two core operations; everything else
//! supports them.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fec;
pub mod header;
pub mod padding;
pub mod secret;
pub mod ui;
pub mod volume;
