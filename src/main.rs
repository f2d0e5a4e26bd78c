// PicoVault - paranoid file encryption
//
// Encryption: XChaCha20 (+ Serpent-CTR in paranoid mode) with a keyed
// BLAKE2b-512 / HMAC-SHA3-512 payload MAC and Reed-Solomon error correction.
// Key derivation: Argon2id.
// File format: self-describing .pcv volume header + encrypted payload.

mod allocator;

use std::process;

use picovault::cli::Cli;

/// Entry point for the PicoVault encryption tool.
///
/// # Exit Codes
/// * 0 - Success
/// * 1 - Error (message printed to stderr)
fn main() {
    if let Err(e) = Cli::init().execute() {
        eprintln!("Error: {e:?}");
        process::exit(1);
    }
}
