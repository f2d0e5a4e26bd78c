//! Interactive password entry.
//!
//! Encryption prompts twice: a typo in a password that seals a volume means
//! permanent data loss. Decryption prompts once. Nothing is echoed, and the
//! entered string moves straight into a `SecretString`.

use anyhow::Result;
use inquire::{Password, PasswordDisplayMode};
use secrecy::SecretString;

/// Prompts for a new volume password, with confirmation.
pub fn encryption_password() -> Result<SecretString> {
    let password = Password::new("Password:")
        .with_display_mode(PasswordDisplayMode::Hidden)
        .with_custom_confirmation_message("Confirm password:")
        .with_custom_confirmation_error_message("The entries do not match.")
        .with_help_message("may be empty when keyfiles are supplied")
        .prompt()?;

    Ok(SecretString::from(password))
}

/// Prompts for an existing volume's password, no confirmation.
pub fn decryption_password() -> Result<SecretString> {
    let password = Password::new("Password:")
        .with_display_mode(PasswordDisplayMode::Hidden)
        .without_confirmation()
        .prompt()?;

    Ok(SecretString::from(password))
}
