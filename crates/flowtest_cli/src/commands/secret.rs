//! Secret commands - Vault transit encrypt/decrypt.

use super::load_config;
use anyhow::{Context, Result};
use flowtest_core::VaultTransit;
use std::path::Path;

/// Encrypts `text` and prints the ciphertext.
pub fn encrypt(config_path: &Path, text: &str) -> Result<()> {
    let vault = transit(config_path)?;
    let ciphertext = vault.encrypt(text).context("Encryption failed")?;
    println!("{}", ciphertext);
    Ok(())
}

/// Decrypts `ciphertext` and prints the plaintext.
pub fn decrypt(config_path: &Path, ciphertext: &str) -> Result<()> {
    let vault = transit(config_path)?;
    let plaintext = vault.decrypt(ciphertext).context("Decryption failed")?;
    println!("{}", plaintext);
    Ok(())
}

fn transit(config_path: &Path) -> Result<VaultTransit> {
    let config = load_config(config_path)?;
    Ok(VaultTransit::from_config(&config.vault)?)
}
