//! Keyring integration for secure API key storage
//!
//! The key is written to the OS keyring and to a 0600 file in the config
//! directory. Reads prefer the keyring; the file covers platforms where the
//! keyring accepts writes but cannot read them back.

use anyhow::{Result, Context};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SERVICE_NAME: &str = "beconfident";
pub const API_KEY_ACCOUNT: &str = "google-api-key";
const API_KEY_FILE: &str = "api_key.txt";

/// Keyring entry plus fallback file holding the API key
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
    account: String,
    fallback_file: Option<PathBuf>,
}

impl Default for KeyringStore {
    fn default() -> Self {
        let file = crate::config::project_dirs()
            .ok()
            .map(|dirs| dirs.config_dir().join(API_KEY_FILE));
        Self::new(SERVICE_NAME, API_KEY_ACCOUNT, file)
    }
}

impl KeyringStore {
    pub fn new(service: &str, account: &str, fallback_file: Option<PathBuf>) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
            fallback_file,
        }
    }

    fn entry(&self) -> Option<keyring::Entry> {
        match keyring::Entry::new(&self.service, &self.account) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Keyring unavailable: {}", e);
                None
            }
        }
    }

    /// Store the key in the keyring and the fallback file.
    ///
    /// Fails only when neither location took the key.
    pub fn save(&self, key: &str) -> Result<()> {
        let in_keyring = match self.entry().map(|entry| entry.set_password(key)) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                warn!("Keyring write failed: {}", e);
                false
            }
            None => false,
        };

        let written = match &self.fallback_file {
            Some(path) => write_key_file(path, key),
            None => Err(anyhow::anyhow!("No config directory for the API key file")),
        };

        match written {
            Ok(()) if !in_keyring => {
                println!("Note: Using file-based storage (keyring unavailable)");
                Ok(())
            }
            Ok(()) => Ok(()),
            Err(e) if in_keyring => {
                warn!("API key kept in keyring only: {:#}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stored key, if any. Blank values count as missing.
    pub fn fetch(&self) -> Result<Option<String>> {
        if let Some(entry) = self.entry() {
            match entry.get_password() {
                Ok(key) if !key.trim().is_empty() => return Ok(Some(key.trim().to_string())),
                Ok(_) | Err(keyring::Error::NoEntry) => {}
                Err(e) => debug!("Keyring read failed, trying file: {}", e),
            }
        }

        match &self.fallback_file {
            Some(path) => read_key_file(path),
            None => Ok(None),
        }
    }

    /// Remove the key from both locations. Nothing stored is not an error.
    pub fn remove(&self) -> Result<()> {
        if let Some(path) = &self.fallback_file {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to delete {}", path.display()));
                }
            }
        }

        if let Some(entry) = self.entry() {
            credential_removed(entry.delete_credential())?;
        }
        Ok(())
    }

    /// Whether a non-blank key is stored anywhere
    pub fn has_key(&self) -> bool {
        matches!(self.fetch(), Ok(Some(_)))
    }
}

impl super::SecretStore for KeyringStore {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn load(&self) -> Option<String> {
        match self.fetch() {
            Ok(key) => key,
            Err(e) => {
                debug!("No stored API key: {:#}", e);
                None
            }
        }
    }
}

fn credential_removed(result: keyring::Result<()>) -> Result<()> {
    match result {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e).context("Failed to delete API key from keyring"),
    }
}

fn write_key_file(path: &Path, key: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).context("Failed to create config directory")?;
    }
    fs::write(path, key).context("Failed to write API key file")?;

    // Set restrictive permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .context("Failed to set file permissions")?;
    }

    Ok(())
}

fn read_key_file(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let key = contents.trim();
            Ok((!key.is_empty()).then(|| key.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

/// Store the API key in the default location
pub fn set_api_key(key: &str) -> Result<()> {
    KeyringStore::default().save(key)
}

/// Read the API key from the default location
pub fn get_api_key() -> Result<String> {
    KeyringStore::default()
        .fetch()?
        .context("No API key stored. Run 'beconfident config --set-api-key YOUR_KEY' first.")
}

/// Delete the API key from the default location
pub fn delete_api_key() -> Result<()> {
    KeyringStore::default().remove()
}
