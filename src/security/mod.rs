//! Security module
//!
//! Resolves the API credential for a session. Sources are consulted in a
//! fixed order: the secret store (OS keyring, then the key file), the
//! environment, then an interactive prompt. A session cannot start without a
//! key.

pub mod keyring;

use thiserror::Error;
use tracing::info;

pub use keyring::{set_api_key, get_api_key, delete_api_key, KeyringStore};

/// Environment variables checked for a key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Where a resolved key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    SecretStore,
    Environment,
    Prompt,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::SecretStore => write!(f, "secret store"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Prompt => write!(f, "prompt"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no API key found; run 'beconfident config --set-api-key YOUR_KEY' or set GOOGLE_API_KEY")]
    Missing,
    #[error("failed to read API key from prompt: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Anything that can hand back a stored key
pub trait SecretStore {
    fn name(&self) -> &'static str;
    fn load(&self) -> Option<String>;
}

/// A resolved API key. Debug output never shows the value.
#[derive(Clone)]
pub struct ApiKey {
    value: String,
    source: CredentialSource,
}

impl ApiKey {
    pub fn new(value: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the API key: secret store, then environment, then prompt.
///
/// `prompt` is only called when the first two sources come up empty; pass
/// `None` for non-interactive callers.
pub fn resolve_api_key<S, E, P>(
    store: &S,
    env: E,
    prompt: Option<P>,
) -> Result<ApiKey, CredentialError>
where
    S: SecretStore + ?Sized,
    E: Fn(&str) -> Option<String>,
    P: FnOnce() -> std::io::Result<String>,
{
    if let Some(key) = non_blank(store.load()) {
        info!("Using API key from {}", store.name());
        return Ok(ApiKey::new(key, CredentialSource::SecretStore));
    }

    for var in API_KEY_ENV_VARS {
        if let Some(key) = non_blank(env(var)) {
            info!("Using API key from ${}", var);
            return Ok(ApiKey::new(key, CredentialSource::Environment));
        }
    }

    if let Some(prompt) = prompt {
        if let Some(key) = non_blank(Some(prompt()?)) {
            return Ok(ApiKey::new(key, CredentialSource::Prompt));
        }
    }

    Err(CredentialError::Missing)
}

/// Resolve the key from the keyring, the process environment and optionally stdin
pub fn resolve_default(interactive: bool) -> Result<ApiKey, CredentialError> {
    let env = |name: &str| std::env::var(name).ok();
    let store = KeyringStore::default();
    if interactive {
        resolve_api_key(&store, env, Some(prompt_for_key))
    } else {
        resolve_api_key(&store, env, None::<fn() -> std::io::Result<String>>)
    }
}

fn prompt_for_key() -> std::io::Result<String> {
    use std::io::Write;

    print!("Enter your Google API key: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore(Option<&'static str>);

    impl SecretStore for FixedStore {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn load(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn no_prompt() -> Option<fn() -> std::io::Result<String>> {
        None
    }

    #[test]
    fn test_secret_store_wins() {
        let key = resolve_api_key(
            &FixedStore(Some("stored")),
            |_| Some("env".to_string()),
            Some(|| -> std::io::Result<String> { panic!("prompt must not run") }),
        ).unwrap();
        assert_eq!(key.expose(), "stored");
        assert_eq!(key.source(), CredentialSource::SecretStore);
    }

    #[test]
    fn test_environment_before_prompt() {
        let key = resolve_api_key(
            &FixedStore(None),
            |name| (name == "GEMINI_API_KEY").then(|| "from-env".to_string()),
            Some(|| -> std::io::Result<String> { panic!("prompt must not run") }),
        ).unwrap();
        assert_eq!(key.expose(), "from-env");
        assert_eq!(key.source(), CredentialSource::Environment);
    }

    #[test]
    fn test_blank_values_skipped() {
        let key = resolve_api_key(
            &FixedStore(Some("   ")),
            |_| Some("".to_string()),
            Some(|| Ok("typed".to_string())),
        ).unwrap();
        assert_eq!(key.expose(), "typed");
        assert_eq!(key.source(), CredentialSource::Prompt);
    }

    #[test]
    fn test_missing_everywhere() {
        let err = resolve_api_key(&FixedStore(None), no_env, no_prompt()).unwrap_err();
        assert!(matches!(err, CredentialError::Missing));

        let err = resolve_api_key(&FixedStore(None), no_env, Some(|| Ok(" ".to_string()))).unwrap_err();
        assert!(matches!(err, CredentialError::Missing));
    }

    #[test]
    fn test_debug_redacts_value() {
        let key = ApiKey::new("secret-value", CredentialSource::Environment);
        let shown = format!("{:?}", key);
        assert!(!shown.contains("secret-value"));
        assert!(shown.contains("redacted"));
    }
}
