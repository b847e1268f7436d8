use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use tracing::{debug, warn};

/// A provider API key. Never printed.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Trims surrounding whitespace; blank input is no credential at all.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Looks up the credential a provider spec names by key (e.g. `BRAVE_API_KEY`).
pub trait CredentialResolver {
    fn resolve(&self, key: &str) -> Option<Credential>;
}

/// Resolution order: environment variable → credentials file entry.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    file: BTreeMap<String, Credential>,
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a JSON file of `{"KEY_NAME": "secret"}` pairs as a fallback source.
    /// An unreadable file is logged and ignored.
    pub fn with_file(mut self, path: &Path) -> Self {
        match read_credentials_file(path) {
            Ok(entries) => {
                debug!(path = %path.display(), keys = entries.len(), "credentials file loaded");
                self.file = entries;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no credentials file");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring credentials file"),
        }
        self
    }
}

impl CredentialResolver for EnvCredentials {
    fn resolve(&self, key: &str) -> Option<Credential> {
        env::var(key)
            .ok()
            .and_then(|v| Credential::new(&v))
            .or_else(|| self.file.get(key).cloned())
    }
}

fn read_credentials_file(path: &Path) -> std::io::Result<BTreeMap<String, Credential>> {
    let content = std::fs::read_to_string(path)?;
    let raw: BTreeMap<String, String> = serde_json::from_str(&content)?;
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| Some((k, Credential::new(&v)?)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET: &str = "QUOTA_SEARCH_TEST_KEY_THAT_IS_NEVER_SET";

    #[test]
    fn blank_credential_is_none() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   \n").is_none());
        assert_eq!(Credential::new("  abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn debug_is_redacted() {
        let key = Credential::new("super-secret").unwrap();
        assert_eq!(format!("{key:?}"), "[REDACTED]");
    }

    #[test]
    fn unset_variable_resolves_to_none() {
        assert!(EnvCredentials::new().resolve(UNSET).is_none());
    }

    #[test]
    fn falls_back_to_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, format!(r#"{{"{UNSET}": "from-file", "BLANK": "  "}}"#)).unwrap();

        let creds = EnvCredentials::new().with_file(&path);
        assert_eq!(creds.resolve(UNSET).unwrap().expose(), "from-file");
        assert!(creds.resolve("BLANK").is_none());
    }

    #[test]
    fn invalid_credentials_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let creds = EnvCredentials::new().with_file(&path);
        assert!(creds.resolve(UNSET).is_none());
    }
}
