use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::{KuaipanError, Result};

/// OAuth 1.0a key pairs for one client.
///
/// The consumer pair identifies the application. The access pair is empty
/// until the handshake fills it, first with a temporary request token and
/// then with the final access token.
///
/// The `Debug` implementation redacts both secrets to prevent accidental
/// leakage in logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_key: String,
    pub access_secret: String,
}

impl Credential {
    /// Creates a credential holding only the consumer pair.
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_key: String::new(),
            access_secret: String::new(),
        }
    }

    /// Attaches an already authorised access pair.
    pub fn with_access(
        mut self,
        access_key: impl Into<String>,
        access_secret: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.access_secret = access_secret.into();
        self
    }

    /// Returns `true` once an access (or request) token is present.
    pub fn has_access(&self) -> bool {
        !self.access_key.is_empty()
    }

    pub(crate) fn set_access(&mut self, access_key: String, access_secret: String) {
        self.access_key = access_key;
        self.access_secret = access_secret;
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"****")
            .field("access_key", &self.access_key)
            .field("access_secret", &"****")
            .finish()
    }
}

/// Resolves a [`Credential`] from a specific source.
pub trait CredentialProvider {
    /// Attempt to resolve a credential from this provider.
    fn resolve(&self) -> Result<Credential>;
}

/// Provides a credential from explicitly specified values.
pub struct StaticProvider {
    credential: Credential,
}

impl StaticProvider {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl CredentialProvider for StaticProvider {
    fn resolve(&self) -> Result<Credential> {
        Ok(self.credential.clone())
    }
}

/// Provides a credential from environment variables.
///
/// Reads `KUAIPAN_CONSUMER_KEY` and `KUAIPAN_CONSUMER_SECRET`, plus the
/// optional `KUAIPAN_ACCESS_KEY` / `KUAIPAN_ACCESS_SECRET` pair.
pub struct EnvProvider;

impl CredentialProvider for EnvProvider {
    fn resolve(&self) -> Result<Credential> {
        let key = env::var("KUAIPAN_CONSUMER_KEY")
            .map_err(|_| KuaipanError::Credential("KUAIPAN_CONSUMER_KEY not set".into()))?;
        let secret = env::var("KUAIPAN_CONSUMER_SECRET")
            .map_err(|_| KuaipanError::Credential("KUAIPAN_CONSUMER_SECRET not set".into()))?;

        if key.is_empty() || secret.is_empty() {
            return Err(KuaipanError::Credential(
                "KUAIPAN_CONSUMER_KEY or KUAIPAN_CONSUMER_SECRET is empty".into(),
            ));
        }

        let credential = Credential::new(key, secret);
        match (
            env::var("KUAIPAN_ACCESS_KEY"),
            env::var("KUAIPAN_ACCESS_SECRET"),
        ) {
            (Ok(access_key), Ok(access_secret)) if !access_key.is_empty() => {
                Ok(credential.with_access(access_key, access_secret))
            }
            _ => Ok(credential),
        }
    }
}

/// Provides a credential from the Kuaipan credentials profile file.
///
/// Reads `~/.kuaipan/credentials` in INI format. The default profile
/// name is `default`.
pub struct ProfileProvider {
    profile_name: String,
    file_path: Option<PathBuf>,
}

impl Default for ProfileProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileProvider {
    /// Creates a provider that reads the `default` profile.
    pub fn new() -> Self {
        Self {
            profile_name: "default".to_string(),
            file_path: None,
        }
    }

    /// Specifies a custom profile name.
    pub fn with_profile(mut self, name: impl Into<String>) -> Self {
        self.profile_name = name.into();
        self
    }

    /// Specifies a custom file path instead of the default location.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    fn default_path() -> Result<PathBuf> {
        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| KuaipanError::Config("cannot determine home directory".into()))?;
        Ok(PathBuf::from(home).join(".kuaipan").join("credentials"))
    }

    fn parse_ini(content: &str, profile: &str) -> Result<Credential> {
        let section_header = format!("[{}]", profile);
        let mut in_section = false;
        let mut consumer_key = None;
        let mut consumer_secret = None;
        let mut access_key = String::new();
        let mut access_secret = String::new();

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('[') {
                in_section = line == section_header;
                continue;
            }
            if !in_section || line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().to_string();
                match key.trim() {
                    "consumer_key" => consumer_key = Some(value),
                    "consumer_secret" => consumer_secret = Some(value),
                    "access_key" => access_key = value,
                    "access_secret" => access_secret = value,
                    _ => {}
                }
            }
        }

        match (consumer_key, consumer_secret) {
            (Some(key), Some(secret)) => {
                Ok(Credential::new(key, secret).with_access(access_key, access_secret))
            }
            _ => Err(KuaipanError::Config(format!(
                "profile '{}' missing consumer_key or consumer_secret",
                profile
            ))),
        }
    }
}

impl CredentialProvider for ProfileProvider {
    fn resolve(&self) -> Result<Credential> {
        let path = match &self.file_path {
            Some(p) => p.clone(),
            None => Self::default_path()?,
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            KuaipanError::Config(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse_ini(&content, &self.profile_name)
    }
}

/// Tries multiple credential providers in order and returns the first success.
pub struct ChainProvider {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl ChainProvider {
    /// Creates a chain with the given providers.
    pub fn new(providers: Vec<Box<dyn CredentialProvider>>) -> Self {
        Self { providers }
    }

    /// Creates the default credential chain: Env → Profile.
    pub fn default_chain() -> Self {
        Self {
            providers: vec![Box::new(EnvProvider), Box::new(ProfileProvider::new())],
        }
    }
}

impl CredentialProvider for ChainProvider {
    fn resolve(&self) -> Result<Credential> {
        let mut last_err = KuaipanError::Credential("no credential providers configured".into());
        for provider in &self.providers {
            match provider.resolve() {
                Ok(cred) => return Ok(cred),
                Err(e) => {
                    log::debug!("credential provider failed: {}", e);
                    last_err = e
                }
            }
        }
        Err(KuaipanError::Credential(format!(
            "all credential providers failed, last error: {}",
            last_err
        )))
    }
}
