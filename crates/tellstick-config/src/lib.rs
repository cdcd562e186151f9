//! Profile configuration for Telldus hub clients.
//!
//! TOML profiles, credential resolution (env + plaintext), and
//! translation to `tellstick_core::SessionConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use tellstick_core::{CoreError, Credentials, SessionConfig};

/// Env var overriding a profile's application private key.
pub const PRIVATE_KEY_ENV: &str = "TELLSTICK_PRIVATE_KEY";
/// Env var overriding a profile's access token (or local bearer token).
pub const TOKEN_ENV: &str = "TELLSTICK_TOKEN";
/// Env var overriding a profile's access token secret.
pub const TOKEN_SECRET_ENV: &str = "TELLSTICK_TOKEN_SECRET";

const DEFAULT_PROFILE: &str = "default";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some(DEFAULT_PROFILE.into()),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE);
        self.profiles
            .get(name)
            .map(|p| (name, p))
            .ok_or_else(|| ConfigError::Validation {
                field: "profile".into(),
                reason: format!("no profile named '{name}'"),
            })
    }
}

/// One way of reaching a hub.
///
/// Which fields are filled decides the transport: the four cloud values
/// for Telldus Live, `host` + `token` for a hub's local API, `listen` for
/// the device manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Telldus Live application public key.
    pub public_key: Option<String>,

    /// Application private key (plaintext; prefer `TELLSTICK_PRIVATE_KEY`).
    pub private_key: Option<String>,

    /// Access token, or the bearer token for a local hub.
    pub token: Option<String>,

    /// Access token secret (plaintext; prefer `TELLSTICK_TOKEN_SECRET`).
    pub token_secret: Option<String>,

    /// Hub address for the local API or for listening.
    pub host: Option<String>,

    /// Application name shown when authorizing.
    pub application: Option<String>,

    /// Consume asynchronous packets from the device manager.
    #[serde(default)]
    pub listen: bool,
}

impl Profile {
    fn is_empty(&self) -> bool {
        !self.listen
            && self.public_key.is_none()
            && self.private_key.is_none()
            && self.token.is_none()
            && self.token_secret.is_none()
            && self.host.is_none()
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tellstick", "tellstick").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tellstick");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` + environment. A missing file yields defaults.
///
/// Nested keys come from double-underscore env vars, e.g.
/// `TELLSTICK_PROFILES__HOME__HOST`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TELLSTICK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Gather a profile's credentials, secrets from the environment first.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    resolve_credentials_with(profile, profile_name, |key| std::env::var(key).ok())
}

/// [`resolve_credentials`] with an explicit env lookup.
pub fn resolve_credentials_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    let secret = |var: &str, plaintext: Option<&str>| {
        env(var)
            .or_else(|| plaintext.map(str::to_owned))
            .map(SecretString::from)
    };

    let credentials = Credentials {
        public_key: profile.public_key.clone(),
        private_key: secret(PRIVATE_KEY_ENV, profile.private_key.as_deref()),
        token: secret(TOKEN_ENV, profile.token.as_deref()),
        token_secret: secret(TOKEN_SECRET_ENV, profile.token_secret.as_deref()),
        host: profile.host.clone(),
        application: profile.application.clone(),
        listen: profile.listen,
    };

    if profile.is_empty() && credentials.token.is_none() && credentials.private_key.is_none() {
        return Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        });
    }
    Ok(credentials)
}

/// Build a validated `SessionConfig` from a profile.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<SessionConfig, ConfigError> {
    let config = resolve_credentials(profile, profile_name)?.validate()?;
    debug!(profile = profile_name, listen = config.listen(), "profile resolved");
    Ok(config)
}
