#![allow(clippy::unwrap_used)]
// Integration tests for profile loading, saving and resolution.

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;

use tellstick_config::{
    Config, ConfigError, Profile, TOKEN_SECRET_ENV, load_config_from, profile_to_session_config,
    resolve_credentials_with, save_config_to,
};
use tellstick_core::{CoreError, SessionConfig};

// ── Helpers ─────────────────────────────────────────────────────────

const SAMPLE: &str = r#"
default_profile = "home"

[profiles.home]
host = "192.168.1.20"
token = "bearer-token"
application = "porch-lights"

[profiles.live]
public_key = "PUBKEY"
private_key = "PRIVKEY"
token = "0123abc"
token_secret = "tokensecret"
listen = true

[profiles.radio]
listen = true
"#;

fn write_sample() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    let config = load_config_from(&path).unwrap();
    (dir, config)
}

fn no_env(_: &str) -> Option<String> {
    None
}

// ── Loading ─────────────────────────────────────────────────────────

#[test]
fn test_load_profiles_from_file() {
    let (_dir, config) = write_sample();

    assert_eq!(config.default_profile.as_deref(), Some("home"));
    assert_eq!(config.profiles.len(), 3);

    let (name, home) = config.profile(None).unwrap();
    assert_eq!(name, "home");
    assert_eq!(home.host.as_deref(), Some("192.168.1.20"));
    assert!(!home.listen);

    let (_, live) = config.profile(Some("live")).unwrap();
    assert!(live.listen);
    assert_eq!(live.public_key.as_deref(), Some("PUBKEY"));
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.default_profile.as_deref(), Some("default"));
    assert!(config.profiles.is_empty());
    assert!(matches!(
        config.profile(None),
        Err(ConfigError::Validation { .. })
    ));
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config {
        default_profile: Some("office".into()),
        profiles: HashMap::from([(
            "office".to_owned(),
            Profile {
                host: Some("tellstick.local".into()),
                listen: true,
                ..Profile::default()
            },
        )]),
    };

    save_config_to(&config, &path).unwrap();
    let loaded = load_config_from(&path).unwrap();

    assert_eq!(loaded.default_profile, config.default_profile);
    assert_eq!(loaded.profiles, config.profiles);
}

// ── Resolution ──────────────────────────────────────────────────────

#[test]
fn test_local_profile_resolves_to_local_session() {
    let (_dir, config) = write_sample();
    let (name, home) = config.profile(None).unwrap();

    match profile_to_session_config(home, name).unwrap() {
        SessionConfig::Local(local) => {
            assert_eq!(local.host, "192.168.1.20");
            assert_eq!(local.application.as_deref(), Some("porch-lights"));
        }
        other => panic!("expected local config, got {other:?}"),
    }
}

#[test]
fn test_cloud_profile_keeps_listen_flag() {
    let (_dir, config) = write_sample();
    let (name, live) = config.profile(Some("live")).unwrap();

    let session = resolve_credentials_with(live, name, no_env)
        .unwrap()
        .validate()
        .unwrap();
    assert!(session.listen());
    assert!(matches!(session, SessionConfig::Cloud(ref c) if c.token == "0123abc"));
}

#[test]
fn test_env_overrides_plaintext_secret() {
    let (_dir, config) = write_sample();
    let (name, live) = config.profile(Some("live")).unwrap();

    let credentials = resolve_credentials_with(live, name, |key| {
        (key == TOKEN_SECRET_ENV).then(|| "from-env".to_owned())
    })
    .unwrap();

    assert_eq!(
        credentials.token_secret.unwrap().expose_secret(),
        "from-env"
    );
    assert_eq!(credentials.private_key.unwrap().expose_secret(), "PRIVKEY");
}

#[test]
fn test_listen_only_profile() {
    let (_dir, config) = write_sample();
    let (name, radio) = config.profile(Some("radio")).unwrap();

    let session = resolve_credentials_with(radio, name, no_env)
        .unwrap()
        .validate()
        .unwrap();
    assert!(matches!(session, SessionConfig::Listen(ref l) if l.host.is_none()));
}

#[test]
fn test_empty_profile_has_no_credentials() {
    let result = resolve_credentials_with(&Profile::default(), "blank", no_env);
    assert!(matches!(
        result,
        Err(ConfigError::NoCredentials { ref profile }) if profile == "blank"
    ));
}

#[test]
fn test_partial_cloud_profile_is_rejected() {
    let profile = Profile {
        public_key: Some("PUBKEY".into()),
        token: Some("0123abc".into()),
        ..Profile::default()
    };

    let result = resolve_credentials_with(&profile, "partial", no_env)
        .unwrap()
        .validate();
    assert!(matches!(result, Err(CoreError::Config { .. })));
}
