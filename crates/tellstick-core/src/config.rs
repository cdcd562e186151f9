// ── Session configuration ──
//
// Which transport a client uses is decided once, from one of these
// validated structs. Loose, all-optional credentials (as read from a
// profile or environment) are turned into a `SessionConfig` through
// `Credentials::validate()`, which refuses any combination that does not
// describe exactly one way of talking to a hub.

use secrecy::{ExposeSecret, SecretString};

use crate::error::CoreError;

/// Sent as the application name when the caller does not give one.
pub const DEFAULT_APPLICATION: &str = "tellstick-rs";

/// Telldus Live credentials: application key pair plus a granted access token.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub public_key: String,
    pub private_key: SecretString,
    pub token: String,
    pub token_secret: SecretString,
    pub application: Option<String>,
    /// Also listen for local broadcast packets.
    pub listen: bool,
}

/// A hub's local HTTP API.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Host name or address, optionally with a port.
    pub host: String,
    /// Bearer token; `None` to start the local authorization flow.
    pub token: Option<SecretString>,
    pub application: Option<String>,
    pub listen: bool,
}

/// No hub API: answer requests from the local device manager.
#[derive(Debug, Clone, Default)]
pub struct ListenConfig {
    /// The TellStick the device manager should talk to; `None` to discover.
    pub host: Option<String>,
}

/// The validated construction mode of a client.
#[derive(Debug, Clone)]
pub enum SessionConfig {
    Cloud(CloudConfig),
    Local(LocalConfig),
    Listen(ListenConfig),
}

impl SessionConfig {
    /// Whether the client should also consume asynchronous packets.
    pub fn listen(&self) -> bool {
        match self {
            Self::Cloud(c) => c.listen,
            Self::Local(c) => c.listen,
            Self::Listen(_) => true,
        }
    }
}

/// Unvalidated credentials, every field optional.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub public_key: Option<String>,
    pub private_key: Option<SecretString>,
    pub token: Option<SecretString>,
    pub token_secret: Option<SecretString>,
    pub host: Option<String>,
    pub application: Option<String>,
    pub listen: bool,
}

impl Credentials {
    /// Pick the construction mode.
    ///
    /// Accepted combinations: the full cloud set; `listen`; `host` +
    /// `token`; `host` + `listen`. A host with a token and no public key
    /// selects the local API, the full cloud set selects Telldus Live,
    /// and anything else that listens uses the device manager directly.
    pub fn validate(self) -> Result<SessionConfig, CoreError> {
        let Self {
            public_key,
            private_key,
            token,
            token_secret,
            host,
            application,
            listen,
        } = self;

        let cloud_complete = public_key.is_some()
            && private_key.is_some()
            && token.is_some()
            && token_secret.is_some();
        if !(cloud_complete || listen || (host.is_some() && token.is_some())) {
            return Err(CoreError::Config {
                message: "missing configuration: need public_key, private_key, token and \
                          token_secret; or host and token; or listen"
                    .into(),
            });
        }

        match (host, token, public_key, private_key, token_secret) {
            (Some(host), Some(token), None, _, _) => Ok(SessionConfig::Local(LocalConfig {
                host,
                token: Some(token),
                application,
                listen,
            })),
            (_, Some(token), Some(public_key), Some(private_key), Some(token_secret)) => {
                Ok(SessionConfig::Cloud(CloudConfig {
                    public_key,
                    private_key,
                    token: token.expose_secret().to_owned(),
                    token_secret,
                    application,
                    listen,
                }))
            }
            (host, ..) if listen => Ok(SessionConfig::Listen(ListenConfig { host })),
            _ => Err(CoreError::Config {
                message: "credentials are incomplete: a public key was given without the \
                          rest of the cloud credentials"
                    .into(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Option<SecretString> {
        Some(SecretString::from(s.to_owned()))
    }

    fn cloud() -> Credentials {
        Credentials {
            public_key: Some("pub".into()),
            private_key: secret("priv"),
            token: secret("tok"),
            token_secret: secret("toksec"),
            ..Credentials::default()
        }
    }

    #[test]
    fn full_cloud_set_selects_cloud() {
        let config = cloud().validate().unwrap();
        assert!(matches!(config, SessionConfig::Cloud(ref c) if c.token == "tok" && !c.listen));
    }

    #[test]
    fn host_and_token_select_local() {
        let config = Credentials {
            host: Some("192.168.1.20".into()),
            token: secret("bearer"),
            ..Credentials::default()
        }
        .validate()
        .unwrap();
        assert!(matches!(config, SessionConfig::Local(ref c) if c.host == "192.168.1.20"));
    }

    #[test]
    fn listen_alone_and_with_host() {
        let config = Credentials {
            listen: true,
            ..Credentials::default()
        }
        .validate()
        .unwrap();
        assert!(matches!(config, SessionConfig::Listen(ListenConfig { host: None })));

        let config = Credentials {
            host: Some("tellstick".into()),
            listen: true,
            ..Credentials::default()
        }
        .validate()
        .unwrap();
        assert!(config.listen());
        assert!(
            matches!(config, SessionConfig::Listen(ListenConfig { host: Some(ref h) }) if h == "tellstick")
        );
    }

    #[test]
    fn cloud_with_listen_keeps_cloud_transport() {
        let config = Credentials {
            listen: true,
            ..cloud()
        }
        .validate()
        .unwrap();
        assert!(matches!(config, SessionConfig::Cloud(ref c) if c.listen));
    }

    #[test]
    fn partial_sets_are_rejected() {
        for credentials in [
            Credentials::default(),
            Credentials {
                host: Some("h".into()),
                ..Credentials::default()
            },
            Credentials {
                token_secret: None,
                ..cloud()
            },
            Credentials {
                public_key: Some("pub".into()),
                host: Some("h".into()),
                token: secret("t"),
                ..Credentials::default()
            },
        ] {
            assert!(matches!(
                credentials.validate(),
                Err(CoreError::Config { .. })
            ));
        }
    }
}
