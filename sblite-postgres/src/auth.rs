//! Wire startup authentication: trust, cleartext or MD5 against the single
//! configured server password, plus the session ParameterStatus set.

use std::collections::HashMap;
use std::fmt::Debug;
use std::str::FromStr;

use async_trait::async_trait;
use futures::{Sink, SinkExt};
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::md5pass::{hash_md5_password, Md5PasswordAuthStartupHandler};
use pgwire::api::auth::{
    finish_authentication, save_startup_parameters_to_metadata, AuthSource, LoginInfo, Password,
    ServerParameterProvider, StartupHandler,
};
use pgwire::api::{ClientInfo, PgWireConnectionState};
use pgwire::error::{PgWireError, PgWireResult};
use pgwire::messages::{PgWireBackendMessage, PgWireFrontendMessage};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Cleartext,
    Md5,
}

impl FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<AuthMethod, String> {
        match s.to_ascii_lowercase().as_str() {
            "cleartext" | "password" => Ok(AuthMethod::Cleartext),
            "md5" => Ok(AuthMethod::Md5),
            other => Err(format!("unknown auth method: {other}")),
        }
    }
}

/// ParameterStatus set announced after authentication.
#[derive(Debug, Clone)]
pub struct SessionParameters;

impl SessionParameters {
    pub fn pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("server_version", "15.0"),
            ("server_encoding", "UTF8"),
            ("client_encoding", "UTF8"),
            ("DateStyle", "ISO, MDY"),
            ("integer_datetimes", "on"),
            ("TimeZone", "UTC"),
        ]
    }
}

impl ServerParameterProvider for SessionParameters {
    fn server_parameters<C>(&self, _client: &C) -> Option<HashMap<String, String>>
    where
        C: ClientInfo,
    {
        Some(
            Self::pairs()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Password lookup for pgwire's cleartext/MD5 exchange. The server carries
/// one shared password rather than per-user credentials.
#[derive(Debug)]
pub struct ServerPasswordSource {
    password: String,
    method: AuthMethod,
}

impl ServerPasswordSource {
    fn password_for(&self, user: &str) -> Password {
        match self.method {
            AuthMethod::Cleartext => Password::new(None, self.password.as_bytes().to_vec()),
            AuthMethod::Md5 => {
                let salt = Uuid::new_v4().as_bytes()[..4].to_vec();
                let hashed = hash_md5_password(user, &self.password, &salt);
                Password::new(Some(salt), hashed.as_bytes().to_vec())
            }
        }
    }
}

#[async_trait]
impl AuthSource for ServerPasswordSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        Ok(self.password_for(login.user().unwrap_or_default()))
    }
}

/// Trust-mode startup: no password exchange, parameters still announced.
#[derive(Debug)]
pub struct TrustStartup {
    parameters: SessionParameters,
}

#[async_trait]
impl StartupHandler for TrustStartup {
    async fn on_startup<C>(
        &self,
        client: &mut C,
        message: PgWireFrontendMessage,
    ) -> PgWireResult<()>
    where
        C: ClientInfo + SinkExt<PgWireBackendMessage> + Unpin + Send,
        C::Error: Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        if let PgWireFrontendMessage::Startup(ref startup) = message {
            save_startup_parameters_to_metadata(client, startup);
            client.set_state(PgWireConnectionState::ReadyForQuery);
            finish_authentication(client, &self.parameters).await?;
        }
        Ok(())
    }
}

/// Startup handler selected by server configuration.
pub enum StartupAuth {
    Trust(TrustStartup),
    Cleartext(CleartextPasswordAuthStartupHandler<ServerPasswordSource, SessionParameters>),
    Md5(Md5PasswordAuthStartupHandler<ServerPasswordSource, SessionParameters>),
}

#[async_trait]
impl StartupHandler for StartupAuth {
    async fn on_startup<C>(
        &self,
        client: &mut C,
        message: PgWireFrontendMessage,
    ) -> PgWireResult<()>
    where
        C: ClientInfo + SinkExt<PgWireBackendMessage> + Unpin + Send,
        C::Error: Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        match self {
            StartupAuth::Trust(handler) => handler.on_startup(client, message).await,
            StartupAuth::Cleartext(handler) => handler.on_startup(client, message).await,
            StartupAuth::Md5(handler) => handler.on_startup(client, message).await,
        }
    }
}

/// Server-side authentication configuration.
#[derive(Debug, Clone)]
pub struct WireAuth {
    password: Option<String>,
    method: AuthMethod,
    database: String,
}

impl WireAuth {
    pub fn new(password: Option<String>, method: AuthMethod, database: String) -> WireAuth {
        WireAuth {
            password,
            method,
            database,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn startup_handler(&self) -> StartupAuth {
        match &self.password {
            None => StartupAuth::Trust(TrustStartup {
                parameters: SessionParameters,
            }),
            Some(password) => {
                let source = ServerPasswordSource {
                    password: password.clone(),
                    method: self.method,
                };
                match self.method {
                    AuthMethod::Cleartext => StartupAuth::Cleartext(
                        CleartextPasswordAuthStartupHandler::new(source, SessionParameters),
                    ),
                    AuthMethod::Md5 => StartupAuth::Md5(Md5PasswordAuthStartupHandler::new(
                        source,
                        SessionParameters,
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mandated_parameter_status_set() {
        let pairs = SessionParameters::pairs();
        assert_eq!(pairs.len(), 6);
        let map: HashMap<_, _> = pairs.into_iter().collect();
        assert_eq!(map["server_version"], "15.0");
        assert_eq!(map["server_encoding"], "UTF8");
        assert_eq!(map["client_encoding"], "UTF8");
        assert_eq!(map["DateStyle"], "ISO, MDY");
        assert_eq!(map["integer_datetimes"], "on");
        assert_eq!(map["TimeZone"], "UTC");
    }

    #[test]
    fn auth_method_parsing() {
        assert_eq!(AuthMethod::from_str("cleartext").unwrap(), AuthMethod::Cleartext);
        assert_eq!(AuthMethod::from_str("MD5").unwrap(), AuthMethod::Md5);
        assert!(AuthMethod::from_str("kerberos").is_err());
    }

    #[test]
    fn cleartext_source_returns_configured_password() {
        let source = ServerPasswordSource {
            password: "secret".to_string(),
            method: AuthMethod::Cleartext,
        };
        let password = source.password_for("sblite");
        assert!(password.salt().is_none());
        assert_eq!(password.password(), b"secret");
    }

    #[test]
    fn md5_source_salts_and_hashes() {
        let source = ServerPasswordSource {
            password: "secret".to_string(),
            method: AuthMethod::Md5,
        };
        let password = source.password_for("sblite");
        let salt = password.salt().unwrap();
        assert_eq!(salt.len(), 4);
        assert!(password.password().starts_with(b"md5"));
    }

    #[test]
    fn trust_mode_when_no_password() {
        let auth = WireAuth::new(None, AuthMethod::Cleartext, "sblite".to_string());
        assert!(matches!(auth.startup_handler(), StartupAuth::Trust(_)));
        let auth = WireAuth::new(
            Some("p".to_string()),
            AuthMethod::Cleartext,
            "sblite".to_string(),
        );
        assert!(matches!(auth.startup_handler(), StartupAuth::Cleartext(_)));
    }
}
