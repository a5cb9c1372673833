//! PostgreSQL v3 wire protocol front-end for the sblite core.

mod handlers;
pub mod auth;
pub mod catalog;

use std::fs::File;
use std::io::{BufReader, Error as IOError, ErrorKind};
use std::sync::Arc;

use getset::{Getters, Setters, WithSetters};
use log::{info, warn};
use pgwire::api::PgWireServerHandlers;
use pgwire::tokio::process_socket;
use rustls_pemfile::{certs, pkcs8_private_keys};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use sblite_core::Pipeline;
use tokio::net::TcpListener;
use tokio_rustls::rustls::{self, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::auth::{AuthMethod, WireAuth};
pub use handlers::{HandlerFactory, SessionService};

/// re-exports
pub use pgwire;
pub use sqlite_pg;

#[derive(Getters, Setters, WithSetters, Debug)]
#[getset(get = "pub", set = "pub", set_with = "pub")]
pub struct ServerOptions {
    host: String,
    port: u16,
    /// Database name reported by the catalog emulator.
    database_name: String,
    /// Server password; `None` runs in trust mode.
    password: Option<String>,
    auth_method: AuthMethod,
    tls_cert_path: Option<String>,
    tls_key_path: Option<String>,
}

impl ServerOptions {
    pub fn new() -> ServerOptions {
        ServerOptions::default()
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            host: "127.0.0.1".to_string(),
            port: 5432,
            database_name: "sblite".to_string(),
            password: None,
            auth_method: AuthMethod::Cleartext,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

/// Build a TLS acceptor from PEM files. With an acceptor present the server
/// answers `S` to the SSLRequest preamble; without one it answers `N`.
fn load_tls_acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, IOError> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let cert_chain: Vec<CertificateDer> = certs(&mut cert_reader).collect::<Result<_, _>>()?;

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = pkcs8_private_keys(&mut key_reader)
        .next()
        .transpose()?
        .ok_or_else(|| {
            IOError::new(
                ErrorKind::InvalidInput,
                format!("no PKCS#8 private key in {key_path}"),
            )
        })?;

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, PrivateKeyDer::from(key))
        .map(Arc::new)
        .map(TlsAcceptor::from)
        .map_err(|err| IOError::new(ErrorKind::InvalidInput, err))
}

/// Serve the sblite [`Pipeline`] with the PostgreSQL protocol.
pub async fn serve(pipeline: Arc<Pipeline>, opts: &ServerOptions) -> Result<(), std::io::Error> {
    let wire_auth = WireAuth::new(
        opts.password.clone(),
        opts.auth_method,
        opts.database_name.clone(),
    );
    let factory = Arc::new(HandlerFactory::new(
        pipeline,
        wire_auth,
        opts.database_name.clone(),
    ));
    serve_with_handlers(factory, opts).await
}

/// Serve with custom pgwire handlers. Swap in your own
/// `PgWireServerHandlers` implementation, reusing [`SessionService`] for the
/// parts worth keeping, to change authentication or query processing.
pub async fn serve_with_handlers(
    handlers: Arc<impl PgWireServerHandlers + Sync + Send + 'static>,
    opts: &ServerOptions,
) -> Result<(), std::io::Error> {
    let tls_acceptor = match (&opts.tls_cert_path, &opts.tls_key_path) {
        (Some(cert_path), Some(key_path)) => match load_tls_acceptor(cert_path, key_path) {
            Ok(acceptor) => {
                info!("TLS certificate loaded from {cert_path}");
                Some(acceptor)
            }
            Err(e) => {
                warn!("TLS unavailable ({e}); refusing SSLRequest upgrades");
                None
            }
        },
        _ => None,
    };

    let addr = format!("{}:{}", opts.host, opts.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(
        "database \"{}\" speaking the Postgres protocol on {addr}{}",
        opts.database_name,
        if tls_acceptor.is_some() { " (TLS)" } else { "" }
    );

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("accept failed: {e}");
                continue;
            }
        };

        // one task per client connection; within it, statements run in the
        // order received
        let handlers = handlers.clone();
        let tls = tls_acceptor.clone();
        tokio::spawn(async move {
            if let Err(e) = process_socket(socket, tls, handlers).await {
                warn!("connection from {peer} ended with error: {e}");
            }
        });
    }
}
