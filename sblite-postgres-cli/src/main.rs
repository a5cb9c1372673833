use std::sync::Arc;

use env_logger::Env;
use log::info;
use sblite_core::{Engine, Pipeline, PolicyStore};
use sblite_postgres::auth::AuthMethod;
use sblite_postgres::{serve, ServerOptions};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "sblite-postgres",
    about = "A postgres interface for sblite. Serve a SQLite database to Postgres clients."
)]
struct Opt {
    /// Path to the SQLite database file; ':memory:' serves a scratch database
    #[structopt(long("db"), short("f"), default_value = "sblite.db")]
    database: String,
    /// Database name announced to clients
    #[structopt(long("db-name"), default_value = "sblite")]
    database_name: String,
    /// Port the server listens to, default to 5432
    #[structopt(short, default_value = "5432")]
    port: u16,
    /// Host address the server listens to, default to 127.0.0.1
    #[structopt(long("host"), default_value = "127.0.0.1")]
    host: String,
    /// Server password; omit to accept connections without authentication
    #[structopt(long("password"))]
    password: Option<String>,
    /// Password exchange: cleartext or md5
    #[structopt(long("auth-method"), default_value = "cleartext")]
    auth_method: AuthMethod,
    /// Path to TLS certificate file
    #[structopt(long("tls-cert"))]
    tls_cert: Option<String>,
    /// Path to TLS private key file
    #[structopt(long("tls-key"))]
    tls_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(
        Env::default().default_filter_or("sblite_postgres=info,sblite_postgres_cli=info"),
    )
    .init();

    let opts = Opt::from_args();

    let engine = if opts.database == ":memory:" {
        Engine::open_in_memory()
    } else {
        Engine::open(&opts.database)
    }
    .map_err(|e| format!("Failed to open database {}: {e}", opts.database))?;
    let engine = Arc::new(engine);
    info!("Serving database {}", opts.database);

    let policies = Arc::new(PolicyStore::new());
    policies
        .reload(&engine)
        .await
        .map_err(|e| format!("Failed to load row security policies: {e}"))?;

    let pipeline = Arc::new(Pipeline::new(engine, policies));

    let server_options = ServerOptions::new()
        .with_host(opts.host)
        .with_port(opts.port)
        .with_database_name(opts.database_name)
        .with_password(opts.password)
        .with_auth_method(opts.auth_method)
        .with_tls_cert_path(opts.tls_cert)
        .with_tls_key_path(opts.tls_key);

    serve(pipeline, &server_options)
        .await
        .map_err(|e| format!("Failed to run server: {e}"))?;

    Ok(())
}
