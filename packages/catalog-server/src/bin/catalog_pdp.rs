//! MITM proxy front-end: terminates TLS for allow-listed hosts,
//! rewrites catalog-prefixed requests to the PDP, and tunnels everything
//! else raw. The PDP's own HTTP routing is out of scope — only
//! the accept loop, TLS termination, and graceful shutdown live here.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use catalog_core::{CacheConfig, EcosystemOperator, Environment};
use catalog_server::{
    init_tracing,
    proxy::{self, CertificateAuthority, MitmProxy, ShutdownController},
    ProxyConfigSettings, ServerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "catalog-pdp", about = "Intercepting MITM proxy in front of the PDP")]
struct Args {
    #[arg(long, value_enum, default_value = "local")]
    environment: EnvironmentArg,

    #[arg(long, env = "CATALOG_PROXY_LISTEN_HOST", default_value = "0.0.0.0")]
    listen_host: String,

    #[arg(long, env = "CATALOG_PROXY_LISTEN_PORT", default_value_t = 8443)]
    listen_port: u16,

    #[arg(long, env = "CATALOG_PROXY_USERNAME")]
    proxy_username: String,

    #[arg(long, env = "CATALOG_PROXY_PASSWORD")]
    proxy_password: String,

    #[arg(long, env = "CATALOG_PDP_BASE_URL", default_value = "http://localhost:9000")]
    pdp_base_url: String,

    /// PEM-encoded CA certificate; when omitted an ephemeral CA is minted
    /// for the lifetime of this process (suitable for `local`/`staging`).
    #[arg(long, env = "CATALOG_CA_CERT_PEM")]
    ca_cert_pem: Option<String>,

    #[arg(long, env = "CATALOG_CA_KEY_PEM")]
    ca_key_pem: Option<String>,

    #[arg(long, default_value_t = 30)]
    drain_timeout_seconds: u64,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum EnvironmentArg {
    Production,
    Staging,
    Local,
}

impl From<EnvironmentArg> for Environment {
    fn from(value: EnvironmentArg) -> Self {
        match value {
            EnvironmentArg::Production => Environment::Production,
            EnvironmentArg::Staging => Environment::Staging,
            EnvironmentArg::Local => Environment::Local,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let cache = CacheConfig::new(EcosystemOperator::new("did:elsi:VATEU-OPERATOR", "DOME Operator"));
    let config = ServerConfig::resolve(args.environment.into(), cache, ProxyConfigSettings {
        listen_host: args.listen_host.clone(),
        listen_port: args.listen_port,
        proxy_username: args.proxy_username,
        proxy_password: args.proxy_password,
        catalog_path_prefixes: vec!["/catalog".to_string()],
        pdp_base_url: args.pdp_base_url,
    });

    let ca = match (args.ca_cert_pem, args.ca_key_pem) {
        (Some(cert_pem), Some(key_pem)) => CertificateAuthority::from_pem(&cert_pem, &key_pem)?,
        _ => {
            tracing::warn!("no CA cert/key supplied, minting an ephemeral one for this process");
            CertificateAuthority::generate_ephemeral()?
        }
    };

    // Redirects must reach the client untouched, not be
    // followed transparently by the forwarding hop.
    let forward_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(10))
        .build()?;

    let proxy = Arc::new(MitmProxy::new(Arc::new(ca), config.proxy_config(), forward_client));
    let shutdown = Arc::new(ShutdownController::new());

    let listener = TcpListener::bind((config.proxy.listen_host.as_str(), config.proxy.listen_port)).await?;
    tracing::info!(host = %config.proxy.listen_host, port = config.proxy.listen_port, "mitm proxy listening");
    shutdown.set_ready();

    let serve_shutdown = Arc::clone(&shutdown);
    let serve_handle = tokio::spawn(proxy::serve(listener, proxy, serve_shutdown));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining connections");
    shutdown.trigger_shutdown();

    let drained = shutdown
        .wait_for_drain(Duration::from_secs(args.drain_timeout_seconds))
        .await;
    if !drained {
        tracing::warn!("drain timed out with connections still in flight");
    }
    serve_handle.await?;

    Ok(())
}
