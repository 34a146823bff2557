//! Sync front-end: clones one resource type or the whole catalog into the
//! local Disk Store. Argument parsing and the HTTP listener that would front
//! this in production are out of scope; this binary only wires
//! the already-built components together for a one-shot run.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;

use catalog_core::{CacheConfig, EcosystemOperator, Environment};
use catalog_server::{init_tracing, CatalogApp, ProxyConfigSettings, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "catalog-sync", about = "One-shot or per-type catalog clone")]
struct Args {
    #[arg(long, value_enum, default_value = "local")]
    environment: EnvironmentArg,

    /// Resource type to clone (camelCase, e.g. `productOffering`). When
    /// omitted, every registered resource type is cloned.
    #[arg(long)]
    resource_type: Option<String>,

    #[arg(long, env = "CATALOG_OPERATOR_DID", default_value = "did:elsi:VATEU-OPERATOR")]
    operator_did: String,

    #[arg(long, env = "CATALOG_OPERATOR_NAME", default_value = "DOME Operator")]
    operator_name: String,

    #[arg(long, env = "CATALOG_DB_PATH")]
    db_path: Option<PathBuf>,
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

    let cache = CacheConfig::new(EcosystemOperator::new(args.operator_did, args.operator_name));
    let mut config = ServerConfig::resolve(args.environment.into(), cache, ProxyConfigSettings {
        listen_host: "0.0.0.0".to_string(),
        listen_port: 8443,
        proxy_username: String::new(),
        proxy_password: String::new(),
        catalog_path_prefixes: vec!["/catalog".to_string()],
        pdp_base_url: "http://localhost:9000".to_string(),
    });
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }

    let app = CatalogApp::build(config).await?;
    let now = now_epoch_seconds();

    match args.resource_type {
        Some(kebab_or_camel) => {
            let resource_type = catalog_core::ResourceType::from_camel_case(&kebab_or_camel);
            let count = app.cloner.clone_resource_type(&resource_type, now).await?;
            tracing::info!(resource_type = %resource_type, count, "clone complete");
        }
        None => {
            let count = app.cloner.clone_all_resource_types(now).await;
            tracing::info!(count, "clone complete for all registered resource types");
        }
    }

    Ok(())
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}
