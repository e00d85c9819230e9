use std::path::PathBuf;

use clap::Parser;
use naya_relay::config::{BackendConfig, Config};
use naya_relay::error::Result;
use naya_relay::server;

#[derive(Parser, Debug)]
#[command(name = "naya-relayd")]
#[command(about = "NaYa streaming chat relay and back-office provisioning")]
struct Cli {
    #[arg(long, env = "NAYA_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "NAYA_PORT", default_value_t = 8787)]
    port: u16,

    /// JSON config file; built-in defaults apply when omitted.
    #[arg(long, env = "NAYA_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "NAYA_GATEWAY_ENDPOINT")]
    gateway_endpoint: Option<String>,

    #[arg(long, env = "NAYA_MODEL")]
    model: Option<String>,

    /// Hosted backend URL; enables /create-user and /create-admin.
    #[arg(long, env = "NAYA_BACKEND_URL")]
    backend_url: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::convention_defaults(),
    };
    if let Some(endpoint) = &cli.gateway_endpoint {
        config.gateway.endpoint = endpoint.clone();
    }
    if let Some(model) = &cli.model {
        config.gateway.model = model.clone();
    }
    if let Some(url) = &cli.backend_url {
        match config.backend.as_mut() {
            Some(backend) => backend.url = url.clone(),
            None => config.backend = Some(BackendConfig::new(url.clone())),
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    naya_relay::logging::init_tracing("naya_relayd");
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let addr = format!("{}:{}", cli.host, cli.port);
    server::run(config, &addr).await
}
