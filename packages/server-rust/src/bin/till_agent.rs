//! CLI entry point for the till agent.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use till_agent::agent::TillAgent;
use till_agent::config::{AgentConfig, ControlApiConfig, InterceptorConfig, StoreConfig, SyncConfig};

#[derive(Parser, Debug)]
#[command(name = "till-agent", version, about = "Offline-first point-of-sale sync agent")]
struct Args {
    /// Unique identifier for this till device.
    #[arg(long, env = "TILL_NODE_ID")]
    node_id: String,

    /// Directory holding the embedded database file. Pass `--in-memory` to skip persistence.
    #[arg(long, env = "TILL_DATA_DIR", default_value = "./till-data")]
    data_dir: PathBuf,

    /// Skip the durable store entirely and run against the in-memory fallback.
    #[arg(long)]
    in_memory: bool,

    /// Base URL of the upstream point-of-sale server.
    #[arg(long, env = "TILL_UPSTREAM_URL")]
    upstream_url: String,

    /// Local bind address for the control API.
    #[arg(long, env = "TILL_BIND_ADDR", default_value = "127.0.0.1")]
    bind_addr: String,

    /// Local bind port for the control API.
    #[arg(long, env = "TILL_BIND_PORT", default_value_t = 8787)]
    bind_port: u16,

    /// Interval in seconds between background drain attempts.
    #[arg(long, default_value_t = 60)]
    sync_interval_seconds: u64,
}

impl Args {
    fn into_config(self) -> AgentConfig {
        AgentConfig {
            node_id: self.node_id,
            store: StoreConfig {
                data_dir: if self.in_memory { None } else { Some(self.data_dir) },
                ..StoreConfig::default()
            },
            sync: SyncConfig {
                upstream_base_url: self.upstream_url,
                background_sync_interval: Duration::from_secs(self.sync_interval_seconds),
                ..SyncConfig::default()
            },
            interceptor: InterceptorConfig::default(),
            control_api: ControlApiConfig {
                bind_addr: self.bind_addr,
                bind_port: self.bind_port,
                ..ControlApiConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.into_config();

    let mut agent = TillAgent::new(config);
    let port = agent.start().await?;
    tracing::info!(port, "till-agent listening");

    agent
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
