//! Conclave Supervisor — thin process entrypoint for the Agent Orchestration Core
//! (spec §1: "does not standardize a CLI"; this binary is an ambient wrapper, not
//! part of the specified core).

use clap::{Parser, Subcommand};
use conclave_core::{AuthConfig, AuthMode, BindMode, GatewayConfig};
use conclave_gateway::auth::ResolvedAuth;
use conclave_gateway::server::{self, AppState};
use conclave_gateway::wiring::build_supervisor;
use conclave_core::model::Profile;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "conclave", about = "Conclave agent orchestration supervisor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Supervisor's HTTP API
    Serve {
        #[arg(short, long, default_value = "18789")]
        port: u16,
        #[arg(short, long, default_value = "lan")]
        bind: String,
        #[arg(short, long)]
        token: Option<String>,
        #[arg(long)]
        no_auth: bool,
        #[arg(short, long)]
        workspace: Option<PathBuf>,
        #[arg(short, long, default_value = "claude-3-5-sonnet-20241022")]
        model: String,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port, bind, token, no_auth, workspace, model }) => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "conclave=info,tower_http=info".into()))
                .with(tracing_subscriber::fmt::layer())
                .init();

            let bind_mode = match bind.as_str() {
                "loopback" | "localhost" | "127.0.0.1" => BindMode::Loopback,
                _ => BindMode::Lan,
            };
            let auth = if no_auth {
                AuthConfig { mode: AuthMode::None, token: None }
            } else {
                AuthConfig { mode: AuthMode::Token, token }
            };
            let gateway_config = GatewayConfig { port, bind: bind_mode, auth };

            let workspace_root = workspace
                .or_else(|| std::env::var("CONCLAVE_WORKSPACE").ok().map(PathBuf::from))
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

            let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
            let profiles: BTreeMap<String, Profile> = BTreeMap::new();
            let supervisor = build_supervisor(anthropic_api_key, model, profiles, workspace_root);

            let resolved_auth = ResolvedAuth::from_config(&gateway_config.auth, std::env::var("CONCLAVE_TOKEN").ok());
            let state = Arc::new(AppState { auth: resolved_auth, supervisor });

            let bind_addr = format!("{}:{}", gateway_config.bind.to_addr(), gateway_config.port).parse()?;
            server::serve(bind_addr, state).await?;
        }

        Some(Commands::Version) | None => {
            println!("conclave v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
