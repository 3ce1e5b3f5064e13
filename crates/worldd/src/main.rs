//! worldd — the WorldGrid world server daemon.
//!
//! Brings one world server from cold start to an accepting listener,
//! registers it with the coordination service, and shuts it down in order
//! when the OS asks it to stop.
//!
//! # Usage
//!
//! ```text
//! worldd run --config /etc/worldgrid/world.toml
//! worldd standalone --port 1337 --server-group S1-Local
//! ```

mod banner;
mod handler;
mod node;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use world_core::WorldConfig;
use worldgrid_cluster::{GrpcCoordinationClient, LocalCoordination};
use worldgrid_state::{InMemoryInitializer, PersistenceInitializer, RedbInitializer};

const DEFAULT_LOG_FILTER: &str = "info,worldd=debug,worldgrid=debug";

#[derive(Parser)]
#[command(name = "worldd", version, about = "WorldGrid world server daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run as a cluster member, registering with the coordination service.
    Run {
        /// Path to world.toml.
        #[arg(long, short)]
        config: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Run on its own with an in-process coordinator.
    Standalone {
        /// Path to world.toml. Defaults to a local single-node setup.
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Keep all state in memory.
        #[arg(long)]
        ephemeral: bool,

        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(Args, Default)]
struct Overrides {
    /// Port to try first.
    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    server_group: Option<String>,

    /// Maximum concurrent sessions.
    #[arg(long)]
    session_limit: Option<u32>,
}

impl Overrides {
    fn apply(self, config: &mut WorldConfig) {
        if let Some(port) = self.port {
            config.world.port = port;
        }
        if let Some(group) = self.server_group {
            config.world.server_group = group;
        }
        if let Some(limit) = self.session_limit {
            config.world.session_limit = limit;
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    banner::print();

    match cli.command {
        Command::Run { config, overrides } => run_cluster(config, overrides).await,
        Command::Standalone {
            config,
            ephemeral,
            overrides,
        } => run_standalone(config, ephemeral, overrides).await,
    }
}

fn load_config(path: Option<&PathBuf>, overrides: Overrides) -> anyhow::Result<WorldConfig> {
    let mut config = match path {
        Some(path) => WorldConfig::from_file(path)?,
        None => WorldConfig::scaffold("S1-Local", 1337),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run_cluster(path: PathBuf, overrides: Overrides) -> ExitCode {
    let config = match load_config(Some(&path), overrides) {
        Ok(config) => config,
        Err(e) => {
            error!(path = ?path, error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let Some(endpoint) = config.coordination.endpoint.clone() else {
        error!("coordination.endpoint is required in cluster mode");
        return ExitCode::FAILURE;
    };
    let messages = match node::load_messages(&config) {
        Ok(messages) => messages,
        Err(e) => {
            error!(error = %e, "failed to load message catalog");
            return ExitCode::FAILURE;
        }
    };

    let coordination =
        match GrpcCoordinationClient::connect_lazy(&endpoint, config.coordination.timeout()) {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, "invalid coordination endpoint");
                return ExitCode::FAILURE;
            }
        };
    info!(uri = coordination.uri(), "starting world server in cluster mode");

    let persistence = RedbInitializer::new(config.database.path.clone());
    node::run_node(config, messages, coordination, &persistence).await
}

async fn run_standalone(path: Option<PathBuf>, ephemeral: bool, overrides: Overrides) -> ExitCode {
    let config = match load_config(path.as_ref(), overrides) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let messages = match node::load_messages(&config) {
        Ok(messages) => messages,
        Err(e) => {
            error!(error = %e, "failed to load message catalog");
            return ExitCode::FAILURE;
        }
    };

    let coordination = LocalCoordination::new(config.coordination.local_channels);
    info!(
        channels = config.coordination.local_channels,
        ephemeral, "starting world server in standalone mode"
    );

    let persistence: Box<dyn PersistenceInitializer> = if ephemeral {
        Box::new(InMemoryInitializer)
    } else {
        Box::new(RedbInitializer::new(config.database.path.clone()))
    };
    node::run_node(config, messages, coordination, persistence.as_ref()).await
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = WorldConfig::scaffold("S1", 1337);
        Overrides {
            port: Some(4000),
            server_group: Some("S2".into()),
            session_limit: None,
        }
        .apply(&mut config);
        assert_eq!(config.world.port, 4000);
        assert_eq!(config.world.server_group, "S2");
        assert_eq!(config.world.session_limit, 500);
    }

    #[test]
    fn standalone_defaults_are_valid() {
        let config = load_config(None, Overrides::default()).unwrap();
        assert_eq!(config.world.server_group, "S1-Local");
    }

    #[test]
    fn example_config_parses() {
        let config = WorldConfig::from_toml(include_str!("../world.example.toml")).unwrap();
        assert_eq!(config.world.port, 1337);
        assert_eq!(config.coordination.endpoint.as_deref(), Some("127.0.0.1:6969"));
        assert_eq!(config.shutdown.grace_secs, 5);
    }

    #[test]
    fn zero_session_limit_is_rejected() {
        let overrides = Overrides {
            session_limit: Some(0),
            ..Overrides::default()
        };
        assert!(load_config(None, overrides).is_err());
    }
}
