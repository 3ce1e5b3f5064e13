//! Node runner shared by cluster and standalone mode.
//!
//! Drives one world server from bootstrap to termination and maps the
//! outcome onto the process exit code.

use std::io::{BufRead, IsTerminal};
use std::process::ExitCode;

use tracing::{error, info, warn};
use world_core::{MessageCatalog, WorldConfig};
use worldgrid_cluster::CoordinationService;
use worldgrid_lifecycle::{Bootstrap, LifecycleError, TerminationSignalHandler};
use worldgrid_net::Plaintext;
use worldgrid_state::PersistenceInitializer;

use crate::handler::TraceHandler;

/// Built-in catalog, with the configured overrides applied.
pub fn load_messages(config: &WorldConfig) -> anyhow::Result<MessageCatalog> {
    match &config.messages {
        Some(path) => {
            let catalog = MessageCatalog::load(path)?;
            info!(path = ?path, "message catalog loaded");
            Ok(catalog)
        }
        None => Ok(MessageCatalog::default()),
    }
}

pub async fn run_node<C, P>(
    config: WorldConfig,
    messages: MessageCatalog,
    coordination: C,
    persistence: &P,
) -> ExitCode
where
    C: CoordinationService,
    P: PersistenceInitializer + ?Sized,
{
    let bootstrap = Bootstrap::<C, Plaintext, TraceHandler>::new(config, messages, coordination);

    let running = match bootstrap.start(persistence).await {
        Ok(running) => running,
        Err(e) => return startup_failed(&e),
    };
    if running.is_degraded() {
        warn!("no channel assigned, players will be told this channel is unregistered");
    }

    let requests = match TerminationSignalHandler::install() {
        Ok(requests) => Some(requests),
        Err(e) => {
            error!(error = %e, "graceful shutdown unavailable");
            None
        }
    };

    match running.serve(requests).await {
        Ok(report) => {
            if let Some(report) = report {
                info!(
                    kind = %report.kind,
                    saved = report.saved,
                    deregistered = report.deregistered,
                    "world server stopped"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "world server stopped uncleanly");
            ExitCode::FAILURE
        }
    }
}

fn startup_failed(e: &LifecycleError) -> ExitCode {
    if let LifecycleError::PersistenceInit(_) = e {
        error!("database is unavailable, the world server will not start");
        wait_for_acknowledgment();
    }
    ExitCode::from(e.exit_code())
}

/// Hold the console open until the operator presses Enter.
fn wait_for_acknowledgment() {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return;
    }
    println!("Press Enter to exit...");
    let mut line = String::new();
    let _ = stdin.lock().read_line(&mut line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_without_override() {
        let config = WorldConfig::scaffold("S1", 1337);
        let catalog = load_messages(&config).unwrap();
        assert_eq!(
            catalog.format(world_core::messages::SHUTDOWN_SEC, &[&5]),
            "The server will shut down in 5 seconds!"
        );
    }

    #[test]
    fn missing_override_file_is_an_error() {
        let mut config = WorldConfig::scaffold("S1", 1337);
        config.messages = Some("/nonexistent/messages.toml".into());
        assert!(load_messages(&config).is_err());
    }
}
