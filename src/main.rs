//! Ensemble CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use ensemble::cli::{commands, Cli, Commands, ConfigCommands};
use ensemble::infrastructure::{init_logging, ConfigLoader};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load().context("Failed to load configuration")?;
    init_logging(&config.log);

    match cli.command {
        Commands::Run {
            kind,
            prompt,
            priority,
            adapter,
            validate,
        } => {
            commands::handle_run(
                &config,
                &kind,
                &prompt,
                &priority,
                adapter.as_deref(),
                validate,
                cli.json,
            )
            .await
        }
        Commands::Collab {
            mode,
            adapters,
            kind,
            prompt,
            strategy,
            max_iterations,
            stop_on_consensus,
        } => {
            commands::handle_collab(
                &config,
                &mode,
                &adapters,
                &kind,
                &prompt,
                &strategy,
                max_iterations,
                stop_on_consensus,
                cli.json,
            )
            .await
        }
        Commands::ClusterDemo {
            nodes,
            tasks,
            kill_one,
        } => commands::handle_cluster_demo(&config, nodes, tasks, kill_one, cli.json).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::handle_config_show(&config, cli.json),
        },
    }
}
