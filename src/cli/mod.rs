//! CLI definitions.

pub mod commands;
pub mod display;

use clap::{Parser, Subcommand};

/// Ensemble: AI-assistant orchestration core.
#[derive(Debug, Parser)]
#[command(name = "ensemble", version, about, long_about = None)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Route and execute a single task through the full pipeline (demo
    /// adapters).
    Run {
        /// Task kind (code_generation, refactoring, search, ...).
        #[arg(long)]
        kind: String,
        /// The prompt.
        #[arg(long)]
        prompt: String,
        /// Priority: low, medium, high, urgent.
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Force a specific adapter instead of routing.
        #[arg(long)]
        adapter: Option<String>,
        /// Validate the result after success.
        #[arg(long)]
        validate: bool,
    },

    /// Run a multi-adapter collaboration.
    Collab {
        /// Mode: sequential, parallel, review, iterative.
        #[arg(long)]
        mode: String,
        /// Comma-separated adapter ids, e.g. claude,gemini.
        #[arg(long, value_delimiter = ',')]
        adapters: Vec<String>,
        #[arg(long)]
        kind: String,
        #[arg(long)]
        prompt: String,
        /// Merge strategy for parallel mode.
        #[arg(long, default_value = "combine")]
        strategy: String,
        #[arg(long, default_value_t = 3)]
        max_iterations: u32,
        #[arg(long)]
        stop_on_consensus: bool,
    },

    /// Spin up an in-process cluster, submit tasks, and watch them drain.
    ClusterDemo {
        #[arg(long, default_value_t = 2)]
        nodes: usize,
        #[arg(long, default_value_t = 5)]
        tasks: usize,
        /// Kill one node mid-run to demonstrate failover.
        #[arg(long)]
        kill_one: bool,
    },

    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the merged configuration as YAML.
    Show,
}
