use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "sitepulse",
    about = "Weekly website performance digest with AI-generated improvement hypotheses"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the API server and the weekly collection scheduler.
    Serve,
    /// Collect and analyze one week immediately.
    Collect {
        /// Monday of the week to collect (defaults to the last completed week).
        #[arg(long)]
        start: Option<String>,
    },
    Status,
    Doctor,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum ModelCommands {
    /// Probe the model service with the configured credentials.
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}
