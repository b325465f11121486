use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;

/// genflow CLI - run and inspect generative flows
#[derive(Parser, Debug)]
#[command(name = "genflowctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// FlowConfig YAML file (defaults: in-memory store, no model backend)
    #[arg(long, short = 'c', global = true, env = "GENFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at info level (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered flows with their shape and mode
    Flows {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Show a flow's input and output schemas and its prompt template
    Describe {
        /// Flow name
        flow: String,
    },

    /// Invoke a flow and print its output as JSON
    Run {
        /// Flow name
        flow: String,

        /// Input as inline JSON
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Path to a JSON file holding the input
        #[arg(short = 'f', long)]
        input_file: Option<PathBuf>,
    },

    /// Manage stored prompts
    Prompts {
        #[command(subcommand)]
        command: PromptsCommands,
    },

    /// Check store connectivity
    Health,
}

#[derive(Subcommand, Debug)]
pub enum PromptsCommands {
    /// List unarchived prompts
    List,

    /// Create or update a prompt from a JSON file
    Save {
        /// JSON file with the prompt fields (include `id` to update)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Archive a prompt by id
    Archive {
        id: String,
    },
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        let runtime = commands::load_runtime(self.config.as_deref()).await?;

        match self.command {
            Commands::Flows { output } => commands::flows::execute(&runtime, &output),
            Commands::Describe { flow } => commands::describe::execute(&runtime, &flow),
            Commands::Run {
                flow,
                input,
                input_file,
            } => commands::run::execute(&runtime, &flow, input.as_deref(), input_file.as_deref()).await,
            Commands::Prompts { command } => commands::prompts::execute(&runtime, command).await,
            Commands::Health => commands::health::execute(&runtime).await,
        }
    }
}
