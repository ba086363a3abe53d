use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tattle",
    about = "Tattle: track and report changes across live object graphs",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a document, replay an edit script, and report pending changes
    Report {
        /// Path to the base JSON document
        #[arg(long)]
        base: PathBuf,

        /// Path to a JSON edit script applied before evaluation
        #[arg(long)]
        edits: Option<PathBuf>,

        /// Register the document as pending insertion instead of committed state
        #[arg(long)]
        as_added: bool,

        /// Path to a tracker configuration TOML file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List tracked objects with identifier, status, and type
    Objects {
        /// Path to the base JSON document
        #[arg(long)]
        base: PathBuf,

        /// Path to a JSON edit script applied before evaluation
        #[arg(long)]
        edits: Option<PathBuf>,

        /// Only list objects carrying this type tag
        #[arg(long = "type")]
        type_name: Option<String>,

        /// Path to a tracker configuration TOML file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
