//! Tattle CLI: the `tattle` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            base,
            edits,
            as_added,
            config,
            json,
        } => commands::report::run(base, edits, as_added, config, json),

        Commands::Objects {
            base,
            edits,
            type_name,
            config,
            json,
        } => commands::objects::run(base, edits, type_name, config, json),
    }
}
