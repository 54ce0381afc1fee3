//! EcoreX CLI
//!
//! Command-line interface for inspecting, validating and converting model
//! documents

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "ecorex")]
#[command(about = "EcoreX - Reflective model documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    workspace: commands::WorkspaceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the object tree of a model document
    Inspect(commands::inspect::InspectArgs),
    /// Check model documents against their metamodels
    Validate(commands::validate::ValidateArgs),
    /// Re-encode a document (format follows the output extension)
    Convert(commands::convert::ConvertArgs),
    /// Summarize the packages of a metamodel document
    Ecore(commands::ecore::EcoreArgs),
}

fn main() {
    let cli = Cli::parse();

    if cli.workspace.verbose {
        ecorex_core::logging_facility::init(ecorex_core::logging_facility::Profile::Development);
    }

    let result = match cli.command {
        Commands::Inspect(args) => commands::inspect::execute(&cli.workspace, args),
        Commands::Validate(args) => commands::validate::execute(&cli.workspace, args),
        Commands::Convert(args) => commands::convert::execute(&cli.workspace, args),
        Commands::Ecore(args) => commands::ecore::execute(&cli.workspace, args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
