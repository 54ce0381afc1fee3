//! Convert command
//!
//! Usage: ecorex convert <INPUT> <OUTPUT> [--uuid] [--emit-defaults] [--compact]

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use ecorex_core::ops::resource_ops;
use ecorex_core::persistence::SaveOptions;

use super::{load_document, open_workspace, WorkspaceArgs};

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Document to read
    pub input: PathBuf,

    /// Document to write; its extension selects the format
    pub output: PathBuf,

    /// Give every object without an id a fresh UUID
    #[arg(long)]
    pub uuid: bool,

    /// Write unset features with their default values
    #[arg(long)]
    pub emit_defaults: bool,

    /// No indentation
    #[arg(long)]
    pub compact: bool,
}

/// Execute convert command
pub fn execute(workspace: &WorkspaceArgs, args: ConvertArgs) -> anyhow::Result<()> {
    let mut rs = open_workspace(workspace)?;
    let resource = load_document(&mut rs, &args.input)?;

    let configured = rs.save_options().clone();
    rs.set_save_options(SaveOptions {
        emit_defaults: configured.emit_defaults || args.emit_defaults,
        use_uuid: configured.use_uuid || args.uuid,
        indent: if args.compact { 0 } else { configured.indent },
    });

    let output = args.output.display().to_string();
    resource_ops::set_uri(&mut rs, resource, &output)?;
    resource_ops::save(&mut rs, resource).with_context(|| format!("writing {}", output))?;

    println!("✓ Converted {} to {}", args.input.display(), args.output.display());
    Ok(())
}
