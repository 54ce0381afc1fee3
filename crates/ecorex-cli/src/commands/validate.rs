//! Validate command
//!
//! Usage: ecorex validate <FILE>...

use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use ecorex_core::errors::ExError;
use ecorex_core::rules::validation;

use super::{load_document, open_workspace, WorkspaceArgs};

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Model documents to check
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Execute validate command
///
/// Every file is checked even after a failure; the command fails when any
/// file does.
pub fn execute(workspace: &WorkspaceArgs, args: ValidateArgs) -> anyhow::Result<()> {
    let mut rs = open_workspace(workspace)?;
    let mut failed = 0;

    for file in &args.files {
        let outcome = load_document(&mut rs, file).and_then(|resource| {
            validation::validate_resource(&rs, resource).map_err(|e| anyhow::Error::new(ExError::from(e)))
        });
        match outcome {
            Ok(()) => println!("✓ {}", file.display()),
            Err(e) => {
                failed += 1;
                println!("✗ {}: {:#}", file.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} document(s) failed validation", failed, args.files.len());
    }
    Ok(())
}
