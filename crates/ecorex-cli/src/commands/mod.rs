//! Subcommands and the workspace setup they share

pub mod convert;
pub mod ecore;
pub mod inspect;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Args;
use ecorex_core::ops::{resource_ops, ResourceSet};
use ecorex_core::ResourceId;
use ecorex_store::WorkspaceConfig;

/// Options every subcommand accepts
#[derive(Debug, Args)]
pub struct WorkspaceArgs {
    /// Workspace configuration (default: nearest ecorex.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Additional metamodel document to register (repeatable)
    #[arg(short, long = "metamodel", global = true)]
    pub metamodels: Vec<PathBuf>,

    /// Log operation boundaries to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Resource set with the workspace configuration applied and every
/// requested metamodel registered
pub fn open_workspace(args: &WorkspaceArgs) -> anyhow::Result<ResourceSet> {
    let mut rs = ecorex_store::standard_resource_set();

    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => std::env::current_dir()
            .ok()
            .and_then(|dir| WorkspaceConfig::discover(&dir)),
    };
    if let Some(path) = config_path {
        let config = WorkspaceConfig::load(&path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        config
            .apply(&mut rs)
            .with_context(|| format!("applying configuration {}", path.display()))?;
    }

    for metamodel in &args.metamodels {
        load_document(&mut rs, metamodel)?;
    }
    Ok(rs)
}

/// Load a document into `rs` by its path
pub fn load_document(rs: &mut ResourceSet, path: &Path) -> anyhow::Result<ResourceId> {
    let uri = path.display().to_string();
    resource_ops::get_resource(rs, &uri, true)
        .with_context(|| format!("loading {}", uri))?
        .ok_or_else(|| anyhow!("no resource for {}", uri))
}
