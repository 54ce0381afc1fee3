//! Ecore command
//!
//! Usage: ecorex ecore <FILE>

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use ecorex_core::meta::{EClassifier, EStructuralFeature};
use ecorex_core::EPackage;

use super::{load_document, open_workspace, WorkspaceArgs};

#[derive(Debug, Args)]
pub struct EcoreArgs {
    /// Metamodel document (.ecore)
    pub file: PathBuf,
}

/// Execute ecore command
pub fn execute(workspace: &WorkspaceArgs, args: EcoreArgs) -> anyhow::Result<()> {
    let mut rs = open_workspace(workspace)?;
    let resource = load_document(&mut rs, &args.file)?;
    let packages = rs.resource(resource)?.packages().to_vec();
    if packages.is_empty() {
        bail!("{} is not a metamodel document", args.file.display());
    }

    let mut out = String::new();
    for package in &packages {
        render_package(package, 0, &mut out)?;
    }
    print!("{}", out);
    Ok(())
}

/// Packages, classifiers and features as an indented outline
pub fn render_package(package: &EPackage, level: usize, out: &mut String) -> std::fmt::Result {
    let pad = "  ".repeat(level);
    writeln!(
        out,
        "{}package {} ({}) prefix {}",
        pad,
        package.name(),
        package.ns_uri(),
        package.ns_prefix()
    )?;

    for classifier in package.classifiers() {
        match &classifier {
            EClassifier::Class(class) => {
                let kind = if class.is_interface() {
                    "interface"
                } else if class.is_abstract() {
                    "abstract class"
                } else {
                    "class"
                };
                let supers: Vec<String> = class.super_types().iter().map(|s| s.name()).collect();
                if supers.is_empty() {
                    writeln!(out, "{}  {} {}", pad, kind, class.name())?;
                } else {
                    writeln!(out, "{}  {} {} : {}", pad, kind, class.name(), supers.join(", "))?;
                }
                for feature in class.features() {
                    writeln!(out, "{}    {}", pad, describe_feature(&feature))?;
                }
                for operation in class.operations() {
                    writeln!(out, "{}    {}()", pad, operation.name())?;
                }
            }
            EClassifier::DataType(data_type) if data_type.is_enum() => {
                let literals: Vec<String> = data_type.literals().iter().map(|l| l.name()).collect();
                writeln!(out, "{}  enum {} {{ {} }}", pad, data_type.name(), literals.join(", "))?;
            }
            EClassifier::DataType(data_type) => {
                writeln!(out, "{}  datatype {}", pad, data_type.name())?;
            }
        }
    }

    for sub in package.sub_packages() {
        render_package(&sub, level + 1, out)?;
    }
    Ok(())
}

fn describe_feature(feature: &EStructuralFeature) -> String {
    let type_name = feature
        .e_type_opt()
        .map(|t| t.name())
        .unwrap_or_else(|| "?".to_string());
    let upper = match feature.upper_bound() {
        n if n < 0 => "*".to_string(),
        n => n.to_string(),
    };
    let mut text = format!(
        "{} : {} [{}..{}]",
        feature.name(),
        type_name,
        feature.lower_bound(),
        upper
    );
    if feature.is_containment() {
        text.push_str(" containment");
    }
    if let Some(opposite) = feature.opposite() {
        text.push_str(&format!(" opposite {}", opposite.name()));
    }
    if feature.is_derived() {
        text.push_str(" derived");
    }
    text
}
