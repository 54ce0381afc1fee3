//! Inspect command
//!
//! Usage: ecorex inspect <FILE> [--depth <N>]

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use ecorex_core::meta::EStructuralFeature;
use ecorex_core::ops::{navigation, reflect_ops, resource_ops, ResourceSet};
use ecorex_core::{ObjectId, ResourceId, Value};

use super::{load_document, open_workspace, WorkspaceArgs};

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Model document to inspect
    pub file: PathBuf,

    /// Stop descending below this containment depth
    #[arg(short, long)]
    pub depth: Option<usize>,
}

/// Execute inspect command
pub fn execute(workspace: &WorkspaceArgs, args: InspectArgs) -> anyhow::Result<()> {
    let mut rs = open_workspace(workspace)?;
    let resource = load_document(&mut rs, &args.file)?;
    print!("{}", render_resource(&rs, resource, args.depth)?);
    Ok(())
}

/// One header line, then one line per object, indented by containment depth
pub fn render_resource(rs: &ResourceSet, resource: ResourceId, depth: Option<usize>) -> anyhow::Result<String> {
    let res = rs.resource(resource)?;
    let mut out = String::new();
    writeln!(
        out,
        "{}: {} root(s), {} proxy(ies)",
        res.uri(),
        res.contents().len(),
        res.proxies().len()
    )?;
    if !res.packages().is_empty() {
        writeln!(out, "metamodel document; use `ecorex ecore` for a summary")?;
    }
    for root in resource_ops::contents(rs, resource)? {
        render_object(rs, resource, root, 0, depth, &mut out)?;
    }
    Ok(out)
}

fn render_object(
    rs: &ResourceSet,
    resource: ResourceId,
    object: ObjectId,
    level: usize,
    depth: Option<usize>,
    out: &mut String,
) -> anyhow::Result<()> {
    let class = rs.class_of(object)?;
    let prefix = class.package().map(|p| p.ns_prefix()).unwrap_or_default();
    let fragment = navigation::uri_fragment(rs, object).unwrap_or_default();
    write!(out, "{}{} {}:{}", "  ".repeat(level), fragment, prefix, class.name())?;

    for feature in class.all_features() {
        if feature.is_containment() || feature.is_container() || feature.is_derived() {
            continue;
        }
        let value = reflect_ops::peek(rs, object, &feature)?;
        if let Some(text) = render_value(rs, resource, &feature, &value) {
            write!(out, " {}={}", feature.name(), text)?;
        }
    }
    writeln!(out)?;

    if depth.is_some_and(|d| level >= d) {
        return Ok(());
    }
    for child in navigation::e_contents(rs, object) {
        render_object(rs, resource, child, level + 1, depth, out)?;
    }
    Ok(())
}

fn render_value(rs: &ResourceSet, resource: ResourceId, feature: &EStructuralFeature, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::List(items) if items.is_empty() => None,
        Value::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| render_value(rs, resource, feature, v))
                .collect();
            Some(format!("[{}]", parts.join(" ")))
        }
        Value::Object(target) => Some(reference_text(rs, resource, *target)),
        other => {
            let text = feature
                .data_type()
                .and_then(|dt| dt.to_string(other))
                .unwrap_or_else(|_| format!("{:?}", other));
            Some(format!("{:?}", text))
        }
    }
}

/// Fragment for same-document targets, full URI otherwise
fn reference_text(rs: &ResourceSet, resource: ResourceId, target: ObjectId) -> String {
    let effective = rs.effective(target);
    if navigation::resource_of(rs, effective) == Some(resource) {
        return navigation::uri_fragment(rs, effective).unwrap_or_default();
    }
    navigation::uri_of(rs, effective)
        .or_else(|| navigation::proxy_uri(rs, target))
        .unwrap_or_else(|| target.to_string())
}
