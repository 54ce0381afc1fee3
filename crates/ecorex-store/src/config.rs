//! Workspace configuration (`ecorex.toml`)
//!
//! ```toml
//! metamodels = ["model/library.ecore"]
//!
//! [uri_map]
//! "platform:/resource/" = "workspace/"
//!
//! [save]
//! emit_defaults = false
//! use_uuid = true
//! ```
//!
//! Relative paths (metamodels and mapping targets) resolve against the
//! directory holding the configuration file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ecorex_core::meta::EPackage;
use ecorex_core::ops::{resource_ops, ResourceSet};
use ecorex_core::persistence::SaveOptions;
use serde::{Deserialize, Serialize};

use crate::errors::{config_error, io_error, Result};

/// Default configuration file name
pub const CONFIG_FILE: &str = "ecorex.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Metamodel documents loaded and registered before any model
    #[serde(default)]
    pub metamodels: Vec<PathBuf>,
    /// URI prefix rewrites, source prefix to replacement
    #[serde(default)]
    pub uri_map: BTreeMap<String, String>,
    #[serde(default)]
    pub save: SaveSection,
    /// Directory relative paths resolve against
    #[serde(skip)]
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveSection {
    #[serde(default)]
    pub emit_defaults: bool,
    #[serde(default)]
    pub use_uuid: bool,
    #[serde(default = "default_indent")]
    pub indent: usize,
}

fn default_indent() -> usize {
    2
}

impl Default for SaveSection {
    fn default() -> Self {
        SaveSection {
            emit_defaults: false,
            use_uuid: false,
            indent: default_indent(),
        }
    }
}

impl From<&SaveSection> for SaveOptions {
    fn from(section: &SaveSection) -> Self {
        SaveOptions {
            emit_defaults: section.emit_defaults,
            use_uuid: section.use_uuid,
            indent: section.indent,
        }
    }
}

impl WorkspaceConfig {
    /// Parse configuration text; relative paths resolve against `root`
    ///
    /// # Errors
    ///
    /// `Serialization` when the text is not a valid configuration.
    pub fn parse(text: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let label = root.display().to_string();
        Self::from_text(text, root, &label)
    }

    fn from_text(text: &str, root: PathBuf, label: &str) -> Result<Self> {
        let mut config: WorkspaceConfig = toml::from_str(text).map_err(|e| config_error(label, &e.to_string()))?;
        config.root = root;
        Ok(config)
    }

    /// Read and parse a configuration file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, `Serialization` when it does not
    /// parse.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| io_error("config_read", e))?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let config = Self::from_text(&text, root, &path.display().to_string())?;
        tracing::debug!(
            path = %path.display(),
            metamodels = config.metamodels.len(),
            uri_map = config.uri_map.len(),
            "workspace configuration loaded"
        );
        Ok(config)
    }

    /// Look for [`CONFIG_FILE`] in `dir` and its ancestors
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        dir.ancestors()
            .map(|d| d.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Absolute or root-relative location for a configured path
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.root.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Install mappings and save options, then load every metamodel
    ///
    /// Returns the packages registered from the metamodel documents, in
    /// configuration order.
    ///
    /// # Errors
    ///
    /// Whatever loading a metamodel reports (`ResourceNotFound`,
    /// `DocumentMalformed`, ...).
    pub fn apply(&self, rs: &mut ResourceSet) -> Result<Vec<EPackage>> {
        for (from, to) in &self.uri_map {
            let mut target = if to.contains(':') {
                to.clone()
            } else {
                self.resolve_path(Path::new(to)).display().to_string()
            };
            if to.ends_with('/') && !target.ends_with('/') {
                target.push('/');
            }
            rs.uri_mapper_mut().insert(from, &target);
        }
        rs.set_save_options(SaveOptions::from(&self.save));

        let mut packages = Vec::new();
        for metamodel in &self.metamodels {
            let uri = self.resolve_path(metamodel).display().to_string();
            if let Some(resource) = resource_ops::get_resource(rs, &uri, true)? {
                packages.extend(rs.resource(resource)?.packages().iter().cloned());
            }
        }
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let text = r#"
metamodels = ["model/library.ecore"]

[uri_map]
"platform:/resource/" = "ws/"

[save]
use_uuid = true
"#;
        let config = WorkspaceConfig::parse(text, "/project").unwrap();

        assert_eq!(config.metamodels, vec![PathBuf::from("model/library.ecore")]);
        assert_eq!(config.uri_map.get("platform:/resource/").map(String::as_str), Some("ws/"));
        assert!(config.save.use_uuid);
        assert!(!config.save.emit_defaults);
        assert_eq!(config.save.indent, 2);
        assert_eq!(
            config.resolve_path(Path::new("model/library.ecore")),
            PathBuf::from("/project/model/library.ecore")
        );
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = WorkspaceConfig::parse("metamodel = []", "/project").unwrap_err();
        assert_eq!(err.code(), "ERR_SERIALIZATION");
    }

    #[test]
    fn test_discover_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE), "").unwrap();

        assert_eq!(
            WorkspaceConfig::discover(&nested),
            Some(temp_dir.path().join(CONFIG_FILE))
        );
    }

    #[test]
    fn test_apply_installs_mapping_and_save_options() {
        let config = WorkspaceConfig::parse(
            "[uri_map]\n\"platform:/resource/\" = \"mem:/\"\n[save]\nemit_defaults = true\n",
            "/project",
        )
        .unwrap();
        let mut rs = ResourceSet::new();

        let packages = config.apply(&mut rs).unwrap();

        assert!(packages.is_empty());
        assert_eq!(rs.normalize_uri("platform:/resource/a.xmi"), "mem:/a.xmi");
        assert!(rs.save_options().emit_defaults);
    }
}
