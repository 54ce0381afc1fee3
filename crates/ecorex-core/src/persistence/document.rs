//! Format-neutral document trees
//!
//! Readers produce and writers consume [`DocNode`] trees. A concrete format
//! (XML, JSON) only maps bytes to trees and back; everything model-specific
//! happens in the serializer and deserializer over the tree.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// One element: qualified tag, ordered attributes, source line, text and
/// child elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing)]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocNode>,
}

impl DocNode {
    pub fn new(tag: impl Into<String>) -> Self {
        DocNode {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder form of [`Self::set_attr`]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn push(&mut self, child: DocNode) {
        self.children.push(child);
    }

    /// Namespace prefix of the tag (`ecore` in `ecore:EPackage`)
    pub fn prefix(&self) -> Option<&str> {
        self.tag.split_once(':').map(|(p, _)| p)
    }

    /// Tag without its namespace prefix
    pub fn local_name(&self) -> &str {
        self.tag.split_once(':').map_or(self.tag.as_str(), |(_, l)| l)
    }

    /// `xmlns:prefix` declarations as `(prefix, namespace)` pairs
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter_map(|(n, v)| n.strip_prefix("xmlns:").map(|p| (p, v.as_str())))
    }
}

/// Options shared by every writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    /// Write unset features with their default values
    pub emit_defaults: bool,
    /// Give every object without an id a fresh UUID before writing
    pub use_uuid: bool,
    /// Indentation width; `0` writes compact output
    pub indent: usize,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            emit_defaults: false,
            use_uuid: false,
            indent: 2,
        }
    }
}

/// A concrete byte encoding of document trees
pub trait DocumentFormat {
    /// Short name used in logs (`xml`, `json`)
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// `DocumentMalformed` when the bytes are not a well-formed document.
    fn parse(&self, bytes: &[u8]) -> Result<DocNode>;

    /// # Errors
    ///
    /// `Serialization` when the tree cannot be encoded.
    fn write(&self, root: &DocNode, options: &SaveOptions) -> Result<Vec<u8>>;
}
