//! JSON encoding of document trees
//!
//! Each node is an object `{"tag", "attributes": [[name, value], ...],
//! "text", "children"}`. JSON carries no source positions, so nodes read
//! from it have no line.

use crate::errors::{ModelError, Result};
use crate::persistence::{DocNode, DocumentFormat, SaveOptions};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl DocumentFormat for JsonFormat {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(&self, bytes: &[u8]) -> Result<DocNode> {
        serde_json::from_slice(bytes).map_err(|e| ModelError::malformed(e.to_string(), Some(e.line())))
    }

    fn write(&self, root: &DocNode, options: &SaveOptions) -> Result<Vec<u8>> {
        let mut bytes = if options.indent > 0 {
            serde_json::to_vec_pretty(root)?
        } else {
            serde_json::to_vec(root)?
        };
        bytes.push(b'\n');
        Ok(bytes)
    }
}
