//! EcoreX Store - Document formats, filesystem access and configuration
//!
//! Provides the concrete collaborators `ecorex-core` consumes through its
//! persistence traits:
//! - XML document trees (`.xmi`, `.xml`, `.ecore`) via quick-xml
//! - A filesystem byte-stream provider with atomic writes
//! - `ecorex.toml` workspace configuration

pub mod config;
pub mod errors;
pub mod fs;
pub mod xml;

use std::path::PathBuf;
use std::rc::Rc;

use ecorex_core::ops::ResourceSet;
use ecorex_core::persistence::JsonFormat;

// Re-export key types
pub use config::WorkspaceConfig;
pub use errors::Result;
pub use fs::FileProvider;
pub use xml::XmlFormat;

/// Extensions served by [`XmlFormat`]
pub const XML_EXTENSIONS: &[&str] = &["xmi", "xml", "ecore"];

/// A resource set reading and writing files relative to the working
/// directory, with XML registered for [`XML_EXTENSIONS`] and JSON for `json`
pub fn standard_resource_set() -> ResourceSet {
    configure(ResourceSet::new(), FileProvider::new())
}

/// Like [`standard_resource_set`], resolving relative URIs against `base`
pub fn resource_set_in(base: impl Into<PathBuf>) -> ResourceSet {
    configure(ResourceSet::new(), FileProvider::with_base(base))
}

fn configure(mut rs: ResourceSet, provider: FileProvider) -> ResourceSet {
    let xml = Rc::new(XmlFormat);
    for extension in XML_EXTENSIONS {
        rs.register_format(extension, xml.clone());
    }
    rs.register_format("json", Rc::new(JsonFormat));
    rs.set_provider(Rc::new(provider));
    rs
}
