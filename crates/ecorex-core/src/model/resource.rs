//! Resources: addressable root containers persisted to one document each

use std::collections::HashMap;
use std::fmt;

use crate::meta::EPackage;
use crate::model::ObjectId;
use crate::ops::notify::ListenerList;

/// Handle of a resource within its resource set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource#{}", self.0)
    }
}

/// State of one resource
pub struct Resource {
    pub(crate) uri: String,
    pub(crate) contents: Vec<ObjectId>,
    pub(crate) id_map: HashMap<String, ObjectId>,
    pub(crate) packages: Vec<EPackage>,
    pub(crate) proxies: Vec<ObjectId>,
    pub(crate) loaded: bool,
    pub(crate) modified: bool,
    pub(crate) warnings: Vec<String>,
    pub(crate) listeners: ListenerList,
}

impl Resource {
    pub(crate) fn new(uri: &str) -> Self {
        Resource {
            uri: uri.to_string(),
            contents: Vec::new(),
            id_map: HashMap::new(),
            packages: Vec::new(),
            proxies: Vec::new(),
            loaded: false,
            modified: false,
            warnings: Vec::new(),
            listeners: ListenerList::default(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Root objects in order
    pub fn contents(&self) -> &[ObjectId] {
        &self.contents
    }

    /// Packages held by a metamodel resource
    pub fn packages(&self) -> &[EPackage] {
        &self.packages
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Object registered under an explicit id
    pub fn object_by_id(&self, id: &str) -> Option<ObjectId> {
        self.id_map.get(id).copied()
    }

    pub fn id_count(&self) -> usize {
        self.id_map.len()
    }

    /// Proxies created while this resource was loaded
    pub fn proxies(&self) -> &[ObjectId] {
        &self.proxies
    }

    /// Non-fatal problems reported by the last load or save
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("uri", &self.uri)
            .field("contents", &self.contents)
            .field("loaded", &self.loaded)
            .finish()
    }
}
