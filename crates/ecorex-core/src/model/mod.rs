//! Runtime object model
//!
//! Model objects live in an arena owned by their `ResourceSet` and are
//! addressed by copyable [`ObjectId`] handles. Containment forms the tree;
//! non-containment edges are slot values plus an inverse-relation side table
//! on the target.

pub mod collection;
pub mod resource;
pub mod uri;

use std::collections::{HashMap, HashSet};
use std::fmt;

pub use collection::{CollectionShape, EList, ValueList};
pub use resource::{Resource, ResourceId};
pub use uri::{Uri, UriMapper};

use crate::meta::{EClass, EStructuralFeature};
use crate::ops::notify::ListenerList;
use crate::value::Value;

/// Handle of a model object within its resource set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an object is contained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Containment {
    pub parent: ObjectId,
    pub feature: EStructuralFeature,
}

/// Placeholder state of a proxy object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyState {
    pub uri: String,
    pub fragment: String,
    pub resolved: Option<ObjectId>,
}

impl ProxyState {
    pub fn target_uri(&self) -> String {
        format!("{}#{}", self.uri, self.fragment)
    }
}

/// Contents of a feature slot
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Single(Value),
    Many(ValueList),
}

pub(crate) struct ObjectData {
    pub(crate) class: EClass,
    pub(crate) slots: HashMap<EStructuralFeature, Slot>,
    pub(crate) set_features: HashSet<EStructuralFeature>,
    pub(crate) container: Option<Containment>,
    pub(crate) inverse_rels: Vec<(ObjectId, EStructuralFeature)>,
    pub(crate) resource: Option<ResourceId>,
    pub(crate) xmi_id: Option<String>,
    pub(crate) proxy: Option<ProxyState>,
    pub(crate) listeners: ListenerList,
}

impl ObjectData {
    pub(crate) fn new(class: EClass) -> Self {
        ObjectData {
            class,
            slots: HashMap::new(),
            set_features: HashSet::new(),
            container: None,
            inverse_rels: Vec::new(),
            resource: None,
            xmi_id: None,
            proxy: None,
            listeners: ListenerList::default(),
        }
    }

    pub(crate) fn single(&self, feature: &EStructuralFeature) -> Option<&Value> {
        match self.slots.get(feature) {
            Some(Slot::Single(v)) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn many(&self, feature: &EStructuralFeature) -> Option<&ValueList> {
        match self.slots.get(feature) {
            Some(Slot::Many(list)) => Some(list),
            _ => None,
        }
    }

    /// Object handles currently held by `feature`
    pub(crate) fn targets(&self, feature: &EStructuralFeature) -> Vec<ObjectId> {
        match self.slots.get(feature) {
            Some(Slot::Single(v)) => v.as_object().into_iter().collect(),
            Some(Slot::Many(list)) => list.iter().filter_map(Value::as_object).collect(),
            None => Vec::new(),
        }
    }
}
