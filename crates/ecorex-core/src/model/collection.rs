//! Feature-backed collections
//!
//! A many-valued feature stores its elements in a [`ValueList`]; the
//! feature's `ordered`/`unique` flags select one of four shapes. Mutation
//! always goes through `ops::collection_ops`, which performs the type,
//! containment, opposite and inverse-relation bookkeeping; [`EList`] is a
//! handle bound to `(owner, feature)` that forwards to those operations.

use std::collections::HashMap;

use crate::errors::Result;
use crate::meta::EStructuralFeature;
use crate::model::ObjectId;
use crate::ops::{collection_ops, reflect_ops, ResourceSet};
use crate::value::Value;

/// Collection shape selected from `ordered` and `unique`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionShape {
    OrderedSet,
    List,
    Set,
    Multiset,
}

impl CollectionShape {
    pub fn of(feature: &EStructuralFeature) -> Self {
        match (feature.is_ordered(), feature.is_unique()) {
            (true, true) => CollectionShape::OrderedSet,
            (true, false) => CollectionShape::List,
            (false, true) => CollectionShape::Set,
            (false, false) => CollectionShape::Multiset,
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, CollectionShape::OrderedSet | CollectionShape::Set)
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, CollectionShape::OrderedSet | CollectionShape::List)
    }
}

/// Element storage: insertion-ordered items plus a count index for O(1)
/// membership
#[derive(Debug, Clone, Default)]
pub struct ValueList {
    items: Vec<Value>,
    counts: HashMap<Value, usize>,
}

impl PartialEq for ValueList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl ValueList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        let mut list = Self::new();
        for v in values {
            let at = list.len();
            list.insert(at, v);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.counts.contains_key(value)
    }

    pub fn index_of(&self, value: &Value) -> Option<usize> {
        if !self.contains(value) {
            return None;
        }
        self.items.iter().position(|v| v == value)
    }

    pub(crate) fn insert(&mut self, index: usize, value: Value) {
        let index = index.min(self.items.len());
        *self.counts.entry(value.clone()).or_insert(0) += 1;
        self.items.insert(index, value);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<Value> {
        if index >= self.items.len() {
            return None;
        }
        let value = self.items.remove(index);
        if let Some(count) = self.counts.get_mut(&value) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&value);
            }
        }
        Some(value)
    }

    pub(crate) fn move_item(&mut self, from: usize, to: usize) -> Option<Value> {
        if from >= self.items.len() || to >= self.items.len() {
            return None;
        }
        let value = self.items.remove(from);
        self.items.insert(to, value.clone());
        Some(value)
    }

    pub(crate) fn replace(&mut self, index: usize, value: Value) -> Option<Value> {
        let old = self.remove(index)?;
        self.insert(index, value);
        Some(old)
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.clone()
    }
}

/// A many-valued feature of one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EList {
    owner: ObjectId,
    feature: EStructuralFeature,
}

impl EList {
    pub(crate) fn new(owner: ObjectId, feature: EStructuralFeature) -> Self {
        EList { owner, feature }
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    pub fn feature(&self) -> &EStructuralFeature {
        &self.feature
    }

    pub fn shape(&self) -> CollectionShape {
        CollectionShape::of(&self.feature)
    }

    /// Current elements (computed for derived features)
    pub fn to_vec(&self, rs: &ResourceSet) -> Vec<Value> {
        match reflect_ops::peek(rs, self.owner, &self.feature) {
            Ok(Value::List(items)) => items,
            _ => Vec::new(),
        }
    }

    pub fn objects(&self, rs: &ResourceSet) -> Vec<ObjectId> {
        self.to_vec(rs).iter().filter_map(Value::as_object).collect()
    }

    pub fn len(&self, rs: &ResourceSet) -> usize {
        self.to_vec(rs).len()
    }

    pub fn is_empty(&self, rs: &ResourceSet) -> bool {
        self.len(rs) == 0
    }

    pub fn get(&self, rs: &ResourceSet, index: usize) -> Option<Value> {
        self.to_vec(rs).into_iter().nth(index)
    }

    pub fn contains(&self, rs: &ResourceSet, value: &Value) -> bool {
        self.to_vec(rs).contains(value)
    }

    /// # Errors
    ///
    /// See [`collection_ops::append`].
    pub fn append(&self, rs: &mut ResourceSet, value: impl Into<Value>) -> Result<()> {
        collection_ops::append(rs, self.owner, &self.feature, value)
    }

    /// # Errors
    ///
    /// See [`collection_ops::insert`].
    pub fn insert(&self, rs: &mut ResourceSet, index: usize, value: impl Into<Value>) -> Result<()> {
        collection_ops::insert(rs, self.owner, &self.feature, index, value)
    }

    /// # Errors
    ///
    /// See [`collection_ops::extend`].
    pub fn extend(&self, rs: &mut ResourceSet, values: Vec<Value>) -> Result<()> {
        collection_ops::extend(rs, self.owner, &self.feature, values)
    }

    /// # Errors
    ///
    /// See [`collection_ops::remove`].
    pub fn remove(&self, rs: &mut ResourceSet, value: impl Into<Value>) -> Result<bool> {
        collection_ops::remove(rs, self.owner, &self.feature, value)
    }

    /// # Errors
    ///
    /// See [`collection_ops::remove_at`].
    pub fn remove_at(&self, rs: &mut ResourceSet, index: usize) -> Result<Value> {
        collection_ops::remove_at(rs, self.owner, &self.feature, index)
    }

    /// # Errors
    ///
    /// See [`collection_ops::move_item`].
    pub fn move_item(&self, rs: &mut ResourceSet, from: usize, to: usize) -> Result<()> {
        collection_ops::move_item(rs, self.owner, &self.feature, from, to)
    }

    /// # Errors
    ///
    /// See [`collection_ops::clear`].
    pub fn clear(&self, rs: &mut ResourceSet) -> Result<()> {
        collection_ops::clear(rs, self.owner, &self.feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_tracks_duplicates() {
        let mut list = ValueList::from_values(vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
        assert!(list.contains(&Value::Int(1)));

        list.remove(0);
        assert!(list.contains(&Value::Int(1)));
        list.remove(1);
        assert!(!list.contains(&Value::Int(1)));
        assert_eq!(list.to_vec(), vec![Value::Int(2)]);
    }

    #[test]
    fn test_move_item() {
        let mut list = ValueList::from_values(vec!["a".into(), "b".into(), "c".into()]);
        list.move_item(0, 2);
        assert_eq!(list.to_vec(), vec![Value::from("b"), Value::from("c"), Value::from("a")]);
        assert!(list.move_item(5, 0).is_none());
    }

    #[test]
    fn test_index_of_missing() {
        let list = ValueList::from_values(vec![Value::Int(3)]);
        assert_eq!(list.index_of(&Value::Int(3)), Some(0));
        assert_eq!(list.index_of(&Value::Int(4)), None);
    }
}
