//! Delete With Inverse Relations Tests
//!
//! ## Scenarios Covered
//!
//! 1. Deleting a referenced object clears the references to it; undo restores them
//! 2. Deleting a subtree cuts opposite edges leaving it
//! 3. Deleting a root removes it from its resource

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::library_model;
use ecorex_core::meta::{add_feature, make_class, make_package};
use ecorex_core::ops::{collection_ops, delete_ops, navigation, object_ops, reflect_ops, resource_ops};
use ecorex_core::{CommandState, EStructuralFeature, ResourceSet, Value};

#[test]
fn test_delete_clears_mates_and_undo_restores() {
    // GIVEN a1.mates = [a2]
    let pkg = make_package("mates", "http://scenario03.test/mates", "m");
    let a = make_class(&pkg, "A");
    add_feature(&a, EStructuralFeature::reference("mates", &a).many()).unwrap();
    let mut rs = ResourceSet::new();
    let a1 = object_ops::create(&mut rs, &a).unwrap();
    let a2 = object_ops::create(&mut rs, &a).unwrap();
    collection_ops::append(&mut rs, a1, "mates", a2).unwrap();

    // WHEN a2 is deleted
    let mut command = delete_ops::delete(&mut rs, a2).unwrap();

    // THEN a1 no longer references it
    assert_eq!(reflect_ops::get(&mut rs, a1, "mates").unwrap(), Value::List(vec![]));
    assert_eq!(navigation::container(&rs, a2), None);
    assert!(navigation::inverse_references(&rs, a2).is_empty());

    // WHEN the delete is undone
    command.undo(&mut rs).unwrap();

    // THEN the reference is back
    assert_eq!(command.state(), CommandState::Undone);
    assert_eq!(reflect_ops::get(&mut rs, a1, "mates").unwrap(), Value::List(vec![a2.into()]));
    assert_eq!(navigation::inverse_references(&rs, a2).len(), 1);
}

#[test]
fn test_delete_subtree_cuts_outgoing_opposites() {
    let model = library_model("http://scenario03.test/subtree");
    let mut rs = ResourceSet::new();
    let lib = object_ops::create(&mut rs, &model.library).unwrap();
    let w = object_ops::create_in(&mut rs, lib, "writers", &model.writer).unwrap();
    let b = object_ops::create_in(&mut rs, lib, "books", &model.book).unwrap();
    collection_ops::append(&mut rs, w, "books", b).unwrap();

    let mut command = delete_ops::delete(&mut rs, w).unwrap();

    assert_eq!(reflect_ops::get(&mut rs, lib, "writers").unwrap(), Value::List(vec![]));
    assert_eq!(reflect_ops::get(&mut rs, b, "authors").unwrap(), Value::List(vec![]));

    command.undo(&mut rs).unwrap();
    assert_eq!(reflect_ops::get(&mut rs, lib, "writers").unwrap(), Value::List(vec![w.into()]));
    assert_eq!(reflect_ops::get(&mut rs, b, "authors").unwrap(), Value::List(vec![w.into()]));
    assert_eq!(reflect_ops::get(&mut rs, w, "books").unwrap(), Value::List(vec![b.into()]));
}

#[test]
fn test_delete_root_leaves_resource() {
    let model = library_model("http://scenario03.test/root");
    let mut rs = ResourceSet::new();
    let res = resource_ops::create_resource(&mut rs, "lib.json").unwrap();
    let lib = object_ops::create(&mut rs, &model.library).unwrap();
    resource_ops::append(&mut rs, res, lib).unwrap();

    let mut command = delete_ops::delete(&mut rs, lib).unwrap();
    assert!(resource_ops::contents(&rs, res).unwrap().is_empty());
    assert_eq!(navigation::resource_of(&rs, lib), None);

    command.undo(&mut rs).unwrap();
    assert_eq!(resource_ops::contents(&rs, res).unwrap(), vec![lib]);
}
