//! Opposite Reference Propagation Tests
//!
//! ## Scenarios Covered
//!
//! 1. Appending to one end of a many-to-many pair updates the other end
//! 2. Removing from the other end clears the first
//! 3. Single-valued opposites steal the previous partner

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::library_model;
use ecorex_core::meta::{add_feature, make_class, make_package, set_opposite};
use ecorex_core::ops::{collection_ops, object_ops, reflect_ops};
use ecorex_core::{EStructuralFeature, ResourceSet, Value};

#[test]
fn test_append_propagates_to_opposite() {
    // GIVEN a writer and a book
    let model = library_model("http://scenario01.test/append");
    let mut rs = ResourceSet::new();
    let w = object_ops::create(&mut rs, &model.writer).unwrap();
    let b = object_ops::create(&mut rs, &model.book).unwrap();

    // WHEN the book is appended to the writer's books
    collection_ops::append(&mut rs, w, "books", b).unwrap();

    // THEN the book lists the writer as author
    assert_eq!(reflect_ops::get(&mut rs, b, "authors").unwrap(), Value::List(vec![w.into()]));

    // WHEN the writer is removed from the book's authors
    assert!(collection_ops::remove(&mut rs, b, "authors", w).unwrap());

    // THEN the writer has no books
    assert_eq!(reflect_ops::get(&mut rs, w, "books").unwrap(), Value::List(vec![]));
    assert_eq!(reflect_ops::get(&mut rs, b, "authors").unwrap(), Value::List(vec![]));
}

#[test]
fn test_opposite_through_typed_feature_handles() {
    let model = library_model("http://scenario01.test/handles");
    let mut rs = ResourceSet::new();
    let w1 = object_ops::create(&mut rs, &model.writer).unwrap();
    let w2 = object_ops::create(&mut rs, &model.writer).unwrap();
    let b = object_ops::create(&mut rs, &model.book).unwrap();

    collection_ops::append(&mut rs, b, &model.book_authors, w1).unwrap();
    collection_ops::append(&mut rs, b, &model.book_authors, w2).unwrap();

    assert_eq!(reflect_ops::get(&mut rs, w1, &model.writer_books).unwrap(), Value::List(vec![b.into()]));
    assert_eq!(reflect_ops::get(&mut rs, w2, &model.writer_books).unwrap(), Value::List(vec![b.into()]));
}

#[test]
fn test_single_valued_opposite_steals_partner() {
    // GIVEN a one-to-one pair spouse/partner
    let pkg = make_package("family", "http://scenario01.test/single", "fam");
    let person = make_class(&pkg, "Person");
    let spouse = add_feature(&person, EStructuralFeature::reference("spouse", &person)).unwrap();
    let partner = add_feature(&person, EStructuralFeature::reference("partner", &person)).unwrap();
    set_opposite(&spouse, &partner).unwrap();

    let mut rs = ResourceSet::new();
    let a = object_ops::create(&mut rs, &person).unwrap();
    let b = object_ops::create(&mut rs, &person).unwrap();
    let c = object_ops::create(&mut rs, &person).unwrap();

    // WHEN a pairs with b and then c pairs with b
    reflect_ops::set(&mut rs, a, "spouse", b).unwrap();
    assert_eq!(reflect_ops::get(&mut rs, b, "partner").unwrap(), Value::Object(a));
    reflect_ops::set(&mut rs, c, "spouse", b).unwrap();

    // THEN a lost its spouse
    assert_eq!(reflect_ops::get(&mut rs, b, "partner").unwrap(), Value::Object(c));
    assert_eq!(reflect_ops::get(&mut rs, a, "spouse").unwrap(), Value::Null);
}
