//! Serialization Round Trip Tests
//!
//! ## Scenarios Covered
//!
//! 1. A library with one writer and two books survives save and load into a
//!    fresh resource set, including opposite order
//! 2. Set-feature state survives the round trip (explicit writes only)
//! 3. The saved document has the expected tree shape

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{library_model, memory_resource_set, LibraryModel};
use ecorex_core::ops::{collection_ops, navigation, object_ops, reflect_ops, resource_ops};
use ecorex_core::persistence::{DocumentFormat, JsonFormat, MemoryProvider};
use ecorex_core::{ObjectId, ResourceSet, Value};

/// One library, writer "Smith", books "T1" and "T2" written by Smith
fn populate(rs: &mut ResourceSet, model: &LibraryModel) -> ObjectId {
    let res = resource_ops::create_resource(rs, "library.json").unwrap();
    let lib = object_ops::create(rs, &model.library).unwrap();
    resource_ops::append(rs, res, lib).unwrap();
    let smith = object_ops::create_in(rs, lib, "writers", &model.writer).unwrap();
    reflect_ops::set(rs, smith, "name", "Smith").unwrap();
    for title in ["T1", "T2"] {
        let book = object_ops::create_in(rs, lib, "books", &model.book).unwrap();
        reflect_ops::set(rs, book, "title", title).unwrap();
        collection_ops::append(rs, smith, "books", book).unwrap();
    }
    lib
}

#[test]
fn test_library_round_trip() {
    // GIVEN a saved library
    let model = library_model("http://scenario04.test/library");
    let provider = MemoryProvider::new();
    let mut rs = memory_resource_set(&model.package, &provider);
    let lib = populate(&mut rs, &model);
    let res = navigation::resource_of(&rs, lib).unwrap();
    resource_ops::save(&mut rs, res).unwrap();

    // WHEN it is loaded into a fresh resource set
    let mut fresh = memory_resource_set(&model.package, &provider);
    let loaded = resource_ops::get_resource(&mut fresh, "library.json", true).unwrap().unwrap();

    // THEN the graph is the same
    let roots = resource_ops::contents(&fresh, loaded).unwrap();
    assert_eq!(roots.len(), 1);
    let lib = roots[0];
    let books = reflect_ops::get(&mut fresh, lib, "books").unwrap().objects();
    assert_eq!(books.len(), 2);
    let writers = reflect_ops::get(&mut fresh, lib, "writers").unwrap().objects();
    assert_eq!(writers.len(), 1);
    let smith = writers[0];
    assert_eq!(reflect_ops::get(&mut fresh, smith, "name").unwrap(), Value::from("Smith"));

    for (book, title) in books.iter().zip(["T1", "T2"]) {
        assert_eq!(reflect_ops::get(&mut fresh, *book, "title").unwrap(), Value::from(title));
        assert_eq!(reflect_ops::get(&mut fresh, *book, "authors").unwrap(), Value::List(vec![smith.into()]));
    }
    assert_eq!(reflect_ops::get(&mut fresh, smith, "books").unwrap(), Value::from(books.clone()));
    assert!(!fresh.resource(loaded).unwrap().is_modified());
}

#[test]
fn test_set_features_survive_round_trip() {
    let model = library_model("http://scenario04.test/set");
    let provider = MemoryProvider::new();
    let mut rs = memory_resource_set(&model.package, &provider);
    let res = resource_ops::create_resource(&mut rs, "set.json").unwrap();
    let lib = object_ops::create(&mut rs, &model.library).unwrap();
    resource_ops::append(&mut rs, res, lib).unwrap();
    let named = object_ops::create_in(&mut rs, lib, "writers", &model.writer).unwrap();
    reflect_ops::set(&mut rs, named, "name", "").unwrap();
    object_ops::create_in(&mut rs, lib, "writers", &model.writer).unwrap();
    resource_ops::save(&mut rs, res).unwrap();

    let mut fresh = memory_resource_set(&model.package, &provider);
    let loaded = resource_ops::get_resource(&mut fresh, "set.json", true).unwrap().unwrap();
    let lib = resource_ops::contents(&fresh, loaded).unwrap()[0];
    let writers = reflect_ops::get(&mut fresh, lib, "writers").unwrap().objects();

    assert!(reflect_ops::is_set(&mut fresh, writers[0], "name").unwrap());
    assert!(!reflect_ops::is_set(&mut fresh, writers[1], "name").unwrap());
}

#[test]
fn test_saved_document_shape() {
    let model = library_model("http://scenario04.test/shape");
    let provider = MemoryProvider::new();
    let mut rs = memory_resource_set(&model.package, &provider);
    let lib = populate(&mut rs, &model);
    let res = navigation::resource_of(&rs, lib).unwrap();
    resource_ops::save(&mut rs, res).unwrap();

    let bytes = provider.get("library.json").unwrap();
    let root = JsonFormat.parse(&bytes).unwrap();
    assert_eq!(root.tag, "lib:Library");
    assert_eq!(root.attr("xmlns:lib"), Some("http://scenario04.test/shape"));
    let writer = root.children.iter().find(|c| c.tag == "writers").unwrap();
    assert_eq!(writer.attr("books"), Some("/0/@books.0 /0/@books.1"));
    let second_book = root.children.iter().filter(|c| c.tag == "books").nth(1).unwrap();
    assert_eq!(second_book.attr("authors"), Some("/0/@writers.0"));
}
