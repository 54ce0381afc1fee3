//! XMI Persistence Tests
//!
//! ## Scenarios Covered
//!
//! 1. A library saved as `.xmi` on disk loads back with the same graph
//! 2. The file is XML with positional references and a namespace declaration
//! 3. An unknown attribute is reported with the line it appears on
//! 4. A cross-document reference between two `.xmi` files resolves on touch
//! 5. JSON and XML resources coexist in one resource set

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{file_resource_set, library_model, populate_library};
use ecorex_core::meta::{add_feature, ecore, make_class, make_package};
use ecorex_core::ops::{navigation, object_ops, reflect_ops, resource_ops};
use ecorex_core::{EStructuralFeature, ModelError, Value};
use tempfile::TempDir;

#[test]
fn test_library_round_trip_through_xmi_file() {
    // GIVEN a library saved to library.xmi
    let temp_dir = TempDir::new().unwrap();
    let model = library_model("http://store.test/round-trip");
    let mut rs = file_resource_set(&model.package, temp_dir.path());
    let (res, _) = populate_library(&mut rs, &model, "library.xmi");
    resource_ops::save(&mut rs, res).unwrap();

    // WHEN it is loaded into a fresh resource set
    let mut fresh = file_resource_set(&model.package, temp_dir.path());
    let loaded = resource_ops::get_resource(&mut fresh, "library.xmi", true)
        .unwrap()
        .unwrap();

    // THEN writers, books and both sides of the opposite pair are restored
    let lib = resource_ops::contents(&fresh, loaded).unwrap()[0];
    let writers = reflect_ops::get(&mut fresh, lib, "writers").unwrap().objects();
    let books = reflect_ops::get(&mut fresh, lib, "books").unwrap().objects();
    assert_eq!(writers.len(), 1);
    assert_eq!(books.len(), 2);
    let smith = writers[0];
    assert_eq!(reflect_ops::get(&mut fresh, smith, "name").unwrap(), Value::from("Smith"));
    assert_eq!(reflect_ops::get(&mut fresh, smith, "books").unwrap(), Value::from(books.clone()));
    for (book, title) in books.iter().zip(["T1", "T2"]) {
        assert_eq!(reflect_ops::get(&mut fresh, *book, "title").unwrap(), Value::from(title));
        assert_eq!(
            reflect_ops::get(&mut fresh, *book, "authors").unwrap(),
            Value::List(vec![smith.into()])
        );
    }
    assert!(!fresh.resource(loaded).unwrap().is_modified());
}

#[test]
fn test_saved_file_is_xml() {
    let temp_dir = TempDir::new().unwrap();
    let model = library_model("http://store.test/shape");
    let mut rs = file_resource_set(&model.package, temp_dir.path());
    let (res, _) = populate_library(&mut rs, &model, "shape.xmi");

    resource_ops::save(&mut rs, res).unwrap();

    let text = std::fs::read_to_string(temp_dir.path().join("shape.xmi")).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(text.contains("xmlns:lib=\"http://store.test/shape\""));
    assert!(text.contains("books=\"/0/@books.0 /0/@books.1\""));
    assert!(text.contains("authors=\"/0/@writers.0\""));
}

#[test]
fn test_unknown_attribute_reports_line() {
    // GIVEN a hand-written document with a stray attribute on line 4
    let temp_dir = TempDir::new().unwrap();
    let model = library_model("http://store.test/lines");
    let document = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                    <lib:Library xmlns:lib=\"http://store.test/lines\">\n  \
                    <writers name=\"Smith\"/>\n  \
                    <books title=\"T1\" pages=\"12\"/>\n\
                    </lib:Library>\n";
    std::fs::write(temp_dir.path().join("bad.xmi"), document).unwrap();
    let mut rs = file_resource_set(&model.package, temp_dir.path());

    // WHEN it is loaded
    let result = resource_ops::get_resource(&mut rs, "bad.xmi", true);

    // THEN the error names the feature and the line, and no resource remains
    match result {
        Err(ModelError::UnknownFeature { feature, line, .. }) => {
            assert_eq!(feature, "pages");
            assert_eq!(line, Some(4));
        }
        other => panic!("expected UnknownFeature, got {:?}", other),
    }
    assert!(rs.resource_by_uri("bad.xmi").is_none());
}

#[test]
fn test_cross_document_reference_between_files() {
    // GIVEN a.xmi referencing the root of b.xmi
    let temp_dir = TempDir::new().unwrap();
    let package = make_package("pair", "http://store.test/pair", "pair");
    let a_class = make_class(&package, "A");
    let b_class = make_class(&package, "B");
    add_feature(&b_class, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
    add_feature(&a_class, EStructuralFeature::reference("tob", &b_class)).unwrap();

    let mut rs = file_resource_set(&package, temp_dir.path());
    let res_a = resource_ops::create_resource(&mut rs, "a.xmi").unwrap();
    let res_b = resource_ops::create_resource(&mut rs, "b.xmi").unwrap();
    let a = object_ops::create(&mut rs, &a_class).unwrap();
    let b = object_ops::create(&mut rs, &b_class).unwrap();
    reflect_ops::set(&mut rs, b, "name", "target").unwrap();
    resource_ops::append(&mut rs, res_a, a).unwrap();
    resource_ops::append(&mut rs, res_b, b).unwrap();
    reflect_ops::set(&mut rs, a, "tob", b).unwrap();
    resource_ops::save(&mut rs, res_a).unwrap();
    resource_ops::save(&mut rs, res_b).unwrap();
    let text = std::fs::read_to_string(temp_dir.path().join("a.xmi")).unwrap();
    assert!(text.contains("href=\"b.xmi#/0\""));

    // WHEN only a.xmi is loaded and the proxy is touched
    let mut fresh = file_resource_set(&package, temp_dir.path());
    let loaded = resource_ops::get_resource(&mut fresh, "a.xmi", true).unwrap().unwrap();
    let a = resource_ops::contents(&fresh, loaded).unwrap()[0];
    let tob = reflect_ops::get(&mut fresh, a, "tob").unwrap().as_object().unwrap();
    assert!(navigation::is_proxy(&fresh, tob));
    let name = reflect_ops::get(&mut fresh, tob, "name").unwrap();

    // THEN b.xmi was read from disk
    assert_eq!(name, Value::from("target"));
    assert!(fresh.resource_by_uri("b.xmi").is_some());
}

#[test]
fn test_json_and_xml_resources_coexist() {
    let temp_dir = TempDir::new().unwrap();
    let model = library_model("http://store.test/mixed");
    let mut rs = file_resource_set(&model.package, temp_dir.path());
    let (xml_res, _) = populate_library(&mut rs, &model, "one.xmi");
    let (json_res, _) = populate_library(&mut rs, &model, "two.json");

    assert_eq!(resource_ops::save_modified(&mut rs).unwrap(), 2);

    let xml = std::fs::read_to_string(temp_dir.path().join("one.xmi")).unwrap();
    let json = std::fs::read_to_string(temp_dir.path().join("two.json")).unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(json.starts_with('{'));
    assert!(!rs.resource(xml_res).unwrap().is_modified());
    assert!(!rs.resource(json_res).unwrap().is_modified());
}
