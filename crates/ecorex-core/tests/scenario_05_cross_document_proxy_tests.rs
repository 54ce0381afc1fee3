//! Cross-Document Proxy Tests
//!
//! ## Scenarios Covered
//!
//! 1. A reference into an unloaded document loads as a proxy
//! 2. Touching the proxy loads the target document and makes it transparent
//! 3. Deleting through the proxy removes the target from its resource
//! 4. A proxy whose document is missing fails with UnresolvedProxy
//! 5. An opposite pair split across two documents holds each end once
//!    after both sides resolve

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::memory_resource_set;
use ecorex_core::meta::{add_feature, ecore, make_class, make_package, set_opposite};
use ecorex_core::ops::{delete_ops, navigation, object_ops, proxy_ops, reflect_ops, resource_ops};
use ecorex_core::persistence::MemoryProvider;
use ecorex_core::{EClass, EPackage, EStructuralFeature, ModelError, ObjectId, ResourceSet, Value};

struct Pair {
    package: EPackage,
    a: EClass,
    b: EClass,
}

fn pair_model(ns_uri: &str) -> Pair {
    let package = make_package("pair", ns_uri, "pair");
    let a = make_class(&package, "A");
    let b = make_class(&package, "B");
    add_feature(&b, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
    add_feature(&a, EStructuralFeature::reference("tob", &b)).unwrap();
    Pair { package, a, b }
}

/// Save `A.json` holding `a` and `B.json` holding `b`, with `a.tob = b`
fn save_pair(model: &Pair, provider: &MemoryProvider) {
    let mut rs = memory_resource_set(&model.package, provider);
    let res_a = resource_ops::create_resource(&mut rs, "A.json").unwrap();
    let res_b = resource_ops::create_resource(&mut rs, "B.json").unwrap();
    let a = object_ops::create(&mut rs, &model.a).unwrap();
    let b = object_ops::create(&mut rs, &model.b).unwrap();
    reflect_ops::set(&mut rs, b, "name", "target").unwrap();
    resource_ops::append(&mut rs, res_a, a).unwrap();
    resource_ops::append(&mut rs, res_b, b).unwrap();
    reflect_ops::set(&mut rs, a, "tob", b).unwrap();
    resource_ops::save(&mut rs, res_a).unwrap();
    resource_ops::save(&mut rs, res_b).unwrap();
}

fn load_a(rs: &mut ResourceSet) -> ObjectId {
    let res_a = resource_ops::get_resource(rs, "A.json", true).unwrap().unwrap();
    resource_ops::contents(rs, res_a).unwrap()[0]
}

#[test]
fn test_proxy_loads_target_on_touch() {
    // GIVEN A.json referencing an object in B.json
    let model = pair_model("http://scenario05.test/touch");
    let provider = MemoryProvider::new();
    save_pair(&model, &provider);
    let saved = String::from_utf8(provider.get("A.json").unwrap()).unwrap();
    assert!(saved.contains("B.json#/0"));

    // WHEN only A.json is loaded
    let mut rs = memory_resource_set(&model.package, &provider);
    let a = load_a(&mut rs);

    // THEN a.tob is an unresolved proxy and B.json is not loaded
    let tob = reflect_ops::get(&mut rs, a, "tob").unwrap().as_object().unwrap();
    assert!(navigation::is_proxy(&rs, tob));
    assert_eq!(rs.effective(tob), tob);
    assert!(rs.resource_by_uri("B.json").is_none());

    // WHEN a feature of the proxy is read
    let name = reflect_ops::get(&mut rs, tob, "name").unwrap();

    // THEN B.json was loaded and the proxy forwards to b
    assert_eq!(name, Value::from("target"));
    let res_b = rs.resource_by_uri("B.json").unwrap();
    let b = resource_ops::contents(&rs, res_b).unwrap()[0];
    assert_eq!(rs.effective(tob), b);
    assert_eq!(reflect_ops::get(&mut rs, a, "tob").unwrap(), Value::Object(b));
}

#[test]
fn test_delete_through_proxy_removes_target() {
    let model = pair_model("http://scenario05.test/delete");
    let provider = MemoryProvider::new();
    save_pair(&model, &provider);
    let mut rs = memory_resource_set(&model.package, &provider);
    let a = load_a(&mut rs);
    let tob = reflect_ops::get(&mut rs, a, "tob").unwrap().as_object().unwrap();

    delete_ops::delete(&mut rs, tob).unwrap();

    let res_b = rs.resource_by_uri("B.json").unwrap();
    assert!(resource_ops::contents(&rs, res_b).unwrap().is_empty());
    assert_eq!(reflect_ops::get(&mut rs, a, "tob").unwrap(), Value::Null);
}

#[test]
fn test_missing_target_document() {
    let model = pair_model("http://scenario05.test/missing");
    let provider = MemoryProvider::new();
    save_pair(&model, &provider);
    provider.remove("B.json");
    let mut rs = memory_resource_set(&model.package, &provider);
    let a = load_a(&mut rs);
    let tob = reflect_ops::get(&mut rs, a, "tob").unwrap().as_object().unwrap();

    let result = proxy_ops::resolve(&mut rs, tob);

    assert!(matches!(result, Err(ModelError::UnresolvedProxy { .. })));
    assert!(rs.resource_by_uri("B.json").is_none());
    assert!(navigation::is_proxy(&rs, tob));
}

/// `pair_model` with `A.tob` opposite `B.froma*`
fn opposite_pair_model(ns_uri: &str) -> Pair {
    let model = pair_model(ns_uri);
    let tob = model.a.feature("tob").unwrap();
    let froma = add_feature(&model.b, EStructuralFeature::reference("froma", &model.a).many()).unwrap();
    set_opposite(&tob, &froma).unwrap();
    model
}

#[test]
fn test_cross_document_opposite_holds_each_end_once() {
    // GIVEN A.json and B.json saved with a.tob = b and so b.froma = [a]
    let model = opposite_pair_model("http://scenario05.test/opposite");
    let provider = MemoryProvider::new();
    save_pair(&model, &provider);
    let saved_b = String::from_utf8(provider.get("B.json").unwrap()).unwrap();
    assert!(saved_b.contains("A.json#/0"));

    // WHEN A.json is loaded, tob is touched and B.json's proxies are resolved
    let mut rs = memory_resource_set(&model.package, &provider);
    let a = load_a(&mut rs);
    let tob = reflect_ops::get(&mut rs, a, "tob").unwrap().as_object().unwrap();
    reflect_ops::get(&mut rs, tob, "name").unwrap();
    let res_b = rs.resource_by_uri("B.json").unwrap();
    let failed = proxy_ops::resolve_all(&mut rs, res_b).unwrap();

    // THEN both ends name each other exactly once
    assert!(failed.is_empty());
    let b = resource_ops::contents(&rs, res_b).unwrap()[0];
    assert_eq!(reflect_ops::get(&mut rs, a, "tob").unwrap(), Value::Object(b));
    let froma: Vec<ObjectId> = reflect_ops::get(&mut rs, b, "froma")
        .unwrap()
        .objects()
        .into_iter()
        .map(|o| rs.effective(o))
        .collect();
    assert_eq!(froma, vec![a]);
}
