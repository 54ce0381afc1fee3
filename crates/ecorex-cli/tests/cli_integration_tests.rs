//! CLI integration tests
//!
//! Each test prepares a workspace in a temp directory (a library metamodel
//! and a model document) through the library crates, then runs the
//! `ecorex` binary against it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::process::{Command, Output};

use ecorex_core::meta::{add_feature, ecore, make_class, make_package, set_opposite};
use ecorex_core::ops::{collection_ops, object_ops, reflect_ops, resource_ops};
use ecorex_core::EStructuralFeature;
use tempfile::TempDir;

const NS_URI: &str = "http://cli.test/library";

/// Write `library.ecore` and `lib.xmi` (writer "Smith", books "T1" and an
/// untitled one) into `dir`
fn setup_workspace(dir: &Path) {
    let package = make_package("library", NS_URI, "lib");
    let library = make_class(&package, "Library");
    let writer = make_class(&package, "Writer");
    let book = make_class(&package, "Book");
    add_feature(&library, EStructuralFeature::containment("writers", &writer).many()).unwrap();
    add_feature(&library, EStructuralFeature::containment("books", &book).many()).unwrap();
    add_feature(&writer, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
    add_feature(&book, EStructuralFeature::attribute("title", &ecore::e_string()).required()).unwrap();
    let writer_books = add_feature(&writer, EStructuralFeature::reference("books", &book).many()).unwrap();
    let book_authors = add_feature(&book, EStructuralFeature::reference("authors", &writer).many()).unwrap();
    set_opposite(&writer_books, &book_authors).unwrap();

    let mut rs = ecorex_store::resource_set_in(dir);
    rs.register_package(&package).unwrap();

    let meta = resource_ops::create_resource(&mut rs, "library.ecore").unwrap();
    resource_ops::add_package(&mut rs, meta, &package).unwrap();
    resource_ops::save(&mut rs, meta).unwrap();

    let res = resource_ops::create_resource(&mut rs, "lib.xmi").unwrap();
    let lib = object_ops::create(&mut rs, &library).unwrap();
    resource_ops::append(&mut rs, res, lib).unwrap();
    let smith = object_ops::create_in(&mut rs, lib, "writers", &writer).unwrap();
    reflect_ops::set(&mut rs, smith, "name", "Smith").unwrap();
    let titled = object_ops::create_in(&mut rs, lib, "books", &book).unwrap();
    reflect_ops::set(&mut rs, titled, "title", "T1").unwrap();
    collection_ops::append(&mut rs, smith, "books", titled).unwrap();
    object_ops::create_in(&mut rs, lib, "books", &book).unwrap();
    resource_ops::save(&mut rs, res).unwrap();
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ecorex"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to execute CLI")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_ecore_summarizes_metamodel() {
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(temp_dir.path());

    let output = run(temp_dir.path(), &["ecore", "library.ecore"]);

    assert!(
        output.status.success(),
        "Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(text.contains("package library (http://cli.test/library) prefix lib"));
    assert!(text.contains("class Writer"));
    assert!(text.contains("books : Book [0..*] opposite authors"));
    assert!(text.contains("writers : Writer [0..*] containment"));
}

#[test]
fn test_inspect_prints_object_tree() {
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(temp_dir.path());

    let output = run(temp_dir.path(), &["inspect", "lib.xmi", "--metamodel", "library.ecore"]);

    assert!(
        output.status.success(),
        "Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(text.contains("1 root(s), 0 proxy(ies)"));
    assert!(text.contains("/0 lib:Library"));
    assert!(text.contains("  /0/@writers.0 lib:Writer name=\"Smith\" books=[/0/@books.0]"));
}

#[test]
fn test_inspect_without_metamodel_fails() {
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(temp_dir.path());

    let output = run(temp_dir.path(), &["inspect", "lib.xmi"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("loading lib.xmi"));
}

#[test]
fn test_validate_reports_missing_required_title() {
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(temp_dir.path());

    let output = run(temp_dir.path(), &["validate", "lib.xmi", "-m", "library.ecore"]);

    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("✗ lib.xmi"));
    assert!(text.contains("ERR_BAD_VALUE"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 1 document(s) failed validation"));
}

#[test]
fn test_convert_writes_json_found_through_config() {
    // GIVEN a workspace whose ecorex.toml names the metamodel
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(temp_dir.path());
    std::fs::write(
        temp_dir.path().join("ecorex.toml"),
        "metamodels = [\"library.ecore\"]\n",
    )
    .unwrap();

    // WHEN converting without naming the metamodel
    let output = run(temp_dir.path(), &["convert", "lib.xmi", "out/lib.json"]);

    // THEN the JSON document is written and reads back through the CLI
    assert!(
        output.status.success(),
        "Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = std::fs::read_to_string(temp_dir.path().join("out").join("lib.json")).unwrap();
    assert!(json.starts_with('{'));
    assert!(json.contains("\"lib:Library\""));

    let output = run(temp_dir.path(), &["inspect", "out/lib.json"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("name=\"Smith\""));
}
