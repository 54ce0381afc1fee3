use std::path::Path;

use ecorex_core::meta::{add_feature, ecore, make_class, make_package, set_opposite};
use ecorex_core::ops::{collection_ops, object_ops, reflect_ops, resource_ops};
use ecorex_core::{EClass, EPackage, EStructuralFeature, ObjectId, ResourceId, ResourceSet};

/// Library metamodel: `Library { writers*, books* }`, `Writer { name, books* }`,
/// `Book { title, authors* }` with `Writer.books` opposite `Book.authors`
#[allow(dead_code)]
pub struct LibraryModel {
    pub package: EPackage,
    pub library: EClass,
    pub writer: EClass,
    pub book: EClass,
}

#[allow(dead_code)]
pub fn library_model(ns_uri: &str) -> LibraryModel {
    let package = make_package("library", ns_uri, "lib");
    let library = make_class(&package, "Library");
    let writer = make_class(&package, "Writer");
    let book = make_class(&package, "Book");

    add_feature(&library, EStructuralFeature::containment("writers", &writer).many()).unwrap();
    add_feature(&library, EStructuralFeature::containment("books", &book).many()).unwrap();
    add_feature(&writer, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
    add_feature(&book, EStructuralFeature::attribute("title", &ecore::e_string())).unwrap();
    let writer_books = add_feature(&writer, EStructuralFeature::reference("books", &book).many()).unwrap();
    let book_authors = add_feature(&book, EStructuralFeature::reference("authors", &writer).many()).unwrap();
    set_opposite(&writer_books, &book_authors).unwrap();

    LibraryModel {
        package,
        library,
        writer,
        book,
    }
}

/// Filesystem resource set rooted at `dir` with `package` registered
#[allow(dead_code)]
pub fn file_resource_set(package: &EPackage, dir: &Path) -> ResourceSet {
    let mut rs = ecorex_store::resource_set_in(dir);
    rs.register_package(package).unwrap();
    rs
}

/// Create `uri` holding one library with writer "Smith" and books "T1",
/// "T2" written by Smith
#[allow(dead_code)]
pub fn populate_library(rs: &mut ResourceSet, model: &LibraryModel, uri: &str) -> (ResourceId, ObjectId) {
    let res = resource_ops::create_resource(rs, uri).unwrap();
    let lib = object_ops::create(rs, &model.library).unwrap();
    resource_ops::append(rs, res, lib).unwrap();
    let smith = object_ops::create_in(rs, lib, "writers", &model.writer).unwrap();
    reflect_ops::set(rs, smith, "name", "Smith").unwrap();
    for title in ["T1", "T2"] {
        let book = object_ops::create_in(rs, lib, "books", &model.book).unwrap();
        reflect_ops::set(rs, book, "title", title).unwrap();
        collection_ops::append(rs, smith, "books", book).unwrap();
    }
    (res, lib)
}
