use std::rc::Rc;

use ecorex_core::meta::{add_feature, ecore, make_class, make_package, set_opposite};
use ecorex_core::persistence::MemoryProvider;
use ecorex_core::{EClass, EPackage, EStructuralFeature, ResourceSet};

/// The library metamodel used across the integration tests
///
/// `Library { writers*, books* }` (both containment), `Writer { name, books* }`
/// and `Book { title, authors* }` with `Book.authors` opposite `Writer.books`.
#[allow(dead_code)]
pub struct LibraryModel {
    pub package: EPackage,
    pub library: EClass,
    pub writer: EClass,
    pub book: EClass,
    pub writer_books: EStructuralFeature,
    pub book_authors: EStructuralFeature,
}

/// Build the library metamodel under a test-specific namespace URI
///
/// Each test passes its own `ns_uri` so registrations never collide.
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
        writer_books,
        book_authors,
    }
}

/// Resource set reading and writing through `provider`, with `package`
/// registered
#[allow(dead_code)]
pub fn memory_resource_set(package: &EPackage, provider: &MemoryProvider) -> ResourceSet {
    let mut rs = ResourceSet::new();
    rs.register_package(package).unwrap();
    rs.set_provider(Rc::new(provider.clone()));
    rs
}
