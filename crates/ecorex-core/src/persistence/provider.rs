//! Byte-stream providers and URI converters

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::rc::Rc;

use crate::errors::{ModelError, Result};

/// Opens byte streams for resource URIs
///
/// Writes become visible when the returned writer is flushed; a writer
/// dropped without a flush leaves the previous content in place.
pub trait ByteStreamProvider {
    /// # Errors
    ///
    /// `ResourceNotFound` when nothing exists at `uri`, `Io` for other
    /// failures.
    fn open_in(&self, uri: &str) -> Result<Box<dyn Read>>;

    /// # Errors
    ///
    /// `Io` when the location cannot be written.
    fn open_out(&self, uri: &str) -> Result<Box<dyn Write>>;
}

/// A provider that handles only the URIs it claims
pub trait UriConverter: ByteStreamProvider {
    fn claims(&self, uri: &str) -> bool;
}

/// In-memory documents keyed by URI; clones share the same store
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    documents: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: &str, bytes: impl Into<Vec<u8>>) {
        self.documents.borrow_mut().insert(uri.to_string(), bytes.into());
    }

    pub fn get(&self, uri: &str) -> Option<Vec<u8>> {
        self.documents.borrow().get(uri).cloned()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.documents.borrow().contains_key(uri)
    }

    pub fn remove(&self, uri: &str) -> Option<Vec<u8>> {
        self.documents.borrow_mut().remove(uri)
    }

    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.documents.borrow().keys().cloned().collect();
        uris.sort();
        uris
    }
}

impl ByteStreamProvider for MemoryProvider {
    fn open_in(&self, uri: &str) -> Result<Box<dyn Read>> {
        let bytes = self.get(uri).ok_or_else(|| ModelError::ResourceNotFound {
            uri: uri.to_string(),
        })?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn open_out(&self, uri: &str) -> Result<Box<dyn Write>> {
        Ok(Box::new(MemoryWriter {
            uri: uri.to_string(),
            buffer: Vec::new(),
            documents: self.documents.clone(),
        }))
    }
}

struct MemoryWriter {
    uri: String,
    buffer: Vec<u8>,
    documents: Rc<RefCell<HashMap<String, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.documents
            .borrow_mut()
            .insert(self.uri.clone(), self.buffer.clone());
        Ok(())
    }
}

/// Claim every URI starting with a prefix and serve it from memory
#[derive(Debug, Clone)]
pub struct PrefixConverter {
    prefix: String,
    store: MemoryProvider,
}

impl PrefixConverter {
    pub fn new(prefix: &str, store: MemoryProvider) -> Self {
        PrefixConverter {
            prefix: prefix.to_string(),
            store,
        }
    }
}

impl ByteStreamProvider for PrefixConverter {
    fn open_in(&self, uri: &str) -> Result<Box<dyn Read>> {
        self.store.open_in(uri)
    }

    fn open_out(&self, uri: &str) -> Result<Box<dyn Write>> {
        self.store.open_out(uri)
    }
}

impl UriConverter for PrefixConverter {
    fn claims(&self, uri: &str) -> bool {
        uri.starts_with(&self.prefix)
    }
}
