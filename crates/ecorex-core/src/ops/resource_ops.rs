//! Resources: roots, loading, saving and cross-document lookup
//!
//! Root-list edits are ordinary journaled mutations and notify listeners.
//! Loading and saving are not journaled: a load runs in a private frame that
//! is reverted on failure and discarded on success, so a failed load leaves
//! the resource empty and unloaded.

use std::io::{Read, Write};
use std::time::Instant;

use uuid::Uuid;

use crate::errors::{ModelError, Result};
use crate::meta::EPackage;
use crate::model::{ObjectId, ProxyState, ResourceId};
use crate::ops::notify::{Notification, NotificationKind};
use crate::ops::reflect_ops::detach;
use crate::ops::{atomically, navigation, proxy_ops, ResourceSet};
use crate::persistence::{ecore_codec, fragment, reader, writer};
use crate::value::Value;
use crate::{log_op_end, log_op_error, log_op_start};

/// Create an empty resource at `uri`
///
/// # Errors
///
/// `ResourceExists` if the set already holds a resource at the normalized
/// URI.
pub fn create_resource(rs: &mut ResourceSet, uri: &str) -> Result<ResourceId> {
    let id = rs.insert_resource(uri)?;
    tracing::debug!(resource = %id, resource_uri = %rs.resource(id)?.uri(), "resource created");
    Ok(id)
}

/// Resource at `uri`, optionally demand-loading it
///
/// With `load` set, a known but unloaded resource is loaded and an unknown
/// URI gets a new resource that is loaded from its document. Without it,
/// unknown URIs yield `None`.
///
/// # Errors
///
/// Whatever [`load`] reports; a resource created here is dropped again when
/// its load fails.
pub fn get_resource(rs: &mut ResourceSet, uri: &str, load_on_demand: bool) -> Result<Option<ResourceId>> {
    if let Some(id) = rs.resource_by_uri(uri) {
        if load_on_demand && !rs.resource(id)?.is_loaded() {
            load(rs, id)?;
        }
        return Ok(Some(id));
    }
    if !load_on_demand {
        return Ok(None);
    }
    let id = rs.insert_resource(uri)?;
    if let Err(err) = load(rs, id) {
        rs.drop_resource(id);
        return Err(err);
    }
    Ok(Some(id))
}

/// Append a root, taking it out of its previous container or resource
///
/// # Errors
///
/// `ResourceNotFound` for a foreign resource handle, `ObjectNotFound` for a
/// foreign object handle.
pub fn append(rs: &mut ResourceSet, resource: ResourceId, object: ObjectId) -> Result<()> {
    rs.resource(resource)?;
    let object = proxy_ops::deref(rs, object)?;
    atomically(rs, |rs| insert_root(rs, resource, None, object))
}

/// Insert a root at `index`
///
/// # Errors
///
/// As [`append`], plus `BadValue` when `index` is past the end.
pub fn insert(rs: &mut ResourceSet, resource: ResourceId, index: usize, object: ObjectId) -> Result<()> {
    rs.resource(resource)?;
    let object = proxy_ops::deref(rs, object)?;
    atomically(rs, |rs| insert_root(rs, resource, Some(index), object))
}

fn insert_root(rs: &mut ResourceSet, resource: ResourceId, index: Option<usize>, object: ObjectId) -> Result<()> {
    if let Some(previous) = rs.resource_id_of(object) {
        if previous != resource {
            unregister_ids(rs, previous, object)?;
        }
    }
    detach(rs, object)?;
    let len = rs.resource(resource)?.contents().len();
    let at = match index {
        Some(i) if i > len => {
            return Err(ModelError::bad_value(
                "contents",
                format!("index {} out of range for {} roots", i, len),
            ))
        }
        Some(i) => i,
        None => len,
    };
    let at = rs.root_insert(resource, at, object);
    rs.set_root_resource(object, Some(resource));
    register_ids(rs, resource, object)?;
    rs.queue(Notification::resource(
        resource,
        NotificationKind::Add,
        Value::Null,
        Value::Object(object),
        Some(at),
    ));
    rs.resource_mut(resource)?.loaded = true;
    Ok(())
}

/// Remove a root; `false` when `object` is not a root of `resource`
///
/// # Errors
///
/// `ResourceNotFound` for a foreign resource handle.
pub fn remove(rs: &mut ResourceSet, resource: ResourceId, object: ObjectId) -> Result<bool> {
    let object = rs.effective(object);
    if !rs.resource(resource)?.contents().contains(&object) {
        return Ok(false);
    }
    atomically(rs, |rs| {
        unregister_ids(rs, resource, object)?;
        detach(rs, object)?;
        Ok(true)
    })
}

/// Root objects in order
///
/// # Errors
///
/// `ResourceNotFound` for a foreign resource handle.
pub fn contents(rs: &ResourceSet, resource: ResourceId) -> Result<Vec<ObjectId>> {
    Ok(rs.resource(resource)?.contents().to_vec())
}

/// Object addressed by a fragment, `None` when nothing matches
///
/// # Errors
///
/// `ResourceNotFound` for a foreign resource handle.
pub fn resolve(rs: &ResourceSet, resource: ResourceId, fragment: &str) -> Result<Option<ObjectId>> {
    rs.resource(resource)?;
    Ok(fragment::resolve(rs, resource, fragment))
}

/// Move a resource to a new URI
///
/// # Errors
///
/// `ResourceExists` when another resource already uses `uri`.
pub fn set_uri(rs: &mut ResourceSet, resource: ResourceId, uri: &str) -> Result<()> {
    rs.rename_resource(resource, uri)
}

/// Attach a metamodel package to a resource so that saving writes it
///
/// # Errors
///
/// `ResourceNotFound` for a foreign resource handle.
pub fn add_package(rs: &mut ResourceSet, resource: ResourceId, package: &EPackage) -> Result<()> {
    let res = rs.resource_mut(resource)?;
    if !res.packages.contains(package) {
        res.packages.push(package.clone());
        res.modified = true;
    }
    res.loaded = true;
    Ok(())
}

fn register_ids(rs: &mut ResourceSet, resource: ResourceId, object: ObjectId) -> Result<()> {
    let mut members = vec![object];
    members.extend(navigation::all_contents(rs, object));
    for member in members {
        if let Some(id) = rs.object_data(member)?.xmi_id.clone() {
            rs.id_map_put(resource, &id, Some(member));
        }
    }
    Ok(())
}

fn unregister_ids(rs: &mut ResourceSet, resource: ResourceId, object: ObjectId) -> Result<()> {
    let mut members = vec![object];
    members.extend(navigation::all_contents(rs, object));
    for member in members {
        if let Some(id) = rs.object_data(member)?.xmi_id.clone() {
            if rs.resource(resource)?.object_by_id(&id) == Some(member) {
                rs.id_map_put(resource, &id, None);
            }
        }
    }
    Ok(())
}

// ----- loading -----

/// Populate a resource from its document
///
/// A resource that is already loaded is left alone. Metamodel documents
/// attach their packages to the resource and register them in the set's
/// registry once the load completes.
///
/// # Errors
///
/// `ResourceNotFound` / `Io` from the byte-stream provider,
/// `DocumentMalformed` from the format, `UnknownType` / `UnknownFeature` /
/// `UnexpectedRoot` from the deserializer.
pub fn load(rs: &mut ResourceSet, resource: ResourceId) -> Result<()> {
    let uri = rs.resource(resource)?.uri().to_string();
    if rs.resource(resource)?.is_loaded() {
        return Ok(());
    }
    log_op_start!("resource_load", resource_uri = %uri);
    let start = Instant::now();

    rs.io_enter();
    let result = load_impl(rs, resource, &uri);
    rs.io_exit();
    let packages = result.map_err(|e| {
        log_op_error!(
            "resource_load",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            resource_uri = %uri
        );
        e
    })?;
    for package in &packages {
        rs.register_package(package)?;
    }

    let res = rs.resource(resource)?;
    log_op_end!(
        "resource_load",
        duration_ms = start.elapsed().as_millis() as u64,
        resource_uri = %uri,
        roots = res.contents().len(),
        proxies = res.proxies().len()
    );
    Ok(())
}

fn load_impl(rs: &mut ResourceSet, resource: ResourceId, uri: &str) -> Result<Vec<EPackage>> {
    let mut bytes = Vec::new();
    open_in(rs, uri)?
        .read_to_end(&mut bytes)
        .map_err(|e| io_failure(uri, e))?;
    let root = rs.format_for(uri).parse(&bytes)?;

    if ecore_codec::is_metamodel(&root) {
        let packages = ecore_codec::read_packages(&root, rs.registry())?;
        let res = rs.resource_mut(resource)?;
        res.packages = packages.clone();
        res.loaded = true;
        res.modified = false;
        res.warnings.clear();
        return Ok(packages);
    }

    let mark = rs.pending_len();
    rs.begin_frame();
    match reader::read_resource(rs, resource, &root) {
        Ok(proxies) => {
            rs.end_frame();
            rs.truncate_pending(mark);
            let res = rs.resource_mut(resource)?;
            res.proxies = proxies;
            res.loaded = true;
            res.modified = false;
            res.warnings.clear();
            Ok(Vec::new())
        }
        Err(err) => {
            rs.abort_frame();
            Err(err)
        }
    }
}

/// Turn every object of a resource into a proxy for its old address and
/// empty the resource
///
/// References from other resources keep their handles; touching one loads
/// the document again. Not undoable.
///
/// # Errors
///
/// `ResourceNotFound` for a foreign resource handle.
pub fn unload(rs: &mut ResourceSet, resource: ResourceId) -> Result<()> {
    let uri = rs.resource(resource)?.uri().to_string();
    let mut addressed = Vec::new();
    for root in rs.resource(resource)?.contents().to_vec() {
        let mut members = vec![root];
        members.extend(navigation::all_contents(rs, root));
        for member in members {
            let fragment = fragment::fragment_of(rs, member).unwrap_or_default();
            addressed.push((member, fragment));
        }
    }
    for (object, fragment) in &addressed {
        let data = rs.object_data_mut(*object)?;
        data.slots.clear();
        data.set_features.clear();
        data.container = None;
        data.resource = None;
        data.xmi_id = None;
        data.proxy = Some(ProxyState {
            uri: uri.clone(),
            fragment: fragment.clone(),
            resolved: None,
        });
    }
    let res = rs.resource_mut(resource)?;
    res.contents.clear();
    res.id_map.clear();
    res.proxies.clear();
    res.packages.clear();
    res.warnings.clear();
    res.loaded = false;
    res.modified = false;
    tracing::debug!(resource_uri = %uri, objects = addressed.len(), "resource unloaded");
    Ok(())
}

/// Unload a resource and drop it from the set
///
/// # Errors
///
/// `ResourceNotFound` for a foreign resource handle.
pub fn remove_resource(rs: &mut ResourceSet, resource: ResourceId) -> Result<()> {
    unload(rs, resource)?;
    rs.drop_resource(resource);
    Ok(())
}

/// Object at `uri#fragment`, loading the document when needed
pub(crate) fn locate(rs: &mut ResourceSet, uri: &str, fragment: &str) -> Result<Option<ObjectId>> {
    let key = rs.normalize_uri(uri);
    match get_resource(rs, &key, true)? {
        Some(resource) => Ok(fragment::resolve(rs, resource, fragment)),
        None => Ok(None),
    }
}

// ----- saving -----

/// Write a resource to its URI
///
/// References to objects outside every resource are skipped and reported
/// through [`crate::model::Resource::warnings`].
///
/// # Errors
///
/// `UnknownType` for objects whose class has no package, `BadValue` for
/// attribute values with no string form, `Io` from the provider.
pub fn save(rs: &mut ResourceSet, resource: ResourceId) -> Result<()> {
    let uri = rs.resource(resource)?.uri().to_string();
    log_op_start!("resource_save", resource_uri = %uri);
    let start = Instant::now();

    rs.io_enter();
    let result = save_impl(rs, resource, &uri);
    rs.io_exit();
    let written = result.map_err(|e| {
        log_op_error!(
            "resource_save",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            resource_uri = %uri
        );
        e
    })?;

    log_op_end!(
        "resource_save",
        duration_ms = start.elapsed().as_millis() as u64,
        resource_uri = %uri,
        bytes = written
    );
    Ok(())
}

/// Save every modified resource, in creation order
///
/// # Errors
///
/// The first error reported by [`save`].
pub fn save_modified(rs: &mut ResourceSet) -> Result<usize> {
    let mut saved = 0;
    for resource in rs.resources() {
        if rs.resource(resource)?.is_modified() {
            save(rs, resource)?;
            saved += 1;
        }
    }
    Ok(saved)
}

fn save_impl(rs: &mut ResourceSet, resource: ResourceId, uri: &str) -> Result<usize> {
    let options = rs.save_options().clone();
    if options.use_uuid {
        assign_uuids(rs, resource)?;
    }
    let packages = rs.resource(resource)?.packages().to_vec();
    let (root, warnings) = if packages.is_empty() {
        let written = writer::write_resource(rs, resource, &options)?;
        (written.root, written.warnings)
    } else {
        (ecore_codec::write_packages(&packages)?, Vec::new())
    };
    for warning in &warnings {
        tracing::warn!(resource_uri = %uri, "{}", warning);
    }
    let bytes = rs.format_for(uri).write(&root, &options)?;

    let mut out = open_out(rs, uri)?;
    out.write_all(&bytes).map_err(|e| io_failure(uri, e))?;
    out.flush().map_err(|e| io_failure(uri, e))?;

    let res = rs.resource_mut(resource)?;
    res.warnings = warnings;
    res.modified = false;
    Ok(bytes.len())
}

/// Give every object without an id a time-ordered UUID
fn assign_uuids(rs: &mut ResourceSet, resource: ResourceId) -> Result<()> {
    for root in rs.resource(resource)?.contents().to_vec() {
        let mut members = vec![root];
        members.extend(navigation::all_contents(rs, root));
        for member in members {
            if rs.object_data(member)?.xmi_id.is_none() {
                let id = Uuid::now_v7().to_string();
                rs.raw_set_xmi_id(member, Some(id.clone()));
                rs.raw_id_map_put(resource, &id, Some(member));
            }
        }
    }
    Ok(())
}

fn open_in(rs: &ResourceSet, uri: &str) -> Result<Box<dyn Read>> {
    match rs.converters().into_iter().find(|c| c.claims(uri)) {
        Some(converter) => converter.open_in(uri),
        None => rs.provider().open_in(uri),
    }
}

fn open_out(rs: &ResourceSet, uri: &str) -> Result<Box<dyn Write>> {
    match rs.converters().into_iter().find(|c| c.claims(uri)) {
        Some(converter) => converter.open_out(uri),
        None => rs.provider().open_out(uri),
    }
}

fn io_failure(uri: &str, err: std::io::Error) -> ModelError {
    ModelError::Io {
        uri: uri.to_string(),
        message: err.to_string(),
    }
}
