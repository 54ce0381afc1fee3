use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::{ModelError, Result};
use crate::meta::{EClass, EPackage, EStructuralFeature, Registry};
use crate::model::{uri, Containment, ObjectData, ObjectId, ProxyState, Resource, ResourceId, Slot, UriMapper, ValueList};
use crate::ops::journal::{self, Change};
use crate::ops::notify::{self, ListenerId, Notification};
use crate::persistence::{
    ByteStreamProvider, DocumentFormat, JsonFormat, MemoryProvider, SaveOptions, UriConverter,
};
use crate::value::Value;

/// Open journal frame: recorded changes plus the length of the notification
/// queue when the frame was opened
#[derive(Default)]
struct Frame {
    changes: Vec<Change>,
    pending_mark: usize,
}

/// Owner of resources, model objects and the metamodel context they use
///
/// A resource set is single-threaded: every read and write happens on the
/// thread that owns it. Objects are arena-allocated and addressed by
/// [`ObjectId`]; they are never freed while the set is alive.
pub struct ResourceSet {
    objects: Vec<ObjectData>,
    resources: Vec<Option<Resource>>,
    uri_index: HashMap<String, ResourceId>,
    registry: Registry,
    uri_mapper: UriMapper,
    converters: Vec<Rc<dyn UriConverter>>,
    provider: Rc<dyn ByteStreamProvider>,
    formats: HashMap<String, Rc<dyn DocumentFormat>>,
    default_format: Rc<dyn DocumentFormat>,
    save_options: SaveOptions,
    journal: Vec<Frame>,
    pending: Vec<Notification>,
    deliver: bool,
    io_depth: u32,
    next_listener: u64,
}

impl Default for ResourceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSet")
            .field("objects", &self.objects.len())
            .field("resources", &self.resources.iter().flatten().map(Resource::uri).collect::<Vec<_>>())
            .field("registry", &self.registry)
            .finish()
    }
}

impl ResourceSet {
    /// Resource set seeded from the thread's global registry, with an
    /// in-memory byte-stream provider and the JSON document format
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }

    pub fn with_registry(registry: Registry) -> Self {
        let json: Rc<dyn DocumentFormat> = Rc::new(JsonFormat);
        let mut formats = HashMap::new();
        formats.insert("json".to_string(), json.clone());
        ResourceSet {
            objects: Vec::new(),
            resources: Vec::new(),
            uri_index: HashMap::new(),
            registry,
            uri_mapper: UriMapper::new(),
            converters: Vec::new(),
            provider: Rc::new(MemoryProvider::new()),
            formats,
            default_format: json,
            save_options: SaveOptions::default(),
            journal: Vec::new(),
            pending: Vec::new(),
            deliver: true,
            io_depth: 0,
            next_listener: 0,
        }
    }

    // ----- context -----

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a metamodel package (and its sub-packages) in this set
    ///
    /// # Errors
    ///
    /// `RegistryBusy` while a load or save is running on this set.
    pub fn register_package(&mut self, package: &EPackage) -> Result<()> {
        if self.io_depth > 0 {
            return Err(ModelError::RegistryBusy {
                ns_uri: package.ns_uri(),
            });
        }
        self.registry.register(package);
        Ok(())
    }

    pub fn uri_mapper(&self) -> &UriMapper {
        &self.uri_mapper
    }

    pub fn uri_mapper_mut(&mut self) -> &mut UriMapper {
        &mut self.uri_mapper
    }

    /// Append a URI converter; converters are consulted in registration order
    pub fn add_converter(&mut self, converter: Rc<dyn UriConverter>) {
        self.converters.push(converter);
    }

    pub(crate) fn converters(&self) -> Vec<Rc<dyn UriConverter>> {
        self.converters.clone()
    }

    pub fn set_provider(&mut self, provider: Rc<dyn ByteStreamProvider>) {
        self.provider = provider;
    }

    pub fn provider(&self) -> Rc<dyn ByteStreamProvider> {
        self.provider.clone()
    }

    /// Associate a document format with a file extension
    pub fn register_format(&mut self, extension: &str, format: Rc<dyn DocumentFormat>) {
        self.formats.insert(extension.to_string(), format);
    }

    /// Format used when no extension matches
    pub fn set_default_format(&mut self, format: Rc<dyn DocumentFormat>) {
        self.default_format = format;
    }

    pub fn format_for(&self, uri: &str) -> Rc<dyn DocumentFormat> {
        uri::extension(uri)
            .and_then(|ext| self.formats.get(&ext).cloned())
            .unwrap_or_else(|| self.default_format.clone())
    }

    pub fn save_options(&self) -> &SaveOptions {
        &self.save_options
    }

    pub fn set_save_options(&mut self, options: SaveOptions) {
        self.save_options = options;
    }

    /// Turn notification delivery on or off
    pub fn set_deliver(&mut self, deliver: bool) {
        self.deliver = deliver;
    }

    pub fn is_delivering(&self) -> bool {
        self.deliver
    }

    /// Normalize, then apply the URI mapper
    pub fn normalize_uri(&self, text: &str) -> String {
        let normalized = uri::normalize(text);
        uri::normalize(&self.uri_mapper.map(&normalized))
    }

    pub(crate) fn io_enter(&mut self) {
        self.io_depth += 1;
    }

    pub(crate) fn io_exit(&mut self) {
        self.io_depth = self.io_depth.saturating_sub(1);
    }

    pub fn is_busy(&self) -> bool {
        self.io_depth > 0
    }

    // ----- resources -----

    /// # Errors
    ///
    /// `ResourceNotFound` if the handle is stale or foreign.
    pub fn resource(&self, id: ResourceId) -> Result<&Resource> {
        self.resources
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| ModelError::ResourceNotFound {
                uri: id.to_string(),
            })
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> Result<&mut Resource> {
        self.resources
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| ModelError::ResourceNotFound {
                uri: id.to_string(),
            })
    }

    /// Live resources in creation order
    pub fn resources(&self) -> Vec<ResourceId> {
        self.resources
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_some())
            .map(|(i, _)| ResourceId(i as u32))
            .collect()
    }

    /// Resource registered under `uri` (normalized)
    pub fn resource_by_uri(&self, uri: &str) -> Option<ResourceId> {
        self.uri_index.get(&self.normalize_uri(uri)).copied()
    }

    pub(crate) fn insert_resource(&mut self, uri: &str) -> Result<ResourceId> {
        let key = self.normalize_uri(uri);
        if self.uri_index.contains_key(&key) {
            return Err(ModelError::ResourceExists { uri: key });
        }
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(Some(Resource::new(&key)));
        self.uri_index.insert(key, id);
        Ok(id)
    }

    pub(crate) fn drop_resource(&mut self, id: ResourceId) -> Option<Resource> {
        let resource = self.resources.get_mut(id.index())?.take()?;
        self.uri_index.retain(|_, r| *r != id);
        Some(resource)
    }

    pub(crate) fn rename_resource(&mut self, id: ResourceId, uri: &str) -> Result<()> {
        let key = self.normalize_uri(uri);
        if let Some(existing) = self.uri_index.get(&key) {
            if *existing != id {
                return Err(ModelError::ResourceExists { uri: key });
            }
        }
        self.uri_index.retain(|_, r| *r != id);
        self.uri_index.insert(key.clone(), id);
        self.resource_mut(id)?.uri = key;
        Ok(())
    }

    // ----- objects -----

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        id.index() < self.objects.len()
    }

    pub(crate) fn object_data(&self, id: ObjectId) -> Result<&ObjectData> {
        self.objects
            .get(id.index())
            .ok_or_else(|| ModelError::ObjectNotFound {
                object: id.to_string(),
            })
    }

    pub(crate) fn object_data_mut(&mut self, id: ObjectId) -> Result<&mut ObjectData> {
        self.objects
            .get_mut(id.index())
            .ok_or_else(|| ModelError::ObjectNotFound {
                object: id.to_string(),
            })
    }

    pub(crate) fn alloc_object(&mut self, class: &EClass) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(ObjectData::new(class.clone()));
        id
    }

    /// Follow a resolved proxy to its target; other handles map to themselves
    pub fn effective(&self, id: ObjectId) -> ObjectId {
        let mut current = id;
        for _ in 0..self.objects.len() {
            match self.objects.get(current.index()).and_then(|d| d.proxy.as_ref()) {
                Some(ProxyState {
                    resolved: Some(target),
                    ..
                }) => current = *target,
                _ => break,
            }
        }
        current
    }

    /// Meta-class of an object; for an unresolved proxy, the declared type
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` for a foreign handle.
    pub fn class_of(&self, id: ObjectId) -> Result<EClass> {
        Ok(self.object_data(self.effective(id))?.class.clone())
    }

    /// Resource whose containment tree holds `id`
    pub fn resource_id_of(&self, id: ObjectId) -> Option<ResourceId> {
        let mut current = self.effective(id);
        for _ in 0..=self.objects.len() {
            let data = self.objects.get(current.index())?;
            if let Some(resource) = data.resource {
                return Some(resource);
            }
            current = data.container.as_ref()?.parent;
        }
        None
    }

    pub(crate) fn next_listener_id(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }

    // ----- journal -----

    pub(crate) fn begin_frame(&mut self) {
        self.journal.push(Frame {
            changes: Vec::new(),
            pending_mark: self.pending.len(),
        });
    }

    /// Close the current frame and hand its changes to the caller
    pub(crate) fn end_frame(&mut self) -> Vec<Change> {
        self.journal.pop().map(|f| f.changes).unwrap_or_default()
    }

    /// Close the current frame, folding its changes into the enclosing one
    pub(crate) fn commit_frame(&mut self) {
        let changes = self.end_frame();
        if let Some(parent) = self.journal.last_mut() {
            parent.changes.extend(changes);
        }
    }

    /// Close the current frame, undo everything it recorded and drop the
    /// notifications queued since it was opened
    pub(crate) fn abort_frame(&mut self) {
        let Some(frame) = self.journal.pop() else {
            return;
        };
        journal::revert(self, frame.changes);
        self.pending.truncate(frame.pending_mark);
    }

    fn record(&mut self, change: Change) {
        if let Some(frame) = self.journal.last_mut() {
            frame.changes.push(change);
        }
    }

    // ----- notification queue -----

    pub(crate) fn queue(&mut self, notification: Notification) {
        if let Some(resource) = match notification.notifier {
            notify::Notifier::Resource(r) => Some(r),
            notify::Notifier::Object(o) => self.resource_id_of(o),
        } {
            if let Ok(r) = self.resource_mut(resource) {
                r.modified = true;
            }
        }
        self.pending.push(notification);
    }

    /// Deliver queued notifications (dropped while delivery is off)
    pub(crate) fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if !self.deliver {
            return;
        }
        for notification in &pending {
            notify::dispatch(self, notification);
        }
    }

    /// Flush once no journal frame is open
    pub(crate) fn settle(&mut self) {
        if self.journal.is_empty() {
            self.flush();
        }
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn truncate_pending(&mut self, len: usize) {
        self.pending.truncate(len);
    }

    // ----- journaled primitives -----

    pub(crate) fn write_slot(&mut self, object: ObjectId, feature: &EStructuralFeature, slot: Option<Slot>) -> Option<Slot> {
        let old = self.raw_replace_slot(object, feature, slot);
        self.record(Change::Slot {
            object,
            feature: feature.clone(),
            old: old.clone(),
        });
        old
    }

    /// Ensure a many slot exists, installing an empty list if absent
    pub(crate) fn ensure_list(&mut self, object: ObjectId, feature: &EStructuralFeature) {
        let present = self
            .objects
            .get(object.index())
            .is_some_and(|d| matches!(d.slots.get(feature), Some(Slot::Many(_))));
        if !present {
            self.write_slot(object, feature, Some(Slot::Many(ValueList::new())));
        }
    }

    pub(crate) fn list_insert(&mut self, object: ObjectId, feature: &EStructuralFeature, index: usize, value: Value) -> usize {
        self.ensure_list(object, feature);
        let at = self.raw_list_insert(object, feature, index, value);
        self.record(Change::ListInsert {
            object,
            feature: feature.clone(),
            index: at,
        });
        at
    }

    pub(crate) fn list_remove(&mut self, object: ObjectId, feature: &EStructuralFeature, index: usize) -> Option<Value> {
        let value = self.raw_list_remove(object, feature, index)?;
        self.record(Change::ListRemove {
            object,
            feature: feature.clone(),
            index,
            value: value.clone(),
        });
        Some(value)
    }

    pub(crate) fn list_move(&mut self, object: ObjectId, feature: &EStructuralFeature, from: usize, to: usize) -> Option<Value> {
        let value = self.raw_list_move(object, feature, from, to)?;
        self.record(Change::ListMove {
            object,
            feature: feature.clone(),
            from,
            to,
        });
        Some(value)
    }

    pub(crate) fn set_flag(&mut self, object: ObjectId, feature: &EStructuralFeature, set: bool) {
        let was_set = self
            .objects
            .get(object.index())
            .is_some_and(|d| d.set_features.contains(feature));
        if was_set == set {
            return;
        }
        self.raw_set_flag(object, feature, set);
        self.record(Change::SetFlag {
            object,
            feature: feature.clone(),
            was_set,
        });
    }

    pub(crate) fn set_container(&mut self, object: ObjectId, containment: Option<Containment>) {
        let old = self.raw_set_container(object, containment);
        self.record(Change::Container { object, old });
    }

    pub(crate) fn add_inverse(&mut self, target: ObjectId, source: ObjectId, feature: &EStructuralFeature) {
        if let Some(data) = self.objects.get_mut(target.index()) {
            data.inverse_rels.push((source, feature.clone()));
            self.record(Change::InverseAdd {
                target,
                source,
                feature: feature.clone(),
            });
        }
    }

    pub(crate) fn remove_inverse(&mut self, target: ObjectId, source: ObjectId, feature: &EStructuralFeature) {
        if let Some(index) = self.raw_remove_inverse(target, source, feature) {
            self.record(Change::InverseRemove {
                target,
                source,
                feature: feature.clone(),
                index,
            });
        }
    }

    pub(crate) fn root_insert(&mut self, resource: ResourceId, index: usize, object: ObjectId) -> usize {
        let at = self.raw_root_insert(resource, index, object);
        self.record(Change::RootInsert { resource, index: at });
        at
    }

    pub(crate) fn root_remove(&mut self, resource: ResourceId, index: usize) -> Option<ObjectId> {
        let object = self.raw_root_remove(resource, index)?;
        self.record(Change::RootRemove {
            resource,
            index,
            object,
        });
        Some(object)
    }

    pub(crate) fn set_root_resource(&mut self, object: ObjectId, resource: Option<ResourceId>) {
        let old = self.raw_set_root_resource(object, resource);
        self.record(Change::RootResource { object, old });
    }

    pub(crate) fn id_map_put(&mut self, resource: ResourceId, id: &str, object: Option<ObjectId>) {
        let old = self.raw_id_map_put(resource, id, object);
        self.record(Change::IdMap {
            resource,
            id: id.to_string(),
            old,
        });
    }

    pub(crate) fn set_xmi_id(&mut self, object: ObjectId, id: Option<String>) {
        let old = self.raw_set_xmi_id(object, id);
        self.record(Change::ObjectXmiId { object, old });
    }

    // ----- raw writes (no journal) -----

    pub(crate) fn raw_replace_slot(&mut self, object: ObjectId, feature: &EStructuralFeature, slot: Option<Slot>) -> Option<Slot> {
        let data = self.objects.get_mut(object.index())?;
        match slot {
            Some(s) => data.slots.insert(feature.clone(), s),
            None => data.slots.remove(feature),
        }
    }

    pub(crate) fn raw_list_insert(&mut self, object: ObjectId, feature: &EStructuralFeature, index: usize, value: Value) -> usize {
        let Some(data) = self.objects.get_mut(object.index()) else {
            return index;
        };
        let slot = data
            .slots
            .entry(feature.clone())
            .or_insert_with(|| Slot::Many(ValueList::new()));
        match slot {
            Slot::Many(list) => {
                let at = index.min(list.len());
                list.insert(at, value);
                at
            }
            Slot::Single(_) => index,
        }
    }

    pub(crate) fn raw_list_remove(&mut self, object: ObjectId, feature: &EStructuralFeature, index: usize) -> Option<Value> {
        match self.objects.get_mut(object.index())?.slots.get_mut(feature)? {
            Slot::Many(list) => list.remove(index),
            Slot::Single(_) => None,
        }
    }

    pub(crate) fn raw_list_move(&mut self, object: ObjectId, feature: &EStructuralFeature, from: usize, to: usize) -> Option<Value> {
        match self.objects.get_mut(object.index())?.slots.get_mut(feature)? {
            Slot::Many(list) => list.move_item(from, to),
            Slot::Single(_) => None,
        }
    }

    /// Replace one list element in place (proxy replacement)
    pub(crate) fn raw_list_replace(&mut self, object: ObjectId, feature: &EStructuralFeature, index: usize, value: Value) -> Option<Value> {
        match self.objects.get_mut(object.index())?.slots.get_mut(feature)? {
            Slot::Many(list) => list.replace(index, value),
            Slot::Single(_) => None,
        }
    }

    pub(crate) fn raw_set_flag(&mut self, object: ObjectId, feature: &EStructuralFeature, set: bool) {
        if let Some(data) = self.objects.get_mut(object.index()) {
            if set {
                data.set_features.insert(feature.clone());
            } else {
                data.set_features.remove(feature);
            }
        }
    }

    pub(crate) fn raw_set_container(&mut self, object: ObjectId, containment: Option<Containment>) -> Option<Containment> {
        let data = self.objects.get_mut(object.index())?;
        std::mem::replace(&mut data.container, containment)
    }

    pub(crate) fn raw_remove_inverse(&mut self, target: ObjectId, source: ObjectId, feature: &EStructuralFeature) -> Option<usize> {
        let data = self.objects.get_mut(target.index())?;
        let index = data
            .inverse_rels
            .iter()
            .position(|(s, f)| *s == source && f == feature)?;
        data.inverse_rels.remove(index);
        Some(index)
    }

    pub(crate) fn raw_insert_inverse(&mut self, target: ObjectId, index: usize, source: ObjectId, feature: EStructuralFeature) {
        if let Some(data) = self.objects.get_mut(target.index()) {
            let at = index.min(data.inverse_rels.len());
            data.inverse_rels.insert(at, (source, feature));
        }
    }

    pub(crate) fn raw_root_insert(&mut self, resource: ResourceId, index: usize, object: ObjectId) -> usize {
        match self.resource_mut(resource) {
            Ok(r) => {
                let at = index.min(r.contents.len());
                r.contents.insert(at, object);
                at
            }
            Err(_) => index,
        }
    }

    pub(crate) fn raw_root_remove(&mut self, resource: ResourceId, index: usize) -> Option<ObjectId> {
        let r = self.resource_mut(resource).ok()?;
        (index < r.contents.len()).then(|| r.contents.remove(index))
    }

    pub(crate) fn raw_set_root_resource(&mut self, object: ObjectId, resource: Option<ResourceId>) -> Option<ResourceId> {
        let data = self.objects.get_mut(object.index())?;
        std::mem::replace(&mut data.resource, resource)
    }

    pub(crate) fn raw_id_map_put(&mut self, resource: ResourceId, id: &str, object: Option<ObjectId>) -> Option<ObjectId> {
        let r = self.resource_mut(resource).ok()?;
        match object {
            Some(o) => r.id_map.insert(id.to_string(), o),
            None => r.id_map.remove(id),
        }
    }

    pub(crate) fn raw_set_xmi_id(&mut self, object: ObjectId, id: Option<String>) -> Option<String> {
        let data = self.objects.get_mut(object.index())?;
        std::mem::replace(&mut data.xmi_id, id)
    }

    pub(crate) fn raw_set_proxy(&mut self, object: ObjectId, proxy: Option<ProxyState>) -> Option<ProxyState> {
        let data = self.objects.get_mut(object.index())?;
        std::mem::replace(&mut data.proxy, proxy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, ecore, make_class, make_package};

    fn item_class() -> (EClass, EStructuralFeature) {
        let pkg = make_package("s", "http://store.test", "s");
        let item = make_class(&pkg, "Item");
        let tags = add_feature(&item, EStructuralFeature::attribute("tags", &ecore::e_string()).many()).unwrap();
        (item, tags)
    }

    #[test]
    fn test_insert_resource_rejects_duplicate_uri() {
        let mut rs = ResourceSet::new();
        rs.insert_resource("./a.json").unwrap();
        let result = rs.insert_resource("a.json");
        assert!(matches!(result, Err(ModelError::ResourceExists { .. })));
    }

    #[test]
    fn test_unknown_handles_fail() {
        let rs = ResourceSet::new();
        assert!(matches!(rs.object_data(ObjectId(9)), Err(ModelError::ObjectNotFound { .. })));
        assert!(matches!(rs.resource(ResourceId(0)), Err(ModelError::ResourceNotFound { .. })));
    }

    #[test]
    fn test_frame_abort_reverts_primitives() {
        let (item, tags) = item_class();
        let mut rs = ResourceSet::new();
        let obj = rs.alloc_object(&item);

        rs.begin_frame();
        rs.list_insert(obj, &tags, 0, Value::from("a"));
        rs.set_flag(obj, &tags, true);
        rs.abort_frame();

        let data = rs.object_data(obj).unwrap();
        assert!(data.slots.get(&tags).is_none());
        assert!(!data.set_features.contains(&tags));
    }

    #[test]
    fn test_register_package_rejected_during_io() {
        let mut rs = ResourceSet::new();
        let pkg = make_package("late", "http://late", "late");
        rs.io_enter();
        assert!(matches!(rs.register_package(&pkg), Err(ModelError::RegistryBusy { .. })));
        rs.io_exit();
        rs.register_package(&pkg).unwrap();
        assert!(rs.registry().contains("http://late"));
    }

    #[test]
    fn test_normalize_uri_applies_mapper() {
        let mut rs = ResourceSet::new();
        rs.uri_mapper_mut().insert("platform:/resource/", "/ws/");
        assert_eq!(rs.normalize_uri("platform:/resource/./m/a.xmi"), "/ws/m/a.xmi");
    }
}
