//! Lazy proxy resolution
//!
//! A proxy stands in for an object in a document that has not been loaded.
//! Its referrers are tracked in the proxy's inverse-relation table. On first
//! touch the target resource is located (loading it if needed), the proxy is
//! marked resolved and every referrer slot is redirected to the target.

use std::time::Instant;

use crate::errors::{ModelError, Result};
use crate::model::{ObjectId, ProxyState, Slot};
use crate::ops::{resource_ops, ResourceSet};
use crate::persistence::fragment;
use crate::value::Value;
use crate::{log_op_end, log_op_error, log_op_start};

/// The object a handle stands for, resolving an unresolved proxy
///
/// Non-proxy handles map to themselves; resolved proxies to their target.
///
/// # Errors
///
/// `ObjectNotFound` for a foreign handle, `UnresolvedProxy` when the target
/// cannot be located.
pub fn deref(rs: &mut ResourceSet, object: ObjectId) -> Result<ObjectId> {
    let effective = rs.effective(object);
    let state = rs.object_data(effective)?.proxy.clone();
    match state {
        Some(state) if state.resolved.is_none() => resolve_proxy(rs, effective, state),
        _ => Ok(effective),
    }
}

/// Force resolution of a proxy; alias of [`deref`]
///
/// # Errors
///
/// As [`deref`].
pub fn resolve(rs: &mut ResourceSet, object: ObjectId) -> Result<ObjectId> {
    deref(rs, object)
}

/// Resolve every proxy referenced from a resource's contents
///
/// Returns the proxies that could not be resolved.
pub fn resolve_all(rs: &mut ResourceSet, resource: crate::model::ResourceId) -> Result<Vec<ObjectId>> {
    let proxies = rs.resource(resource)?.proxies().to_vec();
    let mut failed = Vec::new();
    for proxy in proxies {
        match deref(rs, proxy) {
            Ok(_) => {}
            Err(ModelError::UnresolvedProxy { .. }) => failed.push(proxy),
            Err(err) => return Err(err),
        }
    }
    Ok(failed)
}

/// Whether list entry `candidate` stands for `object`
///
/// True for the object itself, a proxy resolved to it, or an unresolved
/// proxy whose URI and fragment lead to it in an already-loaded resource.
pub(crate) fn designates(rs: &ResourceSet, candidate: ObjectId, object: ObjectId) -> bool {
    let candidate = rs.effective(candidate);
    let object = rs.effective(object);
    if candidate == object {
        return true;
    }
    match rs.object_data(candidate).ok().and_then(|d| d.proxy.as_ref()) {
        Some(state) if state.resolved.is_none() => rs
            .resource_by_uri(&state.uri)
            .and_then(|resource| fragment::resolve(rs, resource, &state.fragment))
            .is_some_and(|found| rs.effective(found) == object),
        _ => false,
    }
}

fn resolve_proxy(rs: &mut ResourceSet, proxy: ObjectId, state: ProxyState) -> Result<ObjectId> {
    log_op_start!("proxy_resolve", proxy_uri = %state.target_uri());
    let start = Instant::now();

    let result = resolve_proxy_impl(rs, proxy, &state).map_err(|e| {
        log_op_error!(
            "proxy_resolve",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "proxy_resolve",
        duration_ms = start.elapsed().as_millis() as u64,
        proxy_uri = %state.target_uri()
    );
    Ok(result)
}

fn resolve_proxy_impl(rs: &mut ResourceSet, proxy: ObjectId, state: &ProxyState) -> Result<ObjectId> {
    let unresolved = || ModelError::UnresolvedProxy {
        uri: state.uri.clone(),
        fragment: state.fragment.clone(),
    };
    let target = match resource_ops::locate(rs, &state.uri, &state.fragment) {
        Ok(Some(target)) => rs.effective(target),
        Ok(None) => return Err(unresolved()),
        Err(ModelError::Io { .. }) | Err(ModelError::ResourceNotFound { .. }) => return Err(unresolved()),
        Err(err) => return Err(err),
    };
    if target == proxy {
        return Err(unresolved());
    }

    rs.raw_set_proxy(
        proxy,
        Some(ProxyState {
            resolved: Some(target),
            ..state.clone()
        }),
    );
    let referrers = std::mem::take(&mut rs.object_data_mut(proxy)?.inverse_rels);
    for (source, feature) in referrers {
        let from = Value::Object(proxy);
        let to = Value::Object(target);
        let slot = rs.object_data(source)?.slots.get(&feature).cloned();
        match slot {
            Some(Slot::Single(v)) if v == from => {
                rs.raw_replace_slot(source, &feature, Some(Slot::Single(to)));
            }
            Some(Slot::Many(list)) => {
                if let Some(index) = list.index_of(&from) {
                    let duplicate = list
                        .iter()
                        .enumerate()
                        .any(|(i, v)| i != index && v.as_object().is_some_and(|o| rs.effective(o) == target));
                    if duplicate {
                        rs.raw_list_remove(source, &feature, index);
                    } else {
                        rs.raw_list_replace(source, &feature, index, to);
                    }
                }
            }
            _ => continue,
        }
        match feature.opposite() {
            Some(opposite) if !feature.is_containment() => {
                let back = Value::Object(source);
                if opposite.is_many() {
                    let view: &ResourceSet = rs;
                    let present = view.object_data(target)?.many(&opposite).is_some_and(|l| {
                        l.iter()
                            .any(|v| v.as_object().is_some_and(|o| designates(view, o, source)))
                    });
                    if !present {
                        rs.raw_list_insert(target, &opposite, usize::MAX, back);
                    }
                } else {
                    rs.raw_replace_slot(target, &opposite, Some(Slot::Single(back)));
                }
                rs.raw_set_flag(target, &opposite, true);
            }
            _ => rs.raw_insert_inverse(target, usize::MAX, source, feature),
        }
    }
    tracing::debug!(proxy = %proxy, resolved = %target, "proxy resolved");
    Ok(target)
}
