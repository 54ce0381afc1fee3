//! Deleting objects
//!
//! Deletion removes an object from its container (or its resource's roots)
//! and cuts every reference edge between its subtree and the rest of the
//! model. Edges are snapshotted for the whole subtree before the first
//! write, so the order in which edges disappear never changes which edges
//! are cut. The subtree itself stays intact under the deleted object.

use std::collections::HashSet;
use std::time::Instant;

use crate::commands::Command;
use crate::errors::Result;
use crate::meta::EStructuralFeature;
use crate::model::{ObjectId, Slot};
use crate::ops::notify::{Notification, NotificationKind};
use crate::ops::reflect_ops::{detach, unlink};
use crate::ops::{collection_ops, navigation, proxy_ops, ResourceSet};
use crate::value::Value;
use crate::{log_op_end, log_op_error, log_op_start};

/// A reference edge `source.feature -> target` crossing the subtree boundary
#[derive(Debug, Clone)]
struct Edge {
    source: ObjectId,
    feature: EStructuralFeature,
    target: ObjectId,
}

/// Delete an object and return the executed command, ready for undo
///
/// # Errors
///
/// `ObjectNotFound` for a foreign handle, `UnresolvedProxy` when `object`
/// is a proxy whose target cannot be loaded.
pub fn delete(rs: &mut ResourceSet, object: ObjectId) -> Result<Command> {
    let mut command = Command::delete(object);
    command.execute(rs)?;
    Ok(command)
}

/// Cut the subtree of `object` loose inside the caller's frame
pub(crate) fn delete_subtree(rs: &mut ResourceSet, object: ObjectId) -> Result<()> {
    log_op_start!("delete", object = %object);
    let start = Instant::now();

    let removed = delete_impl(rs, object).map_err(|e| {
        log_op_error!(
            "delete",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            object = %object
        );
        e
    })?;

    log_op_end!(
        "delete",
        duration_ms = start.elapsed().as_millis() as u64,
        object = %object,
        edges = removed
    );
    Ok(())
}

fn delete_impl(rs: &mut ResourceSet, object: ObjectId) -> Result<usize> {
    let object = proxy_ops::deref(rs, object)?;
    let mut subtree = vec![object];
    subtree.extend(navigation::all_contents(rs, object));
    let inside: HashSet<ObjectId> = subtree.iter().copied().collect();

    let edges = crossing_edges(rs, &subtree, &inside)?;
    for edge in &edges {
        cut(rs, edge)?;
    }

    if let Some(resource) = rs.resource_id_of(object) {
        for member in &subtree {
            let id = rs.object_data(*member)?.xmi_id.clone();
            if let Some(id) = id {
                if rs.resource(resource)?.object_by_id(&id) == Some(*member) {
                    rs.id_map_put(resource, &id, None);
                }
            }
        }
    }
    detach(rs, object)?;
    Ok(edges.len())
}

/// Outgoing non-containment references first, then incoming inverse
/// relations, both in subtree pre-order
fn crossing_edges(rs: &ResourceSet, subtree: &[ObjectId], inside: &HashSet<ObjectId>) -> Result<Vec<Edge>> {
    let mut edges = Vec::new();
    for member in subtree {
        let data = rs.object_data(*member)?;
        for feature in data.class.all_references() {
            if feature.is_containment() || feature.is_container() || feature.derivation().is_some() {
                continue;
            }
            let targets = match data.slots.get(&feature) {
                Some(Slot::Single(v)) => v.objects(),
                Some(Slot::Many(list)) => list.iter().filter_map(Value::as_object).collect(),
                None => Vec::new(),
            };
            edges.extend(
                targets
                    .into_iter()
                    .filter(|t| !inside.contains(&rs.effective(*t)))
                    .map(|target| Edge {
                        source: *member,
                        feature: feature.clone(),
                        target,
                    }),
            );
        }
    }
    for member in subtree {
        for (source, feature) in &rs.object_data(*member)?.inverse_rels {
            if inside.contains(source) {
                continue;
            }
            edges.push(Edge {
                source: *source,
                feature: feature.clone(),
                target: *member,
            });
        }
    }
    Ok(edges)
}

/// Remove one edge, skipping it when an earlier cut already took it out
fn cut(rs: &mut ResourceSet, edge: &Edge) -> Result<()> {
    let Edge { source, feature, target } = edge;
    let entry = Value::Object(*target);
    if feature.is_many() {
        let index = rs.object_data(*source)?.many(feature).and_then(|l| l.index_of(&entry));
        if let Some(index) = index {
            let value = collection_ops::remove_one(rs, *source, feature, index)?;
            rs.queue(Notification::object(
                *source,
                feature,
                NotificationKind::Remove,
                value,
                Value::Null,
                Some(index),
            ));
        }
        return Ok(());
    }
    if rs.object_data(*source)?.single(feature) != Some(&entry) {
        return Ok(());
    }
    unlink(rs, *source, feature, *target)?;
    rs.write_slot(*source, feature, None);
    rs.set_flag(*source, feature, false);
    rs.queue(Notification::object(
        *source,
        feature,
        NotificationKind::Unset,
        entry,
        Value::Null,
        None,
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ModelError;
    use crate::meta::{add_feature, make_class, make_package, set_opposite, EClass};
    use crate::ops::{object_ops, reflect_ops, resource_ops};

    fn node_class() -> EClass {
        let pkg = make_package("del", "http://delete.test", "del");
        let node = make_class(&pkg, "Node");
        add_feature(&node, EStructuralFeature::containment("kids", &node).many()).unwrap();
        add_feature(&node, EStructuralFeature::reference("mates", &node).many()).unwrap();
        add_feature(&node, EStructuralFeature::reference("buddy", &node)).unwrap();
        let owner = add_feature(&node, EStructuralFeature::reference("owner", &node)).unwrap();
        let owned = add_feature(&node, EStructuralFeature::reference("owned", &node).many()).unwrap();
        set_opposite(&owner, &owned).unwrap();
        node
    }

    #[test]
    fn test_delete_clears_incoming_and_undo_restores() {
        let node = node_class();
        let mut rs = ResourceSet::new();
        let a1 = object_ops::create(&mut rs, &node).unwrap();
        let a2 = object_ops::create(&mut rs, &node).unwrap();
        let a3 = object_ops::create(&mut rs, &node).unwrap();
        collection_ops::append(&mut rs, a1, "mates", a3).unwrap();
        collection_ops::append(&mut rs, a1, "mates", a2).unwrap();
        reflect_ops::set(&mut rs, a3, "buddy", a2).unwrap();

        let mut command = delete(&mut rs, a2).unwrap();
        assert_eq!(reflect_ops::get(&mut rs, a1, "mates").unwrap(), Value::List(vec![Value::Object(a3)]));
        assert_eq!(reflect_ops::get(&mut rs, a3, "buddy").unwrap(), Value::Null);
        assert!(!reflect_ops::is_set(&mut rs, a3, "buddy").unwrap());

        command.undo(&mut rs).unwrap();
        assert_eq!(
            reflect_ops::get(&mut rs, a1, "mates").unwrap(),
            Value::List(vec![Value::Object(a3), Value::Object(a2)])
        );
        assert_eq!(reflect_ops::get(&mut rs, a3, "buddy").unwrap(), Value::Object(a2));
        assert_eq!(navigation::inverse_references(&rs, a2).len(), 2);
    }

    #[test]
    fn test_delete_cuts_opposites_of_subtree_but_keeps_inner_edges() {
        let node = node_class();
        let mut rs = ResourceSet::new();
        let boss = object_ops::create(&mut rs, &node).unwrap();
        let team = object_ops::create(&mut rs, &node).unwrap();
        let member = object_ops::create_in(&mut rs, team, "kids", &node).unwrap();
        reflect_ops::set(&mut rs, member, "owner", boss).unwrap();
        reflect_ops::set(&mut rs, team, "buddy", member).unwrap();

        delete(&mut rs, team).unwrap();

        assert_eq!(reflect_ops::get(&mut rs, boss, "owned").unwrap(), Value::List(vec![]));
        assert_eq!(reflect_ops::get(&mut rs, member, "owner").unwrap(), Value::Null);
        assert_eq!(reflect_ops::get(&mut rs, team, "buddy").unwrap(), Value::Object(member));
        assert_eq!(navigation::container(&rs, member), Some(team));
    }

    #[test]
    fn test_delete_root_drops_ids() {
        let node = node_class();
        let mut rs = ResourceSet::new();
        let res = resource_ops::create_resource(&mut rs, "del.json").unwrap();
        let root = object_ops::create(&mut rs, &node).unwrap();
        resource_ops::append(&mut rs, res, root).unwrap();
        let kid = object_ops::create_in(&mut rs, root, "kids", &node).unwrap();
        object_ops::set_id(&mut rs, kid, Some("k1")).unwrap();

        let mut command = delete(&mut rs, root).unwrap();
        assert!(rs.resource(res).unwrap().contents().is_empty());
        assert_eq!(rs.resource(res).unwrap().object_by_id("k1"), None);

        command.undo(&mut rs).unwrap();
        assert_eq!(rs.resource(res).unwrap().contents(), &[root]);
        assert_eq!(rs.resource(res).unwrap().object_by_id("k1"), Some(kid));
    }

    #[test]
    fn test_delete_foreign_handle_fails() {
        let node = node_class();
        let mut other = ResourceSet::new();
        for _ in 0..3 {
            object_ops::create(&mut other, &node).unwrap();
        }
        let foreign = object_ops::create(&mut other, &node).unwrap();
        let mut rs = ResourceSet::new();

        let err = delete(&mut rs, foreign).unwrap_err();
        assert!(matches!(err, ModelError::CommandInapplicable { .. }));
    }
}
