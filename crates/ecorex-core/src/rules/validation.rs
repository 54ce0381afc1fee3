use crate::errors::{ModelError, Result};
use crate::model::{ObjectId, ResourceId};
use crate::ops::ResourceSet;

use super::invariants;

/// Validate a containment tree
///
/// Runs all invariant checks over `root` and everything it contains:
///
/// 1. Containment edges agree on both sides (parent slot and child container)
/// 2. Every resolved reference with an opposite is mirrored by the opposite
/// 3. Plain references and the targets' inverse-relation tables agree
/// 4. Set or required features respect their lower and upper bounds
///
/// # Errors
///
/// Returns the first violation encountered: `Internal` for broken
/// containment or inverse bookkeeping, `OppositeViolation` for a missing
/// back reference, `BadValue` for a cardinality violation. For exhaustive
/// reporting call the functions in [`invariants`] directly.
pub fn validate_tree(rs: &ResourceSet, root: ObjectId) -> Result<()> {
    let containment = invariants::find_containment_violations(rs, root);
    if let Some((child, parent, feature)) = containment.first() {
        return Err(ModelError::Internal {
            message: format!("{} is not held by {}.{} that claims to contain it", child, parent, feature),
        });
    }

    let opposites = invariants::find_opposite_violations(rs, root);
    if let Some((owner, feature, target)) = opposites.first() {
        return Err(ModelError::OppositeViolation {
            feature: feature.clone(),
            opposite: target.to_string(),
            reason: format!("{} does not point back to {}", target, owner),
        });
    }

    let inverses = invariants::find_inverse_violations(rs, root);
    if let Some((source, feature, target)) = inverses.first() {
        return Err(ModelError::Internal {
            message: format!("inverse table of {} disagrees with {}.{}", target, source, feature),
        });
    }

    let cardinality = invariants::find_cardinality_violations(rs, root);
    if let Some((object, feature, count, lower, upper)) = cardinality.first() {
        let upper = if *upper < 0 { "*".to_string() } else { upper.to_string() };
        return Err(ModelError::bad_value(
            feature.clone(),
            format!("{} holds {} value(s), expected {}..{}", object, count, lower, upper),
        ));
    }

    Ok(())
}

/// Validate every root of a resource
///
/// # Errors
///
/// `ResourceNotFound` for an unknown resource, otherwise as
/// [`validate_tree`].
pub fn validate_resource(rs: &ResourceSet, resource: ResourceId) -> Result<()> {
    let roots = rs.resource(resource)?.contents().to_vec();
    for root in roots {
        validate_tree(rs, root)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, ecore, make_class, make_package, EStructuralFeature};
    use crate::ops::{object_ops, reflect_ops, resource_ops};

    #[test]
    fn test_missing_required_value_fails() {
        let pkg = make_package("val", "http://validation.test", "val");
        let folder = make_class(&pkg, "Folder");
        let file = make_class(&pkg, "File");
        add_feature(&folder, EStructuralFeature::containment("files", &file).many()).unwrap();
        add_feature(&file, EStructuralFeature::attribute("name", &ecore::e_string()).required()).unwrap();

        let mut rs = ResourceSet::new();
        let res = resource_ops::create_resource(&mut rs, "tree.json").unwrap();
        let root = object_ops::create(&mut rs, &folder).unwrap();
        resource_ops::append(&mut rs, res, root).unwrap();
        let child = object_ops::create_in(&mut rs, root, "files", &file).unwrap();

        let result = validate_resource(&rs, res);
        assert!(matches!(result, Err(ModelError::BadValue { ref feature, .. }) if feature == "name"));

        reflect_ops::set(&mut rs, child, "name", "a.txt").unwrap();
        assert!(validate_resource(&rs, res).is_ok());
    }
}
