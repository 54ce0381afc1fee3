//! Undoable edit commands
//!
//! A command runs its edit inside a journal frame and keeps the recorded
//! changes; undo replays them backwards. Compound commands execute their
//! children in order and undo them in reverse.
//!
//! ```
//! use ecorex_core::commands::Command;
//! use ecorex_core::meta::{add_feature, ecore, make_class, make_package, EStructuralFeature};
//! use ecorex_core::ops::{object_ops, reflect_ops, ResourceSet};
//! use ecorex_core::value::Value;
//!
//! let pkg = make_package("doc", "http://doc.example", "doc");
//! let item = make_class(&pkg, "Item");
//! add_feature(&item, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
//!
//! let mut rs = ResourceSet::new();
//! let obj = object_ops::create(&mut rs, &item).unwrap();
//! let mut cmd = Command::set(obj, "name", "x");
//! cmd.execute(&mut rs).unwrap();
//! cmd.undo(&mut rs).unwrap();
//! assert_eq!(reflect_ops::get(&mut rs, obj, "name").unwrap(), Value::Null);
//! ```

use std::time::Instant;

use crate::errors::{ModelError, Result};
use crate::meta::{EClass, EStructuralFeature};
use crate::model::ObjectId;
use crate::ops::journal::{self, Change};
use crate::ops::reflect_ops::{self, FeatureKey};
use crate::ops::{collection_ops, delete_ops, ResourceSet};
use crate::value::Value;
use crate::{log_op_end, log_op_error, log_op_start};

/// Feature named by a command: a handle or a name resolved at execution
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureRef {
    Name(String),
    Feature(EStructuralFeature),
}

impl FeatureRef {
    fn label(&self) -> String {
        match self {
            FeatureRef::Name(n) => n.clone(),
            FeatureRef::Feature(f) => f.name(),
        }
    }
}

impl FeatureKey for &FeatureRef {
    fn resolve_in(&self, class: &EClass) -> Result<EStructuralFeature> {
        match self {
            FeatureRef::Name(n) => class.feature(n),
            FeatureRef::Feature(f) => f.resolve_in(class),
        }
    }
}

impl From<&str> for FeatureRef {
    fn from(name: &str) -> Self {
        FeatureRef::Name(name.to_string())
    }
}

impl From<String> for FeatureRef {
    fn from(name: String) -> Self {
        FeatureRef::Name(name)
    }
}

impl From<EStructuralFeature> for FeatureRef {
    fn from(feature: EStructuralFeature) -> Self {
        FeatureRef::Feature(feature)
    }
}

impl From<&EStructuralFeature> for FeatureRef {
    fn from(feature: &EStructuralFeature) -> Self {
        FeatureRef::Feature(feature.clone())
    }
}

/// How a `Remove` picks its element
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveTarget {
    Index(usize),
    Value(Value),
}

/// The edit a command performs
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// Write a feature (a list for many-valued features)
    Set {
        object: ObjectId,
        feature: FeatureRef,
        value: Value,
    },

    /// Clear a feature back to its default
    Unset { object: ObjectId, feature: FeatureRef },

    /// Add to a many-valued feature, at the end when `index` is `None`
    Add {
        object: ObjectId,
        feature: FeatureRef,
        value: Value,
        index: Option<usize>,
    },

    /// Remove from a many-valued feature
    Remove {
        object: ObjectId,
        feature: FeatureRef,
        target: RemoveTarget,
    },

    /// Reorder within an ordered many-valued feature
    Move {
        object: ObjectId,
        feature: FeatureRef,
        from: usize,
        to: usize,
    },

    /// Delete an object with its subtree and every edge to it
    Delete { object: ObjectId },

    /// Children executed in order, undone in reverse
    Compound(Vec<Command>),
}

/// Lifecycle of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Fresh,
    Executed,
    Undone,
}

/// An undoable edit
#[derive(Debug, Clone)]
pub struct Command {
    label: String,
    kind: CommandKind,
    state: CommandState,
    journal: Vec<Change>,
}

impl Command {
    pub fn new(label: impl Into<String>, kind: CommandKind) -> Self {
        Command {
            label: label.into(),
            kind,
            state: CommandState::Fresh,
            journal: Vec::new(),
        }
    }

    pub fn set(object: ObjectId, feature: impl Into<FeatureRef>, value: impl Into<Value>) -> Self {
        let feature = feature.into();
        Self::new(
            format!("Set {}", feature.label()),
            CommandKind::Set {
                object,
                feature,
                value: value.into(),
            },
        )
    }

    pub fn unset(object: ObjectId, feature: impl Into<FeatureRef>) -> Self {
        let feature = feature.into();
        Self::new(format!("Unset {}", feature.label()), CommandKind::Unset { object, feature })
    }

    pub fn add(object: ObjectId, feature: impl Into<FeatureRef>, value: impl Into<Value>) -> Self {
        Self::add_at(object, feature, value, None)
    }

    pub fn add_at(
        object: ObjectId,
        feature: impl Into<FeatureRef>,
        value: impl Into<Value>,
        index: Option<usize>,
    ) -> Self {
        let feature = feature.into();
        Self::new(
            format!("Add to {}", feature.label()),
            CommandKind::Add {
                object,
                feature,
                value: value.into(),
                index,
            },
        )
    }

    pub fn remove(object: ObjectId, feature: impl Into<FeatureRef>, target: RemoveTarget) -> Self {
        let feature = feature.into();
        Self::new(
            format!("Remove from {}", feature.label()),
            CommandKind::Remove {
                object,
                feature,
                target,
            },
        )
    }

    pub fn move_item(object: ObjectId, feature: impl Into<FeatureRef>, from: usize, to: usize) -> Self {
        let feature = feature.into();
        Self::new(
            format!("Move in {}", feature.label()),
            CommandKind::Move {
                object,
                feature,
                from,
                to,
            },
        )
    }

    pub fn delete(object: ObjectId) -> Self {
        Self::new("Delete", CommandKind::Delete { object })
    }

    pub fn compound(label: impl Into<String>, children: Vec<Command>) -> Self {
        Self::new(label, CommandKind::Compound(children))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &CommandKind {
        &self.kind
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    /// Objects the command edits directly
    pub fn owners(&self) -> Vec<ObjectId> {
        match &self.kind {
            CommandKind::Set { object, .. }
            | CommandKind::Unset { object, .. }
            | CommandKind::Add { object, .. }
            | CommandKind::Remove { object, .. }
            | CommandKind::Move { object, .. }
            | CommandKind::Delete { object } => vec![*object],
            CommandKind::Compound(children) => children.iter().flat_map(Command::owners).collect(),
        }
    }

    /// Whether `execute` would be attempted: the command is fresh and its
    /// object, feature and indices exist
    pub fn can_execute(&self, rs: &ResourceSet) -> bool {
        if self.state != CommandState::Fresh {
            return false;
        }
        self.preconditions_hold(rs)
    }

    fn preconditions_hold(&self, rs: &ResourceSet) -> bool {
        let feature_of = |object: ObjectId, feature: &FeatureRef| -> Option<EStructuralFeature> {
            let class = rs.class_of(object).ok()?;
            feature.resolve_in(&class).ok()
        };
        let len_of = |object: ObjectId, feature: &EStructuralFeature| -> usize {
            reflect_ops::peek(rs, object, feature)
                .ok()
                .and_then(|v| v.as_list().map(<[Value]>::len))
                .unwrap_or(0)
        };
        match &self.kind {
            CommandKind::Set { object, feature, .. } | CommandKind::Unset { object, feature } => {
                feature_of(*object, feature).is_some_and(|f| f.is_changeable() && (!f.is_derived() || f.derivation().is_some_and(|d| d.setter.is_some())))
            }
            CommandKind::Add { object, feature, index, .. } => feature_of(*object, feature).is_some_and(|f| {
                f.is_many() && f.is_changeable() && !f.is_derived() && index.map_or(true, |i| i <= len_of(*object, &f))
            }),
            CommandKind::Remove { object, feature, target } => feature_of(*object, feature).is_some_and(|f| {
                f.is_many()
                    && match target {
                        RemoveTarget::Index(i) => *i < len_of(*object, &f),
                        RemoveTarget::Value(v) => reflect_ops::peek(rs, *object, &f)
                            .ok()
                            .and_then(|list| list.as_list().map(|items| items.contains(v)))
                            .unwrap_or(false),
                    }
            }),
            CommandKind::Move { object, feature, from, to } => feature_of(*object, feature).is_some_and(|f| {
                let len = len_of(*object, &f);
                f.is_many() && f.is_ordered() && *from < len && *to < len
            }),
            CommandKind::Delete { object } => rs.contains_object(*object),
            CommandKind::Compound(children) => {
                !children.is_empty() && children.iter().all(|c| c.state == CommandState::Fresh)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.state == CommandState::Executed
    }

    pub fn can_redo(&self) -> bool {
        self.state == CommandState::Undone
    }

    /// Perform the edit
    ///
    /// # Errors
    ///
    /// `CommandInapplicable` when `can_execute` is false; otherwise whatever
    /// the edit raises, in which case nothing changed.
    pub fn execute(&mut self, rs: &mut ResourceSet) -> Result<()> {
        if !self.can_execute(rs) {
            return Err(ModelError::CommandInapplicable {
                command: self.label.clone(),
            });
        }
        log_op_start!("command_execute", command = %self.label);
        let start = Instant::now();

        self.run(rs).map_err(|e| {
            log_op_error!(
                "command_execute",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                command = %self.label
            );
            e
        })?;

        log_op_end!(
            "command_execute",
            duration_ms = start.elapsed().as_millis() as u64,
            command = %self.label
        );
        Ok(())
    }

    fn run(&mut self, rs: &mut ResourceSet) -> Result<()> {
        rs.begin_frame();
        let outcome = match &mut self.kind {
            CommandKind::Compound(children) => run_children(rs, children),
            kind => apply_kind(rs, kind),
        };
        match outcome {
            Ok(()) => {
                self.journal = rs.end_frame();
                self.state = CommandState::Executed;
                rs.settle();
                Ok(())
            }
            Err(err) => {
                rs.abort_frame();
                Err(err)
            }
        }
    }

    /// Revert the edit
    ///
    /// # Errors
    ///
    /// `CommandInapplicable` unless the command is executed.
    pub fn undo(&mut self, rs: &mut ResourceSet) -> Result<()> {
        if !self.can_undo() {
            return Err(ModelError::CommandInapplicable {
                command: self.label.clone(),
            });
        }
        log_op_start!("command_undo", command = %self.label);
        let start = Instant::now();
        self.revert(rs);
        log_op_end!(
            "command_undo",
            duration_ms = start.elapsed().as_millis() as u64,
            command = %self.label
        );
        Ok(())
    }

    fn revert(&mut self, rs: &mut ResourceSet) {
        if let CommandKind::Compound(children) = &mut self.kind {
            for child in children.iter_mut().rev() {
                if child.can_undo() {
                    child.revert(rs);
                }
            }
        }
        journal::revert(rs, std::mem::take(&mut self.journal));
        self.state = CommandState::Undone;
        rs.settle();
    }

    /// Perform the edit again after an undo
    ///
    /// # Errors
    ///
    /// `CommandInapplicable` unless the command is undone.
    pub fn redo(&mut self, rs: &mut ResourceSet) -> Result<()> {
        if !self.can_redo() {
            return Err(ModelError::CommandInapplicable {
                command: self.label.clone(),
            });
        }
        log_op_start!("command_redo", command = %self.label);
        let start = Instant::now();
        self.reset();
        let result = self.run(rs);
        if result.is_err() {
            self.state = CommandState::Undone;
        }
        result.map_err(|e| {
            log_op_error!(
                "command_redo",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                command = %self.label
            );
            e
        })?;
        log_op_end!(
            "command_redo",
            duration_ms = start.elapsed().as_millis() as u64,
            command = %self.label
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.state = CommandState::Fresh;
        if let CommandKind::Compound(children) = &mut self.kind {
            for child in children {
                child.reset();
            }
        }
    }
}

fn run_children(rs: &mut ResourceSet, children: &mut [Command]) -> Result<()> {
    for index in 0..children.len() {
        let outcome = if children[index].can_execute(rs) {
            children[index].run(rs)
        } else {
            Err(ModelError::CommandInapplicable {
                command: children[index].label.clone(),
            })
        };
        if let Err(err) = outcome {
            for done in children[..index].iter_mut().rev() {
                done.revert(rs);
                done.reset();
            }
            return Err(err);
        }
    }
    Ok(())
}

fn apply_kind(rs: &mut ResourceSet, kind: &CommandKind) -> Result<()> {
    match kind {
        CommandKind::Set { object, feature, value } => reflect_ops::set(rs, *object, feature, value.clone()),
        CommandKind::Unset { object, feature } => reflect_ops::unset(rs, *object, feature),
        CommandKind::Add {
            object,
            feature,
            value,
            index,
        } => match index {
            Some(i) => collection_ops::insert(rs, *object, feature, *i, value.clone()),
            None => collection_ops::append(rs, *object, feature, value.clone()),
        },
        CommandKind::Remove { object, feature, target } => match target {
            RemoveTarget::Index(i) => collection_ops::remove_at(rs, *object, feature, *i).map(|_| ()),
            RemoveTarget::Value(v) => collection_ops::remove(rs, *object, feature, v.clone()).map(|_| ()),
        },
        CommandKind::Move {
            object,
            feature,
            from,
            to,
        } => collection_ops::move_item(rs, *object, feature, *from, *to),
        CommandKind::Delete { object } => delete_ops::delete_subtree(rs, *object),
        CommandKind::Compound(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{add_feature, ecore, make_class, make_package};
    use crate::ops::object_ops;

    fn setup() -> (ResourceSet, ObjectId) {
        let pkg = make_package("cmd", "http://commands.test", "cmd");
        let item = make_class(&pkg, "Item");
        add_feature(&item, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
        add_feature(&item, EStructuralFeature::attribute("tags", &ecore::e_string()).many()).unwrap();
        let mut rs = ResourceSet::new();
        let obj = object_ops::create(&mut rs, &item).unwrap();
        (rs, obj)
    }

    #[test]
    fn test_state_machine() {
        let (mut rs, obj) = setup();
        let mut cmd = Command::set(obj, "name", "x");
        assert_eq!(cmd.state(), CommandState::Fresh);
        assert!(!cmd.can_undo());

        cmd.execute(&mut rs).unwrap();
        assert!(cmd.can_undo());
        assert!(!cmd.can_execute(&rs));

        cmd.undo(&mut rs).unwrap();
        assert_eq!(cmd.state(), CommandState::Undone);
        assert!(matches!(cmd.undo(&mut rs), Err(ModelError::CommandInapplicable { .. })));

        cmd.redo(&mut rs).unwrap();
        assert_eq!(reflect_ops::get(&mut rs, obj, "name").unwrap(), Value::from("x"));
    }

    #[test]
    fn test_inapplicable_remove_index() {
        let (mut rs, obj) = setup();
        let mut cmd = Command::remove(obj, "tags", RemoveTarget::Index(3));

        assert!(!cmd.can_execute(&rs));
        assert!(matches!(cmd.execute(&mut rs), Err(ModelError::CommandInapplicable { .. })));
    }

    #[test]
    fn test_compound_failure_rolls_back_earlier_children() {
        let (mut rs, obj) = setup();
        let mut cmd = Command::compound(
            "batch",
            vec![
                Command::set(obj, "name", "x"),
                Command::add(obj, "tags", "a"),
                Command::set(obj, "name", Value::Int(3)),
            ],
        );

        assert!(matches!(cmd.execute(&mut rs), Err(ModelError::BadValue { .. })));
        assert_eq!(reflect_ops::get(&mut rs, obj, "name").unwrap(), Value::Null);
        assert_eq!(reflect_ops::get(&mut rs, obj, "tags").unwrap(), Value::List(vec![]));
        assert_eq!(cmd.state(), CommandState::Fresh);
    }

    #[test]
    fn test_compound_undoes_in_reverse() {
        let (mut rs, obj) = setup();
        let mut cmd = Command::compound(
            "batch",
            vec![Command::add(obj, "tags", "a"), Command::move_item(obj, "tags", 0, 0), Command::add(obj, "tags", "b")],
        );
        cmd.execute(&mut rs).unwrap();
        assert_eq!(
            reflect_ops::get(&mut rs, obj, "tags").unwrap(),
            Value::List(vec!["a".into(), "b".into()])
        );

        cmd.undo(&mut rs).unwrap();
        assert_eq!(reflect_ops::get(&mut rs, obj, "tags").unwrap(), Value::List(vec![]));
        assert!(!reflect_ops::is_set(&mut rs, obj, "tags").unwrap());
    }
}
