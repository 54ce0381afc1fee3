//! Command stack and editing domain
//!
//! The stack owns executed commands and replays them on undo/redo. The
//! editing domain pairs a stack with the resource set it edits.
//!
//! ## Atomicity Contract
//!
//! - **All-or-nothing**: a command that fails leaves the resource set as it
//!   was and is not pushed
//! - **Linear history**: executing a new command drops the redo history
//! - **Ownership**: the domain rejects commands that edit objects outside
//!   its resources before anything is touched
//!
//! ## Example
//!
//! ```
//! use ecorex_core::command_stack::EditingDomain;
//! use ecorex_core::commands::Command;
//! use ecorex_core::meta::{add_feature, ecore, make_class, make_package, EStructuralFeature};
//! use ecorex_core::ops::{object_ops, reflect_ops, resource_ops, ResourceSet};
//! use ecorex_core::value::Value;
//!
//! let pkg = make_package("stack", "http://stack.example", "stack");
//! let item = make_class(&pkg, "Item");
//! add_feature(&item, EStructuralFeature::attribute("name", &ecore::e_string())).unwrap();
//!
//! let mut rs = ResourceSet::new();
//! let res = resource_ops::create_resource(&mut rs, "items.json").unwrap();
//! let obj = object_ops::create(&mut rs, &item).unwrap();
//! resource_ops::append(&mut rs, res, obj).unwrap();
//!
//! let mut domain = EditingDomain::new(rs);
//! domain.execute(Command::set(obj, "name", "x")).unwrap();
//! domain.undo().unwrap();
//! assert_eq!(reflect_ops::get(domain.resource_set_mut(), obj, "name").unwrap(), Value::Null);
//! ```

use crate::commands::Command;
use crate::errors::{ModelError, Result};
use crate::ops::ResourceSet;

/// Undo and redo history of executed commands
pub struct CommandStack {
    done: Vec<Command>,
    undone: Vec<Command>,
    save_point: Option<usize>,
}

impl CommandStack {
    pub fn new() -> Self {
        CommandStack {
            done: Vec::new(),
            undone: Vec::new(),
            save_point: Some(0),
        }
    }

    /// Execute `command` and push it onto the undo history
    ///
    /// # Errors
    ///
    /// `CommandInapplicable` when the command cannot execute; otherwise
    /// whatever the edit raises. The stack is unchanged on error.
    pub fn execute(&mut self, rs: &mut ResourceSet, mut command: Command) -> Result<()> {
        command.execute(rs)?;
        self.done.push(command);
        self.undone.clear();
        if self.save_point.is_some_and(|p| p >= self.done.len()) {
            self.save_point = None;
        }
        Ok(())
    }

    /// Undo the most recent command
    ///
    /// # Errors
    ///
    /// `CommandInapplicable` when there is nothing to undo.
    pub fn undo(&mut self, rs: &mut ResourceSet) -> Result<()> {
        let mut command = self.done.pop().ok_or_else(|| ModelError::CommandInapplicable {
            command: "undo".to_string(),
        })?;
        if let Err(err) = command.undo(rs) {
            self.done.push(command);
            return Err(err);
        }
        self.undone.push(command);
        Ok(())
    }

    /// Redo the most recently undone command
    ///
    /// # Errors
    ///
    /// `CommandInapplicable` when there is nothing to redo; a command whose
    /// redo fails stays on the redo history.
    pub fn redo(&mut self, rs: &mut ResourceSet) -> Result<()> {
        let mut command = self.undone.pop().ok_or_else(|| ModelError::CommandInapplicable {
            command: "redo".to_string(),
        })?;
        if let Err(err) = command.redo(rs) {
            self.undone.push(command);
            return Err(err);
        }
        self.done.push(command);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.done.last().is_some_and(Command::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.undone.last().is_some_and(Command::can_redo)
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.done.last().map(Command::label)
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.undone.last().map(Command::label)
    }

    /// Number of commands that can be undone
    pub fn depth(&self) -> usize {
        self.done.len()
    }

    /// Forget all history; the current state becomes the save point
    pub fn flush(&mut self) {
        self.done.clear();
        self.undone.clear();
        self.save_point = Some(0);
    }

    /// Record the current position as saved
    pub fn save_is_done(&mut self) {
        self.save_point = Some(self.done.len());
    }

    /// Whether the history moved away from the last save point
    pub fn is_save_needed(&self) -> bool {
        self.save_point != Some(self.done.len())
    }
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandStack")
            .field("done", &self.done.iter().map(Command::label).collect::<Vec<_>>())
            .field("undone", &self.undone.iter().map(Command::label).collect::<Vec<_>>())
            .finish()
    }
}

/// A resource set and the command stack that edits it
#[derive(Debug)]
pub struct EditingDomain {
    rs: ResourceSet,
    stack: CommandStack,
}

impl EditingDomain {
    pub fn new(rs: ResourceSet) -> Self {
        EditingDomain {
            rs,
            stack: CommandStack::new(),
        }
    }

    pub fn resource_set(&self) -> &ResourceSet {
        &self.rs
    }

    /// Direct access for reads and non-command edits (loading, saving)
    pub fn resource_set_mut(&mut self) -> &mut ResourceSet {
        &mut self.rs
    }

    pub fn stack(&self) -> &CommandStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut CommandStack {
        &mut self.stack
    }

    pub fn into_resource_set(self) -> ResourceSet {
        self.rs
    }

    /// Execute a command whose owners all live in this domain's resources
    ///
    /// # Errors
    ///
    /// `NotInDomain` for the first owner outside every resource; otherwise
    /// as [`CommandStack::execute`].
    pub fn execute(&mut self, command: Command) -> Result<()> {
        if let Some(outsider) = command
            .owners()
            .into_iter()
            .find(|owner| self.rs.resource_id_of(*owner).is_none())
        {
            return Err(ModelError::NotInDomain {
                object: outsider.to_string(),
            });
        }
        self.stack.execute(&mut self.rs, command)
    }

    /// # Errors
    ///
    /// `CommandInapplicable` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<()> {
        self.stack.undo(&mut self.rs)
    }

    /// # Errors
    ///
    /// `CommandInapplicable` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<()> {
        self.stack.redo(&mut self.rs)
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }
}
