//! Typed variable registry with mutable/constant semantics.
//!
//! The registry owns every variable for the lifetime of the session. Builtins
//! are seeded once through [`VariableRegistry::define_builtin`]; user
//! variables appear lazily the first time `set` names them and are never
//! removed.
//!
//! A successful mutation returns the `VARIABLE_SET` event describing it. The
//! registry does not know about channels; the caller broadcasts the event.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Result};

use super::value::{Value, VarType};
use crate::constants::VARIABLE_SET_EVENT;
use crate::error::CommandError;
use crate::events::Event;

/// Indirection to host-owned state backing a variable.
///
/// Implementations read and write the host field; the registry guarantees
/// `store` is only called with a value of the variable's declared type.
pub trait Binding: fmt::Debug {
    /// Current value of the bound field.
    fn load(&self) -> Value;

    /// Overwrite the bound field.
    fn store(&self, value: &Value);
}

/// Hook run after a successful mutation, with the new value.
pub type OnChange = Box<dyn Fn(&Value)>;

/// Where a variable's value lives.
#[derive(Debug)]
pub enum Storage {
    /// The registry owns the value.
    Owned(Value),
    /// The value lives in host state behind a binding.
    Bound(Box<dyn Binding>),
}

/// Whether the scripting surface may change a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// `set` updates the value.
    Mutable,
    /// `set` is silently ignored.
    Constant,
}

/// A single registry entry.
pub struct Variable {
    var_type: VarType,
    storage: Storage,
    mutability: Mutability,
    on_change: Option<OnChange>,
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("var_type", &self.var_type)
            .field("storage", &self.storage)
            .field("mutability", &self.mutability)
            .field("has_on_change", &self.on_change.is_some())
            .finish()
    }
}

impl Variable {
    /// Declared type.
    pub fn var_type(&self) -> VarType {
        self.var_type
    }

    /// Current value, read through the binding when bound.
    pub fn value(&self) -> Value {
        match &self.storage {
            Storage::Owned(v) => v.clone(),
            Storage::Bound(binding) => binding.load(),
        }
    }

    /// `true` for constants.
    pub fn is_constant(&self) -> bool {
        self.mutability == Mutability::Constant
    }

    fn assign(&mut self, value: Value) {
        match &mut self.storage {
            Storage::Owned(slot) => *slot = value,
            Storage::Bound(binding) => binding.store(&value),
        }
    }
}

/// Result of a `set` that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SetOutcome {
    /// Value stored; carries the `VARIABLE_SET` event to broadcast.
    Changed(Event),
    /// Target is a constant; nothing happened.
    Ignored,
}

/// Name → variable map.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    vars: HashMap<String, Variable>,
}

impl VariableRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builtin variable.
    ///
    /// Only used while seeding the registry. Fails on a duplicate name or
    /// when an owned initial value does not match `var_type`.
    pub fn define_builtin(
        &mut self,
        name: &str,
        var_type: VarType,
        mutability: Mutability,
        storage: Storage,
        on_change: Option<OnChange>,
    ) -> Result<()> {
        if self.vars.contains_key(name) {
            bail!("variable '{name}' is already defined");
        }
        if let Storage::Owned(value) = &storage {
            if value.var_type() != var_type {
                bail!(
                    "variable '{name}' declared {var_type} but initialized with {}",
                    value.var_type()
                );
            }
        }
        self.vars.insert(
            name.to_string(),
            Variable {
                var_type,
                storage,
                mutability,
                on_change,
            },
        );
        Ok(())
    }

    /// Look up a variable's type and current value.
    pub fn get(&self, name: &str) -> Option<(VarType, Value)> {
        self.vars.get(name).map(|v| (v.var_type, v.value()))
    }

    /// Canonical string form of a variable, if defined.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.vars.get(name).map(|v| v.value().canonical())
    }

    /// Borrow the full entry.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    /// Assign `raw` to `name` from the scripting surface.
    ///
    /// - constant: no-op, [`SetOutcome::Ignored`]
    /// - unknown name: defines a mutable `str` variable
    /// - known name: coerces `raw` to the declared type, or fails with
    ///   [`CommandError::InvalidAssignment`] leaving the old value intact
    pub fn set(&mut self, name: &str, raw: &str) -> Result<SetOutcome, CommandError> {
        let var = match self.vars.entry(name.to_string()) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                log::debug!("[Variables] Defining '{}' as str", name);
                let value = Value::Str(raw.to_string());
                slot.insert(Variable {
                    var_type: VarType::Str,
                    storage: Storage::Owned(value.clone()),
                    mutability: Mutability::Mutable,
                    on_change: None,
                });
                return Ok(SetOutcome::Changed(variable_set_event(name, &value)));
            }
        };

        if var.is_constant() {
            log::debug!("[Variables] Ignoring set of constant '{}'", name);
            return Ok(SetOutcome::Ignored);
        }

        let value = var
            .var_type
            .coerce(raw)
            .ok_or_else(|| CommandError::InvalidAssignment {
                name: name.to_string(),
                expected: var.var_type,
                raw: raw.to_string(),
            })?;

        var.assign(value.clone());
        if let Some(hook) = &var.on_change {
            hook(&value);
        }
        Ok(SetOutcome::Changed(variable_set_event(name, &value)))
    }

    /// `true` if `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Number of defined variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// `true` if nothing is defined.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// All variable names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn variable_set_event(name: &str, value: &Value) -> Event {
    Event::new(
        VARIABLE_SET_EVENT,
        vec![
            name.to_string(),
            value.var_type().wire_name().to_string(),
            value.canonical(),
        ],
    )
}
