//! Variable Registry.
//!
//! Typed key/value store behind `set` and `@name` expansion.
//!
//! ```text
//! VariableRegistry
//!  ├── Variable { var_type, Storage, Mutability, on_change }
//!  │    ├── Storage::Owned(Value)
//!  │    └── Storage::Bound(Box<dyn Binding>) ──► host UI field
//!  └── set() ──► SetOutcome::Changed(VARIABLE_SET event) | Ignored
//! ```

pub mod builtins;
pub mod registry;
pub mod value;

pub use registry::{Binding, Mutability, OnChange, SetOutcome, Storage, Variable, VariableRegistry};
pub use value::{Value, VarType};
