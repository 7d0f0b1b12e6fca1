//! Builtin variables seeded at session start.

use std::rc::Rc;

use anyhow::Result;

use super::registry::{Mutability, OnChange, Storage, VariableRegistry};
use super::value::{Value, VarType};
use crate::config::HostInfo;
use crate::ui::{SharedUi, UiBinding, UiField};

/// Default zoom increment for `zoom_in` / `zoom_out`.
pub const DEFAULT_ZOOM_STEP: f64 = 0.1;

/// Seed constants and UI-bound variables into `registry`.
pub fn seed(
    registry: &mut VariableRegistry,
    host: &HostInfo,
    instance_name: &str,
    shell_cmd: &str,
    ui: &SharedUi,
) -> Result<()> {
    let constants = [
        ("WEBKIT_MAJOR", Value::Int(host.engine_major)),
        ("WEBKIT_MINOR", Value::Int(host.engine_minor)),
        ("WEBKIT_MICRO", Value::Int(host.engine_micro)),
        ("ARCH_UZBL", Value::Str(std::env::consts::ARCH.to_string())),
        ("ARCH_HOST", Value::Str(std::env::consts::ARCH.to_string())),
        ("VERSION", Value::Str(env!("CARGO_PKG_VERSION").to_string())),
        ("PID", Value::Int(i64::from(std::process::id()))),
        ("INSTANCE_NAME", Value::Str(instance_name.to_string())),
    ];
    for (name, value) in constants {
        registry.define_builtin(
            name,
            value.var_type(),
            Mutability::Constant,
            Storage::Owned(value),
            None,
        )?;
    }

    let bound = [
        ("status_message", VarType::Str, UiField::StatusMessage),
        ("show_status", VarType::Int, UiField::ShowStatus),
        ("forward_keys", VarType::Int, UiField::ForwardKeys),
        ("zoom_level", VarType::Float, UiField::ZoomLevel),
        ("uri", VarType::Str, UiField::Uri),
    ];
    for (name, var_type, field) in bound {
        registry.define_builtin(
            name,
            var_type,
            Mutability::Mutable,
            Storage::Bound(Box::new(UiBinding::new(ui, field))),
            Some(redraw_hook(ui)),
        )?;
    }

    registry.define_builtin(
        "zoom_step",
        VarType::Float,
        Mutability::Mutable,
        Storage::Owned(Value::Float(DEFAULT_ZOOM_STEP)),
        None,
    )?;
    registry.define_builtin(
        "shell_cmd",
        VarType::Str,
        Mutability::Mutable,
        Storage::Owned(Value::Str(shell_cmd.to_string())),
        None,
    )?;

    log::debug!("[Variables] Seeded {} builtin variables", registry.len());
    Ok(())
}

fn redraw_hook(ui: &SharedUi) -> OnChange {
    let ui = Rc::clone(ui);
    Box::new(move |_| ui.borrow_mut().request_redraw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::UiState;
    use crate::variables::SetOutcome;

    fn seeded() -> (VariableRegistry, SharedUi) {
        let ui = UiState::shared();
        let mut reg = VariableRegistry::new();
        seed(&mut reg, &HostInfo::default(), "testing", "sh -c", &ui).unwrap();
        (reg, ui)
    }

    #[test]
    fn test_constants_are_constant() {
        let (reg, _ui) = seeded();
        for name in ["WEBKIT_MAJOR", "ARCH_UZBL", "ARCH_HOST", "PID", "INSTANCE_NAME"] {
            assert!(reg.variable(name).unwrap().is_constant(), "{name} should be constant");
        }
        assert_eq!(reg.get_string("INSTANCE_NAME").as_deref(), Some("testing"));
    }

    #[test]
    fn test_bound_variable_writes_ui_and_requests_redraw() {
        let (mut reg, ui) = seeded();
        let outcome = reg.set("status_message", "hello").unwrap();
        assert!(matches!(outcome, SetOutcome::Changed(_)));
        assert_eq!(ui.borrow().status_message, "hello");
        assert_eq!(ui.borrow().redraws, 1);
    }

    #[test]
    fn test_bound_variable_reads_current_ui_state() {
        let (reg, ui) = seeded();
        ui.borrow_mut().uri = "about:blank".to_string();
        assert_eq!(reg.get_string("uri").as_deref(), Some("about:blank"));
    }

    #[test]
    fn test_shell_cmd_default() {
        let (reg, _ui) = seeded();
        assert_eq!(reg.get_string("shell_cmd").as_deref(), Some("sh -c"));
    }
}
