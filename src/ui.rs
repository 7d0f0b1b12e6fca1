//! In-process UI state record and the numeric contracts UI commands honor.
//!
//! The real widgets live in the host application. This module holds the
//! values the control plane reads and writes on their behalf: the status bar
//! fields, the zoom level, and the two scroll adjustments. Variables bound to
//! these fields go through [`UiBinding`], so the registry never aliases the
//! record directly.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use crate::variables::{Binding, Value};

/// UI state shared between the session and the variable bindings.
pub type SharedUi = Rc<RefCell<UiState>>;

/// A scrollable range: the numeric contract of a scrollbar widget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    /// Smallest reachable value.
    pub lower: f64,
    /// End of the scrollable content.
    pub upper: f64,
    /// Visible extent.
    pub page_size: f64,
    /// Current position (top/left edge of the visible page).
    pub value: f64,
}

impl Default for Adjustment {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Adjustment {
    /// Create an adjustment positioned at `lower`.
    pub fn new(lower: f64, upper: f64, page_size: f64) -> Self {
        Self {
            lower,
            upper,
            page_size,
            value: lower,
        }
    }

    /// Largest reachable value (`upper - page_size`, never below `lower`).
    pub fn max_value(&self) -> f64 {
        (self.upper - self.page_size).max(self.lower)
    }

    /// Move to `value`, clamped into `[lower, upper - page_size]`.
    pub fn set_value(&mut self, value: f64) {
        self.value = value.clamp(self.lower, self.max_value());
    }

    /// Jump to the start of the range.
    pub fn scroll_to_begin(&mut self) {
        self.value = self.lower;
    }

    /// Jump to the end of the range.
    pub fn scroll_to_end(&mut self) {
        self.value = self.max_value();
    }

    /// Scroll relative to the current position.
    pub fn scroll_by(&mut self, amount: ScrollAmount) {
        let delta = match amount {
            ScrollAmount::Pixels(px) => px,
            ScrollAmount::PageFraction(frac) => self.page_size * frac,
        };
        self.set_value(self.value + delta);
    }
}

/// Relative scroll distance parsed from a command argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollAmount {
    /// Absolute pixel delta (`15`, `-10`).
    Pixels(f64),
    /// Fraction of the page size (`100%` is `1.0`, `-150%` is `-1.5`).
    PageFraction(f64),
}

impl FromStr for ScrollAmount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (raw, percent) = match s.strip_suffix('%') {
            Some(raw) => (raw.trim(), true),
            None => (s, false),
        };
        let amount: f64 = raw
            .parse()
            .map_err(|e| format!("invalid scroll amount '{s}': {e}"))?;
        if !amount.is_finite() {
            return Err(format!("scroll amount '{s}' is not finite"));
        }
        Ok(if percent {
            Self::PageFraction(amount / 100.0)
        } else {
            Self::Pixels(amount)
        })
    }
}

/// Host UI fields that variables can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiField {
    /// Status bar message text.
    StatusMessage,
    /// Whether the status bar is visible (0/1).
    ShowStatus,
    /// Whether key presses are forwarded to the page (0/1).
    ForwardKeys,
    /// Page zoom factor.
    ZoomLevel,
    /// Currently displayed URI.
    Uri,
}

/// Values the control plane manages on behalf of the host's widgets.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    /// Status bar message.
    pub status_message: String,
    /// Status bar visibility.
    pub show_status: bool,
    /// Key forwarding flag.
    pub forward_keys: bool,
    /// Page zoom factor.
    pub zoom_level: f64,
    /// Current URI.
    pub uri: String,
    /// Vertical scrollbar.
    pub vertical: Adjustment,
    /// Horizontal scrollbar.
    pub horizontal: Adjustment,
    /// Number of redraws requested by variable change hooks.
    pub redraws: u64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            status_message: String::new(),
            show_status: false,
            forward_keys: true,
            zoom_level: 1.0,
            uri: String::new(),
            vertical: Adjustment::default(),
            horizontal: Adjustment::default(),
            redraws: 0,
        }
    }
}

impl UiState {
    /// Wrap a fresh record for sharing with bindings.
    pub fn shared() -> SharedUi {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Read a bound field as a variable value.
    pub fn load(&self, field: UiField) -> Value {
        match field {
            UiField::StatusMessage => Value::Str(self.status_message.clone()),
            UiField::ShowStatus => Value::Int(i64::from(self.show_status)),
            UiField::ForwardKeys => Value::Int(i64::from(self.forward_keys)),
            UiField::ZoomLevel => Value::Float(self.zoom_level),
            UiField::Uri => Value::Str(self.uri.clone()),
        }
    }

    /// Write a bound field. Values of the wrong type are ignored.
    pub fn store(&mut self, field: UiField, value: &Value) {
        match (field, value) {
            (UiField::StatusMessage, Value::Str(s)) => self.status_message.clone_from(s),
            (UiField::ShowStatus, Value::Int(i)) => self.show_status = *i != 0,
            (UiField::ForwardKeys, Value::Int(i)) => self.forward_keys = *i != 0,
            (UiField::ZoomLevel, Value::Float(f)) => self.zoom_level = *f,
            (UiField::Uri, Value::Str(s)) => self.uri.clone_from(s),
            (field, value) => {
                log::warn!("[UI] Ignoring {} value for {:?}", value.var_type(), field);
            }
        }
    }

    /// Ask the host to repaint the status bar.
    pub fn request_redraw(&mut self) {
        self.redraws += 1;
    }
}

/// Binding of a variable to one field of the shared UI record.
#[derive(Debug, Clone)]
pub struct UiBinding {
    ui: SharedUi,
    field: UiField,
}

impl UiBinding {
    /// Bind to `field` of `ui`.
    pub fn new(ui: &SharedUi, field: UiField) -> Self {
        Self {
            ui: Rc::clone(ui),
            field,
        }
    }
}

impl Binding for UiBinding {
    fn load(&self) -> Value {
        self.ui.borrow().load(self.field)
    }

    fn store(&self, value: &Value) {
        self.ui.borrow_mut().store(self.field, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Adjustment {
        Adjustment::new(0.0, 100.0, 5.0)
    }

    #[test]
    fn test_scroll_end_and_begin() {
        let mut adj = page();
        adj.scroll_to_end();
        assert_eq!(adj.value, 95.0);
        adj.scroll_to_begin();
        assert_eq!(adj.value, 0.0);
    }

    #[test]
    fn test_scroll_by_pixels_and_percent() {
        let mut adj = page();
        adj.scroll_by("15".parse().unwrap());
        assert_eq!(adj.value, 15.0);
        adj.scroll_by("-10".parse().unwrap());
        assert_eq!(adj.value, 5.0);
        adj.scroll_by("100%".parse().unwrap());
        assert_eq!(adj.value, 10.0);
        adj.scroll_by("-150%".parse().unwrap());
        assert_eq!(adj.value, 2.5);
    }

    #[test]
    fn test_scroll_clamps_to_range() {
        let mut adj = page();
        adj.scroll_by(ScrollAmount::Pixels(1000.0));
        assert_eq!(adj.value, 95.0);
        adj.scroll_by(ScrollAmount::PageFraction(-100.0));
        assert_eq!(adj.value, 0.0);
    }

    #[test]
    fn test_page_larger_than_content_pins_to_lower() {
        let mut adj = Adjustment::new(10.0, 20.0, 50.0);
        adj.scroll_to_end();
        assert_eq!(adj.value, 10.0);
    }

    #[test]
    fn test_scroll_amount_rejects_garbage() {
        assert!("abc".parse::<ScrollAmount>().is_err());
        assert!("%".parse::<ScrollAmount>().is_err());
        assert!("nan".parse::<ScrollAmount>().is_err());
        assert!("NaN%".parse::<ScrollAmount>().is_err());
        assert!("-inf".parse::<ScrollAmount>().is_err());
    }

    #[test]
    fn test_binding_round_trips_through_shared_state() {
        let ui = UiState::shared();
        let zoom = UiBinding::new(&ui, UiField::ZoomLevel);
        zoom.store(&Value::Float(0.25));
        assert_eq!(ui.borrow().zoom_level, 0.25);
        assert_eq!(zoom.load(), Value::Float(0.25));
    }

    #[test]
    fn test_store_ignores_mismatched_type() {
        let mut ui = UiState::default();
        ui.store(UiField::ShowStatus, &Value::Str("yes".into()));
        assert!(!ui.show_status);
    }
}
