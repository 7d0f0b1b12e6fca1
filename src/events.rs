//! Event values and the line-oriented wire format.
//!
//! ```text
//! EVENT [<instance>] <NAME> <arg1> <arg2> ... <argN>\n
//! ```
//!
//! Arguments are joined with single spaces. Backslash, newline and carriage
//! return inside an argument are escaped (`\\`, `\n`, `\r`) so one event is
//! always exactly one line. Spaces are not escaped; for `VARIABLE_SET` the
//! value is the remainder of the line after the name and type.

use crate::constants::{EVENT_KEYWORD, VARIABLE_SET_EVENT};

/// A named, ordered tuple of string arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    args: Vec<String>,
}

impl Event {
    /// Create an event. The name is upper-cased.
    pub fn new(name: &str, args: Vec<String>) -> Self {
        Self {
            name: name.to_uppercase(),
            args,
        }
    }

    /// Upper-cased event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arguments in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Serialize to one newline-terminated wire line.
    pub fn to_line(&self, instance_name: &str) -> String {
        let mut line = format!("{EVENT_KEYWORD} [{instance_name}] {}", self.name);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&escape(arg));
        }
        line.push('\n');
        line
    }

    /// Parse a wire line back into `(instance_name, event)`.
    ///
    /// Returns `None` for lines that are not events.
    pub fn parse_line(line: &str) -> Option<(String, Event)> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let rest = line.strip_prefix(EVENT_KEYWORD)?.strip_prefix(" [")?;
        let (instance, rest) = rest.split_once("] ")?;
        let (name, rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if name.is_empty() {
            return None;
        }

        let args: Vec<String> = if rest.is_empty() {
            Vec::new()
        } else if name == VARIABLE_SET_EVENT {
            rest.splitn(3, ' ').map(unescape).collect()
        } else {
            rest.split(' ').map(unescape).collect()
        };

        Some((
            instance.to_string(),
            Event {
                name: name.to_string(),
                args,
            },
        ))
    }
}

/// Escape an argument or reply for single-line transport.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse [`escape`]. Unknown escapes are kept as-is.
pub fn unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_name_is_uppercased() {
        let event = Event::new("event_type", args(&["arg", "u", "ments"]));
        assert_eq!(event.to_line("testing"), "EVENT [testing] EVENT_TYPE arg u ments\n");
    }

    #[test]
    fn test_event_without_args() {
        let event = Event::new("ping", Vec::new());
        assert_eq!(event.to_line("x"), "EVENT [x] PING\n");
    }

    #[test]
    fn test_spaces_pass_through_newlines_are_escaped() {
        let event = Event::new(
            "VARIABLE_SET",
            args(&["status_message", "str", "two\nlines and a \\"]),
        );
        assert_eq!(
            event.to_line("t"),
            "EVENT [t] VARIABLE_SET status_message str two\\nlines and a \\\\\n"
        );
    }

    #[test]
    fn test_parse_variable_set_keeps_value_whole() {
        let (instance, event) =
            Event::parse_line("EVENT [testing] VARIABLE_SET status_message str A Simple Message\n")
                .unwrap();
        assert_eq!(instance, "testing");
        assert_eq!(event.name(), "VARIABLE_SET");
        assert_eq!(event.args(), args(&["status_message", "str", "A Simple Message"]).as_slice());
    }

    #[test]
    fn test_parse_restores_escaped_newline() {
        let original = Event::new("VARIABLE_SET", args(&["m", "str", "a\nb"]));
        let (_, parsed) = Event::parse_line(&original.to_line("i")).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_rejects_non_events() {
        assert!(Event::parse_line("hello world").is_none());
        assert!(Event::parse_line("EVENT [x]").is_none());
    }

    #[test]
    fn test_unescape_keeps_unknown_sequences() {
        assert_eq!(unescape("a\\tb\\"), "a\\tb\\");
    }
}
