//! Expansion engine for command argument strings.
//!
//! Directives, recognized in a single left-to-right pass:
//!
//! | Form | Replaced by |
//! |---|---|
//! | `@name`, `@{name}` | current value of variable `name` (empty if undefined) |
//! | `@(command)@` | stdout of `command` run through the shell, trailing newlines trimmed |
//! | `@<script>@` | stringified result of `script` in the script engine |
//! | `@[text]@` | `text` with markup characters escaped |
//! | `\@` | a literal `@` |
//!
//! Substituted text is appended to the output and never scanned again.
//! An unterminated directive is copied through literally together with the
//! rest of the input.

/// Source of values for directives.
///
/// The session implements this; tests use a stub.
pub trait Resolver {
    /// Canonical value of a variable, `None` if undefined.
    fn variable(&self, name: &str) -> Option<String>;

    /// Raw stdout of running `command` through the shell.
    fn shell_output(&mut self, command: &str) -> String;

    /// Stringified result of evaluating `script`.
    fn script_result(&mut self, script: &str) -> String;
}

#[derive(Debug, Clone, Copy)]
enum Delimited {
    Shell,
    Script,
    Markup,
}

const DELIMITED: [(char, &str, Delimited); 3] = [
    ('(', ")@", Delimited::Shell),
    ('<', ">@", Delimited::Script),
    ('[', "]@", Delimited::Markup),
];

/// Expand all directives in `input`.
pub fn expand(input: &str, resolver: &mut dyn Resolver) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find(['@', '\\']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(after_backslash) = tail.strip_prefix('\\') {
            if let Some(after) = after_backslash.strip_prefix('@') {
                out.push('@');
                rest = after;
            } else {
                out.push('\\');
                rest = after_backslash;
            }
            continue;
        }

        let body = &tail[1..];
        let Some(first) = body.chars().next() else {
            out.push('@');
            rest = body;
            continue;
        };

        if let Some((_, close, kind)) = DELIMITED.iter().find(|(open, _, _)| *open == first) {
            let inner_start = first.len_utf8();
            let Some(end) = body[inner_start..].find(close) else {
                // Unterminated: the remainder is literal.
                out.push_str(tail);
                return out;
            };
            let inner = &body[inner_start..inner_start + end];
            match kind {
                Delimited::Shell => {
                    let stdout = resolver.shell_output(inner);
                    out.push_str(stdout.trim_end_matches(['\n', '\r']));
                }
                Delimited::Script => out.push_str(&resolver.script_result(inner)),
                Delimited::Markup => out.push_str(&escape_markup(inner)),
            }
            rest = &body[inner_start + end + close.len()..];
            continue;
        }

        if first == '{' {
            match body[1..].find('}') {
                Some(end) if is_var_name(&body[1..=end]) => {
                    let name = &body[1..=end];
                    out.push_str(&resolver.variable(name).unwrap_or_default());
                    rest = &body[end + 2..];
                }
                Some(_) => {
                    out.push_str("@{");
                    rest = &body[1..];
                }
                None => {
                    out.push_str(tail);
                    return out;
                }
            }
            continue;
        }

        let name_len = body
            .find(|c: char| !is_var_char(c))
            .unwrap_or(body.len());
        if name_len == 0 {
            out.push('@');
            rest = body;
        } else {
            out.push_str(&resolver.variable(&body[..name_len]).unwrap_or_default());
            rest = &body[name_len..];
        }
    }

    out.push_str(rest);
    out
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_var_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_var_char)
}

/// Escape `&`, `<`, `>`, `"` and `'` for inclusion in markup.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
