//! Builtin command handlers.

use crate::error::CommandError;
use crate::events::Event;
use crate::session::Session;
use crate::shell::shell_argv;
use crate::ui::{Adjustment, ScrollAmount};
use crate::variables::builtins::DEFAULT_ZOOM_STEP;

use super::Handler;

/// Smallest zoom level `zoom_out` will reach.
const MIN_ZOOM: f64 = 0.1;

pub(super) const BUILTINS: &[(&str, Handler)] = &[
    ("set", set),
    ("event", event),
    ("request", event),
    ("print", print),
    ("js", js),
    ("sh", sh),
    ("sync_sh", sync_sh),
    ("spawn", spawn),
    ("sync_spawn", sync_spawn),
    ("scroll_vert", scroll_vert),
    ("scroll_horz", scroll_horz),
    ("scroll_begin", scroll_begin),
    ("scroll_end", scroll_end),
    ("toggle_status", toggle_status),
    ("zoom_in", zoom_in),
    ("zoom_out", zoom_out),
];

type HandlerResult = Result<Option<String>, CommandError>;

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `set <name> = <value>`
fn set(session: &mut Session, args: &str) -> HandlerResult {
    let (name, value) = args
        .split_once('=')
        .ok_or_else(|| CommandError::malformed("set", "expected <name> = <value>"))?;
    let name = name.trim();
    if !is_var_name(name) {
        return Err(CommandError::malformed(
            "set",
            format!("invalid variable name '{name}'"),
        ));
    }
    session.set_variable(name, value.trim_start())?;
    Ok(None)
}

/// `event <name> <args...>`, also bound as `request`.
fn event(session: &mut Session, args: &str) -> HandlerResult {
    let mut words = args.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    session.emit(&Event::new(name, words.map(str::to_string).collect()));
    Ok(None)
}

fn print(_session: &mut Session, args: &str) -> HandlerResult {
    Ok(Some(args.to_string()))
}

fn js(session: &mut Session, args: &str) -> HandlerResult {
    let engine = session
        .script_engine()
        .ok_or_else(|| CommandError::ScriptFailure("no script engine".to_string()))?;
    engine
        .evaluate(args, session)
        .map(Some)
        .map_err(|e| CommandError::ScriptFailure(format!("{e:#}")))
}

/// Split `<cmd> [args]` with shell quoting.
fn split_words(command: &'static str, args: &str) -> Result<Vec<String>, CommandError> {
    let words = shell_words::split(args).map_err(|e| CommandError::malformed(command, e.to_string()))?;
    if words.is_empty() {
        return Err(CommandError::malformed(command, "missing command"));
    }
    Ok(words)
}

/// Wrap `<cmd> [args]` in the `shell_cmd` prefix.
fn shell_words_argv(
    session: &Session,
    command: &'static str,
    args: &str,
) -> Result<Vec<String>, CommandError> {
    let words = split_words(command, args)?;
    let (script, extra) = words
        .split_first()
        .ok_or_else(|| CommandError::malformed(command, "missing command"))?;
    shell_argv(&session.shell_cmd(), script, extra)
        .map_err(|e| CommandError::SubprocessFailure(format!("{e:#}")))
}

/// Run to completion and record stdout as the sync output.
fn run_captured(session: &mut Session, argv: &[String]) -> HandlerResult {
    match session.shell().run(argv) {
        Ok(output) => {
            if !output.success() {
                log::warn!("[Shell] {:?} exited with {:?}", argv, output.status);
            }
            session.set_sync_stdout(Some(output.stdout.clone()));
            Ok(Some(output.stdout))
        }
        Err(e) => {
            session.set_sync_stdout(None);
            Err(CommandError::SubprocessFailure(format!("{e:#}")))
        }
    }
}

fn sh(session: &mut Session, args: &str) -> HandlerResult {
    let argv = shell_words_argv(session, "sh", args)?;
    session
        .shell()
        .spawn(&argv)
        .map_err(|e| CommandError::SubprocessFailure(format!("{e:#}")))?;
    Ok(None)
}

fn sync_sh(session: &mut Session, args: &str) -> HandlerResult {
    let argv = shell_words_argv(session, "sync_sh", args)?;
    run_captured(session, &argv)
}

fn spawn(session: &mut Session, args: &str) -> HandlerResult {
    let argv = split_words("spawn", args)?;
    session
        .shell()
        .spawn(&argv)
        .map_err(|e| CommandError::SubprocessFailure(format!("{e:#}")))?;
    Ok(None)
}

fn sync_spawn(session: &mut Session, args: &str) -> HandlerResult {
    let argv = split_words("sync_spawn", args)?;
    run_captured(session, &argv)
}

/// `begin`, `end`, or a pixel / percentage delta.
fn scroll(
    command: &'static str,
    adjustment: &mut Adjustment,
    args: &str,
) -> Result<(), CommandError> {
    match args.trim() {
        "begin" => adjustment.scroll_to_begin(),
        "end" => adjustment.scroll_to_end(),
        amount => {
            let amount: ScrollAmount = amount
                .parse()
                .map_err(|e: String| CommandError::malformed(command, e))?;
            adjustment.scroll_by(amount);
        }
    }
    Ok(())
}

fn scroll_vert(session: &mut Session, args: &str) -> HandlerResult {
    scroll("scroll_vert", &mut session.ui().borrow_mut().vertical, args)?;
    Ok(None)
}

fn scroll_horz(session: &mut Session, args: &str) -> HandlerResult {
    scroll("scroll_horz", &mut session.ui().borrow_mut().horizontal, args)?;
    Ok(None)
}

fn scroll_begin(session: &mut Session, _args: &str) -> HandlerResult {
    session.ui().borrow_mut().vertical.scroll_to_begin();
    Ok(None)
}

fn scroll_end(session: &mut Session, _args: &str) -> HandlerResult {
    session.ui().borrow_mut().vertical.scroll_to_end();
    Ok(None)
}

fn toggle_status(session: &mut Session, _args: &str) -> HandlerResult {
    let shown = session
        .registry()
        .get("show_status")
        .and_then(|(_, value)| value.as_int())
        .is_some_and(|v| v != 0);
    session.set_variable("show_status", if shown { "0" } else { "1" })?;
    Ok(None)
}

fn float_var(session: &Session, name: &str) -> Option<f64> {
    session
        .registry()
        .get(name)
        .and_then(|(_, value)| value.as_float())
}

fn zoom_by(session: &mut Session, direction: f64) -> HandlerResult {
    let step = float_var(session, "zoom_step").unwrap_or(DEFAULT_ZOOM_STEP);
    let level = float_var(session, "zoom_level").unwrap_or(1.0);
    let next = (level + direction * step).max(MIN_ZOOM);
    session.set_variable("zoom_level", &next.to_string())?;
    Ok(None)
}

fn zoom_in(session: &mut Session, _args: &str) -> HandlerResult {
    zoom_by(session, 1.0)
}

fn zoom_out(session: &mut Session, _args: &str) -> HandlerResult {
    zoom_by(session, -1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_names() {
        assert!(is_var_name("a_custom_variable"));
        assert!(is_var_name("WEBKIT_MAJOR"));
        assert!(!is_var_name(""));
        assert!(!is_var_name("two words"));
        assert!(!is_var_name("dash-ed"));
    }

    #[test]
    fn test_scroll_keywords_and_errors() {
        let mut adj = Adjustment::new(0.0, 100.0, 5.0);
        scroll("scroll_vert", &mut adj, " end ").unwrap();
        assert_eq!(adj.value, 95.0);
        scroll("scroll_vert", &mut adj, "begin").unwrap();
        assert_eq!(adj.value, 0.0);
        assert!(matches!(
            scroll("scroll_vert", &mut adj, "sideways"),
            Err(CommandError::MalformedArguments { command: "scroll_vert", .. })
        ));
    }

    #[test]
    fn test_split_words_honors_quotes() {
        assert_eq!(
            split_words("sync_sh", "'echo Test echo.' extra").unwrap(),
            vec!["echo Test echo.", "extra"]
        );
        assert!(split_words("sync_sh", "   ").is_err());
        assert!(split_words("sync_sh", "'open").is_err());
    }
}
