//! Command scenarios observed over a socket pair.
//!
//! Each test attaches one end of a `UnixStream::pair()` to the session as
//! an active channel and reads broadcast lines from the other end.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::Duration;

use hostctl::channels::{ChannelId, LineSink, StreamChannel};
use hostctl::config::HostInfo;
use hostctl::lua::LuaEngine;
use hostctl::ui::Adjustment;
use hostctl::variables::{Value, VarType};
use hostctl::{CommandError, Session};

const INSTANCE: &str = "testing";

struct EventFixture {
    session: Session,
    reader: BufReader<UnixStream>,
}

impl EventFixture {
    fn new() -> Self {
        let (ours, theirs) = UnixStream::pair().unwrap();
        theirs.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let mut session = Session::new(INSTANCE, &HostInfo::default(), "sh -c")
            .unwrap()
            .with_script_engine(Rc::new(LuaEngine::new(false).unwrap()));
        let sink: Rc<dyn LineSink> = Rc::new(StreamChannel::new(ours));
        session.channels_mut().register_active(ChannelId::next(), sink);

        Self {
            session,
            reader: BufReader::new(theirs),
        }
    }

    fn run(&mut self, line: &str) {
        self.session.dispatch(line, None).unwrap();
    }

    fn read_event(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line
    }

    fn assert_event(&mut self, body: &str) {
        assert_eq!(self.read_event(), format!("EVENT [{INSTANCE}] {body}\n"));
    }

    fn assert_no_event(&mut self) {
        assert!(self.reader.buffer().is_empty(), "buffered event left over");
        let stream = self.reader.get_mut();
        stream.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 256];
        match stream.read(&mut buf) {
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Ok(n) => panic!("unexpected event: {:?}", String::from_utf8_lossy(&buf[..n])),
            Err(e) => panic!("read failed: {e}"),
        }
        stream.set_nonblocking(false).unwrap();
    }
}

impl Drop for EventFixture {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.assert_no_event();
        }
    }
}

#[test]
fn test_event() {
    let mut ef = EventFixture::new();

    ef.run("event");
    ef.assert_no_event();

    ef.run("event event_type arg u ments");
    ef.assert_event("EVENT_TYPE arg u ments");

    ef.run("event event_type @(echo expansion)@ test");
    ef.assert_event("EVENT_TYPE expansion test");

    ef.run("request event_type arg u ments");
    ef.assert_event("EVENT_TYPE arg u ments");
}

#[test]
fn test_set_variable() {
    let mut ef = EventFixture::new();

    ef.run("set status_message = A Simple Testing Message");
    ef.assert_event("VARIABLE_SET status_message str A Simple Testing Message");
    assert_eq!(ef.session.ui().borrow().status_message, "A Simple Testing Message");

    ef.run("set forward_keys = 0");
    ef.assert_event("VARIABLE_SET forward_keys int 0");
    assert!(!ef.session.ui().borrow().forward_keys);

    ef.run("set zoom_level = 0.25");
    ef.assert_event("VARIABLE_SET zoom_level float 0.250000");
    assert_eq!(ef.session.ui().borrow().zoom_level, 0.25);

    let old_major = ef.session.registry().get("WEBKIT_MAJOR");
    ef.run("set WEBKIT_MAJOR = 100");
    ef.assert_no_event();
    assert_eq!(ef.session.registry().get("WEBKIT_MAJOR"), old_major);

    let old_arch = ef.session.registry().get_string("ARCH_UZBL");
    ef.run("set ARCH_UZBL = A Lisp Machine");
    ef.assert_no_event();
    assert_eq!(ef.session.registry().get_string("ARCH_UZBL"), old_arch);
    assert!(ef.session.registry().variable("ARCH_UZBL").unwrap().is_constant());

    ef.run("set nonexistant_variable = Some Value");
    ef.assert_event("VARIABLE_SET nonexistant_variable str Some Value");
    assert_eq!(
        ef.session.registry().get("nonexistant_variable"),
        Some((VarType::Str, Value::Str("Some Value".into())))
    );

    ef.run("set an_expanded_variable = Test @(echo expansion)@");
    ef.assert_event("VARIABLE_SET an_expanded_variable str Test expansion");
    assert_eq!(
        ef.session.registry().get_string("an_expanded_variable").as_deref(),
        Some("Test expansion")
    );
}

#[test]
fn test_new_numeric_looking_variable_stays_a_string() {
    let mut ef = EventFixture::new();
    ef.run("set answer = 42");
    ef.assert_event("VARIABLE_SET answer str 42");
    ef.run("set answer = not a number");
    ef.assert_event("VARIABLE_SET answer str not a number");
}

#[test]
fn test_invalid_assignment_keeps_old_value() {
    let mut ef = EventFixture::new();
    let err = ef.session.dispatch("set zoom_level = huge", None).unwrap_err();
    assert!(matches!(err, CommandError::InvalidAssignment { expected: VarType::Float, .. }));
    ef.assert_no_event();
    assert_eq!(ef.session.ui().borrow().zoom_level, 1.0);
}

#[test]
fn test_set_then_get_returns_declared_type() {
    let mut ef = EventFixture::new();
    ef.run("set show_status = 1");
    ef.assert_event("VARIABLE_SET show_status int 1");
    assert_eq!(
        ef.session.registry().get("show_status"),
        Some((VarType::Int, Value::Int(1)))
    );
    ef.run("set zoom_level = 2");
    ef.assert_event("VARIABLE_SET zoom_level float 2.000000");
    assert_eq!(
        ef.session.registry().get("zoom_level"),
        Some((VarType::Float, Value::Float(2.0)))
    );
}

#[test]
fn test_print() {
    let mut ef = EventFixture::new();
    let mut result = String::new();

    ef.session.dispatch("print A simple test", Some(&mut result)).unwrap();
    assert_eq!(result, "A simple test");

    ef.session
        .dispatch("print A simple @(echo expansion)@ test", Some(&mut result))
        .unwrap();
    assert_eq!(result, "A simple expansion test");
}

#[test]
fn test_scroll() {
    let mut ef = EventFixture::new();
    ef.session.ui().borrow_mut().vertical = Adjustment::new(0.0, 100.0, 5.0);
    let value = |ef: &EventFixture| ef.session.ui().borrow().vertical.value;

    ef.run("scroll_end");
    assert_eq!(value(&ef), 95.0);

    ef.run("scroll_begin");
    assert_eq!(value(&ef), 0.0);

    ef.run("scroll_vert 15");
    assert_eq!(value(&ef), 15.0);

    ef.run("scroll_vert -10");
    assert_eq!(value(&ef), 5.0);

    ef.run("scroll_vert 100%");
    assert_eq!(value(&ef), 10.0);

    ef.run("scroll_vert -150%");
    assert_eq!(value(&ef), 2.5);

    for amount in ["nan", "NaN%", "inf"] {
        assert!(matches!(
            ef.session.dispatch(&format!("scroll_vert {amount}"), None),
            Err(CommandError::MalformedArguments { .. })
        ));
        assert_eq!(value(&ef), 2.5);
    }
    ef.run("scroll_vert 10");
    assert_eq!(value(&ef), 12.5);

    ef.session.ui().borrow_mut().horizontal = Adjustment::new(0.0, 50.0, 10.0);
    ef.run("scroll_horz end");
    assert_eq!(ef.session.ui().borrow().horizontal.value, 40.0);
    ef.run("scroll_horz -50%");
    assert_eq!(ef.session.ui().borrow().horizontal.value, 35.0);
}

#[test]
fn test_toggle_status() {
    let mut ef = EventFixture::new();
    assert!(!ef.session.ui().borrow().show_status);

    ef.run("toggle_status");
    ef.assert_event("VARIABLE_SET show_status int 1");
    assert!(ef.session.ui().borrow().show_status);

    ef.run("toggle_status");
    ef.assert_event("VARIABLE_SET show_status int 0");
    assert!(!ef.session.ui().borrow().show_status);
}

#[test]
fn test_sync_sh() {
    let mut ef = EventFixture::new();
    ef.run("sync_sh 'echo Test echo.'");
    assert_eq!(ef.session.sync_stdout(), Some("Test echo.\n"));
}

#[test]
fn test_js() {
    let mut ef = EventFixture::new();
    let mut result = String::new();

    ef.session
        .dispatch("js ('x' .. 345):upper()", Some(&mut result))
        .unwrap();
    assert_eq!(result, "X345");

    ef.session.ui().borrow_mut().status_message = "Test message".to_string();
    ef.session
        .dispatch("js Host.run('print @status_message'):upper()", Some(&mut result))
        .unwrap();
    assert_eq!(result, "TEST MESSAGE");
}

#[test]
fn test_js_can_emit_events_re_entrantly() {
    let mut ef = EventFixture::new();
    ef.run("js Host.run('set status_message = from script')");
    ef.assert_event("VARIABLE_SET status_message str from script");
    ef.run("js Host.run('event FROM_LUA ' .. (6 * 7))");
    ef.assert_event("FROM_LUA 42");
}

#[test]
fn test_unknown_command_is_silent() {
    let mut ef = EventFixture::new();
    assert_eq!(
        ef.session.dispatch("no_such_command arg", None),
        Err(CommandError::UnknownCommand("no_such_command".into()))
    );
    ef.assert_no_event();
}
