//! Integration tests for a full session: client messages in, deltas out.
//!
//! Each test starts a real session with its own runner thread and drains
//! the outgoing queue the way the delivery loop does.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use scriptcast::delta::FinishedStatus;
use scriptcast::runner::RunState;
use scriptcast::{
    BackMsg, Config, Delta, ForwardMsg, LuaScript, RunError, RunScope, Session, UiBuilder,
    WidgetSpec, WidgetStates, WidgetValue,
};

const DEADLINE: Duration = Duration::from_secs(5);

/// Drain the session until `runs` more runs have finished.
fn collect_runs(session: &Session, runs: usize) -> Vec<ForwardMsg> {
    let deadline = Instant::now() + DEADLINE;
    let mut messages = Vec::new();
    let mut finished = 0;
    while finished < runs {
        assert!(Instant::now() < deadline, "timed out waiting for {runs} run(s): {messages:?}");
        for msg in session.flush() {
            if matches!(msg, ForwardMsg::ScriptFinished { .. }) {
                finished += 1;
            }
            messages.push(msg);
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    messages
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + DEADLINE;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn deltas(messages: &[ForwardMsg]) -> Vec<&Delta> {
    messages.iter().filter_map(ForwardMsg::as_delta).collect()
}

fn statuses(messages: &[ForwardMsg]) -> Vec<FinishedStatus> {
    messages
        .iter()
        .filter_map(|m| match m {
            ForwardMsg::ScriptFinished { status, .. } => Some(*status),
            _ => None,
        })
        .collect()
}

fn element_props(delta: &Delta) -> &serde_json::Value {
    match delta {
        Delta::NewElement { element, .. } => &element.props,
        other => panic!("expected an element, got {other:?}"),
    }
}

#[test]
fn test_widget_interaction_reruns_with_new_value() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&seen);
    let session = Session::start(
        move |ui: &mut dyn UiBuilder| -> Result<(), RunError> {
            let value = ui.widget(WidgetSpec::checkbox("Enable", false).with_key("k"))?;
            observed.lock().unwrap().push(value.as_bool().unwrap_or(false));
            Ok(())
        },
        Arc::new(Config::default()),
    )
    .expect("start session");

    let first = collect_runs(&session, 1);
    let first_deltas = deltas(&first);
    assert_eq!(first_deltas.len(), 1);
    assert_eq!(first_deltas[0].path().as_slice(), &[0, 0]);
    assert_eq!(element_props(first_deltas[0])["value"], false);
    assert_eq!(statuses(&first), vec![FinishedStatus::Success]);

    assert!(session
        .handle_json(r#"{"type":"rerun_script","widget_states":{"k":{"bool":true}}}"#)
        .expect("valid message"));

    let second = collect_runs(&session, 1);
    let second_deltas = deltas(&second);
    assert_eq!(second_deltas.len(), 1);
    assert_eq!(second_deltas[0].path().as_slice(), &[0, 0]);
    assert_eq!(element_props(second_deltas[0])["value"], true);

    assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    assert_eq!(session.widget_snapshot().get("k"), Some(&WidgetValue::Bool(true)));
    session.shutdown().expect("shutdown");
}

#[test]
fn test_rerun_before_flush_supersedes_in_place() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let session = Session::start(
        move |ui: &mut dyn UiBuilder| -> Result<(), RunError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ui.text("first")?;
            } else {
                ui.markdown("second")?;
            }
            Ok(())
        },
        Arc::new(Config::default()),
    )
    .expect("start session");

    wait_until(|| runs.load(Ordering::SeqCst) == 1 && session.state() == RunState::Stopped);
    assert!(session.handle_backmsg(BackMsg::RerunScript {
        widget_states: None,
        fragment_id: None,
    }));
    wait_until(|| runs.load(Ordering::SeqCst) == 2 && session.state() == RunState::Stopped);

    let messages = session.flush();
    assert_eq!(statuses(&messages), vec![FinishedStatus::Success, FinishedStatus::Success]);
    let shown = deltas(&messages);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].path().as_slice(), &[0, 0]);
    let Delta::NewElement { element, .. } = shown[0] else {
        panic!("expected an element, got {:?}", shown[0]);
    };
    assert_eq!(element.kind, "markdown");
    assert_eq!(element.props["body"], "second");

    // The superseding delta keeps the first run's slot, ahead of its ScriptFinished.
    assert!(matches!(messages[0], ForwardMsg::ScriptStarted { .. }));
    assert!(matches!(messages[1], ForwardMsg::Delta(_)));
    assert!(matches!(messages[2], ForwardMsg::ScriptFinished { .. }));
    session.shutdown().expect("shutdown");
}

#[test]
fn test_stop_ends_a_running_script() {
    let session = Session::start(
        |ui: &mut dyn UiBuilder| -> Result<(), RunError> {
            ui.text("working")?;
            loop {
                ui.checkpoint()?;
                std::thread::sleep(Duration::from_millis(2));
            }
        },
        Arc::new(Config::default()),
    )
    .expect("start session");

    let mut started = Vec::new();
    wait_until(|| {
        started.extend(session.flush());
        started.iter().any(|m| matches!(m, ForwardMsg::ScriptStarted { .. }))
    });

    assert!(session.handle_backmsg(BackMsg::StopScript));
    let messages = collect_runs(&session, 1);
    assert_eq!(statuses(&messages), vec![FinishedStatus::Stopped]);
    session.shutdown().expect("shutdown");
}

#[test]
fn test_burst_of_reruns_coalesces_into_one_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(AtomicBool::new(false));
    let (counter, gate) = (Arc::clone(&runs), Arc::clone(&release));
    let session = Session::start(
        move |_ui: &mut dyn UiBuilder| -> Result<(), RunError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                while !gate.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(2));
                }
            }
            Ok(())
        },
        Arc::new(Config::default()),
    )
    .expect("start session");

    wait_until(|| runs.load(Ordering::SeqCst) == 1);
    for i in 0..10 {
        let states = WidgetStates::new().with(format!("w{i}"), WidgetValue::Int(i));
        assert!(session.handle_backmsg(BackMsg::RerunScript {
            widget_states: Some(states),
            fragment_id: None,
        }));
    }
    release.store(true, Ordering::SeqCst);

    collect_runs(&session, 2);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    session.shutdown().expect("shutdown");
}

#[test]
fn test_fragment_rerun_only_sends_fragment_deltas() {
    let session = Session::start(
        |ui: &mut dyn UiBuilder| -> Result<(), RunError> {
            ui.title("Dashboard")?;
            ui.fragment("clock", |ui| {
                ui.text("tick")?;
                Ok(())
            })
        },
        Arc::new(Config::default()),
    )
    .expect("start session");

    let first = collect_runs(&session, 1);
    assert_eq!(deltas(&first).len(), 2);

    assert!(session.handle_backmsg(BackMsg::RerunScript {
        widget_states: None,
        fragment_id: Some("clock".to_string()),
    }));
    let second = collect_runs(&session, 1);
    let paths: Vec<&[u32]> = deltas(&second).iter().map(|d| d.path().as_slice()).collect();
    assert_eq!(paths, vec![&[0, 1][..]]);
    assert!(second.iter().any(|m| matches!(
        m,
        ForwardMsg::ScriptStarted { scope, .. } if *scope == RunScope::fragment("clock")
    )));
    session.shutdown().expect("shutdown");
}

#[test]
fn test_script_error_is_shown_and_session_survives() {
    let session = Session::start(
        |ui: &mut dyn UiBuilder| -> Result<(), RunError> {
            ui.text("before")?;
            Err(RunError::failed("ValueError", "bad input"))
        },
        Arc::new(Config::default()),
    )
    .expect("start session");

    let messages = collect_runs(&session, 1);
    assert_eq!(statuses(&messages), vec![FinishedStatus::Error]);
    let shown = deltas(&messages);
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[1].path().as_slice(), &[0, 1]);
    assert_eq!(element_props(shown[1])["type"], "ValueError");

    assert!(session.handle_backmsg(BackMsg::RerunScript {
        widget_states: None,
        fragment_id: None,
    }));
    collect_runs(&session, 1);
    session.shutdown().expect("shutdown");
}

#[test]
fn test_shutdown_is_the_last_message() {
    let session = Session::start(
        |ui: &mut dyn UiBuilder| -> Result<(), RunError> {
            ui.text("hello")?;
            Ok(())
        },
        Arc::new(Config::default()),
    )
    .expect("start session");
    collect_runs(&session, 1);

    assert!(session.handle_backmsg(BackMsg::Shutdown));
    session.shutdown().expect("shutdown");
    assert!(session.is_finished());

    let tail = session.flush();
    assert_eq!(tail.last(), Some(&ForwardMsg::SessionShutdown));
    assert!(!session.handle_backmsg(BackMsg::RerunScript {
        widget_states: None,
        fragment_id: None,
    }));
}

#[test]
fn test_reads_stay_available_while_shutdown_waits() {
    let entered = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));
    let (started, gate) = (Arc::clone(&entered), Arc::clone(&release));
    let config = Config {
        shutdown_timeout_secs: 3,
        ..Config::default()
    };
    let session = Session::start(
        move |_ui: &mut dyn UiBuilder| -> Result<(), RunError> {
            started.store(true, Ordering::SeqCst);
            // No checkpoint: shutdown has to wait for this loop.
            while !gate.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(())
        },
        Arc::new(config),
    )
    .expect("start session");
    wait_until(|| entered.load(Ordering::SeqCst));

    std::thread::scope(|s| {
        let stopper = s.spawn(|| session.shutdown());
        std::thread::sleep(Duration::from_millis(100));

        let before = Instant::now();
        assert!(session.widget_snapshot().is_empty());
        assert!(!session.is_finished());
        assert!(before.elapsed() < Duration::from_millis(500));
        assert!(!stopper.is_finished(), "shutdown should still be waiting");
        assert!(!session.handle_backmsg(BackMsg::StopScript));

        release.store(true, Ordering::SeqCst);
        stopper.join().expect("shutdown thread").expect("shutdown");
    });
    assert!(session.is_finished());
    assert_eq!(session.flush().last(), Some(&ForwardMsg::SessionShutdown));
}

#[test]
fn test_lua_script_session() {
    let mut file = tempfile::Builder::new()
        .suffix(".lua")
        .tempfile()
        .expect("temp script");
    file.write_all(
        br#"
        ui.title("Lua app")
        if ui.checkbox("Show") then
            ui.text("shown")
        end
        "#,
    )
    .expect("write script");

    let session = Session::start(LuaScript::new(file.path()), Arc::new(Config::default()))
        .expect("start session");
    let first = collect_runs(&session, 1);
    assert_eq!(statuses(&first), vec![FinishedStatus::Success]);
    assert_eq!(deltas(&first).len(), 2);

    assert!(session
        .handle_json(r#"{"type":"rerun_script","widget_states":{"checkbox:Show":{"bool":true}}}"#)
        .expect("valid message"));
    let second = collect_runs(&session, 1);
    let shown = deltas(&second);
    assert_eq!(shown.len(), 3);
    assert_eq!(element_props(shown[2])["body"], "shown");
    session.shutdown().expect("shutdown");
}
