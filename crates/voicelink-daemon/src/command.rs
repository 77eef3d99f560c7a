//! Line commands standing in for UI actions and SDK callbacks.

use serde_json::json;
use voicelink_core::{SessionId, SessionLifecycleManager};

/// One parsed stdin line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Init(Option<String>),
    Connect,
    Disconnect(Option<String>),
    Reconnect,
    Pause,
    Resume,
    Active,
    Idle,
    Latency(f64),
    Bytes(u64),
    Loss(u64),
    Received(u64),
    Heartbeat,
    State,
    Metrics,
    Quit,
}

/// What the daemon should do after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    /// Print this snapshot as a JSON line.
    Snapshot(serde_json::Value),
    Quit,
}

fn number<T: std::str::FromStr>(name: &str, arg: Option<&str>) -> Result<T, String> {
    let raw = arg.ok_or_else(|| format!("{name} requires a value"))?;
    raw.parse()
        .map_err(|_| format!("Invalid value for {name}: {raw}"))
}

/// Parse a command line. Blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (line, None),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "init" => Command::Init(rest.map(str::to_string)),
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect(rest.map(str::to_string)),
        "reconnect" => Command::Reconnect,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "active" => Command::Active,
        "idle" => Command::Idle,
        "latency" => Command::Latency(number("latency", rest)?),
        "bytes" => Command::Bytes(number("bytes", rest)?),
        "loss" => Command::Loss(number("loss", rest)?),
        "received" => Command::Received(number("received", rest)?),
        "heartbeat" => Command::Heartbeat,
        "state" => Command::State,
        "metrics" => Command::Metrics,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command: {other}")),
    };
    Ok(Some(command))
}

/// Apply a command to the manager.
///
/// `default_id` is used by a bare `init`.
pub fn execute(
    manager: &SessionLifecycleManager,
    default_id: &SessionId,
    command: Command,
) -> Result<Reply, String> {
    match command {
        Command::Init(id) => {
            let id = id.map(SessionId::from).unwrap_or_else(|| default_id.clone());
            manager.initialize(id).map_err(|e| e.to_string())?;
        }
        Command::Connect => manager.connect().map_err(|e| e.to_string())?,
        Command::Disconnect(reason) => manager.disconnect(reason.as_deref()),
        Command::Reconnect => manager.reconnect().map_err(|e| e.to_string())?,
        Command::Pause => manager.pause_session(),
        Command::Resume => manager.resume_session(),
        Command::Active => manager.mark_active(),
        Command::Idle => manager.mark_idle(),
        Command::Latency(ms) => manager.update_latency(ms),
        Command::Bytes(bytes) => manager.update_bytes_transferred(bytes),
        Command::Loss(count) => manager.report_packet_loss(count),
        Command::Received(count) => manager.report_packets_received(count),
        Command::Heartbeat => manager.record_heartbeat(),
        Command::State => {
            let state = manager.session_state();
            let duration_ms = state.duration().map(|d| d.num_milliseconds());
            return Ok(Reply::Snapshot(json!({
                "state": state,
                "durationMs": duration_ms,
                "active": manager.is_active(),
            })));
        }
        Command::Metrics => {
            let metrics = manager.metrics();
            return Ok(Reply::Snapshot(json!({
                "metrics": metrics,
                "lossRate": metrics.loss_rate(),
            })));
        }
        Command::Quit => return Ok(Reply::Quit),
    }
    Ok(Reply::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voicelink_core::{LifecycleConfig, SessionStatus};

    mod parse {
        use super::*;

        #[test]
        fn blank_and_comment_lines_are_skipped() {
            assert_eq!(parse("").unwrap(), None);
            assert_eq!(parse("   ").unwrap(), None);
            assert_eq!(parse("# warm up").unwrap(), None);
        }

        #[test]
        fn bare_commands() {
            assert_eq!(parse("connect").unwrap(), Some(Command::Connect));
            assert_eq!(parse("  PAUSE ").unwrap(), Some(Command::Pause));
            assert_eq!(parse("exit").unwrap(), Some(Command::Quit));
        }

        #[test]
        fn optional_arguments() {
            assert_eq!(parse("init").unwrap(), Some(Command::Init(None)));
            assert_eq!(
                parse("init conv-9").unwrap(),
                Some(Command::Init(Some("conv-9".to_string())))
            );
            assert_eq!(
                parse("disconnect user hung up").unwrap(),
                Some(Command::Disconnect(Some("user hung up".to_string())))
            );
        }

        #[test]
        fn numeric_arguments() {
            assert_eq!(parse("latency 42.5").unwrap(), Some(Command::Latency(42.5)));
            assert_eq!(parse("bytes 1024").unwrap(), Some(Command::Bytes(1024)));
            assert_eq!(parse("loss 3").unwrap(), Some(Command::Loss(3)));
            assert_eq!(parse("received 100").unwrap(), Some(Command::Received(100)));
        }

        #[test]
        fn missing_number_is_error() {
            let err = parse("latency").unwrap_err();
            assert!(err.contains("requires a value"));
        }

        #[test]
        fn bad_number_is_error() {
            let err = parse("bytes lots").unwrap_err();
            assert!(err.contains("lots"));
        }

        #[test]
        fn unknown_command_is_error() {
            let err = parse("dance").unwrap_err();
            assert!(err.contains("dance"));
        }
    }

    mod execute {
        use super::*;

        fn manager() -> SessionLifecycleManager {
            SessionLifecycleManager::new(LifecycleConfig::default())
        }

        fn run(manager: &SessionLifecycleManager, line: &str) -> Result<Reply, String> {
            let command = parse(line)?.expect("command");
            execute(manager, &SessionId::from("default"), command)
        }

        #[tokio::test]
        async fn bare_init_uses_default_id() {
            let manager = manager();
            run(&manager, "init").unwrap();
            assert_eq!(
                manager.session_state().id,
                Some(SessionId::from("default"))
            );
        }

        #[tokio::test]
        async fn drives_a_session() {
            let manager = manager();
            run(&manager, "init s1").unwrap();
            run(&manager, "connect").unwrap();
            run(&manager, "active").unwrap();
            assert_eq!(manager.session_state().status, SessionStatus::Active);

            run(&manager, "latency 50").unwrap();
            run(&manager, "received 100").unwrap();
            run(&manager, "loss 10").unwrap();

            match run(&manager, "metrics").unwrap() {
                Reply::Snapshot(value) => {
                    assert_eq!(value["metrics"]["averageLatency"], 50.0);
                    assert_eq!(value["lossRate"], 0.1);
                }
                other => panic!("Expected snapshot, got {:?}", other),
            }

            run(&manager, "disconnect done").unwrap();
            match run(&manager, "state").unwrap() {
                Reply::Snapshot(value) => {
                    assert_eq!(value["state"]["status"], "disconnected");
                    assert_eq!(value["active"], false);
                }
                other => panic!("Expected snapshot, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn errors_are_reported_as_strings() {
            let manager = manager();
            let err = run(&manager, "connect").unwrap_err();
            assert!(err.contains("not initialized"));
        }

        #[tokio::test]
        async fn quit_stops_the_loop() {
            let manager = manager();
            assert_eq!(run(&manager, "quit").unwrap(), Reply::Quit);
        }
    }
}
