//! Headless driver for a voice session lifecycle.
//!
//! Reads line commands from stdin, applies them to a
//! [`SessionLifecycleManager`] and prints every session event as a JSON line
//! on stdout. Diagnostics go to stderr through `env_logger`.

mod command;

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use voicelink_core::transcript::{
    open_transcript, record_event, reopen_transcript, TranscriptHandle,
};
use voicelink_core::{LifecycleConfig, SessionEvent, SessionId, SessionLifecycleManager};

use crate::command::{Command, Reply};

#[derive(Parser, Debug)]
#[command(name = "voicelink-daemon")]
#[command(about = "Drive a voice session lifecycle from stdin commands")]
#[command(version)]
struct Args {
    /// JSON lifecycle config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Agent id (overrides the config file)
    #[arg(long)]
    agent_id: Option<String>,

    /// Session id used by a bare `init` (random when omitted)
    #[arg(long)]
    session_id: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory for per-session event transcripts
    #[arg(long)]
    transcript_dir: Option<PathBuf>,

    /// Turn on the manager's own diagnostic logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<LifecycleConfig, voicelink_core::config::ConfigError> {
    let mut config = match &args.config {
        Some(path) => LifecycleConfig::load(path)?,
        None => LifecycleConfig::default(),
    };
    if let Some(agent_id) = &args.agent_id {
        config.agent_id = agent_id.clone();
    }
    if args.verbose {
        config.enable_logging = true;
    }
    Ok(config)
}

fn print_json(value: &serde_json::Value) {
    println!("{}", value);
}

fn print_event(transcript: &TranscriptHandle, event: &SessionEvent) {
    record_event(transcript, event);
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => log::warn!("Failed to serialize session event: {}", e),
    }
}

/// Print everything already emitted without waiting for more.
fn drain_events(events: &mut broadcast::Receiver<SessionEvent>, transcript: &TranscriptHandle) {
    loop {
        match events.try_recv() {
            Ok(event) => print_event(transcript, &event),
            Err(TryRecvError::Lagged(missed)) => {
                log::warn!("Event printer lagged, {} events dropped", missed)
            }
            Err(_) => return,
        }
    }
}

/// Where events go: the stdout printer plus the current session's transcript.
struct Output {
    events: broadcast::Receiver<SessionEvent>,
    transcript: TranscriptHandle,
    transcript_dir: Option<PathBuf>,
}

/// Run one stdin line. Returns false when the daemon should stop.
fn run_line(
    manager: &SessionLifecycleManager,
    default_id: &SessionId,
    output: &mut Output,
    line: &str,
) -> bool {
    let command = match command::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(message) => {
            print_json(&json!({ "error": message }));
            return true;
        }
    };

    // Events of the previous session belong in its transcript.
    let starts_session = matches!(command, Command::Init(_));
    if starts_session {
        drain_events(&mut output.events, &output.transcript);
    }

    match command::execute(manager, default_id, command) {
        Ok(Reply::Done) => {}
        Ok(Reply::Snapshot(value)) => print_json(&value),
        Ok(Reply::Quit) => return false,
        Err(message) => {
            print_json(&json!({ "error": message }));
            return true;
        }
    }

    if starts_session {
        if let Some(id) = manager.session_state().id {
            reopen_transcript(
                &output.transcript,
                output.transcript_dir.as_deref(),
                id.as_str(),
            );
        }
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let config = load_config(&args)?;
    let session_id = args
        .session_id
        .clone()
        .map(SessionId::from)
        .unwrap_or_default();

    log::info!(
        "Starting voicelink-daemon (agent: {:?}, session: {})",
        config.agent_id,
        session_id
    );

    let manager = SessionLifecycleManager::new(config);
    let mut output = Output {
        events: manager.subscribe().ok_or("event bus closed")?,
        transcript: open_transcript(args.transcript_dir.as_deref(), session_id.as_str()),
        transcript_dir: args.transcript_dir.clone(),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            biased;
            event = output.events.recv() => match event {
                Ok(event) => print_event(&output.transcript, &event),
                Err(RecvError::Lagged(missed)) => {
                    log::warn!("Event printer lagged, {} events dropped", missed)
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_line(&manager, &session_id, &mut output, &line) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    manager.destroy();
    drain_events(&mut output.events, &output.transcript);
    log::info!("voicelink-daemon stopped");
    Ok(())
}
