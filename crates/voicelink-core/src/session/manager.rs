//! SessionLifecycleManager - owns one conversation session from initialize to
//! disconnect.
//!
//! The manager never talks to the network itself. The caller reports SDK
//! events and metrics in; the manager keeps the status, heartbeat, reconnect
//! schedule and quality score consistent and publishes every change on its
//! [`EventBus`].
//!
//! Timers run as tokio tasks holding only a weak reference to the manager, so
//! dropping the manager stops them. `disconnect`, `reset` and `destroy` abort
//! them explicitly.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::error::SessionError;
use super::event::SessionEvent;
use super::metrics::{LatencyWindow, SessionMetrics};
use super::quality::ConnectionQuality;
use super::retry::RetryPolicy;
use super::state::{SessionId, SessionState, SessionStatus};
use super::transport::{ExternalTransport, MediaStream, Transport};
use crate::config::{LifecycleConfig, ReinitializePolicy};
use crate::event_bus::EventBus;

/// Per-session diagnostics, gated by `enable_logging`.
macro_rules! diag {
    ($shared:expr, $level:ident, $($arg:tt)+) => {
        if $shared.config.enable_logging {
            log::$level!($($arg)+);
        }
    };
}

const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Default)]
struct Timers {
    heartbeat: Option<JoinHandle<()>>,
    timeout_watch: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
}

impl Timers {
    fn stop_all(&mut self) {
        abort(&mut self.heartbeat);
        abort(&mut self.timeout_watch);
        abort(&mut self.reconnect);
    }
}

fn abort(slot: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = slot.take() {
        handle.abort();
    }
}

fn is_running(slot: &Option<JoinHandle<()>>) -> bool {
    slot.as_ref().is_some_and(|handle| !handle.is_finished())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

struct Inner {
    state: SessionState,
    metrics: SessionMetrics,
    latency: LatencyWindow,
    /// Monotonic session start, for uptime and max duration.
    started_at: Option<Instant>,
    /// Start of the current timeout window: last heartbeat or last timeout.
    watch_since: Option<Instant>,
    /// Status restored by `resume_session`.
    resume_to: SessionStatus,
    timers: Timers,
    audio_stream: Option<Box<dyn MediaStream>>,
    destroyed: bool,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: SessionState::default(),
            metrics: SessionMetrics::default(),
            latency: LatencyWindow::new(),
            started_at: None,
            watch_since: None,
            resume_to: SessionStatus::Connected,
            timers: Timers::default(),
            audio_stream: None,
            destroyed: false,
        }
    }

    fn clear_session(&mut self) {
        self.state = SessionState::default();
        self.metrics = SessionMetrics::default();
        self.latency.clear();
        self.started_at = None;
        self.watch_since = None;
        self.resume_to = SessionStatus::Connected;
    }

    fn stop_audio_stream(&mut self) {
        if let Some(mut stream) = self.audio_stream.take() {
            stream.stop_tracks();
        }
    }
}

struct Shared {
    config: LifecycleConfig,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
    events: EventBus,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, inner: &mut Inner, status: SessionStatus) {
        if inner.state.status == status {
            return;
        }
        inner.state.status = status;
        self.events.emit(SessionEvent::StatusChanged { status });
    }

    fn set_quality(&self, inner: &mut Inner, quality: ConnectionQuality) {
        if inner.state.connection_quality == quality {
            return;
        }
        inner.state.connection_quality = quality;
        self.events.emit(SessionEvent::QualityChanged { quality });
    }

    /// Re-derive quality from the counters and publish the new metrics.
    fn metrics_changed(&self, inner: &mut Inner) {
        let quality = inner.metrics.quality();
        self.set_quality(inner, quality);
        self.events.emit(SessionEvent::MetricsUpdated {
            metrics: inner.metrics.clone(),
        });
    }

    fn stamp_heartbeat(inner: &mut Inner, now: Instant) {
        inner.watch_since = Some(now);
        inner.state.last_heartbeat = Some(Utc::now());
    }

    /// Caller-driven connect: a transport failure is final.
    fn connect_locked(self: &Arc<Self>, inner: &mut Inner) -> Result<(), SessionError> {
        let result = self.open_locked(inner);
        if let Err(SessionError::Transport(err)) = &result {
            diag!(self, error, "Session failed to connect: {}", err);
            self.set_status(inner, SessionStatus::Error);
        }
        result
    }

    /// `Connecting`, then open the transport. On failure the status is left
    /// at `Connecting` for the caller to resolve.
    fn open_locked(self: &Arc<Self>, inner: &mut Inner) -> Result<(), SessionError> {
        let id = inner
            .state
            .id
            .clone()
            .ok_or(SessionError::NotInitialized)?;

        self.set_status(inner, SessionStatus::Connecting);
        self.transport.open(&id)?;

        self.set_status(inner, SessionStatus::Connected);
        self.set_quality(inner, ConnectionQuality::Good);
        Self::stamp_heartbeat(inner, Instant::now());

        if !is_running(&inner.timers.heartbeat) {
            self.start_heartbeat(inner);
        }
        if !is_running(&inner.timers.timeout_watch) {
            self.start_timeout_watch(inner);
        }

        diag!(self, info, "Session {} connected (agent {})", id, self.config.agent_id);
        Ok(())
    }

    fn disconnect(&self, reason: Option<&str>) {
        let mut inner = self.lock();
        if !inner.state.status.holds_session() {
            return;
        }

        self.set_status(&mut inner, SessionStatus::Disconnecting);
        inner.timers.stop_all();

        if let Some(started) = inner.started_at {
            inner.metrics.connection_uptime_ms = millis(started.elapsed());
        }
        inner.state.end_time = Some(Utc::now());
        let id = inner.state.id.take();
        self.set_status(&mut inner, SessionStatus::Disconnected);

        diag!(
            self,
            info,
            "Session {} disconnected after {}ms: {}",
            id.map(|id| id.0).unwrap_or_default(),
            inner.metrics.connection_uptime_ms,
            reason.unwrap_or("requested")
        );
    }

    fn reconnect(self: &Arc<Self>) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state.id.is_none() {
            return Err(SessionError::NotInitialized);
        }
        if inner.state.status == SessionStatus::Reconnecting
            && is_running(&inner.timers.reconnect)
        {
            diag!(
                self,
                debug,
                "Reconnect attempt {} already pending",
                inner.state.reconnect_count
            );
            return Ok(());
        }

        let delay = self.begin_attempt(&mut inner)?;
        self.schedule_reconnect(&mut inner, delay);
        Ok(())
    }

    /// Claim the next attempt, or move to the terminal error state.
    fn begin_attempt(&self, inner: &mut Inner) -> Result<Duration, SessionError> {
        if !self.retry.allows(inner.state.reconnect_count) {
            diag!(
                self,
                error,
                "Giving up after {} reconnect attempts",
                inner.state.reconnect_count
            );
            self.set_status(inner, SessionStatus::Error);
            return Err(SessionError::MaxReconnectAttemptsExceeded {
                attempts: self.retry.max_attempts,
            });
        }

        inner.state.reconnect_count += 1;
        let attempt = inner.state.reconnect_count;
        self.set_status(inner, SessionStatus::Reconnecting);
        self.events.emit(SessionEvent::Reconnecting { attempt });

        let delay = self.retry.delay_for(attempt);
        diag!(self, info, "Reconnect attempt {} in {:?}", attempt, delay);
        Ok(delay)
    }

    fn schedule_reconnect(self: &Arc<Self>, inner: &mut Inner, delay: Duration) {
        abort(&mut inner.timers.reconnect);
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No tokio runtime; reconnect attempt will not run");
            return;
        };

        let weak = Arc::downgrade(self);
        inner.timers.reconnect = Some(runtime.spawn(async move {
            let mut delay = delay;
            loop {
                tokio::time::sleep(delay).await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                match shared.attempt_reconnect() {
                    Some(next) => delay = next,
                    None => return,
                }
            }
        }));
    }

    /// Run one scheduled attempt. Returns the delay before the next one when
    /// the attempt failed and the ceiling allows another.
    fn attempt_reconnect(self: &Arc<Self>) -> Option<Duration> {
        let mut inner = self.lock();
        // Someone else moved the session on (manual connect, disconnect).
        if inner.destroyed || inner.state.status != SessionStatus::Reconnecting {
            return None;
        }

        match self.open_locked(&mut inner) {
            Ok(()) => None,
            Err(SessionError::Transport(err)) => {
                diag!(
                    self,
                    warn,
                    "Reconnect attempt {} failed: {}",
                    inner.state.reconnect_count,
                    err
                );
                self.begin_attempt(&mut inner).ok()
            }
            Err(_) => None,
        }
    }

    fn start_heartbeat(self: &Arc<Self>, inner: &mut Inner) {
        let period = self.config.heartbeat_interval().max(MIN_TICK);
        inner.timers.heartbeat = self.spawn_ticker(period, Shared::heartbeat_tick);
    }

    fn start_timeout_watch(self: &Arc<Self>, inner: &mut Inner) {
        let period = self.config.timeout_check_interval().max(MIN_TICK);
        inner.timers.timeout_watch = self.spawn_ticker(period, Shared::timeout_tick);
    }

    /// Call `tick` every `period` until it returns false or the manager is gone.
    fn spawn_ticker(
        self: &Arc<Self>,
        period: Duration,
        tick: fn(&Arc<Shared>) -> bool,
    ) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No tokio runtime; session timers are disabled");
            return None;
        };

        let weak: Weak<Shared> = Arc::downgrade(self);
        Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                if !tick(&shared) {
                    return;
                }
            }
        }))
    }

    fn heartbeat_tick(self: &Arc<Self>) -> bool {
        let over_limit = {
            let mut inner = self.lock();
            if inner.destroyed || !inner.state.status.holds_session() {
                return false;
            }

            let now = Instant::now();
            if self.transport.is_alive() {
                Self::stamp_heartbeat(&mut inner, now);
            }

            let Some(started) = inner.started_at else {
                return true;
            };
            let uptime = now.duration_since(started);
            inner.metrics.connection_uptime_ms = millis(uptime);
            self.config.max_duration().is_some_and(|max| uptime >= max)
        };

        if over_limit {
            diag!(self, warn, "Session exceeded its maximum duration");
            self.disconnect(Some("max duration reached"));
            return false;
        }
        true
    }

    fn timeout_tick(self: &Arc<Self>) -> bool {
        let should_reconnect = {
            let mut inner = self.lock();
            if inner.destroyed {
                return false;
            }
            if !inner.state.status.is_live() {
                return true;
            }

            let now = Instant::now();
            let since = *inner.watch_since.get_or_insert(now);
            if now.duration_since(since) < self.config.timeout_duration() {
                return true;
            }

            // Restart the window so the timeout fires once per window.
            inner.watch_since = Some(now);
            diag!(
                self,
                warn,
                "No heartbeat for {:?}, session timed out",
                now.duration_since(since)
            );
            self.events.emit(SessionEvent::TimedOut);

            if self.retry.allows(inner.state.reconnect_count) {
                true
            } else {
                self.set_status(&mut inner, SessionStatus::Error);
                false
            }
        };

        if should_reconnect {
            if let Err(err) = self.reconnect() {
                diag!(self, error, "Automatic reconnect failed: {}", err);
            }
        }
        true
    }
}

/// Tracks one conversation session: status transitions, heartbeat and timeout
/// detection, bounded reconnection with exponential backoff, and a connection
/// quality score derived from reported metrics.
///
/// All operations take `&self`; state lives behind a single lock so
/// transitions never interleave. Timers need a tokio runtime; without one the
/// manager still tracks state but never times out or retries on its own.
pub struct SessionLifecycleManager {
    shared: Arc<Shared>,
}

impl SessionLifecycleManager {
    /// Create a manager for callers that drive the SDK connection themselves.
    pub fn new(config: LifecycleConfig) -> Self {
        Self::with_transport(config, Arc::new(ExternalTransport))
    }

    /// Create a manager that opens connections through `transport`.
    pub fn with_transport(config: LifecycleConfig, transport: Arc<dyn Transport>) -> Self {
        let retry = config.retry_policy();
        Self {
            shared: Arc::new(Shared {
                config,
                retry,
                transport,
                events: EventBus::new(),
                inner: Mutex::new(Inner::new()),
            }),
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.shared.config
    }

    /// Subscribe to session events. `None` after `destroy`.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<SessionEvent>> {
        self.shared.events.subscribe()
    }

    /// Start a new session and its heartbeat.
    ///
    /// With [`ReinitializePolicy::Replace`] a live session is torn down first:
    /// its timers stop and its audio stream is stopped and released. With
    /// [`ReinitializePolicy::Reject`] a live session makes this fail.
    pub fn initialize(&self, session_id: impl Into<SessionId>) -> Result<(), SessionError> {
        let session_id = session_id.into();
        if session_id.is_empty() {
            return Err(SessionError::InvalidSessionId);
        }

        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.destroyed {
            log::warn!("Ignoring initialize({}) on a destroyed session manager", session_id);
            return Ok(());
        }

        if inner.state.status.holds_session() {
            let previous = inner.state.id.clone().unwrap_or_default();
            match shared.config.reinitialize_policy {
                ReinitializePolicy::Reject => {
                    return Err(SessionError::AlreadyActive(previous));
                }
                ReinitializePolicy::Replace => {
                    diag!(shared, warn, "Replacing live session {} with {}", previous, session_id);
                    inner.timers.stop_all();
                    inner.stop_audio_stream();
                }
            }
        }

        let now = Instant::now();
        inner.clear_session();
        inner.state = SessionState::initializing(session_id.clone(), Utc::now());
        inner.started_at = Some(now);
        inner.watch_since = Some(now);
        shared.events.emit(SessionEvent::StatusChanged {
            status: SessionStatus::Initializing,
        });

        abort(&mut inner.timers.heartbeat);
        shared.start_heartbeat(&mut inner);

        diag!(shared, info, "Session {} initialized", session_id);
        Ok(())
    }

    /// Open the connection through the transport.
    ///
    /// On transport failure the status becomes `Error` and the error is
    /// returned; retrying is up to the caller (see [`Self::reconnect`]).
    pub fn connect(&self) -> Result<(), SessionError> {
        let mut inner = self.shared.lock();
        self.shared.connect_locked(&mut inner)
    }

    /// End the session. A no-op when there is no session, so repeated calls
    /// keep the first `end_time`.
    pub fn disconnect(&self, reason: Option<&str>) {
        self.shared.disconnect(reason);
    }

    /// Schedule a reconnect attempt after the backoff delay.
    ///
    /// Returns once the attempt is scheduled. Failed attempts schedule the
    /// next one automatically until `reconnect_attempts` is reached, at which
    /// point the session ends in `Error`. Outcomes are published as events.
    pub fn reconnect(&self) -> Result<(), SessionError> {
        self.shared.reconnect()
    }

    pub fn pause_session(&self) {
        let shared = &self.shared;
        let mut inner = shared.lock();
        let status = inner.state.status;
        if matches!(status, SessionStatus::Connected | SessionStatus::Active) {
            inner.resume_to = status;
            shared.set_status(&mut inner, SessionStatus::Paused);
        } else {
            diag!(shared, debug, "Ignoring pause while {}", status);
        }
    }

    pub fn resume_session(&self) {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.state.status == SessionStatus::Paused {
            let target = inner.resume_to;
            shared.set_status(&mut inner, target);
        } else {
            diag!(shared, debug, "Ignoring resume while {}", inner.state.status);
        }
    }

    /// The remote agent started speaking or listening.
    pub fn mark_active(&self) {
        let mut inner = self.shared.lock();
        if inner.state.status == SessionStatus::Connected {
            self.shared.set_status(&mut inner, SessionStatus::Active);
        }
    }

    /// The remote agent went idle.
    pub fn mark_idle(&self) {
        let mut inner = self.shared.lock();
        if inner.state.status == SessionStatus::Active {
            self.shared.set_status(&mut inner, SessionStatus::Connected);
        }
    }

    /// Record a latency sample in milliseconds.
    ///
    /// Negative and non-finite samples are dropped.
    pub fn update_latency(&self, latency_ms: f64) {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            diag!(self.shared, warn, "Dropping invalid latency sample {}", latency_ms);
            return;
        }

        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.latency.push(latency_ms);
        inner.metrics.latency = latency_ms;
        inner.metrics.average_latency = inner.latency.mean();
        self.shared.metrics_changed(&mut inner);
    }

    pub fn update_bytes_transferred(&self, bytes: u64) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.metrics.bytes_transferred = inner.metrics.bytes_transferred.saturating_add(bytes);
        self.shared.events.emit(SessionEvent::MetricsUpdated {
            metrics: inner.metrics.clone(),
        });
    }

    pub fn report_packet_loss(&self, count: u64) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.metrics.packets_lost = inner.metrics.packets_lost.saturating_add(count);
        self.shared.metrics_changed(&mut inner);
    }

    pub fn report_packets_received(&self, count: u64) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.metrics.packets_received = inner.metrics.packets_received.saturating_add(count);
        self.shared.metrics_changed(&mut inner);
    }

    /// Stamp liveness from outside the heartbeat timer, e.g. when an SDK
    /// message arrives.
    pub fn record_heartbeat(&self) {
        let mut inner = self.shared.lock();
        if inner.destroyed || !inner.state.status.holds_session() {
            return;
        }
        Shared::stamp_heartbeat(&mut inner, Instant::now());
    }

    /// Store a caller-owned value in the session metadata.
    pub fn set_metadata(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            return;
        }
        inner.state.metadata.insert(key.into(), value);
    }

    pub fn session_state(&self) -> SessionState {
        self.shared.lock().state.clone()
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.shared.lock().metrics.clone()
    }

    /// Connected, active or paused.
    pub fn is_active(&self) -> bool {
        self.shared.lock().state.status.is_live()
    }

    /// Track the captured microphone stream. A previously tracked stream is
    /// stopped. After `destroy` the stream is stopped immediately.
    pub fn set_audio_stream(&self, mut stream: Box<dyn MediaStream>) {
        let mut inner = self.shared.lock();
        if inner.destroyed {
            stream.stop_tracks();
            return;
        }
        inner.stop_audio_stream();
        inner.audio_stream = Some(stream);
    }

    pub fn has_audio_stream(&self) -> bool {
        self.shared.lock().audio_stream.is_some()
    }

    /// Borrow the tracked audio stream, if any.
    ///
    /// The stream is checked out for the duration of `f`, which runs without
    /// the session lock and may call back into the manager. While checked out
    /// `has_audio_stream` is false. If `f` installs another stream, or the
    /// manager is destroyed meanwhile, the checked-out stream is stopped
    /// instead of being put back.
    pub fn with_audio_stream<R>(&self, f: impl FnOnce(&mut dyn MediaStream) -> R) -> Option<R> {
        let mut stream = self.shared.lock().audio_stream.take()?;
        let result = f(&mut *stream);

        let mut inner = self.shared.lock();
        if inner.destroyed || inner.audio_stream.is_some() {
            stream.stop_tracks();
        } else {
            inner.audio_stream = Some(stream);
        }
        Some(result)
    }

    /// Stop everything and return to an uninitialized manager. Subscribers
    /// stay registered.
    pub fn reset(&self) {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.destroyed {
            return;
        }
        inner.timers.stop_all();
        inner.stop_audio_stream();
        shared.set_status(&mut inner, SessionStatus::Uninitialized);
        inner.clear_session();
    }

    /// Stop all timers (including a pending reconnect), stop and release the
    /// audio stream, and close the event bus. Safe to call repeatedly.
    pub fn destroy(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;
            inner.timers.stop_all();
            inner.stop_audio_stream();
            inner.clear_session();
        }
        self.shared.events.close();
        diag!(self.shared, debug, "Session manager destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed
    }
}

impl Drop for SessionLifecycleManager {
    fn drop(&mut self) {
        self.destroy();
    }
}
