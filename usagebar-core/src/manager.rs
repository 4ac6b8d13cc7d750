//! Status manager: the refresh loop
//!
//! One task owns all mutable usage state. Each tick spawns the remote
//! fetches as independent tasks; they report back over a channel and the
//! manager applies the results in arrival order. Observers read the state
//! through a `watch` channel.
//!
//! Failures are logged and counted, never retried. The last good snapshot
//! stays published until a later fetch replaces it.
//!
//! Ticks are not mutually exclusive: if a fetch outlives the interval, the
//! next tick starts another one alongside it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::api::UsageSource;
use crate::error::{Error, Result};
use crate::events::{AppEvent, EventBus};
use crate::icon::{IconPainter, IconParams, IconSink};
use crate::notify::{AlertToggles, LogNotifier, Notifier, UsageAlerts, DEFAULT_THRESHOLDS};
use crate::store::{
    Preferences, DEFAULT_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL, MIN_REFRESH_INTERVAL,
};
use crate::types::{ApiUsageSnapshot, ServiceStatus, UsageSnapshot};

/// Whether any fetch is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPhase {
    #[default]
    Idle,
    Fetching,
}

/// Counters for the lifetime of one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshStats {
    pub ticks: u64,
    pub usage_ok: u64,
    pub usage_err: u64,
    pub status_ok: u64,
    pub status_err: u64,
    pub api_ok: u64,
    pub api_err: u64,
}

/// State published to observers
#[derive(Debug, Clone, Default)]
pub struct UsageState {
    pub usage: Option<UsageSnapshot>,
    pub api_usage: Option<ApiUsageSnapshot>,
    pub service_status: Option<ServiceStatus>,
    pub phase: RefreshPhase,
    /// Fetches spawned and not yet reported back
    pub in_flight: usize,
    pub stats: RefreshStats,
    /// When the most recent tick started
    pub last_tick: Option<DateTime<Utc>>,
}

/// Remote call kinds, for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Usage,
    ServiceStatus,
    ApiUsage,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Usage => "usage",
            FetchKind::ServiceStatus => "service_status",
            FetchKind::ApiUsage => "api_usage",
        }
    }
}

/// Result of one spawned fetch, sent back to the manager task
#[derive(Debug)]
pub enum FetchOutcome {
    Usage(Result<UsageSnapshot>),
    ServiceStatus(Result<ServiceStatus>),
    ApiUsage(Result<ApiUsageSnapshot>),
}

impl FetchOutcome {
    pub fn kind(&self) -> FetchKind {
        match self {
            FetchOutcome::Usage(_) => FetchKind::Usage,
            FetchOutcome::ServiceStatus(_) => FetchKind::ServiceStatus,
            FetchOutcome::ApiUsage(_) => FetchKind::ApiUsage,
        }
    }
}

#[derive(Debug)]
enum Command {
    RefreshNow,
    Shutdown,
}

/// Builder for the manager task.
pub struct StatusManager {
    prefs: Preferences,
    source: Arc<dyn UsageSource>,
    events: EventBus,
    notifier: Arc<dyn Notifier>,
    icon_sink: Option<Arc<dyn IconSink>>,
    thresholds: Vec<u8>,
}

impl StatusManager {
    /// `events` must be the bus `prefs` publishes on.
    pub fn new(prefs: Preferences, source: Arc<dyn UsageSource>, events: EventBus) -> Self {
        Self {
            prefs,
            source,
            events,
            notifier: Arc::new(LogNotifier),
            icon_sink: None,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Paint the icon into `sink` whenever it may have changed
    pub fn with_icon_sink(mut self, sink: Arc<dyn IconSink>) -> Self {
        self.icon_sink = Some(sink);
        self
    }

    pub fn with_thresholds(mut self, thresholds: &[u8]) -> Self {
        self.thresholds = thresholds.to_vec();
        self
    }

    /// Spawn the manager task on the current runtime.
    pub fn start(self) -> ManagerHandle {
        let (state_tx, state_rx) = watch::channel(UsageState::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let painter = self.icon_sink.map(IconPainter::spawn);
        let event_rx = self.events.subscribe();

        let task = ManagerTask {
            prefs: self.prefs,
            source: self.source,
            notifier: self.notifier,
            painter,
            alerts: UsageAlerts::new(&self.thresholds),
            state: UsageState::default(),
            state_tx,
            outcome_tx,
        };

        let handle = tokio::spawn(task.run(command_rx, outcome_rx, event_rx));

        ManagerHandle {
            commands: command_tx,
            state: state_rx,
            task: handle,
        }
    }
}

/// Handle to a running manager
pub struct ManagerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<UsageState>,
    task: JoinHandle<()>,
}

impl ManagerHandle {
    /// Receiver of published state, starting at the current value
    pub fn subscribe(&self) -> watch::Receiver<UsageState> {
        self.state.clone()
    }

    /// Copy of the current state
    pub fn state(&self) -> UsageState {
        self.state.borrow().clone()
    }

    /// Run a tick now without disturbing the timer.
    pub fn refresh_now(&self) -> Result<()> {
        self.commands
            .send(Command::RefreshNow)
            .map_err(|_| Error::ManagerStopped)
    }

    /// Stop the loop and wait for it to finish. In-flight fetches are
    /// abandoned; a pending icon paint is flushed.
    pub async fn shutdown(self) {
        // Already stopped when the send fails
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Status manager task failed");
        }
    }
}

struct ManagerTask {
    prefs: Preferences,
    source: Arc<dyn UsageSource>,
    notifier: Arc<dyn Notifier>,
    painter: Option<IconPainter>,
    alerts: UsageAlerts,
    state: UsageState,
    state_tx: watch::Sender<UsageState>,
    outcome_tx: mpsc::UnboundedSender<FetchOutcome>,
}

impl ManagerTask {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<FetchOutcome>,
        mut events: broadcast::Receiver<AppEvent>,
    ) {
        self.load_persisted();
        self.publish();
        self.repaint();

        let mut interval = self.read_interval();
        tracing::info!(interval_secs = interval.as_secs_f64(), "Status manager started");

        // First tick is immediate
        let mut next_tick = Instant::now();
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_tick) => {
                    self.tick();
                    next_tick = Instant::now() + interval;
                }
                Some(outcome) = outcomes.recv() => {
                    self.apply(outcome);
                }
                command = commands.recv() => match command {
                    Some(Command::RefreshNow) => {
                        tracing::debug!("Manual refresh requested");
                        self.tick();
                    }
                    Some(Command::Shutdown) | None => break,
                },
                event = events.recv(), if events_open => match event {
                    Ok(AppEvent::RefreshIntervalChanged(new_interval)) => {
                        // Events from other publishers may not be clamped
                        let new_interval =
                            new_interval.clamp(MIN_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL);
                        tracing::info!(
                            old_secs = interval.as_secs_f64(),
                            new_secs = new_interval.as_secs_f64(),
                            "Refresh interval changed, restarting timer"
                        );
                        interval = new_interval;
                        next_tick = Instant::now() + interval;
                    }
                    Ok(AppEvent::IconStyleChanged(_))
                    | Ok(AppEvent::AppearanceChanged(_))
                    | Ok(AppEvent::MonochromeChanged(_)) => self.repaint(),
                    Ok(AppEvent::CredentialsChanged) | Ok(AppEvent::PopoverStyleChanged(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed settings events, re-reading preferences");
                        let current = self.read_interval();
                        if current != interval {
                            interval = current;
                            next_tick = Instant::now() + interval;
                        }
                        self.repaint();
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Settings event bus closed");
                        events_open = false;
                    }
                },
            }
        }

        tracing::info!(stats = ?self.state.stats, "Status manager stopping");
        if let Some(painter) = self.painter.take() {
            painter.shutdown().await;
        }
    }

    fn read_interval(&self) -> Duration {
        self.prefs.refresh_interval().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read refresh interval, using default");
            DEFAULT_REFRESH_INTERVAL
        })
    }

    /// Seed state with the last known good snapshots.
    fn load_persisted(&mut self) {
        match self.prefs.load_usage_snapshot() {
            Ok(usage) => self.state.usage = usage,
            Err(e) => tracing::warn!(error = %e, "Could not load persisted usage snapshot"),
        }
        match self.prefs.load_api_usage_snapshot() {
            Ok(api_usage) => self.state.api_usage = api_usage,
            Err(e) => tracing::warn!(error = %e, "Could not load persisted API usage snapshot"),
        }
    }

    fn tick(&mut self) {
        self.state.stats.ticks += 1;
        self.state.last_tick = Some(Utc::now());

        match self.prefs.credentials() {
            Ok(Some(creds)) => {
                let source = Arc::clone(&self.source);
                self.spawn_fetch(async move {
                    FetchOutcome::Usage(source.fetch_usage(&creds).await)
                });
            }
            Ok(None) => {
                tracing::debug!("No session key or organization configured, skipping usage fetch")
            }
            Err(e) => tracing::warn!(error = %e, "Could not read credentials"),
        }

        let check_status = self.prefs.check_service_status().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read check_service_status");
            true
        });
        if check_status {
            let source = Arc::clone(&self.source);
            self.spawn_fetch(async move {
                FetchOutcome::ServiceStatus(source.fetch_service_status().await)
            });
        }

        match self.prefs.api_credentials() {
            Ok(Some(creds)) => {
                let source = Arc::clone(&self.source);
                self.spawn_fetch(async move {
                    FetchOutcome::ApiUsage(source.fetch_api_usage(&creds).await)
                });
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read API credentials"),
        }

        self.publish();
    }

    fn spawn_fetch<F>(&mut self, fetch: F)
    where
        F: std::future::Future<Output = FetchOutcome> + Send + 'static,
    {
        self.state.in_flight += 1;
        let tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            // Receiver only goes away when the manager stops
            let _ = tx.send(fetch.await);
        });
    }

    fn apply(&mut self, outcome: FetchOutcome) {
        self.state.in_flight = self.state.in_flight.saturating_sub(1);
        let kind = outcome.kind();

        match outcome {
            FetchOutcome::Usage(Ok(snapshot)) => {
                self.state.stats.usage_ok += 1;
                tracing::debug!(
                    session = snapshot.session_percentage,
                    weekly = snapshot.weekly_percentage,
                    "Usage refreshed"
                );
                if let Err(e) = self.prefs.save_usage_snapshot(&snapshot) {
                    tracing::error!(error = %e, "Failed to persist usage snapshot");
                }
                self.state.usage = Some(snapshot.clone());
                self.repaint();
                self.evaluate_alerts(&snapshot);
            }
            FetchOutcome::ServiceStatus(Ok(status)) => {
                self.state.stats.status_ok += 1;
                self.state.service_status = Some(status);
            }
            FetchOutcome::ApiUsage(Ok(snapshot)) => {
                self.state.stats.api_ok += 1;
                if let Err(e) = self.prefs.save_api_usage_snapshot(&snapshot) {
                    tracing::error!(error = %e, "Failed to persist API usage snapshot");
                }
                self.state.api_usage = Some(snapshot);
            }
            FetchOutcome::Usage(Err(e)) => {
                self.state.stats.usage_err += 1;
                log_failure(kind, &e);
            }
            FetchOutcome::ServiceStatus(Err(e)) => {
                self.state.stats.status_err += 1;
                log_failure(kind, &e);
            }
            FetchOutcome::ApiUsage(Err(e)) => {
                self.state.stats.api_err += 1;
                log_failure(kind, &e);
            }
        }

        self.publish();
    }

    fn evaluate_alerts(&mut self, snapshot: &UsageSnapshot) {
        let toggles = self.read_toggles();
        for alert in self.alerts.evaluate(snapshot, toggles) {
            tracing::info!(
                window = alert.window.label(),
                threshold = alert.threshold,
                "Sending usage notification"
            );
            if let Err(e) = self.notifier.notify(&alert) {
                tracing::warn!(error = %e, "Failed to send notification");
            }
        }
    }

    fn read_toggles(&self) -> AlertToggles {
        let read = |value: Result<bool>, name: &str| {
            value.unwrap_or_else(|e| {
                tracing::warn!(error = %e, key = name, "Could not read notification toggle");
                true
            })
        };
        AlertToggles {
            enabled: read(self.prefs.notifications_enabled(), "notifications_enabled"),
            session: read(self.prefs.notify_session(), "notify_session"),
            weekly: read(self.prefs.notify_weekly(), "notify_weekly"),
        }
    }

    fn repaint(&self) {
        let Some(painter) = &self.painter else {
            return;
        };
        let params = IconParams {
            percentage: self
                .state
                .usage
                .as_ref()
                .map(|u| u.session_percentage)
                .unwrap_or(0.0),
            style: self.prefs.icon_style().unwrap_or_default(),
            appearance: self.prefs.appearance().unwrap_or_default(),
            monochrome: self.prefs.monochrome_icon().unwrap_or(false),
        };
        painter.invalidate(params);
    }

    fn publish(&mut self) {
        self.state.phase = if self.state.in_flight > 0 {
            RefreshPhase::Fetching
        } else {
            RefreshPhase::Idle
        };
        self.state_tx.send_replace(self.state.clone());
    }
}

fn log_failure(kind: FetchKind, error: &Error) {
    if error.is_auth_failure() {
        tracing::warn!(kind = kind.as_str(), error = %error, "Fetch rejected, session key may have expired");
    } else {
        tracing::warn!(kind = kind.as_str(), error = %error, "Fetch failed");
    }
}
