//! LiveMonitor: single-owner event loop watching for an active broadcast.
//!
//! The loop owns the [`SessionTracker`] exclusively.  Polls, archival calls
//! and the notification hide timer all run as tasks in one `JoinSet`; their
//! outcomes come back into the loop and are applied there, so every state
//! change is one atomic step for readers of the published snapshot.
//!
//! At most one poll is in flight: a tick that fires while the previous poll is
//! still waiting on the network is skipped.  Cancelling the token tears the
//! loop down and aborts every outstanding task, so no poll result or hide
//! callback is applied afterwards.

pub mod tracker;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulpit_proto::config::MonitorConfig;
use pulpit_proto::protocol::{LiveSession, SessionStatus};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SourceResult;
use crate::source::LiveSessionSource;

pub use tracker::{SessionTracker, Transition};

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub notification_ttl: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            notification_ttl: Duration::from_secs(5),
        }
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            notification_ttl: config.notification_ttl(),
        }
    }
}

/// Read-only view of the monitor published after every change.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    /// Monotonic revision counter, incremented on every publish.
    pub rev: u64,
    pub current_session: Option<LiveSession>,
    pub notification_visible: bool,
    pub last_poll_at: Option<DateTime<Utc>>,
    /// Last poll failure, cleared by the next successful poll.
    pub last_error: Option<String>,
}

/// Transitions broadcast to any subscriber (the catalog listens for
/// `SessionArchived`).
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    SessionStarted { id: String, title: String },
    SessionEnded { id: String },
    SessionArchived { id: String },
    ArchiveFailed { id: String, error: String },
    NotificationShown,
    NotificationHidden,
}

/// Host intents.
#[derive(Debug)]
pub enum MonitorCommand {
    DismissNotification,
    /// Poll immediately instead of waiting for the next tick (still subject
    /// to the one-poll-in-flight rule).
    PollNow,
}

/// What the host keeps: intents go in, snapshots and events come out.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    snapshot: watch::Receiver<MonitorSnapshot>,
    events: broadcast::Sender<MonitorEvent>,
}

impl MonitorHandle {
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub async fn dismiss_notification(&self) {
        self.send(MonitorCommand::DismissNotification).await;
    }

    pub async fn poll_now(&self) {
        self.send(MonitorCommand::PollNow).await;
    }

    async fn send(&self, cmd: MonitorCommand) {
        if self.commands.send(cmd).await.is_err() {
            warn!("LiveMonitor: loop is gone, dropping command");
        }
    }
}

// ── LiveMonitor ───────────────────────────────────────────────────────────────

enum TaskOutcome {
    Polled {
        token: u64,
        result: SourceResult<Vec<LiveSession>>,
    },
    HideElapsed {
        generation: u64,
    },
    Archived {
        id: String,
        result: SourceResult<()>,
    },
}

pub struct LiveMonitor<S> {
    source: Arc<S>,
    settings: MonitorSettings,
    tracker: SessionTracker,
    commands_rx: mpsc::Receiver<MonitorCommand>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
    events_tx: broadcast::Sender<MonitorEvent>,
    tasks: JoinSet<TaskOutcome>,
    /// Token of the poll currently waiting on the network.
    in_flight: Option<u64>,
    next_token: u64,
    hide_timer: Option<AbortHandle>,
    rev: u64,
    last_poll_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl<S: LiveSessionSource> LiveMonitor<S> {
    pub fn new(source: S, settings: MonitorSettings) -> (Self, MonitorHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = watch::channel(MonitorSnapshot::default());
        let (events_tx, _) = broadcast::channel(64);

        let handle = MonitorHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
            events: events_tx.clone(),
        };

        let monitor = Self {
            source: Arc::new(source),
            settings,
            tracker: SessionTracker::new(),
            commands_rx,
            snapshot_tx,
            events_tx,
            tasks: JoinSet::new(),
            in_flight: None,
            next_token: 0,
            hide_timer: None,
            rev: 0,
            last_poll_at: None,
            last_error: None,
        };

        (monitor, handle)
    }

    /// Run until `cancel` fires or every handle is dropped.  Polls once
    /// immediately, then every `poll_interval`.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "LiveMonitor: starting (poll every {:?}, notification {:?})",
            self.settings.poll_interval, self.settings.notification_ttl
        );

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("LiveMonitor: cancelled");
                    break;
                }

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    match joined {
                        Ok(outcome) => self.handle_outcome(outcome),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => {
                            error!("LiveMonitor: task panicked: {}", e);
                            // Can't tell which task it was; release the poll
                            // guard rather than wedge polling forever.
                            self.in_flight = None;
                        }
                    }
                }

                cmd = self.commands_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            info!("LiveMonitor: command channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = ticker.tick() => self.start_poll(),
            }
        }

        self.tasks.shutdown().await;
        info!("LiveMonitor: stopped");
    }

    fn handle_command(&mut self, cmd: MonitorCommand) {
        debug!("LiveMonitor: command {:?}", cmd);
        match cmd {
            MonitorCommand::DismissNotification => {
                if self.tracker.dismiss_notification() {
                    if let Some(timer) = self.hide_timer.take() {
                        timer.abort();
                    }
                    let _ = self.events_tx.send(MonitorEvent::NotificationHidden);
                    self.publish();
                }
            }
            MonitorCommand::PollNow => self.start_poll(),
        }
    }

    fn start_poll(&mut self) {
        if let Some(token) = self.in_flight {
            debug!("LiveMonitor: poll {} still in flight, skipping", token);
            return;
        }

        self.next_token += 1;
        let token = self.next_token;
        self.in_flight = Some(token);

        let source = Arc::clone(&self.source);
        self.tasks.spawn(async move {
            let result = source.list_sessions(SessionStatus::Live).await;
            TaskOutcome::Polled { token, result }
        });
    }

    fn handle_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Polled { token, result } => {
                if self.in_flight != Some(token) {
                    debug!("LiveMonitor: discarding superseded poll {}", token);
                    return;
                }
                self.in_flight = None;
                self.handle_poll(result);
            }

            TaskOutcome::HideElapsed { generation } => {
                if self.tracker.hide_notification(generation) {
                    self.hide_timer = None;
                    let _ = self.events_tx.send(MonitorEvent::NotificationHidden);
                    self.publish();
                }
            }

            TaskOutcome::Archived { id, result } => match result {
                Ok(()) => {
                    info!("LiveMonitor: archived session {}", id);
                    let _ = self.events_tx.send(MonitorEvent::SessionArchived { id });
                }
                Err(e) => {
                    e.log(&format!("LiveMonitor: archiving session {} failed", id));
                    let _ = self.events_tx.send(MonitorEvent::ArchiveFailed {
                        id,
                        error: e.to_string(),
                    });
                }
            },
        }
    }

    fn handle_poll(&mut self, result: SourceResult<Vec<LiveSession>>) {
        let sessions = match result {
            Ok(sessions) => sessions,
            Err(e) => {
                e.log("LiveMonitor: poll failed");
                self.last_error = Some(e.to_string());
                self.publish();
                return;
            }
        };

        self.last_poll_at = Some(Utc::now());
        self.last_error = None;

        if sessions.len() > 1 {
            debug!(
                "LiveMonitor: {} sessions reported live, tracking the first",
                sessions.len()
            );
        }

        for transition in self.tracker.observe(sessions) {
            self.apply(transition);
        }
        self.publish();
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Started { session, notify } => {
                info!("LiveMonitor: session {} is live ({})", session.id, session.title);
                let _ = self.events_tx.send(MonitorEvent::SessionStarted {
                    id: session.id,
                    title: session.title,
                });
                if let Some(generation) = notify {
                    self.arm_hide_timer(generation);
                    let _ = self.events_tx.send(MonitorEvent::NotificationShown);
                }
            }
            Transition::Refreshed => {}
            Transition::Replaced { previous, session } => {
                info!(
                    "LiveMonitor: session {} replaced {} as current ({})",
                    session.id, previous, session.title
                );
            }
            Transition::Ended { session, archive } => {
                info!("LiveMonitor: session {} is no longer live", session.id);
                let _ = self.events_tx.send(MonitorEvent::SessionEnded {
                    id: session.id.clone(),
                });
                if archive {
                    self.dispatch_archive(session.id);
                } else {
                    debug!("LiveMonitor: session {} already archived", session.id);
                }
            }
        }
    }

    /// Replace any pending hide timer with one for `generation`.
    fn arm_hide_timer(&mut self, generation: u64) {
        if let Some(prev) = self.hide_timer.take() {
            prev.abort();
        }
        let ttl = self.settings.notification_ttl;
        let handle = self.tasks.spawn(async move {
            tokio::time::sleep(ttl).await;
            TaskOutcome::HideElapsed { generation }
        });
        self.hide_timer = Some(handle);
    }

    fn dispatch_archive(&mut self, id: String) {
        info!("LiveMonitor: archiving session {}", id);
        let source = Arc::clone(&self.source);
        self.tasks.spawn(async move {
            let result = source.archive_session(&id).await;
            TaskOutcome::Archived { id, result }
        });
    }

    fn publish(&mut self) {
        self.rev += 1;
        self.snapshot_tx.send_replace(MonitorSnapshot {
            rev: self.rev,
            current_session: self.tracker.current().cloned(),
            notification_visible: self.tracker.notification_visible(),
            last_poll_at: self.last_poll_at,
            last_error: self.last_error.clone(),
        });
    }
}
