//! Catalog service: owns the sermon working set and republishes the derived
//! view after every intent or refresh.
//!
//! The catalog never polls.  It refreshes once on start, on an explicit
//! `Refresh`, and whenever the live monitor reports that a session was
//! archived.  Only the most recently issued refresh is applied; a slower
//! earlier response is discarded when it finally arrives.

pub mod view;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pulpit_proto::protocol::{PublicationStatus, Sermon};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SourceResult;
use crate::monitor::MonitorEvent;
use crate::source::SermonSource;

pub use view::{CatalogState, CatalogView, SermonCard, SeriesFilter, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub rev: u64,
    #[serde(flatten)]
    pub view: CatalogView,
    pub selected_sermon: Option<Sermon>,
    pub loading: bool,
    /// User-facing message from the last failed refresh.
    pub error: Option<String>,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

impl Default for CatalogSnapshot {
    fn default() -> Self {
        Self {
            rev: 0,
            view: CatalogState::default().derive(),
            selected_sermon: None,
            loading: false,
            error: None,
            last_refresh_at: None,
        }
    }
}

#[derive(Debug)]
pub enum CatalogCommand {
    Refresh,
    SetSearch(String),
    SetFilter(SeriesFilter),
    SetPage(usize),
    Select(String),
    ClearSelection,
}

#[derive(Clone)]
pub struct CatalogHandle {
    commands: mpsc::Sender<CatalogCommand>,
    snapshot: watch::Receiver<CatalogSnapshot>,
}

impl CatalogHandle {
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CatalogSnapshot> {
        self.snapshot.clone()
    }

    pub async fn refresh(&self) {
        self.send(CatalogCommand::Refresh).await;
    }

    pub async fn set_search(&self, query: impl Into<String>) {
        self.send(CatalogCommand::SetSearch(query.into())).await;
    }

    pub async fn set_filter(&self, filter: SeriesFilter) {
        self.send(CatalogCommand::SetFilter(filter)).await;
    }

    pub async fn set_page(&self, page: usize) {
        self.send(CatalogCommand::SetPage(page)).await;
    }

    pub async fn select(&self, id: impl Into<String>) {
        self.send(CatalogCommand::Select(id.into())).await;
    }

    pub async fn clear_selection(&self) {
        self.send(CatalogCommand::ClearSelection).await;
    }

    async fn send(&self, cmd: CatalogCommand) {
        if self.commands.send(cmd).await.is_err() {
            warn!("Catalog: loop is gone, dropping command");
        }
    }
}

pub struct CatalogService<S> {
    source: Arc<S>,
    state: CatalogState,
    commands_rx: mpsc::Receiver<CatalogCommand>,
    snapshot_tx: watch::Sender<CatalogSnapshot>,
    monitor_events: Option<broadcast::Receiver<MonitorEvent>>,
    /// Refresh requests tagged with the generation that issued them.
    tasks: JoinSet<(u64, SourceResult<Vec<Sermon>>)>,
    refresh_generation: u64,
    loading: bool,
    error: Option<String>,
    last_refresh_at: Option<DateTime<Utc>>,
    rev: u64,
}

impl<S: SermonSource> CatalogService<S> {
    pub fn new(source: S, page_size: usize) -> (Self, CatalogHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let state = CatalogState::new(page_size);
        let (snapshot_tx, snapshot_rx) = watch::channel(CatalogSnapshot {
            view: state.derive(),
            ..Default::default()
        });

        let service = Self {
            source: Arc::new(source),
            state,
            commands_rx,
            snapshot_tx,
            monitor_events: None,
            tasks: JoinSet::new(),
            refresh_generation: 0,
            loading: false,
            error: None,
            last_refresh_at: None,
            rev: 0,
        };
        let handle = CatalogHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
        };
        (service, handle)
    }

    /// Refresh whenever the monitor reports an archived session.
    pub fn with_monitor_events(mut self, events: broadcast::Receiver<MonitorEvent>) -> Self {
        self.monitor_events = Some(events);
        self
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Catalog: starting (page size {})", self.state.page_size());
        self.start_refresh();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Catalog: cancelled");
                    break;
                }

                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    match joined {
                        Ok((generation, result)) => self.handle_refresh(generation, result),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => {
                            error!("Catalog: refresh task panicked: {}", e);
                            self.loading = false;
                            self.publish();
                        }
                    }
                }

                cmd = self.commands_rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            info!("Catalog: command channel closed, shutting down");
                            break;
                        }
                    }
                }

                evt = next_monitor_event(&mut self.monitor_events) => {
                    self.handle_monitor_event(evt);
                }
            }
        }

        self.tasks.shutdown().await;
        info!("Catalog: stopped");
    }

    fn handle_command(&mut self, cmd: CatalogCommand) {
        debug!("Catalog: command {:?}", cmd);
        match cmd {
            CatalogCommand::Refresh => {
                self.start_refresh();
                return;
            }
            CatalogCommand::SetSearch(query) => self.state.set_search(query),
            CatalogCommand::SetFilter(filter) => self.state.set_filter(filter),
            CatalogCommand::SetPage(page) => self.state.set_page(page),
            CatalogCommand::Select(id) => {
                if !self.state.select(&id) {
                    warn!("Catalog: no sermon with id {}, selection unchanged", id);
                    return;
                }
            }
            CatalogCommand::ClearSelection => self.state.clear_selection(),
        }
        self.publish();
    }

    fn handle_monitor_event(&mut self, evt: Result<MonitorEvent, RecvError>) {
        match evt {
            Ok(MonitorEvent::SessionArchived { id }) => {
                info!("Catalog: session {} archived, refreshing", id);
                self.start_refresh();
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                // An archive notice may have been among the dropped events.
                warn!("Catalog: missed {} monitor events, refreshing", skipped);
                self.start_refresh();
            }
            Err(RecvError::Closed) => {
                debug!("Catalog: monitor event stream closed");
                self.monitor_events = None;
            }
        }
    }

    fn start_refresh(&mut self) {
        self.refresh_generation += 1;
        let generation = self.refresh_generation;
        self.loading = true;
        self.publish();

        let source = Arc::clone(&self.source);
        self.tasks.spawn(async move {
            let result = source.list_sermons(PublicationStatus::Published).await;
            (generation, result)
        });
    }

    fn handle_refresh(&mut self, generation: u64, result: SourceResult<Vec<Sermon>>) {
        if generation != self.refresh_generation {
            debug!("Catalog: discarding superseded refresh {}", generation);
            return;
        }

        self.loading = false;
        match result {
            Ok(items) => {
                let kept = self.state.replace_source(items);
                info!("Catalog: loaded {} sermons", kept);
                self.error = None;
                self.last_refresh_at = Some(Utc::now());
            }
            Err(e) => {
                e.log("Catalog: refresh failed");
                self.error = Some(format!("Could not load sermons: {}", e));
            }
        }
        self.publish();
    }

    fn publish(&mut self) {
        self.rev += 1;
        self.snapshot_tx.send_replace(CatalogSnapshot {
            rev: self.rev,
            view: self.state.derive(),
            selected_sermon: self.state.selected().cloned(),
            loading: self.loading,
            error: self.error.clone(),
            last_refresh_at: self.last_refresh_at,
        });
    }
}

async fn next_monitor_event(
    events: &mut Option<broadcast::Receiver<MonitorEvent>>,
) -> Result<MonitorEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
