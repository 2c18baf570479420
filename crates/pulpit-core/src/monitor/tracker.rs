//! Pure session-tracking state machine behind the live monitor.
//!
//! Per session identity:
//! ```text
//!  NoSession --(reported live)--> Live --(no longer reported)--> Archiving --> NoSession
//! ```
//! `Archiving` is only a signal to the caller: the tracker clears its current
//! session in the same step that asks for archival, so the next poll already
//! sees `NoSession`.
//!
//! When the first reported session changes identity without an empty poll in
//! between, the new one simply replaces the current session: nothing is
//! archived and no notification is shown.
//!
//! The tracker remembers which identities it has announced and which it has
//! asked to archive, so a session that flaps (live, gone, live, gone) is
//! announced once and archived once.  Only the most recent
//! [`REMEMBERED_IDS`] identities are kept.

use std::collections::{HashSet, VecDeque};

use pulpit_proto::protocol::LiveSession;

/// What a single poll observation changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A new identity became the current session.  `notify` carries the
    /// notification generation when the "we're live" notice was (re-)armed.
    Started {
        session: LiveSession,
        notify: Option<u64>,
    },
    /// The current identity was reported again (descriptive fields may have
    /// changed, e.g. viewers).
    Refreshed,
    /// A different identity is now first in the list.  Not archived, not
    /// announced.
    Replaced { previous: String, session: LiveSession },
    /// The current identity is gone.  `archive` is true only the first time
    /// this identity ends.
    Ended { session: LiveSession, archive: bool },
}

#[derive(Debug, Default)]
pub struct SessionTracker {
    current: Option<LiveSession>,
    notification_visible: bool,
    /// Bumped every time the notification is shown; hide requests carrying
    /// an older generation are ignored.
    generation: u64,
    announced: RecentIds,
    archived: RecentIds,
}

/// Identities older than this are forgotten; one that comes back after that
/// many others is announced (or archived) again.
pub const REMEMBERED_IDS: usize = 64;

/// Insertion-ordered id set that drops its oldest entry past capacity.
#[derive(Debug)]
struct RecentIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl Default for RecentIds {
    fn default() -> Self {
        Self::with_capacity(REMEMBERED_IDS)
    }
}

impl RecentIds {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Returns true if `id` was not already remembered.
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&LiveSession> {
        self.current.as_ref()
    }

    pub fn notification_visible(&self) -> bool {
        self.notification_visible
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply the list of sessions a successful poll reported as live.
    /// Only the first reported session is tracked.
    pub fn observe(&mut self, reported: Vec<LiveSession>) -> Vec<Transition> {
        let candidate = reported.into_iter().next();
        let mut out = Vec::new();

        match (self.current.take(), candidate) {
            (None, None) => {}
            (Some(prev), None) => out.push(self.end(prev)),
            (None, Some(next)) => out.push(self.start(next)),
            (Some(prev), Some(next)) if prev.id == next.id => {
                self.current = Some(next);
                out.push(Transition::Refreshed);
            }
            (Some(prev), Some(next)) => {
                // Counts as seen so a later reappearance is not announced.
                self.announced.insert(&next.id);
                self.current = Some(next.clone());
                out.push(Transition::Replaced {
                    previous: prev.id,
                    session: next,
                });
            }
        }

        out
    }

    fn start(&mut self, session: LiveSession) -> Transition {
        let notify = if self.announced.insert(&session.id) {
            self.generation += 1;
            self.notification_visible = true;
            Some(self.generation)
        } else {
            None
        };
        self.current = Some(session.clone());
        Transition::Started { session, notify }
    }

    fn end(&mut self, session: LiveSession) -> Transition {
        let archive = self.archived.insert(&session.id);
        Transition::Ended { session, archive }
    }

    /// The hide timer for `generation` elapsed.  Returns true if the
    /// notification was hidden by this call.
    pub fn hide_notification(&mut self, generation: u64) -> bool {
        if self.notification_visible && generation == self.generation {
            self.notification_visible = false;
            return true;
        }
        false
    }

    /// Explicit user dismissal.  Returns true if the notification was visible.
    pub fn dismiss_notification(&mut self) -> bool {
        std::mem::replace(&mut self.notification_visible, false)
    }
}
