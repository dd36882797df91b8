//! Session Registry
//!
//! Maps room codes to Documents, creating them on first use and reclaiming
//! them once they have sat empty for the grace period.
//!
//! ## Concurrency
//! - `sessions`: parking_lot Mutex, never held across an await
//! - Each Document sits behind its own Mutex; on the current-thread runtime
//!   every command, eviction sweep and consolidation pass holds it for its
//!   whole run, so no two mutations of one buffer interleave
//! - Maintenance timers are tokio tasks on the same runtime, aborted when
//!   the session is reclaimed

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::Config;
use crate::error::{ChunkpadError, Result};

use super::{ClientId, Document, Outbox};

/// A document shared between its connections and its timers
pub type SharedDocument = Arc<Mutex<Document>>;

/// Where fatal storage failures are reported
pub type FailureSink = mpsc::UnboundedSender<ChunkpadError>;

/// Longest accepted room code
pub const MAX_ROOM_LEN: usize = 64;

/// A live session and its maintenance tasks
struct Session {
    document: SharedDocument,
    timers: Vec<JoinHandle<()>>,
}

/// Room code → Document
pub struct Registry {
    config: Config,
    sessions: Mutex<HashMap<String, Session>>,
    failures: FailureSink,
}

impl Registry {
    /// Create an empty registry
    ///
    /// Fatal storage errors hit by any session task are sent to `failures`.
    pub fn new(config: Config, failures: FailureSink) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
            failures,
        }
    }

    /// Get the document for `room`, creating it if absent
    ///
    /// Must be called from within a tokio runtime: a new session starts its
    /// maintenance timers.
    pub fn get_or_create(&self, room: &str) -> Result<SharedDocument> {
        let mut sessions = self.sessions.lock();
        self.open_session(&mut sessions, room)
    }

    /// Resolve `room` and attach a client to it in one step
    ///
    /// The registry lock is held across both, so a reclaim sweep cannot
    /// destroy the session in between.
    pub fn attach(&self, room: &str, outbox: Outbox) -> Result<(SharedDocument, ClientId)> {
        let mut sessions = self.sessions.lock();
        let document = self.open_session(&mut sessions, room)?;
        let id = document.lock().connect(outbox);
        Ok((document, id))
    }

    /// Detach a client from its document
    pub fn detach(&self, document: &SharedDocument, id: ClientId) {
        document.lock().disconnect(id);
    }

    /// Destroy every session that has had no clients for the grace period
    ///
    /// Returns the room codes that were reclaimed.
    pub fn reclaim_idle(&self) -> Result<Vec<String>> {
        let grace = self.config.reclaim_grace();
        let mut sessions = self.sessions.lock();

        let idle: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.document.lock().is_idle(grace))
            .map(|(room, _)| room.clone())
            .collect();

        for room in &idle {
            if let Some(session) = sessions.remove(room) {
                for timer in &session.timers {
                    timer.abort();
                }
                session.document.lock().destroy()?;
                tracing::info!("Reclaimed idle session {}", room);
            }
        }

        Ok(idle)
    }

    /// Persist every session's resident chunks
    pub fn flush_all(&self) -> Result<()> {
        let sessions = self.sessions.lock();
        for session in sessions.values() {
            session.document.lock().flush()?;
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether a session is live for `room`
    pub fn contains(&self, room: &str) -> bool {
        self.sessions.lock().contains_key(room)
    }

    /// Forward a fatal error to whoever owns the failure channel
    pub fn report_failure(&self, error: ChunkpadError) {
        tracing::error!("Fatal storage failure: {}", error);
        let _ = self.failures.send(error);
    }

    /// Periodically reclaim idle sessions
    pub fn spawn_reclaimer(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let period = self.config.reclaim_interval();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = registry.reclaim_idle() {
                    registry.report_failure(e);
                    return;
                }
            }
        })
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Look up or open the session for `room` (registry lock held)
    fn open_session(
        &self,
        sessions: &mut HashMap<String, Session>,
        room: &str,
    ) -> Result<SharedDocument> {
        validate_room(room)?;

        if let Some(session) = sessions.get(room) {
            return Ok(Arc::clone(&session.document));
        }

        let dir = self.config.data_dir.join(room);
        let document = Document::open(room, &dir, self.config.store_options())?;
        let document = Arc::new(Mutex::new(document));
        let timers = self.spawn_timers(room, &document);

        tracing::info!("Opened session {} in {}", room, dir.display());
        sessions.insert(
            room.to_string(),
            Session {
                document: Arc::clone(&document),
                timers,
            },
        );
        Ok(document)
    }

    /// Start the eviction, consolidation and debug-push timers for a session
    fn spawn_timers(&self, room: &str, document: &SharedDocument) -> Vec<JoinHandle<()>> {
        let cleanup = self.spawn_periodic(room, document, self.config.cleanup_interval(), |doc| {
            doc.clean_up().map(|_| ())
        });
        let consolidate = self.spawn_periodic(
            room,
            document,
            self.config.consolidate_interval(),
            |doc| doc.consolidate().map(|_| ()),
        );
        let debug = self.spawn_periodic(room, document, self.config.debug_interval(), |doc| {
            doc.push_debug();
            Ok(())
        });
        vec![cleanup, consolidate, debug]
    }

    /// Run `task` against the document every `period` until it fails
    fn spawn_periodic<F>(
        &self,
        room: &str,
        document: &SharedDocument,
        period: Duration,
        task: F,
    ) -> JoinHandle<()>
    where
        F: Fn(&mut Document) -> Result<()> + Send + 'static,
    {
        let document = Arc::clone(document);
        let failures = self.failures.clone();
        let room = room.to_string();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                let outcome = {
                    let mut doc = document.lock();
                    task(&mut *doc)
                };
                if let Err(e) = outcome {
                    tracing::error!("Maintenance of session {} failed: {}", room, e);
                    let _ = failures.send(e);
                    return;
                }
            }
        })
    }
}

/// An interval whose first tick is one full period away
fn interval(period: Duration) -> time::Interval {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Room codes name directories, so only `[A-Za-z0-9_-]{1,64}` is accepted
pub fn validate_room(room: &str) -> Result<()> {
    let valid = !room.is_empty()
        && room.len() <= MAX_ROOM_LEN
        && room
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(ChunkpadError::InvalidRoom(room.to_string()))
    }
}
