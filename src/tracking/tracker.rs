//! Pointer position tracking.
//!
//! A [`PositionTracker`] subscribes to a session's pointer-change channel and appends
//! one [`PointerSample`] per notification to a shared [`PointerLog`]. The log has a
//! single writer (the tracker task) and any number of readers; a tokio `RwLock` is the
//! only synchronization point.
//!
//! ```text
//! controller ──PointerEvent──► broadcast channel ──► tracker task ──append──► PointerLog
//!                                                                              ▲
//!                                                                   readers ───┘
//! ```
//!
//! A tracker has at most one attachment at a time; a second `attach` before `detach`
//! is refused. Detaching stops the task. Events already delivered to the tracker when
//! `detach` is called are still recorded; nothing is appended after `detach` returns.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::controller::session::ControllerSession;
use crate::controller::transport::{ControllerTransport, PointerEvent, PointerKind};
use crate::error::{AppResult, ToroError};

/// One recorded pointer position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointerSample {
    /// Position in the log, starting at 0.
    pub seq: u64,
    /// Which pointer moved.
    pub kind: PointerKind,
    /// Module reported with the event.
    pub module: String,
    /// Reported row.
    pub row: usize,
    /// Time the sample was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Append-only, shareable log of pointer samples.
#[derive(Debug, Clone, Default)]
pub struct PointerLog {
    samples: Arc<RwLock<Vec<PointerSample>>>,
}

impl PointerLog {
    async fn append(&self, event: PointerEvent) {
        let mut samples = self.samples.write().await;
        let seq = samples.len() as u64;
        trace!(seq, kind = ?event.kind, row = event.row, "Pointer sample");
        samples.push(PointerSample {
            seq,
            kind: event.kind,
            module: event.module,
            row: event.row,
            timestamp: Utc::now(),
        });
    }

    /// Snapshot of every sample so far, oldest first.
    pub async fn samples(&self) -> Vec<PointerSample> {
        self.samples.read().await.clone()
    }

    /// Samples with `seq >= from`.
    pub async fn since(&self, from: u64) -> Vec<PointerSample> {
        let samples = self.samples.read().await;
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(samples.len());
        samples[start..].to_vec()
    }

    /// Most recent sample of `kind`.
    pub async fn latest(&self, kind: PointerKind) -> Option<PointerSample> {
        self.samples
            .read()
            .await
            .iter()
            .rev()
            .find(|s| s.kind == kind)
            .cloned()
    }

    /// Number of samples recorded.
    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }

    /// Whether nothing has been recorded yet.
    pub async fn is_empty(&self) -> bool {
        self.samples.read().await.is_empty()
    }
}

/// Live attachment of a tracker to a session's notifications.
///
/// Dropping the handle without detaching also stops the tracker task.
#[derive(Debug)]
pub struct TrackerHandle {
    id: Uuid,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    /// Attachment id, for log correlation.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Records pointer positions reported by a session.
#[derive(Debug, Default)]
pub struct PositionTracker {
    log: PointerLog,
    // Set while a tracker task is running; cleared by the task on exit.
    attached: Arc<AtomicBool>,
}

impl PositionTracker {
    /// Tracker with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the log.
    pub fn log(&self) -> PointerLog {
        self.log.clone()
    }

    /// Whether a tracker task is currently recording.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Starts recording notifications from `session`.
    ///
    /// # Errors
    /// `InvalidSessionState` when the session is not logged on or the tracker is
    /// already attached.
    pub fn attach<T: ControllerTransport>(
        &self,
        session: &ControllerSession<T>,
    ) -> AppResult<TrackerHandle> {
        let events = session.subscribe_pointers()?;
        self.attach_receiver(events)
    }

    /// Starts recording from an already-subscribed receiver.
    ///
    /// # Errors
    /// `InvalidSessionState` while a previous attachment is still active.
    pub fn attach_receiver(
        &self,
        mut events: broadcast::Receiver<PointerEvent>,
    ) -> AppResult<TrackerHandle> {
        if self
            .attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ToroError::InvalidSessionState {
                operation: "attach tracker",
                required: "detached tracker",
                actual: "attached".to_string(),
            });
        }
        let id = Uuid::new_v4();
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let log = self.log.clone();
        let attached = Arc::clone(&self.attached);
        let task = tokio::spawn(async move {
            debug!(tracker = %id, "Tracker attached");
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        // Keep what was already delivered.
                        loop {
                            match events.try_recv() {
                                Ok(event) => log.append(event).await,
                                Err(TryRecvError::Lagged(skipped)) => {
                                    warn!(tracker = %id, skipped, "Tracker lagged; samples lost");
                                }
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                    received = events.recv() => match received {
                        Ok(event) => log.append(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(tracker = %id, skipped, "Tracker lagged; samples lost");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            attached.store(false, Ordering::Release);
            debug!(tracker = %id, "Tracker stopped");
        });
        Ok(TrackerHandle { id, shutdown, task })
    }

    /// Stops recording. No sample is appended after this returns.
    pub async fn detach(&self, handle: TrackerHandle) -> AppResult<()> {
        // The task may already have ended on a closed channel.
        let _ = handle.shutdown.send(());
        handle
            .task
            .await
            .map_err(|e| ToroError::Session(format!("tracker task failed: {e}")))
    }
}
