//! Board session: the caller side of the reorder engine.
//!
//! A session owns the current snapshot, the drag tracker and the queue of
//! remote changes deferred while a drag is in flight. The snapshot is only
//! ever replaced wholesale, so readers holding an `Arc<Board>` never observe
//! a partial update. Persistence is injected, never reached globally.

use crate::config::{SessionConfig, WriteFailurePolicy};
use crate::domain::{Board, BoardId, ColumnId, NewTask, TaskId};
use crate::drag::{DragSource, DragState, DragTracker, DropRegion, DropTarget, Point};
use crate::error::{BoardError, Result};
use crate::realtime::{merge_remote_change, IgnoreReason, MergeOutcome, RemoteChange};
use crate::reorder::{apply_drop, Rejection, ReorderOutcome, Reordered, WriteSet};
use crate::storage::Persistence;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Context for a write batch the backend refused
#[derive(Debug, Clone)]
pub struct WriteFailure {
    pub board_id: BoardId,
    pub writes: WriteSet,
    pub error: String,
}

/// Receives persistence failures so they can be surfaced to the user
pub trait ErrorReporter: Send + Sync {
    fn report_write_failure(&self, failure: &WriteFailure);
}

/// Reporter that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report_write_failure(&self, failure: &WriteFailure) {
        for op in failure.writes.iter() {
            error!(
                board = %failure.board_id,
                entity = ?op.entity,
                id = %op.id,
                fields = ?op.fields,
                error = %failure.error,
                "failed to save"
            );
        }
    }
}

/// An optimistic change waiting to be persisted
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub writes: WriteSet,
    /// Snapshot before the change
    pub original: Arc<Board>,
    /// Snapshot the change produced
    pub applied: Arc<Board>,
}

/// Result of releasing the pointer
#[derive(Debug, Clone)]
pub enum DropResult {
    /// The snapshot was updated; the change still needs persisting
    Committed(PendingChange),
    /// The drop was refused; the item snaps back
    Rejected(Rejection),
    /// No drop target, or the drag was never started
    Cancelled,
}

/// Result of persisting a pending change
#[derive(Debug, Clone)]
pub enum PersistOutcome {
    Applied,
    /// Reported; the optimistic snapshot stays in place
    Failed(WriteFailure),
    /// Reported and the previous snapshot was restored
    RolledBack { original: Arc<Board> },
}

/// What happened to a remote change handed to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDisposition {
    Merged,
    /// Targets the dragged item; merged once the drag ends
    Deferred,
    Ignored(IgnoreReason),
}

pub struct BoardSession<P: Persistence> {
    persistence: Arc<P>,
    reporter: Arc<dyn ErrorReporter>,
    config: SessionConfig,
    tracker: DragTracker,
    snapshot: Arc<Board>,
    board_sender: watch::Sender<Arc<Board>>,
    deferred: VecDeque<RemoteChange>,
}

impl<P: Persistence> BoardSession<P> {
    pub fn new(
        board: Board,
        persistence: Arc<P>,
        reporter: Arc<dyn ErrorReporter>,
        config: SessionConfig,
    ) -> Self {
        let snapshot = Arc::new(board);
        let (board_sender, _) = watch::channel(Arc::clone(&snapshot));
        Self {
            persistence,
            reporter,
            tracker: DragTracker::new(config.drag_threshold_px),
            config,
            snapshot,
            board_sender,
            deferred: VecDeque::new(),
        }
    }

    /// Loads a board from storage
    pub async fn open(
        persistence: Arc<P>,
        board_id: BoardId,
        reporter: Arc<dyn ErrorReporter>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let board = persistence.fetch_board(board_id).await?;
        info!(board = %board_id, columns = board.columns.len(), "board opened");
        Ok(Self::new(board, persistence, reporter, config))
    }

    /// Loads a board, creating it on first visit
    pub async fn open_or_create(
        persistence: Arc<P>,
        board_id: BoardId,
        title: &str,
        reporter: Arc<dyn ErrorReporter>,
        config: SessionConfig,
    ) -> Result<Self> {
        match Self::open(Arc::clone(&persistence), board_id, Arc::clone(&reporter), config.clone()).await {
            Err(BoardError::BoardNotFound(_)) => {
                let board = persistence.create_board(board_id, title).await?;
                info!(board = %board_id, "board created on first visit");
                Ok(Self::new(board, persistence, reporter, config))
            }
            other => other,
        }
    }

    pub fn snapshot(&self) -> Arc<Board> {
        Arc::clone(&self.snapshot)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Receiver notified whenever the snapshot is replaced
    pub fn subscribe_board(&self) -> watch::Receiver<Arc<Board>> {
        self.board_sender.subscribe()
    }

    /// Receiver notified on every drag state transition
    pub fn subscribe_drag(&self) -> watch::Receiver<DragState> {
        self.tracker.subscribe()
    }

    pub fn drag_state(&self) -> &DragState {
        self.tracker.state()
    }

    /// Number of remote changes waiting for the current drag to end
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Drag source describing the column's current slot
    pub fn column_source(&self, id: ColumnId) -> Option<DragSource> {
        self.snapshot
            .column_index(id)
            .map(|index| DragSource::Column { id, index })
    }

    /// Drag source describing the task's current slot
    pub fn task_source(&self, id: TaskId) -> Option<DragSource> {
        let (column_index, index) = self.snapshot.locate_task(id)?;
        Some(DragSource::Task {
            id,
            column_id: self.snapshot.columns[column_index].id,
            index,
        })
    }

    pub fn press(&mut self, source: DragSource, origin: Point) -> Result<()> {
        self.tracker.press(source, origin)
    }

    pub fn pointer_moved(&mut self, position: Point) -> bool {
        self.tracker.pointer_moved(position)
    }

    pub fn begin_drag(&mut self, source: DragSource) -> Result<()> {
        self.tracker.begin(source)
    }

    pub fn hover(&mut self, region: DropRegion, pointer_y: f64) -> Option<DropTarget> {
        self.tracker.hover(region, pointer_y)
    }

    pub fn leave(&mut self) {
        self.tracker.leave();
    }

    /// Abandons the drag with no mutation and no persistence call
    pub fn cancel_drag(&mut self) {
        self.tracker.cancel();
        self.drain_deferred();
    }

    /// Ends the gesture, applying the drop to the snapshot optimistically
    pub fn release(&mut self) -> DropResult {
        let result = match self.tracker.release() {
            None => DropResult::Cancelled,
            Some(drop) => match apply_drop(&self.snapshot, &drop) {
                ReorderOutcome::Applied(Reordered { board, writes }) => {
                    let original = Arc::clone(&self.snapshot);
                    self.install(board);
                    DropResult::Committed(PendingChange {
                        writes,
                        original,
                        applied: Arc::clone(&self.snapshot),
                    })
                }
                ReorderOutcome::Rejected(rejection) => {
                    if let Rejection::StaleReference { kind, id } = rejection {
                        warn!(?kind, %id, "drop refers to an item that is gone; refresh the board");
                    }
                    DropResult::Rejected(rejection)
                }
            },
        };
        self.drain_deferred();
        result
    }

    /// Issues the writes of a pending change.
    ///
    /// Failures go to the error reporter. The snapshot is rolled back only
    /// under [`WriteFailurePolicy::Rollback`] and only if nothing replaced it
    /// since the change was applied.
    pub async fn persist(&mut self, change: PendingChange) -> PersistOutcome {
        let Err(failure) = self.write_through(change.writes).await else {
            return PersistOutcome::Applied;
        };
        let board_id = failure.board_id;
        match self.config.write_failure_policy {
            WriteFailurePolicy::Rollback if Arc::ptr_eq(&self.snapshot, &change.applied) => {
                warn!(board = %board_id, "rolling back unsaved change");
                self.install_arc(Arc::clone(&change.original));
                PersistOutcome::RolledBack {
                    original: change.original,
                }
            }
            WriteFailurePolicy::Rollback => {
                warn!(board = %board_id, "snapshot changed since the failed write; keeping it");
                PersistOutcome::Failed(failure)
            }
            WriteFailurePolicy::KeepOptimistic => PersistOutcome::Failed(failure),
        }
    }

    /// Sends a write batch to storage, reporting a refusal
    async fn write_through(&self, writes: WriteSet) -> std::result::Result<(), WriteFailure> {
        if writes.is_empty() {
            return Ok(());
        }
        let board_id = self.snapshot.id;
        match self.persistence.apply_writes(board_id, &writes).await {
            Ok(()) => {
                debug!(board = %board_id, writes = writes.len(), "writes persisted");
                Ok(())
            }
            Err(err) => {
                let failure = WriteFailure {
                    board_id,
                    writes,
                    error: err.to_string(),
                };
                self.reporter.report_write_failure(&failure);
                Err(failure)
            }
        }
    }

    /// Handles a change pushed by another actor
    pub fn on_remote_change(&mut self, change: RemoteChange) -> RemoteDisposition {
        if let Some(source) = self.tracker.state().source() {
            if change.touches(source) {
                debug!(id = %change.entity_id(), "remote change deferred until drag ends");
                self.deferred.push_back(change);
                return RemoteDisposition::Deferred;
            }
        }
        self.merge(&change)
    }

    /// Re-fetches the board, discarding deferred remote changes
    pub async fn refresh(&mut self) -> Result<()> {
        let board = self.persistence.fetch_board(self.snapshot.id).await?;
        self.deferred.clear();
        self.install(board);
        Ok(())
    }

    /// Appends a column at the right end of the board
    pub async fn add_column(&mut self, title: &str) -> Result<ColumnId> {
        let position = self.snapshot.columns.len();
        self.insert_column(title, position).await
    }

    /// Creates a column at `position`, shifting later columns right
    pub async fn insert_column(&mut self, title: &str, position: usize) -> Result<ColumnId> {
        let column = self
            .persistence
            .create_column(self.snapshot.id, title, position)
            .await?;
        let id = column.id;
        let mut next = Board::clone(&self.snapshot);
        next.insert_column(column);
        self.commit_structural(next).await?;
        Ok(id)
    }

    /// Deletes a column and its tasks, closing the gap
    pub async fn remove_column(&mut self, id: ColumnId) -> Result<()> {
        if self.snapshot.column(id).is_none() {
            return Err(BoardError::ColumnNotFound(id.to_string()));
        }
        self.persistence.delete_column(self.snapshot.id, id).await?;
        let mut next = Board::clone(&self.snapshot);
        next.remove_column(id);
        self.commit_structural(next).await?;
        Ok(())
    }

    /// Appends a task to a column
    pub async fn add_task(&mut self, column_id: ColumnId, fields: NewTask) -> Result<TaskId> {
        if self.snapshot.column(column_id).is_none() {
            return Err(BoardError::ColumnNotFound(column_id.to_string()));
        }
        let mut task = self
            .persistence
            .create_task(self.snapshot.id, column_id, fields)
            .await?;
        let id = task.id;
        let mut next = Board::clone(&self.snapshot);
        if let Some(column) = next.column_mut(column_id) {
            task.position = column.tasks.len();
            column.tasks.push(task);
        }
        self.commit_structural(next).await?;
        Ok(id)
    }

    /// Deletes a task, closing the gap in its column
    pub async fn remove_task(&mut self, id: TaskId) -> Result<()> {
        if self.snapshot.task(id).is_none() {
            return Err(BoardError::TaskNotFound(id.to_string()));
        }
        self.persistence.delete_task(self.snapshot.id, id).await?;
        let mut next = Board::clone(&self.snapshot);
        next.remove_task(id);
        self.commit_structural(next).await?;
        Ok(())
    }

    /// Installs a board produced by a CRUD call and persists the positions it shifted.
    ///
    /// The CRUD call itself already reached storage, so a failed position
    /// write never restores the snapshot from before it. Under
    /// [`WriteFailurePolicy::Rollback`] the board is re-read from storage
    /// instead.
    async fn commit_structural(&mut self, next: Board) -> Result<()> {
        let writes = WriteSet::diff(&self.snapshot, &next);
        self.install(next);
        if self.write_through(writes).await.is_ok() {
            return Ok(());
        }
        if self.config.write_failure_policy == WriteFailurePolicy::Rollback {
            warn!(board = %self.snapshot.id, "position writes failed; reloading the stored board");
            let board = self.persistence.fetch_board(self.snapshot.id).await?;
            self.install(board);
        }
        Ok(())
    }

    fn merge(&mut self, change: &RemoteChange) -> RemoteDisposition {
        match merge_remote_change(&self.snapshot, change) {
            MergeOutcome::Merged(board) => {
                self.install(board);
                RemoteDisposition::Merged
            }
            MergeOutcome::Ignored(reason) => RemoteDisposition::Ignored(reason),
        }
    }

    fn drain_deferred(&mut self) {
        while let Some(change) = self.deferred.pop_front() {
            self.merge(&change);
        }
    }

    fn install(&mut self, board: Board) {
        self.install_arc(Arc::new(board));
    }

    fn install_arc(&mut self, board: Arc<Board>) {
        self.snapshot = board;
        self.board_sender.send_replace(Arc::clone(&self.snapshot));
    }
}
