//! # Kanban Reorder
//!
//! Drag-and-drop reordering for kanban boards: a position model for ordered
//! containers, a drag session tracker, a pure reorder engine that produces
//! new board snapshots with minimal write-sets, and a board session that
//! wires them to injected persistence and realtime collaborators.
//!
//! Rendering, authentication and transport are left to the caller.

pub mod config;
pub mod domain;
pub mod drag;
pub mod error;
pub mod ordering;
pub mod realtime;
pub mod reorder;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::{SessionConfig, WriteFailurePolicy};
pub use domain::{Board, BoardId, Column, ColumnId, NewTask, Task, TaskId};
pub use drag::{CommittedDrop, DragKind, DragSource, DragTracker, DropContainer, DropRegion};
pub use error::{BoardError, Result};
pub use realtime::{merge_remote_change, ChangeKind, RemoteChange, RemoteEntity};
pub use reorder::{apply_drop, Rejection, ReorderOutcome, WriteSet};
pub use session::{BoardSession, DropResult, ErrorReporter, PersistOutcome, TracingReporter};
pub use storage::Persistence;
