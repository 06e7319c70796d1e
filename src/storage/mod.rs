use crate::{
    domain::{Board, BoardId, Column, ColumnId, NewTask, Task, TaskId},
    error::Result,
    reorder::WriteSet,
};
use async_trait::async_trait;

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;

/// Persistence collaborator for boards, columns and tasks
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Prepares the backend for use
    async fn initialize(&self) -> Result<()>;

    /// Checks if the backend is ready
    async fn is_initialized(&self) -> bool;

    /// Creates an empty board with a known id
    async fn create_board(&self, board_id: BoardId, title: &str) -> Result<Board>;

    /// Loads a board with columns and tasks ordered by position
    async fn fetch_board(&self, board_id: BoardId) -> Result<Board>;

    /// Applies a batch of field-level updates
    async fn apply_writes(&self, board_id: BoardId, writes: &WriteSet) -> Result<()>;

    /// Creates a column at the given position
    async fn create_column(&self, board_id: BoardId, title: &str, position: usize) -> Result<Column>;

    /// Deletes a column along with its tasks
    async fn delete_column(&self, board_id: BoardId, column_id: ColumnId) -> Result<()>;

    /// Creates a task at the end of a column
    async fn create_task(&self, board_id: BoardId, column_id: ColumnId, fields: NewTask) -> Result<Task>;

    /// Deletes a task
    async fn delete_task(&self, board_id: BoardId, task_id: TaskId) -> Result<()>;
}

/// Board mutations shared by the bundled backends, which keep whole boards
/// and replay every call onto them.
pub(crate) mod board_ops {
    use super::*;
    use crate::error::BoardError;

    pub fn create_column(board: &mut Board, title: &str, position: usize) -> Result<Column> {
        let column = Column::new(title, position);
        let id = column.id;
        board.insert_column(column);
        board
            .column(id)
            .cloned()
            .ok_or_else(|| BoardError::ColumnNotFound(id.to_string()))
    }

    pub fn delete_column(board: &mut Board, column_id: ColumnId) -> Result<()> {
        board
            .remove_column(column_id)
            .map(|_| ())
            .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))
    }

    pub fn create_task(board: &mut Board, column_id: ColumnId, fields: NewTask) -> Result<Task> {
        let column = board
            .column_mut(column_id)
            .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))?;
        let task = Task::from_new(column_id, column.tasks.len(), fields);
        column.tasks.push(task.clone());
        Ok(task)
    }

    pub fn delete_task(board: &mut Board, task_id: TaskId) -> Result<()> {
        board
            .remove_task(task_id)
            .map(|_| ())
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))
    }
}
