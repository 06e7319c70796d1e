use crate::{
    domain::{Board, BoardId, Column, ColumnId, NewTask, Task, TaskId},
    error::{BoardError, Result},
    reorder::WriteSet,
    storage::{board_ops, Persistence},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// In-process storage, handy for tests and previews.
///
/// `set_fail_writes(true)` makes every `apply_writes` call fail, which is how
/// write-failure handling is exercised without a real backend.
#[derive(Default)]
pub struct MemoryStorage {
    boards: Mutex<HashMap<BoardId, Board>>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds storage with an existing board
    pub async fn insert_board(&self, board: Board) {
        self.boards.lock().await.insert(board.id, board);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    async fn modify<T>(&self, id: BoardId, change: impl FnOnce(&mut Board) -> Result<T>) -> Result<T> {
        let mut boards = self.boards.lock().await;
        let board = boards
            .get_mut(&id)
            .ok_or_else(|| BoardError::BoardNotFound(id.to_string()))?;
        change(board)
    }
}

#[async_trait]
impl Persistence for MemoryStorage {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        true
    }

    async fn create_board(&self, board_id: BoardId, title: &str) -> Result<Board> {
        let board = Board::with_id(board_id, title);
        self.boards.lock().await.insert(board_id, board.clone());
        Ok(board)
    }

    async fn fetch_board(&self, board_id: BoardId) -> Result<Board> {
        self.boards
            .lock()
            .await
            .get(&board_id)
            .cloned()
            .ok_or_else(|| BoardError::BoardNotFound(board_id.to_string()))
    }

    async fn apply_writes(&self, board_id: BoardId, writes: &WriteSet) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BoardError::StorageError("write rejected by backend".to_string()));
        }
        self.modify(board_id, |board| {
            *board = writes.apply_to(board)?;
            Ok(())
        })
        .await
    }

    async fn create_column(&self, board_id: BoardId, title: &str, position: usize) -> Result<Column> {
        self.modify(board_id, |board| board_ops::create_column(board, title, position))
            .await
    }

    async fn delete_column(&self, board_id: BoardId, column_id: ColumnId) -> Result<()> {
        self.modify(board_id, |board| board_ops::delete_column(board, column_id))
            .await
    }

    async fn create_task(&self, board_id: BoardId, column_id: ColumnId, fields: NewTask) -> Result<Task> {
        self.modify(board_id, |board| board_ops::create_task(board, column_id, fields))
            .await
    }

    async fn delete_task(&self, board_id: BoardId, task_id: TaskId) -> Result<()> {
        self.modify(board_id, |board| board_ops::delete_task(board, task_id))
            .await
    }
}
