use crate::{
    domain::{Board, BoardId, Column, ColumnId, NewTask, Task, TaskId},
    error::{BoardError, Result},
    reorder::WriteSet,
    storage::{board_ops, Persistence},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::debug;

/// File-based storage keeping one JSON document per board
pub struct FileStorage {
    root_path: PathBuf,
    // Held for every board file access so readers never see a half-written file
    write_lock: Mutex<()>,
}

impl FileStorage {
    const DATA_DIR: &'static str = ".kanban";
    const BOARDS_DIR: &'static str = "boards";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::DATA_DIR),
            write_lock: Mutex::new(()),
        }
    }

    fn boards_dir(&self) -> PathBuf {
        self.root_path.join(Self::BOARDS_DIR)
    }

    fn board_file(&self, id: BoardId) -> PathBuf {
        self.boards_dir().join(format!("{}.json", id))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn load(&self, id: BoardId) -> Result<Board> {
        let file_path = self.board_file(id);

        if !file_path.exists() {
            return Err(BoardError::BoardNotFound(id.to_string()));
        }

        let contents = fs::read_to_string(&file_path).await?;
        let mut board: Board = serde_json::from_str(&contents)?;
        board.sort_by_position();

        Ok(board)
    }

    async fn save(&self, board: &Board) -> Result<()> {
        self.ensure_directory_exists(&self.boards_dir()).await?;

        let json = serde_json::to_string_pretty(board)?;
        fs::write(self.board_file(board.id), json).await?;
        Ok(())
    }

    /// Loads a board, applies `change` and writes it back under the lock
    async fn modify<T: Send>(
        &self,
        id: BoardId,
        change: impl FnOnce(&mut Board) -> Result<T> + Send,
    ) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut board = self.load(id).await?;
        let value = change(&mut board)?;
        self.save(&board).await?;
        Ok(value)
    }
}

#[async_trait]
impl Persistence for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.boards_dir()).await?;
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.boards_dir().exists()
    }

    async fn create_board(&self, board_id: BoardId, title: &str) -> Result<Board> {
        let _guard = self.write_lock.lock().await;
        let board = Board::with_id(board_id, title);
        self.save(&board).await?;
        debug!(board = %board_id, "board created");
        Ok(board)
    }

    async fn fetch_board(&self, board_id: BoardId) -> Result<Board> {
        let _guard = self.write_lock.lock().await;
        self.load(board_id).await
    }

    async fn apply_writes(&self, board_id: BoardId, writes: &WriteSet) -> Result<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reorder::{FieldPatch, WriteOp};
    use tempfile::TempDir;

    async fn storage_with_board() -> (TempDir, FileStorage, BoardId) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.initialize().await.unwrap();
        let board_id = BoardId::new();
        storage.create_board(board_id, "Sprint").await.unwrap();
        (temp_dir, storage, board_id)
    }

    #[tokio::test]
    async fn test_storage_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        assert!(!storage.is_initialized().await);

        storage.initialize().await.unwrap();

        assert!(storage.is_initialized().await);
        assert!(storage.boards_dir().exists());
    }

    #[tokio::test]
    async fn test_missing_board() {
        let (_temp_dir, storage, _) = storage_with_board().await;
        let result = storage.fetch_board(BoardId::new()).await;
        assert!(matches!(result, Err(BoardError::BoardNotFound(_))));
    }

    #[tokio::test]
    async fn test_columns_and_tasks_persist() {
        let (_temp_dir, storage, board_id) = storage_with_board().await;

        let todo = storage.create_column(board_id, "To Do", 0).await.unwrap();
        let done = storage.create_column(board_id, "Done", 1).await.unwrap();
        let backlog = storage.create_column(board_id, "Backlog", 0).await.unwrap();
        assert_eq!(backlog.position, 0);

        let task = storage
            .create_task(board_id, todo.id, NewTask::new("Write tests"))
            .await
            .unwrap();
        assert_eq!(task.position, 0);

        let board = storage.fetch_board(board_id).await.unwrap();
        let titles: Vec<_> = board.columns.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Backlog", "To Do", "Done"]);
        assert_eq!(board.column(todo.id).unwrap().tasks[0].title, "Write tests");
        assert!(board.column(done.id).unwrap().is_empty());
        assert!(board.verify_positions().is_ok());
    }

    #[tokio::test]
    async fn test_apply_writes_moves_task() {
        let (_temp_dir, storage, board_id) = storage_with_board().await;
        let todo = storage.create_column(board_id, "To Do", 0).await.unwrap();
        let done = storage.create_column(board_id, "Done", 1).await.unwrap();
        let task = storage
            .create_task(board_id, todo.id, NewTask::new("Ship"))
            .await
            .unwrap();

        let writes = WriteSet::from(vec![WriteOp::task(
            task.id,
            FieldPatch {
                position: Some(0),
                column_id: Some(done.id),
            },
        )]);
        storage.apply_writes(board_id, &writes).await.unwrap();

        let board = storage.fetch_board(board_id).await.unwrap();
        assert!(board.column(todo.id).unwrap().is_empty());
        assert_eq!(board.column(done.id).unwrap().tasks[0].id, task.id);
    }

    #[tokio::test]
    async fn test_delete_column_and_task() {
        let (_temp_dir, storage, board_id) = storage_with_board().await;
        let todo = storage.create_column(board_id, "To Do", 0).await.unwrap();
        let task = storage
            .create_task(board_id, todo.id, NewTask::new("Gone soon"))
            .await
            .unwrap();

        storage.delete_task(board_id, task.id).await.unwrap();
        assert!(matches!(
            storage.delete_task(board_id, task.id).await,
            Err(BoardError::TaskNotFound(_))
        ));

        storage.delete_column(board_id, todo.id).await.unwrap();
        let board = storage.fetch_board(board_id).await.unwrap();
        assert!(board.columns.is_empty());
    }
}
