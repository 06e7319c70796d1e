use crate::domain::ids::{BoardId, ColumnId, TaskId};
use crate::domain::task::Task;
use crate::error::{BoardError, Result};
use crate::ordering::{renumber, verify_contiguous};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Column fields without its tasks, as exchanged with storage and realtime feeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub id: ColumnId,
    pub board_id: BoardId,
    pub title: String,
    pub position: usize,
}

/// An ordered container of tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    pub position: usize,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Column {
    pub fn new(title: impl Into<String>, position: usize) -> Self {
        Self {
            id: ColumnId::new(),
            title: title.into(),
            position,
            tasks: Vec::new(),
        }
    }

    /// Builds an empty column from its record
    pub fn from_record(record: ColumnRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            position: record.position,
            tasks: Vec::new(),
        }
    }

    /// Returns the task-less view of this column
    pub fn record(&self, board_id: BoardId) -> ColumnRecord {
        ColumnRecord {
            id: self.id,
            board_id,
            title: self.title.clone(),
            position: self.position,
        }
    }

    /// Appends a task titled `title` at the end of the column
    pub fn push_task(&mut self, title: impl Into<String>) -> &Task {
        let task = Task::new(self.id, self.tasks.len(), title);
        self.tasks.push(task);
        &self.tasks[self.tasks.len() - 1]
    }

    pub fn task_index(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Root aggregate owning an ordered sequence of columns.
///
/// Columns are shared behind `Arc`, so cloning a board is cheap and a change
/// to one column copies only that column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    #[serde(default)]
    pub columns: Vec<Arc<Column>>,
}

impl Board {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(BoardId::new(), title)
    }

    pub fn with_id(id: BoardId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column titled `title` at the right end of the board
    pub fn push_column(&mut self, title: impl Into<String>) -> ColumnId {
        let column = Column::new(title, self.columns.len());
        let id = column.id;
        self.columns.push(Arc::new(column));
        id
    }

    /// Inserts an existing column at its recorded position, clamped to the end, and renumbers
    pub fn insert_column(&mut self, column: Column) {
        let index = column.position.min(self.columns.len());
        self.columns.insert(index, Arc::new(column));
        renumber(&mut self.columns);
    }

    /// Removes a column and closes the gap it leaves behind
    pub fn remove_column(&mut self, id: ColumnId) -> Option<Arc<Column>> {
        let index = self.column_index(id)?;
        let removed = self.columns.remove(index);
        renumber(&mut self.columns);
        Some(removed)
    }

    pub fn column_index(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|column| column.id == id)
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.id == id)
            .map(|column| column.as_ref())
    }

    /// Mutable access to one column, copying it first if it is shared
    pub fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|column| column.id == id)
            .map(Arc::make_mut)
    }

    /// Locates a task as `(column index, task index)`
    pub fn locate_task(&self, id: TaskId) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(column_index, column)| {
            column
                .task_index(id)
                .map(|task_index| (column_index, task_index))
        })
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.locate_task(id)
            .map(|(column_index, task_index)| &self.columns[column_index].tasks[task_index])
    }

    /// Removes a task from whichever column holds it and renumbers that column
    pub fn remove_task(&mut self, id: TaskId) -> Option<Task> {
        let (column_index, task_index) = self.locate_task(id)?;
        let column = Arc::make_mut(&mut self.columns[column_index]);
        let task = column.tasks.remove(task_index);
        renumber(&mut column.tasks);
        Some(task)
    }

    /// Total number of tasks across all columns
    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|column| column.tasks.len()).sum()
    }

    /// Restores sequence order from stored positions, as loaded from storage
    pub fn sort_by_position(&mut self) {
        self.columns.sort_by_key(|column| column.position);
        for column in self.columns.iter_mut() {
            if column.tasks.windows(2).any(|w| w[0].position > w[1].position) {
                Arc::make_mut(column).tasks.sort_by_key(|task| task.position);
            }
        }
    }

    /// Checks contiguity of columns and of every column's tasks
    pub fn verify_positions(&self) -> Result<()> {
        verify_contiguous(&self.columns, format!("board {}", self.id))?;
        for column in &self.columns {
            verify_contiguous(&column.tasks, format!("column {}", column.id))?;
            if let Some(task) = column.tasks.iter().find(|task| task.column_id != column.id) {
                return Err(BoardError::InvariantViolation {
                    container: format!("column {}", column.id),
                    detail: format!("task {} points at column {}", task.id, task.column_id),
                });
            }
        }
        Ok(())
    }
}
