use crate::domain::{Board, Column, ColumnId, TaskId};
use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Kind of persisted row a write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Column,
    Task,
}

/// Partial update of the ordering fields of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<ColumnId>,
}

impl FieldPatch {
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.column_id.is_none()
    }
}

/// One field-level update for the persistence collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOp {
    pub entity: EntityKind,
    pub id: Uuid,
    pub fields: FieldPatch,
}

impl WriteOp {
    pub fn column_position(id: ColumnId, position: usize) -> Self {
        Self {
            entity: EntityKind::Column,
            id: id.as_uuid(),
            fields: FieldPatch {
                position: Some(position),
                column_id: None,
            },
        }
    }

    pub fn task(id: TaskId, fields: FieldPatch) -> Self {
        Self {
            entity: EntityKind::Task,
            id: id.as_uuid(),
            fields,
        }
    }
}

/// Ordered list of writes that brings persisted state in line with a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteSet(Vec<WriteOp>);

impl WriteSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, op: WriteOp) {
        if !op.fields.is_empty() {
            self.0.push(op);
        }
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WriteOp> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extend(&mut self, other: WriteSet) {
        self.0.extend(other.0);
    }

    /// Minimal writes turning `before` into `after`.
    ///
    /// Columns still shared between both snapshots are skipped without
    /// looking at their tasks. Tasks that disappeared produce no write;
    /// deletions go through the storage CRUD calls.
    pub fn diff(before: &Board, after: &Board) -> Self {
        let mut writes = Self::new();
        let before_columns: HashMap<ColumnId, (usize, &Arc<Column>)> = before
            .columns
            .iter()
            .map(|column| (column.id, (column.position, column)))
            .collect();

        for column in &after.columns {
            if before_columns.get(&column.id).map(|(position, _)| *position) != Some(column.position) {
                writes.push(WriteOp::column_position(column.id, column.position));
            }
        }

        let changed: Vec<&Arc<Column>> = after
            .columns
            .iter()
            .filter(|column| match before_columns.get(&column.id) {
                Some((_, previous)) => !Arc::ptr_eq(previous, column),
                None => true,
            })
            .collect();
        if changed.is_empty() {
            return writes;
        }

        let before_tasks: HashMap<TaskId, (ColumnId, usize)> = changed
            .iter()
            .filter_map(|column| before_columns.get(&column.id).map(|(_, previous)| *previous))
            .chain(
                // Tasks of removed columns may have been handed to another column
                before
                    .columns
                    .iter()
                    .filter(|column| after.column(column.id).is_none()),
            )
            .flat_map(|column| column.tasks.iter())
            .map(|task| (task.id, (task.column_id, task.position)))
            .collect();

        for column in changed {
            for task in &column.tasks {
                let patch = match before_tasks.get(&task.id) {
                    Some((column_id, position)) if *column_id == task.column_id => FieldPatch {
                        position: (*position != task.position).then_some(task.position),
                        column_id: None,
                    },
                    // New or moved in from another column: its row needs both fields
                    _ => FieldPatch {
                        position: Some(task.position),
                        column_id: Some(task.column_id),
                    },
                };
                writes.push(WriteOp::task(task.id, patch));
            }
        }
        writes
    }

    /// Full positional dump of a board
    pub fn snapshot(board: &Board) -> Self {
        let mut writes = Self::new();
        for column in &board.columns {
            writes.push(WriteOp::column_position(column.id, column.position));
            for task in &column.tasks {
                writes.push(WriteOp::task(
                    task.id,
                    FieldPatch {
                        position: Some(task.position),
                        column_id: Some(task.column_id),
                    },
                ));
            }
        }
        writes
    }

    /// Replays the writes onto a copy of `board` and restores sequence order
    /// from the resulting positions.
    pub fn apply_to(&self, board: &Board) -> Result<Board> {
        let mut board = board.clone();
        for op in &self.0 {
            match op.entity {
                EntityKind::Column => {
                    let id = ColumnId::from_uuid(op.id);
                    let column = board
                        .column_mut(id)
                        .ok_or_else(|| BoardError::ColumnNotFound(id.to_string()))?;
                    if let Some(position) = op.fields.position {
                        column.position = position;
                    }
                }
                EntityKind::Task => apply_task_write(&mut board, TaskId::from_uuid(op.id), op.fields)?,
            }
        }
        board.sort_by_position();
        Ok(board)
    }
}

impl<'a> IntoIterator for &'a WriteSet {
    type Item = &'a WriteOp;
    type IntoIter = std::slice::Iter<'a, WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<WriteOp>> for WriteSet {
    fn from(ops: Vec<WriteOp>) -> Self {
        let mut writes = Self::new();
        for op in ops {
            writes.push(op);
        }
        writes
    }
}

fn apply_task_write(board: &mut Board, id: TaskId, fields: FieldPatch) -> Result<()> {
    let (column_index, task_index) = board
        .locate_task(id)
        .ok_or_else(|| BoardError::TaskNotFound(id.to_string()))?;
    let current_column = board.columns[column_index].id;
    let target_column = fields.column_id.unwrap_or(current_column);

    if target_column == current_column {
        if let Some(position) = fields.position {
            Arc::make_mut(&mut board.columns[column_index]).tasks[task_index].position = position;
        }
        return Ok(());
    }

    if board.column(target_column).is_none() {
        return Err(BoardError::ColumnNotFound(target_column.to_string()));
    }
    let mut task = Arc::make_mut(&mut board.columns[column_index])
        .tasks
        .remove(task_index);
    let position = fields.position.unwrap_or(task.position);
    task.place(target_column, position);
    if let Some(column) = board.column_mut(target_column) {
        column.tasks.push(task);
    }
    Ok(())
}
