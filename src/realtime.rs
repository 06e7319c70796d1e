//! Remote change notifications.
//!
//! The transport lives elsewhere; this module defines the event shape and
//! how an event is merged into a board snapshot. Merging is last-write-wins
//! and always leaves positions contiguous.

use crate::domain::{Board, Column, ColumnId, ColumnRecord, Task};
use crate::drag::DragSource;
use crate::ordering::renumber;
use crate::reorder::EntityKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Row carried by a remote change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "row", rename_all = "lowercase")]
pub enum RemoteEntity {
    Column(ColumnRecord),
    Task(Task),
}

/// A change pushed by another actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChange {
    pub kind: ChangeKind,
    pub entity: RemoteEntity,
}

impl RemoteChange {
    pub fn new(kind: ChangeKind, entity: RemoteEntity) -> Self {
        Self { kind, entity }
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self.entity {
            RemoteEntity::Column(_) => EntityKind::Column,
            RemoteEntity::Task(_) => EntityKind::Task,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match &self.entity {
            RemoteEntity::Column(record) => record.id.as_uuid(),
            RemoteEntity::Task(task) => task.id.as_uuid(),
        }
    }

    /// True if the change targets the item being dragged. Such changes must
    /// wait until the drag commits or cancels.
    pub fn touches(&self, source: &DragSource) -> bool {
        match (&self.entity, *source) {
            (RemoteEntity::Column(record), DragSource::Column { id, .. }) => record.id == id,
            (RemoteEntity::Task(task), DragSource::Task { id, .. }) => task.id == id,
            _ => false,
        }
    }
}

/// Why a remote change was not merged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OtherBoard,
    UnknownColumn(ColumnId),
    UnknownEntity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Merged(Board),
    Ignored(IgnoreReason),
}

/// Merges one remote change into a copy of `board`
pub fn merge_remote_change(board: &Board, change: &RemoteChange) -> MergeOutcome {
    let outcome = match (&change.entity, change.kind) {
        (RemoteEntity::Column(record), ChangeKind::Delete) => {
            let mut next = board.clone();
            match next.remove_column(record.id) {
                Some(_) => MergeOutcome::Merged(next),
                None => MergeOutcome::Ignored(IgnoreReason::UnknownEntity),
            }
        }
        (RemoteEntity::Column(record), _) => upsert_column(board, record),
        (RemoteEntity::Task(task), ChangeKind::Delete) => {
            let mut next = board.clone();
            match next.remove_task(task.id) {
                Some(_) => MergeOutcome::Merged(next),
                None => MergeOutcome::Ignored(IgnoreReason::UnknownEntity),
            }
        }
        (RemoteEntity::Task(task), _) => upsert_task(board, task),
    };

    match &outcome {
        MergeOutcome::Merged(_) => debug!(
            kind = ?change.kind,
            entity = ?change.entity_kind(),
            id = %change.entity_id(),
            "remote change merged"
        ),
        MergeOutcome::Ignored(reason) => warn!(
            kind = ?change.kind,
            entity = ?change.entity_kind(),
            id = %change.entity_id(),
            ?reason,
            "remote change ignored"
        ),
    }
    outcome
}

fn upsert_column(board: &Board, record: &ColumnRecord) -> MergeOutcome {
    if record.board_id != board.id {
        return MergeOutcome::Ignored(IgnoreReason::OtherBoard);
    }
    let mut next = board.clone();
    match next.column_index(record.id) {
        Some(index) => {
            let mut column = next.columns.remove(index);
            if column.title != record.title {
                Arc::make_mut(&mut column).title = record.title.clone();
            }
            let target = record.position.min(next.columns.len());
            next.columns.insert(target, column);
            renumber(&mut next.columns);
        }
        None => next.insert_column(Column::from_record(record.clone())),
    }
    MergeOutcome::Merged(next)
}

fn upsert_task(board: &Board, task: &Task) -> MergeOutcome {
    if board.column(task.column_id).is_none() {
        return MergeOutcome::Ignored(IgnoreReason::UnknownColumn(task.column_id));
    }
    let mut next = board.clone();
    next.remove_task(task.id);
    if let Some(column) = next.column_mut(task.column_id) {
        let target = task.position.min(column.tasks.len());
        column.tasks.insert(target, task.clone());
        renumber(&mut column.tasks);
    }
    MergeOutcome::Merged(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;

    fn sample_board() -> Board {
        let mut board = Board::new("Board");
        let todo = board.push_column("To Do");
        board.push_column("Done");
        let column = board.column_mut(todo).unwrap();
        column.push_task("T1");
        column.push_task("T2");
        column.push_task("T3");
        board
    }

    fn merged(outcome: MergeOutcome) -> Board {
        match outcome {
            MergeOutcome::Merged(board) => board,
            MergeOutcome::Ignored(reason) => panic!("change ignored: {:?}", reason),
        }
    }

    #[test]
    fn test_remote_task_update_moves_task() {
        let board = sample_board();
        let mut task = board.columns[0].tasks[2].clone();
        task.position = 0;
        task.title = "T3 renamed".to_string();

        let next = merged(merge_remote_change(
            &board,
            &RemoteChange::new(ChangeKind::Update, RemoteEntity::Task(task)),
        ));
        let titles: Vec<_> = next.columns[0].tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["T3 renamed", "T1", "T2"]);
        assert!(next.verify_positions().is_ok());
    }

    #[test]
    fn test_remote_task_insert_into_other_column() {
        let board = sample_board();
        let done = board.columns[1].id;
        let task = Task::new(done, 7, "Remote");

        let next = merged(merge_remote_change(
            &board,
            &RemoteChange::new(ChangeKind::Insert, RemoteEntity::Task(task)),
        ));
        assert_eq!(next.columns[1].tasks.len(), 1);
        assert_eq!(next.columns[1].tasks[0].position, 0);
    }

    #[test]
    fn test_remote_task_for_unknown_column_is_ignored() {
        let board = sample_board();
        let column = ColumnId::new();
        let task = Task::new(column, 0, "Orphan");
        assert_eq!(
            merge_remote_change(&board, &RemoteChange::new(ChangeKind::Insert, RemoteEntity::Task(task))),
            MergeOutcome::Ignored(IgnoreReason::UnknownColumn(column))
        );
    }

    #[test]
    fn test_remote_delete_renumbers() {
        let board = sample_board();
        let task = board.columns[0].tasks[0].clone();
        let next = merged(merge_remote_change(
            &board,
            &RemoteChange::new(ChangeKind::Delete, RemoteEntity::Task(task)),
        ));
        assert_eq!(next.columns[0].tasks.len(), 2);
        assert!(next.verify_positions().is_ok());

        let missing = Task::new(board.columns[0].id, 0, "Missing");
        assert_eq!(
            merge_remote_change(&board, &RemoteChange::new(ChangeKind::Delete, RemoteEntity::Task(missing))),
            MergeOutcome::Ignored(IgnoreReason::UnknownEntity)
        );
    }

    #[test]
    fn test_remote_column_reorder_and_insert() {
        let board = sample_board();
        let mut record = board.columns[1].record(board.id);
        record.position = 0;
        let next = merged(merge_remote_change(
            &board,
            &RemoteChange::new(ChangeKind::Update, RemoteEntity::Column(record)),
        ));
        assert_eq!(next.columns[0].title, "Done");
        assert_eq!(next.columns[1].tasks.len(), 3);

        let record = ColumnRecord {
            id: ColumnId::new(),
            board_id: board.id,
            title: "Review".to_string(),
            position: 1,
        };
        let next = merged(merge_remote_change(
            &next,
            &RemoteChange::new(ChangeKind::Insert, RemoteEntity::Column(record)),
        ));
        assert_eq!(next.columns[1].title, "Review");
        assert!(next.verify_positions().is_ok());
    }

    #[test]
    fn test_remote_column_for_other_board_is_ignored() {
        let board = sample_board();
        let record = ColumnRecord {
            id: ColumnId::new(),
            board_id: crate::domain::BoardId::new(),
            title: "Elsewhere".to_string(),
            position: 0,
        };
        assert_eq!(
            merge_remote_change(&board, &RemoteChange::new(ChangeKind::Insert, RemoteEntity::Column(record))),
            MergeOutcome::Ignored(IgnoreReason::OtherBoard)
        );
    }

    #[test]
    fn test_touches_only_the_dragged_entity() {
        let board = sample_board();
        let column = board.columns[0].id;
        let dragged = board.columns[0].tasks[0].clone();
        let sibling = board.columns[0].tasks[1].clone();
        let source = DragSource::Task {
            id: dragged.id,
            column_id: column,
            index: 0,
        };

        assert!(RemoteChange::new(ChangeKind::Update, RemoteEntity::Task(dragged)).touches(&source));
        assert!(!RemoteChange::new(ChangeKind::Update, RemoteEntity::Task(sibling)).touches(&source));
        let record = board.columns[0].record(board.id);
        assert!(!RemoteChange::new(ChangeKind::Update, RemoteEntity::Column(record)).touches(&source));
    }

    #[test]
    fn test_change_json_shape() {
        let task = Task::new(ColumnId::new(), 0, "T");
        let id: TaskId = task.id;
        let change = RemoteChange::new(ChangeKind::Update, RemoteEntity::Task(task));
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["kind"], "update");
        assert_eq!(json["entity"]["type"], "task");
        assert_eq!(json["entity"]["row"]["id"], id.to_string());

        let restored: RemoteChange = serde_json::from_value(json).unwrap();
        assert_eq!(restored, change);
    }
}
