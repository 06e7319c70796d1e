//! Applies a committed drop to a board snapshot.
//!
//! The engine is pure: it never mutates its input and never fails. A move
//! that cannot be applied comes back as [`ReorderOutcome::Rejected`] and the
//! caller keeps its current snapshot. Only the columns touched by the move
//! are copied; every other column stays shared with the input board.

use crate::domain::{Board, ColumnId, TaskId};
use crate::drag::{CommittedDrop, DragKind};
use crate::ordering::{insert_at, is_adjacent_noop, move_within_sequence, renumber};
use crate::reorder::writes::WriteSet;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Why a drop left the board untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The drop would reproduce the current order
    NoOp,
    /// The dragged item or a container no longer matches the snapshot
    StaleReference { kind: DragKind, id: Uuid },
    /// The drop slot lies outside the destination container
    OutOfRange { index: usize, len: usize },
}

/// A successfully applied move
#[derive(Debug, Clone, PartialEq)]
pub struct Reordered {
    pub board: Board,
    pub writes: WriteSet,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReorderOutcome {
    Applied(Reordered),
    Rejected(Rejection),
}

impl ReorderOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Produces the board that results from `drop`, together with its write-set
pub fn apply_drop(board: &Board, drop: &CommittedDrop) -> ReorderOutcome {
    let result = match *drop {
        CommittedDrop::Column {
            id,
            source_index,
            final_index,
        } => move_column(board, id, source_index, final_index),
        CommittedDrop::Task {
            id,
            source_column,
            source_index,
            final_column,
            final_index,
        } => move_task(
            board,
            id,
            source_column,
            source_index,
            final_column,
            final_index,
        ),
    };

    match result {
        Ok(next) => {
            if let Err(err) = next.verify_positions() {
                error!(%err, ?drop, "reorder produced an inconsistent board");
                debug_assert!(false, "reorder produced an inconsistent board: {err}");
            }
            let writes = WriteSet::diff(board, &next);
            debug!(?drop, writes = writes.len(), "drop applied");
            ReorderOutcome::Applied(Reordered {
                board: next,
                writes,
            })
        }
        Err(rejection) => {
            debug!(?drop, ?rejection, "drop rejected");
            ReorderOutcome::Rejected(rejection)
        }
    }
}

/// Current index of the dragged item. Siblings may have moved since the drag
/// started; only a missing item makes the drop stale.
fn resolve_source(recorded: usize, current: Option<usize>) -> Option<usize> {
    if let Some(index) = current {
        if index != recorded {
            debug!(recorded, index, "drag source shifted during the drag");
        }
    }
    current
}

fn move_column(
    board: &Board,
    id: ColumnId,
    recorded_index: usize,
    final_index: usize,
) -> Result<Board, Rejection> {
    let source_index = resolve_source(recorded_index, board.column_index(id)).ok_or(
        Rejection::StaleReference {
            kind: DragKind::Column,
            id: id.as_uuid(),
        },
    )?;
    if final_index > board.columns.len() {
        return Err(Rejection::OutOfRange {
            index: final_index,
            len: board.columns.len(),
        });
    }
    if is_adjacent_noop(source_index, final_index) {
        return Err(Rejection::NoOp);
    }

    let mut next = board.clone();
    move_within_sequence(
        &mut next.columns,
        source_index,
        insert_at(source_index, final_index),
    );
    renumber(&mut next.columns);
    Ok(next)
}

fn move_task(
    board: &Board,
    id: TaskId,
    source_column: ColumnId,
    recorded_index: usize,
    final_column: ColumnId,
    final_index: usize,
) -> Result<Board, Rejection> {
    let source_position = board.column_index(source_column).ok_or(Rejection::StaleReference {
        kind: DragKind::Column,
        id: source_column.as_uuid(),
    })?;
    let final_position = board.column_index(final_column).ok_or(Rejection::StaleReference {
        kind: DragKind::Column,
        id: final_column.as_uuid(),
    })?;

    let source = &board.columns[source_position];
    let source_index = resolve_source(recorded_index, source.task_index(id)).ok_or(
        Rejection::StaleReference {
            kind: DragKind::Task,
            id: id.as_uuid(),
        },
    )?;

    let mut next = board.clone();

    if source_position == final_position {
        let len = source.tasks.len();
        if final_index > len {
            return Err(Rejection::OutOfRange {
                index: final_index,
                len,
            });
        }
        if is_adjacent_noop(source_index, final_index) {
            return Err(Rejection::NoOp);
        }
        let column = Arc::make_mut(&mut next.columns[source_position]);
        move_within_sequence(
            &mut column.tasks,
            source_index,
            insert_at(source_index, final_index),
        );
        renumber(&mut column.tasks);
        return Ok(next);
    }

    let destination_len = board.columns[final_position].tasks.len();
    if final_index > destination_len {
        return Err(Rejection::OutOfRange {
            index: final_index,
            len: destination_len,
        });
    }

    let source = Arc::make_mut(&mut next.columns[source_position]);
    let mut task = source.tasks.remove(source_index);
    renumber(&mut source.tasks);

    task.place(final_column, final_index);
    let destination = Arc::make_mut(&mut next.columns[final_position]);
    destination.tasks.insert(final_index, task);
    renumber(&mut destination.tasks);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reorder::writes::EntityKind;

    fn board_with_columns(titles: &[&str]) -> Board {
        let mut board = Board::new("Board");
        for title in titles {
            board.push_column(*title);
        }
        board
    }

    fn column_titles(board: &Board) -> Vec<String> {
        board.columns.iter().map(|c| c.title.clone()).collect()
    }

    fn column_drop(board: &Board, source_index: usize, final_index: usize) -> CommittedDrop {
        CommittedDrop::Column {
            id: board.columns[source_index].id,
            source_index,
            final_index,
        }
    }

    fn task_titles(board: &Board, column_index: usize) -> Vec<String> {
        board.columns[column_index]
            .tasks
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    #[test]
    fn test_column_move_forward() {
        let board = board_with_columns(&["A", "B", "C"]);
        let ReorderOutcome::Applied(result) = apply_drop(&board, &column_drop(&board, 0, 2)) else {
            panic!("expected move to apply");
        };
        assert_eq!(column_titles(&result.board), vec!["B", "A", "C"]);
        assert!(result.board.verify_positions().is_ok());
        assert_eq!(result.writes.len(), 2);
        assert!(result.writes.iter().all(|op| op.entity == EntityKind::Column));
    }

    #[test]
    fn test_column_move_backward() {
        let board = board_with_columns(&["A", "B", "C"]);
        let ReorderOutcome::Applied(result) = apply_drop(&board, &column_drop(&board, 2, 0)) else {
            panic!("expected move to apply");
        };
        assert_eq!(column_titles(&result.board), vec!["C", "A", "B"]);
        assert_eq!(result.writes.len(), 3);
    }

    #[test]
    fn test_column_drop_on_own_slot_is_noop() {
        let board = board_with_columns(&["A", "B"]);
        assert_eq!(
            apply_drop(&board, &column_drop(&board, 0, 0)),
            ReorderOutcome::Rejected(Rejection::NoOp)
        );
        assert_eq!(
            apply_drop(&board, &column_drop(&board, 0, 1)),
            ReorderOutcome::Rejected(Rejection::NoOp)
        );
    }

    #[test]
    fn test_single_column_never_moves() {
        let board = board_with_columns(&["Only"]);
        for final_index in 0..=1 {
            assert!(!apply_drop(&board, &column_drop(&board, 0, final_index)).is_applied());
        }
    }

    #[test]
    fn test_column_stale_reference() {
        let board = board_with_columns(&["A", "B"]);
        let drop = CommittedDrop::Column {
            id: ColumnId::new(),
            source_index: 0,
            final_index: 2,
        };
        assert!(matches!(
            apply_drop(&board, &drop),
            ReorderOutcome::Rejected(Rejection::StaleReference { kind: DragKind::Column, .. })
        ));
    }

    #[test]
    fn test_column_out_of_range() {
        let board = board_with_columns(&["A", "B"]);
        assert_eq!(
            apply_drop(&board, &column_drop(&board, 0, 5)),
            ReorderOutcome::Rejected(Rejection::OutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn test_task_move_within_column() {
        let mut board = board_with_columns(&["To Do"]);
        let todo = board.columns[0].id;
        let column = board.column_mut(todo).unwrap();
        column.push_task("T1");
        column.push_task("T2");
        let t3 = column.push_task("T3").id;

        let drop = CommittedDrop::Task {
            id: t3,
            source_column: todo,
            source_index: 2,
            final_column: todo,
            final_index: 1,
        };
        let ReorderOutcome::Applied(result) = apply_drop(&board, &drop) else {
            panic!("expected move to apply");
        };
        assert_eq!(task_titles(&result.board, 0), vec!["T1", "T3", "T2"]);
        assert_eq!(result.writes.len(), 2);
    }

    #[test]
    fn test_task_move_to_end_of_own_column() {
        let mut board = board_with_columns(&["To Do"]);
        let todo = board.columns[0].id;
        let column = board.column_mut(todo).unwrap();
        let t1 = column.push_task("T1").id;
        column.push_task("T2");
        column.push_task("T3");

        let drop = CommittedDrop::Task {
            id: t1,
            source_column: todo,
            source_index: 0,
            final_column: todo,
            final_index: 3,
        };
        let ReorderOutcome::Applied(result) = apply_drop(&board, &drop) else {
            panic!("expected move to apply");
        };
        assert_eq!(task_titles(&result.board, 0), vec!["T2", "T3", "T1"]);
        assert_eq!(result.board.task(t1).unwrap().position, 2);
    }

    #[test]
    fn test_task_move_across_columns_copies_only_two_columns() {
        let mut board = board_with_columns(&["To Do", "Doing", "Done"]);
        let todo = board.columns[0].id;
        let done = board.columns[2].id;
        let t1 = board.column_mut(todo).unwrap().push_task("T1").id;
        board.column_mut(todo).unwrap().push_task("T2");

        let drop = CommittedDrop::Task {
            id: t1,
            source_column: todo,
            source_index: 0,
            final_column: done,
            final_index: 0,
        };
        let ReorderOutcome::Applied(result) = apply_drop(&board, &drop) else {
            panic!("expected move to apply");
        };

        assert!(Arc::ptr_eq(&board.columns[1], &result.board.columns[1]));
        assert_eq!(task_titles(&result.board, 0), vec!["T2"]);
        assert_eq!(task_titles(&result.board, 2), vec!["T1"]);
        assert_eq!(result.board.task(t1).unwrap().column_id, done);
        assert_eq!(task_titles(&board, 0), vec!["T1", "T2"]);
    }

    #[test]
    fn test_cross_column_adjacent_slot_is_not_noop() {
        let mut board = board_with_columns(&["A", "B"]);
        let a = board.columns[0].id;
        let b = board.columns[1].id;
        let t1 = board.column_mut(a).unwrap().push_task("T1").id;
        board.column_mut(b).unwrap().push_task("U1");

        let drop = CommittedDrop::Task {
            id: t1,
            source_column: a,
            source_index: 0,
            final_column: b,
            final_index: 1,
        };
        let ReorderOutcome::Applied(result) = apply_drop(&board, &drop) else {
            panic!("expected move to apply");
        };
        assert_eq!(task_titles(&result.board, 1), vec!["U1", "T1"]);
        assert!(result.board.columns[0].is_empty());
    }

    #[test]
    fn test_task_source_index_resolved_by_id() {
        let mut board = board_with_columns(&["A", "B"]);
        let a = board.columns[0].id;
        let b = board.columns[1].id;
        board.column_mut(a).unwrap().push_task("T1");
        let t2 = board.column_mut(a).unwrap().push_task("T2").id;

        // T2 was picked up at index 2 before a sibling above it went away
        let drop = CommittedDrop::Task {
            id: t2,
            source_column: a,
            source_index: 2,
            final_column: b,
            final_index: 0,
        };
        let ReorderOutcome::Applied(result) = apply_drop(&board, &drop) else {
            panic!("expected move to apply");
        };
        assert_eq!(task_titles(&result.board, 0), vec!["T1"]);
        assert_eq!(task_titles(&result.board, 1), vec!["T2"]);

        // Same-column arithmetic uses the resolved index: 1 -> 2 is adjacent
        let drop = CommittedDrop::Task {
            id: t2,
            source_column: a,
            source_index: 0,
            final_column: a,
            final_index: 2,
        };
        assert_eq!(apply_drop(&board, &drop), ReorderOutcome::Rejected(Rejection::NoOp));
    }

    #[test]
    fn test_task_stale_when_missing_from_source_column() {
        let mut board = board_with_columns(&["A", "B"]);
        let a = board.columns[0].id;
        let b = board.columns[1].id;
        let t1 = board.column_mut(b).unwrap().push_task("T1").id;

        let drop = CommittedDrop::Task {
            id: t1,
            source_column: a,
            source_index: 0,
            final_column: b,
            final_index: 0,
        };
        assert!(matches!(
            apply_drop(&board, &drop),
            ReorderOutcome::Rejected(Rejection::StaleReference { kind: DragKind::Task, .. })
        ));
    }

    #[test]
    fn test_column_source_index_resolved_by_id() {
        let board = board_with_columns(&["New", "A", "B"]);
        // A was at index 0 when the drag started; "New" arrived since
        let drop = CommittedDrop::Column {
            id: board.columns[1].id,
            source_index: 0,
            final_index: 3,
        };
        let ReorderOutcome::Applied(result) = apply_drop(&board, &drop) else {
            panic!("expected move to apply");
        };
        assert_eq!(column_titles(&result.board), vec!["New", "B", "A"]);
    }

    #[test]
    fn test_cross_column_move_keeps_updated_at() {
        let mut board = board_with_columns(&["A", "B"]);
        let a = board.columns[0].id;
        let b = board.columns[1].id;
        let t1 = board.column_mut(a).unwrap().push_task("T1").id;
        let updated_at = board.task(t1).unwrap().updated_at;

        let drop = CommittedDrop::Task {
            id: t1,
            source_column: a,
            source_index: 0,
            final_column: b,
            final_index: 0,
        };
        let ReorderOutcome::Applied(result) = apply_drop(&board, &drop) else {
            panic!("expected move to apply");
        };
        let moved = result.board.task(t1).unwrap();
        assert_eq!(moved.column_id, b);
        assert_eq!(moved.updated_at, updated_at);
        assert_eq!(result.writes.apply_to(&board).unwrap(), result.board);
    }

    #[test]
    fn test_task_stale_when_destination_deleted() {
        let mut board = board_with_columns(&["A"]);
        let a = board.columns[0].id;
        let t1 = board.column_mut(a).unwrap().push_task("T1").id;

        let drop = CommittedDrop::Task {
            id: t1,
            source_column: a,
            source_index: 0,
            final_column: ColumnId::new(),
            final_index: 0,
        };
        assert!(matches!(
            apply_drop(&board, &drop),
            ReorderOutcome::Rejected(Rejection::StaleReference { kind: DragKind::Column, .. })
        ));
    }
}
