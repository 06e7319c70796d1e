//! Rules for contiguous `position` values within an ordered container.
//!
//! Every container (a board's columns, a column's tasks) keeps its items in a
//! `Vec` whose order is authoritative; `position` mirrors the index and must
//! be exactly `0..len` after any committed change.

use crate::domain::{Column, Task};
use crate::error::{BoardError, Result};
use std::fmt;
use std::sync::Arc;

/// An item that carries its own slot number within a container
pub trait Positioned {
    fn position(&self) -> usize;
    fn set_position(&mut self, position: usize);
}

impl Positioned for Task {
    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

impl Positioned for Column {
    fn position(&self) -> usize {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = position;
    }
}

impl<T: Positioned + Clone> Positioned for Arc<T> {
    fn position(&self) -> usize {
        self.as_ref().position()
    }

    fn set_position(&mut self, position: usize) {
        // Only clone the shared item when its value actually changes
        if self.as_ref().position() != position {
            Arc::make_mut(self).set_position(position);
        }
    }
}

/// Half-height test for a hovered region.
///
/// Returns `existing_index` while the pointer is in the top half of the
/// region and `existing_index + 1` once it reaches the bottom half.
pub fn insertion_index_from_pointer(
    container_top_y: f64,
    container_height: f64,
    pointer_y: f64,
    existing_index: usize,
) -> usize {
    let midpoint = container_top_y + container_height / 2.0;
    if pointer_y < midpoint {
        existing_index
    } else {
        existing_index + 1
    }
}

/// Sets every item's position to its index. Returns how many items changed.
pub fn renumber<T: Positioned>(items: &mut [T]) -> usize {
    let mut changed = 0;
    for (index, item) in items.iter_mut().enumerate() {
        if item.position() != index {
            item.set_position(index);
            changed += 1;
        }
    }
    changed
}

/// Dropping into its own slot or the gap right after it leaves the order unchanged
pub fn is_adjacent_noop(source_index: usize, final_index: usize) -> bool {
    final_index == source_index || final_index == source_index + 1
}

/// Translates a drop slot into an index in the sequence with the source removed
pub fn insert_at(source_index: usize, final_index: usize) -> usize {
    if final_index > source_index {
        final_index - 1
    } else {
        final_index
    }
}

/// Removes the element at `from_index` and reinserts it at `insert_at`.
///
/// `insert_at` is expressed in the frame after removal; see [`insert_at`].
/// Returns false, leaving the sequence untouched, when either index is out
/// of range.
pub fn move_within_sequence<T>(sequence: &mut Vec<T>, from_index: usize, insert_at: usize) -> bool {
    if from_index >= sequence.len() || insert_at >= sequence.len() {
        return false;
    }
    let item = sequence.remove(from_index);
    sequence.insert(insert_at, item);
    true
}

/// Checks that positions are exactly `0..len` in order
pub fn verify_contiguous<T: Positioned>(items: &[T], container: impl fmt::Display) -> Result<()> {
    for (index, item) in items.iter().enumerate() {
        if item.position() != index {
            return Err(BoardError::InvariantViolation {
                container: container.to_string(),
                detail: format!("item at index {} has position {}", index, item.position()),
            });
        }
    }
    Ok(())
}
