//! Drag gesture tracking.
//!
//! [`DragTracker`] turns raw pointer input into a [`CommittedDrop`] or a
//! cancellation. It never touches storage; renderers follow its state through
//! a `watch` channel obtained from [`DragTracker::subscribe`].
//!
//! States: `Idle` → `Pressed` (pointer down on a draggable) → `Dragging`
//! (threshold exceeded) → `Idle` on release or cancel.

use crate::domain::{ColumnId, TaskId};
use crate::error::{BoardError, Result};
use crate::ordering::insertion_index_from_pointer;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// What kind of item a drag carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Column,
    Task,
}

/// The item picked up at the start of a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSource {
    Column {
        id: ColumnId,
        index: usize,
    },
    Task {
        id: TaskId,
        column_id: ColumnId,
        index: usize,
    },
}

impl DragSource {
    pub fn kind(&self) -> DragKind {
        match self {
            Self::Column { .. } => DragKind::Column,
            Self::Task { .. } => DragKind::Task,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Column { index, .. } | Self::Task { index, .. } => *index,
        }
    }

    /// Container the item was picked up from
    pub fn container(&self) -> DropContainer {
        match self {
            Self::Column { .. } => DropContainer::Board,
            Self::Task { column_id, .. } => DropContainer::Column(*column_id),
        }
    }
}

/// A container that can receive a drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropContainer {
    /// The board's column sequence
    Board,
    /// A column's task sequence
    Column(ColumnId),
}

impl DropContainer {
    /// Kind of item this container accepts
    pub fn accepts(&self) -> DragKind {
        match self {
            Self::Board => DragKind::Column,
            Self::Column(_) => DragKind::Task,
        }
    }
}

/// Candidate drop slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub container: DropContainer,
    pub index: usize,
}

/// A droppable region under the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DropRegion {
    /// An existing item; the half-height test picks the slot before or after it
    Item {
        container: DropContainer,
        index: usize,
        top_y: f64,
        height: f64,
    },
    /// The empty body of a container, which has a single slot at index 0
    EmptyContainer { container: DropContainer },
    /// A fixed slot such as the area after the last item
    Slot {
        container: DropContainer,
        index: usize,
    },
}

impl DropRegion {
    pub fn container(&self) -> DropContainer {
        match self {
            Self::Item { container, .. }
            | Self::EmptyContainer { container }
            | Self::Slot { container, .. } => *container,
        }
    }

    /// Resolves the region to a slot for the given pointer height
    pub fn resolve(&self, pointer_y: f64) -> DropTarget {
        let index = match *self {
            Self::Item {
                index,
                top_y,
                height,
                ..
            } => insertion_index_from_pointer(top_y, height, pointer_y, index),
            Self::EmptyContainer { .. } => 0,
            Self::Slot { index, .. } => index,
        };
        DropTarget {
            container: self.container(),
            index,
        }
    }
}

/// A pointer position in layout coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// How a sibling renders while a drag is previewing a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    None,
    Down,
}

/// One in-flight drag gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub source: DragSource,
    pub candidate: Option<DropTarget>,
}

impl DragSession {
    fn new(source: DragSource) -> Self {
        Self {
            source,
            candidate: None,
        }
    }

    pub fn kind(&self) -> DragKind {
        self.source.kind()
    }

    /// True if `index` in `container` is the item being dragged
    pub fn is_source(&self, container: DropContainer, index: usize) -> bool {
        self.source.container() == container && self.source.index() == index
    }

    /// Preview offset for the sibling at `index`: items at or after the
    /// candidate slot move down to open the gap.
    pub fn gap_shift(&self, container: DropContainer, index: usize) -> Shift {
        match self.candidate {
            Some(target)
                if target.container == container
                    && index >= target.index
                    && !self.is_source(container, index) =>
            {
                Shift::Down
            }
            _ => Shift::None,
        }
    }

    fn commit(&self) -> Option<CommittedDrop> {
        let target = self.candidate?;
        match (self.source, target.container) {
            (DragSource::Column { id, index }, DropContainer::Board) => Some(CommittedDrop::Column {
                id,
                source_index: index,
                final_index: target.index,
            }),
            (
                DragSource::Task {
                    id,
                    column_id,
                    index,
                },
                DropContainer::Column(final_column),
            ) => Some(CommittedDrop::Task {
                id,
                source_column: column_id,
                source_index: index,
                final_column,
                final_index: target.index,
            }),
            _ => None,
        }
    }
}

/// Final outcome of a gesture handed to the reorder engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommittedDrop {
    Column {
        id: ColumnId,
        source_index: usize,
        final_index: usize,
    },
    Task {
        id: TaskId,
        source_column: ColumnId,
        source_index: usize,
        final_column: ColumnId,
        final_index: usize,
    },
}

impl CommittedDrop {
    pub fn kind(&self) -> DragKind {
        match self {
            Self::Column { .. } => DragKind::Column,
            Self::Task { .. } => DragKind::Task,
        }
    }
}

/// Observable tracker state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    /// Pointer is down on a draggable but has not moved far enough yet
    Pressed { source: DragSource, origin: Point },
    Dragging(DragSession),
}

impl DragState {
    pub fn session(&self) -> Option<&DragSession> {
        match self {
            Self::Dragging(session) => Some(session),
            _ => None,
        }
    }

    /// Item held by the pointer, whether or not the drag has started moving
    pub fn source(&self) -> Option<&DragSource> {
        match self {
            Self::Idle => None,
            Self::Pressed { source, .. } => Some(source),
            Self::Dragging(session) => Some(&session.source),
        }
    }
}

/// State machine for a single pointer's drag gestures
pub struct DragTracker {
    state: DragState,
    threshold_px: f64,
    sender: watch::Sender<DragState>,
}

impl DragTracker {
    pub fn new(threshold_px: f64) -> Self {
        let (sender, _) = watch::channel(DragState::Idle);
        Self {
            state: DragState::Idle,
            threshold_px,
            sender,
        }
    }

    /// Receiver notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<DragState> {
        self.sender.subscribe()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.state.session()
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// Pointer went down on a draggable item
    pub fn press(&mut self, source: DragSource, origin: Point) -> Result<()> {
        self.ensure_idle()?;
        self.set_state(DragState::Pressed { source, origin });
        Ok(())
    }

    /// Feeds a pointer movement; returns true when this movement started the drag
    pub fn pointer_moved(&mut self, position: Point) -> bool {
        if let DragState::Pressed { source, origin } = self.state {
            if origin.distance(&position) >= self.threshold_px {
                debug!(kind = ?source.kind(), index = source.index(), "drag started");
                self.set_state(DragState::Dragging(DragSession::new(source)));
                return true;
            }
        }
        false
    }

    /// Starts a drag immediately, bypassing the movement threshold
    pub fn begin(&mut self, source: DragSource) -> Result<()> {
        self.ensure_idle()?;
        debug!(kind = ?source.kind(), index = source.index(), "drag started");
        self.set_state(DragState::Dragging(DragSession::new(source)));
        Ok(())
    }

    /// Pointer entered a droppable region. Regions accepting the other kind
    /// of item are ignored. The latest accepted region always wins.
    pub fn hover(&mut self, region: DropRegion, pointer_y: f64) -> Option<DropTarget> {
        let DragState::Dragging(mut session) = self.state else {
            return None;
        };
        if region.container().accepts() != session.kind() {
            return None;
        }
        let target = region.resolve(pointer_y);
        if session.candidate != Some(target) {
            session.candidate = Some(target);
            self.set_state(DragState::Dragging(session));
        }
        Some(target)
    }

    /// Pointer left every droppable region
    pub fn leave(&mut self) {
        if let DragState::Dragging(mut session) = self.state {
            if session.candidate.is_some() {
                session.candidate = None;
                self.set_state(DragState::Dragging(session));
            }
        }
    }

    /// Pointer released. Emits the drop only when a valid candidate exists.
    pub fn release(&mut self) -> Option<CommittedDrop> {
        let committed = self.state.session().and_then(DragSession::commit);
        match committed {
            Some(outcome) => debug!(?outcome, "drag committed"),
            None if self.is_active() => debug!("drag released without a target"),
            None => {}
        }
        self.reset();
        committed
    }

    /// Abandons the gesture without emitting anything
    pub fn cancel(&mut self) {
        if self.is_active() {
            debug!("drag cancelled");
            self.reset();
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_active() {
            return Err(BoardError::DragAlreadyActive);
        }
        Ok(())
    }

    fn reset(&mut self) {
        if self.is_active() {
            self.set_state(DragState::Idle);
        }
    }

    fn set_state(&mut self, state: DragState) {
        self.state = state;
        self.sender.send_replace(state);
    }
}

impl Default for DragTracker {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DRAG_THRESHOLD_PX)
    }
}
