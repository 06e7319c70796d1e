pub mod session;

pub use session::{
    CommittedDrop, DragKind, DragSession, DragSource, DragState, DragTracker, DropContainer,
    DropRegion, DropTarget, Point, Shift,
};
