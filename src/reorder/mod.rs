pub mod engine;
pub mod writes;

pub use engine::{apply_drop, Rejection, ReorderOutcome, Reordered};
pub use writes::{EntityKind, FieldPatch, WriteOp, WriteSet};
