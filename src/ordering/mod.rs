pub mod position;

pub use position::{
    insert_at, insertion_index_from_pointer, is_adjacent_noop, move_within_sequence, renumber,
    verify_contiguous, Positioned,
};
