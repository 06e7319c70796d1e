pub mod board;
pub mod ids;
pub mod task;

pub use board::{Board, Column, ColumnRecord};
pub use ids::{BoardId, ColumnId, TaskId};
pub use task::{NewTask, Task};
