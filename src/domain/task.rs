use crate::domain::ids::{ColumnId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fields supplied when creating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// A unit of work living in exactly one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    pub column_id: ColumnId,
    pub position: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new task at the given slot of a column
    pub fn new(column_id: ColumnId, position: usize, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            title: title.into(),
            description: None,
            tags: BTreeSet::new(),
            column_id,
            position,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds a task from creation fields
    pub fn from_new(column_id: ColumnId, position: usize, fields: NewTask) -> Self {
        let mut task = Self::new(column_id, position, fields.title);
        task.description = fields.description;
        task.tags = fields.tags;
        task
    }

    /// Moves the task to a slot of a column.
    ///
    /// Placement is not a content edit and leaves `updated_at` alone. Moves
    /// are persisted as `position`/`column_id` patches only, so a stored
    /// copy replayed from those patches matches the in-memory one.
    pub fn place(&mut self, column_id: ColumnId, position: usize) {
        self.column_id = column_id;
        self.position = position;
    }

    /// Sets the title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.updated_at = Utc::now();
    }

    /// Sets the description
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
        self.updated_at = Utc::now();
    }

    /// Adds a tag, returning false if it was already present
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let inserted = self.tags.insert(tag.into());
        if inserted {
            self.updated_at = Utc::now();
        }
        inserted
    }

    /// Removes a tag, returning false if it was absent
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let removed = self.tags.remove(tag);
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }
}
