use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::CategoryId;
use crate::error::ValidationError;

pub const TITLE_MIN_CHARS: usize = 3;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(TaskId)
            .map_err(|_| ValidationError::InvalidId(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Order used when distributing seeded tasks.
    pub const ROTATION: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Priority::Low),
            "m" | "med" | "medium" => Ok(Priority::Medium),
            "h" | "high" => Ok(Priority::High),
            _ => Err(ValidationError::InvalidPriority(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: CategoryId,
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub(crate) fn from_draft(id: TaskId, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            category_id: draft.category_id,
            priority: draft.priority,
            completed: false,
            created_at: now,
        }
    }

    /// Applies an already validated patch. `id` and `created_at` are not
    /// reachable from a patch.
    pub(crate) fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }

    /// `needle` must already be lowercased.
    pub fn matches_search(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub category_id: CategoryId,
    pub priority: Priority,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, category_id: CategoryId) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category_id,
            priority: Priority::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Checks title and description and returns the normalized draft.
    /// Category existence is checked by the store, which owns the list.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: validate_title(&self.title)?,
            description: validate_description(&self.description)?,
            ..self
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub priority: Option<Priority>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.priority.is_none()
            && self.completed.is_none()
    }

    pub fn validate(self) -> Result<Self, ValidationError> {
        let title = self.title.as_deref().map(validate_title).transpose()?;
        let description = self
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?;
        Ok(Self {
            title,
            description,
            ..self
        })
    }
}

pub fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    if trimmed.chars().count() < TITLE_MIN_CHARS {
        return Err(ValidationError::TitleTooShort {
            min: TITLE_MIN_CHARS,
        });
    }
    Ok(trimmed.to_string())
}

pub fn validate_description(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len > DESCRIPTION_MAX_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            max: DESCRIPTION_MAX_CHARS,
            len,
        });
    }
    Ok(trimmed.to_string())
}
