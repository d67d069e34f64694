use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Id handed to the first category created at runtime; 1..=5 are the defaults.
pub const FIRST_CUSTOM_CATEGORY_ID: u64 = 6;

pub const DEFAULT_CATEGORY_COLOR: &str = "#6B7280";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CategoryId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(CategoryId)
            .map_err(|_| ValidationError::InvalidId(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub color: Option<String>,
}

impl CategoryDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub(crate) fn into_category(self, id: CategoryId) -> Result<Category, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::CategoryNameRequired);
        }
        let color = self
            .color
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string());

        Ok(Category {
            id,
            name: name.to_string(),
            color,
        })
    }
}

pub fn default_categories() -> Vec<Category> {
    [
        (1, "Work", "#3B82F6"),
        (2, "Personal", "#10B981"),
        (3, "Shopping", "#F59E0B"),
        (4, "Health", "#EF4444"),
        (5, "Learning", "#8B5CF6"),
    ]
    .into_iter()
    .map(|(id, name, color)| Category {
        id: CategoryId(id),
        name: name.to_string(),
        color: color.to_string(),
    })
    .collect()
}
