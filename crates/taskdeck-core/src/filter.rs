use std::fmt;
use std::str::FromStr;

use tracing::trace;

use crate::category::CategoryId;
use crate::error::ValidationError;
use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum CategoryFilter {
  #[default]
  All,
  Only(CategoryId)
}

impl CategoryFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | CategoryFilter::All => true,
      | CategoryFilter::Only(id) => {
        task.category_id == id
      }
    }
  }
}

impl fmt::Display for CategoryFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | CategoryFilter::All => {
        f.write_str("all")
      }
      | CategoryFilter::Only(id) => {
        write!(f, "{id}")
      }
    }
  }
}

impl FromStr for CategoryFilter {
  type Err = ValidationError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed
      .eq_ignore_ascii_case("all")
    {
      return Ok(CategoryFilter::All);
    }
    trimmed
      .parse::<CategoryId>()
      .map(CategoryFilter::Only)
      .map_err(|_| {
        ValidationError::InvalidCategoryFilter(
          s.to_string()
        )
      })
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum StatusFilter {
  #[default]
  All,
  Pending,
  Completed
}

impl StatusFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Pending => {
        !task.completed
      }
      | StatusFilter::Completed => {
        task.completed
      }
    }
  }
}

impl fmt::Display for StatusFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | StatusFilter::All => "all",
      | StatusFilter::Pending => {
        "pending"
      }
      | StatusFilter::Completed => {
        "completed"
      }
    })
  }
}

impl FromStr for StatusFilter {
  type Err = ValidationError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(StatusFilter::All),
      | "pending" | "open" => {
        Ok(StatusFilter::Pending)
      }
      | "completed" | "done" => {
        Ok(StatusFilter::Completed)
      }
      | _ => Err(
        ValidationError::InvalidStatusFilter(
          s.to_string()
        )
      )
    }
  }
}

/// The active category, status and search predicates. A task is visible
/// when it satisfies all three at once.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Default,
)]
pub struct FilterSet {
  pub category: CategoryFilter,
  pub status:   StatusFilter,
  pub search:   String
}

impl FilterSet {
  pub fn merge(
    &mut self,
    patch: FilterPatch
  ) {
    if let Some(category) =
      patch.category
    {
      self.category = category;
    }
    if let Some(status) = patch.status
    {
      self.status = status;
    }
    if let Some(search) = patch.search
    {
      self.search = search;
    }
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    if !self.category.matches(task) {
      return false;
    }
    if !self.status.matches(task) {
      return false;
    }
    if self.search.is_empty() {
      return true;
    }
    task.matches_search(
      &self.search.to_lowercase()
    )
  }

  #[tracing::instrument(skip(
    self, tasks
  ))]
  pub fn apply(
    &self,
    tasks: &[Task]
  ) -> Vec<Task> {
    let needle =
      self.search.to_lowercase();
    let out: Vec<Task> = tasks
      .iter()
      .filter(|task| {
        self.category.matches(task)
          && self.status.matches(task)
          && (needle.is_empty()
            || task
              .matches_search(&needle))
      })
      .cloned()
      .collect();

    trace!(
      total = tasks.len(),
      visible = out.len(),
      "applied filters"
    );
    out
  }

  pub fn active_count(
    &self
  ) -> usize {
    [
      self.category
        != CategoryFilter::All,
      self.status != StatusFilter::All,
      !self.search.is_empty()
    ]
    .into_iter()
    .filter(|active| *active)
    .count()
  }

  pub fn is_active(&self) -> bool {
    self.active_count() > 0
  }
}

/// Partial update for a [`FilterSet`]; fields left as `None` keep their
/// current value.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Default,
)]
pub struct FilterPatch {
  pub category: Option<CategoryFilter>,
  pub status:   Option<StatusFilter>,
  pub search:   Option<String>
}

impl FilterPatch {
  pub fn category(
    mut self,
    category: CategoryFilter
  ) -> Self {
    self.category = Some(category);
    self
  }

  pub fn status(
    mut self,
    status: StatusFilter
  ) -> Self {
    self.status = Some(status);
    self
  }

  pub fn search(
    mut self,
    search: impl Into<String>
  ) -> Self {
    self.search = Some(search.into());
    self
  }

  pub fn is_empty(&self) -> bool {
    self.category.is_none()
      && self.status.is_none()
      && self.search.is_none()
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum QuickFilter {
  Pending,
  Completed,
  All
}

impl QuickFilter {
  /// Quick filters reset category and search.
  pub fn filter_set(self) -> FilterSet {
    let status = match self {
      | QuickFilter::Pending => {
        StatusFilter::Pending
      }
      | QuickFilter::Completed => {
        StatusFilter::Completed
      }
      | QuickFilter::All => {
        StatusFilter::All
      }
    };
    FilterSet {
      status,
      ..FilterSet::default()
    }
  }
}

impl FromStr for QuickFilter {
  type Err = ValidationError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s.parse::<StatusFilter>()? {
      | StatusFilter::All => {
        Ok(QuickFilter::All)
      }
      | StatusFilter::Pending => {
        Ok(QuickFilter::Pending)
      }
      | StatusFilter::Completed => {
        Ok(QuickFilter::Completed)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::task::{
    Priority,
    Task,
    TaskId
  };

  fn task(
    id: u64,
    title: &str,
    description: &str,
    category: u64,
    completed: bool
  ) -> Task {
    Task {
      id: TaskId(id),
      title: title.to_string(),
      description: description
        .to_string(),
      category_id: CategoryId(category),
      priority: Priority::Medium,
      completed,
      created_at: Utc::now()
    }
  }

  fn sample() -> Vec<Task> {
    vec![
      task(1, "Buy milk", "", 3, false),
      task(
        2,
        "Pay rent",
        "Bank transfer",
        1,
        true
      ),
      task(
        3,
        "Read book",
        "chapter on MILK chemistry",
        5,
        false
      ),
      task(4, "Gym", "legs", 4, true),
    ]
  }

  fn titles(
    tasks: &[Task]
  ) -> Vec<&str> {
    tasks
      .iter()
      .map(|t| t.title.as_str())
      .collect()
  }

  #[test]
  fn neutral_filters_keep_everything() {
    let tasks = sample();
    let visible =
      FilterSet::default().apply(&tasks);
    assert_eq!(visible, tasks);
  }

  #[test]
  fn dimensions_are_intersected() {
    let tasks = sample();
    let filters = FilterSet {
      category: CategoryFilter::All,
      status:   StatusFilter::Pending,
      search:   "milk".to_string()
    };
    assert_eq!(
      titles(&filters.apply(&tasks)),
      ["Buy milk", "Read book"]
    );

    let filters = FilterSet {
      category: CategoryFilter::Only(
        CategoryId(3)
      ),
      ..filters
    };
    assert_eq!(
      titles(&filters.apply(&tasks)),
      ["Buy milk"]
    );
  }

  #[test]
  fn apply_agrees_with_matches_for_every_task()
   {
    let tasks = sample();
    let filters = FilterSet {
      category: CategoryFilter::All,
      status:   StatusFilter::Completed,
      search:   "A".to_string()
    };
    let visible = filters.apply(&tasks);
    for t in &tasks {
      assert_eq!(
        visible.contains(t),
        filters.matches(t),
        "task {}",
        t.title
      );
    }
    assert_eq!(
      titles(&visible),
      ["Pay rent"]
    );
  }

  #[test]
  fn every_combination_yields_an_ordered_subset()
   {
    let tasks = sample();
    let categories = [
      CategoryFilter::All,
      CategoryFilter::Only(CategoryId(1)),
      CategoryFilter::Only(CategoryId(3)),
      CategoryFilter::Only(CategoryId(4)),
      CategoryFilter::Only(CategoryId(5)),
      CategoryFilter::Only(CategoryId(9))
    ];
    let statuses = [
      StatusFilter::All,
      StatusFilter::Pending,
      StatusFilter::Completed
    ];
    let searches =
      ["", "milk", "MILK", "a", "legs", "zzz"];

    for category in categories {
      for status in statuses {
        for search in searches {
          let filters = FilterSet {
            category,
            status,
            search: search.to_string()
          };
          let visible = filters.apply(&tasks);
          let expected: Vec<Task> = tasks
            .iter()
            .filter(|t| filters.matches(t))
            .cloned()
            .collect();
          assert_eq!(
            visible, expected,
            "{category} {status} {search:?}"
          );

          for t in tasks
            .iter()
            .filter(|t| !visible.contains(t))
          {
            let needle = search.to_lowercase();
            assert!(
              !category.matches(t)
                || !status.matches(t)
                || !t.matches_search(&needle),
              "{} excluded by {category} \
               {status} {search:?}",
              t.title
            );
          }
        }
      }
    }
  }

  #[test]
  fn merge_is_partial() {
    let mut filters = FilterSet::default();
    filters.merge(
      FilterPatch::default().search("x")
    );
    filters.merge(
      FilterPatch::default().category(
        CategoryFilter::Only(CategoryId(2))
      )
    );
    assert_eq!(filters.search, "x");
    assert_eq!(
      filters.category,
      CategoryFilter::Only(CategoryId(2))
    );
    assert_eq!(filters.active_count(), 2);
  }

  #[test]
  fn parses_filter_values() {
    assert_eq!(
      "ALL".parse::<CategoryFilter>(),
      Ok(CategoryFilter::All)
    );
    assert_eq!(
      "4".parse::<CategoryFilter>(),
      Ok(CategoryFilter::Only(
        CategoryId(4)
      ))
    );
    assert!(
      "work"
        .parse::<CategoryFilter>()
        .is_err()
    );
    assert_eq!(
      "completed".parse::<StatusFilter>(),
      Ok(StatusFilter::Completed)
    );
    assert_eq!(
      "pending".parse::<QuickFilter>(),
      Ok(QuickFilter::Pending)
    );
  }

  #[test]
  fn quick_filter_resets_other_dimensions()
   {
    let set =
      QuickFilter::Completed.filter_set();
    assert_eq!(
      set.category,
      CategoryFilter::All
    );
    assert!(set.search.is_empty());
    assert_eq!(
      set.status,
      StatusFilter::Completed
    );
  }
}
