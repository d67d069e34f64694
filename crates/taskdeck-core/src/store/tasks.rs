use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::category::{
    Category, CategoryDraft, CategoryId, FIRST_CUSTOM_CATEGORY_ID, default_categories,
};
use crate::error::ValidationError;
use crate::filter::{CategoryFilter, FilterPatch, FilterSet, QuickFilter};
use crate::observer::{Listeners, SubscriptionId};
use crate::seed::{SeedOptions, SeedPolicy, SeedSource, map_remote_todos};
use crate::task::{Task, TaskDraft, TaskId, TaskPatch};

pub const SEED_FAILURE_MESSAGE: &str = "Failed to fetch tasks";

/// Everything a mutation of the task store can do. Applied by
/// [`TaskState::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    SetLoading(bool),
    SeedLoaded { tasks: Vec<Task>, policy: SeedPolicy },
    SeedFailed(String),
    AddTask(Task),
    UpdateTask { id: TaskId, patch: TaskPatch },
    DeleteTask(TaskId),
    ToggleTaskStatus(TaskId),
    SetFilters(FilterPatch),
    ReplaceFilters(FilterSet),
    AddCategory(Category),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub categories: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub filters: FilterSet,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Incremented by every applied action.
    pub revision: u64,
    next_task_id: u64,
    next_category_id: u64,
    seed_started: bool,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            categories: default_categories(),
            filters: FilterSet::default(),
            is_loading: false,
            error: None,
            revision: 0,
            next_task_id: 1,
            next_category_id: FIRST_CUSTOM_CATEGORY_ID,
            seed_started: false,
        }
    }
}

impl TaskState {
    /// Applies `action` and reports whether anything changed. Actions that
    /// reference an absent task are no-ops.
    pub fn apply(&mut self, action: &TaskAction) -> bool {
        let changed = match action {
            TaskAction::SetLoading(loading) => {
                self.is_loading = *loading;
                true
            }
            TaskAction::SeedLoaded { tasks, policy } => {
                if *policy == SeedPolicy::FillIfEmpty && !self.tasks.is_empty() {
                    info!(
                        local = self.tasks.len(),
                        seeded = tasks.len(),
                        "task list changed during seed fetch; keeping local tasks"
                    );
                    false
                } else {
                    self.tasks = tasks.clone();
                    self.bump_task_counter();
                    true
                }
            }
            TaskAction::SeedFailed(message) => {
                self.error = Some(message.clone());
                true
            }
            TaskAction::AddTask(task) => {
                self.tasks.push(task.clone());
                self.bump_task_counter();
                true
            }
            TaskAction::UpdateTask { id, patch } => match self.task_mut(*id) {
                Some(task) => {
                    task.apply_patch(patch);
                    true
                }
                None => false,
            },
            TaskAction::DeleteTask(id) => {
                let before = self.tasks.len();
                self.tasks.retain(|task| task.id != *id);
                before != self.tasks.len()
            }
            TaskAction::ToggleTaskStatus(id) => match self.task_mut(*id) {
                Some(task) => {
                    task.completed = !task.completed;
                    true
                }
                None => false,
            },
            TaskAction::SetFilters(patch) => {
                self.filters.merge(patch.clone());
                true
            }
            TaskAction::ReplaceFilters(filters) => {
                self.filters = filters.clone();
                true
            }
            TaskAction::AddCategory(category) => {
                self.categories.push(category.clone());
                self.next_category_id = self
                    .next_category_id
                    .max(category.id.0.saturating_add(1));
                true
            }
        };

        if changed {
            self.revision += 1;
        }
        changed
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    pub fn has_category(&self, id: CategoryId) -> bool {
        self.category(id).is_some()
    }

    pub fn filtered_tasks(&self) -> Vec<Task> {
        self.filters.apply(&self.tasks)
    }

    pub fn stats(&self) -> TaskStats {
        let completed = self.tasks.iter().filter(|task| task.completed).count();
        TaskStats {
            total: self.tasks.len(),
            completed,
            pending: self.tasks.len() - completed,
            categories: self.categories.len(),
        }
    }

    fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    /// `u64::MAX` is never handed out; once the counter reaches it, adds fail.
    fn allocate_task_id(&mut self) -> Result<TaskId, ValidationError> {
        let next = self
            .next_task_id
            .checked_add(1)
            .ok_or(ValidationError::TaskIdsExhausted)?;
        let id = TaskId(self.next_task_id);
        self.next_task_id = next;
        Ok(id)
    }

    fn bump_task_counter(&mut self) {
        if let Some(max) = self.tasks.iter().map(|task| task.id.0).max() {
            self.next_task_id = self.next_task_id.max(max.saturating_add(1));
        }
    }

    fn check_category(&self, id: CategoryId) -> Result<(), ValidationError> {
        if self.has_category(id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownCategory(id))
        }
    }
}

/// Delivered to subscribers after every applied action.
#[derive(Debug, Clone)]
pub struct TaskChange {
    pub action: TaskAction,
    pub state: TaskState,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<TaskState>,
    listeners: Listeners<TaskChange>,
}

/// Shared handle to the task store. Clones refer to the same state.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: TaskState) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&TaskChange) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Loads the initial task list from `source`. Only the first call per
    /// store does anything. Failures end up in [`TaskStore::error`].
    #[instrument(skip(self, source), fields(limit = options.limit, policy = %options.policy))]
    pub async fn seed_from_remote<S: SeedSource>(&self, source: &S, options: SeedOptions) {
        {
            let mut state = self.inner.state.lock();
            if state.seed_started {
                debug!("seed already started; ignoring");
                return;
            }
            state.seed_started = true;
            self.commit(state, TaskAction::SetLoading(true));
        }

        let action = match source.fetch_todos(options.limit).await {
            Ok(items) => {
                let categories = default_categories();
                let mut rng = rand::rng();
                let tasks = map_remote_todos(items, &categories, Utc::now(), &mut rng);
                if tasks.iter().any(|task| task.id.0 == u64::MAX) {
                    warn!("seed contains a task id outside the local id range");
                    TaskAction::SeedFailed(SEED_FAILURE_MESSAGE.to_string())
                } else {
                    info!(count = tasks.len(), "seed fetch complete");
                    TaskAction::SeedLoaded {
                        tasks,
                        policy: options.policy,
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "seed fetch failed");
                TaskAction::SeedFailed(SEED_FAILURE_MESSAGE.to_string())
            }
        };

        self.dispatch(action);
        self.dispatch(TaskAction::SetLoading(false));
    }

    #[instrument(skip(self, draft), fields(category = %draft.category_id))]
    pub fn add_task(&self, draft: TaskDraft) -> Result<Task, ValidationError> {
        let draft = draft.validate()?;
        let mut state = self.inner.state.lock();
        state.check_category(draft.category_id)?;

        let id = state.allocate_task_id()?;
        let task = Task::from_draft(id, draft, Utc::now());
        debug!(task_id = %task.id, "adding task");
        self.commit(state, TaskAction::AddTask(task.clone()));
        Ok(task)
    }

    /// Returns the updated task, or `None` when `id` is absent.
    #[instrument(skip(self, patch))]
    pub fn update_task(
        &self,
        id: TaskId,
        patch: TaskPatch,
    ) -> Result<Option<Task>, ValidationError> {
        let patch = patch.validate()?;
        let state = self.inner.state.lock();
        if let Some(category_id) = patch.category_id {
            state.check_category(category_id)?;
        }
        if state.task(id).is_none() {
            debug!("update of absent task ignored");
            return Ok(None);
        }

        self.commit(state, TaskAction::UpdateTask { id, patch });
        Ok(self.task(id))
    }

    /// Returns whether a task was removed.
    #[instrument(skip(self))]
    pub fn delete_task(&self, id: TaskId) -> bool {
        self.dispatch(TaskAction::DeleteTask(id))
    }

    /// Returns the new completion flag, or `None` when `id` is absent.
    #[instrument(skip(self))]
    pub fn toggle_task_status(&self, id: TaskId) -> Option<bool> {
        let state = self.inner.state.lock();
        if state.task(id).is_none() {
            return None;
        }
        self.commit(state, TaskAction::ToggleTaskStatus(id));
        self.task(id).map(|task| task.completed)
    }

    /// Merges `patch` into the active filters. A category that does not
    /// exist is rejected and nothing changes.
    #[instrument(skip(self))]
    pub fn set_filters(&self, patch: FilterPatch) -> Result<(), ValidationError> {
        let state = self.inner.state.lock();
        if let Some(CategoryFilter::Only(id)) = patch.category {
            state.check_category(id)?;
        }
        self.commit(state, TaskAction::SetFilters(patch));
        Ok(())
    }

    pub fn clear_filters(&self) {
        self.dispatch(TaskAction::ReplaceFilters(FilterSet::default()));
    }

    pub fn apply_quick_filter(&self, quick: QuickFilter) {
        self.dispatch(TaskAction::ReplaceFilters(quick.filter_set()));
    }

    #[instrument(skip(self, draft))]
    pub fn add_category(&self, draft: CategoryDraft) -> Result<Category, ValidationError> {
        let state = self.inner.state.lock();
        let category = draft.into_category(CategoryId(state.next_category_id))?;
        debug!(category_id = %category.id, name = %category.name, "adding category");
        self.commit(state, TaskAction::AddCategory(category.clone()));
        Ok(category)
    }

    /// Tasks passing every active filter, recomputed on each call.
    pub fn filtered_tasks(&self) -> Vec<Task> {
        self.inner.state.lock().filtered_tasks()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.state.lock().tasks.clone()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.inner.state.lock().task(id).cloned()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.inner.state.lock().categories.clone()
    }

    pub fn category(&self, id: CategoryId) -> Option<Category> {
        self.inner.state.lock().category(id).cloned()
    }

    pub fn filters(&self) -> FilterSet {
        self.inner.state.lock().filters.clone()
    }

    pub fn active_filter_count(&self) -> usize {
        self.inner.state.lock().filters.active_count()
    }

    pub fn has_active_filters(&self) -> bool {
        self.active_filter_count() > 0
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    pub fn stats(&self) -> TaskStats {
        self.inner.state.lock().stats()
    }

    pub fn snapshot(&self) -> TaskState {
        self.inner.state.lock().clone()
    }

    fn dispatch(&self, action: TaskAction) -> bool {
        let state = self.inner.state.lock();
        self.commit(state, action)
    }

    /// Applies `action` under the held lock, releases it, then notifies.
    fn commit(&self, mut state: MutexGuard<'_, TaskState>, action: TaskAction) -> bool {
        if !state.apply(&action) {
            return false;
        }
        debug!(revision = state.revision, "task state changed");
        let change = TaskChange {
            action,
            state: state.clone(),
        };
        drop(state);
        self.inner.listeners.notify(&change);
        true
    }
}
