use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::Settings;
use crate::seed::{HttpSeedSource, SeedBackend, StaticSeedSource};
use crate::store::auth::AuthStore;
use crate::store::tasks::TaskStore;
use crate::store::theme::ThemeStore;

/// Where the startup task list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    Remote,
    Offline,
    Disabled,
}

/// The stores of one running session plus what is needed to rebuild the
/// task store on reload.
#[derive(Debug, Clone)]
pub struct AppContext {
    tasks: Arc<Mutex<TaskStore>>,
    pub auth: AuthStore,
    pub theme: ThemeStore,
    pub settings: Arc<Settings>,
    backend: Option<Arc<SeedBackend>>,
}

impl AppContext {
    #[tracing::instrument(skip(settings))]
    pub fn new(settings: Settings, mode: SeedMode) -> anyhow::Result<Self> {
        let mode = if settings.seed.enabled {
            mode
        } else {
            SeedMode::Disabled
        };
        let backend = match mode {
            SeedMode::Remote => Some(SeedBackend::Http(HttpSeedSource::new(
                settings.seed.url.clone(),
                settings.seed.timeout,
            )?)),
            SeedMode::Offline => Some(SeedBackend::Static(StaticSeedSource::demo())),
            SeedMode::Disabled => None,
        };
        Ok(Self::with_backend(settings, backend))
    }

    pub fn with_backend(settings: Settings, backend: Option<SeedBackend>) -> Self {
        debug!(seeded = backend.is_some(), theme = %settings.theme, "building app context");
        Self {
            tasks: Arc::new(Mutex::new(TaskStore::new())),
            auth: AuthStore::new(settings.auth.clone()),
            theme: ThemeStore::new(settings.theme),
            settings: Arc::new(settings),
            backend: backend.map(Arc::new),
        }
    }

    /// Handle to the current task store. Replaced by [`AppContext::reset_tasks`].
    pub fn tasks(&self) -> TaskStore {
        self.tasks.lock().clone()
    }

    /// Starts the seed fetch for the current task store in the background.
    pub fn start_seed(&self) -> Option<JoinHandle<()>> {
        let backend = Arc::clone(self.backend.as_ref()?);
        let store = self.tasks();
        let options = self.settings.seed.options;
        Some(tokio::spawn(async move {
            store.seed_from_remote(backend.as_ref(), options).await;
        }))
    }

    /// Swaps in an empty task store; call [`AppContext::start_seed`] to
    /// fill it again.
    pub fn reset_tasks(&self) -> TaskStore {
        let store = TaskStore::new();
        *self.tasks.lock() = store.clone();
        info!("task store reset");
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn settings() -> Settings {
        Settings::from_config(&Config::default()).expect("default settings")
    }

    #[tokio::test]
    async fn offline_seed_fills_the_store() {
        let app = AppContext::new(settings(), SeedMode::Offline).expect("context");
        let handle = app.start_seed().expect("seed started");
        handle.await.expect("seed task");

        let tasks = app.tasks();
        assert_eq!(tasks.tasks().len(), 6);
        assert!(!tasks.is_loading());
        assert_eq!(tasks.error(), None);
    }

    #[tokio::test]
    async fn disabled_seed_leaves_store_empty() {
        let mut settings = settings();
        settings.seed.enabled = false;
        let app = AppContext::new(settings, SeedMode::Remote).expect("context");
        assert!(app.start_seed().is_none());
        assert!(app.tasks().tasks().is_empty());
    }

    #[tokio::test]
    async fn reload_replaces_the_task_store() {
        let app = AppContext::new(settings(), SeedMode::Offline).expect("context");
        app.start_seed().expect("seed").await.expect("seed task");
        let old = app.tasks();
        old.delete_task(crate::task::TaskId(1));

        let fresh = app.reset_tasks();
        assert!(fresh.tasks().is_empty());
        app.start_seed().expect("reseed").await.expect("seed task");
        assert_eq!(fresh.tasks().len(), 6);
        assert_eq!(app.tasks().tasks().len(), 6);
        assert_eq!(old.tasks().len(), 5);
    }
}
