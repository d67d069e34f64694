//! Line-oriented front end over the stores. Stands in for a view layer: it
//! gates protected commands on the auth session, renders store state and
//! surfaces seed progress as notices.

mod command;

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

pub use command::{AddArgs, Command, ThemeChange, expand_command_abbrev, known_command_names, tokenize};

use crate::app::AppContext;
use crate::category::CategoryId;
use crate::observer::SubscriptionId;
use crate::render::Renderer;
use crate::store::auth::Credentials;
use crate::store::tasks::{TaskAction, TaskStore};
use crate::task::{TaskDraft, TaskId};

const HELP: &str = "\
commands:
  login <email> <password>   sign in
  demo                       sign in with the demo account
  logout | whoami            session
  list | all                 filtered / unfiltered tasks
  show <id>                  task details
  add <title> [cat:<id>] [prio:<p>] [desc:<text>]
  edit <id> [title:<t>] [cat:<id>] [prio:<p>] [desc:<text>] [done:<yes|no>]
  toggle <id> | done <id>    flip completion
  delete <id>                remove a task
  filter [cat:<id|all>] [status:<all|pending|completed>] [search:<text>]
  clear                      reset filters
  quick pending|completed|all
  categories                 list categories
  category <name> [color:<#rrggbb>]
  stats                      counters
  theme [toggle|dark|light]  switch theme
  status                     loading and error flags
  reload                     refetch the seed tasks
  help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<W: Write> {
    app: AppContext,
    renderer: Renderer,
    out: W,
    prompt: bool,
    await_seed: bool,
    notices: Arc<Mutex<Vec<String>>>,
    watch: Option<(TaskStore, SubscriptionId)>,
}

impl<W: Write> Shell<W> {
    pub fn new(app: AppContext, renderer: Renderer, out: W) -> Self {
        let mut shell = Self {
            app,
            renderer,
            out,
            prompt: false,
            await_seed: false,
            notices: Arc::new(Mutex::new(Vec::new())),
            watch: None,
        };
        shell.watch_tasks(shell.app.tasks());
        shell
    }

    /// Print a prompt before each line read.
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    /// Block `reload` until the new seed has landed.
    pub fn with_await_seed(mut self, await_seed: bool) -> Self {
        self.await_seed = await_seed;
        self
    }

    pub fn into_inner(mut self) -> W {
        if let Some((store, id)) = self.watch.take() {
            store.unsubscribe(id);
        }
        self.out
    }

    /// Reads commands until end of input or `quit`. Command errors are
    /// printed; only I/O failures end the loop early.
    #[tracing::instrument(skip_all)]
    pub async fn run<R>(&mut self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            self.flush_notices()?;
            self.write_prompt()?;
            let Some(line) = lines.next_line().await? else {
                debug!("end of input");
                break;
            };
            if self.execute_line(&line).await? == Flow::Quit {
                break;
            }
        }
        self.flush_notices()?;
        self.out.flush()?;
        Ok(())
    }

    pub async fn execute_line(&mut self, line: &str) -> anyhow::Result<Flow> {
        match Command::parse(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Ok(Flow::Continue),
            Err(err) => {
                writeln!(self.out, "{}", self.renderer.error_line(&format!("{err:#}")))?;
                Ok(Flow::Continue)
            }
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn execute(&mut self, command: Command) -> anyhow::Result<Flow> {
        if command.requires_session()
            && let Err(err) = self.app.auth.require_user()
        {
            debug!("protected command without session");
            writeln!(
                self.out,
                "{}",
                self.renderer
                    .notice_line(&format!("{err}: redirecting to login (try `demo`)"))
            )?;
            return Ok(Flow::Continue);
        }

        let tasks = self.app.tasks();
        match command {
            Command::Login(credentials) => self.login(credentials).await?,
            Command::Demo => {
                let credentials = self.app.auth.demo_credentials();
                self.login(credentials).await?;
            }
            Command::Logout => {
                self.app.auth.logout();
                writeln!(self.out, "Logged out")?;
            }
            Command::Whoami => {
                if let Some(user) = self.app.auth.user() {
                    self.renderer.print_user(&mut self.out, &user)?;
                }
            }
            Command::List => self.print_list(&tasks)?,
            Command::All => {
                self.renderer
                    .print_task_table(&mut self.out, &tasks.tasks(), &tasks.categories())?;
            }
            Command::Show(id) => match tasks.task(id) {
                Some(task) => {
                    self.renderer
                        .print_task_detail(&mut self.out, &task, &tasks.categories())?;
                }
                None => self.not_found(id)?,
            },
            Command::Add(args) => self.add(&tasks, args)?,
            Command::Edit { id, patch } => match tasks.update_task(id, patch) {
                Ok(Some(task)) => writeln!(self.out, "Updated task {}", task.id)?,
                Ok(None) => self.not_found(id)?,
                Err(err) => self.error(&err.to_string())?,
            },
            Command::Toggle(id) => match tasks.toggle_task_status(id) {
                Some(true) => writeln!(self.out, "Task {id} completed")?,
                Some(false) => writeln!(self.out, "Task {id} marked pending")?,
                None => self.not_found(id)?,
            },
            Command::Delete(id) => {
                if tasks.delete_task(id) {
                    writeln!(self.out, "Deleted task {id}")?;
                } else {
                    self.not_found(id)?;
                }
            }
            Command::Filter(patch) => match tasks.set_filters(patch) {
                Ok(()) => self.renderer.print_filters(&mut self.out, &tasks.filters())?,
                Err(err) => self.error(&err.to_string())?,
            },
            Command::Clear => {
                tasks.clear_filters();
                writeln!(self.out, "Filters cleared")?;
            }
            Command::Quick(quick) => {
                tasks.apply_quick_filter(quick);
                self.print_list(&tasks)?;
            }
            Command::Categories => {
                self.renderer
                    .print_categories(&mut self.out, &tasks.categories(), &tasks.tasks())?;
            }
            Command::Category(draft) => match tasks.add_category(draft) {
                Ok(category) => {
                    writeln!(self.out, "Added category {} ({})", category.id, category.name)?;
                }
                Err(err) => self.error(&err.to_string())?,
            },
            Command::Stats => {
                self.renderer
                    .print_stats(&mut self.out, &tasks.stats(), &tasks.filters())?;
            }
            Command::Theme(change) => {
                let mode = match change {
                    ThemeChange::Toggle => self.app.theme.toggle(),
                    ThemeChange::Set(mode) => {
                        self.app.theme.set(mode);
                        mode
                    }
                };
                writeln!(self.out, "Theme: {mode}")?;
            }
            Command::Status => self.print_status(&tasks)?,
            Command::Reload => self.reload().await?,
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }

        self.flush_notices()?;
        Ok(Flow::Continue)
    }

    async fn login(&mut self, credentials: Credentials) -> anyhow::Result<()> {
        let outcome = self.app.auth.login(credentials).await;
        match (outcome.success, self.app.auth.user()) {
            (true, Some(user)) => writeln!(self.out, "Welcome, {}", user.name)?,
            _ => {
                let message = outcome.error.unwrap_or_else(|| "Login failed".to_string());
                self.error(&message)?;
            }
        }
        Ok(())
    }

    fn add(&mut self, tasks: &TaskStore, args: AddArgs) -> anyhow::Result<()> {
        let category = match args.category {
            Some(id) => id,
            None => tasks
                .categories()
                .first()
                .map(|category| category.id)
                .unwrap_or(CategoryId(1)),
        };
        let draft = TaskDraft::new(args.title, category)
            .with_priority(args.priority.unwrap_or_default())
            .with_description(args.description.unwrap_or_default());

        match tasks.add_task(draft) {
            Ok(task) => writeln!(self.out, "Added task {}", task.id)?,
            Err(err) => self.error(&err.to_string())?,
        }
        Ok(())
    }

    fn print_list(&mut self, tasks: &TaskStore) -> anyhow::Result<()> {
        let state = tasks.snapshot();
        if state.is_loading {
            writeln!(self.out, "{}", self.renderer.notice_line("Loading tasks..."))?;
        }
        if let Some(error) = &state.error {
            self.error(&format!("{error} (type reload to retry)"))?;
        }

        let visible = state.filtered_tasks();
        self.renderer
            .print_task_table(&mut self.out, &visible, &state.categories)?;
        if state.filters.is_active() {
            writeln!(
                self.out,
                "Showing {} of {} tasks",
                visible.len(),
                state.tasks.len()
            )?;
            self.renderer.print_filters(&mut self.out, &state.filters)?;
        }
        Ok(())
    }

    fn print_status(&mut self, tasks: &TaskStore) -> anyhow::Result<()> {
        let state = tasks.snapshot();
        let user = self
            .app
            .auth
            .user()
            .map(|user| user.email)
            .unwrap_or_else(|| "-".to_string());
        writeln!(self.out, "user      {user}")?;
        writeln!(self.out, "loading   {}", if state.is_loading { "yes" } else { "no" })?;
        writeln!(self.out, "error     {}", state.error.as_deref().unwrap_or("-"))?;
        writeln!(self.out, "revision  {}", state.revision)?;
        writeln!(self.out, "theme     {}", self.app.theme.mode())?;
        Ok(())
    }

    async fn reload(&mut self) -> anyhow::Result<()> {
        let store = self.app.reset_tasks();
        self.watch_tasks(store);
        match self.app.start_seed() {
            Some(handle) if self.await_seed => {
                if let Err(err) = handle.await {
                    warn!(error = %err, "seed task did not finish");
                }
            }
            Some(_) => writeln!(self.out, "{}", self.renderer.notice_line("Loading tasks..."))?,
            None => writeln!(self.out, "Task list reset")?,
        }
        Ok(())
    }

    /// Moves the seed-notice subscription onto `store`.
    fn watch_tasks(&mut self, store: TaskStore) {
        if let Some((old, id)) = self.watch.take() {
            old.unsubscribe(id);
        }

        let notices = Arc::clone(&self.notices);
        let id = store.subscribe(move |change| {
            let message = match &change.action {
                TaskAction::SeedLoaded { .. } => {
                    format!("Loaded {} tasks", change.state.tasks.len())
                }
                TaskAction::SeedFailed(message) => format!("{message} (type reload to retry)"),
                _ => return,
            };
            info!(notice = %message, "seed finished");
            notices.lock().push(message);
        });
        self.watch = Some((store, id));
    }

    fn flush_notices(&mut self) -> anyhow::Result<()> {
        let pending = std::mem::take(&mut *self.notices.lock());
        for notice in pending {
            writeln!(self.out, "{}", self.renderer.notice_line(&notice))?;
        }
        Ok(())
    }

    fn write_prompt(&mut self) -> anyhow::Result<()> {
        if !self.prompt {
            return Ok(());
        }
        let who = self
            .app
            .auth
            .user()
            .map(|user| user.name)
            .unwrap_or_else(|| "guest".to_string());
        write!(self.out, "{who}> ")?;
        self.out.flush()?;
        Ok(())
    }

    fn not_found(&mut self, id: TaskId) -> anyhow::Result<()> {
        debug!(task_id = %id, "task not found");
        self.error("Task not found")
    }

    fn error(&mut self, message: &str) -> anyhow::Result<()> {
        writeln!(self.out, "{}", self.renderer.error_line(message))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{Config, Settings};
    use crate::seed::{SeedBackend, StaticSeedSource};
    use crate::store::theme::ThemeStore;

    fn app(seeded: bool) -> AppContext {
        let mut settings = Settings::from_config(&Config::default()).expect("settings");
        settings.auth.latency = Duration::ZERO;
        let backend = seeded.then(|| SeedBackend::Static(StaticSeedSource::demo()));
        AppContext::with_backend(settings, backend)
    }

    fn shell(app: &AppContext) -> Shell<Vec<u8>> {
        Shell::new(app.clone(), Renderer::new(false, ThemeStore::default()), Vec::new())
    }

    async fn run(app: &AppContext, script: &str) -> String {
        let mut shell = shell(app).with_await_seed(true);
        shell.run(script.as_bytes()).await.expect("shell run");
        String::from_utf8(shell.into_inner()).expect("utf8")
    }

    #[tokio::test]
    async fn protected_commands_redirect_to_login() {
        let app = app(false);
        let out = run(&app, "list\nadd Buy milk\n").await;
        assert_eq!(out.matches("redirecting to login").count(), 2);
        assert!(app.tasks().tasks().is_empty());
    }

    #[tokio::test]
    async fn login_unlocks_the_task_views() {
        let app = app(false);
        let out = run(
            &app,
            "login demo@example.com nope\ndemo\nadd \"Buy milk\" cat:3\nlist\nwhoami\n",
        )
        .await;
        assert!(out.contains("Invalid email or password"), "{out}");
        assert!(out.contains("Welcome, Demo User"), "{out}");
        assert!(out.contains("Added task 1"), "{out}");
        assert!(out.contains("Buy milk"), "{out}");
        assert!(out.contains("email   demo@example.com"), "{out}");
    }

    #[tokio::test]
    async fn validation_errors_keep_the_loop_going() {
        let app = app(false);
        let out = run(&app, "demo\nadd ab\nfilter cat:99\nshow 7\nbogus\nadd Pay rent\n").await;
        assert!(out.contains("Task title must be at least 3 characters"), "{out}");
        assert!(out.contains("unknown category: 99"), "{out}");
        assert!(out.contains("Task not found"), "{out}");
        assert!(out.contains("unknown command: bogus"), "{out}");
        assert!(out.contains("Added task 1"), "{out}");
    }

    #[tokio::test]
    async fn quit_stops_reading() {
        let app = app(false);
        let out = run(&app, "theme dark\nquit\ntheme light\n").await;
        assert_eq!(out, "Theme: dark\n");
        assert!(app.theme.is_dark());
    }

    #[tokio::test]
    async fn seed_and_reload_are_reported() {
        let app = app(true);
        let mut shell = shell(&app).with_await_seed(true);
        app.start_seed().expect("seed").await.expect("seed task");
        shell
            .run("demo\ndelete 1\nreload\nstatus\n".as_bytes())
            .await
            .expect("shell run");
        let out = String::from_utf8(shell.into_inner()).expect("utf8");

        assert_eq!(out.matches("Loaded 6 tasks").count(), 2, "{out}");
        assert!(out.contains("Deleted task 1"), "{out}");
        assert_eq!(app.tasks().tasks().len(), 6);
        assert!(out.contains("loading   no"), "{out}");
    }
}
