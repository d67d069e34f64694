use std::time::Duration;

use taskdeck_core::app::AppContext;
use taskdeck_core::config::{Config, Settings};
use taskdeck_core::render::Renderer;
use taskdeck_core::seed::{HttpSeedSource, SeedBackend, StaticSeedSource};
use taskdeck_core::shell::Shell;
use taskdeck_core::store::ThemeStore;

fn settings() -> Settings {
    let mut cfg = Config::default();
    cfg.apply_overrides([("auth.latency_ms".to_string(), "0".to_string())]);
    Settings::from_config(&cfg).expect("settings")
}

async fn session(backend: Option<SeedBackend>, script: &str) -> (AppContext, String) {
    let app = AppContext::with_backend(settings(), backend);
    let mut shell = Shell::new(
        app.clone(),
        Renderer::new(false, ThemeStore::default()),
        Vec::new(),
    )
    .with_await_seed(true);

    if let Some(handle) = app.start_seed() {
        handle.await.expect("seed task");
    }
    shell.run(script.as_bytes()).await.expect("shell run");
    let out = String::from_utf8(shell.into_inner()).expect("utf8 output");
    (app, out)
}

#[tokio::test]
async fn offline_session_filters_and_edits() {
    let script = "\
demo
quick completed
filter search:gym
list
clear
edit 3 prio:high done:yes
show 3
stats
logout
list
";
    let (app, out) = session(Some(SeedBackend::Static(StaticSeedSource::demo())), script).await;

    assert!(out.contains("Loaded 6 tasks"), "{out}");
    assert!(out.contains("Showing 2 of 6 tasks"), "{out}");
    assert!(out.contains("Showing 1 of 6 tasks"), "{out}");
    assert!(out.contains("Renew gym membership"), "{out}");
    assert!(out.contains("Filters cleared"), "{out}");
    assert!(out.contains("Updated task 3"), "{out}");
    assert!(out.contains("priority  high"), "{out}");
    assert!(out.contains("status    completed"), "{out}");
    assert!(out.contains("category  Shopping"), "{out}");
    assert!(out.contains("completed  3"), "{out}");
    assert!(out.trim_end().ends_with("login required: redirecting to login (try `demo`)"), "{out}");

    let tasks = app.tasks();
    assert!(!tasks.has_active_filters());
    assert_eq!(tasks.stats().completed, 3);
}

#[tokio::test]
async fn categories_can_be_added_and_used() {
    let script = "\
demo
category Errands color:#112233
add \"Post the parcel\" cat:6 prio:low desc:\"before noon\"
categories
filter cat:6
list
";
    let (app, out) = session(None, script).await;

    assert!(out.contains("Added category 6 (Errands)"), "{out}");
    assert!(out.contains("Added task 1"), "{out}");
    assert!(out.contains("#112233"), "{out}");
    assert!(out.contains("Showing 1 of 1 tasks"), "{out}");

    let task = app
        .tasks()
        .task(taskdeck_core::task::TaskId(1))
        .expect("task added");
    assert_eq!(task.description, "before noon");
}

#[tokio::test]
async fn failed_seed_is_reported_and_reload_retries() {
    let source = HttpSeedSource::new("http://127.0.0.1:9/todos", Duration::from_secs(2))
        .expect("http source");
    let (app, out) = session(
        Some(SeedBackend::Http(source)),
        "demo\nlist\nadd Still works\nreload\nstatus\n",
    )
    .await;

    assert_eq!(
        out.matches("Failed to fetch tasks (type reload to retry)").count(),
        3,
        "{out}"
    );
    assert!(out.contains("Added task 1"), "{out}");
    assert!(out.contains("error     Failed to fetch tasks"), "{out}");
    assert!(app.tasks().tasks().is_empty());
}
