//! Startup seed: fetches a page of demo todos and maps them onto local tasks.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::category::Category;
use crate::error::FetchError;
use crate::task::{Priority, Task, TaskId};

pub const DEFAULT_SEED_URL: &str = "https://jsonplaceholder.typicode.com/todos";
pub const DEFAULT_SEED_LIMIT: usize = 20;

const SEED_AGE_WINDOW_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Item shape returned by the remote list endpoint. Extra fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteTodo {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

pub trait SeedSource: Send + Sync {
    fn fetch_todos(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<RemoteTodo>, FetchError>> + Send;
}

/// How a seed result that lands after local edits is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedPolicy {
    /// Install the seed only if the task list is still empty.
    #[default]
    FillIfEmpty,
    /// Overwrite the task list unconditionally.
    Replace,
}

impl fmt::Display for SeedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SeedPolicy::FillIfEmpty => "fill-if-empty",
            SeedPolicy::Replace => "replace",
        })
    }
}

impl FromStr for SeedPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fill-if-empty" | "fill" => Ok(SeedPolicy::FillIfEmpty),
            "replace" => Ok(SeedPolicy::Replace),
            other => Err(anyhow!(
                "invalid seed policy: {other} (expected fill-if-empty or replace)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOptions {
    pub limit: usize,
    pub policy: SeedPolicy,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEED_LIMIT,
            policy: SeedPolicy::default(),
        }
    }
}

/// Maps remote todos onto tasks. Categories and priorities are assigned
/// round-robin by position; `created_at` lands somewhere in the 30 days
/// before `now`.
pub fn map_remote_todos<R: Rng + ?Sized>(
    items: Vec<RemoteTodo>,
    categories: &[Category],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Task> {
    if categories.is_empty() {
        warn!("no categories to distribute seeded tasks over");
        return Vec::new();
    }

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let age = chrono::Duration::milliseconds(rng.random_range(0..SEED_AGE_WINDOW_MS));
            Task {
                id: TaskId(item.id),
                description: format!("Task description for {}", item.title),
                title: item.title,
                category_id: categories[idx % categories.len()].id,
                priority: Priority::ROTATION[idx % Priority::ROTATION.len()],
                completed: item.completed,
                created_at: now - age,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct HttpSeedSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSeedSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            anyhow::bail!("seed URL is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client for seed fetch")?;
        Ok(Self { client, url })
    }

    fn page_url(&self, limit: usize) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{sep}_limit={limit}", self.url)
    }
}

impl SeedSource for HttpSeedSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_todos(&self, limit: usize) -> Result<Vec<RemoteTodo>, FetchError> {
        let url = self.page_url(limit);
        debug!(url = %url, "fetching seed page");

        let response = self
            .client
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(transport_error)?;
        let items: Vec<RemoteTodo> =
            serde_json::from_str(&body).map_err(|err| FetchError::Decode(err.to_string()))?;

        info!(count = items.len(), "fetched seed todos");
        Ok(items)
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err.to_string())
    }
}

/// Fixed in-memory seed list, used for offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticSeedSource {
    items: Vec<RemoteTodo>,
}

impl StaticSeedSource {
    pub fn new(items: Vec<RemoteTodo>) -> Self {
        Self { items }
    }

    pub fn demo() -> Self {
        let titles = [
            ("Plan the sprint review", false),
            ("Renew gym membership", true),
            ("Buy groceries for the week", false),
            ("Schedule dentist appointment", false),
            ("Finish the Rust ownership chapter", true),
            ("Reply to project emails", false),
        ];
        Self::new(
            titles
                .into_iter()
                .zip(1u64..)
                .map(|((title, completed), id)| RemoteTodo {
                    id,
                    title: title.to_string(),
                    completed,
                })
                .collect(),
        )
    }
}

impl SeedSource for StaticSeedSource {
    async fn fetch_todos(&self, limit: usize) -> Result<Vec<RemoteTodo>, FetchError> {
        Ok(self.items.iter().take(limit).cloned().collect())
    }
}

/// The seed source chosen by configuration.
#[derive(Debug, Clone)]
pub enum SeedBackend {
    Http(HttpSeedSource),
    Static(StaticSeedSource),
}

impl SeedSource for SeedBackend {
    async fn fetch_todos(&self, limit: usize) -> Result<Vec<RemoteTodo>, FetchError> {
        match self {
            SeedBackend::Http(source) => source.fetch_todos(limit).await,
            SeedBackend::Static(source) => source.fetch_todos(limit).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::category::{CategoryId, default_categories};

    fn todos(n: u64) -> Vec<RemoteTodo> {
        (1..=n)
            .map(|id| RemoteTodo {
                id,
                title: format!("todo {id}"),
                completed: id % 2 == 0,
            })
            .collect()
    }

    #[test]
    fn maps_round_robin_and_backdates() {
        let now = Utc
            .with_ymd_and_hms(2026, 5, 1, 12, 0, 0)
            .single()
            .expect("valid now");
        let mut rng = StdRng::seed_from_u64(7);
        let tasks = map_remote_todos(todos(7), &default_categories(), now, &mut rng);

        let cats: Vec<u64> = tasks.iter().map(|t| t.category_id.0).collect();
        assert_eq!(cats, [1, 2, 3, 4, 5, 1, 2]);

        let prios: Vec<Priority> = tasks.iter().map(|t| t.priority).collect();
        assert_eq!(
            prios,
            [
                Priority::Low,
                Priority::Medium,
                Priority::High,
                Priority::Low,
                Priority::Medium,
                Priority::High,
                Priority::Low,
            ]
        );

        let window = chrono::Duration::days(30);
        for task in &tasks {
            assert!(task.created_at <= now);
            assert!(task.created_at > now - window);
            assert_eq!(
                task.description,
                format!("Task description for {}", task.title)
            );
        }
        assert_eq!(tasks[1].id, TaskId(2));
        assert!(tasks[1].completed);
        assert_eq!(tasks[0].category_id, CategoryId(1));
    }

    #[test]
    fn remote_todo_ignores_extra_fields() {
        let json = r#"[{"userId":1,"id":4,"title":"et porro tempora","completed":true}]"#;
        let items: Vec<RemoteTodo> = serde_json::from_str(json).expect("decode todos");
        assert_eq!(
            items,
            vec![RemoteTodo {
                id: 4,
                title: "et porro tempora".to_string(),
                completed: true,
            }]
        );
    }

    #[test]
    fn page_url_appends_limit() {
        let source = HttpSeedSource::new(DEFAULT_SEED_URL, Duration::from_secs(1))
            .expect("build source");
        assert_eq!(
            source.page_url(20),
            "https://jsonplaceholder.typicode.com/todos?_limit=20"
        );
        let source = HttpSeedSource::new("http://localhost/todos?user=1", Duration::from_secs(1))
            .expect("build source");
        assert_eq!(source.page_url(5), "http://localhost/todos?user=1&_limit=5");
    }

    #[test]
    fn seed_policy_parses() {
        assert_eq!(
            "replace".parse::<SeedPolicy>().expect("policy"),
            SeedPolicy::Replace
        );
        assert_eq!(
            "Fill-If-Empty".parse::<SeedPolicy>().expect("policy"),
            SeedPolicy::FillIfEmpty
        );
        assert!("merge".parse::<SeedPolicy>().is_err());
    }

    #[tokio::test]
    async fn static_source_honours_limit() {
        let source = StaticSeedSource::demo();
        let items = source.fetch_todos(2).await.expect("static fetch");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 1);
    }
}
