pub mod auth;
pub mod tasks;
pub mod theme;

pub use auth::{AuthSettings, AuthStore, Credentials, DemoAccount, LoginOutcome, Session, User};
pub use tasks::{TaskAction, TaskChange, TaskState, TaskStats, TaskStore};
pub use theme::{ThemeMode, ThemeStore};
