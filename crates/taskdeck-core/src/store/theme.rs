use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use tracing::debug;

use crate::observer::{Listeners, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        })
    }
}

impl FromStr for ThemeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" | "day" => Ok(ThemeMode::Light),
            "dark" | "night" => Ok(ThemeMode::Dark),
            other => Err(anyhow!("invalid theme: {other} (expected light or dark)")),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    mode: Mutex<ThemeMode>,
    listeners: Listeners<ThemeMode>,
}

#[derive(Debug, Clone, Default)]
pub struct ThemeStore {
    inner: Arc<Inner>,
}

impl ThemeStore {
    pub fn new(mode: ThemeMode) -> Self {
        Self {
            inner: Arc::new(Inner {
                mode: Mutex::new(mode),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn mode(&self) -> ThemeMode {
        *self.inner.mode.lock()
    }

    pub fn is_dark(&self) -> bool {
        self.mode() == ThemeMode::Dark
    }

    pub fn toggle(&self) -> ThemeMode {
        let next = {
            let mut mode = self.inner.mode.lock();
            *mode = mode.toggled();
            *mode
        };
        debug!(theme = %next, "theme toggled");
        self.inner.listeners.notify(&next);
        next
    }

    pub fn set(&self, mode: ThemeMode) {
        {
            let mut current = self.inner.mode.lock();
            if *current == mode {
                return;
            }
            *current = mode;
        }
        self.inner.listeners.notify(&mode);
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&ThemeMode) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }
}
