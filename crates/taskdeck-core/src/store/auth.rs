use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::AuthError;
use crate::observer::{Listeners, SubscriptionId};

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "password";
pub const DEMO_NAME: &str = "Demo User";
pub const DEMO_AVATAR: &str = "https://ui-avatars.com/api/?name=Demo+User";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// The one account the mocked login accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoAccount {
    pub email: String,
    pub password: String,
    pub name: String,
    pub avatar: String,
}

impl Default for DemoAccount {
    fn default() -> Self {
        Self {
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
            name: DEMO_NAME.to_string(),
            avatar: DEMO_AVATAR.to_string(),
        }
    }
}

impl DemoAccount {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.email, &self.password)
    }

    fn verify(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let email_ok = credentials
            .email
            .trim()
            .eq_ignore_ascii_case(self.email.trim());
        if email_ok && credentials.password == self.password {
            Ok(User {
                name: self.name.clone(),
                email: self.email.clone(),
                avatar: self.avatar.clone(),
            })
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthSettings {
    pub account: DemoAccount,
    /// Simulated round trip before credentials are checked.
    pub latency: Duration,
}

/// Either no user, or a fully populated one. `error` holds the message of
/// the last failed login until the next attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub user: Option<User>,
    pub error: Option<String>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AuthAction {
    BeginAttempt,
    LoginSucceeded(User),
    LoginFailed(String),
    Logout,
}

impl Session {
    fn apply(&mut self, action: AuthAction) -> bool {
        match action {
            AuthAction::BeginAttempt => self.error.take().is_some(),
            AuthAction::LoginSucceeded(user) => {
                *self = Session {
                    user: Some(user),
                    error: None,
                };
                true
            }
            AuthAction::LoginFailed(message) => {
                *self = Session {
                    user: None,
                    error: Some(message),
                };
                true
            }
            AuthAction::Logout => {
                let changed = self.user.is_some() || self.error.is_some();
                *self = Session::default();
                changed
            }
        }
    }
}

#[derive(Debug)]
struct Inner {
    settings: AuthSettings,
    session: Mutex<Session>,
    listeners: Listeners<Session>,
}

#[derive(Debug, Clone)]
pub struct AuthStore {
    inner: Arc<Inner>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new(AuthSettings::default())
    }
}

impl AuthStore {
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                session: Mutex::new(Session::default()),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Checks `credentials` against the demo account. Never fails; the
    /// outcome says whether the session is now authenticated.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: Credentials) -> LoginOutcome {
        self.dispatch(AuthAction::BeginAttempt);

        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return self.reject(AuthError::MissingCredentials);
        }

        let latency = self.inner.settings.latency;
        if !latency.is_zero() {
            debug!(latency_ms = latency.as_millis() as u64, "simulating login round trip");
            tokio::time::sleep(latency).await;
        }

        match self.inner.settings.account.verify(&credentials) {
            Ok(user) => {
                info!(user = %user.name, "login succeeded");
                self.dispatch(AuthAction::LoginSucceeded(user));
                LoginOutcome {
                    success: true,
                    error: None,
                }
            }
            Err(err) => self.reject(err),
        }
    }

    pub fn logout(&self) {
        if self.dispatch(AuthAction::Logout) {
            info!("logged out");
        }
    }

    pub fn demo_credentials(&self) -> Credentials {
        self.inner.settings.account.credentials()
    }

    pub fn session(&self) -> Session {
        self.inner.session.lock().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.session.lock().user.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.session.lock().error.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.lock().is_authenticated()
    }

    /// Gate for protected views.
    pub fn require_user(&self) -> Result<User, AuthError> {
        self.user().ok_or(AuthError::NotAuthenticated)
    }

    fn reject(&self, err: AuthError) -> LoginOutcome {
        warn!(error = %err, "login rejected");
        let message = err.to_string();
        self.dispatch(AuthAction::LoginFailed(message.clone()));
        LoginOutcome {
            success: false,
            error: Some(message),
        }
    }

    fn dispatch(&self, action: AuthAction) -> bool {
        let snapshot = {
            let mut session = self.inner.session.lock();
            if !session.apply(action) {
                return false;
            }
            session.clone()
        };
        self.inner.listeners.notify(&snapshot);
        true
    }
}
