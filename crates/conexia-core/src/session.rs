//! Session context
//!
//! Holds the signed-in company identity and user profile. The context is
//! passed explicitly to every component that needs it; components that react
//! to identity changes take a [`watch`] receiver from [`SessionContext::watch`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::error::{Error, Result};

/// Opaque identifier of the company that owns projects and trainings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(String);

impl CompanyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CompanyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CompanyId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Display data for the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

/// Everything the session knows at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub company: Option<CompanyId>,
    pub user: Option<UserProfile>,
}

/// Shared, cloneable handle to the current session
#[derive(Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<SessionState>>,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("company", &self.company())
            .finish()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Create a signed-out session
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self {
            state: Arc::new(tx),
        }
    }

    /// Create a session already signed in to `company`
    pub fn with_company(company: impl Into<CompanyId>) -> Self {
        let session = Self::new();
        session.set_company(Some(company.into()));
        session
    }

    /// Record a successful sign-in
    pub fn sign_in(&self, company: CompanyId, user: Option<UserProfile>) {
        info!(company = %company, "Session signed in");
        self.state.send_replace(SessionState {
            company: Some(company),
            user,
        });
    }

    /// Replace only the company identity
    pub fn set_company(&self, company: Option<CompanyId>) {
        self.state.send_if_modified(|state| {
            if state.company == company {
                return false;
            }
            state.company = company;
            true
        });
    }

    pub fn company(&self) -> Option<CompanyId> {
        self.state.borrow().company.clone()
    }

    /// Company identity, or [`Error::MissingIdentity`] when signed out
    pub fn require_company(&self) -> Result<CompanyId> {
        self.company().ok_or(Error::MissingIdentity)
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user.clone()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every session change
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Drop identity and profile in a single update
    pub fn clear(&self) {
        self.state.send_replace(SessionState::default());
        info!("Session cleared");
    }
}
