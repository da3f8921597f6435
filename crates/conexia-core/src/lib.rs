//! Conexia Core Library
//!
//! Client-side state for the Conexia company dashboard:
//! - Record stores kept in sync with the backend through push subscriptions
//! - Project list controller (pagination, view mode, add/delete)
//! - Training board
//! - Navigation shell and session context
//! - Gateways (PostgREST over HTTP, in-memory)
//! - Configuration and local UI preferences

pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod navigation;
pub mod preferences;
pub mod session;
pub mod store;
pub mod view;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::{Project, Training};
    pub use crate::error::{Error, Result};
    pub use crate::gateway::Gateway;
    pub use crate::session::{CompanyId, SessionContext};
    pub use crate::store::{ProjectStore, TrainingStore};
}
