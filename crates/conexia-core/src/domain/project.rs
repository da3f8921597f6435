//! Project records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::CompanyId;
use crate::store::Record;

/// A project belonging to a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique project identifier, assigned by the backend
    #[serde(deserialize_with = "super::deserialize_id")]
    pub id: String,
    /// Owning company
    #[serde(rename = "empresa")]
    pub company: CompanyId,
    /// Display name, unique per company ignoring case
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "ativo", default = "default_active")]
    pub active: bool,
    /// Set by the backend on insert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Project {
    /// Case-insensitive name comparison used for uniqueness
    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

impl Record for Project {
    const KIND: &'static str = "project";
    const ID_COLUMN: &'static str = "id";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Payload for creating a project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProject {
    #[serde(rename = "empresa")]
    pub company: CompanyId,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "ativo")]
    pub active: bool,
}

impl NewProject {
    /// New projects always start active
    pub fn new(company: CompanyId, name: impl Into<String>) -> Self {
        Self {
            company,
            name: name.into(),
            active: true,
        }
    }
}
