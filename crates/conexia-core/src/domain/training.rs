//! Training records

use serde::{Deserialize, Serialize};

use crate::session::CompanyId;
use crate::store::Record;

/// Phase name the backend uses for completed trainings
pub const FINISHED_PHASE: &str = "finalizado";

/// Pipeline phase of a training; free-form on the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingPhase(String);

impl TrainingPhase {
    pub fn new(phase: impl Into<String>) -> Self {
        Self(phase.into())
    }

    pub fn finished() -> Self {
        Self::new(FINISHED_PHASE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Finished trainings no longer accept uploads
    pub fn is_finished(&self) -> bool {
        self.0 == FINISHED_PHASE
    }
}

impl std::fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A training belonging to a company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Training {
    #[serde(rename = "uid", deserialize_with = "super::deserialize_id")]
    pub id: String,
    #[serde(rename = "empresa")]
    pub company: CompanyId,
    #[serde(rename = "nome", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "fase")]
    pub phase: TrainingPhase,
}

impl Record for Training {
    const KIND: &'static str = "training";
    const ID_COLUMN: &'static str = "uid";

    fn id(&self) -> &str {
        &self.id
    }
}
