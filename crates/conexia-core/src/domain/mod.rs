//! Records owned by a company account
//!
//! Field names follow the backend's column names on the wire (`empresa`,
//! `nome`, `ativo`, `fase`) and idiomatic names in Rust.

pub mod project;
pub mod training;

pub use project::{NewProject, Project};
pub use training::{Training, TrainingPhase};

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;

/// Primary keys arrive as text or as integers depending on the column type
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or number id, found {}",
            other
        ))),
    }
}
