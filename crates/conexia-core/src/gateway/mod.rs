//! Remote data gateway
//!
//! Table-scoped CRUD plus a push subscription channel, as offered by the
//! hosted backend. The gateway owns persistence; everything in this crate
//! treats it as the source of truth.
//!
//! # Adapters
//!
//! - [`InMemoryGateway`]: in-process tables with synchronous push delivery
//! - [`RestGateway`]: PostgREST-style HTTP client, no realtime channel

pub mod memory;
pub mod rest;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use memory::InMemoryGateway;
pub use rest::{RestGateway, RestGatewayBuilder};

/// A row change pushed by the subscription channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Insert { record: Value },
    Update { record: Value },
    Delete { old_record: Value },
}

impl ChangeEvent {
    /// The row this event carries (the removed row for deletes)
    pub fn row(&self) -> &Value {
        match self {
            Self::Insert { record } | Self::Update { record } => record,
            Self::Delete { old_record } => old_record,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Callback invoked for every change that matches a subscription
pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// Token identifying one live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub(crate) u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Conjunction of column equality conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Filter that matches every row
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(column, value)
    }

    pub fn and_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Whether `row` satisfies every condition
    pub fn matches(&self, row: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(column, value)| format!("{}={}", column, value))
            .collect();
        f.write_str(&parts.join(" AND "))
    }
}

/// Backend-as-a-service client
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Fetch every row of `table` matching `filter`
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>>;

    /// Insert one row and return it as stored
    async fn create(&self, table: &str, record: Value) -> Result<Value>;

    /// Delete every row matching `filter`, returning how many were removed
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64>;

    /// Register `handler` for changes to rows of `table` matching `filter`
    async fn subscribe(
        &self,
        table: &str,
        filter: &Filter,
        handler: ChangeHandler,
    ) -> Result<SubscriptionHandle>;

    /// Release a subscription; unknown handles are ignored
    fn unsubscribe(&self, handle: SubscriptionHandle);
}
