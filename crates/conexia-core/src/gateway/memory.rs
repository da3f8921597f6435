//! In-process gateway
//!
//! Keeps tables in memory and pushes every change to matching subscribers
//! synchronously, after the table lock has been released. Supports unique
//! constraints, injected failures and call counters so callers can assert
//! which requests were actually issued.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{ChangeEvent, ChangeHandler, Filter, Gateway, SubscriptionHandle};
use crate::error::{Error, Result};

const DEFAULT_ID_COLUMN: &str = "id";

/// Number of requests received, per operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub select: usize,
    pub create: usize,
    pub delete: usize,
    pub subscribe: usize,
}

impl CallCounts {
    /// Requests that would have crossed the network
    pub fn total(&self) -> usize {
        self.select + self.create + self.delete + self.subscribe
    }
}

struct Subscriber {
    table: String,
    filter: Filter,
    handler: ChangeHandler,
}

#[derive(Default)]
struct Faults {
    select: Option<String>,
    create: Option<String>,
    delete: Option<String>,
    subscribe: Option<String>,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    id_columns: HashMap<String, String>,
    unique: HashMap<String, Vec<Vec<String>>>,
    subscribers: BTreeMap<u64, Subscriber>,
    next_handle: u64,
    faults: Faults,
    calls: CallCounts,
}

impl State {
    fn id_column(&self, table: &str) -> &str {
        self.id_columns
            .get(table)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ID_COLUMN)
    }

    fn handlers_for(&self, table: &str, row: &Value) -> Vec<ChangeHandler> {
        self.subscribers
            .values()
            .filter(|s| s.table == table && s.filter.matches(row))
            .map(|s| s.handler.clone())
            .collect()
    }

    fn violates_unique(&self, table: &str, row: &Value) -> Option<String> {
        let constraints = self.unique.get(table)?;
        let rows = self.tables.get(table)?;
        constraints.iter().find_map(|columns| {
            let clash = rows
                .iter()
                .any(|existing| columns.iter().all(|c| existing.get(c) == row.get(c)));
            clash.then(|| {
                format!(
                    "duplicate key value violates unique constraint \"{}_{}_key\"",
                    table,
                    columns.join("_")
                )
            })
        })
    }
}

/// Gateway backed by in-memory tables
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl std::fmt::Debug for InMemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("InMemoryGateway")
            .field("tables", &state.tables.len())
            .field("subscriptions", &state.subscribers.len())
            .finish()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `column` as the primary key of `table` (defaults to `id`)
    pub fn with_id_column(self, table: &str, column: &str) -> Self {
        self.lock()
            .id_columns
            .insert(table.to_string(), column.to_string());
        self
    }

    /// Reject inserts whose `columns` all equal those of an existing row
    pub fn with_unique(self, table: &str, columns: &[&str]) -> Self {
        self.lock()
            .unique
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Delay every async operation, to widen race windows
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert rows without notifying subscribers
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Push a raw change to subscribers without touching the table
    pub fn emit(&self, table: &str, event: ChangeEvent) {
        let handlers = self.lock().handlers_for(table, event.row());
        for handler in handlers {
            handler(event.clone());
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn fail_next_select(&self, message: impl Into<String>) {
        self.lock().faults.select = Some(message.into());
    }

    pub fn fail_next_create(&self, message: impl Into<String>) {
        self.lock().faults.create = Some(message.into());
    }

    pub fn fail_next_delete(&self, message: impl Into<String>) {
        self.lock().faults.delete = Some(message.into());
    }

    /// Refuse every subscription attempt until called again with `None`
    pub fn refuse_subscriptions(&self, reason: Option<String>) {
        self.lock().faults.subscribe = reason;
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Live subscriptions on `table` registered with exactly `filter`
    pub fn subscription_count(&self, table: &str, filter: &Filter) -> usize {
        self.lock()
            .subscribers
            .values()
            .filter(|s| s.table == table && &s.filter == filter)
            .count()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.calls.select += 1;
        if let Some(message) = state.faults.select.take() {
            return Err(Error::Gateway(message));
        }

        Ok(state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn create(&self, table: &str, record: Value) -> Result<Value> {
        self.simulate_latency().await;
        let (row, handlers) = {
            let mut state = self.lock();
            state.calls.create += 1;
            if let Some(message) = state.faults.create.take() {
                return Err(Error::Gateway(message));
            }

            let Value::Object(mut fields) = record else {
                return Err(Error::Gateway(format!(
                    "invalid input syntax: row for '{}' must be a JSON object",
                    table
                )));
            };
            let id_column = state.id_column(table).to_string();
            fields
                .entry(id_column)
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            fields
                .entry("created_at")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
            let row = Value::Object(fields);

            if let Some(message) = state.violates_unique(table, &row) {
                return Err(Error::Gateway(message));
            }

            state
                .tables
                .entry(table.to_string())
                .or_default()
                .push(row.clone());
            let handlers = state.handlers_for(table, &row);
            (row, handlers)
        };

        debug!(table, subscribers = handlers.len(), "Row inserted");
        let event = ChangeEvent::Insert {
            record: row.clone(),
        };
        for handler in handlers {
            handler(event.clone());
        }
        Ok(row)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64> {
        self.simulate_latency().await;
        let notifications = {
            let mut state = self.lock();
            state.calls.delete += 1;
            if let Some(message) = state.faults.delete.take() {
                return Err(Error::Gateway(message));
            }

            let rows = state.tables.entry(table.to_string()).or_default();
            let (removed, kept): (Vec<Value>, Vec<Value>) =
                std::mem::take(rows).into_iter().partition(|r| filter.matches(r));
            *rows = kept;

            removed
                .into_iter()
                .map(|row| {
                    let handlers = state.handlers_for(table, &row);
                    (row, handlers)
                })
                .collect::<Vec<_>>()
        };

        let count = notifications.len() as u64;
        debug!(table, %filter, count, "Rows deleted");
        for (row, handlers) in notifications {
            let event = ChangeEvent::Delete { old_record: row };
            for handler in handlers {
                handler(event.clone());
            }
        }
        Ok(count)
    }

    async fn subscribe(
        &self,
        table: &str,
        filter: &Filter,
        handler: ChangeHandler,
    ) -> Result<SubscriptionHandle> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.calls.subscribe += 1;
        if let Some(reason) = &state.faults.subscribe {
            return Err(Error::Subscription(reason.clone()));
        }

        state.next_handle += 1;
        let handle = SubscriptionHandle(state.next_handle);
        state.subscribers.insert(
            handle.0,
            Subscriber {
                table: table.to_string(),
                filter: filter.clone(),
                handler,
            },
        );
        debug!(table, %filter, %handle, "Subscription registered");
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if self.lock().subscribers.remove(&handle.0).is_some() {
            debug!(%handle, "Subscription released");
        }
    }
}
