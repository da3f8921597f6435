//! Record list store
//!
//! Keeps an in-memory, company-scoped copy of one backend table and stays in
//! sync with it through the gateway's push subscription.
//!
//! # Lifecycle
//!
//! - `set_company(Some(id))`: release the previous subscription, subscribe
//!   for the new company, then run a full fetch
//! - `set_company(None)`: clear the list and the liveness flag, no fetch
//! - `close()` / drop: release the live subscription
//!
//! Changes pushed while a fetch is in flight are buffered and replayed on
//! top of the fetched rows, so a change may arrive before, during or after
//! any request. The subscription handler is the only writer of the list
//! once it is loaded; mutations issued elsewhere are never applied locally.
//!
//! Every company switch bumps a generation counter. Pushed changes, fetch
//! results and subscription handles that belong to an older generation are
//! discarded.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(ProjectStore::new(gateway, "conex_projetos", "empresa"));
//! let id = store.subscribe(Arc::new(|snapshot| println!("{} projects", snapshot.len())));
//! store.set_company(Some(CompanyId::new("acme"))).await;
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{Project, Training};
use crate::error::{Error, Result};
use crate::gateway::{ChangeEvent, ChangeHandler, Filter, Gateway, SubscriptionHandle};
use crate::session::{CompanyId, SessionContext};

/// A row type the store can mirror
pub trait Record: Clone + Send + Sync + DeserializeOwned + 'static {
    /// Human-readable record kind, used in errors and logs
    const KIND: &'static str;
    /// Primary key column on the wire
    const ID_COLUMN: &'static str;

    fn id(&self) -> &str;

    /// Primary key of a raw row, if present
    fn id_of(row: &Value) -> Option<String> {
        match row.get(Self::ID_COLUMN)? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    fn decode(row: Value) -> Result<Self> {
        serde_json::from_value(row).map_err(|e| Error::MalformedRecord {
            kind: Self::KIND,
            reason: e.to_string(),
        })
    }
}

pub type ProjectStore = RecordStore<Project>;
pub type TrainingStore = RecordStore<Training>;

/// Apply one pushed change to `records`
///
/// Inserts append, or replace in place when the id is already present.
/// Updates replace in place, or append when the id is unknown. Deletes remove
/// the matching id and close the gap. Returns whether the list changed.
pub fn apply_change<R: Record>(records: &mut Vec<R>, event: &ChangeEvent) -> Result<bool> {
    match event {
        ChangeEvent::Insert { record } | ChangeEvent::Update { record } => {
            let incoming = R::decode(record.clone())?;
            match records.iter().position(|r| r.id() == incoming.id()) {
                Some(index) => records[index] = incoming,
                None => records.push(incoming),
            }
            Ok(true)
        }
        ChangeEvent::Delete { old_record } => {
            let id = R::id_of(old_record).ok_or_else(|| Error::MalformedRecord {
                kind: R::KIND,
                reason: format!("delete event without `{}`", R::ID_COLUMN),
            })?;
            let before = records.len();
            records.retain(|r| r.id() != id);
            Ok(records.len() != before)
        }
    }
}

/// Point-in-time view of a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot<R> {
    pub company: Option<CompanyId>,
    pub records: Vec<R>,
    pub loading: bool,
    /// Set when the last fetch failed; distinct from an empty list
    pub error: Option<String>,
    /// Liveness of the push subscription
    pub subscribed: bool,
}

impl<R> StoreSnapshot<R> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Callback notified with a fresh snapshot after every state change
pub type Listener<R> = Arc<dyn Fn(&StoreSnapshot<R>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Inner<R> {
    company: Option<CompanyId>,
    generation: u64,
    records: Vec<R>,
    loading: bool,
    error: Option<String>,
    subscribed: bool,
    subscription: Option<SubscriptionHandle>,
    /// Some while a fetch is in flight
    pending: Option<Vec<ChangeEvent>>,
    listeners: Vec<(ListenerId, Listener<R>)>,
    next_listener: u64,
    dirty: bool,
}

impl<R: Record> Inner<R> {
    fn new() -> Self {
        Self {
            company: None,
            generation: 0,
            records: Vec::new(),
            loading: false,
            error: None,
            subscribed: false,
            subscription: None,
            pending: None,
            listeners: Vec::new(),
            next_listener: 0,
            dirty: false,
        }
    }

    fn snapshot(&self) -> StoreSnapshot<R> {
        StoreSnapshot {
            company: self.company.clone(),
            records: self.records.clone(),
            loading: self.loading,
            error: self.error.clone(),
            subscribed: self.subscribed,
        }
    }

    fn apply(&mut self, event: &ChangeEvent) {
        match apply_change(&mut self.records, event) {
            Ok(changed) => {
                debug!(kind = R::KIND, change = event.kind(), changed, "Applied pushed change");
                self.dirty |= changed;
            }
            Err(err) => warn!(kind = R::KIND, error = %err, "Ignoring undecodable change"),
        }
    }
}

fn lock<R>(inner: &Mutex<Inner<R>>) -> MutexGuard<'_, Inner<R>> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run `f` under the lock, then notify listeners outside it if state changed
fn transact<R: Record, T>(inner: &Mutex<Inner<R>>, f: impl FnOnce(&mut Inner<R>) -> T) -> T {
    let (out, notification) = {
        let mut state = lock(inner);
        let out = f(&mut state);
        let notification = std::mem::take(&mut state.dirty).then(|| {
            let listeners: Vec<Listener<R>> =
                state.listeners.iter().map(|(_, l)| l.clone()).collect();
            (state.snapshot(), listeners)
        });
        (out, notification)
    };

    if let Some((snapshot, listeners)) = notification {
        for listener in listeners {
            listener(&snapshot);
        }
    }
    out
}

/// Company-scoped mirror of one table
pub struct RecordStore<R: Record> {
    gateway: Arc<dyn Gateway>,
    table: String,
    company_column: String,
    inner: Arc<Mutex<Inner<R>>>,
}

impl<R: Record> std::fmt::Debug for RecordStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner);
        f.debug_struct("RecordStore")
            .field("table", &self.table)
            .field("company", &state.company)
            .field("records", &state.records.len())
            .field("subscribed", &state.subscribed)
            .finish()
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        table: impl Into<String>,
        company_column: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            table: table.into(),
            company_column: company_column.into(),
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Gateway the store reads from; mutations go through the same client
    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// Filter selecting the rows owned by `company`
    pub fn scope(&self, company: &CompanyId) -> Filter {
        Filter::eq(self.company_column.as_str(), company.as_str())
    }

    // ========== State ==========

    pub fn snapshot(&self) -> StoreSnapshot<R> {
        lock(&self.inner).snapshot()
    }

    pub fn records(&self) -> Vec<R> {
        lock(&self.inner).records.clone()
    }

    pub fn company(&self) -> Option<CompanyId> {
        lock(&self.inner).company.clone()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner).loading
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.inner).subscribed
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.inner).error.clone()
    }

    // ========== Listeners ==========

    pub fn subscribe(&self, listener: Listener<R>) -> ListenerId {
        let mut state = lock(&self.inner);
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.push((id, listener));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut state = lock(&self.inner);
        let before = state.listeners.len();
        state.listeners.retain(|(lid, _)| *lid != id);
        state.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    // ========== Synchronization ==========

    /// Point the store at a different company, or at none
    pub async fn set_company(&self, company: Option<CompanyId>) {
        let transition = transact(&self.inner, |state| {
            if state.company == company {
                return None;
            }
            state.generation += 1;
            let previous = state.subscription.take();
            state.company = company.clone();
            state.records.clear();
            state.error = None;
            state.subscribed = false;
            state.loading = company.is_some();
            state.pending = company.as_ref().map(|_| Vec::new());
            state.dirty = true;
            Some((state.generation, previous))
        });

        let Some((generation, previous)) = transition else {
            return;
        };

        if let Some(handle) = previous {
            self.gateway.unsubscribe(handle);
            debug!(table = %self.table, %handle, "Released previous subscription");
        }

        let Some(company) = company else {
            info!(table = %self.table, "Store cleared");
            return;
        };

        info!(table = %self.table, company = %company, "Loading records");
        self.connect(generation, &company).await;
        self.load(generation, &company).await;
    }

    /// Re-run the full fetch for the current company
    ///
    /// Also retries the subscription when it is not live.
    pub async fn refresh(&self) {
        let target = transact(&self.inner, |state| {
            let company = state.company.clone()?;
            state.loading = true;
            state.error = None;
            state.pending.get_or_insert_with(Vec::new);
            state.dirty = true;
            let reconnect = state.subscription.is_none();
            Some((state.generation, company, reconnect))
        });

        let Some((generation, company, reconnect)) = target else {
            debug!(table = %self.table, "Refresh skipped: no company");
            return;
        };

        if reconnect {
            self.connect(generation, &company).await;
        }
        self.load(generation, &company).await;
    }

    /// Release the subscription and forget the company
    pub fn close(&self) {
        let previous = transact(&self.inner, |state| {
            state.generation += 1;
            state.company = None;
            state.records.clear();
            state.loading = false;
            state.subscribed = false;
            state.pending = None;
            state.dirty = true;
            state.subscription.take()
        });

        if let Some(handle) = previous {
            self.gateway.unsubscribe(handle);
            debug!(table = %self.table, %handle, "Subscription released on close");
        }
    }

    /// Keep the store pointed at the session's company
    ///
    /// The task ends once every handle to the session has been dropped.
    pub fn follow(self: &Arc<Self>, session: &SessionContext) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let mut rx = session.watch();

        tokio::spawn(async move {
            let company = rx.borrow_and_update().company.clone();
            store.set_company(company).await;

            while rx.changed().await.is_ok() {
                let company = rx.borrow_and_update().company.clone();
                store.set_company(company).await;
            }
            debug!(table = %store.table, "Session closed, no longer following");
        })
    }

    async fn connect(&self, generation: u64, company: &CompanyId) {
        let filter = self.scope(company);
        let handler = self.handler(generation);

        match self.gateway.subscribe(&self.table, &filter, handler).await {
            Ok(handle) => {
                let accepted = transact(&self.inner, |state| {
                    if state.generation != generation || state.subscription.is_some() {
                        return false;
                    }
                    state.subscription = Some(handle);
                    state.subscribed = true;
                    state.dirty = true;
                    true
                });

                if accepted {
                    debug!(table = %self.table, company = %company, %handle, "Subscribed");
                } else {
                    self.gateway.unsubscribe(handle);
                    warn!(
                        table = %self.table,
                        company = %company,
                        "Discarded subscription for superseded company"
                    );
                }
            }
            Err(err) => {
                warn!(
                    table = %self.table,
                    company = %company,
                    error = %err,
                    "Subscription unavailable, list will not update live"
                );
            }
        }
    }

    async fn load(&self, generation: u64, company: &CompanyId) {
        let filter = self.scope(company);
        let result = match self.gateway.select(&self.table, &filter).await {
            Ok(rows) => rows.into_iter().map(R::decode).collect::<Result<Vec<R>>>(),
            Err(err) => Err(err),
        };

        transact(&self.inner, |state| {
            if state.generation != generation {
                debug!(table = %self.table, "Discarded fetch result for superseded company");
                return;
            }

            state.loading = false;
            state.dirty = true;
            match result {
                Ok(records) => {
                    info!(table = %self.table, company = %company, count = records.len(), "Records loaded");
                    state.records = records;
                    state.error = None;
                }
                Err(err) => {
                    error!(table = %self.table, company = %company, error = %err, "Failed to load records");
                    state.error = Some(err.to_string());
                }
            }

            for event in state.pending.take().unwrap_or_default() {
                state.apply(&event);
            }
        });
    }

    fn handler(&self, generation: u64) -> ChangeHandler {
        let inner = Arc::downgrade(&self.inner);

        Arc::new(move |event: ChangeEvent| {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            transact(&inner, |state| {
                if state.generation != generation {
                    debug!(kind = R::KIND, "Dropped change for superseded company");
                    return;
                }
                match state.pending.as_mut() {
                    Some(pending) => pending.push(event),
                    None => state.apply(&event),
                }
            });
        })
    }
}

impl<R: Record> Drop for RecordStore<R> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.inner).subscription.take() {
            self.gateway.unsubscribe(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use serde_json::json;

    const TABLE: &str = "conex_projetos";

    fn project_row(id: &str, company: &str, name: &str) -> Value {
        json!({"id": id, "empresa": company, "nome": name, "ativo": true})
    }

    fn projects(rows: &[(&str, &str)]) -> Vec<Project> {
        rows.iter()
            .map(|(id, name)| Project::decode(project_row(id, "acme", name)).unwrap())
            .collect()
    }

    fn names(records: &[Project]) -> Vec<&str> {
        records.iter().map(|p| p.name.as_str()).collect()
    }

    fn store_with(gateway: &Arc<InMemoryGateway>) -> ProjectStore {
        ProjectStore::new(gateway.clone(), TABLE, "empresa")
    }

    // ========== apply_change ==========

    #[test]
    fn test_insert_appends_new_record() {
        let mut list = projects(&[("1", "A")]);
        let changed = apply_change(
            &mut list,
            &ChangeEvent::Insert {
                record: project_row("2", "acme", "B"),
            },
        )
        .unwrap();

        assert!(changed);
        assert_eq!(names(&list), vec!["A", "B"]);
    }

    #[test]
    fn test_insert_with_known_id_updates_in_place() {
        let mut list = projects(&[("1", "A"), ("2", "B"), ("3", "C")]);
        apply_change(
            &mut list,
            &ChangeEvent::Insert {
                record: project_row("2", "acme", "B2"),
            },
        )
        .unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(names(&list), vec!["A", "B2", "C"]);
    }

    #[test]
    fn test_update_preserves_position() {
        let mut list = projects(&[("1", "A"), ("2", "B")]);
        apply_change(
            &mut list,
            &ChangeEvent::Update {
                record: project_row("1", "acme", "A2"),
            },
        )
        .unwrap();
        assert_eq!(names(&list), vec!["A2", "B"]);
    }

    #[test]
    fn test_delete_removes_exactly_one_and_closes_gap() {
        let mut list = projects(&[("1", "A"), ("2", "B"), ("3", "C")]);
        let changed = apply_change(
            &mut list,
            &ChangeEvent::Delete {
                old_record: json!({"id": "2"}),
            },
        )
        .unwrap();

        assert!(changed);
        assert_eq!(list.len(), 2);
        assert_eq!(names(&list), vec!["A", "C"]);
    }

    #[test]
    fn test_delete_of_unknown_id_is_noop() {
        let mut list = projects(&[("1", "A")]);
        let changed = apply_change(
            &mut list,
            &ChangeEvent::Delete {
                old_record: json!({"id": "9"}),
            },
        )
        .unwrap();
        assert!(!changed);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_malformed_change_is_rejected() {
        let mut list = projects(&[("1", "A")]);
        let err = apply_change(
            &mut list,
            &ChangeEvent::Insert {
                record: json!({"id": "2"}),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { kind: "project", .. }));

        let err = apply_change(
            &mut list,
            &ChangeEvent::Delete {
                old_record: json!({"nome": "A"}),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
        assert_eq!(list.len(), 1);
    }

    // ========== RecordStore ==========

    #[tokio::test]
    async fn test_set_company_fetches_and_subscribes() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.seed(
            TABLE,
            [
                project_row("1", "acme", "Alpha"),
                project_row("2", "other", "Beta"),
            ],
        );
        let store = store_with(&gateway);

        store.set_company(Some(CompanyId::new("acme"))).await;

        let snapshot = store.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.subscribed);
        assert!(snapshot.error.is_none());
        assert_eq!(names(&snapshot.records), vec!["Alpha"]);
        assert_eq!(gateway.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_pushed_changes_keep_list_in_sync() {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = store_with(&gateway);
        store.set_company(Some(CompanyId::new("acme"))).await;

        let row = gateway
            .create(TABLE, json!({"empresa": "acme", "nome": "New"}))
            .await
            .unwrap();
        gateway
            .create(TABLE, json!({"empresa": "other", "nome": "Foreign"}))
            .await
            .unwrap();
        assert_eq!(names(&store.records()), vec!["New"]);

        let id = row["id"].as_str().unwrap();
        gateway.delete(TABLE, &Filter::eq("id", id)).await.unwrap();
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_numeric_ids_load_and_delete() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.seed(
            TABLE,
            [
                json!({"id": 1, "empresa": "acme", "nome": "Alpha"}),
                json!({"id": 2, "empresa": "acme", "nome": "Beta"}),
            ],
        );
        let store = store_with(&gateway);
        store.set_company(Some(CompanyId::new("acme"))).await;
        assert!(store.error().is_none());
        let ids: Vec<_> = store.records().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["1", "2"]);

        gateway.emit(
            TABLE,
            ChangeEvent::Delete {
                old_record: json!({"id": 1, "empresa": "acme", "nome": "Alpha"}),
            },
        );
        assert_eq!(names(&store.records()), vec!["Beta"]);
    }

    #[tokio::test]
    async fn test_none_clears_without_fetch() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.seed(TABLE, [project_row("1", "acme", "Alpha")]);
        let store = store_with(&gateway);
        store.set_company(Some(CompanyId::new("acme"))).await;
        let selects = gateway.calls().select;

        store.set_company(None).await;

        let snapshot = store.snapshot();
        assert!(snapshot.records.is_empty());
        assert!(!snapshot.subscribed);
        assert!(!snapshot.loading);
        assert_eq!(gateway.calls().select, selects);
        assert_eq!(gateway.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_same_company_is_noop() {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = store_with(&gateway);
        store.set_company(Some(CompanyId::new("acme"))).await;
        store.set_company(Some(CompanyId::new("acme"))).await;

        assert_eq!(gateway.calls().select, 1);
        assert_eq!(gateway.calls().subscribe, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_distinct_from_empty() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.fail_next_select("connection refused");
        let store = store_with(&gateway);

        store.set_company(Some(CompanyId::new("acme"))).await;

        let snapshot = store.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.error.unwrap().contains("connection refused"));

        gateway.seed(TABLE, [project_row("1", "acme", "Alpha")]);
        store.refresh().await;
        let snapshot = store.snapshot();
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_row_fails_fetch() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.seed(TABLE, [json!({"id": "1", "empresa": "acme"})]);
        let store = store_with(&gateway);

        store.set_company(Some(CompanyId::new("acme"))).await;
        assert!(store.error().unwrap().contains("Malformed project record"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_subscription_failure_degrades_liveness() {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway.refuse_subscriptions(Some("realtime disabled".to_string()));
        gateway.seed(TABLE, [project_row("1", "acme", "Alpha")]);
        let store = store_with(&gateway);

        store.set_company(Some(CompanyId::new("acme"))).await;

        let snapshot = store.snapshot();
        assert!(!snapshot.subscribed);
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot.len(), 1);

        gateway.refuse_subscriptions(None);
        store.refresh().await;
        assert!(store.is_subscribed());
        assert_eq!(gateway.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_company_switch_leaves_single_subscription() {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = store_with(&gateway);
        let a = CompanyId::new("a");
        let b = CompanyId::new("b");

        store.set_company(Some(a.clone())).await;
        store.set_company(Some(b.clone())).await;

        assert_eq!(gateway.subscription_count(TABLE, &store.scope(&a)), 0);
        assert_eq!(gateway.subscription_count(TABLE, &store.scope(&b)), 1);
    }

    #[tokio::test]
    async fn test_concurrent_switch_discards_superseded_subscription() {
        let gateway = Arc::new(
            InMemoryGateway::new().with_latency(std::time::Duration::from_millis(20)),
        );
        gateway.seed(
            TABLE,
            [project_row("1", "a", "From A"), project_row("2", "b", "From B")],
        );
        let store = store_with(&gateway);
        let a = CompanyId::new("a");
        let b = CompanyId::new("b");

        tokio::join!(
            store.set_company(Some(a.clone())),
            store.set_company(Some(b.clone())),
        );

        assert_eq!(store.company(), Some(b.clone()));
        assert_eq!(names(&store.records()), vec!["From B"]);
        assert_eq!(gateway.subscription_count(TABLE, &store.scope(&a)), 0);
        assert_eq!(gateway.subscription_count(TABLE, &store.scope(&b)), 1);
    }

    #[tokio::test]
    async fn test_changes_during_fetch_are_replayed() {
        let gateway = Arc::new(
            InMemoryGateway::new().with_latency(std::time::Duration::from_millis(20)),
        );
        gateway.seed(TABLE, [project_row("1", "acme", "Alpha")]);
        let store = store_with(&gateway);

        let push = async {
            // Lands after the subscription is up but before the fetch returns
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            gateway.emit(
                TABLE,
                ChangeEvent::Insert {
                    record: project_row("2", "acme", "Beta"),
                },
            );
            gateway.emit(
                TABLE,
                ChangeEvent::Insert {
                    record: project_row("1", "acme", "Alpha"),
                },
            );
        };
        tokio::join!(store.set_company(Some(CompanyId::new("acme"))), push);

        assert_eq!(names(&store.records()), vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn test_listeners_are_notified() {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = store_with(&gateway);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = store.subscribe(Arc::new(move |s: &StoreSnapshot<Project>| {
            sink.lock().unwrap().push((s.loading, s.len()));
        }));

        store.set_company(Some(CompanyId::new("acme"))).await;
        gateway
            .create(TABLE, json!({"empresa": "acme", "nome": "X"}))
            .await
            .unwrap();

        let seen_now = seen.lock().unwrap().clone();
        assert_eq!(seen_now.first(), Some(&(true, 0)));
        assert_eq!(seen_now.last(), Some(&(false, 1)));

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_close_and_drop_release_subscription() {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = store_with(&gateway);
        store.set_company(Some(CompanyId::new("acme"))).await;
        store.close();
        assert_eq!(gateway.active_subscriptions(), 0);
        assert!(store.company().is_none());

        let store = store_with(&gateway);
        store.set_company(Some(CompanyId::new("acme"))).await;
        assert_eq!(gateway.active_subscriptions(), 1);
        drop(store);
        assert_eq!(gateway.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_follow_tracks_session_identity() {
        let gateway = Arc::new(InMemoryGateway::new());
        let store = Arc::new(store_with(&gateway));
        let session = SessionContext::with_company("a");

        let task = store.follow(&session);
        wait_for(|| store.company() == Some(CompanyId::new("a"))).await;

        session.set_company(Some(CompanyId::new("b")));
        wait_for(|| store.company() == Some(CompanyId::new("b")) && store.is_subscribed()).await;
        assert_eq!(gateway.active_subscriptions(), 1);

        session.clear();
        wait_for(|| store.company().is_none()).await;
        assert_eq!(gateway.active_subscriptions(), 0);

        drop(session);
        task.await.unwrap();
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }
}
