//! PostgREST gateway
//!
//! Talks to the hosted backend's REST surface (`{url}/rest/v1/{table}`).
//! The realtime channel is not available over plain HTTP, so
//! [`Gateway::subscribe`] always fails with [`Error::Subscription`] and
//! callers fall back to fetch-only behaviour.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, error};

use super::{ChangeHandler, Filter, Gateway, SubscriptionHandle};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};

/// Builder for creating a RestGateway
#[derive(Default)]
pub struct RestGatewayBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl RestGatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take URL and timeout from configuration
    pub fn config(mut self, config: &GatewayConfig) -> Self {
        self.base_url = Some(config.url.clone());
        self.timeout_secs = Some(config.timeout_secs);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<RestGateway> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigError("gateway URL is required".to_string()))?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(self.timeout_secs.unwrap_or(30)))
            .build()?;

        Ok(RestGateway {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key,
        })
    }
}

/// Gateway speaking PostgREST over HTTP
#[derive(Clone)]
pub struct RestGateway {
    http_client: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl RestGateway {
    pub fn builder() -> RestGatewayBuilder {
        RestGatewayBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL for `table`
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = backend_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
        error!(status = %status, message = %message, "Gateway request failed");
        Err(Error::Gateway(message))
    }
}

/// Query pairs in PostgREST syntax (`column=eq.value`)
pub fn filter_query(filter: &Filter) -> Vec<(String, String)> {
    filter
        .conditions()
        .iter()
        .map(|(column, value)| {
            let literal = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (column.clone(), format!("eq.{}", literal))
        })
        .collect()
}

/// The backend's own error text, if the body carries one
fn backend_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl Gateway for RestGateway {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Value>> {
        debug!(table, %filter, "Selecting rows");
        let mut query = filter_query(filter);
        query.push(("select".to_string(), "*".to_string()));

        let request = self.http_client.get(self.table_url(table)).query(&query);
        let response = Self::check(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn create(&self, table: &str, record: Value) -> Result<Value> {
        debug!(table, "Inserting row");
        let request = self
            .http_client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&record);
        let response = Self::check(self.authorize(request).send().await?).await?;

        let mut rows: Vec<Value> = response.json().await?;
        if rows.is_empty() {
            return Err(Error::Gateway(format!("insert into '{}' returned no row", table)));
        }
        Ok(rows.swap_remove(0))
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64> {
        if filter.conditions().is_empty() {
            return Err(Error::InvalidInput(format!(
                "refusing unfiltered delete on '{}'",
                table
            )));
        }

        debug!(table, %filter, "Deleting rows");
        let request = self
            .http_client
            .delete(self.table_url(table))
            .query(&filter_query(filter))
            .header("Prefer", "return=representation");
        let response = Self::check(self.authorize(request).send().await?).await?;

        let rows: Vec<Value> = response.json().await?;
        Ok(rows.len() as u64)
    }

    async fn subscribe(
        &self,
        table: &str,
        _filter: &Filter,
        _handler: ChangeHandler,
    ) -> Result<SubscriptionHandle> {
        Err(Error::Subscription(format!(
            "realtime channel for '{}' is not available over REST",
            table
        )))
    }

    fn unsubscribe(&self, _handle: SubscriptionHandle) {}
}
