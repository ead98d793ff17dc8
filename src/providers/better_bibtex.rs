use async_trait::async_trait;
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::app_config::{Config, PickerFormat};
use crate::citation::CiteKey;
use crate::errors::{CiteError, ProviderError};
use crate::providers::{BibliographyService, Collection, CollectionId};

/// Keys in the picker's pandoc output, e.g. `[@doe2020; @lee2021]`
static PANDOC_PICK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@([\w\-:]+)").expect("Invalid pandoc pick regex")
});

/// Zotero Better BibTeX client
#[derive(Debug)]
pub struct BetterBibTeX {
    /// Base URL of the Zotero connector server
    base_url: String,
    /// HTTP client for JSON-RPC calls
    client: Client,
    /// HTTP client for the picker, which blocks until the user chooses
    picker_client: Client,
    /// Output format requested from the picker
    picker_format: PickerFormat,
    /// Ask Zotero to minimize after picking
    minimize_picker: bool,
    /// Maximum number of retry attempts for transient failures
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
    /// JSON-RPC request id counter
    request_id: AtomicU64,
}

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    jsonrpc: String,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: None,
            id,
        }
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

/// Error object of a JSON-RPC response
#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl<T> RpcResponse<T> {
    pub fn into_result(self) -> Result<T, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| ProviderError::ParseError("response has neither result nor error".to_string()))
    }
}

/// Entry of the `user.groups` result
#[derive(Debug, Deserialize)]
struct GroupItem {
    id: CollectionId,
    name: String,
}

/// Entry of the `item.search` result
#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(rename = "citation-key", default)]
    citation_key: Option<String>,
    #[serde(default)]
    library: Option<String>,
}

/// Parse a JSON-RPC response body, surfacing error payloads
pub fn parse_rpc_response<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    let response: RpcResponse<T> = serde_json::from_str(body)
        .map_err(|e| ProviderError::ParseError(format!("{}: {}", e, preview(body))))?;
    response.into_result()
}

/// Keys from the picker's pandoc output
pub fn parse_pandoc_picks(body: &str) -> Vec<CiteKey> {
    PANDOC_PICK_REGEX
        .captures_iter(body)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Keys from the picker's JSON output
pub fn parse_json_picks(body: &str) -> Result<Vec<CiteKey>, ProviderError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::ParseError(format!("{}: {}", e, preview(body))))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => return Ok(Vec::new()),
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            ["citationKey", "citation-key", "citekey"]
                .iter()
                .find_map(|field| item.get(*field).and_then(|v| v.as_str()))
                .map(str::to_string)
        })
        .collect())
}

fn library_of(items: &[SearchItem], key: &str) -> Option<String> {
    items
        .iter()
        .find(|item| item.citation_key.as_deref() == Some(key))
        .and_then(|item| item.library.clone())
}

fn preview(body: &str) -> String {
    if body.chars().count() > 200 {
        body.chars().take(200).collect()
    } else {
        body.to_string()
    }
}

/// Exponential backoff before retry `attempt` (1-based), saturating at `u64::MAX`
pub fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor)
}

impl BetterBibTeX {
    /// Create a client for the given server URL with default settings
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::from_config(&Config {
            server_url: server_url.into(),
            ..Config::default()
        })
    }

    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        let picker_client = Client::builder()
            .timeout(Duration::from_secs(config.picker_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            client,
            picker_client,
            picker_format: config.picker_format.clone(),
            minimize_picker: config.minimize_picker,
            max_retries: config.retry_count,
            backoff_base_ms: config.retry_backoff_ms,
            request_id: AtomicU64::new(1),
        }
    }

    pub fn rpc_url(&self) -> String {
        format!("{}/better-bibtex/json-rpc", self.base_url)
    }

    pub fn cayw_url(&self) -> String {
        format!("{}/better-bibtex/cayw", self.base_url)
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call a JSON-RPC method, retrying transient failures with backoff
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T, ProviderError> {
        let mut request = RpcRequest::new(method, self.next_id());
        if let Some(params) = params {
            request = request.params(params);
        }
        let url = self.rpc_url();
        debug!("JSON-RPC {} -> {}", request.method(), url);

        let mut attempt = 0;
        loop {
            match self.send_rpc::<T>(&url, &request).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = backoff_delay_ms(self.backoff_base_ms, attempt);
                    warn!("Better BibTeX {} failed: {} - retry {}/{} in {}ms",
                        method, e, attempt, self.max_retries, backoff_ms);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    error!("Better BibTeX {} failed: {}", method, e);
                    return Err(e);
                }
            }
        }
    }

    async fn send_rpc<T: DeserializeOwned>(&self, url: &str, request: &RpcRequest) -> Result<T, ProviderError> {
        let response = self.client.post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::ConnectionError(format!("{} (is Zotero running?)", e))
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: preview(&body),
            });
        }

        parse_rpc_response(&body)
    }

    /// Ask the picker for citation keys in the configured format
    async fn cayw(&self) -> Result<String, ProviderError> {
        let mut query = vec![("format", self.picker_format.query_value())];
        if self.picker_format == PickerFormat::Pandoc {
            query.push(("brackets", "1"));
        }
        if self.minimize_picker {
            query.push(("minimize", "true"));
        }

        let response = self.picker_client.get(self.cayw_url())
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(format!("{} (is Zotero running?)", e)))?;

        let status = response.status();
        let body = response.text().await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to read picker response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: preview(&body),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl BibliographyService for BetterBibTeX {
    async fn pick_keys(&self) -> Result<Vec<CiteKey>, CiteError> {
        let body = self.cayw().await?;

        let keys = match self.picker_format {
            PickerFormat::Pandoc => parse_pandoc_picks(&body),
            PickerFormat::Json => parse_json_picks(&body)?,
        };

        if keys.is_empty() {
            return Err(CiteError::NoSelection);
        }
        debug!("Picked {} key(s): {}", keys.len(), keys.join(", "));
        Ok(keys)
    }

    async fn list_collections(&self) -> Result<Vec<Collection>, CiteError> {
        let groups: Vec<GroupItem> = self.call("user.groups", None).await?;
        Ok(groups
            .into_iter()
            .map(|group| Collection::new(group.name, group.id))
            .collect())
    }

    async fn resolve_key_collection(&self, key: &str) -> Result<String, CiteError> {
        let items: Vec<SearchItem> = self.call("item.search", Some(json!([key]))).await?;
        library_of(&items, key).ok_or_else(|| CiteError::NotFound(key.to_string()))
    }

    async fn fetch_bibliography(
        &self,
        keys: &[CiteKey],
        style: &str,
        collection: CollectionId,
    ) -> Result<String, CiteError> {
        let text: String = self.call("item.export", Some(json!([keys, style, collection]))).await?;
        Ok(text)
    }

    async fn fetch_single_entry_bibliography(&self, key: &str, style: &str) -> Result<String, CiteError> {
        let params = json!([[format!("@{}", key)], { "id": style }]);
        let text: String = self.call("item.bibliography", Some(params)).await?;
        Ok(text)
    }
}
