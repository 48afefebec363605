//! PostgREST client for a hosted Supabase project.
//!
//! Rows are read from `{url}/rest/v1/{table}` with the query expressed in
//! PostgREST's URL grammar (`select=`, `col=not.is.null`, `col=eq.v`,
//! `order=a.desc,b.desc`, `limit=`). Counts use a `HEAD` request with
//! `Prefer: count=exact` and read the total from `Content-Range`; counting
//! the primary key this way equals a distinct count. Queries without a limit
//! are fetched in `offset`/`limit` pages so the project's max-rows cap does
//! not truncate full-population scans.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use serde_json::Value;

use super::{BackendError, DashboardBackend, Filter, Query, Row};
use crate::config::DEFAULT_PAGE_SIZE;

pub struct PostgrestBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
    page_size: usize,
}

impl PostgrestBackend {
    /// Create a client for the project at `base_url` authenticated with `api_key`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Rows requested per page for unbounded queries. Must not exceed the
    /// project's max-rows setting, or pages come back short and paging stops early.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| BackendError::InvalidQuery("API key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| BackendError::InvalidQuery("API key is not a valid header value".into()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Http(format!(
                "Request timed out after {}ms",
                self.timeout.as_millis()
            ))
        } else if e.is_connect() {
            BackendError::Http(format!("Cannot reach backend at {}: {e}", self.base_url))
        } else {
            BackendError::Http(e.to_string())
        }
    }

    async fn fetch_rows(
        &self,
        table: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Row>, BackendError> {
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.auth_headers()?)
            .query(params)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let response = Self::check_status(response).await?;
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl DashboardBackend for PostgrestBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, BackendError> {
        query.validate()?;

        let params = select_params(query);
        if query.limit.is_some() {
            return self.fetch_rows(&query.table, &params).await;
        }

        let mut rows = Vec::new();
        let mut pages = 0usize;
        loop {
            let page = self
                .fetch_rows(&query.table, &page_params(&params, rows.len(), self.page_size))
                .await?;
            pages += 1;
            let last = page.len() < self.page_size;
            rows.extend(page);
            if last {
                break;
            }
        }
        tracing::debug!(table = %query.table, rows = rows.len(), pages, "Paged select finished");
        Ok(rows)
    }

    /// Exact row count from `Content-Range`. PostgREST cannot count distinct
    /// values, so this matches the trait contract only for key columns.
    async fn count(&self, query: &Query) -> Result<u64, BackendError> {
        query.validate()?;

        let response = self
            .client
            .head(self.table_url(&query.table))
            .headers(self.auth_headers()?)
            .header("Prefer", "count=exact")
            .query(&count_params(query))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let response = Self::check_status(response).await?;
        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BackendError::Decode("missing Content-Range header".into()))?;

        parse_content_range_total(range)
    }
}

// ---------------------------------------------------------------------------
// URL grammar
// ---------------------------------------------------------------------------

/// Query-string pairs for a row fetch.
pub fn select_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), projection(query))];
    params.extend(filter_params(query));

    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|o| {
                format!(
                    "{}.{}",
                    o.column,
                    if o.descending { "desc" } else { "asc" }
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".into(), order));
    }

    if let Some(limit) = query.limit {
        params.push(("limit".into(), limit.to_string()));
    }
    params
}

/// `params` plus the window for one page of an unbounded fetch.
pub fn page_params(
    params: &[(String, String)],
    offset: usize,
    page_size: usize,
) -> Vec<(String, String)> {
    let mut paged = params.to_vec();
    paged.push(("offset".into(), offset.to_string()));
    paged.push(("limit".into(), page_size.to_string()));
    paged
}

/// Query-string pairs for a count: first projected column plus filters.
pub fn count_params(query: &Query) -> Vec<(String, String)> {
    let column = query.columns.first().cloned().unwrap_or_else(|| "*".into());
    let mut params = vec![("select".to_string(), column)];
    params.extend(filter_params(query));
    params
}

fn projection(query: &Query) -> String {
    if query.columns.is_empty() {
        "*".into()
    } else {
        query.columns.join(",")
    }
}

fn filter_params(query: &Query) -> Vec<(String, String)> {
    query
        .filters
        .iter()
        .map(|f| match f {
            Filter::NotNull(col) => (col.clone(), "not.is.null".to_string()),
            Filter::Eq(col, value) => (col.clone(), format!("eq.{}", literal(value))),
        })
        .collect()
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        other => other.to_string(),
    }
}

/// Total from a `Content-Range` value such as `0-24/3573` or `*/0`.
pub fn parse_content_range_total(range: &str) -> Result<u64, BackendError> {
    range
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse::<u64>().ok())
        .ok_or_else(|| BackendError::Decode(format!("unexpected Content-Range '{range}'")))
}
