//! `PostgREST` table access.
//!
//! [`Query`] is a plain value (table name plus ordered query parameters) so it
//! can be built, compared and used as a cache key without a client. The
//! client methods below turn it into `GET`/`HEAD`/`PATCH`/`DELETE` calls.

use std::fmt;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::{SupabaseClient, SupabaseError};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// One column filter: `column.op.value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    column: String,
    op: &'static str,
    value: String,
}

impl Condition {
    fn new(column: &str, op: &'static str, value: impl fmt::Display) -> Self {
        Self {
            column: column.to_owned(),
            op,
            value: value.to_string(),
        }
    }

    /// `column = value`
    pub fn eq(column: &str, value: impl fmt::Display) -> Self {
        Self::new(column, "eq", value)
    }

    /// `column <> value`
    pub fn neq(column: &str, value: impl fmt::Display) -> Self {
        Self::new(column, "neq", value)
    }

    /// Case-insensitive pattern match; `*` is the wildcard.
    pub fn ilike(column: &str, pattern: impl fmt::Display) -> Self {
        Self::new(column, "ilike", pattern)
    }

    /// Case-insensitive substring match (`*needle*`).
    pub fn contains(column: &str, needle: &str) -> Self {
        Self::ilike(column, format!("*{}*", escape_pattern(needle)))
    }

    /// `column >= value`
    pub fn gte(column: &str, value: impl fmt::Display) -> Self {
        Self::new(column, "gte", value)
    }

    /// `column <= value`
    pub fn lte(column: &str, value: impl fmt::Display) -> Self {
        Self::new(column, "lte", value)
    }

    /// `column` is one of `values`.
    pub fn is_in<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: fmt::Display,
    {
        let list = values
            .into_iter()
            .map(|v| quote_value(&v.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        Self::new(column, "in", format!("({list})"))
    }

    /// Query-string form: `(column, "op.value")`.
    fn as_param(&self) -> (String, String) {
        (self.column.clone(), format!("{}.{}", self.op, self.value))
    }

    /// Form used inside `or=(...)`: `column.op.value`, quoted when needed.
    fn as_logic_operand(&self) -> String {
        let value = if self.op == "in" {
            self.value.clone()
        } else {
            quote_value(&self.value)
        };
        format!("{}.{}.{}", self.column, self.op, value)
    }
}

/// Make `raw` match literally inside an `ilike` pattern: `*` and `%` are
/// dropped, `_` and `\` are backslash-escaped.
fn escape_pattern(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '*' | '%' => {}
            '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Double-quote a value that contains `PostgREST` reserved characters.
fn quote_value(raw: &str) -> String {
    if raw.contains([',', '.', ':', '(', ')', '"', ' ']) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw.to_owned()
    }
}

/// A `PostgREST` query against one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    table: String,
    params: Vec<(String, String)>,
}

impl Query {
    /// Start a query against `table`.
    #[must_use]
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_owned(),
            params: Vec::new(),
        }
    }

    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Query parameters in insertion order.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn param(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_owned(), value));
        self
    }

    /// Columns to return (`*` when never called).
    #[must_use]
    pub fn select(self, columns: &str) -> Self {
        let columns: String = columns.split_whitespace().collect();
        self.param("select", columns)
    }

    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.params.push(condition.as_param());
        self
    }

    /// `column = value`
    #[must_use]
    pub fn eq(self, column: &str, value: impl fmt::Display) -> Self {
        self.filter(Condition::eq(column, value))
    }

    /// `column <> value`
    #[must_use]
    pub fn neq(self, column: &str, value: impl fmt::Display) -> Self {
        self.filter(Condition::neq(column, value))
    }

    /// Case-insensitive substring match.
    #[must_use]
    pub fn contains(self, column: &str, needle: &str) -> Self {
        self.filter(Condition::contains(column, needle))
    }

    /// `column >= value`
    #[must_use]
    pub fn gte(self, column: &str, value: impl fmt::Display) -> Self {
        self.filter(Condition::gte(column, value))
    }

    /// `column <= value`
    #[must_use]
    pub fn lte(self, column: &str, value: impl fmt::Display) -> Self {
        self.filter(Condition::lte(column, value))
    }

    /// `column` is one of `values`.
    #[must_use]
    pub fn is_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: fmt::Display,
    {
        self.filter(Condition::is_in(column, values))
    }

    /// Any of `conditions` holds.
    #[must_use]
    pub fn any_of<I>(self, conditions: I) -> Self
    where
        I: IntoIterator<Item = Condition>,
    {
        let operands = conditions
            .into_iter()
            .map(|c| c.as_logic_operand())
            .collect::<Vec<_>>();
        if operands.is_empty() {
            return self;
        }
        self.param("or", format!("({})", operands.join(",")))
    }

    /// Sort by `column`. Repeated calls add tie-breakers.
    #[must_use]
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let term = format!("{column}.{}", if ascending { "asc" } else { "desc" });
        if let Some((_, existing)) = self.params.iter_mut().find(|(k, _)| k == "order") {
            existing.push(',');
            existing.push_str(&term);
            return self;
        }
        self.param("order", term)
    }

    /// At most `n` rows.
    #[must_use]
    pub fn limit(self, n: u64) -> Self {
        self.param("limit", n.to_string())
    }

    /// Skip the first `n` rows.
    #[must_use]
    pub fn offset(self, n: u64) -> Self {
        self.param("offset", n.to_string())
    }

    /// Inclusive row range, as `offset`/`limit`.
    #[must_use]
    pub fn range(self, from: u64, to: u64) -> Self {
        self.offset(from).limit(to.saturating_sub(from) + 1)
    }

    /// Stable identity of this query, used as a cache key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{params}", self.table)
    }

    /// Full request URL under `base` (the project URL).
    ///
    /// # Errors
    ///
    /// Returns an error if the table name does not form a valid URL.
    pub fn url(&self, base: &Url) -> Result<Url, SupabaseError> {
        let mut url = base.join("rest/v1/")?.join(&self.table)?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url)
    }
}

/// Parse the total from a `Content-Range` header such as `0-19/42` or `*/0`.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

// =============================================================================
// Table requests
// =============================================================================

/// A generic `{table, method, body}` request.
///
/// `GET` selects all rows, `POST` inserts `body`, `PUT`/`PATCH` update the
/// row whose `key_column` equals the same field in `body`, and `DELETE`
/// removes that row. Other methods are rejected.
#[derive(Debug, Clone)]
pub struct TableRequest {
    /// Table name.
    pub table: String,
    /// HTTP method name.
    pub method: String,
    /// Row data for writes.
    pub body: Option<serde_json::Value>,
    /// Column used to match rows for updates and deletes.
    pub key_column: String,
}

impl TableRequest {
    /// A request with the default key column `id`.
    #[must_use]
    pub fn new(table: &str, method: &str, body: Option<serde_json::Value>) -> Self {
        Self {
            table: table.to_owned(),
            method: method.to_owned(),
            body,
            key_column: "id".to_owned(),
        }
    }

    /// Match rows on `column` instead of `id`.
    #[must_use]
    pub fn with_key_column(mut self, column: &str) -> Self {
        column.clone_into(&mut self.key_column);
        self
    }

    /// The body's value for the key column, rendered for a filter.
    fn key_value(&self) -> Result<String, SupabaseError> {
        let value = self
            .body
            .as_ref()
            .and_then(|b| b.get(&self.key_column))
            .ok_or_else(|| {
                SupabaseError::InvalidRequest(format!(
                    "body must include key column '{}'",
                    self.key_column
                ))
            })?;
        Ok(match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn body(&self) -> Result<&serde_json::Value, SupabaseError> {
        self.body
            .as_ref()
            .ok_or_else(|| SupabaseError::InvalidRequest("request body required".into()))
    }
}

// =============================================================================
// Client methods
// =============================================================================

impl SupabaseClient {
    /// Rows matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the rows do not parse as `T`.
    #[instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, SupabaseError> {
        let url = query.url(self.base_url())?;
        let response = self.send(self.request(Method::GET, url)).await?;
        Self::json(response).await
    }

    /// Rows matching `query` plus the exact count across all pages.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the rows do not parse as `T`.
    #[instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn select_with_count<T: DeserializeOwned>(
        &self,
        query: &Query,
    ) -> Result<(Vec<T>, u64), SupabaseError> {
        let url = query.url(self.base_url())?;
        let response = self
            .send(
                self.request(Method::GET, url)
                    .header("Prefer", "count=exact"),
            )
            .await?;
        let total = response
            .headers()
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows: Vec<T> = Self::json(response).await?;
        let total = total.unwrap_or(rows.len() as u64);
        Ok((rows, total))
    }

    /// Exact number of rows matching `query`, without transferring them.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the count header is missing.
    #[instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn count(&self, query: &Query) -> Result<u64, SupabaseError> {
        let url = query.url(self.base_url())?;
        let response = self
            .send(
                self.request(Method::HEAD, url)
                    .header("Prefer", "count=exact"),
            )
            .await?;
        response
            .headers()
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| SupabaseError::Api {
                status: response.status().as_u16(),
                code: None,
                message: "missing Content-Range count".into(),
            })
    }

    /// The single row matching `query`, or `None` when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, more than one row matches, or
    /// the row does not parse as `T`.
    #[instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn select_single<T: DeserializeOwned>(
        &self,
        query: &Query,
    ) -> Result<Option<T>, SupabaseError> {
        let url = query.url(self.base_url())?;
        let request = self
            .request(Method::GET, url)
            .header(ACCEPT, HeaderValue::from_static(SINGLE_OBJECT));
        match self.send(request).await {
            Ok(response) => Self::json(response).await.map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert `rows` (one object or an array) and return the stored rows.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Conflict` on a unique violation, or another
    /// error if the request fails.
    #[instrument(skip(self, rows))]
    pub async fn insert<B, T>(&self, table: &str, rows: &B) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = Query::table(table).url(self.base_url())?;
        let response = self
            .send(
                self.request(Method::POST, url)
                    .header("Prefer", "return=representation")
                    .json(rows),
            )
            .await?;
        Self::json(response).await
    }

    /// Apply `patch` to the rows matching `query` and return them.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the rows do not parse as `T`.
    #[instrument(skip(self, query, patch), fields(table = %query.table_name()))]
    pub async fn update<B, T>(&self, query: &Query, patch: &B) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = query.url(self.base_url())?;
        let response = self
            .send(
                self.request(Method::PATCH, url)
                    .header("Prefer", "return=representation")
                    .json(patch),
            )
            .await?;
        Self::json(response).await
    }

    /// Delete the rows matching `query`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, query), fields(table = %query.table_name()))]
    pub async fn delete(&self, query: &Query) -> Result<usize, SupabaseError> {
        let url = query.url(self.base_url())?;
        let response = self
            .send(
                self.request(Method::DELETE, url)
                    .header("Prefer", "return=representation"),
            )
            .await?;
        let rows: Vec<serde_json::Value> = Self::json(response).await?;
        Ok(rows.len())
    }

    /// Run a generic table request.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::UnsupportedMethod` for methods other than
    /// `GET`, `POST`, `PUT`, `PATCH` and `DELETE`, `InvalidRequest` when a
    /// write lacks a body or key, or the backend's error.
    #[instrument(skip(self, request), fields(table = %request.table, method = %request.method))]
    pub async fn base_query(
        &self,
        request: &TableRequest,
    ) -> Result<serde_json::Value, SupabaseError> {
        let method = request.method.to_ascii_uppercase();
        let rows: Vec<serde_json::Value> = match method.as_str() {
            "GET" => self.select(&Query::table(&request.table).select("*")).await?,
            "POST" => self.insert(&request.table, request.body()?).await?,
            "PUT" | "PATCH" => {
                let query =
                    Query::table(&request.table).eq(&request.key_column, request.key_value()?);
                self.update(&query, request.body()?).await?
            }
            "DELETE" => {
                let query =
                    Query::table(&request.table).eq(&request.key_column, request.key_value()?);
                let removed = self.delete(&query).await?;
                return Ok(serde_json::json!({ "deleted": removed }));
            }
            _ => return Err(SupabaseError::UnsupportedMethod(request.method.clone())),
        };
        Ok(serde_json::Value::Array(rows))
    }
}
