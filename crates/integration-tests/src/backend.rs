//! In-process double of the managed backend.
//!
//! Serves the part of `PostgREST`, `GoTrue` and Storage that the storefront
//! calls, over in-memory tables. Enough of the query grammar is understood
//! for every filter the storefront builds: `eq`, `neq`, `ilike`, `gte`,
//! `lte`, `in`, `or=(...)`, `order`, `limit`, `offset`, plus exact counts
//! through `Content-Range` and single-object responses.
//!
//! Row level security is not modelled; scoping is the storefront's job and
//! is what the tests check.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, RawQuery, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use shopfront_core::Role;
use shopfront_storefront::config::SupabaseConfig;
use shopfront_storefront::supabase::SupabaseClient;
use uuid::Uuid;

/// Anon key the double expects as `apikey`.
pub const ANON_KEY: &str = "test-anon-key";

/// Service role key accepted by the admin endpoints.
pub const SERVICE_ROLE_KEY: &str = "test-service-role-key";

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Primary key column of a table.
fn key_column(table: &str) -> &'static str {
    match table {
        "products" => "product_id",
        "orders" => "order_id",
        _ => "id",
    }
}

/// An uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
struct StoredUser {
    id: Uuid,
    email: String,
    password: String,
    metadata: Map<String, Value>,
    created_at: DateTime<Utc>,
}

impl StoredUser {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "aud": "authenticated",
            "email": self.email,
            "phone": "",
            "user_metadata": self.metadata,
            "created_at": self.created_at,
        })
    }
}

struct Backend {
    tables: HashMap<String, Vec<Value>>,
    /// Keys held by writers the readers cannot see yet.
    hidden_keys: HashSet<(String, String)>,
    users: HashMap<Uuid, StoredUser>,
    access_tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
    objects: HashMap<String, StoredObject>,
    token_lifetime_secs: i64,
    fail_user_updates: bool,
}

type Shared = Arc<Mutex<Backend>>;

fn lock(shared: &Shared) -> MutexGuard<'_, Backend> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running backend double, stopped on drop.
pub struct FakeSupabase {
    addr: SocketAddr,
    shared: Shared,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for FakeSupabase {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl FakeSupabase {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let shared: Shared = Arc::new(Mutex::new(Backend {
            tables: HashMap::new(),
            hidden_keys: HashSet::new(),
            users: HashMap::new(),
            access_tokens: HashMap::new(),
            refresh_tokens: HashMap::new(),
            objects: HashMap::new(),
            token_lifetime_secs: 3600,
            fail_user_updates: false,
        }));

        let app = Router::new()
            .route("/rest/v1/{table}", any(rest))
            .route("/auth/v1/signup", post(sign_up))
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/logout", post(logout))
            .route("/auth/v1/user", get(current_user).put(update_user))
            .route("/auth/v1/admin/users", post(admin_create_user))
            .route("/storage/v1/object/{*path}", post(upload))
            .with_state(Arc::clone(&shared));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("bind backend double: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("backend double address: {e}"));
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            shared,
            server,
        }
    }

    /// Project URL of the double.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Connection settings, including the service role key.
    ///
    /// # Panics
    ///
    /// Panics if the local URL does not parse, which cannot happen.
    #[must_use]
    pub fn config(&self) -> SupabaseConfig {
        let mut config = SupabaseConfig::new(&self.url(), ANON_KEY)
            .unwrap_or_else(|e| panic!("backend double URL: {e}"));
        config.service_role_key = Some(secrecy::SecretString::from(SERVICE_ROLE_KEY.to_owned()));
        config
    }

    /// An anonymous client.
    #[must_use]
    pub fn client(&self) -> SupabaseClient {
        SupabaseClient::new(&self.config())
    }

    /// A client signed in as `user`, with a freshly issued token.
    #[must_use]
    pub fn client_for(&self, user: Uuid) -> SupabaseClient {
        let token = format!("access-{}", Uuid::new_v4());
        lock(&self.shared).access_tokens.insert(token.clone(), user);
        self.client().as_user(&token)
    }

    /// Append rows to `table`.
    pub fn seed<I: IntoIterator<Item = Value>>(&self, table: &str, rows: I) {
        lock(&self.shared)
            .tables
            .entry(table.to_owned())
            .or_default()
            .extend(rows);
    }

    /// Every row of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.shared)
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// The row of `table` whose primary key is `key`.
    #[must_use]
    pub fn row(&self, table: &str, key: &str) -> Option<Value> {
        let column = key_column(table);
        self.rows(table)
            .into_iter()
            .find(|row| text(row.get(column)).as_deref() == Some(key))
    }

    /// Make inserts with primary key `key` fail as if a concurrent writer
    /// had committed it, without the row showing up in reads.
    pub fn hold_key(&self, table: &str, key: &str) {
        lock(&self.shared)
            .hidden_keys
            .insert((table.to_owned(), key.to_owned()));
    }

    /// Register a confirmed user and its `users` table row.
    #[must_use]
    pub fn create_user(&self, email: &str, password: &str, display_name: &str, role: Role) -> Uuid {
        let mut metadata = Map::new();
        metadata.insert("display_name".into(), display_name.into());
        metadata.insert("role".into(), role.as_str().into());
        lock(&self.shared).register(email, password, metadata)
    }

    /// Metadata of a user as stored.
    #[must_use]
    pub fn user_metadata(&self, id: Uuid) -> Value {
        lock(&self.shared)
            .users
            .get(&id)
            .map(|u| Value::Object(u.metadata.clone()))
            .unwrap_or(Value::Null)
    }

    /// Overwrite one metadata key of a user.
    pub fn set_user_metadata(&self, id: Uuid, key: &str, value: Value) {
        if let Some(user) = lock(&self.shared).users.get_mut(&id) {
            user.metadata.insert(key.to_owned(), value);
        }
    }

    /// The object stored at `bucket/path`.
    #[must_use]
    pub fn object(&self, path: &str) -> Option<StoredObject> {
        lock(&self.shared).objects.get(path).cloned()
    }

    /// Store an object at `bucket/path` as if another writer uploaded it.
    pub fn put_object(&self, path: &str, content_type: &str, bytes: Vec<u8>) {
        lock(&self.shared).objects.insert(
            path.to_owned(),
            StoredObject {
                content_type: content_type.to_owned(),
                bytes,
            },
        );
    }

    /// Paths of every stored object, sorted.
    #[must_use]
    pub fn object_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = lock(&self.shared).objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Lifetime of access tokens issued from now on.
    pub fn set_token_lifetime(&self, secs: i64) {
        lock(&self.shared).token_lifetime_secs = secs;
    }

    /// Make `PUT /auth/v1/user` fail with a server error.
    pub fn fail_user_updates(&self, fail: bool) {
        lock(&self.shared).fail_user_updates = fail;
    }

    /// Reject every refresh token issued so far.
    pub fn revoke_refresh_tokens(&self) {
        lock(&self.shared).refresh_tokens.clear();
    }

    /// Whether `token` is still accepted.
    #[must_use]
    pub fn token_is_live(&self, token: &str) -> bool {
        lock(&self.shared).access_tokens.contains_key(token)
    }
}

// =============================================================================
// Backend state
// =============================================================================

impl Backend {
    fn register(&mut self, email: &str, password: &str, metadata: Map<String, Value>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.entry("users".into()).or_default().push(json!({
            "id": id,
            "email": email,
            "display_name": metadata.get("display_name").cloned().unwrap_or(Value::Null),
            "role": metadata.get("role").cloned().unwrap_or_else(|| "buyer".into()),
        }));
        self.users.insert(
            id,
            StoredUser {
                id,
                email: email.to_owned(),
                password: password.to_owned(),
                metadata,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn issue_session(&mut self, user: Uuid) -> Option<Value> {
        let stored = self.users.get(&user)?.to_json();
        let access = format!("access-{}", Uuid::new_v4());
        let refresh = format!("refresh-{}", Uuid::new_v4());
        self.access_tokens.insert(access.clone(), user);
        self.refresh_tokens.insert(refresh.clone(), user);
        Some(json!({
            "access_token": access,
            "token_type": "bearer",
            "expires_in": self.token_lifetime_secs,
            "expires_at": Utc::now().timestamp() + self.token_lifetime_secs,
            "refresh_token": refresh,
            "user": stored,
        }))
    }

    fn user_for(&self, headers: &HeaderMap) -> Option<&StoredUser> {
        let token = bearer(headers)?;
        let id = self.access_tokens.get(token)?;
        self.users.get(id)
    }

    fn read(&self, table: &str, params: &RestParams, headers: &HeaderMap, head: bool) -> Response {
        let mut rows: Vec<Value> = self
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(|row| matches_all(&params.filters, row))
            .cloned()
            .collect();
        sort_rows(&mut rows, &params.order);

        let total = rows.len();
        let page: Vec<Value> = rows
            .into_iter()
            .skip(params.offset)
            .take(params.limit.unwrap_or(usize::MAX))
            .map(|row| project(row, params.select.as_deref()))
            .collect();

        if header_is(headers, header::ACCEPT, SINGLE_OBJECT) {
            return match <[Value; 1]>::try_from(page) {
                Ok([row]) => Json(row).into_response(),
                Err(page) => pgrst_error(
                    StatusCode::NOT_ACCEPTABLE,
                    "PGRST116",
                    &format!(
                        "JSON object requested, multiple (or no) rows returned ({} rows)",
                        page.len()
                    ),
                ),
            };
        }

        let content_range = if page.is_empty() {
            format!("*/{total}")
        } else {
            format!(
                "{}-{}/{total}",
                params.offset,
                params.offset + page.len() - 1
            )
        };
        let mut response = if head {
            StatusCode::OK.into_response()
        } else {
            Json(page).into_response()
        };
        if prefers(headers, "count=exact") {
            if let Ok(value) = HeaderValue::from_str(&content_range) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }

    fn insert(&mut self, table: &str, body: &Bytes) -> Response {
        let rows = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Array(rows)) => rows,
            Ok(row @ Value::Object(_)) => vec![row],
            _ => return pgrst_error(StatusCode::BAD_REQUEST, "PGRST102", "invalid body"),
        };

        let column = key_column(table);
        let existing = self.tables.get(table).map(Vec::as_slice).unwrap_or_default();
        let mut seen: HashSet<String> = existing
            .iter()
            .filter_map(|row| text(row.get(column)))
            .collect();
        for row in &rows {
            let Some(key) = text(row.get(column)) else {
                continue;
            };
            let hidden = self.hidden_keys.contains(&(table.to_owned(), key.clone()));
            if hidden || !seen.insert(key.clone()) {
                return (
                    StatusCode::CONFLICT,
                    Json(json!({
                        "code": "23505",
                        "details": format!("Key ({column})=({key}) already exists."),
                        "hint": null,
                        "message": format!("duplicate key value violates unique constraint \"{table}_pkey\""),
                    })),
                )
                    .into_response();
            }
        }

        self.tables
            .entry(table.to_owned())
            .or_default()
            .extend(rows.iter().cloned());
        (StatusCode::CREATED, Json(rows)).into_response()
    }

    fn update(&mut self, table: &str, params: &RestParams, body: &Bytes) -> Response {
        let Ok(Value::Object(patch)) = serde_json::from_slice::<Value>(body) else {
            return pgrst_error(StatusCode::BAD_REQUEST, "PGRST102", "invalid body");
        };
        let mut updated = Vec::new();
        for row in self.tables.entry(table.to_owned()).or_default() {
            if !matches_all(&params.filters, row) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (key, value) in &patch {
                    fields.insert(key.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Json(updated).into_response()
    }

    fn delete(&mut self, table: &str, params: &RestParams) -> Response {
        let rows = self.tables.entry(table.to_owned()).or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .drain(..)
            .partition(|row| matches_all(&params.filters, row));
        *rows = kept;
        Json(removed).into_response()
    }
}

// =============================================================================
// Query grammar
// =============================================================================

#[derive(Debug, Clone)]
struct Condition {
    column: String,
    op: String,
    value: String,
}

#[derive(Debug, Clone)]
enum Filter {
    All(Condition),
    Any(Vec<Condition>),
}

impl Filter {
    fn matches(&self, row: &Value) -> bool {
        match self {
            Self::All(condition) => condition.matches(row),
            Self::Any(conditions) => conditions.iter().any(|c| c.matches(row)),
        }
    }
}

fn matches_all(filters: &[Filter], row: &Value) -> bool {
    filters.iter().all(|f| f.matches(row))
}

impl Condition {
    /// `value` is `op.operand` as sent in the query string.
    fn parse(column: &str, value: &str) -> Option<Self> {
        let (op, operand) = value.split_once('.')?;
        Some(Self {
            column: column.to_owned(),
            op: op.to_owned(),
            value: operand.to_owned(),
        })
    }

    /// `column.op.operand` as sent inside `or=(...)`.
    fn parse_operand(raw: &str) -> Option<Self> {
        let (column, rest) = raw.split_once('.')?;
        let mut condition = Self::parse(column, rest)?;
        if condition.op != "in" {
            condition.value = unquote(&condition.value);
        }
        Some(condition)
    }

    fn matches(&self, row: &Value) -> bool {
        let field = text(row.get(&self.column));
        match self.op.as_str() {
            "eq" => field.as_deref() == Some(self.value.as_str()),
            "neq" => field.as_deref() != Some(self.value.as_str()),
            "ilike" => field.is_some_and(|f| ilike(&f, &self.value)),
            "gte" => field.is_some_and(|f| compare_text(&f, &self.value) != Ordering::Less),
            "lte" => field.is_some_and(|f| compare_text(&f, &self.value) != Ordering::Greater),
            "in" => {
                let list = self
                    .value
                    .trim()
                    .strip_prefix('(')
                    .and_then(|s| s.strip_suffix(')'))
                    .unwrap_or_default();
                field.is_some_and(|f| split_top_level(list).iter().any(|v| unquote(v) == f))
            }
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct RestParams {
    select: Option<Vec<String>>,
    filters: Vec<Filter>,
    order: Vec<(String, bool)>,
    limit: Option<usize>,
    offset: usize,
}

impl RestParams {
    fn parse(raw: &str) -> Result<Self, String> {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "select" if value == "*" => {}
                "select" => {
                    params.select = Some(value.split(',').map(str::to_owned).collect());
                }
                "order" => {
                    for term in value.split(',') {
                        let (column, direction) = term.rsplit_once('.').unwrap_or((term, "asc"));
                        params.order.push((column.to_owned(), direction != "desc"));
                    }
                }
                "limit" => params.limit = Some(value.parse().map_err(|_| "bad limit")?),
                "offset" => params.offset = value.parse().map_err(|_| "bad offset")?,
                "or" => {
                    let inner = value
                        .strip_prefix('(')
                        .and_then(|s| s.strip_suffix(')'))
                        .ok_or("or must be parenthesised")?;
                    let conditions = split_top_level(inner)
                        .iter()
                        .map(|operand| {
                            Condition::parse_operand(operand)
                                .ok_or_else(|| format!("bad operand {operand}"))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    params.filters.push(Filter::Any(conditions));
                }
                column => {
                    let condition = Condition::parse(column, &value)
                        .ok_or_else(|| format!("bad filter {column}={value}"))?;
                    params.filters.push(Filter::All(condition));
                }
            }
        }
        Ok(params)
    }
}

/// Split on commas outside quotes and parentheses.
fn split_top_level(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0_u32;
    let mut quoted = false;
    let mut escaped = false;
    for c in raw.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => {
                current.push(c);
                escaped = true;
                continue;
            }
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                parts.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn unquote(raw: &str) -> String {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map_or_else(
            || raw.to_owned(),
            |inner| inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        )
}

/// Case-insensitive LIKE match: `*` or `%` stand for any run of characters,
/// `_` for exactly one, and `\` makes the next character literal.
fn ilike(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    like_at(&text, &pattern)
}

fn like_at(text: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('*' | '%', rest)) => {
            (0..=text.len()).any(|skip| text.get(skip..).is_some_and(|tail| like_at(tail, rest)))
        }
        Some(('_', rest)) => text.split_first().is_some_and(|(_, text)| like_at(text, rest)),
        Some(('\\', rest)) => match (rest.split_first(), text.split_first()) {
            (Some((want, rest)), Some((got, text))) => want == got && like_at(text, rest),
            _ => false,
        },
        Some((want, rest)) => text
            .split_first()
            .is_some_and(|(got, text)| got == want && like_at(text, rest)),
    }
}

/// Numbers compare numerically, timestamps chronologically, the rest as text.
fn compare_text(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (a.parse::<f64>(), b.parse::<f64>()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if let (Ok(x), Ok(y)) = (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        return x.cmp(&y);
    }
    a.cmp(b)
}

fn sort_rows(rows: &mut [Value], order: &[(String, bool)]) {
    rows.sort_by(|a, b| {
        for (column, ascending) in order {
            let ordering = match (text(a.get(column)), text(b.get(column))) {
                (Some(x), Some(y)) => compare_text(&x, &y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = if *ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn project(row: Value, columns: Option<&[String]>) -> Value {
    match (columns, row) {
        (Some(columns), Value::Object(fields)) => Value::Object(
            fields
                .into_iter()
                .filter(|(key, _)| columns.iter().any(|c| c == key))
                .collect(),
        ),
        (_, row) => row,
    }
}

/// A field as filter text; `None` for null or missing.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn header_is(headers: &HeaderMap, name: header::HeaderName, expected: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

fn prefers(headers: &HeaderMap, preference: &str) -> bool {
    headers
        .get_all("prefer")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|p| p.trim() == preference))
}

fn pgrst_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "code": code, "details": null, "hint": null, "message": message })),
    )
        .into_response()
}

fn gotrue_error(status: StatusCode, error_code: &str, msg: &str) -> Response {
    (
        status,
        Json(json!({ "code": status.as_u16(), "error_code": error_code, "msg": msg })),
    )
        .into_response()
}

fn invalid_grant(description: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_grant", "error_description": description })),
    )
        .into_response()
}

async fn rest(
    State(shared): State<Shared>,
    method: Method,
    Path(table): Path<String>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = match RestParams::parse(raw.as_deref().unwrap_or_default()) {
        Ok(params) => params,
        Err(message) => return pgrst_error(StatusCode::BAD_REQUEST, "PGRST100", &message),
    };
    let mut backend = lock(&shared);
    match method {
        Method::GET => backend.read(&table, &params, &headers, false),
        Method::HEAD => backend.read(&table, &params, &headers, true),
        Method::POST => backend.insert(&table, &body),
        Method::PATCH => backend.update(&table, &params, &body),
        Method::DELETE => backend.delete(&table, &params),
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

async fn sign_up(State(shared): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let metadata = body["data"].as_object().cloned().unwrap_or_default();

    let mut backend = lock(&shared);
    if backend.email_taken(email) {
        return gotrue_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "user_already_exists",
            "User already registered",
        );
    }
    let id = backend.register(email, password, metadata);
    match backend.users.get(&id) {
        Some(user) => Json(user.to_json()).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn token(
    State(shared): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = lock(&shared);
    let user = match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            backend
                .users
                .values()
                .find(|u| u.email.eq_ignore_ascii_case(email) && u.password == password)
                .map(|u| u.id)
        }
        Some("refresh_token") => {
            let refresh = body["refresh_token"].as_str().unwrap_or_default();
            backend.refresh_tokens.remove(refresh)
        }
        _ => return invalid_grant("unsupported grant type"),
    };

    match user.and_then(|id| backend.issue_session(id)) {
        Some(session) => Json(session).into_response(),
        None => invalid_grant("Invalid login credentials"),
    }
}

async fn logout(State(shared): State<Shared>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer(&headers) {
        lock(&shared).access_tokens.remove(token);
    }
    StatusCode::NO_CONTENT
}

async fn current_user(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    match lock(&shared).user_for(&headers) {
        Some(user) => Json(user.to_json()).into_response(),
        None => gotrue_error(StatusCode::UNAUTHORIZED, "bad_jwt", "invalid JWT"),
    }
}

async fn update_user(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut backend = lock(&shared);
    if backend.fail_user_updates {
        return gotrue_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "unexpected_failure",
            "Database error updating user",
        );
    }
    let Some(id) = backend.user_for(&headers).map(|u| u.id) else {
        return gotrue_error(StatusCode::UNAUTHORIZED, "bad_jwt", "invalid JWT");
    };
    let Some(user) = backend.users.get_mut(&id) else {
        return gotrue_error(StatusCode::NOT_FOUND, "user_not_found", "User not found");
    };
    if let Some(password) = body["password"].as_str() {
        password.clone_into(&mut user.password);
    }
    if let Some(data) = body["data"].as_object() {
        for (key, value) in data {
            user.metadata.insert(key.clone(), value.clone());
        }
    }
    Json(user.to_json()).into_response()
}

async fn admin_create_user(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if bearer(&headers) != Some(SERVICE_ROLE_KEY) {
        return gotrue_error(StatusCode::FORBIDDEN, "not_admin", "User not allowed");
    }
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let metadata = body["user_metadata"].as_object().cloned().unwrap_or_default();

    let mut backend = lock(&shared);
    if backend.email_taken(email) {
        return gotrue_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "email_exists",
            "A user with this email address has already been registered",
        );
    }
    let id = backend.register(email, password, metadata);
    match backend.users.get(&id) {
        Some(user) => Json(user.to_json()).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn upload(
    State(shared): State<Shared>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let upsert = header_is(&headers, header::HeaderName::from_static("x-upsert"), "true");
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();

    let mut backend = lock(&shared);
    if !upsert && backend.objects.contains_key(&path) {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "statusCode": "409", "error": "Duplicate", "message": "The resource already exists" })),
        )
            .into_response();
    }
    backend.objects.insert(
        path.clone(),
        StoredObject {
            content_type,
            bytes: body.to_vec(),
        },
    );
    Json(json!({ "Key": path })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(raw: &str) -> RestParams {
        RestParams::parse(raw).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_ilike_wildcards() {
        assert!(ilike("Wireless Headphones", "*head*"));
        assert!(ilike("Wireless Headphones", "wireless*"));
        assert!(!ilike("Wireless Headphones", "*speaker*"));
        assert!(ilike("['Audio', 'Gadgets']", "*audio*"));
        assert!(ilike("exact", "EXACT"));
        assert!(!ilike("exactly", "exact"));
        assert!(ilike("desk_lamp", r"*k\_l*"));
        assert!(!ilike("deskxlamp", r"*k\_l*"));
        assert!(ilike("deskxlamp", "*k_l*"));
        assert!(ilike(r"a\b", r"a\\b"));
    }

    #[test]
    fn test_in_and_or_filters() {
        let row = json!({ "product_id": "PRD00002", "product_name": "Desk, oak", "flash_sale": true });

        let p = params("product_id=in.(PRD00001,PRD00002)");
        assert!(matches_all(&p.filters, &row));

        let p = params("or=(product_name.ilike.\"*desk, oak*\",product_id.eq.PRD00009)");
        assert!(matches_all(&p.filters, &row));

        let p = params("flash_sale=eq.false");
        assert!(!matches_all(&p.filters, &row));
    }

    #[test]
    fn test_order_numeric_and_timestamps() {
        let mut rows = vec![
            json!({ "p": "10.00", "t": "2026-01-02T00:00:00Z" }),
            json!({ "p": "9.50", "t": "2026-01-01T12:00:00+00:00" }),
        ];
        sort_rows(&mut rows, &[("p".into(), true)]);
        assert_eq!(rows[0]["p"], "9.50");
        sort_rows(&mut rows, &[("t".into(), false)]);
        assert_eq!(rows[0]["t"], "2026-01-02T00:00:00Z");
    }
}
