//! HR table directory source.
//!
//! Talks to the spreadsheet API that hosts the employee roster. Every call
//! needs a tenant access token, obtained from the app credentials and reused
//! until shortly before it expires.

use std::time::Duration;

use async_trait::async_trait;
use digest_models::{normalize_username, EmploymentStatus, UserRecord};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HrTableConfig;
use crate::error::{DirectoryError, Result};
use crate::provider::DirectorySource;

/// Token endpoint, relative to the base URL.
const TOKEN_PATH: &str = "open-apis/auth/v3/tenant_access_token/internal";

/// Tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// API codes meaning the access token is invalid or expired.
const INVALID_TOKEN_CODES: [i64; 3] = [99991661, 99991663, 99991668];

/// Upper bound on pages read in one sync.
const MAX_PAGES: usize = 1000;

/// A cached tenant access token.
#[derive(Debug, Clone)]
struct TenantToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    tenant_access_token: Option<String>,
    /// Lifetime in seconds.
    expire: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<RecordPage>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordPage {
    #[serde(default)]
    has_more: bool,
    page_token: Option<String>,
    #[serde(default)]
    items: Option<Vec<TableRecord>>,
}

#[derive(Debug, Deserialize)]
struct TableRecord {
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Directory source backed by the HR table API.
pub struct HrTableSource {
    client: reqwest::Client,
    config: HrTableConfig,
    base: Url,
    token: Mutex<Option<TenantToken>>,
}

impl HrTableSource {
    /// Creates a source from its configuration.
    ///
    /// # Errors
    /// Returns `DirectoryError::Config` if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: HrTableConfig) -> Result<Self> {
        let mut base = Url::parse(&config.base_url)
            .map_err(|e| DirectoryError::Config(format!("invalid HR table URL: {}", e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DirectoryError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            base,
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| DirectoryError::Config(format!("invalid endpoint {}: {}", path, e)))
    }

    fn records_path(&self) -> String {
        format!(
            "open-apis/bitable/v1/apps/{}/tables/{}/records",
            self.config.app_token, self.config.table_id
        )
    }

    /// Returns a valid tenant token, requesting a new one if needed.
    async fn tenant_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(&self) -> Result<TenantToken> {
        let url = self.endpoint(TOKEN_PATH)?;
        let response = self
            .client
            .post(url)
            .json(&json!({
                "app_id": self.config.app_id,
                "app_secret": self.config.app_secret,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "token request failed with HTTP {}",
                status
            )));
        }

        let body: TokenResponse = response.json().await?;
        if body.code != 0 {
            return Err(DirectoryError::Unavailable(format!(
                "token request rejected: {} ({})",
                body.msg, body.code
            )));
        }
        let value = body
            .tenant_access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| DirectoryError::Malformed("token response without token".to_string()))?;

        let lifetime = body
            .expire
            .map(Duration::from_secs)
            .unwrap_or(self.config.token_ttl)
            .min(self.config.token_ttl)
            .saturating_sub(TOKEN_REFRESH_MARGIN);

        info!(valid_for_secs = lifetime.as_secs(), "Obtained HR table access token");

        Ok(TenantToken {
            value,
            expires_at: Instant::now() + lifetime,
        })
    }

    /// Sends an authorized request, refreshing the token once if rejected.
    async fn send_authorized<F>(&self, build: F) -> Result<RecordPage>
    where
        F: Fn(&str) -> RequestBuilder + Send + Sync,
    {
        let mut retried = false;
        loop {
            let token = self.tenant_token().await?;
            let response = build(token.as_str()).send().await?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                self.invalidate_token().await;
                if !retried {
                    debug!("HR table rejected token, refreshing");
                    retried = true;
                    continue;
                }
                return Err(DirectoryError::Unavailable(
                    "HR table rejected the access token".to_string(),
                ));
            }
            if !status.is_success() {
                return Err(DirectoryError::Unavailable(format!(
                    "HR table request failed with HTTP {}",
                    status
                )));
            }

            let envelope: ApiEnvelope = response.json().await?;
            if INVALID_TOKEN_CODES.contains(&envelope.code) {
                self.invalidate_token().await;
                if !retried {
                    debug!(code = envelope.code, "HR table token expired, refreshing");
                    retried = true;
                    continue;
                }
                return Err(DirectoryError::Unavailable(format!(
                    "HR table rejected the access token ({})",
                    envelope.code
                )));
            }
            if envelope.code != 0 {
                return Err(DirectoryError::Unavailable(format!(
                    "HR table error {}: {}",
                    envelope.code, envelope.msg
                )));
            }

            return Ok(envelope.data.unwrap_or_default());
        }
    }

    /// Server-side search for the common spellings of a username.
    ///
    /// Rows are normalized locally, so only a row whose cell normalizes to
    /// `key` is returned.
    async fn search_user(&self, key: &str) -> Result<Option<UserRecord>> {
        let url = self.endpoint(&format!("{}/search", self.records_path()))?;
        let field = &self.config.fields.username;
        let body = json!({
            "filter": {
                "conjunction": "or",
                "conditions": [
                    { "field_name": field, "operator": "is", "value": [key] },
                    { "field_name": field, "operator": "is", "value": [format!("@{}", key)] },
                ],
            },
        });
        let page_size = self.config.page_size.to_string();

        let page = self
            .send_authorized(|token| {
                self.client
                    .post(url.clone())
                    .bearer_auth(token)
                    .query(&[("page_size", page_size.as_str())])
                    .json(&body)
            })
            .await?;

        Ok(self
            .map_page(&page)
            .into_iter()
            .find(|record| record.username == key))
    }

    /// Maps a table row to a user record, skipping rows without a username.
    fn map_record(&self, fields: &Map<String, Value>) -> Option<UserRecord> {
        let names = &self.config.fields;
        let username = fields.get(&names.username).and_then(field_text)?;
        let username = normalize_username(&username);
        if username.is_empty() {
            return None;
        }

        let employee_name = fields
            .get(&names.employee_name)
            .and_then(field_text)
            .unwrap_or_default();
        let status = fields
            .get(&names.status)
            .and_then(field_text)
            .map(|s| EmploymentStatus::parse_lenient(&s))
            .unwrap_or_default();
        let role = fields.get(&names.role).and_then(field_text);

        Some(UserRecord::new(&username, employee_name, status, role))
    }

    fn map_page(&self, page: &RecordPage) -> Vec<UserRecord> {
        page.items
            .iter()
            .flatten()
            .filter_map(|item| self.map_record(&item.fields))
            .collect()
    }
}

#[async_trait]
impl DirectorySource for HrTableSource {
    fn name(&self) -> &str {
        "hr-table"
    }

    async fn fetch_user(&self, username: &str) -> Result<Option<UserRecord>> {
        let key = normalize_username(username);
        if let Some(record) = self.search_user(&key).await? {
            return Ok(Some(record));
        }

        // Cells are free text ("@Alice", "Alice"); the server filter only
        // matches exact values, so confirm a miss against the full roster.
        debug!(username = %key, "HR table search found nothing, scanning roster");
        Ok(self
            .fetch_all()
            .await?
            .into_iter()
            .find(|record| record.username == key))
    }

    async fn fetch_all(&self) -> Result<Vec<UserRecord>> {
        let url = self.endpoint(&self.records_path())?;
        let page_size = self.config.page_size.to_string();
        let mut users = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self
                .send_authorized(|token| {
                    let mut request = self
                        .client
                        .get(url.clone())
                        .bearer_auth(token)
                        .query(&[("page_size", page_size.as_str())]);
                    if let Some(pt) = page_token.as_deref() {
                        request = request.query(&[("page_token", pt)]);
                    }
                    request
                })
                .await?;

            users.extend(self.map_page(&page));

            match (page.has_more, page.page_token) {
                (true, Some(next)) if !next.is_empty() => page_token = Some(next),
                (true, _) => {
                    warn!("HR table reported more pages without a page token");
                    break;
                }
                (false, _) => break,
            }
        }

        debug!(count = users.len(), "Fetched HR roster");
        Ok(users)
    }
}

/// Extracts display text from a table cell.
///
/// Cells can be plain strings, numbers, rich-text segment arrays
/// (`[{"text": "..."}]`) or person/option objects (`{"name": "..."}`).
fn field_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().filter_map(field_text).collect::<Vec<_>>().join(""),
        Value::Object(map) => {
            return ["text", "name", "value"]
                .iter()
                .find_map(|k| map.get(*k).and_then(field_text));
        }
        _ => return None,
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::config::DirectoryConfig;
    use crate::provider::{DirectoryLookup, UserDirectoryProvider};
    use crate::service::DirectoryService;

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    /// In-process stand-in for the HR table API.
    #[derive(Default)]
    struct FakeHr {
        tokens_issued: AtomicUsize,
        reject_with_401: AtomicBool,
        expire_with_code: AtomicBool,
        searches: AtomicUsize,
        listings: AtomicUsize,
        records: Vec<Value>,
    }

    impl FakeHr {
        fn with_records(records: Vec<Value>) -> Arc<Self> {
            Arc::new(Self {
                records,
                ..Default::default()
            })
        }

        fn authorized(&self, headers: &HeaderMap) -> bool {
            let current = format!("Bearer t-{}", self.tokens_issued.load(Ordering::SeqCst));
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == current)
        }
    }

    fn row(telegram: Value, name: &str, status: &str, role: &str) -> Value {
        json!({
            "record_id": format!("rec-{}", name),
            "fields": { "telegram": telegram, "name": name, "status": status, "role": role }
        })
    }

    async fn issue_token(State(fake): State<Arc<FakeHr>>, Json(body): Json<Value>) -> Json<Value> {
        if body["app_id"] != "cli_test" || body["app_secret"] != "secret" {
            return Json(json!({ "code": 10014, "msg": "app secret invalid" }));
        }
        let n = fake.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": format!("t-{}", n),
            "expire": 7200
        }))
    }

    fn gate(fake: &FakeHr, headers: &HeaderMap) -> Option<Response> {
        if fake.reject_with_401.swap(false, Ordering::SeqCst) || !fake.authorized(headers) {
            return Some(AxumStatus::UNAUTHORIZED.into_response());
        }
        if fake.expire_with_code.swap(false, Ordering::SeqCst) {
            return Some(
                Json(json!({ "code": 99991663, "msg": "tenant access token expired" }))
                    .into_response(),
            );
        }
        None
    }

    async fn list_records(
        State(fake): State<Arc<FakeHr>>,
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        if let Some(rejection) = gate(&fake, &headers) {
            return rejection;
        }
        fake.listings.fetch_add(1, Ordering::SeqCst);
        let size: usize = params["page_size"].parse().unwrap();
        let offset: usize = params
            .get("page_token")
            .map(|t| t.parse().unwrap())
            .unwrap_or(0);
        let end = (offset + size).min(fake.records.len());
        let has_more = end < fake.records.len();
        let next_token = has_more.then(|| end.to_string());

        Json(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "has_more": has_more,
                "page_token": next_token,
                "items": fake.records[offset..end].to_vec(),
            }
        }))
        .into_response()
    }

    async fn search_records(
        State(fake): State<Arc<FakeHr>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Response {
        if let Some(rejection) = gate(&fake, &headers) {
            return rejection;
        }
        let wanted: Vec<String> = body["filter"]["conditions"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|c| c["value"][0].as_str().map(str::to_string))
            .collect();
        fake.searches.fetch_add(1, Ordering::SeqCst);
        let items: Vec<Value> = fake
            .records
            .iter()
            .filter(|r| {
                // Exact cell match, like the real filter
                field_text(&r["fields"]["telegram"]).is_some_and(|cell| wanted.contains(&cell))
            })
            .cloned()
            .collect();

        Json(json!({
            "code": 0,
            "msg": "success",
            "data": { "has_more": false, "items": items }
        }))
        .into_response()
    }

    async fn spawn_fake(fake: Arc<FakeHr>) -> String {
        let app = Router::new()
            .route(TOKEN_PATH_ROUTE, post(issue_token))
            .route("/open-apis/bitable/v1/apps/:app/tables/:table/records", get(list_records))
            .route(
                "/open-apis/bitable/v1/apps/:app/tables/:table/records/search",
                post(search_records),
            )
            .with_state(fake);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    const TOKEN_PATH_ROUTE: &str = "/open-apis/auth/v3/tenant_access_token/internal";

    fn source(base_url: &str) -> HrTableSource {
        let config = HrTableConfig::new("cli_test", "secret", "app123", "tbl456")
            .with_base_url(base_url)
            .with_page_size(2);
        HrTableSource::new(config).unwrap()
    }

    fn roster() -> Vec<Value> {
        vec![
            row(json!("@Alice"), "Alice", "Active", "tester"),
            row(json!([{ "type": "text", "text": "bob" }]), "Bob", "Terminated", "admin"),
            row(json!("carol"), "Carol", "on leave", ""),
        ]
    }

    #[tokio::test]
    async fn test_fetch_all_paginates_and_maps() {
        let fake = FakeHr::with_records(roster());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let source = source(&url);

        let users = source.fetch_all().await.unwrap();

        assert_eq!(users.len(), 3);
        assert_eq!(users[0], UserRecord::active("alice", "Alice", "tester"));
        assert_eq!(users[1].username, "bob");
        assert_eq!(users[1].employment_status, EmploymentStatus::Terminated);
        assert_eq!(users[2].employment_status, EmploymentStatus::Unknown);
        assert!(users[2].assigned_role.is_none());
    }

    #[tokio::test]
    async fn test_token_is_reused() {
        let fake = FakeHr::with_records(roster());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let source = source(&url);

        source.fetch_all().await.unwrap();
        source.fetch_user("bob").await.unwrap();

        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_user_search() {
        let fake = FakeHr::with_records(roster());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let source = source(&url);

        let bob = source.fetch_user("@Bob").await.unwrap().unwrap();
        assert_eq!(bob.employee_name, "Bob");
        assert_eq!(bob.assigned_role.as_deref(), Some("admin"));

        assert!(source.fetch_user("mallory").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_user_matches_spelling_of_full_sync() {
        let fake = FakeHr::with_records(roster());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let source = source(&url);

        let synced = source.fetch_all().await.unwrap();
        let alice = source.fetch_user("alice").await.unwrap();

        assert_eq!(alice.as_ref(), synced.iter().find(|u| u.username == "alice"));
        assert_eq!(alice, Some(UserRecord::active("alice", "Alice", "tester")));
    }

    #[tokio::test]
    async fn test_fetch_user_prefixed_cell_found_by_search() {
        let fake = FakeHr::with_records(vec![row(json!("@dora"), "Dora", "active", "tester")]);
        let url = spawn_fake(Arc::clone(&fake)).await;
        let source = source(&url);

        let dora = source.fetch_user("Dora").await.unwrap().unwrap();

        assert_eq!(dora.username, "dora");
        assert_eq!(fake.searches.load(Ordering::SeqCst), 1);
        assert_eq!(fake.listings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_for_prefixed_cell_stays_found() {
        let fake = FakeHr::with_records(roster());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let source: Arc<dyn DirectorySource> = Arc::new(source(&url));

        // Zero TTL: every lookup after the sync goes back to the table
        let service = DirectoryService::new(
            source,
            DirectoryConfig::new().with_ttl(Duration::ZERO),
        );
        service.sync_now().await.unwrap();

        let lookup = service.get_user_by_username("alice").await;
        assert_eq!(
            lookup,
            DirectoryLookup::Found {
                record: UserRecord::active("alice", "Alice", "tester"),
                stale: false,
            }
        );
        assert_eq!(service.cached_users().await, 3);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_token_once() {
        let fake = FakeHr::with_records(roster());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let source = source(&url);

        source.fetch_user("carol").await.unwrap();
        fake.reject_with_401.store(true, Ordering::SeqCst);

        let carol = source.fetch_user("carol").await.unwrap();
        assert!(carol.is_some());
        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_token_code_refreshes_token() {
        let fake = FakeHr::with_records(roster());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let source = source(&url);

        source.fetch_all().await.unwrap();
        fake.expire_with_code.store(true, Ordering::SeqCst);

        assert_eq!(source.fetch_all().await.unwrap().len(), 3);
        assert_eq!(fake.tokens_issued.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unavailable() {
        let fake = FakeHr::with_records(roster());
        let url = spawn_fake(Arc::clone(&fake)).await;
        let config = HrTableConfig::new("cli_test", "wrong", "app123", "tbl456").with_base_url(&url);
        let source = HrTableSource::new(config).unwrap();

        let err = source.fetch_all().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
        assert!(err.to_string().contains("10014"));
    }

    #[tokio::test]
    async fn test_unreachable_is_unavailable() {
        let source = source("http://127.0.0.1:1");
        assert!(matches!(
            source.fetch_user("alice").await,
            Err(DirectoryError::Unavailable(_))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = HrTableConfig::new("a", "b", "c", "d").with_base_url("not a url");
        assert!(matches!(
            HrTableSource::new(config),
            Err(DirectoryError::Config(_))
        ));
    }

    #[test]
    fn test_field_text() {
        assert_eq!(field_text(&json!(" alice ")), Some("alice".to_string()));
        assert_eq!(field_text(&json!(42)), Some("42".to_string()));
        assert_eq!(
            field_text(&json!([{ "text": "al" }, { "text": "ice" }])),
            Some("alice".to_string())
        );
        assert_eq!(
            field_text(&json!({ "id": "ou_1", "name": "Alice" })),
            Some("Alice".to_string())
        );
        assert_eq!(field_text(&json!("")), None);
        assert_eq!(field_text(&Value::Null), None);
    }
}
