//! API Session Client for the remote content store.
//!
//! Owns the session credential and injects it into every call. Endpoints used:
//!
//! | Method | Path                       | Use                          |
//! |--------|----------------------------|------------------------------|
//! | POST   | `/users/login`             | Exchange credentials         |
//! | GET    | `/{collection}?page&limit` | Paginated listing            |
//! | POST   | `/{collection}`            | Create a document            |
//! | PATCH  | `/{collection}/{id}`       | Partial update               |
//! | DELETE | `/{collection}/{id}`       | Delete                       |
//! | POST   | `/media` (multipart)       | Upload an image              |
//!
//! Any non-2xx answer on a read or write surfaces as [`ClientError::Status`].
//! A 401/403 first triggers a single re-login and one retry of the same call.

use futures::stream::{self, Stream, TryStreamExt};
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::config::StoreConfig;
use crate::error::{ClientError, ClientResult};
use crate::logs::log_info_indent;
use crate::models::{MediaId, MediaRef};

/// Collection holding product documents.
pub const PRODUCTS: &str = "products";

/// Collection holding uploaded images.
pub const MEDIA: &str = "media";

/// Credential presented on every call.
#[derive(Debug, Clone)]
enum Session {
    Token(String),
    Cookie(String),
}

/// One page of a collection listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub docs: Vec<Value>,
    #[serde(default)]
    pub has_next_page: Option<bool>,
}

/// Session-authenticated client for the content store.
pub struct StoreClient {
    http: reqwest::Client,
    config: StoreConfig,
    session: RwLock<Option<Session>>,
    /// Bumped on every successful login.
    generation: AtomicU64,
    relogin: Mutex<()>,
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            session: RwLock::new(None),
            generation: AtomicU64::new(0),
            relogin: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Pause to insert between successive deletes.
    pub fn delete_delay(&self) -> Duration {
        self.config.delete_delay
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url, path.trim_start_matches('/'))
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in and store the returned credential.
    ///
    /// Uses the `token` (or `accessToken`) field of the response; when the
    /// store only sets a session cookie, that cookie is replayed instead.
    pub async fn authenticate(&self) -> ClientResult<()> {
        let response = self
            .http
            .post(self.url("users/login"))
            .json(&json!({
                "email": self.config.email,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| ClientError::AuthenticationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::AuthenticationFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        let cookies = session_cookies(&response);
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let token = body
            .get("token")
            .or_else(|| body.get("accessToken"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());

        let session = match (token, cookies) {
            (Some(token), _) => Session::Token(token.to_string()),
            (None, Some(cookies)) => Session::Cookie(cookies),
            (None, None) => {
                return Err(ClientError::AuthenticationFailed(
                    "login response carried neither a token nor a session cookie".to_string(),
                ))
            }
        };

        *self.session.write().await = Some(session);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Log in again unless another caller already did since `seen_generation`.
    async fn refresh_session(&self, seen_generation: u64) -> ClientResult<()> {
        let _guard = self.relogin.lock().await;
        if self.generation.load(Ordering::SeqCst) != seen_generation {
            return Ok(());
        }
        self.authenticate().await
    }

    async fn authorize(&self, builder: RequestBuilder) -> ClientResult<RequestBuilder> {
        match self.session.read().await.as_ref() {
            Some(Session::Token(token)) => Ok(builder.header(
                AUTHORIZATION,
                format!("{} {}", self.config.auth_scheme.prefix(), token),
            )),
            Some(Session::Cookie(cookie)) => Ok(builder.header(COOKIE, cookie.as_str())),
            None => Err(ClientError::MissingCredentials),
        }
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    async fn execute<F>(&self, build: &F) -> ClientResult<Response>
    where
        F: Fn(&reqwest::Client) -> ClientResult<RequestBuilder>,
    {
        let request = self.authorize(build(&self.http)?).await?;
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body: truncate(&body, 200),
        })
    }

    /// Send an authorized request, re-logging in once on an expired session.
    async fn send<F>(&self, build: F) -> ClientResult<Response>
    where
        F: Fn(&reqwest::Client) -> ClientResult<RequestBuilder>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        match self.execute(&build).await {
            Err(e) if e.is_auth_expired() => {
                self.refresh_session(generation).await?;
                self.execute(&build).await
            }
            other => other,
        }
    }

    async fn send_json<F>(&self, build: F) -> ClientResult<Value>
    where
        F: Fn(&reqwest::Client) -> ClientResult<RequestBuilder>,
    {
        let response = self.send(build).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Fetch one page of a collection.
    pub async fn list_page(&self, collection: &str, page: usize) -> ClientResult<Page> {
        let url = self.url(collection);
        let limit = self.config.page_size;
        let body = self
            .send_json(|http| Ok(http.get(&url).query(&[("page", page), ("limit", limit)])))
            .await?;
        serde_json::from_value(body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Lazily walk every document of a collection, page by page.
    ///
    /// Stops after a page flagged `hasNextPage: false`, on the first empty page, or,
    /// when the store sends no flag, after a short page.
    pub fn paginate<'a>(
        &'a self,
        collection: &'a str,
    ) -> impl Stream<Item = ClientResult<Value>> + 'a {
        stream::try_unfold(Some(1usize), move |next| self.next_page(collection, next))
            .map_ok(|docs| stream::iter(docs.into_iter().map(Ok)))
            .try_flatten()
    }

    async fn next_page(
        &self,
        collection: &str,
        next: Option<usize>,
    ) -> ClientResult<Option<(Vec<Value>, Option<usize>)>> {
        let Some(page) = next else {
            return Ok(None);
        };
        let result = self.list_page(collection, page).await?;
        if result.docs.is_empty() {
            return Ok(None);
        }
        log_info_indent(format!("Page {}: {} documents", page, result.docs.len()), 1);
        let next = match result.has_next_page {
            Some(true) => Some(page + 1),
            Some(false) => None,
            None if result.docs.len() < self.config.page_size => None,
            None => Some(page + 1),
        };
        Ok(Some((result.docs, next)))
    }

    /// Create a document; returns the stored document.
    pub async fn create(&self, collection: &str, document: &Value) -> ClientResult<Value> {
        let url = self.url(collection);
        let body = self.send_json(|http| Ok(http.post(&url).json(document))).await?;
        Ok(unwrap_doc(body))
    }

    /// Apply a partial update.
    pub async fn patch(&self, collection: &str, id: &str, fields: &Value) -> ClientResult<Value> {
        let url = self.url(&format!("{}/{}", collection, id));
        let body = self.send_json(|http| Ok(http.patch(&url).json(fields))).await?;
        Ok(unwrap_doc(body))
    }

    pub async fn delete(&self, collection: &str, id: &str) -> ClientResult<()> {
        let url = self.url(&format!("{}/{}", collection, id));
        self.send(|http| Ok(http.delete(&url))).await?;
        Ok(())
    }

    // =========================================================================
    // Products & media
    // =========================================================================

    pub async fn create_product(&self, document: &Value) -> ClientResult<Value> {
        self.create(PRODUCTS, document).await
    }

    pub async fn patch_product(&self, id: &str, fields: &Value) -> ClientResult<Value> {
        self.patch(PRODUCTS, id, fields).await
    }

    pub async fn delete_product(&self, id: &str) -> ClientResult<()> {
        self.delete(PRODUCTS, id).await
    }

    pub fn products(&self) -> impl Stream<Item = ClientResult<Value>> + '_ {
        self.paginate(PRODUCTS)
    }

    /// Upload a JPEG with its alt text.
    pub async fn upload_media(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        alt: &str,
    ) -> ClientResult<MediaRef> {
        let url = self.url(MEDIA);
        let body = self
            .send_json(|http| {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.to_string())
                    .mime_str("image/jpeg")?;
                let form = reqwest::multipart::Form::new()
                    .text("alt", alt.to_string())
                    .part("file", part);
                Ok(http.post(&url).multipart(form))
            })
            .await?;

        let doc = unwrap_doc(body);
        let id = doc
            .get("id")
            .cloned()
            .ok_or_else(|| ClientError::InvalidResponse("upload response has no id".to_string()))?;
        let remote_media_id: MediaId =
            serde_json::from_value(id).map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        Ok(MediaRef { remote_media_id, alt_text: alt.to_string() })
    }

    /// `GET /media`: first page of media documents.
    pub async fn list_media(&self) -> ClientResult<Vec<Value>> {
        let url = self.url(MEDIA);
        let body = self.send_json(|http| Ok(http.get(&url))).await?;
        let page: Page =
            serde_json::from_value(body).map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(page.docs)
    }
}

/// Document id as a string, whether the store uses string or integer ids.
pub fn doc_id(doc: &Value) -> Option<String> {
    match doc.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Write endpoints answer `{ doc: {...}, message }`; older ones answer the doc.
fn unwrap_doc(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("doc").is_some_and(Value::is_object) => {
            map.remove("doc").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// `name=value` pairs from `Set-Cookie`, joined for a `Cookie` header.
fn session_cookies(response: &Response) -> Option<String> {
    let pairs: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_accepts_both_shapes() {
        assert_eq!(doc_id(&json!({ "id": "65f0a1" })), Some("65f0a1".to_string()));
        assert_eq!(doc_id(&json!({ "id": 42 })), Some("42".to_string()));
        assert_eq!(doc_id(&json!({ "id": "" })), None);
        assert_eq!(doc_id(&json!({ "title": "x" })), None);
    }

    #[test]
    fn test_unwrap_doc() {
        let wrapped = json!({ "doc": { "id": 3 }, "message": "Created" });
        assert_eq!(unwrap_doc(wrapped), json!({ "id": 3 }));

        let bare = json!({ "id": 3 });
        assert_eq!(unwrap_doc(bare.clone()), bare);
    }

    #[test]
    fn test_page_defaults() {
        let page: Page = serde_json::from_value(json!({ "docs": [{ "id": 1 }] })).unwrap();
        assert_eq!(page.docs.len(), 1);
        assert_eq!(page.has_next_page, None);
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("éééé", 2), "éé");
    }
}
