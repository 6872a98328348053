/// HTTP implementation of [`Store`] over the knowledge-base REST API.
use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{Store, StoreError};
use crate::models::{EntryId, EntryRecord, Snapshot, TagId, TagRecord};

/// Server used when neither the builder nor `TAGMAP_HOST` names one.
pub const DEFAULT_HOST: &str = "http://localhost:8000";

/// Builder for constructing `HttpStore` instances.
///
/// # Examples
///
/// ```
/// use tagmap::store::HttpStoreBuilder;
///
/// let store = HttpStoreBuilder::new()
///     .base_url("http://localhost:8000")
///     .build()
///     .expect("Failed to create store");
/// assert_eq!(store.base_url(), "http://localhost:8000");
/// ```
#[derive(Debug, Default)]
pub struct HttpStoreBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl HttpStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server root, e.g. `http://localhost:8000`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Overrides the 10 second request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the `HttpStore`.
    ///
    /// # Environment Variables
    ///
    /// If `base_url()` was not called, `TAGMAP_HOST` is used, falling back to
    /// [`DEFAULT_HOST`].
    pub fn build(self) -> Result<HttpStore, StoreError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => std::env::var("TAGMAP_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        };
        let base_url = base_url.trim_end_matches('/').to_string();

        reqwest::Url::parse(&base_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(10)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(StoreError::Network)?;

        Ok(HttpStore { client, base_url })
    }
}

/// Blocking client for the knowledge-base server.
///
/// Requests are sent once; failures are returned, never retried.
pub struct HttpStore {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpStore {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<String, StoreError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            log::warn!(
                "event=store_request method={} path={} status=error http_status={}",
                method,
                path,
                status.as_u16()
            );
            return Err(StoreError::Http {
                status: status.as_u16(),
            });
        }
        log::debug!("event=store_request method={} path={} status=ok", method, path);
        response.text().map_err(classify)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T, StoreError> {
        let text = self.send(method, path, body)?;
        serde_json::from_str(&text).map_err(StoreError::Serialization)
    }
}

fn classify(error: reqwest::Error) -> StoreError {
    if error.is_timeout() {
        StoreError::Timeout(error)
    } else {
        StoreError::Network(error)
    }
}

impl Store for HttpStore {
    fn fetch_all(&self) -> Result<Snapshot, StoreError> {
        self.send_json(Method::GET, "/all/", None::<&()>)
    }

    fn create_tag(&self, name: Option<&str>, parent: TagId) -> Result<TagRecord, StoreError> {
        let body = json!({ "name": name, "parent": parent });
        self.send_json(Method::POST, "/tags/", Some(&body))
    }

    fn edit_tag(&self, id: TagId, name: &str, parent: Option<TagId>) -> Result<(), StoreError> {
        let body = json!({ "id": id, "name": name, "parent": parent });
        self.send(Method::PATCH, "/tags/", Some(&body)).map(drop)
    }

    fn delete_tag(&self, id: TagId) -> Result<(), StoreError> {
        let body = json!({ "id": id });
        self.send(Method::DELETE, "/tags/", Some(&body)).map(drop)
    }

    fn create_entry(&self, parent: TagId, title: &str) -> Result<EntryRecord, StoreError> {
        let body = json!({ "parent_id": parent, "title": title });
        self.send_json(Method::POST, "/entries/", Some(&body))
    }

    fn update_entry(&self, id: EntryId, title: &str, content: &str) -> Result<(), StoreError> {
        let body = json!({ "id": id, "title": title, "content": content });
        self.send(Method::PATCH, "/entries/", Some(&body)).map(drop)
    }

    fn update_entry_category(&self, id: EntryId, tag_name: &str) -> Result<(), StoreError> {
        let body = json!({ "id": id, "tag": tag_name });
        self.send(Method::PATCH, "/entries/", Some(&body)).map(drop)
    }

    fn delete_entry(&self, id: EntryId) -> Result<(), StoreError> {
        let body = json!({ "id": id });
        self.send(Method::DELETE, "/entries/", Some(&body)).map(drop)
    }
}
