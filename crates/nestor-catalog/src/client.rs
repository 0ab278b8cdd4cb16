//! HTTP client for the catalog service's `nested-programs` collection

use nestor_program::NestedProgram;
use nestor_utils::error::CatalogError;
use nestor_utils::redaction::{error_body_message, redact_error_message};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::entry::{CatalogEntry, EntryId, newest};

/// Pages followed by [`CatalogClient::list`] before giving up
pub const MAX_PAGES: usize = 50;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const COLLECTION: [&str; 3] = ["api", "v1", "nested-programs"];

/// Listing responses come paginated or as a bare array, depending on the
/// service's pagination settings.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Page {
        results: Vec<CatalogEntry>,
        #[serde(default)]
        next: Option<String>,
    },
    Bare(Vec<CatalogEntry>),
}

/// Read access to the catalog, plus token-authenticated writes.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base: Url,
    token: Option<String>,
    request_timeout: Duration,
}

impl CatalogClient {
    /// Anonymous client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Misconfiguration` if `base_url` is not an http(s) URL
    pub fn new(base_url: &str) -> Result<Self, CatalogError> {
        Self::with_options(
            base_url,
            None,
            DEFAULT_REQUEST_TIMEOUT,
            DEFAULT_CONNECT_TIMEOUT,
        )
    }

    /// Client with an optional API token and explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Misconfiguration` if `base_url` is not an http(s)
    /// URL or the HTTP client cannot be built
    pub fn with_options(
        base_url: &str,
        token: Option<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let base = Url::parse(base_url).map_err(|e| {
            CatalogError::Misconfiguration(format!("invalid catalog URL {base_url}: {e}"))
        })?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(CatalogError::Misconfiguration(format!(
                "catalog URL {base_url} must be an http(s) URL"
            )));
        }

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                CatalogError::Misconfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base,
            token: token.filter(|t| !t.is_empty()),
            request_timeout,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Collection URL, or the URL of one entry when `id` is given.
    /// Both keep the trailing slash the service routes on.
    fn endpoint(&self, id: Option<&EntryId>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(COLLECTION);
            if let Some(id) = id {
                path.push(&id.to_string());
            }
            path.push("");
        }
        url
    }

    /// Every entry, optionally restricted to an exact `title`, oldest first.
    ///
    /// # Errors
    ///
    /// Transport, HTTP and decoding failures; `CatalogError::Decode` as well when
    /// pagination does not end within [`MAX_PAGES`] pages.
    pub async fn list(&self, title: Option<&str>) -> Result<Vec<CatalogEntry>, CatalogError> {
        let mut url = self.endpoint(None);
        if let Some(title) = title {
            url.query_pairs_mut().append_pair("title", title);
        }

        let mut entries = Vec::new();
        for _ in 0..MAX_PAGES {
            let page: ListResponse = self.execute_json(self.client.get(url.clone()), "list").await?;
            match page {
                ListResponse::Bare(results) => {
                    entries.extend(results);
                    return Ok(entries);
                }
                ListResponse::Page { results, next } => {
                    entries.extend(results);
                    match next {
                        Some(next) => {
                            url = self.base.join(&next).map_err(|e| {
                                CatalogError::Decode(format!("invalid next page link {next}: {e}"))
                            })?;
                        }
                        None => return Ok(entries),
                    }
                }
            }
        }

        Err(CatalogError::Decode(format!(
            "catalog pagination did not end after {MAX_PAGES} pages"
        )))
    }

    /// The most recently created entry titled exactly `title`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` when no entry has that title.
    pub async fn find_by_title(&self, title: &str) -> Result<CatalogEntry, CatalogError> {
        let matching: Vec<_> = self
            .list(Some(title))
            .await?
            .into_iter()
            .filter(|entry| entry.title == title)
            .collect();
        let count = matching.len();

        let entry = newest(matching).ok_or_else(|| CatalogError::NotFound {
            title: title.to_string(),
        })?;
        debug!(title, candidates = count, id = ?entry.id, "Resolved catalog entry");
        Ok(entry)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::EntryNotFound` when the service has no such entry.
    pub async fn retrieve(&self, id: &EntryId) -> Result<CatalogEntry, CatalogError> {
        self.execute_json(self.client.get(self.endpoint(Some(id))), "retrieve")
            .await
            .map_err(|e| entry_scoped(id, e))
    }

    /// Store `program` and return the entry the service created.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::MissingToken` before any request when the client
    /// has no API token.
    pub async fn create(&self, program: &NestedProgram) -> Result<CatalogEntry, CatalogError> {
        let request = self
            .authorized(self.client.post(self.endpoint(None)))?
            .json(&CatalogEntry::from_program(program));
        let created: CatalogEntry = self.execute_json(request, "create").await?;
        info!(title = %created.title, id = ?created.id, "Stored nested program in catalog");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::MissingToken` without a token and
    /// `CatalogError::EntryNotFound` when the entry does not exist.
    pub async fn delete(&self, id: &EntryId) -> Result<(), CatalogError> {
        let request = self.authorized(self.client.delete(self.endpoint(Some(id))))?;
        self.execute(request, "delete")
            .await
            .map_err(|e| entry_scoped(id, e))?;
        info!(%id, "Deleted catalog entry");
        Ok(())
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, CatalogError> {
        let token = self.token.as_deref().ok_or(CatalogError::MissingToken)?;
        Ok(request.bearer_auth(token))
    }

    async fn execute(
        &self,
        request_builder: RequestBuilder,
        operation: &str,
    ) -> Result<Response, CatalogError> {
        let request = request_builder
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| CatalogError::Transport(format!("Failed to build request: {e}")))?;

        debug!(
            operation,
            method = %request.method(),
            url = %redact_error_message(request.url().as_str()),
            "Executing catalog request"
        );

        let response = self.client.execute(request).await.map_err(|e| {
            CatalogError::Transport(format!(
                "{operation} request failed: {}",
                redact_error_message(&e.to_string())
            ))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(operation, status = status.as_u16(), "Catalog returned an error");
        Err(status_error(status, &body))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request_builder: RequestBuilder,
        operation: &str,
    ) -> Result<T, CatalogError> {
        let body = self
            .execute(request_builder, operation)
            .await?
            .text()
            .await
            .map_err(|e| {
                CatalogError::Transport(format!(
                    "Failed to read {operation} response: {}",
                    redact_error_message(&e.to_string())
                ))
            })?;
        serde_json::from_str(&body).map_err(|e| {
            CatalogError::Decode(format!("Failed to parse {operation} response: {e}"))
        })
    }
}

fn status_error(status: StatusCode, body: &str) -> CatalogError {
    CatalogError::Http {
        status: status.as_u16(),
        message: error_body_message(body, status.canonical_reason()),
    }
}

fn entry_scoped(id: &EntryId, err: CatalogError) -> CatalogError {
    match err {
        CatalogError::Http { status: 404, .. } => CatalogError::EntryNotFound { id: id.to_string() },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_keep_trailing_slash() {
        let client = CatalogClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.endpoint(None).as_str(),
            "http://localhost:8000/api/v1/nested-programs/"
        );
        assert_eq!(
            client.endpoint(Some(&EntryId::Number(3))).as_str(),
            "http://localhost:8000/api/v1/nested-programs/3/"
        );
    }

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let client = CatalogClient::new("https://gateway.example/catalog/").unwrap();
        assert_eq!(
            client.endpoint(None).as_str(),
            "https://gateway.example/catalog/api/v1/nested-programs/"
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            CatalogClient::new("ftp://catalog"),
            Err(CatalogError::Misconfiguration(_))
        ));
        assert!(matches!(
            CatalogClient::new("not a url"),
            Err(CatalogError::Misconfiguration(_))
        ));
    }

    #[test]
    fn test_list_response_shapes() {
        let page: ListResponse = serde_json::from_str(
            r#"{"count": 1, "next": null, "previous": null,
                "results": [{"title": "t", "entrypoint": "job.py"}]}"#,
        )
        .unwrap();
        assert!(matches!(page, ListResponse::Page { ref results, next: None } if results.len() == 1));

        let bare: ListResponse =
            serde_json::from_str(r#"[{"title": "t", "entrypoint": "job.py"}]"#).unwrap();
        assert!(matches!(bare, ListResponse::Bare(ref results) if results.len() == 1));
    }

    #[test]
    fn test_status_error_redacts_and_truncates() {
        use nestor_utils::redaction::MAX_ERROR_BODY_CHARS;

        let err = status_error(StatusCode::FORBIDDEN, "");
        assert!(matches!(err, CatalogError::Http { status: 403, ref message } if message == "Forbidden"));

        let long = "bad field. ".repeat(MAX_ERROR_BODY_CHARS / 4);
        match status_error(StatusCode::BAD_REQUEST, &long) {
            CatalogError::Http { message, .. } => {
                assert_eq!(message.chars().count(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_writes_need_token() {
        let client = CatalogClient::new("http://127.0.0.1:1").unwrap();
        let program = NestedProgram::builder("t", "job.py").build().unwrap();

        assert!(matches!(
            client.create(&program).await,
            Err(CatalogError::MissingToken)
        ));
        assert!(matches!(
            client.delete(&EntryId::Number(1)).await,
            Err(CatalogError::MissingToken)
        ));
    }
}
