//! Materialize an API config plus bound inputs into HTTP requests
//!
//! One [`HttpCaller::call`] may fan out into several requests when the
//! endpoint paginates; decoded page payloads are concatenated into a single
//! sequence. Transient failures (status >= 500, transport errors) retry
//! with exponential backoff; 4xx is permanent.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use splice_domain::{ApiConfig, AuthType, CacheMode, PaginationType};

use crate::cache::{RequestFingerprint, ResponseCache};
use crate::error::EngineError;
use crate::template::{render, TemplateVars};

use super::select_path;

const MAX_PAGES: u32 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const SNIPPET_LEN: usize = 200;

/// Credential keys tried, in order, when injecting authentication
const CREDENTIAL_KEYS: [&str; 3] = ["access_token", "token", "api_key"];

/// Decoded result of one (possibly paginated) call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOutcome {
    pub data: Value,
    pub pages_fetched: u32,
    pub last_status: u16,
}

/// Executes API configs against the network
pub struct HttpCaller {
    client: reqwest::Client,
    cache: Arc<ResponseCache>,
}

impl HttpCaller {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
        }
    }

    /// Execute one call: substitute placeholders, apply authentication,
    /// paginate, and decode.
    pub async fn call(
        &self,
        config: &ApiConfig,
        input: &Value,
        credentials: &Value,
        cache_mode: CacheMode,
        tenant_key: &str,
    ) -> Result<CallOutcome, EngineError> {
        let vars = TemplateVars::new(input, credentials);

        let url = render(&config.url(), &vars)?;
        let mut headers = self.materialize_headers(config, &vars)?;
        let mut base_query = self.materialize_query(config, &vars)?;
        self.apply_authentication(config, credentials, &mut headers, &mut base_query)?;

        let body = match &config.body {
            Some(template) if config.method.has_body() => Some(render(template, &vars)?),
            _ => None,
        };

        let secrets = credential_secrets(credentials);
        let key = RequestFingerprint {
            tenant: tenant_key,
            method: config.method.as_str(),
            url: &url,
            headers: &headers,
            query: &base_query,
            body: body.as_deref(),
            secrets: &secrets,
        }
        .digest();

        if let Some(hit) = self.cache.get(&key, cache_mode).await {
            if let Ok(outcome) = serde_json::from_value::<CallOutcome>(hit) {
                return Ok(outcome);
            }
        }

        let outcome = self
            .execute(config, &url, &headers, &base_query, body.as_deref())
            .await?;

        if let Ok(serialized) = serde_json::to_value(&outcome) {
            self.cache.put(key, serialized, cache_mode).await;
        }

        Ok(outcome)
    }

    // =========================================================================
    // Request materialization
    // =========================================================================

    fn materialize_headers(
        &self,
        config: &ApiConfig,
        vars: &TemplateVars<'_>,
    ) -> Result<Vec<(String, String)>, EngineError> {
        let mut headers = Vec::new();
        if let Some(configured) = &config.headers {
            for (name, value) in configured {
                headers.push((name.clone(), render(value, vars)?));
            }
        }
        headers.sort();
        Ok(headers)
    }

    fn materialize_query(
        &self,
        config: &ApiConfig,
        vars: &TemplateVars<'_>,
    ) -> Result<Vec<(String, String)>, EngineError> {
        let mut query = Vec::new();
        if let Some(configured) = &config.query_params {
            for (name, value) in configured {
                let text = match value {
                    Value::String(template) => render(template, vars)?,
                    other => other.to_string(),
                };
                query.push((name.clone(), text));
            }
        }
        query.sort();
        Ok(query)
    }

    fn apply_authentication(
        &self,
        config: &ApiConfig,
        credentials: &Value,
        headers: &mut Vec<(String, String)>,
        query: &mut Vec<(String, String)>,
    ) -> Result<(), EngineError> {
        let auth = config.authentication.unwrap_or_default();
        match auth {
            AuthType::None => Ok(()),
            AuthType::Header | AuthType::Oauth2 => {
                let already_set = headers
                    .iter()
                    .any(|(name, _)| name.eq_ignore_ascii_case("authorization"));
                if already_set {
                    return Ok(());
                }
                let token = first_credential(credentials).ok_or_else(|| {
                    EngineError::Auth(format!(
                        "{} authentication requires one of the credentials: {}",
                        auth.as_str(),
                        CREDENTIAL_KEYS.join(", ")
                    ))
                })?;
                headers.push(("Authorization".to_string(), format!("Bearer {token}")));
                Ok(())
            }
            AuthType::QueryParam => {
                let token = first_credential(credentials).ok_or_else(|| {
                    EngineError::Auth(format!(
                        "QUERY_PARAM authentication requires one of the credentials: {}",
                        CREDENTIAL_KEYS.join(", ")
                    ))
                })?;
                query.push(("api_key".to_string(), token));
                Ok(())
            }
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    async fn execute(
        &self,
        config: &ApiConfig,
        url: &str,
        headers: &[(String, String)],
        base_query: &[(String, String)],
        body: Option<&str>,
    ) -> Result<CallOutcome, EngineError> {
        let pagination = config
            .pagination
            .as_ref()
            .filter(|p| p.pagination_type != PaginationType::Disabled);

        let Some(pagination) = pagination else {
            let (decoded, status) = self.fetch_page(config, url, headers, base_query, body).await?;
            let data = self.apply_data_path(config, decoded)?;
            return Ok(CallOutcome {
                data,
                pages_fetched: 1,
                last_status: status,
            });
        };

        let page_size = pagination.page_size.max(1);
        let mut collected: Vec<Value> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_fetched = 0;
        let mut last_status = 0;

        while pages_fetched < MAX_PAGES {
            let mut query = base_query.to_vec();
            match pagination.pagination_type {
                PaginationType::OffsetBased => {
                    query.push(("offset".to_string(), (pages_fetched * page_size).to_string()));
                    query.push(("limit".to_string(), page_size.to_string()));
                }
                PaginationType::PageBased => {
                    query.push(("page".to_string(), (pages_fetched + 1).to_string()));
                    query.push(("pageSize".to_string(), page_size.to_string()));
                }
                PaginationType::CursorBased => {
                    if let Some(cursor) = &cursor {
                        query.push(("cursor".to_string(), cursor.clone()));
                    }
                    query.push(("limit".to_string(), page_size.to_string()));
                }
                PaginationType::Disabled => unreachable!("filtered above"),
            }

            let (decoded, status) = self.fetch_page(config, url, headers, &query, body).await?;
            pages_fetched += 1;
            last_status = status;

            let payload = match &config.data_path {
                Some(path) => select_path(&decoded, path),
                None => Some(decoded.clone()),
            };

            match payload {
                Some(Value::Array(items)) => {
                    let count = items.len() as u32;
                    collected.extend(items);

                    match pagination.pagination_type {
                        PaginationType::OffsetBased | PaginationType::PageBased => {
                            if count < page_size {
                                break;
                            }
                        }
                        PaginationType::CursorBased => {
                            let next = pagination
                                .cursor_path
                                .as_deref()
                                .and_then(|path| select_path(&decoded, path))
                                .and_then(|v| cursor_text(&v));
                            match next {
                                Some(next) => cursor = Some(next),
                                None => break,
                            }
                        }
                        PaginationType::Disabled => unreachable!("filtered above"),
                    }
                }
                // A non-sequence payload cannot be concatenated; return the
                // first page as-is.
                Some(other) if pages_fetched == 1 => {
                    return Ok(CallOutcome {
                        data: other,
                        pages_fetched,
                        last_status,
                    });
                }
                _ => break,
            }
        }

        Ok(CallOutcome {
            data: Value::Array(collected),
            pages_fetched,
            last_status,
        })
    }

    /// One page with retry: transient failures back off exponentially from
    /// the configured delay, up to the configured attempt count.
    async fn fetch_page(
        &self,
        config: &ApiConfig,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
        body: Option<&str>,
    ) -> Result<(Value, u16), EngineError> {
        let retries = config.retries.unwrap_or(DEFAULT_RETRIES);
        let delay = config.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS);
        let attempts = AtomicU32::new(0);

        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_millis(delay),
            multiplier: 2.0,
            max_interval: Duration::from_secs(30),
            max_elapsed_time: None,
            ..Default::default()
        };

        backoff::future::retry(backoff_config, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                match self.send_once(config, url, headers, query, body).await {
                    Ok(result) => Ok(result),
                    Err(e) if e.is_transient() && attempt < retries => {
                        tracing::debug!(
                            url,
                            attempt,
                            error = %e,
                            "transient http failure, will retry"
                        );
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn send_once(
        &self,
        config: &ApiConfig,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
        body: Option<&str>,
    ) -> Result<(Value, u16), EngineError> {
        let method = reqwest::Method::from_bytes(config.method.as_str().as_bytes())
            .map_err(|_| EngineError::Validation(format!("bad method {}", config.method.as_str())))?;
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        let mut request = self.client.request(method, url).timeout(timeout);
        let mut has_content_type = false;
        for (name, value) in headers {
            if name.eq_ignore_ascii_case("content-type") {
                has_content_type = true;
            }
            request = request.header(name, value);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            if !has_content_type {
                request = request.header("Content-Type", "application/json");
            }
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Network(format!("request to {url} timed out"))
            } else {
                EngineError::Network(format!("request to {url} failed: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Network(format!("reading response from {url}: {e}")))?;

        if status >= 400 {
            return Err(EngineError::Http {
                status,
                snippet: snippet(&text),
            });
        }

        let decoded = decode_body(&content_type, text)?;
        Ok((decoded, status))
    }

    fn apply_data_path(&self, config: &ApiConfig, decoded: Value) -> Result<Value, EngineError> {
        match &config.data_path {
            Some(path) => select_path(&decoded, path).ok_or_else(|| {
                EngineError::Decode(format!("dataPath '{path}' not present in response"))
            }),
            None => Ok(decoded),
        }
    }
}

/// Decode by content type: JSON is parsed, everything else is raw text.
/// Bodies that look like JSON are parsed opportunistically.
fn decode_body(content_type: &str, text: String) -> Result<Value, EngineError> {
    if content_type.contains("json") {
        return serde_json::from_str(&text)
            .map_err(|e| EngineError::Decode(format!("response is not valid JSON: {e}")));
    }
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(&text) {
            return Ok(value);
        }
    }
    Ok(Value::String(text))
}

fn snippet(text: &str) -> String {
    if text.len() <= SNIPPET_LEN {
        text.to_string()
    } else {
        let mut end = SNIPPET_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

fn cursor_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_credential(credentials: &Value) -> Option<String> {
    let map = credentials.as_object()?;
    for key in CREDENTIAL_KEYS {
        if let Some(value) = map.get(key) {
            return match value {
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
        }
    }
    None
}

/// String credential values, masked out of cache keys
fn credential_secrets(credentials: &Value) -> Vec<String> {
    credentials
        .as_object()
        .map(|map| {
            map.values()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn caller() -> HttpCaller {
        HttpCaller::new(Arc::new(ResponseCache::new()))
    }

    fn config(url_host: &str, overrides: Value) -> ApiConfig {
        let mut base = json!({
            "id": "test",
            "urlHost": url_host,
            "method": "GET"
        });
        base.as_object_mut()
            .unwrap()
            .extend(overrides.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    async fn call(caller: &HttpCaller, config: &ApiConfig, input: Value) -> Result<CallOutcome, EngineError> {
        caller
            .call(config, &input, &json!({}), CacheMode::Disabled, "t")
            .await
    }

    #[tokio::test]
    async fn test_get_decodes_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/items")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"ok\": true}")
            .create_async()
            .await;

        let config = config(&server.url(), json!({"urlPath": "/items"}));
        let outcome = call(&caller(), &config, json!({})).await.unwrap();

        assert_eq!(outcome.data, json!({"ok": true}));
        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(outcome.last_status, 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_body_placeholder_substitution() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(Matcher::Exact("{\"q\":\"abc\"}".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"hits\": []}")
            .create_async()
            .await;

        let config = config(
            &server.url(),
            json!({
                "urlPath": "/search",
                "method": "POST",
                "body": "{\"q\":\"{term}\"}"
            }),
        );
        let outcome = call(&caller(), &config, json!({"term": "abc"})).await.unwrap();

        assert_eq!(outcome.data, json!({"hits": []}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_url_placeholder_substitution() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/breed/akita/images/random")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"message\": \"img\"}")
            .create_async()
            .await;

        let config = config(
            &server.url(),
            json!({"urlPath": "/breed/{value}/images/random"}),
        );
        let outcome = call(
            &caller(),
            &config,
            json!({"loopValue": "akita", "loopIndex": 0}),
        )
        .await
        .unwrap();

        assert_eq!(outcome.data, json!({"message": "img"}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_placeholder_is_binding_error() {
        let config = config(
            "https://unused.invalid",
            json!({"urlPath": "/items/{missing}"}),
        );
        let err = call(&caller(), &config, json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::Binding(_)));
    }

    #[tokio::test]
    async fn test_retries_then_surfaces_http_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(500)
            .with_body("upstream exploded")
            .expect(2)
            .create_async()
            .await;

        let config = config(
            &server.url(),
            json!({"urlPath": "/flaky", "retries": 1, "retryDelayMs": 10}),
        );
        let err = call(&caller(), &config, json!({})).await.unwrap_err();

        match err {
            EngineError::Http { status, snippet } => {
                assert_eq!(status, 500);
                assert!(snippet.contains("exploded"));
            }
            other => panic!("expected http error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_4xx_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/nope")
            .with_status(404)
            .with_body("not found")
            .expect(1)
            .create_async()
            .await;

        let config = config(
            &server.url(),
            json!({"urlPath": "/nope", "retries": 3, "retryDelayMs": 10}),
        );
        let err = call(&caller(), &config, json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::Http { status: 404, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_offset_pagination_concatenates_until_short_page() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let mut page = |offset: &str, body: &str| {
            server
                .mock("GET", "/items")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("offset".into(), offset.into()),
                    Matcher::UrlEncoded("limit".into(), "2".into()),
                ]))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(body)
                .create()
        };
        let first = page("0", "[\"a\",\"b\"]");
        let second = page("2", "[\"c\",\"d\"]");
        let third = page("4", "[\"e\"]");

        let config = config(
            &url,
            json!({
                "urlPath": "/items",
                "pagination": {"type": "OFFSET_BASED", "pageSize": 2}
            }),
        );
        let outcome = call(&caller(), &config, json!({})).await.unwrap();

        assert_eq!(outcome.data, json!(["a", "b", "c", "d", "e"]));
        assert_eq!(outcome.pages_fetched, 3);
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn test_cursor_pagination_stops_when_cursor_absent() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/feed")
            .match_query(Matcher::UrlEncoded("limit".into(), "50".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"entries\": [1, 2], \"next\": \"abc\"}")
            .create_async()
            .await;
        let second = server
            .mock("GET", "/feed")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cursor".into(), "abc".into()),
                Matcher::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"entries\": [3]}")
            .create_async()
            .await;

        let config = config(
            &server.url(),
            json!({
                "urlPath": "/feed",
                "dataPath": "entries",
                "pagination": {"type": "CURSOR_BASED", "cursorPath": "next"}
            }),
        );
        let outcome = call(&caller(), &config, json!({})).await.unwrap();

        assert_eq!(outcome.data, json!([1, 2, 3]));
        assert_eq!(outcome.pages_fetched, 2);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_header_auth_injection() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/private")
            .match_header("authorization", "Bearer sekrit")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let config = config(
            &server.url(),
            json!({"urlPath": "/private", "authentication": "HEADER"}),
        );
        let outcome = caller()
            .call(
                &config,
                &json!({}),
                &json!({"access_token": "sekrit"}),
                CacheMode::Disabled,
                "t",
            )
            .await
            .unwrap();
        assert_eq!(outcome.last_status, 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_auth_without_credentials_fails_before_network() {
        let config = config(
            "https://unused.invalid",
            json!({"authentication": "HEADER"}),
        );
        let err = call(&caller(), &config, json!({})).await.unwrap_err();
        assert!(matches!(err, EngineError::Auth(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_decodes_as_text() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/plain")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("hello")
            .create_async()
            .await;

        let config = config(&server.url(), json!({"urlPath": "/plain"}));
        let outcome = call(&caller(), &config, json!({})).await.unwrap();
        assert_eq!(outcome.data, json!("hello"));
    }

    #[tokio::test]
    async fn test_cache_roundtrip_with_enabled_mode() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/once")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{\"n\": 1}")
            .expect(1)
            .create_async()
            .await;

        let caller = caller();
        let config = config(&server.url(), json!({"urlPath": "/once"}));

        let first = caller
            .call(&config, &json!({}), &json!({}), CacheMode::Enabled, "t")
            .await
            .unwrap();
        let second = caller
            .call(&config, &json!({}), &json!({}), CacheMode::Enabled, "t")
            .await
            .unwrap();

        assert_eq!(first.data, second.data);
        mock.assert_async().await;
    }
}
