//! API endpoint configuration
//!
//! An [`ApiConfig`] describes one HTTP endpoint: where it lives, how to call
//! it, how it authenticates, and how its responses paginate. Workflow steps
//! embed one (or reference one by id, resolved to a snapshot before
//! execution).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// HTTP method for an API call
#[typeshare]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            "PATCH" => Some(Self::Patch),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Whether this method carries a request body
    pub fn has_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }
}

/// How credentials are injected into an outgoing request
#[typeshare]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    #[default]
    None,
    Header,
    QueryParam,
    Oauth2,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Header => "HEADER",
            Self::QueryParam => "QUERY_PARAM",
            Self::Oauth2 => "OAUTH2",
        }
    }
}

/// Pagination strategy for a paginated endpoint
#[typeshare]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaginationType {
    OffsetBased,
    PageBased,
    CursorBased,
    #[default]
    Disabled,
}

impl PaginationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OffsetBased => "OFFSET_BASED",
            Self::PageBased => "PAGE_BASED",
            Self::CursorBased => "CURSOR_BASED",
            Self::Disabled => "DISABLED",
        }
    }
}

/// Pagination settings attached to an [`ApiConfig`]
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    #[serde(rename = "type")]
    pub pagination_type: PaginationType,
    /// Items requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Dot-separated path to the next-page cursor in each response
    /// (CURSOR_BASED only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_path: Option<String>,
}

fn default_page_size() -> u32 {
    50
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            pagination_type: PaginationType::Disabled,
            page_size: default_page_size(),
            cursor_path: None,
        }
    }
}

/// Description of one HTTP endpoint
///
/// String fields (`url_host`, `url_path`, header and query values, `body`)
/// may contain `{name}` placeholders substituted from the per-call input and
/// credentials at request time.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub id: String,
    /// Scheme + host, e.g. `https://api.example.com`
    pub url_host: String,
    /// Path component, e.g. `/v2/items/{id}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default)]
    pub method: HttpMethod,
    /// Human-readable description of what this endpoint does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Query parameter values may be strings or numbers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<HashMap<String, serde_json::Value>>,
    /// Request body template (sent verbatim after placeholder substitution)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationConfig>,
    /// Dot-separated path selecting the payload subtree from each response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
    /// Per-call timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Retry attempts for transient failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    /// Initial retry backoff in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApiConfig {
    /// Full URL template before placeholder substitution
    pub fn url(&self) -> String {
        match &self.url_path {
            Some(path) if !path.is_empty() => {
                let host = self.url_host.trim_end_matches('/');
                if path.starts_with('/') {
                    format!("{host}{path}")
                } else {
                    format!("{host}/{path}")
                }
            }
            _ => self.url_host.clone(),
        }
    }

    /// Whether pagination is configured and enabled
    pub fn paginates(&self) -> bool {
        self.pagination
            .as_ref()
            .map(|p| p.pagination_type != PaginationType::Disabled)
            .unwrap_or(false)
    }
}
