//! Process-wide response cache
//!
//! Read-through/write-through cache for HTTP call outcomes, consulted per
//! the caller's cache mode. Keys are fingerprints of the fully materialized
//! request with credential-derived values masked, so credentials never
//! shape a key; the tenant id is part of every key, so entries never mix
//! across tenants.

use std::collections::HashMap;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use splice_domain::CacheMode;

/// Everything that identifies one materialized request
pub struct RequestFingerprint<'a> {
    pub tenant: &'a str,
    pub method: &'a str,
    pub url: &'a str,
    pub headers: &'a [(String, String)],
    pub query: &'a [(String, String)],
    pub body: Option<&'a str>,
    /// Credential values to mask out of the key material
    pub secrets: &'a [String],
}

impl RequestFingerprint<'_> {
    /// Stable hex digest of the request, with secrets masked
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.tenant.as_bytes());
        hasher.update([0]);
        hasher.update(self.method.as_bytes());
        hasher.update([0]);
        hasher.update(self.mask(self.url).as_bytes());
        hasher.update([0]);

        let mut headers: Vec<&(String, String)> = self.headers.iter().collect();
        headers.sort();
        for (name, value) in headers {
            hasher.update(name.as_bytes());
            hasher.update([b'=']);
            hasher.update(self.mask(value).as_bytes());
            hasher.update([0]);
        }

        let mut query: Vec<&(String, String)> = self.query.iter().collect();
        query.sort();
        for (name, value) in query {
            hasher.update(name.as_bytes());
            hasher.update([b'=']);
            hasher.update(self.mask(value).as_bytes());
            hasher.update([0]);
        }

        if let Some(body) = self.body {
            hasher.update(self.mask(body).as_bytes());
        }

        format!("{:x}", hasher.finalize())
    }

    fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for secret in self.secrets {
            if !secret.is_empty() {
                masked = masked.replace(secret.as_str(), "***");
            }
        }
        masked
    }
}

/// In-process response cache
#[derive(Default)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached response, subject to the cache mode
    pub async fn get(&self, key: &str, mode: CacheMode) -> Option<Value> {
        if !matches!(mode, CacheMode::Enabled | CacheMode::Readonly) {
            return None;
        }
        self.entries.read().await.get(key).cloned()
    }

    /// Store a response, subject to the cache mode
    pub async fn put(&self, key: String, value: Value, mode: CacheMode) {
        if !matches!(mode, CacheMode::Enabled | CacheMode::Writeonly) {
            return;
        }
        self.entries.write().await.insert(key, value);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fingerprint<'a>(
        tenant: &'a str,
        url: &'a str,
        secrets: &'a [String],
    ) -> RequestFingerprint<'a> {
        RequestFingerprint {
            tenant,
            method: "GET",
            url,
            headers: &[],
            query: &[],
            body: None,
            secrets,
        }
    }

    #[test]
    fn test_secrets_do_not_shape_the_key() {
        let secrets_a = vec!["token-a".to_string()];
        let secrets_b = vec!["token-b".to_string()];
        let a = fingerprint("t", "https://x.test/?key=token-a", &secrets_a).digest();
        let b = fingerprint("t", "https://x.test/?key=token-b", &secrets_b).digest();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tenant_separates_keys() {
        let secrets: Vec<String> = Vec::new();
        let a = fingerprint("t1", "https://x.test/", &secrets).digest();
        let b = fingerprint("t2", "https://x.test/", &secrets).digest();
        assert_ne!(a, b);
    }

    #[test]
    fn test_header_order_is_irrelevant() {
        let secrets: Vec<String> = Vec::new();
        let headers_a = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        let headers_b = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let mut fp_a = fingerprint("t", "https://x.test/", &secrets);
        fp_a.headers = &headers_a;
        let mut fp_b = fingerprint("t", "https://x.test/", &secrets);
        fp_b.headers = &headers_b;
        assert_eq!(fp_a.digest(), fp_b.digest());
    }

    #[tokio::test]
    async fn test_cache_modes() {
        let cache = ResponseCache::new();
        let value = json!({"cached": true});

        // DISABLED writes nothing
        cache
            .put("k".to_string(), value.clone(), CacheMode::Disabled)
            .await;
        assert!(cache.is_empty().await);

        // WRITEONLY writes but never reads
        cache
            .put("k".to_string(), value.clone(), CacheMode::Writeonly)
            .await;
        assert_eq!(cache.get("k", CacheMode::Writeonly).await, None);

        // READONLY reads what is there, writes nothing
        assert_eq!(cache.get("k", CacheMode::Readonly).await, Some(value.clone()));
        cache
            .put("k2".to_string(), value.clone(), CacheMode::Readonly)
            .await;
        assert_eq!(cache.len().await, 1);

        // ENABLED reads and writes
        cache
            .put("k3".to_string(), value.clone(), CacheMode::Enabled)
            .await;
        assert_eq!(cache.get("k3", CacheMode::Enabled).await, Some(value));
    }
}
