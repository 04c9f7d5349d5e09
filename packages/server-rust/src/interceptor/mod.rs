//! The fetch interceptor.
//!
//! Classifies every outbound request and applies one of six policies. The interceptor never
//! fabricates a successful response for a write: on a critical endpoint it returns a
//! synthesized 503 and leaves enqueue to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::InterceptorConfig;
use crate::lifecycle::CacheVersion;

/// A request about to be sent upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Hint that this is a browser-style top-level navigation, not an API call.
    pub is_navigation: bool,
}

/// A response received from (or destined for) upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network-level failure reaching upstream (as opposed to an HTTP error status).
#[derive(Debug, Clone, thiserror::Error)]
#[error("upstream request failed: {0}")]
pub struct UpstreamError(pub String);

/// Abstraction over the actual network client, so policy logic is testable without I/O.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError>;
}

/// Forwards requests to the real upstream origin over `reqwest`.
pub struct ReqwestUpstream {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestUpstream {
    #[must_use]
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }
}

#[async_trait]
impl Upstream for ReqwestUpstream {
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|err| UpstreamError(err.to_string()))?;
        let url = format!("{}{}", self.base_url, request.path);

        let mut built = self.client.request(method, url).body(request.body.clone());
        for (name, value) in &request.headers {
            built = built.header(name, value);
        }

        let response = built.send().await.map_err(|err| UpstreamError(err.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|err| UpstreamError(err.to_string()))?
            .to_vec();

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// How a request was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    NonGet,
    CacheableApiGet,
    OfflineEligibleApiGet,
    CriticalApiGet,
    StaticAsset,
    Navigation,
}

/// Classifies a request into one of the policy buckets below.
///
/// Precedence: non-GET first (writes are never cached or synthesized), then navigation, then
/// static assets, then the three API-GET tiers from most to least restrictive (critical before
/// offline-eligible before plain cacheable), so a path present in multiple lists gets the
/// strongest applicable policy.
#[must_use]
pub fn classify(config: &InterceptorConfig, request: &OutboundRequest) -> RequestClass {
    if !request.method.eq_ignore_ascii_case("GET") {
        return RequestClass::NonGet;
    }
    if request.is_navigation {
        return RequestClass::Navigation;
    }
    if config
        .static_path_prefixes
        .iter()
        .any(|prefix| request.path.starts_with(prefix.as_str()))
    {
        return RequestClass::StaticAsset;
    }
    if config
        .critical_paths
        .iter()
        .any(|prefix| request.path.starts_with(prefix.as_str()))
    {
        return RequestClass::CriticalApiGet;
    }
    if config
        .offline_eligible_paths
        .iter()
        .any(|prefix| request.path.starts_with(prefix.as_str()))
    {
        return RequestClass::OfflineEligibleApiGet;
    }
    if config
        .cacheable_paths
        .iter()
        .any(|prefix| request.path.starts_with(prefix.as_str()))
    {
        return RequestClass::CacheableApiGet;
    }
    // Unclassified API GETs fall back to the most permissive policy: try the network, and
    // don't synthesize anything on failure.
    RequestClass::OfflineEligibleApiGet
}

/// The result handed back to the caller; a synthesized 503 is the caller's cue to enqueue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorOutcome {
    Upstream(UpstreamResponse),
    Cached(UpstreamResponse),
    Synthesized503,
    /// Surfaces a raw network failure unchanged. Only produced while the interceptor is
    /// disabled -- "pass through unchanged" means a failure is the caller's to see, not an
    /// opportunity for the interceptor to synthesize anything.
    Failed(String),
}

#[derive(Clone)]
struct CacheEntry {
    response: UpstreamResponse,
    /// Epoch millis parsed from the response's `Date` header, if present and well-formed.
    date_millis: Option<i64>,
    /// Cache-version generation active when this entry was written.
    generation: u64,
}

/// The offline response cache. Entries are keyed by request path.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&self, path: &str, response: UpstreamResponse, generation: u64) {
        let date_millis = response
            .headers
            .get("date")
            .or_else(|| response.headers.get("Date"))
            .and_then(|raw| parse_http_date_millis(raw));
        self.entries.insert(
            path.to_string(),
            CacheEntry {
                response,
                date_millis,
                generation,
            },
        );
    }

    fn get(&self, path: &str) -> Option<UpstreamResponse> {
        self.entries.get(path).map(|entry| entry.response.clone())
    }

    /// Evicts entries whose `Date` header is older than `ttl`. Entries with a missing or
    /// unparsable `Date` header are kept -- evicting on ambiguous input is the more surprising
    /// failure mode for a cache whose purpose is availability.
    pub fn evict_expired(&self, now_millis: i64, ttl: Duration) {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self.entries
            .retain(|_, entry| match entry.date_millis {
                Some(date_millis) => now_millis - date_millis <= ttl_millis,
                None => true,
            });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached entry unconditionally (the `ClearCache` control message).
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drops every entry not tagged with `current_generation` (the `SkipWaiting` activation).
    pub fn evict_stale_generation(&self, current_generation: u64) {
        self.entries.retain(|_, entry| entry.generation == current_generation);
    }
}

/// Parses an RFC 2822 HTTP `Date` header into epoch milliseconds. Returns `None` on anything
/// that doesn't look like a well-formed date -- deliberately permissive about what it accepts,
/// strict about what it returns, per the eviction-on-ambiguity policy above.
fn parse_http_date_millis(_raw: &str) -> Option<i64> {
    httpdate::parse_http_date(_raw)
        .ok()
        .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_millis()).ok())
}

/// Returns true if `host` looks like a local development upstream.
#[must_use]
pub fn is_dev_host(config: &InterceptorConfig, host: &str) -> bool {
    config.dev_hosts.iter().any(|dev_host| dev_host == host)
}

/// The fetch interceptor: classify, then apply the matching policy.
pub struct FetchInterceptor {
    config: InterceptorConfig,
    cache: ResponseCache,
    upstream: Arc<dyn Upstream>,
    disabled: Arc<AtomicBool>,
    version: CacheVersion,
}

impl FetchInterceptor {
    #[must_use]
    pub fn new(config: InterceptorConfig, upstream: Arc<dyn Upstream>, version: CacheVersion) -> Self {
        Self {
            config,
            cache: ResponseCache::new(),
            upstream,
            disabled: Arc::new(AtomicBool::new(false)),
            version,
        }
    }

    /// Flips the runtime disable flag. While
    /// disabled the interceptor passes every request straight through and never synthesizes.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
        if disabled {
            self.cache.clear();
        }
    }

    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Handles one outbound request per the classification/policy table.
    pub async fn handle(&self, request: OutboundRequest) -> InterceptorOutcome {
        if self.disabled.load(Ordering::SeqCst) {
            return match self.upstream.send(&request).await {
                Ok(response) => InterceptorOutcome::Upstream(response),
                Err(err) => InterceptorOutcome::Failed(err.0),
            };
        }

        let class = classify(&self.config, &request);
        match class {
            RequestClass::NonGet => match self.upstream.send(&request).await {
                Ok(response) => InterceptorOutcome::Upstream(response),
                // Writes are passed through untouched; the interceptor never synthesizes for
                // them. The caller, not the interceptor, is responsible for enqueuing a failed
                // write.
                Err(err) => InterceptorOutcome::Failed(err.0),
            },
            RequestClass::CacheableApiGet | RequestClass::OfflineEligibleApiGet => {
                match self.upstream.send(&request).await {
                    Ok(response) if response.is_success() => {
                        self.cache.put(&request.path, response.clone(), self.version.active_generation());
                        InterceptorOutcome::Upstream(response)
                    }
                    Ok(response) => InterceptorOutcome::Upstream(response),
                    Err(_) => match self.cache.get(&request.path) {
                        Some(cached) => InterceptorOutcome::Cached(cached),
                        None => InterceptorOutcome::Synthesized503,
                    },
                }
            }
            RequestClass::CriticalApiGet => match self.upstream.send(&request).await {
                Ok(response) => InterceptorOutcome::Upstream(response),
                Err(_) => InterceptorOutcome::Synthesized503,
            },
            RequestClass::StaticAsset => {
                if let Some(cached) = self.cache.get(&request.path) {
                    return InterceptorOutcome::Cached(cached);
                }
                match self.upstream.send(&request).await {
                    Ok(response) if response.is_success() => {
                        self.cache.put(&request.path, response.clone(), self.version.active_generation());
                        InterceptorOutcome::Upstream(response)
                    }
                    Ok(response) => InterceptorOutcome::Upstream(response),
                    Err(_) => InterceptorOutcome::Synthesized503,
                }
            }
            RequestClass::Navigation => match self.upstream.send(&request).await {
                Ok(response) => InterceptorOutcome::Upstream(response),
                Err(_) => match self.cache.get(&request.path) {
                    Some(cached) => InterceptorOutcome::Cached(cached),
                    None => InterceptorOutcome::Synthesized503,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOk(UpstreamResponse);
    struct AlwaysFail;

    #[async_trait]
    impl Upstream for AlwaysOk {
        async fn send(&self, _request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl Upstream for AlwaysFail {
        async fn send(&self, _request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
            Err(UpstreamError("connection refused".to_string()))
        }
    }

    fn ok_response() -> UpstreamResponse {
        UpstreamResponse {
            status: 200,
            headers: HashMap::new(),
            body: b"{}".to_vec(),
        }
    }

    fn get(path: &str) -> OutboundRequest {
        OutboundRequest {
            method: "GET".to_string(),
            path: path.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            is_navigation: false,
        }
    }

    fn post(path: &str) -> OutboundRequest {
        OutboundRequest {
            method: "POST".to_string(),
            path: path.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
            is_navigation: false,
        }
    }

    #[test]
    fn classify_non_get_takes_precedence() {
        let config = InterceptorConfig::default();
        assert_eq!(classify(&config, &post("/api/pos/sales")), RequestClass::NonGet);
    }

    #[test]
    fn classify_critical_get() {
        let config = InterceptorConfig::default();
        assert_eq!(
            classify(&config, &get("/api/pos/sales")),
            RequestClass::CriticalApiGet
        );
    }

    #[test]
    fn classify_cacheable_get() {
        let config = InterceptorConfig::default();
        assert_eq!(
            classify(&config, &get("/api/products")),
            RequestClass::CacheableApiGet
        );
    }

    #[test]
    fn classify_static_asset() {
        let config = InterceptorConfig::default();
        assert_eq!(
            classify(&config, &get("/assets/app.js")),
            RequestClass::StaticAsset
        );
    }

    #[test]
    fn classify_navigation() {
        let config = InterceptorConfig::default();
        let mut request = get("/");
        request.is_navigation = true;
        assert_eq!(classify(&config, &request), RequestClass::Navigation);
    }

    #[tokio::test]
    async fn non_get_failure_surfaces_raw_error_unchanged() {
        let interceptor = FetchInterceptor::new(InterceptorConfig::default(), Arc::new(AlwaysFail), CacheVersion::new());
        let outcome = interceptor.handle(post("/api/pos/sales")).await;
        assert!(matches!(outcome, InterceptorOutcome::Failed(_)));
    }

    // S1: offline sale while disconnected -- critical GET endpoint synthesizes 503.
    #[tokio::test]
    async fn critical_get_synthesizes_503_on_network_failure() {
        let interceptor = FetchInterceptor::new(InterceptorConfig::default(), Arc::new(AlwaysFail), CacheVersion::new());
        let outcome = interceptor.handle(get("/api/pos/sales")).await;
        assert_eq!(outcome, InterceptorOutcome::Synthesized503);
    }

    #[tokio::test]
    async fn cacheable_get_serves_cache_on_failure_after_prior_success() {
        let upstream: Arc<dyn Upstream> = Arc::new(AlwaysOk(ok_response()));
        let interceptor = FetchInterceptor::new(InterceptorConfig::default(), upstream, CacheVersion::new());

        let first = interceptor.handle(get("/api/products")).await;
        assert!(matches!(first, InterceptorOutcome::Upstream(_)));
        assert_eq!(interceptor.cache().len(), 1);

        let failing_interceptor =
            FetchInterceptor::new(InterceptorConfig::default(), Arc::new(AlwaysFail), CacheVersion::new());
        failing_interceptor
            .cache
            .put("/api/products", ok_response(), 0);

        let second = failing_interceptor.handle(get("/api/products")).await;
        assert!(matches!(second, InterceptorOutcome::Cached(_)));
    }

    #[tokio::test]
    async fn cacheable_get_with_no_cache_entry_synthesizes_503() {
        let interceptor = FetchInterceptor::new(InterceptorConfig::default(), Arc::new(AlwaysFail), CacheVersion::new());
        let outcome = interceptor.handle(get("/api/products")).await;
        assert_eq!(outcome, InterceptorOutcome::Synthesized503);
    }

    #[tokio::test]
    async fn static_asset_is_cache_first() {
        let interceptor = FetchInterceptor::new(InterceptorConfig::default(), Arc::new(AlwaysFail), CacheVersion::new());
        interceptor.cache().put("/assets/app.js", ok_response(), 0);

        let outcome = interceptor.handle(get("/assets/app.js")).await;
        assert!(matches!(outcome, InterceptorOutcome::Cached(_)));
    }

    #[tokio::test]
    async fn navigation_falls_back_to_cached_shell_on_failure() {
        let interceptor = FetchInterceptor::new(InterceptorConfig::default(), Arc::new(AlwaysFail), CacheVersion::new());
        interceptor.cache().put("/", ok_response(), 0);

        let mut request = get("/");
        request.is_navigation = true;
        let outcome = interceptor.handle(request).await;
        assert!(matches!(outcome, InterceptorOutcome::Cached(_)));
    }

    #[tokio::test]
    async fn disabled_interceptor_passes_through_and_never_synthesizes_on_failure_path_semantics() {
        let upstream: Arc<dyn Upstream> = Arc::new(AlwaysOk(ok_response()));
        let interceptor = FetchInterceptor::new(InterceptorConfig::default(), upstream, CacheVersion::new());
        interceptor.set_disabled(true);

        let outcome = interceptor.handle(post("/api/pos/sales")).await;
        assert!(matches!(outcome, InterceptorOutcome::Upstream(_)));
    }

    #[tokio::test]
    async fn disabling_clears_the_response_cache() {
        let interceptor = FetchInterceptor::new(InterceptorConfig::default(), Arc::new(AlwaysFail), CacheVersion::new());
        interceptor.cache().put("/api/products", ok_response(), 0);
        assert_eq!(interceptor.cache().len(), 1);

        interceptor.set_disabled(true);
        assert!(interceptor.cache().is_empty());
    }

    #[test]
    fn response_cache_evicts_entries_older_than_ttl() {
        let cache = ResponseCache::new();
        cache.entries.insert(
            "/a".to_string(),
            CacheEntry {
                response: ok_response(),
                date_millis: Some(0),
                generation: 0,
            },
        );
        cache.evict_expired(10_000, Duration::from_secs(1));
        assert!(cache.get("/a").is_none());
    }

    #[test]
    fn response_cache_keeps_entries_with_missing_date_header() {
        // Missing/unparsable Date header -> kept, not evicted.
        let cache = ResponseCache::new();
        cache.entries.insert(
            "/a".to_string(),
            CacheEntry {
                response: ok_response(),
                date_millis: None,
                generation: 0,
            },
        );
        cache.evict_expired(i64::MAX, Duration::from_secs(1));
        assert!(cache.get("/a").is_some());
    }

    #[test]
    fn response_cache_keeps_entries_within_ttl() {
        let cache = ResponseCache::new();
        cache.entries.insert(
            "/a".to_string(),
            CacheEntry {
                response: ok_response(),
                date_millis: Some(1_000),
                generation: 0,
            },
        );
        cache.evict_expired(1_500, Duration::from_secs(1));
        assert!(cache.get("/a").is_some());
    }

    #[test]
    fn response_cache_evicts_entries_tagged_with_a_stale_generation() {
        let cache = ResponseCache::new();
        cache.put("/a", ok_response(), 0);
        cache.put("/b", ok_response(), 1);
        cache.evict_stale_generation(1);
        assert!(cache.get("/a").is_none());
        assert!(cache.get("/b").is_some());
    }

    #[test]
    fn dev_host_detection() {
        let config = InterceptorConfig::default();
        assert!(is_dev_host(&config, "localhost"));
        assert!(!is_dev_host(&config, "api.example.com"));
    }
}
