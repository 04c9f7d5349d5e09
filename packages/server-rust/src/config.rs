//! Configuration for the till agent.
//!
//! Split by concern (storage, sync, interceptor, control API), each with its own `Default`.

use std::time::Duration;

/// Where and how the durable store persists data.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the embedded database file. `None` forces the in-memory fallback.
    pub data_dir: Option<std::path::PathBuf>,
    /// File name of the embedded database within `data_dir`.
    pub db_file_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: Some(std::path::PathBuf::from("./till-data")),
            db_file_name: "till.redb".to_string(),
        }
    }
}

/// Sync engine tuning: backoff, escalation, and scheduling intervals.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Upstream base URL requests are replayed against.
    pub upstream_base_url: String,
    /// Backoff ceiling; no record waits longer than this between attempts.
    pub max_backoff: Duration,
    /// Base delay for the exponential backoff curve (`base * 2^attempts`, capped).
    pub base_backoff: Duration,
    /// Attempts at or above this count are reported as escalated.
    pub escalation_threshold: u32,
    /// Interval between scheduled background-sync ticks.
    pub background_sync_interval: Duration,
    /// Interval between heartbeat ticks.
    pub heartbeat_interval: Duration,
    /// Per-request network timeout for replayed requests.
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: "https://api.example.com".to_string(),
            max_backoff: Duration::from_secs(300),
            base_backoff: Duration::from_secs(1),
            escalation_threshold: 5,
            background_sync_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(3_600),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Fetch interceptor classification and caching policy.
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Path prefixes treated as critical offline endpoints (synthesize 503 on failure).
    pub critical_paths: Vec<String>,
    /// Path prefixes that are cacheable API GETs (network-first, cache on success).
    pub cacheable_paths: Vec<String>,
    /// Path prefixes eligible for offline fallback to a prior cached GET.
    pub offline_eligible_paths: Vec<String>,
    /// Path prefixes served as static assets (cache-first).
    pub static_path_prefixes: Vec<String>,
    /// Age after which a cached GET response is evicted, keyed by its `Date` header.
    pub cache_ttl: Duration,
    /// Host names treated as local development upstreams (disables offline synthesis).
    pub dev_hosts: Vec<String>,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            critical_paths: vec!["/api/pos/sales".to_string(), "/api/products/barcode".to_string()],
            cacheable_paths: vec![
                "/api/products".to_string(),
                "/api/stores".to_string(),
                "/api/inventory".to_string(),
            ],
            offline_eligible_paths: vec![
                "/api/sales".to_string(),
                "/api/inventory".to_string(),
                "/api/products".to_string(),
                "/api/stores".to_string(),
            ],
            static_path_prefixes: vec!["/src/".to_string(), "/assets/".to_string()],
            cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            dev_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

/// Bind address and bounded-channel sizing for the agent's local control API.
#[derive(Debug, Clone)]
pub struct ControlApiConfig {
    pub bind_addr: String,
    pub bind_port: u16,
    pub notify_channel_capacity: usize,
}

impl Default for ControlApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 8787,
            notify_channel_capacity: 64,
        }
    }
}

/// Top-level agent configuration: one flat struct per concern.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub node_id: String,
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub interceptor: InterceptorConfig,
    pub control_api: ControlApiConfig,
}
