//! `TillAgent`: deferred-startup bootstrap wiring every component together.
//!
//! `new()` allocates shared state, `start()` binds the control-API listener, `serve()` begins
//! accepting connections and scheduled background ticks until shutdown is signalled.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tracing::{info, warn};

use till_core::{ClockSource, SystemClock};

use crate::catalog::CatalogCache;
use crate::config::AgentConfig;
use crate::http::{build_router, AppState};
use crate::interceptor::{FetchInterceptor, ReqwestUpstream};
use crate::lifecycle::{spawn_interval_loop, CacheVersion, ControlChannel, LifecycleController, Ticker};
use crate::notify::ClientRegistry;
use crate::queue::OfflineQueue;
use crate::storage::{DurableStore, MemoryStore};
#[cfg(feature = "redb")]
use crate::storage::RedbStore;
use crate::sync::{ReqwestReplayer, SyncEngine};

/// Opens the durable store per `StoreConfig`, falling back to the in-memory store when the
/// data directory cannot be created or opened (a "storage denied" degradation). The returned
/// `bool` is `true` when the fallback was taken: the queue still works against the in-memory
/// store, but the caller should degrade the catalog cache to a no-op rather than cache into a
/// store that won't survive a restart.
fn open_store(config: &crate::config::StoreConfig) -> (Arc<dyn DurableStore>, bool) {
    #[cfg(feature = "redb")]
    {
        if let Some(dir) = &config.data_dir {
            let opened = std::fs::create_dir_all(dir)
                .map_err(anyhow::Error::from)
                .and_then(|()| RedbStore::open(&dir.join(&config.db_file_name)));
            match opened {
                Ok(store) => return (Arc::new(store), false),
                Err(err) => {
                    warn!(error = %err, "durable store unavailable, falling back to in-memory store");
                    return (Arc::new(MemoryStore::new()), true);
                }
            }
        }
    }
    #[cfg(not(feature = "redb"))]
    {
        let _ = config;
    }
    // `data_dir: None`, or the `redb` feature not compiled in, is a deliberate in-memory
    // configuration rather than a denial -- the catalog cache stays fully functional.
    (Arc::new(MemoryStore::new()), false)
}

struct DrainTicker {
    sync_engine: Arc<SyncEngine>,
    clock: Arc<dyn ClockSource>,
}

#[async_trait]
impl Ticker for DrainTicker {
    async fn on_tick(&self) {
        let now = self.clock.now_millis();
        if let Err(err) = self.sync_engine.drain(now).await {
            warn!(error = %err, "background drain failed");
        }
    }
}

struct HeartbeatTicker {
    lifecycle: Arc<LifecycleController>,
}

#[async_trait]
impl Ticker for HeartbeatTicker {
    async fn on_tick(&self) {
        tracing::debug!(state = ?self.lifecycle.health_state(), "heartbeat");
    }
}

/// The assembled agent: every component plus the control-API listener.
pub struct TillAgent {
    config: AgentConfig,
    clock: Arc<dyn ClockSource>,
    store: Arc<dyn DurableStore>,
    queue: Arc<OfflineQueue>,
    catalog: Arc<CatalogCache>,
    clients: Arc<ClientRegistry>,
    interceptor: Arc<FetchInterceptor>,
    sync_engine: Arc<SyncEngine>,
    control: Arc<ControlChannel>,
    version: Arc<CacheVersion>,
    lifecycle: Arc<LifecycleController>,
    listener: Option<TcpListener>,
    enqueue_drain_rx: Option<tokio::sync::mpsc::Receiver<()>>,
}

impl TillAgent {
    /// Allocates every component without binding a listener or starting background work.
    #[must_use]
    pub fn new(config: AgentConfig) -> Self {
        let clock: Arc<dyn ClockSource> = Arc::new(SystemClock);
        let (store, storage_denied) = open_store(&config.store);
        let (enqueue_drain_tx, enqueue_drain_rx) = tokio::sync::mpsc::channel(1);
        let queue = Arc::new(OfflineQueue::with_drain_signal(
            Arc::clone(&store),
            enqueue_drain_tx,
        ));
        let catalog = Arc::new(if storage_denied {
            CatalogCache::noop()
        } else {
            CatalogCache::new(Arc::clone(&store))
        });
        let clients = Arc::new(ClientRegistry::new());

        let version = CacheVersion::new();
        let upstream = Arc::new(ReqwestUpstream::new(
            config.sync.upstream_base_url.clone(),
            config.sync.request_timeout,
        ));
        let interceptor = Arc::new(FetchInterceptor::new(
            config.interceptor.clone(),
            upstream,
            version.clone(),
        ));

        let replayer = Arc::new(ReqwestReplayer::new(
            config.sync.upstream_base_url.clone(),
            config.sync.request_timeout,
        ));
        let sync_engine = Arc::new(SyncEngine::new(
            Arc::clone(&store),
            replayer,
            Arc::clone(&clients),
            config.sync.base_backoff,
            config.sync.max_backoff,
        ));

        let version = Arc::new(version);
        let control = Arc::new(ControlChannel::new(
            Arc::clone(&interceptor),
            Arc::clone(&sync_engine),
            Arc::clone(&version),
        ));
        let lifecycle = Arc::new(LifecycleController::new());

        Self {
            config,
            clock,
            store,
            queue,
            catalog,
            clients,
            interceptor,
            sync_engine,
            control,
            version,
            lifecycle,
            listener: None,
            enqueue_drain_rx: Some(enqueue_drain_rx),
        }
    }

    #[must_use]
    pub fn queue(&self) -> Arc<OfflineQueue> {
        Arc::clone(&self.queue)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogCache> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn interceptor(&self) -> Arc<FetchInterceptor> {
        Arc::clone(&self.interceptor)
    }

    #[must_use]
    pub fn clients(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.clients)
    }

    #[must_use]
    pub fn lifecycle(&self) -> Arc<LifecycleController> {
        Arc::clone(&self.lifecycle)
    }

    fn app_state(&self) -> AppState {
        AppState {
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            catalog: Arc::clone(&self.catalog),
            clients: Arc::clone(&self.clients),
            control: Arc::clone(&self.control),
            version: Arc::clone(&self.version),
            lifecycle: Arc::clone(&self.lifecycle),
            config: Arc::new(self.config.clone()),
            clock: Arc::clone(&self.clock),
            start_time: Instant::now(),
        }
    }

    /// Binds the control-API TCP listener, returning the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!(
            "{}:{}",
            self.config.control_api.bind_addr, self.config.control_api.bind_port
        );
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(addr = %addr, port, "control API listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Starts the background schedule and serves the control API until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called first.
    pub async fn serve(mut self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let listener = self.listener.expect("start() must be called before serve()");
        let state = self.app_state();
        let router = build_router(state);

        let drain_ticker: Arc<dyn Ticker> = Arc::new(DrainTicker {
            sync_engine: Arc::clone(&self.sync_engine),
            clock: Arc::clone(&self.clock),
        });
        let heartbeat_ticker: Arc<dyn Ticker> = Arc::new(HeartbeatTicker {
            lifecycle: Arc::clone(&self.lifecycle),
        });

        let drain_handle = spawn_interval_loop(
            self.config.sync.background_sync_interval,
            drain_ticker,
            self.lifecycle.shutdown_receiver(),
        );
        let heartbeat_handle = spawn_interval_loop(
            self.config.sync.heartbeat_interval,
            heartbeat_ticker,
            self.lifecycle.shutdown_receiver(),
        );

        let mut enqueue_drain_rx = self
            .enqueue_drain_rx
            .take()
            .expect("enqueue_drain_rx is only taken once, in serve()");
        let enqueue_sync_engine = Arc::clone(&self.sync_engine);
        let enqueue_clock = Arc::clone(&self.clock);
        let mut enqueue_shutdown_rx = self.lifecycle.shutdown_receiver();
        let enqueue_drain_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    signal = enqueue_drain_rx.recv() => {
                        if signal.is_none() {
                            break;
                        }
                        let now = enqueue_clock.now_millis();
                        if let Err(err) = enqueue_sync_engine.drain(now).await {
                            warn!(error = %err, "enqueue-triggered drain failed");
                        }
                    }
                    _ = enqueue_shutdown_rx.changed() => break,
                }
            }
        });

        self.lifecycle.set_ready();
        info!("serving control API");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.lifecycle.trigger_shutdown();
        let drained = self
            .lifecycle
            .wait_for_drain(std::time::Duration::from_secs(30))
            .await;
        if !drained {
            warn!("drain timeout expired with in-flight requests remaining");
        }

        drain_handle.abort();
        heartbeat_handle.abort();
        enqueue_drain_handle.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_agent_without_binding_a_listener() {
        let mut config = AgentConfig::default();
        config.store.data_dir = None;
        let agent = TillAgent::new(config);
        assert!(agent.listener.is_none());
        assert_eq!(agent.lifecycle().health_state(), crate::lifecycle::HealthState::Starting);
    }

    #[test]
    fn open_store_with_no_data_dir_is_not_a_denial() {
        let config = crate::config::StoreConfig {
            data_dir: None,
            db_file_name: "ignored.redb".to_string(),
        };
        let (_store, denied) = open_store(&config);
        assert!(!denied);
    }

    #[tokio::test]
    async fn catalog_stays_functional_when_storage_is_not_denied() {
        let mut config = AgentConfig::default();
        config.store.data_dir = None;
        let agent = TillAgent::new(config);

        agent
            .catalog()
            .upsert_product(till_core::Product {
                id: "p1".to_string(),
                name: "Widget".to_string(),
                barcode: None,
                price: 1.0,
                category: None,
            })
            .await
            .unwrap();
        assert!(agent.catalog().get_product("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn start_binds_to_an_os_assigned_port() {
        let mut config = AgentConfig::default();
        config.store.data_dir = None;
        config.control_api.bind_port = 0;
        let mut agent = TillAgent::new(config);

        let port = agent.start().await.unwrap();
        assert!(port > 0);
    }

    #[tokio::test]
    #[should_panic(expected = "start() must be called before serve()")]
    async fn serve_panics_without_start() {
        let mut config = AgentConfig::default();
        config.store.data_dir = None;
        let agent = TillAgent::new(config);
        let _ = agent.serve(std::future::pending::<()>()).await;
    }
}
