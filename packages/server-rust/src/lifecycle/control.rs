//! The control channel: the in-process analog of the browser
//! `postMessage` bridge between the embedding application and the agent's background set.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::interceptor::FetchInterceptor;
use crate::notify::AgentMessage;
use crate::sync::SyncEngine;

/// Messages sent from a foreground caller to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
    Disable { disabled: bool },
    TrySync,
}

/// Replies the agent sends back for a control message that expects one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlReply {
    Version { tag: String },
    Ack,
    Sync(AgentMessage),
}

/// Monotonic cache-version tag. `SkipWaiting` activates the pending generation immediately.
/// The response cache tags each entry it writes with the active generation at write time, so
/// the control channel can prune stale-generation entries right after activation.
#[derive(Debug, Default, Clone)]
pub struct CacheVersion {
    active: Arc<AtomicU64>,
    pending: Arc<AtomicU64>,
}

impl CacheVersion {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn active_tag(&self) -> String {
        format!("v{}", self.active.load(Ordering::SeqCst))
    }

    /// The active generation number, used to tag new cache entries and to evict stale ones.
    #[must_use]
    pub fn active_generation(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Registers a new pending generation (called when the app-shell precache set changes).
    pub fn stage_next(&self) -> u64 {
        self.pending.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Activates the pending generation, returning the new active tag.
    pub fn activate_pending(&self) -> String {
        let pending = self.pending.load(Ordering::SeqCst);
        self.active.store(pending, Ordering::SeqCst);
        self.active_tag()
    }
}

/// Dispatches control messages against the agent's live components.
pub struct ControlChannel {
    interceptor: Arc<FetchInterceptor>,
    sync_engine: Arc<SyncEngine>,
    version: Arc<CacheVersion>,
}

impl ControlChannel {
    #[must_use]
    pub fn new(
        interceptor: Arc<FetchInterceptor>,
        sync_engine: Arc<SyncEngine>,
        version: Arc<CacheVersion>,
    ) -> Self {
        Self {
            interceptor,
            sync_engine,
            version,
        }
    }

    /// Handles one control message, returning a reply if the message expects one.
    pub async fn handle(&self, message: ControlMessage, now: i64) -> anyhow::Result<Option<ControlReply>> {
        match message {
            ControlMessage::SkipWaiting => {
                let tag = self.version.activate_pending();
                self.interceptor
                    .cache()
                    .evict_stale_generation(self.version.active_generation());
                Ok(Some(ControlReply::Version { tag }))
            }
            ControlMessage::GetVersion => Ok(Some(ControlReply::Version {
                tag: self.version.active_tag(),
            })),
            ControlMessage::ClearCache => {
                self.interceptor.cache().clear();
                Ok(Some(ControlReply::Ack))
            }
            ControlMessage::Disable { disabled } => {
                self.interceptor.set_disabled(disabled);
                Ok(Some(ControlReply::Ack))
            }
            ControlMessage::TrySync => {
                let summary = self.sync_engine.drain(now).await?;
                Ok(Some(ControlReply::Sync(AgentMessage::SyncCompleted {
                    attempted: summary.attempted,
                    synced: summary.synced,
                })))
            }
        }
    }
}

/// Host names treated as local development upstreams, per `InterceptorConfig::dev_hosts`.
/// Development-mode upstreams never trigger offline synthesis -- the caller should prefer
/// surfacing the raw network error so it doesn't mask a broken local dev server.
#[must_use]
pub fn is_dev_upstream(dev_hosts: &[String], host: &str) -> bool {
    dev_hosts.iter().any(|dev_host| dev_host == host)
}
