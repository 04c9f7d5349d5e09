//! Till Agent -- durable outbound queue, local catalog cache, fetch interceptor, and sync
//! engine for an offline-first point-of-sale till.
//!
//! - **Config** ([`config`]): per-concern configuration with `Default`
//! - **Storage** ([`storage`]): `DurableStore` seam, `redb`-backed and in-memory implementations
//! - **Queue** ([`queue`]): the durable outbound queue (enqueue/list/expedite/edit/delete)
//! - **Catalog** ([`catalog`]): local product/inventory/sale cache, search, freshness
//! - **Interceptor** ([`interceptor`]): classify-then-policy fetch interception with response cache
//! - **Sync** ([`sync`]): the drain algorithm, capped exponential backoff, escalation
//! - **Notify** ([`notify`]): client registry and bounded-channel broadcast
//! - **Lifecycle** ([`lifecycle`]): graceful shutdown, the control channel, scheduled ticks
//! - **HTTP** ([`http`]): the local control API
//! - **Agent** ([`agent`]): deferred-startup bootstrap wiring everything together

pub mod agent;
pub mod catalog;
pub mod config;
pub mod http;
pub mod interceptor;
pub mod lifecycle;
pub mod notify;
pub mod queue;
pub mod storage;
pub mod sync;

pub use agent::TillAgent;
pub use config::AgentConfig;
