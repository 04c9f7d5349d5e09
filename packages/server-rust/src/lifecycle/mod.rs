//! Lifecycle and control: graceful shutdown, the control channel, and scheduled ticks.

pub mod control;
pub mod health;
pub mod heartbeat;

pub use control::{CacheVersion, ControlChannel, ControlMessage, ControlReply};
pub use health::{HealthState, InFlightGuard, LifecycleController};
pub use heartbeat::{spawn_interval_loop, Ticker};
