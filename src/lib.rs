//! Session-scoped media frame store and runner orchestration
//!
//! `relais` is the core shared by ingress, transform and egress runners that
//! exchange ordered media frames through a common store:
//!
//! ```text
//!   [ingress] ──put_frame──► FrameStore ◄──list_frames/put_frame── [transform]
//!                               │  ▲
//!                 subscribe()   │  └──list_frames── [egress] ──► external sink
//!                 FrameEvent ◄──┘
//! ```
//!
//! - [`storage`]: the [`FrameStore`](storage::FrameStore) contract with a
//!   volatile in-process backend and a persistent Redis-backed one
//! - [`session`]: control-plane session registry with an expiry reaper
//! - [`plugin`]: plugin registry and lifecycle manager
//! - [`pipeline`]: read cursors and the poll loop runners are built on
//! - [`plugins`]: reference ingress/transform/egress runners
//! - [`Relay`]: facade wiring all of the above together

pub mod error;
pub mod pipeline;
pub mod plugin;
pub mod plugins;
pub mod relay;
pub mod session;
pub mod storage;

pub use error::{Error, ErrorKind, Result};
pub use plugin::{
    Plugin, PluginConfig, PluginError, PluginManager, PluginRegistry, PluginRole, PluginStatus,
};
pub use relay::{Relay, RelayConfig};
pub use session::{SessionConfig, SessionInfo, SessionRegistry};
pub use storage::{
    Frame, FrameEvent, FrameStore, MediaType, MemoryStore, OpContext, PersistentStore,
    StorageConfig, StoreError,
};
