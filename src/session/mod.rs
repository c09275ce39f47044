//! Control-plane session registry
//!
//! Tracks sessions created by the control plane, separate from the sessions
//! the frame store infers from puts. A background reaper evicts sessions older
//! than [`SessionConfig::max_age`].

pub mod config;
pub mod info;
pub mod registry;

pub use config::SessionConfig;
pub use info::{Metadata, SessionInfo};
pub use registry::SessionRegistry;
