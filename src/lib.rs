//! Label state, session persistence and host-authoritative replication for
//! small text labels attached to world entities.
//!
//! [`engine::LabelEngine`] is the entry point. It owns the [`store::RecordStore`],
//! the [`persist::PersistenceManager`] and the [`sync::SyncManager`], and drives
//! all three from a cooperative [`tick`](engine::LabelEngine::tick).

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod net;
pub mod persist;
pub mod scene;
pub mod schedule;
pub mod store;
pub mod sync;

pub use config::EngineConfig;
pub use engine::LabelEngine;
