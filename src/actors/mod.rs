//! Actor-based monitoring engine
//!
//! Each actor runs as an independent tokio task and is driven through an mpsc
//! command channel; requests carry a oneshot sender for the reply.
//!
//! ## Architecture Overview
//!
//! ```text
//!   CollectorActor (network)   CollectorActor (system)   CollectorActor (device)
//!            │                          │                          │
//!            ├──────── Submit ──────────┼──────────────────────────┤
//!            │                          ▼                          │
//!            │                     AlertActor ──► Notifier         │
//!            │                          │                          │
//!            │                     AppendAlert                     │
//!            ▼                          ▼                          ▼
//!   ─────────────────────────── StorageActor ─────────────────────────────
//!                                       │
//!                                StorageBackend
//! ```
//!
//! ## Actor Types
//!
//! - **CollectorActor**: samples one metric category on its own interval
//! - **AlertActor**: cooldown, persistence and notification of alerts
//! - **StorageActor**: owns the bounded in-memory logs and the backend

pub mod alert;
pub mod collector;
pub mod messages;
pub mod storage;

pub use alert::AlertHandle;
pub use collector::CollectorHandle;
pub use messages::{AlertStats, StorageStats, TickReport};
pub use storage::StorageHandle;
