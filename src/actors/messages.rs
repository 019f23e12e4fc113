//! Message types for actor communication
//!
//! Every actor owns an mpsc command channel. Requests that need an answer
//! carry a oneshot sender the actor replies on. `Shutdown` carries one too,
//! answered once the actor has finished its cleanup.

use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::alerts::AlertEvent;
use crate::evaluation::CandidateAlert;
use crate::storage::{
    AlertFilter, AlertSummary, ExportScope, HealthStatus, PersistenceError, Snapshot,
    StorageResult,
};
use crate::{Category, Sample};

/// Outcome of one collection cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub samples: usize,
    pub candidates: usize,
    pub raised: usize,
    pub persistence_failures: usize,
}

/// Commands that can be sent to a CollectorActor
#[derive(Debug)]
pub enum CollectorCommand {
    /// Run a cycle immediately, bypassing the interval timer
    PollNow {
        respond_to: oneshot::Sender<anyhow::Result<TickReport>>,
    },

    /// Stop after the in-flight cycle
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Commands that can be sent to the AlertActor
#[derive(Debug)]
pub enum AlertCommand {
    /// Run candidates through cooldown, persistence and notification
    Submit {
        candidates: Vec<CandidateAlert>,
        respond_to: oneshot::Sender<Vec<AlertEvent>>,
    },

    GetStats {
        respond_to: oneshot::Sender<AlertStats>,
    },

    Shutdown { respond_to: oneshot::Sender<()> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    pub raised: u64,
    pub suppressed: u64,
    pub notification_failures: u64,

    /// Keys with a recorded raise time
    pub tracked_keys: usize,
}

/// Commands that can be sent to the StorageActor
#[derive(Debug)]
pub enum StorageCommand {
    Append {
        sample: Sample,
        respond_to: oneshot::Sender<Result<(), PersistenceError>>,
    },

    AppendAlert {
        alert: AlertEvent,
        respond_to: oneshot::Sender<Result<(), PersistenceError>>,
    },

    Query {
        category: Category,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        respond_to: oneshot::Sender<Vec<Sample>>,
    },

    Latest {
        category: Category,
        n: usize,
        respond_to: oneshot::Sender<Vec<Sample>>,
    },

    QueryDevice {
        ip: IpAddr,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        respond_to: oneshot::Sender<Vec<Sample>>,
    },

    QueryAlerts {
        filter: AlertFilter,
        respond_to: oneshot::Sender<Vec<AlertEvent>>,
    },

    ResolveAlert {
        id: Uuid,
        respond_to: oneshot::Sender<bool>,
    },

    AlertSummary {
        respond_to: oneshot::Sender<AlertSummary>,
    },

    Export {
        scope: ExportScope,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        respond_to: oneshot::Sender<Snapshot>,
    },

    GetStats {
        respond_to: oneshot::Sender<StorageStats>,
    },

    HealthCheck {
        respond_to: oneshot::Sender<StorageResult<HealthStatus>>,
    },

    /// Close the backend and stop
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Storage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub backend: String,

    /// Retained records per log
    pub records: BTreeMap<String, usize>,

    pub appends: u64,
    pub compactions: u64,
    pub persistence_failures: u64,
}
