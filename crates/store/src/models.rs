//! Wire models shared with the store API.
//!
//! Every payload is statically shaped: responses decode directly into these
//! structs and anything that does not fit is a classified error, never a
//! runtime type dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One managed resource as the store tracks it. `current_generation` is the
/// last generation the store has a spec snapshot for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub uid: String,
    pub namespace: String,
    pub name: String,
    pub current_generation: String,
    #[serde(default)]
    pub cluster_id: u64,
}

/// Point-in-time snapshot of the managed resource's spec. The store keeps
/// one of these per generation advance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpecRecord {
    pub resource_uid: String,
    pub generation: String,
    pub spec: String,
}

/// One task execution, identified by the uid embedded in its log filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub uid: String,
    pub task_type: String,
    pub rerun: u32,
    pub generation: String,
    pub resource_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A single log line keyed by `(task_uid, line_no)`. Line numbers are
/// 1-based and assigned by a full re-scan of the file, so they are only
/// stable while the file is strictly append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub task_uid: String,
    pub resource_uid: String,
    pub task_type: String,
    pub rerun: u32,
    pub generation: String,
    pub line_no: u64,
    pub message: String,
}

/// An approval decision recorded out-of-band by a human or automation.
/// Read-only to the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub task_uid: String,
    pub approved: bool,
}
