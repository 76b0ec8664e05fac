//! Unified engine error model.
//! This module provides the error enum shared by the IO adapter, scheduler and
//! compute paths, along with the process exit-code mapping used by binaries.

use std::path::PathBuf;

use crate::graph::Gid;

/// Error kinds the engine can abort a run with. Buffer exhaustion is absent on
/// purpose: the resident-fragment budget is enforced by blocking, never by
/// surfacing an error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("bundle file missing: {path}")]
    IoMissing { gid: Option<Gid>, path: PathBuf },

    #[error("short read in {path}: expected {expected} bytes, got {got}")]
    IoTruncated { gid: Gid, path: PathBuf, expected: u64, got: u64 },

    #[error("malformed binary input: {detail}")]
    IoBadFormat { gid: Option<Gid>, detail: String },

    #[error("bundle write failed: {path}: {source}")]
    IoWriteFailed {
        gid: Gid,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("user kernel panicked at epoch {epoch}")]
    UserKernelPanic { gid: Gid, epoch: u64 },

    #[error("scheduler invariant violated: {detail}")]
    SchedulerInvariantViolated { detail: String },
}

impl EngineError {
    /// Short stable name of the kind, used in diagnostics and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::IoMissing { .. } => "IoMissing",
            EngineError::IoTruncated { .. } => "IoTruncated",
            EngineError::IoBadFormat { .. } => "IoBadFormat",
            EngineError::IoWriteFailed { .. } => "IoWriteFailed",
            EngineError::UserKernelPanic { .. } => "UserKernelPanic",
            EngineError::SchedulerInvariantViolated { .. } => "SchedulerInvariantViolated",
        }
    }

    /// The fragment the error concerns, when there is one.
    pub fn gid(&self) -> Option<Gid> {
        match self {
            EngineError::IoMissing { gid, .. } | EngineError::IoBadFormat { gid, .. } => *gid,
            EngineError::IoTruncated { gid, .. }
            | EngineError::IoWriteFailed { gid, .. }
            | EngineError::UserKernelPanic { gid, .. } => Some(*gid),
            EngineError::SchedulerInvariantViolated { .. } => None,
        }
    }

    /// Map to a process exit code: 2 for IO, 3 for compute/internal.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::IoMissing { .. }
            | EngineError::IoTruncated { .. }
            | EngineError::IoBadFormat { .. }
            | EngineError::IoWriteFailed { .. } => 2,
            EngineError::UserKernelPanic { .. }
            | EngineError::SchedulerInvariantViolated { .. } => 3,
        }
    }

    /// Single-line report naming the kind and the offending gid (or `-`).
    pub fn diagnostic(&self) -> String {
        match self.gid() {
            Some(gid) => format!("{} gid={}: {}", self.kind(), gid, self),
            None => format!("{} gid=-: {}", self.kind(), self),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
