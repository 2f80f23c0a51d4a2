// src/utils/errors.rs
//! Error types for the pool service
//!
//! Two classes of failure flow through this enum. Contract misuse
//! (`JobAlreadyActive`, `InstanceDisposed`) is returned synchronously to the
//! caller and is never retried internally. Worker-side trouble
//! (`LaunchFailed`, `ControlChannel`) is absorbed by the pool and converted
//! into lifecycle events rather than propagated up the call stack.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("cannot start a new job until the previous has finished (instance {instance_id}, active job {active_job})")]
    JobAlreadyActive { instance_id: u64, active_job: u64 },

    #[error("instance {0} is disposed and cannot accept jobs")]
    InstanceDisposed(u64),

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("control channel failure: {0}")]
    ControlChannel(String),

    #[error("pool is stopped")]
    PoolStopped,

    #[error("pool already started")]
    AlreadyStarted,

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("observability init failed: {0}")]
    Init(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl PoolError {
    /// Whether this error signals misuse of the pool contract rather than a
    /// worker-side condition.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PoolError::JobAlreadyActive { .. } | PoolError::InstanceDisposed(_)
        )
    }
}
