// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// Infrastructure failures of the policy runtime.
///
/// Command-level failures are [`pangolin_core::PolicyError`]; this covers the runtime itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The actor's mailbox closed unexpectedly.
    #[error("policy actor inbox closed")]
    InboxClosed,

    /// The service router stopped and no longer accepts commands.
    #[error("policy service stopped")]
    ServiceStopped,

    /// Recovering an entity from the stores failed; the actor did not start.
    #[error("policy recovery failed: {0}")]
    Recovery(String),
}
