//! # Orchestration Command Types
//!
//! Commands sent to the orchestration command processor. Every dispatcher
//! operation is request-response: the command carries a `CommandResponder`
//! (a oneshot sender) and the caller blocks on the paired receiver, which
//! linearizes all state access through the processor task.

use tokio::sync::oneshot;
use uuid::Uuid;

use dts_shared::model::{TransferSpecification, TransferStatus};
use dts_shared::DtsResult;

/// Type alias for command response channels
pub type CommandResponder<T> = oneshot::Sender<DtsResult<T>>;

/// Commands for orchestration operations
///
/// These replace direct method calls with an async command pattern: the
/// processor task is the single owner of the transfer map, and commands are
/// the only way in.
#[derive(Debug)]
pub enum OrchestrationCommand {
    /// Create a transfer from a validated specification; replies with the
    /// freshly minted transfer id
    CreateTransfer {
        spec: TransferSpecification,
        resp: CommandResponder<Uuid>,
    },
    /// Report the current status of a transfer
    GetStatus {
        transfer_id: Uuid,
        resp: CommandResponder<TransferStatus>,
    },
    /// Mark a transfer canceled and dispatch best-effort endpoint cancels
    CancelTransfer {
        transfer_id: Uuid,
        resp: CommandResponder<()>,
    },
    /// Persist all state and stop the processor
    Shutdown { resp: CommandResponder<()> },
}
