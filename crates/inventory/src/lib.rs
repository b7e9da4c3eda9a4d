//! Inventory domain module.
//!
//! Ledger rows, audit entries and the transfer-request workflow, implemented
//! as deterministic domain logic (no IO, no HTTP, no storage).

pub mod entry;
pub mod log;
pub mod pending;
pub mod request;

pub use entry::{InventoryEntry, LedgerKey};
pub use log::{InventoryLogEntry, LogAction};
pub use pending::{PendingCounts, PendingViewer};
pub use request::{
    ActOnRequest, CommentOnRequest, CreateRequest, RejectRequest, RequestApproved,
    RequestCommented, RequestCompleted, RequestCreated, RequestDelivered, RequestFilter,
    RequestRejected, RequestStatus, TransferRequest, TransferRequestCommand,
    TransferRequestEvent,
};
