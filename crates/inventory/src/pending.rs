//! Per-viewer pending-request badges.
//!
//! Derived state only: counts are recomputed from the current request rows on
//! every call, so they can never drift from the workflow itself.

use serde::Serialize;

use quartermaster_core::UserId;

use crate::{RequestStatus, TransferRequest};

/// The user the badges are computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingViewer {
    pub user_id: UserId,
    pub is_pioneer: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    /// PENDING requests the viewer owns or co-manages as a pool pioneer.
    pub as_owner_pending: u32,
    /// APPROVED requests the viewer owns or co-manages as a pool pioneer.
    pub as_owner_approved: u32,
    /// AWAITING_RECEIPT requests the viewer owns.
    pub as_owner_awaiting: u32,
    pub as_requester_pending: u32,
    pub as_requester_approved: u32,
    /// AWAITING_RECEIPT requests the viewer must confirm.
    pub awaiting_receipt_to_confirm: u32,
    /// AWAITING_RECEIPT requests stuck on an inactive requester (admins only).
    pub admin_awaiting: u32,
}

impl PendingCounts {
    /// Recompute every bucket for `viewer`.
    ///
    /// `is_pool_owner` reports whether an owner's stock is organization pool
    /// stock; `is_inactive` whether a requester's account is inactive.
    pub fn compute<'a>(
        viewer: PendingViewer,
        requests: impl IntoIterator<Item = &'a TransferRequest>,
        is_pool_owner: impl Fn(UserId) -> bool,
        is_inactive: impl Fn(UserId) -> bool,
    ) -> Self {
        let mut counts = PendingCounts::default();

        for request in requests {
            let owns = request.owner_id == viewer.user_id;
            let co_manages =
                owns || (viewer.is_pioneer && is_pool_owner(request.owner_id));
            let requested = request.requester_id == viewer.user_id;

            match request.status {
                RequestStatus::Pending => {
                    counts.as_owner_pending += u32::from(co_manages);
                    counts.as_requester_pending += u32::from(requested);
                }
                RequestStatus::Approved => {
                    counts.as_owner_approved += u32::from(co_manages);
                    counts.as_requester_approved += u32::from(requested);
                }
                RequestStatus::AwaitingReceipt => {
                    counts.as_owner_awaiting += u32::from(owns);
                    counts.awaiting_receipt_to_confirm += u32::from(requested);
                    if viewer.is_admin && is_inactive(request.requester_id) {
                        counts.admin_awaiting += 1;
                    }
                }
                RequestStatus::Completed | RequestStatus::Rejected => {}
            }
        }

        counts
    }

    pub fn total(&self) -> u32 {
        self.as_owner_pending
            + self.as_owner_approved
            + self.as_owner_awaiting
            + self.as_requester_pending
            + self.as_requester_approved
            + self.awaiting_receipt_to_confirm
            + self.admin_awaiting
    }
}
