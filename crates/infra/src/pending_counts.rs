//! Pending-Count Aggregator: per-viewer badge counts over current request rows.

use std::collections::HashMap;
use std::sync::Arc;

use quartermaster_auth::{Actor, Capability, IdentityDirectory, ResourceContext};
use quartermaster_core::UserId;
use quartermaster_inventory::{PendingCounts, PendingViewer, RequestFilter};

use crate::error::ServiceResult;
use crate::guard::permit;
use crate::request_store::TransferRequestStore;

pub struct PendingCountAggregator<R> {
    requests: R,
    directory: Arc<dyn IdentityDirectory>,
}

impl<R> PendingCountAggregator<R>
where
    R: TransferRequestStore,
{
    pub fn new(requests: R, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            requests,
            directory,
        }
    }

    pub fn pending_counts(&self, actor: &Actor) -> ServiceResult<PendingCounts> {
        permit(actor, ResourceContext::InventoryRead)?;

        let viewer = PendingViewer {
            user_id: actor.user_id,
            is_pioneer: actor.has(Capability::Pioneer),
            is_admin: actor.has(Capability::Admin),
        };
        let rows = self.requests.list(&RequestFilter::default())?;

        // (is_pioneer, is_active) per participant; unknown users are inactive.
        let mut flags: HashMap<UserId, (bool, bool)> = HashMap::new();
        for user_id in rows.iter().flat_map(|r| [r.owner_id, r.requester_id]) {
            flags.entry(user_id).or_insert_with(|| {
                self.directory
                    .profile(user_id)
                    .map(|p| (p.is_pioneer(), p.is_active()))
                    .unwrap_or((false, false))
            });
        }

        Ok(PendingCounts::compute(
            viewer,
            &rows,
            |owner| flags.get(&owner).is_some_and(|(pioneer, _)| *pioneer),
            |requester| flags.get(&requester).is_some_and(|(_, active)| !*active),
        ))
    }
}
