//! Direct Movement Service.
//!
//! Every ledger write in the system goes through here. Each operation runs as
//! one ledger transaction, so a failure at any step leaves no partial state,
//! and audit rows are recorded in the same transaction as the movement.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use quartermaster_auth::{Actor, IdentityDirectory, ResourceContext};
use quartermaster_core::{ComponentId, DomainError, EntryId, LocationId, UserId, ensure_positive};
use quartermaster_inventory::{InventoryEntry, InventoryLogEntry, LedgerKey, LogAction};

use crate::catalog::Catalog;
use crate::error::ServiceResult;
use crate::guard::{clean_notes, known_component, known_location, known_user, permit};
use crate::ledger_store::{LedgerOps, LedgerStore};

/// Where added stock came from; decides the audit action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSource {
    #[default]
    Manual,
    Loot,
}

impl StockSource {
    fn log_action(self) -> LogAction {
        match self {
            StockSource::Manual => LogAction::Add,
            StockSource::Loot => LogAction::Loot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStock {
    pub owner_id: UserId,
    pub component_id: ComponentId,
    pub location_id: Option<LocationId>,
    pub quantity: i64,
    #[serde(default)]
    pub source: StockSource,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveStock {
    pub owner_id: UserId,
    pub component_id: ComponentId,
    pub location_id: Option<LocationId>,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Owner-to-owner movement of one component.
///
/// With `from_location_id` unset, stock is drawn from the source owner's rows
/// in [`LedgerKey`] order (unlocated first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub from_owner_id: UserId,
    pub to_owner_id: UserId,
    pub component_id: ComponentId,
    pub quantity: i64,
    #[serde(default)]
    pub from_location_id: Option<LocationId>,
    #[serde(default)]
    pub to_location_id: Option<LocationId>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatchResetSummary {
    pub relocated: usize,
    pub written_off: usize,
}

const PATCH_RESET_NOTE: &str = "patch reset write-off";

pub struct DirectMovementService<L> {
    ledger: L,
    catalog: Arc<dyn Catalog>,
    directory: Arc<dyn IdentityDirectory>,
}

impl<L> DirectMovementService<L>
where
    L: LedgerStore,
{
    pub fn new(ledger: L, catalog: Arc<dyn Catalog>, directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            ledger,
            catalog,
            directory,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.user_id, owner = %cmd.owner_id), err)]
    pub fn add(&self, actor: &Actor, cmd: AddStock) -> ServiceResult<InventoryEntry> {
        permit(actor, ResourceContext::Inventory { owner: cmd.owner_id })?;
        known_user(self.directory.as_ref(), cmd.owner_id)?;
        known_component(self.catalog.as_ref(), cmd.component_id)?;
        known_location(self.catalog.as_ref(), cmd.location_id)?;
        ensure_positive(cmd.quantity, "quantity")?;

        let notes = clean_notes(cmd.notes);
        let key = LedgerKey::new(cmd.owner_id, cmd.component_id, cmd.location_id);
        let entry = self.ledger.transaction(|tx| {
            let before = tx.total_for(cmd.owner_id, cmd.component_id)?;
            let after = holdings_after(before, cmd.quantity)?;
            let entry = tx.increment(key, cmd.quantity)?;
            let now = tx.now();
            tx.record(
                InventoryLogEntry::new(
                    cmd.owner_id,
                    cmd.component_id,
                    cmd.source.log_action(),
                    before,
                    after,
                    now,
                )
                .with_notes(notes),
            );
            Ok(entry)
        })?;

        tracing::info!(entry = %entry.id, quantity = cmd.quantity, "stock added");
        Ok(entry)
    }

    /// Returns the quantity left at the key.
    #[tracing::instrument(skip_all, fields(actor = %actor.user_id, owner = %cmd.owner_id), err)]
    pub fn remove(&self, actor: &Actor, cmd: RemoveStock) -> ServiceResult<i64> {
        permit(actor, ResourceContext::Inventory { owner: cmd.owner_id })?;
        known_user(self.directory.as_ref(), cmd.owner_id)?;
        known_component(self.catalog.as_ref(), cmd.component_id)?;
        known_location(self.catalog.as_ref(), cmd.location_id)?;
        ensure_positive(cmd.quantity, "quantity")?;

        let notes = clean_notes(cmd.notes);
        let key = LedgerKey::new(cmd.owner_id, cmd.component_id, cmd.location_id);
        let remaining = self.ledger.transaction(|tx| {
            let before = tx.total_for(cmd.owner_id, cmd.component_id)?;
            let remaining = tx.decrement(key, cmd.quantity)?;
            let after = holdings_after(before, -cmd.quantity)?;
            let now = tx.now();
            tx.record(
                InventoryLogEntry::new(
                    cmd.owner_id,
                    cmd.component_id,
                    LogAction::Remove,
                    before,
                    after,
                    now,
                )
                .with_notes(notes),
            );
            Ok(remaining)
        })?;

        tracing::info!(quantity = cmd.quantity, remaining, "stock removed");
        Ok(remaining)
    }

    /// Direct owner-to-owner transfer, authorized against the source owner.
    #[tracing::instrument(
        skip_all,
        fields(actor = %actor.user_id, from = %cmd.from_owner_id, to = %cmd.to_owner_id),
        err
    )]
    pub fn transfer(&self, actor: &Actor, cmd: TransferStock) -> ServiceResult<InventoryEntry> {
        permit(actor, ResourceContext::Inventory { owner: cmd.from_owner_id })?;
        self.settle_transfer(cmd)
    }

    /// Execute a transfer whose authorization was decided by the caller.
    ///
    /// Used by the request engine at completion time, where the workflow
    /// itself (not ledger ownership) grants the right to move the stock.
    pub(crate) fn settle_transfer(&self, cmd: TransferStock) -> ServiceResult<InventoryEntry> {
        if cmd.from_owner_id == cmd.to_owner_id {
            return Err(DomainError::validation(
                "source and destination owners must differ; use a location move instead",
            )
            .into());
        }
        known_user(self.directory.as_ref(), cmd.from_owner_id)?;
        known_user(self.directory.as_ref(), cmd.to_owner_id)?;
        known_component(self.catalog.as_ref(), cmd.component_id)?;
        known_location(self.catalog.as_ref(), cmd.from_location_id)?;
        known_location(self.catalog.as_ref(), cmd.to_location_id)?;
        ensure_positive(cmd.quantity, "quantity")?;

        let notes = clean_notes(cmd.notes.clone());
        let destination = self.ledger.transaction(|tx| {
            let source_before = tx.total_for(cmd.from_owner_id, cmd.component_id)?;
            let target_before = tx.total_for(cmd.to_owner_id, cmd.component_id)?;
            let source_after = holdings_after(source_before, -cmd.quantity)?;
            let target_after = holdings_after(target_before, cmd.quantity)?;

            draw(tx, &cmd)?;
            let destination = tx.increment(
                LedgerKey::new(cmd.to_owner_id, cmd.component_id, cmd.to_location_id),
                cmd.quantity,
            )?;

            let now = tx.now();
            tx.record(
                InventoryLogEntry::new(
                    cmd.from_owner_id,
                    cmd.component_id,
                    LogAction::TransferOut,
                    source_before,
                    source_after,
                    now,
                )
                .with_related(cmd.to_owner_id)
                .with_notes(notes.clone()),
            );
            tx.record(
                InventoryLogEntry::new(
                    cmd.to_owner_id,
                    cmd.component_id,
                    LogAction::TransferIn,
                    target_before,
                    target_after,
                    now,
                )
                .with_related(cmd.from_owner_id)
                .with_notes(notes),
            );
            Ok(destination)
        })?;

        tracing::info!(
            from = %cmd.from_owner_id,
            to = %cmd.to_owner_id,
            component = %cmd.component_id,
            quantity = cmd.quantity,
            "stock transferred"
        );
        Ok(destination)
    }

    /// Relocate all (`quantity: None`) or part of one entry.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id), err)]
    pub fn move_location(
        &self,
        actor: &Actor,
        owner_id: UserId,
        entry_id: EntryId,
        to: Option<LocationId>,
        quantity: Option<i64>,
    ) -> ServiceResult<InventoryEntry> {
        permit(actor, ResourceContext::Inventory { owner: owner_id })?;
        known_location(self.catalog.as_ref(), to)?;

        let moved = self.ledger.transaction(|tx| {
            let entry = tx
                .entry(entry_id)?
                .filter(|e| e.owner_id == owner_id)
                .ok_or_else(|| DomainError::not_found(format!("inventory entry {entry_id}")))?;
            let quantity = quantity.unwrap_or(entry.quantity);
            tx.move_within_owner(entry.key(), to, quantity)
        })?;

        tracing::info!(entry = %moved.id, "entry relocated");
        Ok(moved)
    }

    /// Relocate every entry the owner holds at `from`. Returns how many moved.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.user_id), err)]
    pub fn bulk_move_location(
        &self,
        actor: &Actor,
        owner_id: UserId,
        from: Option<LocationId>,
        to: Option<LocationId>,
    ) -> ServiceResult<usize> {
        permit(actor, ResourceContext::Inventory { owner: owner_id })?;
        known_location(self.catalog.as_ref(), from)?;
        known_location(self.catalog.as_ref(), to)?;
        if from == to {
            return Ok(0);
        }

        let moved = self.ledger.transaction(|tx| {
            let at_source: Vec<InventoryEntry> = tx
                .entries_for_owner(owner_id)?
                .into_iter()
                .filter(|e| e.location_id == from)
                .collect();
            for entry in &at_source {
                tx.move_within_owner(entry.key(), to, entry.quantity)?;
            }
            Ok(at_source.len())
        })?;

        tracing::info!(moved, "bulk relocation done");
        Ok(moved)
    }

    /// Keep `kept` (relocated into `location`), write everything else off.
    ///
    /// Each written-off entry gets its own `remove` audit row.
    #[tracing::instrument(skip(self, actor, kept), fields(actor = %actor.user_id, kept = kept.len()), err)]
    pub fn patch_reset(
        &self,
        actor: &Actor,
        owner_id: UserId,
        location: Option<LocationId>,
        kept: &[EntryId],
    ) -> ServiceResult<PatchResetSummary> {
        permit(actor, ResourceContext::Inventory { owner: owner_id })?;
        known_location(self.catalog.as_ref(), location)?;
        let kept: HashSet<EntryId> = kept.iter().copied().collect();

        let summary = self.ledger.transaction(|tx| {
            let entries = tx.entries_for_owner(owner_id)?;
            if let Some(missing) = kept.iter().find(|id| !entries.iter().any(|e| e.id == **id)) {
                return Err(DomainError::not_found(format!("inventory entry {missing}")).into());
            }

            let (keep, drop): (Vec<_>, Vec<_>) =
                entries.into_iter().partition(|e| kept.contains(&e.id));

            // Write-offs use the original keys, so they go before any merge.
            for entry in &drop {
                let before = tx.total_for(owner_id, entry.component_id)?;
                let after = holdings_after(before, -entry.quantity)?;
                tx.decrement(entry.key(), entry.quantity)?;
                let now = tx.now();
                tx.record(
                    InventoryLogEntry::new(
                        owner_id,
                        entry.component_id,
                        LogAction::Remove,
                        before,
                        after,
                        now,
                    )
                    .with_notes(Some(PATCH_RESET_NOTE.to_string())),
                );
            }
            for entry in &keep {
                tx.move_within_owner(entry.key(), location, entry.quantity)?;
            }

            Ok(PatchResetSummary {
                relocated: keep.len(),
                written_off: drop.len(),
            })
        })?;

        tracing::info!(
            relocated = summary.relocated,
            written_off = summary.written_off,
            "patch reset applied"
        );
        Ok(summary)
    }

    pub fn get_inventory(&self, actor: &Actor, owner_id: UserId) -> ServiceResult<Vec<InventoryEntry>> {
        permit(actor, ResourceContext::InventoryRead)?;
        self.ledger.entries_for_owner(owner_id)
    }

    pub fn get_all_inventory(&self, actor: &Actor) -> ServiceResult<Vec<InventoryEntry>> {
        permit(actor, ResourceContext::InventoryRead)?;
        self.ledger.all_entries()
    }

    /// Audit history of `owner_id`, newest first.
    pub fn get_history(&self, actor: &Actor, owner_id: UserId) -> ServiceResult<Vec<InventoryLogEntry>> {
        permit(actor, ResourceContext::InventoryHistory { owner: owner_id })?;
        self.ledger.history(owner_id)
    }
}

/// Holdings total after applying `delta`, for audit rows.
fn holdings_after(before: i64, delta: i64) -> ServiceResult<i64> {
    before
        .checked_add(delta)
        .ok_or_else(|| DomainError::validation("total holdings would exceed a 64-bit count").into())
}

/// Take `cmd.quantity` out of the source owner's stock.
fn draw(tx: &mut dyn LedgerOps, cmd: &TransferStock) -> ServiceResult<()> {
    if let Some(location) = cmd.from_location_id {
        let key = LedgerKey::new(cmd.from_owner_id, cmd.component_id, Some(location));
        tx.decrement(key, cmd.quantity)?;
        return Ok(());
    }

    let available = tx.total_for(cmd.from_owner_id, cmd.component_id)?;
    if available < cmd.quantity {
        return Err(DomainError::insufficient_stock(cmd.quantity, available).into());
    }

    let mut outstanding = cmd.quantity;
    let rows: Vec<InventoryEntry> = tx
        .entries_for_owner(cmd.from_owner_id)?
        .into_iter()
        .filter(|e| e.component_id == cmd.component_id)
        .collect();
    for row in rows {
        if outstanding == 0 {
            break;
        }
        let take = outstanding.min(row.quantity);
        tx.decrement(row.key(), take)?;
        outstanding -= take;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartermaster_auth::{Role, UserProfile};

    use crate::catalog::InMemoryCatalog;
    use crate::identity::InMemoryIdentityDirectory;
    use crate::ledger_store::InMemoryLedgerStore;
    use crate::error::ServiceError;

    struct Fixture {
        service: DirectMovementService<InMemoryLedgerStore>,
        directory: Arc<InMemoryIdentityDirectory>,
        catalog: Arc<InMemoryCatalog>,
        component: ComponentId,
        l1: LocationId,
        l2: LocationId,
    }

    impl Fixture {
        fn new() -> Self {
            let directory = Arc::new(InMemoryIdentityDirectory::new());
            let catalog = Arc::new(InMemoryCatalog::new());
            let component = ComponentId::new();
            let l1 = LocationId::new();
            let l2 = LocationId::new();
            catalog.add_component(component, "Power plant").unwrap();
            catalog.add_location(l1, "Port Olisar").unwrap();
            catalog.add_location(l2, "Lorville").unwrap();

            let service = DirectMovementService::new(
                InMemoryLedgerStore::new(),
                catalog.clone(),
                directory.clone(),
            );
            Self {
                service,
                directory,
                catalog,
                component,
                l1,
                l2,
            }
        }

        fn user(&self, role: Role) -> Actor {
            let profile = UserProfile::new(UserId::new(), "test user", vec![role]);
            self.directory.upsert(profile.clone()).unwrap();
            Actor::from(&profile)
        }

        fn add(&self, actor: &Actor, location: Option<LocationId>, quantity: i64) -> InventoryEntry {
            self.service
                .add(
                    actor,
                    AddStock {
                        owner_id: actor.user_id,
                        component_id: self.component,
                        location_id: location,
                        quantity,
                        source: StockSource::Manual,
                        notes: None,
                    },
                )
                .unwrap()
        }

        fn quantity(&self, owner: UserId, location: Option<LocationId>) -> i64 {
            self.service
                .ledger()
                .get(LedgerKey::new(owner, self.component, location))
                .unwrap()
        }
    }

    fn transfer(from: &Actor, to: &Actor, component: ComponentId, quantity: i64) -> TransferStock {
        TransferStock {
            from_owner_id: from.user_id,
            to_owner_id: to.user_id,
            component_id: component,
            quantity,
            from_location_id: None,
            to_location_id: None,
            notes: None,
        }
    }

    #[test]
    fn add_logs_running_totals_and_loot_action() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        fx.add(&officer, Some(fx.l1), 3);

        fx.service
            .add(
                &officer,
                AddStock {
                    owner_id: officer.user_id,
                    component_id: fx.component,
                    location_id: Some(fx.l2),
                    quantity: 2,
                    source: StockSource::Loot,
                    notes: Some("  salvage  ".to_string()),
                },
            )
            .unwrap();

        let history = fx.service.get_history(&officer, officer.user_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, LogAction::Loot);
        assert_eq!((history[0].quantity_before, history[0].quantity_after), (3, 5));
        assert_eq!(history[0].notes.as_deref(), Some("salvage"));
    }

    #[test]
    fn total_overflow_is_rejected_and_ledger_stays_usable() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        let other = fx.user(Role::OFFICER);
        fx.add(&officer, Some(fx.l1), i64::MAX);

        let err = fx
            .service
            .add(
                &officer,
                AddStock {
                    owner_id: officer.user_id,
                    component_id: fx.component,
                    location_id: Some(fx.l2),
                    quantity: 1,
                    source: StockSource::Manual,
                    notes: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));

        assert_eq!(fx.quantity(officer.user_id, Some(fx.l1)), i64::MAX);
        assert_eq!(fx.quantity(officer.user_id, Some(fx.l2)), 0);
        assert_eq!(fx.service.get_history(&officer, officer.user_id).unwrap().len(), 1);

        fx.add(&other, None, 4);
        assert_eq!(fx.service.get_inventory(&other, other.user_id).unwrap().len(), 1);
    }

    #[test]
    fn transfer_into_full_holdings_is_rejected() {
        let fx = Fixture::new();
        let rich = fx.user(Role::OFFICER);
        let giver = fx.user(Role::OFFICER);
        fx.add(&rich, Some(fx.l1), i64::MAX);
        fx.add(&giver, Some(fx.l1), 5);

        let err = fx
            .service
            .transfer(&giver, transfer(&giver, &rich, fx.component, 1))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
        assert_eq!(fx.quantity(giver.user_id, Some(fx.l1)), 5);
        assert_eq!(fx.service.get_history(&giver, giver.user_id).unwrap().len(), 1);
    }

    #[test]
    fn members_cannot_touch_inventory_and_officers_only_their_own() {
        let fx = Fixture::new();
        let member = fx.user(Role::MEMBER);
        let officer = fx.user(Role::OFFICER);
        let admin = fx.user(Role::ADMIN);

        let cmd = |owner: UserId| AddStock {
            owner_id: owner,
            component_id: fx.component,
            location_id: None,
            quantity: 1,
            source: StockSource::Manual,
            notes: None,
        };

        assert!(matches!(
            fx.service.add(&member, cmd(member.user_id)),
            Err(ServiceError::Domain(DomainError::Unauthorized(_)))
        ));
        assert!(matches!(
            fx.service.add(&officer, cmd(member.user_id)),
            Err(ServiceError::Domain(DomainError::Unauthorized(_)))
        ));
        assert!(fx.service.add(&admin, cmd(member.user_id)).is_ok());
    }

    #[test]
    fn unknown_catalog_references_are_not_found() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);

        let err = fx
            .service
            .add(
                &officer,
                AddStock {
                    owner_id: officer.user_id,
                    component_id: fx.component,
                    location_id: Some(LocationId::new()),
                    quantity: 1,
                    source: StockSource::Manual,
                    notes: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
        assert!(fx.catalog.has_location(fx.l1));
    }

    #[test]
    fn remove_beyond_holdings_fails_without_logging() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        fx.add(&officer, None, 2);

        let err = fx
            .service
            .remove(
                &officer,
                RemoveStock {
                    owner_id: officer.user_id,
                    component_id: fx.component,
                    location_id: None,
                    quantity: 3,
                    notes: None,
                },
            )
            .unwrap_err();

        assert_eq!(err, ServiceError::Domain(DomainError::insufficient_stock(3, 2)));
        assert_eq!(fx.service.get_history(&officer, officer.user_id).unwrap().len(), 1);
    }

    #[test]
    fn transfer_without_source_location_drains_rows_in_key_order() {
        let fx = Fixture::new();
        let from = fx.user(Role::OFFICER);
        let to = fx.user(Role::MEMBER);
        fx.add(&from, None, 2);
        fx.add(&from, Some(fx.l1), 5);

        fx.service
            .transfer(&from, transfer(&from, &to, fx.component, 4))
            .unwrap();

        assert_eq!(fx.quantity(from.user_id, None), 0);
        assert_eq!(fx.quantity(from.user_id, Some(fx.l1)), 3);
        assert_eq!(fx.quantity(to.user_id, None), 4);

        let out = &fx.service.get_history(&from, from.user_id).unwrap()[0];
        assert_eq!(out.action, LogAction::TransferOut);
        assert_eq!((out.quantity_before, out.quantity_after), (7, 3));
        assert_eq!(out.related_user_id, Some(to.user_id));
    }

    #[test]
    fn failed_transfer_changes_nothing() {
        let fx = Fixture::new();
        let from = fx.user(Role::OFFICER);
        let to = fx.user(Role::MEMBER);
        fx.add(&from, Some(fx.l1), 3);

        let mut cmd = transfer(&from, &to, fx.component, 3);
        cmd.from_location_id = Some(fx.l2);
        let err = fx.service.transfer(&from, cmd).unwrap_err();

        assert_eq!(err, ServiceError::Domain(DomainError::insufficient_stock(3, 0)));
        assert_eq!(fx.quantity(from.user_id, Some(fx.l1)), 3);
        assert!(fx.service.get_inventory(&from, to.user_id).unwrap().is_empty());
        assert_eq!(fx.service.get_history(&from, from.user_id).unwrap().len(), 1);
    }

    #[test]
    fn transfer_to_self_is_rejected() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        fx.add(&officer, None, 1);

        let err = fx
            .service
            .transfer(&officer, transfer(&officer, &officer, fx.component, 1))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn partial_move_leaves_remainder_and_writes_no_log() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        let entry = fx.add(&officer, Some(fx.l1), 5);

        let moved = fx
            .service
            .move_location(&officer, officer.user_id, entry.id, Some(fx.l2), Some(2))
            .unwrap();

        assert_ne!(moved.id, entry.id);
        assert_eq!(fx.quantity(officer.user_id, Some(fx.l1)), 3);
        assert_eq!(fx.quantity(officer.user_id, Some(fx.l2)), 2);
        assert_eq!(fx.service.ledger().entry(entry.id).unwrap().unwrap().quantity, 3);
        assert_eq!(fx.service.get_history(&officer, officer.user_id).unwrap().len(), 1);
    }

    #[test]
    fn moving_someone_elses_entry_is_not_found() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        let other = fx.user(Role::OFFICER);
        let entry = fx.add(&other, None, 1);

        let err = fx
            .service
            .move_location(&officer, officer.user_id, entry.id, Some(fx.l1), None)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
    }

    #[test]
    fn bulk_move_onto_same_location_is_a_no_op() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        fx.add(&officer, Some(fx.l1), 5);

        assert_eq!(
            fx.service
                .bulk_move_location(&officer, officer.user_id, Some(fx.l1), Some(fx.l1))
                .unwrap(),
            0
        );
        assert_eq!(fx.quantity(officer.user_id, Some(fx.l1)), 5);
    }

    #[test]
    fn patch_reset_rejects_foreign_kept_ids() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        let other = fx.user(Role::OFFICER);
        fx.add(&officer, Some(fx.l1), 5);
        let foreign = fx.add(&other, Some(fx.l1), 1);

        let err = fx
            .service
            .patch_reset(&officer, officer.user_id, Some(fx.l2), &[foreign.id])
            .unwrap_err();

        assert!(matches!(err, ServiceError::Domain(DomainError::NotFound(_))));
        assert_eq!(fx.quantity(officer.user_id, Some(fx.l1)), 5);
    }

    #[test]
    fn history_is_private_to_owner_and_admins() {
        let fx = Fixture::new();
        let officer = fx.user(Role::OFFICER);
        let nosy = fx.user(Role::PIONEER);
        let admin = fx.user(Role::ADMIN);

        assert!(fx.service.get_history(&nosy, officer.user_id).is_err());
        assert!(fx.service.get_history(&admin, officer.user_id).is_ok());
        assert!(fx.service.get_inventory(&nosy, officer.user_id).is_ok());
    }
}
