use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quartermaster_core::{
    Aggregate, AggregateRoot, ComponentId, DomainError, LocationId, TransferRequestId, UserId,
    error::ensure_positive,
};
use quartermaster_events::Event;

/// Transfer request status lifecycle.
///
/// ```text
/// pending ──► approved ──► awaiting_receipt ──► completed
///    │
///    └──────► rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    AwaitingReceipt,
    Completed,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::AwaitingReceipt => "awaiting_receipt",
            RequestStatus::Completed => "completed",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// The only edges of the workflow graph.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Pending, RequestStatus::Approved)
                | (RequestStatus::Pending, RequestStatus::Rejected)
                | (RequestStatus::Approved, RequestStatus::AwaitingReceipt)
                | (RequestStatus::AwaitingReceipt, RequestStatus::Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Rejected)
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "awaiting_receipt" => Ok(RequestStatus::AwaitingReceipt),
            "completed" => Ok(RequestStatus::Completed),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(DomainError::validation(format!("unknown request status '{other}'"))),
        }
    }
}

/// Aggregate root: TransferRequest.
///
/// Records a requester's intent to receive stock held by an owner. No stock
/// is reserved at any point; the ledger only moves when the request completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: TransferRequestId,
    pub order_number: String,
    pub requester_id: UserId,
    pub owner_id: UserId,
    pub component_id: ComponentId,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub quantity: i64,
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub approved_by: Option<UserId>,
    pub rejected_by: Option<UserId>,
    pub delivered_by: Option<UserId>,
    pub confirmed_by: Option<UserId>,
    pub rejection_reason: Option<String>,
    pub pioneer_comment: Option<String>,
    pub public_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    version: u64,
    #[serde(skip_serializing, default = "stored")]
    created: bool,
}

/// Only created requests are ever persisted.
fn stored() -> bool {
    true
}

impl TransferRequest {
    /// Create an empty, not-yet-created instance for the create command.
    pub fn empty(id: TransferRequestId) -> Self {
        let epoch = DateTime::<Utc>::default();
        Self {
            id,
            order_number: String::new(),
            requester_id: UserId::from_uuid(Default::default()),
            owner_id: UserId::from_uuid(Default::default()),
            component_id: ComponentId::from_uuid(Default::default()),
            from_location_id: None,
            to_location_id: None,
            quantity: 0,
            notes: None,
            status: RequestStatus::Pending,
            approved_by: None,
            rejected_by: None,
            delivered_by: None,
            confirmed_by: None,
            rejection_reason: None,
            pioneer_comment: None,
            public_comment: None,
            created_at: epoch,
            updated_at: epoch,
            version: 0,
            created: false,
        }
    }

    /// Rebuild a request from its creation event.
    pub fn from_created(event: &RequestCreated) -> Self {
        let mut request = Self::empty(event.request_id);
        request.apply(&TransferRequestEvent::Created(event.clone()));
        request
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Copy with owner-only fields removed, for viewers on the requester side.
    pub fn redacted_for_requester(&self) -> Self {
        Self {
            pioneer_comment: None,
            ..self.clone()
        }
    }

    /// Case-insensitive substring match on the order number.
    pub fn matches_order_number(&self, term: &str) -> bool {
        self.order_number
            .to_ascii_lowercase()
            .contains(&term.trim().to_ascii_lowercase())
    }
}

impl AggregateRoot for TransferRequest {
    type Id = TransferRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub request_id: TransferRequestId,
    pub order_number: String,
    pub requester_id: UserId,
    pub owner_id: UserId,
    pub component_id: ComponentId,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub quantity: i64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command payload shared by approve, deliver and confirm-receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActOnRequest {
    pub request_id: TransferRequestId,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub request_id: TransferRequestId,
    pub actor_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CommentOnRequest. An empty string clears that comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentOnRequest {
    pub request_id: TransferRequestId,
    pub actor_id: UserId,
    pub pioneer_comment: Option<String>,
    pub public_comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferRequestCommand {
    Create(CreateRequest),
    Approve(ActOnRequest),
    Reject(RejectRequest),
    Deliver(ActOnRequest),
    ConfirmReceipt(ActOnRequest),
    Comment(CommentOnRequest),
}

impl TransferRequestCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TransferRequestCommand::Create(_) => "create",
            TransferRequestCommand::Approve(_) => "approve",
            TransferRequestCommand::Reject(_) => "reject",
            TransferRequestCommand::Deliver(_) => "deliver",
            TransferRequestCommand::ConfirmReceipt(_) => "confirm receipt of",
            TransferRequestCommand::Comment(_) => "comment on",
        }
    }
}

/// Event: RequestCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCreated {
    pub request_id: TransferRequestId,
    pub order_number: String,
    pub requester_id: UserId,
    pub owner_id: UserId,
    pub component_id: ComponentId,
    pub from_location_id: Option<LocationId>,
    pub to_location_id: Option<LocationId>,
    pub quantity: i64,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestApproved {
    pub request_id: TransferRequestId,
    pub approved_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRejected {
    pub request_id: TransferRequestId,
    pub rejected_by: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestDelivered (physical handover happened out of band).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDelivered {
    pub request_id: TransferRequestId,
    pub delivered_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestCompleted (the ledger transfer has been committed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCompleted {
    pub request_id: TransferRequestId,
    pub confirmed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestCommented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCommented {
    pub request_id: TransferRequestId,
    pub commented_by: UserId,
    pub pioneer_comment: Option<String>,
    pub public_comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferRequestEvent {
    Created(RequestCreated),
    Approved(RequestApproved),
    Rejected(RequestRejected),
    Delivered(RequestDelivered),
    Completed(RequestCompleted),
    Commented(RequestCommented),
}

impl Event for TransferRequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransferRequestEvent::Created(_) => "inventory.request.created",
            TransferRequestEvent::Approved(_) => "inventory.request.approved",
            TransferRequestEvent::Rejected(_) => "inventory.request.rejected",
            TransferRequestEvent::Delivered(_) => "inventory.request.delivered",
            TransferRequestEvent::Completed(_) => "inventory.request.completed",
            TransferRequestEvent::Commented(_) => "inventory.request.commented",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransferRequestEvent::Created(e) => e.occurred_at,
            TransferRequestEvent::Approved(e) => e.occurred_at,
            TransferRequestEvent::Rejected(e) => e.occurred_at,
            TransferRequestEvent::Delivered(e) => e.occurred_at,
            TransferRequestEvent::Completed(e) => e.occurred_at,
            TransferRequestEvent::Commented(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TransferRequest {
    type Command = TransferRequestCommand;
    type Event = TransferRequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransferRequestEvent::Created(e) => {
                self.id = e.request_id;
                self.order_number = e.order_number.clone();
                self.requester_id = e.requester_id;
                self.owner_id = e.owner_id;
                self.component_id = e.component_id;
                self.from_location_id = e.from_location_id;
                self.to_location_id = e.to_location_id;
                self.quantity = e.quantity;
                self.notes = e.notes.clone();
                self.status = RequestStatus::Pending;
                self.created_at = e.occurred_at;
                self.created = true;
            }
            TransferRequestEvent::Approved(e) => {
                self.status = RequestStatus::Approved;
                self.approved_by = Some(e.approved_by);
            }
            TransferRequestEvent::Rejected(e) => {
                self.status = RequestStatus::Rejected;
                self.rejected_by = Some(e.rejected_by);
                self.rejection_reason = Some(e.reason.clone());
            }
            TransferRequestEvent::Delivered(e) => {
                self.status = RequestStatus::AwaitingReceipt;
                self.delivered_by = Some(e.delivered_by);
            }
            TransferRequestEvent::Completed(e) => {
                self.status = RequestStatus::Completed;
                self.confirmed_by = Some(e.confirmed_by);
            }
            TransferRequestEvent::Commented(e) => {
                if let Some(c) = &e.pioneer_comment {
                    self.pioneer_comment = non_empty(c);
                }
                if let Some(c) = &e.public_comment {
                    self.public_comment = non_empty(c);
                }
            }
        }

        self.updated_at = event.occurred_at();
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransferRequestCommand::Create(cmd) => self.handle_create(cmd),
            _ if !self.created => Err(DomainError::not_found(format!(
                "transfer request {}",
                self.id
            ))),
            TransferRequestCommand::Approve(cmd) => {
                self.ensure_transition(RequestStatus::Approved, command.name())?;
                Ok(vec![TransferRequestEvent::Approved(RequestApproved {
                    request_id: self.id,
                    approved_by: cmd.actor_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TransferRequestCommand::Reject(cmd) => {
                self.ensure_transition(RequestStatus::Rejected, command.name())?;
                let reason = cmd.reason.trim();
                if reason.is_empty() {
                    return Err(DomainError::validation("rejection reason cannot be empty"));
                }
                Ok(vec![TransferRequestEvent::Rejected(RequestRejected {
                    request_id: self.id,
                    rejected_by: cmd.actor_id,
                    reason: reason.to_string(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            TransferRequestCommand::Deliver(cmd) => {
                self.ensure_transition(RequestStatus::AwaitingReceipt, command.name())?;
                Ok(vec![TransferRequestEvent::Delivered(RequestDelivered {
                    request_id: self.id,
                    delivered_by: cmd.actor_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TransferRequestCommand::ConfirmReceipt(cmd) => {
                self.ensure_transition(RequestStatus::Completed, command.name())?;
                Ok(vec![TransferRequestEvent::Completed(RequestCompleted {
                    request_id: self.id,
                    confirmed_by: cmd.actor_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            TransferRequestCommand::Comment(cmd) => {
                if cmd.pioneer_comment.is_none() && cmd.public_comment.is_none() {
                    return Err(DomainError::validation(
                        "a comment needs a pioneer comment or a public comment",
                    ));
                }
                Ok(vec![TransferRequestEvent::Commented(RequestCommented {
                    request_id: self.id,
                    commented_by: cmd.actor_id,
                    pioneer_comment: cmd.pioneer_comment.clone(),
                    public_comment: cmd.public_comment.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl TransferRequest {
    fn ensure_transition(&self, next: RequestStatus, action: &str) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(self.status, action))
        }
    }

    fn handle_create(&self, cmd: &CreateRequest) -> Result<Vec<TransferRequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transfer request already exists"));
        }
        ensure_positive(cmd.quantity, "quantity")?;
        if cmd.requester_id == cmd.owner_id {
            return Err(DomainError::validation("requester and owner must differ"));
        }
        if cmd.order_number.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }

        Ok(vec![TransferRequestEvent::Created(RequestCreated {
            request_id: cmd.request_id,
            order_number: cmd.order_number.clone(),
            requester_id: cmd.requester_id,
            owner_id: cmd.owner_id,
            component_id: cmd.component_id,
            from_location_id: cmd.from_location_id,
            to_location_id: cmd.to_location_id,
            quantity: cmd.quantity,
            notes: cmd.notes.as_deref().and_then(non_empty),
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Listing filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub owner_id: Option<UserId>,
    pub requester_id: Option<UserId>,
    pub component_id: Option<ComponentId>,
}

impl RequestFilter {
    pub fn matches(&self, request: &TransferRequest) -> bool {
        self.status.is_none_or(|s| request.status == s)
            && self.owner_id.is_none_or(|o| request.owner_id == o)
            && self.requester_id.is_none_or(|r| request.requester_id == r)
            && self.component_id.is_none_or(|c| request.component_id == c)
    }
}
