use async_graphql::{Enum, InputObject, SimpleObject};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a ticket.
///
/// The transition matrix in [`TicketStatus::can_transition_to`] is
/// authoritative; anything it does not list is rejected by the guard.
#[derive(Debug, Clone, Copy, Enum, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    NeedResponse,
    InProgress,
    WaitingCustomer,
    NeedAdjustment,
    Pending,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// All statuses, in declaration order. Used by exhaustive matrix tests.
    pub const ALL: [TicketStatus; 8] = [
        TicketStatus::Open,
        TicketStatus::NeedResponse,
        TicketStatus::InProgress,
        TicketStatus::WaitingCustomer,
        TicketStatus::NeedAdjustment,
        TicketStatus::Pending,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    /// Can a generic transition move from `self` to `to`?
    pub fn can_transition_to(self, to: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, to),
            (Open, InProgress)
                | (Open, Pending)
                | (Open, Closed)
                | (NeedResponse, InProgress)
                | (NeedResponse, WaitingCustomer)
                | (NeedResponse, Resolved)
                | (NeedResponse, Closed)
                | (InProgress, NeedResponse)
                | (InProgress, WaitingCustomer)
                | (InProgress, NeedAdjustment)
                | (InProgress, Pending)
                | (InProgress, Resolved)
                | (InProgress, Closed)
                | (WaitingCustomer, InProgress)
                | (WaitingCustomer, NeedAdjustment)
                | (WaitingCustomer, Resolved)
                | (WaitingCustomer, Closed)
                | (NeedAdjustment, InProgress)
                | (NeedAdjustment, Resolved)
                | (NeedAdjustment, Closed)
                | (Pending, Open)
                | (Pending, InProgress)
                | (Pending, Resolved)
                | (Pending, Closed)
                | (Resolved, Closed)
                | (Resolved, InProgress)
                | (Closed, Open)
        )
    }

    /// Terminal statuses carry no pending-response owner.
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TicketStatus::Open => "open",
            TicketStatus::NeedResponse => "need_response",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::WaitingCustomer => "waiting_customer",
            TicketStatus::NeedAdjustment => "need_adjustment",
            TicketStatus::Pending => "pending",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Enum, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    /// Request for quotation - drives the quote/adjustment/won-lost flow.
    Rfq,
    /// General support ticket.
    Gen,
}

impl std::fmt::Display for TicketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketType::Rfq => write!(f, "RFQ"),
            TicketType::Gen => write!(f, "GEN"),
        }
    }
}

#[derive(Debug, Clone, Copy, Enum, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// The side of the conversation a party belongs to. `pending_response_from`
/// holds the party that owes the next action.
#[derive(Debug, Clone, Copy, Enum, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Creator,
    Department,
}

impl Party {
    pub fn other(self) -> Party {
        match self {
            Party::Creator => Party::Department,
            Party::Department => Party::Creator,
        }
    }
}

/// Who an exchange is attributed to. Mirrors [`Party`] under the names used
/// by reporting consumers.
#[derive(Debug, Clone, Copy, Enum, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderType {
    Creator,
    Assignee,
}

impl From<Party> for ResponderType {
    fn from(party: Party) -> Self {
        match party {
            Party::Creator => ResponderType::Creator,
            Party::Department => ResponderType::Assignee,
        }
    }
}

#[derive(Debug, Clone, Copy, Enum, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseOutcome {
    Won,
    Lost,
}

// ---------------------------------------------------------------------------
// Actors and capabilities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Enum, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Sales,
    Operations,
    Manager,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Customer => "customer",
            Role::Sales => "sales",
            Role::Operations => "operations",
            Role::Manager => "manager",
            Role::Admin => "admin",
        };
        write!(f, "{s}")
    }
}

/// Capability set resolved once per actor. The guard checks membership here
/// rather than comparing role names.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub can_transition: bool,
    pub can_assign: bool,
    pub can_submit_quote: bool,
    pub can_close: bool,
}

impl Role {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Role::Customer => Capabilities::default(),
            Role::Sales => Capabilities {
                can_assign: true,
                ..Capabilities::default()
            },
            Role::Operations => Capabilities {
                can_assign: true,
                can_submit_quote: true,
                ..Capabilities::default()
            },
            Role::Manager | Role::Admin => Capabilities {
                can_transition: true,
                can_assign: true,
                can_submit_quote: true,
                can_close: true,
            },
        }
    }
}

/// An authenticated caller. Services resolve this before delegating to the
/// engine; the engine never does authentication itself.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Payload carried by the `created` event. Holds everything needed to seed
/// the aggregate from the log alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketOpened {
    pub ticket_type: TicketType,
    pub department: String,
    pub priority: TicketPriority,
    pub subject: String,
    pub description: String,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
}

/// Typed event payload. Serializes internally tagged so the log schema is
/// stable for external consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Created(TicketOpened),
    StatusChanged {
        from: TicketStatus,
        to: TicketStatus,
        notes: Option<String>,
    },
    Assigned {
        assigned_to: Uuid,
    },
    CommentAdded {
        content: String,
        is_internal: bool,
    },
    QuoteSubmitted {
        amount: Decimal,
        currency: String,
        terms: Option<String>,
    },
    AdjustmentRequested {
        notes: Option<String>,
    },
    QuoteSentToCustomer,
    MarkedWon,
    MarkedLost {
        reason: String,
        competitor_name: Option<String>,
        competitor_cost: Option<Decimal>,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Created(_) => "created",
            EventKind::StatusChanged { .. } => "status_changed",
            EventKind::Assigned { .. } => "assigned",
            EventKind::CommentAdded { .. } => "comment_added",
            EventKind::QuoteSubmitted { .. } => "quote_submitted",
            EventKind::AdjustmentRequested { .. } => "adjustment_requested",
            EventKind::QuoteSentToCustomer => "quote_sent_to_customer",
            EventKind::MarkedWon => "marked_won",
            EventKind::MarkedLost { .. } => "marked_lost",
        }
    }
}

/// Append-only log entry. Immutable once written; strictly ordered by
/// `created_at` within a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketEvent {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub actor_id: Uuid,
    /// Which side of the conversation the actor was on, derived at append
    /// time from `ticket.created_by`.
    pub actor_party: Party,
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Ticket aggregate
// ---------------------------------------------------------------------------

/// The mutable projection of a ticket's event log.
///
/// Every field here is a pure fold of the log: [`Ticket::apply`] is the only
/// place state changes, and [`Ticket::replay`] rebuilds an identical
/// aggregate from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SimpleObject)]
pub struct Ticket {
    pub id: Uuid,
    pub ticket_type: TicketType,
    pub department: String,
    pub priority: TicketPriority,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    /// Party owing the next action. None only while terminal or before any
    /// exchange has started.
    pub pending_response_from: Option<Party>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub first_quote_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_outcome: Option<CloseOutcome>,
    /// Optimistic-concurrency version, incremented per applied event.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Seed an aggregate from a `created` payload.
    pub(crate) fn opened(ticket_id: Uuid, opened: &TicketOpened, at: DateTime<Utc>) -> Self {
        Self {
            id: ticket_id,
            ticket_type: opened.ticket_type,
            department: opened.department.clone(),
            priority: opened.priority,
            subject: opened.subject.clone(),
            description: opened.description.clone(),
            status: TicketStatus::Open,
            created_by: opened.created_by,
            assigned_to: opened.assigned_to,
            pending_response_from: opened.assigned_to.map(|_| Party::Department),
            first_response_at: None,
            first_quote_at: None,
            resolved_at: None,
            closed_at: None,
            close_outcome: None,
            version: 1,
            created_at: at,
            updated_at: at,
        }
    }

    /// Which side of the conversation a user is on for this ticket.
    pub fn party_of(&self, user_id: Uuid) -> Party {
        if user_id == self.created_by {
            Party::Creator
        } else {
            Party::Department
        }
    }

    /// Fold one event into the aggregate. The guard validates before calling
    /// this; replay calls it unvalidated because the log was validated when
    /// written.
    pub fn apply(&mut self, event: &TicketEvent) {
        let at = event.created_at;
        match &event.kind {
            // The seed event is handled by `opened`; applying it again only
            // bumps the version.
            EventKind::Created(_) => {}
            EventKind::StatusChanged { to, .. } => {
                let was_terminal = self.status.is_terminal();
                self.status = *to;
                if to.is_terminal() {
                    self.pending_response_from = None;
                    if self.resolved_at.is_none() {
                        self.resolved_at = Some(at);
                    }
                    if *to == TicketStatus::Closed && self.closed_at.is_none() {
                        self.closed_at = Some(at);
                    }
                } else if was_terminal {
                    // Reopened: the department owes the next move if anyone
                    // is assigned.
                    self.pending_response_from = self.assigned_to.map(|_| Party::Department);
                }
            }
            EventKind::Assigned { assigned_to } => {
                self.assigned_to = Some(*assigned_to);
                if self.pending_response_from.is_none() && !self.status.is_terminal() {
                    self.pending_response_from = Some(Party::Department);
                }
            }
            EventKind::CommentAdded { is_internal, .. } => {
                // Only an external comment from the owed party closes the
                // turn; internal notes never do.
                if !*is_internal && self.pending_response_from == Some(event.actor_party) {
                    if event.actor_party == Party::Department && self.first_response_at.is_none()
                    {
                        self.first_response_at = Some(at);
                    }
                    self.pending_response_from = Some(event.actor_party.other());
                }
            }
            EventKind::QuoteSubmitted { .. } => {
                self.status = TicketStatus::WaitingCustomer;
                self.pending_response_from = Some(Party::Creator);
                if self.first_response_at.is_none() {
                    self.first_response_at = Some(at);
                }
                if self.first_quote_at.is_none() {
                    self.first_quote_at = Some(at);
                }
            }
            EventKind::AdjustmentRequested { .. } => {
                self.status = TicketStatus::NeedAdjustment;
                self.pending_response_from = Some(Party::Department);
            }
            EventKind::QuoteSentToCustomer => {
                // Audit trail only.
            }
            EventKind::MarkedWon => {
                self.status = TicketStatus::Resolved;
                self.close_outcome = Some(CloseOutcome::Won);
                self.pending_response_from = None;
                if self.resolved_at.is_none() {
                    self.resolved_at = Some(at);
                }
            }
            EventKind::MarkedLost { .. } => {
                self.status = TicketStatus::Resolved;
                self.close_outcome = Some(CloseOutcome::Lost);
                self.pending_response_from = None;
                if self.resolved_at.is_none() {
                    self.resolved_at = Some(at);
                }
            }
        }
        self.version += 1;
        self.updated_at = at;
    }

    /// Rebuild the aggregate by folding the full log. Returns None when the
    /// log is empty or does not start with a `created` event.
    pub fn replay(events: &[TicketEvent]) -> Option<Ticket> {
        let first = events.first()?;
        let EventKind::Created(opened) = &first.kind else {
            return None;
        };
        let mut ticket = Ticket::opened(first.ticket_id, opened, first.created_at);
        for event in &events[1..] {
            ticket.apply(event);
        }
        Some(ticket)
    }
}

// ---------------------------------------------------------------------------
// Exchanges
// ---------------------------------------------------------------------------

/// One attributable turn in the creator/assignee conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, SimpleObject)]
pub struct Exchange {
    pub responder_type: ResponderType,
    /// 1-based, contiguous per responder type.
    pub exchange_number: i32,
    /// Working-calendar-aware latency between the moment the response became
    /// owed and the moment it happened.
    pub business_response_seconds: i64,
}

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, InputObject)]
pub struct CreateTicketInput {
    pub ticket_type: TicketType,
    pub department: String,
    pub priority: TicketPriority,
    pub subject: String,
    pub description: String,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, InputObject)]
pub struct SubmitQuoteInput {
    pub amount: Decimal,
    pub currency: String,
    pub terms: Option<String>,
}

#[derive(Debug, Clone, InputObject)]
pub struct MarkLostInput {
    pub reason: String,
    pub competitor_name: Option<String>,
    pub competitor_cost: Option<Decimal>,
}

#[derive(Debug, Clone, InputObject)]
pub struct AddCommentInput {
    pub content: String,
    pub is_internal: bool,
}
