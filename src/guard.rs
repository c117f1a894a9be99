//! Transition guard: validates status transitions and role-gated business
//! actions, then folds the resulting event into the aggregate.
//!
//! Every mutation follows the same shape: check legality against the current
//! aggregate, build the [`TicketEvent`], and hand it to [`Ticket::apply`].
//! The guard itself never touches ticket fields, which is what keeps replay
//! and the live projection identical.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Actor, AddCommentInput, CreateTicketInput, EventKind, MarkLostInput, Party, SubmitQuoteInput,
    Ticket, TicketEvent, TicketOpened, TicketStatus, TicketType,
};
use crate::{Result, TicketError};

/// Open a new ticket. Status starts at `open`; the department owes the first
/// response as soon as somebody is assigned.
pub fn create_ticket(
    input: &CreateTicketInput,
    actor: Actor,
    now: DateTime<Utc>,
) -> (Ticket, TicketEvent) {
    let ticket_id = Uuid::new_v4();
    let opened = TicketOpened {
        ticket_type: input.ticket_type,
        department: input.department.clone(),
        priority: input.priority,
        subject: input.subject.clone(),
        description: input.description.clone(),
        created_by: actor.user_id,
        assigned_to: input.assigned_to,
    };
    let ticket = Ticket::opened(ticket_id, &opened, now);
    let event = TicketEvent {
        id: Uuid::new_v4(),
        ticket_id,
        actor_id: actor.user_id,
        actor_party: Party::Creator,
        kind: EventKind::Created(opened),
        created_at: now,
    };
    (ticket, event)
}

impl Ticket {
    fn event(&self, actor: Actor, kind: EventKind, now: DateTime<Utc>) -> TicketEvent {
        TicketEvent {
            id: Uuid::new_v4(),
            ticket_id: self.id,
            actor_id: actor.user_id,
            actor_party: self.party_of(actor.user_id),
            kind,
            created_at: now,
        }
    }

    fn require_rfq(&self, action: &'static str) -> Result<()> {
        if self.ticket_type != TicketType::Rfq {
            return Err(TicketError::InvalidState {
                action,
                current: self.status,
                required: "an RFQ ticket",
            });
        }
        Ok(())
    }

    fn require_status(
        &self,
        action: &'static str,
        allowed: &[TicketStatus],
        required: &'static str,
    ) -> Result<()> {
        if !allowed.contains(&self.status) {
            return Err(TicketError::InvalidState {
                action,
                current: self.status,
                required,
            });
        }
        Ok(())
    }

    fn require_creator(&self, actor: Actor, capability: &'static str) -> Result<()> {
        if self.party_of(actor.user_id) != Party::Creator {
            return Err(TicketError::Forbidden {
                actor_id: actor.user_id,
                role: actor.role,
                capability,
            });
        }
        Ok(())
    }

    /// Generic status transition per the matrix. Never flips turn ownership
    /// unless the target is terminal, which clears it.
    pub fn transition(
        &mut self,
        to: TicketStatus,
        actor: Actor,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TicketEvent> {
        let caps = actor.role.capabilities();
        if !caps.can_transition {
            return Err(TicketError::Forbidden {
                actor_id: actor.user_id,
                role: actor.role,
                capability: "transition",
            });
        }
        if to.is_terminal() && !caps.can_close {
            return Err(TicketError::Forbidden {
                actor_id: actor.user_id,
                role: actor.role,
                capability: "close",
            });
        }
        if !self.status.can_transition_to(to) {
            return Err(TicketError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        let event = self.event(
            actor,
            EventKind::StatusChanged {
                from: self.status,
                to,
                notes,
            },
            now,
        );
        self.apply(&event);
        Ok(event)
    }

    /// Assign (or reassign) the ticket inside the department. Initializes
    /// turn ownership on the first assignment of a live ticket.
    pub fn assign(
        &mut self,
        assigned_to: Uuid,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<TicketEvent> {
        if !actor.role.capabilities().can_assign {
            return Err(TicketError::Forbidden {
                actor_id: actor.user_id,
                role: actor.role,
                capability: "assign",
            });
        }
        let event = self.event(actor, EventKind::Assigned { assigned_to }, now);
        self.apply(&event);
        Ok(event)
    }

    /// Record a comment. External comments from the owed party close the
    /// turn; internal notes are audit-only.
    pub fn add_comment(
        &mut self,
        input: &AddCommentInput,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<TicketEvent> {
        let event = self.event(
            actor,
            EventKind::CommentAdded {
                content: input.content.clone(),
                is_internal: input.is_internal,
            },
            now,
        );
        self.apply(&event);
        Ok(event)
    }

    /// Submit a quote to the customer. Department side only.
    pub fn submit_quote(
        &mut self,
        input: &SubmitQuoteInput,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<TicketEvent> {
        self.require_rfq("submit_quote")?;
        self.require_status(
            "submit_quote",
            &[
                TicketStatus::Open,
                TicketStatus::InProgress,
                TicketStatus::NeedAdjustment,
            ],
            "open, in_progress or need_adjustment",
        )?;
        if self.party_of(actor.user_id) != Party::Department
            || !actor.role.capabilities().can_submit_quote
        {
            return Err(TicketError::Forbidden {
                actor_id: actor.user_id,
                role: actor.role,
                capability: "submit_quote",
            });
        }
        let event = self.event(
            actor,
            EventKind::QuoteSubmitted {
                amount: input.amount,
                currency: input.currency.clone(),
                terms: input.terms.clone(),
            },
            now,
        );
        self.apply(&event);
        Ok(event)
    }

    /// Creator asks for the quote to be reworked.
    pub fn request_adjustment(
        &mut self,
        notes: Option<String>,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<TicketEvent> {
        self.require_rfq("request_adjustment")?;
        self.require_status(
            "request_adjustment",
            &[TicketStatus::WaitingCustomer, TicketStatus::InProgress],
            "waiting_customer or in_progress",
        )?;
        self.require_creator(actor, "request_adjustment (creator side)")?;
        let event = self.event(actor, EventKind::AdjustmentRequested { notes }, now);
        self.apply(&event);
        Ok(event)
    }

    /// Creator acknowledges forwarding the quote externally. Audit trail
    /// only: no status change, no turn flip, no SLA effect.
    pub fn quote_sent_to_customer(
        &mut self,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<TicketEvent> {
        self.require_rfq("quote_sent_to_customer")?;
        self.require_status(
            "quote_sent_to_customer",
            &[TicketStatus::WaitingCustomer],
            "waiting_customer",
        )?;
        self.require_creator(actor, "quote_sent_to_customer (creator side)")?;
        let event = self.event(actor, EventKind::QuoteSentToCustomer, now);
        self.apply(&event);
        Ok(event)
    }

    /// Creator closes out the quotation as won.
    pub fn mark_won(&mut self, actor: Actor, now: DateTime<Utc>) -> Result<TicketEvent> {
        self.require_rfq("mark_won")?;
        self.require_status(
            "mark_won",
            &[TicketStatus::Pending, TicketStatus::WaitingCustomer],
            "pending or waiting_customer",
        )?;
        self.require_creator(actor, "mark_won (creator side)")?;
        let event = self.event(actor, EventKind::MarkedWon, now);
        self.apply(&event);
        Ok(event)
    }

    /// Creator closes out the quotation as lost, with the reason and any
    /// competitor intelligence.
    pub fn mark_lost(
        &mut self,
        input: &MarkLostInput,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<TicketEvent> {
        self.require_rfq("mark_lost")?;
        self.require_status(
            "mark_lost",
            &[TicketStatus::Pending, TicketStatus::WaitingCustomer],
            "pending or waiting_customer",
        )?;
        self.require_creator(actor, "mark_lost (creator side)")?;
        let event = self.event(
            actor,
            EventKind::MarkedLost {
                reason: input.reason.clone(),
                competitor_name: input.competitor_name.clone(),
                competitor_cost: input.competitor_cost,
            },
            now,
        );
        self.apply(&event);
        Ok(event)
    }
}
