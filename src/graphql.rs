//! GraphQL API for the ticket lifecycle engine.
//!
//! Provides TicketQueries and TicketMutations that can be integrated into
//! any service's GraphQL schema.
//!
//! ## Usage in Services
//!
//! Services should delegate to these query/mutation structs and provide
//! TicketEngine in the GraphQL context.
//!
//! Authentication is the service layer's job: `actor_id` and `actor_role`
//! must come from the authenticated session, never from client input. The
//! engine enforces the capability and side checks on top of that identity.

use async_graphql::{Context, Json, Object, Result as GraphQLResult, SimpleObject};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::TicketEngine;
use crate::models::{
    Actor, AddCommentInput, CreateTicketInput, EventKind, Exchange, MarkLostInput, Party, Role,
    SubmitQuoteInput, Ticket, TicketEvent, TicketStatus,
};
use crate::sla::SlaReport;

/// Read-model view of a log entry. The typed payload is exposed as JSON so
/// UI and analytics consumers stay decoupled from the Rust enum.
#[derive(Debug, Clone, SimpleObject)]
pub struct EventRecord {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub event_type: String,
    pub actor_id: Uuid,
    pub actor_party: Party,
    pub created_at: DateTime<Utc>,
    pub payload: Json<EventKind>,
}

impl From<TicketEvent> for EventRecord {
    fn from(event: TicketEvent) -> Self {
        Self {
            id: event.id,
            ticket_id: event.ticket_id,
            event_type: event.kind.name().to_string(),
            actor_id: event.actor_id,
            actor_party: event.actor_party,
            created_at: event.created_at,
            payload: Json(event.kind),
        }
    }
}

pub struct TicketQueries;

#[Object(name = "Query", extends)]
impl TicketQueries {
    /// Get a single ticket by ID
    async fn ticket(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine.ticket(id).await?;
        Ok(ticket)
    }

    /// Full event log for a ticket, oldest first
    async fn ticket_events(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<Vec<EventRecord>> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let events = engine.events(id).await?;
        Ok(events.into_iter().map(EventRecord::from).collect())
    }

    /// Turn-taking history derived from the event log
    async fn ticket_exchanges(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<Vec<Exchange>> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let exchanges = engine.exchanges(id).await?;
        Ok(exchanges)
    }

    /// SLA compliance report, computed as of now
    async fn ticket_sla(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<SlaReport> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let report = engine.sla_report(id, Utc::now()).await?;
        Ok(report)
    }
}

pub struct TicketMutations;

#[Object(name = "Mutation", extends)]
impl TicketMutations {
    /// Open a new ticket
    async fn create_ticket(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        input: CreateTicketInput,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .create_ticket(Actor::new(actor_id, actor_role), input)
            .await?;
        Ok(ticket)
    }

    /// Apply a generic status transition (admins/managers only)
    async fn transition_ticket(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        id: Uuid,
        new_status: TicketStatus,
        notes: Option<String>,
        expected_version: Option<i64>,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .transition(
                id,
                Actor::new(actor_id, actor_role),
                new_status,
                notes,
                expected_version,
            )
            .await?;
        Ok(ticket)
    }

    /// Assign the ticket to a department member
    async fn assign_ticket(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        id: Uuid,
        assigned_to: Uuid,
        expected_version: Option<i64>,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .assign(id, Actor::new(actor_id, actor_role), assigned_to, expected_version)
            .await?;
        Ok(ticket)
    }

    /// Add a comment; external comments from the owed party close the turn
    async fn add_ticket_comment(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        id: Uuid,
        input: AddCommentInput,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .add_comment(id, Actor::new(actor_id, actor_role), input)
            .await?;
        Ok(ticket)
    }

    /// Submit a quote to the customer (department side, RFQ only)
    async fn submit_quote(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        id: Uuid,
        input: SubmitQuoteInput,
        expected_version: Option<i64>,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .submit_quote(id, Actor::new(actor_id, actor_role), input, expected_version)
            .await?;
        Ok(ticket)
    }

    /// Ask for the quote to be reworked (creator side)
    async fn request_adjustment(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        id: Uuid,
        notes: Option<String>,
        expected_version: Option<i64>,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .request_adjustment(id, Actor::new(actor_id, actor_role), notes, expected_version)
            .await?;
        Ok(ticket)
    }

    /// Record that the quote was forwarded externally (audit trail only)
    async fn quote_sent_to_customer(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .quote_sent_to_customer(id, Actor::new(actor_id, actor_role), expected_version)
            .await?;
        Ok(ticket)
    }

    /// Close out the quotation as won (creator side)
    async fn mark_won(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        id: Uuid,
        expected_version: Option<i64>,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .mark_won(id, Actor::new(actor_id, actor_role), expected_version)
            .await?;
        Ok(ticket)
    }

    /// Close out the quotation as lost, with reason and competitor details
    async fn mark_lost(
        &self,
        ctx: &Context<'_>,
        actor_id: Uuid,
        actor_role: Role,
        id: Uuid,
        input: MarkLostInput,
        expected_version: Option<i64>,
    ) -> GraphQLResult<Ticket> {
        let engine = ctx.data::<Arc<TicketEngine>>()?;
        let ticket = engine
            .mark_lost(id, Actor::new(actor_id, actor_role), input, expected_version)
            .await?;
        Ok(ticket)
    }
}
