//! Ticket engine: per-ticket event log plus the cached aggregate projection.
//!
//! All mutations for a ticket are serialized behind its own
//! `tokio::sync::RwLock`, so two racing actions can never both succeed
//! against a stale status read. Reads clone a snapshot under the read lock;
//! the log is append-only, so a snapshot is always internally consistent.
//!
//! Side effects (notifications, documents) are the caller's concern; nothing
//! here blocks on external I/O.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::exchange::reconstruct;
use crate::guard;
use crate::models::{
    Actor, AddCommentInput, CreateTicketInput, Exchange, MarkLostInput, SubmitQuoteInput, Ticket,
    TicketEvent, TicketStatus,
};
use crate::policy::SlaPolicySource;
use crate::sla::{build_report, SlaReport};
use crate::{Result, TicketError};

struct TicketRecord {
    ticket: Ticket,
    events: Vec<TicketEvent>,
}

/// The engine owning every ticket's log and projection.
pub struct TicketEngine {
    policies: Arc<dyn SlaPolicySource>,
    tickets: RwLock<HashMap<Uuid, Arc<RwLock<TicketRecord>>>>,
}

impl TicketEngine {
    pub fn new(policies: Arc<dyn SlaPolicySource>) -> Self {
        Self {
            policies,
            tickets: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new ticket.
    pub async fn create_ticket(&self, actor: Actor, input: CreateTicketInput) -> Result<Ticket> {
        let (ticket, event) = guard::create_ticket(&input, actor, Utc::now());
        let snapshot = ticket.clone();
        tracing::info!(
            ticket_id = %ticket.id,
            department = %ticket.department,
            ticket_type = %ticket.ticket_type,
            "ticket created"
        );
        let record = TicketRecord {
            ticket,
            events: vec![event],
        };
        self.tickets
            .write()
            .await
            .insert(snapshot.id, Arc::new(RwLock::new(record)));
        Ok(snapshot)
    }

    async fn record(&self, ticket_id: Uuid) -> Result<Arc<RwLock<TicketRecord>>> {
        self.tickets
            .read()
            .await
            .get(&ticket_id)
            .cloned()
            .ok_or(TicketError::NotFound(ticket_id))
    }

    /// Run one guarded mutation under the ticket's write lock. The optional
    /// `expected_version` implements optimistic concurrency for callers that
    /// rendered against an older snapshot.
    async fn mutate<F>(
        &self,
        ticket_id: Uuid,
        expected_version: Option<i64>,
        f: F,
    ) -> Result<Ticket>
    where
        F: FnOnce(&mut Ticket) -> Result<TicketEvent>,
    {
        let record = self.record(ticket_id).await?;
        let mut record = record.write().await;
        if let Some(expected) = expected_version {
            if expected != record.ticket.version {
                return Err(TicketError::Conflict {
                    expected,
                    actual: record.ticket.version,
                });
            }
        }
        let event = f(&mut record.ticket)?;
        tracing::debug!(
            ticket_id = %ticket_id,
            event = event.kind.name(),
            status = %record.ticket.status,
            version = record.ticket.version,
            "ticket event applied"
        );
        record.events.push(event);
        Ok(record.ticket.clone())
    }

    pub async fn transition(
        &self,
        ticket_id: Uuid,
        actor: Actor,
        new_status: TicketStatus,
        notes: Option<String>,
        expected_version: Option<i64>,
    ) -> Result<Ticket> {
        self.mutate(ticket_id, expected_version, |ticket| {
            ticket.transition(new_status, actor, notes, Utc::now())
        })
        .await
    }

    pub async fn assign(
        &self,
        ticket_id: Uuid,
        actor: Actor,
        assigned_to: Uuid,
        expected_version: Option<i64>,
    ) -> Result<Ticket> {
        self.mutate(ticket_id, expected_version, |ticket| {
            ticket.assign(assigned_to, actor, Utc::now())
        })
        .await
    }

    pub async fn add_comment(
        &self,
        ticket_id: Uuid,
        actor: Actor,
        input: AddCommentInput,
    ) -> Result<Ticket> {
        self.mutate(ticket_id, None, |ticket| {
            ticket.add_comment(&input, actor, Utc::now())
        })
        .await
    }

    pub async fn submit_quote(
        &self,
        ticket_id: Uuid,
        actor: Actor,
        input: SubmitQuoteInput,
        expected_version: Option<i64>,
    ) -> Result<Ticket> {
        self.mutate(ticket_id, expected_version, |ticket| {
            ticket.submit_quote(&input, actor, Utc::now())
        })
        .await
    }

    pub async fn request_adjustment(
        &self,
        ticket_id: Uuid,
        actor: Actor,
        notes: Option<String>,
        expected_version: Option<i64>,
    ) -> Result<Ticket> {
        self.mutate(ticket_id, expected_version, |ticket| {
            ticket.request_adjustment(notes, actor, Utc::now())
        })
        .await
    }

    pub async fn quote_sent_to_customer(
        &self,
        ticket_id: Uuid,
        actor: Actor,
        expected_version: Option<i64>,
    ) -> Result<Ticket> {
        self.mutate(ticket_id, expected_version, |ticket| {
            ticket.quote_sent_to_customer(actor, Utc::now())
        })
        .await
    }

    pub async fn mark_won(
        &self,
        ticket_id: Uuid,
        actor: Actor,
        expected_version: Option<i64>,
    ) -> Result<Ticket> {
        self.mutate(ticket_id, expected_version, |ticket| {
            ticket.mark_won(actor, Utc::now())
        })
        .await
    }

    pub async fn mark_lost(
        &self,
        ticket_id: Uuid,
        actor: Actor,
        input: MarkLostInput,
        expected_version: Option<i64>,
    ) -> Result<Ticket> {
        self.mutate(ticket_id, expected_version, |ticket| {
            ticket.mark_lost(&input, actor, Utc::now())
        })
        .await
    }

    /// Current aggregate snapshot.
    pub async fn ticket(&self, ticket_id: Uuid) -> Result<Ticket> {
        let record = self.record(ticket_id).await?;
        let record = record.read().await;
        Ok(record.ticket.clone())
    }

    /// Full event log, oldest first.
    pub async fn events(&self, ticket_id: Uuid) -> Result<Vec<TicketEvent>> {
        let record = self.record(ticket_id).await?;
        let record = record.read().await;
        Ok(record.events.clone())
    }

    /// Exchange sequence reconstructed from the log, using the policy's
    /// calendar when one is configured.
    pub async fn exchanges(&self, ticket_id: Uuid) -> Result<Vec<Exchange>> {
        let (ticket, events) = self.snapshot(ticket_id).await?;
        let policy = self
            .policies
            .policy_for(&ticket.department, ticket.ticket_type)
            .await
            .ok();
        Ok(reconstruct(&events, policy.as_ref().and_then(|p| p.calendar.as_ref())))
    }

    /// SLA compliance report as of `now`. A missing policy degrades the
    /// report instead of failing.
    pub async fn sla_report(&self, ticket_id: Uuid, now: DateTime<Utc>) -> Result<SlaReport> {
        let (ticket, events) = self.snapshot(ticket_id).await?;
        let policy = match self
            .policies
            .policy_for(&ticket.department, ticket.ticket_type)
            .await
        {
            Ok(policy) => Some(policy),
            Err(TicketError::PolicyMissing { .. }) => {
                tracing::warn!(
                    ticket_id = %ticket_id,
                    department = %ticket.department,
                    "no SLA policy configured; reporting without thresholds"
                );
                None
            }
            Err(other) => return Err(other),
        };
        let exchanges = reconstruct(
            &events,
            policy.as_ref().and_then(|p| p.calendar.as_ref()),
        );
        Ok(build_report(&ticket, exchanges, policy.as_ref(), now))
    }

    async fn snapshot(&self, ticket_id: Uuid) -> Result<(Ticket, Vec<TicketEvent>)> {
        let record = self.record(ticket_id).await?;
        let record = record.read().await;
        Ok((record.ticket.clone(), record.events.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TicketPriority, TicketType};
    use crate::policy::{SlaPolicy, StaticPolicyProvider};
    use rust_decimal::Decimal;

    fn engine() -> TicketEngine {
        let provider = StaticPolicyProvider::new().with_policy(
            "ocean-freight",
            TicketType::Rfq,
            SlaPolicy {
                first_response_threshold_seconds: 4 * 3600,
                first_quote_threshold_seconds: Some(24 * 3600),
                resolution_threshold_seconds: 48 * 3600,
                calendar: None,
            },
        );
        TicketEngine::new(Arc::new(provider))
    }

    fn input() -> CreateTicketInput {
        CreateTicketInput {
            ticket_type: TicketType::Rfq,
            department: "ocean-freight".to_string(),
            priority: TicketPriority::High,
            subject: "Rate request".to_string(),
            description: String::new(),
            assigned_to: None,
        }
    }

    fn quote() -> SubmitQuoteInput {
        SubmitQuoteInput {
            amount: Decimal::new(500000, 2),
            currency: "USD".to_string(),
            terms: None,
        }
    }

    #[tokio::test]
    async fn unknown_ticket_is_not_found() {
        let engine = engine();
        let err = engine.ticket(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, TicketError::NotFound(_)));
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let engine = engine();
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let ops = Actor::new(Uuid::new_v4(), Role::Operations);

        let ticket = engine.create_ticket(customer, input()).await.unwrap();
        let stale = ticket.version;
        engine
            .assign(ticket.id, ops, ops.user_id, None)
            .await
            .unwrap();

        let err = engine
            .submit_quote(ticket.id, ops, quote(), Some(stale))
            .await
            .unwrap_err();
        assert!(matches!(err, TicketError::Conflict { .. }));
    }

    #[tokio::test]
    async fn quote_sent_checks_the_expected_version() {
        let engine = engine();
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let ops = Actor::new(Uuid::new_v4(), Role::Operations);

        let ticket = engine.create_ticket(customer, input()).await.unwrap();
        let stale = ticket.version;
        engine
            .assign(ticket.id, ops, ops.user_id, None)
            .await
            .unwrap();
        engine
            .submit_quote(ticket.id, ops, quote(), None)
            .await
            .unwrap();

        let err = engine
            .quote_sent_to_customer(ticket.id, customer, Some(stale))
            .await
            .unwrap_err();
        assert!(matches!(err, TicketError::Conflict { .. }));

        engine
            .quote_sent_to_customer(ticket.id, customer, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_quotes_cannot_both_succeed() {
        let engine = Arc::new(engine());
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let ops_a = Actor::new(Uuid::new_v4(), Role::Operations);
        let ops_b = Actor::new(Uuid::new_v4(), Role::Operations);

        let ticket = engine.create_ticket(customer, input()).await.unwrap();

        let (first, second) = tokio::join!(
            engine.submit_quote(ticket.id, ops_a, quote(), None),
            engine.submit_quote(ticket.id, ops_b, quote(), None),
        );
        let outcomes = [first, second];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loss = outcomes.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(
            loss,
            Err(TicketError::InvalidState { .. }) | Err(TicketError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn replaying_the_log_matches_the_projection() {
        let engine = engine();
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let ops = Actor::new(Uuid::new_v4(), Role::Operations);

        let ticket = engine.create_ticket(customer, input()).await.unwrap();
        engine
            .assign(ticket.id, ops, ops.user_id, None)
            .await
            .unwrap();
        engine
            .add_comment(
                ticket.id,
                ops,
                AddCommentInput {
                    content: "checking with the carrier".to_string(),
                    is_internal: true,
                },
            )
            .await
            .unwrap();
        engine
            .submit_quote(ticket.id, ops, quote(), None)
            .await
            .unwrap();
        engine
            .request_adjustment(ticket.id, customer, None, None)
            .await
            .unwrap();
        engine
            .submit_quote(ticket.id, ops, quote(), None)
            .await
            .unwrap();
        let live = engine.mark_won(ticket.id, customer, None).await.unwrap();

        let events = engine.events(ticket.id).await.unwrap();
        let replayed = Ticket::replay(&events).unwrap();
        assert_eq!(replayed, live);
    }

    #[tokio::test]
    async fn sla_report_reflects_the_quote_flow() {
        let engine = engine();
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let ops = Actor::new(Uuid::new_v4(), Role::Operations);

        let ticket = engine.create_ticket(customer, input()).await.unwrap();
        engine
            .assign(ticket.id, ops, ops.user_id, None)
            .await
            .unwrap();
        engine
            .submit_quote(ticket.id, ops, quote(), None)
            .await
            .unwrap();

        let report = engine.sla_report(ticket.id, Utc::now()).await.unwrap();
        assert_eq!(report.first_response.met, Some(true));
        assert!(report.first_quote.is_some());
        assert!(!report.is_breached);
        assert_eq!(report.metrics.assignee.responses, 1);
        assert_eq!(report.exchanges.len(), 1);
    }

    #[tokio::test]
    async fn report_without_policy_has_null_thresholds() {
        let engine = TicketEngine::new(Arc::new(StaticPolicyProvider::new()));
        let customer = Actor::new(Uuid::new_v4(), Role::Customer);
        let ticket = engine.create_ticket(customer, input()).await.unwrap();

        let report = engine.sla_report(ticket.id, Utc::now()).await.unwrap();
        assert_eq!(report.first_response.threshold_seconds, None);
        assert!(!report.is_breached);
    }
}
