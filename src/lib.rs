//! # freightdesk-tickets
//!
//! Ticket lifecycle and SLA tracking engine for freight forwarding CRMs.
//!
//! ## Features
//!
//! - **Transition Guard** - guarded state machine over eight ticket statuses
//!   with role capabilities and RFQ business actions (quote, adjustment,
//!   won/lost)
//! - **Append-Only Event Log** - every mutation is an event; the ticket
//!   aggregate is a replayable fold of its log
//! - **Exchange Reconstruction** - turn-taking attribution between creator
//!   and assignee, with per-response latency
//! - **SLA Tracking** - first-response, first-quote and resolution
//!   compliance against configurable thresholds and business-hours calendars
//! - **GraphQL API** - queries and mutations for ticket management
//!
//! ## Usage
//!
//! ### In a Service
//!
//! ```rust,no_run
//! use freightdesk_tickets::{StaticPolicyProvider, TicketEngine, TicketQueries, TicketMutations};
//! use std::sync::Arc;
//!
//! # fn example() {
//! let policies = Arc::new(StaticPolicyProvider::new());
//! let engine = Arc::new(TicketEngine::new(policies));
//!
//! // Add to GraphQL context
//! // Schema::build(QueryRoot, MutationRoot, EmptySubscription)
//! //     .data(engine)
//! //     .finish()
//! # }
//! ```
//!
//! ### Models
//!
//! ```rust
//! use freightdesk_tickets::{CreateTicketInput, TicketType, TicketPriority};
//!
//! let input = CreateTicketInput {
//!     ticket_type: TicketType::Rfq,
//!     department: "ocean-freight".to_string(),
//!     priority: TicketPriority::High,
//!     subject: "FOB Shanghai -> Rotterdam, 2x40HC".to_string(),
//!     description: "Need spot rate, cargo ready week 34".to_string(),
//!     assigned_to: None,
//! };
//! ```

pub mod engine;
pub mod exchange;
pub mod graphql;
pub mod guard;
pub mod models;
pub mod policy;
pub mod sla;

// Re-export commonly used types
pub use engine::TicketEngine;
pub use graphql::{TicketMutations, TicketQueries};
pub use models::*;
pub use policy::{BusinessCalendar, SlaPolicy, SlaPolicySource, StaticPolicyProvider};
pub use sla::{SlaDimension, SlaReport};

use thiserror::Error;

/// Ticket engine errors. Everything except `PolicyMissing` is surfaced to
/// the caller unmodified; `PolicyMissing` is absorbed by the SLA calculator,
/// which degrades the report instead.
#[derive(Error, Debug)]
pub enum TicketError {
    #[error("invalid transition: {to} is not reachable from {from}")]
    InvalidTransition {
        from: models::TicketStatus,
        to: models::TicketStatus,
    },

    #[error("{action} is not available while status is {current}: requires {required}")]
    InvalidState {
        action: &'static str,
        current: models::TicketStatus,
        required: &'static str,
    },

    #[error("actor {actor_id} ({role}) lacks the {capability} capability")]
    Forbidden {
        actor_id: uuid::Uuid,
        role: models::Role,
        capability: &'static str,
    },

    #[error("version conflict: expected {expected}, ticket is at {actual}")]
    Conflict { expected: i64, actual: i64 },

    #[error("ticket not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("no SLA policy configured for ({department}, {ticket_type})")]
    PolicyMissing {
        department: String,
        ticket_type: models::TicketType,
    },
}

pub type Result<T> = std::result::Result<T, TicketError>;
