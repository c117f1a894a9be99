//! Exchange reconstruction: derives the turn-taking history of a ticket from
//! its event log.
//!
//! The walk mirrors the aggregate fold's `pending_response_from` handling.
//! An event closes an exchange only when its actor is the owed party and the
//! event is an actionable response (external comment, quote submission,
//! adjustment request, won/lost mark). Internal notes, audit events and
//! generic status changes never close one.

use chrono::{DateTime, Utc};

use crate::models::{Exchange, EventKind, Party, ResponderType, TicketEvent};
use crate::policy::{elapsed_business_seconds, BusinessCalendar};

/// Reconstruct the ordered exchange sequence for one ticket's log.
///
/// `calendar` is the working-hours calendar from the ticket's SLA policy;
/// None falls back to wall-clock latency.
pub fn reconstruct(events: &[TicketEvent], calendar: Option<&BusinessCalendar>) -> Vec<Exchange> {
    let mut exchanges = Vec::new();
    // (owed party, moment the response became owed)
    let mut owed: Option<(Party, DateTime<Utc>)> = None;
    let mut created_at: Option<DateTime<Utc>> = None;
    let mut assigned = false;
    // Mirrors the fold: nothing can become owed while the ticket is
    // terminal.
    let mut terminal = false;
    // Per-responder 1-based counters: [creator, assignee]
    let mut counters = [0i32; 2];

    let emit = |owed: &mut Option<(Party, DateTime<Utc>)>,
                    at: DateTime<Utc>,
                    exchanges: &mut Vec<Exchange>,
                    counters: &mut [i32; 2]| {
        if let Some((party, since)) = owed.take() {
            let responder_type = ResponderType::from(party);
            let idx = match responder_type {
                ResponderType::Creator => 0,
                ResponderType::Assignee => 1,
            };
            counters[idx] += 1;
            exchanges.push(Exchange {
                responder_type,
                exchange_number: counters[idx],
                business_response_seconds: elapsed_business_seconds(calendar, since, at),
            });
        }
    };

    for event in events {
        let at = event.created_at;
        match &event.kind {
            EventKind::Created(opened) => {
                created_at = Some(at);
                assigned = opened.assigned_to.is_some();
                if assigned {
                    owed = Some((Party::Department, at));
                }
            }
            EventKind::Assigned { .. } => {
                assigned = true;
                if owed.is_none() && !terminal {
                    // The first-response clock runs from creation, not from
                    // whenever the department got around to assigning.
                    owed = Some((Party::Department, created_at.unwrap_or(at)));
                }
            }
            EventKind::CommentAdded { is_internal, .. } => {
                if !*is_internal && owed.map(|(p, _)| p) == Some(event.actor_party) {
                    emit(&mut owed, at, &mut exchanges, &mut counters);
                    owed = Some((event.actor_party.other(), at));
                }
            }
            EventKind::QuoteSubmitted { .. } => {
                if owed.map(|(p, _)| p) == Some(Party::Department) {
                    emit(&mut owed, at, &mut exchanges, &mut counters);
                }
                owed = Some((Party::Creator, at));
                terminal = false;
            }
            EventKind::AdjustmentRequested { .. } => {
                if owed.map(|(p, _)| p) == Some(Party::Creator) {
                    emit(&mut owed, at, &mut exchanges, &mut counters);
                }
                owed = Some((Party::Department, at));
                terminal = false;
            }
            EventKind::QuoteSentToCustomer => {
                // Audit event: no turn effect.
            }
            EventKind::MarkedWon | EventKind::MarkedLost { .. } => {
                if owed.map(|(p, _)| p) == Some(Party::Creator) {
                    emit(&mut owed, at, &mut exchanges, &mut counters);
                }
                owed = None;
                terminal = true;
            }
            EventKind::StatusChanged { to, .. } => {
                terminal = to.is_terminal();
                if terminal {
                    owed = None;
                } else if owed.is_none() && assigned {
                    // Reopened out of a terminal state.
                    owed = Some((Party::Department, at));
                }
            }
        }
    }

    exchanges
}
