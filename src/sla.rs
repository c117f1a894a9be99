//! SLA compliance computation.
//!
//! Pure read-side: given the aggregate, the reconstructed exchanges and the
//! (optional) policy, produce the compliance report as of `now`. A missing
//! policy degrades to null thresholds instead of failing - SLA visibility is
//! never allowed to block a ticket.

use async_graphql::SimpleObject;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Exchange, ResponderType, Ticket, TicketType};
use crate::policy::{elapsed_business_seconds, BusinessCalendar, SlaPolicy};

/// One independently timed SLA dimension (first-response, first-quote,
/// resolution).
#[derive(Debug, Clone, Copy, Serialize, SimpleObject)]
pub struct SlaDimension {
    /// When the dimension was satisfied, if ever.
    pub at: Option<DateTime<Utc>>,
    pub threshold_seconds: Option<i64>,
    /// Some(true/false) once `at` is set; None while open.
    pub met: Option<bool>,
    /// Still open and inside the threshold.
    pub pending: bool,
    /// Still open and past the threshold.
    pub breached: bool,
}

/// Mean response latency per responder type, for leaderboards and
/// department comparisons.
#[derive(Debug, Clone, Copy, Serialize, SimpleObject)]
pub struct ResponderMetrics {
    pub responses: i64,
    pub avg_business_response_seconds: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, SimpleObject)]
pub struct ExchangeMetrics {
    pub creator: ResponderMetrics,
    pub assignee: ResponderMetrics,
}

#[derive(Debug, Clone, Serialize, SimpleObject)]
pub struct SlaReport {
    pub ticket_id: Uuid,
    /// Wall time since creation, formatted `Nd Nh Nm`.
    pub age: String,
    pub first_response: SlaDimension,
    /// RFQ tickets only.
    pub first_quote: Option<SlaDimension>,
    pub resolution: SlaDimension,
    /// Any dimension past its deadline without being satisfied.
    pub is_breached: bool,
    pub metrics: ExchangeMetrics,
    pub exchanges: Vec<Exchange>,
}

fn dimension(
    start: DateTime<Utc>,
    at: Option<DateTime<Utc>>,
    threshold_seconds: Option<i64>,
    calendar: Option<&BusinessCalendar>,
    now: DateTime<Utc>,
) -> SlaDimension {
    let Some(threshold) = threshold_seconds else {
        // No policy: report what happened but judge nothing.
        return SlaDimension {
            at,
            threshold_seconds: None,
            met: None,
            pending: false,
            breached: false,
        };
    };
    match at {
        Some(at) => SlaDimension {
            at: Some(at),
            threshold_seconds: Some(threshold),
            met: Some(elapsed_business_seconds(calendar, start, at) <= threshold),
            pending: false,
            breached: false,
        },
        None => {
            let elapsed = elapsed_business_seconds(calendar, start, now);
            SlaDimension {
                at: None,
                threshold_seconds: Some(threshold),
                met: None,
                pending: elapsed <= threshold,
                breached: elapsed > threshold,
            }
        }
    }
}

fn responder_metrics(exchanges: &[Exchange], responder_type: ResponderType) -> ResponderMetrics {
    let latencies: Vec<i64> = exchanges
        .iter()
        .filter(|e| e.responder_type == responder_type)
        .map(|e| e.business_response_seconds)
        .collect();
    let responses = latencies.len() as i64;
    let avg = (responses > 0)
        .then(|| latencies.iter().sum::<i64>() as f64 / responses as f64);
    ResponderMetrics {
        responses,
        avg_business_response_seconds: avg,
    }
}

/// Format a wall-clock age as `Nd Nh Nm`.
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes().max(0);
    format!(
        "{}d {}h {}m",
        minutes / (24 * 60),
        (minutes / 60) % 24,
        minutes % 60
    )
}

/// Build the compliance report for one ticket as of `now`.
pub fn build_report(
    ticket: &Ticket,
    exchanges: Vec<Exchange>,
    policy: Option<&SlaPolicy>,
    now: DateTime<Utc>,
) -> SlaReport {
    let calendar = policy.and_then(|p| p.calendar.as_ref());
    let start = ticket.created_at;

    let first_response = dimension(
        start,
        ticket.first_response_at,
        policy.map(|p| p.first_response_threshold_seconds),
        calendar,
        now,
    );
    let first_quote = (ticket.ticket_type == TicketType::Rfq).then(|| {
        dimension(
            start,
            ticket.first_quote_at,
            policy.and_then(|p| p.first_quote_threshold_seconds),
            calendar,
            now,
        )
    });
    let resolution = dimension(
        start,
        ticket.resolved_at,
        policy.map(|p| p.resolution_threshold_seconds),
        calendar,
        now,
    );

    let is_breached = first_response.breached
        || resolution.breached
        || first_quote.map(|d| d.breached).unwrap_or(false);

    SlaReport {
        ticket_id: ticket.id,
        age: format_age(now - start),
        first_response,
        first_quote,
        resolution,
        is_breached,
        metrics: ExchangeMetrics {
            creator: responder_metrics(&exchanges, ResponderType::Creator),
            assignee: responder_metrics(&exchanges, ResponderType::Assignee),
        },
        exchanges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TicketOpened, TicketPriority};
    use chrono::TimeZone;

    fn policy() -> SlaPolicy {
        SlaPolicy {
            first_response_threshold_seconds: 4 * 3600,
            first_quote_threshold_seconds: Some(24 * 3600),
            resolution_threshold_seconds: 48 * 3600,
            calendar: None,
        }
    }

    fn ticket_at(t0: DateTime<Utc>, ticket_type: TicketType) -> Ticket {
        let opened = TicketOpened {
            ticket_type,
            department: "ocean-freight".to_string(),
            priority: TicketPriority::High,
            subject: "Rate request".to_string(),
            description: String::new(),
            created_by: Uuid::new_v4(),
            assigned_to: Some(Uuid::new_v4()),
        };
        Ticket::opened(Uuid::new_v4(), &opened, t0)
    }

    #[test]
    fn first_response_within_threshold_is_met() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let mut ticket = ticket_at(t0, TicketType::Rfq);
        ticket.first_response_at = Some(t0 + Duration::hours(3));

        let report = build_report(&ticket, vec![], Some(&policy()), t0 + Duration::hours(6));
        assert_eq!(report.first_response.met, Some(true));
        assert_eq!(report.first_response.at, Some(t0 + Duration::hours(3)));
        assert!(!report.first_response.pending);
        assert!(!report.is_breached);
    }

    #[test]
    fn missing_response_past_threshold_breaches() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let ticket = ticket_at(t0, TicketType::Rfq);

        let report = build_report(&ticket, vec![], Some(&policy()), t0 + Duration::hours(5));
        assert!(report.first_response.breached);
        assert!(!report.first_response.pending);
        assert_eq!(report.first_response.met, None);
        assert!(report.is_breached);
    }

    #[test]
    fn open_ticket_inside_threshold_is_pending() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let ticket = ticket_at(t0, TicketType::Rfq);

        let report = build_report(&ticket, vec![], Some(&policy()), t0 + Duration::hours(2));
        assert!(report.first_response.pending);
        assert!(!report.is_breached);
    }

    #[test]
    fn late_response_is_not_met_but_not_breached() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let mut ticket = ticket_at(t0, TicketType::Rfq);
        ticket.first_response_at = Some(t0 + Duration::hours(7));

        let report = build_report(&ticket, vec![], Some(&policy()), t0 + Duration::hours(8));
        assert_eq!(report.first_response.met, Some(false));
        assert!(!report.first_response.breached);
        // Breach flags only dimensions still missing their timestamp.
        assert!(!report.is_breached);
    }

    #[test]
    fn gen_tickets_have_no_first_quote_dimension() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let ticket = ticket_at(t0, TicketType::Gen);
        let report = build_report(&ticket, vec![], Some(&policy()), t0 + Duration::hours(1));
        assert!(report.first_quote.is_none());
    }

    #[test]
    fn missing_policy_degrades_gracefully() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let ticket = ticket_at(t0, TicketType::Rfq);

        let report = build_report(&ticket, vec![], None, t0 + Duration::days(30));
        assert_eq!(report.first_response.threshold_seconds, None);
        assert_eq!(report.resolution.threshold_seconds, None);
        assert!(!report.is_breached);
    }

    #[test]
    fn metrics_average_per_responder() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let ticket = ticket_at(t0, TicketType::Rfq);
        let exchanges = vec![
            Exchange {
                responder_type: ResponderType::Assignee,
                exchange_number: 1,
                business_response_seconds: 3600,
            },
            Exchange {
                responder_type: ResponderType::Creator,
                exchange_number: 1,
                business_response_seconds: 7200,
            },
            Exchange {
                responder_type: ResponderType::Assignee,
                exchange_number: 2,
                business_response_seconds: 1800,
            },
        ];

        let report = build_report(&ticket, exchanges, Some(&policy()), t0 + Duration::hours(1));
        assert_eq!(report.metrics.assignee.responses, 2);
        assert_eq!(report.metrics.assignee.avg_business_response_seconds, Some(2700.0));
        assert_eq!(report.metrics.creator.responses, 1);
        assert_eq!(report.metrics.creator.avg_business_response_seconds, Some(7200.0));
    }

    #[test]
    fn age_formats_days_hours_minutes() {
        assert_eq!(format_age(Duration::minutes(0)), "0d 0h 0m");
        assert_eq!(
            format_age(Duration::days(3) + Duration::hours(4) + Duration::minutes(12)),
            "3d 4h 12m"
        );
    }
}
