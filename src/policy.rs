//! SLA policy lookup and business-hours duration math.
//!
//! Policies are keyed by `(department, ticket_type)` and supplied by an
//! injectable [`SlaPolicySource`] so services can back them with whatever
//! configuration store they already run. [`StaticPolicyProvider`] covers the
//! in-process case and tests.
//!
//! Durations are measured in "business seconds": when a policy configures a
//! [`BusinessCalendar`], only time inside its weekly working windows counts;
//! without one, plain wall-clock seconds are used.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TicketType;
use crate::{Result, TicketError};

/// Weekly working windows, one optional `(open, close)` pair per weekday,
/// interpreted in UTC. Index 0 is Monday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessCalendar {
    windows: [Option<(NaiveTime, NaiveTime)>; 7],
}

impl BusinessCalendar {
    pub fn new(windows: [Option<(NaiveTime, NaiveTime)>; 7]) -> Self {
        Self { windows }
    }

    /// The common case: the same window Monday through Friday, weekends off.
    pub fn weekdays(open: NaiveTime, close: NaiveTime) -> Self {
        let mut windows = [None; 7];
        for slot in windows.iter_mut().take(5) {
            *slot = Some((open, close));
        }
        Self { windows }
    }

    /// Seconds of working time between `start` and `end`. Returns 0 when
    /// `end <= start`.
    pub fn business_seconds_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        if end <= start {
            return 0;
        }
        let mut total = 0i64;
        let mut day = start.date_naive();
        let last = end.date_naive();
        while day <= last {
            let idx = day.weekday().num_days_from_monday() as usize;
            if let Some((open, close)) = self.windows[idx] {
                let window_start = Utc.from_utc_datetime(&day.and_time(open));
                let window_end = Utc.from_utc_datetime(&day.and_time(close));
                let clamped_start = window_start.max(start);
                let clamped_end = window_end.min(end);
                if clamped_end > clamped_start {
                    total += (clamped_end - clamped_start).num_seconds();
                }
            }
            day = match day.succ_opt() {
                Some(d) => d,
                None => break,
            };
        }
        total
    }
}

/// Elapsed business seconds with wall-clock fallback when no calendar is
/// configured. Shared by the exchange reconstructor and the SLA calculator
/// so both measure latency identically.
pub fn elapsed_business_seconds(
    calendar: Option<&BusinessCalendar>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> i64 {
    match calendar {
        Some(calendar) => calendar.business_seconds_between(start, end),
        None => (end - start).num_seconds().max(0),
    }
}

/// Response and resolution thresholds for one `(department, ticket_type)`
/// combination. Thresholds are business seconds against `calendar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub first_response_threshold_seconds: i64,
    /// RFQ tickets only; None for ticket types without a quoting flow.
    pub first_quote_threshold_seconds: Option<i64>,
    pub resolution_threshold_seconds: i64,
    pub calendar: Option<BusinessCalendar>,
}

/// Where SLA policies come from. Implemented over the platform's config
/// store in production; [`StaticPolicyProvider`] in-process.
#[async_trait]
pub trait SlaPolicySource: Send + Sync {
    async fn policy_for(&self, department: &str, ticket_type: TicketType) -> Result<SlaPolicy>;
}

/// In-memory policy table keyed by `(department, ticket_type)`.
#[derive(Debug, Default)]
pub struct StaticPolicyProvider {
    policies: HashMap<(String, TicketType), SlaPolicy>,
}

impl StaticPolicyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(
        mut self,
        department: impl Into<String>,
        ticket_type: TicketType,
        policy: SlaPolicy,
    ) -> Self {
        self.policies.insert((department.into(), ticket_type), policy);
        self
    }
}

#[async_trait]
impl SlaPolicySource for StaticPolicyProvider {
    async fn policy_for(&self, department: &str, ticket_type: TicketType) -> Result<SlaPolicy> {
        self.policies
            .get(&(department.to_string(), ticket_type))
            .cloned()
            .ok_or_else(|| TicketError::PolicyMissing {
                department: department.to_string(),
                ticket_type,
            })
    }
}
