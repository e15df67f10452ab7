//! Typed table queries: a partition range plus equality/range predicates.
//!
//! Predicates compare parsed values against row fields; nothing is ever
//! interpolated into a filter string.

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{Claim, ClaimStatus, RowKey, Slot, SlotStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionRange {
    Exact(String),
    Prefix(String),
}

impl PartitionRange {
    pub fn contains(&self, key: &RowKey) -> bool {
        match self {
            PartitionRange::Exact(p) => key.partition == *p,
            PartitionRange::Prefix(p) => key.partition.starts_with(p.as_str()),
        }
    }
}

pub trait Predicate<T> {
    fn matches(&self, row: &T) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotFilter {
    Division(String),
    StatusIn(Vec<SlotStatus>),
    /// Rows whose date does not parse never match a date predicate.
    GameDate(NaiveDate),
    DateFrom(NaiveDate),
    DateTo(NaiveDate),
}

impl Predicate<Slot> for SlotFilter {
    fn matches(&self, slot: &Slot) -> bool {
        match self {
            SlotFilter::Division(d) => slot.division == *d,
            SlotFilter::StatusIn(statuses) => statuses.contains(&slot.status),
            SlotFilter::GameDate(d) => slot.parsed_game_date().is_ok_and(|g| g == *d),
            SlotFilter::DateFrom(d) => slot.parsed_game_date().is_ok_and(|g| g >= *d),
            SlotFilter::DateTo(d) => slot.parsed_game_date().is_ok_and(|g| g <= *d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimFilter {
    Status(ClaimStatus),
    Team(String),
    ApprovedBefore(DateTime<Utc>),
}

impl Predicate<Claim> for ClaimFilter {
    fn matches(&self, claim: &Claim) -> bool {
        match self {
            ClaimFilter::Status(s) => claim.status == *s,
            ClaimFilter::Team(t) => claim.requesting_team_id == *t,
            ClaimFilter::ApprovedBefore(cutoff) => claim.approved_at.is_some_and(|t| t < *cutoff),
        }
    }
}

/// A partition range ANDed with any number of predicates.
#[derive(Debug, Clone)]
pub struct TableQuery<P> {
    pub partition: PartitionRange,
    pub predicates: Vec<P>,
}

impl<P> TableQuery<P> {
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: PartitionRange::Exact(partition.into()),
            predicates: Vec::new(),
        }
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            partition: PartitionRange::Prefix(prefix.into()),
            predicates: Vec::new(),
        }
    }

    pub fn filter(mut self, predicate: P) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn matches<T>(&self, key: &RowKey, row: &T) -> bool
    where
        P: Predicate<T>,
    {
        self.partition.contains(key) && self.predicates.iter().all(|p| p.matches(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Contact;

    fn slot(division: &str, date: &str, status: SlotStatus) -> Slot {
        let now = Utc::now();
        Slot {
            slot_id: "s1".into(),
            league_id: "lg".into(),
            division: division.into(),
            offering_team_id: "A".into(),
            offering_contact: Contact::default(),
            game_date: date.into(),
            start_time: "18:00".into(),
            end_time: "20:00".into(),
            field_key: "park/f1".into(),
            park_name: None,
            field_name: None,
            display_name: None,
            game_type: None,
            notes: None,
            status,
            confirmed_team_id: None,
            confirmed_request_id: None,
            created_by: "u1".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn exact_partition_vs_prefix() {
        let key = RowKey::new("SLOT|lg|10U", "s1");
        assert!(PartitionRange::Exact("SLOT|lg|10U".into()).contains(&key));
        assert!(!PartitionRange::Exact("SLOT|lg|10".into()).contains(&key));
        assert!(PartitionRange::Prefix("SLOT|lg|".into()).contains(&key));
        assert!(!PartitionRange::Prefix("SLOT|lg2|".into()).contains(&key));
    }

    #[test]
    fn predicates_are_anded() {
        let key = RowKey::new("SLOT|lg|10U", "s1");
        let row = slot("10U", "2026-04-10", SlotStatus::Confirmed);
        let q = TableQuery::prefix("SLOT|lg|")
            .filter(SlotFilter::StatusIn(vec![SlotStatus::Confirmed]))
            .filter(SlotFilter::GameDate(date("2026-04-10")));
        assert!(q.matches(&key, &row));

        let q = q.filter(SlotFilter::Division("12U".into()));
        assert!(!q.matches(&key, &row));
    }

    #[test]
    fn date_range_is_inclusive() {
        let row = slot("10U", "2026-04-10", SlotStatus::Open);
        assert!(SlotFilter::DateFrom(date("2026-04-10")).matches(&row));
        assert!(SlotFilter::DateTo(date("2026-04-10")).matches(&row));
        assert!(!SlotFilter::DateFrom(date("2026-04-11")).matches(&row));
    }

    #[test]
    fn malformed_dates_never_match() {
        let row = slot("10U", "April 10", SlotStatus::Open);
        assert!(!SlotFilter::GameDate(date("2026-04-10")).matches(&row));
        assert!(!SlotFilter::DateTo(date("2099-01-01")).matches(&row));
        assert!(SlotFilter::Division("10U".into()).matches(&row));
    }
}
