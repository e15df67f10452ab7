use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{self, TimeError, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotStatus {
    Open,
    Confirmed,
    Cancelled,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Open => "Open",
            SlotStatus::Confirmed => "Confirmed",
            SlotStatus::Cancelled => "Cancelled",
        }
    }

    /// Case-insensitive parse of a single status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Some(SlotStatus::Open),
            "confirmed" => Some(SlotStatus::Confirmed),
            "cancelled" | "canceled" => Some(SlotStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    Pending,
    Approved,
    Denied,
}

/// Opaque per-row tag for compare-and-swap writes. Bumped on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionTag(pub u64);

impl VersionTag {
    pub const INITIAL: VersionTag = VersionTag(1);

    pub fn next(self) -> VersionTag {
        VersionTag(self.0 + 1)
    }
}

impl std::fmt::Display for VersionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "W/\"{}\"", self.0)
    }
}

/// Storage address of a row: partition + row key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    pub partition: String,
    pub row: String,
}

impl RowKey {
    pub fn new(partition: impl Into<String>, row: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            row: row.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// One offered game opportunity.
///
/// Date and time fields are kept as the strings they were written with: rows
/// created by older writers or bulk loads may be malformed, so every consumer
/// re-parses them through [`Slot::time_range`] / [`Slot::parsed_game_date`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub slot_id: String,
    pub league_id: String,
    pub division: String,
    pub offering_team_id: String,
    pub offering_contact: Contact,
    pub game_date: String,
    pub start_time: String,
    pub end_time: String,
    pub field_key: String,
    pub park_name: Option<String>,
    pub field_name: Option<String>,
    pub display_name: Option<String>,
    pub game_type: Option<String>,
    pub notes: Option<String>,
    pub status: SlotStatus,
    pub confirmed_team_id: Option<String>,
    pub confirmed_request_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn time_range(&self) -> Result<TimeRange, TimeError> {
        TimeRange::parse(&self.start_time, &self.end_time)
    }

    pub fn parsed_game_date(&self) -> Result<NaiveDate, TimeError> {
        time::parse_game_date(&self.game_date)
    }

    /// True if `team_id` is either side of this slot.
    pub fn involves_team(&self, team_id: &str) -> bool {
        self.offering_team_id == team_id || self.confirmed_team_id.as_deref() == Some(team_id)
    }
}

/// One team's attempt to take a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub request_id: String,
    pub league_id: String,
    pub division: String,
    pub slot_id: String,
    pub requesting_team_id: String,
    pub requesting_contact: Contact,
    pub requested_by: String,
    pub notes: Option<String>,
    pub status: ClaimStatus,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// The WAL record format: full row snapshots with the tag they were written at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SlotWritten {
        key: RowKey,
        version: VersionTag,
        slot: Slot,
    },
    ClaimWritten {
        key: RowKey,
        version: VersionTag,
        claim: Claim,
    },
}

impl Event {
    pub fn division(&self) -> &str {
        match self {
            Event::SlotWritten { slot, .. } => &slot.division,
            Event::ClaimWritten { claim, .. } => &claim.division,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// A confirmed booking that blocks a requested time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConflict {
    /// The team whose schedule collides.
    pub team_id: String,
    pub slot_id: String,
    pub division: String,
    pub game_date: String,
    pub start_time: String,
    pub end_time: String,
    pub offering_team_id: String,
    pub confirmed_team_id: Option<String>,
}

/// Outcome of a successful claim or approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResult {
    pub request_id: String,
    pub status: ClaimStatus,
    pub slot_status: SlotStatus,
    pub confirmed_team_id: Option<String>,
}
