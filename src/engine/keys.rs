//! Row addressing and the canonical/legacy key migration shim.
//!
//! Rows written before league scoping live under the legacy partitions. Reads
//! try [`KeyScheme::LOOKUP_ORDER`] in turn and report which scheme matched so
//! later writes go back to the same key. Once old data has been migrated the
//! `Legacy` arm can be deleted without touching the workflows.

use crate::limits::MAX_ID_LEN;
use crate::model::RowKey;

use super::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScheme {
    /// `SLOT|{league}|{division}` / `SLOTREQ|{league}|{division}|{slot}`
    Canonical,
    /// `SLOT#{division}` / `SLOTREQ#{division}#{slot}`
    Legacy,
}

impl KeyScheme {
    pub const LOOKUP_ORDER: [KeyScheme; 2] = [KeyScheme::Canonical, KeyScheme::Legacy];

    pub fn slot_partition(self, league: &str, division: &str) -> String {
        match self {
            KeyScheme::Canonical => format!("SLOT|{league}|{division}"),
            KeyScheme::Legacy => format!("SLOT#{division}"),
        }
    }

    /// Prefix covering every slot partition of the league under this scheme.
    pub fn slot_league_prefix(self, league: &str) -> String {
        match self {
            KeyScheme::Canonical => format!("SLOT|{league}|"),
            KeyScheme::Legacy => "SLOT#".to_string(),
        }
    }

    pub fn claim_partition(self, league: &str, division: &str, slot_id: &str) -> String {
        match self {
            KeyScheme::Canonical => format!("SLOTREQ|{league}|{division}|{slot_id}"),
            KeyScheme::Legacy => format!("SLOTREQ#{division}#{slot_id}"),
        }
    }

    /// Prefix covering every claim partition of the league under this scheme.
    pub fn claim_league_prefix(self, league: &str) -> String {
        match self {
            KeyScheme::Canonical => format!("SLOTREQ|{league}|"),
            KeyScheme::Legacy => "SLOTREQ#".to_string(),
        }
    }

    pub fn slot_key(self, league: &str, division: &str, slot_id: &str) -> RowKey {
        RowKey::new(self.slot_partition(league, division), slot_id)
    }

    pub fn claim_key(self, league: &str, division: &str, slot_id: &str, request_id: &str) -> RowKey {
        RowKey::new(self.claim_partition(league, division, slot_id), request_id)
    }

    /// Which scheme wrote a slot partition.
    pub fn of_slot_partition(partition: &str) -> Option<KeyScheme> {
        if partition.starts_with("SLOT|") {
            Some(KeyScheme::Canonical)
        } else if partition.starts_with("SLOT#") {
            Some(KeyScheme::Legacy)
        } else {
            None
        }
    }

    /// Which scheme wrote a claim partition.
    pub fn of_claim_partition(partition: &str) -> Option<KeyScheme> {
        if partition.starts_with("SLOTREQ|") {
            Some(KeyScheme::Canonical)
        } else if partition.starts_with("SLOTREQ#") {
            Some(KeyScheme::Legacy)
        } else {
            None
        }
    }
}

/// Identifiers become key components, so separators and control characters
/// are rejected outright rather than escaped.
pub(crate) fn validate_id(name: &str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{name} is required")));
    }
    if value.len() > MAX_ID_LEN {
        return Err(EngineError::LimitExceeded("identifier too long"));
    }
    if value != value.trim()
        || value
            .chars()
            .any(|c| matches!(c, '|' | '#' | '/' | '\\' | '?') || c.is_control())
    {
        return Err(EngineError::Validation(format!(
            "{name} contains invalid characters"
        )));
    }
    Ok(())
}
