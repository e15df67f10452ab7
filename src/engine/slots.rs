use chrono::Utc;
use serde::Deserialize;
use ulid::Ulid;

use crate::field::FieldKey;
use crate::identity::{Caller, LeagueRole};
use crate::limits::*;
use crate::model::*;
use crate::time::{self, TimeRange};

use super::keys::{validate_id, KeyScheme};
use super::{Engine, EngineError, SlotFilter};

/// Body of a slot offer. Every field is optional at the wire level so a
/// missing field surfaces as `VALIDATION` rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSlot {
    pub division: Option<String>,
    pub offering_team_id: Option<String>,
    pub offering_contact: Option<Contact>,
    pub game_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub field_key: Option<String>,
    pub game_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotPatch {
    pub game_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub field_key: Option<String>,
    pub game_type: Option<String>,
    pub notes: Option<String>,
    pub offering_contact: Option<Contact>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotListFilter {
    pub division: Option<String>,
    /// Comma-separated status names. Absent means Open + Confirmed.
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// Date, time and field values after validation.
struct Placement {
    game_date: String,
    start_time: String,
    end_time: String,
    field_key: String,
    park_name: String,
    field_name: String,
    display_name: String,
}

fn required<'a>(name: &str, value: &'a Option<String>) -> Result<&'a str, EngineError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(EngineError::Validation(format!("{name} is required"))),
    }
}

fn check_len(value: &Option<String>, max: usize, what: &'static str) -> Result<(), EngineError> {
    if value.as_ref().is_some_and(|v| v.len() > max) {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

fn check_contact(contact: &Contact) -> Result<(), EngineError> {
    for part in [&contact.name, &contact.email, &contact.phone] {
        check_len(part, MAX_CONTACT_FIELD_LEN, "contact field too long")?;
    }
    Ok(())
}

pub(super) fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn ensure_can_write(caller: &Caller) -> Result<(), EngineError> {
    if caller.role == LeagueRole::Viewer {
        return Err(EngineError::Forbidden("viewers cannot modify slots".into()));
    }
    Ok(())
}

impl Engine {
    /// Parse date and times, then resolve the field key against the directory.
    async fn place(
        &self,
        game_date: &str,
        start_time: &str,
        end_time: &str,
        field_key: &str,
    ) -> Result<Placement, EngineError> {
        let date = time::parse_game_date(game_date)?;
        let range = TimeRange::parse(start_time, end_time)?;
        let key = FieldKey::parse(field_key).ok_or_else(|| {
            EngineError::Validation(format!(
                "fieldKey must be parkCode/fieldCode, got {field_key:?}"
            ))
        })?;
        let info = self
            .fields
            .lookup(self.league_id(), &key)
            .await
            .map_err(|e| EngineError::Directory(e.to_string()))?
            .ok_or_else(|| EngineError::FieldNotFound(key.normalized()))?;
        if !info.is_active {
            return Err(EngineError::FieldInactive(key.normalized()));
        }
        Ok(Placement {
            game_date: time::format_game_date(date),
            start_time: time::format_minutes(range.start),
            end_time: time::format_minutes(range.end),
            field_key: key.normalized(),
            display_name: info.display_name(),
            park_name: info.park_name,
            field_name: info.field_name,
        })
    }

    pub async fn create_slot(&self, caller: &Caller, input: NewSlot) -> Result<Slot, EngineError> {
        ensure_can_write(caller)?;

        let division = required("division", &input.division)?.to_string();
        let offering_team_id = required("offeringTeamId", &input.offering_team_id)?.to_string();
        let game_date = required("gameDate", &input.game_date)?;
        let start_time = required("startTime", &input.start_time)?;
        let end_time = required("endTime", &input.end_time)?;
        let field_key = required("fieldKey", &input.field_key)?;
        validate_id("division", &division)?;
        validate_id("offeringTeamId", &offering_team_id)?;
        check_len(&input.notes, MAX_NOTES_LEN, "notes too long")?;
        check_len(&input.game_type, MAX_GAME_TYPE_LEN, "gameType too long")?;
        let contact = input.offering_contact.clone().unwrap_or_default();
        check_contact(&contact)?;

        if caller.role == LeagueRole::Coach && !caller.is_team(&division, &offering_team_id) {
            return Err(EngineError::TeamMismatch(format!(
                "coaches may only offer slots for their own team; {offering_team_id} in {division} is not yours"
            )));
        }

        let placement = self.place(game_date, start_time, end_time, field_key).await?;

        let now = Utc::now();
        let slot = Slot {
            slot_id: Ulid::new().to_string(),
            league_id: self.league_id().to_string(),
            division,
            offering_team_id,
            offering_contact: contact,
            game_date: placement.game_date,
            start_time: placement.start_time,
            end_time: placement.end_time,
            field_key: placement.field_key,
            park_name: Some(placement.park_name),
            field_name: Some(placement.field_name),
            display_name: Some(placement.display_name),
            game_type: clean(input.game_type),
            notes: clean(input.notes),
            status: SlotStatus::Open,
            confirmed_team_id: None,
            confirmed_request_id: None,
            created_by: caller.user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        let key = KeyScheme::Canonical.slot_key(self.league_id(), &slot.division, &slot.slot_id);
        let created = self.insert_row(&self.slots, &key, slot).await?;
        tracing::info!(
            slot = %created.row.slot_id,
            division = %created.row.division,
            team = %created.row.offering_team_id,
            "slot offered"
        );
        Ok(created.row)
    }

    /// Default visibility is Open + Confirmed; Cancelled only when asked for.
    pub async fn list_slots(&self, filter: &SlotListFilter) -> Result<Vec<Slot>, EngineError> {
        let statuses = match filter.status.as_deref().map(str::trim) {
            None | Some("") => vec![SlotStatus::Open, SlotStatus::Confirmed],
            Some(raw) => raw
                .split(',')
                .map(|s| {
                    SlotStatus::parse(s)
                        .ok_or_else(|| EngineError::Validation(format!("unknown status {s:?}")))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let mut filters = vec![SlotFilter::StatusIn(statuses)];
        if let Some(d) = filter.division.as_deref().filter(|d| !d.is_empty()) {
            filters.push(SlotFilter::Division(d.to_string()));
        }
        if let Some(from) = filter.date_from.as_deref().filter(|d| !d.is_empty()) {
            filters.push(SlotFilter::DateFrom(time::parse_game_date(from)?));
        }
        if let Some(to) = filter.date_to.as_deref().filter(|d| !d.is_empty()) {
            filters.push(SlotFilter::DateTo(time::parse_game_date(to)?));
        }

        let mut slots: Vec<Slot> = self
            .scan_slots(&filters)
            .await
            .into_iter()
            .map(|l| l.row)
            .collect();
        slots.sort_by(|a, b| {
            (&a.game_date, &a.start_time, &a.slot_id).cmp(&(&b.game_date, &b.start_time, &b.slot_id))
        });
        Ok(slots)
    }

    pub async fn patch_slot(
        &self,
        caller: &Caller,
        division: &str,
        slot_id: &str,
        patch: SlotPatch,
    ) -> Result<Slot, EngineError> {
        ensure_can_write(caller)?;
        let found = self
            .resolve_slot(division, slot_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("slot {division}/{slot_id}")))?;
        let current = &found.row;
        if !caller.is_admin() && !caller.is_team(&current.division, &current.offering_team_id) {
            return Err(EngineError::Forbidden(
                "only the offering team or an administrator may edit a slot".into(),
            ));
        }
        if current.status != SlotStatus::Open {
            return Err(EngineError::NotOpen(current.status));
        }
        check_len(&patch.notes, MAX_NOTES_LEN, "notes too long")?;
        check_len(&patch.game_type, MAX_GAME_TYPE_LEN, "gameType too long")?;
        if let Some(c) = &patch.offering_contact {
            check_contact(c)?;
        }

        let game_date = patch.game_date.as_deref().unwrap_or(&current.game_date);
        let start_time = patch.start_time.as_deref().unwrap_or(&current.start_time);
        let end_time = patch.end_time.as_deref().unwrap_or(&current.end_time);
        let field_key = patch.field_key.as_deref().unwrap_or(&current.field_key);
        let placement = self.place(game_date, start_time, end_time, field_key).await?;

        let mut next = current.clone();
        next.game_date = placement.game_date;
        next.start_time = placement.start_time;
        next.end_time = placement.end_time;
        next.field_key = placement.field_key;
        next.park_name = Some(placement.park_name);
        next.field_name = Some(placement.field_name);
        next.display_name = Some(placement.display_name);
        if patch.game_type.is_some() {
            next.game_type = clean(patch.game_type);
        }
        if patch.notes.is_some() {
            next.notes = clean(patch.notes);
        }
        if let Some(contact) = patch.offering_contact {
            next.offering_contact = contact;
        }
        next.updated_at = Utc::now();

        match self
            .compare_and_swap(&self.slots, &found.key, found.version, next)
            .await
        {
            Ok(written) => Ok(written.row),
            Err(EngineError::PreconditionFailed { .. }) => Err(EngineError::Conflict(
                "slot was modified concurrently; re-read and retry".into(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Idempotent: an already-cancelled slot is returned unchanged.
    pub async fn cancel_slot(
        &self,
        caller: &Caller,
        division: &str,
        slot_id: &str,
    ) -> Result<Slot, EngineError> {
        let found = self
            .resolve_slot(division, slot_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("slot {division}/{slot_id}")))?;
        let current = &found.row;

        let own_side = caller.is_team(&current.division, &current.offering_team_id)
            || current
                .confirmed_team_id
                .as_deref()
                .is_some_and(|t| caller.is_team(&current.division, t));
        if caller.role == LeagueRole::Viewer || !(caller.is_admin() || own_side) {
            return Err(EngineError::Forbidden(
                "only the offering team, the confirmed team or an administrator may cancel".into(),
            ));
        }
        if current.status == SlotStatus::Cancelled {
            return Ok(found.row);
        }

        let mut next = current.clone();
        next.status = SlotStatus::Cancelled;
        next.updated_at = Utc::now();
        match self
            .compare_and_swap(&self.slots, &found.key, found.version, next)
            .await
        {
            Ok(written) => {
                tracing::info!(slot = %slot_id, division = %division, by = %caller.user_id, "slot cancelled");
                Ok(written.row)
            }
            Err(EngineError::PreconditionFailed { .. }) => match self.slots.read(&found.key).await {
                Some(now) if now.row.status == SlotStatus::Cancelled => Ok(now.row),
                _ => Err(EngineError::Conflict(
                    "slot was modified concurrently; re-read and retry".into(),
                )),
            },
            Err(e) => Err(e),
        }
    }

    /// Migration entry point: persist a slot row exactly as given under `scheme`.
    pub async fn import_slot(&self, scheme: KeyScheme, slot: Slot) -> Result<Slot, EngineError> {
        validate_id("division", &slot.division)?;
        validate_id("slotId", &slot.slot_id)?;
        let key = scheme.slot_key(self.league_id(), &slot.division, &slot.slot_id);
        Ok(self.insert_row(&self.slots, &key, slot).await?.row)
    }
}
