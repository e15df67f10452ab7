use chrono::NaiveDate;

use crate::model::*;
use crate::time::TimeRange;

use super::{Engine, EngineError, SlotFilter};

/// First confirmed slot in `candidates` that puts `team_id` on the field during
/// `range`. Rows with unparseable times are skipped, not treated as conflicts.
pub fn first_conflict<'a>(
    candidates: impl IntoIterator<Item = &'a Slot>,
    team_id: &str,
    range: &TimeRange,
    exclude_slot_id: &str,
) -> Option<SlotConflict> {
    for other in candidates {
        if other.slot_id == exclude_slot_id || other.status != SlotStatus::Confirmed {
            continue;
        }
        if !other.involves_team(team_id) {
            continue;
        }
        let other_range = match other.time_range() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(slot = %other.slot_id, "skipping slot with bad times: {e}");
                continue;
            }
        };
        if range.overlaps(&other_range) {
            return Some(SlotConflict {
                team_id: team_id.to_string(),
                slot_id: other.slot_id.clone(),
                division: other.division.clone(),
                game_date: other.game_date.clone(),
                start_time: other.start_time.clone(),
                end_time: other.end_time.clone(),
                offering_team_id: other.offering_team_id.clone(),
                confirmed_team_id: other.confirmed_team_id.clone(),
            });
        }
    }
    None
}

impl Engine {
    /// Scan the league's confirmed slots on `date` (all divisions) for one
    /// that overlaps `range` and involves `team_id`.
    pub async fn find_conflict(
        &self,
        team_id: &str,
        date: NaiveDate,
        range: TimeRange,
        exclude_slot_id: &str,
    ) -> Result<Option<SlotConflict>, EngineError> {
        let same_day = self
            .scan_slots(&[
                SlotFilter::StatusIn(vec![SlotStatus::Confirmed]),
                SlotFilter::GameDate(date),
            ])
            .await;
        Ok(first_conflict(
            same_day.iter().map(|l| &l.row),
            team_id,
            &range,
            exclude_slot_id,
        ))
    }

    /// Check both sides of a prospective booking. Fails `DOUBLE_BOOKING` with
    /// one entry per colliding team.
    pub(super) async fn ensure_no_double_booking(
        &self,
        slot: &Slot,
        claiming_team_id: &str,
    ) -> Result<(), EngineError> {
        let date = slot.parsed_game_date()?;
        let range = slot.time_range()?;

        let mut conflicts = Vec::new();
        for team in [slot.offering_team_id.as_str(), claiming_team_id] {
            if let Some(c) = self.find_conflict(team, date, range, &slot.slot_id).await? {
                conflicts.push(c);
            }
        }
        if conflicts.is_empty() {
            Ok(())
        } else {
            tracing::info!(
                slot = %slot.slot_id,
                team = claiming_team_id,
                conflicts = conflicts.len(),
                "double booking blocked"
            );
            Err(EngineError::DoubleBooking(conflicts))
        }
    }
}
