//! Per-(team, game date) booking versions.
//!
//! Every confirmation bumps the entry of both teams on the slot's date while
//! holding their locks, and the slot write happens under the same locks. A
//! claim records the versions it saw before its conflict scan; if they still
//! match at confirm time, no booking for either team on that date landed in
//! between and the scan result stands.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::{Slot, VersionTag};
use crate::time;

/// Version of a team-day nobody has booked yet.
const UNBOOKED: VersionTag = VersionTag(0);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(super) struct TeamDay {
    team_id: String,
    game_date: String,
}

#[derive(Debug, Clone)]
struct Seen {
    day: TeamDay,
    version: VersionTag,
}

/// The versions one claim observed, taken before its conflict scan.
#[derive(Debug, Clone)]
pub(super) struct ScheduleRead {
    seen: Vec<Seen>,
    /// Whether a moved version must be re-validated by a fresh conflict scan.
    pub(super) enforce: bool,
}

impl ScheduleRead {
    /// Same versions, but a moved one is not re-checked for overlaps.
    pub(super) fn unenforced(mut self) -> Self {
        self.enforce = false;
        self
    }
}

/// Locks on every team-day of one confirmation, in key order.
pub(super) struct HeldDays {
    held: Vec<(Seen, OwnedMutexGuard<VersionTag>)>,
}

impl HeldDays {
    /// True if no other confirmation touched these teams on this date since the read.
    pub(super) fn unchanged(&self) -> bool {
        self.held.iter().all(|(seen, guard)| **guard == seen.version)
    }

    /// Record a confirmation for every held team-day.
    pub(super) fn bump(mut self) {
        for (_, guard) in &mut self.held {
            **guard = guard.next();
        }
    }
}

#[derive(Default)]
pub(super) struct BookingLedger {
    days: DashMap<TeamDay, Arc<Mutex<VersionTag>>>,
}

impl BookingLedger {
    pub(super) fn new() -> Self {
        Self::default()
    }

    fn cell(&self, day: &TeamDay) -> Arc<Mutex<VersionTag>> {
        self.days
            .entry(day.clone())
            .or_insert_with(|| Arc::new(Mutex::new(UNBOOKED)))
            .clone()
    }

    /// Both sides of a prospective booking of `slot`, sorted so every caller
    /// locks them in the same order.
    fn days_of(slot: &Slot, claiming_team_id: &str) -> Vec<TeamDay> {
        let game_date = time::parse_game_date(&slot.game_date)
            .map(time::format_game_date)
            .unwrap_or_else(|_| slot.game_date.clone());
        let mut days: Vec<TeamDay> = [slot.offering_team_id.as_str(), claiming_team_id]
            .into_iter()
            .map(|team_id| TeamDay {
                team_id: team_id.to_string(),
                game_date: game_date.clone(),
            })
            .collect();
        days.sort();
        days.dedup();
        days
    }

    pub(super) async fn read(&self, slot: &Slot, claiming_team_id: &str) -> ScheduleRead {
        let mut seen = Vec::new();
        for day in Self::days_of(slot, claiming_team_id) {
            let version = *self.cell(&day).lock().await;
            seen.push(Seen { day, version });
        }
        ScheduleRead {
            seen,
            enforce: true,
        }
    }

    pub(super) async fn hold(&self, read: &ScheduleRead) -> HeldDays {
        let mut held = Vec::with_capacity(read.seen.len());
        for seen in &read.seen {
            let guard = self.cell(&seen.day).lock_owned().await;
            held.push((seen.clone(), guard));
        }
        HeldDays { held }
    }
}
