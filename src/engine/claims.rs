use chrono::Utc;
use serde::Deserialize;
use ulid::Ulid;

use crate::identity::{Caller, LeagueRole};
use crate::limits::*;
use crate::model::*;
use crate::observability::{CLAIMS_TOTAL, CLAIM_DURATION_SECONDS, SWEEP_DENIALS_TOTAL};

use super::bookings::ScheduleRead;
use super::keys::{validate_id, KeyScheme};
use super::slots::clean;
use super::store::Located;
use super::{ClaimFilter, Engine, EngineError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub notes: Option<String>,
    pub requesting_contact: Option<Contact>,
}

fn outcome_label(result: &Result<ClaimResult, EngineError>) -> &'static str {
    match result {
        Ok(_) => "confirmed",
        Err(EngineError::DoubleBooking(_)) => "double_booking",
        Err(EngineError::NotOpen(_)) => "not_open",
        Err(EngineError::Conflict(_)) => "conflict",
        Err(e) if e.is_infrastructure() => "error",
        Err(_) => "rejected",
    }
}

/// Team id of a caller allowed to claim in `division`.
fn claiming_team<'a>(caller: &'a Caller, division: &str) -> Result<&'a str, EngineError> {
    if caller.role == LeagueRole::Viewer {
        return Err(EngineError::Forbidden("viewers cannot claim slots".into()));
    }
    let team = caller.team.as_ref().ok_or(EngineError::TeamRequired)?;
    if team.division != division {
        return Err(EngineError::DivisionMismatch {
            expected: division.to_string(),
            actual: team.division.clone(),
        });
    }
    Ok(&team.team_id)
}

impl Engine {
    /// Direct-confirm claim: validate, conflict-check, then confirm in one step.
    pub async fn claim_slot(
        &self,
        caller: &Caller,
        division: &str,
        slot_id: &str,
        request: ClaimRequest,
    ) -> Result<ClaimResult, EngineError> {
        let started = std::time::Instant::now();
        let result = self.claim_slot_inner(caller, division, slot_id, request).await;
        metrics::counter!(CLAIMS_TOTAL, "outcome" => outcome_label(&result)).increment(1);
        metrics::histogram!(CLAIM_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        result
    }

    async fn claim_slot_inner(
        &self,
        caller: &Caller,
        division: &str,
        slot_id: &str,
        request: ClaimRequest,
    ) -> Result<ClaimResult, EngineError> {
        let team_id = claiming_team(caller, division)?;
        if request.notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
            return Err(EngineError::LimitExceeded("notes too long"));
        }

        let slot = self
            .resolve_slot(division, slot_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("slot {division}/{slot_id}")))?;
        if slot.row.status != SlotStatus::Open {
            return Err(EngineError::NotOpen(slot.row.status));
        }
        if slot.row.offering_team_id == team_id {
            return Err(EngineError::SelfClaim);
        }
        // Rows from other writers may carry malformed dates or times.
        slot.row.parsed_game_date()?;
        slot.row.time_range()?;

        let schedule = self.bookings.read(&slot.row, team_id).await;
        self.ensure_no_double_booking(&slot.row, team_id).await?;

        let now = Utc::now();
        let claim = Claim {
            request_id: Ulid::new().to_string(),
            league_id: self.league_id().to_string(),
            division: slot.row.division.clone(),
            slot_id: slot.row.slot_id.clone(),
            requesting_team_id: team_id.to_string(),
            requesting_contact: request.requesting_contact.unwrap_or_default(),
            requested_by: caller.user_id.clone(),
            notes: clean(request.notes),
            status: ClaimStatus::Approved,
            requested_at: now,
            approved_at: Some(now),
            rejected_at: None,
            updated_at: now,
        };
        let claim = self.insert_claim(slot.scheme, claim).await?;
        self.confirm_slot(&slot, claim, &schedule).await
    }

    async fn insert_claim(&self, scheme: KeyScheme, claim: Claim) -> Result<Located<Claim>, EngineError> {
        let key = scheme.claim_key(
            self.league_id(),
            &claim.division,
            &claim.slot_id,
            &claim.request_id,
        );
        let written = self.insert_row(&self.claims, &key, claim).await?;
        Ok(Located {
            scheme,
            key,
            version: written.version,
            row: written.row,
        })
    }

    /// The one Open → Confirmed transition, shared by every entry point.
    ///
    /// `claim` must already be Approved and `schedule` must have been read
    /// before the caller's conflict scan. The slot is written while both
    /// teams' booking entries for its date are held; if either moved since
    /// `schedule` was read, the overlap scan is repeated under those locks.
    /// If the slot itself moved since `slot` was read, the claim is denied and
    /// `CONFLICT` returned, unless the slot now points at this very claim.
    pub(super) async fn confirm_slot(
        &self,
        slot: &Located<Slot>,
        claim: Located<Claim>,
        schedule: &ScheduleRead,
    ) -> Result<ClaimResult, EngineError> {
        let request_id = claim.row.request_id.clone();
        let team_id = claim.row.requesting_team_id.clone();

        let held = self.bookings.hold(schedule).await;
        if schedule.enforce && !held.unchanged() {
            tracing::debug!(slot = %slot.row.slot_id, team = %team_id, "team schedule moved, rechecking overlaps");
            if let Err(e) = self.ensure_no_double_booking(&slot.row, &team_id).await {
                drop(held);
                if let Some(done) = self.confirmed_to(slot, &request_id).await {
                    return Ok(done);
                }
                self.deny_losing_claim(&claim).await;
                return Err(e);
            }
        }

        let mut next = slot.row.clone();
        next.status = SlotStatus::Confirmed;
        next.confirmed_team_id = Some(team_id.clone());
        next.confirmed_request_id = Some(request_id.clone());
        next.updated_at = Utc::now();

        match self
            .compare_and_swap(&self.slots, &slot.key, slot.version, next)
            .await
        {
            Ok(confirmed) => {
                held.bump();
                tracing::info!(
                    slot = %confirmed.row.slot_id,
                    division = %confirmed.row.division,
                    team = %team_id,
                    request = %request_id,
                    "slot confirmed"
                );
                self.sweep_pending(&confirmed.row, &request_id).await;
                Ok(ClaimResult {
                    request_id,
                    status: ClaimStatus::Approved,
                    slot_status: confirmed.row.status,
                    confirmed_team_id: confirmed.row.confirmed_team_id,
                })
            }
            Err(EngineError::PreconditionFailed { .. }) => {
                drop(held);
                if let Some(done) = self.confirmed_to(slot, &request_id).await {
                    return Ok(done);
                }
                tracing::info!(slot = %slot.row.slot_id, request = %request_id, "lost confirm race");
                self.deny_losing_claim(&claim).await;
                Err(EngineError::Conflict("slot confirmed by another team".into()))
            }
            Err(e) => Err(e),
        }
    }

    /// Success result if the slot already points at `request_id`.
    async fn confirmed_to(&self, slot: &Located<Slot>, request_id: &str) -> Option<ClaimResult> {
        let current = self.slots.read(&slot.key).await?;
        if current.row.confirmed_request_id.as_deref() != Some(request_id) {
            return None;
        }
        Some(ClaimResult {
            request_id: request_id.to_string(),
            status: ClaimStatus::Approved,
            slot_status: current.row.status,
            confirmed_team_id: current.row.confirmed_team_id,
        })
    }

    async fn deny_losing_claim(&self, claim: &Located<Claim>) {
        if let Err(e) = self.deny_claim(claim).await {
            tracing::warn!(request = %claim.row.request_id, "could not deny losing claim: {e}");
        }
    }

    /// Mark one claim Denied with a version-checked write.
    pub(super) async fn deny_claim(&self, claim: &Located<Claim>) -> Result<(), EngineError> {
        let now = Utc::now();
        let mut next = claim.row.clone();
        next.status = ClaimStatus::Denied;
        next.rejected_at = Some(now);
        next.updated_at = now;
        self.compare_and_swap(&self.claims, &claim.key, claim.version, next)
            .await
            .map(|_| ())
    }

    /// Deny every other Pending claim of a confirmed slot. Best effort: the
    /// slot is already authoritative, so failures are logged and skipped.
    pub(super) async fn sweep_pending(&self, slot: &Slot, winner_request_id: &str) -> usize {
        let pending = self
            .scan_slot_claims(
                &slot.division,
                &slot.slot_id,
                &[ClaimFilter::Status(ClaimStatus::Pending)],
            )
            .await;
        let mut denied = 0;
        for claim in pending {
            if claim.row.request_id == winner_request_id {
                continue;
            }
            match self.deny_claim(&claim).await {
                Ok(()) => denied += 1,
                Err(e) => tracing::warn!(
                    slot = %slot.slot_id,
                    request = %claim.row.request_id,
                    "sweep could not deny pending claim: {e}"
                ),
            }
        }
        if denied > 0 {
            metrics::counter!(SWEEP_DENIALS_TOTAL).increment(denied as u64);
            tracing::info!(slot = %slot.slot_id, denied, "denied leftover pending claims");
        }
        denied
    }

    pub async fn list_claims(&self, division: &str, slot_id: &str) -> Result<Vec<Claim>, EngineError> {
        if self.resolve_slot(division, slot_id).await.is_none() {
            return Err(EngineError::NotFound(format!("slot {division}/{slot_id}")));
        }
        let mut claims: Vec<Claim> = self
            .scan_slot_claims(division, slot_id, &[])
            .await
            .into_iter()
            .map(|l| l.row)
            .collect();
        claims.sort_by(|a, b| {
            (a.requested_at, &a.request_id).cmp(&(b.requested_at, &b.request_id))
        });
        Ok(claims)
    }

    /// Legacy two-step request: record a Pending claim for later approval.
    pub async fn submit_pending_claim(
        &self,
        caller: &Caller,
        division: &str,
        slot_id: &str,
        request: ClaimRequest,
    ) -> Result<Claim, EngineError> {
        let team_id = claiming_team(caller, division)?;
        if request.notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
            return Err(EngineError::LimitExceeded("notes too long"));
        }
        let slot = self
            .resolve_slot(division, slot_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("slot {division}/{slot_id}")))?;
        if slot.row.status != SlotStatus::Open {
            return Err(EngineError::NotOpen(slot.row.status));
        }
        if slot.row.offering_team_id == team_id {
            return Err(EngineError::SelfClaim);
        }
        let already = self
            .scan_slot_claims(
                division,
                slot_id,
                &[
                    ClaimFilter::Status(ClaimStatus::Pending),
                    ClaimFilter::Team(team_id.to_string()),
                ],
            )
            .await;
        if !already.is_empty() {
            return Err(EngineError::Conflict(
                "team already has a pending request for this slot".into(),
            ));
        }

        let now = Utc::now();
        let claim = Claim {
            request_id: Ulid::new().to_string(),
            league_id: self.league_id().to_string(),
            division: slot.row.division.clone(),
            slot_id: slot.row.slot_id.clone(),
            requesting_team_id: team_id.to_string(),
            requesting_contact: request.requesting_contact.unwrap_or_default(),
            requested_by: caller.user_id.clone(),
            notes: clean(request.notes),
            status: ClaimStatus::Pending,
            requested_at: now,
            approved_at: None,
            rejected_at: None,
            updated_at: now,
        };
        Ok(self.insert_claim(slot.scheme, claim).await?.row)
    }

    /// Migration entry point: persist a claim row exactly as given under `scheme`.
    pub async fn import_claim(&self, scheme: KeyScheme, claim: Claim) -> Result<Claim, EngineError> {
        validate_id("division", &claim.division)?;
        validate_id("slotId", &claim.slot_id)?;
        validate_id("requestId", &claim.request_id)?;
        Ok(self.insert_claim(scheme, claim).await?.row)
    }
}
