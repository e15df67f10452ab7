use chrono::Utc;

use crate::identity::{Caller, LeagueRole};
use crate::model::*;
use crate::observability::APPROVALS_TOTAL;

use super::{Engine, EngineError};

/// Who may approve a pending claim through the legacy path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// Anyone in the league.
    Membership,
    /// The offering team's coach or an administrator.
    OfferingCoach,
}

impl ApprovalPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "membership" | "member" => Some(ApprovalPolicy::Membership),
            "offering_coach" | "offering-coach" | "offeringcoach" => {
                Some(ApprovalPolicy::OfferingCoach)
            }
            _ => None,
        }
    }

    fn permits(self, caller: &Caller, slot: &Slot) -> bool {
        if caller.role == LeagueRole::Viewer {
            return false;
        }
        match self {
            ApprovalPolicy::Membership => true,
            ApprovalPolicy::OfferingCoach => {
                caller.is_admin() || caller.is_team(&slot.division, &slot.offering_team_id)
            }
        }
    }
}

impl Engine {
    /// Legacy approval of one specific pending claim.
    pub async fn approve_claim(
        &self,
        caller: &Caller,
        division: &str,
        slot_id: &str,
        request_id: &str,
    ) -> Result<ClaimResult, EngineError> {
        let result = self
            .approve_claim_inner(caller, division, slot_id, request_id)
            .await;
        let outcome = match &result {
            Ok(_) => "approved",
            Err(e) if e.is_infrastructure() => "error",
            Err(_) => "rejected",
        };
        metrics::counter!(APPROVALS_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn approve_claim_inner(
        &self,
        caller: &Caller,
        division: &str,
        slot_id: &str,
        request_id: &str,
    ) -> Result<ClaimResult, EngineError> {
        if caller.league_id != self.league_id() {
            return Err(EngineError::Forbidden("not a member of this league".into()));
        }
        let slot = self
            .resolve_slot(division, slot_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("slot {division}/{slot_id}")))?;
        if !self.settings.approval_policy.permits(caller, &slot.row) {
            return Err(EngineError::Forbidden(
                "caller may not approve requests for this slot".into(),
            ));
        }

        match slot.row.status {
            SlotStatus::Cancelled => return Err(EngineError::Cancelled),
            SlotStatus::Confirmed => {
                return if slot.row.confirmed_request_id.as_deref() == Some(request_id) {
                    Ok(ClaimResult {
                        request_id: request_id.to_string(),
                        status: ClaimStatus::Approved,
                        slot_status: slot.row.status,
                        confirmed_team_id: slot.row.confirmed_team_id.clone(),
                    })
                } else {
                    Err(EngineError::Conflict(
                        "slot already confirmed for a different request".into(),
                    ))
                };
            }
            SlotStatus::Open => {}
        }

        let claim = self
            .resolve_claim(division, slot_id, request_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("request {request_id}")))?;
        if claim.row.status == ClaimStatus::Denied {
            return Err(EngineError::Conflict("request was already denied".into()));
        }
        if claim.row.requesting_team_id == slot.row.offering_team_id {
            return Err(EngineError::SelfClaim);
        }

        let schedule = self
            .bookings
            .read(&slot.row, &claim.row.requesting_team_id)
            .await;
        let schedule = if self.settings.approval_conflict_check {
            slot.row.parsed_game_date()?;
            slot.row.time_range()?;
            self.ensure_no_double_booking(&slot.row, &claim.row.requesting_team_id)
                .await?;
            schedule
        } else {
            schedule.unenforced()
        };

        let claim = if claim.row.status == ClaimStatus::Pending {
            let now = Utc::now();
            let mut next = claim.row.clone();
            next.status = ClaimStatus::Approved;
            next.approved_at = Some(now);
            next.updated_at = now;
            match self
                .compare_and_swap(&self.claims, &claim.key, claim.version, next)
                .await
            {
                Ok(written) => super::Located {
                    version: written.version,
                    row: written.row,
                    ..claim
                },
                Err(EngineError::PreconditionFailed { .. }) => {
                    return Err(EngineError::Conflict(
                        "request was modified concurrently; re-read and retry".into(),
                    ));
                }
                Err(e) => return Err(e),
            }
        } else {
            claim
        };

        tracing::info!(
            slot = %slot_id,
            request = %request_id,
            by = %caller.user_id,
            "legacy approval"
        );
        self.confirm_slot(&slot, claim, &schedule).await
    }
}
