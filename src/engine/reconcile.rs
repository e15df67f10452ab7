//! Repairs for the Slot/Claim two-row write: the claim is approved first and
//! the slot confirmed second, so a crash in between leaves an Approved claim
//! on a slot that is still Open.

use chrono::{Duration, Utc};

use crate::identity::Caller;
use crate::model::*;
use crate::observability::RECONCILE_TOTAL;

use super::{ClaimFilter, Engine, EngineError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub examined: usize,
    pub confirmed: usize,
    pub denied: usize,
}

impl Engine {
    /// Finish or roll back Approved claims older than `grace` whose slot does
    /// not point at them. Younger claims may still be mid-flight.
    pub async fn reconcile(&self, grace: Duration) -> Result<ReconcileReport, EngineError> {
        let cutoff = Utc::now() - grace;
        let approved = self
            .scan_league_claims(&[
                ClaimFilter::Status(ClaimStatus::Approved),
                ClaimFilter::ApprovedBefore(cutoff),
            ])
            .await;

        let mut report = ReconcileReport::default();
        for claim in approved {
            let Some(slot) = self
                .resolve_slot(&claim.row.division, &claim.row.slot_id)
                .await
            else {
                tracing::warn!(request = %claim.row.request_id, "approved claim has no slot");
                continue;
            };
            if slot.row.confirmed_request_id.as_deref() == Some(claim.row.request_id.as_str()) {
                continue;
            }
            report.examined += 1;

            let request_id = claim.row.request_id.clone();
            if slot.row.status != SlotStatus::Open {
                match self.deny_claim(&claim).await {
                    Ok(()) => {
                        report.denied += 1;
                        metrics::counter!(RECONCILE_TOTAL, "action" => "denied").increment(1);
                        tracing::info!(request = %request_id, "denied stray approved claim");
                    }
                    Err(e) => tracing::warn!(request = %request_id, "reconcile deny failed: {e}"),
                }
                continue;
            }

            let schedule = self
                .bookings
                .read(&slot.row, &claim.row.requesting_team_id)
                .await;
            let blocked = match self
                .ensure_no_double_booking(&slot.row, &claim.row.requesting_team_id)
                .await
            {
                Ok(()) => false,
                Err(EngineError::DoubleBooking(_)) | Err(EngineError::Validation(_)) => true,
                Err(e) => return Err(e),
            };
            if blocked {
                match self.deny_claim(&claim).await {
                    Ok(()) => {
                        report.denied += 1;
                        metrics::counter!(RECONCILE_TOTAL, "action" => "denied").increment(1);
                    }
                    Err(e) => tracing::warn!(request = %request_id, "reconcile deny failed: {e}"),
                }
                continue;
            }

            match self.confirm_slot(&slot, claim, &schedule).await {
                Ok(_) => {
                    report.confirmed += 1;
                    metrics::counter!(RECONCILE_TOTAL, "action" => "confirmed").increment(1);
                    tracing::info!(request = %request_id, "reconciled slot confirmation");
                }
                Err(EngineError::Conflict(_)) | Err(EngineError::DoubleBooking(_)) => {
                    report.denied += 1;
                    metrics::counter!(RECONCILE_TOTAL, "action" => "denied").increment(1);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Administrative sweep of leftover Pending claims once a slot is settled.
    pub async fn deny_pending_claims(
        &self,
        caller: &Caller,
        division: &str,
        slot_id: &str,
    ) -> Result<usize, EngineError> {
        if !caller.is_admin() {
            return Err(EngineError::Forbidden(
                "only an administrator may deny pending requests".into(),
            ));
        }
        let slot = self
            .resolve_slot(division, slot_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("slot {division}/{slot_id}")))?;
        if slot.row.status == SlotStatus::Open {
            return Err(EngineError::Conflict(
                "slot is still open; pending requests remain eligible".into(),
            ));
        }
        let winner = slot.row.confirmed_request_id.clone().unwrap_or_default();
        Ok(self.sweep_pending(&slot.row, &winner).await)
    }
}
