mod approval;
mod bookings;
mod cas;
mod claims;
mod conflict;
mod error;
mod keys;
mod query;
mod reconcile;
mod slots;
mod store;

pub use approval::ApprovalPolicy;
pub use claims::ClaimRequest;
pub use conflict::first_conflict;
pub use error::EngineError;
pub use keys::KeyScheme;
pub use query::{ClaimFilter, PartitionRange, Predicate, SlotFilter, TableQuery};
pub use reconcile::ReconcileReport;
pub use slots::{NewSlot, SlotListFilter, SlotPatch};
pub use store::{Located, Row, Table, Versioned};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};

use crate::field::FieldDirectory;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

/// Per-deployment knobs for the legacy approval path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub approval_policy: ApprovalPolicy,
    /// Run the double-booking check on legacy approvals too.
    pub approval_conflict_check: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            approval_policy: ApprovalPolicy::Membership,
            approval_conflict_check: true,
        }
    }
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that arrive while a batch is being collected share
/// one fsync; any other command first flushes the batch in hand.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let first = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch: Vec<PendingAppend> = vec![first];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut wal, &mut batch);
        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut append_err = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so buffered bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    let failure = append_err.or(flush_err);
    for (_, tx) in batch.drain(..) {
        let r = match &failure {
            None => Ok(()),
            Some(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            commit_batch(wal, &mut vec![(event, response)]);
        }
    }
}

/// Booking engine for one league.
pub struct Engine {
    league_id: String,
    pub(super) slots: Table<Slot>,
    pub(super) claims: Table<Claim>,
    pub(super) bookings: bookings::BookingLedger,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Writers hold it shared for append+apply; compaction takes it exclusively.
    write_gate: RwLock<()>,
    pub notify: Arc<NotifyHub>,
    pub(super) fields: Arc<dyn FieldDirectory>,
    pub(super) settings: EngineSettings,
}

impl Engine {
    pub fn new(
        league_id: impl Into<String>,
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        fields: Arc<dyn FieldDirectory>,
        settings: EngineSettings,
    ) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            league_id: league_id.into(),
            slots: Table::new(),
            claims: Table::new(),
            bookings: bookings::BookingLedger::new(),
            wal_tx,
            write_gate: RwLock::new(()),
            notify,
            fields,
            settings,
        };

        for event in events {
            match event {
                Event::SlotWritten { key, version, slot } => {
                    engine.slots.put_replayed(key, version, slot)
                }
                Event::ClaimWritten {
                    key,
                    version,
                    claim,
                } => engine.claims.put_replayed(key, version, claim),
            }
        }
        tracing::debug!(
            league = %engine.league_id,
            slots = engine.slots.len(),
            claims = engine.claims.len(),
            "engine loaded"
        );

        Ok(engine)
    }

    pub fn league_id(&self) -> &str {
        &self.league_id
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Rewrite the WAL with one record per live row.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.write_gate.write().await;

        let mut events = Vec::new();
        for (key, v) in self.slots.snapshot_all().await {
            events.push(Slot::into_event(key, v.version, v.row));
        }
        for (key, v) in self.claims.snapshot_all().await {
            events.push(Claim::into_event(key, v.version, v.row));
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Canonical-first lookup of a slot.
    pub async fn resolve_slot(&self, division: &str, slot_id: &str) -> Option<Located<Slot>> {
        for scheme in KeyScheme::LOOKUP_ORDER {
            let key = scheme.slot_key(&self.league_id, division, slot_id);
            if let Some(found) = self.slots.locate(&key).await {
                return Some(found);
            }
        }
        None
    }

    /// Canonical-first lookup of a claim.
    pub async fn resolve_claim(
        &self,
        division: &str,
        slot_id: &str,
        request_id: &str,
    ) -> Option<Located<Claim>> {
        for scheme in KeyScheme::LOOKUP_ORDER {
            let key = scheme.claim_key(&self.league_id, division, slot_id, request_id);
            if let Some(found) = self.claims.locate(&key).await {
                return Some(found);
            }
        }
        None
    }

    pub async fn get_slot(&self, division: &str, slot_id: &str) -> Option<Slot> {
        self.resolve_slot(division, slot_id).await.map(|l| l.row)
    }

    /// Slots across every key scheme.
    pub(super) async fn scan_slots(&self, filters: &[SlotFilter]) -> Vec<Located<Slot>> {
        let mut out = Vec::new();
        for scheme in KeyScheme::LOOKUP_ORDER {
            let mut query = TableQuery::prefix(scheme.slot_league_prefix(&self.league_id));
            for f in filters {
                query = query.filter(f.clone());
            }
            out.extend(self.slots.scan(&query).await);
        }
        out
    }

    /// Claims of one slot across every key scheme.
    pub(super) async fn scan_slot_claims(
        &self,
        division: &str,
        slot_id: &str,
        filters: &[ClaimFilter],
    ) -> Vec<Located<Claim>> {
        let mut out = Vec::new();
        for scheme in KeyScheme::LOOKUP_ORDER {
            let mut query =
                TableQuery::partition(scheme.claim_partition(&self.league_id, division, slot_id));
            for f in filters {
                query = query.filter(f.clone());
            }
            out.extend(self.claims.scan(&query).await);
        }
        out
    }

    /// Claims anywhere in the league across every key scheme.
    pub(super) async fn scan_league_claims(&self, filters: &[ClaimFilter]) -> Vec<Located<Claim>> {
        let mut out = Vec::new();
        for scheme in KeyScheme::LOOKUP_ORDER {
            let mut query = TableQuery::prefix(scheme.claim_league_prefix(&self.league_id));
            for f in filters {
                query = query.filter(f.clone());
            }
            out.extend(self.claims.scan(&query).await);
        }
        out
    }
}
