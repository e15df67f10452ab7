use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::engine::{Engine, EngineError, EngineSettings};
use crate::field::FieldDirectory;
use crate::limits::*;
use crate::notify::NotifyHub;
use crate::reconciler;

/// Manages per-league engines. Each league gets its own Engine + WAL +
/// reconciler + compactor, created on first use.
pub struct LeagueManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    fields: Arc<dyn FieldDirectory>,
    settings: EngineSettings,
    reconcile_every: Duration,
    reconcile_grace: Duration,
}

impl LeagueManager {
    pub fn new(
        data_dir: PathBuf,
        compact_threshold: u64,
        fields: Arc<dyn FieldDirectory>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            fields,
            settings,
            reconcile_every: Duration::from_secs(30),
            reconcile_grace: Duration::from_secs(60),
        }
    }

    pub fn with_reconcile(mut self, every: Duration, grace: Duration) -> Self {
        self.reconcile_every = every;
        self.reconcile_grace = grace;
        self
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Get or lazily create the engine for a league.
    pub fn get_or_create(&self, league_id: &str) -> Result<Arc<Engine>, EngineError> {
        if let Some(engine) = self.engines.get(league_id) {
            return Ok(engine.value().clone());
        }
        if league_id.len() > MAX_LEAGUE_ID_LEN {
            return Err(EngineError::LimitExceeded("league id too long"));
        }
        // The id doubles as the WAL file name.
        if league_id.is_empty()
            || !league_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(EngineError::Validation(format!(
                "invalid league id {league_id:?}"
            )));
        }
        if self.engines.len() >= MAX_LEAGUES {
            return Err(EngineError::LimitExceeded("too many leagues"));
        }

        let engine = match self.engines.entry(league_id.to_string()) {
            Entry::Occupied(e) => return Ok(e.get().clone()),
            Entry::Vacant(v) => {
                let wal_path = self.data_dir.join(format!("{league_id}.wal"));
                let engine = Engine::new(
                    league_id,
                    wal_path,
                    Arc::new(NotifyHub::new()),
                    self.fields.clone(),
                    self.settings,
                )
                .map_err(|e| EngineError::WalError(format!("opening league {league_id}: {e}")))?;
                v.insert(Arc::new(engine)).clone()
            }
        };

        tokio::spawn(reconciler::run_reconciler(
            engine.clone(),
            self.reconcile_every,
            self.reconcile_grace,
        ));
        tokio::spawn(reconciler::run_compactor(
            engine.clone(),
            self.compact_threshold,
        ));

        tracing::info!(league = %league_id, "league engine started");
        metrics::gauge!(crate::observability::LEAGUES_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NewSlot;
    use crate::field::{FieldInfo, InMemoryFieldDirectory};
    use crate::identity::{Caller, LeagueRole};
    use std::fs;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("slotswap_test_league").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manager(dir: PathBuf) -> LeagueManager {
        let fields = InMemoryFieldDirectory::new();
        for league in ["league_a", "league_b"] {
            fields.insert(FieldInfo {
                league_id: league.into(),
                park_code: "park".into(),
                field_code: "f1".into(),
                park_name: "Park".into(),
                field_name: "One".into(),
                is_active: true,
            });
        }
        LeagueManager::new(dir, 1000, Arc::new(fields), EngineSettings::default())
    }

    fn admin(league: &str) -> Caller {
        Caller {
            user_id: "u1".into(),
            league_id: league.into(),
            role: LeagueRole::Admin,
            team: None,
        }
    }

    fn offer() -> NewSlot {
        NewSlot {
            division: Some("10U".into()),
            offering_team_id: Some("A".into()),
            game_date: Some("2026-04-10".into()),
            start_time: Some("18:00".into()),
            end_time: Some("20:00".into()),
            field_key: Some("park/f1".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn league_isolation() {
        let dir = test_data_dir("isolation");
        let lm = manager(dir);

        let a = lm.get_or_create("league_a").unwrap();
        let b = lm.get_or_create("league_b").unwrap();

        a.create_slot(&admin("league_a"), offer()).await.unwrap();

        let in_a = a.list_slots(&Default::default()).await.unwrap();
        let in_b = b.list_slots(&Default::default()).await.unwrap();
        assert_eq!(in_a.len(), 1);
        assert!(in_b.is_empty());
        assert_eq!(in_a[0].league_id, "league_a");
    }

    #[tokio::test]
    async fn fields_are_scoped_per_league() {
        let dir = test_data_dir("field_scope");
        let lm = manager(dir);
        let c = lm.get_or_create("league_c").unwrap();
        let err = c.create_slot(&admin("league_c"), offer()).await.unwrap_err();
        assert!(matches!(err, EngineError::FieldNotFound(_)));
    }

    #[tokio::test]
    async fn league_lazy_creation() {
        let dir = test_data_dir("lazy");
        let lm = manager(dir.clone());

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _eng = lm.get_or_create("my_league").unwrap();
        assert!(dir.join("my_league.wal").exists());
        assert_eq!(lm.len(), 1);
    }

    #[tokio::test]
    async fn league_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let lm = manager(dir);

        let eng1 = lm.get_or_create("foo").unwrap();
        let eng2 = lm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&eng1, &eng2));
    }

    #[tokio::test]
    async fn league_id_must_be_file_safe() {
        let dir = test_data_dir("sanitize");
        let lm = manager(dir.clone());

        for bad in ["../evil", "a/b", "", "sp ace", "dot.dot"] {
            let err = lm.get_or_create(bad).err().expect("bad league id accepted");
            assert_eq!(err.code(), "VALIDATION", "{bad:?}");
        }
        assert!(!dir.join("evil.wal").exists());
        assert!(lm.is_empty());
    }

    #[tokio::test]
    async fn league_id_too_long() {
        let dir = test_data_dir("name_too_long");
        let lm = manager(dir);

        let long_name = "x".repeat(MAX_LEAGUE_ID_LEN + 1);
        let err = lm
            .get_or_create(&long_name)
            .err()
            .expect("long league id accepted");
        assert!(matches!(err, EngineError::LimitExceeded("league id too long")));
    }

    #[tokio::test]
    async fn league_count_limit() {
        let dir = test_data_dir("count_limit");
        let lm = manager(dir);

        for i in 0..MAX_LEAGUES {
            lm.get_or_create(&format!("l{i}")).unwrap();
        }
        let err = lm
            .get_or_create("one_more")
            .err()
            .expect("league over the cap accepted");
        assert!(matches!(err, EngineError::LimitExceeded("too many leagues")));
        // Existing leagues are still served.
        lm.get_or_create("l0").unwrap();
    }

    #[tokio::test]
    async fn league_reopens_from_wal() {
        let dir = test_data_dir("reopen");
        {
            let lm = manager(dir.clone());
            let a = lm.get_or_create("league_a").unwrap();
            a.create_slot(&admin("league_a"), offer()).await.unwrap();
        }
        let lm = manager(dir);
        let a = lm.get_or_create("league_a").unwrap();
        assert_eq!(a.list_slots(&Default::default()).await.unwrap().len(), 1);
    }
}
