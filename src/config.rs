use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{ApprovalPolicy, EngineSettings};

/// Process configuration, read once from `SLOTSWAP_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub reconcile_interval: Duration,
    pub reconcile_grace: Duration,
    pub engine: EngineSettings,
    pub fields_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            reconcile_interval: Duration::from_secs(30),
            reconcile_grace: Duration::from_secs(60),
            engine: EngineSettings::default(),
            fields_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset or empty variables keep their default.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let var = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Config::default();

        if let Some(bind) = var("SLOTSWAP_BIND") {
            cfg.bind = bind;
        }
        if let Some(port) = var("SLOTSWAP_PORT") {
            cfg.port = parse("SLOTSWAP_PORT", &port)?;
        }
        if let Some(dir) = var("SLOTSWAP_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = var("SLOTSWAP_METRICS_PORT") {
            cfg.metrics_port = Some(parse("SLOTSWAP_METRICS_PORT", &port)?);
        }
        if let Some(n) = var("SLOTSWAP_COMPACT_THRESHOLD") {
            cfg.compact_threshold = parse("SLOTSWAP_COMPACT_THRESHOLD", &n)?;
        }
        if let Some(secs) = var("SLOTSWAP_RECONCILE_INTERVAL_SECS") {
            let secs: u64 = parse("SLOTSWAP_RECONCILE_INTERVAL_SECS", &secs)?;
            if secs == 0 {
                return Err("SLOTSWAP_RECONCILE_INTERVAL_SECS must be at least 1".into());
            }
            cfg.reconcile_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = var("SLOTSWAP_RECONCILE_GRACE_SECS") {
            cfg.reconcile_grace =
                Duration::from_secs(parse("SLOTSWAP_RECONCILE_GRACE_SECS", &secs)?);
        }
        if let Some(policy) = var("SLOTSWAP_APPROVAL_POLICY") {
            cfg.engine.approval_policy = ApprovalPolicy::parse(&policy).ok_or_else(|| {
                format!("SLOTSWAP_APPROVAL_POLICY: expected membership or offering_coach, got {policy:?}")
            })?;
        }
        if let Some(flag) = var("SLOTSWAP_APPROVAL_CONFLICT_CHECK") {
            cfg.engine.approval_conflict_check = parse_bool("SLOTSWAP_APPROVAL_CONFLICT_CHECK", &flag)?;
        }
        if let Some(path) = var("SLOTSWAP_FIELDS_FILE") {
            cfg.fields_file = Some(PathBuf::from(path));
        }
        Ok(cfg)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| format!("{name}: invalid value {value:?}: {e}"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{name}: expected a boolean, got {value:?}")),
    }
}
