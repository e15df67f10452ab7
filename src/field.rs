use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use crate::limits::MAX_FIELD_KEY_LEN;

/// Normalized `parkCode/fieldCode` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    pub park_code: String,
    pub field_code: String,
}

impl FieldKey {
    /// Trim, split on exactly one `/`, lowercase both codes.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_FIELD_KEY_LEN {
            return None;
        }
        let (park, field) = raw.split_once('/')?;
        if field.contains('/') {
            return None;
        }
        let park = park.trim();
        let field = field.trim();
        if park.is_empty() || field.is_empty() {
            return None;
        }
        Some(Self {
            park_code: park.to_ascii_lowercase(),
            field_code: field.to_ascii_lowercase(),
        })
    }

    pub fn normalized(&self) -> String {
        format!("{}/{}", self.park_code, self.field_code)
    }
}

/// Directory entry for one field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub league_id: String,
    pub park_code: String,
    pub field_code: String,
    pub park_name: String,
    pub field_name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl FieldInfo {
    pub fn display_name(&self) -> String {
        format!("{} > {}", self.park_name, self.field_name)
    }
}

/// Lookup of fields owned by the park/field service.
#[async_trait]
pub trait FieldDirectory: Send + Sync {
    async fn lookup(&self, league_id: &str, key: &FieldKey) -> std::io::Result<Option<FieldInfo>>;
}

/// Field directory held in memory, optionally seeded from a JSON file.
#[derive(Default)]
pub struct InMemoryFieldDirectory {
    fields: DashMap<(String, FieldKey), FieldInfo>,
}

impl InMemoryFieldDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of field entries.
    pub fn from_json_file(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let entries: Vec<FieldInfo> = serde_json::from_slice(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let dir = Self::new();
        for entry in entries {
            dir.insert(entry);
        }
        Ok(dir)
    }

    /// Insert or replace an entry. Entries with an unparseable key are dropped.
    pub fn insert(&self, info: FieldInfo) {
        let raw = format!("{}/{}", info.park_code, info.field_code);
        match FieldKey::parse(&raw) {
            Some(key) => {
                self.fields.insert((info.league_id.clone(), key), info);
            }
            None => tracing::warn!("ignoring field directory entry with bad key {raw:?}"),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[async_trait]
impl FieldDirectory for InMemoryFieldDirectory {
    async fn lookup(&self, league_id: &str, key: &FieldKey) -> std::io::Result<Option<FieldInfo>> {
        Ok(self
            .fields
            .get(&(league_id.to_string(), key.clone()))
            .map(|e| e.value().clone()))
    }
}
