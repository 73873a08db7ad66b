//! Allow-list storage and checks.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use wakegate_config::AccessConfig;

use crate::error::{AccessError, AccessResult};

/// One allowed player, in `whitelist.json` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowEntry {
    pub uuid: String,
    pub name: String,
}

/// Player allow-list with operator-gated administration.
///
/// Every mutation rewrites the backing file before returning.
pub struct AllowList {
    enabled: bool,
    kick_message: String,
    path: PathBuf,
    operators: HashSet<String>,
    entries: RwLock<HashMap<String, AllowEntry>>,
}

impl AllowList {
    /// Load the list from `config.file`, creating an empty file if it does
    /// not exist yet.
    pub fn load(config: &AccessConfig) -> AccessResult<Self> {
        let operators = config
            .operators
            .iter()
            .map(|op| normalize_uuid(op))
            .collect::<AccessResult<HashSet<_>>>()?;

        let list = Self {
            enabled: config.enabled,
            kick_message: config.kick_message.clone(),
            path: config.file.clone(),
            operators,
            entries: RwLock::new(HashMap::new()),
        };

        let entries = match std::fs::read(&list.path) {
            Ok(data) => parse_entries(&list.path, &data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %list.path.display(), "allow-list file not found, starting empty");
                let empty = HashMap::new();
                list.save(&empty)?;
                empty
            }
            Err(source) => {
                return Err(AccessError::Io {
                    path: list.path.clone(),
                    source,
                });
            }
        };

        info!(
            path = %list.path.display(),
            entries = entries.len(),
            enabled = list.enabled,
            operators = list.operators.len(),
            "loaded allow-list"
        );
        *list.entries.write().expect("allow-list lock") = entries;
        Ok(list)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn kick_message(&self) -> &str {
        &self.kick_message
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `uuid` may connect. Everyone may when the list is disabled.
    pub fn is_allowed(&self, uuid: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let Ok(uuid) = normalize_uuid(uuid) else {
            return false;
        };
        self.entries
            .read()
            .expect("allow-list lock")
            .contains_key(&uuid)
    }

    pub fn is_operator(&self, uuid: &str) -> bool {
        normalize_uuid(uuid)
            .map(|uuid| self.operators.contains(&uuid))
            .unwrap_or(false)
    }

    /// Add (or rename) a player. `operator` is the acting player's UUID.
    pub fn add(&self, operator: &str, uuid: &str, name: &str) -> AccessResult<AllowEntry> {
        self.require_operator(operator)?;
        let entry = AllowEntry {
            uuid: normalize_uuid(uuid)?,
            name: name.to_string(),
        };

        let mut entries = self.entries.write().expect("allow-list lock");
        let previous = entries.insert(entry.uuid.clone(), entry.clone());
        if let Err(e) = self.save(&entries) {
            match previous {
                Some(previous) => entries.insert(previous.uuid.clone(), previous),
                None => entries.remove(&entry.uuid),
            };
            return Err(e);
        }

        info!(player = %entry.name, uuid = %entry.uuid, %operator, "player added to allow-list");
        Ok(entry)
    }

    /// Remove a player by name, case-insensitively.
    pub fn remove_by_name(&self, operator: &str, name: &str) -> AccessResult<AllowEntry> {
        self.require_operator(operator)?;

        let mut entries = self.entries.write().expect("allow-list lock");
        let uuid = entries
            .values()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .map(|entry| entry.uuid.clone())
            .ok_or_else(|| AccessError::UnknownPlayer(name.to_string()))?;

        let removed = entries
            .remove(&uuid)
            .ok_or_else(|| AccessError::UnknownPlayer(name.to_string()))?;
        if let Err(e) = self.save(&entries) {
            entries.insert(uuid, removed);
            return Err(e);
        }

        info!(player = %removed.name, uuid = %removed.uuid, %operator, "player removed from allow-list");
        Ok(removed)
    }

    /// All entries, sorted by name.
    pub fn list(&self) -> Vec<AllowEntry> {
        let mut entries: Vec<AllowEntry> = self
            .entries
            .read()
            .expect("allow-list lock")
            .values()
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.name.to_lowercase());
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("allow-list lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn require_operator(&self, operator: &str) -> AccessResult<()> {
        if self.is_operator(operator) {
            Ok(())
        } else {
            Err(AccessError::NotOperator(operator.to_string()))
        }
    }

    /// Write the list via a temp file and rename so a crash never leaves
    /// a truncated file behind.
    fn save(&self, entries: &HashMap<String, AllowEntry>) -> AccessResult<()> {
        let mut sorted: Vec<&AllowEntry> = entries.values().collect();
        sorted.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        let data = serde_json::to_vec_pretty(&sorted).map_err(AccessError::Encode)?;

        let io_err = |source| AccessError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &data).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), entries = sorted.len(), "saved allow-list");
        Ok(())
    }
}

fn parse_entries(path: &Path, data: &[u8]) -> AccessResult<HashMap<String, AllowEntry>> {
    // A vanilla server writes an empty file before the first entry.
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }
    let parsed: Vec<AllowEntry> =
        serde_json::from_slice(data).map_err(|source| AccessError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut entries = HashMap::with_capacity(parsed.len());
    for entry in parsed {
        let uuid = normalize_uuid(&entry.uuid)?;
        entries.insert(
            uuid.clone(),
            AllowEntry {
                uuid,
                name: entry.name,
            },
        );
    }
    Ok(entries)
}

/// Canonical lowercase, hyphenated UUID. Accepts the 32-digit form the
/// Mojang API returns.
pub fn normalize_uuid(raw: &str) -> AccessResult<String> {
    Uuid::try_parse(raw.trim())
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|_| AccessError::InvalidUuid(raw.to_string()))
}
