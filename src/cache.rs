use crate::config;
use crate::error::{Error, Result};
use crate::model::{DayCountMap, DayKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Identifies one repository scan. Any parameter change, including a HEAD
/// advance, produces a different key and thereby invalidates old entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheKey {
    pub repo_path: String,
    pub head_hash: String,
    /// Stored sorted so the key is order-independent.
    pub emails: Vec<String>,
    /// Formatted `YYYY-MM-DD_YYYY-MM-DD`.
    pub time_range: String,
    pub branch: String,
    pub all_branches: bool,
}

impl CacheKey {
    /// Canonical form: cleaned path, trimmed fields, sorted emails. Two keys
    /// with the same semantic content normalize identically.
    pub fn normalized(&self) -> CacheKey {
        let mut emails: Vec<String> = self
            .emails
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        emails.sort();
        CacheKey {
            repo_path: clean_path(self.repo_path.trim()),
            head_hash: self.head_hash.trim().to_string(),
            emails,
            time_range: self.time_range.trim().to_string(),
            branch: self.branch.trim().to_string(),
            all_branches: self.all_branches,
        }
    }

    /// Stable short file name: `{repoName}_{hash}.json`, where the hash is the
    /// first 8 bytes of SHA-256 over the newline-joined normalized fields.
    pub fn file_name(&self) -> String {
        let normalized = self.normalized();
        let base = Path::new(&normalized.repo_path)
            .file_name()
            .and_then(|n| n.to_str())
            .map(sanitize_file_component)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "repo".to_string());

        let payload = [
            normalized.repo_path.as_str(),
            normalized.head_hash.as_str(),
            &normalized.emails.join(","),
            normalized.time_range.as_str(),
            normalized.branch.as_str(),
            if normalized.all_branches { "true" } else { "false" },
        ]
        .join("\n");

        let digest = Sha256::digest(payload.as_bytes());
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        format!("{base}_{hex}.json")
    }
}

/// The on-disk entry: the full key, the date->count map keyed by ISO date
/// strings for portability, and a creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub stats: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
}

/// One-file-per-entry store under a process-private directory. No eviction,
/// no TTL, no locking; the head hash inside the key keeps entries fresh.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Store under `<config-root>/commitmap/cache`.
    pub fn open_default() -> Result<Self> {
        Ok(CacheStore {
            dir: config::dir()?.join("cache"),
        })
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        CacheStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read an entry. `Ok(None)` on miss; any other failure is an error the
    /// caller must degrade to a miss.
    pub fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(Error::Cache(format!("read {}: {err}", path.display())));
            }
        };
        let entry: CacheEntry = serde_json::from_slice(&data)
            .map_err(|err| Error::Cache(format!("decode {}: {err}", path.display())))?;
        Ok(Some(entry))
    }

    /// Serialize and write an entry atomically (temp file + rename), with
    /// owner-only permissions. The stats map is copied.
    pub fn save(&self, key: &CacheKey, stats: &DayCountMap) -> Result<()> {
        config::create_private_dir(&self.dir)?;

        let entry = CacheEntry {
            key: key.normalized(),
            stats: to_cached_stats(stats),
            created_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&entry)?;

        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        if let Err(err) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }
}

pub fn to_cached_stats(stats: &DayCountMap) -> BTreeMap<String, u32> {
    stats
        .iter()
        .map(|(day, count)| (day.to_date_string(), *count))
        .collect()
}

pub fn from_cached_stats(stats: &BTreeMap<String, u32>) -> Result<DayCountMap> {
    let mut out = DayCountMap::new();
    for (day, count) in stats {
        out.insert(DayKey::parse_date_string(day)?, *count);
    }
    Ok(out)
}

fn clean_path(path: &str) -> String {
    let cleaned: PathBuf = Path::new(path).components().collect();
    let s = cleaned.to_string_lossy().to_string();
    if s.is_empty() {
        ".".to_string()
    } else {
        s
    }
}

fn sanitize_file_component(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() || name == "." {
        return String::new();
    }
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ' ' | ':' => '_',
            other => other,
        })
        .collect()
}
