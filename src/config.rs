use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_MONTHS: u32 = 6;

/// One alias group: the first email is the primary identity all other
/// members map to during collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub emails: Vec<String>,
}

impl Alias {
    pub fn primary(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }
}

/// Persisted user configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Default email filter applied when no -e/--email is given.
    pub email: String,
    /// Default window length in calendar months.
    pub months: u32,
    /// Email alias groups.
    pub aliases: Vec<Alias>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            email: String::new(),
            months: DEFAULT_MONTHS,
            aliases: Vec::new(),
        }
    }
}

/// Configuration directory (`<user-config-root>/commitmap`).
pub fn dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
    Ok(base.join("commitmap"))
}

pub fn file() -> Result<PathBuf> {
    Ok(dir()?.join("config.toml"))
}

/// Create the configuration directory, owner-only.
pub fn ensure_dir() -> Result<PathBuf> {
    let dir = dir()?;
    create_private_dir(&dir)?;
    Ok(dir)
}

pub(crate) fn create_private_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        std::fs::set_permissions(dir, perms)?;
    }
    Ok(())
}

impl Config {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&file()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self) -> Result<()> {
        ensure_dir()?;
        self.save_to_path(&file()?)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Check configuration sanity; returns a list of human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.months == 0 {
            issues.push("months must be > 0".to_string());
        }
        let email = self.email.trim();
        if !email.is_empty() && !email.contains('@') {
            issues.push(format!("invalid email format: {:?}", self.email));
        }
        for alias in &self.aliases {
            if alias.name.trim().is_empty() {
                issues.push("alias with empty name".to_string());
            }
            if alias.emails.is_empty() {
                issues.push(format!("alias {:?} has no emails", alias.name));
            }
        }
        issues
    }

    /// Build the identity normalizer for the configured alias table.
    pub fn normalizer(&self) -> IdentityNormalizer {
        IdentityNormalizer::from_aliases(&self.aliases)
    }
}

/// Maps any alias member to its group's primary identity. Lookup is
/// case-insensitive and whitespace-stripped; without aliases it is the
/// identity function.
#[derive(Debug, Clone, Default)]
pub struct IdentityNormalizer {
    members: HashMap<String, String>,
}

impl IdentityNormalizer {
    pub fn from_aliases(aliases: &[Alias]) -> Self {
        let mut members = HashMap::new();
        for alias in aliases {
            let Some(primary) = alias.primary() else {
                continue;
            };
            let primary = primary.trim().to_string();
            if primary.is_empty() {
                continue;
            }
            for email in &alias.emails {
                let key = email.trim().to_lowercase();
                if !key.is_empty() {
                    members.insert(key, primary.clone());
                }
            }
        }
        IdentityNormalizer { members }
    }

    /// A normalizer with no aliases: returns its input (trimmed) verbatim.
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return raw.to_string();
        }
        match self.members.get(&trimmed.to_lowercase()) {
            Some(primary) => primary.clone(),
            None => trimmed.to_string(),
        }
    }
}
