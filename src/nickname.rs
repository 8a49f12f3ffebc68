//! Optional `name:profile` shortcuts, one per line.
//!
//! ```text
//! # comments and blank lines are ignored
//! prod:prod-admin
//! dev:dev-role
//! ```

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("line {line}: expected `nickname:profile`, found `{content}`")]
pub struct NicknameParseError {
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NicknameMap {
    entries: HashMap<String, String>,
}

impl NicknameMap {
    pub fn parse(contents: &str) -> Result<Self, NicknameParseError> {
        let mut entries = HashMap::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(nickname), Some(profile), None)
                    if !nickname.trim().is_empty() && !profile.trim().is_empty() =>
                {
                    entries.insert(nickname.trim().to_string(), profile.trim().to_string());
                }
                _ => {
                    return Err(NicknameParseError {
                        line: index + 1,
                        content: line.to_string(),
                    })
                }
            }
        }
        Ok(Self { entries })
    }

    /// Loads the file at `path`. A missing or malformed file yields `None` so that the
    /// requested name is used as a literal profile name instead.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.is_file() {
            debug!("No nickname file at {}", path.display());
            return None;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return None;
            }
        };
        match Self::parse(&contents) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn resolve(&self, nickname: &str) -> Option<&str> {
        self.entries.get(nickname).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
