//! Read-only view of the AWS shared config file.
//!
//! The file is parsed once into a [`ConfigStore`] and then only borrowed. Sections are
//! addressed by `(SectionType, name)`, mirroring the `[profile NAME]` and
//! `[sso-session NAME]` headings on disk. The bare `[default]` heading is the profile
//! named `default`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionType {
    Profile,
    SsoSession,
}

impl SectionType {
    pub fn prefix(self) -> &'static str {
        match self {
            SectionType::Profile => "profile",
            SectionType::SsoSession => "sso-session",
        }
    }
}

/// One `[type name]` block of key/value pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSection {
    section_type: SectionType,
    name: String,
    values: BTreeMap<String, String>,
}

impl ProfileSection {
    pub fn new(section_type: SectionType, name: impl Into<String>) -> Self {
        Self {
            section_type,
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Immutable handle over every section of the shared config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    origin: Option<PathBuf>,
    sections: BTreeMap<(SectionType, String), ProfileSection>,
}

impl ConfigStore {
    pub fn from_sections(sections: impl IntoIterator<Item = ProfileSection>) -> Self {
        let sections = sections
            .into_iter()
            .map(|section| ((section.section_type, section.name.clone()), section))
            .collect();
        Self {
            origin: None,
            sections,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut store = Self::parse(&contents, &path.display().to_string())?;
        store.origin = Some(path.to_path_buf());
        debug!(
            "Loaded {} sections from {}",
            store.sections.len(),
            path.display()
        );
        Ok(store)
    }

    /// Parses INI text. `origin` only labels parse errors.
    pub fn parse(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let parse_error = |line: usize, message: &str| ConfigError::Parse {
            origin: origin.to_string(),
            line,
            message: message.to_string(),
        };

        let mut sections: Vec<Option<ProfileSection>> = Vec::new();
        let mut last_key: Option<String> = None;

        for (index, raw) in contents.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if trimmed.starts_with('[') {
                let heading = trimmed
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .ok_or_else(|| parse_error(line_no, "unterminated section heading"))?;
                // Sections of other types (e.g. `[services x]`) are kept out of the store.
                sections.push(parse_heading(heading));
                last_key = None;
                continue;
            }

            let Some(current) = sections.last_mut() else {
                return Err(parse_error(line_no, "key outside of any section"));
            };

            let continuation = raw.starts_with(' ') || raw.starts_with('\t');
            if continuation {
                if let (Some(section), Some(key)) = (current.as_mut(), last_key.as_ref()) {
                    if let Some(value) = section.values.get_mut(key) {
                        value.push('\n');
                        value.push_str(trimmed);
                    }
                    continue;
                }
                if current.is_none() {
                    continue;
                }
            }

            let (key, value) = trimmed
                .split_once('=')
                .ok_or_else(|| parse_error(line_no, "expected `key = value`"))?;
            let key = key.trim().to_string();
            if let Some(section) = current.as_mut() {
                section.values.insert(key.clone(), value.trim().to_string());
            }
            last_key = Some(key);
        }

        Ok(Self::from_sections(sections.into_iter().flatten()))
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn section(&self, section_type: SectionType, name: &str) -> Option<&ProfileSection> {
        self.sections.get(&(section_type, name.to_string()))
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileSection> {
        self.section(SectionType::Profile, name)
    }

    /// Like [`ConfigStore::profile`], but a missing profile is an error that carries the
    /// names the user could have meant.
    pub fn require_profile(&self, name: &str) -> Result<&ProfileSection, ConfigError> {
        self.profile(name).ok_or_else(|| ConfigError::ProfileNotFound {
            name: name.to_string(),
            available: self.profile_names(),
        })
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.sections
            .keys()
            .filter(|(section_type, _)| *section_type == SectionType::Profile)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

fn parse_heading(heading: &str) -> Option<ProfileSection> {
    let heading = heading.trim();
    if heading == "default" {
        return Some(ProfileSection::new(SectionType::Profile, "default"));
    }
    let (kind, name) = heading.split_once(char::is_whitespace)?;
    let section_type = match kind {
        "profile" => SectionType::Profile,
        "sso-session" => SectionType::SsoSession,
        _ => return None,
    };
    Some(ProfileSection::new(section_type, name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
# shared config
[default]
region = us-east-1

[profile prod-admin]
sso_session = corp
sso_account_id = 111122223333
sso_role_name = AdministratorAccess
region = eu-west-1
s3 =
    max_concurrent_requests = 20

[sso-session corp]
sso_start_url = https://corp.awsapps.com/start
sso_region = us-east-1

[services local]
sts =
  endpoint_url = http://localhost:4566
"#;

    #[test]
    fn parses_profiles_and_sessions() {
        let store = ConfigStore::parse(SAMPLE, "config").unwrap();

        let prod = store.profile("prod-admin").unwrap();
        assert_eq!(prod.get("sso_session"), Some("corp"));
        assert_eq!(prod.get("region"), Some("eu-west-1"));
        assert_eq!(prod.get("s3"), Some("\nmax_concurrent_requests = 20"));

        let session = store.section(SectionType::SsoSession, "corp").unwrap();
        assert_eq!(session.get("sso_region"), Some("us-east-1"));
        assert!(store.section(SectionType::Profile, "corp").is_none());
    }

    #[test]
    fn default_heading_is_a_profile() {
        let store = ConfigStore::parse(SAMPLE, "config").unwrap();
        assert_eq!(store.profile("default").unwrap().get("region"), Some("us-east-1"));
        assert_eq!(store.profile_names(), vec!["default", "prod-admin"]);
    }

    #[test]
    fn missing_profile_reports_known_names() {
        let store = ConfigStore::parse(SAMPLE, "config").unwrap();
        match store.require_profile("prod") {
            Err(ConfigError::ProfileNotFound { name, available }) => {
                assert_eq!(name, "prod");
                assert_eq!(available, vec!["default", "prod-admin"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_keys_before_first_section() {
        let err = ConfigStore::parse("region = us-east-1\n", "config").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn rejects_lines_without_equals() {
        let err = ConfigStore::parse("[profile a]\nregion\n", "config").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 2, .. }));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, SAMPLE).unwrap();

        let store = ConfigStore::load(&path).unwrap();
        assert_eq!(store.origin(), Some(path.as_path()));
        assert!(store.profile("prod-admin").is_some());

        let missing = ConfigStore::load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
