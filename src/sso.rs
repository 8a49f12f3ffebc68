//! SSO session lookup and inspection of the token cache written by `aws sso login`.
//!
//! Tokens live at `<cache dir>/<sha1(start url)>.json`. This module only reads them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, SectionType};
use crate::error::ConfigError;
use crate::profile::ProfileIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoSession {
    pub session_name: String,
    pub start_url: String,
    pub region: String,
}

impl SsoSession {
    /// Resolves the `sso-session` section referenced by `profile`.
    pub fn for_profile(
        config: &ConfigStore,
        profile: &ProfileIdentity,
    ) -> Result<Option<Self>, ConfigError> {
        match profile.sso_session_name.as_deref() {
            Some(name) => Self::load(config, name, &profile.name).map(Some),
            None => Ok(None),
        }
    }

    pub fn load(config: &ConfigStore, name: &str, profile: &str) -> Result<Self, ConfigError> {
        let section = config
            .section(SectionType::SsoSession, name)
            .ok_or_else(|| ConfigError::SsoSessionNotFound {
                name: name.to_string(),
                profile: profile.to_string(),
            })?;

        let required = |key: &'static str| {
            section
                .get(key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ConfigError::SsoSessionIncomplete {
                    name: name.to_string(),
                    missing: key,
                })
        };

        Ok(Self {
            session_name: name.to_string(),
            start_url: required("sso_start_url")?,
            region: required("sso_region")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Expired,
}

/// A token found in the SSO cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedToken {
    pub region: String,
    pub expires_at: DateTime<Utc>,
    pub status: TokenStatus,
    pub raw: serde_json::Value,
}

impl CachedToken {
    pub fn is_expired(&self) -> bool {
        self.status == TokenStatus::Expired
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRecord {
    region: String,
    expires_at: String,
}

#[derive(Debug, Clone)]
pub struct SsoCacheInspector {
    cache_dir: PathBuf,
}

impl SsoCacheInspector {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Hex SHA-1 of the start URL, matching the AWS CLI cache file naming.
    pub fn cache_key(start_url: &str) -> String {
        hex::encode(Sha1::digest(start_url.as_bytes()))
    }

    pub fn cache_file(&self, session: &SsoSession) -> PathBuf {
        self.cache_dir
            .join(format!("{}.json", Self::cache_key(&session.start_url)))
    }

    pub fn check_cached_token(
        &self,
        session: &SsoSession,
    ) -> Result<Option<CachedToken>, ConfigError> {
        self.check_cached_token_at(session, Utc::now())
    }

    /// Returns `Ok(None)` when no usable token file exists. A token whose region differs
    /// from the session's `sso_region` is a configuration error.
    pub fn check_cached_token_at(
        &self,
        session: &SsoSession,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedToken>, ConfigError> {
        let path = self.cache_file(session);
        debug!(
            "Looking for SSO token {} for session {}",
            path.display(),
            session.session_name
        );

        if !path.is_file() {
            info!("No cached SSO token for session {}", session.session_name);
            return Ok(None);
        }

        let Some((record, raw)) = read_record(&path) else {
            return Ok(None);
        };

        let Some(expires_at) = parse_expiry(&record.expires_at) else {
            warn!(
                "Ignoring SSO token {}: unrecognised expiresAt `{}`",
                path.display(),
                record.expires_at
            );
            return Ok(None);
        };

        if record.region != session.region {
            return Err(ConfigError::CachedRegionMismatch {
                session: session.session_name.clone(),
                cached: record.region,
                configured: session.region.clone(),
            });
        }

        let local = expires_at.with_timezone(&Local);
        let status = if now > expires_at {
            info!("Cached SSO token for session {} expired at {}", session.session_name, local);
            TokenStatus::Expired
        } else {
            info!("Found valid cached SSO token, valid until {}", local);
            TokenStatus::Valid
        };

        Ok(Some(CachedToken {
            region: record.region,
            expires_at,
            status,
            raw,
        }))
    }
}

fn read_record(path: &Path) -> Option<(TokenRecord, serde_json::Value)> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Failed to read SSO token {}: {}", path.display(), e);
            return None;
        }
    };
    let raw: serde_json::Value = match serde_json::from_str(&contents) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to load token from {}: {}", path.display(), e);
            return None;
        }
    };
    match TokenRecord::deserialize(&raw) {
        Ok(record) => Some((record, raw)),
        Err(e) => {
            warn!("Failed to load token from {}: {}", path.display(), e);
            None
        }
    }
}

/// Accepts RFC 3339 and the `2024-01-01T00:00:00UTC` form older CLI versions wrote.
fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = value
        .strip_suffix("UTC")
        .or_else(|| value.strip_suffix('Z'))
        .unwrap_or(value);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileSection;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn session() -> SsoSession {
        SsoSession {
            session_name: "corp".to_string(),
            start_url: "https://corp.awsapps.com/start".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    fn write_token(inspector: &SsoCacheInspector, body: &str) {
        std::fs::write(inspector.cache_file(&session()), body).unwrap();
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn cache_key_is_sha1_of_start_url() {
        assert_eq!(
            SsoCacheInspector::cache_key("abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            SsoCacheInspector::cache_key("https://corp.awsapps.com/start"),
            SsoCacheInspector::cache_key("https://corp.awsapps.com/start")
        );
        assert_ne!(
            SsoCacheInspector::cache_key("https://corp.awsapps.com/start"),
            SsoCacheInspector::cache_key("https://corp.awsapps.com/start/")
        );
    }

    #[test]
    fn missing_file_is_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = SsoCacheInspector::new(dir.path());
        assert_eq!(inspector.check_cached_token_at(&session(), noon()).unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = SsoCacheInspector::new(dir.path());

        write_token(&inspector, "{not json");
        assert_eq!(inspector.check_cached_token_at(&session(), noon()).unwrap(), None);

        write_token(&inspector, r#"{"accessToken": "t"}"#);
        assert_eq!(inspector.check_cached_token_at(&session(), noon()).unwrap(), None);

        write_token(&inspector, r#"{"region": "us-east-1", "expiresAt": "tomorrow"}"#);
        assert_eq!(inspector.check_cached_token_at(&session(), noon()).unwrap(), None);
    }

    #[test]
    fn future_expiry_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = SsoCacheInspector::new(dir.path());
        write_token(
            &inspector,
            r#"{"accessToken": "t", "region": "us-east-1", "expiresAt": "2024-06-01T20:00:00Z"}"#,
        );

        let token = inspector
            .check_cached_token_at(&session(), noon())
            .unwrap()
            .unwrap();
        assert_eq!(token.status, TokenStatus::Valid);
        assert!(!token.is_expired());
        assert_eq!(token.expires_at, Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap());
        assert_eq!(token.raw["accessToken"], "t");
    }

    #[test]
    fn past_expiry_is_returned_but_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = SsoCacheInspector::new(dir.path());
        write_token(
            &inspector,
            r#"{"region": "us-east-1", "expiresAt": "2024-06-01T11:59:59UTC"}"#,
        );

        let token = inspector
            .check_cached_token_at(&session(), noon())
            .unwrap()
            .unwrap();
        assert_eq!(token.status, TokenStatus::Expired);
    }

    #[test]
    fn offset_timestamps_are_normalised_to_utc() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = SsoCacheInspector::new(dir.path());
        // 13:00 at +02:00 is 11:00 UTC, one hour before noon.
        write_token(
            &inspector,
            r#"{"region": "us-east-1", "expiresAt": "2024-06-01T13:00:00+02:00"}"#,
        );

        let token = inspector
            .check_cached_token_at(&session(), noon())
            .unwrap()
            .unwrap();
        assert!(token.is_expired());
    }

    #[test]
    fn region_mismatch_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let inspector = SsoCacheInspector::new(dir.path());
        write_token(
            &inspector,
            r#"{"region": "eu-west-1", "expiresAt": "2024-06-01T20:00:00Z"}"#,
        );

        let err = inspector
            .check_cached_token_at(&session(), noon())
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::CachedRegionMismatch { ref cached, ref configured, .. }
                if cached == "eu-west-1" && configured == "us-east-1"
        ));
    }

    #[test]
    fn session_requires_start_url_and_region() {
        let config = ConfigStore::from_sections([
            ProfileSection::new(SectionType::SsoSession, "corp")
                .with("sso_start_url", "https://corp.awsapps.com/start")
                .with("sso_region", "us-east-1"),
            ProfileSection::new(SectionType::SsoSession, "half")
                .with("sso_start_url", "https://half.awsapps.com/start"),
        ]);

        assert_eq!(SsoSession::load(&config, "corp", "p").unwrap(), session());
        assert!(matches!(
            SsoSession::load(&config, "half", "p"),
            Err(ConfigError::SsoSessionIncomplete { missing: "sso_region", .. })
        ));
        assert!(matches!(
            SsoSession::load(&config, "gone", "p"),
            Err(ConfigError::SsoSessionNotFound { .. })
        ));
    }
}
