//! Profile classification and `source_profile` chain resolution.

use std::collections::HashSet;

use crate::config::{ConfigStore, ProfileSection};
use crate::error::ConfigError;

const SSO_ATTRIBUTES: [&str; 3] = ["sso_session", "sso_role_name", "sso_account_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Static or environment credentials.
    Plain,
    /// Assumes `role_arn` using credentials of `source_profile`.
    Chained,
    /// Backed by an `sso-session`.
    SsoBacked,
}

/// Classification of a profile section, derived on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileIdentity {
    pub name: String,
    pub kind: ProfileKind,
    pub source_profile: Option<String>,
    pub sso_session_name: Option<String>,
    pub sso_role_name: Option<String>,
    pub sso_account_id: Option<String>,
    pub region: Option<String>,
}

impl ProfileIdentity {
    pub fn from_section(section: &ProfileSection) -> Result<Self, ConfigError> {
        let kind = classify(section)?;
        let owned = |key: &str| section.get(key).map(str::to_string);
        Ok(Self {
            name: section.name().to_string(),
            kind,
            source_profile: owned("source_profile"),
            sso_session_name: owned("sso_session"),
            sso_role_name: owned("sso_role_name"),
            sso_account_id: owned("sso_account_id"),
            region: owned("region"),
        })
    }
}

/// All three SSO attributes make a profile SSO-backed; none of them leaves it plain or
/// chained. Anything in between is rejected.
pub fn classify(section: &ProfileSection) -> Result<ProfileKind, ConfigError> {
    let score = SSO_ATTRIBUTES
        .iter()
        .filter(|key| section.contains(key))
        .count();

    match score {
        3 => Ok(ProfileKind::SsoBacked),
        0 if section.contains("role_arn") && section.contains("source_profile") => {
            Ok(ProfileKind::Chained)
        }
        0 => Ok(ProfileKind::Plain),
        _ => Err(ConfigError::IncompleteSsoAttributes {
            profile: section.name().to_string(),
        }),
    }
}

/// Follows `source_profile` links from `profile` and returns the last profile in the chain.
pub fn resolve_root(config: &ConfigStore, profile: &str) -> Result<String, ConfigError> {
    let mut chain: Vec<String> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = profile.to_string();

    loop {
        let section = config.require_profile(&current)?;
        let next = match section.get("source_profile") {
            Some(next) => next.to_string(),
            None => return Ok(current),
        };

        visited.insert(current.clone());
        chain.push(current);

        if visited.contains(&next) {
            return Err(ConfigError::CyclicProfileChain { chain, next });
        }
        current = next;
    }
}
