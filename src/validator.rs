//! Top-level flow: nickname, profile, classification, credential check, login, retry.
//!
//! ```text
//! requested name -> profile section -> classify
//!     Plain / Chained(plain root)  -> identity call            -> Validated | Failed
//!     SsoBacked / Chained(sso root) -> cache pre-flight
//!                                   -> identity call            -> Validated
//!                                      | SSO auth failure -> login
//!                                          -> identity call -> Validated | Failed
//! ```

use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::error::{AuthError, ConfigError};
use crate::identity::{IdentityService, ValidatedIdentity};
use crate::login::{LoginInvoker, SsoLoginOrchestrator};
use crate::nickname::NicknameMap;
use crate::profile::{resolve_root, ProfileIdentity, ProfileKind};
use crate::sso::{SsoCacheInspector, SsoSession};

/// Everything known about a requested profile before any credentials are touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub requested: String,
    pub profile: ProfileIdentity,
    /// Last profile of the `source_profile` chain, for chained profiles.
    pub root: Option<ProfileIdentity>,
    /// Session of the profile itself, or of the chain root when that is SSO-backed.
    pub sso_session: Option<SsoSession>,
}

impl ResolvedProfile {
    /// The profile an `sso login` has to run against to refresh this profile's credentials.
    pub fn login_profile(&self) -> Option<&str> {
        match self.profile.kind {
            ProfileKind::SsoBacked => Some(&self.profile.name),
            ProfileKind::Chained => self
                .root
                .as_ref()
                .filter(|root| root.kind == ProfileKind::SsoBacked)
                .map(|root| root.name.as_str()),
            ProfileKind::Plain => None,
        }
    }
}

pub struct IdentityValidator<'a, I, L> {
    config: &'a ConfigStore,
    nicknames: Option<&'a NicknameMap>,
    cache: SsoCacheInspector,
    identity: I,
    login: SsoLoginOrchestrator<L>,
}

impl<'a, I, L> IdentityValidator<'a, I, L>
where
    I: IdentityService,
    L: LoginInvoker,
{
    pub fn new(config: &'a ConfigStore, cache: SsoCacheInspector, identity: I, login: L) -> Self {
        Self {
            config,
            nicknames: None,
            cache,
            identity,
            login: SsoLoginOrchestrator::new(login),
        }
    }

    pub fn with_nicknames(mut self, nicknames: Option<&'a NicknameMap>) -> Self {
        self.nicknames = nicknames;
        self
    }

    pub fn identity_service(&self) -> &I {
        &self.identity
    }

    pub fn login_invoker(&self) -> &L {
        self.login.invoker()
    }

    /// Maps a nickname to its profile; unknown names are taken literally.
    pub fn profile_name(&self, requested: &str) -> String {
        match self.nicknames.and_then(|map| map.resolve(requested)) {
            Some(profile) => {
                info!("Nickname {} refers to profile {}", requested, profile);
                profile.to_string()
            }
            None => requested.to_string(),
        }
    }

    pub fn resolve(&self, requested: &str) -> Result<ResolvedProfile, ConfigError> {
        let name = self.profile_name(requested);
        let section = self.config.require_profile(&name).map_err(|e| {
            if let ConfigError::ProfileNotFound { available, .. } = &e {
                warn!("Profile {} not found. Available profiles:", name);
                for profile in available {
                    warn!("  {}", profile);
                }
            }
            e
        })?;
        let profile = ProfileIdentity::from_section(section)?;
        debug!("Profile {} classified as {:?}", profile.name, profile.kind);

        let (root, sso_session) = match profile.kind {
            ProfileKind::Plain => (None, None),
            ProfileKind::SsoBacked => (None, SsoSession::for_profile(self.config, &profile)?),
            ProfileKind::Chained => {
                let root_name = resolve_root(self.config, &profile.name)?;
                let root = ProfileIdentity::from_section(self.config.require_profile(&root_name)?)?;
                debug!(
                    "Chained profile {} resolves to root {} ({:?})",
                    profile.name, root.name, root.kind
                );
                let session = match root.kind {
                    ProfileKind::SsoBacked => SsoSession::for_profile(self.config, &root)?,
                    _ => None,
                };
                (Some(root), session)
            }
        };

        Ok(ResolvedProfile {
            requested: requested.to_string(),
            profile,
            root,
            sso_session,
        })
    }

    pub fn validate(&self, requested: &str) -> Result<ValidatedIdentity, AuthError> {
        let resolved = self.resolve(requested)?;
        self.validate_resolved(&resolved)
    }

    pub fn validate_resolved(
        &self,
        resolved: &ResolvedProfile,
    ) -> Result<ValidatedIdentity, AuthError> {
        let profile = resolved.profile.name.as_str();

        let Some(login_profile) = resolved.login_profile() else {
            return self
                .identity
                .caller_identity(profile)
                .map_err(|source| AuthError::Identity {
                    profile: profile.to_string(),
                    source,
                });
        };

        if let Some(session) = &resolved.sso_session {
            // Informational only: the identity call below decides.
            match self.cache.check_cached_token(session)? {
                Some(token) if !token.is_expired() => {
                    debug!("Cached token for {} looks usable", session.session_name)
                }
                _ => debug!("Cached token for {} is missing or stale", session.session_name),
            }
        }

        let first = match self.identity.caller_identity(profile) {
            Ok(identity) => return Ok(identity),
            Err(e) => e,
        };
        let Some(failure) = first.sso_failure() else {
            return Err(AuthError::Identity {
                profile: profile.to_string(),
                source: first,
            });
        };

        info!("No valid existing SSO token ({}), starting a new session", failure);
        self.login.login(login_profile)?;

        self.identity
            .caller_identity(profile)
            .map_err(|source| AuthError::SsoSessionUnavailable {
                profile: profile.to_string(),
                source,
            })
    }
}
