//! Caller-identity confirmation.
//!
//! [`IdentityService`] is the seam the validator talks to; [`StsIdentityService`] is the live
//! implementation, calling STS `GetCallerIdentity` with the SDK's profile-based credentials.

use std::error::Error as StdError;
use std::fmt;

use aws_config::meta::region::RegionProviderChain;
use aws_config::profile::ProfileFileRegionProvider;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::error::CredentialsError;
use aws_sdk_sts::error::{ProvideErrorMetadata, SdkError};
use aws_types::region::Region;
use tokio::runtime::Runtime;
use tracing::debug;

/// Who the credentials of a profile belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIdentity {
    pub account_id: String,
    pub arn: String,
    pub user_id: String,
}

/// SSO token problems that a fresh `sso login` can fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsoAuthFailure {
    TokenLoad,
    Expired,
    Unauthorized,
    TokenRetrieval,
    NoAuthToken,
    Sso,
}

impl fmt::Display for SsoAuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SsoAuthFailure::TokenLoad => "SSO token could not be loaded",
            SsoAuthFailure::Expired => "SSO token expired",
            SsoAuthFailure::Unauthorized => "SSO token unauthorized",
            SsoAuthFailure::TokenRetrieval => "SSO token retrieval failed",
            SsoAuthFailure::NoAuthToken => "no SSO auth token",
            SsoAuthFailure::Sso => "SSO error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityFailureKind {
    SsoAuth(SsoAuthFailure),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct IdentityError {
    pub kind: IdentityFailureKind,
    pub message: String,
}

impl IdentityError {
    pub fn sso(failure: SsoAuthFailure, message: impl Into<String>) -> Self {
        Self {
            kind: IdentityFailureKind::SsoAuth(failure),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: IdentityFailureKind::Other,
            message: message.into(),
        }
    }

    pub fn sso_failure(&self) -> Option<SsoAuthFailure> {
        match self.kind {
            IdentityFailureKind::SsoAuth(failure) => Some(failure),
            IdentityFailureKind::Other => None,
        }
    }
}

pub trait IdentityService {
    fn caller_identity(&self, profile: &str) -> Result<ValidatedIdentity, IdentityError>;
}

/// How the SDK's credentials provider failed, when it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsFailure {
    /// No credentials were found, or the profile could not be turned into a provider.
    Configuration,
    /// The provider was built but failed while fetching credentials.
    Provider,
}

impl CredentialsFailure {
    fn of(err: &CredentialsError) -> Self {
        match err {
            CredentialsError::CredentialsNotLoaded(_)
            | CredentialsError::InvalidConfiguration(_) => CredentialsFailure::Configuration,
            _ => CredentialsFailure::Provider,
        }
    }
}

/// Sorts a failed identity call into an [`SsoAuthFailure`].
///
/// Service codes for expired or unauthorized tokens always count. Otherwise only a failure of
/// the credentials provider itself can be an SSO failure, and its rendered error chain decides
/// which one.
pub fn classify_failure(
    code: Option<&str>,
    credentials: Option<CredentialsFailure>,
    message: &str,
) -> IdentityFailureKind {
    match code {
        Some("ExpiredToken") | Some("ExpiredTokenException") => {
            return IdentityFailureKind::SsoAuth(SsoAuthFailure::Expired)
        }
        Some("UnauthorizedException") => {
            return IdentityFailureKind::SsoAuth(SsoAuthFailure::Unauthorized)
        }
        _ => {}
    }

    if credentials != Some(CredentialsFailure::Provider) {
        return IdentityFailureKind::Other;
    }

    let message = message.to_lowercase();
    if !message.contains("sso") && !message.contains("token") {
        return IdentityFailureKind::Other;
    }

    let failure = if message.contains("expired") {
        SsoAuthFailure::Expired
    } else if message.contains("unauthorized") {
        SsoAuthFailure::Unauthorized
    } else if message.contains("no auth token")
        || message.contains("no sso token")
        || message.contains("token was not found")
    {
        SsoAuthFailure::NoAuthToken
    } else if message.contains("cache")
        || message.contains("no such file")
        || message.contains("load")
    {
        SsoAuthFailure::TokenLoad
    } else if message.contains("refresh") || message.contains("retriev") {
        SsoAuthFailure::TokenRetrieval
    } else if message.contains("sso") {
        SsoAuthFailure::Sso
    } else {
        return IdentityFailureKind::Other;
    };
    IdentityFailureKind::SsoAuth(failure)
}

/// Joins an error and all of its sources, the way the SDK's `DisplayErrorContext` does, and
/// reports the outermost [`CredentialsError`] found on the way.
fn render_chain(err: &(dyn StdError + 'static)) -> (String, Option<CredentialsFailure>) {
    let mut rendered = err.to_string();
    let mut credentials = err.downcast_ref::<CredentialsError>().map(CredentialsFailure::of);
    let mut source = err.source();
    while let Some(inner) = source {
        rendered.push_str(": ");
        rendered.push_str(&inner.to_string());
        if credentials.is_none() {
            credentials = inner
                .downcast_ref::<CredentialsError>()
                .map(CredentialsFailure::of);
        }
        source = inner.source();
    }
    (rendered, credentials)
}

/// Live identity check against STS, driven to completion on a private runtime.
pub struct StsIdentityService {
    runtime: Runtime,
    fallback_region: Option<String>,
}

impl StsIdentityService {
    pub fn new(fallback_region: Option<String>) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            fallback_region,
        })
    }

    async fn get_caller_identity(
        &self,
        profile: &str,
    ) -> Result<ValidatedIdentity, IdentityError> {
        let mut region = RegionProviderChain::first_try(
            ProfileFileRegionProvider::builder()
                .profile_name(profile)
                .build(),
        )
        .or_default_provider();
        if let Some(fallback) = &self.fallback_region {
            region = region.or_else(Region::new(fallback.clone()));
        }

        let config = aws_config::defaults(BehaviorVersion::latest())
            .profile_name(profile)
            .region(region)
            .load()
            .await;

        let sts = aws_sdk_sts::Client::new(&config);
        let output = sts.get_caller_identity().send().await.map_err(|e| {
            let code = match &e {
                SdkError::ServiceError(service) => service.err().code(),
                _ => None,
            };
            let (message, credentials) = render_chain(&e);
            debug!(
                "GetCallerIdentity for {} failed (credentials provider: {:?}): {}",
                profile, credentials, message
            );
            IdentityError {
                kind: classify_failure(code, credentials, &message),
                message,
            }
        })?;

        Ok(ValidatedIdentity {
            account_id: output.account().unwrap_or_default().to_string(),
            arn: output.arn().unwrap_or_default().to_string(),
            user_id: output.user_id().unwrap_or_default().to_string(),
        })
    }
}

impl IdentityService for StsIdentityService {
    fn caller_identity(&self, profile: &str) -> Result<ValidatedIdentity, IdentityError> {
        self.runtime.block_on(self.get_caller_identity(profile))
    }
}
