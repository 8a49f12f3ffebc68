use std::path::PathBuf;
use std::process::ExitCode;

use crate::identity::IdentityError;

/// Problems with the shared config file or the SSO token cache contents.
///
/// These are never retried: the user has to fix their configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin}:{line}: {message}")]
    Parse {
        origin: String,
        line: usize,
        message: String,
    },

    #[error("profile `{name}` not found (known profiles: {})", .available.join(", "))]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("sso-session `{name}` referenced by profile `{profile}` not found")]
    SsoSessionNotFound { name: String, profile: String },

    #[error(
        "sso-session `{name}` is missing `{missing}`; both sso_start_url and sso_region are \
         required"
    )]
    SsoSessionIncomplete { name: String, missing: &'static str },

    #[error(
        "profile `{profile}` has an incomplete SSO attribute set; either all or none of \
         sso_session, sso_role_name, sso_account_id must be specified"
    )]
    IncompleteSsoAttributes { profile: String },

    #[error("cyclic profile chain: {} -> {next}", .chain.join(" -> "))]
    CyclicProfileChain { chain: Vec<String>, next: String },

    #[error(
        "cached token region `{cached}` does not match profile's configured SSO region \
         `{configured}` (sso-session `{session}`)"
    )]
    CachedRegionMismatch {
        session: String,
        cached: String,
        configured: String,
    },

    #[error("profile `{profile}` is not SSO-backed; console launch needs an sso-session")]
    ConsoleUnsupported { profile: String },
}

/// The external `sso login` flow did not complete.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sso login failed for profile `{profile}` ({status}){}", stderr_suffix(.stderr))]
    Failed {
        profile: String,
        status: String,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Terminal failure of [`crate::validator::IdentityValidator::validate`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Login(#[from] LoginError),

    #[error("unable to establish SSO session for profile `{profile}`: {source}")]
    SsoSessionUnavailable {
        profile: String,
        #[source]
        source: IdentityError,
    },

    #[error("failed to validate credentials for profile `{profile}`: {source}")]
    Identity {
        profile: String,
        #[source]
        source: IdentityError,
    },
}

impl AuthError {
    /// 1 identity failure, 2 configuration error, 3 login failure.
    pub fn exit_status(&self) -> u8 {
        match self {
            AuthError::SsoSessionUnavailable { .. } | AuthError::Identity { .. } => 1,
            AuthError::Config(_) => 2,
            AuthError::Login(_) => 3,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}
