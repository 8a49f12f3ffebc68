//! Opening the AWS console for an SSO-backed profile via `aws-sso-util`.

use std::process::{Child, Command};

use tracing::info;

use crate::error::ConfigError;
use crate::profile::ProfileKind;
use crate::validator::ResolvedProfile;

pub const CONSOLE_PROGRAM: &str = "aws-sso-util";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLaunch {
    args: Vec<String>,
}

impl ConsoleLaunch {
    pub fn for_profile(resolved: &ResolvedProfile) -> Result<Self, ConfigError> {
        let profile = &resolved.profile;
        let unsupported = || ConfigError::ConsoleUnsupported {
            profile: profile.name.clone(),
        };
        if profile.kind != ProfileKind::SsoBacked {
            return Err(unsupported());
        }
        let session = resolved.sso_session.as_ref().ok_or_else(unsupported)?;
        let (Some(account), Some(role)) = (&profile.sso_account_id, &profile.sso_role_name) else {
            return Err(unsupported());
        };

        let base: [&str; 10] = [
            "console",
            "launch",
            "--sso-start-url",
            &session.start_url,
            "--sso-region",
            &session.region,
            "--account-id",
            account,
            "--role-name",
            role,
        ];
        let mut args: Vec<String> = base.iter().map(|arg| arg.to_string()).collect();
        if let Some(region) = &profile.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        Ok(Self { args })
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Starts the launcher without waiting for it.
    pub fn spawn(&self) -> std::io::Result<Child> {
        info!("{} {}", CONSOLE_PROGRAM, self.args.join(" "));
        Command::new(CONSOLE_PROGRAM).args(&self.args).spawn()
    }
}
