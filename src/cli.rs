use std::path::PathBuf;

use clap::Parser;

pub const NICKNAMES_FILE_NAME: &str = ".awsprofile";

#[derive(Debug, Parser)]
#[command(name = "awsprofile")]
#[command(about = "Resolve an AWS profile (or nickname), make sure its SSO session is live, and confirm the caller identity")]
#[command(version)]
pub struct Cli {
    /// AWS profile name or nickname
    pub profile: String,

    /// Shared config file (defaults to ~/.aws/config)
    #[arg(long, env = "AWS_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Directory holding cached SSO tokens (defaults to ~/.aws/sso/cache)
    #[arg(long, env = "AWS_SSO_CACHE_DIR")]
    pub sso_cache_dir: Option<PathBuf>,

    /// Nickname file of `nickname:profile` lines
    #[arg(long, env = "AWSPROFILE_NICKNAMES")]
    pub nicknames_file: Option<PathBuf>,

    /// Program used to run `sso login`
    #[arg(long, default_value = "aws")]
    pub aws_cli: String,

    /// Region for the identity call when the profile does not set one
    #[arg(short, long)]
    pub region: Option<String>,

    /// Open the AWS console for the profile after validation (SSO profiles only)
    #[arg(long)]
    pub console: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn config_file(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| aws_dir().join("config"))
    }

    pub fn sso_cache_dir(&self) -> PathBuf {
        self.sso_cache_dir
            .clone()
            .unwrap_or_else(|| aws_dir().join("sso").join("cache"))
    }

    /// Explicit path, else `.awsprofile` in the dev container workspace, else in the
    /// current directory.
    pub fn nicknames_file(&self) -> PathBuf {
        if let Some(path) = &self.nicknames_file {
            return path.clone();
        }
        match std::env::var_os("DEVCONTAINER_WORKSPACE_FOLDER") {
            Some(workspace) => PathBuf::from(workspace).join(NICKNAMES_FILE_NAME),
            None => PathBuf::from(NICKNAMES_FILE_NAME),
        }
    }

    pub fn log_filter(&self) -> String {
        let level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        format!("awsprofile={level},aws_config=warn,aws_smithy_runtime=warn,aws_sdk_sts=warn,hyper=warn")
    }
}

fn aws_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".aws")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_paths_win() {
        let cli = Cli::try_parse_from([
            "awsprofile",
            "prod",
            "--config-file",
            "/tmp/config",
            "--sso-cache-dir",
            "/tmp/cache",
            "--nicknames-file",
            "/tmp/nicks",
            "--console",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.profile, "prod");
        assert_eq!(cli.config_file(), PathBuf::from("/tmp/config"));
        assert_eq!(cli.sso_cache_dir(), PathBuf::from("/tmp/cache"));
        assert_eq!(cli.nicknames_file(), PathBuf::from("/tmp/nicks"));
        assert!(cli.console);
        assert_eq!(cli.aws_cli, "aws");
        assert!(cli.log_filter().starts_with("awsprofile=trace"));
    }

    #[test]
    fn profile_argument_is_required() {
        assert!(Cli::try_parse_from(["awsprofile"]).is_err());
    }

    #[test]
    fn defaults_live_under_dot_aws() {
        let cli = Cli {
            profile: "dev".to_string(),
            config_file: None,
            sso_cache_dir: None,
            nicknames_file: None,
            aws_cli: "aws".to_string(),
            region: None,
            console: false,
            verbose: 0,
        };
        assert!(cli.config_file().ends_with(".aws/config"));
        assert!(cli.sso_cache_dir().ends_with(".aws/sso/cache"));
        assert!(cli.log_filter().starts_with("awsprofile=info"));
    }
}
