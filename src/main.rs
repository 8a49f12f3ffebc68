use std::process::ExitCode;

use awsprofile::cli::Cli;
use awsprofile::console::ConsoleLaunch;
use awsprofile::identity::StsIdentityService;
use awsprofile::login::AwsCliLogin;
use awsprofile::nickname::NicknameMap;
use awsprofile::sso::SsoCacheInspector;
use awsprofile::{AuthError, ConfigStore, IdentityValidator};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = match ConfigStore::load(&cli.config_file()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return AuthError::from(e).exit_code();
        }
    };
    let nicknames = NicknameMap::load(&cli.nicknames_file());

    let sts = match StsIdentityService::new(cli.region.clone()) {
        Ok(sts) => sts,
        Err(e) => {
            error!("failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let validator = IdentityValidator::new(
        &config,
        SsoCacheInspector::new(cli.sso_cache_dir()),
        sts,
        AwsCliLogin::new(cli.aws_cli.clone()),
    )
    .with_nicknames(nicknames.as_ref());

    let resolved = match validator.resolve(&cli.profile) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("{}", e);
            return AuthError::from(e).exit_code();
        }
    };

    let identity = match validator.validate_resolved(&resolved) {
        Ok(identity) => identity,
        Err(e) => {
            error!("{}", e);
            return e.exit_code();
        }
    };

    info!("Validated profile {}", resolved.profile.name);
    println!("Account: {}", identity.account_id);
    println!("Arn:     {}", identity.arn);
    println!("UserId:  {}", identity.user_id);

    if cli.console {
        match ConsoleLaunch::for_profile(&resolved) {
            Ok(launch) => {
                if let Err(e) = launch.spawn() {
                    warn!("failed to launch console: {}", e);
                }
            }
            Err(e) => warn!("{}", e),
        }
    }

    ExitCode::SUCCESS
}
