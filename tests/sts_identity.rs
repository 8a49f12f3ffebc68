//! Runs the live STS identity service against throwaway config files. Every case fails while
//! building or resolving credentials, so no request ever leaves the machine.

use std::path::Path;
use std::sync::OnceLock;

use awsprofile::identity::{IdentityFailureKind, IdentityService, StsIdentityService};
use tempfile::TempDir;

const CONFIG: &str = r#"
[profile prod-admin]
sso_session = corp
sso_account_id = 111122223333
sso_role_name = AdministratorAccess
region = eu-west-1

[sso-session corp]
sso_start_url = https://corp.awsapps.com/start
sso_region = us-east-1
"#;

static HOME: OnceLock<TempDir> = OnceLock::new();

/// Points the SDK at a temporary home with the config above and an empty SSO token cache.
fn isolated_home() -> &'static Path {
    HOME.get_or_init(|| {
        let home = tempfile::tempdir().unwrap();
        let aws_dir = home.path().join(".aws");
        std::fs::create_dir_all(aws_dir.join("sso").join("cache")).unwrap();
        std::fs::write(aws_dir.join("config"), CONFIG).unwrap();

        for var in [
            "AWS_PROFILE",
            "AWS_DEFAULT_PROFILE",
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
            "AWS_SESSION_TOKEN",
            "AWS_WEB_IDENTITY_TOKEN_FILE",
            "AWS_ROLE_ARN",
            "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
            "AWS_CONTAINER_CREDENTIALS_FULL_URI",
        ] {
            std::env::remove_var(var);
        }
        std::env::set_var("HOME", home.path());
        std::env::set_var("AWS_CONFIG_FILE", aws_dir.join("config"));
        std::env::set_var("AWS_SHARED_CREDENTIALS_FILE", aws_dir.join("credentials"));
        std::env::set_var("AWS_EC2_METADATA_DISABLED", "true");
        home
    })
    .path()
}

#[test]
fn sso_session_profile_fails_on_the_missing_token() {
    isolated_home();
    let sts = StsIdentityService::new(None).unwrap();

    let err = sts.caller_identity("prod-admin").unwrap_err();
    assert!(
        matches!(err.kind, IdentityFailureKind::SsoAuth(_)),
        "expected an SSO token failure, got {err:?}"
    );
    assert!(!err.message.contains("sso_region"), "{}", err.message);
    assert!(!err.message.contains("not properly configured"), "{}", err.message);
}

#[test]
fn undefined_profile_is_not_an_sso_failure() {
    isolated_home();
    let sts = StsIdentityService::new(Some("us-east-1".to_string())).unwrap();

    let err = sts.caller_identity("sso-nowhere").unwrap_err();
    assert_eq!(err.kind, IdentityFailureKind::Other, "{}", err.message);
}
