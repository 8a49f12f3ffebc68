//! AWS profile resolution and SSO session validation.
//!
//! Given a profile name or nickname, [`validator::IdentityValidator`] finds the profile in the
//! shared config file, classifies it, checks the SSO token cache, runs `aws sso login` when the
//! SSO session has lapsed, and confirms the resulting credentials with STS.

pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod identity;
pub mod login;
pub mod nickname;
pub mod profile;
pub mod sso;
pub mod validator;

pub use config::{ConfigStore, ProfileSection, SectionType};
pub use error::{AuthError, ConfigError, LoginError};
pub use identity::{IdentityError, IdentityService, SsoAuthFailure, ValidatedIdentity};
pub use login::{LoginInvoker, LoginOutput};
pub use validator::{IdentityValidator, ResolvedProfile};
