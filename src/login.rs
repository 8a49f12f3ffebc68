//! Interactive `sso login` through an external tool.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;

use tracing::info;

use crate::error::LoginError;

/// Captured result of one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl LoginOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn status(&self) -> String {
        match self.code {
            Some(code) => format!("exit status: {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

pub trait LoginInvoker {
    /// Runs the login flow for `profile` and blocks until it finishes.
    fn invoke(&self, profile: &str) -> Result<LoginOutput, LoginError>;
}

/// Runs `<program> sso login --profile <name>`.
#[derive(Debug, Clone)]
pub struct AwsCliLogin {
    program: String,
}

impl AwsCliLogin {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AwsCliLogin {
    fn default() -> Self {
        Self::new("aws")
    }
}

impl AwsCliLogin {
    /// Runs the login and hands every line of stdout and stderr to `on_line` while the process
    /// is still running. The device URL and code only appear there when no browser can be
    /// opened.
    pub fn run(
        &self,
        profile: &str,
        on_line: &(dyn Fn(&str) + Sync),
    ) -> Result<LoginOutput, LoginError> {
        let mut child = Command::new(&self.program)
            .args(["sso", "login", "--profile", profile])
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LoginError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr) = thread::scope(|scope| {
            let stderr_reader = scope.spawn(|| relay_lines(stderr, on_line));
            let stdout = relay_lines(stdout, on_line);
            (stdout, stderr_reader.join().unwrap_or_default())
        });

        let status = child.wait().map_err(|source| LoginError::Wait {
            program: self.program.clone(),
            source,
        })?;

        Ok(LoginOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

impl LoginInvoker for AwsCliLogin {
    fn invoke(&self, profile: &str) -> Result<LoginOutput, LoginError> {
        self.run(profile, &|line: &str| {
            if !line.trim().is_empty() {
                info!("sso login: {}", line);
            }
        })
    }
}

/// Reads `stream` line by line until it closes, passing each line on and keeping a copy.
fn relay_lines<R: Read>(stream: Option<R>, on_line: &(dyn Fn(&str) + Sync)) -> String {
    let mut collected = String::new();
    let Some(stream) = stream else {
        return collected;
    };
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else {
            break;
        };
        on_line(&line);
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

/// Triggers a login and turns a non-zero exit into [`LoginError::Failed`]. Never retries.
#[derive(Debug, Clone)]
pub struct SsoLoginOrchestrator<L> {
    invoker: L,
}

impl<L: LoginInvoker> SsoLoginOrchestrator<L> {
    pub fn new(invoker: L) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &L {
        &self.invoker
    }

    pub fn login(&self, profile: &str) -> Result<(), LoginError> {
        info!("No valid SSO session for {}, starting sso login", profile);
        let output = self.invoker.invoke(profile)?;

        if !output.success() {
            return Err(LoginError::Failed {
                profile: profile.to_string(),
                status: output.status(),
                stderr: output.stderr,
            });
        }

        info!("SSO login for {} completed", profile);
        Ok(())
    }
}
