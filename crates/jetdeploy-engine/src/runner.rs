use std::io;
use std::process::{Command, Output};
use std::time::{Duration, Instant};

use jetdeploy_core::errors::ExecError;
use jetdeploy_core::traits::{CommandOutcome, CommandRunner};
use tracing::warn;

/// Exit status `timeout(1)` reports when it kills the child. A command may
/// also exit 124 on its own, so a run only counts as timed out when the limit
/// has actually elapsed.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Runs each command through `<shell> -c`, optionally under `timeout(1)`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    timeout: Option<Duration>,
}

impl ShellRunner {
    pub fn new(shell: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    /// Whole seconds, as passed to `timeout(1)`.
    fn limit(&self) -> Option<Duration> {
        self.timeout.map(|t| Duration::from_secs(t.as_secs().max(1)))
    }

    fn shell_command(&self, command: &str) -> Command {
        let mut shell = Command::new(&self.shell);
        shell.arg("-c").arg(command);
        shell
    }

    fn output(&self, command: &str) -> Result<(Output, bool), ExecError> {
        let Some(limit) = self.limit() else {
            let output = self
                .shell_command(command)
                .output()
                .map_err(|e| ExecError::Spawn(format!("{}: {e}", self.shell)))?;
            return Ok((output, false));
        };

        let mut timeout_cmd = Command::new("timeout");
        timeout_cmd
            .arg(format!("{}s", limit.as_secs()))
            .arg(&self.shell)
            .arg("-c")
            .arg(command);

        match timeout_cmd.output() {
            Ok(output) => Ok((output, true)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                warn!("timeout(1) not found; running without a per-command timeout");
                let output = self
                    .shell_command(command)
                    .output()
                    .map_err(|e| ExecError::Spawn(format!("{}: {e}", self.shell)))?;
                Ok((output, false))
            }
            Err(error) => Err(ExecError::Spawn(format!("timeout: {error}"))),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new("bash", None)
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<CommandOutcome, ExecError> {
        let started = Instant::now();
        let (output, under_timeout) = self.output(command)?;
        let elapsed = started.elapsed();
        // killed by a signal: no exit code
        let return_code = output.status.code().unwrap_or(-1);
        Ok(CommandOutcome {
            return_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: under_timeout
                && return_code == TIMEOUT_EXIT_CODE
                && self.limit().is_some_and(|limit| elapsed >= limit),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_output_and_exit_code() {
        let runner = ShellRunner::new("sh", None);
        let out = runner.run("echo hello; echo oops >&2; exit 3").unwrap();
        assert_eq!(out.return_code, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.succeeded());
        assert!(!out.timed_out);
    }

    #[test]
    fn success_is_zero() {
        let out = ShellRunner::new("sh", None).run("true").unwrap();
        assert!(out.succeeded());
    }

    #[test]
    fn missing_shell_is_spawn_error() {
        let runner = ShellRunner::new("/nonexistent/shell-binary", None);
        assert!(matches!(runner.run("true"), Err(ExecError::Spawn(_))));
    }

    #[test]
    fn timeout_is_reported() {
        let runner = ShellRunner::new("sh", Some(Duration::from_secs(1)));
        let out = runner.run("sleep 5").unwrap();
        // without timeout(1) on the host the command simply finishes
        if out.return_code == TIMEOUT_EXIT_CODE {
            assert!(out.timed_out);
            assert!(!out.succeeded());
        }
    }

    #[test]
    fn own_exit_124_is_not_a_timeout() {
        let runner = ShellRunner::new("sh", Some(Duration::from_secs(30)));
        let out = runner.run("exit 124").unwrap();
        assert_eq!(out.return_code, TIMEOUT_EXIT_CODE);
        assert!(!out.timed_out);
    }
}
