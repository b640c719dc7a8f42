//! Running one rendered command as a child process.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::Error;

/// Exit code a command uses to say the member could not be reached at all
/// (the convention `ssh` follows).
pub const UNREACHABLE_EXIT_CODE: i32 = 255;

/// Tracing target for lines a command writes to stderr.
pub const COMMAND_LOG_TARGET: &str = "galera-command";

/// What a finished command produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Output {
    /// Exit code.
    pub code: i32,

    /// Everything written to stdout.
    pub stdout: String,
}

impl Output {
    /// Whether the command exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.code == 0
    }

    /// Whitespace-separated `key=value` tokens on stdout.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.stdout
            .split_whitespace()
            .filter_map(|token| token.split_once('='))
    }

    /// Value of the first `key=value` token with the given key.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.pairs().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Last non-empty stdout line.
    #[must_use]
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
    }
}

/// Runs argv vectors with a time bound.
///
/// Children are killed when the bound elapses or the returned future is
/// dropped.
#[derive(Clone, Debug)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl CommandRunner {
    /// Creates a runner killing commands after `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs `argv` with extra environment variables and returns its exit code and stdout.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started, times out or is
    /// killed by a signal. A non-zero exit is not an error here.
    pub async fn run(&self, argv: &[String], env: &[(String, String)]) -> Result<Output, Error> {
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::EmptyTemplate("command"));
        };

        debug!(%program, ?args, "running command");

        tokio::time::timeout(self.timeout, execute(program, args, env))
            .await
            .map_err(|_| Error::Timeout {
                program: program.clone(),
                timeout: self.timeout,
            })?
    }

    /// Runs `argv` and fails unless it exits with code 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot run or exits non-zero.
    pub async fn run_checked(
        &self,
        argv: &[String],
        env: &[(String, String)],
    ) -> Result<Output, Error> {
        let output = self.run(argv, env).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::Exit {
                program: argv.first().cloned().unwrap_or_default(),
                code: output.code,
            })
        }
    }
}

async fn execute(
    program: &str,
    args: &[String],
    env: &[(String, String)],
) -> Result<Output, Error> {
    let mut child = Command::new(program)
        .args(args)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| Error::Spawn {
            program: program.to_string(),
            source,
        })?;

    let (Some(mut stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(Error::Parse {
            program: program.to_string(),
            message: "output not captured".to_string(),
        });
    };

    let collect = async {
        let mut out = String::new();
        stdout.read_to_string(&mut out).await.map(|_| out)
    };
    let forward = async {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: COMMAND_LOG_TARGET, %program, "{line}");
        }
    };

    let (stdout, (), status) = tokio::join!(collect, forward, child.wait());
    let stdout = stdout?;
    let code = status?.code().ok_or_else(|| Error::Signal {
        program: program.to_string(),
    })?;
    trace!(%program, code, %stdout, "command finished");

    Ok(Output { code, stdout })
}
