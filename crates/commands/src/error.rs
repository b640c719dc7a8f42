use std::time::Duration;

use galera_cluster::{ComputePlatformError, ErrorKind, MemberCommandsError};
use thiserror::Error;

use crate::runner::UNREACHABLE_EXIT_CODE;

/// Errors that can occur while running command templates.
#[derive(Debug, Error)]
pub enum Error {
    /// The template renders to an empty argv.
    #[error("{0} command template is empty")]
    EmptyTemplate(&'static str),

    /// The program could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the program's output failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The program did not finish in time and was killed.
    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        /// Program that was killed.
        program: String,
        /// Time bound that elapsed.
        timeout: Duration,
    },

    /// The program exited with a non-zero code.
    #[error("{program} exited with code {code}")]
    Exit {
        /// Program that failed.
        program: String,
        /// Exit code.
        code: i32,
    },

    /// The program was terminated by a signal.
    #[error("{program} was terminated by a signal")]
    Signal {
        /// Program that was terminated.
        program: String,
    },

    /// The program's output does not follow the contract.
    #[error("cannot parse output of {program}: {message}")]
    Parse {
        /// Program whose output was rejected.
        program: String,
        /// What was wrong.
        message: String,
    },
}

impl Error {
    const fn error_kind(&self) -> ErrorKind {
        match self {
            Self::EmptyTemplate(_) => ErrorKind::Invalid,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Exit { code, .. } if *code == UNREACHABLE_EXIT_CODE => ErrorKind::Unreachable,
            Self::Spawn { .. }
            | Self::Io(_)
            | Self::Exit { .. }
            | Self::Signal { .. }
            | Self::Parse { .. } => ErrorKind::Failed,
        }
    }
}

impl MemberCommandsError for Error {
    fn kind(&self) -> ErrorKind {
        self.error_kind()
    }
}

impl ComputePlatformError for Error {
    fn kind(&self) -> ErrorKind {
        self.error_kind()
    }
}
