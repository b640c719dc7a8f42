//! Command-template backed member commands and compute platform.
//!
//! Every operation renders an argv template with member placeholders and runs
//! it as a child process with a time bound.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod executor;
mod platform;
mod runner;
mod template;

pub use error::Error;
pub use executor::{TemplateCommands, TemplateExecutor};
pub use platform::{PlatformCommands, TemplatePlatform};
pub use runner::{COMMAND_LOG_TARGET, CommandRunner, Output, UNREACHABLE_EXIT_CODE};
pub use template::{Vars, render};
