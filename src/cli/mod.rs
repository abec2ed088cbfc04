//! Command-line interface for the poslink binary.
//!
//! ```ignore
//! use poslink::cli::{parse_args, CliCommand};
//!
//! match parse_args(std::env::args())? {
//!     CliCommand::Version => poslink::cli::handle_version_command(),
//!     CliCommand::Run(options) => run(options).await?,
//! }
//! ```

pub mod args;
pub mod version;

pub use args::{parse_args, ArgsError, CliCommand, RunOptions};
pub use version::{handle_version_command, version_line, VERSION};
