//! Command-line argument parsing for the poslink binary.

use thiserror::Error;

/// What the binary should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Connect and keep the link alive until interrupted
    Run(RunOptions),
}

/// Options for [`CliCommand::Run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Pin this address and switch to manual mode
    pub manual_url: Option<String>,
    /// Addresses the candidate discovery probes, in order
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("{0} requires a URL")]
    MissingValue(&'static str),
}

/// Parse command-line arguments (program name first).
///
/// Unknown flags are ignored.
///
/// # Examples
///
/// ```
/// use poslink::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["poslink".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), Ok(CliCommand::Version));
/// ```
pub fn parse_args<I>(args: I) -> Result<CliCommand, ArgsError>
where
    I: Iterator<Item = String>,
{
    let mut options = RunOptions::default();
    let mut args = args.skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(CliCommand::Version),
            "--manual" => {
                let url = args.next().ok_or(ArgsError::MissingValue("--manual"))?;
                options.manual_url = Some(url);
            }
            "--candidate" => {
                let url = args.next().ok_or(ArgsError::MissingValue("--candidate"))?;
                options.candidates.push(url);
            }
            _ => {}
        }
    }
    Ok(CliCommand::Run(options))
}
