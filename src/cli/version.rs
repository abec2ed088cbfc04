//! `--version` for the poslink binary.

/// Crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The line `--version` prints.
pub fn version_line() -> String {
    format!("poslink {}", VERSION)
}

/// Print the version and exit successfully.
pub fn handle_version_command() -> ! {
    println!("{}", version_line());
    std::process::exit(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_line_is_semver() {
        let line = version_line();
        let version = line.strip_prefix("poslink ").unwrap();
        assert!(version.split('.').count() >= 2);
    }
}
