//! CLI error handling

use std::fmt;
use std::path::PathBuf;

use pkgup_errors::{Error, UserFacingError};

/// Why a pkgupd invocation failed
#[derive(Debug)]
pub enum CliError {
    /// Config file, `PKGUP_*` override or `--root`
    Config(Error),
    /// The control server refused or failed the request
    Request(Error),
    /// A directory under the data root could not be created
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The result could not be written to stdout
    Output(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => {
                write!(f, "Configuration error: ")?;
                write_with_guidance(f, e)
            }
            CliError::Request(e) => write_with_guidance(f, e),
            CliError::DataDir { path, source } => {
                write!(f, "Cannot create data directory {}: {source}", path.display())
            }
            CliError::Output(e) => write!(f, "Failed to write result: {e}"),
        }
    }
}

fn write_with_guidance(f: &mut fmt::Formatter<'_>, e: &Error) -> fmt::Result {
    write!(f, "{}", e.user_message())?;
    if let Some(code) = e.user_code() {
        write!(f, "\n  Code: {code}")?;
    }
    if let Some(hint) = e.user_hint() {
        write!(f, "\n  Hint: {hint}")?;
    }
    if e.is_retryable() {
        write!(f, "\n  Retry: the daemon state is unchanged; run the command again.")?;
    }
    Ok(())
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) | CliError::Request(e) => Some(e),
            CliError::DataDir { source, .. } | CliError::Output(source) => Some(source),
        }
    }
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        match e {
            Error::Config(_) => CliError::Config(e),
            other => CliError::Request(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Output(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgup_errors::{ConfigError, UpdateError};

    #[test]
    fn test_config_errors_keep_their_hint() {
        let err: CliError = Error::from(ConfigError::MissingField {
            field: "root".into(),
        })
        .into();
        assert!(matches!(err, CliError::Config(_)));
        let text = err.to_string();
        assert!(text.starts_with("Configuration error: "));
        assert!(text.contains("Code: config.missing_field"));
        assert!(text.contains("general.root"));
    }

    #[test]
    fn test_request_errors_mark_retryable() {
        let err: CliError = Error::from(UpdateError::MonitorClosed).into();
        assert!(matches!(err, CliError::Request(_)));
        assert!(err.to_string().contains("Retry:"));

        let err: CliError = Error::from(UpdateError::NoPackageName).into();
        assert!(!err.to_string().contains("Retry:"));
    }
}
