use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes of the detection-and-reporting pipeline.
///
/// `Input` is the only user-correctable class; everything else is an
/// operator problem and maps to a server-side failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history log {} unusable: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    #[error("report generation failed: {message} (hint: {hint})")]
    Report { message: String, hint: &'static str },

    #[error("model error: {0}")]
    Model(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn input(msg: impl Into<String>) -> Self {
        Error::Input(msg.into())
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn persistence(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Error::Persistence {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn report(message: impl Into<String>, hint: &'static str) -> Self {
        Error::Report {
            message: message.into(),
            hint,
        }
    }

    /// True when the caller can fix the problem by sending different input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Input(_))
    }

    /// HTTP status code the request boundary should answer with.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() { 400 } else { 500 }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Internal(format!("blocking task failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_input_errors_are_client_errors() {
        assert_eq!(Error::input("no file").status_code(), 400);
        assert_eq!(Error::Model("missing".into()).status_code(), 500);
        assert_eq!(
            Error::persistence("history.json", "expected a list").status_code(),
            500
        );
        assert_eq!(Error::report("boom", "check the font").status_code(), 500);
    }

    #[test]
    fn report_errors_carry_a_hint() {
        let err = Error::report("cannot write report.pdf", "is the output directory writable?");
        let msg = err.to_string();
        assert!(msg.contains("cannot write report.pdf"));
        assert!(msg.contains("writable"));
    }
}
