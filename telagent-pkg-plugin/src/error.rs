use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The queried pattern matched nothing that is installed.
    #[error("package is not found")]
    PackageNotFound,

    #[error("package repository is not found")]
    RepositoryNotFound,

    #[error("unexpected package repository line: {0:?}")]
    UnexpectedRepositoryLine(String),

    #[error("unexpected configured package repository line: {0:?}")]
    UnexpectedConfiguredRepositoryLine(String),

    #[error("failed to parse repository url {url:?}: {source}")]
    InvalidRepositoryUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The command ran but exited unsuccessfully. `output` holds stdout followed by stderr.
    #[error("{program} exited with {}", exit_code(.code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    CommandTimeout { program: String, timeout: Duration },

    #[error("failed to execute {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no package manager found")]
    NoPackageManager,
}

impl Error {
    /// True for the expected "nothing installed" outcome, which callers skip silently.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::PackageNotFound | Error::RepositoryNotFound)
    }
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_variants() {
        assert!(Error::PackageNotFound.is_not_found());
        assert!(Error::RepositoryNotFound.is_not_found());
        assert!(!Error::NoPackageManager.is_not_found());
        assert!(!Error::UnexpectedRepositoryLine("100".to_string()).is_not_found());
    }

    #[test]
    fn command_failed_message() {
        let err = Error::CommandFailed {
            program: "dpkg-query".to_string(),
            code: Some(1),
            output: String::new(),
        };
        assert_eq!(err.to_string(), "dpkg-query exited with exit status 1");

        let err = Error::CommandFailed {
            program: "rpm".to_string(),
            code: None,
            output: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "rpm exited with no exit status (terminated by signal)"
        );
    }
}
