use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IimError {
    #[error("missing setting {0}: set it in the environment or in .env")]
    MissingSetting(&'static str),

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("{}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{}: no tracker issue key found (add a 'Jira' field to the report)", path.display())]
    MissingIdentifier { path: PathBuf },

    #[error("issue not found: {0}")]
    IssueNotFound(String),

    #[error("invalid issue key '{0}'")]
    InvalidIssueKey(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("{context}: {message}")]
    Remote { context: String, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Broad classification used by the CLI to pick exit codes and by callers
/// that only care whether a failure was local or remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Parse,
    Lookup,
    Remote,
    Io,
}

impl IimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IimError::MissingSetting(_) | IimError::InvalidSetting { .. } | IimError::Yaml(_) => {
                ErrorKind::Config
            }
            IimError::Parse { .. }
            | IimError::MissingIdentifier { .. }
            | IimError::UnknownField(_) => ErrorKind::Parse,
            IimError::IssueNotFound(_) | IimError::InvalidIssueKey(_) => ErrorKind::Lookup,
            IimError::Remote { .. } | IimError::Http(_) | IimError::Json(_) => ErrorKind::Remote,
            IimError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        IimError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn remote(context: impl Into<String>, message: impl fmt::Display) -> Self {
        IimError::Remote {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_each_failure_class() {
        assert_eq!(IimError::MissingSetting("JIRA_URL").kind(), ErrorKind::Config);
        assert_eq!(IimError::parse("a.md", "bad").kind(), ErrorKind::Parse);
        assert_eq!(
            IimError::MissingIdentifier {
                path: "a.md".into()
            }
            .kind(),
            ErrorKind::Parse
        );
        assert_eq!(IimError::IssueNotFound("IIM-1".into()).kind(), ErrorKind::Lookup);
        assert_eq!(IimError::remote("search", "503").kind(), ErrorKind::Remote);
    }

    #[test]
    fn parse_error_names_the_file() {
        let e = IimError::parse("reports/outage.md", "bad timestamp in 'detected'");
        assert_eq!(e.to_string(), "reports/outage.md: bad timestamp in 'detected'");
    }
}
