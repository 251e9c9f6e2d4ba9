use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("failed to launch browser: {0}")]
    BrowserLaunch(#[source] anyhow::Error),

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cookie jar {path}: {source}")]
    CookieJar {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input file not found: {path}")]
    InputMissing { path: PathBuf },

    #[error("{path} has no \"{column}\" column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("expected {expected} rows but collected {actual}")]
    RowCountMismatch { expected: usize, actual: usize },
}

impl ScoutError {
    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn navigation(url: &str, source: anyhow::Error) -> Self {
        Self::Navigation {
            url: url.to_string(),
            source,
        }
    }
}
