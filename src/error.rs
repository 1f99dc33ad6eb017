use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::driver::Locator;

/// Failure of a single browser primitive.
#[derive(Debug, Error)]
pub(crate) enum DriverError {
    #[error("timed out after {waited:?} waiting for {locator}")]
    Timeout { locator: Locator, waited: Duration },
    #[error(transparent)]
    Browser(#[from] anyhow::Error)
}


/// Failures that end a scrape before any listing is read.
#[derive(Debug, Error)]
pub(crate) enum ScrapeError {
    #[error("failed to launch the browser")]
    Launch(#[source] DriverError),
    #[error("failed to open {url}")]
    Navigation { url: String, #[source] source: DriverError },
    #[error("search field never appeared")]
    SearchUnavailable(#[source] DriverError),
    #[error("failed to submit the search for '{term}'")]
    Search { term: String, #[source] source: DriverError },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError)
}


/// Failures that skip one listing and let the run continue.
#[derive(Debug, Error)]
pub(crate) enum ListingError {
    #[error("listing at position {0} disappeared from the results view")]
    Vanished(usize),
    #[error("could not read the {field} of the listing")]
    MissingField { field: &'static str, #[source] source: Option<DriverError> },
    #[error("could not open the listing detail view")]
    Open(#[source] DriverError)
}


#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("failed to access {}", path.display())]
    Io { path: PathBuf, #[source] source: io::Error },
    #[error("malformed record in {}", path.display())]
    Csv { path: PathBuf, #[source] source: csv::Error },
    #[error("unexpected columns in {}: {problem}", path.display())]
    Layout { path: PathBuf, problem: String }
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>) -> impl FnOnce(csv::Error) -> Self {
        let path = path.into();
        move |source| Self::Csv { path, source }
    }
}


#[derive(Debug, Error)]
pub(crate) enum CleanError {
    #[error("invalid exclusion keyword pattern")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Store(#[from] StoreError)
}


#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read { path: PathBuf, #[source] source: io::Error },
    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("invalid selector '{selector}' in [{section}]")]
    Selector { section: &'static str, selector: String }
}
