//! Failure taxonomy shared by the preferences store and schedule resolver.

use std::{io, path::PathBuf};

use crate::models::WorldId;

/// Coarse failure classes surfaced to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No preferences file was found by any method.
    UnresolvedLocation,
    /// The preferences file exists but is not the expected XML.
    ParseFailure,
    /// Requested world id is outside the vocabulary.
    ValidationFailure,
    /// Serialising or replacing the preferences file failed.
    WriteFailure,
    /// Network error, timeout or non-success response.
    FetchFailure,
    /// Today's day token was not present in the schedule page.
    PatternMiss,
}

impl FailureKind {
    /// Short, actionable message suitable for end users.
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::UnresolvedLocation => "prefs.xml not found - select it manually",
            FailureKind::ParseFailure => "could not read prefs.xml - the file may be invalid",
            FailureKind::ValidationFailure => "unknown world",
            FailureKind::WriteFailure => "failed to update prefs.xml - the file may be invalid",
            FailureKind::FetchFailure => "rotation unavailable - schedule page unreachable",
            FailureKind::PatternMiss => "rotation not found for today",
        }
    }
}

/// Errors raised while reading or writing the preferences file.
#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    /// No location resolved.
    #[error("no preferences file location resolved")]
    Unresolved,

    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The document is not well-formed XML.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// The world element is absent.
    #[error("element <{element}> missing from {}", path.display())]
    MissingElement {
        /// File that was searched.
        path: PathBuf,
        /// Element name looked for.
        element: String,
    },

    /// The world element does not hold a decimal integer.
    #[error("element <{element}> in {} holds non-numeric value {value:?}", path.display())]
    InvalidValue {
        /// File that was searched.
        path: PathBuf,
        /// Element name.
        element: String,
        /// Raw text found.
        value: String,
    },

    /// Requested world is not part of the vocabulary.
    #[error("world id {0} is not a known world")]
    UnknownWorld(WorldId),

    /// Requested world name is not part of the vocabulary.
    #[error("{0:?} is not a known world")]
    UnknownName(String),

    /// Temp-file write or atomic replace failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Destination file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl PrefsError {
    /// Classify the error for display.
    pub fn kind(&self) -> FailureKind {
        match self {
            PrefsError::Unresolved => FailureKind::UnresolvedLocation,
            PrefsError::Read { .. }
            | PrefsError::Parse { .. }
            | PrefsError::MissingElement { .. }
            | PrefsError::InvalidValue { .. } => FailureKind::ParseFailure,
            PrefsError::UnknownWorld(_) | PrefsError::UnknownName(_) => {
                FailureKind::ValidationFailure
            }
            PrefsError::Write { .. } => FailureKind::WriteFailure,
        }
    }
}

/// Errors raised while resolving the world rotation.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Request could not be sent or the body could not be read.
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// Requested URL.
        url: String,
        /// Transport diagnostic.
        reason: String,
    },

    /// Server answered with a non-success status.
    #[error("fetching {url} returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Today's day number was not found in the page text.
    #[error("day {token} not found in schedule")]
    PatternMiss {
        /// Day token searched for.
        token: String,
    },
}

impl ScheduleError {
    /// Classify the error for display.
    pub fn kind(&self) -> FailureKind {
        match self {
            ScheduleError::Fetch { .. } | ScheduleError::Status { .. } => {
                FailureKind::FetchFailure
            }
            ScheduleError::PatternMiss { .. } => FailureKind::PatternMiss,
        }
    }
}
