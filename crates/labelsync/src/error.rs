// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

use crate::Progress;
use std::path::PathBuf;
use tokio::sync::mpsc::error::SendError;

/// Error type for every labelsync operation.
///
/// Covers local failures (filesystem, malformed annotation files, invalid
/// arguments) and failures reported by the remote dataset service.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred during file operations.
    IoError(std::io::Error),
    /// Directory traversal failed.
    WalkDirError(walkdir::Error),
    /// Configuration parsing or loading error.
    ConfigError(config::ConfigError),
    /// JSON serialization or deserialization error.
    JsonError(serde_json::Error),
    /// An annotation file could not be parsed as JSON.
    JsonParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// HTTP request error from the reqwest client.
    HttpError(reqwest::Error),
    /// The server answered with a non-success status code and body.
    StatusError(u16, String),
    /// URL parsing error.
    UrlParseError(url::ParseError),
    /// ZIP archive error.
    ZipError(zip::result::ZipError),
    /// Integer parsing error.
    ParseIntError(std::num::ParseIntError),
    /// Error sending progress updates.
    ProgressSendError(SendError<Progress>),
    /// An argument is outside its allowed set of values.
    InvalidArgument(String),
    /// An annotation file parsed but failed validation.
    InvalidAnnotation(String),
    /// Referenced label is missing or not found.
    MissingLabel(String),
    /// No remote dataset matches the identifier.
    DatasetNotFound(String),
    /// Server returned an invalid or unexpected response.
    InvalidResponse,
    /// API key is empty or not provided.
    EmptyApiKey,
    /// The API key was rejected by the server.
    Unauthorized,
}

impl Error {
    /// Returns true when the server refused a create because the resource
    /// already exists (HTTP 422).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::StatusError(422, _))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::ConfigError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::HttpError(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::UrlParseError(err)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipError(err)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::ParseIntError(err)
    }
}

impl From<SendError<Progress>> for Error {
    fn from(err: SendError<Progress>) -> Self {
        Error::ProgressSendError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::WalkDirError(e) => write!(f, "Directory walk error: {}", e),
            Error::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Error::JsonError(e) => write!(f, "JSON error: {}", e),
            Error::JsonParse { path, source } => {
                write!(f, "Failed to parse {}: {}", path.display(), source)
            }
            Error::HttpError(e) => write!(f, "HTTP error: {}", e),
            Error::StatusError(code, body) => write!(f, "Server returned {}: {}", code, body),
            Error::UrlParseError(e) => write!(f, "URL parse error: {}", e),
            Error::ZipError(e) => write!(f, "ZIP error: {}", e),
            Error::ParseIntError(e) => write!(f, "Integer parse error: {}", e),
            Error::ProgressSendError(e) => write!(f, "Progress send error: {}", e),
            Error::InvalidArgument(s) => write!(f, "Invalid argument: {}", s),
            Error::InvalidAnnotation(s) => write!(f, "Invalid annotation: {}", s),
            Error::MissingLabel(s) => write!(f, "Missing label: {}", s),
            Error::DatasetNotFound(s) => write!(f, "Dataset not found: {}", s),
            Error::InvalidResponse => write!(f, "Invalid server response"),
            Error::EmptyApiKey => write!(f, "API key is empty"),
            Error::Unauthorized => write!(f, "Unauthorized access, check the API key"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::WalkDirError(e) => Some(e),
            Error::ConfigError(e) => Some(e),
            Error::JsonError(e) => Some(e),
            Error::JsonParse { source, .. } => Some(source),
            Error::HttpError(e) => Some(e),
            Error::UrlParseError(e) => Some(e),
            Error::ZipError(e) => Some(e),
            Error::ParseIntError(e) => Some(e),
            _ => None,
        }
    }
}
