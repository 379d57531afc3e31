use crate::registry::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for minipack resolution.
///
/// An intentionally excluded resource is not an error: the path resolver
/// reports it through [`crate::resolve::Resolution::Ignored`], which callers
/// absorb by pruning the reference from its parent collection.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to resolve {request} from {context}")]
    Resolution { context: PathBuf, request: String },

    #[error(
        "{kind} [{resource_path}] is already registered with outputPath [{existing}], \
         it can not be registered with another outputPath [{requested}]"
    )]
    ConflictingRegistration {
        kind: ResourceKind,
        resource_path: String,
        existing: String,
        requested: String,
    },

    #[error("Subpackage root [{root}] is not allowed to start with '.'")]
    InvalidSubPackageRoot { root: String },

    #[error("Failed to parse source config at {path}: {source}")]
    MalformedSourceConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No JSON block found in composite source at {path}")]
    MissingJsonBlock { path: PathBuf },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    #[must_use]
    pub fn resolution(context: impl Into<PathBuf>, request: impl Into<String>) -> Self {
        Self::Resolution {
            context: context.into(),
            request: request.into(),
        }
    }
}
