//! Error types for stream and protection workflow operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes of the editable stream and of the protection workflow,
//! along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! Buffer operations surface their errors directly to the caller:
//!
//! ```rust
//! use docseal::{EditableBuffer, Error};
//!
//! let mut buffer = EditableBuffer::new(b"hello".to_vec());
//! match buffer.seek(10) {
//!     Err(Error::InvalidArgument(msg)) => println!("bad seek: {}", msg),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```
//!
//! Workflow steps propagate errors with `?`; the workflow converts every
//! error except [`Error::CommitIntegrity`] into a failure-shaped
//! [`WorkflowResult`](crate::WorkflowResult):
//!
//! ```rust
//! use docseal::Error;
//!
//! fn describe(error: &Error) -> &'static str {
//!     if error.is_fatal() {
//!         "engine left an inconsistent output file"
//!     } else if error.is_engine_error() {
//!         "the protection engine rejected the request"
//!     } else {
//!         "the request could not be completed"
//!     }
//! }
//! # let _ = describe(&Error::Cancelled);
//! ```

use std::io;
use std::path::PathBuf;

/// Helper struct for formatting AccessDenied error messages.
struct AccessDeniedDisplay<'a> {
    required: &'a str,
    owner: Option<&'a str>,
}

impl std::fmt::Display for AccessDeniedDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "A minimum right of {} is required to change label or protection",
            self.required
        )?;
        if let Some(owner) = self.owner {
            write!(f, " (owner: {})", owner)?;
        }
        Ok(())
    }
}

/// The main error type for stream and workflow operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | Reading the source file |
/// | Arguments | [`InvalidArgument`][Self::InvalidArgument], [`NotImplemented`][Self::NotImplemented] | Bad seek, malformed request |
/// | Resources | [`CapacityExceeded`][Self::CapacityExceeded] | Buffer growth past the 64-bit length domain |
/// | Identity | [`Authentication`][Self::Authentication], [`AccessDenied`][Self::AccessDenied] | Credential resolution, missing rights |
/// | Engine | [`Engine`][Self::Engine], [`Cancelled`][Self::Cancelled] | Failures reported by the protection engine |
/// | Integrity | [`CommitIntegrity`][Self::CommitIntegrity] | Failed commit that left a file behind |
/// | Service | `Metrics` (feature `service`) | Metric registration or encoding |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading the source content.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An argument was out of range or a request was malformed.
    ///
    /// Returned for seeks outside `0..=size`, for `Protect` requests without
    /// a reference file, and for contradictory engine configuration.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Inserting into a buffer would overflow the 64-bit length domain.
    #[error("Inserting {requested} bytes into a stream of {size} bytes would exceed maximum stream length")]
    CapacityExceeded {
        /// Size of the buffer before the insert.
        size: i64,
        /// Number of bytes the caller tried to insert.
        requested: i64,
    },

    /// The operation is part of the stream contract but is not supported.
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// The authentication collaborator could not resolve a credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The protection engine reported a failure.
    ///
    /// The message is opaque to this crate and is propagated unchanged.
    #[error("{0}")]
    Engine(String),

    /// The current user lacks the right required to modify the content.
    #[error("{}", AccessDeniedDisplay { required: required.as_str(), owner: owner.as_deref() })]
    AccessDenied {
        /// The right that was required.
        required: String,
        /// Owner of the protection policy, if known.
        owner: Option<String>,
        /// Where the user can request access, if known.
        referrer: Option<String>,
    },

    /// A commit reported failure but left a file at the output path.
    ///
    /// The engine is expected to produce either a complete file or none at
    /// all. This error is never converted into an ordinary failure result.
    #[error("Commit reported failure but left an output file at '{}'", path.display())]
    CommitIntegrity {
        /// The derived output path where the file was found.
        path: PathBuf,
    },

    /// An asynchronous engine operation was abandoned before completing.
    #[error("Operation cancelled: the engine dropped its completion without a result")]
    Cancelled,

    /// A service metric could not be registered or encoded.
    #[cfg(feature = "service")]
    #[cfg_attr(docsrs, doc(cfg(feature = "service")))]
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Returns true if the error indicates an inconsistent on-disk state
    /// that callers must not treat as an ordinary failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CommitIntegrity { .. })
    }

    /// Returns true if the error was reported by the protection engine.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            Error::Engine(_) | Error::Cancelled | Error::AccessDenied { .. }
        )
    }

    /// Returns true if the error was caused by caller-supplied arguments.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_) | Error::NotImplemented(_) | Error::CapacityExceeded { .. }
        )
    }

    /// Creates an engine error from any displayable message.
    pub fn engine(message: impl Into<String>) -> Self {
        Error::Engine(message.into())
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

/// A specialized Result type for docseal operations.
pub type Result<T> = std::result::Result<T, Error>;
