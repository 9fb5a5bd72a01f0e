//! Workflow results and their boundary serialization.

use std::path::{Path, PathBuf};

use serde_json::json;

use super::request::OperationKind;
use crate::engine::ContentStatus;

/// Message reported when an unprotect request finds nothing to remove.
pub const NOT_PROTECTED_MESSAGE: &str =
    "File is not protected and does not contain protected objects, no change made.";

/// Message reported when the engine has no pending changes to write.
pub const NO_CHANGES_MESSAGE: &str = "No changes to commit";

/// How a workflow invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Inspection finished with the document's flags.
    Inspected(ContentStatus),
    /// The modified document was written.
    Committed {
        /// Where it was written.
        path: PathBuf,
    },
    /// Nothing was changed and no file was written. Not an error.
    NoChange {
        /// Why nothing changed.
        reason: String,
    },
    /// A step failed.
    Failed {
        /// The failure message.
        error: String,
    },
}

/// The single result produced by one workflow invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowResult {
    operation: OperationKind,
    source: PathBuf,
    outcome: Outcome,
}

impl WorkflowResult {
    /// Creates a result.
    pub fn new(operation: OperationKind, source: impl Into<PathBuf>, outcome: Outcome) -> Self {
        Self {
            operation,
            source: source.into(),
            outcome,
        }
    }

    /// Creates a failure result from any error message.
    pub fn failed(
        operation: OperationKind,
        source: impl Into<PathBuf>,
        error: impl std::fmt::Display,
    ) -> Self {
        Self::new(
            operation,
            source,
            Outcome::Failed {
                error: error.to_string(),
            },
        )
    }

    /// Returns the operation that produced this result.
    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Returns the source document.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Returns the outcome.
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Returns true if the operation completed its purpose.
    ///
    /// "No change" outcomes report `false`, matching the boundary status.
    pub fn succeeded(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Inspected(_) | Outcome::Committed { .. }
        )
    }

    /// Returns the written file, if any.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Committed { path } => Some(path),
            _ => None,
        }
    }

    /// Returns the failure or no-change message; empty on success.
    pub fn error_message(&self) -> &str {
        match &self.outcome {
            Outcome::NoChange { reason } => reason,
            Outcome::Failed { error } => error,
            Outcome::Inspected(_) | Outcome::Committed { .. } => "",
        }
    }

    /// Returns the inspection flags for inspect results.
    pub fn status(&self) -> Option<ContentStatus> {
        match self.outcome {
            Outcome::Inspected(status) => Some(status),
            _ => None,
        }
    }

    /// Serializes to the flat status object returned at the process boundary.
    ///
    /// Inspect results carry `protected`, `labeled` and `protected_objects`
    /// and echo the source path. Other results carry the written path, or an
    /// empty string when nothing was written.
    pub fn to_json(&self) -> String {
        let value = match (&self.outcome, self.operation) {
            (Outcome::Inspected(status), _) => json!({
                "status": true,
                "protected": status.is_protected,
                "labeled": status.is_labeled,
                "protected_objects": status.contains_protected_objects,
                "path": self.source.to_string_lossy(),
            }),
            (Outcome::Failed { error }, OperationKind::Inspect) => json!({
                "status": false,
                "error": error,
                "path": self.source.to_string_lossy(),
            }),
            _ => json!({
                "status": self.succeeded(),
                "path": self
                    .output_path()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                "error": self.error_message(),
            }),
        };
        value.to_string()
    }
}

impl std::fmt::Display for WorkflowResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            Outcome::Inspected(status) => write!(
                f,
                "{} {}: protected={}, labeled={}, protected_objects={}",
                self.operation,
                self.source.display(),
                status.is_protected,
                status.is_labeled,
                status.contains_protected_objects
            ),
            Outcome::Committed { path } => write!(
                f,
                "{} {}: wrote {}",
                self.operation,
                self.source.display(),
                path.display()
            ),
            Outcome::NoChange { reason } => {
                write!(f, "{} {}: {}", self.operation, self.source.display(), reason)
            }
            Outcome::Failed { error } => write!(
                f,
                "{} {} failed: {}",
                self.operation,
                self.source.display(),
                error
            ),
        }
    }
}
