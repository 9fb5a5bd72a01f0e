//! Workflow requests.

use std::path::{Path, PathBuf};

use crate::credential::Secret;
use crate::engine::LabelingOptions;
use crate::{Error, Result};

/// The operation a workflow performs on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Read protection and label flags.
    Inspect,
    /// Remove protection.
    Unprotect,
    /// Copy the protection of a reference document onto the source.
    Protect,
    /// Apply a label.
    SetLabel {
        /// Identifier of the label to apply.
        label_id: String,
        /// Assignment and justification options.
        options: LabelingOptions,
    },
    /// Remove the applied label.
    DeleteLabel {
        /// Assignment and justification options.
        options: LabelingOptions,
    },
}

impl Operation {
    /// Returns the kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Inspect => OperationKind::Inspect,
            Operation::Unprotect => OperationKind::Unprotect,
            Operation::Protect => OperationKind::Protect,
            Operation::SetLabel { .. } => OperationKind::SetLabel,
            Operation::DeleteLabel { .. } => OperationKind::DeleteLabel,
        }
    }

    /// Returns true if the operation changes the document.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::Inspect)
    }
}

/// Operation tag without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// See [`Operation::Inspect`].
    Inspect,
    /// See [`Operation::Unprotect`].
    Unprotect,
    /// See [`Operation::Protect`].
    Protect,
    /// See [`Operation::SetLabel`].
    SetLabel,
    /// See [`Operation::DeleteLabel`].
    DeleteLabel,
}

impl OperationKind {
    /// Returns the operation name as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Inspect => "inspect",
            OperationKind::Unprotect => "unprotect",
            OperationKind::Protect => "protect",
            OperationKind::SetLabel => "set_label",
            OperationKind::DeleteLabel => "delete_label",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to run one operation against one document.
///
/// # Example
///
/// ```rust
/// use docseal::workflow::{OperationKind, WorkflowRequest};
///
/// let request = WorkflowRequest::protect("plan.docx", "template.docx.pfile", "app-id")
///     .token("eyJ0eXAi")
///     .user("alice@contoso.com");
/// assert_eq!(request.operation.kind(), OperationKind::Protect);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    /// The document to operate on.
    pub source_path: PathBuf,
    /// Application registration id.
    pub application_id: String,
    /// What to do.
    pub operation: Operation,
    /// Pre-acquired protection token.
    pub protection_token: Option<Secret>,
    /// Protected document whose policy is copied by [`Operation::Protect`].
    pub reference_protected_path: Option<PathBuf>,
    /// User the engine acts on behalf of.
    pub target_user: Option<String>,
}

impl WorkflowRequest {
    /// Creates a request for an arbitrary operation.
    pub fn new(
        source_path: impl Into<PathBuf>,
        application_id: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            application_id: application_id.into(),
            operation,
            protection_token: None,
            reference_protected_path: None,
            target_user: None,
        }
    }

    /// Creates an inspection request.
    pub fn inspect(source_path: impl Into<PathBuf>, application_id: impl Into<String>) -> Self {
        Self::new(source_path, application_id, Operation::Inspect)
    }

    /// Creates an unprotect request.
    pub fn unprotect(source_path: impl Into<PathBuf>, application_id: impl Into<String>) -> Self {
        Self::new(source_path, application_id, Operation::Unprotect)
    }

    /// Creates a protect request that copies the policy of `reference`.
    pub fn protect(
        source_path: impl Into<PathBuf>,
        reference: impl Into<PathBuf>,
        application_id: impl Into<String>,
    ) -> Self {
        let mut request = Self::new(source_path, application_id, Operation::Protect);
        request.reference_protected_path = Some(reference.into());
        request
    }

    /// Creates a request that applies a label.
    pub fn set_label(
        source_path: impl Into<PathBuf>,
        application_id: impl Into<String>,
        label_id: impl Into<String>,
        options: LabelingOptions,
    ) -> Self {
        let operation = Operation::SetLabel {
            label_id: label_id.into(),
            options,
        };
        Self::new(source_path, application_id, operation)
    }

    /// Creates a request that removes the label.
    pub fn delete_label(
        source_path: impl Into<PathBuf>,
        application_id: impl Into<String>,
        options: LabelingOptions,
    ) -> Self {
        Self::new(source_path, application_id, Operation::DeleteLabel { options })
    }

    /// Sets the protection token. An empty token is treated as absent.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.protection_token = Secret::non_empty(token);
        self
    }

    /// Sets the target user. An empty name is treated as absent.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        let user = user.into();
        self.target_user = if user.is_empty() { None } else { Some(user) };
        self
    }

    /// Returns the reference document, if any.
    pub fn reference(&self) -> Option<&Path> {
        self.reference_protected_path.as_deref()
    }

    /// Checks the request for structural errors before any engine call.
    pub fn validate(&self) -> Result<()> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("Source path must not be empty"));
        }
        if self.application_id.trim().is_empty() {
            return Err(Error::invalid_argument("Application id must not be empty"));
        }
        if let Operation::SetLabel { label_id, .. } = &self.operation {
            if label_id.trim().is_empty() {
                return Err(Error::invalid_argument("Label id must not be empty"));
            }
        }
        if self.operation == Operation::Protect
            && self.reference().is_none_or(|path| path.as_os_str().is_empty())
        {
            return Err(Error::invalid_argument(
                "Protect requires a reference protected file",
            ));
        }
        Ok(())
    }
}
