//! Orchestration of inspect, protect, unprotect and label operations.
//!
//! A [`ProtectionWorkflow`] takes a [`WorkflowRequest`] through a fixed
//! sequence of steps:
//!
//! 1. Resolve the identity through the context's auth provider
//! 2. Load (or reuse) the application's profile
//! 3. Create an engine for the identity
//! 4. Open a handler for the document, and for `Protect` a second handler
//!    for the reference document
//! 5. Derive the output path from the handler's output file name
//! 6. Check the export right, then apply the operation
//! 7. Commit if the handler reports changes, and verify the outcome
//!
//! Inspection skips steps 1 to 7 and only queries the status flags.
//!
//! Each invocation yields exactly one [`WorkflowResult`]. A commit that
//! reports failure but leaves a file behind is the only error that is not
//! folded into the result; see [`Error::CommitIntegrity`](crate::Error::CommitIntegrity).

mod output_path;
mod request;
mod result;
mod runner;

pub use output_path::derive_output_path;
pub use request::{Operation, OperationKind, WorkflowRequest};
pub use result::{NO_CHANGES_MESSAGE, NOT_PROTECTED_MESSAGE, Outcome, WorkflowResult};
pub use runner::{ProtectionWorkflow, WorkflowOptions, describe_content, ensure_user_has_rights};
