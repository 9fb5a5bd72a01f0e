//! String-in, JSON-out entry points for host applications.
//!
//! Each entry point runs one workflow and always returns a status payload,
//! even when the workflow fails. Empty strings stand for absent optional
//! arguments.
//!
//! | Entry point | Payload |
//! |-------------|---------|
//! | [`inspect`] | `{status, protected, labeled, protected_objects, path}` or `{status: false, error, path}` |
//! | [`unprotect`] | `{status, path, error}` |
//! | [`protect`] | `{status, path, error}` |

use crate::context::ProcessContext;
use crate::workflow::{ProtectionWorkflow, WorkflowRequest, WorkflowResult};
use crate::Result;

/// Runs a request and serializes its result.
///
/// Returns `Err` only for fatal errors, leaving the caller to decide how to
/// report them.
pub fn run_to_json(workflow: &ProtectionWorkflow<'_>, request: &WorkflowRequest) -> Result<String> {
    workflow.execute(request).map(|result| result.to_json())
}

fn respond(context: &ProcessContext, request: WorkflowRequest) -> String {
    let workflow = ProtectionWorkflow::new(context);
    run_to_json(&workflow, &request).unwrap_or_else(|e| {
        log::error!(
            "{} {}: {}",
            request.operation.kind(),
            request.source_path.display(),
            e
        );
        WorkflowResult::failed(request.operation.kind(), &request.source_path, e).to_json()
    })
}

/// Reports whether a file is protected, labeled or contains protected objects.
pub fn inspect(context: &ProcessContext, file_path: &str, application_id: &str) -> String {
    respond(context, WorkflowRequest::inspect(file_path, application_id))
}

/// Removes protection from a file, writing the result next to it.
pub fn unprotect(
    context: &ProcessContext,
    protection_token: &str,
    file_path: &str,
    application_id: &str,
) -> String {
    let request = WorkflowRequest::unprotect(file_path, application_id).token(protection_token);
    respond(context, request)
}

/// Protects a file with the policy of an already protected reference file.
pub fn protect(
    context: &ProcessContext,
    protection_token: &str,
    file_path: &str,
    reference_protected_file_path: &str,
    user: &str,
    application_id: &str,
) -> String {
    let request = WorkflowRequest::protect(file_path, reference_protected_file_path, application_id)
        .token(protection_token)
        .user(user);
    respond(context, request)
}
