//! Integration tests for the protection workflow state machine.
//!
//! These tests drive [`ProtectionWorkflow`] against the scripted engine in
//! `common` and verify:
//! - The order of engine calls for each operation
//! - No-change outcomes for unprotected files and unmodified handlers
//! - Commit verification, including leftover output files
//! - Rights checks, label operations and in-memory staging

mod common;

use std::time::Duration;

use docseal::engine::{AssignmentMethod, Consent, DataState, EngineConfig, LabelingOptions, rights};
use docseal::workflow::{NO_CHANGES_MESSAGE, NOT_PROTECTED_MESSAGE};
use docseal::{
    Error, OperationKind, Outcome, ProcessContext, ProtectionWorkflow, WorkflowOptions,
    WorkflowRequest,
};

use common::{
    APP_ID, CommitBehavior, CountingConsent, FakeDocument, FakeRuntime, TOKEN, label,
    modified_path, source_file,
};

fn unprotect_request(path: &std::path::Path) -> WorkflowRequest {
    WorkflowRequest::unprotect(path, APP_ID).token(TOKEN)
}

// ============================================================================
// Inspect
// ============================================================================

#[test]
fn test_inspect_plain_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "plain.docx");
    let fake = FakeRuntime::new();
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&WorkflowRequest::inspect(&path, APP_ID))
        .unwrap();

    assert!(result.succeeded());
    let status = result.status().unwrap();
    assert!(!status.is_protected);
    assert!(!status.is_labeled);
    assert!(!status.contains_protected_objects);
    // Inspection needs no identity, profile or engine.
    assert_eq!(fake.steps(), vec!["content_status"]);
}

#[test]
fn test_inspect_reports_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "secret.docx");
    let fake = FakeRuntime::new();
    fake.add_document(
        &path,
        FakeDocument::protected(&[rights::VIEW]).labeled(label("l1", "Secret", 3)),
    );
    let context = fake.context();

    let status = ProtectionWorkflow::new(&context).inspect(&path).unwrap();
    assert!(status.is_protected);
    assert!(status.is_labeled);
}

#[test]
fn test_inspect_engine_error_is_failure_result() {
    let fake = FakeRuntime::new();
    fake.fail_at("content_status", "File format is not supported");
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&WorkflowRequest::inspect("notes.xyz", APP_ID))
        .unwrap();
    assert!(!result.succeeded());
    assert_eq!(result.error_message(), "File format is not supported");
    assert_eq!(result.operation(), OperationKind::Inspect);
}

#[test]
fn test_inspect_in_memory_missing_file_is_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeRuntime::new();
    let context = fake.context();
    let workflow =
        ProtectionWorkflow::with_options(&context, WorkflowOptions::new().load_into_memory(true));

    let err = workflow.inspect(&dir.path().join("missing.docx")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(fake.journal().is_empty());
}

// ============================================================================
// Unprotect
// ============================================================================

#[test]
fn test_unprotect_commits_to_derived_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::EXPORT]));
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();

    let expected = dir.path().join("report_modified.docx");
    assert!(result.succeeded(), "{}", result);
    assert_eq!(result.output_path(), Some(expected.as_path()));
    assert!(expected.exists());
    assert_eq!(
        fake.steps(),
        vec![
            "load_profile",
            "add_engine",
            "content_status",
            "create_handler",
            "get_protection",
            "remove_protection",
            "commit",
            "notify_commit",
        ]
    );
    assert!(fake.called(&format!("notify_commit {}", path.display())));
}

#[test]
fn test_unprotect_not_protected_is_no_change() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "plain.docx");
    let fake = FakeRuntime::new();
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();

    assert!(!result.succeeded());
    assert_eq!(result.outcome(), &Outcome::NoChange {
        reason: NOT_PROTECTED_MESSAGE.to_string()
    });
    assert!(result.output_path().is_none());
    assert!(!fake.called("remove_protection"));
    assert!(!fake.called("commit"));
    assert!(!modified_path(&path).exists());
}

#[test]
fn test_unprotect_protected_objects_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "mail.msg");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::with_protected_objects());
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert!(result.succeeded(), "{}", result);
    assert!(fake.called("remove_protection"));
}

#[test]
fn test_unmodified_handler_is_no_changes_to_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "flagged.docx");
    let fake = FakeRuntime::new();
    // Status says protected, but the handler has no policy to remove.
    let mut document = FakeDocument::protected(&[]);
    document.protection = None;
    fake.add_document(&path, document);
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert_eq!(result.error_message(), NO_CHANGES_MESSAGE);
    assert!(!fake.called("commit"));
}

#[test]
fn test_unprotect_without_export_right_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "locked.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::VIEW, rights::EDIT]));
    let context = fake.context();

    let err = ProtectionWorkflow::new(&context)
        .run(&unprotect_request(&path))
        .unwrap_err();
    match err {
        Error::AccessDenied {
            required,
            owner,
            referrer,
        } => {
            assert_eq!(required, rights::EXPORT);
            assert_eq!(owner.as_deref(), Some("owner@contoso.com"));
            assert!(referrer.is_some());
        }
        other => panic!("expected AccessDenied, got {:?}", other),
    }
    assert!(!fake.called("remove_protection"));
}

#[test]
fn test_owner_right_implies_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "owned.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::OWNER]));
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert!(result.succeeded(), "{}", result);
}

#[test]
fn test_unprotect_without_token_fails_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    let context = fake.context();

    let err = ProtectionWorkflow::new(&context)
        .run(&WorkflowRequest::unprotect(&path, APP_ID))
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert!(fake.journal().is_empty());
}

// ============================================================================
// Commit verification
// ============================================================================

#[test]
fn test_failed_commit_without_file_is_ordinary_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::EXPORT]));
    fake.set_commit(CommitBehavior::ReportFailure);
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert!(!result.succeeded());
    assert!(!result.error_message().is_empty());
    assert!(result.output_path().is_none());
    assert!(!fake.called("notify_commit"));
}

#[test]
fn test_failed_commit_with_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::EXPORT]));
    fake.set_commit(CommitBehavior::ReportFailureLeavingFile);
    let context = fake.context();

    let err = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap_err();
    assert!(err.is_fatal());
    match err {
        Error::CommitIntegrity { path: leftover } => {
            assert_eq!(leftover, dir.path().join("report_modified.docx"));
        }
        other => panic!("expected CommitIntegrity, got {:?}", other),
    }
}

#[test]
fn test_commit_error_propagates_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::EXPORT]));
    fake.set_commit(CommitBehavior::ErrorLeavingFile("disk full".to_string()));
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert!(!result.succeeded());
    assert_eq!(result.error_message(), "disk full");
}

#[test]
fn test_commit_error_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::EXPORT]));
    fake.set_commit(CommitBehavior::Error("service unavailable".to_string()));
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert_eq!(result.error_message(), "service unavailable");
    assert!(!modified_path(&path).exists());
}

// ============================================================================
// Protect
// ============================================================================

#[test]
fn test_protect_copies_reference_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "plan.xlsx");
    let reference = source_file(dir.path(), "template.docx.pfile");
    let fake = FakeRuntime::new();
    fake.add_document(&reference, FakeDocument::protected(&[rights::VIEW]));
    let context = fake.context();

    let request = WorkflowRequest::protect(&path, &reference, APP_ID)
        .token(TOKEN)
        .user("alice@contoso.com");
    let result = ProtectionWorkflow::new(&context).execute(&request).unwrap();

    assert!(result.succeeded(), "{}", result);
    assert_eq!(
        result.output_path(),
        Some(dir.path().join("plan_modified.xlsx").as_path())
    );
    assert!(fake.called("set_protection Confidential"));
    assert!(!fake.called("content_status"));

    let settings = fake.engine_settings();
    assert_eq!(settings.len(), 1);
    assert_eq!(
        settings[0].identity.as_ref().map(|i| i.email.as_str()),
        Some("alice@contoso.com")
    );
    assert_eq!(settings[0].auth.credential.expose(), TOKEN);
}

#[test]
fn test_protect_with_unprotected_reference_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "plan.xlsx");
    let reference = source_file(dir.path(), "plain.docx");
    let fake = FakeRuntime::new();
    let context = fake.context();

    let request = WorkflowRequest::protect(&path, &reference, APP_ID).token(TOKEN);
    let err = ProtectionWorkflow::new(&context).run(&request).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!fake.called("set_protection"));
}

#[test]
fn test_protect_without_reference_is_rejected_before_engine() {
    let fake = FakeRuntime::new();
    let context = fake.context();
    let mut request = WorkflowRequest::protect("plan.xlsx", "ref.docx", APP_ID).token(TOKEN);
    request.reference_protected_path = None;

    let result = ProtectionWorkflow::new(&context).execute(&request).unwrap();
    assert!(!result.succeeded());
    assert!(result.error_message().contains("reference"));
    assert!(fake.journal().is_empty());
}

#[test]
fn test_pfile_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx.pfile");
    let reference = source_file(dir.path(), "ref.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&reference, FakeDocument::protected(&[rights::VIEW]));
    let context = fake.context();

    let request = WorkflowRequest::protect(&path, &reference, APP_ID).token(TOKEN);
    let result = ProtectionWorkflow::new(&context).execute(&request).unwrap();
    assert_eq!(
        result.output_path(),
        Some(dir.path().join("report_modified.docx.pfile").as_path())
    );
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn test_set_label_with_justification() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "memo.docx");
    let fake = FakeRuntime::new();
    fake.add_label(label("general", "General", 1));
    let context = fake.context();

    let options = LabelingOptions::new()
        .assignment(AssignmentMethod::Privileged)
        .justification("Reviewed by records team");
    let request = WorkflowRequest::set_label(&path, APP_ID, "general", options).token(TOKEN);
    let result = ProtectionWorkflow::new(&context).execute(&request).unwrap();

    assert!(result.succeeded(), "{}", result);
    assert!(fake.called("label_by_id general"));
    assert!(fake.called("set_label general justified=true"));
    assert!(fake.called("notify_commit"));
}

#[test]
fn test_set_unknown_label_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "memo.docx");
    let fake = FakeRuntime::new();
    let context = fake.context();

    let request =
        WorkflowRequest::set_label(&path, APP_ID, "missing", LabelingOptions::new()).token(TOKEN);
    let result = ProtectionWorkflow::new(&context).execute(&request).unwrap();
    assert!(result.error_message().contains("missing"));
    assert!(!fake.called("commit"));
}

#[test]
fn test_delete_label() {
    let dir = tempfile::tempdir().unwrap();
    let labeled = source_file(dir.path(), "labeled.docx");
    let plain = source_file(dir.path(), "plain.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&labeled, FakeDocument::plain().labeled(label("c", "Confidential", 2)));
    let context = fake.context();
    let workflow = ProtectionWorkflow::new(&context);

    let request =
        WorkflowRequest::delete_label(&labeled, APP_ID, LabelingOptions::new()).token(TOKEN);
    assert!(workflow.execute(&request).unwrap().succeeded());

    let request =
        WorkflowRequest::delete_label(&plain, APP_ID, LabelingOptions::new()).token(TOKEN);
    let result = workflow.execute(&request).unwrap();
    assert_eq!(result.error_message(), NO_CHANGES_MESSAGE);
}

#[test]
fn test_describe_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "secret.docx");
    let plain = source_file(dir.path(), "plain.docx");
    let fake = FakeRuntime::new();
    fake.add_document(
        &path,
        FakeDocument::protected(&[rights::VIEW]).labeled(label("s", "Secret", 3)),
    );
    let context = fake.context();
    let workflow = ProtectionWorkflow::new(&context);

    let described = workflow
        .describe(&WorkflowRequest::inspect(&path, APP_ID).token(TOKEN))
        .unwrap();
    assert_eq!(described.label.unwrap().label.name, "Secret");
    let protection = described.protection.unwrap();
    assert_eq!(protection.template_id.as_deref(), Some("confidential-template"));
    assert!(!protection.does_content_expire());

    let described = workflow
        .describe(&WorkflowRequest::inspect(&plain, APP_ID).token(TOKEN))
        .unwrap();
    assert!(described.is_plain());
}

// ============================================================================
// Engine failures
// ============================================================================

#[test]
fn test_engine_creation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.fail_at("add_engine", "Identity could not be resolved");
    let context = fake.context();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert_eq!(result.error_message(), "Identity could not be resolved");
    assert!(!fake.called("create_handler"));
}

#[test]
fn test_abandoned_handler_creation_is_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::EXPORT]));
    fake.abandon_at("create_handler");
    let context = fake.context();

    let err = ProtectionWorkflow::new(&context)
        .run(&unprotect_request(&path))
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

// ============================================================================
// Options and context
// ============================================================================

#[test]
fn test_in_memory_staging_hands_full_content_to_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::EXPORT]));
    let context = fake.context();
    let options = WorkflowOptions::new()
        .load_into_memory(true)
        .data_state(DataState::Motion)
        .audit_discovery(true);

    let result = ProtectionWorkflow::with_options(&context, options)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert!(result.succeeded(), "{}", result);

    // The status query consumed the stream; the handler must still see it all.
    let sources = fake.stream_sources();
    assert_eq!(sources, vec![b"content of report.docx".to_vec()]);
    let handler_options = fake.handler_options();
    assert_eq!(handler_options[0].data_state, DataState::Motion);
    assert!(handler_options[0].audit_discovery);
}

#[test]
fn test_profile_reused_across_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    fake.add_document(&path, FakeDocument::protected(&[rights::EXPORT]));
    let consent = CountingConsent::new(Consent::Reject);
    let context = ProcessContext::builder(std::sync::Arc::new(fake.clone()))
        .consent_provider(consent.clone())
        .engine_config(EngineConfig::new().locale("fr-FR"))
        .build();
    let workflow = ProtectionWorkflow::new(&context);

    for _ in 0..3 {
        workflow.execute(&unprotect_request(&path)).unwrap();
    }

    assert_eq!(consent.calls(), 1);
    assert_eq!(context.profile_count(), 1);
    let profiles = fake.profile_settings();
    assert_eq!(profiles.len(), 1);
    assert!(!profiles[0].telemetry_enabled);
    assert_eq!(profiles[0].application.id, APP_ID);
    assert_eq!(fake.engine_settings().len(), 3);
    assert_eq!(fake.engine_settings()[0].locale, "fr-FR");
}

#[test]
fn test_context_shutdown_once() {
    let fake = FakeRuntime::new();
    let context = fake.context();
    context.shutdown();
    context.shutdown();
    assert!(context.is_shut_down());
    drop(context);

    assert_eq!(fake.shutdowns(), vec![Some(Duration::from_secs(2))]);
}

#[test]
fn test_context_shutdown_on_drop() {
    let fake = FakeRuntime::new();
    {
        let _context = fake.context();
    }
    assert_eq!(fake.steps(), vec!["shutdown"]);
}

#[test]
fn test_workflow_after_shutdown_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = source_file(dir.path(), "report.docx");
    let fake = FakeRuntime::new();
    let context = fake.context();
    context.shutdown();

    let result = ProtectionWorkflow::new(&context)
        .execute(&unprotect_request(&path))
        .unwrap();
    assert!(result.error_message().contains("shut down"));
}
