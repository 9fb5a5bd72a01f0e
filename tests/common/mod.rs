//! Shared test utilities for integration tests.
//!
//! This module provides a scriptable in-process protection engine. Documents
//! are registered by path with their status flags, label and protection;
//! every engine call is appended to a journal so tests can assert on the
//! sequence of steps a workflow took.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docseal::engine::{
    AssignmentMethod, Completion, Consent, ConsentProvider, ContentLabel, ContentSource,
    ContentStatus, Engine, EngineRuntime, EngineSettings, Handler, HandlerOptions, Label,
    LabelingOptions, Profile, ProfileSettings, ProtectionPolicy, ProtectionType,
};
use docseal::{EditableStream, Error, ProcessContext, Result};

/// Application id used by tests.
pub const APP_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Token used by tests.
pub const TOKEN: &str = "test-protection-token";

// ============================================================================
// Documents
// ============================================================================

/// State of one registered document.
#[derive(Debug, Clone, Default)]
pub struct FakeDocument {
    pub status: ContentStatus,
    pub label: Option<ContentLabel>,
    pub protection: Option<ProtectionPolicy>,
}

impl FakeDocument {
    /// Neither labeled nor protected.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Protected with a policy granting `granted` to the current user.
    pub fn protected(granted: &[&str]) -> Self {
        Self {
            status: ContentStatus {
                is_protected: true,
                ..Default::default()
            },
            label: None,
            protection: Some(policy("Confidential", "owner@contoso.com", granted)),
        }
    }

    /// Unprotected container holding protected attachments.
    pub fn with_protected_objects() -> Self {
        Self {
            status: ContentStatus {
                contains_protected_objects: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Applies a label to the document.
    pub fn labeled(mut self, label: Label) -> Self {
        self.status.is_labeled = true;
        self.label = Some(ContentLabel {
            label,
            assignment: AssignmentMethod::Standard,
            created: None,
            extended_properties: Vec::new(),
        });
        self
    }
}

/// Builds a template-based protection policy.
pub fn policy(name: &str, owner: &str, granted: &[&str]) -> ProtectionPolicy {
    ProtectionPolicy {
        name: name.to_string(),
        template_id: Some(format!("{}-template", name.to_lowercase())),
        protection_type: ProtectionType::TemplateBased,
        owner: owner.to_string(),
        referrer: Some("mailto:owner@contoso.com".to_string()),
        user_rights: Vec::new(),
        user_roles: Vec::new(),
        content_valid_until: None,
        granted_rights: granted.iter().map(|r| r.to_string()).collect(),
    }
}

/// Builds a top-level label.
pub fn label(id: &str, name: &str, sensitivity: i32) -> Label {
    Label {
        id: id.to_string(),
        name: name.to_string(),
        sensitivity,
        parent: None,
    }
}

// ============================================================================
// Scripted behavior
// ============================================================================

/// What the handler does when asked to commit.
#[derive(Debug, Clone)]
pub enum CommitBehavior {
    /// Writes the output file and reports success.
    WriteFile,
    /// Writes nothing and reports failure.
    ReportFailure,
    /// Writes the output file but reports failure.
    ReportFailureLeavingFile,
    /// Fails with an engine error without writing.
    Error(String),
    /// Writes the output file, then fails with an engine error.
    ErrorLeavingFile(String),
}

#[derive(Debug, Clone)]
enum Injected {
    Fail(String),
    Abandon,
}

#[derive(Debug)]
struct FakeState {
    documents: HashMap<String, FakeDocument>,
    labels: HashMap<String, Label>,
    commit: CommitBehavior,
    injected: HashMap<&'static str, Injected>,
    journal: Vec<String>,
    profile_settings: Vec<ProfileSettings>,
    engine_settings: Vec<EngineSettings>,
    handler_options: Vec<HandlerOptions>,
    stream_sources: Vec<Vec<u8>>,
    shutdowns: Vec<Option<Duration>>,
}

/// Shared state behind every fake object.
#[derive(Debug, Clone)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                documents: HashMap::new(),
                labels: HashMap::new(),
                commit: CommitBehavior::WriteFile,
                injected: HashMap::new(),
                journal: Vec::new(),
                profile_settings: Vec::new(),
                engine_settings: Vec::new(),
                handler_options: Vec::new(),
                stream_sources: Vec::new(),
                shutdowns: Vec::new(),
            })),
        }
    }

    /// Creates a process context around this runtime.
    pub fn context(&self) -> ProcessContext {
        ProcessContext::new(Arc::new(self.clone()))
    }

    /// Registers a document under `path`.
    pub fn add_document(&self, path: &Path, document: FakeDocument) {
        self.lock()
            .documents
            .insert(path.display().to_string(), document);
    }

    /// Registers a label that can be resolved by id.
    pub fn add_label(&self, label: Label) {
        self.lock().labels.insert(label.id.clone(), label);
    }

    /// Sets the commit behavior.
    pub fn set_commit(&self, behavior: CommitBehavior) {
        self.lock().commit = behavior;
    }

    /// Makes the named step fail with an engine error.
    pub fn fail_at(&self, step: &'static str, message: &str) {
        self.lock()
            .injected
            .insert(step, Injected::Fail(message.to_string()));
    }

    /// Makes the named step drop its completion without a result.
    pub fn abandon_at(&self, step: &'static str) {
        self.lock().injected.insert(step, Injected::Abandon);
    }

    /// Returns the calls made so far.
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    /// Returns true if any journal entry starts with `prefix`.
    pub fn called(&self, prefix: &str) -> bool {
        self.lock().journal.iter().any(|e| e.starts_with(prefix))
    }

    /// Returns the names of the calls made so far, without arguments.
    pub fn steps(&self) -> Vec<String> {
        self.lock()
            .journal
            .iter()
            .map(|e| e.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn profile_settings(&self) -> Vec<ProfileSettings> {
        self.lock().profile_settings.clone()
    }

    pub fn engine_settings(&self) -> Vec<EngineSettings> {
        self.lock().engine_settings.clone()
    }

    pub fn handler_options(&self) -> Vec<HandlerOptions> {
        self.lock().handler_options.clone()
    }

    /// Returns the bytes of every stream source the engine received.
    pub fn stream_sources(&self) -> Vec<Vec<u8>> {
        self.lock().stream_sources.clone()
    }

    pub fn shutdowns(&self) -> Vec<Option<Duration>> {
        self.lock().shutdowns.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn record(&self, entry: String) {
        self.lock().journal.push(entry);
    }

    fn document(&self, identifier: &str) -> FakeDocument {
        self.lock()
            .documents
            .get(identifier)
            .cloned()
            .unwrap_or_default()
    }

    /// Completes `done` with `value` unless a failure was injected for `step`.
    fn complete<T>(&self, step: &'static str, done: Completion<T>, value: impl FnOnce() -> T) {
        let injected = self.lock().injected.get(step).cloned();
        match injected {
            Some(Injected::Fail(message)) => done.fail(Error::engine(message)),
            Some(Injected::Abandon) => drop(done),
            None => done.succeed(value()),
        }
    }
}

/// Reads a stream source to the end.
fn drain(stream: &mut dyn EditableStream) -> Vec<u8> {
    let mut content = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = stream.read(&mut chunk);
        if n == 0 {
            break;
        }
        content.extend_from_slice(&chunk[..n as usize]);
    }
    content
}

// ============================================================================
// Engine trait implementations
// ============================================================================

impl EngineRuntime for FakeRuntime {
    fn load_profile(&self, settings: ProfileSettings, done: Completion<Arc<dyn Profile>>) {
        self.record(format!("load_profile {}", settings.application.id));
        self.lock().profile_settings.push(settings);
        let runtime = self.clone();
        self.complete("load_profile", done, move || {
            Arc::new(FakeProfile { runtime }) as Arc<dyn Profile>
        });
    }

    fn content_status(&self, source: &mut ContentSource) -> Result<ContentStatus> {
        let identifier = source.identifier();
        self.record(format!("content_status {}", identifier));
        if let ContentSource::Stream { stream, .. } = source {
            drain(stream.as_mut());
        }
        if let Some(Injected::Fail(message)) = self.lock().injected.get("content_status") {
            return Err(Error::engine(message.clone()));
        }
        Ok(self.document(&identifier).status)
    }

    fn shutdown(&self, max_teardown: Option<Duration>) {
        self.record("shutdown".to_string());
        self.lock().shutdowns.push(max_teardown);
    }
}

struct FakeProfile {
    runtime: FakeRuntime,
}

impl Profile for FakeProfile {
    fn add_engine(&self, settings: EngineSettings, done: Completion<Box<dyn Engine>>) {
        self.runtime.record("add_engine".to_string());
        self.runtime.lock().engine_settings.push(settings);
        let runtime = self.runtime.clone();
        self.runtime.complete("add_engine", done, move || {
            Box::new(FakeEngine { runtime }) as Box<dyn Engine>
        });
    }
}

struct FakeEngine {
    runtime: FakeRuntime,
}

impl Engine for FakeEngine {
    fn create_handler(
        &self,
        source: ContentSource,
        options: &HandlerOptions,
        done: Completion<Box<dyn Handler>>,
    ) {
        let identifier = source.identifier();
        let kind = match &source {
            ContentSource::Path(_) => "path",
            ContentSource::Stream { .. } => "stream",
        };
        self.runtime
            .record(format!("create_handler {} {}", identifier, kind));
        self.runtime.lock().handler_options.push(options.clone());
        if let ContentSource::Stream { mut stream, .. } = source {
            let content = drain(stream.as_mut());
            self.runtime.lock().stream_sources.push(content);
        }

        let handler = FakeHandler {
            runtime: self.runtime.clone(),
            document: self.runtime.document(&identifier),
            identifier,
            modified: false,
        };
        // Complete from another thread, as real engines do.
        let runtime = self.runtime.clone();
        std::thread::spawn(move || {
            runtime.complete("create_handler", done, move || {
                Box::new(handler) as Box<dyn Handler>
            });
        });
    }

    fn label_by_id(&self, id: &str) -> Result<Label> {
        self.runtime.record(format!("label_by_id {}", id));
        self.runtime
            .lock()
            .labels
            .get(id)
            .cloned()
            .ok_or_else(|| Error::engine(format!("Label not found: {}", id)))
    }
}

struct FakeHandler {
    runtime: FakeRuntime,
    identifier: String,
    document: FakeDocument,
    modified: bool,
}

impl Handler for FakeHandler {
    fn get_label(&self, done: Completion<Option<ContentLabel>>) {
        self.runtime.record("get_label".to_string());
        let label = self.document.label.clone();
        self.runtime.complete("get_label", done, move || label);
    }

    fn get_protection(&self, done: Completion<Option<ProtectionPolicy>>) {
        self.runtime
            .record(format!("get_protection {}", self.identifier));
        let protection = self.document.protection.clone();
        self.runtime
            .complete("get_protection", done, move || protection);
    }

    fn set_label(&mut self, label: &Label, options: &LabelingOptions, done: Completion<()>) {
        self.runtime.record(format!(
            "set_label {} justified={}",
            label.id,
            options.is_downgrade_justified()
        ));
        let unchanged = self
            .document
            .label
            .as_ref()
            .is_some_and(|applied| applied.label.id == label.id);
        if !unchanged {
            self.document.label = Some(ContentLabel {
                label: label.clone(),
                assignment: options.assignment,
                created: None,
                extended_properties: options.extended_properties.clone(),
            });
            self.modified = true;
        }
        self.runtime.complete("set_label", done, || ());
    }

    fn delete_label(&mut self, _options: &LabelingOptions, done: Completion<()>) {
        self.runtime.record("delete_label".to_string());
        if self.document.label.take().is_some() {
            self.modified = true;
        }
        self.runtime.complete("delete_label", done, || ());
    }

    fn set_protection(&mut self, policy: &ProtectionPolicy, done: Completion<()>) {
        self.runtime
            .record(format!("set_protection {}", policy.name));
        self.document.protection = Some(policy.clone());
        self.modified = true;
        self.runtime.complete("set_protection", done, || ());
    }

    fn remove_protection(&mut self, done: Completion<()>) {
        self.runtime.record("remove_protection".to_string());
        if self.document.protection.take().is_some()
            || self.document.status.contains_protected_objects
        {
            self.modified = true;
        }
        self.runtime.complete("remove_protection", done, || ());
    }

    fn is_modified(&self) -> bool {
        self.modified
    }

    fn output_file_name(&self) -> String {
        self.identifier.clone()
    }

    fn commit(&mut self, output: &Path, done: Completion<bool>) {
        self.runtime
            .record(format!("commit {}", output.display()));
        let behavior = self.runtime.lock().commit.clone();
        let write = |path: &Path| std::fs::write(path, b"committed").unwrap();
        match behavior {
            CommitBehavior::WriteFile => {
                write(output);
                done.succeed(true);
            }
            CommitBehavior::ReportFailure => done.succeed(false),
            CommitBehavior::ReportFailureLeavingFile => {
                write(output);
                done.succeed(false);
            }
            CommitBehavior::Error(message) => done.fail(Error::engine(message)),
            CommitBehavior::ErrorLeavingFile(message) => {
                write(output);
                done.fail(Error::engine(message));
            }
        }
    }

    fn notify_commit_successful(&self, source: &str) {
        self.runtime.record(format!("notify_commit {}", source));
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Consent provider that counts how often it is asked.
#[derive(Debug, Clone)]
pub struct CountingConsent {
    pub answer: Consent,
    pub calls: Arc<AtomicUsize>,
}

impl CountingConsent {
    pub fn new(answer: Consent) -> Self {
        Self {
            answer,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConsentProvider for CountingConsent {
    fn consent(&self, _application_id: &str) -> Consent {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

// ============================================================================
// Files
// ============================================================================

/// Creates `name` inside `dir` with some content and returns its path.
pub fn source_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("content of {}", name)).unwrap();
    path
}

/// Returns the path a committed copy of `source` is written to.
pub fn modified_path(source: &Path) -> PathBuf {
    docseal::derive_output_path(&source.display().to_string()).unwrap()
}
