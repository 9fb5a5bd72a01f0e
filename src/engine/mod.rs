//! Contract with the external protection engine.
//!
//! The engine itself (template resolution, rights evaluation, cryptography)
//! is a black box. This module defines the narrow surface the workflow
//! drives: a process-wide [`EngineRuntime`], a [`Profile`] per application,
//! an [`Engine`] per identity, and a [`Handler`] per document.
//!
//! Creation and mutation operations are asynchronous: each takes a
//! [`Completion`] and returns immediately. Callers block on the result with
//! [`await_completion`]. Status queries and `is_modified` are synchronous.
//!
//! # Implementing an Engine
//!
//! Bindings to a concrete engine implement the traits below and are handed
//! to a [`ProcessContext`](crate::ProcessContext). Completions may be
//! fulfilled from any thread, before or after the call returns.

mod completion;
mod settings;
mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use completion::{Completion, Pending, await_completion, completion};
pub use settings::{
    ApplicationInfo, Cloud, ContainerDecryption, DiagnosticSettings, EngineConfig, EngineSettings,
    LabelFilter, ProfileSettings, keys,
};
pub use types::{
    AssignmentMethod, AuthContext, CacheStorage, Consent, ContentDescription, ContentLabel,
    ContentSource, ContentStatus, CredentialRequest, DataState, ExtendedProperty, HandlerOptions,
    Identity, Label, LabelingOptions, ProtectionPolicy, ProtectionType, UserRights, UserRoles,
    rights,
};

use crate::Result;
use crate::credential::Secret;

/// Process-wide entry point of the engine.
pub trait EngineRuntime: Send + Sync {
    /// Loads the profile described by `settings`.
    fn load_profile(&self, settings: ProfileSettings, done: Completion<Arc<dyn Profile>>);

    /// Reads protection and label flags without creating a profile or engine.
    ///
    /// Stream sources are read from their current position; callers rewind
    /// them before reusing the stream.
    fn content_status(&self, source: &mut ContentSource) -> Result<ContentStatus>;

    /// Tears down engine state, waiting at most `max_teardown` if given.
    fn shutdown(&self, max_teardown: Option<Duration>);
}

/// Root object from which engines are created; shared across invocations.
pub trait Profile: Send + Sync {
    /// Creates an engine bound to one identity and configuration.
    fn add_engine(&self, settings: EngineSettings, done: Completion<Box<dyn Engine>>);
}

/// Engine bound to one identity; scoped to one invocation.
pub trait Engine: Send {
    /// Opens a handler for one document.
    fn create_handler(
        &self,
        source: ContentSource,
        options: &HandlerOptions,
        done: Completion<Box<dyn Handler>>,
    );

    /// Resolves a label defined by policy.
    fn label_by_id(&self, id: &str) -> Result<Label>;
}

/// Engine object bound to one document.
pub trait Handler: Send {
    /// Fetches the applied label.
    fn get_label(&self, done: Completion<Option<ContentLabel>>);

    /// Fetches the applied protection.
    fn get_protection(&self, done: Completion<Option<ProtectionPolicy>>);

    /// Applies a label.
    fn set_label(&mut self, label: &Label, options: &LabelingOptions, done: Completion<()>);

    /// Removes the applied label.
    fn delete_label(&mut self, options: &LabelingOptions, done: Completion<()>);

    /// Applies a protection policy.
    fn set_protection(&mut self, policy: &ProtectionPolicy, done: Completion<()>);

    /// Removes protection.
    fn remove_protection(&mut self, done: Completion<()>);

    /// Returns true if pending changes would alter the document.
    fn is_modified(&self) -> bool;

    /// Returns the file name the engine proposes for the output.
    fn output_file_name(&self) -> String;

    /// Writes the document with pending changes to `output`.
    ///
    /// Completes with `false` if the engine could not write the file.
    fn commit(&mut self, output: &Path, done: Completion<bool>);

    /// Records a successful commit for auditing.
    fn notify_commit_successful(&self, source: &str);
}

/// Resolves bearer credentials for the engine.
pub trait AuthProvider: Send + Sync {
    /// Acquires a credential. May be called repeatedly.
    fn acquire_token(&self, request: &CredentialRequest<'_>) -> Result<Secret>;
}

/// Decides whether diagnostic features may be enabled.
pub trait ConsentProvider: Send + Sync {
    /// Asks for consent on behalf of `application_id`.
    fn consent(&self, application_id: &str) -> Consent;
}

/// An auth provider that passes a supplied token through unchanged.
///
/// Fails if the request carries no token.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenPassthrough;

impl AuthProvider for TokenPassthrough {
    fn acquire_token(&self, request: &CredentialRequest<'_>) -> Result<Secret> {
        request.token.cloned().ok_or_else(|| {
            crate::Error::Authentication(format!(
                "No protection token supplied for application {}",
                request.application_id
            ))
        })
    }
}

/// A consent provider that always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedConsent(pub Consent);

impl Default for FixedConsent {
    fn default() -> Self {
        FixedConsent(Consent::AcceptAlways)
    }
}

impl ConsentProvider for FixedConsent {
    fn consent(&self, _application_id: &str) -> Consent {
        self.0
    }
}
