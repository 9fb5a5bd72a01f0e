//! The protection workflow state machine.

use std::path::{Path, PathBuf};

use super::output_path::derive_output_path;
use super::request::{Operation, WorkflowRequest};
use super::result::{NO_CHANGES_MESSAGE, NOT_PROTECTED_MESSAGE, Outcome, WorkflowResult};
use crate::context::ProcessContext;
use crate::engine::{
    ApplicationInfo, AuthContext, ContentDescription, ContentSource, ContentStatus,
    CredentialRequest, DataState, Engine, Handler, HandlerOptions, Identity, await_completion,
    rights,
};
use crate::stream::{EditableBuffer, EditableStream};
use crate::{Error, Result};

/// Engine and handler opened for one mutating request.
struct Target {
    engine: Box<dyn Engine>,
    handler: Box<dyn Handler>,
    output: PathBuf,
    status: Option<ContentStatus>,
}

/// Options for workflow invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Read the source into an [`EditableBuffer`] before opening the handler.
    pub load_into_memory: bool,
    /// State of the content, reported for auditing.
    pub data_state: DataState,
    /// Emit a discovery audit event when the handler is opened.
    pub audit_discovery: bool,
}

impl WorkflowOptions {
    /// Creates default options: the engine opens source files directly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the source is loaded into memory first.
    pub fn load_into_memory(mut self, enabled: bool) -> Self {
        self.load_into_memory = enabled;
        self
    }

    /// Sets the reported data state.
    pub fn data_state(mut self, state: DataState) -> Self {
        self.data_state = state;
        self
    }

    /// Sets whether handler creation is audited as discovery.
    pub fn audit_discovery(mut self, enabled: bool) -> Self {
        self.audit_discovery = enabled;
        self
    }

    fn handler_options(&self) -> HandlerOptions {
        HandlerOptions {
            data_state: self.data_state,
            audit_discovery: self.audit_discovery,
            ..Default::default()
        }
    }
}

/// Fetches the label and protection of an open handler.
///
/// Both fields are `None` for content that is neither labeled nor protected.
pub fn describe_content(handler: &dyn Handler) -> Result<ContentDescription> {
    let label = await_completion(|done| handler.get_label(done))?;
    let protection = await_completion(|done| handler.get_protection(done))?;
    Ok(ContentDescription { label, protection })
}

/// Fails with [`Error::AccessDenied`] if the content is protected and the
/// current user lacks the export right.
pub fn ensure_user_has_rights(handler: &dyn Handler) -> Result<()> {
    let protection = await_completion(|done| handler.get_protection(done))?;
    match protection {
        Some(policy) if !policy.access_check(rights::EXPORT) => Err(Error::AccessDenied {
            required: rights::EXPORT.to_string(),
            owner: Some(policy.owner).filter(|owner| !owner.is_empty()),
            referrer: policy.referrer,
        }),
        _ => Ok(()),
    }
}

/// Drives the protection engine through one request.
///
/// Every asynchronous engine call is awaited before the next step starts,
/// so an invocation is sequential from the caller's point of view. Engines
/// and handlers live for one invocation; the profile comes from the shared
/// [`ProcessContext`].
///
/// # Example
///
/// ```rust,ignore
/// use docseal::{ProtectionWorkflow, WorkflowRequest};
///
/// let workflow = ProtectionWorkflow::new(&context);
/// let result = workflow.execute(&WorkflowRequest::unprotect("plan.docx", "app-id").token(token))?;
/// println!("{}", result.to_json());
/// ```
#[derive(Debug)]
pub struct ProtectionWorkflow<'a> {
    context: &'a ProcessContext,
    options: WorkflowOptions,
}

impl<'a> ProtectionWorkflow<'a> {
    /// Creates a workflow with default options.
    pub fn new(context: &'a ProcessContext) -> Self {
        Self::with_options(context, WorkflowOptions::default())
    }

    /// Creates a workflow with explicit options.
    pub fn with_options(context: &'a ProcessContext, options: WorkflowOptions) -> Self {
        Self { context, options }
    }

    /// Returns the workflow options.
    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Runs a request and converts its outcome into a [`WorkflowResult`].
    ///
    /// Every error becomes a failure-shaped result except
    /// [`Error::CommitIntegrity`], which is returned as `Err`.
    pub fn execute(&self, request: &WorkflowRequest) -> Result<WorkflowResult> {
        let kind = request.operation.kind();
        match self.run(request) {
            Ok(outcome) => {
                let result = WorkflowResult::new(kind, &request.source_path, outcome);
                log::info!("{}", result);
                Ok(result)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::debug!("{} {} failed: {:?}", kind, request.source_path.display(), e);
                Ok(WorkflowResult::failed(kind, &request.source_path, e))
            }
        }
    }

    /// Runs a request, propagating every error.
    pub fn run(&self, request: &WorkflowRequest) -> Result<Outcome> {
        request.validate()?;
        match &request.operation {
            Operation::Inspect => self.inspect(&request.source_path).map(Outcome::Inspected),
            Operation::Unprotect => {
                let mut target = self.open_target(request)?;
                if !target.status.is_some_and(|s| s.needs_unprotect()) {
                    log::debug!("{}: {}", request.source_path.display(), NOT_PROTECTED_MESSAGE);
                    return Ok(Outcome::NoChange {
                        reason: NOT_PROTECTED_MESSAGE.to_string(),
                    });
                }
                log::debug!("Removing protection from {}", request.source_path.display());
                await_completion(|done| target.handler.remove_protection(done))?;
                self.commit(&mut target, &request.source_path)
            }
            Operation::Protect => {
                let reference = request.reference().ok_or_else(|| {
                    Error::invalid_argument("Protect requires a reference protected file")
                })?;
                let mut target = self.open_target(request)?;
                let reference_source = ContentSource::Path(reference.to_path_buf());
                let reference_handler =
                    self.open_handler(target.engine.as_ref(), reference_source)?;
                let policy = await_completion(|done| reference_handler.get_protection(done))?
                    .ok_or_else(|| {
                        Error::invalid_argument(format!(
                            "Reference file '{}' is not protected",
                            reference.display()
                        ))
                    })?;
                log::debug!(
                    "Copying protection '{}' from {} to {}",
                    policy.name,
                    reference.display(),
                    request.source_path.display()
                );
                await_completion(|done| target.handler.set_protection(&policy, done))?;
                self.commit(&mut target, &request.source_path)
            }
            Operation::SetLabel { label_id, options } => {
                let mut target = self.open_target(request)?;
                let label = target.engine.label_by_id(label_id)?;
                log::debug!("Applying label '{}' ({})", label.name, label.id);
                await_completion(|done| target.handler.set_label(&label, options, done))?;
                self.commit(&mut target, &request.source_path)
            }
            Operation::DeleteLabel { options } => {
                let mut target = self.open_target(request)?;
                log::debug!("Deleting label from {}", request.source_path.display());
                await_completion(|done| target.handler.delete_label(options, done))?;
                self.commit(&mut target, &request.source_path)
            }
        }
    }

    /// Opens the request's document and returns its label and protection.
    pub fn describe(&self, request: &WorkflowRequest) -> Result<ContentDescription> {
        request.validate()?;
        let engine = self.create_engine(request)?;
        let source = self.prepare_source(&request.source_path)?;
        let handler = self.open_handler(engine.as_ref(), source)?;
        describe_content(handler.as_ref())
    }

    /// Reads the flags of a document without creating an engine.
    pub fn inspect(&self, path: &Path) -> Result<ContentStatus> {
        let mut source = self.prepare_source(path)?;
        self.query_status(&mut source)
    }

    /// Creates the engine, opens the target handler, derives the output path
    /// and checks the caller's rights. Unprotect also reads the status first.
    fn open_target(&self, request: &WorkflowRequest) -> Result<Target> {
        let engine = self.create_engine(request)?;
        let mut source = self.prepare_source(&request.source_path)?;
        let status = match request.operation {
            Operation::Unprotect => Some(self.query_status(&mut source)?),
            _ => None,
        };
        let handler = self.open_handler(engine.as_ref(), source)?;
        let output = derive_output_path(&handler.output_file_name())?;
        log::debug!("Output path for {}: {}", request.source_path.display(), output.display());

        ensure_user_has_rights(handler.as_ref())?;
        Ok(Target {
            engine,
            handler,
            output,
            status,
        })
    }

    fn resolve_identity(&self, request: &WorkflowRequest) -> Result<AuthContext> {
        log::debug!("Resolving identity for application {}", request.application_id);
        let credential_request = CredentialRequest {
            application_id: &request.application_id,
            username: request.target_user.as_deref(),
            password: None,
            token: request.protection_token.as_ref(),
        };
        let credential = self
            .context
            .auth_provider()
            .acquire_token(&credential_request)
            .map_err(|e| match e {
                Error::Authentication(_) => e,
                other => Error::Authentication(other.to_string()),
            })?;
        Ok(AuthContext {
            identity: request.target_user.as_deref().map(Identity::new),
            credential,
        })
    }

    fn create_engine(&self, request: &WorkflowRequest) -> Result<Box<dyn Engine>> {
        let auth = self.resolve_identity(request)?;
        let profile = self
            .context
            .profile(&ApplicationInfo::new(request.application_id.as_str()))?;
        let settings = self.context.engine_config().settings_for(auth)?;
        log::debug!("Creating engine (locale {})", settings.locale);
        await_completion(|done| profile.add_engine(settings, done))
    }

    fn prepare_source(&self, path: &Path) -> Result<ContentSource> {
        if !self.options.load_into_memory {
            return Ok(ContentSource::Path(path.to_path_buf()));
        }
        let buffer = EditableBuffer::from_path(path)?;
        Ok(ContentSource::Stream {
            stream: Box::new(buffer),
            identifier: path.display().to_string(),
        })
    }

    fn query_status(&self, source: &mut ContentSource) -> Result<ContentStatus> {
        let status = self.context.runtime().content_status(source)?;
        if let ContentSource::Stream { stream, .. } = source {
            stream.seek(0)?;
        }
        log::debug!("Status of {}: {:?}", source.identifier(), status);
        Ok(status)
    }

    fn open_handler(&self, engine: &dyn Engine, source: ContentSource) -> Result<Box<dyn Handler>> {
        log::debug!("Opening handler for {}", source.identifier());
        let options = self.options.handler_options();
        await_completion(|done| engine.create_handler(source, &options, done))
    }

    fn commit(&self, target: &mut Target, source: &Path) -> Result<Outcome> {
        let Target { handler, output, .. } = target;
        let output = output.as_path();
        if !handler.is_modified() {
            log::debug!("{}: {}", source.display(), NO_CHANGES_MESSAGE);
            return Ok(Outcome::NoChange {
                reason: NO_CHANGES_MESSAGE.to_string(),
            });
        }

        log::debug!("Committing {} to {}", source.display(), output.display());
        match await_completion(|done| handler.commit(output, done)) {
            Ok(true) => {
                handler.notify_commit_successful(&source.to_string_lossy());
                log::debug!("New file created: {}", output.display());
                Ok(Outcome::Committed {
                    path: output.to_path_buf(),
                })
            }
            Ok(false) if output.exists() => Err(Error::CommitIntegrity {
                path: output.to_path_buf(),
            }),
            Ok(false) => Err(Error::engine("Commit failed; no output file was written")),
            Err(e) => {
                if output.exists() {
                    log::warn!(
                        "Commit of {} failed but left a file at {}",
                        source.display(),
                        output.display()
                    );
                }
                Err(e)
            }
        }
    }
}
