//! Value types exchanged with the protection engine.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::credential::Secret;
use crate::stream::EditableStream;

/// Well-known usage rights evaluated by the engine.
pub mod rights {
    /// Allows removing protection or changing the label of content.
    pub const EXPORT: &str = "EXPORT";
    /// Allows full control of the content, including all other rights.
    pub const OWNER: &str = "OWNER";
    /// Allows viewing the content.
    pub const VIEW: &str = "VIEW";
    /// Allows editing the content.
    pub const EDIT: &str = "EDIT";
}

/// Protection and label flags read from a status query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentStatus {
    /// Whether the content itself is protected.
    pub is_protected: bool,
    /// Whether the content carries a label.
    pub is_labeled: bool,
    /// Whether the content embeds protected objects such as attachments.
    pub contains_protected_objects: bool,
}

impl ContentStatus {
    /// Returns true if an unprotect operation has anything to remove.
    pub fn needs_unprotect(&self) -> bool {
        self.is_protected || self.contains_protected_objects
    }
}

/// The user an engine acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Email or user principal name.
    pub email: String,
}

impl Identity {
    /// Creates an identity from an email address.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

/// A resolved authentication context for one workflow invocation.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Identity the engine is bound to, if one was named.
    pub identity: Option<Identity>,
    /// Bearer credential presented to the engine.
    pub credential: Secret,
}

/// Inputs to credential resolution.
#[derive(Debug, Clone, Copy)]
pub struct CredentialRequest<'a> {
    /// Application registration the credential is requested for.
    pub application_id: &'a str,
    /// Optional user name.
    pub username: Option<&'a str>,
    /// Optional password.
    pub password: Option<&'a Secret>,
    /// Optional pre-acquired token.
    pub token: Option<&'a Secret>,
}

/// How a label was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssignmentMethod {
    /// Applied by a user or an application on the user's behalf.
    #[default]
    Standard,
    /// Applied by an administrator or a privileged process.
    Privileged,
    /// Applied automatically by policy.
    Auto,
}

/// A sensitivity label defined by policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Label identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Sensitivity ordinal; higher is more sensitive.
    pub sensitivity: i32,
    /// Parent label for sublabels.
    pub parent: Option<Box<Label>>,
}

/// A custom key/value pair attached to a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedProperty {
    /// Vendor namespace of the property.
    pub vendor: String,
    /// Property key.
    pub key: String,
    /// Property value.
    pub value: String,
}

/// The label currently applied to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLabel {
    /// The applied label.
    pub label: Label,
    /// How it was applied.
    pub assignment: AssignmentMethod,
    /// When it was applied, if recorded.
    pub created: Option<SystemTime>,
    /// Custom properties attached to the label.
    pub extended_properties: Vec<ExtendedProperty>,
}

impl ContentLabel {
    /// Returns true if the label was applied with privileged assignment.
    pub fn is_privileged(&self) -> bool {
        self.assignment == AssignmentMethod::Privileged
    }
}

/// Options for setting or deleting a label.
///
/// # Example
///
/// ```rust
/// use docseal::engine::{AssignmentMethod, LabelingOptions};
///
/// let options = LabelingOptions::new()
///     .assignment(AssignmentMethod::Privileged)
///     .justification("Declassified by records team");
/// assert!(options.is_downgrade_justified());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelingOptions {
    /// Assignment method recorded with the label.
    pub assignment: AssignmentMethod,
    /// Justification for lowering the sensitivity, if any.
    pub justification: Option<String>,
    /// Custom properties to attach.
    pub extended_properties: Vec<ExtendedProperty>,
}

impl LabelingOptions {
    /// Creates default labeling options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the assignment method.
    pub fn assignment(mut self, assignment: AssignmentMethod) -> Self {
        self.assignment = assignment;
        self
    }

    /// Sets the downgrade justification. An empty message clears it.
    pub fn justification(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.justification = if message.is_empty() {
            None
        } else {
            Some(message)
        };
        self
    }

    /// Adds a custom property.
    pub fn extended_property(
        mut self,
        vendor: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extended_properties.push(ExtendedProperty {
            vendor: vendor.into(),
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Returns true if a downgrade justification accompanies the change.
    pub fn is_downgrade_justified(&self) -> bool {
        self.justification.is_some()
    }
}

/// Whether a policy was defined from a template or ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionType {
    /// Policy defined by an administrator-published template.
    TemplateBased,
    /// Policy defined ad hoc for this content.
    Custom,
}

/// Rights granted to a set of users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRights {
    /// Users or groups receiving the rights.
    pub users: Vec<String>,
    /// Granted rights.
    pub rights: Vec<String>,
}

/// Roles granted to a set of users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRoles {
    /// Users or groups receiving the roles.
    pub users: Vec<String>,
    /// Granted roles.
    pub roles: Vec<String>,
}

/// The protection policy applied to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionPolicy {
    /// Policy name.
    pub name: String,
    /// Template identifier for template-based policies.
    pub template_id: Option<String>,
    /// Policy kind.
    pub protection_type: ProtectionType,
    /// Content owner.
    pub owner: String,
    /// Where users can request access.
    pub referrer: Option<String>,
    /// Rights per user set.
    pub user_rights: Vec<UserRights>,
    /// Roles per user set.
    pub user_roles: Vec<UserRoles>,
    /// Expiry of the content, if any.
    pub content_valid_until: Option<SystemTime>,
    /// Rights the current user holds on the content.
    pub granted_rights: Vec<String>,
}

impl ProtectionPolicy {
    /// Returns true if the current user holds `right`.
    ///
    /// The owner right implies every other right.
    pub fn access_check(&self, right: &str) -> bool {
        self.granted_rights
            .iter()
            .any(|granted| granted.eq_ignore_ascii_case(right) || granted == rights::OWNER)
    }

    /// Returns true if the content expires.
    pub fn does_content_expire(&self) -> bool {
        self.content_valid_until.is_some()
    }
}

/// Whether content is at rest, in motion or in use; reported for auditing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataState {
    /// Stored content.
    #[default]
    Rest,
    /// Content being transferred.
    Motion,
    /// Content being actively used.
    Use,
}

/// Label and protection details of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDescription {
    /// The applied label, if any.
    pub label: Option<ContentLabel>,
    /// The applied protection, if any.
    pub protection: Option<ProtectionPolicy>,
}

impl ContentDescription {
    /// Returns true if the content is neither labeled nor protected.
    pub fn is_plain(&self) -> bool {
        self.label.is_none() && self.protection.is_none()
    }
}

/// Content handed to the engine when a handler is opened.
pub enum ContentSource {
    /// The engine opens the file itself.
    Path(PathBuf),
    /// The engine operates on an editable stream.
    Stream {
        /// Stream positioned at the start of the content.
        stream: Box<dyn EditableStream>,
        /// Name the engine uses to recognize the content format.
        identifier: String,
    },
}

impl ContentSource {
    /// Returns the content identifier: the path or the stream's name.
    pub fn identifier(&self) -> String {
        match self {
            ContentSource::Path(path) => path.display().to_string(),
            ContentSource::Stream { identifier, .. } => identifier.clone(),
        }
    }
}

impl std::fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ContentSource::Stream { stream, identifier } => f
                .debug_struct("Stream")
                .field("identifier", identifier)
                .field("size", &stream.size())
                .finish(),
        }
    }
}

/// Options for opening a handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    /// State of the content, reported for auditing.
    pub data_state: DataState,
    /// Whether opening the handler emits a discovery audit event.
    pub audit_discovery: bool,
    /// Custom key/value settings forwarded to the engine.
    pub custom_settings: BTreeMap<String, String>,
}

/// Answer of the consent provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    /// Consent granted for this request only.
    Accept,
    /// Consent granted and remembered.
    AcceptAlways,
    /// Consent refused.
    Reject,
}

impl Consent {
    /// Returns true if consent was granted.
    pub fn is_granted(self) -> bool {
        !matches!(self, Consent::Reject)
    }
}

/// Where the engine caches profile state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheStorage {
    /// Nothing survives the process.
    #[default]
    InMemory,
    /// Cached on disk.
    OnDisk,
    /// Cached on disk, encrypted.
    OnDiskEncrypted,
}
