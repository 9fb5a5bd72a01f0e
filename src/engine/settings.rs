//! Profile and engine configuration.
//!
//! [`EngineConfig`] holds the process-wide engine defaults. For each
//! workflow invocation it is combined with the resolved identity into an
//! [`EngineSettings`] value via [`EngineConfig::settings_for`].
//!
//! # Example
//!
//! ```rust
//! use docseal::engine::{EngineConfig, LabelFilter};
//!
//! let config = EngineConfig::new()
//!     .locale("de-DE")
//!     .enable_msg(true)
//!     .enable_functionality("DoubleKeyProtection, HyokProtection")?;
//! assert_eq!(config.enabled_functionality(), &[
//!     LabelFilter::DoubleKeyProtection,
//!     LabelFilter::HyokProtection,
//! ]);
//! # Ok::<(), docseal::Error>(())
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::types::{AuthContext, CacheStorage, Identity};
use crate::{Error, Result};

/// Custom setting keys understood by the engine.
pub mod keys {
    /// Policy data loaded from a local file.
    pub const POLICY_DATA: &str = "policy_data";
    /// Enables the Outlook message format.
    pub const ENABLE_MSG_FILE_TYPE: &str = "enable_msg_file_type";
    /// Enables the Power BI format.
    pub const ENABLE_POWER_BI_FILE_TYPE: &str = "enable_power_bi_file_type";
    /// Keeps PDF linearization when rewriting.
    pub const KEEP_PDF_LINEARIZATION: &str = "keep_pdf_linearization";
    /// Container decryption mode: `Top` or `All`.
    pub const CONTAINER_DECRYPTION_OPTION: &str = "container_decryption_option";
}

/// Identification of the calling application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationInfo {
    /// Application registration id.
    pub id: String,
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
}

impl ApplicationInfo {
    /// Creates application info with the crate's own name and version.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Sets the application name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the application version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Checks that id, name and version are all present.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("id", &self.id),
            ("name", &self.name),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid_argument(format!(
                    "Application {} must not be empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Diagnostic and audit configuration passed to profile creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticSettings {
    /// Whether audit events are sent with elevated priority.
    pub audit_priority_enhanced: bool,
    /// Upper bound for engine teardown at shutdown.
    pub max_teardown_time: Option<Duration>,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            audit_priority_enhanced: true,
            max_teardown_time: Some(Duration::from_secs(2)),
        }
    }
}

impl DiagnosticSettings {
    /// Creates default diagnostic settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether audit events get elevated priority.
    pub fn audit_priority_enhanced(mut self, enabled: bool) -> Self {
        self.audit_priority_enhanced = enabled;
        self
    }

    /// Sets the teardown bound; `None` waits indefinitely.
    pub fn max_teardown_time(mut self, limit: Option<Duration>) -> Self {
        self.max_teardown_time = limit;
        self
    }
}

/// Settings for loading a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSettings {
    /// The application the profile belongs to.
    pub application: ApplicationInfo,
    /// Where profile state is cached.
    pub cache_storage: CacheStorage,
    /// Whether telemetry may be sent; decided by the consent provider.
    pub telemetry_enabled: bool,
    /// Diagnostic configuration.
    pub diagnostics: DiagnosticSettings,
}

/// Cloud the engine talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cloud {
    /// The public commercial cloud.
    #[default]
    Commercial,
    /// Explicit endpoints.
    Custom {
        /// Base URL of the protection service.
        protection_base_url: String,
        /// Base URL of the policy service.
        policy_base_url: String,
    },
}

/// How protected containers such as emails are decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerDecryption {
    /// Decrypt the container only; attachments stay protected.
    Top,
    /// Decrypt the container and all attachments.
    All,
}

impl ContainerDecryption {
    /// Returns the engine's name for the option.
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerDecryption::Top => "Top",
            ContainerDecryption::All => "All",
        }
    }
}

/// Label capabilities that can be switched on or off per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelFilter {
    /// No filter.
    None,
    /// Labels with custom protection.
    CustomProtection,
    /// Labels with template protection.
    TemplateProtection,
    /// Labels with do-not-forward protection.
    DoNotForwardProtection,
    /// Labels with ad hoc protection.
    AdhocProtection,
    /// Labels with hold-your-own-key protection.
    HyokProtection,
    /// Labels with predefined template protection.
    PredefinedTemplateProtection,
    /// Labels with double key protection.
    DoubleKeyProtection,
    /// Labels with user-defined double key protection.
    DoubleKeyUserDefinedProtection,
    /// Sensitive information classifiers.
    SensitiveInformationClassifier,
    /// Machine learning classifiers.
    MachineLearningClassifier,
    /// Extended sensitive information classifiers.
    ExtendedSensitiveInformationClassifier,
}

impl LabelFilter {
    /// Parses a comma-separated list of filter names.
    ///
    /// Whitespace around names is ignored and empty entries are skipped.
    pub fn parse_list(list: &str) -> Result<Vec<LabelFilter>> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for LabelFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let filter = match s {
            "None" => LabelFilter::None,
            "CustomProtection" => LabelFilter::CustomProtection,
            "TemplateProtection" => LabelFilter::TemplateProtection,
            "DoNotForwardProtection" => LabelFilter::DoNotForwardProtection,
            "AdhocProtection" => LabelFilter::AdhocProtection,
            "HyokProtection" => LabelFilter::HyokProtection,
            "PredefinedTemplateProtection" => LabelFilter::PredefinedTemplateProtection,
            "DoubleKeyProtection" => LabelFilter::DoubleKeyProtection,
            "DoubleKeyUserDefinedProtection" => LabelFilter::DoubleKeyUserDefinedProtection,
            "SensitiveInformationClassifier" => LabelFilter::SensitiveInformationClassifier,
            "MachineLearningClassifier" => LabelFilter::MachineLearningClassifier,
            "ExtendedSensitiveInformationClassifier" => {
                LabelFilter::ExtendedSensitiveInformationClassifier
            }
            other => {
                return Err(Error::invalid_argument(format!(
                    "Filter type not recognized: {}",
                    other
                )));
            }
        };
        Ok(filter)
    }
}

/// Process-wide engine defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    cloud: Cloud,
    locale: String,
    protection_only: bool,
    policy_file: Option<PathBuf>,
    enable_msg: bool,
    enable_power_bi: bool,
    keep_pdf_linearization: bool,
    decrypt_top_only: bool,
    decrypt_all: bool,
    enabled_functionality: Vec<LabelFilter>,
    disabled_functionality: Vec<LabelFilter>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cloud: Cloud::Commercial,
            locale: "en-US".to_string(),
            protection_only: true,
            policy_file: None,
            enable_msg: false,
            enable_power_bi: false,
            keep_pdf_linearization: false,
            decrypt_top_only: false,
            decrypt_all: false,
            enabled_functionality: Vec::new(),
            disabled_functionality: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses explicit service endpoints.
    ///
    /// Endpoints are only applied when both URLs are non-empty; otherwise
    /// the commercial cloud is kept.
    pub fn custom_endpoints(
        mut self,
        protection_base_url: impl Into<String>,
        policy_base_url: impl Into<String>,
    ) -> Self {
        let protection_base_url = protection_base_url.into();
        let policy_base_url = policy_base_url.into();
        self.cloud = if protection_base_url.is_empty() || policy_base_url.is_empty() {
            Cloud::Commercial
        } else {
            Cloud::Custom {
                protection_base_url,
                policy_base_url,
            }
        };
        self
    }

    /// Sets the locale for engine messages.
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Restricts the engine to protection without labeling policy.
    pub fn protection_only(mut self, enabled: bool) -> Self {
        self.protection_only = enabled;
        self
    }

    /// Loads labeling policy from a local file instead of the service.
    pub fn policy_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_file = Some(path.into());
        self
    }

    /// Enables the Outlook message format.
    pub fn enable_msg(mut self, enabled: bool) -> Self {
        self.enable_msg = enabled;
        self
    }

    /// Enables the Power BI format.
    pub fn enable_power_bi(mut self, enabled: bool) -> Self {
        self.enable_power_bi = enabled;
        self
    }

    /// Keeps PDF linearization when rewriting.
    pub fn keep_pdf_linearization(mut self, enabled: bool) -> Self {
        self.keep_pdf_linearization = enabled;
        self
    }

    /// Decrypts only the top-level container.
    pub fn decrypt_top_only(mut self, enabled: bool) -> Self {
        self.decrypt_top_only = enabled;
        self
    }

    /// Decrypts the container and all embedded attachments.
    pub fn decrypt_all(mut self, enabled: bool) -> Self {
        self.decrypt_all = enabled;
        self
    }

    /// Enables label capabilities from a comma-separated list of names.
    pub fn enable_functionality(mut self, list: &str) -> Result<Self> {
        self.enabled_functionality.extend(LabelFilter::parse_list(list)?);
        Ok(self)
    }

    /// Disables label capabilities from a comma-separated list of names.
    pub fn disable_functionality(mut self, list: &str) -> Result<Self> {
        self.disabled_functionality.extend(LabelFilter::parse_list(list)?);
        Ok(self)
    }

    /// Returns the configured cloud.
    pub fn cloud(&self) -> &Cloud {
        &self.cloud
    }

    /// Returns the explicitly enabled label capabilities.
    pub fn enabled_functionality(&self) -> &[LabelFilter] {
        &self.enabled_functionality
    }

    /// Returns the explicitly disabled label capabilities.
    pub fn disabled_functionality(&self) -> &[LabelFilter] {
        &self.disabled_functionality
    }

    /// Returns the configured container decryption mode.
    ///
    /// Fails if both modes were requested.
    pub fn container_decryption(&self) -> Result<Option<ContainerDecryption>> {
        match (self.decrypt_top_only, self.decrypt_all) {
            (true, true) => Err(Error::invalid_argument(
                "Both decrypt_top_only and decrypt_all cannot be set at the same time",
            )),
            (true, false) => Ok(Some(ContainerDecryption::Top)),
            (false, true) => Ok(Some(ContainerDecryption::All)),
            (false, false) => Ok(None),
        }
    }

    /// Builds the engine settings for one invocation.
    ///
    /// Reads the policy file if one is configured.
    pub fn settings_for(&self, auth: AuthContext) -> Result<EngineSettings> {
        let mut custom_settings = BTreeMap::new();

        if let Some(path) = &self.policy_file {
            let policy = std::fs::read_to_string(path).map_err(|e| {
                Error::invalid_argument(format!(
                    "Cannot read policy file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            custom_settings.insert(keys::POLICY_DATA.to_string(), policy);
        }
        if self.enable_msg {
            custom_settings.insert(keys::ENABLE_MSG_FILE_TYPE.to_string(), "true".to_string());
        }
        if self.enable_power_bi {
            custom_settings.insert(
                keys::ENABLE_POWER_BI_FILE_TYPE.to_string(),
                "true".to_string(),
            );
        }
        if self.keep_pdf_linearization {
            custom_settings.insert(keys::KEEP_PDF_LINEARIZATION.to_string(), "true".to_string());
        }
        if let Some(mode) = self.container_decryption()? {
            custom_settings.insert(
                keys::CONTAINER_DECRYPTION_OPTION.to_string(),
                mode.as_str().to_string(),
            );
        }

        // Disabling wins over enabling the same capability.
        let mut functionality: Vec<(LabelFilter, bool)> = Vec::new();
        let enabled = self.enabled_functionality.iter().map(|f| (*f, true));
        let disabled = self.disabled_functionality.iter().map(|f| (*f, false));
        for (filter, on) in enabled.chain(disabled) {
            functionality.retain(|(existing, _)| *existing != filter);
            functionality.push((filter, on));
        }

        Ok(EngineSettings {
            identity: auth.identity.clone(),
            auth,
            cloud: self.cloud.clone(),
            locale: self.locale.clone(),
            protection_only: self.protection_only,
            functionality,
            custom_settings,
        })
    }
}

/// Settings for creating one engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Identity the engine is bound to.
    pub identity: Option<Identity>,
    /// Resolved authentication context.
    pub auth: AuthContext,
    /// Cloud endpoints.
    pub cloud: Cloud,
    /// Locale for engine messages.
    pub locale: String,
    /// Whether the engine only handles protection.
    pub protection_only: bool,
    /// Label capabilities switched on (`true`) or off (`false`).
    pub functionality: Vec<(LabelFilter, bool)>,
    /// Custom key/value settings.
    pub custom_settings: BTreeMap<String, String>,
}
