//! Process-scoped engine state.
//!
//! A [`ProcessContext`] owns the engine runtime and the collaborators shared
//! by every workflow invocation. It must outlive all invocations; dropping it
//! tears the runtime down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::{
    ApplicationInfo, AuthProvider, CacheStorage, ConsentProvider, DiagnosticSettings,
    EngineConfig, EngineRuntime, FixedConsent, Profile, ProfileSettings, TokenPassthrough,
    await_completion,
};
use crate::{Error, Result};

/// Acquires a mutex lock, recovering from poisoning if necessary.
///
/// The profile cache only holds shared handles, so a panic while the lock
/// was held cannot leave it half-updated.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Profile cache mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Lifetime manager for the protection engine.
///
/// # Example
///
/// ```rust,ignore
/// use docseal::{ProcessContext, engine::{EngineConfig, FixedConsent, Consent}};
///
/// let context = ProcessContext::builder(runtime)
///     .consent_provider(FixedConsent(Consent::Reject))
///     .engine_config(EngineConfig::new().locale("fr-FR"))
///     .build();
/// ```
pub struct ProcessContext {
    runtime: Arc<dyn EngineRuntime>,
    auth: Arc<dyn AuthProvider>,
    consent: Arc<dyn ConsentProvider>,
    engine_config: EngineConfig,
    diagnostics: DiagnosticSettings,
    cache_storage: CacheStorage,
    profiles: Mutex<HashMap<String, Arc<dyn Profile>>>,
    shut_down: AtomicBool,
}

impl ProcessContext {
    /// Starts building a context around an engine runtime.
    pub fn builder(runtime: Arc<dyn EngineRuntime>) -> ProcessContextBuilder {
        ProcessContextBuilder {
            runtime,
            auth: Arc::new(TokenPassthrough),
            consent: Arc::new(FixedConsent::default()),
            engine_config: EngineConfig::default(),
            diagnostics: DiagnosticSettings::default(),
            cache_storage: CacheStorage::InMemory,
        }
    }

    /// Creates a context with default collaborators and configuration.
    pub fn new(runtime: Arc<dyn EngineRuntime>) -> Self {
        Self::builder(runtime).build()
    }

    /// Returns the engine runtime.
    pub fn runtime(&self) -> &dyn EngineRuntime {
        self.runtime.as_ref()
    }

    /// Returns the auth provider.
    pub fn auth_provider(&self) -> &dyn AuthProvider {
        self.auth.as_ref()
    }

    /// Returns the engine defaults.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine_config
    }

    /// Returns the diagnostic settings.
    pub fn diagnostics(&self) -> &DiagnosticSettings {
        &self.diagnostics
    }

    /// Returns the number of cached profiles.
    pub fn profile_count(&self) -> usize {
        lock_or_recover(&self.profiles).len()
    }

    /// Returns true once the runtime has been torn down.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Returns the profile for an application, loading it on first use.
    ///
    /// The consent provider is consulted once, when the profile is created.
    /// The cache lock is held while loading so that concurrent callers for
    /// the same application share one profile.
    pub fn profile(&self, application: &ApplicationInfo) -> Result<Arc<dyn Profile>> {
        if self.is_shut_down() {
            return Err(Error::engine("Process context has been shut down"));
        }
        application.validate()?;

        let mut profiles = lock_or_recover(&self.profiles);
        if let Some(profile) = profiles.get(&application.id) {
            return Ok(Arc::clone(profile));
        }

        let consent = self.consent.consent(&application.id);
        log::debug!(
            "Loading profile for application {} (consent: {:?})",
            application.id,
            consent
        );
        let settings = ProfileSettings {
            application: application.clone(),
            cache_storage: self.cache_storage,
            telemetry_enabled: consent.is_granted(),
            diagnostics: self.diagnostics.clone(),
        };
        let profile = await_completion(|done| self.runtime.load_profile(settings, done))?;
        profiles.insert(application.id.clone(), Arc::clone(&profile));
        Ok(profile)
    }

    /// Releases cached profiles and tears the runtime down.
    ///
    /// Only the first call has an effect.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let released = {
            let mut profiles = lock_or_recover(&self.profiles);
            let count = profiles.len();
            profiles.clear();
            count
        };
        log::debug!("Shutting down engine runtime ({} profiles released)", released);
        self.runtime.shutdown(self.diagnostics.max_teardown_time);
    }
}

impl Drop for ProcessContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessContext")
            .field("engine_config", &self.engine_config)
            .field("diagnostics", &self.diagnostics)
            .field("cache_storage", &self.cache_storage)
            .field("profiles", &self.profile_count())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Builder for [`ProcessContext`].
pub struct ProcessContextBuilder {
    runtime: Arc<dyn EngineRuntime>,
    auth: Arc<dyn AuthProvider>,
    consent: Arc<dyn ConsentProvider>,
    engine_config: EngineConfig,
    diagnostics: DiagnosticSettings,
    cache_storage: CacheStorage,
}

impl ProcessContextBuilder {
    /// Sets the auth provider. Defaults to passing supplied tokens through.
    pub fn auth_provider(mut self, auth: impl AuthProvider + 'static) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    /// Sets the consent provider. Defaults to always accepting.
    pub fn consent_provider(mut self, consent: impl ConsentProvider + 'static) -> Self {
        self.consent = Arc::new(consent);
        self
    }

    /// Sets the engine defaults.
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Sets the diagnostic settings.
    pub fn diagnostics(mut self, diagnostics: DiagnosticSettings) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Sets where profile state is cached. Defaults to memory only.
    pub fn cache_storage(mut self, storage: CacheStorage) -> Self {
        self.cache_storage = storage;
        self
    }

    /// Builds the context.
    pub fn build(self) -> ProcessContext {
        ProcessContext {
            runtime: self.runtime,
            auth: self.auth,
            consent: self.consent,
            engine_config: self.engine_config,
            diagnostics: self.diagnostics,
            cache_storage: self.cache_storage,
            profiles: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }
}
