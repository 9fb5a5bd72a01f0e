//! Request/response dispatcher around the boundary entry points.
//!
//! A [`Service`] maps method names and JSON request bodies onto the
//! workflow, the way a sidecar-based deployment invokes it:
//!
//! | Method | Body |
//! |--------|------|
//! | `inspect_file` | `{"file", "application_id"}` |
//! | `unprotect_file` | `{"file", "application_id", "scc_token"}` |
//! | `protect_file` | `{"file", "application_id", "scc_token", "user", "encrypted_file"}` |
//!
//! Responses carry an HTTP-style status code: 200 with the workflow payload,
//! 400 for a malformed body, 404 for an unknown method and 500 when the
//! workflow fails fatally.

mod stats;

pub use stats::{
    EXTERNAL_CALL_LATENCY_BUCKETS, ExternalCallSnapshot, MethodSnapshot, REQUEST_LATENCY_BUCKETS,
    RequestStatus, RequestTimer, ServiceStats,
};

use std::str::FromStr;

use prometheus::Registry;
use serde::Deserialize;

use crate::boundary::run_to_json;
use crate::context::ProcessContext;
use crate::workflow::{ProtectionWorkflow, WorkflowOptions, WorkflowRequest};
use crate::{Error, Result};

/// Content type of every response body.
pub const CONTENT_TYPE: &str = "application/json";

/// Methods the service dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceMethod {
    /// Inspect a file.
    InspectFile = 0,
    /// Remove protection from a file.
    UnprotectFile = 1,
    /// Protect a file with a reference file's policy.
    ProtectFile = 2,
}

impl ServiceMethod {
    /// Every dispatched method.
    pub const ALL: [ServiceMethod; 3] = [
        ServiceMethod::InspectFile,
        ServiceMethod::UnprotectFile,
        ServiceMethod::ProtectFile,
    ];

    /// Returns the method name.
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceMethod::InspectFile => "inspect_file",
            ServiceMethod::UnprotectFile => "unprotect_file",
            ServiceMethod::ProtectFile => "protect_file",
        }
    }

    /// Returns the name under which the workflow call is timed.
    pub fn external_function(self) -> &'static str {
        match self {
            ServiceMethod::InspectFile => "get_file_status",
            ServiceMethod::UnprotectFile => "unprotect_file",
            ServiceMethod::ProtectFile => "protect_file",
        }
    }
}

impl FromStr for ServiceMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ServiceMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("Unknown method: {}", s)))
    }
}

#[derive(Debug, Deserialize)]
struct FileData {
    file: String,
    application_id: String,
}

#[derive(Debug, Deserialize)]
struct UnprotectFileData {
    file: String,
    application_id: String,
    scc_token: String,
}

#[derive(Debug, Deserialize)]
struct ProtectFileData {
    file: String,
    application_id: String,
    scc_token: String,
    user: String,
    encrypted_file: String,
}

/// A dispatched response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Response body.
    pub body: String,
}

impl ServiceResponse {
    fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    /// Returns the content type of the body.
    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    /// Returns true for status code 200.
    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }
}

/// Dispatches service methods onto workflows sharing one process context.
#[derive(Debug)]
pub struct Service<'a> {
    context: &'a ProcessContext,
    options: WorkflowOptions,
    stats: ServiceStats,
}

impl<'a> Service<'a> {
    /// Creates a service with default workflow options and a private
    /// metrics registry.
    pub fn new(context: &'a ProcessContext) -> Result<Self> {
        Self::with_registry(context, Registry::new())
    }

    /// Creates a service whose metrics are registered in `registry`.
    pub fn with_registry(context: &'a ProcessContext, registry: Registry) -> Result<Self> {
        Ok(Self {
            context,
            options: WorkflowOptions::default(),
            stats: ServiceStats::with_registry(registry)?,
        })
    }

    /// Sets the workflow options used for every request.
    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the request statistics.
    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    /// Handles one invocation.
    pub fn invoke(&self, method: &str, body: &str) -> ServiceResponse {
        let method = match method.parse::<ServiceMethod>() {
            Ok(method) => method,
            Err(e) => {
                log::warn!("{}", e);
                return ServiceResponse::new(404, e.to_string());
            }
        };
        log::info!("Received {} invocation", method.as_str());

        let timer = self.stats.start(method);
        let request = match parse_request(method, body) {
            Ok(request) => request,
            Err(e) => {
                log::info!("Validation error in {}: {}", method.as_str(), e);
                timer.finish(RequestStatus::ValidationError);
                return ServiceResponse::new(400, e.to_string());
            }
        };

        let workflow = ProtectionWorkflow::with_options(self.context, self.options.clone());
        let outcome = self
            .stats
            .observe_external_call(method.external_function(), || {
                run_to_json(&workflow, &request)
            });
        match outcome {
            Ok(payload) => {
                timer.finish(RequestStatus::Success);
                ServiceResponse::new(200, payload)
            }
            Err(e) => {
                log::error!("Error in {}: {}", method.as_str(), e);
                timer.finish(RequestStatus::Error);
                ServiceResponse::new(500, e.to_string())
            }
        }
    }
}

fn parse_request(method: ServiceMethod, body: &str) -> serde_json::Result<WorkflowRequest> {
    let request = match method {
        ServiceMethod::InspectFile => {
            let data: FileData = serde_json::from_str(body)?;
            WorkflowRequest::inspect(data.file, data.application_id)
        }
        ServiceMethod::UnprotectFile => {
            let data: UnprotectFileData = serde_json::from_str(body)?;
            WorkflowRequest::unprotect(data.file, data.application_id).token(data.scc_token)
        }
        ServiceMethod::ProtectFile => {
            let data: ProtectFileData = serde_json::from_str(body)?;
            WorkflowRequest::protect(data.file, data.encrypted_file, data.application_id)
                .token(data.scc_token)
                .user(data.user)
        }
    };
    Ok(request)
}
