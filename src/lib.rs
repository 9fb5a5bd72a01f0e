//! # docseal
//!
//! Orchestration of label and protection workflows around an external
//! document-protection engine, plus the editable in-memory stream that
//! documents are staged in while the engine rewrites them.
//!
//! The protection engine itself (policy evaluation, templates, cryptography)
//! is not part of this crate. Bindings implement the traits in [`engine`] and
//! hand them to a [`ProcessContext`]; this crate sequences the calls, derives
//! output paths and reports results.
//!
//! ## Quick Start
//!
//! ### Editing a Buffer
//!
//! ```rust
//! use docseal::{EditableBuffer, Result};
//!
//! fn main() -> Result<()> {
//!     let mut buffer = EditableBuffer::new(b"Hello World".to_vec());
//!     buffer.seek(5)?;
//!     buffer.insert(b",")?;
//!     buffer.delete(1);
//!     buffer.insert(b" ")?;
//!     assert_eq!(buffer.as_bytes(), b"Hello, World");
//!     Ok(())
//! }
//! ```
//!
//! ### Running a Workflow
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docseal::{ProcessContext, ProtectionWorkflow, WorkflowRequest};
//!
//! let context = ProcessContext::new(Arc::new(my_engine_runtime));
//! let workflow = ProtectionWorkflow::new(&context);
//!
//! let request = WorkflowRequest::unprotect("plan.docx", "app-id").token(token);
//! let result = workflow.execute(&request)?;
//! if let Some(path) = result.output_path() {
//!     println!("Unprotected copy written to {}", path.display());
//! }
//! ```
//!
//! ### Host Entry Points
//!
//! The [`boundary`] functions take and return plain strings so that a host
//! process can call them directly:
//!
//! ```rust,ignore
//! let payload = docseal::boundary::inspect(&context, "plan.docx", "app-id");
//! // {"status":true,"protected":false,"labeled":true,"protected_objects":false,"path":"plan.docx"}
//! ```
//!
//! ## Error Handling
//!
//! Operations return [`Result<T>`]. Workflows fold every error into a
//! failure-shaped [`WorkflowResult`] except [`Error::CommitIntegrity`], which
//! signals that the engine left a partial output file behind.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `service` | Yes | JSON request dispatcher with Prometheus request metrics |
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod boundary;
pub mod context;
pub mod credential;
pub mod engine;
pub mod error;
pub mod stream;
pub mod workflow;

#[cfg(feature = "service")]
#[cfg_attr(docsrs, doc(cfg(feature = "service")))]
pub mod service;

pub use context::{ProcessContext, ProcessContextBuilder};
pub use credential::Secret;
pub use error::{Error, Result};
pub use stream::{EditableBuffer, EditableStream};
pub use workflow::{
    Operation, OperationKind, Outcome, ProtectionWorkflow, WorkflowOptions, WorkflowRequest,
    WorkflowResult, derive_output_path,
};

#[cfg(feature = "service")]
pub use service::{Service, ServiceResponse, ServiceStats};
