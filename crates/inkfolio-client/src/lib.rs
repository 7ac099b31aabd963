//! Inkfolio backend client — the generation lifecycle in library form.
//!
//! Flow: upload resume → create generation → poll until terminal →
//!       hydrate full detail → fetch rendered artifact → settle.
//!
//! The crate is layered leaf-first:
//! - [`transport`] — one HTTP call per invocation, normalized into
//!   `{payload, requestId}` or a typed [`errors::ApiError`]. No retries here.
//! - [`errors`] — the closed error taxonomy plus friendly-message rendering.
//! - [`client`] — one typed binding per backend endpoint, behind the
//!   [`client::BackendApi`] trait so callers and tests can swap the wire away.
//! - [`workflow`] — the orchestrator that drives upload/generate/poll/hydrate
//!   and owns timing, soft timeouts, and cancellation.
//!
//! Authentication is a capability: the orchestrator asks a
//! [`session::SessionCarrier`] for the current bearer token and forwards it
//! verbatim. Anonymous use is supported; the transport keeps a cookie store so
//! the backend's anonymous-session cookie survives across calls.

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod session;
pub mod transport;
pub mod workflow;

pub use client::{ApiClient, BackendApi};
pub use config::Config;
pub use errors::{ApiError, ErrorCode};
pub use models::{
    FilePayload, Generation, GenerationOptions, GenerationPage, GenerationStatus, IdempotencyKey,
    PublicPortfolio, Theme, UploadReceipt,
};
pub use session::{Anonymous, SessionCarrier, StaticToken};
pub use workflow::{
    validate_file, GenerationWorkflow, SettledGeneration, WorkflowOutcome, WorkflowProgress,
};
