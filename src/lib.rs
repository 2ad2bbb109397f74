//! This library implements the relying-party side of the Internet Identity
//! verifiable credential flow.
//!
//! A relying party obtains, from a separate identity provider window, a signed
//! attestation about its user without learning the user's linked identities.
//!
//! # Usage
//!
//! The [`VcContext`] is the entry point. Mount one per application, feed it every
//! cross-window message the host receives, and read back the credentials:
//!
//! ```ignore
//! use vc_flow::{Config, VcContext, VcFlow};
//! use vc_flow::core::host::{MessageEvent, StaticIdentity};
//!
//! let config: Config = serde_json::from_str(r#"{
//!     "identity_provider": "https://identity.ic0.app",
//!     "issuer": { "canister_id": "bkyz2-fmaaa-aaaaa-qaaaq-cai", "network": "ic" },
//!     "min_score": 5
//! }"#)?;
//!
//! let context = VcContext::mount(
//!     &config,
//!     Arc::new(BrowserWindows::default()),
//!     Arc::new(StaticIdentity(Some(principal))),
//! )?;
//!
//! // Opens `https://identity.ic0.app/vc-flow/`.
//! context.start_flow().await?;
//!
//! // For every `message` event received by the page.
//! context
//!     .handle_message(&MessageEvent { data, origin, source })
//!     .await?;
//!
//! if let Some(credentials) = context.credentials().await {
//!     render(credentials);
//! }
//! ```
//!
//! The page's window capabilities are provided by implementing the [`WindowHost`] trait.
//!
//! [`WindowHost`]: crate::core::host::WindowHost
//!
//! # Protocol Overview
//!
//! 1. *Relying party opens the flow*: [`FlowOrchestrator::start_flow`] opens the
//!    identity provider's `vc-flow/` page.
//! 2. *Identity provider signals readiness*: it posts a [`FlowReady`] message.
//! 3. *Relying party requests a credential*: a [`FlowRequest`] is posted back, pinned
//!    to the origin the readiness signal came from.
//! 4. *Identity provider answers*: a [`FlowResponse`] carries either a presentation
//!    token or a protocol error.
//! 5. *Relying party decodes*: the presentation token, and every credential token it
//!    wraps, is decoded and validated against the [`core::schema`] definitions.
//!
//! Token signatures are **not** verified. Decoded credentials must not be trusted
//! without verifying them upstream.
//!
//! [`FlowReady`]: crate::core::response::FlowReady
//! [`FlowRequest`]: crate::core::request::FlowRequest
//! [`FlowResponse`]: crate::core::response::FlowResponse

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod flow;
pub mod utils;

pub use config::Config;
pub use context::{VcContext, VcFlow};
pub use error::FlowError;
pub use flow::{FlowEvent, FlowOrchestrator, FlowState, ReentryPolicy};
pub use vc_flow_frontend::{Outcome, Status};
