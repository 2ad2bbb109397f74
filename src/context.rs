use std::{fmt::Debug, sync::Arc, time::Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;
use vc_flow_frontend::{Outcome, Status};

use crate::{
    config::Config,
    core::{
        host::{IdentityProvider, MessageEvent, WindowHost, WindowId},
        presentation::VerifiableCredential,
    },
    error::FlowError,
    flow::{FlowEvent, FlowOrchestrator},
    utils::NonEmptyVec,
};

/// What the relying party's UI can do with a mounted [VcContext].
#[async_trait]
pub trait VcFlow: Debug {
    /// Start a flow. Resolves once the identity provider window has been opened.
    async fn start_flow(&self) -> Result<Uuid, FlowError>;

    /// The credentials received by the last successful flow, in presentation order.
    async fn credentials(&self) -> Option<NonEmptyVec<VerifiableCredential>>;

    /// Status of the most recent flow, if any was started.
    async fn status(&self) -> Option<Status>;
}

#[derive(Debug)]
struct ContextState {
    /// `None` once unmounted.
    orchestrator: Option<FlowOrchestrator>,
    credentials: Option<NonEmptyVec<VerifiableCredential>>,
    /// The most recently started flow; `status` follows only this one.
    current: Option<Uuid>,
    status: Option<Status>,
}

/// Holds the credentials of one mounted application and drives its flows.
///
/// Cloning yields another handle on the same state.
#[derive(Debug, Clone)]
pub struct VcContext(Arc<Mutex<ContextState>>);

impl VcContext {
    pub fn new(orchestrator: FlowOrchestrator) -> Self {
        Self(Arc::new(Mutex::new(ContextState {
            orchestrator: Some(orchestrator),
            credentials: None,
            current: None,
            status: None,
        })))
    }

    /// Create a context for `config`, with no credentials yet.
    pub fn mount(
        config: &Config,
        host: Arc<dyn WindowHost + Send + Sync>,
        identity: Arc<dyn IdentityProvider + Send + Sync>,
    ) -> Result<Self> {
        let orchestrator = FlowOrchestrator::builder()
            .with_config(config)?
            .with_host(host)
            .with_identity_provider(identity)
            .build()?;
        Ok(Self::new(orchestrator))
    }

    /// Feed a cross-window message to the flows.
    ///
    /// ## Returns
    /// An error only if a flow failed terminally because of this message. Unrelated and malformed
    /// messages are ignored.
    pub async fn handle_message(&self, event: &MessageEvent) -> Result<(), FlowError> {
        let mut state = self.0.lock().await;
        let Some(orchestrator) = state.orchestrator.as_mut() else {
            debug!(origin = %event.origin, "ignoring message, the VC context is unmounted");
            return Ok(());
        };
        let event = orchestrator.handle_message(event).await;
        state.record(event)
    }

    /// Tell the context the host observed `window` being closed.
    pub async fn window_closed(&self, window: WindowId) {
        let mut state = self.0.lock().await;
        let Some(orchestrator) = state.orchestrator.as_mut() else {
            return;
        };
        for event in orchestrator.window_closed(window) {
            state.record(event).ok();
        }
    }

    /// Expire the flows that waited too long for the identity provider.
    pub async fn expire_stale(&self, now: Instant) {
        let mut state = self.0.lock().await;
        let Some(orchestrator) = state.orchestrator.as_mut() else {
            return;
        };
        for event in orchestrator.expire_stale(now).await {
            state.record(event).ok();
        }
    }

    /// Tear down every in-flight flow. The context accepts no further flows.
    pub async fn unmount(&self) {
        let mut state = self.0.lock().await;
        let Some(mut orchestrator) = state.orchestrator.take() else {
            return;
        };
        for event in orchestrator.cancel().await {
            state.record(event).ok();
        }
        debug!("VC context unmounted");
    }

    pub async fn is_mounted(&self) -> bool {
        self.0.lock().await.orchestrator.is_some()
    }
}

#[async_trait]
impl VcFlow for VcContext {
    async fn start_flow(&self) -> Result<Uuid, FlowError> {
        let mut state = self.0.lock().await;
        let orchestrator = state.orchestrator.as_mut().ok_or(FlowError::Unmounted)?;
        let id = orchestrator.start_flow().await?;
        state.current = Some(id);
        state.status = Some(Status::AwaitingReady);
        Ok(id)
    }

    async fn credentials(&self) -> Option<NonEmptyVec<VerifiableCredential>> {
        self.0.lock().await.credentials.clone()
    }

    async fn status(&self) -> Option<Status> {
        self.0.lock().await.status.clone()
    }
}

impl ContextState {
    /// Apply `event`. Credentials are published by any flow; shadowed flows leave the status
    /// alone.
    fn record(&mut self, event: FlowEvent) -> Result<(), FlowError> {
        let is_current = event.flow().is_some_and(|flow| Some(flow) == self.current);
        let (status, result) = match event {
            FlowEvent::Ignored => return Ok(()),
            FlowEvent::RequestSent { .. } => (Status::AwaitingResponse, Ok(())),
            FlowEvent::Completed { flow, credentials } => {
                let info = json!({
                    "flow": flow.to_string(),
                    "credentials": credentials.len(),
                });
                self.credentials = Some(credentials);
                (Status::Complete(Outcome::Success { info }), Ok(()))
            }
            FlowEvent::Failed { error, .. } => (
                Status::Complete(Outcome::Error {
                    cause: error.to_string(),
                }),
                Err(error),
            ),
            FlowEvent::Abandoned { reason, .. } => {
                (Status::Complete(Outcome::Failure { reason }), Ok(()))
            }
        };
        if is_current {
            self.status = Some(status);
        }
        result
    }
}
