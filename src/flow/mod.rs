use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    config::Config,
    core::{
        host::{IdentityProvider, MessageEvent, TargetOrigin, WindowHost, WindowId},
        presentation::{VerifiableCredential, VerifiablePresentation},
        request::{FlowRequest, RequestBuilder},
        response::{FlowReady, FlowResponse, FlowResult, ProtocolErrorVersion},
        schema::Validate,
        token,
    },
    error::FlowError,
    utils::NonEmptyVec,
};

use session::{Flows, Handler};

pub use session::{Flow, FlowState};

pub mod session;

/// What to do when a flow is started while another one is still in flight.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReentryPolicy {
    /// Start the new flow alongside the others. Responses that cannot be attributed to a window
    /// go to the most recently armed completion handler.
    #[default]
    Shadow,
    /// Refuse to start a flow while another is in flight.
    Reject,
}

/// The effect a message or lifecycle call had on the orchestrator.
#[derive(Debug)]
pub enum FlowEvent {
    /// The message does not belong to any in-flight flow. Nothing changed.
    Ignored,
    RequestSent {
        flow: Uuid,
        request: FlowRequest,
    },
    Completed {
        flow: Uuid,
        credentials: NonEmptyVec<VerifiableCredential>,
    },
    Failed {
        flow: Uuid,
        error: FlowError,
    },
    /// The flow was torn down without an answer (timeout, closed window, cancellation).
    Abandoned {
        flow: Uuid,
        reason: String,
    },
}

impl FlowEvent {
    pub fn flow(&self) -> Option<Uuid> {
        match self {
            FlowEvent::Ignored => None,
            FlowEvent::RequestSent { flow, .. }
            | FlowEvent::Completed { flow, .. }
            | FlowEvent::Failed { flow, .. }
            | FlowEvent::Abandoned { flow, .. } => Some(*flow),
        }
    }
}

/// Decode a presentation token and every credential token it wraps.
///
/// Signatures are not verified.
pub fn decode_presentation(
    token: &str,
) -> Result<NonEmptyVec<VerifiableCredential>, FlowError> {
    token::decode_as::<VerifiablePresentation>(token)?.decode_credentials()
}

/// Drives VC flows: opens the identity provider window, answers its readiness signal with a
/// credential request and decodes the response.
///
/// The orchestrator does not listen on the messaging channel itself; the host feeds every
/// cross-window message to [FlowOrchestrator::handle_message]. Each in-flight flow has exactly
/// one handler armed, and messages no armed handler accepts are ignored.
#[derive(Debug)]
pub struct FlowOrchestrator {
    host: Arc<dyn WindowHost + Send + Sync>,
    identity: Arc<dyn IdentityProvider + Send + Sync>,
    flow_url: Url,
    request_builder: RequestBuilder,
    reentry: ReentryPolicy,
    ready_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    flows: Flows,
}

impl FlowOrchestrator {
    pub fn builder() -> FlowOrchestratorBuilder {
        FlowOrchestratorBuilder::default()
    }

    /// State of the most recently started flow, or [FlowState::Idle] when none is in flight.
    pub fn state(&self) -> FlowState {
        self.flows.latest().map_or(FlowState::Idle, Flow::state)
    }

    pub fn flow_state(&self, id: Uuid) -> FlowState {
        self.flows.get(id).map_or(FlowState::Idle, Flow::state)
    }

    pub fn in_flight(&self) -> usize {
        self.flows.len()
    }

    /// Open the identity provider window and arm the readiness handler.
    ///
    /// Fails without opening a window if there is no identity or the request could not be built
    /// for it.
    pub async fn start_flow(&mut self) -> Result<Uuid, FlowError> {
        if self.reentry == ReentryPolicy::Reject && !self.flows.is_empty() {
            return Err(FlowError::FlowInProgress);
        }

        let subject = self.identity.identity().ok_or(FlowError::MissingIdentity)?;
        self.request_builder.build(&subject)?;

        if !self.flows.is_empty() {
            warn!(
                in_flight = self.flows.len(),
                "starting a VC flow while others are in flight, the newest handlers take precedence"
            );
        }

        let window = self
            .host
            .open(&self.flow_url)
            .await
            .context("failed to open the identity provider window")?;

        let flow = Flow::new(window, Instant::now());
        let id = flow.id;
        self.flows.arm(flow);

        info!(flow = %id, %window, url = %self.flow_url, "awaiting identity provider readiness");
        Ok(id)
    }

    /// Process a message received over the cross-window channel.
    ///
    /// Messages that are not part of the protocol, or that no armed handler accepts, leave every
    /// flow unchanged and yield [FlowEvent::Ignored].
    pub async fn handle_message(&mut self, event: &MessageEvent) -> FlowEvent {
        if FlowReady::parse(&event.data).is_ok() {
            return self.on_ready(event).await;
        }

        match FlowResponse::parse(&event.data) {
            Ok(response) => self.on_response(event, response).await,
            Err(e) => {
                debug!(origin = %event.origin, error = %e, "ignoring message that is not a VC flow response");
                FlowEvent::Ignored
            }
        }
    }

    /// Tear down the flows whose identity provider window was closed.
    pub fn window_closed(&mut self, window: WindowId) -> Vec<FlowEvent> {
        self.flows
            .remove_where(|flow| flow.window == window)
            .into_iter()
            .map(|flow| {
                info!(flow = %flow.id, %window, "identity provider window closed");
                FlowEvent::Abandoned {
                    flow: flow.id,
                    reason: "the identity provider window was closed".to_owned(),
                }
            })
            .collect()
    }

    /// Tear down the flows whose armed handler has waited longer than its timeout.
    pub async fn expire_stale(&mut self, now: Instant) -> Vec<FlowEvent> {
        let (ready_timeout, response_timeout) = (self.ready_timeout, self.response_timeout);
        let expired = self.flows.remove_where(|flow| {
            let timeout = match flow.handler {
                Handler::Readiness => ready_timeout,
                Handler::Completion => response_timeout,
            };
            timeout.is_some_and(|timeout| flow.is_stale(timeout, now))
        });

        let mut events = Vec::with_capacity(expired.len());
        for flow in expired {
            let reason = match flow.state() {
                FlowState::AwaitingResponse => "timed out waiting for the identity provider response",
                _ => "timed out waiting for the identity provider to become ready",
            };
            warn!(flow = %flow.id, reason, "VC flow expired");
            self.close_window(flow.window).await;
            events.push(FlowEvent::Abandoned {
                flow: flow.id,
                reason: reason.to_owned(),
            });
        }
        events
    }

    /// Tear down every in-flight flow and close their windows.
    pub async fn cancel(&mut self) -> Vec<FlowEvent> {
        let mut events = vec![];
        for flow in self.flows.remove_where(|_| true) {
            info!(flow = %flow.id, "VC flow cancelled");
            self.close_window(flow.window).await;
            events.push(FlowEvent::Abandoned {
                flow: flow.id,
                reason: "the flow was cancelled".to_owned(),
            });
        }
        events
    }

    async fn on_ready(&mut self, event: &MessageEvent) -> FlowEvent {
        let Some(flow_id) = event
            .source
            .and_then(|window| self.flows.by_window(window, Handler::Readiness))
            .map(|flow| flow.id)
        else {
            debug!(origin = %event.origin, "ignoring readiness signal from a window without an armed readiness handler");
            return FlowEvent::Ignored;
        };

        let Some(subject) = self.identity.identity() else {
            debug!(flow = %flow_id, "ignoring readiness signal, no identity is available");
            return FlowEvent::Ignored;
        };

        let target_origin = match TargetOrigin::pinned(&event.origin) {
            Ok(origin) => origin,
            Err(e) => {
                warn!(flow = %flow_id, error = %e, "ignoring readiness signal from an origin that cannot be pinned");
                return FlowEvent::Ignored;
            }
        };

        let request = match self.request_builder.build(&subject) {
            Ok(request) => request,
            Err(e) => return self.fail(flow_id, e.into()).await,
        };
        let message = match serde_json::to_value(&request) {
            Ok(message) => message,
            Err(e) => return self.fail(flow_id, e.into()).await,
        };

        let Some(flow) = self.flows.get_mut(flow_id) else {
            return FlowEvent::Ignored;
        };
        flow.request_sent(Instant::now());
        let window = flow.window;

        if let Err(e) = self
            .host
            .post_message(window, message, &target_origin)
            .await
        {
            let e = e.context("failed to send the credential request");
            return self.fail(flow_id, e.into()).await;
        }

        info!(flow = %flow_id, %target_origin, "credential request sent");
        FlowEvent::RequestSent {
            flow: flow_id,
            request,
        }
    }

    async fn on_response(&mut self, event: &MessageEvent, response: FlowResponse) -> FlowEvent {
        let Some(flow_id) = event
            .source
            .and_then(|window| self.flows.by_window(window, Handler::Completion))
            .or_else(|| self.flows.latest_with(Handler::Completion))
            .map(|flow| flow.id)
        else {
            debug!(origin = %event.origin, "ignoring VC flow response, no completion handler is armed");
            return FlowEvent::Ignored;
        };

        match response.result {
            FlowResult::VerifiablePresentation(presentation) => {
                let credentials = match decode_presentation(&presentation) {
                    Ok(credentials) => credentials,
                    Err(e) => {
                        debug!(flow = %flow_id, error = %e, "ignoring response whose presentation could not be decoded");
                        return FlowEvent::Ignored;
                    }
                };

                self.flows.remove(flow_id);
                self.close_source(event).await;

                info!(flow = %flow_id, credentials = credentials.len(), "VC flow completed");
                FlowEvent::Completed {
                    flow: flow_id,
                    credentials,
                }
            }
            FlowResult::Error(error) => {
                self.flows.remove(flow_id);
                self.close_source(event).await;

                warn!(flow = %flow_id, code = %error.code, "identity provider reported an error");
                FlowEvent::Failed {
                    flow: flow_id,
                    error: FlowError::ProtocolErrorResult {
                        version: ProtocolErrorVersion::VALUE.to_owned(),
                        code: error.code,
                    },
                }
            }
        }
    }

    async fn fail(&mut self, flow_id: Uuid, error: FlowError) -> FlowEvent {
        if let Some(flow) = self.flows.remove(flow_id) {
            self.close_window(flow.window).await;
        }
        warn!(flow = %flow_id, %error, "VC flow failed");
        FlowEvent::Failed {
            flow: flow_id,
            error,
        }
    }

    async fn close_source(&self, event: &MessageEvent) {
        if let Some(window) = event.source {
            self.close_window(window).await;
        }
    }

    async fn close_window(&self, window: WindowId) {
        match self.host.close(window).await {
            Ok(true) => debug!(%window, "closed identity provider window"),
            Ok(false) => debug!(%window, "identity provider window cannot be closed"),
            Err(e) => warn!(%window, "failed to close identity provider window: {e:#}"),
        }
    }
}

/// Builder struct for [FlowOrchestrator].
#[derive(Debug, Clone, Default)]
pub struct FlowOrchestratorBuilder {
    host: Option<Arc<dyn WindowHost + Send + Sync>>,
    identity: Option<Arc<dyn IdentityProvider + Send + Sync>>,
    flow_url: Option<Url>,
    request_builder: Option<RequestBuilder>,
    reentry: ReentryPolicy,
    ready_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
}

impl FlowOrchestratorBuilder {
    /// Build the orchestrator.
    pub fn build(self) -> Result<FlowOrchestrator> {
        let Self {
            host,
            identity,
            flow_url,
            request_builder,
            reentry,
            ready_timeout,
            response_timeout,
        } = self;

        let Some(host) = host else {
            bail!("window host is required, see `with_host`")
        };

        let Some(identity) = identity else {
            bail!("identity provider is required, see `with_identity_provider`")
        };

        let Some(flow_url) = flow_url else {
            bail!("flow URL is required, see `with_flow_url`")
        };

        let Some(request_builder) = request_builder else {
            bail!("request builder is required, see `with_request_builder`")
        };

        Ok(FlowOrchestrator {
            host,
            identity,
            flow_url,
            request_builder,
            reentry,
            ready_timeout,
            response_timeout,
            flows: Flows::default(),
        })
    }

    /// Take the flow URL, request, re-entry policy and timeouts from `config`.
    pub fn with_config(mut self, config: &Config) -> Result<Self> {
        self.flow_url = Some(config.flow_url()?);
        self.request_builder = Some(config.request_builder()?);
        self.reentry = config.reentry;
        self.ready_timeout = config.ready_timeout();
        self.response_timeout = config.response_timeout();
        Ok(self)
    }

    /// Set the [WindowHost] used to open, message and close the identity provider window.
    pub fn with_host(mut self, host: Arc<dyn WindowHost + Send + Sync>) -> Self {
        self.host = Some(host);
        self
    }

    /// Set the [IdentityProvider] supplying the subject of the requested credentials.
    pub fn with_identity_provider(
        mut self,
        identity: Arc<dyn IdentityProvider + Send + Sync>,
    ) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the URL of the identity provider's VC flow page.
    pub fn with_flow_url(mut self, flow_url: Url) -> Self {
        self.flow_url = Some(flow_url);
        self
    }

    /// Set the [RequestBuilder] describing the requested credential and its issuer.
    pub fn with_request_builder(mut self, request_builder: RequestBuilder) -> Self {
        self.request_builder = Some(request_builder);
        self
    }

    pub fn with_reentry_policy(mut self, reentry: ReentryPolicy) -> Self {
        self.reentry = reentry;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }
}
