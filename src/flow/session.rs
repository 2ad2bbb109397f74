use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::core::host::WindowId;

/// Where a single flow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No handler is armed.
    Idle,
    /// The identity provider window is open; the readiness handler is armed.
    AwaitingReady,
    /// The request was sent; the completion handler is armed.
    AwaitingResponse,
}

/// The message handler a flow currently has armed. Exactly one at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    Readiness,
    Completion,
}

/// An in-flight flow.
#[derive(Debug, Clone)]
pub struct Flow {
    pub id: Uuid,
    /// The identity provider window opened for this flow.
    pub window: WindowId,
    pub(crate) handler: Handler,
    armed_at: Instant,
}

impl Flow {
    pub(crate) fn new(window: WindowId, now: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            window,
            handler: Handler::Readiness,
            armed_at: now,
        }
    }

    pub fn state(&self) -> FlowState {
        match self.handler {
            Handler::Readiness => FlowState::AwaitingReady,
            Handler::Completion => FlowState::AwaitingResponse,
        }
    }

    /// Swap the readiness handler for the completion handler.
    pub(crate) fn request_sent(&mut self, now: Instant) {
        self.handler = Handler::Completion;
        self.armed_at = now;
    }

    /// Whether the armed handler has been waiting longer than `timeout`.
    pub(crate) fn is_stale(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.armed_at) >= timeout
    }
}

/// The in-flight flows, in the order they were armed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Flows(Vec<Flow>);

impl Flows {
    pub fn arm(&mut self, flow: Flow) {
        self.0.push(flow);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, id: Uuid) -> Option<&Flow> {
        self.0.iter().find(|flow| flow.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Flow> {
        self.0.iter_mut().find(|flow| flow.id == id)
    }

    pub fn latest(&self) -> Option<&Flow> {
        self.0.last()
    }

    /// The flow whose window is `window` and whose armed handler is `handler`.
    pub fn by_window(&self, window: WindowId, handler: Handler) -> Option<&Flow> {
        self.0
            .iter()
            .rev()
            .find(|flow| flow.window == window && flow.handler == handler)
    }

    /// The most recently armed flow with `handler` armed.
    pub fn latest_with(&self, handler: Handler) -> Option<&Flow> {
        self.0.iter().rev().find(|flow| flow.handler == handler)
    }

    /// Disarm and forget a flow.
    pub fn remove(&mut self, id: Uuid) -> Option<Flow> {
        let index = self.0.iter().position(|flow| flow.id == id)?;
        Some(self.0.remove(index))
    }

    /// Disarm and forget every flow matching `predicate`.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Flow) -> bool) -> Vec<Flow> {
        let (removed, kept): (Vec<Flow>, Vec<Flow>) = std::mem::take(&mut self.0)
            .into_iter()
            .partition(|flow| predicate(flow));
        self.0 = kept;
        removed
    }
}
