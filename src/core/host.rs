//! The environment the engine runs in: a host able to open, message and close windows, and a
//! provider of the current user's identity.
use std::fmt::{self, Debug};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value as Json;
use url::Url;

/// Opaque handle on a window opened by (or messaging) the relying party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// A message received over the cross-window messaging channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub data: Json,
    /// Origin of the window that posted the message.
    pub origin: String,
    /// The window that posted the message, if the host can identify it.
    pub source: Option<WindowId>,
}

/// The origin a message is delivered to. Never a wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOrigin(String);

impl TargetOrigin {
    /// Pin delivery to `origin`.
    ///
    /// # Errors
    /// Returns an error for the wildcard `*` and for origins that cannot be targeted (empty,
    /// opaque `null`, or not parseable as a URL).
    pub fn pinned(origin: &str) -> Result<Self> {
        if origin.is_empty() || origin == "*" || origin == "null" {
            bail!("cannot pin messages to origin '{origin}'")
        }
        let url = Url::parse(origin)?;
        if !url.origin().is_tuple() {
            bail!("'{origin}' is an opaque origin")
        }
        Ok(Self(url.origin().ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The popup-window capabilities of the page hosting the engine.
#[async_trait]
pub trait WindowHost: Debug {
    /// Open a new window (or tab) at `url`.
    async fn open(&self, url: &Url) -> Result<WindowId>;

    /// Post `message` to `window`, to be delivered only if its origin is `target_origin`.
    async fn post_message(
        &self,
        window: WindowId,
        message: Json,
        target_origin: &TargetOrigin,
    ) -> Result<()>;

    /// Close `window`.
    ///
    /// ## Returns
    /// `false` if the window exposes no close capability.
    async fn close(&self, window: WindowId) -> Result<bool>;
}

/// Supplies the principal of the logged in user.
pub trait IdentityProvider: Debug {
    /// The textual principal of the current identity, if the user is logged in.
    fn identity(&self) -> Option<String>;
}

/// An [IdentityProvider] with a fixed identity.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl IdentityProvider for StaticIdentity {
    fn identity(&self) -> Option<String> {
        self.0.clone()
    }
}
