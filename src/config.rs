use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::{
    core::{credential_spec::CredentialSpec, principal::PrincipalText, request::RequestBuilder},
    flow::ReentryPolicy,
};

/// Path of the VC flow page, relative to the identity provider's URL.
pub const VC_FLOW_PATH: &str = "vc-flow/";

const DEFAULT_MIN_SCORE: i32 = 5;

/// Engine configuration, typically deserialized from the relying party's build-time settings.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// URL of the identity provider (e.g. `https://identity.ic0.app`).
    pub identity_provider: BaseUrl,
    pub issuer: IssuerConfig,
    #[serde(default)]
    pub derivation_origin: Option<String>,
    /// Minimum Gitcoin Passport score the requested credential must attest.
    #[serde(default = "default_min_score")]
    pub min_score: i32,
    #[serde(default)]
    pub reentry: ReentryPolicy,
    /// Seconds to wait for the identity provider window to signal readiness.
    #[serde(default)]
    pub ready_timeout_secs: Option<u64>,
    /// Seconds to wait for the response once the request was sent.
    #[serde(default)]
    pub response_timeout_secs: Option<u64>,
}

fn default_min_score() -> i32 {
    DEFAULT_MIN_SCORE
}

impl Config {
    /// URL of the VC flow page the identity provider window is opened at.
    pub fn flow_url(&self) -> Result<Url> {
        self.identity_provider
            .join(VC_FLOW_PATH)
            .context("invalid identity provider URL")
    }

    pub fn credential_spec(&self) -> CredentialSpec {
        CredentialSpec::gitcoin_passport_score(self.min_score)
    }

    pub fn request_builder(&self) -> Result<RequestBuilder> {
        let mut builder = RequestBuilder::new(self.credential_spec(), self.issuer.origin()?)
            .with_issuer_canister_id(self.issuer.canister_id.clone());
        if let Some(origin) = &self.derivation_origin {
            builder = builder.with_derivation_origin(origin.clone());
        }
        Ok(builder)
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_secs.map(Duration::from_secs)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_secs.map(Duration::from_secs)
    }
}

/// The network the issuer canister is deployed to.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// A local replica.
    Local,
    /// The Internet Computer mainnet.
    #[default]
    Ic,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IssuerConfig {
    pub canister_id: PrincipalText,
    #[serde(default)]
    pub network: Network,
    /// Overrides the origin derived from the canister id and network.
    #[serde(default)]
    pub origin: Option<Url>,
}

impl IssuerConfig {
    pub fn origin(&self) -> Result<Url> {
        if let Some(origin) = &self.origin {
            return Ok(origin.clone());
        }
        let origin = match self.network {
            Network::Local => format!("http://{}.localhost:4943", self.canister_id),
            Network::Ic => format!("https://{}.icp0.io", self.canister_id),
        };
        origin
            .parse::<Url>()
            .with_context(|| format!("invalid issuer origin '{origin}'"))
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        if !url.ends_with('/') {
            url.push('/');
        }
        url.parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(network: &str) -> Config {
        serde_json::from_value(json!({
            "identity_provider": "https://identity.ic0.app/some/prefix",
            "issuer": {
                "canister_id": "bkyz2-fmaaa-aaaaa-qaaaq-cai",
                "network": network
            }
        }))
        .unwrap()
    }

    #[test]
    fn flow_url_keeps_base_path() {
        assert_eq!(
            config("ic").flow_url().unwrap().as_str(),
            "https://identity.ic0.app/some/prefix/vc-flow/"
        );
    }

    #[test]
    fn issuer_origin_follows_network() {
        assert_eq!(
            config("ic").issuer.origin().unwrap().as_str(),
            "https://bkyz2-fmaaa-aaaaa-qaaaq-cai.icp0.io/"
        );
        assert_eq!(
            config("local").issuer.origin().unwrap().as_str(),
            "http://bkyz2-fmaaa-aaaaa-qaaaq-cai.localhost:4943/"
        );
    }

    #[test]
    fn defaults() {
        let config = config("ic");
        assert_eq!(config.min_score, 5);
        assert_eq!(config.reentry, ReentryPolicy::Shadow);
        assert_eq!(config.ready_timeout(), None);
        assert_eq!(config.credential_spec(), CredentialSpec::gitcoin_passport_score(5));
    }

    #[test]
    fn request_builder_carries_issuer() {
        let request = config("local")
            .request_builder()
            .unwrap()
            .build("2vxsx-fae")
            .unwrap();

        assert_eq!(
            request.params.issuer.origin.as_str(),
            "http://bkyz2-fmaaa-aaaaa-qaaaq-cai.localhost:4943/"
        );
        assert_eq!(
            request.params.issuer.canister_id.unwrap().as_str(),
            "bkyz2-fmaaa-aaaaa-qaaaq-cai"
        );
    }

    #[test]
    fn invalid_canister_id_is_rejected() {
        let result = serde_json::from_value::<Config>(json!({
            "identity_provider": "https://identity.ic0.app",
            "issuer": { "canister_id": "not-a-canister" }
        }));
        assert!(result.is_err());
    }
}
