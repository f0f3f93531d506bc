//! Network selection and transfer settings.
//!
//! Everything here is a plain value handed to each operation; nothing is
//! stored process-wide.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::instruction::{BuildPolicy, CollectionPolicy};
use crate::rpc::Commitment;
use crate::submit::{RetryPolicy, SubmitOptions};

/// Solana clusters the tool knows how to reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    MainnetBeta,
    #[default]
    Devnet,
    Testnet,
    Localnet,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::MainnetBeta => "mainnet-beta",
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Localnet => "localnet",
        }
    }

    /// Public RPC endpoint for the cluster.
    pub fn public_rpc_url(&self) -> &'static str {
        match self {
            Network::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Localnet => "http://127.0.0.1:8899",
        }
    }

    /// Keyed provider endpoint, for clusters the provider serves.
    fn provider_rpc_url(&self, api_key: &str) -> Option<String> {
        let host = match self {
            Network::MainnetBeta => "mainnet.helius-rpc.com",
            Network::Devnet => "devnet.helius-rpc.com",
            Network::Testnet | Network::Localnet => return None,
        };
        Some(format!("https://{host}/?api-key={api_key}"))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Network::MainnetBeta),
            "devnet" => Ok(Network::Devnet),
            "testnet" => Ok(Network::Testnet),
            "localnet" | "localhost" => Ok(Network::Localnet),
            other => Err(TransferError::Configuration(format!(
                "unknown network: {other}"
            ))),
        }
    }
}

/// Picks the RPC endpoint: explicit URL, then keyed provider, then public.
#[derive(Debug, Clone, Default)]
pub struct EndpointResolver {
    pub override_url: Option<String>,
    pub provider_api_key: Option<String>,
}

impl EndpointResolver {
    pub fn resolve(&self, network: Network) -> String {
        if let Some(url) = non_empty(self.override_url.as_deref()) {
            return url.to_owned();
        }
        non_empty(self.provider_api_key.as_deref())
            .and_then(|key| network.provider_rpc_url(key))
            .unwrap_or_else(|| network.public_rpc_url().to_owned())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Re-reads of the asset owner after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostCheck {
    /// Reads attempted until the owner equals the destination.
    pub attempts: u32,
    pub interval: Duration,
    pub commitment: Commitment,
}

impl Default for PostCheck {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_secs(2),
            commitment: Commitment::Confirmed,
        }
    }
}

/// All knobs of a transfer operation.
#[derive(Debug, Clone, Default)]
pub struct TransferSettings {
    pub build: BuildPolicy,
    pub retry: RetryPolicy,
    pub submit: SubmitOptions,
    pub post_check: PostCheck,
}

impl TransferSettings {
    pub fn with_collection_policy(mut self, policy: CollectionPolicy) -> Self {
        self.build.collection = policy;
        self
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        self.retry.validate()?;
        if self.post_check.attempts == 0 {
            return Err(TransferError::Configuration(
                "post-check attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parses_aliases() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::MainnetBeta);
        assert_eq!("Mainnet-Beta".parse::<Network>().unwrap(), Network::MainnetBeta);
        assert_eq!("localhost".parse::<Network>().unwrap(), Network::Localnet);
        assert!("moonnet".parse::<Network>().is_err());
    }

    #[test]
    fn network_serde_uses_cluster_names() {
        assert_eq!(
            serde_json::to_string(&Network::MainnetBeta).unwrap(),
            "\"mainnet-beta\""
        );
        assert_eq!(Network::Devnet.to_string(), "devnet");
    }

    #[test]
    fn override_url_wins() {
        let resolver = EndpointResolver {
            override_url: Some("http://my-node:8899".into()),
            provider_api_key: Some("key".into()),
        };
        assert_eq!(resolver.resolve(Network::MainnetBeta), "http://my-node:8899");
    }

    #[test]
    fn provider_key_builds_keyed_url() {
        let resolver = EndpointResolver {
            override_url: None,
            provider_api_key: Some("abc123".into()),
        };
        assert_eq!(
            resolver.resolve(Network::Devnet),
            "https://devnet.helius-rpc.com/?api-key=abc123"
        );
        // Clusters the provider does not serve fall back to public RPC.
        assert_eq!(
            resolver.resolve(Network::Testnet),
            "https://api.testnet.solana.com"
        );
    }

    #[test]
    fn blank_values_are_ignored() {
        let resolver = EndpointResolver {
            override_url: Some("  ".into()),
            provider_api_key: Some(String::new()),
        };
        assert_eq!(
            resolver.resolve(Network::MainnetBeta),
            "https://api.mainnet-beta.solana.com"
        );
    }

    #[test]
    fn settings_validation() {
        assert!(TransferSettings::default().validate().is_ok());

        let mut settings = TransferSettings::default();
        settings.post_check.attempts = 0;
        assert!(settings.validate().is_err());

        let required = TransferSettings::default().with_collection_policy(CollectionPolicy::Required);
        assert_eq!(required.build.collection, CollectionPolicy::Required);
    }
}
