//! Command-line arguments. Every option falls back to an environment
//! variable, so a `.env` file can hold the whole configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use core_transfer::{
    parse_key, BuildPolicy, CollectionPolicy, Commitment, EndpointResolver, Network, PostCheck,
    Pubkey, RetryPolicy, SendOptions, SubmitOptions, TransferError, TransferSettings,
};

#[derive(Parser, Debug)]
#[command(name = "core-transfer", author, version, about = "Transfer Metaplex Core assets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "LOG_JSON")]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify ownership, submit the transfer and confirm the new owner
    Transfer(TransferArgs),

    /// Read and print the decoded asset account
    Inspect {
        #[command(flatten)]
        endpoint: EndpointArgs,

        /// Asset address (Base58)
        #[arg(long, env = "ASSET_ADDRESS")]
        asset: Option<String>,
    },

    /// Print the transfer instruction without touching the network
    Build(BuildArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// Cluster to talk to
    #[arg(long, env = "SOLANA_NETWORK", default_value = "devnet")]
    pub network: Network,

    /// Explicit RPC URL, overrides the network default
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// API key for the keyed RPC provider
    #[arg(long, env = "RPC_PROVIDER_API_KEY", hide_env_values = true)]
    pub provider_api_key: Option<String>,
}

impl EndpointArgs {
    pub fn url(&self) -> String {
        EndpointResolver {
            override_url: self.rpc_url.clone(),
            provider_api_key: self.provider_api_key.clone(),
        }
        .resolve(self.network)
    }
}

/// Keys and checks shared by `transfer` and `build`.
#[derive(Args, Debug, Clone)]
pub struct InstructionArgs {
    /// Asset address (Base58)
    #[arg(long, env = "ASSET_ADDRESS")]
    pub asset: Option<String>,

    /// New owner (Base58)
    #[arg(long, env = "DESTINATION_ADDRESS")]
    pub destination: Option<String>,

    /// Collection the asset belongs to
    #[arg(long, env = "COLLECTION_ADDRESS")]
    pub collection: Option<String>,

    /// Fail unless a collection address is supplied
    #[arg(long, env = "REQUIRE_COLLECTION")]
    pub require_collection: bool,

    /// Accept an off-curve destination such as a vault PDA
    #[arg(long, env = "ALLOW_OFF_CURVE_DESTINATION")]
    pub allow_off_curve_destination: bool,

    /// Multisig vault that owns the asset; switches to the proposal route
    #[arg(long, env = "MULTISIG_VAULT_ADDRESS")]
    pub vault: Option<String>,
}

impl InstructionArgs {
    pub fn asset(&self) -> Result<Pubkey, TransferError> {
        parse_key("asset", self.asset.as_deref())
    }

    pub fn destination(&self) -> Result<Pubkey, TransferError> {
        parse_key("destination", self.destination.as_deref())
    }

    /// An absent or blank value means "read it from the asset".
    pub fn collection(&self) -> Result<Option<Pubkey>, TransferError> {
        optional_key("collection", self.collection.as_deref())
    }

    pub fn vault(&self) -> Result<Option<Pubkey>, TransferError> {
        optional_key("vault", self.vault.as_deref())
    }

    pub fn build_policy(&self) -> BuildPolicy {
        BuildPolicy {
            collection: if self.require_collection {
                CollectionPolicy::Required
            } else {
                CollectionPolicy::Optional
            },
            allow_off_curve_destination: self.allow_off_curve_destination,
        }
    }
}

fn optional_key(role: &'static str, value: Option<&str>) -> Result<Option<Pubkey>, TransferError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => parse_key(role, Some(value)).map(Some),
        None => Ok(None),
    }
}

#[derive(Args, Debug, Clone)]
pub struct TransferArgs {
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    #[command(flatten)]
    pub instruction: InstructionArgs,

    /// Solana CLI keypair file of the signer
    #[arg(long, env = "WALLET_KEYPAIR_PATH")]
    pub keypair: PathBuf,

    /// Where the proposal route writes the instruction
    #[arg(long, env = "PROPOSAL_OUTPUT", default_value = "transfer-proposal.json")]
    pub proposal_out: PathBuf,

    /// Total submission attempts
    #[arg(long, env = "MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Backoff before the second attempt, in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value_t = 2_000)]
    pub base_delay_ms: u64,

    /// Upper bound on any backoff, in milliseconds
    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value_t = 30_000)]
    pub max_delay_ms: u64,

    /// Skip the node's preflight simulation
    #[arg(long, env = "SKIP_PREFLIGHT")]
    pub skip_preflight: bool,

    /// Commitment awaited after sending
    #[arg(long, env = "COMMITMENT", default_value = "confirmed")]
    pub commitment: Commitment,

    /// Do not wait for confirmation; rely on the ownership check alone
    #[arg(long, env = "NO_CONFIRM")]
    pub no_confirm: bool,

    /// Owner re-reads after submission
    #[arg(long, env = "POST_CHECK_ATTEMPTS", default_value_t = 3)]
    pub post_check_attempts: u32,

    /// Pause between owner re-reads, in milliseconds
    #[arg(long, env = "POST_CHECK_INTERVAL_MS", default_value_t = 2_000)]
    pub post_check_interval_ms: u64,
}

impl TransferArgs {
    pub fn settings(&self) -> Result<TransferSettings, TransferError> {
        let settings = TransferSettings {
            build: self.instruction.build_policy(),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_millis(self.base_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
                ..RetryPolicy::default()
            },
            submit: SubmitOptions {
                send: SendOptions {
                    skip_preflight: self.skip_preflight,
                    preflight_commitment: self.commitment,
                },
                commitment: self.commitment,
                await_confirmation: !self.no_confirm,
            },
            post_check: PostCheck {
                attempts: self.post_check_attempts,
                interval: Duration::from_millis(self.post_check_interval_ms),
                commitment: self.commitment,
            },
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub instruction: InstructionArgs,

    /// Current owner; defaults to the vault, then to the keypair's key
    #[arg(long, env = "OWNER_ADDRESS")]
    pub owner: Option<String>,

    /// Keypair file used only to learn the owner's public key
    #[arg(long, env = "WALLET_KEYPAIR_PATH")]
    pub keypair: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    const ASSET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn every_option_has_an_env_fallback() {
        let cli = Cli::command();
        for name in ["transfer", "inspect", "build"] {
            let sub = cli.find_subcommand(name).unwrap();
            for arg in sub.get_arguments() {
                let id = arg.get_id().as_str();
                if id == "help" || id == "version" {
                    continue;
                }
                assert!(arg.get_env().is_some(), "{name} --{id} has no env fallback");
            }
        }
        assert!(cli.get_arguments().all(|arg| arg.get_id() == "help"
            || arg.get_id() == "version"
            || arg.get_env().is_some()));
    }

    #[test]
    fn transfer_args_map_onto_settings() {
        let cli = Cli::try_parse_from([
            "core-transfer",
            "transfer",
            "--asset",
            ASSET,
            "--destination",
            ASSET,
            "--keypair",
            "/tmp/id.json",
            "--max-attempts",
            "5",
            "--base-delay-ms",
            "500",
            "--require-collection",
            "--commitment",
            "finalized",
            "--no-confirm",
        ])
        .unwrap();

        let Command::Transfer(args) = cli.command else {
            panic!("expected the transfer subcommand");
        };
        let settings = args.settings().unwrap();
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay, Duration::from_millis(500));
        assert_eq!(settings.build.collection, CollectionPolicy::Required);
        assert_eq!(settings.submit.commitment, Commitment::Finalized);
        assert!(!settings.submit.await_confirmation);
        assert_eq!(settings.post_check.commitment, Commitment::Finalized);
    }

    #[test]
    fn zero_attempts_is_rejected_by_settings() {
        let cli = Cli::try_parse_from([
            "core-transfer",
            "transfer",
            "--keypair",
            "/tmp/id.json",
            "--max-attempts",
            "0",
        ])
        .unwrap();
        let Command::Transfer(args) = cli.command else {
            panic!("expected the transfer subcommand");
        };
        assert!(matches!(args.settings(), Err(TransferError::Configuration(_))));
    }

    #[test]
    fn blank_collection_means_unset() {
        let args = InstructionArgs {
            asset: Some(ASSET.into()),
            destination: None,
            collection: Some("  ".into()),
            require_collection: false,
            allow_off_curve_destination: false,
            vault: None,
        };
        assert_eq!(args.collection().unwrap(), None);
        assert!(matches!(
            args.destination(),
            Err(TransferError::InvalidKey { role: "destination", .. })
        ));
    }

    #[test]
    fn network_flag_parses_cluster_names() {
        let cli = Cli::try_parse_from([
            "core-transfer",
            "inspect",
            "--network",
            "mainnet-beta",
            "--asset",
            ASSET,
        ])
        .unwrap();
        let Command::Inspect { endpoint, .. } = cli.command else {
            panic!("expected the inspect subcommand");
        };
        assert_eq!(endpoint.network, Network::MainnetBeta);
        assert_eq!(endpoint.url(), "https://api.mainnet-beta.solana.com");
    }
}
