//! `core-transfer`: move a Metaplex Core asset to a new owner.
//!
//! Exit codes: 0 when the destination owns the asset (or a proposal was
//! written), 1 on failure, 2 when the outcome is ambiguous and ownership
//! has to be checked by hand.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use core_transfer::rpc::client::RpcClient;
use core_transfer::{
    build_transfer_instruction, fetch_asset, transfer, Commitment, JsonFileProposalSink,
    Keypair, ProposalSink, TransferContext, TransferError, TransferInstruction,
    TransferOutcome, TransferRequest, TransferRoute,
};
use serde_json::json;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

use cli::{BuildArgs, Cli, Command, EndpointArgs, TransferArgs};

const EXIT_AMBIGUOUS: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; flags and the real environment still apply.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.json);

    let result = match cli.command {
        Command::Transfer(args) => run_transfer(args).await,
        Command::Inspect { endpoint, asset } => run_inspect(endpoint, asset).await,
        Command::Build(args) => run_build(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout only carries command output.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run_transfer(args: TransferArgs) -> Result<ExitCode> {
    let settings = args.settings()?;
    let request = TransferRequest {
        asset: args.instruction.asset()?,
        destination: args.instruction.destination()?,
        collection: args.instruction.collection()?,
    };

    let signer = Keypair::read_from_file(&args.keypair)
        .with_context(|| format!("loading keypair {}", args.keypair.display()))?;

    let vault = args.instruction.vault()?;
    let sink = vault.map(|_| {
        Arc::new(JsonFileProposalSink::new(&args.proposal_out)) as Arc<dyn ProposalSink>
    });
    let route = TransferRoute::select(vault, sink)?;

    let url = args.endpoint.url();
    let client = RpcClient::new(&url)?;
    info!(
        network = %args.endpoint.network,
        signer = %signer.pubkey(),
        asset = %request.asset,
        destination = %request.destination,
        route = ?route,
        "starting transfer"
    );

    let ctx = TransferContext {
        reader: &client,
        submitter: &client,
        signer: &signer,
        route: &route,
        settings: &settings,
    };

    match transfer(&ctx, &request).await {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(ExitCode::SUCCESS)
        }
        Err(TransferError::AmbiguousOutcome {
            reason,
            signature,
            observed_owner,
        }) => {
            warn!(
                signature = ?signature,
                observed_owner = ?observed_owner,
                "{reason}"
            );
            println!("ambiguous: {reason}");
            if let Some(signature) = signature {
                println!("signature: {signature}");
            }
            Ok(ExitCode::from(EXIT_AMBIGUOUS))
        }
        Err(TransferError::Submission(failure)) => {
            for line in &failure.logs {
                error!(target: "program", "{line}");
            }
            Err(TransferError::Submission(failure).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_outcome(outcome: &TransferOutcome) {
    match outcome {
        TransferOutcome::NoTransferNeeded { owner } => {
            println!("no transfer needed: {owner} already owns the asset");
        }
        TransferOutcome::Transferred {
            signature,
            attempts,
        } => match signature {
            Some(signature) => println!("transferred in {attempts} attempt(s): {signature}"),
            None => println!("transferred; ownership verified on-chain"),
        },
        TransferOutcome::Proposed { reference } => {
            println!("proposal written: {reference}");
        }
    }
}

async fn run_inspect(endpoint: EndpointArgs, asset: Option<String>) -> Result<ExitCode> {
    let asset = core_transfer::parse_key("asset", asset.as_deref())?;
    let client = RpcClient::new(endpoint.url())?;

    let record = fetch_asset(&client, &asset, Commitment::Confirmed).await?;
    let collection = record.collection();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "asset": asset,
            "record": record,
            "collection": collection,
        }))?
    );
    Ok(ExitCode::SUCCESS)
}

fn run_build(args: BuildArgs) -> Result<ExitCode> {
    let owner = match (args.instruction.vault()?, args.owner.as_deref(), &args.keypair) {
        (Some(vault), _, _) => vault,
        (None, Some(owner), _) => core_transfer::parse_key("owner", Some(owner))?,
        (None, None, Some(path)) => Keypair::read_from_file(path)
            .with_context(|| format!("loading keypair {}", path.display()))?
            .pubkey(),
        (None, None, None) => {
            anyhow::bail!("an owner is required: pass --owner, --vault or --keypair")
        }
    };

    let instruction = build_transfer_instruction(
        args.instruction.asset()?,
        owner,
        args.instruction.destination()?,
        args.instruction.collection()?,
        &args.instruction.build_policy(),
    )?;

    println!("{}", serde_json::to_string_pretty(&describe(&instruction))?);
    Ok(ExitCode::SUCCESS)
}

fn describe(instruction: &TransferInstruction) -> serde_json::Value {
    let accounts: Vec<_> = instruction
        .accounts()
        .iter()
        .map(|meta| {
            json!({
                "pubkey": meta.pubkey,
                "is_signer": meta.is_signer,
                "is_writable": meta.is_writable,
            })
        })
        .collect();

    json!({
        "program_id": instruction.program_id(),
        "accounts": accounts,
        "data_hex": instruction.data_hex(),
    })
}

#[cfg(test)]
mod tests {
    use core_transfer::{BuildPolicy, Pubkey, MPL_CORE_PROGRAM_ID};

    use super::*;

    #[test]
    fn describe_lists_accounts_and_data() {
        let key = |seed: u8| Keypair::from_seed(&[seed; 32]).pubkey();
        let ix = build_transfer_instruction(key(1), key(2), key(3), None, &BuildPolicy::default())
            .unwrap();

        let value = describe(&ix);
        assert_eq!(value["program_id"], MPL_CORE_PROGRAM_ID.to_string());
        assert_eq!(value["accounts"].as_array().unwrap().len(), 10);
        assert_eq!(value["accounts"][1]["pubkey"], key(2).to_string());
        assert_eq!(value["accounts"][1]["is_signer"], true);
        assert_eq!(value["accounts"][3]["pubkey"], MPL_CORE_PROGRAM_ID.to_string());
        assert_eq!(value["data_hex"], "a334c8e78c0345ba010100000000000000");
    }

    #[test]
    fn build_uses_keypair_file_for_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.json");
        let owner = Keypair::from_seed(&[2; 32]);
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&[2; 32]);
        bytes[32..].copy_from_slice(owner.pubkey().as_ref());
        std::fs::write(&path, serde_json::to_string(&bytes.to_vec()).unwrap()).unwrap();

        let args = BuildArgs {
            instruction: cli::InstructionArgs {
                asset: Some(Keypair::from_seed(&[1; 32]).pubkey().to_string()),
                destination: Some(Keypair::from_seed(&[3; 32]).pubkey().to_string()),
                collection: None,
                require_collection: false,
                allow_off_curve_destination: false,
                vault: None,
            },
            owner: None,
            keypair: Some(path),
        };
        assert!(run_build(args).is_ok());
    }

    #[test]
    fn build_without_owner_fails() {
        let args = BuildArgs {
            instruction: cli::InstructionArgs {
                asset: Some(Pubkey::new_from_array([1; 32]).to_string()),
                destination: None,
                collection: None,
                require_collection: false,
                allow_off_curve_destination: false,
                vault: None,
            },
            owner: None,
            keypair: None,
        };
        assert!(run_build(args).is_err());
    }
}
