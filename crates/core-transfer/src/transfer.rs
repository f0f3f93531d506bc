//! The transfer operation: verify, build, submit, then re-read ownership.
//!
//! Only the asset's on-chain owner decides success. A confirmed signature
//! with an unchanged owner is ambiguous, and a failed submission whose
//! transaction landed anyway is still a transfer.

use sol_wire::{Pubkey, Signature, Signer};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::asset::AssetRecord;
use crate::config::{PostCheck, TransferSettings};
use crate::error::TransferError;
use crate::instruction::{
    build_transfer_instruction, resolve_collection_input, validate_transfer_keys,
    TransferInstruction,
};
use crate::program::MPL_CORE_PROGRAM_ID;
use crate::route::TransferRoute;
use crate::rpc::{AccountReader, Commitment, TransactionSubmitter};
use crate::submit::{submit, SubmissionReport};

/// What to move where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub asset: Pubkey,
    pub destination: Pubkey,
    /// Collection the asset belongs to; read from the asset when absent.
    pub collection: Option<Pubkey>,
}

/// Collaborators and settings for one transfer.
pub struct TransferContext<'a> {
    pub reader: &'a dyn AccountReader,
    pub submitter: &'a dyn TransactionSubmitter,
    pub signer: &'a dyn Signer,
    pub route: &'a TransferRoute,
    pub settings: &'a TransferSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The destination already owned the asset; nothing was submitted.
    NoTransferNeeded { owner: Pubkey },
    /// Ownership verified on-chain after submission.
    Transferred {
        signature: Option<Signature>,
        attempts: u32,
    },
    /// Handed to a multisig; execution is verified elsewhere.
    Proposed { reference: String },
}

pub async fn transfer(
    ctx: &TransferContext<'_>,
    request: &TransferRequest,
) -> Result<TransferOutcome, TransferError> {
    let build = ctx.settings.build;
    ctx.settings.validate()?;
    let requested_collection = resolve_collection_input(request.collection, build.collection)?;
    validate_transfer_keys(&request.asset, &request.destination, &build)?;

    let authority = ctx.route.authority(ctx.signer.pubkey());
    let record = fetch_asset(
        ctx.reader,
        &request.asset,
        ctx.settings.post_check.commitment,
    )
    .await?;

    if record.owner == request.destination {
        info!(asset = %request.asset, owner = %record.owner, "asset already owned by destination, no transfer needed");
        return Ok(TransferOutcome::NoTransferNeeded {
            owner: record.owner,
        });
    }
    if record.owner != authority {
        return Err(TransferError::Verification(format!(
            "asset {} is owned by {}, not by the transfer authority {authority}",
            request.asset, record.owner
        )));
    }

    let collection = match (requested_collection, record.collection()) {
        (Some(requested), Some(actual)) if requested != actual => {
            return Err(TransferError::Verification(format!(
                "asset belongs to collection {actual}, not {requested}"
            )))
        }
        (Some(requested), None) => {
            return Err(TransferError::Verification(format!(
                "asset is not a member of collection {requested}"
            )))
        }
        (requested, actual) => requested.or(actual),
    };

    let instruction = build_transfer_instruction(
        request.asset,
        authority,
        request.destination,
        collection,
        &build,
    )?;

    match ctx.route {
        TransferRoute::Direct => submit_and_verify(ctx, instruction, record.owner).await,
        TransferRoute::Proposal { sink, vault } => {
            let reference = sink.propose(instruction).await?;
            info!(asset = %request.asset, vault = %vault, reference = %reference, "transfer proposed to multisig");
            Ok(TransferOutcome::Proposed { reference })
        }
    }
}

/// Read and decode an asset, checking it is a Core account.
pub async fn fetch_asset(
    reader: &dyn AccountReader,
    asset: &Pubkey,
    commitment: Commitment,
) -> Result<AssetRecord, TransferError> {
    let account = reader
        .get_account(asset, commitment)
        .await?
        .ok_or_else(|| TransferError::Verification(format!("asset {asset} not found")))?;

    if account.owner_program != MPL_CORE_PROGRAM_ID {
        return Err(TransferError::Verification(format!(
            "account {asset} is owned by program {}, expected {MPL_CORE_PROGRAM_ID}",
            account.owner_program
        )));
    }

    AssetRecord::decode(&account.data)
}

/// Re-read the asset owner until it equals `destination` or the reads run out.
///
/// A transient read error uses up one attempt. Returns the result of the
/// last read: the owner it saw, or its error.
pub async fn verify_ownership(
    reader: &dyn AccountReader,
    asset: &Pubkey,
    destination: &Pubkey,
    check: &PostCheck,
) -> Result<Pubkey, TransferError> {
    let mut last = Err(TransferError::Configuration(
        "post-check attempts must be at least 1".into(),
    ));
    for attempt in 1..=check.attempts {
        if attempt > 1 {
            sleep(check.interval).await;
        }
        match fetch_asset(reader, asset, check.commitment).await {
            Ok(record) if record.owner == *destination => return Ok(record.owner),
            Ok(record) => last = Ok(record.owner),
            Err(TransferError::Rpc(e)) if e.is_transient() => {
                warn!(asset = %asset, attempt, max_attempts = check.attempts, error = %e, "ownership read failed");
                last = Err(TransferError::Rpc(e));
            }
            Err(e) => return Err(e),
        }
    }
    last
}

async fn submit_and_verify(
    ctx: &TransferContext<'_>,
    instruction: TransferInstruction,
    previous_owner: Pubkey,
) -> Result<TransferOutcome, TransferError> {
    let asset = instruction.asset();
    let destination = instruction.destination();

    let submission = submit(
        instruction,
        ctx.signer,
        ctx.submitter,
        &ctx.settings.retry,
        &ctx.settings.submit,
    )
    .await;

    // Always runs, whatever the submission reported.
    let observed =
        verify_ownership(ctx.reader, &asset, &destination, &ctx.settings.post_check).await;

    settle(submission, observed, previous_owner, destination)
}

fn settle(
    submission: Result<SubmissionReport, TransferError>,
    observed: Result<Pubkey, TransferError>,
    previous_owner: Pubkey,
    destination: Pubkey,
) -> Result<TransferOutcome, TransferError> {
    let (signature, attempts) = match &submission {
        Ok(report) => (Some(report.signature), report.attempts),
        Err(TransferError::Submission(failure)) => (failure.last_signature, failure.attempts),
        Err(_) => (None, 0),
    };

    match observed {
        Ok(owner) if owner == destination => {
            if let Err(err) = &submission {
                warn!(error = %err, "submission reported failure but ownership moved to destination");
            }
            info!(owner = %owner, signature = ?signature, "transfer verified on-chain");
            Ok(TransferOutcome::Transferred {
                signature,
                attempts,
            })
        }
        Ok(owner) if owner == previous_owner => match submission {
            Err(err) => Err(err),
            Ok(report) => Err(TransferError::AmbiguousOutcome {
                reason: format!(
                    "transaction {} confirmed but the owner is still {owner}",
                    report.signature
                ),
                signature: Some(report.signature),
                observed_owner: Some(owner),
            }),
        },
        Ok(owner) => Err(TransferError::AmbiguousOutcome {
            reason: format!(
                "asset is now owned by {owner}, neither the previous owner nor the destination"
            ),
            signature,
            observed_owner: Some(owner),
        }),
        Err(read_error) => Err(TransferError::AmbiguousOutcome {
            reason: format!("post-transfer ownership read failed: {read_error}"),
            signature,
            observed_owner: None,
        }),
    }
}
