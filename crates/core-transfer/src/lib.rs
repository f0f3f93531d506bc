//! Metaplex Core asset transfers.
//!
//! The crate builds the raw Core `transfer` instruction, submits it with
//! bounded retries, and verifies the result by re-reading the asset's
//! on-chain owner. Network access goes through the [`rpc::AccountReader`]
//! and [`rpc::TransactionSubmitter`] traits; [`rpc::client::RpcClient`] is
//! the JSON-RPC implementation of both.

pub mod asset;
pub mod config;
pub mod error;
pub mod instruction;
pub mod program;
pub mod route;
pub mod rpc;
pub mod submit;
pub mod transfer;

pub use asset::{AssetRecord, UpdateAuthority};
pub use config::{EndpointResolver, Network, PostCheck, TransferSettings};
pub use error::{FailureKind, RpcError, SubmissionFailure, TransferError};
pub use instruction::{
    build_transfer_instruction, parse_key, BuildPolicy, CollectionPolicy, TransferInstruction,
};
pub use program::{MPL_CORE_PROGRAM_ID, TRANSFER_DISCRIMINATOR};
pub use route::{JsonFileProposalSink, ProposalSink, TransferRoute};
pub use rpc::{AccountInfo, AccountReader, Commitment, Confirmation, SendOptions, TransactionSubmitter};
pub use submit::{submit, AttemptOutcome, RetryPolicy, SubmissionAttempt, SubmissionReport, SubmitOptions};
pub use transfer::{
    fetch_asset, transfer, verify_ownership, TransferContext, TransferOutcome, TransferRequest,
};

pub use sol_wire::{Keypair, Pubkey, Signature, Signer};
