//! Network collaborators used by the transfer operation.

pub mod client;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sol_wire::{Pubkey, Signature, Signer};

use crate::error::{RpcError, TransferError};
use crate::instruction::TransferInstruction;

/// Durability level requested when reading or confirming state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(TransferError::Configuration(format!(
                "unknown commitment level: {other}"
            ))),
        }
    }
}

/// Raw on-chain account state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    /// The program that owns the account (not the asset's holder).
    pub owner_program: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
}

/// Options for a single transaction submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: Commitment,
}

/// Result of waiting for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Timeout,
    Rejected { message: String, logs: Vec<String> },
}

#[async_trait]
pub trait AccountReader: Send + Sync {
    /// Fetch an account; `Ok(None)` when it does not exist.
    async fn get_account(
        &self,
        address: &Pubkey,
        commitment: Commitment,
    ) -> Result<Option<AccountInfo>, RpcError>;
}

#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Wrap the instruction in a fresh transaction, sign it with `signer`
    /// (also the fee payer) and send it. Returns the transaction signature.
    async fn send(
        &self,
        instruction: &TransferInstruction,
        signer: &dyn Signer,
        options: &SendOptions,
    ) -> Result<Signature, RpcError>;

    async fn confirm(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<Confirmation, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitment_levels_are_ordered() {
        assert!(Commitment::Processed < Commitment::Confirmed);
        assert!(Commitment::Confirmed < Commitment::Finalized);
    }

    #[test]
    fn commitment_parses_case_insensitively() {
        assert_eq!("Finalized".parse::<Commitment>().unwrap(), Commitment::Finalized);
        assert_eq!(" processed ".parse::<Commitment>().unwrap(), Commitment::Processed);
        assert!("max".parse::<Commitment>().is_err());
    }

    #[test]
    fn commitment_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Commitment::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }
}
