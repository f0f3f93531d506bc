//! How a built instruction leaves the process.
//!
//! The route is picked once when the tool starts: either the local signer
//! submits it directly, or the instruction is handed to a multisig proposal
//! sink with a vault as the authority.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sol_wire::Pubkey;
use tracing::info;

use crate::error::TransferError;
use crate::instruction::TransferInstruction;

/// Receives instructions that a multisig must approve and execute.
#[async_trait]
pub trait ProposalSink: Send + Sync {
    /// Record the instruction; returns a reference the operator can follow up on.
    async fn propose(&self, instruction: TransferInstruction) -> Result<String, TransferError>;
}

#[derive(Clone)]
pub enum TransferRoute {
    Direct,
    Proposal {
        /// The multisig vault that currently owns the asset and will sign.
        vault: Pubkey,
        sink: Arc<dyn ProposalSink>,
    },
}

impl TransferRoute {
    /// A configured vault selects the proposal route and then needs a sink.
    pub fn select(
        vault: Option<Pubkey>,
        sink: Option<Arc<dyn ProposalSink>>,
    ) -> Result<Self, TransferError> {
        match (vault, sink) {
            (None, _) => Ok(TransferRoute::Direct),
            (Some(vault), Some(sink)) => Ok(TransferRoute::Proposal { vault, sink }),
            (Some(vault), None) => Err(TransferError::Configuration(format!(
                "multisig vault {vault} is configured but no proposal sink is available"
            ))),
        }
    }

    /// The key that must be the asset's current owner on this route.
    pub fn authority(&self, signer: Pubkey) -> Pubkey {
        match self {
            TransferRoute::Direct => signer,
            TransferRoute::Proposal { vault, .. } => *vault,
        }
    }
}

impl fmt::Debug for TransferRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferRoute::Direct => f.write_str("Direct"),
            TransferRoute::Proposal { vault, .. } => {
                f.debug_struct("Proposal").field("vault", vault).finish_non_exhaustive()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ProposalAccount {
    pubkey: Pubkey,
    is_signer: bool,
    is_writable: bool,
}

/// On-disk form of a proposed instruction, importable by multisig tooling.
#[derive(Debug, Serialize)]
struct ProposalDocument {
    asset: Pubkey,
    destination: Pubkey,
    program_id: Pubkey,
    accounts: Vec<ProposalAccount>,
    data_base64: String,
    data_hex: String,
    created_at: DateTime<Utc>,
}

/// Writes each proposed instruction as pretty JSON to a fixed path.
pub struct JsonFileProposalSink {
    path: PathBuf,
}

impl JsonFileProposalSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProposalSink for JsonFileProposalSink {
    async fn propose(&self, instruction: TransferInstruction) -> Result<String, TransferError> {
        let document = ProposalDocument {
            asset: instruction.asset(),
            destination: instruction.destination(),
            program_id: instruction.program_id(),
            accounts: instruction
                .accounts()
                .iter()
                .map(|meta| ProposalAccount {
                    pubkey: meta.pubkey,
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data_base64: BASE64.encode(instruction.data()),
            data_hex: instruction.data_hex(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&document)
            .map_err(|e| TransferError::Configuration(format!("proposal encoding: {e}")))?;
        tokio::fs::write(&self.path, json).await.map_err(|e| {
            TransferError::Configuration(format!("writing {}: {e}", self.path.display()))
        })?;

        info!(path = %self.path.display(), asset = %document.asset, "wrote transfer proposal");
        Ok(self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use sol_wire::{find_program_address, Keypair};

    use super::*;
    use crate::instruction::{build_transfer_instruction, BuildPolicy};

    fn vault() -> Pubkey {
        let program = Keypair::from_seed(&[0x5a; 32]).pubkey();
        find_program_address(&[b"multisig", b"vault", &[0]], &program).unwrap().0
    }

    #[test]
    fn no_vault_selects_direct() {
        let route = TransferRoute::select(None, None).unwrap();
        assert!(matches!(route, TransferRoute::Direct));
        let signer = Pubkey::new_from_array([1; 32]);
        assert_eq!(route.authority(signer), signer);
    }

    #[test]
    fn vault_without_sink_is_configuration_error() {
        let result = TransferRoute::select(Some(vault()), None);
        assert!(matches!(result, Err(TransferError::Configuration(_))));
    }

    #[test]
    fn vault_is_the_proposal_authority() {
        let sink: Arc<dyn ProposalSink> = Arc::new(JsonFileProposalSink::new("/tmp/unused.json"));
        let route = TransferRoute::select(Some(vault()), Some(sink)).unwrap();
        assert_eq!(route.authority(Pubkey::new_from_array([1; 32])), vault());
        assert!(format!("{route:?}").contains("Proposal"));
    }

    #[tokio::test]
    async fn json_sink_writes_accounts_and_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proposal.json");
        let sink = JsonFileProposalSink::new(&path);

        let ix = build_transfer_instruction(
            Keypair::from_seed(&[1; 32]).pubkey(),
            vault(),
            Keypair::from_seed(&[3; 32]).pubkey(),
            None,
            &BuildPolicy::default(),
        )
        .unwrap();
        let reference = sink.propose(ix.clone()).await.unwrap();
        assert_eq!(reference, path.display().to_string());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["accounts"].as_array().unwrap().len(), 10);
        assert_eq!(written["accounts"][1]["pubkey"], vault().to_string());
        assert_eq!(written["accounts"][1]["is_signer"], true);
        assert_eq!(written["data_hex"], ix.data_hex());
        assert_eq!(written["program_id"], ix.program_id().to_string());
    }
}
