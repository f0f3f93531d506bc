//! Metaplex Core `transfer` instruction construction.
//!
//! The account list and data layout are the contract with the on-chain
//! program; any deviation gets the instruction rejected.
//!
//! ```text
//! idx  account                 signer  writable
//!  0   asset                   no      yes
//!  1   authority (owner)       yes     no
//!  2   delegate                no      no      program id when none
//!  3   collection              no      no      program id when none
//!  4   update authority        no      no      = authority
//!  5   new owner               no      no
//!  6   payer                   yes     yes     = authority
//!  7   system program          no      no
//!  8   rent sysvar             no      no
//!  9   instructions sysvar     no      no
//!
//! data: discriminator (8) | amount flag (1) | amount u64 LE (8, if flag = 1)
//! ```

use std::str::FromStr;

use sol_wire::{
    AccountMeta, Instruction, Pubkey, SYSTEM_PROGRAM_ID, SYSVAR_INSTRUCTIONS_ID, SYSVAR_RENT_ID,
};

use crate::error::TransferError;
use crate::program::{MPL_CORE_PROGRAM_ID, TRANSFER_DISCRIMINATOR};

/// Number of accounts the transfer instruction always carries.
pub const TRANSFER_ACCOUNT_COUNT: usize = 10;

/// Whether the caller must name the asset's collection explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollectionPolicy {
    #[default]
    Optional,
    Required,
}

/// Input checks applied before an instruction is built.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildPolicy {
    pub collection: CollectionPolicy,
    /// Accept an off-curve destination, e.g. a multisig vault PDA.
    pub allow_off_curve_destination: bool,
}

/// A fully built transfer instruction. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInstruction {
    asset: Pubkey,
    destination: Pubkey,
    instruction: Instruction,
}

impl TransferInstruction {
    pub fn program_id(&self) -> Pubkey {
        self.instruction.program_id
    }

    pub fn accounts(&self) -> &[AccountMeta] {
        &self.instruction.accounts
    }

    pub fn data(&self) -> &[u8] {
        &self.instruction.data
    }

    pub fn data_hex(&self) -> String {
        hex::encode(&self.instruction.data)
    }

    pub fn asset(&self) -> Pubkey {
        self.asset
    }

    pub fn destination(&self) -> Pubkey {
        self.destination
    }

    /// The authority that must sign (account index 1).
    pub fn authority(&self) -> Pubkey {
        self.instruction.accounts[1].pubkey
    }

    pub fn as_instruction(&self) -> &Instruction {
        &self.instruction
    }
}

/// Parse a Base58 key for the given role, mapping failures to `InvalidKey`.
pub fn parse_key(role: &'static str, value: Option<&str>) -> Result<Pubkey, TransferError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TransferError::InvalidKey {
            role,
            reason: "missing".into(),
        })?;

    Pubkey::from_str(value).map_err(|e| TransferError::InvalidKey {
        role,
        reason: e.to_string(),
    })
}

/// Encode the transfer arguments: discriminator, then `Option<u64>` amount.
pub fn encode_transfer_data(amount: Option<u64>) -> Vec<u8> {
    let mut data = Vec::with_capacity(17);
    data.extend_from_slice(&TRANSFER_DISCRIMINATOR);
    match amount {
        Some(amount) => {
            data.push(1);
            data.extend_from_slice(&amount.to_le_bytes());
        }
        None => data.push(0),
    }
    data
}

/// Build the transfer instruction for a single non-fungible asset.
///
/// `owner` is the current owner and doubles as update authority and payer.
/// An all-zero `collection` is treated as unset.
pub fn build_transfer_instruction(
    asset: Pubkey,
    owner: Pubkey,
    destination: Pubkey,
    collection: Option<Pubkey>,
    policy: &BuildPolicy,
) -> Result<TransferInstruction, TransferError> {
    let collection = resolve_collection_input(collection, policy.collection)?;
    validate_transfer_keys(&asset, &destination, policy)?;
    if owner.is_zeroed() {
        return Err(TransferError::InvalidKey {
            role: "owner",
            reason: "owner key is unset".into(),
        });
    }

    let accounts = vec![
        AccountMeta::writable(asset, false),
        AccountMeta::readonly(owner, true),
        AccountMeta::readonly(MPL_CORE_PROGRAM_ID, false),
        AccountMeta::readonly(collection.unwrap_or(MPL_CORE_PROGRAM_ID), false),
        AccountMeta::readonly(owner, false),
        AccountMeta::readonly(destination, false),
        AccountMeta::writable(owner, true),
        AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
        AccountMeta::readonly(SYSVAR_RENT_ID, false),
        AccountMeta::readonly(SYSVAR_INSTRUCTIONS_ID, false),
    ];

    tracing::debug!(
        asset = %asset,
        destination = %destination,
        collection = ?collection,
        "built core transfer instruction"
    );

    Ok(TransferInstruction {
        asset,
        destination,
        instruction: Instruction {
            program_id: MPL_CORE_PROGRAM_ID,
            accounts,
            data: encode_transfer_data(Some(1)),
        },
    })
}

/// Normalize the unset sentinel to `None` and enforce the policy.
pub(crate) fn resolve_collection_input(
    collection: Option<Pubkey>,
    policy: CollectionPolicy,
) -> Result<Option<Pubkey>, TransferError> {
    let collection = collection.filter(|c| !c.is_zeroed());
    if policy == CollectionPolicy::Required && collection.is_none() {
        return Err(TransferError::Configuration(
            "a collection address is required but none was provided".into(),
        ));
    }
    Ok(collection)
}

/// Asset and destination must be real ed25519 keys; the destination may be
/// off-curve only when the policy allows it.
pub(crate) fn validate_transfer_keys(
    asset: &Pubkey,
    destination: &Pubkey,
    policy: &BuildPolicy,
) -> Result<(), TransferError> {
    validate_on_curve("asset", asset)?;
    if !policy.allow_off_curve_destination {
        validate_on_curve("destination", destination)?;
    }
    if asset == destination {
        return Err(TransferError::InvalidKey {
            role: "destination",
            reason: "destination equals the asset address".into(),
        });
    }
    Ok(())
}

fn validate_on_curve(role: &'static str, key: &Pubkey) -> Result<(), TransferError> {
    if key.is_on_curve() {
        Ok(())
    } else {
        Err(TransferError::InvalidKey {
            role,
            reason: format!("{key} is not a valid ed25519 point"),
        })
    }
}
