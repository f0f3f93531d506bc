//! Legacy (v0-less) transaction messages: compilation, serialization and
//! multi-signer signing, without `solana-sdk`.
//!
//! ```text
//! wire      = compact(sig count) | sig[64]... | message
//! message   = header[3] | compact(key count) | key[32]... | blockhash[32]
//!             | compact(ix count) | ix...
//! header    = required sigs | read-only signed | read-only unsigned
//! ix        = program index u8 | compact(n) | account index u8... | compact(len) | data
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::SolError;
use crate::keypair::Signer;
use crate::pubkey::Pubkey;

/// Account keys are addressed by a `u8` index inside compiled instructions.
const MAX_ACCOUNT_KEYS: usize = 256;

// -- compact-u16 ---------------------------------------------------------------

/// Little-endian base-128 varint, at most three bytes for a `u16`.
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = u32::from(value);
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Read a compact-u16 prefix; returns the value and how many bytes it used.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), SolError> {
    let (mut value, mut shift, mut consumed) = (0u32, 0u32, 0usize);

    loop {
        let Some(&byte) = data.get(consumed) else {
            return Err(SolError::SerializationError(
                "truncated compact-u16".into(),
            ));
        };
        consumed += 1;

        value |= u32::from(byte & 0x7f) << shift;
        shift += 7;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    let value = u16::try_from(value)
        .map_err(|_| SolError::SerializationError(format!("compact-u16 overflow: {value}")))?;
    Ok((value, consumed))
}

// -- instructions ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// An instruction as the program sees it, before key deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// A 64-byte Ed25519 transaction signature, displayed in Base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_array(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl FromStr for Signature {
    type Err = SolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|e| SolError::InvalidSignature(format!("base58 decode failed: {e}")))?;
        let arr: [u8; 64] = bytes.try_into().map_err(|v: Vec<u8>| {
            SolError::InvalidSignature(format!("expected 64 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

/// An unsigned message. Keys are grouped signer-writable, signer-readonly,
/// writable, readonly; the header counts describe those group boundaries.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub account_keys: Vec<Pubkey>,
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
    pub recent_blockhash: [u8; 32],
    pub compiled_instructions: Vec<CompiledInstruction>,
}

impl Transaction {
    /// The keys that must sign, in signature-slot order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        &self.account_keys[..self.num_required_signatures as usize]
    }
}

/// Instruction with keys replaced by positions in `account_keys`.
#[derive(Debug, Clone)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

// -- compilation -----------------------------------------------------------------

/// Build a transaction message from a set of instructions with a single fee payer.
///
/// The fee payer lands at index 0. A key referenced more than once is merged
/// and keeps the strongest signer/writable flags seen.
pub fn compile_transaction(
    instructions: &[Instruction],
    fee_payer: &Pubkey,
    recent_blockhash: &[u8; 32],
) -> Result<Transaction, SolError> {
    let mut entries: Vec<AccountMeta> = Vec::new();
    let mut merge = |meta: AccountMeta| {
        match entries.iter_mut().find(|e| e.pubkey == meta.pubkey) {
            Some(entry) => {
                entry.is_signer |= meta.is_signer;
                entry.is_writable |= meta.is_writable;
            }
            None => entries.push(meta),
        }
    };

    merge(AccountMeta::writable(*fee_payer, true));
    for ix in instructions {
        ix.accounts.iter().copied().for_each(&mut merge);
        merge(AccountMeta::readonly(ix.program_id, false));
    }

    if entries.len() > MAX_ACCOUNT_KEYS {
        return Err(SolError::TransactionBuildError(format!(
            "too many account keys: {}",
            entries.len()
        )));
    }

    // Stable sort: within a category insertion order is kept, so the fee
    // payer (inserted first, writable signer) stays at index 0.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    let count = |pred: fn(&AccountMeta) -> bool| entries.iter().filter(|e| pred(e)).count() as u8;
    let required_signatures = count(|e| e.is_signer);
    let readonly_signed = count(|e| e.is_signer && !e.is_writable);
    let readonly_unsigned = count(|e| !e.is_signer && !e.is_writable);

    let account_keys: Vec<Pubkey> = entries.iter().map(|e| e.pubkey).collect();

    let index_of = |key: &Pubkey| -> Result<u8, SolError> {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|idx| idx as u8)
            .ok_or_else(|| SolError::TransactionBuildError(format!("account {key} was not compiled")))
    };

    let compiled_instructions = instructions
        .iter()
        .map(|ix| -> Result<CompiledInstruction, SolError> {
            Ok(CompiledInstruction {
                program_id_index: index_of(&ix.program_id)?,
                account_indices: ix
                    .accounts
                    .iter()
                    .map(|meta| index_of(&meta.pubkey))
                    .collect::<Result<Vec<u8>, _>>()?,
                data: ix.data.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Transaction {
        account_keys,
        num_required_signatures: required_signatures,
        num_readonly_signed: readonly_signed,
        num_readonly_unsigned: readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions,
    })
}

/// Message bytes; this is what every signer signs.
pub fn serialize_message(tx: &Transaction) -> Result<Vec<u8>, SolError> {
    let mut buf = Vec::with_capacity(3 + 32 * (tx.account_keys.len() + 1) + 64);
    buf.extend_from_slice(&[
        tx.num_required_signatures,
        tx.num_readonly_signed,
        tx.num_readonly_unsigned,
    ]);

    buf.extend_from_slice(&encode_compact_u16(len_u16(tx.account_keys.len())?));
    tx.account_keys
        .iter()
        .for_each(|key| buf.extend_from_slice(key.as_ref()));

    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&encode_compact_u16(len_u16(
        tx.compiled_instructions.len(),
    )?));
    for compiled in &tx.compiled_instructions {
        buf.push(compiled.program_id_index);
        for bytes in [&compiled.account_indices, &compiled.data] {
            buf.extend_from_slice(&encode_compact_u16(len_u16(bytes.len())?));
            buf.extend_from_slice(bytes);
        }
    }

    Ok(buf)
}

/// Sign `tx` and produce its wire bytes.
///
/// Every key in the transaction's signer set must be covered by exactly one
/// of `signers`; each signature lands in the slot of its key. Returns the
/// wire bytes (ready for `sendTransaction`) and the first signature, which
/// is the transaction id.
pub fn sign_transaction(
    tx: &Transaction,
    signers: &[&dyn Signer],
) -> Result<(Vec<u8>, Signature), SolError> {
    let message = serialize_message(tx)?;

    let mut signatures = Vec::with_capacity(tx.num_required_signatures as usize);
    for key in tx.signer_keys() {
        let signer = signers.iter().find(|s| s.pubkey() == *key).ok_or_else(|| {
            SolError::SigningError(format!("no signer provided for required key {key}"))
        })?;
        signatures.push(signer.try_sign_message(&message)?);
    }

    if let Some(extra) = signers
        .iter()
        .find(|s| !tx.signer_keys().contains(&s.pubkey()))
    {
        return Err(SolError::SigningError(format!(
            "signer {} is not required by the transaction",
            extra.pubkey()
        )));
    }

    let first = signatures.first().copied().ok_or_else(|| {
        SolError::SigningError("transaction has zero required signatures".into())
    })?;

    let mut wire = Vec::with_capacity(3 + 64 * signatures.len() + message.len());
    wire.extend_from_slice(&encode_compact_u16(len_u16(signatures.len())?));
    for signature in &signatures {
        wire.extend_from_slice(signature.as_array());
    }
    wire.extend_from_slice(&message);

    Ok((wire, first))
}

fn len_u16(len: usize) -> Result<u16, SolError> {
    u16::try_from(len)
        .map_err(|_| SolError::SerializationError(format!("length {len} exceeds compact-u16")))
}
