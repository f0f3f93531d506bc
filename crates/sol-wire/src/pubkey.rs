//! Solana public keys and program derived addresses.
//!
//! An address is the Base58 text of a 32-byte Ed25519 public key. Program
//! derived addresses are SHA-256 outputs that fall off the curve, so only
//! their program can sign for them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SolError;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// A 32-byte Solana public key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    pub fn as_array(&self) -> &[u8; 32] {
        &self.0
    }

    /// Build a key from an arbitrary byte slice, which must be exactly 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, SolError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            SolError::InvalidPublicKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Whether this is the all-zero key (also the System Program id).
    pub fn is_zeroed(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// True when the bytes decompress to an Edwards point, i.e. a secret key
    /// may exist for this address.
    pub fn is_on_curve(&self) -> bool {
        curve25519_dalek::edwards::CompressedEdwardsY(self.0)
            .decompress()
            .is_some()
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({self})")
    }
}

impl FromStr for Pubkey {
    type Err = SolError;

    /// Decode a Base58 address. It must decode to exactly 32 bytes.
    fn from_str(address: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(address.trim())
            .into_vec()
            .map_err(|e| SolError::InvalidAddress(format!("base58 decode failed: {e}")))?;

        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            SolError::InvalidAddress(format!("expected 32 bytes, got {}", v.len()))
        })?;

        Ok(Self(arr))
    }
}

impl TryFrom<String> for Pubkey {
    type Error = SolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pubkey> for String {
    fn from(key: Pubkey) -> Self {
        key.to_string()
    }
}

// -- program derived addresses ---------------------------------------------------

/// Derive the canonical PDA: the highest bump whose
/// `sha256(seeds | bump | program | marker)` lands off the curve.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), SolError> {
    (0u8..=255)
        .rev()
        .find_map(|bump| derive_off_curve(seeds, bump, program_id).map(|key| (key, bump)))
        .ok_or_else(|| SolError::InvalidAddress(format!("no off-curve bump for {program_id}")))
}

fn derive_off_curve(seeds: &[&[u8]], bump: u8, program_id: &Pubkey) -> Option<Pubkey> {
    let digest = seeds
        .iter()
        .fold(Sha256::new(), |hasher, seed| hasher.chain_update(seed))
        .chain_update([bump])
        .chain_update(program_id.as_ref())
        .chain_update(PDA_MARKER)
        .finalize();

    let candidate = Pubkey(digest.into());
    (!candidate.is_on_curve()).then_some(candidate)
}
