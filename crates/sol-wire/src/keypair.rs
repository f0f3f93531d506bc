//! Ed25519 keypairs and the signer abstraction used to sign transactions.
//!
//! Keypair files use the Solana CLI format: a JSON array of 64 bytes,
//! the 32-byte secret seed followed by the 32-byte public key.

use std::fmt;
use std::path::Path;

use ed25519_dalek::Signer as _;
use zeroize::Zeroize;

use crate::error::SolError;
use crate::pubkey::Pubkey;
use crate::transaction::Signature;

/// Anything that can authorize a transaction for a given public key.
///
/// Implementations never expose their secret material; the transaction
/// layer only ever sees the public key and the produced signature.
pub trait Signer: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SolError>;
}

/// An in-memory Ed25519 keypair. The secret half is zeroized on drop.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Build a keypair from a 32-byte Ed25519 seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let mut seed = *seed;
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }

    /// Build a keypair from 64 bytes (secret ‖ public).
    ///
    /// Fails if the public half does not belong to the secret half.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SolError> {
        let mut arr: [u8; 64] = bytes.try_into().map_err(|_| {
            SolError::InvalidPrivateKey(format!("expected 64 bytes, got {}", bytes.len()))
        })?;
        let result = ed25519_dalek::SigningKey::from_keypair_bytes(&arr)
            .map_err(|e| SolError::InvalidPrivateKey(format!("public key mismatch: {e}")));
        arr.zeroize();
        Ok(Self {
            signing_key: result?,
        })
    }

    /// Parse the Solana CLI JSON keypair format.
    pub fn from_json_bytes(json: &str) -> Result<Self, SolError> {
        let mut bytes: Vec<u8> = serde_json::from_str(json)
            .map_err(|e| SolError::KeypairFile(format!("expected a JSON byte array: {e}")))?;
        let result = Self::from_bytes(&bytes);
        bytes.zeroize();
        result
    }

    /// Read a Solana CLI keypair file from disk.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, SolError> {
        let path = path.as_ref();
        let mut contents = std::fs::read_to_string(path)
            .map_err(|e| SolError::KeypairFile(format!("{}: {e}", path.display())))?;
        let result = Self::from_json_bytes(&contents);
        contents.zeroize();
        result
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.signing_key.verifying_key().to_bytes())
    }
}

impl Signer for Keypair {
    fn pubkey(&self) -> Pubkey {
        Keypair::pubkey(self)
    }

    fn try_sign_message(&self, message: &[u8]) -> Result<Signature, SolError> {
        let signature = self.signing_key.sign(message);
        Ok(Signature::new(signature.to_bytes()))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}
