//! Solana wire primitives for the Core asset transfer tooling.
//!
//! Public keys, keypairs, program derived addresses and the compact
//! transaction wire format are implemented by hand on top of
//! `ed25519-dalek`, `curve25519-dalek` and `bs58`, so the transfer crates
//! never need `solana-sdk` and its transitive dependency tree.

pub mod error;
pub mod ids;
pub mod keypair;
pub mod pubkey;
pub mod transaction;

// Re-export key public types for ergonomic imports.
pub use error::SolError;
pub use ids::{SYSTEM_PROGRAM_ID, SYSVAR_INSTRUCTIONS_ID, SYSVAR_RENT_ID};
pub use keypair::{Keypair, Signer};
pub use pubkey::{find_program_address, Pubkey};
pub use transaction::{
    compile_transaction, decode_compact_u16, encode_compact_u16, serialize_message,
    sign_transaction, AccountMeta, CompiledInstruction, Instruction, Signature, Transaction,
};
