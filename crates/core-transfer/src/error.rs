use std::fmt;

use sol_wire::{Pubkey, Signature, SolError};
use thiserror::Error;

use crate::submit::SubmissionAttempt;

/// Errors surfaced by a transfer operation.
///
/// Validation errors (`InvalidKey`, `Configuration`) are raised before any
/// network call; `Verification` aborts before an instruction is built.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid {role} key: {reason}")]
    InvalidKey { role: &'static str, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error(transparent)]
    Submission(#[from] SubmissionFailure),

    #[error("ambiguous outcome, verify ownership manually: {reason}")]
    AmbiguousOutcome {
        reason: String,
        signature: Option<Signature>,
        observed_owner: Option<Pubkey>,
    },

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("signing error: {0}")]
    Signing(String),
}

impl From<SolError> for TransferError {
    fn from(e: SolError) -> Self {
        TransferError::Signing(e.to_string())
    }
}

/// Why a submission gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every attempt failed with a retryable error and the budget ran out.
    Transient,
    /// A non-retryable error stopped the loop early.
    Permanent,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Permanent => f.write_str("permanent"),
        }
    }
}

/// A submission that did not reach confirmation.
///
/// Carries everything the caller needs to decide on manual intervention:
/// the attempt history, the last error and any program logs it carried,
/// and the last signature that was accepted by the node (it may still land).
#[derive(Debug, Error)]
#[error("{kind} submission failure after {attempts} attempt(s): {message}")]
pub struct SubmissionFailure {
    pub kind: FailureKind,
    pub attempts: u32,
    pub message: String,
    pub logs: Vec<String>,
    pub last_signature: Option<Signature>,
    pub history: Vec<SubmissionAttempt>,
}

/// Errors returned by the network collaborators.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("simulation rejected: {message}")]
    Simulation { message: String, logs: Vec<String> },

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("signing error: {0}")]
    Signing(String),
}

impl RpcError {
    /// Signing problems never fix themselves; everything else is network
    /// or cluster state that a later attempt may see differently.
    pub fn is_transient(&self) -> bool {
        !matches!(self, RpcError::Signing(_))
    }

    pub fn logs(&self) -> &[String] {
        match self {
            RpcError::Simulation { logs, .. } => logs,
            _ => &[],
        }
    }
}

impl From<SolError> for RpcError {
    fn from(e: SolError) -> Self {
        RpcError::Signing(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_key() {
        let err = TransferError::InvalidKey {
            role: "destination",
            reason: "not on curve".into(),
        };
        assert_eq!(err.to_string(), "invalid destination key: not on curve");
    }

    #[test]
    fn display_submission_failure() {
        let err = TransferError::from(SubmissionFailure {
            kind: FailureKind::Permanent,
            attempts: 3,
            message: "blockhash not found".into(),
            logs: vec![],
            last_signature: None,
            history: vec![],
        });
        assert_eq!(
            err.to_string(),
            "permanent submission failure after 3 attempt(s): blockhash not found"
        );
    }

    #[test]
    fn signing_errors_are_not_transient() {
        assert!(!RpcError::Signing("missing signer".into()).is_transient());
        assert!(RpcError::Transport("reset".into()).is_transient());
        assert!(RpcError::Server {
            code: -32005,
            message: "node is behind".into()
        }
        .is_transient());
    }

    #[test]
    fn simulation_error_exposes_logs() {
        let err = RpcError::Simulation {
            message: "custom program error: 0x1a".into(),
            logs: vec!["Program log: Error: InvalidAuthority".into()],
        };
        assert_eq!(err.logs().len(), 1);
        assert!(err.is_transient());
        assert!(RpcError::Transport("x".into()).logs().is_empty());
    }

    #[test]
    fn sol_error_converts_to_signing() {
        let err: TransferError = SolError::SigningError("no signer".into()).into();
        assert!(matches!(err, TransferError::Signing(_)));
    }
}
