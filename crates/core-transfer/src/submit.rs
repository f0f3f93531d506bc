//! Submission with confirmation and bounded retries.
//!
//! Per attempt: `Pending -> Sent -> Confirmed`, or `Sent -> Failed`, after
//! which the loop either retries (attempts remain, error is transient) or
//! aborts. A returned signature is never proof of a transfer; callers must
//! re-read the asset owner afterwards (see [`crate::transfer`]).

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sol_wire::{Signature, Signer};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{FailureKind, RpcError, SubmissionFailure, TransferError};
use crate::instruction::TransferInstruction;
use crate::rpc::{Commitment, Confirmation, SendOptions, TransactionSubmitter};

/// Retry budget and geometric backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 1.5,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.max_attempts == 0 {
            return Err(TransferError::Configuration(
                "max_attempts must be at least 1".into(),
            ));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor > 1.0) {
            return Err(TransferError::Configuration(format!(
                "backoff_factor must be greater than 1, got {}",
                self.backoff_factor
            )));
        }
        if self.max_delay < self.base_delay {
            return Err(TransferError::Configuration(
                "max_delay must not be shorter than base_delay".into(),
            ));
        }
        Ok(())
    }

    /// Delay slept before attempt `attempt` (1-based); zero for the first.
    ///
    /// `base * factor^(attempt - 2)`, capped at `max_delay`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// How each attempt is sent and confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub send: SendOptions,
    pub commitment: Commitment,
    /// When false an accepted send counts as success; the ownership
    /// post-check then decides on its own.
    pub await_confirmation: bool,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            send: SendOptions::default(),
            commitment: Commitment::Confirmed,
            await_confirmation: true,
        }
    }
}

/// Lifecycle of a single submission, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Pending,
    Sent,
    Confirmed,
    Failed,
    Retry,
    Aborted,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::Pending => "pending",
            SubmissionState::Sent => "sent",
            SubmissionState::Confirmed => "confirmed",
            SubmissionState::Failed => "failed",
            SubmissionState::Retry => "retry",
            SubmissionState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(Signature),
    Failure(String),
}

#[derive(Debug, Clone)]
pub struct SubmissionAttempt {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub timestamp: DateTime<Utc>,
    /// Backoff slept before this attempt started.
    pub delay_before: Duration,
}

/// A confirmed submission.
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub signature: Signature,
    pub attempts: u32,
    pub history: Vec<SubmissionAttempt>,
}

struct AttemptError {
    message: String,
    logs: Vec<String>,
    transient: bool,
}

impl From<RpcError> for AttemptError {
    fn from(e: RpcError) -> Self {
        Self {
            transient: e.is_transient(),
            logs: e.logs().to_vec(),
            message: e.to_string(),
        }
    }
}

/// Send `instruction` until it confirms or the retry budget runs out.
///
/// Transient failures (network, simulation rejection, confirmation timeout,
/// on-chain rejection) are retried with backoff; a non-transient error
/// aborts at once with a `Permanent` failure. On exhaustion the last error
/// and its logs are returned as a `Transient` failure.
pub async fn submit(
    instruction: TransferInstruction,
    signer: &dyn Signer,
    submitter: &dyn TransactionSubmitter,
    policy: &RetryPolicy,
    options: &SubmitOptions,
) -> Result<SubmissionReport, TransferError> {
    policy.validate()?;

    let mut history = Vec::with_capacity(policy.max_attempts as usize);
    let mut last_signature = None;

    for attempt in 1..=policy.max_attempts {
        let delay = policy.delay_before(attempt);
        if !delay.is_zero() {
            debug!(
                attempt,
                max_attempts = policy.max_attempts,
                backoff_ms = delay.as_millis() as u64,
                state = %SubmissionState::Retry,
                "backing off before retry"
            );
            sleep(delay).await;
        }

        let timestamp = Utc::now();
        debug!(attempt, asset = %instruction.asset(), state = %SubmissionState::Pending, "submitting transfer");

        let result = attempt_once(&instruction, signer, submitter, options).await;
        match result {
            Ok(signature) => {
                info!(attempt, signature = %signature, state = %SubmissionState::Confirmed, "transfer submission confirmed");
                history.push(SubmissionAttempt {
                    attempt,
                    outcome: AttemptOutcome::Success(signature),
                    timestamp,
                    delay_before: delay,
                });
                return Ok(SubmissionReport {
                    signature,
                    attempts: attempt,
                    history,
                });
            }
            Err((err, signature)) => {
                last_signature = signature.or(last_signature);
                history.push(SubmissionAttempt {
                    attempt,
                    outcome: AttemptOutcome::Failure(err.message.clone()),
                    timestamp,
                    delay_before: delay,
                });

                let exhausted = attempt == policy.max_attempts;
                if !err.transient || exhausted {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err.message,
                        logs = ?err.logs,
                        state = %SubmissionState::Aborted,
                        "transfer submission aborted"
                    );
                    return Err(SubmissionFailure {
                        kind: if err.transient {
                            FailureKind::Transient
                        } else {
                            FailureKind::Permanent
                        },
                        attempts: attempt,
                        message: err.message,
                        logs: err.logs,
                        last_signature,
                        history,
                    }
                    .into());
                }

                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err.message,
                    state = %SubmissionState::Failed,
                    "transient submission failure"
                );
            }
        }
    }

    // `validate` guarantees at least one attempt, which always returns.
    Err(TransferError::Configuration(
        "retry loop finished without an attempt".into(),
    ))
}

async fn attempt_once(
    instruction: &TransferInstruction,
    signer: &dyn Signer,
    submitter: &dyn TransactionSubmitter,
    options: &SubmitOptions,
) -> Result<Signature, (AttemptError, Option<Signature>)> {
    let signature = submitter
        .send(instruction, signer, &options.send)
        .await
        .map_err(|e| (AttemptError::from(e), None))?;
    debug!(signature = %signature, state = %SubmissionState::Sent, "transfer transaction sent");

    if !options.await_confirmation {
        return Ok(signature);
    }

    let confirmation = submitter
        .confirm(&signature, options.commitment)
        .await
        .map_err(|e| (AttemptError::from(e), Some(signature)))?;

    match confirmation {
        Confirmation::Confirmed => Ok(signature),
        Confirmation::Timeout => Err((
            AttemptError {
                message: format!("confirmation timed out for {signature}"),
                logs: Vec::new(),
                transient: true,
            },
            Some(signature),
        )),
        Confirmation::Rejected { message, logs } => Err((
            AttemptError {
                message: format!("transaction {signature} rejected: {message}"),
                logs,
                transient: true,
            },
            Some(signature),
        )),
    }
}
