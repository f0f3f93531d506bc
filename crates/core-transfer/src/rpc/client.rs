//! JSON-RPC client for a Solana cluster.
//!
//! Speaks the handful of methods a transfer needs (`getAccountInfo`,
//! `getLatestBlockhash`, `sendTransaction`, `getSignatureStatuses`,
//! `getTransaction`) over plain HTTP POST.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sol_wire::{compile_transaction, sign_transaction, Pubkey, Signature, Signer};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::{AccountInfo, AccountReader, Commitment, Confirmation, SendOptions, TransactionSubmitter};
use crate::error::RpcError;
use crate::instruction::TransferInstruction;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl From<RpcErrorObject> for RpcError {
    fn from(e: RpcErrorObject) -> Self {
        let logs = e
            .data
            .as_ref()
            .and_then(|d| d.get("logs"))
            .and_then(Value::as_array)
            .map(|logs| {
                logs.iter()
                    .filter_map(|l| l.as_str().map(str::to_owned))
                    .collect::<Vec<_>>()
            });

        match logs {
            Some(logs) => RpcError::Simulation {
                message: e.message,
                logs,
            },
            None => RpcError::Server {
                code: e.code,
                message: e.message,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct UiAccount {
    lamports: u64,
    owner: String,
    /// `[payload, encoding]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct LatestBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    confirmations: Option<u64>,
    err: Option<Value>,
    confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// `confirmations: null` without a status string means the slot is rooted.
    fn reached(&self) -> Commitment {
        match (self.confirmation_status, self.confirmations) {
            (Some(level), _) => level,
            (None, None) => Commitment::Finalized,
            (None, Some(_)) => Commitment::Processed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionResult {
    meta: Option<TransactionMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionMeta {
    #[serde(default)]
    log_messages: Option<Vec<String>>,
}

/// HTTP JSON-RPC client implementing both network collaborators.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    request_id: AtomicU64,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            url: url.into(),
            request_id: AtomicU64::new(1),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Override how long `confirm` polls before reporting a timeout.
    pub fn with_confirmation(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.confirm_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, RpcError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Transport(format!("{method}: http status {status}")));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(error.into());
        }

        serde_json::from_value(parsed.result)
            .map_err(|e| RpcError::InvalidResponse(format!("{method}: {e}")))
    }

    pub async fn latest_blockhash(&self, commitment: Commitment) -> Result<[u8; 32], RpcError> {
        let response: WithContext<LatestBlockhash> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": commitment.as_str() }]),
            )
            .await?;

        let bytes = bs58::decode(&response.value.blockhash)
            .into_vec()
            .map_err(|e| RpcError::InvalidResponse(format!("blockhash: {e}")))?;
        bytes
            .try_into()
            .map_err(|_| RpcError::InvalidResponse("blockhash is not 32 bytes".into()))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let response: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(response.value.into_iter().next().flatten())
    }

    /// Program log lines recorded for a landed transaction.
    pub async fn transaction_logs(&self, signature: &Signature) -> Result<Vec<String>, RpcError> {
        let response: Option<TransactionResult> = self
            .call(
                "getTransaction",
                json!([
                    signature.to_string(),
                    {
                        "encoding": "json",
                        "commitment": "confirmed",
                        "maxSupportedTransactionVersion": 0
                    }
                ]),
            )
            .await?;

        Ok(response
            .and_then(|tx| tx.meta)
            .and_then(|meta| meta.log_messages)
            .unwrap_or_default())
    }
}

#[async_trait]
impl AccountReader for RpcClient {
    async fn get_account(
        &self,
        address: &Pubkey,
        commitment: Commitment,
    ) -> Result<Option<AccountInfo>, RpcError> {
        let response: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": commitment.as_str() }
                ]),
            )
            .await?;

        let Some(account) = response.value else {
            return Ok(None);
        };

        let (payload, encoding) = account.data;
        if encoding != "base64" {
            return Err(RpcError::InvalidResponse(format!(
                "unexpected account encoding {encoding}"
            )));
        }
        let data = BASE64
            .decode(payload)
            .map_err(|e| RpcError::InvalidResponse(format!("account data: {e}")))?;
        let owner_program = account
            .owner
            .parse()
            .map_err(|e| RpcError::InvalidResponse(format!("account owner: {e}")))?;

        Ok(Some(AccountInfo {
            owner_program,
            lamports: account.lamports,
            data,
        }))
    }
}

#[async_trait]
impl TransactionSubmitter for RpcClient {
    async fn send(
        &self,
        instruction: &TransferInstruction,
        signer: &dyn Signer,
        options: &SendOptions,
    ) -> Result<Signature, RpcError> {
        let blockhash = self.latest_blockhash(options.preflight_commitment).await?;
        let tx = compile_transaction(
            std::slice::from_ref(instruction.as_instruction()),
            &signer.pubkey(),
            &blockhash,
        )?;
        let signers: [&dyn Signer; 1] = [signer];
        let (wire, signature) = sign_transaction(&tx, &signers)?;

        let returned: String = self
            .call(
                "sendTransaction",
                json!([
                    BASE64.encode(&wire),
                    {
                        "encoding": "base64",
                        "skipPreflight": options.skip_preflight,
                        "preflightCommitment": options.preflight_commitment.as_str()
                    }
                ]),
            )
            .await?;

        if returned != signature.to_string() {
            warn!(
                local = %signature,
                returned = %returned,
                "node returned a different signature than the one signed locally"
            );
        }
        debug!(signature = %signature, bytes = wire.len(), "transaction sent");

        Ok(signature)
    }

    async fn confirm(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<Confirmation, RpcError> {
        let deadline = Instant::now() + self.confirm_timeout;

        loop {
            let status = match self.signature_status(signature).await {
                Ok(status) => status,
                Err(e) if e.is_transient() => {
                    warn!(signature = %signature, error = %e, "signature status poll failed");
                    None
                }
                Err(e) => return Err(e),
            };
            if let Some(status) = status {
                if let Some(err) = status.err {
                    let logs = self.transaction_logs(signature).await.unwrap_or_else(|e| {
                        warn!(signature = %signature, error = %e, "could not fetch transaction logs");
                        Vec::new()
                    });
                    return Ok(Confirmation::Rejected {
                        message: err.to_string(),
                        logs,
                    });
                }
                if status.reached() >= commitment {
                    return Ok(Confirmation::Confirmed);
                }
            }

            if Instant::now() >= deadline {
                return Ok(Confirmation::Timeout);
            }
            sleep(self.poll_interval).await;
        }
    }
}
