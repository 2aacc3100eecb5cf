//! Chain RPC adapter.
//!
//! The [`ChainApi`] trait covers the three node endpoints the submitter needs.
//! None of them go through the HTTP retry wrapper: a failed encoding call
//! propagates immediately, and a failed broadcast is reported as text.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

/// Subset of `get_info` needed to reference a block and sign.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainInfo {
    pub chain_id: String,
    pub last_irreversible_block_id: String,
}

/// Signed transaction in the node's `push_transaction` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackedTransaction {
    pub signatures: Vec<String>,
    pub compression: String,
    pub packed_context_free_data: String,
    /// Hex-encoded serialized transaction.
    pub packed_trx: String,
}

impl PackedTransaction {
    pub fn new(signatures: Vec<String>, packed_trx: &[u8]) -> Self {
        Self {
            signatures,
            compression: "none".to_string(),
            packed_context_free_data: String::new(),
            packed_trx: hex::encode(packed_trx),
        }
    }
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted { transaction_id: String },
    /// Failure reason as reported: response status and body, or the
    /// transport error.
    Rejected { reason: String },
}

pub trait ChainApi {
    fn get_info(&self) -> Result<ChainInfo>;

    /// Binary-encode `args` for `code::action` using the contract's ABI.
    fn abi_json_to_bin(&self, code: &str, action: &str, args: &Value) -> Result<Vec<u8>>;

    fn push_transaction(&self, trx: &PackedTransaction) -> PushOutcome;
}

/// [`ChainApi`] over the node's `/v1/chain` HTTP endpoints.
pub struct RpcChain {
    client: Client,
    chain_url: String,
}

impl RpcChain {
    pub fn new(client: Client, rpc_url: &str) -> Self {
        Self {
            client,
            chain_url: format!("{}/v1/chain", rpc_url.trim_end_matches('/')),
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.chain_url)
    }
}

#[derive(Debug, Deserialize)]
struct BinArgs {
    binargs: String,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    transaction_id: String,
}

impl ChainApi for RpcChain {
    fn get_info(&self) -> Result<ChainInfo> {
        let response = self
            .client
            .get(self.endpoint("get_info"))
            .send()
            .context("request get_info")?;
        let status = response.status();
        let body = response.text().context("read get_info body")?;
        if !status.is_success() {
            return Err(anyhow!("get_info returned {status}: {body}"));
        }
        serde_json::from_str(&body).context("parse get_info response")
    }

    #[instrument(skip(self, args))]
    fn abi_json_to_bin(&self, code: &str, action: &str, args: &Value) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint("abi_json_to_bin"))
            .json(&json!({ "code": code, "action": action, "args": args }))
            .send()
            .context("request abi_json_to_bin")?;
        let status = response.status();
        let body = response.text().context("read abi_json_to_bin body")?;
        if !status.is_success() {
            return Err(anyhow!("abi_json_to_bin returned {status}: {body}"));
        }
        let bin: BinArgs = serde_json::from_str(&body).context("parse abi_json_to_bin response")?;
        hex::decode(&bin.binargs).context("decode binargs")
    }

    fn push_transaction(&self, trx: &PackedTransaction) -> PushOutcome {
        let response = match self
            .client
            .post(self.endpoint("push_transaction"))
            .json(trx)
            .send()
        {
            Ok(response) => response,
            Err(err) => {
                return PushOutcome::Rejected {
                    reason: format!("push_transaction transport error: {err}"),
                };
            }
        };
        let status = response.status();
        let body = match response.text() {
            Ok(body) => body,
            Err(err) => {
                return PushOutcome::Rejected {
                    reason: format!("push_transaction body unreadable ({status}): {err}"),
                };
            }
        };
        debug!(%status, bytes = body.len(), "push_transaction response");
        push_outcome(status.is_success(), status.as_str(), &body)
    }
}

fn push_outcome(success: bool, status: &str, body: &str) -> PushOutcome {
    if !success {
        return PushOutcome::Rejected {
            reason: format!("{status}: {body}"),
        };
    }
    match serde_json::from_str::<PushResponse>(body) {
        Ok(response) => PushOutcome::Accepted {
            transaction_id: response.transaction_id,
        },
        Err(err) => PushOutcome::Rejected {
            reason: format!("unexpected push_transaction response ({err}): {body}"),
        },
    }
}
