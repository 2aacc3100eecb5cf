//! Test-only scripted adapters and fixtures.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::core::types::{AssetRecord, RecipientQuota, TemplateRef};
use crate::io::chain::{ChainApi, ChainInfo, PackedTransaction, PushOutcome};
use crate::io::config::{CourierConfig, TimingConfig};
use crate::io::scanner::InventoryScanner;
use crate::io::submitter::AccountKey;

pub const ACTOR_WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";
pub const PAYER_WIF: &str = "5HwoXVkHoRM8sL2KmNRS217n1g8mPPBomrY7yehCuXC1115WWsh";
pub const TEST_CHAIN_ID: &str = "1064487b3cd1a897ce03ae5b6a865651747e2e152090f99c1d19d44e01aea5a4";
pub const TEST_BLOCK_ID: &str = "0bd3e1c2a4f5e6d7c8b9a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1";

pub fn actor_key() -> AccountKey {
    AccountKey {
        account: "alice.wam".to_string(),
        key: ACTOR_WIF.parse().expect("actor key"),
    }
}

pub fn payer_key() -> AccountKey {
    AccountKey {
        account: "payer.wam".to_string(),
        key: PAYER_WIF.parse().expect("payer key"),
    }
}

/// Asset record with a template id.
pub fn record(asset_id: &str, template_id: &str) -> AssetRecord {
    AssetRecord {
        asset_id: asset_id.to_string(),
        template: Some(TemplateRef {
            template_id: template_id.to_string(),
        }),
    }
}

pub fn quota(account: &str, entries: &[(&str, i64)]) -> RecipientQuota {
    RecipientQuota {
        account: account.to_string(),
        quota: entries
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect(),
    }
}

/// Valid config for `alice.wam` with every pause and cooldown set to zero.
pub fn test_config(recipients: Vec<RecipientQuota>) -> CourierConfig {
    CourierConfig {
        account: "alice.wam".to_string(),
        private_key: ACTOR_WIF.to_string(),
        timing: TimingConfig {
            request_interval_secs: 0,
            min_scan_interval_secs: 0,
            scan_interval_secs: 0,
            start_delay_secs: 0,
            transfer_pause_secs: 0,
            success_pause_secs: 0,
            request_timeout_secs: 5,
        },
        recipients,
        ..CourierConfig::default()
    }
}

/// Scanner that replays scripted scans, one per call. Once the script runs
/// out, the last scan repeats.
pub struct ScriptedScanner {
    scans: RefCell<VecDeque<Result<Vec<AssetRecord>, String>>>,
    last: RefCell<Result<Vec<AssetRecord>, String>>,
    calls: Cell<u32>,
}

impl ScriptedScanner {
    pub fn new(scans: Vec<Result<Vec<AssetRecord>, String>>) -> Self {
        Self {
            scans: RefCell::new(scans.into()),
            last: RefCell::new(Ok(Vec::new())),
            calls: Cell::new(0),
        }
    }

    /// Same inventory on every call.
    pub fn fixed(records: Vec<AssetRecord>) -> Self {
        let scanner = Self::new(Vec::new());
        *scanner.last.borrow_mut() = Ok(records);
        scanner
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl InventoryScanner for ScriptedScanner {
    fn scan(&self, _owner: &str) -> Result<Vec<AssetRecord>> {
        self.calls.set(self.calls.get() + 1);
        if let Some(next) = self.scans.borrow_mut().pop_front() {
            *self.last.borrow_mut() = next;
        }
        self.last.borrow().clone().map_err(|err| anyhow!(err))
    }
}

/// Chain that records every call and replays scripted broadcast outcomes.
/// Once the script runs out, broadcasts are accepted.
pub struct ScriptedChain {
    outcomes: RefCell<VecDeque<PushOutcome>>,
    encode_failure: Option<String>,
    encoded: RefCell<Vec<Value>>,
    pushed: RefCell<Vec<PackedTransaction>>,
}

impl ScriptedChain {
    pub fn new(outcomes: Vec<PushOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            encode_failure: None,
            encoded: RefCell::new(Vec::new()),
            pushed: RefCell::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Vec::new())
    }

    /// Make every `abi_json_to_bin` call fail with `message`.
    pub fn failing_encoding(mut self, message: &str) -> Self {
        self.encode_failure = Some(message.to_string());
        self
    }

    /// Arguments of every encoded action, in call order.
    pub fn encoded_args(&self) -> Vec<Value> {
        self.encoded.borrow().clone()
    }

    pub fn pushed(&self) -> Vec<PackedTransaction> {
        self.pushed.borrow().clone()
    }

    /// Recipients of every transfer that reached the broadcast step.
    pub fn broadcast_recipients(&self) -> Vec<String> {
        let pushed = self.pushed.borrow().len();
        self.encoded
            .borrow()
            .iter()
            .take(pushed)
            .filter_map(|args| args["to"].as_str().map(str::to_string))
            .collect()
    }
}

impl ChainApi for ScriptedChain {
    fn get_info(&self) -> Result<ChainInfo> {
        Ok(ChainInfo {
            chain_id: TEST_CHAIN_ID.to_string(),
            last_irreversible_block_id: TEST_BLOCK_ID.to_string(),
        })
    }

    fn abi_json_to_bin(&self, _code: &str, _action: &str, args: &Value) -> Result<Vec<u8>> {
        if let Some(message) = &self.encode_failure {
            return Err(anyhow!(message.clone()));
        }
        self.encoded.borrow_mut().push(args.clone());
        Ok(serde_json::to_vec(args)?)
    }

    fn push_transaction(&self, trx: &PackedTransaction) -> PushOutcome {
        self.pushed.borrow_mut().push(trx.clone());
        let count = self.pushed.borrow().len();
        self.outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| PushOutcome::Accepted {
                transaction_id: format!("tx-{count}"),
            })
    }
}
