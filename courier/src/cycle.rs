//! One scan cycle: scan, plan, build, submit, then resolve the outcome.

use std::thread;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::core::builder::transfer_action;
use crate::core::classifier::{
    Decision, Status, StopReason, billable_diagnostic, classify_broadcast_failure, decide,
};
use crate::core::error::CycleError;
use crate::core::planner::{CategoryPools, allocate_recipient};
use crate::core::state::RunState;
use crate::core::types::{Transaction, TransferBatch};
use crate::io::chain::{ChainApi, PushOutcome};
use crate::io::config::CourierConfig;
use crate::io::scanner::InventoryScanner;
use crate::io::submitter::TransactionSubmitter;

/// A transfer the node accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub recipient: String,
    pub asset_count: usize,
    pub transaction_id: String,
}

/// What a successful cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub transfers: Vec<TransferReceipt>,
    /// Recipients whose allocation came out empty.
    pub skipped: Vec<String>,
}

/// Result of one cycle after failure resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Recoverable failure; the next scan waits for the cooldown.
    Cooldown,
    Stopped(StopReason),
}

impl CycleOutcome {
    pub fn status(&self) -> Status {
        match self {
            CycleOutcome::Completed(_) | CycleOutcome::Cooldown => Status::Continue,
            CycleOutcome::Stopped(_) => Status::Stop,
        }
    }
}

/// The transfer agent for one acting account.
pub struct Courier<S: InventoryScanner, C: ChainApi> {
    config: CourierConfig,
    scanner: S,
    submitter: TransactionSubmitter<C>,
}

impl<S: InventoryScanner, C: ChainApi> Courier<S, C> {
    pub fn new(config: CourierConfig, scanner: S, submitter: TransactionSubmitter<C>) -> Self {
        Self {
            config,
            scanner,
            submitter,
        }
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    pub fn submitter(&self) -> &TransactionSubmitter<C> {
        &self.submitter
    }

    /// Announce endpoints and signers, then wait out the start delay.
    pub fn start(&self) {
        info!(rpc_url = %self.config.rpc_url, assets_url = %self.config.assets_url, "endpoints");
        for (account, public_key) in self.submitter.public_keys() {
            info!(%account, %public_key, "signer");
        }
        if let Some(proxy) = &self.config.proxy {
            info!(%proxy, "using proxy");
        }
        thread::sleep(self.config.timing.start_delay());
    }

    /// Run one cycle and resolve any failure into a continue/stop decision.
    ///
    /// Never fails: every error is classified here, and `state.next_scan_at`
    /// is rescheduled unless the run stops.
    pub fn scan_all(&self, state: &mut RunState) -> CycleOutcome {
        match self.run_cycle(state) {
            Ok(report) => {
                info!(
                    transfers = state.transfers_succeeded,
                    skipped = report.skipped.len(),
                    "cycle complete"
                );
                if self.config.retry.reset_error_count_on_success {
                    state.consecutive_contract_errors = 0;
                }
                state.schedule_next_scan(Utc::now(), self.config.timing.scan_interval());
                CycleOutcome::Completed(report)
            }
            Err(err) => self.resolve(&err, state),
        }
    }

    fn resolve(&self, err: &CycleError, state: &mut RunState) -> CycleOutcome {
        let decision = decide(err, state);
        match err {
            CycleError::Contract { .. } => error!(
                error = %err,
                failures = state.consecutive_contract_errors,
                "contract call failed"
            ),
            CycleError::SessionInvalid(_) => error!(
                error = %err,
                "signing credentials rejected; fix keys or permissions, then restart"
            ),
            CycleError::Unrecoverable(_) => error!(
                error = %err,
                "unrecoverable error; resolve it manually, then restart"
            ),
            CycleError::Unclassified(inner) => {
                let detail = format!("{inner:#}");
                error!(error = %detail, "cycle failed, retrying later");
            }
        }
        match decision {
            Decision::Cooldown => {
                state.schedule_next_scan(Utc::now(), self.config.timing.min_scan_interval());
                if let Some(at) = state.next_scan_at {
                    info!(next_scan_at = %at, "next scan rescheduled");
                }
                CycleOutcome::Cooldown
            }
            Decision::Stop(reason) => {
                if let StopReason::RetryBudgetExhausted { failures, budget } = &reason {
                    error!(failures, budget, "contract calls keep failing");
                }
                CycleOutcome::Stopped(reason)
            }
        }
    }

    /// Scan the inventory and transfer each recipient's allocation.
    ///
    /// Recipients are served in configured order. The first failure ends the
    /// cycle; recipients after it are not processed.
    #[instrument(skip_all)]
    pub fn run_cycle(&self, state: &mut RunState) -> Result<CycleReport, CycleError> {
        state.reset_before_scan();
        info!("scanning inventory");
        let records = self.scanner.scan(&self.config.account)?;
        let mut pools = CategoryPools::partition(&records);
        info!(pools = %pools.summary(), "inventory scanned");

        let mut report = CycleReport::default();
        for quota in &self.config.recipients {
            let allocation = allocate_recipient(quota, &mut pools);
            for line in &allocation.lines {
                if line.shortfall() > 0 {
                    warn!(
                        recipient = %allocation.recipient,
                        category = line.category,
                        requested = line.requested,
                        available = line.taken,
                        "not enough inventory, transferring what remains"
                    );
                } else {
                    info!(
                        recipient = %allocation.recipient,
                        category = line.category,
                        count = line.taken,
                        "allocated"
                    );
                }
            }
            let recipient = allocation.recipient.clone();
            let Some(batch) = allocation.into_batch() else {
                info!(%recipient, "nothing to transfer");
                report.skipped.push(recipient);
                continue;
            };
            let receipt = self.transfer(&batch, state)?;
            report.transfers.push(receipt);
            thread::sleep(self.config.timing.transfer_pause());
        }
        Ok(report)
    }

    fn transfer(
        &self,
        batch: &TransferBatch,
        state: &mut RunState,
    ) -> Result<TransferReceipt, CycleError> {
        info!(recipient = %batch.recipient, assets = batch.asset_ids.len(), "transferring");
        let action = transfer_action(&self.config.account, batch)?;
        let transaction = Transaction::new(vec![action], Utc::now());
        match self.submitter.submit(&transaction)? {
            PushOutcome::Accepted { transaction_id } => {
                state.transfers_succeeded += 1;
                info!(recipient = %batch.recipient, %transaction_id, "transfer complete");
                thread::sleep(self.config.timing.success_pause());
                Ok(TransferReceipt {
                    recipient: batch.recipient.clone(),
                    asset_count: batch.asset_ids.len(),
                    transaction_id,
                })
            }
            PushOutcome::Rejected { reason } => {
                state.transfers_failed += 1;
                match billable_diagnostic(&reason) {
                    Some(hint) => error!(%reason, hint, "transfer rejected"),
                    None => error!(%reason, "transfer rejected"),
                }
                Err(classify_broadcast_failure(
                    &reason,
                    self.config.retry.max_contract_retries,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ContractFailureKind;
    use crate::test_support::{
        ScriptedChain, ScriptedScanner, actor_key, quota, record, test_config,
    };

    fn courier(
        records: Vec<crate::core::types::AssetRecord>,
        chain: ScriptedChain,
        recipients: Vec<crate::core::types::RecipientQuota>,
    ) -> Courier<ScriptedScanner, ScriptedChain> {
        Courier::new(
            test_config(recipients),
            ScriptedScanner::fixed(records),
            TransactionSubmitter::new(chain, actor_key(), None),
        )
    }

    fn barley(count: usize) -> Vec<crate::core::types::AssetRecord> {
        (0..count).map(|i| record(&i.to_string(), "318606")).collect()
    }

    #[test]
    fn cycle_transfers_in_priority_order() {
        let courier = courier(
            barley(5),
            ScriptedChain::accepting(),
            vec![
                quota("bob.wam", &[("barley", 3)]),
                quota("carol.wam", &[("barley", 4)]),
            ],
        );
        let mut state = RunState::default();

        let report = courier.run_cycle(&mut state).expect("cycle");

        assert_eq!(report.transfers.len(), 2);
        assert_eq!(report.transfers[0].asset_count, 3);
        assert_eq!(report.transfers[1].asset_count, 2);
        assert_eq!(state.transfers_succeeded, 2);
        let encoded = courier.submitter().chain().encoded_args();
        assert_eq!(encoded[0]["asset_ids"], serde_json::json!(["0", "1", "2"]));
        assert_eq!(encoded[1]["asset_ids"], serde_json::json!(["3", "4"]));
    }

    #[test]
    fn empty_allocation_skips_broadcast() {
        let courier = courier(
            barley(1),
            ScriptedChain::accepting(),
            vec![
                quota("bob.wam", &[("corn", 2)]),
                quota("carol.wam", &[("barley", 1)]),
            ],
        );
        let mut state = RunState::default();

        let report = courier.run_cycle(&mut state).expect("cycle");

        assert_eq!(report.skipped, vec!["bob.wam"]);
        assert_eq!(
            courier.submitter().chain().broadcast_recipients(),
            vec!["carol.wam"]
        );
    }

    #[test]
    fn rejection_stops_remaining_recipients_and_is_classified() {
        let chain = ScriptedChain::new(vec![PushOutcome::Rejected {
            reason: "500: assertion failure".to_string(),
        }]);
        let courier = courier(
            barley(4),
            chain,
            vec![
                quota("bob.wam", &[("barley", 2)]),
                quota("carol.wam", &[("barley", 2)]),
            ],
        );
        let mut state = RunState::default();

        let err = courier.run_cycle(&mut state).unwrap_err();

        assert!(matches!(
            err,
            CycleError::Contract {
                kind: ContractFailureKind::Contract,
                ..
            }
        ));
        assert_eq!(state.transfers_failed, 1);
        assert_eq!(courier.submitter().chain().pushed().len(), 1);
    }

    #[test]
    fn scan_failure_cools_down_without_counting() {
        let courier = Courier::new(
            test_config(vec![quota("bob.wam", &[("barley", 1)])]),
            ScriptedScanner::new(vec![Err("index unreachable".to_string())]),
            TransactionSubmitter::new(ScriptedChain::accepting(), actor_key(), None),
        );
        let mut state = RunState::default();

        let outcome = courier.scan_all(&mut state);

        assert_eq!(outcome, CycleOutcome::Cooldown);
        assert_eq!(state.consecutive_contract_errors, 0);
        assert!(state.next_scan_at.is_some());
    }

    #[test]
    fn self_transfer_stops_before_later_recipients() {
        let courier = courier(
            barley(2),
            ScriptedChain::accepting(),
            vec![
                quota("alice.wam", &[("barley", 1)]),
                quota("bob.wam", &[("barley", 1)]),
            ],
        );
        let mut state = RunState::default();

        let outcome = courier.scan_all(&mut state);

        assert_eq!(outcome, CycleOutcome::Stopped(StopReason::Unrecoverable));
        assert!(courier.submitter().chain().encoded_args().is_empty());
        assert!(courier.submitter().chain().pushed().is_empty());
        assert_eq!(state.transfers_succeeded, 0);
    }

    #[test]
    fn oversized_interval_schedules_without_panicking() {
        let mut config = test_config(vec![quota("bob.wam", &[("barley", 1)])]);
        config.timing.scan_interval_secs = 10_000_000_000_000;
        let courier = Courier::new(
            config,
            ScriptedScanner::fixed(barley(1)),
            TransactionSubmitter::new(ScriptedChain::accepting(), actor_key(), None),
        );
        let mut state = RunState::default();

        let outcome = courier.scan_all(&mut state);

        assert!(matches!(outcome, CycleOutcome::Completed(_)));
        assert!(state.next_scan_at.is_some());
    }
}
