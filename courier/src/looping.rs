//! Repeats scan cycles on their schedule until done, halted, or cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, info_span, warn};

use crate::core::classifier::StopReason;
use crate::core::state::RunState;
use crate::cycle::{Courier, CycleOutcome};
use crate::io::chain::ChainApi;
use crate::io::scanner::InventoryScanner;

const CANCEL_POLL: Duration = Duration::from_secs(1);

/// How many cycles `run_loop` may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Cycles(u32),
    UntilCancelled,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Cycles(1)
    }
}

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// A cycle ended with `Stop`; the operator must intervene before restarting.
    Halted { reason: StopReason },
    /// The scheduled number of cycles ran.
    Completed,
    /// The cancel flag was raised.
    Cancelled,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub cycles_run: u32,
    pub stop: LoopStop,
    pub state: RunState,
}

/// Run cycles until the schedule is exhausted, a cycle stops the run, or
/// `cancel` is raised. Between cycles this waits for `RunState.next_scan_at`.
pub fn run_loop<S: InventoryScanner, C: ChainApi>(
    courier: &Courier<S, C>,
    schedule: Schedule,
    cancel: &AtomicBool,
) -> LoopOutcome {
    let span = info_span!("courier", account = %courier.config().account);
    let _guard = span.enter();

    courier.start();
    let mut state = RunState::default();
    let mut cycles_run = 0u32;
    loop {
        if matches!(schedule, Schedule::Cycles(limit) if cycles_run >= limit) {
            return finish(cycles_run, LoopStop::Completed, state);
        }
        if !wait_for_next_scan(&state, cancel) {
            return finish(cycles_run, LoopStop::Cancelled, state);
        }

        cycles_run += 1;
        info!(cycle = cycles_run, "starting cycle");
        if let CycleOutcome::Stopped(reason) = courier.scan_all(&mut state) {
            warn!(?reason, "run halted; inspect the logs and restart manually");
            return finish(cycles_run, LoopStop::Halted { reason }, state);
        }
    }
}

fn finish(cycles_run: u32, stop: LoopStop, state: RunState) -> LoopOutcome {
    info!(
        cycles_run,
        ?stop,
        succeeded = state.transfers_succeeded,
        failed = state.transfers_failed,
        "loop finished"
    );
    LoopOutcome {
        cycles_run,
        stop,
        state,
    }
}

/// Sleep until the next scan is due. Returns `false` if cancelled first.
fn wait_for_next_scan(state: &RunState, cancel: &AtomicBool) -> bool {
    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let remaining = state.wait_before_scan(Utc::now());
        let Ok(remaining) = remaining.to_std() else {
            return true;
        };
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(CANCEL_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AssetRecord;
    use crate::io::chain::PushOutcome;
    use crate::io::submitter::TransactionSubmitter;
    use crate::test_support::{
        ScriptedChain, ScriptedScanner, actor_key, quota, record, test_config,
    };

    fn courier(
        scanner: ScriptedScanner,
        chain: ScriptedChain,
    ) -> Courier<ScriptedScanner, ScriptedChain> {
        Courier::new(
            test_config(vec![quota("bob.wam", &[("barley", 1)])]),
            scanner,
            TransactionSubmitter::new(chain, actor_key(), None),
        )
    }

    fn inventory() -> Vec<AssetRecord> {
        vec![record("1", "318606"), record("2", "318606")]
    }

    #[test]
    fn default_schedule_runs_a_single_cycle() {
        let courier = courier(
            ScriptedScanner::fixed(inventory()),
            ScriptedChain::accepting(),
        );
        let cancel = AtomicBool::new(false);

        let outcome = run_loop(&courier, Schedule::default(), &cancel);

        assert_eq!(outcome.cycles_run, 1);
        assert_eq!(outcome.stop, LoopStop::Completed);
        assert_eq!(outcome.state.transfers_succeeded, 1);
        assert_eq!(courier.scanner().calls(), 1);
    }

    #[test]
    fn raised_cancel_flag_stops_before_scanning() {
        let courier = courier(
            ScriptedScanner::fixed(inventory()),
            ScriptedChain::accepting(),
        );
        let cancel = AtomicBool::new(true);

        let outcome = run_loop(&courier, Schedule::UntilCancelled, &cancel);

        assert_eq!(outcome.cycles_run, 0);
        assert_eq!(outcome.stop, LoopStop::Cancelled);
        assert_eq!(courier.scanner().calls(), 0);
    }

    #[test]
    fn session_failure_halts_the_loop() {
        let chain = ScriptedChain::new(vec![PushOutcome::Rejected {
            reason: r#"{"code":500,"error":{"code":3090003,"name":"unsatisfied_authorization","what":"Provided keys, permissions, and delays do not satisfy declared authorizations"}}"#
                .to_string(),
        }]);
        let courier = courier(ScriptedScanner::fixed(inventory()), chain);
        let cancel = AtomicBool::new(false);

        let outcome = run_loop(&courier, Schedule::Cycles(5), &cancel);

        assert_eq!(outcome.cycles_run, 1);
        assert_eq!(
            outcome.stop,
            LoopStop::Halted {
                reason: StopReason::SessionInvalid
            }
        );
    }

    #[test]
    fn wait_returns_immediately_when_due() {
        let state = RunState::default();
        assert!(wait_for_next_scan(&state, &AtomicBool::new(false)));
    }
}
