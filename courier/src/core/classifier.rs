//! Classification of cycle failures into continue/stop decisions.
//!
//! Broadcast failures are mapped from the node's structured error codes when
//! the response carries them. Message substrings are only used to annotate
//! logs, never to change a decision.

use serde::Deserialize;

use crate::core::error::{ContractFailureKind, CycleError, RetryPolicy};
use crate::core::state::RunState;

/// Whether the run loop keeps going after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Continue,
    Stop,
}

/// Why a failure stopped the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    NotRetryable,
    RetryBudgetExhausted { failures: u32, budget: u32 },
    SessionInvalid,
    Unrecoverable,
}

/// Resolution of one failed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Keep running; the next scan waits for the cooldown.
    Cooldown,
    Stop(StopReason),
}

impl Decision {
    pub fn status(&self) -> Status {
        match self {
            Decision::Cooldown => Status::Continue,
            Decision::Stop(_) => Status::Stop,
        }
    }
}

/// Decide what a failed cycle means for the run.
///
/// Retryable contract failures advance the consecutive error counter and stop
/// once a bounded budget is reached. Unclassified errors cool down without
/// touching the counter.
pub fn decide(error: &CycleError, state: &mut RunState) -> Decision {
    match error {
        CycleError::Contract { policy, .. } => {
            if !policy.retryable {
                return Decision::Stop(StopReason::NotRetryable);
            }
            state.consecutive_contract_errors += 1;
            match policy.max_attempts {
                Some(budget) if state.consecutive_contract_errors >= budget => {
                    Decision::Stop(StopReason::RetryBudgetExhausted {
                        failures: state.consecutive_contract_errors,
                        budget,
                    })
                }
                _ => Decision::Cooldown,
            }
        }
        CycleError::SessionInvalid(_) => Decision::Stop(StopReason::SessionInvalid),
        CycleError::Unrecoverable(_) => Decision::Stop(StopReason::Unrecoverable),
        CycleError::Unclassified(_) => Decision::Cooldown,
    }
}

#[derive(Debug, Deserialize)]
struct NodeErrorEnvelope {
    error: NodeError,
}

/// Structured error body returned by the chain API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeError {
    pub code: i64,
    pub name: String,
    #[serde(default)]
    pub what: String,
    #[serde(default)]
    pub details: Vec<NodeErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeErrorDetail {
    #[serde(default)]
    pub message: String,
}

impl NodeError {
    fn describe(&self) -> String {
        let detail = self
            .details
            .first()
            .map(|detail| detail.message.as_str())
            .filter(|message| !message.is_empty());
        match detail {
            Some(detail) => format!("{} ({}): {}: {}", self.name, self.code, self.what, detail),
            None => format!("{} ({}): {}", self.name, self.code, self.what),
        }
    }
}

/// Parse the node's JSON error envelope out of a failure reason, if present.
pub fn parse_node_error(reason: &str) -> Option<NodeError> {
    let start = reason.find('{')?;
    serde_json::from_str::<NodeErrorEnvelope>(&reason[start..])
        .ok()
        .map(|envelope| envelope.error)
}

enum NodeErrorClass {
    Authorization,
    Contract(ContractFailureKind),
}

fn class_for_code(code: i64) -> NodeErrorClass {
    match code {
        3_090_000..=3_090_999 => NodeErrorClass::Authorization,
        3_010_000..=3_010_999 | 3_015_000..=3_015_999 => {
            NodeErrorClass::Contract(ContractFailureKind::Rejected)
        }
        // expired, too far in the future, bad reference block, duplicate
        3_040_005..=3_040_008 => NodeErrorClass::Contract(ContractFailureKind::Transient),
        3_080_000..=3_081_999 => NodeErrorClass::Contract(ContractFailureKind::ResourceExhausted),
        _ => NodeErrorClass::Contract(ContractFailureKind::Contract),
    }
}

/// Turn a rejected broadcast into a typed cycle error.
///
/// `contract_budget` bounds plain contract failures; `None` retries forever.
pub fn classify_broadcast_failure(reason: &str, contract_budget: Option<u32>) -> CycleError {
    let Some(node_error) = parse_node_error(reason) else {
        return CycleError::Contract {
            message: reason.to_string(),
            kind: ContractFailureKind::Contract,
            policy: contract_policy(contract_budget),
        };
    };
    let message = node_error.describe();
    match class_for_code(node_error.code) {
        NodeErrorClass::Authorization => CycleError::SessionInvalid(message),
        NodeErrorClass::Contract(kind) => {
            let policy = match kind {
                ContractFailureKind::Rejected => RetryPolicy::NEVER,
                ContractFailureKind::Transient | ContractFailureKind::ResourceExhausted => {
                    RetryPolicy::UNBOUNDED
                }
                ContractFailureKind::Contract => contract_policy(contract_budget),
            };
            CycleError::Contract {
                message,
                kind,
                policy,
            }
        }
    }
}

fn contract_policy(budget: Option<u32>) -> RetryPolicy {
    match budget {
        Some(budget) => RetryPolicy::bounded(budget),
        None => RetryPolicy::UNBOUNDED,
    }
}

/// Best-effort hint for CPU billing failures, which are usually false alarms
/// that clear on their own.
pub fn billable_diagnostic(reason: &str) -> Option<&'static str> {
    if reason.contains("estimated CPU time (0 us) is not less than the maximum billable CPU time") {
        return Some("cpu estimate reported as zero; usually transient, will retry");
    }
    if reason.contains("is greater than the maximum billable") {
        return Some("cpu over billable maximum; may need more stake, usually transient");
    }
    None
}
