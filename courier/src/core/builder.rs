//! Turns allocated batches into contract actions.

use serde_json::json;

use crate::core::eosio::is_valid_name;
use crate::core::error::CycleError;
use crate::core::types::{Action, ActionData, Authorization, TransferBatch};

/// Contract that owns the collectible assets.
pub const ASSET_CONTRACT: &str = "atomicassets";
pub const TRANSFER_ACTION: &str = "transfer";
/// Memo attached to every transfer so recipients can tell where it came from.
pub const TRANSFER_MEMO: &str = "farm-courier";

/// One `transfer` action moving every id in `batch` from `from` to the batch's
/// recipient, authorized by `from@active`.
///
/// A batch addressed to the sender itself, or to a name the chain cannot
/// represent, can never succeed and is reported as unrecoverable.
pub fn transfer_action(from: &str, batch: &TransferBatch) -> Result<Action, CycleError> {
    if batch.recipient == from {
        return Err(CycleError::Unrecoverable(format!(
            "recipient {} is the sending account",
            batch.recipient
        )));
    }
    if !is_valid_name(&batch.recipient) {
        return Err(CycleError::Unrecoverable(format!(
            "recipient {:?} is not a valid account name",
            batch.recipient
        )));
    }
    Ok(Action {
        account: ASSET_CONTRACT.to_string(),
        name: TRANSFER_ACTION.to_string(),
        authorization: vec![Authorization::active(from)],
        data: ActionData::Args(json!({
            "from": from,
            "to": batch.recipient,
            "asset_ids": batch.asset_ids,
            "memo": TRANSFER_MEMO,
        })),
    })
}
