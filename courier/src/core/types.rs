//! Shared data model for the allocation and transaction pipeline.
//!
//! These types are plain values: the planner consumes pools, the builder turns
//! batches into actions, and the submitter packs transactions for the wire.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::registry::Category;

/// Transactions expire this long after they are built.
pub const TRANSACTION_LIFETIME_SECS: i64 = 60;

/// One asset as reported by the asset index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetRecord {
    pub asset_id: String,
    /// Assets minted without a template carry `null` here.
    #[serde(default)]
    pub template: Option<TemplateRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateRef {
    pub template_id: String,
}

impl AssetRecord {
    pub fn template_id(&self) -> Option<&str> {
        self.template
            .as_ref()
            .map(|template| template.template_id.as_str())
    }
}

/// Not-yet-allocated asset ids of one category, in scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPool {
    pub category: &'static Category,
    ids: VecDeque<String>,
}

impl AssetPool {
    pub fn new(category: &'static Category) -> Self {
        Self {
            category,
            ids: VecDeque::new(),
        }
    }

    pub fn push(&mut self, asset_id: String) {
        self.ids.push_back(asset_id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Remove up to `count` ids from the front of the pool.
    pub fn take_front(&mut self, count: usize) -> Vec<String> {
        let count = count.min(self.ids.len());
        self.ids.drain(..count).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

/// Ordered quota for one recipient: category name to requested count.
///
/// Zero or negative counts mean "none of this category".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientQuota {
    pub account: String,
    #[serde(default)]
    pub quota: BTreeMap<String, i64>,
}

impl RecipientQuota {
    pub fn requested(&self, category: &Category) -> i64 {
        self.quota.get(category.name).copied().unwrap_or(0)
    }
}

/// Asset ids allocated to one recipient in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferBatch {
    pub recipient: String,
    pub asset_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub actor: String,
    pub permission: String,
}

impl Authorization {
    pub fn active(actor: &str) -> Self {
        Self {
            actor: actor.to_string(),
            permission: "active".to_string(),
        }
    }
}

/// Action arguments before and after binary encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionData {
    /// JSON-shaped arguments, as the ABI describes them.
    Args(Value),
    /// ABI-encoded bytes returned by the node.
    Packed(Vec<u8>),
}

/// One contract invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub account: String,
    pub name: String,
    pub authorization: Vec<Authorization>,
    pub data: ActionData,
}

/// Ordered actions plus an expiration fixed when the transaction is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub actions: Vec<Action>,
    pub expiration: DateTime<Utc>,
}

impl Transaction {
    pub fn new(actions: Vec<Action>, built_at: DateTime<Utc>) -> Self {
        Self {
            actions,
            expiration: built_at + TimeDelta::seconds(TRANSACTION_LIFETIME_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::CATEGORIES;
    use chrono::TimeZone;

    #[test]
    fn take_front_is_fifo_and_clamps_to_pool_size() {
        let mut pool = AssetPool::new(&CATEGORIES[0]);
        for id in ["1", "2", "3"] {
            pool.push(id.to_string());
        }
        assert_eq!(pool.take_front(2), vec!["1", "2"]);
        assert_eq!(pool.take_front(5), vec!["3"]);
        assert!(pool.is_empty());
    }

    #[test]
    fn expiration_is_sixty_seconds_after_build_time() {
        let built_at = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 30).unwrap();
        let tx = Transaction::new(Vec::new(), built_at);
        assert_eq!(
            tx.expiration,
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 30).unwrap()
        );
    }

    #[test]
    fn record_without_template_has_no_template_id() {
        let record: AssetRecord =
            serde_json::from_str(r#"{"asset_id":"1099","template":null}"#).expect("parse");
        assert_eq!(record.template_id(), None);
    }
}
