//! Greedy, priority-ordered allocation of scanned assets to recipients.
//!
//! Pools are partitioned from one inventory scan and then consumed in a single
//! pass: earlier recipients have strictly higher claim on scarce inventory, and
//! each pool is drained from its front.

use std::collections::HashSet;

use crate::core::registry::{CATEGORIES, by_template};
use crate::core::types::{AssetPool, AssetRecord, RecipientQuota, TransferBatch};

/// Per-category pools for one scan cycle, in registry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPools {
    pools: Vec<AssetPool>,
}

impl CategoryPools {
    /// Group records by category. Records with unknown or missing template
    /// ids are dropped. Duplicate asset ids are kept once.
    pub fn partition(records: &[AssetRecord]) -> Self {
        let mut pools: Vec<AssetPool> = CATEGORIES.iter().map(AssetPool::new).collect();
        let mut seen = HashSet::new();
        for record in records {
            let Some(category) = record.template_id().and_then(by_template) else {
                continue;
            };
            let Some(pool) = pools
                .iter_mut()
                .find(|pool| pool.category.name == category.name)
            else {
                continue;
            };
            if !seen.insert(record.asset_id.as_str()) {
                continue;
            }
            pool.push(record.asset_id.clone());
        }
        Self { pools }
    }

    pub fn get(&self, name: &str) -> Option<&AssetPool> {
        self.pools.iter().find(|pool| pool.category.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetPool> {
        self.pools.iter()
    }

    /// Pool sizes as `name=count` pairs, for logs.
    pub fn summary(&self) -> String {
        self.pools
            .iter()
            .map(|pool| format!("{}={}", pool.category.name, pool.len()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How one category of one recipient's quota was served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationLine {
    pub category: &'static str,
    pub requested: i64,
    pub taken: usize,
}

impl AllocationLine {
    /// Requested items the pool could not provide.
    pub fn shortfall(&self) -> usize {
        usize::try_from(self.requested)
            .unwrap_or(0)
            .saturating_sub(self.taken)
    }
}

/// Result of allocating against one recipient's quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub recipient: String,
    /// Only categories with a positive request appear here.
    pub lines: Vec<AllocationLine>,
    pub asset_ids: Vec<String>,
}

impl Allocation {
    /// `None` when nothing was allocated: no transfer is attempted.
    pub fn into_batch(self) -> Option<TransferBatch> {
        if self.asset_ids.is_empty() {
            return None;
        }
        Some(TransferBatch {
            recipient: self.recipient,
            asset_ids: self.asset_ids,
        })
    }
}

/// Allocate pools to recipients in configured order.
///
/// For every category with a positive request, take `min(request, remaining)`
/// ids from the front of that category's pool. Ids are concatenated in
/// registry order.
pub fn allocate(quotas: &[RecipientQuota], pools: &mut CategoryPools) -> Vec<Allocation> {
    quotas
        .iter()
        .map(|quota| allocate_recipient(quota, pools))
        .collect()
}

/// Non-empty batches only, in recipient order.
pub fn plan_batches(quotas: &[RecipientQuota], pools: &mut CategoryPools) -> Vec<TransferBatch> {
    allocate(quotas, pools)
        .into_iter()
        .filter_map(Allocation::into_batch)
        .collect()
}

/// Allocate one recipient's quota from what is left in `pools`.
pub fn allocate_recipient(quota: &RecipientQuota, pools: &mut CategoryPools) -> Allocation {
    let mut lines = Vec::new();
    let mut asset_ids = Vec::new();
    for pool in &mut pools.pools {
        let requested = quota.requested(pool.category);
        if requested <= 0 {
            continue;
        }
        let wanted = usize::try_from(requested).unwrap_or(usize::MAX);
        let taken = pool.take_front(wanted);
        lines.push(AllocationLine {
            category: pool.category.name,
            requested,
            taken: taken.len(),
        });
        asset_ids.extend(taken);
    }
    Allocation {
        recipient: quota.account.clone(),
        lines,
        asset_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TemplateRef;
    use std::collections::{BTreeMap, HashSet};

    fn record(asset_id: &str, template_id: &str) -> AssetRecord {
        AssetRecord {
            asset_id: asset_id.to_string(),
            template: Some(TemplateRef {
                template_id: template_id.to_string(),
            }),
        }
    }

    fn quota(account: &str, entries: &[(&str, i64)]) -> RecipientQuota {
        RecipientQuota {
            account: account.to_string(),
            quota: entries
                .iter()
                .map(|(name, count)| (name.to_string(), *count))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn barley_pool(count: usize) -> CategoryPools {
        let records: Vec<AssetRecord> = (0..count)
            .map(|i| record(&i.to_string(), "318606"))
            .collect();
        CategoryPools::partition(&records)
    }

    #[test]
    fn partition_groups_by_template_and_drops_unknown() {
        let records = vec![
            record("10", "318606"),
            record("11", "318607"),
            record("12", "000000"),
            AssetRecord {
                asset_id: "13".to_string(),
                template: None,
            },
            record("14", "318606"),
        ];
        let pools = CategoryPools::partition(&records);
        let barley: Vec<&str> = pools.get("barley").expect("barley").ids().collect();
        assert_eq!(barley, vec!["10", "14"]);
        assert_eq!(pools.get("corn").expect("corn").len(), 1);
        let total: usize = pools.iter().map(AssetPool::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn partition_keeps_duplicate_ids_once() {
        let records = vec![record("10", "318606"), record("10", "318606")];
        let pools = CategoryPools::partition(&records);
        assert_eq!(pools.get("barley").expect("barley").len(), 1);
    }

    #[test]
    fn earlier_recipient_wins_scarce_inventory() {
        let mut pools = barley_pool(5);
        let quotas = vec![
            quota("alice", &[("barley", 3)]),
            quota("bob", &[("barley", 4)]),
        ];

        let allocations = allocate(&quotas, &mut pools);

        assert_eq!(allocations[0].asset_ids, vec!["0", "1", "2"]);
        assert_eq!(allocations[1].asset_ids, vec!["3", "4"]);
        assert_eq!(allocations[1].lines[0].shortfall(), 2);
        assert!(pools.get("barley").expect("barley").is_empty());
    }

    #[test]
    fn zero_and_negative_quotas_take_nothing() {
        let mut pools = barley_pool(3);
        let quotas = vec![
            quota("alice", &[("barley", 0)]),
            quota("bob", &[("barley", -2)]),
        ];

        let allocations = allocate(&quotas, &mut pools);

        assert!(allocations.iter().all(|a| a.asset_ids.is_empty()));
        assert!(allocations.iter().all(|a| a.lines.is_empty()));
        assert_eq!(pools.get("barley").expect("barley").len(), 3);
    }

    #[test]
    fn batches_follow_registry_order_not_quota_order() {
        let records = vec![
            record("c1", "298596"),
            record("b1", "318606"),
            record("m1", "298593"),
        ];
        let mut pools = CategoryPools::partition(&records);
        let quotas = vec![quota(
            "alice",
            &[("cornseed", 1), ("milk", 1), ("barley", 1)],
        )];

        let batches = plan_batches(&quotas, &mut pools);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].asset_ids, vec!["b1", "m1", "c1"]);
    }

    #[test]
    fn empty_allocations_emit_no_batch() {
        let mut pools = barley_pool(1);
        let quotas = vec![
            quota("alice", &[("barley", 1)]),
            quota("bob", &[("barley", 1)]),
            quota("carol", &[("corn", 2)]),
        ];

        let batches = plan_batches(&quotas, &mut pools);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].recipient, "alice");
    }

    #[test]
    fn allocation_conserves_pools_and_never_duplicates() {
        let records: Vec<AssetRecord> = (0..7)
            .map(|i| record(&format!("b{i}"), "318606"))
            .chain((0..4).map(|i| record(&format!("c{i}"), "318607")))
            .collect();
        let mut pools = CategoryPools::partition(&records);
        let quotas = vec![
            quota("a", &[("barley", 2), ("corn", 3)]),
            quota("b", &[("barley", 4), ("corn", 3)]),
            quota("c", &[("barley", 9)]),
        ];

        let batches = plan_batches(&quotas, &mut pools);

        let mut seen = HashSet::new();
        for batch in &batches {
            for id in &batch.asset_ids {
                assert!(seen.insert(id.clone()), "duplicate id {id}");
            }
        }
        let barley = seen.iter().filter(|id| id.starts_with('b')).count();
        let corn = seen.iter().filter(|id| id.starts_with('c')).count();
        assert_eq!(barley, 7);
        assert_eq!(corn, 4);
        assert!(pools.iter().all(AssetPool::is_empty));
    }
}
