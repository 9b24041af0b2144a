//! Partitioning a batch by tenant.

use inventory_core::InventoryRecord;
use std::collections::HashMap;

/// Records of one tenant, in log order.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantPartition {
    pub tenant_id: String,
    pub records: Vec<InventoryRecord>,
}

/// Splits a batch into one partition per tenant.
///
/// Partitions come out in order of each tenant's first appearance; records
/// keep their batch order within a partition. An empty tenant ID is its
/// own bucket.
pub fn group_by_tenant(records: Vec<InventoryRecord>) -> Vec<TenantPartition> {
    let mut partitions: Vec<TenantPartition> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        match index.get(&record.tenant_id) {
            Some(&i) => partitions[i].records.push(record),
            None => {
                index.insert(record.tenant_id.clone(), partitions.len());
                partitions.push(TenantPartition {
                    tenant_id: record.tenant_id.clone(),
                    records: vec![record],
                });
            }
        }
    }

    partitions
}
