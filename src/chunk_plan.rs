use crate::{
    batch::Document,
    config::{Config, PartitionStrategy},
};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub document_count: usize,
    pub strategy: PartitionStrategy,
    pub assignments: Vec<WorkerAssignment>,
}

/// The documents one slot owns for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub slot: usize,
    pub device_id: u32,
    pub documents: Vec<Document>,
}

impl ChunkPlan {
    pub fn from_config(cfg: &Config, docs: &[Document]) -> Result<Self> {
        Self::partition(docs, &cfg.dispatch.device_ids, cfg.dispatch.partition)
    }

    /// Splits `docs` into one contiguous, order-preserving chunk per device.
    pub fn partition(
        docs: &[Document],
        device_ids: &[u32],
        strategy: PartitionStrategy,
    ) -> Result<ChunkPlan> {
        if device_ids.is_empty() {
            return Err(anyhow!("no worker devices configured"));
        }
        let unique: BTreeSet<u32> = device_ids.iter().copied().collect();
        if unique.len() != device_ids.len() {
            return Err(anyhow!(
                "device ids must be distinct, got {:?}",
                device_ids
            ));
        }

        let sizes = chunk_sizes(docs.len(), device_ids.len(), strategy);
        let mut assignments = Vec::with_capacity(device_ids.len());
        let mut start = 0usize;
        for (slot, (&device_id, size)) in device_ids.iter().zip(sizes).enumerate() {
            let end = start + size;
            assignments.push(WorkerAssignment {
                slot,
                device_id,
                documents: docs[start..end].to_vec(),
            });
            start = end;
        }

        Ok(ChunkPlan {
            document_count: docs.len(),
            strategy,
            assignments,
        })
    }

    pub fn active(&self) -> impl Iterator<Item = &WorkerAssignment> {
        self.assignments.iter().filter(|a| !a.documents.is_empty())
    }
}

fn chunk_sizes(n: usize, workers: usize, strategy: PartitionStrategy) -> Vec<usize> {
    match strategy {
        PartitionStrategy::Ceil => {
            let chunk = n.div_ceil(workers);
            let mut remaining = n;
            (0..workers)
                .map(|_| {
                    let take = chunk.min(remaining);
                    remaining -= take;
                    take
                })
                .collect()
        }
        PartitionStrategy::Balanced => {
            let base = n / workers;
            let extra = n % workers;
            (0..workers)
                .map(|i| base + usize::from(i < extra))
                .collect()
        }
    }
}
