//! Accumulated delete intents and their flush into the registry.

use std::collections::HashMap;
use std::ops::AddAssign;

use metrics::{counter, gauge};
use tracing::{debug, error, warn};

use crate::domain::entities::DeleteItem;
use crate::domain::repositories::UrlRegistry;

/// Outcome counters of one or more flushes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    /// Flushes that had at least one item.
    pub flushes: usize,
    /// Successful `delete_batch` calls.
    pub owners: usize,
    /// Items handed to the registry successfully.
    pub applied: usize,
    /// Items discarded because the registry call failed or had no owner.
    pub dropped: usize,
}

impl AddAssign for FlushSummary {
    fn add_assign(&mut self, other: Self) {
        self.flushes += other.flushes;
        self.owners += other.owners;
        self.applied += other.applied;
        self.dropped += other.dropped;
    }
}

/// Batch buffer owned by the pipeline coordinator.
///
/// Not synchronised: only the coordinator task touches it, so a flush can never
/// overlap with a push. No deduplication is done across tasks; the registry's
/// delete is idempotent.
#[derive(Debug, Default)]
pub struct DeleteBatch {
    items: Vec<DeleteItem>,
}

impl DeleteBatch {
    pub fn push(&mut self, item: DeleteItem) {
        self.items.push(item);
        gauge!("deletion_batch_pending").set(self.items.len() as f64);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drains the buffer into one alias list per owner, owners in first-seen order.
    fn take_grouped(&mut self) -> Vec<(String, Vec<String>)> {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for item in self.items.drain(..) {
            match positions.get(&item.owner_id) {
                Some(&pos) => groups[pos].1.push(item.alias),
                None => {
                    positions.insert(item.owner_id.clone(), groups.len());
                    groups.push((item.owner_id, vec![item.alias]));
                }
            }
        }

        groups
    }

    /// Applies the buffered intents with one `delete_batch` call per distinct
    /// owner, then clears the buffer.
    ///
    /// A failed call is logged and that owner's items are discarded; nothing is
    /// retried.
    pub async fn flush(&mut self, registry: &dyn UrlRegistry) -> FlushSummary {
        let mut summary = FlushSummary::default();
        if self.is_empty() {
            return summary;
        }

        summary.flushes = 1;
        for (owner_id, aliases) in self.take_grouped() {
            if owner_id.is_empty() {
                warn!(aliases = aliases.len(), "Dropping delete intents without owner");
                summary.dropped += aliases.len();
                continue;
            }

            match registry.delete_batch(&owner_id, &aliases).await {
                Ok(()) => {
                    debug!(owner_id = %owner_id, aliases = aliases.len(), "Deletions flushed");
                    summary.owners += 1;
                    summary.applied += aliases.len();
                }
                Err(e) => {
                    error!(
                        owner_id = %owner_id,
                        aliases = aliases.len(),
                        "Failed to flush deletions, batch dropped: {}",
                        e
                    );
                    counter!("deletion_flush_failures_total").increment(1);
                    summary.dropped += aliases.len();
                }
            }
        }

        counter!("deletion_items_flushed_total").increment(summary.applied as u64);
        gauge!("deletion_batch_pending").set(0.0);
        summary
    }
}
