// src/application/service/locks.rs
// Per-aggregate async locks serializing writes to one order or deal

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::models::{DealId, OrderId};

const PRUNE_THRESHOLD: usize = 1024;

/// Variant order is the acquisition order: orders before deals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateKey {
    Order(OrderId),
    Deal(DealId),
}

/// Held locks; released on drop.
pub struct AggregateGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

#[derive(Default)]
pub struct AggregateLocks {
    slots: std::sync::Mutex<HashMap<AggregateKey, Arc<Mutex<()>>>>,
}

impl AggregateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: AggregateKey) -> AggregateGuard {
        self.lock_all(&[key]).await
    }

    /// Acquire several keys in canonical order, so two callers asking for
    /// overlapping sets cannot deadlock.
    pub async fn lock_all(&self, keys: &[AggregateKey]) -> AggregateGuard {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let slot = self.slot(key);
            guards.push(slot.lock_owned().await);
        }
        AggregateGuard { _guards: guards }
    }

    fn slot(&self, key: AggregateKey) -> Arc<Mutex<()>> {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slots.len() >= PRUNE_THRESHOLD {
            // Only the map holds an idle slot.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots.entry(key).or_default().clone()
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or_default()
    }
}
