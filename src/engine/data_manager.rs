//! Resident-fragment table. Keyed by gid; lock-free point insert/lookup and
//! point delete. Eviction drops the table entry only; workers holding an
//! `Arc` handle keep the fragment alive until their pass finishes, so frees
//! are naturally deferred.

use std::sync::Arc;

use dashmap::DashMap;

use crate::graph::csr::CsrFragment;
use crate::graph::Gid;

#[derive(Default)]
pub struct DataManager {
    resident: DashMap<Gid, Arc<CsrFragment>>,
}

impl DataManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, gid: Gid, fragment: Arc<CsrFragment>) {
        self.resident.insert(gid, fragment);
    }

    pub fn get(&self, gid: Gid) -> Option<Arc<CsrFragment>> {
        self.resident.get(&gid).map(|e| e.value().clone())
    }

    pub fn remove(&self, gid: Gid) {
        self.resident.remove(&gid);
    }

    pub fn contains(&self, gid: Gid) -> bool {
        self.resident.contains_key(&gid)
    }

    pub fn len(&self) -> usize {
        self.resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }
}
