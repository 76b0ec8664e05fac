//! Border-vertex message manager
//! -----------------------------
//! The only channel fragments communicate through. Two tables:
//!
//! * `border_vdata`: latest consensus value for each border vertex, keyed by
//!   global vid;
//! * `border_owners`: which fragments reference that vid and must be woken
//!   when its value changes.
//!
//! A fragment registers its border references once, on first load. After a
//! compute pass it publishes the values of its resident seam vertices; any
//! change marks the other owners dirty. The scheduler drains the dirty set
//! after discharges and re-enqueues those fragments. `IncEval` reads a
//! snapshot clone of `border_vdata`, so publications during a pass only
//! affect later epochs.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::engine::frontier::Visited;
use crate::graph::csr::CsrFragment;
use crate::graph::{Gid, Vdata, Vid};

const MAGIC_SEED: u32 = 0x5642474D; // 'MGBV'

#[derive(Default)]
pub struct MessageManager {
    border_vdata: DashMap<Vid, Vdata>,
    border_owners: DashMap<Vid, HashSet<Gid>>,
    dirty: Mutex<HashSet<Gid>>,
    registered: Mutex<HashSet<Gid>>,
}

impl MessageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record which border vids `frag` references. Idempotent per gid: only
    /// the first call for a fragment does work. If a referenced vid already
    /// carries a published value, the fragment missed that publication and is
    /// marked dirty so its next pass can pull it.
    pub fn register_fragment(&self, frag: &CsrFragment) {
        {
            let mut reg = self.registered.lock();
            if !reg.insert(frag.gid) {
                return;
            }
        }
        let border = frag.collect_border_vertexes();
        let mut missed = false;
        for (&vid, &gid) in &border {
            self.border_owners.entry(vid).or_default().insert(gid);
            if self.border_vdata.contains_key(&vid) {
                missed = true;
            }
        }
        if missed {
            self.dirty.lock().insert(frag.gid);
        }
        debug!(
            target: "gravel",
            gid = frag.gid,
            border_refs = border.len(),
            "registered border references"
        );
    }

    /// Publish the values of `frag`'s resident seam vertices touched in this
    /// pass. Returns true if any value changed (or appeared), after marking
    /// every other owning fragment dirty.
    pub fn update_border_vertexes(&self, frag: &CsrFragment, visited: &Visited) -> bool {
        let mut published = false;
        let mut woken: HashSet<Gid> = HashSet::new();
        for &i in frag.seam_indexes() {
            if !visited.get(i) {
                continue;
            }
            let vid = frag.global_by_index(i);
            let val = frag.vdata_load(i);
            let changed = match self.border_vdata.entry(vid) {
                Entry::Occupied(mut o) => {
                    if *o.get() != val {
                        o.insert(val);
                        true
                    } else {
                        false
                    }
                }
                Entry::Vacant(v) => {
                    v.insert(val);
                    true
                }
            };
            if changed {
                published = true;
                if let Some(owners) = self.border_owners.get(&vid) {
                    woken.extend(owners.iter().copied().filter(|&o| o != frag.gid));
                }
            }
        }
        if !woken.is_empty() {
            debug!(target: "gravel", gid = frag.gid, woken = woken.len(), "border updates published");
            self.dirty.lock().extend(woken);
        }
        published
    }

    /// Atomically take the set of fragments with unread border updates.
    pub fn drain_dirty(&self) -> HashSet<Gid> {
        std::mem::take(&mut *self.dirty.lock())
    }

    /// Read-only clone of the border values, taken once per IncEval pass.
    pub fn snapshot_vdata(&self) -> HashMap<Vid, Vdata> {
        self.border_vdata.iter().map(|e| (*e.key(), *e.value())).collect()
    }

    pub fn border_vertex_count(&self) -> usize {
        self.border_owners.len()
    }

    /// Seed `border_owners` from a precomputed `border_vertexes.bin`, when
    /// present. Returns the number of entries read.
    pub fn load_seed(&self, path: &Path) -> Result<usize> {
        if !path.is_file() {
            return Ok(0);
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("read border seed {}", path.display()))?;
        let entries = decode_seed(&bytes)?;
        for &(vid, gid) in &entries {
            self.border_owners.entry(vid).or_default().insert(gid);
        }
        Ok(entries.len())
    }
}

/// Write a border seed file: one `(global vid, gid)` record per border
/// reference. The partitioner emits this so the first incremental wave does
/// not wait on load-time scans.
pub fn write_seed(path: &Path, entries: &[(Vid, Gid)]) -> Result<()> {
    let mut buf = Vec::with_capacity(12 + entries.len() * 12);
    buf.extend_from_slice(&MAGIC_SEED.to_le_bytes());
    buf.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    for &(vid, gid) in entries {
        buf.extend_from_slice(&vid.to_le_bytes());
        buf.extend_from_slice(&gid.to_le_bytes());
    }
    std::fs::write(path, &buf).with_context(|| format!("write border seed {}", path.display()))
}

fn decode_seed(bytes: &[u8]) -> Result<Vec<(Vid, Gid)>> {
    if bytes.len() < 12 {
        return Err(anyhow!("border seed too small: {} bytes", bytes.len()));
    }
    let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != MAGIC_SEED {
        return Err(anyhow!("bad border seed magic"));
    }
    let count = u64::from_le_bytes([
        bytes[4], bytes[5], bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11],
    ]) as usize;
    let body = &bytes[12..];
    if body.len() != count * 12 {
        return Err(anyhow!("border seed length disagrees with header count {}", count));
    }
    let mut out = Vec::with_capacity(count);
    for rec in body.chunks_exact(12) {
        let vid = u64::from_le_bytes([
            rec[0], rec[1], rec[2], rec[3], rec[4], rec[5], rec[6], rec[7],
        ]);
        let gid = u32::from_le_bytes([rec[8], rec[9], rec[10], rec[11]]);
        out.push((vid, gid));
    }
    Ok(out)
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod message_tests;
