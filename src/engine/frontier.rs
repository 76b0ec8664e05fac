//! Frontier mechanics: VertexMap / EdgeMap
//! ---------------------------------------
//! A frontier is a bounded MPMC queue of vertex indexes feeding one parallel
//! map step. `edge_map` expands a frontier along adjacency under a user
//! predicate `C` and update `F`; `vertex_map` runs a per-vertex kernel
//! (optionally closed over auxiliary state such as a border snapshot). Both
//! partition the input across the task runner's workers and collect
//! activations into a fresh output frontier.
//!
//! `visited` is a byte-per-flag array owned by the enclosing evaluation pass.
//! Stores race benignly; the atomic swap in `test_and_set` keeps enqueues
//! at-most-once per pass.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::engine::runner::TaskRunner;
use crate::graph::csr::{CsrFragment, VertexInfo};

pub struct Visited {
    flags: Box<[AtomicU8]>,
}

impl Visited {
    pub fn new(n: usize) -> Self {
        Self { flags: (0..n).map(|_| AtomicU8::new(0)).collect() }
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        self.flags[i].load(Ordering::Relaxed) != 0
    }

    #[inline]
    pub fn set(&self, i: usize) {
        self.flags[i].store(1, Ordering::Relaxed)
    }

    /// Returns whether the flag was already set.
    #[inline]
    pub fn test_and_set(&self, i: usize) -> bool {
        self.flags[i].swap(1, Ordering::Relaxed) != 0
    }

    /// OR another array of the same length into this one.
    pub fn merge(&self, other: &Visited) {
        for (mine, theirs) in self.flags.iter().zip(other.flags.iter()) {
            if theirs.load(Ordering::Relaxed) != 0 {
                mine.store(1, Ordering::Relaxed);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Bounded MPMC queue of vertex indexes. Cheap to clone; clones share the
/// same queue.
#[derive(Clone)]
pub struct Frontier {
    tx: Sender<usize>,
    rx: Receiver<usize>,
}

impl Frontier {
    pub fn with_capacity(cap: usize) -> Self {
        let (tx, rx) = bounded(cap.max(1));
        Self { tx, rx }
    }

    /// Frontier pre-filled with every vertex of the fragment.
    pub fn full(frag: &CsrFragment) -> Self {
        let f = Self::with_capacity(frag.num_vertexes + 1);
        for i in 0..frag.num_vertexes {
            f.push(i);
        }
        f
    }

    #[inline]
    pub fn push(&self, index: usize) {
        // Capacity is sized to the fragment, and visited-dedupe keeps pushes
        // under it; blocking here would indicate a sizing bug upstream.
        let _ = self.tx.send(index);
    }

    #[inline]
    pub fn pop(&self) -> Option<usize> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    fn drain(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.rx.len());
        while let Ok(i) = self.rx.try_recv() {
            out.push(i);
        }
        out
    }
}

/// Which adjacency list `edge_map` walks from each frontier vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDir {
    Out,
    In,
}

/// Expand `frontier` one step: for each vertex `u` and each resident
/// neighbor `v` along `dir`, skip if `visited[v]`, test `check(u, v)`, then
/// apply `update(u, v)`; an update that reports progress marks `v` visited
/// and enqueues it onto the returned frontier. Non-resident (border) entries
/// are skipped here; they travel through the message manager instead.
pub fn edge_map<C, F>(
    frag: &Arc<CsrFragment>,
    frontier: Frontier,
    visited: &Arc<Visited>,
    runner: &TaskRunner,
    dir: EdgeDir,
    check: C,
    update: F,
) -> Result<Frontier>
where
    C: Fn(&VertexInfo<'_>, &VertexInfo<'_>) -> bool + Send + Sync + 'static,
    F: Fn(&VertexInfo<'_>, &VertexInfo<'_>) -> bool + Send + Sync + 'static,
{
    let input = frontier.drain();
    let out = Frontier::with_capacity(frag.num_vertexes + 1);
    if input.is_empty() {
        return Ok(out);
    }
    let input = Arc::new(input);
    let frag = frag.clone();
    let visited = visited.clone();
    let out_q = out.clone();
    runner.parallel_for(0..input.len(), 0, move |r| {
        for &u_idx in &input[r] {
            let u = frag.vertex_by_index(u_idx);
            let edges = match dir {
                EdgeDir::Out => u.out_edges,
                EdgeDir::In => u.in_edges,
            };
            for &e in edges {
                let Some(v_idx) = frag.local_index(e) else { continue };
                if visited.get(v_idx) {
                    continue;
                }
                let v = frag.vertex_by_index(v_idx);
                if !check(&u, &v) {
                    continue;
                }
                if update(&u, &v) && !visited.test_and_set(v_idx) {
                    out_q.push(v_idx);
                }
            }
        }
    })?;
    Ok(out)
}

/// Run `kernel` on every frontier vertex; a kernel that reports progress
/// marks the vertex visited and forwards it to the returned frontier. Used
/// for pull steps that synchronize a fragment against border state carried
/// in the kernel's captures.
pub fn vertex_map<K>(
    frag: &Arc<CsrFragment>,
    frontier: Frontier,
    visited: &Arc<Visited>,
    runner: &TaskRunner,
    kernel: K,
) -> Result<Frontier>
where
    K: Fn(&CsrFragment, &VertexInfo<'_>) -> bool + Send + Sync + 'static,
{
    let input = frontier.drain();
    let out = Frontier::with_capacity(frag.num_vertexes + 1);
    if input.is_empty() {
        return Ok(out);
    }
    let input = Arc::new(input);
    let frag = frag.clone();
    let visited = visited.clone();
    let out_q = out.clone();
    runner.parallel_for(0..input.len(), 0, move |r| {
        for &idx in &input[r] {
            let v = frag.vertex_by_index(idx);
            if kernel(&frag, &v) && !visited.test_and_set(idx) {
                out_q.push(idx);
            }
        }
    })?;
    Ok(out)
}

#[cfg(test)]
#[path = "frontier_tests.rs"]
mod frontier_tests;
