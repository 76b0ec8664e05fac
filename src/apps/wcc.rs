//! Weakly-connected components
//! ---------------------------
//! Min-label propagation: every vertex starts labeled with its own global id
//! and repeatedly adopts the smallest label among its neighbors, edges taken
//! in both directions. Labels only decrease, so the engine's monotone-kernel
//! contract holds and the fixpoint is deterministic.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::engine::app::{BorderSnapshot, PieProgram};
use crate::engine::frontier::{edge_map, vertex_map, EdgeDir, Frontier, Visited};
use crate::engine::message::MessageManager;
use crate::engine::runner::TaskRunner;
use crate::graph::csr::{CsrFragment, VertexInfo};

pub struct WccProgram;

fn check(u: &VertexInfo<'_>, v: &VertexInfo<'_>) -> bool {
    u.vdata() < v.vdata()
}

fn update(u: &VertexInfo<'_>, v: &VertexInfo<'_>) -> bool {
    let label = u.vdata();
    v.fetch_min_vdata(label) > label
}

impl WccProgram {
    /// Full label sweeps over both adjacency directions until a sweep changes
    /// nothing. Each sweep gets a fresh dedupe array so a vertex may keep
    /// shrinking across sweeps; `touched` accumulates every vertex that
    /// changed at least once in this pass.
    fn propagate(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        touched: &Arc<Visited>,
    ) -> Result<()> {
        loop {
            let sweep = Arc::new(Visited::new(frag.num_vertexes));
            let mut changed = false;
            for dir in [EdgeDir::Out, EdgeDir::In] {
                let out =
                    edge_map(frag, Frontier::full(frag), &sweep, runner, dir, check, update)?;
                changed |= !out.is_empty();
            }
            touched.merge(&sweep);
            if !changed {
                return Ok(());
            }
        }
    }
}

impl PieProgram for WccProgram {
    fn peval(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        msgs: &MessageManager,
    ) -> Result<bool> {
        let n = frag.num_vertexes;
        let seed = frag.clone();
        runner.parallel_for(0..n, 0, move |r| {
            for i in r {
                seed.vertex_by_index(i).set_vdata(seed.global_by_index(i));
            }
        })?;
        // Every vertex picked up a label, so every seam value is news.
        let touched = Arc::new(Visited::new(n));
        for i in 0..n {
            touched.set(i);
        }
        self.propagate(frag, runner, &touched)?;
        Ok(msgs.update_border_vertexes(frag, &touched))
    }

    fn inceval(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        msgs: &MessageManager,
        border: Arc<BorderSnapshot>,
    ) -> Result<bool> {
        let touched = Arc::new(Visited::new(frag.num_vertexes));
        let pulled = vertex_map(
            frag,
            Frontier::full(frag),
            &touched,
            runner,
            move |g: &CsrFragment, u: &VertexInfo<'_>| pull_min_label(g, u, &border),
        )?;
        if pulled.is_empty() {
            debug!(target: "gravel", gid = frag.gid, "border labels offer no improvement; discarding");
            return Ok(false);
        }
        self.propagate(frag, runner, &touched)?;
        Ok(msgs.update_border_vertexes(frag, &touched))
    }
}

/// Pull step: adopt the smallest border label among non-resident neighbors,
/// looking along both edge directions.
fn pull_min_label(frag: &CsrFragment, u: &VertexInfo<'_>, border: &BorderSnapshot) -> bool {
    let mut best = u.vdata();
    for &e in u.in_edges.iter().chain(u.out_edges.iter()) {
        if frag.local_index(e).is_none() {
            if let Some(&label) = border.get(&e) {
                best = best.min(label);
            }
        }
    }
    if best < u.vdata() {
        u.fetch_min_vdata(best);
        true
    } else {
        false
    }
}

#[cfg(test)]
#[path = "wcc_tests.rs"]
mod wcc_tests;
