//! Breadth-first reachability
//! --------------------------
//! `vdata` is a mark: 0 = unvisited, 1 = reached from the root. `PEval` runs
//! only in the fragment holding the root; every other fragment stays quiet
//! until a border update arrives. `IncEval` pulls reached border vertices
//! from the snapshot, then pushes inside the fragment.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::engine::app::{BorderSnapshot, PieProgram};
use crate::engine::frontier::{edge_map, vertex_map, EdgeDir, Frontier, Visited};
use crate::engine::message::MessageManager;
use crate::engine::runner::TaskRunner;
use crate::graph::csr::{CsrFragment, VertexInfo};
use crate::graph::{Vdata, Vid, VID_MAX};

const REACHED: Vdata = 1;

pub struct BfsProgram {
    root_id: Vid,
}

impl BfsProgram {
    pub fn new(root_id: Vid) -> Self {
        Self { root_id }
    }

    fn expand(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        visited: &Arc<Visited>,
        mut frontier: Frontier,
    ) -> Result<()> {
        while !frontier.is_empty() {
            frontier = edge_map(frag, frontier, visited, runner, EdgeDir::Out, check, update)?;
        }
        Ok(())
    }
}

fn check(_u: &VertexInfo<'_>, v: &VertexInfo<'_>) -> bool {
    v.vdata() != REACHED
}

fn update(_u: &VertexInfo<'_>, v: &VertexInfo<'_>) -> bool {
    v.set_vdata(REACHED);
    true
}

impl PieProgram for BfsProgram {
    fn peval(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        msgs: &MessageManager,
    ) -> Result<bool> {
        let local = frag.globalid2localid(self.root_id);
        if local == VID_MAX {
            debug!(target: "gravel", gid = frag.gid, root = self.root_id, "root not resident; discarding");
            return Ok(false);
        }
        let visited = Arc::new(Visited::new(frag.num_vertexes));
        let frontier = Frontier::with_capacity(frag.num_vertexes + 1);
        if let Some(root) = frag.vertex_by_vid(local) {
            root.set_vdata(REACHED);
            visited.set(root.index);
            frontier.push(root.index);
        }
        self.expand(frag, runner, &visited, frontier)?;
        Ok(msgs.update_border_vertexes(frag, &visited))
    }

    fn inceval(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        msgs: &MessageManager,
        border: Arc<BorderSnapshot>,
    ) -> Result<bool> {
        let visited = Arc::new(Visited::new(frag.num_vertexes));
        let frontier = vertex_map(
            frag,
            Frontier::full(frag),
            &visited,
            runner,
            move |g: &CsrFragment, u: &VertexInfo<'_>| pull_reached(g, u, &border),
        )?;
        if frontier.is_empty() {
            debug!(target: "gravel", gid = frag.gid, "no border vertex reaches this fragment; discarding");
            return Ok(false);
        }
        self.expand(frag, runner, &visited, frontier)?;
        Ok(msgs.update_border_vertexes(frag, &visited))
    }
}

/// Pull step: an unvisited vertex with a reached border in-neighbor becomes
/// reached itself.
fn pull_reached(frag: &CsrFragment, u: &VertexInfo<'_>, border: &BorderSnapshot) -> bool {
    if u.vdata() == REACHED {
        return false;
    }
    let reached = u
        .in_edges
        .iter()
        .any(|&e| frag.local_index(e).is_none() && border.get(&e) == Some(&REACHED));
    if reached {
        u.set_vdata(REACHED);
    }
    reached
}

#[cfg(test)]
#[path = "bfs_tests.rs"]
mod bfs_tests;
