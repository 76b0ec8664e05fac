//! Immutable CSR fragments
//! -----------------------
//! One fragment of the partitioned graph, materialized in memory. Topology
//! arrays are written once at construction and read-only afterwards; only the
//! per-vertex `vdata` cells mutate during computation, through atomics so
//! compute kernels may race benignly under the monotone-update contract.
//!
//! Edge entries are in local-vid space. An entry that does not resolve to a
//! resident local vid is the global id of a vertex owned by some other
//! fragment; those entries are the fragment's border references.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{EngineError, EngineResult};
use crate::graph::{Gid, Vdata, Vid, VID_MAX};

/// Raw arrays of one fragment, as decoded from a CSR bundle or produced by a
/// partitioner. `localid2globalid` pairs are in index order.
#[derive(Debug, Clone, Default)]
pub struct CsrParts {
    pub gid: Gid,
    pub indegree: Vec<u64>,
    pub outdegree: Vec<u64>,
    pub in_offset: Vec<u64>,
    pub out_offset: Vec<u64>,
    pub in_edges: Vec<Vid>,
    pub out_edges: Vec<Vid>,
    pub vdata: Vec<Vdata>,
    pub localid2globalid: Vec<(Vid, Vid)>,
}

/// Borrowed view of one vertex inside a fragment. Never a copy; lifetime is
/// tied to the owning fragment. Use [`VertexInfo::to_owned_vertex`] when a
/// detached copy is genuinely needed.
pub struct VertexInfo<'a> {
    pub vid: Vid,
    pub index: usize,
    pub indegree: usize,
    pub outdegree: usize,
    pub in_edges: &'a [Vid],
    pub out_edges: &'a [Vid],
    vdata: &'a AtomicU64,
}

impl<'a> VertexInfo<'a> {
    #[inline]
    pub fn vdata(&self) -> Vdata {
        self.vdata.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_vdata(&self, v: Vdata) {
        self.vdata.store(v, Ordering::Relaxed)
    }

    /// Monotone-decrease update; returns the previous value.
    #[inline]
    pub fn fetch_min_vdata(&self, v: Vdata) -> Vdata {
        self.vdata.fetch_min(v, Ordering::Relaxed)
    }

    pub fn to_owned_vertex(&self) -> OwnedVertex {
        OwnedVertex {
            vid: self.vid,
            indegree: self.indegree,
            outdegree: self.outdegree,
            in_edges: self.in_edges.to_vec(),
            out_edges: self.out_edges.to_vec(),
            vdata: self.vdata(),
        }
    }
}

/// Detached deep copy of a vertex, independent of the fragment's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedVertex {
    pub vid: Vid,
    pub indegree: usize,
    pub outdegree: usize,
    pub in_edges: Vec<Vid>,
    pub out_edges: Vec<Vid>,
    pub vdata: Vdata,
}

#[derive(Debug)]
pub struct CsrFragment {
    pub gid: Gid,
    pub num_vertexes: usize,
    pub sum_in_edges: usize,
    pub sum_out_edges: usize,
    vid_by_index: Box<[Vid]>,
    // Dense inverse of vid_by_index; holes are usize::MAX.
    index_by_vid: Box<[usize]>,
    globalid_by_index: Box<[Vid]>,
    indegree: Box<[u64]>,
    outdegree: Box<[u64]>,
    in_offset: Box<[u64]>,
    out_offset: Box<[u64]>,
    in_edges: Box<[Vid]>,
    out_edges: Box<[Vid]>,
    vdata: Box<[AtomicU64]>,
    map_localid2globalid: HashMap<Vid, Vid>,
    map_globalid2localid: HashMap<Vid, Vid>,
    // Indexes of resident vertices adjacent to at least one border reference.
    seam_indexes: Vec<usize>,
}

impl CsrFragment {
    /// Build a fragment from raw arrays, checking the structural invariants:
    /// offset deltas equal degrees, offsets start at zero, edge arrays match
    /// the degree sums and the vid<->index mapping is a bijection.
    pub fn from_parts(parts: CsrParts) -> EngineResult<Self> {
        let gid = parts.gid;
        let n = parts.localid2globalid.len();
        let bad = |detail: String| EngineError::IoBadFormat { gid: Some(gid), detail };

        if parts.indegree.len() != n
            || parts.outdegree.len() != n
            || parts.in_offset.len() != n
            || parts.out_offset.len() != n
            || parts.vdata.len() != n
        {
            return Err(bad(format!(
                "per-vertex array lengths disagree: n={} indegree={} outdegree={} in_offset={} out_offset={} vdata={}",
                n,
                parts.indegree.len(),
                parts.outdegree.len(),
                parts.in_offset.len(),
                parts.out_offset.len(),
                parts.vdata.len()
            )));
        }

        let sum_in = parts
            .indegree
            .iter()
            .try_fold(0u64, |acc, &d| acc.checked_add(d))
            .ok_or_else(|| bad("indegree sum overflows".into()))?;
        let sum_out = parts
            .outdegree
            .iter()
            .try_fold(0u64, |acc, &d| acc.checked_add(d))
            .ok_or_else(|| bad("outdegree sum overflows".into()))?;
        if parts.in_edges.len() as u64 != sum_in {
            return Err(bad(format!(
                "in_edges length {} != sum of indegrees {}",
                parts.in_edges.len(),
                sum_in
            )));
        }
        if parts.out_edges.len() as u64 != sum_out {
            return Err(bad(format!(
                "out_edges length {} != sum of outdegrees {}",
                parts.out_edges.len(),
                sum_out
            )));
        }

        // Offsets must be the prefix sums of the degree arrays.
        for i in 0..n {
            let (want_in, want_out) = if i == 0 {
                (0u64, 0u64)
            } else {
                (
                    parts.in_offset[i - 1] + parts.indegree[i - 1],
                    parts.out_offset[i - 1] + parts.outdegree[i - 1],
                )
            };
            if parts.in_offset[i] != want_in {
                return Err(bad(format!(
                    "in_offset[{}]={} but prefix sum of indegrees is {}",
                    i, parts.in_offset[i], want_in
                )));
            }
            if parts.out_offset[i] != want_out {
                return Err(bad(format!(
                    "out_offset[{}]={} but prefix sum of outdegrees is {}",
                    i, parts.out_offset[i], want_out
                )));
            }
        }

        let mut vid_by_index = Vec::with_capacity(n);
        let mut globalid_by_index = Vec::with_capacity(n);
        let mut map_l2g = HashMap::with_capacity(n);
        let mut map_g2l = HashMap::with_capacity(n);
        let max_local = parts.localid2globalid.iter().map(|&(l, _)| l).max().unwrap_or(0);
        // Local vids are compact per fragment.
        if n > 0 && max_local as usize >= n.saturating_mul(8).max(1024) {
            return Err(bad(format!("local vid {} out of range for {} vertexes", max_local, n)));
        }
        let mut index_by_vid = vec![usize::MAX; if n == 0 { 0 } else { max_local as usize + 1 }];
        for (i, &(local, global)) in parts.localid2globalid.iter().enumerate() {
            if index_by_vid[local as usize] != usize::MAX {
                return Err(bad(format!("duplicate local vid {}", local)));
            }
            index_by_vid[local as usize] = i;
            vid_by_index.push(local);
            globalid_by_index.push(global);
            if map_l2g.insert(local, global).is_some() || map_g2l.insert(global, local).is_some() {
                return Err(bad(format!("vid mapping not a bijection at local {} / global {}", local, global)));
            }
        }

        let vdata: Box<[AtomicU64]> = parts.vdata.into_iter().map(AtomicU64::new).collect();

        let mut frag = Self {
            gid,
            num_vertexes: n,
            sum_in_edges: sum_in as usize,
            sum_out_edges: sum_out as usize,
            vid_by_index: vid_by_index.into_boxed_slice(),
            index_by_vid: index_by_vid.into_boxed_slice(),
            globalid_by_index: globalid_by_index.into_boxed_slice(),
            indegree: parts.indegree.into_boxed_slice(),
            outdegree: parts.outdegree.into_boxed_slice(),
            in_offset: parts.in_offset.into_boxed_slice(),
            out_offset: parts.out_offset.into_boxed_slice(),
            in_edges: parts.in_edges.into_boxed_slice(),
            out_edges: parts.out_edges.into_boxed_slice(),
            vdata,
            map_localid2globalid: map_l2g,
            map_globalid2localid: map_g2l,
            seam_indexes: Vec::new(),
        };
        frag.seam_indexes = frag.find_seam_indexes();
        Ok(frag)
    }

    /// Resolve an edge entry to the index of a resident vertex, if it is one.
    #[inline]
    pub fn local_index(&self, vid: Vid) -> Option<usize> {
        let i = *self.index_by_vid.get(vid as usize)?;
        (i != usize::MAX).then_some(i)
    }

    pub fn vertex_by_index(&self, index: usize) -> VertexInfo<'_> {
        let a_in = self.in_offset[index] as usize;
        let a_out = self.out_offset[index] as usize;
        let d_in = self.indegree[index] as usize;
        let d_out = self.outdegree[index] as usize;
        VertexInfo {
            vid: self.vid_by_index[index],
            index,
            indegree: d_in,
            outdegree: d_out,
            in_edges: &self.in_edges[a_in..a_in + d_in],
            out_edges: &self.out_edges[a_out..a_out + d_out],
            vdata: &self.vdata[index],
        }
    }

    pub fn vertex_by_vid(&self, vid: Vid) -> Option<VertexInfo<'_>> {
        self.local_index(vid).map(|i| self.vertex_by_index(i))
    }

    pub fn globalid2localid(&self, global: Vid) -> Vid {
        self.map_globalid2localid.get(&global).copied().unwrap_or(VID_MAX)
    }

    pub fn localid2globalid(&self, local: Vid) -> Vid {
        match self.local_index(local) {
            Some(i) => self.globalid_by_index[i],
            None => self.map_localid2globalid.get(&local).copied().unwrap_or(VID_MAX),
        }
    }

    #[inline]
    pub fn global_by_index(&self, index: usize) -> Vid {
        self.globalid_by_index[index]
    }

    #[inline]
    pub fn vdata_load(&self, index: usize) -> Vdata {
        self.vdata[index].load(Ordering::Relaxed)
    }

    pub fn vdata_snapshot(&self) -> Vec<Vdata> {
        self.vdata.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    /// Global vids this fragment references but does not own, each mapped to
    /// this fragment's gid. These are the seams the message manager tracks.
    pub fn collect_border_vertexes(&self) -> HashMap<Vid, Gid> {
        let mut border = HashMap::new();
        for edges in [&self.in_edges, &self.out_edges] {
            for &e in edges.iter() {
                if self.local_index(e).is_none() {
                    border.insert(e, self.gid);
                }
            }
        }
        border
    }

    /// Indexes of resident vertices with at least one border reference; only
    /// these can carry values other fragments wait on.
    pub fn seam_indexes(&self) -> &[usize] {
        &self.seam_indexes
    }

    fn find_seam_indexes(&self) -> Vec<usize> {
        let mut seam = Vec::new();
        for i in 0..self.num_vertexes {
            let v = self.vertex_by_index(i);
            let on_seam = v
                .in_edges
                .iter()
                .chain(v.out_edges.iter())
                .any(|&e| self.local_index(e).is_none());
            if on_seam {
                seam.push(i);
            }
        }
        seam
    }

    pub fn clone_vertex(&self, index: usize) -> OwnedVertex {
        self.vertex_by_index(index).to_owned_vertex()
    }

    /// Log a bounded sample of the fragment at debug level.
    pub fn show_graph(&self, count: usize) {
        tracing::debug!(
            target: "gravel",
            gid = self.gid,
            num_vertexes = self.num_vertexes,
            sum_in_edges = self.sum_in_edges,
            sum_out_edges = self.sum_out_edges,
            "fragment loaded"
        );
        for i in 0..self.num_vertexes.min(count) {
            let v = self.vertex_by_index(i);
            tracing::debug!(
                target: "gravel",
                gid = self.gid,
                local = v.vid,
                global = self.globalid_by_index[i],
                indegree = v.indegree,
                outdegree = v.outdegree,
                vdata = v.vdata(),
                "vertex"
            );
        }
    }

    // Array accessors for the bundle writer.
    pub fn indegree(&self) -> &[u64] {
        &self.indegree
    }
    pub fn outdegree(&self) -> &[u64] {
        &self.outdegree
    }
    pub fn in_offset(&self) -> &[u64] {
        &self.in_offset
    }
    pub fn out_offset(&self) -> &[u64] {
        &self.out_offset
    }
    pub fn in_edges(&self) -> &[Vid] {
        &self.in_edges
    }
    pub fn out_edges(&self) -> &[Vid] {
        &self.out_edges
    }
    pub fn vid_by_index(&self) -> &[Vid] {
        &self.vid_by_index
    }
}

#[cfg(test)]
#[path = "csr_tests.rs"]
mod csr_tests;
