//! Partitioned-graph data model
//! ----------------------------
//! A large directed graph is pre-partitioned into fragments, each stored on
//! disk as a CSR bundle and loaded into memory on demand. This module holds
//! the fragment representation (`csr`), the binary bundle codec (`bundle`)
//! and the on-disk workspace layout (`paths`).

pub mod bundle;
pub mod csr;
pub mod paths;

/// Fragment id.
pub type Gid = u32;
/// Vertex id, local-to-fragment or global depending on context.
pub type Vid = u64;
/// Per-vertex payload.
pub type Vdata = u64;

/// Sentinel for "no such vertex".
pub const VID_MAX: Vid = Vid::MAX;
/// Sentinel for "vdata not yet set".
pub const VDATA_MAX: Vdata = Vdata::MAX;
