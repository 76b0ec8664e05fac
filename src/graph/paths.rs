//! Workspace layout
//! ----------------
//! A partitioned graph lives under one workspace root:
//!
//! ```text
//! <root>/
//!   bin/
//!     meta/<gid>.bin
//!     in_edges/<gid>.bin
//!     out_edges/<gid>.bin
//!     vdata/<gid>.bin
//!     localid2globalid/<gid>.bin
//!   border_vertexes.bin          (optional precomputed border seed)
//!   result/<gid>.vdata.bin       (written at fixpoint)
//! ```

use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};
use crate::graph::Gid;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bin_dir(&self, section: &str) -> PathBuf {
        self.root.join("bin").join(section)
    }

    pub fn meta(&self, gid: Gid) -> PathBuf {
        self.bin_dir("meta").join(format!("{gid}.bin"))
    }

    pub fn in_edges(&self, gid: Gid) -> PathBuf {
        self.bin_dir("in_edges").join(format!("{gid}.bin"))
    }

    pub fn out_edges(&self, gid: Gid) -> PathBuf {
        self.bin_dir("out_edges").join(format!("{gid}.bin"))
    }

    pub fn vdata(&self, gid: Gid) -> PathBuf {
        self.bin_dir("vdata").join(format!("{gid}.bin"))
    }

    pub fn localid2globalid(&self, gid: Gid) -> PathBuf {
        self.bin_dir("localid2globalid").join(format!("{gid}.bin"))
    }

    pub fn border_seed(&self) -> PathBuf {
        self.root.join("border_vertexes.bin")
    }

    pub fn result_vdata(&self, gid: Gid) -> PathBuf {
        self.root.join("result").join(format!("{gid}.vdata.bin"))
    }

    /// Create every directory a partitioner or the engine writes into.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        for section in ["meta", "in_edges", "out_edges", "vdata", "localid2globalid"] {
            std::fs::create_dir_all(self.bin_dir(section))?;
        }
        std::fs::create_dir_all(self.root.join("result"))
    }

    /// Enumerate fragments by scanning `bin/meta/*.bin`, sorted by gid.
    pub fn list_gids(&self) -> EngineResult<Vec<Gid>> {
        let dir = self.bin_dir("meta");
        if !dir.is_dir() {
            return Err(EngineError::IoMissing { gid: None, path: dir });
        }
        let mut gids = Vec::new();
        let entries = std::fs::read_dir(&dir)
            .map_err(|_| EngineError::IoMissing { gid: None, path: dir.clone() })?;
        for entry in entries.flatten() {
            let p = entry.path();
            if let Some(name) = p.file_name().and_then(|s| s.to_str()) {
                if let Some(stem) = name.strip_suffix(".bin") {
                    if let Ok(gid) = stem.parse::<Gid>() {
                        gids.push(gid);
                    }
                }
            }
        }
        gids.sort_unstable();
        gids.dedup();
        Ok(gids)
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod paths_tests;
