//! CSR bundle codec
//! ----------------
//! A fragment round-trips through five flat binary files: `meta`, `in_edges`,
//! `out_edges`, `vdata` and `localid2globalid`. All integers are fixed-width
//! little-endian; endianness is part of the file contract and never depends
//! on the host. The `meta` file opens with a 32-byte header:
//!
//! ```text
//! magic "MGCSR\0\0\0" (8) | gid (8) | num_vertexes (8) | sum_in (4) | sum_out (4)
//! ```
//!
//! followed by `indegree`, `outdegree`, `in_offset`, `out_offset`, each
//! `num_vertexes` entries of 8 bytes. Reads are strict: a missing file is
//! `IoMissing`, a short file is `IoTruncated`, and header integers that
//! disagree with file lengths are `IoBadFormat`.

use std::io::Write;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::graph::csr::{CsrFragment, CsrParts};
use crate::graph::paths::Workspace;
use crate::graph::{Gid, Vdata};

const MAGIC: &[u8; 8] = b"MGCSR\0\0\0";
pub const META_HEADER_LEN: u64 = 32;

pub struct CsrBundleIo {
    ws: Workspace,
}

impl CsrBundleIo {
    pub fn new(ws: Workspace) -> Self {
        Self { ws }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.ws
    }

    /// Read one fragment's bundle into memory and validate it.
    pub fn read(&self, gid: Gid) -> EngineResult<CsrFragment> {
        let meta = read_file(gid, &self.ws.meta(gid))?;
        if (meta.len() as u64) < META_HEADER_LEN {
            return Err(EngineError::IoTruncated {
                gid,
                path: self.ws.meta(gid),
                expected: META_HEADER_LEN,
                got: meta.len() as u64,
            });
        }
        if &meta[0..8] != MAGIC {
            return Err(EngineError::IoBadFormat { gid: Some(gid), detail: "bad magic in meta header".into() });
        }
        let header_gid = le_u64(&meta[8..16]);
        if header_gid != gid as u64 {
            return Err(EngineError::IoBadFormat {
                gid: Some(gid),
                detail: format!("meta header names gid {header_gid}"),
            });
        }
        let n = le_u64(&meta[16..24]) as usize;
        let sum_in = le_u32(&meta[24..28]) as usize;
        let sum_out = le_u32(&meta[28..32]) as usize;

        let expected = META_HEADER_LEN + 4 * n as u64 * 8;
        check_len(gid, &self.ws.meta(gid), meta.len() as u64, expected)?;
        let body = &meta[META_HEADER_LEN as usize..];
        let indegree = decode_u64s(&body[0..n * 8]);
        let outdegree = decode_u64s(&body[n * 8..2 * n * 8]);
        let in_offset = decode_u64s(&body[2 * n * 8..3 * n * 8]);
        let out_offset = decode_u64s(&body[3 * n * 8..4 * n * 8]);

        let in_edges = self.read_vid_array(gid, &self.ws.in_edges(gid), sum_in)?;
        let out_edges = self.read_vid_array(gid, &self.ws.out_edges(gid), sum_out)?;
        let vdata = self.read_vid_array(gid, &self.ws.vdata(gid), n)?;

        let l2g_path = self.ws.localid2globalid(gid);
        let l2g_bytes = read_file(gid, &l2g_path)?;
        check_len(gid, &l2g_path, l2g_bytes.len() as u64, n as u64 * 16)?;
        let flat = decode_u64s(&l2g_bytes);
        let localid2globalid = flat.chunks_exact(2).map(|p| (p[0], p[1])).collect();

        CsrFragment::from_parts(CsrParts {
            gid,
            indegree,
            outdegree,
            in_offset,
            out_offset,
            in_edges,
            out_edges,
            vdata,
            localid2globalid,
        })
    }

    fn read_vid_array(&self, gid: Gid, path: &Path, count: usize) -> EngineResult<Vec<u64>> {
        let bytes = read_file(gid, path)?;
        check_len(gid, path, bytes.len() as u64, count as u64 * 8)?;
        Ok(decode_u64s(&bytes))
    }

    /// Write the full bundle back; the exact inverse of [`CsrBundleIo::read`].
    pub fn write(&self, frag: &CsrFragment) -> EngineResult<()> {
        let gid = frag.gid;
        let n = frag.num_vertexes;
        if frag.sum_in_edges > u32::MAX as usize || frag.sum_out_edges > u32::MAX as usize {
            return Err(EngineError::IoBadFormat {
                gid: Some(gid),
                detail: "edge count overflows the 4-byte header field".into(),
            });
        }

        let mut meta = Vec::with_capacity(META_HEADER_LEN as usize + 4 * n * 8);
        meta.extend_from_slice(MAGIC);
        meta.extend_from_slice(&(gid as u64).to_le_bytes());
        meta.extend_from_slice(&(n as u64).to_le_bytes());
        meta.extend_from_slice(&(frag.sum_in_edges as u32).to_le_bytes());
        meta.extend_from_slice(&(frag.sum_out_edges as u32).to_le_bytes());
        encode_u64s(&mut meta, frag.indegree());
        encode_u64s(&mut meta, frag.outdegree());
        encode_u64s(&mut meta, frag.in_offset());
        encode_u64s(&mut meta, frag.out_offset());
        write_file(gid, &self.ws.meta(gid), &meta)?;

        let mut buf = Vec::with_capacity(frag.sum_in_edges * 8);
        encode_u64s(&mut buf, frag.in_edges());
        write_file(gid, &self.ws.in_edges(gid), &buf)?;

        buf.clear();
        encode_u64s(&mut buf, frag.out_edges());
        write_file(gid, &self.ws.out_edges(gid), &buf)?;

        buf.clear();
        encode_u64s(&mut buf, &frag.vdata_snapshot());
        write_file(gid, &self.ws.vdata(gid), &buf)?;

        buf.clear();
        for (i, &local) in frag.vid_by_index().iter().enumerate() {
            buf.extend_from_slice(&local.to_le_bytes());
            buf.extend_from_slice(&frag.global_by_index(i).to_le_bytes());
        }
        write_file(gid, &self.ws.localid2globalid(gid), &buf)
    }

    /// Read just the vdata section of a bundle.
    pub fn read_vdata(&self, gid: Gid) -> EngineResult<Vec<Vdata>> {
        let path = self.ws.vdata(gid);
        let bytes = read_file(gid, &path)?;
        if bytes.len() % 8 != 0 {
            return Err(EngineError::IoTruncated {
                gid,
                path,
                expected: (bytes.len() as u64 / 8 + 1) * 8,
                got: bytes.len() as u64,
            });
        }
        Ok(decode_u64s(&bytes))
    }

    /// Copy the discharged vdata into `result/<gid>.vdata.bin`.
    pub fn publish_result(&self, gid: Gid) -> EngineResult<()> {
        let src = self.ws.vdata(gid);
        let dst = self.ws.result_vdata(gid);
        if !src.is_file() {
            return Err(EngineError::IoMissing { gid: Some(gid), path: src });
        }
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        std::fs::copy(&src, &dst)
            .map(|_| ())
            .map_err(|e| EngineError::IoWriteFailed { gid, path: dst, source: e })
    }
}

fn read_file(gid: Gid, path: &Path) -> EngineResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            EngineError::IoMissing { gid: Some(gid), path: path.to_path_buf() }
        }
        _ => EngineError::IoBadFormat { gid: Some(gid), detail: format!("read {}: {}", path.display(), e) },
    })
}

fn check_len(gid: Gid, path: &Path, got: u64, expected: u64) -> EngineResult<()> {
    if got < expected {
        return Err(EngineError::IoTruncated { gid, path: path.to_path_buf(), expected, got });
    }
    if got > expected {
        return Err(EngineError::IoBadFormat {
            gid: Some(gid),
            detail: format!("{}: {} bytes on disk, header implies {}", path.display(), got, expected),
        });
    }
    Ok(())
}

fn write_file(gid: Gid, path: &Path, bytes: &[u8]) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let fail = |e| EngineError::IoWriteFailed { gid, path: path.to_path_buf(), source: e };
    let mut f = std::fs::File::create(path).map_err(fail)?;
    f.write_all(bytes).map_err(fail)?;
    f.flush().map_err(fail)
}

#[inline]
fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

#[inline]
fn le_u64(b: &[u8]) -> u64 {
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

fn decode_u64s(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

fn encode_u64s(buf: &mut Vec<u8>, vals: &[u64]) {
    buf.reserve(vals.len() * 8);
    for v in vals {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

#[cfg(test)]
#[path = "bundle_tests.rs"]
mod bundle_tests;
