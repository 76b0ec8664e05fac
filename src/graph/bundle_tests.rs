use super::*;
use crate::graph::csr::CsrParts;

fn chain_fragment(gid: Gid) -> CsrFragment {
    CsrFragment::from_parts(CsrParts {
        gid,
        indegree: vec![0, 1, 1, 1],
        outdegree: vec![1, 1, 1, 0],
        in_offset: vec![0, 0, 1, 2],
        out_offset: vec![0, 1, 2, 3],
        in_edges: vec![0, 1, 2],
        out_edges: vec![1, 2, 3],
        vdata: vec![5, 0, 7, 0],
        localid2globalid: vec![(0, 1), (1, 2), (2, 3), (3, 4)],
    })
    .unwrap()
}

fn bundle_io(root: &std::path::Path) -> CsrBundleIo {
    let ws = Workspace::new(root);
    ws.ensure_layout().unwrap();
    CsrBundleIo::new(ws)
}

#[test]
fn round_trip_is_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let io_a = bundle_io(&tmp.path().join("a"));
    let io_b = bundle_io(&tmp.path().join("b"));

    let frag = chain_fragment(3);
    io_a.write(&frag).unwrap();
    let reread = io_a.read(3).unwrap();
    io_b.write(&reread).unwrap();

    for (pa, pb) in [
        (io_a.workspace().meta(3), io_b.workspace().meta(3)),
        (io_a.workspace().in_edges(3), io_b.workspace().in_edges(3)),
        (io_a.workspace().out_edges(3), io_b.workspace().out_edges(3)),
        (io_a.workspace().vdata(3), io_b.workspace().vdata(3)),
        (io_a.workspace().localid2globalid(3), io_b.workspace().localid2globalid(3)),
    ] {
        let a = std::fs::read(&pa).unwrap();
        let b = std::fs::read(&pb).unwrap();
        assert_eq!(a, b, "bundle section differs: {}", pa.display());
        assert!(!a.is_empty());
    }

    assert_eq!(reread.vdata_snapshot(), vec![5, 0, 7, 0]);
    assert_eq!(reread.globalid2localid(4), 3);
}

#[test]
fn missing_section_is_io_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let io = bundle_io(tmp.path());
    io.write(&chain_fragment(0)).unwrap();
    std::fs::remove_file(io.workspace().in_edges(0)).unwrap();
    let err = io.read(0).unwrap_err();
    assert_eq!(err.kind(), "IoMissing");
    assert_eq!(err.gid(), Some(0));
}

#[test]
fn truncated_meta_header_is_io_truncated() {
    let tmp = tempfile::tempdir().unwrap();
    let io = bundle_io(tmp.path());
    io.write(&chain_fragment(7)).unwrap();
    let meta = io.workspace().meta(7);
    let bytes = std::fs::read(&meta).unwrap();
    std::fs::write(&meta, &bytes[..16]).unwrap();
    let err = io.read(7).unwrap_err();
    assert_eq!(err.kind(), "IoTruncated");
    assert_eq!(err.gid(), Some(7));
}

#[test]
fn short_edge_file_is_io_truncated() {
    let tmp = tempfile::tempdir().unwrap();
    let io = bundle_io(tmp.path());
    io.write(&chain_fragment(1)).unwrap();
    let p = io.workspace().out_edges(1);
    let bytes = std::fs::read(&p).unwrap();
    std::fs::write(&p, &bytes[..bytes.len() - 3]).unwrap();
    assert_eq!(io.read(1).unwrap_err().kind(), "IoTruncated");
}

#[test]
fn oversized_section_is_bad_format() {
    let tmp = tempfile::tempdir().unwrap();
    let io = bundle_io(tmp.path());
    io.write(&chain_fragment(1)).unwrap();
    let p = io.workspace().vdata(1);
    let mut bytes = std::fs::read(&p).unwrap();
    bytes.extend_from_slice(&[0u8; 8]);
    std::fs::write(&p, &bytes).unwrap();
    assert_eq!(io.read(1).unwrap_err().kind(), "IoBadFormat");
}

#[test]
fn corrupt_magic_is_bad_format() {
    let tmp = tempfile::tempdir().unwrap();
    let io = bundle_io(tmp.path());
    io.write(&chain_fragment(2)).unwrap();
    let meta = io.workspace().meta(2);
    let mut bytes = std::fs::read(&meta).unwrap();
    bytes[0] ^= 0xFF;
    std::fs::write(&meta, &bytes).unwrap();
    assert_eq!(io.read(2).unwrap_err().kind(), "IoBadFormat");
}

#[test]
fn header_gid_mismatch_is_bad_format() {
    let tmp = tempfile::tempdir().unwrap();
    let io = bundle_io(tmp.path());
    io.write(&chain_fragment(2)).unwrap();
    // Pass 2's meta off as 9's.
    std::fs::copy(io.workspace().meta(2), io.workspace().meta(9)).unwrap();
    for f in [
        (io.workspace().in_edges(2), io.workspace().in_edges(9)),
        (io.workspace().out_edges(2), io.workspace().out_edges(9)),
        (io.workspace().vdata(2), io.workspace().vdata(9)),
        (io.workspace().localid2globalid(2), io.workspace().localid2globalid(9)),
    ] {
        std::fs::copy(f.0, f.1).unwrap();
    }
    assert_eq!(io.read(9).unwrap_err().kind(), "IoBadFormat");
}

#[test]
fn publish_result_copies_vdata_bytes() {
    let tmp = tempfile::tempdir().unwrap();
    let io = bundle_io(tmp.path());
    io.write(&chain_fragment(4)).unwrap();
    io.publish_result(4).unwrap();
    let src = std::fs::read(io.workspace().vdata(4)).unwrap();
    let dst = std::fs::read(io.workspace().result_vdata(4)).unwrap();
    assert_eq!(src, dst);
    assert_eq!(io.read_vdata(4).unwrap(), vec![5, 0, 7, 0]);
}
