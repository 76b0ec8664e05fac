use super::*;

#[test]
fn bundle_paths_follow_layout() {
    let ws = Workspace::new("/data/graph");
    assert_eq!(ws.meta(3), PathBuf::from("/data/graph/bin/meta/3.bin"));
    assert_eq!(ws.in_edges(3), PathBuf::from("/data/graph/bin/in_edges/3.bin"));
    assert_eq!(ws.out_edges(0), PathBuf::from("/data/graph/bin/out_edges/0.bin"));
    assert_eq!(ws.vdata(12), PathBuf::from("/data/graph/bin/vdata/12.bin"));
    assert_eq!(
        ws.localid2globalid(1),
        PathBuf::from("/data/graph/bin/localid2globalid/1.bin")
    );
    assert_eq!(ws.result_vdata(3), PathBuf::from("/data/graph/result/3.vdata.bin"));
    assert_eq!(ws.border_seed(), PathBuf::from("/data/graph/border_vertexes.bin"));
}

#[test]
fn list_gids_scans_meta_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let ws = Workspace::new(tmp.path());
    ws.ensure_layout().unwrap();
    for gid in [4u32, 0, 2] {
        std::fs::write(ws.meta(gid), b"x").unwrap();
    }
    // Non-bundle clutter is ignored.
    std::fs::write(tmp.path().join("bin/meta/notes.txt"), b"x").unwrap();
    assert_eq!(ws.list_gids().unwrap(), vec![0, 2, 4]);
}

#[test]
fn list_gids_without_layout_is_io_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let ws = Workspace::new(tmp.path().join("nope"));
    let err = ws.list_gids().unwrap_err();
    assert_eq!(err.kind(), "IoMissing");
    assert_eq!(err.gid(), None);
}
