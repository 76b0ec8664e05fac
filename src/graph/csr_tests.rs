use super::*;

// Chain 1 -> 2 -> 3 -> 4 as one fragment: locals 0..4, globals 1..=4.
fn chain_parts(gid: Gid) -> CsrParts {
    CsrParts {
        gid,
        indegree: vec![0, 1, 1, 1],
        outdegree: vec![1, 1, 1, 0],
        in_offset: vec![0, 0, 1, 2],
        out_offset: vec![0, 1, 2, 3],
        in_edges: vec![0, 1, 2],
        out_edges: vec![1, 2, 3],
        vdata: vec![0; 4],
        localid2globalid: vec![(0, 1), (1, 2), (2, 3), (3, 4)],
    }
}

#[test]
fn chain_vertex_views() {
    let frag = CsrFragment::from_parts(chain_parts(0)).unwrap();
    assert_eq!(frag.num_vertexes, 4);
    assert_eq!(frag.sum_in_edges, 3);
    assert_eq!(frag.sum_out_edges, 3);

    let v0 = frag.vertex_by_index(0);
    assert_eq!(v0.vid, 0);
    assert_eq!(v0.outdegree, 1);
    assert_eq!(v0.out_edges, &[1]);
    assert_eq!(v0.in_edges, &[] as &[Vid]);

    let v3 = frag.vertex_by_vid(3).unwrap();
    assert_eq!(v3.indegree, 1);
    assert_eq!(v3.in_edges, &[2]);
    assert_eq!(v3.outdegree, 0);
}

#[test]
fn vid_mapping_bijection() {
    let frag = CsrFragment::from_parts(chain_parts(0)).unwrap();
    for local in 0..4u64 {
        let global = frag.localid2globalid(local);
        assert_ne!(global, VID_MAX);
        assert_eq!(frag.globalid2localid(global), local);
    }
    assert_eq!(frag.globalid2localid(99), VID_MAX);
    assert_eq!(frag.localid2globalid(77), VID_MAX);
}

#[test]
fn vdata_is_the_only_mutable_array() {
    let frag = CsrFragment::from_parts(chain_parts(0)).unwrap();
    let v1 = frag.vertex_by_index(1);
    assert_eq!(v1.vdata(), 0);
    v1.set_vdata(7);
    assert_eq!(frag.vdata_load(1), 7);
    assert_eq!(frag.vdata_snapshot(), vec![0, 7, 0, 0]);
    // Topology is untouched by vdata writes.
    assert_eq!(frag.out_edges(), &[1, 2, 3]);
}

#[test]
fn border_references_are_detected() {
    // Fragment A: globals {1,2} with edge 1->2 plus a border out-edge 2->3
    // (entry 3 does not resolve to a resident local vid).
    let parts = CsrParts {
        gid: 0,
        indegree: vec![0, 1],
        outdegree: vec![1, 1],
        in_offset: vec![0, 0],
        out_offset: vec![0, 1],
        in_edges: vec![0],
        out_edges: vec![1, 3],
        vdata: vec![0; 2],
        localid2globalid: vec![(0, 1), (1, 2)],
    };
    let frag = CsrFragment::from_parts(parts).unwrap();
    let border = frag.collect_border_vertexes();
    assert_eq!(border.len(), 1);
    assert_eq!(border.get(&3), Some(&0));
    // Vertex local 1 (global 2) is the only one touching the seam.
    assert_eq!(frag.seam_indexes(), &[1]);
}

#[test]
fn from_parts_rejects_inconsistent_offsets() {
    let mut parts = chain_parts(5);
    parts.in_offset[2] = 9;
    let err = CsrFragment::from_parts(parts).unwrap_err();
    assert_eq!(err.kind(), "IoBadFormat");
    assert_eq!(err.gid(), Some(5));
}

#[test]
fn from_parts_rejects_edge_length_mismatch() {
    let mut parts = chain_parts(1);
    parts.out_edges.push(0);
    let err = CsrFragment::from_parts(parts).unwrap_err();
    assert_eq!(err.kind(), "IoBadFormat");
}

#[test]
fn from_parts_rejects_duplicate_local_vid() {
    let mut parts = chain_parts(2);
    parts.localid2globalid[3] = (0, 9);
    assert_eq!(CsrFragment::from_parts(parts).unwrap_err().kind(), "IoBadFormat");
}

#[test]
fn clone_vertex_is_detached() {
    let frag = CsrFragment::from_parts(chain_parts(0)).unwrap();
    let owned = frag.clone_vertex(1);
    frag.vertex_by_index(1).set_vdata(42);
    assert_eq!(owned.vdata, 0);
    assert_eq!(owned.out_edges, vec![2]);
    assert_eq!(owned.indegree, 1);
}

#[test]
fn fetch_min_vdata_is_monotone() {
    let frag = CsrFragment::from_parts(chain_parts(0)).unwrap();
    let v = frag.vertex_by_index(0);
    v.set_vdata(10);
    assert_eq!(v.fetch_min_vdata(4), 10);
    assert_eq!(v.fetch_min_vdata(8), 4);
    assert_eq!(v.vdata(), 4);
}
