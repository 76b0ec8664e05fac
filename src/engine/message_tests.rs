use super::*;
use crate::graph::csr::CsrParts;

// Fragment A (gid 0): globals {1,2}, edge 1->2, border out-edge 2->3.
fn frag_a() -> CsrFragment {
    CsrFragment::from_parts(CsrParts {
        gid: 0,
        indegree: vec![0, 1],
        outdegree: vec![1, 1],
        in_offset: vec![0, 0],
        out_offset: vec![0, 1],
        in_edges: vec![0],
        out_edges: vec![1, 3],
        vdata: vec![0; 2],
        localid2globalid: vec![(0, 1), (1, 2)],
    })
    .unwrap()
}

// Fragment B (gid 1): globals {3,4}, edge 3->4, border in-edge from global 2.
fn frag_b() -> CsrFragment {
    CsrFragment::from_parts(CsrParts {
        gid: 1,
        indegree: vec![1, 1],
        outdegree: vec![1, 0],
        in_offset: vec![0, 1],
        out_offset: vec![0, 1],
        in_edges: vec![2, 0],
        out_edges: vec![1],
        vdata: vec![0; 2],
        localid2globalid: vec![(0, 3), (1, 4)],
    })
    .unwrap()
}

fn all_visited(n: usize) -> Visited {
    let v = Visited::new(n);
    for i in 0..n {
        v.set(i);
    }
    v
}

#[test]
fn publish_wakes_other_owners_only() {
    let msgs = MessageManager::new();
    let a = frag_a();
    let b = frag_b();
    msgs.register_fragment(&a);
    msgs.register_fragment(&b);
    assert_eq!(msgs.border_vertex_count(), 2);
    // Registration published nothing yet.
    assert!(msgs.drain_dirty().is_empty());

    // A's seam vertex (global 2) picks up a value; B owns an edge touching it.
    a.vertex_by_vid(1).unwrap().set_vdata(1);
    let published = msgs.update_border_vertexes(&a, &all_visited(2));
    assert!(published);
    let dirty = msgs.drain_dirty();
    assert_eq!(dirty, HashSet::from([1]));

    // Republishing the same value is not a change.
    assert!(!msgs.update_border_vertexes(&a, &all_visited(2)));
    assert!(msgs.drain_dirty().is_empty());

    let snap = msgs.snapshot_vdata();
    assert_eq!(snap.get(&2), Some(&1));
}

#[test]
fn snapshot_is_detached_from_later_publications() {
    let msgs = MessageManager::new();
    let a = frag_a();
    msgs.register_fragment(&a);
    a.vertex_by_vid(1).unwrap().set_vdata(1);
    msgs.update_border_vertexes(&a, &all_visited(2));
    let snap = msgs.snapshot_vdata();

    a.vertex_by_vid(1).unwrap().set_vdata(9);
    msgs.update_border_vertexes(&a, &all_visited(2));
    assert_eq!(snap.get(&2), Some(&1), "snapshot must not see later publications");
    assert_eq!(msgs.snapshot_vdata().get(&2), Some(&9));
}

#[test]
fn unvisited_seam_vertices_are_not_published() {
    let msgs = MessageManager::new();
    let a = frag_a();
    msgs.register_fragment(&a);
    a.vertex_by_vid(1).unwrap().set_vdata(1);
    assert!(!msgs.update_border_vertexes(&a, &Visited::new(2)));
    assert!(msgs.snapshot_vdata().is_empty());
}

#[test]
fn late_registrant_catches_missed_publication() {
    let msgs = MessageManager::new();
    let a = frag_a();
    msgs.register_fragment(&a);
    a.vertex_by_vid(1).unwrap().set_vdata(1);
    msgs.update_border_vertexes(&a, &all_visited(2));
    // Nobody owned global 2 at publication time.
    assert!(msgs.drain_dirty().is_empty());

    // B loads afterwards and references global 2: it must be woken.
    let b = frag_b();
    msgs.register_fragment(&b);
    assert_eq!(msgs.drain_dirty(), HashSet::from([1]));

    // Re-registration is a no-op.
    msgs.register_fragment(&b);
    assert!(msgs.drain_dirty().is_empty());
}

#[test]
fn seed_round_trips_and_prefills_owners() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("border_vertexes.bin");
    write_seed(&path, &[(2, 1), (3, 0)]).unwrap();

    let msgs = MessageManager::new();
    assert_eq!(msgs.load_seed(&path).unwrap(), 2);
    assert_eq!(msgs.border_vertex_count(), 2);

    // With owners pre-seeded, A's very first publication wakes B.
    let a = frag_a();
    msgs.register_fragment(&a);
    a.vertex_by_vid(1).unwrap().set_vdata(1);
    msgs.update_border_vertexes(&a, &all_visited(2));
    assert_eq!(msgs.drain_dirty(), HashSet::from([1]));
}

#[test]
fn missing_seed_is_empty_and_corrupt_seed_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let msgs = MessageManager::new();
    assert_eq!(msgs.load_seed(&tmp.path().join("absent.bin")).unwrap(), 0);

    let bad = tmp.path().join("bad.bin");
    std::fs::write(&bad, b"not a seed file").unwrap();
    assert!(msgs.load_seed(&bad).is_err());
}
