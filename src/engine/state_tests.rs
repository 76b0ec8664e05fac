use super::*;

#[test]
fn full_lifecycle_round_trips() {
    let t = StateTable::new();
    t.register(0);
    assert_eq!(t.phase(0), Some(Phase::Idle));
    t.transition(0, Phase::Idle, Phase::Load).unwrap();
    t.transition(0, Phase::Load, Phase::Ready).unwrap();
    t.transition(0, Phase::Ready, Phase::Active).unwrap();
    t.transition(0, Phase::Active, Phase::Rc).unwrap();
    t.transition(0, Phase::Rc, Phase::Idle).unwrap();
    // A border update wakes the fragment for another cycle.
    t.transition(0, Phase::Idle, Phase::Load).unwrap();
    t.transition(0, Phase::Load, Phase::Ready).unwrap();
    t.transition(0, Phase::Ready, Phase::Active).unwrap();
    t.transition(0, Phase::Active, Phase::Rc).unwrap();
    t.transition(0, Phase::Rc, Phase::Idle).unwrap();
    t.terminate_all().unwrap();
    assert_eq!(t.phase(0), Some(Phase::Term));
}

#[test]
fn illegal_transition_is_invariant_violation() {
    let t = StateTable::new();
    t.register(1);
    let err = t.transition(1, Phase::Ready, Phase::Active).unwrap_err();
    assert_eq!(err.kind(), "SchedulerInvariantViolated");
    // Skipping the compute stage is rejected too.
    t.transition(1, Phase::Idle, Phase::Load).unwrap();
    t.transition(1, Phase::Load, Phase::Ready).unwrap();
    assert!(t.transition(1, Phase::Ready, Phase::Rc).is_err());
}

#[test]
fn unknown_gid_is_invariant_violation() {
    let t = StateTable::new();
    let err = t.transition(9, Phase::Rc, Phase::Idle).unwrap_err();
    assert!(err.diagnostic().contains("unknown gid 9"));
}

#[test]
fn load_failure_unwinds_to_idle() {
    let t = StateTable::new();
    t.register(2);
    t.transition(2, Phase::Idle, Phase::Load).unwrap();
    t.transition(2, Phase::Load, Phase::Idle).unwrap();
    assert_eq!(t.phase(2), Some(Phase::Idle));
}

#[test]
fn first_visit_is_taken_once() {
    let t = StateTable::new();
    t.register(3);
    assert!(t.take_first_visit(3));
    assert!(!t.take_first_visit(3));
    assert!(!t.take_first_visit(99), "unknown gids never claim a first visit");
}

#[test]
fn inert_error_and_epoch_flags() {
    let t = StateTable::new();
    t.register(4);
    assert!(!t.is_inert(4));
    t.set_inert(4, true);
    assert!(t.is_inert(4));
    t.set_inert(4, false);
    assert!(!t.is_inert(4));

    assert!(!t.has_error(4));
    t.mark_error(4);
    assert!(t.has_error(4));

    t.set_last_eval_epoch(4, 12);
    assert_eq!(t.last_eval_epoch(4), 12);
    t.reset_eval_epoch(4);
    assert_eq!(t.last_eval_epoch(4), 0);
}

#[test]
fn terminate_all_requires_idle() {
    let t = StateTable::new();
    t.register(5);
    t.transition(5, Phase::Idle, Phase::Load).unwrap();
    assert!(t.terminate_all().is_err());
}
