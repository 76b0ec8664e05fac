//! Per-fragment lifecycle state
//! ----------------------------
//! ```text
//! IDLE -> LOAD -> READY -> ACTIVE -> RC -> IDLE -> ... -> TERM
//! ```
//! Transitions are owned by the scheduler; pool workers only report
//! completions. An `inert` flag on IDLE marks fragments whose last evaluation
//! produced no border updates; they sleep until a border update wakes them.
//! Any transition the table does not allow is a scheduler bug and surfaces as
//! `SchedulerInvariantViolated`.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::graph::Gid;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle = 1,
    Load = 2,
    Ready = 3,
    Active = 4,
    Rc = 5,
    Term = 6,
}

#[derive(Debug, Clone)]
struct FragmentState {
    phase: Phase,
    inert: bool,
    evaluated: bool,
    error: bool,
    last_eval_epoch: u64,
}

impl FragmentState {
    fn new() -> Self {
        Self { phase: Phase::Idle, inert: false, evaluated: false, error: false, last_eval_epoch: 0 }
    }
}

fn allowed(from: Phase, to: Phase) -> bool {
    matches!(
        (from, to),
        (Phase::Idle, Phase::Load)
            | (Phase::Load, Phase::Ready)
            | (Phase::Load, Phase::Idle)   // load failure or abort unwinds
            | (Phase::Ready, Phase::Active)
            | (Phase::Active, Phase::Rc)
            | (Phase::Rc, Phase::Idle)
            | (Phase::Idle, Phase::Term)
    )
}

#[derive(Default)]
pub struct StateTable {
    states: Mutex<HashMap<Gid, FragmentState>>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, gid: Gid) {
        self.states.lock().entry(gid).or_insert_with(FragmentState::new);
    }

    pub fn transition(&self, gid: Gid, from: Phase, to: Phase) -> EngineResult<()> {
        let mut states = self.states.lock();
        let st = states.get_mut(&gid).ok_or_else(|| EngineError::SchedulerInvariantViolated {
            detail: format!("unknown gid {gid} in {from:?}->{to:?} transition"),
        })?;
        if st.phase != from || !allowed(from, to) {
            return Err(EngineError::SchedulerInvariantViolated {
                detail: format!("gid {gid}: illegal transition {:?}->{to:?} (requested from {from:?})", st.phase),
            });
        }
        st.phase = to;
        Ok(())
    }

    /// Error unwinding only: park the fragment in the given phase so the
    /// remaining pipeline stages can still evict it.
    pub fn force_phase(&self, gid: Gid, phase: Phase) {
        if let Some(st) = self.states.lock().get_mut(&gid) {
            st.phase = phase;
        }
    }

    pub fn phase(&self, gid: Gid) -> Option<Phase> {
        self.states.lock().get(&gid).map(|s| s.phase)
    }

    /// True exactly once per fragment: the visit that must run `PEval`.
    pub fn take_first_visit(&self, gid: Gid) -> bool {
        let mut states = self.states.lock();
        match states.get_mut(&gid) {
            Some(st) if !st.evaluated => {
                st.evaluated = true;
                true
            }
            _ => false,
        }
    }

    pub fn set_inert(&self, gid: Gid, inert: bool) {
        if let Some(st) = self.states.lock().get_mut(&gid) {
            st.inert = inert;
        }
    }

    pub fn is_inert(&self, gid: Gid) -> bool {
        self.states.lock().get(&gid).map(|s| s.inert).unwrap_or(false)
    }

    pub fn mark_error(&self, gid: Gid) {
        if let Some(st) = self.states.lock().get_mut(&gid) {
            st.error = true;
        }
    }

    pub fn has_error(&self, gid: Gid) -> bool {
        self.states.lock().get(&gid).map(|s| s.error).unwrap_or(false)
    }

    pub fn set_last_eval_epoch(&self, gid: Gid, epoch: u64) {
        if let Some(st) = self.states.lock().get_mut(&gid) {
            st.last_eval_epoch = epoch;
        }
    }

    /// A border update invalidates the fragment's last evaluation.
    pub fn reset_eval_epoch(&self, gid: Gid) {
        self.set_last_eval_epoch(gid, 0)
    }

    pub fn last_eval_epoch(&self, gid: Gid) -> u64 {
        self.states.lock().get(&gid).map(|s| s.last_eval_epoch).unwrap_or(0)
    }

    /// Terminate every idle fragment at end of run.
    pub fn terminate_all(&self) -> EngineResult<()> {
        let mut states = self.states.lock();
        for (gid, st) in states.iter_mut() {
            if st.phase != Phase::Idle {
                return Err(EngineError::SchedulerInvariantViolated {
                    detail: format!("gid {gid} is {:?} at termination", st.phase),
                });
            }
            st.phase = Phase::Term;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod state_tests;
