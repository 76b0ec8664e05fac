//! PIE program seam
//! ----------------
//! A user program is a value implementing [`PieProgram`]: `init` runs once
//! per fragment, `peval` on the first resident visit, `inceval` on every
//! later one. The boolean result answers one question: did this pass publish
//! any new border-vertex values? The scheduler uses it to decide whether
//! neighbors must be woken.
//!
//! [`AppHandle`] is the engine-side wrapper. It injects the fragment, the
//! task runner and the message manager, takes the border snapshot an
//! `IncEval` pass reads (snapshot-per-pass: publications during the pass
//! only affect later epochs), and converts kernel panics into engine errors
//! carrying the gid and epoch.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Result;
use tracing::error;

use crate::engine::message::MessageManager;
use crate::engine::runner::TaskRunner;
use crate::error::{EngineError, EngineResult};
use crate::graph::csr::CsrFragment;
use crate::graph::{Gid, Vdata, Vid};

/// Immutable clone of the border-vertex values, taken before a pass begins.
pub type BorderSnapshot = HashMap<Vid, Vdata>;

pub trait PieProgram: Send + Sync {
    /// One-time per-fragment setup before the first `peval`.
    fn init(&self, _frag: &Arc<CsrFragment>) -> Result<()> {
        Ok(())
    }

    /// First evaluation of a fragment. Returns whether border updates were
    /// published; `false` leaves the fragment inert until a border update
    /// arrives.
    fn peval(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        msgs: &MessageManager,
    ) -> Result<bool>;

    /// Every later evaluation, seeded from the fragment's border vertices
    /// and/or the global snapshot.
    fn inceval(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        msgs: &MessageManager,
        border: Arc<BorderSnapshot>,
    ) -> Result<bool>;
}

#[derive(Clone)]
pub struct AppHandle {
    program: Arc<dyn PieProgram>,
}

impl AppHandle {
    pub fn new(program: Arc<dyn PieProgram>) -> Self {
        Self { program }
    }

    pub fn run_peval(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        msgs: &MessageManager,
        epoch: u64,
    ) -> EngineResult<bool> {
        let gid = frag.gid;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.program.init(frag)?;
            self.program.peval(frag, runner, msgs)
        }));
        settle(gid, epoch, "PEval", outcome)
    }

    pub fn run_inceval(
        &self,
        frag: &Arc<CsrFragment>,
        runner: &TaskRunner,
        msgs: &MessageManager,
        epoch: u64,
    ) -> EngineResult<bool> {
        let gid = frag.gid;
        let border = Arc::new(msgs.snapshot_vdata());
        let outcome =
            catch_unwind(AssertUnwindSafe(|| self.program.inceval(frag, runner, msgs, border)));
        settle(gid, epoch, "IncEval", outcome)
    }
}

fn settle(
    gid: Gid,
    epoch: u64,
    stage: &str,
    outcome: std::thread::Result<Result<bool>>,
) -> EngineResult<bool> {
    match outcome {
        Ok(Ok(published)) => Ok(published),
        Ok(Err(e)) => {
            error!(target: "gravel", gid, epoch, stage, "kernel failed: {e:#}");
            Err(EngineError::UserKernelPanic { gid, epoch })
        }
        Err(_) => {
            error!(target: "gravel", gid, epoch, stage, "kernel panicked");
            Err(EngineError::UserKernelPanic { gid, epoch })
        }
    }
}
