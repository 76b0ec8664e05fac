//! Three-pool scheduler
//! --------------------
//! Load workers pull gids from `pending_load`, reserve a slot in the
//! resident-fragment budget (blocking while the buffer is full), read the
//! bundle and hand the fragment to `ready`. Compute workers run `PEval` on a
//! fragment's first visit and `IncEval` afterwards, then push to `writeback`.
//! Discharge workers serialize the fragment back and release the budget slot.
//!
//! After every discharge the coordinator drains the message manager's dirty
//! set and re-enqueues any fragment whose border state changed since its last
//! evaluation. The run terminates when nothing is in flight and the dirty
//! set drains empty: every fragment has then been evaluated strictly after
//! its last incoming border update.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::engine::app::{AppHandle, PieProgram};
use crate::engine::data_manager::DataManager;
use crate::engine::message::MessageManager;
use crate::engine::runner::TaskRunner;
use crate::engine::state::{Phase, StateTable};
use crate::error::{EngineError, EngineResult};
use crate::graph::bundle::CsrBundleIo;
use crate::graph::paths::Workspace;
use crate::graph::Gid;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workspace: PathBuf,
    /// Load-pool width.
    pub num_lc: usize,
    /// Compute-pool width.
    pub num_cc: usize,
    /// Discharge-pool width.
    pub num_dc: usize,
    /// Parallelism shared by EdgeMap/VertexMap inside each compute task.
    pub num_cores: usize,
    /// Resident-fragment budget (READY + ACTIVE + RC).
    pub buffer_size: usize,
}

impl EngineConfig {
    pub fn new<P: Into<PathBuf>>(workspace: P) -> Self {
        Self {
            workspace: workspace.into(),
            num_lc: 1,
            num_cc: 3,
            num_dc: 1,
            num_cores: num_cpus::get(),
            buffer_size: 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub fragments: usize,
    pub loads: u64,
    pub evals: u64,
    pub publications: u64,
    pub discharges: u64,
    pub final_epoch: u64,
}

#[derive(Default)]
struct Metrics {
    loads: AtomicU64,
    evals: AtomicU64,
    publications: AtomicU64,
    discharges: AtomicU64,
}

/// Counting gate over the resident-fragment budget. Exhaustion is never an
/// error; acquirers block until a discharge releases a slot.
struct BufferGate {
    cap: usize,
    used: Mutex<usize>,
    cv: Condvar,
}

impl BufferGate {
    fn new(cap: usize) -> Self {
        Self { cap: cap.max(1), used: Mutex::new(0), cv: Condvar::new() }
    }

    fn acquire(&self) {
        let mut used = self.used.lock();
        while *used >= self.cap {
            self.cv.wait(&mut used);
        }
        *used += 1;
    }

    fn release(&self) {
        let mut used = self.used.lock();
        *used = used.saturating_sub(1);
        self.cv.notify_one();
    }
}

/// Pipeline completions reported to the coordinator. `Done` ends a gid's
/// trip through the pools; `Failed` with a gid ends it with an error, and
/// with `None` records an error for a gid that will still reach discharge.
enum Event {
    Done(Gid),
    Failed(Option<Gid>, EngineError),
}

struct Shared {
    io: CsrBundleIo,
    data: DataManager,
    msgs: MessageManager,
    states: StateTable,
    runner: TaskRunner,
    gate: BufferGate,
    abort: AtomicBool,
    epoch: AtomicU64,
    metrics: Metrics,
    app: AppHandle,
}

pub struct Engine {
    cfg: EngineConfig,
    shared: Arc<Shared>,
    ran: AtomicBool,
}

impl Engine {
    pub fn new(cfg: EngineConfig, program: Arc<dyn PieProgram>) -> anyhow::Result<Self> {
        let ws = Workspace::new(cfg.workspace.clone());
        let runner = TaskRunner::new(cfg.num_cores)?;
        let shared = Arc::new(Shared {
            io: CsrBundleIo::new(ws),
            data: DataManager::new(),
            msgs: MessageManager::new(),
            states: StateTable::new(),
            runner,
            gate: BufferGate::new(cfg.buffer_size),
            abort: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            metrics: Metrics::default(),
            app: AppHandle::new(program),
        });
        Ok(Self { cfg, shared, ran: AtomicBool::new(false) })
    }

    pub fn workspace(&self) -> &Workspace {
        self.shared.io.workspace()
    }

    /// Drive every fragment to the global fixpoint, then emit
    /// `result/<gid>.vdata.bin` files. One-shot: a second call is refused.
    pub fn run(&self) -> EngineResult<RunSummary> {
        if self.ran.swap(true, Ordering::SeqCst) {
            return Err(EngineError::SchedulerInvariantViolated {
                detail: "engine instance already ran".into(),
            });
        }
        let ws = self.workspace().clone();
        let gids = ws.list_gids()?;
        info!(
            target: "gravel",
            fragments = gids.len(),
            workspace = %ws.root().display(),
            lc = self.cfg.num_lc,
            cc = self.cfg.num_cc,
            dc = self.cfg.num_dc,
            cores = self.cfg.num_cores,
            buffer = self.cfg.buffer_size,
            "starting run"
        );
        if gids.is_empty() {
            warn!(target: "gravel", "workspace holds no fragments; nothing to do");
            return Ok(RunSummary::default());
        }
        for &gid in &gids {
            self.shared.states.register(gid);
        }
        match self.shared.msgs.load_seed(&ws.border_seed()) {
            Ok(0) => {}
            Ok(n) => info!(target: "gravel", entries = n, "border seed loaded"),
            Err(e) => {
                return Err(EngineError::IoBadFormat {
                    gid: None,
                    detail: format!("border seed: {e:#}"),
                })
            }
        }

        let (load_tx, load_rx) = bounded::<Gid>(gids.len());
        let (ready_tx, ready_rx) = bounded::<Gid>(self.cfg.buffer_size.max(1));
        let (wb_tx, wb_rx) = bounded::<Gid>(self.cfg.buffer_size.max(1));
        let (ev_tx, ev_rx) = unbounded::<Event>();

        let mut first_err: Option<EngineError> = None;

        std::thread::scope(|s| {
            for _ in 0..self.cfg.num_lc.max(1) {
                let sh = self.shared.clone();
                let rx = load_rx.clone();
                let tx = ready_tx.clone();
                let ev = ev_tx.clone();
                s.spawn(move || load_worker(sh, rx, tx, ev));
            }
            for _ in 0..self.cfg.num_cc.max(1) {
                let sh = self.shared.clone();
                let rx = ready_rx.clone();
                let tx = wb_tx.clone();
                let ev = ev_tx.clone();
                s.spawn(move || compute_worker(sh, rx, tx, ev));
            }
            for _ in 0..self.cfg.num_dc.max(1) {
                let sh = self.shared.clone();
                let rx = wb_rx.clone();
                let ev = ev_tx.clone();
                s.spawn(move || discharge_worker(sh, rx, ev));
            }
            drop(load_rx);
            drop(ready_tx);
            drop(ready_rx);
            drop(wb_tx);
            drop(wb_rx);
            drop(ev_tx);

            let mut inflight: HashSet<Gid> = HashSet::new();
            let mut pending_wake: HashSet<Gid> = HashSet::new();
            for &gid in &gids {
                inflight.insert(gid);
                let _ = load_tx.send(gid);
            }

            loop {
                if inflight.is_empty() {
                    if self.shared.abort.load(Ordering::SeqCst) {
                        break;
                    }
                    pending_wake.extend(self.shared.msgs.drain_dirty());
                    if pending_wake.is_empty() {
                        break; // global fixpoint
                    }
                    for gid in std::mem::take(&mut pending_wake) {
                        self.wake(gid, &load_tx, &mut inflight);
                    }
                }
                let Ok(ev) = ev_rx.recv() else { break };
                match ev {
                    Event::Done(gid) => {
                        inflight.remove(&gid);
                        if !self.shared.abort.load(Ordering::SeqCst) {
                            pending_wake.extend(self.shared.msgs.drain_dirty());
                            let wakeable: Vec<Gid> = pending_wake
                                .iter()
                                .copied()
                                .filter(|g| !inflight.contains(g))
                                .collect();
                            for g in wakeable {
                                pending_wake.remove(&g);
                                self.wake(g, &load_tx, &mut inflight);
                            }
                        }
                    }
                    Event::Failed(ended, err) => {
                        if let Some(gid) = ended {
                            inflight.remove(&gid);
                        }
                        self.shared.abort.store(true, Ordering::SeqCst);
                        if first_err.is_none() {
                            warn!(target: "gravel", "aborting run: {}", err.diagnostic());
                            first_err = Some(err);
                        }
                    }
                }
            }
            drop(load_tx);
        });

        if let Some(err) = first_err {
            return Err(err);
        }
        self.shared.states.terminate_all()?;
        for &gid in &gids {
            self.shared.io.publish_result(gid)?;
        }
        let summary = RunSummary {
            fragments: gids.len(),
            loads: self.shared.metrics.loads.load(Ordering::Relaxed),
            evals: self.shared.metrics.evals.load(Ordering::Relaxed),
            publications: self.shared.metrics.publications.load(Ordering::Relaxed),
            discharges: self.shared.metrics.discharges.load(Ordering::Relaxed),
            final_epoch: self.shared.epoch.load(Ordering::SeqCst),
        };
        info!(
            target: "gravel",
            fragments = summary.fragments,
            loads = summary.loads,
            evals = summary.evals,
            publications = summary.publications,
            discharges = summary.discharges,
            final_epoch = summary.final_epoch,
            "fixpoint reached"
        );
        Ok(summary)
    }

    fn wake(&self, gid: Gid, load_tx: &Sender<Gid>, inflight: &mut HashSet<Gid>) {
        debug!(
            target: "gravel",
            gid,
            was_inert = self.shared.states.is_inert(gid),
            "border update wakes fragment"
        );
        self.shared.states.set_inert(gid, false);
        self.shared.states.reset_eval_epoch(gid);
        inflight.insert(gid);
        let _ = load_tx.send(gid);
    }

    /// Log a bounded sample of each fragment's final vdata.
    pub fn show_result(&self, count: usize) -> EngineResult<()> {
        let gids = self.workspace().list_gids()?;
        for gid in gids {
            let vdata = self.shared.io.read_vdata(gid)?;
            let sample: Vec<_> = vdata.iter().take(count).collect();
            info!(target: "gravel", gid, vertexes = vdata.len(), ?sample, "result");
        }
        Ok(())
    }
}

fn load_worker(sh: Arc<Shared>, rx: Receiver<Gid>, ready_tx: Sender<Gid>, events: Sender<Event>) {
    while let Ok(gid) = rx.recv() {
        if sh.abort.load(Ordering::SeqCst) {
            let _ = events.send(Event::Done(gid));
            continue;
        }
        sh.gate.acquire();
        if sh.abort.load(Ordering::SeqCst) {
            sh.gate.release();
            let _ = events.send(Event::Done(gid));
            continue;
        }
        let outcome: EngineResult<()> = (|| {
            sh.states.transition(gid, Phase::Idle, Phase::Load)?;
            let frag = match sh.io.read(gid) {
                Ok(frag) => Arc::new(frag),
                Err(e) => {
                    sh.states.force_phase(gid, Phase::Idle);
                    return Err(e);
                }
            };
            frag.show_graph(3);
            sh.msgs.register_fragment(&frag);
            sh.data.insert(gid, frag);
            sh.states.transition(gid, Phase::Load, Phase::Ready)?;
            sh.metrics.loads.fetch_add(1, Ordering::Relaxed);
            let _ = ready_tx.send(gid);
            Ok(())
        })();
        if let Err(e) = outcome {
            sh.gate.release();
            let _ = events.send(Event::Failed(Some(gid), e));
        }
    }
}

fn compute_worker(sh: Arc<Shared>, rx: Receiver<Gid>, wb_tx: Sender<Gid>, events: Sender<Event>) {
    while let Ok(gid) = rx.recv() {
        let outcome: EngineResult<()> = (|| {
            sh.states.transition(gid, Phase::Ready, Phase::Active)?;
            let frag = sh.data.get(gid).ok_or_else(|| EngineError::SchedulerInvariantViolated {
                detail: format!("gid {gid} in ready queue but not resident"),
            })?;
            // A fragment reaches compute with eval epoch zero: never
            // evaluated, or reset by the wake that re-enqueued it. A nonzero
            // epoch means it was already evaluated after its last border
            // update and this visit has nothing to do.
            if !sh.abort.load(Ordering::SeqCst) && sh.states.last_eval_epoch(gid) == 0 {
                let epoch = sh.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                let first = sh.states.take_first_visit(gid);
                debug!(target: "gravel", gid, epoch, first, "evaluating");
                let published = if first {
                    sh.app.run_peval(&frag, &sh.runner, &sh.msgs, epoch)?
                } else {
                    sh.app.run_inceval(&frag, &sh.runner, &sh.msgs, epoch)?
                };
                sh.states.set_inert(gid, !published);
                sh.states.set_last_eval_epoch(gid, epoch);
                sh.metrics.evals.fetch_add(1, Ordering::Relaxed);
                if published {
                    sh.metrics.publications.fetch_add(1, Ordering::Relaxed);
                }
            }
            sh.states.transition(gid, Phase::Active, Phase::Rc)?;
            Ok(())
        })();
        if let Err(e) = outcome {
            sh.states.mark_error(gid);
            sh.states.force_phase(gid, Phase::Rc);
            let _ = events.send(Event::Failed(None, e));
        }
        let _ = wb_tx.send(gid);
    }
}

fn discharge_worker(sh: Arc<Shared>, rx: Receiver<Gid>, events: Sender<Event>) {
    while let Ok(gid) = rx.recv() {
        let outcome: EngineResult<()> = (|| {
            let frag = sh.data.get(gid).ok_or_else(|| EngineError::SchedulerInvariantViolated {
                detail: format!("unknown gid {gid} in writeback"),
            })?;
            if !sh.states.has_error(gid) {
                sh.io.write(&frag)?;
            }
            sh.data.remove(gid);
            sh.states.transition(gid, Phase::Rc, Phase::Idle)?;
            sh.metrics.discharges.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })();
        sh.gate.release();
        match outcome {
            Ok(()) => {
                let _ = events.send(Event::Done(gid));
            }
            Err(e) => {
                sh.states.force_phase(gid, Phase::Idle);
                let _ = events.send(Event::Failed(Some(gid), e));
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
