//! Task runner
//! -----------
//! A fixed pool of compute threads shared by every EdgeMap/VertexMap call of
//! one engine. `parallel_for` splits an index range into chunks, dispatches
//! each chunk to the pool and blocks until all chunks finish. No task runs
//! after `parallel_for` returns, and no ordering holds between chunks, so
//! callers must hand in commutative work or per-chunk output slots.

use std::ops::Range;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};

enum Job {
    Run(Box<dyn FnOnce() + Send + 'static>),
    Exit,
}

pub struct TaskRunner {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    parallelism: usize,
}

/// Countdown for one `parallel_for` call; also records whether any chunk
/// panicked.
struct Latch {
    state: Mutex<(usize, bool)>,
    cv: Condvar,
}

impl Latch {
    fn new(count: usize) -> Self {
        Self { state: Mutex::new((count, false)), cv: Condvar::new() }
    }

    fn done(&self, panicked: bool) {
        let mut g = self.state.lock();
        g.0 -= 1;
        g.1 |= panicked;
        if g.0 == 0 {
            self.cv.notify_all();
        }
    }

    fn wait(&self) -> bool {
        let mut g = self.state.lock();
        while g.0 > 0 {
            self.cv.wait(&mut g);
        }
        g.1
    }
}

impl TaskRunner {
    pub fn new(parallelism: usize) -> Result<Self> {
        let parallelism = parallelism.max(1);
        let (tx, rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(parallelism);
        for i in 0..parallelism {
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("gravel-core-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        match job {
                            Job::Run(f) => f(),
                            Job::Exit => break,
                        }
                    }
                })
                .with_context(|| format!("spawn compute worker {i}"))?;
            workers.push(handle);
        }
        Ok(Self { tx, workers, parallelism })
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Run `f` over `range` in chunks of `chunk` indexes (0 picks
    /// ceil(len/parallelism)). Blocks until every chunk has completed.
    /// A panic inside a chunk is contained to its worker and reported here.
    pub fn parallel_for<F>(&self, range: Range<usize>, chunk: usize, f: F) -> Result<()>
    where
        F: Fn(Range<usize>) + Send + Sync + 'static,
    {
        let n = range.end.saturating_sub(range.start);
        if n == 0 {
            return Ok(());
        }
        let chunk = if chunk == 0 { n.div_ceil(self.parallelism) } else { chunk }.max(1);
        let num_chunks = n.div_ceil(chunk);
        let f = Arc::new(f);
        let latch = Arc::new(Latch::new(num_chunks));
        for ci in 0..num_chunks {
            let start = range.start + ci * chunk;
            let end = (start + chunk).min(range.end);
            let f = f.clone();
            let latch_for_job = latch.clone();
            let job = Job::Run(Box::new(move || {
                let panicked =
                    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(start..end)))
                        .is_err();
                latch_for_job.done(panicked);
            }));
            // The pool outlives every call; send only fails after shutdown.
            if self.tx.send(job).is_err() {
                latch.done(false);
            }
        }
        if latch.wait() {
            bail!("parallel_for: a task panicked");
        }
        Ok(())
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        for _ in 0..self.workers.len() {
            let _ = self.tx.send(Job::Exit);
        }
        for w in self.workers.drain(..) {
            let _ = w.join();
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod runner_tests;
