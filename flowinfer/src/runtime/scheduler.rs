//! Kernel invocation for single instances and for parallel waves.
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::backend::KernelDispatcher;
use crate::graph::OpAttrs;
use crate::tensor::TensorValue;

use super::engine::Instance;

pub(crate) struct KernelJob<'g> {
    pub instance: Instance,
    pub op_type: &'g str,
    pub attrs: &'g OpAttrs,
    pub inputs: Vec<Arc<TensorValue>>,
}

pub(crate) struct KernelOutcome {
    pub result: Result<Vec<TensorValue>>,
    pub elapsed: Option<Duration>,
}

pub(crate) fn run_kernel(
    dispatcher: &dyn KernelDispatcher,
    job: &KernelJob<'_>,
    timer: bool,
) -> KernelOutcome {
    let refs: Vec<&TensorValue> = job.inputs.iter().map(|value| value.as_ref()).collect();
    let start = timer.then(Instant::now);
    let result = dispatcher.invoke(job.op_type, job.attrs, &refs);
    KernelOutcome {
        result,
        elapsed: start.map(|start| start.elapsed()),
    }
}

/// Thread pool for running independent ordinary instances side by side.
///
/// Only kernel calls run on the pool. Recording values, advancing frames and
/// picking merge inputs stay on the calling thread, in queue order.
pub struct WavePool {
    pool: ThreadPool,
}

impl WavePool {
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|idx| format!("flowinfer-wave-{idx}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|err| anyhow!("failed to build wave threadpool: {}", err))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub(crate) fn run(
        &self,
        dispatcher: &dyn KernelDispatcher,
        jobs: &[KernelJob<'_>],
        timer: bool,
    ) -> Vec<KernelOutcome> {
        crate::trace!("wave.start jobs={} threads={}", jobs.len(), self.threads());
        self.pool.install(|| {
            jobs.par_iter()
                .map(|job| run_kernel(dispatcher, job, timer))
                .collect()
        })
    }
}

impl std::fmt::Debug for WavePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavePool")
            .field("threads", &self.threads())
            .finish()
    }
}
