use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::backend::{CpuBackend, KernelDispatcher};
use crate::error::SessionError;
use crate::graph::Graph;
use crate::tensor::TensorValue;

use super::engine::{Engine, EngineOptions};
use super::frames::FrameIter;
use super::listener::ExecutionListener;
use super::resolver::{check_bindings, resolve};
use super::scheduler::WavePool;
use super::state::ValueTable;
use super::trace::TraceEvent;

/// Builder-style switches for a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    trace: bool,
    timer: bool,
    parallel: bool,
    threads: Option<usize>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a [`TraceEvent`] for every executed node instance.
    pub fn with_trace(mut self) -> Self {
        self.trace = true;
        self
    }

    /// Time each instance; only visible through the trace.
    pub fn with_timer(mut self) -> Self {
        self.timer = true;
        self
    }

    /// Run independent ordinary ops on a thread pool.
    pub fn with_parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Size of the parallel pool. Implies [`with_parallel`](Self::with_parallel).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.parallel = true;
        self.threads = Some(threads.max(1));
        self
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace
    }

    pub fn timer_enabled(&self) -> bool {
        self.timer
    }

    pub fn parallel_enabled(&self) -> bool {
        self.parallel
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    NotStarted,
    Running,
    Finished,
    Failed,
}

/// One execution of a graph.
///
/// A session owns its value table and frame tracker and runs `output` at
/// most once. Running the same graph again, with the same or different
/// bindings, takes a new session; sessions never share state, so any number
/// may run concurrently over one `Arc<Graph>`.
///
/// Loops run until their condition turns false. A loop whose condition never
/// does keeps the session busy forever; bounding that is up to the caller.
pub struct Session {
    graph: Arc<Graph>,
    dispatcher: Arc<dyn KernelDispatcher>,
    options: SessionOptions,
    pool: Option<WavePool>,
    state: ExecState,
    trace: Vec<TraceEvent>,
    executed: usize,
}

impl Session {
    pub fn new(graph: Arc<Graph>, dispatcher: Arc<dyn KernelDispatcher>) -> Result<Self> {
        Self::with_options(graph, dispatcher, SessionOptions::default())
    }

    /// Session backed by the built-in CPU kernels.
    pub fn with_cpu(graph: Arc<Graph>) -> Result<Self> {
        Self::new(graph, Arc::new(CpuBackend::new()))
    }

    pub fn with_options(
        graph: Arc<Graph>,
        dispatcher: Arc<dyn KernelDispatcher>,
        options: SessionOptions,
    ) -> Result<Self> {
        graph.validate()?;
        let pool = if options.parallel {
            Some(WavePool::new(options.threads)?)
        } else {
            None
        };
        Ok(Self {
            graph,
            dispatcher,
            options,
            pool,
            state: ExecState::NotStarted,
            trace: Vec::new(),
            executed: 0,
        })
    }

    /// Compute `requested` from `inputs`.
    ///
    /// The result holds exactly one entry per distinct requested name. For a
    /// variable computed inside a loop that is its value at the last
    /// iteration that produced it; for a loop exit, the value the loop ended
    /// with.
    ///
    /// Unknown names and missing or mismatched bindings are reported before
    /// anything runs and leave the session unused. Any later failure ends
    /// the session without returning partial results.
    pub fn output<S: AsRef<str>>(
        &mut self,
        requested: &[S],
        inputs: HashMap<String, TensorValue>,
        listeners: &mut [&mut dyn ExecutionListener],
    ) -> Result<HashMap<String, TensorValue>> {
        match self.state {
            ExecState::NotStarted => {}
            ExecState::Running | ExecState::Finished | ExecState::Failed => {
                return Err(SessionError::SessionFinished.into())
            }
        }
        let graph = Arc::clone(&self.graph);
        let plan = resolve(&graph, requested)?;
        check_bindings(&graph, &plan, &inputs)?;

        self.state = ExecState::Running;
        let mut inputs = inputs;
        let mut values = ValueTable::new(&graph);
        for var in &plan.placeholders {
            if let Some(value) = inputs.remove(&graph.var(*var).name) {
                values.bind(*var, value);
            }
        }
        crate::trace!(
            "session.start requested={} ops={} placeholders={} parallel={}",
            plan.requested.len(),
            plan.op_count(),
            plan.placeholders.len(),
            self.options.parallel
        );

        let engine = Engine::new(
            &graph,
            self.dispatcher.as_ref(),
            &plan,
            values,
            EngineOptions {
                trace: self.options.trace,
                timer: self.options.timer,
                pool: self.pool.as_ref(),
            },
        );
        let mut engine = match engine {
            Ok(engine) => engine,
            Err(err) => {
                self.state = ExecState::Failed;
                return Err(err);
            }
        };
        let run = engine.run(listeners);
        self.trace = engine.take_events();
        self.executed = engine.executed_count();
        if let Err(err) = run {
            self.state = ExecState::Failed;
            return Err(err);
        }

        let mut outputs = HashMap::with_capacity(plan.requested.len());
        for (name, var) in &plan.requested {
            let Some(value) = engine.values().latest(*var) else {
                self.state = ExecState::Failed;
                let producer = graph
                    .producer_of(*var)
                    .map(|(op, _)| graph.op(op).name.clone())
                    .unwrap_or_else(|| name.clone());
                return Err(SessionError::control_flow(
                    producer,
                    engine.frames().describe(FrameIter::ROOT),
                    format!(
                        "`{}` was never produced: its switch branch was not taken or its loop never exited",
                        name
                    ),
                )
                .into());
            };
            outputs.insert(name.clone(), value.as_ref().clone());
        }
        self.state = ExecState::Finished;
        crate::trace!(
            "session.done outputs={} instances={}",
            outputs.len(),
            self.executed
        );
        Ok(outputs)
    }

    /// [`output`](Self::output) without listeners.
    pub fn run<S: AsRef<str>>(
        &mut self,
        requested: &[S],
        inputs: HashMap<String, TensorValue>,
    ) -> Result<HashMap<String, TensorValue>> {
        self.output(requested, inputs, &mut [])
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Node instances executed by the last run, including a failed one.
    pub fn executed_instances(&self) -> usize {
        self.executed
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.clone()
    }

    pub fn trace_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.trace)
            .map_err(|err| anyhow!("failed to serialize trace: {}", err))
    }
}
