//! Readiness-driven execution over node instances.
//!
//! A node instance is an op paired with the frame/iteration it runs in. The
//! engine keeps a FIFO of ready instances; running one records its outputs
//! and re-checks the ops that read them. Nothing is scheduled from a static
//! order, so untaken switch branches never run and loops run exactly as many
//! iterations as their condition allows.
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::backend::KernelDispatcher;
use crate::error::SessionError;
use crate::graph::{describe_op, Graph, OpId, OpKind, Operation, VarId};
use crate::tensor::{tensor_to_bool, TensorValue};

use super::frames::{FrameIter, FrameTracker};
use super::listener::{ExecutionListener, OpExecution};
use super::resolver::ExecutionPlan;
use super::scheduler::{run_kernel, KernelJob, WavePool};
use super::state::ValueTable;
use super::trace::{format_trace_timing, log_trace_event, TraceEvent, TraceEventKind};

pub(crate) type Instance = (OpId, FrameIter);

/// Values produced by one instance and the context each one lands in.
type Emitted = Vec<(VarId, FrameIter, Arc<TensorValue>)>;

#[derive(Debug, Clone, Copy)]
struct Wiring {
    var: VarId,
    control: bool,
}

pub(crate) struct EngineOptions<'g> {
    pub trace: bool,
    pub timer: bool,
    pub pool: Option<&'g WavePool>,
}

pub(crate) struct Engine<'g> {
    graph: &'g Graph,
    dispatcher: &'g dyn KernelDispatcher,
    plan: &'g ExecutionPlan,
    pool: Option<&'g WavePool>,
    trace_enabled: bool,
    timer_enabled: bool,
    inputs: Vec<Vec<Wiring>>,
    outputs: Vec<Vec<VarId>>,
    exits: Vec<OpId>,
    frames: FrameTracker,
    values: ValueTable,
    queue: VecDeque<Instance>,
    queued: HashSet<Instance>,
    executed: HashSet<Instance>,
    // Instances checked but not yet ready. Retried when an enclosing context
    // records one of their inputs.
    parked: HashMap<OpId, Vec<FrameIter>>,
    events: Vec<TraceEvent>,
}

impl<'g> Engine<'g> {
    pub fn new(
        graph: &'g Graph,
        dispatcher: &'g dyn KernelDispatcher,
        plan: &'g ExecutionPlan,
        values: ValueTable,
        options: EngineOptions<'g>,
    ) -> Result<Self> {
        let mut inputs = Vec::with_capacity(graph.ops().len());
        let mut outputs = Vec::with_capacity(graph.ops().len());
        for op in graph.ops() {
            let wiring = op
                .inputs
                .iter()
                .map(|input| -> Result<Wiring> {
                    let var = graph.var_id(&input.var).ok_or_else(|| {
                        SessionError::invalid_graph(format!(
                            "op `{}` reads undeclared variable `{}`",
                            op.name, input.var
                        ))
                    })?;
                    Ok(Wiring {
                        var,
                        control: input.control,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let declared = op
                .outputs
                .iter()
                .map(|name| {
                    graph.var_id(name).ok_or_else(|| {
                        anyhow!(SessionError::invalid_graph(format!(
                            "op `{}` output `{}` is not declared",
                            op.name, name
                        )))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            inputs.push(wiring);
            outputs.push(declared);
        }
        let exits = plan
            .ops
            .iter()
            .copied()
            .filter(|id| matches!(graph.op(*id).kind, OpKind::Exit))
            .collect();
        Ok(Self {
            graph,
            dispatcher,
            plan,
            pool: options.pool,
            trace_enabled: options.trace,
            timer_enabled: options.timer,
            inputs,
            outputs,
            exits,
            frames: FrameTracker::new(),
            values,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            executed: HashSet::new(),
            parked: HashMap::new(),
            events: Vec::new(),
        })
    }

    /// Drain the ready queue. Returns once nothing else can become ready.
    pub fn run(&mut self, listeners: &mut [&mut dyn ExecutionListener]) -> Result<()> {
        self.seed();
        while let Some(instance) = self.queue.pop_front() {
            self.queued.remove(&instance);
            if self.executed.contains(&instance) {
                continue;
            }
            if !self.frames.accepts(instance.1) {
                crate::trace!(
                    "schedule.refused {} at {}",
                    self.graph.op(instance.0).name,
                    self.frames.describe(instance.1)
                );
                continue;
            }
            if self.pool.is_some() && self.is_kernel_op(instance.0) {
                let mut wave = vec![instance];
                self.drain_wave(&mut wave);
                self.run_wave(wave, listeners)?;
            } else {
                self.run_instance(instance, listeners)?;
            }
        }
        crate::trace!(
            "engine.done instances={} frames={} values={}",
            self.executed.len(),
            self.frames.len(),
            self.values.len()
        );
        Ok(())
    }

    pub fn values(&self) -> &ValueTable {
        &self.values
    }

    pub fn frames(&self) -> &FrameTracker {
        &self.frames
    }

    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub fn take_events(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }

    fn seed(&mut self) {
        let plan = self.plan;
        for op in &plan.ops {
            self.try_schedule(*op, FrameIter::ROOT, false);
        }
    }

    fn is_kernel_op(&self, op: OpId) -> bool {
        matches!(self.graph.op(op).kind, OpKind::Ordinary { .. })
    }

    // Takes the run of kernel instances at the front of the queue. A kernel
    // never overtakes a control-flow instance queued ahead of it, so merges
    // see the same inputs as in sequential mode.
    fn drain_wave(&mut self, wave: &mut Vec<Instance>) {
        while let Some(next) = self.queue.front().copied() {
            if !self.is_kernel_op(next.0) {
                break;
            }
            self.queue.pop_front();
            self.queued.remove(&next);
            if !self.executed.contains(&next) && self.frames.accepts(next.1) {
                wave.push(next);
            }
        }
    }

    fn run_instance(
        &mut self,
        instance: Instance,
        listeners: &mut [&mut dyn ExecutionListener],
    ) -> Result<()> {
        let graph = self.graph;
        let op = graph.op(instance.0);
        let execution = self.execution_for(op, instance.1);
        for listener in listeners.iter_mut() {
            listener.op_started(&execution);
        }
        let start = self.timer_enabled.then(Instant::now);
        let emitted = self.execute(op, instance.1)?;
        let elapsed = start.map(|start| start.elapsed());
        self.finish(instance, emitted, elapsed, &execution, listeners);
        Ok(())
    }

    fn run_wave(
        &mut self,
        wave: Vec<Instance>,
        listeners: &mut [&mut dyn ExecutionListener],
    ) -> Result<()> {
        let graph = self.graph;
        let mut jobs = Vec::with_capacity(wave.len());
        let mut executions = Vec::with_capacity(wave.len());
        for instance in wave {
            let op = graph.op(instance.0);
            let OpKind::Ordinary { op_type, attrs } = &op.kind else {
                return Err(anyhow!("op `{}` cannot run in a kernel wave", op.name));
            };
            let execution = self.execution_for(op, instance.1);
            for listener in listeners.iter_mut() {
                listener.op_started(&execution);
            }
            executions.push(execution);
            jobs.push(KernelJob {
                instance,
                op_type: op_type.as_str(),
                attrs,
                inputs: self.gather(op, instance.1)?,
            });
        }
        let outcomes = match self.pool {
            Some(pool) => pool.run(self.dispatcher, &jobs, self.timer_enabled),
            None => jobs
                .iter()
                .map(|job| run_kernel(self.dispatcher, job, self.timer_enabled))
                .collect(),
        };
        for ((job, outcome), execution) in jobs.iter().zip(outcomes).zip(executions.iter()) {
            let op = graph.op(job.instance.0);
            let emitted = self.kernel_outputs(op, job.instance.1, outcome.result)?;
            self.finish(job.instance, emitted, outcome.elapsed, execution, listeners);
        }
        Ok(())
    }

    fn execute(&mut self, op: &'g Operation, ctx: FrameIter) -> Result<Emitted> {
        let outputs = &self.outputs[op.id.0];
        let first_output = *outputs
            .first()
            .ok_or_else(|| self.control_error(op, ctx, "op declares no outputs"))?;
        match &op.kind {
            OpKind::Ordinary { op_type, attrs } => {
                let job = KernelJob {
                    instance: (op.id, ctx),
                    op_type: op_type.as_str(),
                    attrs,
                    inputs: self.gather(op, ctx)?,
                };
                let outcome = run_kernel(self.dispatcher, &job, false);
                self.kernel_outputs(op, ctx, outcome.result)
            }
            OpKind::Identity => {
                let value = self.single_input(op, ctx)?;
                Ok(vec![(first_output, ctx, value)])
            }
            OpKind::Switch => {
                let inputs = self.gather(op, ctx)?;
                let [data, predicate] = inputs.as_slice() else {
                    return Err(self.control_error(op, ctx, "switch needs data and predicate"));
                };
                let taken = tensor_to_bool(predicate)
                    .map_err(|err| self.control_error(op, ctx, format!("switch predicate: {}", err)))?;
                let target = *outputs
                    .get(usize::from(taken))
                    .ok_or_else(|| self.control_error(op, ctx, "switch needs two outputs"))?;
                Ok(vec![(target, ctx, Arc::clone(data))])
            }
            OpKind::Merge => {
                let chosen = self.inputs[op.id.0]
                    .iter()
                    .filter(|wiring| !wiring.control)
                    .enumerate()
                    .find_map(|(idx, wiring)| {
                        self.values
                            .lookup(&self.frames, wiring.var, ctx)
                            .map(|value| (idx, Arc::clone(value)))
                    });
                let Some((idx, value)) = chosen else {
                    return Err(self.control_error(op, ctx, "merge fired with no input available"));
                };
                let mut emitted = vec![(first_output, ctx, value)];
                if let Some(index_output) = outputs.get(1) {
                    emitted.push((
                        *index_output,
                        ctx,
                        Arc::new(TensorValue::scalar(idx as i64)),
                    ));
                }
                Ok(emitted)
            }
            OpKind::Enter { frame_name, .. } => {
                let value = self.single_input(op, ctx)?;
                let (child, _) = self.frames.enter_frame(frame_name, ctx);
                Ok(vec![(first_output, FrameIter::new(child, 0), value)])
            }
            OpKind::Exit => {
                if ctx.frame.is_root() {
                    return Err(self.control_error(op, ctx, "exit outside of any loop frame"));
                }
                if self.frames.condition(ctx) != Some(false) {
                    return Err(self.control_error(
                        op,
                        ctx,
                        "exit fired before the loop condition turned false",
                    ));
                }
                let value = self.single_input(op, ctx)?;
                let parent = self
                    .frames
                    .parent(ctx.frame)
                    .ok_or_else(|| self.control_error(op, ctx, "loop frame has no parent"))?;
                self.frames
                    .mark_terminated(ctx)
                    .map_err(|err| self.control_error(op, ctx, err.to_string()))?;
                Ok(vec![(first_output, parent, value)])
            }
            OpKind::NextIteration => {
                if ctx.frame.is_root() {
                    return Err(self.control_error(
                        op,
                        ctx,
                        "next-iteration outside of any loop frame",
                    ));
                }
                let value = self.single_input(op, ctx)?;
                let next = self
                    .frames
                    .advance_iteration(ctx.frame, ctx.iteration)
                    .map_err(|err| self.control_error(op, ctx, err.to_string()))?;
                Ok(vec![(first_output, FrameIter::new(ctx.frame, next), value)])
            }
            OpKind::LoopCond => {
                if ctx.frame.is_root() {
                    return Err(self.control_error(
                        op,
                        ctx,
                        "loop condition outside of any loop frame",
                    ));
                }
                let value = self.single_input(op, ctx)?;
                let flag = tensor_to_bool(&value)
                    .map_err(|err| self.control_error(op, ctx, format!("loop condition: {}", err)))?;
                self.frames
                    .record_condition(ctx, flag)
                    .map_err(|err| self.control_error(op, ctx, err.to_string()))?;
                Ok(vec![(first_output, ctx, value)])
            }
        }
    }

    fn kernel_outputs(
        &self,
        op: &Operation,
        ctx: FrameIter,
        result: Result<Vec<TensorValue>>,
    ) -> Result<Emitted> {
        let values =
            result.map_err(|err| SessionError::kernel(&op.name, self.frames.describe(ctx), err))?;
        let outputs = &self.outputs[op.id.0];
        if values.len() != outputs.len() {
            return Err(SessionError::kernel(
                &op.name,
                self.frames.describe(ctx),
                anyhow!(
                    "kernel returned {} outputs, op declares {}",
                    values.len(),
                    outputs.len()
                ),
            )
            .into());
        }
        Ok(outputs
            .iter()
            .zip(values)
            .map(|(var, value)| (*var, ctx, Arc::new(value)))
            .collect())
    }

    fn finish(
        &mut self,
        instance: Instance,
        emitted: Emitted,
        elapsed: Option<Duration>,
        execution: &OpExecution,
        listeners: &mut [&mut dyn ExecutionListener],
    ) {
        let graph = self.graph;
        let (op_id, ctx) = instance;
        let op = graph.op(op_id);
        self.executed.insert(instance);
        for (var, at, value) in &emitted {
            self.values.record(*var, *at, Arc::clone(value));
        }
        if !listeners.is_empty() {
            let produced: Vec<(String, &TensorValue)> = emitted
                .iter()
                .map(|(var, _, value)| (graph.var(*var).name.clone(), value.as_ref()))
                .collect();
            for listener in listeners.iter_mut() {
                listener.op_finished(execution, &produced);
            }
        }
        if self.trace_enabled {
            self.push_event(op, ctx, &emitted, elapsed);
        }

        for (var, at, _) in &emitted {
            self.notify(*var, *at);
        }
        if matches!(op.kind, OpKind::LoopCond) && self.frames.condition(ctx) == Some(false) {
            // Only exits already waiting at this context need the condition.
            for idx in 0..self.exits.len() {
                let exit = self.exits[idx];
                let waiting = self
                    .parked
                    .get(&exit)
                    .map_or(false, |parked| parked.contains(&ctx));
                if waiting {
                    self.try_schedule(exit, ctx, false);
                }
            }
        }
    }

    fn notify(&mut self, var: VarId, at: FrameIter) {
        let graph = self.graph;
        for consumer in graph.consumers_of(&graph.var(var).name) {
            self.try_schedule(*consumer, at, true);
            let retry: Vec<FrameIter> = match self.parked.get(consumer) {
                Some(parked) => parked
                    .iter()
                    .copied()
                    .filter(|ctx| *ctx != at && self.frames.encloses(at, *ctx))
                    .collect(),
                None => Vec::new(),
            };
            for ctx in retry {
                self.try_schedule(*consumer, ctx, true);
            }
        }
    }

    fn try_schedule(&mut self, op: OpId, ctx: FrameIter, park: bool) {
        if !self.plan.contains(op) {
            return;
        }
        let instance = (op, ctx);
        if self.executed.contains(&instance) || self.queued.contains(&instance) {
            return;
        }
        if !self.frames.accepts(ctx) {
            return;
        }
        if self.is_ready(op, ctx) {
            self.queue.push_back(instance);
            self.queued.insert(instance);
            if let Some(parked) = self.parked.get_mut(&op) {
                parked.retain(|waiting| *waiting != ctx);
            }
        } else if park {
            let parked = self.parked.entry(op).or_default();
            if !parked.contains(&ctx) {
                parked.push(ctx);
            }
        }
    }

    fn is_ready(&self, op: OpId, ctx: FrameIter) -> bool {
        let wiring = &self.inputs[op.0];
        let controls_done = wiring
            .iter()
            .filter(|w| w.control)
            .all(|w| self.control_satisfied(w.var, ctx));
        if !controls_done {
            return false;
        }
        let mut data = wiring.iter().filter(|w| !w.control);
        match &self.graph.op(op).kind {
            OpKind::Merge => data.any(|w| self.values.is_available(&self.frames, w.var, ctx)),
            // An exit only fires in the frame that produced its input, never
            // for a value visible from an enclosing loop.
            OpKind::Exit => {
                data.all(|w| self.values.has_exact(w.var, ctx))
                    && (ctx.frame.is_root() || self.frames.condition(ctx) == Some(false))
            }
            _ => data.all(|w| self.values.is_available(&self.frames, w.var, ctx)),
        }
    }

    // A control input is met once its variable is visible from `ctx`, so a
    // control edge from an untaken switch output never fires.
    fn control_satisfied(&self, var: VarId, ctx: FrameIter) -> bool {
        self.values.is_available(&self.frames, var, ctx)
    }

    fn gather(&self, op: &Operation, ctx: FrameIter) -> Result<Vec<Arc<TensorValue>>> {
        self.inputs[op.id.0]
            .iter()
            .filter(|wiring| !wiring.control)
            .map(|wiring| {
                self.values
                    .lookup(&self.frames, wiring.var, ctx)
                    .map(Arc::clone)
                    .ok_or_else(|| {
                        self.control_error(
                            op,
                            ctx,
                            format!("input `{}` has no value", self.graph.var(wiring.var).name),
                        )
                    })
            })
            .collect()
    }

    fn single_input(&self, op: &Operation, ctx: FrameIter) -> Result<Arc<TensorValue>> {
        let mut inputs = self.gather(op, ctx)?;
        if inputs.len() != 1 {
            return Err(self.control_error(
                op,
                ctx,
                format!("expected 1 data input, found {}", inputs.len()),
            ));
        }
        inputs
            .pop()
            .ok_or_else(|| self.control_error(op, ctx, "missing data input"))
    }

    fn control_error(
        &self,
        op: &Operation,
        ctx: FrameIter,
        detail: impl Into<String>,
    ) -> anyhow::Error {
        let err = SessionError::control_flow(&op.name, self.frames.describe(ctx), detail);
        crate::error!("{}", err);
        err.into()
    }

    fn execution_for(&self, op: &Operation, ctx: FrameIter) -> OpExecution {
        OpExecution {
            op: op.id,
            op_name: op.name.clone(),
            tag: op.tag(),
            op_type: match &op.kind {
                OpKind::Ordinary { op_type, .. } => Some(op_type.clone()),
                _ => None,
            },
            frame: self.frames.describe_frame(ctx.frame),
            iteration: ctx.iteration,
        }
    }

    fn push_event(
        &mut self,
        op: &Operation,
        ctx: FrameIter,
        emitted: &Emitted,
        elapsed: Option<Duration>,
    ) {
        let graph = self.graph;
        let timing = elapsed.map(format_trace_timing).unwrap_or_default();
        let inputs = self.inputs[op.id.0]
            .iter()
            .filter(|wiring| !wiring.control)
            .map(|wiring| {
                let name = &graph.var(wiring.var).name;
                match self.values.lookup(&self.frames, wiring.var, ctx) {
                    Some(value) => format!("{}={}", name, value),
                    None => name.clone(),
                }
            })
            .collect();
        let outputs = emitted
            .iter()
            .map(|(var, _, value)| format!("{}={}", graph.var(*var).name, value))
            .collect();
        let event = TraceEvent {
            kind: TraceEventKind::for_tag(op.tag()),
            op_index: op.id.0,
            op_uuid: op.uuid,
            op_name: op.name.clone(),
            frame: self.frames.describe_frame(ctx.frame),
            iteration: ctx.iteration,
            op_desc: describe_op(op),
            inputs,
            outputs,
            micros: timing.micros,
            micros_parts: timing.micros_parts,
        };
        log_trace_event(&event);
        self.events.push(event);
    }
}
