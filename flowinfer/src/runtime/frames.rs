//! Loop frames and their iteration counters.
//!
//! Every loop body executes inside a frame. The root frame holds code that
//! is not inside any loop and only ever has iteration 0. A child frame is
//! created the first time an enter op for its loop fires in a given parent
//! context, so a loop nested in another loop gets a fresh frame for every
//! outer iteration.
use std::collections::HashMap;
use std::fmt;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl FrameId {
    pub const ROOT: FrameId = FrameId(0);

    pub fn is_root(self) -> bool {
        self == FrameId::ROOT
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame{}", self.0)
    }
}

/// Execution context of a node instance: a frame plus one of its iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameIter {
    pub frame: FrameId,
    pub iteration: usize,
}

impl FrameIter {
    pub const ROOT: FrameIter = FrameIter {
        frame: FrameId::ROOT,
        iteration: 0,
    };

    pub fn new(frame: FrameId, iteration: usize) -> Self {
        Self { frame, iteration }
    }
}

#[derive(Debug, Clone)]
struct FrameState {
    name: String,
    parent: Option<FrameIter>,
    counter: usize,
    terminal: Option<usize>,
    conditions: HashMap<usize, bool>,
}

#[derive(Debug, Clone)]
pub struct FrameTracker {
    frames: Vec<FrameState>,
    index: HashMap<(String, FrameId, usize), FrameId>,
}

impl Default for FrameTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTracker {
    pub fn new() -> Self {
        Self {
            frames: vec![FrameState {
                name: "root".to_string(),
                parent: None,
                counter: 0,
                terminal: None,
                conditions: HashMap::new(),
            }],
            index: HashMap::new(),
        }
    }

    /// Return the frame for loop `name` entered from `parent`, creating it on
    /// first use. The boolean is true when the frame was just created.
    pub fn enter_frame(&mut self, name: &str, parent: FrameIter) -> (FrameId, bool) {
        let key = (name.to_string(), parent.frame, parent.iteration);
        if let Some(id) = self.index.get(&key) {
            return (*id, false);
        }
        let id = FrameId(self.frames.len());
        self.frames.push(FrameState {
            name: name.to_string(),
            parent: Some(parent),
            counter: 0,
            terminal: None,
            conditions: HashMap::new(),
        });
        self.index.insert(key, id);
        crate::trace!("frame.enter {} parent={}", self.describe_frame(id), self.describe(parent));
        (id, true)
    }

    /// Move `frame` from iteration `from` to `from + 1`.
    ///
    /// Several next-iteration ops of one loop fire for the same iteration; the
    /// counter only moves the first time.
    pub fn advance_iteration(&mut self, frame: FrameId, from: usize) -> Result<usize> {
        let state = self.state_mut(frame)?;
        if frame.is_root() {
            return Err(anyhow!("the root frame has no iterations to advance"));
        }
        if let Some(terminal) = state.terminal {
            if from >= terminal {
                return Err(anyhow!(
                    "frame `{}` terminated at iteration {}; cannot advance from {}",
                    state.name,
                    terminal,
                    from
                ));
            }
        }
        let next = from + 1;
        if next > state.counter {
            state.counter = next;
            crate::trace!("frame.advance {}", self.describe(FrameIter::new(frame, next)));
        }
        Ok(next)
    }

    pub fn record_condition(&mut self, ctx: FrameIter, value: bool) -> Result<()> {
        let state = self.state_mut(ctx.frame)?;
        match state.conditions.insert(ctx.iteration, value) {
            Some(previous) if previous != value => Err(anyhow!(
                "loop condition for iteration {} changed from {} to {}",
                ctx.iteration,
                previous,
                value
            )),
            _ => Ok(()),
        }
    }

    pub fn condition(&self, ctx: FrameIter) -> Option<bool> {
        self.frames
            .get(ctx.frame.0)
            .and_then(|state| state.conditions.get(&ctx.iteration).copied())
    }

    /// Stop `ctx.frame` after `ctx.iteration`. Marking the same iteration
    /// again is a no-op; a different one is an error.
    pub fn mark_terminated(&mut self, ctx: FrameIter) -> Result<()> {
        if ctx.frame.is_root() {
            return Err(anyhow!("the root frame cannot be terminated"));
        }
        let state = self.state_mut(ctx.frame)?;
        let terminal = state.terminal;
        match terminal {
            None => {
                state.terminal = Some(ctx.iteration);
                crate::trace!("frame.exit {}", self.describe(ctx));
                Ok(())
            }
            Some(terminal) if terminal == ctx.iteration => Ok(()),
            Some(terminal) => Err(anyhow!(
                "frame `{}` already terminated at iteration {}, not {}",
                state.name,
                terminal,
                ctx.iteration
            )),
        }
    }

    pub fn accepts(&self, ctx: FrameIter) -> bool {
        match self.frames.get(ctx.frame.0) {
            Some(state) => state.terminal.map_or(true, |t| ctx.iteration <= t),
            None => false,
        }
    }

    pub fn is_terminated(&self, frame: FrameId) -> bool {
        self.frames
            .get(frame.0)
            .map_or(false, |state| state.terminal.is_some())
    }

    pub fn current_iteration(&self, frame: FrameId) -> Option<usize> {
        self.frames.get(frame.0).map(|state| state.counter)
    }

    pub fn parent(&self, frame: FrameId) -> Option<FrameIter> {
        self.frames.get(frame.0).and_then(|state| state.parent)
    }

    pub fn name(&self, frame: FrameId) -> Option<&str> {
        self.frames.get(frame.0).map(|state| state.name.as_str())
    }

    pub fn encloses(&self, outer: FrameIter, inner: FrameIter) -> bool {
        let mut cursor = Some(inner);
        while let Some(ctx) = cursor {
            if ctx == outer {
                return true;
            }
            cursor = self.parent(ctx.frame);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Path of frame names with the parent iteration each was entered at,
    /// e.g. `root/outer@1/inner`.
    pub fn describe_frame(&self, frame: FrameId) -> String {
        let Some(state) = self.frames.get(frame.0) else {
            return format!("<unknown {}>", frame);
        };
        match state.parent {
            None => state.name.clone(),
            Some(parent) => format!("{}/{}", self.describe(parent), state.name),
        }
    }

    /// `frame_path@iteration`; the root context renders as `root`.
    pub fn describe(&self, ctx: FrameIter) -> String {
        if ctx.frame.is_root() {
            return self.describe_frame(ctx.frame);
        }
        format!("{}@{}", self.describe_frame(ctx.frame), ctx.iteration)
    }

    fn state_mut(&mut self, frame: FrameId) -> Result<&mut FrameState> {
        self.frames
            .get_mut(frame.0)
            .ok_or_else(|| anyhow!("unknown {}", frame))
    }
}
