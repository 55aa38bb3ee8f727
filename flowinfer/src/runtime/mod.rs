mod engine;
mod frames;
mod listener;
mod resolver;
mod scheduler;
mod session;
mod state;
mod trace;

pub use frames::{FrameId, FrameIter, FrameTracker};
pub use listener::{ExecutionListener, OpExecution, RecordingListener};
pub use resolver::{check_bindings, resolve, ExecutionPlan};
pub use scheduler::WavePool;
pub use session::{ExecState, Session, SessionOptions};
pub use trace::{TraceEvent, TraceEventKind};
