/// Task Bridge
///
/// Lets any thread run a closure on the host thread and wait for its result.
/// Submitters enqueue a [`Task`] on a FIFO queue, wake the host loop through
/// a [`HostWaker`], and block on a single-value completion channel. The host
/// loop owns the [`HostPump`](crate::core::host::HostPump), which drains the
/// queue one task at a time.
///
/// A submitter that times out only stops waiting. Its task stays queued and
/// still runs; the result is dropped because nobody is left to receive it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::error::{BridgeError, HandlerError, TaskFailure};
use crate::core::host::{HostPump, HostWaker};

/// Unit of host-bound work.
pub type Work = Box<dyn FnOnce() -> Result<Value, HandlerError> + Send + 'static>;

/// Opaque task identifier, unique per submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Fresh random (v4) id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a task.
///
/// Pending -> Running -> Completed | Failed on the host thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, not yet picked up by the pump
    Pending,
    /// Executing on the host thread
    Running,
    /// The work returned a value
    Completed,
    /// The work returned an error or panicked
    Failed,
    /// The submitter stopped waiting. Only ever observed by the submitter;
    /// the task itself still runs.
    TimedOut,
}

/// Final result of a task as sent back to the submitter.
#[derive(Debug)]
pub(crate) enum TaskOutcome {
    Completed(Value),
    Failed(TaskFailure),
}

/// One queued unit of work.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) work: Option<Work>,
    pub(crate) created_at: Instant,
    pub(crate) state: TaskState,
    pub(crate) reply: Sender<TaskOutcome>,
}

impl Task {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Time since submission.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

pub(crate) struct Shared {
    queue: Mutex<VecDeque<Task>>,
    waker: Box<dyn HostWaker>,
    stopped: AtomicBool,
}

impl Shared {
    pub(crate) fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Task>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Submission side of the bridge. Cheap to clone; every clone feeds the same
/// host pump.
#[derive(Clone)]
pub struct TaskBridge {
    shared: Arc<Shared>,
}

impl TaskBridge {
    /// Create a bridge and the pump that must be driven from the host thread.
    ///
    /// # Arguments
    /// * `waker` - Notifies the host loop that tasks are waiting
    pub fn new(waker: impl HostWaker + 'static) -> (Self, HostPump) {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            waker: Box::new(waker),
            stopped: AtomicBool::new(false),
        });
        let pump = HostPump::new(Arc::clone(&shared));
        (Self { shared }, pump)
    }

    /// Run `work` on the host thread and wait at most `timeout` for it.
    ///
    /// Blocks the calling thread. On timeout the work is not cancelled.
    ///
    /// # Arguments
    /// * `work` - Closure to run on the host thread
    /// * `timeout` - Upper bound on the wait, queueing time included
    pub fn submit<F>(&self, work: F, timeout: Duration) -> Result<Value, BridgeError>
    where
        F: FnOnce() -> Result<Value, HandlerError> + Send + 'static,
    {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(BridgeError::Stopped);
        }

        // One-slot channel: the pump sends exactly one outcome per task
        let id = TaskId::new();
        let (reply, outcome) = crossbeam_channel::bounded(1);
        let task = Task {
            id,
            work: Some(Box::new(work)),
            created_at: Instant::now(),
            state: TaskState::Pending,
            reply,
        };

        {
            let mut queue = self.shared.lock_queue();
            // Re-checked under the lock so shutdown cannot miss this task.
            if self.shared.stopped.load(Ordering::Acquire) {
                return Err(BridgeError::Stopped);
            }
            queue.push_back(task);
            debug!(task = %id, depth = queue.len(), "task queued");
        }
        self.shared.waker.wake();

        // Block until the host thread answers or the deadline passes
        match outcome.recv_timeout(timeout) {
            Ok(TaskOutcome::Completed(value)) => Ok(value),
            Ok(TaskOutcome::Failed(failure)) => Err(BridgeError::Failed(failure)),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    task = %id,
                    state = ?TaskState::TimedOut,
                    timeout_ms = timeout.as_millis() as u64,
                    "submitter gave up waiting; the task will still run"
                );
                Err(BridgeError::TimedOut { id, timeout })
            }
            Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Abandoned(id)),
        }
    }

    /// Number of tasks waiting for the host thread.
    pub fn pending(&self) -> usize {
        self.shared.lock_queue().len()
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Stop accepting tasks and discard everything still queued.
    ///
    /// Waiters of discarded tasks are released immediately with
    /// [`BridgeError::Abandoned`].
    pub fn shutdown(&self) {
        let discarded: Vec<Task> = {
            let mut queue = self.shared.lock_queue();
            self.shared.stopped.store(true, Ordering::Release);
            queue.drain(..).collect()
        };
        if !discarded.is_empty() {
            warn!(count = discarded.len(), "discarding queued tasks on shutdown");
        }
        // Dropping the reply senders disconnects the waiters.
        drop(discarded);
        self.shared.waker.wake();
    }
}
