/// Host Pump
///
/// The consuming half of the task bridge. The embedding application's own
/// event loop calls [`HostPump::drain`] whenever it is woken; the pump runs
/// whatever is queued, one task at a time, and returns.
///
/// [`HostLoop`] is a stand-in host loop on a dedicated thread, used by the
/// binary and the tests when there is no real host application.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, info};

use crate::core::bridge::{Shared, Task, TaskBridge, TaskOutcome, TaskState};
use crate::core::error::{FailureCategory, TaskFailure};

/// Wakes the host event loop so it schedules a drain.
///
/// Implementations must not block and must tolerate being called many times
/// before the host gets around to draining.
pub trait HostWaker: Send + Sync {
    fn wake(&self);
}

/// Drains the task queue on the host thread.
///
/// There is exactly one pump per bridge and it is not `Clone`, so `drain`
/// taking `&mut self` means no two tasks can ever run at the same time.
pub struct HostPump {
    shared: Arc<Shared>,
}

impl HostPump {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Execute the tasks queued at the time of the call.
    ///
    /// Tasks submitted while draining wait for the next call, so a busy
    /// server cannot keep the host loop from getting control back.
    /// Returns the number of tasks executed.
    pub fn drain(&mut self) -> usize {
        let budget = self.shared.lock_queue().len();
        let mut executed = 0;
        while executed < budget {
            // The lock is released before the task runs.
            let Some(mut task) = self.shared.lock_queue().pop_front() else {
                break;
            };
            run_task(&mut task);
            executed += 1;
        }
        executed
    }

    /// Tasks still waiting to run.
    pub fn pending(&self) -> usize {
        self.shared.lock_queue().len()
    }
}

fn run_task(task: &mut Task) {
    let Some(work) = task.work.take() else {
        return;
    };
    let queued_for = task.age();
    task.state = TaskState::Running;
    let started = Instant::now();

    let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => {
            task.state = TaskState::Completed;
            TaskOutcome::Completed(value)
        }
        Ok(Err(e)) => {
            task.state = TaskState::Failed;
            TaskOutcome::Failed(TaskFailure {
                category: FailureCategory::Handler,
                message: e.to_string(),
            })
        }
        Err(payload) => {
            task.state = TaskState::Failed;
            TaskOutcome::Failed(TaskFailure {
                category: FailureCategory::Panic,
                message: panic_message(payload.as_ref()),
            })
        }
    };

    debug!(
        task = %task.id(),
        state = ?task.state(),
        queued_ms = queued_for.as_millis() as u64,
        run_ms = started.elapsed().as_millis() as u64,
        "task finished"
    );

    if task.reply.send(outcome).is_err() {
        debug!(task = %task.id(), "submitter no longer waiting; result discarded");
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Waker backed by a one-slot channel. Repeated wakes before the host drains
/// collapse into one.
pub struct ChannelWaker {
    tx: Sender<()>,
}

impl ChannelWaker {
    /// # Arguments
    /// * `tx` - Sending half of a `bounded(1)` channel the host loop waits on
    pub fn new(tx: Sender<()>) -> Self {
        Self { tx }
    }
}

impl HostWaker for ChannelWaker {
    fn wake(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("host loop is gone; wake ignored");
            }
        }
    }
}

/// A host event loop running on its own thread.
///
/// Sleeps until woken or until `poll_interval` passes, then drains.
pub struct HostLoop {
    bridge: TaskBridge,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl HostLoop {
    /// Spawn the loop thread and return the bridge that feeds it.
    pub fn spawn(poll_interval: Duration) -> io::Result<(TaskBridge, HostLoop)> {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        let (bridge, pump) = TaskBridge::new(ChannelWaker::new(wake_tx));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("host".into())
            .spawn(move || run_loop(pump, wake_rx, poll_interval, thread_stop))?;

        info!(poll_ms = poll_interval.as_millis() as u64, "host loop started");
        let host = HostLoop {
            bridge: bridge.clone(),
            stop,
            handle,
        };
        Ok((bridge, host))
    }

    /// Shut the bridge down and wait for the loop thread to exit.
    ///
    /// A task that is already running is allowed to finish.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        self.bridge.shutdown();
        if self.handle.join().is_err() {
            error!("host loop thread panicked");
        }
        info!("host loop stopped");
    }
}

fn run_loop(
    mut pump: HostPump,
    wake_rx: Receiver<()>,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Acquire) {
        match wake_rx.recv_timeout(poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        let executed = pump.drain();
        if executed > 0 {
            debug!(executed, "drain cycle");
        }
    }
}
